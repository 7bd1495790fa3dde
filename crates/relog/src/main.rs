//! relog - rewrites IPv4 addresses in log files to hostnames.
//!
//! Reads a log stream, resolves every address literal through massively
//! concurrent reverse DNS, and emits the stream in input order with the
//! addresses replaced. A persistent resolution database lets later runs
//! reuse earlier answers; the database maintenance modes (dump, merge,
//! expire) live here too.

use std::io::Write;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use relog_resolver::{Config, Resolver};
use relog_store::Store;
use tracing::{debug, Level};
use tracing_subscriber::EnvFilter;

/// Rewrites IPv4 addresses in log files to hostnames via reverse DNS.
#[derive(Parser, Debug)]
#[command(name = "relog", version, about, long_about = None)]
struct Cli {
    /// Log file to process, or - for standard input
    #[arg(value_name = "FILE")]
    file: Option<PathBuf>,

    /// Enable the class-recursion fallback for failed lookups
    #[arg(short, long)]
    recursive: bool,

    /// Scan for addresses anywhere on a line, not only at line start
    #[arg(short, long)]
    anywhere: bool,

    /// Per-query deadline in seconds
    #[arg(short, long, value_name = "SECONDS", default_value_t = 30)]
    timeout: u64,

    /// Concurrent query socket bound
    #[arg(short, long, value_name = "COUNT", default_value_t = 64)]
    sockets: usize,

    /// Line buffer bound
    #[arg(short = 'l', long, value_name = "COUNT", default_value_t = 10_000)]
    linecache: usize,

    /// Name mask for recursion-synthesized hostnames (%i address, %c class)
    #[arg(short, long, value_name = "TEMPLATE", default_value = "%i.%c")]
    mask: String,

    /// Nameserver to query (ip or ip:port); default from /etc/resolv.conf
    #[arg(short = 'n', long, value_name = "ADDR")]
    server: Option<String>,

    /// Path of the persistent resolution database
    #[arg(long, value_name = "PATH")]
    database: Option<PathBuf>,

    /// Consult the database before issuing a query
    #[arg(long)]
    dbfirst: bool,

    /// Never issue queries; implies --dbfirst
    #[arg(long)]
    dbonly: bool,

    /// Emit a per-host status glyph to standard error
    #[arg(short, long)]
    progress: bool,

    /// List unresolved addresses on standard error after the run
    #[arg(short, long)]
    unresolved: bool,

    /// Dump the database to standard output and exit
    #[arg(long)]
    dumpdb: bool,

    /// Merge `key name` pairs from the input into the database and exit
    #[arg(long)]
    mergedb: bool,

    /// Delete database entries older than this many hours and exit
    #[arg(long, value_name = "HOURS")]
    expiredb: Option<u64>,

    /// Suppress the statistics summary
    #[arg(long)]
    nostats: bool,

    /// Diagnostic verbosity (0 = errors only .. 4 = trace)
    #[arg(long, value_name = "LEVEL", default_value_t = 0)]
    debug: u8,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    if cli.dumpdb {
        return dump_db(&cli);
    }
    if let Some(hours) = cli.expiredb {
        return expire_db(&cli, hours);
    }
    if cli.mergedb {
        return merge_db(&cli);
    }

    resolve(cli).await
}

async fn resolve(cli: Cli) -> Result<()> {
    let Some(file) = cli.file.clone() else {
        bail!("no log file given (use - for standard input)");
    };

    let store = match &cli.database {
        Some(path) => Some(Store::open(path).context("opening resolution database")?),
        None => {
            if cli.dbfirst || cli.dbonly {
                bail!("--dbfirst and --dbonly require --database");
            }
            None
        }
    };

    let server = match &cli.server {
        Some(text) => parse_server(text)?,
        None => default_nameserver(),
    };
    debug!(server = %server, "using nameserver");

    let config = Config {
        recursive: cli.recursive,
        anywhere: cli.anywhere,
        timeout: Duration::from_secs(cli.timeout.max(1)),
        sockets: cli.sockets.max(1),
        line_cache: cli.linecache.max(1),
        mask: cli.mask.clone(),
        db_first: cli.dbfirst || cli.dbonly,
        db_only: cli.dbonly,
        progress: cli.progress,
        track_unresolved: cli.unresolved,
        server,
        ..Config::default()
    };

    let mut resolver = Resolver::new(config, store);

    let stdout = std::io::stdout();
    let mut output = std::io::BufWriter::new(stdout.lock());

    if file == Path::new("-") {
        let input = tokio::io::BufReader::new(tokio::io::stdin());
        resolver.run(input, &mut output).await?;
    } else {
        let handle = tokio::fs::File::open(&file)
            .await
            .with_context(|| format!("cannot open log file {}", file.display()))?;
        let input = tokio::io::BufReader::new(handle);
        resolver.run(input, &mut output).await?;
    }
    output.flush()?;

    let stats = resolver.stats();
    let mut err = std::io::stderr().lock();
    if cli.unresolved && !stats.unresolved.is_empty() {
        writeln!(err, "unresolved addresses:")?;
        for ip in &stats.unresolved {
            writeln!(err, "  {}", ip)?;
        }
    }
    if !cli.nostats {
        let write_errors = resolver.store().map(|s| s.write_errors());
        stats.write_summary(&mut err, write_errors)?;
    }

    Ok(())
}

fn dump_db(cli: &Cli) -> Result<()> {
    let store = open_store(cli, "--dumpdb")?;
    let stdout = std::io::stdout();
    let mut out = std::io::BufWriter::new(stdout.lock());
    store.dump(&mut out)?;
    out.flush()?;
    Ok(())
}

fn merge_db(cli: &Cli) -> Result<()> {
    let mut store = open_store(cli, "--mergedb")?;

    let merged = match cli.file.as_deref() {
        Some(path) if path != Path::new("-") => {
            let file = std::fs::File::open(path)
                .with_context(|| format!("cannot open merge input {}", path.display()))?;
            store.merge_from(&mut std::io::BufReader::new(file))?
        }
        _ => {
            let stdin = std::io::stdin();
            store.merge_from(&mut stdin.lock())?
        }
    };

    eprintln!("merged {} entries, {} now stored", merged, store.len());
    Ok(())
}

fn expire_db(cli: &Cli, hours: u64) -> Result<()> {
    let mut store = open_store(cli, "--expiredb")?;
    let removed = store.expire(Duration::from_secs(hours.saturating_mul(3600)))?;
    eprintln!(
        "expired {} of {} entries older than {}h",
        removed,
        removed + store.len(),
        hours
    );
    Ok(())
}

fn open_store(cli: &Cli, mode: &str) -> Result<Store> {
    let path = cli
        .database
        .as_ref()
        .with_context(|| format!("{mode} requires --database"))?;
    Ok(Store::open(path)?)
}

/// Parses a `--server` value: a bare IP gets port 53.
fn parse_server(text: &str) -> Result<SocketAddr> {
    if let Ok(addr) = text.parse::<SocketAddr>() {
        return Ok(addr);
    }
    let ip: IpAddr = text
        .parse()
        .with_context(|| format!("invalid nameserver address {text:?}"))?;
    Ok(SocketAddr::new(ip, 53))
}

/// The first nameserver from /etc/resolv.conf, or the local resolver.
fn default_nameserver() -> SocketAddr {
    std::fs::read_to_string("/etc/resolv.conf")
        .ok()
        .and_then(|contents| first_nameserver(&contents))
        .map(|ip| SocketAddr::new(ip, 53))
        .unwrap_or_else(|| "127.0.0.1:53".parse().expect("literal address"))
}

fn first_nameserver(contents: &str) -> Option<IpAddr> {
    for line in contents.lines() {
        let line = line.trim();
        if line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        let mut fields = line.split_whitespace();
        if fields.next() == Some("nameserver") {
            if let Some(ip) = fields.next().and_then(|f| f.parse().ok()) {
                return Some(ip);
            }
        }
    }
    None
}

fn init_tracing(debug: u8) {
    let level = match debug {
        0 => Level::ERROR,
        1 => Level::WARN,
        2 => Level::INFO,
        3 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
