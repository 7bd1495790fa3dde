//! The driver loop.
//!
//! One [`Resolver`] owns every piece of mutable state and interleaves the
//! five phases per tick: refill the line buffer, dispatch queries onto free
//! slots, react to ready replies, sweep expired slots, commit completed
//! head lines. The run ends when input is exhausted and the buffer drains.

use std::io::Write;
use std::net::Ipv4Addr;

use relog_proto::{Message, Name, Question, RecordType};
use relog_store::Store;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tracing::{debug, trace, warn};

use crate::buffer::{LineBuffer, LineRecord};
use crate::commit::rewrite_line;
use crate::pending::{AddOutcome, KeyKind, PendingTable, QueryKey, State};
use crate::progress::Progress;
use crate::reactor::{class_name_from_reply, host_name_from_reply};
use crate::recurse::{check_classes, ClassVerdict, NameMask};
use crate::scan::AddressScanner;
use crate::slots::SlotTable;
use crate::stats::Stats;
use crate::{Config, Result};

/// The resolver pipeline.
pub struct Resolver {
    config: Config,
    scanner: AddressScanner,
    mask: NameMask,
    table: PendingTable,
    slots: SlotTable,
    buffer: LineBuffer,
    store: Option<Store>,
    stats: Stats,
    progress: Option<Progress>,
    eof: bool,
}

impl Resolver {
    /// Creates a resolver from a configuration and an optional store.
    pub fn new(config: Config, store: Option<Store>) -> Self {
        Self {
            scanner: AddressScanner::new(config.anywhere),
            mask: NameMask::new(config.mask.clone()),
            table: PendingTable::new(),
            slots: SlotTable::new(config.sockets),
            buffer: LineBuffer::new(config.line_cache),
            store,
            stats: Stats::new(),
            progress: config.progress.then(Progress::new),
            eof: false,
            config,
        }
    }

    /// Returns the run statistics.
    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    /// Returns the store, if one is attached.
    pub fn store(&self) -> Option<&Store> {
        self.store.as_ref()
    }

    /// Processes `input` to the end, writing rewritten lines to `output`.
    pub async fn run<R, W>(&mut self, input: R, output: &mut W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: Write,
    {
        let mut lines = input.lines();

        loop {
            self.refill(&mut lines).await?;
            if self.eof && self.buffer.is_empty() {
                break;
            }

            self.dispatch().await;
            self.react().await;
            self.sweep();
            self.commit(output)?;
            output.flush()?;
        }

        if let Some(progress) = self.progress.as_mut() {
            progress.finish();
        }
        Ok(())
    }

    /// Reads input lines until the window is full or EOF, scanning each for
    /// addresses and registering them in the pending table.
    async fn refill<R>(&mut self, lines: &mut Lines<R>) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        while !self.eof && !self.buffer.is_full() {
            match lines.next_line().await? {
                Some(text) => {
                    let hosts = self.scanner.scan(&text);
                    for ip in &hosts {
                        let outcome = self.table.add_host(
                            ip,
                            self.store.as_ref(),
                            self.config.db_first,
                            self.config.db_only,
                        );
                        match outcome {
                            AddOutcome::Queued => self.stats.hosts += 1,
                            AddOutcome::StoreHit => {
                                self.stats.hosts += 1;
                                self.host_terminal(ip, State::FromStore);
                            }
                            AddOutcome::Denied => {
                                self.stats.hosts += 1;
                                self.host_terminal(ip, State::Failed);
                            }
                            AddOutcome::Referenced => {}
                        }
                    }
                    self.stats.lines_read += 1;
                    self.buffer.push(LineRecord { text, hosts });
                }
                None => self.eof = true,
            }
        }
        Ok(())
    }

    /// Issues queries from the head of the work queue while slots are free.
    async fn dispatch(&mut self) {
        while !self.slots.is_full() {
            let Some(key) = self.table.pop_work() else { break };

            // Skip keys retired between enqueue and dispatch.
            let dispatchable = self
                .table
                .entry(&key)
                .map(|e| e.state == State::Pending && e.slot.is_none())
                .unwrap_or(false);
            if !dispatchable {
                trace!(key = %key.key, "skipping stale work queue entry");
                continue;
            }

            let Some(qname) = reverse_name(&key) else {
                if let Some(entry) = self.table.entry_mut(&key) {
                    entry.state = State::Failed;
                }
                if key.kind == KeyKind::Host {
                    self.host_terminal(&key.key, State::Failed);
                }
                continue;
            };

            let rtype = match key.kind {
                KeyKind::Host => RecordType::Ptr,
                KeyKind::Class => RecordType::Ns,
            };
            let id = self.slots.next_query_id();
            let payload = Message::query(id, Question::new(qname, rtype)).to_bytes();

            match self.slots.open(key.clone(), self.config.server, &payload, id).await {
                Ok(slot) => {
                    self.stats.queries_sent += 1;
                    if let Some(entry) = self.table.entry_mut(&key) {
                        entry.slot = Some(slot);
                    }
                    trace!(key = %key.key, kind = ?key.kind, slot, "query dispatched");
                }
                Err(e) => {
                    warn!(error = %e, key = %key.key, "cannot dispatch query, transport exhausted");
                    self.table.requeue_front(key);
                    break;
                }
            }
        }
    }

    /// Waits briefly for replies and classifies every readable slot.
    async fn react(&mut self) {
        let events = self.slots.wait_ready(self.config.reactor_wait).await;
        for event in events {
            match event.data {
                Some(data) => self.process_datagram(event.slot, &data),
                None => self.fail_slot(event.slot),
            }
        }
    }

    /// Frees expired slots and routes their keys through the fallback.
    fn sweep(&mut self) {
        for slot_id in self.slots.expired(self.config.timeout) {
            let Some(slot) = self.slots.release(slot_id) else {
                continue;
            };
            self.stats.timeouts += 1;
            debug!(key = %slot.key.key, "query timed out");
            if let Some(entry) = self.table.entry_mut(&slot.key) {
                entry.slot = None;
            }
            self.ns_failed(&slot.key);
        }
    }

    fn process_datagram(&mut self, slot_id: usize, data: &[u8]) {
        let Some(slot) = self.slots.get(slot_id) else {
            return;
        };

        let msg = match Message::parse(data) {
            Ok(msg) => msg,
            Err(e) => {
                debug!(error = %e, key = %slot.key.key, "unparsable reply");
                self.fail_slot(slot_id);
                return;
            }
        };

        // A stray datagram; the real reply may still arrive.
        if msg.id() != slot.query_id || !msg.header().is_response() {
            trace!(key = %slot.key.key, "dropping mismatched datagram");
            return;
        }

        let elapsed = slot.started.elapsed();
        let slot = self.slots.release(slot_id).expect("slot checked above");
        if let Some(entry) = self.table.entry_mut(&slot.key) {
            entry.slot = None;
        }
        self.stats.record_response(elapsed);

        let answer = match slot.key.kind {
            KeyKind::Host => host_name_from_reply(&msg),
            KeyKind::Class => class_name_from_reply(&msg),
        };

        match answer {
            Some(name) => {
                trace!(key = %slot.key.key, name = %name, "resolved");
                if let Some(entry) = self.table.entry_mut(&slot.key) {
                    entry.name = Some(name);
                    entry.state = State::FromNs;
                }
                if slot.key.kind == KeyKind::Host {
                    self.host_terminal(&slot.key.key, State::FromNs);
                }
            }
            None => {
                self.stats.bogus += 1;
                self.ns_failed(&slot.key);
            }
        }
    }

    /// Frees a slot whose socket errored and treats it as a failed reply.
    fn fail_slot(&mut self, slot_id: usize) {
        let Some(slot) = self.slots.release(slot_id) else {
            return;
        };
        self.stats.bogus += 1;
        if let Some(entry) = self.table.entry_mut(&slot.key) {
            entry.slot = None;
        }
        self.ns_failed(&slot.key);
    }

    /// The fallback chain after a failed or expired query:
    /// store record, then recursion (hosts only), then failed.
    fn ns_failed(&mut self, key: &QueryKey) {
        let cached_name = match self.table.entry(key) {
            Some(entry) => entry.cached.as_ref().map(|c| c.name.clone()),
            None => return,
        };

        if let Some(name) = cached_name {
            if let Some(entry) = self.table.entry_mut(key) {
                entry.name = Some(name);
                entry.state = State::FromStore;
            }
            if key.kind == KeyKind::Host {
                self.host_terminal(&key.key, State::FromStore);
            }
            return;
        }

        if key.kind == KeyKind::Host && self.config.recursive {
            if let Some(entry) = self.table.entry_mut(key) {
                entry.state = State::PendingRecurse;
            }
            let ip = key.key.clone();
            self.table.add_class(
                &ip,
                self.store.as_ref(),
                self.config.db_first,
                self.config.db_only,
            );
            return;
        }

        if let Some(entry) = self.table.entry_mut(key) {
            entry.state = State::Failed;
        }
        if key.kind == KeyKind::Host {
            self.host_terminal(&key.key, State::Failed);
        }
    }

    /// Finalizes a host waiting on its classes, if they are done.
    fn poke_recursion(&mut self, ip: &str) {
        if self.table.host(ip).map(|e| e.state) != Some(State::PendingRecurse) {
            return;
        }

        match check_classes(&self.table, ip, &self.mask) {
            ClassVerdict::NotReady => {}
            ClassVerdict::Resolved(name) => {
                if let Some(entry) = self.table.entry_mut(&QueryKey::host(ip)) {
                    entry.name = Some(name);
                    entry.state = State::FromRecursion;
                }
                self.host_terminal(ip, State::FromRecursion);
                self.release_classes(ip);
            }
            ClassVerdict::AllFailed => {
                if let Some(entry) = self.table.entry_mut(&QueryKey::host(ip)) {
                    entry.state = State::Failed;
                }
                self.host_terminal(ip, State::Failed);
                self.release_classes(ip);
            }
        }
    }

    fn release_classes(&mut self, ip: &str) {
        for slot in self.table.remove_class(ip, self.store.as_mut()) {
            self.slots.release(slot);
        }
    }

    /// Emits head lines whose hosts have all reached a terminal state.
    fn commit<W: Write>(&mut self, out: &mut W) -> Result<()> {
        loop {
            let hosts: Vec<String> = match self.buffer.head() {
                Some(line) => line.hosts.clone(),
                None => break,
            };

            for ip in &hosts {
                self.poke_recursion(ip);
            }

            let blocked = hosts.iter().any(|ip| {
                self.table
                    .host(ip)
                    .map(|entry| !entry.state.is_terminal())
                    .unwrap_or(false)
            });
            if blocked {
                break;
            }

            let record = self.buffer.pop_head().expect("head checked above");
            let text = rewrite_line(&record.text, &record.hosts, &self.table);

            for ip in &record.hosts {
                if let Some(slot) = self.table.remove_host(ip, self.store.as_mut()) {
                    self.slots.release(slot);
                }
            }

            writeln!(out, "{}", text)?;
            self.stats.lines_written += 1;
        }
        Ok(())
    }

    /// Records a host reaching a terminal state: statistics, the progress
    /// glyph, and unresolved tracking.
    fn host_terminal(&mut self, ip: &str, state: State) {
        let glyph = match state {
            State::FromNs => {
                self.stats.resolved_ns += 1;
                Some('.')
            }
            State::FromRecursion => {
                self.stats.resolved_recursion += 1;
                Some('r')
            }
            State::FromStore => {
                self.stats.resolved_store += 1;
                Some('d')
            }
            State::Failed => {
                self.stats.failed += 1;
                if self.config.track_unresolved {
                    self.stats.unresolved.push(ip.to_string());
                }
                None
            }
            State::Pending | State::PendingRecurse => None,
        };

        if let (Some(glyph), Some(progress)) = (glyph, self.progress.as_mut()) {
            progress.glyph(glyph);
        }
    }
}

/// Builds the `in-addr.arpa` query name for a tagged key.
fn reverse_name(key: &QueryKey) -> Option<Name> {
    match key.kind {
        KeyKind::Host => key.key.parse::<Ipv4Addr>().ok().map(Name::reverse_ipv4),
        KeyKind::Class => {
            let octets: Option<Vec<u8>> = key
                .key
                .split('.')
                .map(|octet| octet.parse().ok())
                .collect();
            octets
                .filter(|o| (1..=4).contains(&o.len()))
                .map(|o| Name::reverse_octets(&o))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader;

    #[test]
    fn reverse_names_for_keys() {
        let host = reverse_name(&QueryKey::host("1.2.3.4")).unwrap();
        assert_eq!(host.to_string(), "4.3.2.1.in-addr.arpa.");

        let class = reverse_name(&QueryKey::class("1.2.3")).unwrap();
        assert_eq!(class.to_string(), "3.2.1.in-addr.arpa.");

        assert!(reverse_name(&QueryKey::class("not.an.ip")).is_none());
    }

    #[tokio::test]
    async fn lines_without_addresses_pass_through() {
        let input = BufReader::new(&b"alpha\nbeta\ngamma\n"[..]);
        let mut output = Vec::new();

        let mut resolver = Resolver::new(Config::default(), None);
        resolver.run(input, &mut output).await.unwrap();

        assert_eq!(String::from_utf8(output).unwrap(), "alpha\nbeta\ngamma\n");
        assert_eq!(resolver.stats().lines_read, 3);
        assert_eq!(resolver.stats().lines_written, 3);
        assert_eq!(resolver.stats().queries_sent, 0);
    }

    #[tokio::test]
    async fn db_only_fails_unknown_hosts_without_queries() {
        let mut config = Config::default();
        config.db_only = true;
        config.db_first = true;
        config.track_unresolved = true;

        let input = BufReader::new(&b"8.8.8.8 q\n"[..]);
        let mut output = Vec::new();

        let mut resolver = Resolver::new(config, None);
        resolver.run(input, &mut output).await.unwrap();

        assert_eq!(String::from_utf8(output).unwrap(), "8.8.8.8 q\n");
        assert_eq!(resolver.stats().queries_sent, 0);
        assert_eq!(resolver.stats().failed, 1);
        assert_eq!(resolver.stats().unresolved, vec!["8.8.8.8".to_string()]);
    }
}
