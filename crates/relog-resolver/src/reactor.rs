//! Reply classification.
//!
//! Pure functions from a parsed DNS message to the name a pending entry
//! should adopt. The driver owns the surrounding bookkeeping (freeing the
//! slot, statistics, the fallback chain).

use relog_proto::Message;

/// Extracts the resolved name from a host (PTR) reply.
///
/// Any answer record carrying a PTR domain resolves the host; with several,
/// the last one observed wins. The name is adopted in its absolute display
/// form. `None` means a failed response.
pub(crate) fn host_name_from_reply(msg: &Message) -> Option<String> {
    let mut name = None;
    for record in msg.answers() {
        if let Some(ptr) = record.rdata.as_ptr() {
            name = Some(ptr.to_string());
        }
    }
    name
}

/// Extracts the class name from a class (NS) reply.
///
/// The first SOA `mname` observed defines the full domain; with no SOA, the
/// first NS `nsdname` does. The answer section is scanned before the
/// authority section, where negative responses carry their SOA. `None`
/// means a failed response.
///
/// The full domain is then cut down to the zone it names: split at the
/// first dot, keep the rest if the rest still contains a dot, else keep the
/// whole thing. Lowercased, no trailing dot.
pub(crate) fn class_name_from_reply(msg: &Message) -> Option<String> {
    let records = msg.answers().iter().chain(msg.authority());

    let mut first_ns = None;
    for record in records {
        if let Some(soa) = record.rdata.as_soa() {
            return Some(derive_class_name(&soa.mname.to_dotless_string()));
        }
        if first_ns.is_none() {
            if let Some(ns) = record.rdata.as_ns() {
                first_ns = Some(ns.to_dotless_string());
            }
        }
    }

    first_ns.map(|full| derive_class_name(&full))
}

fn derive_class_name(fulldomain: &str) -> String {
    let fulldomain = fulldomain.to_ascii_lowercase();
    match fulldomain.split_once('.') {
        Some((_, rest)) if rest.contains('.') => rest.to_string(),
        _ => fulldomain,
    }
}
