//! In-place line rewriting.
//!
//! Replacement is literal first-occurrence substring substitution, walking
//! left to right with a cursor: once a region has been rewritten it is
//! never rescanned, so a resolved name that itself contains the address
//! (recursion-synthesized names always do) cannot be substituted twice.

use crate::pending::{PendingTable, State};

/// Rewrites `text`, replacing each scanned host occurrence in order with
/// its resolved name. Failed and unknown hosts leave the occurrence
/// untouched but still consume it.
pub(crate) fn rewrite_line(text: &str, hosts: &[String], table: &PendingTable) -> String {
    if hosts.is_empty() {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    for ip in hosts {
        let Some(at) = rest.find(ip.as_str()) else {
            continue;
        };

        let replacement = table
            .host(ip)
            .filter(|entry| entry.state != State::Failed)
            .and_then(|entry| entry.name.as_deref());

        out.push_str(&rest[..at]);
        match replacement {
            Some(name) => out.push_str(name),
            None => out.push_str(ip),
        }
        rest = &rest[at + ip.len()..];
    }

    out.push_str(rest);
    out
}
