//! The recursion controller and the name mask.
//!
//! When a host's direct PTR fails and recursion is enabled, the host waits
//! in `PendingRecurse` while its three owning class prefixes resolve. The
//! controller inspects them most specific first and synthesizes a hostname
//! from the first class that got a name.

use crate::pending::{class_prefixes, PendingTable, State};

/// The user-supplied template for synthesized names.
///
/// `%i` and `%c` are each substituted once: the address literal and the
/// owning class name.
#[derive(Debug, Clone)]
pub struct NameMask {
    template: String,
}

impl NameMask {
    /// Creates a mask from a template. The default template is `%i.%c`.
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    /// Applies the mask to an address and its class name.
    pub fn apply(&self, ip: &str, class_name: &str) -> String {
        self.template
            .replacen("%i", ip, 1)
            .replacen("%c", class_name, 1)
    }
}

impl Default for NameMask {
    fn default() -> Self {
        Self::new("%i.%c")
    }
}

/// Verdict on a host waiting in `PendingRecurse`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassVerdict {
    /// Some class is still pending; the host stays blocked.
    NotReady,
    /// A class resolved; the carried name is the synthesized hostname.
    Resolved(String),
    /// All three classes failed.
    AllFailed,
}

/// Checks the three class prefixes of `ip`, most specific first.
pub fn check_classes(table: &PendingTable, ip: &str, mask: &NameMask) -> ClassVerdict {
    let prefixes = class_prefixes(ip);

    for prefix in &prefixes {
        if let Some(entry) = table.class(prefix) {
            if !entry.state.is_terminal() {
                return ClassVerdict::NotReady;
            }
        }
    }

    for prefix in &prefixes {
        let Some(entry) = table.class(prefix) else {
            continue;
        };
        if entry.state == State::Failed {
            continue;
        }
        if let Some(class_name) = entry.name.as_deref() {
            return ClassVerdict::Resolved(mask.apply(ip, class_name));
        }
    }

    ClassVerdict::AllFailed
}
