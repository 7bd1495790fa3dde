//! The two-tier pending table and the work queue.
//!
//! One map tracks hosts (dotted quads), one tracks classes (the /24, /16,
//! and /8 prefixes used by recursion). Entries are reference-counted by the
//! buffered lines that mention them; deletion happens exactly when the
//! count returns to zero, and that is also the moment a network-derived
//! answer is written back to the store.
//!
//! The work queue is a deque: fresh hosts go to the back, class keys to the
//! front so recursion preempts new work.

use std::collections::{HashMap, VecDeque};

use relog_store::{Origin, Record, Store};

/// What kind of key a query is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyKind {
    /// A full dotted-quad address.
    Host,
    /// A 24-, 16-, or 8-bit prefix.
    Class,
}

/// A tagged key carried through the queue and the slot table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    /// Host or class.
    pub kind: KeyKind,
    /// The dotted key text.
    pub key: String,
}

impl QueryKey {
    /// A host key.
    pub fn host(key: impl Into<String>) -> Self {
        Self {
            kind: KeyKind::Host,
            key: key.into(),
        }
    }

    /// A class key.
    pub fn class(key: impl Into<String>) -> Self {
        Self {
            kind: KeyKind::Class,
            key: key.into(),
        }
    }
}

/// Resolution state of a pending entry.
///
/// `Pending` and `PendingRecurse` are transient; the rest are terminal and
/// monotone: once set, an entry never changes state again before deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Waiting for a query to be sent or answered.
    Pending,
    /// Host whose direct PTR failed; waiting on its class keys.
    PendingRecurse,
    /// Unresolvable; the literal address stays in the output.
    Failed,
    /// Answered from the persistent store.
    FromStore,
    /// Answered by the nameserver.
    FromNs,
    /// Host name synthesized from a resolved class.
    FromRecursion,
}

impl State {
    /// Returns true for states that allow the owning line to be emitted.
    #[inline]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending | Self::PendingRecurse)
    }

    /// The store origin to persist on deletion, if any. Store-derived
    /// answers are never written back; classes only persist nameserver
    /// answers.
    pub fn persist_origin(self, kind: KeyKind) -> Option<Origin> {
        match (self, kind) {
            (Self::FromNs, _) => Some(Origin::Nameserver),
            (Self::FromRecursion, KeyKind::Host) => Some(Origin::Recursed),
            _ => None,
        }
    }
}

/// One pending host or class.
#[derive(Debug)]
pub struct Entry {
    /// Buffered-line references still waiting on this key.
    pub refcount: u32,
    /// Current state.
    pub state: State,
    /// Slot handle of the in-flight query, if one is bound.
    pub slot: Option<usize>,
    /// The resolved name, in a terminal non-failed state.
    pub name: Option<String>,
    /// Store record read once at creation time.
    pub cached: Option<Record>,
}

impl Entry {
    fn new(cached: Option<Record>) -> Self {
        Self {
            refcount: 1,
            state: State::Pending,
            slot: None,
            name: None,
            cached,
        }
    }
}

/// What `add_host` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// New entry, queued for a query.
    Queued,
    /// Existing entry; reference count bumped.
    Referenced,
    /// New entry answered immediately from the store (database-first).
    StoreHit,
    /// New entry failed immediately (database-only, no store record).
    Denied,
}

/// The pending table.
#[derive(Default)]
pub struct PendingTable {
    hosts: HashMap<String, Entry>,
    classes: HashMap<String, Entry>,
    queue: VecDeque<QueryKey>,
}

/// Returns the three owning prefixes of `ip`, most specific first:
/// `a.b.c`, `a.b`, `a`.
pub fn class_prefixes(ip: &str) -> [String; 3] {
    let octets: Vec<&str> = ip.split('.').collect();
    debug_assert_eq!(octets.len(), 4);
    [
        octets[..3].join("."),
        octets[..2].join("."),
        octets[0].to_string(),
    ]
}

impl PendingTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a host entry.
    pub fn host(&self, ip: &str) -> Option<&Entry> {
        self.hosts.get(ip)
    }

    /// Looks up a class entry.
    pub fn class(&self, prefix: &str) -> Option<&Entry> {
        self.classes.get(prefix)
    }

    /// Looks up the entry for a tagged key.
    pub fn entry(&self, key: &QueryKey) -> Option<&Entry> {
        match key.kind {
            KeyKind::Host => self.hosts.get(&key.key),
            KeyKind::Class => self.classes.get(&key.key),
        }
    }

    /// Mutable lookup for a tagged key.
    pub fn entry_mut(&mut self, key: &QueryKey) -> Option<&mut Entry> {
        match key.kind {
            KeyKind::Host => self.hosts.get_mut(&key.key),
            KeyKind::Class => self.classes.get_mut(&key.key),
        }
    }

    /// Number of live entries (hosts plus classes).
    pub fn len(&self) -> usize {
        self.hosts.len() + self.classes.len()
    }

    /// Returns true when no entries are live.
    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty() && self.classes.is_empty()
    }

    /// Pops the head of the work queue.
    pub fn pop_work(&mut self) -> Option<QueryKey> {
        self.queue.pop_front()
    }

    /// Puts a key back at the head of the queue (transport exhausted; retry
    /// next tick).
    pub fn requeue_front(&mut self, key: QueryKey) {
        self.queue.push_front(key);
    }

    /// Returns true when no work is queued.
    pub fn queue_is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Adds one reference to `ip`, creating and enqueueing the entry on
    /// first sight. `db_first` adopts a store record instead of querying;
    /// `db_only` forbids querying altogether.
    pub fn add_host(
        &mut self,
        ip: &str,
        store: Option<&Store>,
        db_first: bool,
        db_only: bool,
    ) -> AddOutcome {
        if let Some(entry) = self.hosts.get_mut(ip) {
            entry.refcount += 1;
            return AddOutcome::Referenced;
        }

        let cached = store.and_then(|s| s.get(ip)).cloned();
        let mut entry = Entry::new(cached);

        let outcome = if (db_first || db_only) && entry.cached.is_some() {
            let record = entry.cached.as_ref().expect("checked above");
            entry.name = Some(record.name.clone());
            entry.state = State::FromStore;
            AddOutcome::StoreHit
        } else if db_only {
            entry.state = State::Failed;
            AddOutcome::Denied
        } else {
            self.queue.push_back(QueryKey::host(ip));
            AddOutcome::Queued
        };

        self.hosts.insert(ip.to_string(), entry);
        outcome
    }

    /// Drops one reference to `ip`; at zero, persists a network-derived
    /// answer and deletes the entry. Returns the slot handle that must be
    /// released, if one was still bound.
    pub fn remove_host(&mut self, ip: &str, store: Option<&mut Store>) -> Option<usize> {
        self.remove(KeyKind::Host, ip, store)
    }

    /// Adds one reference to each of the three owning prefixes of `ip`,
    /// creating entries on first sight. New classes are prepended to the
    /// work queue so they preempt fresh hosts; most specific ends up at the
    /// very front.
    pub fn add_class(&mut self, ip: &str, store: Option<&Store>, db_first: bool, db_only: bool) {
        // Push /8 first so /24 lands at the head.
        for prefix in class_prefixes(ip).iter().rev() {
            if let Some(entry) = self.classes.get_mut(prefix) {
                entry.refcount += 1;
                continue;
            }

            let cached = store.and_then(|s| s.get(prefix)).cloned();
            let mut entry = Entry::new(cached);

            if (db_first || db_only) && entry.cached.is_some() {
                let record = entry.cached.as_ref().expect("checked above");
                entry.name = Some(record.name.clone());
                entry.state = State::FromStore;
            } else if db_only {
                entry.state = State::Failed;
            } else {
                self.queue.push_front(QueryKey::class(prefix.clone()));
            }

            self.classes.insert(prefix.clone(), entry);
        }
    }

    /// Drops one reference from each owning prefix of `ip`. Returns the
    /// slot handles that must be released.
    pub fn remove_class(&mut self, ip: &str, mut store: Option<&mut Store>) -> Vec<usize> {
        let mut freed = Vec::new();
        for prefix in class_prefixes(ip) {
            if let Some(slot) = self.remove(KeyKind::Class, &prefix, store.as_deref_mut()) {
                freed.push(slot);
            }
        }
        freed
    }

    fn remove(&mut self, kind: KeyKind, key: &str, store: Option<&mut Store>) -> Option<usize> {
        let map = match kind {
            KeyKind::Host => &mut self.hosts,
            KeyKind::Class => &mut self.classes,
        };

        let entry = map.get_mut(key)?;
        entry.refcount = entry.refcount.saturating_sub(1);
        if entry.refcount > 0 {
            return None;
        }

        let entry = map.remove(key).expect("present above");

        if let (Some(origin), Some(name), Some(store)) =
            (entry.state.persist_origin(kind), entry.name.as_deref(), store)
        {
            store.insert(key, name, origin);
        }

        entry.slot
    }
}
