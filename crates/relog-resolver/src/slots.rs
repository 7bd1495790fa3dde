//! The bounded query slot table.
//!
//! Each slot is one in-flight DNS query: an ephemeral UDP socket connected
//! to the nameserver, the tagged key it was sent for, the query id, and the
//! send time. The table never grows past its bound; the dispatcher checks
//! for a free slot before popping work.

use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use futures::future::select_all;
use relog_proto::MAX_UDP_PAYLOAD;
use tokio::net::UdpSocket;
use tokio::time::timeout;

use crate::pending::QueryKey;

/// One in-flight query.
pub struct Slot {
    /// The key this query was sent for.
    pub key: QueryKey,
    /// The DNS message id, for matching the reply.
    pub query_id: u16,
    /// When the query was sent.
    pub started: Instant,
    socket: UdpSocket,
}

/// A readable slot observed by the reactor.
pub struct SlotEvent {
    /// The slot index.
    pub slot: usize,
    /// The datagram, or `None` when the socket reported an error (an ICMP
    /// rejection surfaces here on a connected socket).
    pub data: Option<Vec<u8>>,
}

/// The table of query slots.
pub struct SlotTable {
    slots: Vec<Option<Slot>>,
    bound: usize,
    next_id: u16,
}

impl SlotTable {
    /// Creates a table with `capacity` slots.
    pub fn new(capacity: usize) -> Self {
        let mut slots = Vec::new();
        slots.resize_with(capacity.max(1), || None);

        // Ids only disambiguate replies on one connected socket; a clock
        // seed plus an odd stride is enough spread.
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.subsec_nanos() as u16)
            .unwrap_or(1);

        Self {
            slots,
            bound: 0,
            next_id: seed,
        }
    }

    /// Returns the slot bound.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Returns the number of bound slots.
    pub fn in_flight(&self) -> usize {
        self.bound
    }

    /// Returns true when every slot is bound.
    pub fn is_full(&self) -> bool {
        self.bound == self.slots.len()
    }

    /// Returns the next query id.
    pub fn next_query_id(&mut self) -> u16 {
        self.next_id = self.next_id.wrapping_add(0x9E37);
        self.next_id
    }

    /// Binds a free slot to a new query: fresh socket, connect, send.
    ///
    /// Fails when the table is full or the transport is exhausted (socket
    /// allocation or send failure); the caller keeps the key queued and
    /// retries next tick.
    pub async fn open(
        &mut self,
        key: QueryKey,
        server: SocketAddr,
        payload: &[u8],
        query_id: u16,
    ) -> io::Result<usize> {
        let index = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or_else(|| io::Error::new(io::ErrorKind::WouldBlock, "slot table full"))?;

        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
        socket.connect(server).await?;
        socket.send(payload).await?;

        self.slots[index] = Some(Slot {
            key,
            query_id,
            started: Instant::now(),
            socket,
        });
        self.bound += 1;
        Ok(index)
    }

    /// Looks at a bound slot.
    pub fn get(&self, index: usize) -> Option<&Slot> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    /// Releases a slot, returning its metadata. The socket closes with it.
    pub fn release(&mut self, index: usize) -> Option<Slot> {
        let slot = self.slots.get_mut(index)?.take();
        if slot.is_some() {
            self.bound -= 1;
        }
        slot
    }

    /// Returns the indexes of slots older than `deadline`.
    pub fn expired(&self, deadline: Duration) -> Vec<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| {
                slot.as_ref()
                    .filter(|s| s.started.elapsed() >= deadline)
                    .map(|_| index)
            })
            .collect()
    }

    /// Waits up to `limit` for any bound slot to become readable, then
    /// drains every slot that is ready right now.
    ///
    /// Returns immediately when nothing is bound. One event per slot at
    /// most; freeing and state updates are the caller's job.
    pub async fn wait_ready(&self, limit: Duration) -> Vec<SlotEvent> {
        let waiters: Vec<_> = self
            .slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|s| (index, s)))
            .map(|(index, slot)| {
                Box::pin(async move {
                    let mut buf = vec![0u8; MAX_UDP_PAYLOAD];
                    match slot.socket.recv(&mut buf).await {
                        Ok(len) => {
                            buf.truncate(len);
                            SlotEvent {
                                slot: index,
                                data: Some(buf),
                            }
                        }
                        Err(_) => SlotEvent {
                            slot: index,
                            data: None,
                        },
                    }
                })
            })
            .collect();

        if waiters.is_empty() {
            return Vec::new();
        }

        let mut events = Vec::new();
        match timeout(limit, select_all(waiters)).await {
            Ok((event, _, _)) => events.push(event),
            Err(_) => return events,
        }

        // Drain whatever else is already readable, without waiting.
        for (index, slot) in self.slots.iter().enumerate() {
            let Some(slot) = slot else { continue };
            if events.iter().any(|e| e.slot == index) {
                continue;
            }
            let mut buf = vec![0u8; MAX_UDP_PAYLOAD];
            match slot.socket.try_recv(&mut buf) {
                Ok(len) => {
                    buf.truncate(len);
                    events.push(SlotEvent {
                        slot: index,
                        data: Some(buf),
                    });
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
                Err(_) => events.push(SlotEvent {
                    slot: index,
                    data: None,
                }),
            }
        }

        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_cycle_without_repeating_quickly() {
        let mut table = SlotTable::new(1);
        let first = table.next_query_id();
        for _ in 0..1000 {
            assert_ne!(table.next_query_id(), first);
        }
    }

    #[tokio::test]
    async fn open_send_and_receive() {
        let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let server = peer.local_addr().unwrap();

        let mut table = SlotTable::new(2);
        let index = table
            .open(QueryKey::host("1.2.3.4"), server, b"ping", 7)
            .await
            .unwrap();
        assert_eq!(table.in_flight(), 1);

        // Echo back from the peer.
        let mut buf = [0u8; 16];
        let (len, from) = peer.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..len], b"ping");
        peer.send_to(b"pong", from).await.unwrap();

        let events = table.wait_ready(Duration::from_secs(2)).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].slot, index);
        assert_eq!(events[0].data.as_deref(), Some(&b"pong"[..]));

        let slot = table.release(index).unwrap();
        assert_eq!(slot.query_id, 7);
        assert_eq!(table.in_flight(), 0);
    }

    #[tokio::test]
    async fn wait_ready_times_out_empty_handed() {
        let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let server = peer.local_addr().unwrap();

        let mut table = SlotTable::new(1);
        table
            .open(QueryKey::host("1.2.3.4"), server, b"ping", 1)
            .await
            .unwrap();

        let events = table.wait_ready(Duration::from_millis(50)).await;
        assert!(events.is_empty());

        assert!(table.is_full());
        let err = table
            .open(QueryKey::host("5.6.7.8"), server, b"ping", 2)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::WouldBlock);
    }

    #[tokio::test]
    async fn expiry_by_deadline() {
        let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let server = peer.local_addr().unwrap();

        let mut table = SlotTable::new(1);
        let index = table
            .open(QueryKey::class("1.2.3"), server, b"ping", 3)
            .await
            .unwrap();

        assert!(table.expired(Duration::from_secs(60)).is_empty());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(table.expired(Duration::from_millis(5)), vec![index]);
    }
}
