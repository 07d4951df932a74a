//! Subscriber registry and broadcaster
//!
//! A fixed number of slots, each holding at most one subscriber connection.
//! All access goes through one internal lock, which a broadcast holds for the
//! whole fan-out pass. A slow subscriber therefore delays delivery to every
//! other subscriber of the same pass.
//!
//! Slots are addressed by [`SlotId`], which carries a generation counter: a
//! removal with an outdated id never affects a newer connection placed in the
//! same slot.

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::{debug, trace};

/// Default number of subscriber slots.
pub const DEFAULT_CAPACITY: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotId {
    index: usize,
    generation: u64,
}

impl SlotId {
    pub fn index(&self) -> usize {
        self.index
    }
}

/// Returned by [`SubscriberRegistry::insert`] when every slot is taken. Hands
/// the connection back to the caller.
#[derive(Debug)]
pub struct RegistryFull<W>(pub W);

/// Outcome of one fan-out pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Subscribers that accepted the full payload
    pub delivered: usize,

    /// Subscribers removed because the send failed
    pub dropped: usize,
}

#[derive(Debug)]
struct Slot<W> {
    generation: u64,
    conn: Option<W>,
}

#[derive(Debug)]
pub struct SubscriberRegistry<W> {
    capacity: usize,
    slots: Mutex<Vec<Slot<W>>>,
}

impl<W> SubscriberRegistry<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(capacity: usize) -> Self {
        let slots = (0..capacity)
            .map(|_| Slot {
                generation: 0,
                conn: None,
            })
            .collect();

        Self {
            capacity,
            slots: Mutex::new(slots),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Places `conn` in any free slot.
    pub async fn insert(&self, conn: W) -> Result<SlotId, RegistryFull<W>> {
        let mut slots = self.slots.lock().await;

        let Some((index, slot)) = slots
            .iter_mut()
            .enumerate()
            .find(|(_, slot)| slot.conn.is_none())
        else {
            return Err(RegistryFull(conn));
        };

        slot.generation += 1;
        slot.conn = Some(conn);

        Ok(SlotId {
            index,
            generation: slot.generation,
        })
    }

    /// Closes and clears the slot if it still holds the connection `id` was
    /// issued for. Returns whether anything was removed.
    pub async fn remove(&self, id: SlotId) -> bool {
        let conn = {
            let mut slots = self.slots.lock().await;
            match slots.get_mut(id.index) {
                Some(slot) if slot.generation == id.generation => slot.conn.take(),
                _ => None,
            }
        };

        match conn {
            Some(mut conn) => {
                let _ = conn.shutdown().await;
                true
            }
            None => false,
        }
    }

    /// Closes every subscriber and frees all slots. Returns how many were
    /// removed.
    pub async fn clear(&self) -> usize {
        let conns: Vec<W> = {
            let mut slots = self.slots.lock().await;
            slots.iter_mut().filter_map(|slot| slot.conn.take()).collect()
        };

        let removed = conns.len();
        for mut conn in conns {
            let _ = conn.shutdown().await;
        }
        removed
    }

    /// Number of occupied slots.
    pub async fn len(&self) -> usize {
        self.slots
            .lock()
            .await
            .iter()
            .filter(|slot| slot.conn.is_some())
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Calls `f` with the id of every occupied slot, under the registry lock.
    pub async fn for_each_live<F>(&self, mut f: F)
    where
        F: FnMut(SlotId),
    {
        let slots = self.slots.lock().await;
        for (index, slot) in slots.iter().enumerate() {
            if slot.conn.is_some() {
                f(SlotId {
                    index,
                    generation: slot.generation,
                });
            }
        }
    }

    /// Writes `payload` to every subscriber.
    ///
    /// A subscriber either receives the whole payload or is closed and
    /// removed before the lock is released.
    pub async fn broadcast(&self, payload: &[u8]) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        let mut slots = self.slots.lock().await;

        for (index, slot) in slots.iter_mut().enumerate() {
            let Some(conn) = slot.conn.as_mut() else {
                continue;
            };

            let sent = match conn.write_all(payload).await {
                Ok(()) => conn.flush().await,
                Err(e) => Err(e),
            };

            match sent {
                Ok(()) => {
                    trace!("delivered {} bytes to slot {index}", payload.len());
                    report.delivered += 1;
                }
                Err(e) => {
                    debug!("removing subscriber in slot {index}: {e}");
                    if let Some(mut conn) = slot.conn.take() {
                        let _ = conn.shutdown().await;
                    }
                    report.dropped += 1;
                }
            }
        }

        report
    }
}
