// Mute ledger - per-sender mute state machine.
//
//   Unmuted --mute--> Active --disconnect--> Paused --reconnect--> Active
//   Active --expiry/unmute--> Unmuted, Paused --unmute--> Unmuted
//
// The in-memory map is the source of truth. Every transition is mirrored to
// the `MuteStore` through an ordered write-behind queue: ops are enqueued
// while the sender's entry is still locked (so they reach the store in the
// order they happened) and applied by one background writer task, so no
// in-memory lock is ever held across store I/O.

use super::moderation_models::{MuteRecord, MuteState, SenderId};
use super::mute_store::MuteStore;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

enum StoreOp {
    Save(SenderId, MuteRecord),
    Delete(SenderId),
    Flush(oneshot::Sender<()>),
}

/// Apply queued ops in order. Failures are logged; memory stays authoritative.
fn spawn_store_writer(store: Arc<dyn MuteStore>) -> mpsc::UnboundedSender<StoreOp> {
    let (tx, mut rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Some(op) = rx.recv().await {
            match op {
                StoreOp::Save(sender, record) => {
                    if let Err(e) = store.save(sender, record).await {
                        tracing::warn!(sender = %sender, "Failed to save mute: {}", e);
                    }
                }
                StoreOp::Delete(sender) => {
                    if let Err(e) = store.delete(sender).await {
                        tracing::warn!(sender = %sender, "Failed to delete mute: {}", e);
                    }
                }
                StoreOp::Flush(done) => {
                    let _ = done.send(());
                }
            }
        }
        tracing::debug!("Mute store writer stopped");
    });

    tx
}

pub struct MuteLedger {
    mutes: DashMap<SenderId, MuteRecord>,
    store: Arc<dyn MuteStore>,
    writes: mpsc::UnboundedSender<StoreOp>,
}

impl MuteLedger {
    /// Build a ledger seeded from the store.
    ///
    /// A failed load is logged and yields an empty ledger. Must be called
    /// inside a Tokio runtime (it spawns the store writer).
    pub async fn load(store: Arc<dyn MuteStore>) -> Self {
        let mutes = DashMap::new();
        match store.load_all().await {
            Ok(loaded) => {
                tracing::info!("Loaded {} mutes from storage", loaded.len());
                for (sender, record) in loaded {
                    mutes.insert(sender, record);
                }
            }
            Err(e) => tracing::error!("Failed to load mutes, starting empty: {}", e),
        }

        let writes = spawn_store_writer(Arc::clone(&store));
        Self {
            mutes,
            store,
            writes,
        }
    }

    fn enqueue(&self, op: StoreOp) {
        if self.writes.send(op).is_err() {
            tracing::warn!("Mute store writer is gone; change kept in memory only");
        }
    }

    /// Mute (or re-mute) a sender, replacing any running or paused mute.
    pub fn mute(&self, sender: SenderId, duration_secs: u64, now: DateTime<Utc>) -> MuteRecord {
        let record = MuteRecord::starting(now, duration_secs);

        let mut slot = self.mutes.entry(sender).or_insert(record);
        *slot = record;
        self.enqueue(StoreOp::Save(sender, record));
        drop(slot);

        tracing::info!(sender = %sender, duration_secs, "Muted sender");
        record
    }

    /// Lift a mute early. Returns whether there was one.
    pub fn unmute(&self, sender: SenderId) -> bool {
        match self.mutes.entry(sender) {
            Entry::Occupied(entry) => {
                self.enqueue(StoreOp::Delete(sender));
                entry.remove();
                tracing::info!(sender = %sender, "Unmuted sender");
                true
            }
            Entry::Vacant(_) => false,
        }
    }

    /// Whether the sender is muted right now. Expires a due mute on the spot.
    /// A paused mute counts as muted.
    pub fn is_muted(&self, sender: SenderId, now: DateTime<Utc>) -> bool {
        self.muted_remaining(sender, now).is_some()
    }

    /// Seconds left on the sender's mute, or `None` if not muted. The record
    /// is read once, so the answer and the remaining time always agree.
    pub fn muted_remaining(&self, sender: SenderId, now: DateTime<Utc>) -> Option<u64> {
        let record = self.record(sender)?;
        if !record.is_expired(now) {
            return Some(record.remaining_secs(now));
        }

        self.expire(sender, now);
        None
    }

    /// Remove the record if it is still due (it may have changed meanwhile).
    fn expire(&self, sender: SenderId, now: DateTime<Utc>) -> bool {
        if let Entry::Occupied(entry) = self.mutes.entry(sender) {
            if entry.get().is_expired(now) {
                self.enqueue(StoreOp::Delete(sender));
                entry.remove();
                tracing::info!(sender = %sender, "Mute expired");
                return true;
            }
        }
        false
    }

    pub fn record(&self, sender: SenderId) -> Option<MuteRecord> {
        self.mutes.get(&sender).map(|record| *record)
    }

    /// Freeze a running mute while the sender is offline.
    /// A mute that is already due is left for the normal expiry path.
    pub fn on_disconnect(&self, sender: SenderId, now: DateTime<Utc>) {
        let Some(mut record) = self.mutes.get_mut(&sender) else {
            return;
        };
        let MuteState::Active { ends_at } = record.state else {
            return;
        };

        let remaining_ms = (ends_at - now).num_milliseconds();
        if remaining_ms > 0 {
            record.state = MuteState::Paused { remaining_ms };
            self.enqueue(StoreOp::Save(sender, *record));
            tracing::debug!(
                sender = %sender,
                remaining_secs = remaining_ms / 1000,
                "Paused mute"
            );
        }
    }

    /// Restart a frozen mute's clock from `now`.
    pub fn on_reconnect(&self, sender: SenderId, now: DateTime<Utc>) {
        let Some(mut record) = self.mutes.get_mut(&sender) else {
            return;
        };
        if !record.is_paused() {
            return;
        }

        *record = record.resumed(now);
        self.enqueue(StoreOp::Save(sender, *record));
        tracing::debug!(sender = %sender, "Resumed mute");
    }

    /// Expire every running mute that is due. Returns how many were removed.
    ///
    /// Each removal locks only that sender's entry.
    pub fn sweep(&self, now: DateTime<Utc>) -> usize {
        let due: Vec<SenderId> = self
            .mutes
            .iter()
            .filter(|entry| entry.value().is_expired(now))
            .map(|entry| *entry.key())
            .collect();

        due.into_iter()
            .filter(|sender| self.expire(*sender, now))
            .count()
    }

    /// Wait until every write queued so far has reached the store.
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.writes.send(StoreOp::Flush(done)).is_ok() {
            let _ = wait.await;
        }
    }

    /// Re-read the store and merge it over the in-memory set.
    pub async fn reload_from_store(&self) -> usize {
        self.flush().await;
        match self.store.load_all().await {
            Ok(loaded) => {
                let count = loaded.len();
                for (sender, record) in loaded {
                    self.mutes.insert(sender, record);
                }
                tracing::info!("Reloaded {} mutes from storage", count);
                count
            }
            Err(e) => {
                tracing::warn!("Failed to reload mutes, keeping current set: {}", e);
                0
            }
        }
    }

    /// Re-save every record, then wait for the writes (shutdown path).
    pub async fn persist_all(&self) {
        let all: HashMap<SenderId, MuteRecord> = self
            .mutes
            .iter()
            .map(|entry| (*entry.key(), *entry.value()))
            .collect();
        for (sender, record) in all {
            self.enqueue(StoreOp::Save(sender, record));
        }
        self.flush().await;
    }

    pub fn len(&self) -> usize {
        self.mutes.len()
    }
}
