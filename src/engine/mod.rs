mod error;
mod ledger;
mod mutations;
mod pending;
mod queries;
mod validate;

pub use error::{EngineError, ErrorKind};
pub use validate::{is_available_slot, is_free, is_valid_date};

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot, RwLock};
use ulid::Ulid;

use crate::model::*;
use crate::wal::Wal;

pub type SharedGroundState = Arc<RwLock<GroundState>>;

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

/// Background task that owns the WAL and batches appends for group commit.
/// 1. Block until the first Append arrives.
/// 2. Buffer it (no fsync).
/// 3. Drain all immediately available Appends (the batch window).
/// 4. Single flush_sync for the whole batch.
/// 5. Respond Ok to all senders.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append { event, response } => {
                let mut batch = vec![(event, response)];

                // Drain all immediately available appends
                loop {
                    match rx.try_recv() {
                        Ok(WalCommand::Append { event, response }) => {
                            batch.push((event, response));
                        }
                        Ok(other) => {
                            // Flush current batch first, then handle the non-append command
                            metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE)
                                .record(batch.len() as f64);
                            let flush_start = std::time::Instant::now();
                            let result = flush_batch(&mut wal, &mut batch);
                            metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
                                .record(flush_start.elapsed().as_secs_f64());
                            respond_batch(&mut batch, &result);
                            handle_non_append(&mut wal, other);
                            break;
                        }
                        Err(_) => break, // channel empty — flush batch
                    }
                }

                if !batch.is_empty() {
                    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE)
                        .record(batch.len() as f64);
                    let flush_start = std::time::Instant::now();
                    let result = flush_batch(&mut wal, &mut batch);
                    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
                        .record(flush_start.elapsed().as_secs_f64());
                    respond_batch(&mut batch, &result);
                }
            }
            other => handle_non_append(&mut wal, other),
        }
    }
}

fn flush_batch(
    wal: &mut Wal,
    batch: &mut [(Event, oneshot::Sender<io::Result<()>>)],
) -> io::Result<()> {
    let mut append_err: Option<io::Error> = None;
    for (event, _) in batch.iter() {
        if let Err(e) = wal.append_buffered(event) {
            append_err = Some(e);
            break;
        }
    }
    // Always flush — even on append error — so partially buffered bytes
    // don't leak into the next batch (callers were told this batch failed).
    let flush_err = wal.flush_sync().err();
    if let Some(e) = append_err {
        return Err(e);
    }
    if let Some(e) = flush_err {
        return Err(e);
    }
    Ok(())
}

fn respond_batch(batch: &mut Vec<(Event, oneshot::Sender<io::Result<()>>)>, result: &io::Result<()>) {
    for (_, tx) in batch.drain(..) {
        let r = match result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { .. } => unreachable!(),
    }
}

/// The reservation engine: all documents live here, durably backed by the
/// WAL. Grounds are the unit of serialization — check-then-write runs under
/// a ground's write lock. Users, canonical bookings, and pending slots are
/// per-document atomic map entries, never locked across an await.
pub struct Engine {
    pub grounds: DashMap<Ulid, SharedGroundState>,
    users: DashMap<Ulid, UserState>,
    /// Username uniqueness index.
    usernames: DashMap<String, Ulid>,
    /// Canonical booking store — source of truth, canceled records retained.
    bookings: DashMap<Ulid, Booking>,
    pending: DashMap<Ulid, PendingSlot>,
    wal_tx: mpsc::Sender<WalCommand>,
}

/// Apply an event's ground-local effects (no locking — caller holds the lock).
fn apply_to_ground(gs: &mut GroundState, event: &Event) {
    match event {
        Event::BookingCreated { id, date, time_slot, .. } => {
            gs.occupy(*id, *date, time_slot);
        }
        Event::BookingCanceled { id, date, time_slot, .. } => {
            gs.release(*id, *date, time_slot);
        }
        Event::GroundUpdated {
            name,
            available_slots,
            sports,
            published,
            ..
        } => {
            gs.name = name.clone();
            gs.available_slots = available_slots.clone();
            gs.sports = sports.clone();
            gs.published = *published;
        }
        // Ground create/delete are handled at the DashMap level; the rest
        // have no ground-local effect.
        _ => {}
    }
}

impl Engine {
    pub fn new(wal_path: PathBuf) -> std::io::Result<Self> {
        let events = Wal::replay(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let engine = Self {
            grounds: DashMap::new(),
            users: DashMap::new(),
            usernames: DashMap::new(),
            bookings: DashMap::new(),
            pending: DashMap::new(),
            wal_tx,
        };

        // Replay events — we're the sole owner of these Arcs, so try_write
        // always succeeds instantly (no contention). Never use blocking_write
        // here because this may run inside an async context.
        for event in &events {
            match event {
                Event::GroundCreated {
                    id,
                    admin_id,
                    name,
                    available_slots,
                    sports,
                    published,
                } => {
                    let gs = GroundState::new(
                        *id,
                        *admin_id,
                        name.clone(),
                        available_slots.clone(),
                        sports.clone(),
                        *published,
                    );
                    engine.grounds.insert(*id, Arc::new(RwLock::new(gs)));
                }
                Event::GroundDeleted { id } => {
                    engine.grounds.remove(id);
                }
                other => {
                    if let Some(ground_id) = event_ground_id(other)
                        && let Some(entry) = engine.grounds.get(&ground_id)
                    {
                        let gs_arc = entry.clone();
                        let mut guard = gs_arc.try_write().expect("replay: uncontended write");
                        apply_to_ground(&mut guard, other);
                    }
                    engine.apply_records(other);
                }
            }
        }

        metrics::gauge!(crate::observability::GROUNDS_ACTIVE).set(engine.grounds.len() as f64);
        Ok(engine)
    }

    /// Apply an event's record-level effects: canonical bookings, users,
    /// pending slots, username index. Shared by live mutation and replay —
    /// the single write path that keeps the denormalized views honest.
    fn apply_records(&self, event: &Event) {
        match event {
            Event::UserRegistered { id, username } => {
                self.users.insert(*id, UserState::new(*id, username.clone()));
                self.usernames.insert(username.clone(), *id);
            }
            Event::InterestRecorded { user_id, sport } => {
                if let Some(mut user) = self.users.get_mut(user_id) {
                    user.history.insert(sport.clone());
                }
            }
            Event::BookingCreated {
                id,
                ground_id,
                user_id,
                date,
                time_slot,
            } => {
                self.bookings.insert(
                    *id,
                    Booking {
                        id: *id,
                        ground_id: *ground_id,
                        user_id: *user_id,
                        date: *date,
                        time_slot: time_slot.clone(),
                        canceled: false,
                    },
                );
                if let Some(mut user) = self.users.get_mut(user_id) {
                    user.bookings.push(*id);
                }
            }
            Event::BookingCanceled { id, user_id, .. } => {
                if let Some(mut booking) = self.bookings.get_mut(id) {
                    booking.canceled = true;
                }
                if let Some(mut user) = self.users.get_mut(user_id) {
                    user.bookings.retain(|b| b != id);
                }
            }
            Event::PendingRequested {
                id,
                ground_id,
                user_id,
                date,
                start_time,
                end_time,
            } => {
                self.pending.insert(
                    *id,
                    PendingSlot {
                        id: *id,
                        ground_id: *ground_id,
                        user_id: *user_id,
                        date: *date,
                        start_time: start_time.clone(),
                        end_time: end_time.clone(),
                        requested: true,
                    },
                );
            }
            Event::PendingResolved { id } => {
                self.pending.remove(id);
            }
            // Ground events have no record-level effects.
            Event::GroundCreated { .. } | Event::GroundUpdated { .. } | Event::GroundDeleted { .. } => {}
        }
    }

    /// Write event to WAL via the background group-commit writer.
    pub(super) async fn wal_append(&self, event: &Event) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    pub fn get_ground(&self, id: &Ulid) -> Option<SharedGroundState> {
        self.grounds.get(id).map(|e| e.value().clone())
    }

    pub(super) fn user_exists(&self, id: &Ulid) -> bool {
        self.users.contains_key(id)
    }

    pub(super) fn get_booking(&self, id: &Ulid) -> Option<Booking> {
        self.bookings.get(id).map(|e| e.value().clone())
    }

    pub(super) fn get_pending(&self, id: &Ulid) -> Option<PendingSlot> {
        self.pending.get(id).map(|e| e.value().clone())
    }

    /// WAL-append + apply in one call, for events scoped to a locked ground.
    pub(super) async fn persist_and_apply(
        &self,
        gs: &mut GroundState,
        event: &Event,
    ) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        apply_to_ground(gs, event);
        self.apply_records(event);
        Ok(())
    }

    /// WAL-append + apply for events with no ground-local effects.
    pub(super) async fn persist_record(&self, event: &Event) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        self.apply_records(event);
        Ok(())
    }

    /// Compact the WAL by rewriting it with only the events needed to
    /// recreate the current state. Canceled bookings are kept (create +
    /// cancel pairs) so the audit trail survives compaction.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        let mut events = Vec::new();

        let ground_ids: Vec<Ulid> = self.grounds.iter().map(|e| *e.key()).collect();
        for id in ground_ids {
            let Some(gs) = self.get_ground(&id) else { continue };
            let guard = gs.read().await;
            events.push(Event::GroundCreated {
                id: guard.id,
                admin_id: guard.admin_id,
                name: guard.name.clone(),
                available_slots: guard.available_slots.clone(),
                sports: guard.sports.clone(),
                published: guard.published,
            });
        }

        for entry in self.users.iter() {
            let user = entry.value();
            events.push(Event::UserRegistered {
                id: user.id,
                username: user.username.clone(),
            });
            for sport in &user.history {
                events.push(Event::InterestRecorded {
                    user_id: user.id,
                    sport: sport.clone(),
                });
            }
        }

        for entry in self.bookings.iter() {
            let b = entry.value();
            events.push(Event::BookingCreated {
                id: b.id,
                ground_id: b.ground_id,
                user_id: b.user_id,
                date: b.date,
                time_slot: b.time_slot.clone(),
            });
            if b.canceled {
                events.push(Event::BookingCanceled {
                    id: b.id,
                    ground_id: b.ground_id,
                    user_id: b.user_id,
                    date: b.date,
                    time_slot: b.time_slot.clone(),
                });
            }
        }

        for entry in self.pending.iter() {
            let p = entry.value();
            events.push(Event::PendingRequested {
                id: p.id,
                ground_id: p.ground_id,
                user_id: p.user_id,
                date: p.date,
                start_time: p.start_time.clone(),
                end_time: p.end_time.clone(),
            });
        }

        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}

/// Extract the owning ground id from an event, when it has ground-local
/// effects.
fn event_ground_id(event: &Event) -> Option<Ulid> {
    match event {
        Event::BookingCreated { ground_id, .. } | Event::BookingCanceled { ground_id, .. } => {
            Some(*ground_id)
        }
        Event::GroundUpdated { id, .. } => Some(*id),
        _ => None,
    }
}
