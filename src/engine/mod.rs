mod checks;
mod error;
mod mutations;
mod queries;
mod store;

pub use error::EngineError;
pub use store::{RoomStore, SharedRoom};

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc, oneshot};

use crate::model::{Allocation, Event, Room};
use crate::wal::Wal;

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
/// 5. Respond to all senders with the batch outcome.
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
                            // Flush the current batch first, then handle the
                            // non-append command
                            flush_and_respond(&mut wal, &mut batch);
                            handle_non_append(&mut wal, other);
                            break;
                        }
                        Err(_) => break, // channel empty — flush batch
                    }
                }

                if !batch.is_empty() {
                    flush_and_respond(&mut wal, &mut batch);
                }
            }
            other => handle_non_append(&mut wal, other),
        }
    }
}

fn flush_and_respond(wal: &mut Wal, batch: &mut Vec<(Event, oneshot::Sender<io::Result<()>>)>) {
    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let flush_start = std::time::Instant::now();
    let result = flush_batch(wal, batch);
    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
        .record(flush_start.elapsed().as_secs_f64());
    for (_, tx) in batch.drain(..) {
        let r = match &result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn flush_batch(wal: &mut Wal, batch: &[(Event, oneshot::Sender<io::Result<()>>)]) -> io::Result<()> {
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

// ── Engine ───────────────────────────────────────────────

/// The allocation engine. Owns the injected inventory store and the WAL
/// sender; every state transition is journaled before it is applied.
pub struct Engine {
    pub store: RoomStore,
    wal_tx: mpsc::Sender<WalCommand>,
}

/// Apply an event to a room record (no locking — caller holds the lock).
/// RoomAdded/RoomDeleted are handled at the store level, not here.
fn apply_to_room(room: &mut Room, event: &Event) {
    match event {
        Event::RoomUpdated { room_no, capacity, has_ac, has_washroom, at, .. } => {
            room.room_no = room_no.clone();
            room.capacity = *capacity;
            room.has_ac = *has_ac;
            room.has_washroom = *has_washroom;
            room.updated_at = *at;
        }
        Event::RoomAllocated { group, students, at, .. } => {
            room.allocation = Some(Allocation { group: group.clone(), students: *students });
            room.updated_at = *at;
        }
        Event::RoomDeallocated { at, .. } => {
            room.allocation = None;
            room.updated_at = *at;
        }
        Event::RoomAdded { .. } | Event::RoomDeleted { .. } => {}
    }
}

impl Engine {
    /// Replay the WAL into `store`, then start the group-commit writer.
    pub fn open(store: RoomStore, wal_path: PathBuf) -> io::Result<Self> {
        let events = Wal::replay(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let engine = Self { store, wal_tx };

        // Replay — we're the sole owner of these Arcs, so try_write always
        // succeeds instantly. Never block here: open may run inside an
        // async context.
        for event in &events {
            match event {
                Event::RoomAdded { id, room_no, capacity, has_ac, has_washroom, at } => {
                    let room = Room {
                        id: *id,
                        room_no: room_no.clone(),
                        capacity: *capacity,
                        has_ac: *has_ac,
                        has_washroom: *has_washroom,
                        allocation: None,
                        created_at: *at,
                        updated_at: *at,
                    };
                    let _ = engine.store.claim_room_no(room_no.clone(), *id);
                    engine.store.insert(*id, Arc::new(RwLock::new(room)));
                }
                Event::RoomDeleted { id } => {
                    if let Some(shared) = engine.store.remove(id) {
                        let room = shared.try_read().expect("replay: uncontended read");
                        engine.store.release_room_no(&room.room_no);
                    }
                }
                other => {
                    if let Some(shared) = engine.store.get(&other.room_id()) {
                        let mut room = shared.try_write().expect("replay: uncontended write");
                        if let Event::RoomUpdated { room_no, .. } = other
                            && *room_no != room.room_no {
                                engine.store.release_room_no(&room.room_no);
                                let _ = engine.store.claim_room_no(room_no.clone(), room.id);
                            }
                        apply_to_room(&mut room, other);
                    }
                }
            }
        }

        Ok(engine)
    }

    /// Write an event to the WAL via the background group-commit writer.
    pub(super) async fn wal_append(&self, event: &Event) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append { event: event.clone(), response: tx })
            .await
            .map_err(|_| EngineError::Wal("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::Wal("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::Wal(e.to_string()))
    }

    /// WAL-append then apply, in that order: a transition only mutates the
    /// record once it is durably journaled.
    pub(super) async fn persist_and_apply(
        &self,
        room: &mut Room,
        event: &Event,
    ) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        apply_to_room(room, event);
        Ok(())
    }

    /// Compact the WAL down to the events needed to recreate current state.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        let mut events = Vec::new();
        for shared in self.store.snapshot() {
            let room = shared.read().await;
            events.push(Event::RoomAdded {
                id: room.id,
                room_no: room.room_no.clone(),
                capacity: room.capacity,
                has_ac: room.has_ac,
                has_washroom: room.has_washroom,
                at: room.created_at,
            });
            if let Some(alloc) = &room.allocation {
                events.push(Event::RoomAllocated {
                    id: room.id,
                    group: alloc.group.clone(),
                    students: alloc.students,
                    at: room.updated_at,
                });
            } else if room.updated_at != room.created_at {
                // Restore updated_at without changing any field.
                events.push(Event::RoomUpdated {
                    id: room.id,
                    room_no: room.room_no.clone(),
                    capacity: room.capacity,
                    has_ac: room.has_ac,
                    has_washroom: room.has_washroom,
                    at: room.updated_at,
                });
            }
        }

        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| EngineError::Wal("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::Wal("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::Wal(e.to_string()))
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
