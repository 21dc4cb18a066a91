use std::sync::Arc;

use tokio::sync::RwLock;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;
use crate::observability;

use super::checks::{now_ms, validate_capacity, validate_group_name, validate_room_no};
use super::{Engine, EngineError};

impl Engine {
    /// Create a room. The canonical room number is claimed in the uniqueness
    /// index before the event is journaled; the claim is rolled back if the
    /// append fails.
    pub async fn add_room(
        &self,
        room_no: &str,
        capacity: u32,
        has_ac: bool,
        has_washroom: bool,
    ) -> Result<Room, EngineError> {
        let canonical = canonical_room_no(room_no);
        validate_room_no(&canonical)?;
        validate_capacity(capacity)?;
        if self.store.len() >= MAX_ROOMS {
            return Err(EngineError::LimitExceeded("too many rooms"));
        }

        let id = Ulid::new();
        if self.store.claim_room_no(canonical.clone(), id).is_err() {
            return Err(EngineError::Conflict(canonical));
        }

        let at = now_ms();
        let event = Event::RoomAdded {
            id,
            room_no: canonical.clone(),
            capacity,
            has_ac,
            has_washroom,
            at,
        };
        if let Err(e) = self.wal_append(&event).await {
            self.store.release_room_no(&canonical);
            return Err(e);
        }

        let room = Room {
            id,
            room_no: canonical,
            capacity,
            has_ac,
            has_washroom,
            allocation: None,
            created_at: at,
            updated_at: at,
        };
        self.store.insert(id, Arc::new(RwLock::new(room.clone())));
        metrics::gauge!(observability::ROOMS_TOTAL).set(self.store.len() as f64);
        Ok(room)
    }

    /// Update a room's mutable fields. Rejected while the room is allocated.
    pub async fn update_room(&self, id: Ulid, patch: RoomPatch) -> Result<Room, EngineError> {
        let shared = self.store.get(&id).ok_or(EngineError::NotFound(id))?;
        let mut room = shared.write().await;
        if room.is_allocated() {
            return Err(EngineError::InvalidState(
                "Cannot update an allocated room. Deallocate it first.",
            ));
        }

        let new_room_no = match &patch.room_no {
            Some(raw) => {
                let canonical = canonical_room_no(raw);
                validate_room_no(&canonical)?;
                canonical
            }
            None => room.room_no.clone(),
        };
        let new_capacity = patch.capacity.unwrap_or(room.capacity);
        validate_capacity(new_capacity)?;
        let new_has_ac = patch.has_ac.unwrap_or(room.has_ac);
        let new_has_washroom = patch.has_washroom.unwrap_or(room.has_washroom);

        let old_room_no = room.room_no.clone();
        let renamed = new_room_no != old_room_no;
        if renamed && self.store.claim_room_no(new_room_no.clone(), id).is_err() {
            return Err(EngineError::Conflict(new_room_no));
        }

        let event = Event::RoomUpdated {
            id,
            room_no: new_room_no.clone(),
            capacity: new_capacity,
            has_ac: new_has_ac,
            has_washroom: new_has_washroom,
            at: now_ms(),
        };
        match self.persist_and_apply(&mut room, &event).await {
            Ok(()) => {
                if renamed {
                    self.store.release_room_no(&old_room_no);
                }
                Ok(room.clone())
            }
            Err(e) => {
                if renamed {
                    self.store.release_room_no(&new_room_no);
                }
                Err(e)
            }
        }
    }

    /// Remove a room from the inventory. Rejected while allocated. The write
    /// lock is held across the removal so a concurrent allocate cannot claim
    /// the room mid-delete.
    pub async fn delete_room(&self, id: Ulid) -> Result<(), EngineError> {
        let shared = self.store.get(&id).ok_or(EngineError::NotFound(id))?;
        let room = shared.write().await;
        if room.is_allocated() {
            return Err(EngineError::InvalidState(
                "Cannot delete an allocated room. Deallocate it first.",
            ));
        }

        self.wal_append(&Event::RoomDeleted { id }).await?;
        self.store.remove(&id);
        self.store.release_room_no(&room.room_no);
        metrics::gauge!(observability::ROOMS_TOTAL).set(self.store.len() as f64);
        Ok(())
    }

    /// Best-fit allocation: reserve the smallest available room that holds
    /// `students` and has the demanded facilities.
    ///
    /// Select-then-reserve is a conditional update: after winning the
    /// selected room's write lock the selecting predicate is re-checked, and
    /// a room claimed by a concurrent caller in the meantime fails the check
    /// and triggers re-selection. Bounded retries; exhaustion reports
    /// no-room-available. No room matching at all is a normal outcome, not
    /// an error.
    pub async fn allocate(
        &self,
        students: u32,
        needs_ac: bool,
        needs_washroom: bool,
        group_name: Option<String>,
    ) -> Result<AllocationOutcome, EngineError> {
        if students == 0 {
            return Err(EngineError::validation(
                "students",
                "Number of students must be a positive integer",
            ));
        }
        let group = match group_name {
            Some(g) => {
                let g = g.trim().to_string();
                validate_group_name(&g)?;
                if g.is_empty() { format!("Group-{}", now_ms()) } else { g }
            }
            None => format!("Group-{}", now_ms()),
        };

        let filter = RoomFilter::for_allocation(students, needs_ac, needs_washroom);

        for _ in 0..ALLOCATE_MAX_RETRIES {
            let Some(id) = self.store.find_best_fit(&filter).await else {
                metrics::counter!(observability::ALLOCATIONS_TOTAL, "outcome" => "unfilled")
                    .increment(1);
                return Ok(AllocationOutcome::unfilled());
            };
            let Some(shared) = self.store.get(&id) else {
                // Deleted between selection and lookup — select again.
                metrics::counter!(observability::ALLOCATION_RETRIES_TOTAL).increment(1);
                continue;
            };
            let mut room = shared.write().await;
            if !self.store.contains(&id) || !filter.matches(&room) {
                // Lost the race for this room — select again.
                metrics::counter!(observability::ALLOCATION_RETRIES_TOTAL).increment(1);
                continue;
            }

            let event = Event::RoomAllocated {
                id,
                group: group.clone(),
                students,
                at: now_ms(),
            };
            self.persist_and_apply(&mut room, &event).await?;
            metrics::counter!(observability::ALLOCATIONS_TOTAL, "outcome" => "filled")
                .increment(1);
            return Ok(AllocationOutcome::filled(room.clone()));
        }

        // Retry budget spent under heavy contention: every selected room was
        // claimed by someone else first.
        metrics::counter!(observability::ALLOCATIONS_TOTAL, "outcome" => "contended")
            .increment(1);
        Ok(AllocationOutcome::unfilled())
    }

    /// Release an allocated room back to availability.
    pub async fn deallocate(&self, id: Ulid) -> Result<Room, EngineError> {
        let shared = self.store.get(&id).ok_or(EngineError::NotFound(id))?;
        let mut room = shared.write().await;
        if !room.is_allocated() {
            return Err(EngineError::InvalidState("Room is not currently allocated"));
        }

        let event = Event::RoomDeallocated { id, at: now_ms() };
        self.persist_and_apply(&mut room, &event).await?;
        Ok(room.clone())
    }
}
