use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unix milliseconds — the only time type.
pub type Ms = i64;

/// Canonical form of a room number: trimmed, upper-cased.
/// All storage and uniqueness comparison happens on this form.
pub fn canonical_room_no(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// Occupancy of an allocated room. Present iff the room is allocated, so
/// "allocated ⟺ students > 0 ⟺ group present" holds by construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub group: String,
    /// Occupant count, 1..=capacity.
    pub students: u32,
}

/// A single room record. `room_no` is always canonical.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: Ulid,
    pub room_no: String,
    pub capacity: u32,
    pub has_ac: bool,
    pub has_washroom: bool,
    pub allocation: Option<Allocation>,
    pub created_at: Ms,
    pub updated_at: Ms,
}

impl Room {
    pub fn is_allocated(&self) -> bool {
        self.allocation.is_some()
    }

    pub fn allocated_students(&self) -> u32 {
        self.allocation.as_ref().map_or(0, |a| a.students)
    }

    pub fn allocated_to(&self) -> Option<&str> {
        self.allocation.as_ref().map(|a| a.group.as_str())
    }
}

/// Predicate over rooms. Fields combine with AND; `None` means no constraint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoomFilter {
    pub min_capacity: Option<u32>,
    pub has_ac: Option<bool>,
    pub has_washroom: Option<bool>,
    pub is_allocated: Option<bool>,
}

impl RoomFilter {
    /// The filter allocate builds: unallocated, big enough, and equipped
    /// with whatever the request demands. A facility that is not demanded
    /// is not constrained.
    pub fn for_allocation(students: u32, needs_ac: bool, needs_washroom: bool) -> Self {
        Self {
            min_capacity: Some(students),
            has_ac: needs_ac.then_some(true),
            has_washroom: needs_washroom.then_some(true),
            is_allocated: Some(false),
        }
    }

    pub fn matches(&self, room: &Room) -> bool {
        if let Some(min) = self.min_capacity
            && room.capacity < min {
                return false;
            }
        if let Some(ac) = self.has_ac
            && room.has_ac != ac {
                return false;
            }
        if let Some(washroom) = self.has_washroom
            && room.has_washroom != washroom {
                return false;
            }
        if let Some(allocated) = self.is_allocated
            && room.is_allocated() != allocated {
                return false;
            }
        true
    }
}

/// Partial update of a room's mutable fields. `None` leaves a field as-is.
/// Only legal while the room is unallocated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoomPatch {
    pub room_no: Option<String>,
    pub capacity: Option<u32>,
    pub has_ac: Option<bool>,
    pub has_washroom: Option<bool>,
}

/// The event types — flat, no nesting. This is the WAL record format.
/// Events carry the timestamps needed to restore created_at/updated_at
/// exactly on replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    RoomAdded {
        id: Ulid,
        room_no: String,
        capacity: u32,
        has_ac: bool,
        has_washroom: bool,
        at: Ms,
    },
    RoomUpdated {
        id: Ulid,
        room_no: String,
        capacity: u32,
        has_ac: bool,
        has_washroom: bool,
        at: Ms,
    },
    RoomAllocated {
        id: Ulid,
        group: String,
        students: u32,
        at: Ms,
    },
    RoomDeallocated {
        id: Ulid,
        at: Ms,
    },
    RoomDeleted {
        id: Ulid,
    },
}

impl Event {
    /// The room an event applies to.
    pub fn room_id(&self) -> Ulid {
        match self {
            Event::RoomAdded { id, .. }
            | Event::RoomUpdated { id, .. }
            | Event::RoomAllocated { id, .. }
            | Event::RoomDeallocated { id, .. }
            | Event::RoomDeleted { id } => *id,
        }
    }
}

// ── Query result types ───────────────────────────────────────────

/// One page of a room listing plus the numbers needed to render pagination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomPage {
    pub rooms: Vec<Room>,
    pub total: usize,
    pub page: usize,
    pub limit: usize,
    pub total_pages: usize,
}

/// Inventory counters. Each figure comes from an independent count pass,
/// so they are not guaranteed mutually consistent under concurrent writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    pub total: usize,
    pub allocated: usize,
    pub available: usize,
    pub with_ac: usize,
    pub with_washroom: usize,
}

/// Result of an allocation request. "No room matched" is a normal outcome,
/// not an error — `allocated` is false and `room` is `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationOutcome {
    pub allocated: bool,
    pub room: Option<Room>,
}

impl AllocationOutcome {
    pub fn unfilled() -> Self {
        Self { allocated: false, room: None }
    }

    pub fn filled(room: Room) -> Self {
        Self { allocated: true, room: Some(room) }
    }
}
