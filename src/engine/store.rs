use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::RwLock;
use ulid::Ulid;

use crate::model::{Room, RoomFilter};

pub type SharedRoom = Arc<RwLock<Room>>;

/// The Room Inventory Store: a concurrent map of room records plus the
/// canonical room-number uniqueness index.
///
/// Per-record atomicity comes from each room's own `RwLock`; the index's
/// entry API makes claiming a room number atomic. The store is constructed
/// by the caller and handed to the engine — it is never a global.
pub struct RoomStore {
    rooms: DashMap<Ulid, SharedRoom>,
    room_nos: DashMap<String, Ulid>,
}

impl Default for RoomStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RoomStore {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
            room_nos: DashMap::new(),
        }
    }

    // ── Point operations ─────────────────────────────────────

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    pub fn contains(&self, id: &Ulid) -> bool {
        self.rooms.contains_key(id)
    }

    pub fn get(&self, id: &Ulid) -> Option<SharedRoom> {
        self.rooms.get(id).map(|e| e.value().clone())
    }

    pub fn insert(&self, id: Ulid, room: SharedRoom) {
        self.rooms.insert(id, room);
    }

    pub fn remove(&self, id: &Ulid) -> Option<SharedRoom> {
        self.rooms.remove(id).map(|(_, room)| room)
    }

    // ── Room-number index ────────────────────────────────────

    pub fn id_for_room_no(&self, canonical: &str) -> Option<Ulid> {
        self.room_nos.get(canonical).map(|e| *e.value())
    }

    /// Atomically claim a canonical room number for `id`. On failure the
    /// current holder's id is returned and the index is untouched.
    pub fn claim_room_no(&self, canonical: String, id: Ulid) -> Result<(), Ulid> {
        match self.room_nos.entry(canonical) {
            Entry::Occupied(e) => Err(*e.get()),
            Entry::Vacant(e) => {
                e.insert(id);
                Ok(())
            }
        }
    }

    pub fn release_room_no(&self, canonical: &str) {
        self.room_nos.remove(canonical);
    }

    // ── Set-level reads ──────────────────────────────────────

    /// Clone out every record handle. Shard locks are released before the
    /// caller starts awaiting individual room locks.
    pub fn snapshot(&self) -> Vec<SharedRoom> {
        self.rooms.iter().map(|e| e.value().clone()).collect()
    }

    /// Owned copies of every room matching `filter`, in no particular order.
    pub async fn filter_rooms(&self, filter: &RoomFilter) -> Vec<Room> {
        let mut out = Vec::new();
        for shared in self.snapshot() {
            let room = shared.read().await;
            if filter.matches(&room) {
                out.push(room.clone());
            }
        }
        out
    }

    /// Count rooms matching `filter`. One independent pass; not consistent
    /// with concurrent writes.
    pub async fn count(&self, filter: &RoomFilter) -> usize {
        let mut n = 0;
        for shared in self.snapshot() {
            if filter.matches(&*shared.read().await) {
                n += 1;
            }
        }
        n
    }

    /// Best fit: the smallest-capacity room matching `filter`. Ties go to
    /// the earliest-created room, ULID ascending as the final tie — a
    /// deterministic but non-contractual order.
    pub async fn find_best_fit(&self, filter: &RoomFilter) -> Option<Ulid> {
        let mut best: Option<(u32, i64, Ulid)> = None;
        for shared in self.snapshot() {
            let room = shared.read().await;
            if !filter.matches(&room) {
                continue;
            }
            let key = (room.capacity, room.created_at, room.id);
            if best.is_none_or(|b| key < b) {
                best = Some(key);
            }
        }
        best.map(|(_, _, id)| id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::canonical_room_no;

    fn shared(room_no: &str, capacity: u32, created_at: i64) -> (Ulid, SharedRoom) {
        let id = Ulid::new();
        let room = Room {
            id,
            room_no: canonical_room_no(room_no),
            capacity,
            has_ac: false,
            has_washroom: false,
            allocation: None,
            created_at,
            updated_at: created_at,
        };
        (id, Arc::new(RwLock::new(room)))
    }

    #[test]
    fn claim_is_exclusive() {
        let store = RoomStore::new();
        let a = Ulid::new();
        let b = Ulid::new();

        store.claim_room_no("A101".into(), a).unwrap();
        assert_eq!(store.claim_room_no("A101".into(), b), Err(a));
        assert_eq!(store.id_for_room_no("A101"), Some(a));

        store.release_room_no("A101");
        store.claim_room_no("A101".into(), b).unwrap();
        assert_eq!(store.id_for_room_no("A101"), Some(b));
    }

    #[tokio::test]
    async fn best_fit_picks_smallest_capacity() {
        let store = RoomStore::new();
        for (no, cap) in [("A", 6u32), ("B", 2), ("C", 4)] {
            let (id, room) = shared(no, cap, 100);
            store.insert(id, room);
        }

        let filter = RoomFilter { min_capacity: Some(3), ..Default::default() };
        let picked = store.find_best_fit(&filter).await.unwrap();
        let room = store.get(&picked).unwrap();
        assert_eq!(room.read().await.capacity, 4);
    }

    #[tokio::test]
    async fn best_fit_tie_goes_to_earliest_created() {
        let store = RoomStore::new();
        let (late_id, late) = shared("LATE", 4, 200);
        let (early_id, early) = shared("EARLY", 4, 100);
        store.insert(late_id, late);
        store.insert(early_id, early);

        let picked = store.find_best_fit(&RoomFilter::default()).await.unwrap();
        assert_eq!(picked, early_id);
    }

    #[tokio::test]
    async fn best_fit_none_when_nothing_matches() {
        let store = RoomStore::new();
        let (id, room) = shared("A", 2, 100);
        store.insert(id, room);

        let filter = RoomFilter { min_capacity: Some(3), ..Default::default() };
        assert_eq!(store.find_best_fit(&filter).await, None);
    }

    #[tokio::test]
    async fn count_matches_filter() {
        let store = RoomStore::new();
        for (no, cap) in [("A", 2u32), ("B", 4), ("C", 6)] {
            let (id, room) = shared(no, cap, 100);
            store.insert(id, room);
        }
        let all = store.count(&RoomFilter::default()).await;
        assert_eq!(all, 3);
        let big = store
            .count(&RoomFilter { min_capacity: Some(4), ..Default::default() })
            .await;
        assert_eq!(big, 2);
    }
}
