use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::{Engine, EngineError};

impl Engine {
    pub async fn get_room(&self, id: Ulid) -> Result<Room, EngineError> {
        let shared = self.store.get(&id).ok_or(EngineError::NotFound(id))?;
        let room = shared.read().await;
        Ok(room.clone())
    }

    /// Filtered, paginated listing, newest first. `page` is 1-based; `total`
    /// and `total_pages` are computed over the same scan the page is cut
    /// from.
    pub async fn list_rooms(
        &self,
        filter: &RoomFilter,
        page: usize,
        limit: usize,
    ) -> Result<RoomPage, EngineError> {
        if page == 0 {
            return Err(EngineError::validation("page", "page must be a positive integer"));
        }
        if limit == 0 || limit > MAX_PAGE_LIMIT {
            return Err(EngineError::validation(
                "limit",
                format!("limit must be between 1 and {MAX_PAGE_LIMIT}"),
            ));
        }
        if let Some(min) = filter.min_capacity
            && min < MIN_CAPACITY {
                return Err(EngineError::validation(
                    "minCapacity",
                    "minCapacity must be a positive integer",
                ));
            }

        let mut rooms = self.store.filter_rooms(filter).await;
        rooms.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));

        let total = rooms.len();
        let total_pages = total.div_ceil(limit);
        let skip = (page - 1) * limit;
        let rooms = if skip >= total {
            Vec::new()
        } else {
            rooms[skip..(skip + limit).min(total)].to_vec()
        };

        Ok(RoomPage { rooms, total, page, limit, total_pages })
    }

    /// Inventory counters for the dashboard. Four independent count passes;
    /// a momentary mismatch under concurrent writes is acceptable.
    pub async fn stats(&self) -> Stats {
        let total = self.store.count(&RoomFilter::default()).await;
        let allocated = self
            .store
            .count(&RoomFilter { is_allocated: Some(true), ..Default::default() })
            .await;
        let with_ac = self
            .store
            .count(&RoomFilter { has_ac: Some(true), ..Default::default() })
            .await;
        let with_washroom = self
            .store
            .count(&RoomFilter { has_washroom: Some(true), ..Default::default() })
            .await;

        Stats {
            total,
            allocated,
            available: total.saturating_sub(allocated),
            with_ac,
            with_washroom,
        }
    }
}
