//! Hard limits. Everything user-supplied is bounded.

/// Maximum number of rooms in the inventory.
pub const MAX_ROOMS: usize = 10_000;

/// Room numbers are 1..=20 characters after trimming.
pub const MAX_ROOM_NO_LEN: usize = 20;

/// Capacity bounds for a single room.
pub const MIN_CAPACITY: u32 = 1;
pub const MAX_CAPACITY: u32 = 20;

/// Maximum length of a group label on an allocation.
pub const MAX_GROUP_NAME_LEN: usize = 100;

/// Listing page size: default when the caller omits `limit`, and the cap.
pub const DEFAULT_PAGE_LIMIT: usize = 50;
pub const MAX_PAGE_LIMIT: usize = 200;

/// How many times allocate re-runs selection after losing the room it
/// picked to a concurrent caller, before reporting no-room-available.
pub const ALLOCATE_MAX_RETRIES: usize = 5;
