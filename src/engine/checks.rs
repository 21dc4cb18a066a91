use crate::limits::*;
use crate::model::Ms;

use super::EngineError;

pub(crate) fn now_ms() -> Ms {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_millis() as Ms
}

/// Validate a canonical room number: 1..=20 chars after trimming.
pub(crate) fn validate_room_no(canonical: &str) -> Result<(), EngineError> {
    if canonical.is_empty() {
        return Err(EngineError::validation("roomNo", "Room number is required"));
    }
    if canonical.chars().count() > MAX_ROOM_NO_LEN {
        return Err(EngineError::validation(
            "roomNo",
            format!("Room number must be 1-{MAX_ROOM_NO_LEN} characters"),
        ));
    }
    Ok(())
}

pub(crate) fn validate_capacity(capacity: u32) -> Result<(), EngineError> {
    if !(MIN_CAPACITY..=MAX_CAPACITY).contains(&capacity) {
        return Err(EngineError::validation(
            "capacity",
            format!("Capacity must be an integer between {MIN_CAPACITY} and {MAX_CAPACITY}"),
        ));
    }
    Ok(())
}

pub(crate) fn validate_group_name(group: &str) -> Result<(), EngineError> {
    if group.chars().count() > MAX_GROUP_NAME_LEN {
        return Err(EngineError::validation(
            "groupName",
            format!("Group name must be at most {MAX_GROUP_NAME_LEN} characters"),
        ));
    }
    Ok(())
}
