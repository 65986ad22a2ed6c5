use chrono::NaiveDate;

use crate::limits::*;
use crate::model::{DateSpan, Ms, RoomCondition, RoomState};

use super::EngineError;

pub(crate) fn now_ms() -> Ms {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_millis() as Ms
}

pub(crate) fn validate_stay(
    check_in: NaiveDate,
    check_out: NaiveDate,
    today: NaiveDate,
) -> Result<DateSpan, EngineError> {
    if check_out <= check_in {
        return Err(EngineError::Validation("check-out must be after check-in"));
    }
    if check_in < today {
        return Err(EngineError::Validation("check-in date is in the past"));
    }
    let span = DateSpan::new(check_in, check_out);
    if span.nights() > MAX_STAY_NIGHTS {
        return Err(EngineError::LimitExceeded("stay too long"));
    }
    if (check_in - today).num_days() > MAX_ADVANCE_DAYS {
        return Err(EngineError::LimitExceeded("check-in too far in the future"));
    }
    Ok(span)
}

/// The room-level no-overlap check. Scans only bookings overlapping `stay`
/// and fails on the first one in the active set — a pending hold whose
/// stored deadline has passed is invisible here even before the reaper
/// flips its status.
pub(crate) fn check_no_conflict(
    rs: &RoomState,
    stay: &DateSpan,
    now: Ms,
) -> Result<(), EngineError> {
    for booking in rs.overlapping(stay) {
        if booking.blocks(now) {
            return Err(EngineError::Conflict(booking.id));
        }
    }
    Ok(())
}

/// Availability: operational condition first, then the conflict scan.
pub(crate) fn room_is_free(rs: &RoomState, stay: &DateSpan, now: Ms) -> bool {
    rs.condition == RoomCondition::Available && check_no_conflict(rs, stay, now).is_ok()
}
