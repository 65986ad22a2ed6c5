//! The authoritative transition table. No other module decides whether a
//! status change is legal.

use crate::model::BookingStatus;

use super::EngineError;

use BookingStatus::*;

/// Every legal `(from, to)` edge. Terminal states have no outgoing edges,
/// and no edge re-enters its own source.
pub const VALID_TRANSITIONS: [(BookingStatus, BookingStatus); 7] = [
    (Pending, Confirmed),
    (Pending, Cancelled),
    (Pending, Expired),
    (Confirmed, CheckedIn),
    (Confirmed, Cancelled),
    (Confirmed, NoShow),
    (CheckedIn, CheckedOut),
];

pub fn is_valid(from: BookingStatus, to: BookingStatus) -> bool {
    VALID_TRANSITIONS.contains(&(from, to))
}

pub fn check(from: BookingStatus, to: BookingStatus) -> Result<(), EngineError> {
    if is_valid(from, to) {
        Ok(())
    } else {
        Err(EngineError::InvalidTransition { from, to })
    }
}
