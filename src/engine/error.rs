use chrono::NaiveDate;
use ulid::Ulid;

use crate::model::BookingStatus;

use super::permissions::Action;

/// The closed set of failures the engine surfaces. Callers match on the
/// variant; nothing here is a panic or a stringly-typed code.
#[derive(Debug)]
pub enum EngineError {
    /// Booking, hotel, room type, or room does not exist.
    NotFound(Ulid),
    AlreadyExists(Ulid),
    /// The state machine has no edge `from -> to`.
    InvalidTransition {
        from: BookingStatus,
        to: BookingStatus,
    },
    PermissionDenied {
        action: Action,
        booking_id: Ulid,
    },
    /// No room of the requested type is free for the requested dates.
    NoAvailability,
    /// A night in the stay has no eligible rate and no base rate, or the
    /// winning plan's restrictions reject the stay.
    PricingUnavailable {
        date: NaiveDate,
        detail: &'static str,
    },
    /// Hold extension or transition attempted after the stored deadline.
    SoftHoldExpired(Ulid),
    /// Malformed input, rejected before any state is touched.
    Validation(&'static str),
    /// Another active booking occupies the room for an overlapping range.
    /// Retryable: the Soft-Hold Manager tries the next candidate room.
    Conflict(Ulid),
    LimitExceeded(&'static str),
    WalError(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::NotFound(id) => write!(f, "not found: {id}"),
            EngineError::AlreadyExists(id) => write!(f, "already exists: {id}"),
            EngineError::InvalidTransition { from, to } => {
                write!(f, "invalid transition: {} -> {}", from.as_str(), to.as_str())
            }
            EngineError::PermissionDenied { action, booking_id } => {
                write!(f, "permission denied: {} on booking {booking_id}", action.as_str())
            }
            EngineError::NoAvailability => write!(f, "no room available for the requested dates"),
            EngineError::PricingUnavailable { date, detail } => {
                write!(f, "no price for night {date}: {detail}")
            }
            EngineError::SoftHoldExpired(id) => write!(f, "hold expired: {id}"),
            EngineError::Validation(msg) => write!(f, "validation: {msg}"),
            EngineError::Conflict(id) => write!(f, "conflict with booking: {id}"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::WalError(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}
