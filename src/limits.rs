//! Hard caps guarding the engine against runaway input. All checked at the
//! mutation boundary and surfaced as `EngineError::LimitExceeded`.

use crate::model::Ms;

pub const MAX_HOTELS: usize = 1024;
pub const MAX_ROOM_TYPES_PER_HOTEL: usize = 256;
pub const MAX_ROOMS_PER_TYPE: usize = 4096;
pub const MAX_RATE_PLANS_PER_HOTEL: usize = 1024;
pub const MAX_BOOKINGS_PER_ROOM: usize = 65_536;

pub const MAX_NAME_LEN: usize = 256;
pub const MAX_REASON_LEN: usize = 1024;

/// Longest bookable stay.
pub const MAX_STAY_NIGHTS: i64 = 365;
/// Furthest-out check-in date accepted, relative to today.
pub const MAX_ADVANCE_DAYS: i64 = 730;

pub const DEFAULT_HOLD_MS: Ms = 15 * 60 * 1000;
pub const MAX_HOLD_MS: Ms = 60 * 60 * 1000;
/// Cap on cumulative `extend_hold` time, so a hold cannot starve a room
/// indefinitely.
pub const MAX_HOLD_EXTENSION_MS: Ms = 30 * 60 * 1000;
