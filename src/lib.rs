//! innkeep — the booking lifecycle engine.
//!
//! Turns a guest's date-range request into a durably reserved, priced,
//! non-conflicting room assignment, and governs every later status change
//! (confirm, check-in, check-out, cancel, no-show, expire) under role-based
//! authorization. State lives in memory behind per-room locks and is
//! rebuilt from an append-only WAL at startup; the HTTP/RPC layer, auth,
//! and notification delivery are external collaborators.

pub mod engine;
pub mod limits;
pub mod model;
pub mod notify;
pub mod observability;
pub mod reaper;
pub mod wal;

pub use engine::{Engine, EngineError};
pub use model::{
    Actor, Booking, BookingStatus, DateSpan, HoldReceipt, HoldRequest, Role, RoomCondition,
};
