//! Role-based authorization: one explicit rule per action, no ad hoc
//! boolean checks elsewhere in the engine.

use serde::{Deserialize, Serialize};

use crate::model::{Actor, Booking, BookingStatus, Role};

use super::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    Confirm,
    CheckIn,
    CheckOut,
    MarkNoShow,
    Cancel,
    /// Reaper-only: drive a lapsed hold to `Expired`.
    Expire,
}

impl Action {
    /// The action implied by a transition target. Every reachable target
    /// state maps to exactly one action; `Pending` has no inbound edges.
    pub fn for_target(to: BookingStatus) -> Option<Action> {
        match to {
            BookingStatus::Confirmed => Some(Action::Confirm),
            BookingStatus::CheckedIn => Some(Action::CheckIn),
            BookingStatus::CheckedOut => Some(Action::CheckOut),
            BookingStatus::NoShow => Some(Action::MarkNoShow),
            BookingStatus::Cancelled => Some(Action::Cancel),
            BookingStatus::Expired => Some(Action::Expire),
            BookingStatus::Pending => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Confirm => "confirm",
            Action::CheckIn => "check_in",
            Action::CheckOut => "check_out",
            Action::MarkNoShow => "mark_no_show",
            Action::Cancel => "cancel",
            Action::Expire => "expire",
        }
    }
}

/// Whether a Staff/Owner actor is scoped to the booking's hotel.
fn scoped_to_hotel(actor: &Actor, booking: &Booking) -> bool {
    actor.hotel_id == Some(booking.hotel_id)
}

/// The rule table:
/// - `Confirm`/`CheckIn`/`CheckOut`/`MarkNoShow`: staff-or-above scoped to
///   the booking's hotel.
/// - `Cancel`: the same, or the guest who owns the booking.
/// - `Expire`: the system actor only.
/// - `Admin` and `System` pass every hotel-scoped check.
///
/// Denials carry the action and booking id, nothing about other guests.
pub fn authorize(actor: &Actor, action: Action, booking: &Booking) -> Result<(), EngineError> {
    let allowed = match action {
        Action::Expire => actor.role == Role::System,
        Action::Confirm | Action::CheckIn | Action::CheckOut | Action::MarkNoShow => {
            match actor.role {
                Role::Admin | Role::System => true,
                Role::Staff | Role::Owner => scoped_to_hotel(actor, booking),
                Role::Guest => false,
            }
        }
        Action::Cancel => match actor.role {
            Role::Admin | Role::System => true,
            Role::Staff | Role::Owner => scoped_to_hotel(actor, booking),
            Role::Guest => booking.guest_id == Some(actor.id),
        },
    };

    if allowed {
        Ok(())
    } else {
        Err(EngineError::PermissionDenied {
            action,
            booking_id: booking.id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{confirmation_code, DateSpan, Occupancy, PriceBreakdown};
    use chrono::NaiveDate;
    use ulid::Ulid;

    fn booking(hotel_id: Ulid, guest_id: Option<Ulid>) -> Booking {
        let id = Ulid::new();
        Booking {
            id,
            hotel_id,
            room_type_id: Ulid::new(),
            room_id: Ulid::new(),
            guest_id,
            stay: DateSpan::new(
                NaiveDate::from_ymd_opt(2025, 6, 10).unwrap(),
                NaiveDate::from_ymd_opt(2025, 6, 12).unwrap(),
            ),
            occupancy: Occupancy { adults: 1, children: 0 },
            status: BookingStatus::Pending,
            price: PriceBreakdown {
                currency: "USD".into(),
                nights: vec![],
                subtotal_minor: 0,
                tax_minor: 0,
                fees_minor: 0,
                total_minor: 0,
            },
            hold_deadline: None,
            hold_extended_ms: 0,
            confirmation_code: confirmation_code(&id),
            cancellation_reason: None,
            created_at: 0,
            updated_at: 0,
            confirmed_at: None,
            checked_in_at: None,
            checked_out_at: None,
            cancelled_at: None,
            log: Vec::new(),
        }
    }

    #[test]
    fn staff_scoped_to_own_hotel() {
        let hotel = Ulid::new();
        let b = booking(hotel, None);
        let staff = Actor::staff(Ulid::new(), hotel);
        for action in [Action::Confirm, Action::CheckIn, Action::CheckOut, Action::MarkNoShow, Action::Cancel] {
            assert!(authorize(&staff, action, &b).is_ok());
        }
    }

    #[test]
    fn staff_of_other_hotel_denied() {
        let b = booking(Ulid::new(), None);
        let other = Actor::staff(Ulid::new(), Ulid::new());
        let err = authorize(&other, Action::Confirm, &b).unwrap_err();
        assert!(matches!(err, EngineError::PermissionDenied { action: Action::Confirm, booking_id } if booking_id == b.id));
    }

    #[test]
    fn guest_may_cancel_own_booking_only() {
        let guest_id = Ulid::new();
        let own = booking(Ulid::new(), Some(guest_id));
        let guest = Actor::guest(guest_id);
        assert!(authorize(&guest, Action::Cancel, &own).is_ok());

        let someone_elses = booking(Ulid::new(), Some(Ulid::new()));
        assert!(authorize(&guest, Action::Cancel, &someone_elses).is_err());

        // Anonymous hold: no owner, so no guest may cancel it
        let anonymous = booking(Ulid::new(), None);
        assert!(authorize(&guest, Action::Cancel, &anonymous).is_err());
    }

    #[test]
    fn guest_never_confirms_or_checks_in() {
        let guest_id = Ulid::new();
        let own = booking(Ulid::new(), Some(guest_id));
        let guest = Actor::guest(guest_id);
        for action in [Action::Confirm, Action::CheckIn, Action::CheckOut, Action::MarkNoShow] {
            assert!(authorize(&guest, action, &own).is_err());
        }
    }

    #[test]
    fn expire_is_system_only() {
        let hotel = Ulid::new();
        let b = booking(hotel, None);
        assert!(authorize(&Actor::system(), Action::Expire, &b).is_ok());

        let admin = Actor { id: Ulid::new(), role: Role::Admin, hotel_id: None };
        assert!(authorize(&admin, Action::Expire, &b).is_err());
        let staff = Actor::staff(Ulid::new(), hotel);
        assert!(authorize(&staff, Action::Expire, &b).is_err());
    }

    #[test]
    fn admin_passes_hotel_scope() {
        let b = booking(Ulid::new(), None);
        let admin = Actor { id: Ulid::new(), role: Role::Admin, hotel_id: None };
        assert!(authorize(&admin, Action::Confirm, &b).is_ok());
        assert!(authorize(&admin, Action::Cancel, &b).is_ok());
    }

    #[test]
    fn owner_scoped_like_staff() {
        let hotel = Ulid::new();
        let b = booking(hotel, None);
        let owner = Actor { id: Ulid::new(), role: Role::Owner, hotel_id: Some(hotel) };
        assert!(authorize(&owner, Action::MarkNoShow, &b).is_ok());
        let stray = Actor { id: Ulid::new(), role: Role::Owner, hotel_id: Some(Ulid::new()) };
        assert!(authorize(&stray, Action::MarkNoShow, &b).is_err());
    }
}
