use tracing::{debug, info};
use ulid::Ulid;

use crate::limits::MAX_REASON_LEN;
use crate::model::*;
use crate::observability;

use super::availability::now_ms;
use super::permissions::{self, Action};
use super::{statemachine, Engine, EngineError};

impl Engine {
    /// Apply one validated state change. The sequence under the room's
    /// write lock: read current status, consult the state machine, consult
    /// the permission guard, append the WAL event, apply status +
    /// state-specific fields + exactly one log entry. Any failure leaves
    /// the booking untouched.
    pub async fn transition(
        &self,
        booking_id: Ulid,
        target: BookingStatus,
        actor: Actor,
        reason: Option<String>,
    ) -> Result<(), EngineError> {
        if let Some(ref r) = reason
            && r.len() > MAX_REASON_LEN {
                return Err(EngineError::LimitExceeded("reason too long"));
            }

        let (room_id, mut guard) = self.resolve_booking_write(&booking_id).await?;
        let hotel_id = guard.hotel_id;
        let now = now_ms();

        let b = guard
            .booking(booking_id)
            .ok_or(EngineError::NotFound(booking_id))?;
        let from = b.status;

        // Duplicated payment notifications land here: confirming an
        // already-confirmed booking is a no-op success with no log entry.
        if target == BookingStatus::Confirmed && from == BookingStatus::Confirmed {
            debug!("booking {booking_id} already confirmed, treating as no-op");
            return Ok(());
        }

        // Lazy expiry: once the stored deadline lapses, a pending hold
        // accepts nothing but the expiration itself — and expiration is
        // refused while the deadline still stands.
        if from == BookingStatus::Pending {
            let lapsed = b.hold_deadline.is_some_and(|d| d <= now);
            if lapsed && target != BookingStatus::Expired {
                return Err(EngineError::SoftHoldExpired(booking_id));
            }
            if !lapsed && target == BookingStatus::Expired {
                return Err(EngineError::Validation("hold deadline not reached"));
            }
        }

        statemachine::check(from, target)?;
        let action = Action::for_target(target).ok_or(EngineError::InvalidTransition {
            from,
            to: target,
        })?;
        permissions::authorize(&actor, action, b)?;

        let event = Event::Transitioned {
            id: booking_id,
            room_id,
            hotel_id,
            from,
            to: target,
            actor,
            reason,
            at: now,
        };
        self.persist_and_apply(&mut guard, &event).await?;

        metrics::counter!(
            observability::TRANSITIONS_TOTAL,
            "action" => action.as_str()
        )
        .increment(1);
        info!(
            "booking {booking_id}: {} -> {}",
            from.as_str(),
            target.as_str()
        );
        Ok(())
    }

    /// Entry point for payment confirmation events, which the payment
    /// collaborator may deliver more than once. A repeated delivery id is
    /// dropped before it reaches the booking; a redelivery without an id
    /// still lands on the confirm no-op above.
    pub async fn confirm_payment(
        &self,
        booking_id: Ulid,
        payment_ref: &str,
        amount_minor: i64,
        delivery_id: Option<String>,
    ) -> Result<(), EngineError> {
        if let Some(delivery) = delivery_id
            && !self.seen_deliveries.insert(delivery) {
                debug!("duplicate payment delivery for booking {booking_id}, ignoring");
                return Ok(());
            }

        // Price is immutable after creation, so this read cannot race the
        // transition below.
        let booking = self.get_booking(booking_id).await?;
        if booking.price.total_minor != amount_minor {
            return Err(EngineError::Validation("payment amount does not match quoted total"));
        }

        self.transition(
            booking_id,
            BookingStatus::Confirmed,
            Actor::system(),
            Some(format!("payment {payment_ref}")),
        )
        .await
    }
}
