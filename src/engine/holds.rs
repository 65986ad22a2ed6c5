use chrono::Utc;
use tracing::debug;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;
use crate::observability;

use super::availability::{check_no_conflict, now_ms, validate_stay};
use super::{pricing, Engine, EngineError};

impl Engine {
    /// Place a soft hold: price the stay, then claim the first candidate
    /// room of the type that has no conflicting active booking.
    ///
    /// The conflict check and the booking insert happen under the room's
    /// write lock, so two racing holds for the same room serialize and the
    /// loser sees the winner's booking. A `Conflict` is retried against the
    /// remaining candidates; only after exhausting them all does the call
    /// surface `NoAvailability`.
    pub async fn create_hold(&self, req: HoldRequest) -> Result<HoldReceipt, EngineError> {
        let today = Utc::now().date_naive();
        let stay = validate_stay(req.check_in, req.check_out, today)?;
        let occupancy = Occupancy {
            adults: req.adults,
            children: req.children,
        };
        let hold_ms = req.hold_ms.unwrap_or(DEFAULT_HOLD_MS);
        if hold_ms <= 0 || hold_ms > MAX_HOLD_MS {
            return Err(EngineError::Validation("hold duration out of range"));
        }

        let hotel = self
            .hotels
            .get(&req.hotel_id)
            .map(|h| h.value().clone())
            .ok_or(EngineError::NotFound(req.hotel_id))?;
        let room_type = self
            .room_types
            .get(&req.room_type_id)
            .map(|t| t.value().clone())
            .ok_or(EngineError::NotFound(req.room_type_id))?;
        if room_type.hotel_id != hotel.id {
            return Err(EngineError::NotFound(req.room_type_id));
        }

        let plans = self.plans_for(req.hotel_id, req.room_type_id);
        let price = pricing::price_stay(&hotel, &room_type, &plans, &stay, &occupancy, today)?;

        // Ascending room-id order keeps assignment deterministic.
        let mut candidates = self
            .rooms_by_type
            .get(&req.room_type_id)
            .map(|v| v.value().clone())
            .unwrap_or_default();
        candidates.sort();

        for room_id in candidates {
            let Some(rs) = self.get_room(&room_id) else {
                continue;
            };
            let mut guard = rs.write_owned().await;
            if guard.condition != RoomCondition::Available {
                continue;
            }
            if guard.bookings.len() >= MAX_BOOKINGS_PER_ROOM {
                return Err(EngineError::LimitExceeded("too many bookings on room"));
            }

            let now = now_ms();
            match check_no_conflict(&guard, &stay, now) {
                Ok(()) => {}
                Err(EngineError::Conflict(winner)) => {
                    metrics::counter!(observability::HOLD_RETRIES_TOTAL).increment(1);
                    debug!("room {room_id} taken by {winner}, trying next candidate");
                    continue;
                }
                Err(e) => return Err(e),
            }

            let id = Ulid::new();
            let deadline = now + hold_ms;
            let booking = Booking {
                id,
                hotel_id: req.hotel_id,
                room_type_id: req.room_type_id,
                room_id,
                guest_id: req.guest_id,
                stay,
                occupancy,
                status: BookingStatus::Pending,
                price: price.clone(),
                hold_deadline: Some(deadline),
                hold_extended_ms: 0,
                confirmation_code: confirmation_code(&id),
                cancellation_reason: None,
                created_at: now,
                updated_at: now,
                confirmed_at: None,
                checked_in_at: None,
                checked_out_at: None,
                cancelled_at: None,
                log: Vec::new(),
            };
            let code = booking.confirmation_code.clone();
            let event = Event::HoldOpened { booking };
            self.persist_and_apply(&mut guard, &event).await?;
            metrics::counter!(observability::HOLDS_CREATED_TOTAL).increment(1);

            return Ok(HoldReceipt {
                booking_id: id,
                confirmation_code: code,
                price,
                hold_deadline: deadline,
            });
        }

        metrics::counter!(observability::NO_AVAILABILITY_TOTAL).increment(1);
        Err(EngineError::NoAvailability)
    }

    /// Push the hold deadline out. Valid only while the booking is pending
    /// and its stored deadline has not passed — the deadline is read under
    /// the same lock the reaper expires through, so the extend/expire race
    /// resolves on the stored value, not on caller wall clocks.
    pub async fn extend_hold(&self, booking_id: Ulid, additional_ms: Ms) -> Result<Ms, EngineError> {
        if additional_ms <= 0 {
            return Err(EngineError::Validation("extension must be positive"));
        }
        let (room_id, mut guard) = self.resolve_booking_write(&booking_id).await?;
        let hotel_id = guard.hotel_id;
        let now = now_ms();

        let b = guard
            .booking(booking_id)
            .ok_or(EngineError::NotFound(booking_id))?;
        if b.status != BookingStatus::Pending {
            return Err(EngineError::SoftHoldExpired(booking_id));
        }
        let Some(deadline) = b.hold_deadline else {
            return Err(EngineError::SoftHoldExpired(booking_id));
        };
        if deadline <= now {
            return Err(EngineError::SoftHoldExpired(booking_id));
        }
        let cumulative = b.hold_extended_ms + additional_ms;
        if cumulative > MAX_HOLD_EXTENSION_MS {
            return Err(EngineError::LimitExceeded("hold extension cap reached"));
        }

        let new_deadline = deadline + additional_ms;
        let event = Event::HoldExtended {
            id: booking_id,
            room_id,
            hotel_id,
            new_deadline,
            extended_ms: cumulative,
            at: now,
        };
        self.persist_and_apply(&mut guard, &event).await?;
        Ok(new_deadline)
    }

    /// Explicit guest abandonment: `pending -> cancelled` right away.
    /// Distinct from timeout-driven expiration so the audit log tells the
    /// two apart.
    pub async fn release_hold(&self, booking_id: Ulid, actor: Actor) -> Result<(), EngineError> {
        self.transition(
            booking_id,
            BookingStatus::Cancelled,
            actor,
            Some("hold released".into()),
        )
        .await
    }

    /// Pending bookings whose deadline has lapsed at `now`. Rooms whose
    /// lock is momentarily held are skipped — the next reaper pass picks
    /// them up.
    pub fn collect_expired_holds(&self, now: Ms) -> Vec<Ulid> {
        let mut expired = Vec::new();
        for entry in self.rooms.iter() {
            let rs = entry.value().clone();
            if let Ok(guard) = rs.try_read() {
                for b in &guard.bookings {
                    if b.status == BookingStatus::Pending
                        && b.hold_deadline.is_some_and(|d| d <= now)
                    {
                        expired.push(b.id);
                    }
                }
            }
        }
        expired
    }
}
