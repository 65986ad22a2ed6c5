use chrono::{NaiveDate, Utc};
use ulid::Ulid;

use crate::model::*;

use super::availability::{now_ms, room_is_free, validate_stay};
use super::{pricing, Engine, EngineError, SharedRoomState};

impl Engine {
    /// Rooms of the given type, in `Available` condition, with no active
    /// booking overlapping the requested range. Pending holds past their
    /// stored deadline do not count, even before the reaper runs.
    pub async fn find_available_rooms(
        &self,
        hotel_id: Ulid,
        room_type_id: Ulid,
        check_in: NaiveDate,
        check_out: NaiveDate,
    ) -> Result<Vec<Ulid>, EngineError> {
        let today = Utc::now().date_naive();
        let stay = validate_stay(check_in, check_out, today)?;
        let owner = self
            .room_types
            .get(&room_type_id)
            .map(|t| t.value().hotel_id)
            .ok_or(EngineError::NotFound(room_type_id))?;
        if owner != hotel_id {
            return Err(EngineError::NotFound(room_type_id));
        }

        let mut candidates = self
            .rooms_by_type
            .get(&room_type_id)
            .map(|v| v.value().clone())
            .unwrap_or_default();
        candidates.sort();

        let now = now_ms();
        let mut free = Vec::new();
        for room_id in candidates {
            let Some(rs) = self.get_room(&room_id) else {
                continue;
            };
            let guard = rs.read().await;
            if room_is_free(&guard, &stay, now) {
                free.push(room_id);
            }
        }
        Ok(free)
    }

    /// Quote a stay without touching any state. Pure given the current
    /// plan set; the engine runs the same computation inside `create_hold`,
    /// so a quote can be verified server-side by re-running it.
    pub fn price_stay(
        &self,
        hotel_id: Ulid,
        room_type_id: Ulid,
        stay: &DateSpan,
        occupancy: &Occupancy,
        today: NaiveDate,
    ) -> Result<PriceBreakdown, EngineError> {
        let hotel = self
            .hotels
            .get(&hotel_id)
            .map(|h| h.value().clone())
            .ok_or(EngineError::NotFound(hotel_id))?;
        let room_type = self
            .room_types
            .get(&room_type_id)
            .map(|t| t.value().clone())
            .ok_or(EngineError::NotFound(room_type_id))?;
        if room_type.hotel_id != hotel_id {
            return Err(EngineError::NotFound(room_type_id));
        }
        let plans = self.plans_for(hotel_id, room_type_id);
        pricing::price_stay(&hotel, &room_type, &plans, stay, occupancy, today)
    }

    pub async fn get_booking(&self, booking_id: Ulid) -> Result<Booking, EngineError> {
        let room_id = self
            .room_for_booking(&booking_id)
            .ok_or(EngineError::NotFound(booking_id))?;
        let rs = self
            .get_room(&room_id)
            .ok_or(EngineError::NotFound(room_id))?;
        let guard = rs.read().await;
        guard
            .booking(booking_id)
            .cloned()
            .ok_or(EngineError::NotFound(booking_id))
    }

    /// The booking's full transition history, oldest first.
    pub async fn booking_history(
        &self,
        booking_id: Ulid,
    ) -> Result<Vec<StateLogEntry>, EngineError> {
        Ok(self.get_booking(booking_id).await?.log)
    }

    pub fn get_hotel(&self, id: Ulid) -> Option<Hotel> {
        self.hotels.get(&id).map(|h| h.value().clone())
    }

    pub fn get_room_type(&self, id: Ulid) -> Option<RoomType> {
        self.room_types.get(&id).map(|t| t.value().clone())
    }

    pub async fn list_rooms(&self, hotel_id: Ulid) -> Vec<RoomInfo> {
        let arcs: Vec<SharedRoomState> =
            self.rooms.iter().map(|e| e.value().clone()).collect();
        let mut rooms = Vec::new();
        for rs in arcs {
            let guard = rs.read().await;
            if guard.hotel_id == hotel_id {
                rooms.push(RoomInfo {
                    id: guard.id,
                    hotel_id: guard.hotel_id,
                    room_type_id: guard.room_type_id,
                    number: guard.number.clone(),
                    condition: guard.condition,
                });
            }
        }
        rooms.sort_by_key(|r| r.id);
        rooms
    }

    pub fn list_rate_plans(&self, hotel_id: Ulid) -> Vec<RatePlan> {
        let mut plans: Vec<RatePlan> = self
            .rate_plans
            .iter()
            .filter(|e| e.value().hotel_id == hotel_id)
            .map(|e| e.value().clone())
            .collect();
        plans.sort_by_key(|p| p.id);
        plans
    }

    /// Plans competing for a hotel + room type, in stable id order.
    pub(super) fn plans_for(&self, hotel_id: Ulid, room_type_id: Ulid) -> Vec<RatePlan> {
        let mut plans: Vec<RatePlan> = self
            .rate_plans
            .iter()
            .filter(|e| {
                e.value().hotel_id == hotel_id && e.value().applies_to(room_type_id)
            })
            .map(|e| e.value().clone())
            .collect();
        plans.sort_by_key(|p| p.id);
        plans
    }
}
