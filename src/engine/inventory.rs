use std::sync::Arc;

use tokio::sync::RwLock;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::{Engine, EngineError};

impl Engine {
    pub async fn create_hotel(
        &self,
        id: Ulid,
        name: String,
        currency: String,
        tax_bps: u32,
        service_fee_minor: i64,
    ) -> Result<(), EngineError> {
        if self.hotels.len() >= MAX_HOTELS {
            return Err(EngineError::LimitExceeded("too many hotels"));
        }
        if name.is_empty() || name.len() > MAX_NAME_LEN {
            return Err(EngineError::LimitExceeded("hotel name length"));
        }
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(EngineError::Validation("currency must be an ISO 4217 code"));
        }
        if service_fee_minor < 0 {
            return Err(EngineError::Validation("service fee must not be negative"));
        }
        if self.hotels.contains_key(&id) {
            return Err(EngineError::AlreadyExists(id));
        }

        let event = Event::HotelCreated {
            id,
            name: name.clone(),
            currency: currency.clone(),
            tax_bps,
            service_fee_minor,
        };
        self.wal_append(&event).await?;
        self.hotels.insert(
            id,
            Hotel {
                id,
                name,
                currency,
                tax_bps,
                service_fee_minor,
            },
        );
        self.notify.send(id, &event);
        Ok(())
    }

    pub async fn create_room_type(
        &self,
        id: Ulid,
        hotel_id: Ulid,
        name: String,
        base_rate_minor: Option<i64>,
        max_occupancy: u8,
    ) -> Result<(), EngineError> {
        if !self.hotels.contains_key(&hotel_id) {
            return Err(EngineError::NotFound(hotel_id));
        }
        if name.is_empty() || name.len() > MAX_NAME_LEN {
            return Err(EngineError::LimitExceeded("room type name length"));
        }
        if max_occupancy == 0 {
            return Err(EngineError::Validation("max occupancy must be positive"));
        }
        if base_rate_minor.is_some_and(|r| r < 0) {
            return Err(EngineError::Validation("base rate must not be negative"));
        }
        if self.room_types.contains_key(&id) {
            return Err(EngineError::AlreadyExists(id));
        }
        let per_hotel = self
            .room_types
            .iter()
            .filter(|e| e.value().hotel_id == hotel_id)
            .count();
        if per_hotel >= MAX_ROOM_TYPES_PER_HOTEL {
            return Err(EngineError::LimitExceeded("too many room types for hotel"));
        }

        let event = Event::RoomTypeCreated {
            id,
            hotel_id,
            name: name.clone(),
            base_rate_minor,
            max_occupancy,
        };
        self.wal_append(&event).await?;
        self.room_types.insert(
            id,
            RoomType {
                id,
                hotel_id,
                name,
                base_rate_minor,
                max_occupancy,
            },
        );
        self.notify.send(hotel_id, &event);
        Ok(())
    }

    pub async fn create_room(
        &self,
        id: Ulid,
        hotel_id: Ulid,
        room_type_id: Ulid,
        number: String,
    ) -> Result<(), EngineError> {
        let owner = self
            .room_types
            .get(&room_type_id)
            .map(|t| t.value().hotel_id)
            .ok_or(EngineError::NotFound(room_type_id))?;
        if owner != hotel_id {
            return Err(EngineError::NotFound(room_type_id));
        }
        if number.is_empty() || number.len() > MAX_NAME_LEN {
            return Err(EngineError::LimitExceeded("room number length"));
        }
        if self.rooms.contains_key(&id) {
            return Err(EngineError::AlreadyExists(id));
        }
        let siblings = self
            .rooms_by_type
            .get(&room_type_id)
            .map_or(0, |v| v.value().len());
        if siblings >= MAX_ROOMS_PER_TYPE {
            return Err(EngineError::LimitExceeded("too many rooms for type"));
        }

        let event = Event::RoomCreated {
            id,
            hotel_id,
            room_type_id,
            number: number.clone(),
        };
        self.wal_append(&event).await?;
        let rs = RoomState::new(id, hotel_id, room_type_id, number);
        self.rooms.insert(id, Arc::new(RwLock::new(rs)));
        self.rooms_by_type.entry(room_type_id).or_default().push(id);
        self.notify.send(hotel_id, &event);
        Ok(())
    }

    /// Flip a room's operational condition. Existing bookings are
    /// untouched; a non-`Available` room simply stops appearing in
    /// availability from this moment on.
    pub async fn set_room_condition(
        &self,
        room_id: Ulid,
        condition: RoomCondition,
    ) -> Result<(), EngineError> {
        let rs = self
            .get_room(&room_id)
            .ok_or(EngineError::NotFound(room_id))?;
        let mut guard = rs.write_owned().await;
        let event = Event::RoomConditionChanged {
            id: room_id,
            hotel_id: guard.hotel_id,
            condition,
        };
        self.persist_and_apply(&mut guard, &event).await
    }

    pub async fn create_rate_plan(&self, plan: RatePlan) -> Result<(), EngineError> {
        if !self.hotels.contains_key(&plan.hotel_id) {
            return Err(EngineError::NotFound(plan.hotel_id));
        }
        if plan.name.is_empty() || plan.name.len() > MAX_NAME_LEN {
            return Err(EngineError::LimitExceeded("rate plan name length"));
        }
        if plan.valid.check_out <= plan.valid.check_in {
            return Err(EngineError::Validation("rate plan validity range is empty"));
        }
        if plan.nightly_minor < 0 {
            return Err(EngineError::Validation("nightly rate must not be negative"));
        }
        if plan.room_type_ids.is_empty() {
            return Err(EngineError::Validation("rate plan needs at least one room type"));
        }
        for rt_id in &plan.room_type_ids {
            let owner = self
                .room_types
                .get(rt_id)
                .map(|t| t.value().hotel_id)
                .ok_or(EngineError::NotFound(*rt_id))?;
            if owner != plan.hotel_id {
                return Err(EngineError::NotFound(*rt_id));
            }
        }
        if self.rate_plans.contains_key(&plan.id) {
            return Err(EngineError::AlreadyExists(plan.id));
        }
        let per_hotel = self
            .rate_plans
            .iter()
            .filter(|e| e.value().hotel_id == plan.hotel_id)
            .count();
        if per_hotel >= MAX_RATE_PLANS_PER_HOTEL {
            return Err(EngineError::LimitExceeded("too many rate plans for hotel"));
        }

        let event = Event::RatePlanCreated { plan: plan.clone() };
        self.wal_append(&event).await?;
        let hotel_id = plan.hotel_id;
        self.rate_plans.insert(plan.id, plan);
        self.notify.send(hotel_id, &event);
        Ok(())
    }

    pub async fn remove_rate_plan(&self, id: Ulid) -> Result<(), EngineError> {
        let hotel_id = self
            .rate_plans
            .get(&id)
            .map(|p| p.value().hotel_id)
            .ok_or(EngineError::NotFound(id))?;

        let event = Event::RatePlanRemoved { id, hotel_id };
        self.wal_append(&event).await?;
        self.rate_plans.remove(&id);
        self.notify.send(hotel_id, &event);
        Ok(())
    }
}
