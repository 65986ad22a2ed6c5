use dashmap::DashMap;
use tokio::sync::broadcast;
use ulid::Ulid;

use crate::model::{BookingStatus, Event};

const CHANNEL_CAPACITY: usize = 256;

/// Per-hotel broadcast of committed events. The notification collaborator
/// subscribes here; the engine never formats or sends messages itself.
pub struct NotifyHub {
    channels: DashMap<Ulid, broadcast::Sender<Event>>,
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Subscribe to a hotel's events. Creates the channel if needed.
    pub fn subscribe(&self, hotel_id: Ulid) -> broadcast::Receiver<Event> {
        let sender = self
            .channels
            .entry(hotel_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        sender.subscribe()
    }

    /// Publish a committed event. No-op if nobody is listening.
    pub fn send(&self, hotel_id: Ulid, event: &Event) {
        if let Some(sender) = self.channels.get(&hotel_id) {
            let _ = sender.send(event.clone());
        }
    }
}

/// Logical topic name for a committed event, e.g. `booking.confirmed`.
/// Subscribers route on this rather than matching event payloads.
pub fn topic(event: &Event) -> &'static str {
    match event {
        Event::HotelCreated { .. } => "hotel.created",
        Event::RoomTypeCreated { .. } => "room_type.created",
        Event::RoomCreated { .. } => "room.created",
        Event::RoomConditionChanged { .. } => "room.condition_changed",
        Event::RatePlanCreated { .. } => "rate_plan.created",
        Event::RatePlanRemoved { .. } => "rate_plan.removed",
        Event::HoldOpened { .. } => "booking.held",
        Event::HoldExtended { .. } => "booking.hold_extended",
        Event::Transitioned { to, .. } => match to {
            BookingStatus::Confirmed => "booking.confirmed",
            BookingStatus::CheckedIn => "booking.checked_in",
            BookingStatus::CheckedOut => "booking.checked_out",
            BookingStatus::Cancelled => "booking.cancelled",
            BookingStatus::Expired => "booking.expired",
            BookingStatus::NoShow => "booking.no_show",
            BookingStatus::Pending => "booking.updated",
        },
    }
}
