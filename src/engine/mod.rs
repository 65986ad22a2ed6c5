mod availability;
mod error;
mod holds;
mod inventory;
mod permissions;
pub mod pricing;
mod queries;
pub mod statemachine;
mod transitions;

pub use error::EngineError;
pub use permissions::{authorize, Action};

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::{DashMap, DashSet};
use tokio::sync::{mpsc, oneshot, RwLock};
use ulid::Ulid;

use crate::model::*;
use crate::notify::NotifyHub;
use crate::wal::Wal;

pub type SharedRoomState = Arc<RwLock<RoomState>>;

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

/// Background task owning the WAL. Batches whatever appends are immediately
/// available into one buffered write + fsync, then acks every sender —
/// group commit keeps the fsync count far below the event count under load.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append { event, response } => {
                let mut batch = vec![(event, response)];
                let mut deferred = None;

                loop {
                    match rx.try_recv() {
                        Ok(WalCommand::Append { event, response }) => {
                            batch.push((event, response));
                        }
                        Ok(other) => {
                            // Flush the batch before the non-append command
                            deferred = Some(other);
                            break;
                        }
                        Err(_) => break, // channel drained
                    }
                }

                metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE)
                    .record(batch.len() as f64);
                let started = std::time::Instant::now();
                let result = flush_batch(&mut wal, &mut batch);
                metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
                    .record(started.elapsed().as_secs_f64());
                respond_batch(&mut batch, &result);

                if let Some(cmd) = deferred {
                    handle_non_append(&mut wal, cmd);
                }
            }
            other => handle_non_append(&mut wal, other),
        }
    }
}

fn flush_batch(
    wal: &mut Wal,
    batch: &mut [(Event, oneshot::Sender<io::Result<()>>)],
) -> io::Result<()> {
    let mut append_err: Option<io::Error> = None;
    for (event, _) in batch.iter() {
        if let Err(e) = wal.append_buffered(event) {
            append_err = Some(e);
            break;
        }
    }
    // Flush even on append error so partially buffered bytes don't leak
    // into the next batch (these callers are all told the batch failed).
    let flush_err = wal.flush_sync().err();
    if let Some(e) = append_err {
        return Err(e);
    }
    if let Some(e) = flush_err {
        return Err(e);
    }
    Ok(())
}

fn respond_batch(
    batch: &mut Vec<(Event, oneshot::Sender<io::Result<()>>)>,
    result: &io::Result<()>,
) {
    for (_, tx) in batch.drain(..) {
        let r = match result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_replacement(wal.path(), &events)
                .and_then(|()| wal.adopt_replacement());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { .. } => unreachable!(),
    }
}

// ── Engine ───────────────────────────────────────────────

/// The booking lifecycle engine. All state is in memory, rebuilt from the
/// WAL at startup; every mutation is one WAL event applied under the
/// owning room's write lock.
pub struct Engine {
    pub(super) rooms: DashMap<Ulid, SharedRoomState>,
    pub(super) hotels: DashMap<Ulid, Hotel>,
    pub(super) room_types: DashMap<Ulid, RoomType>,
    pub(super) rate_plans: DashMap<Ulid, RatePlan>,
    /// Room-type id -> room ids, for candidate selection.
    pub(super) rooms_by_type: DashMap<Ulid, Vec<Ulid>>,
    /// Reverse lookup: booking id -> room id.
    pub(super) booking_to_room: DashMap<Ulid, Ulid>,
    /// Payment delivery ids already processed (§ payment dedup).
    pub(super) seen_deliveries: DashSet<String>,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
    pub notify: Arc<NotifyHub>,
}

/// Apply a booking-scoped event to a RoomState. No locking — the caller
/// holds the room's write lock (or sole ownership during replay).
fn apply_to_room(rs: &mut RoomState, event: &Event, index: &DashMap<Ulid, Ulid>) {
    match event {
        Event::HoldOpened { booking } => {
            index.insert(booking.id, booking.room_id);
            rs.insert_booking(booking.clone());
        }
        Event::HoldExtended {
            id,
            new_deadline,
            extended_ms,
            at,
            ..
        } => {
            if let Some(b) = rs.booking_mut(*id) {
                b.hold_deadline = Some(*new_deadline);
                b.hold_extended_ms = *extended_ms;
                b.updated_at = *at;
            }
        }
        Event::Transitioned {
            id,
            from,
            to,
            actor,
            reason,
            at,
            ..
        } => {
            if let Some(b) = rs.booking_mut(*id) {
                b.status = *to;
                b.updated_at = *at;
                match to {
                    BookingStatus::Confirmed => {
                        b.confirmed_at = Some(*at);
                        b.hold_deadline = None;
                    }
                    BookingStatus::Cancelled => {
                        b.cancelled_at = Some(*at);
                        b.cancellation_reason = reason.clone();
                        b.hold_deadline = None;
                    }
                    BookingStatus::Expired => {
                        b.hold_deadline = None;
                    }
                    BookingStatus::CheckedIn => b.checked_in_at = Some(*at),
                    BookingStatus::CheckedOut => b.checked_out_at = Some(*at),
                    BookingStatus::Pending | BookingStatus::NoShow => {}
                }
                b.log.push(StateLogEntry {
                    from: *from,
                    to: *to,
                    actor: *actor,
                    reason: reason.clone(),
                    at: *at,
                });
            }
        }
        Event::RoomConditionChanged { condition, .. } => {
            rs.condition = *condition;
        }
        // Map-level events are handled by inventory mutations and replay
        Event::HotelCreated { .. }
        | Event::RoomTypeCreated { .. }
        | Event::RoomCreated { .. }
        | Event::RatePlanCreated { .. }
        | Event::RatePlanRemoved { .. } => {}
    }
}

impl Engine {
    pub fn new(wal_path: PathBuf, notify: Arc<NotifyHub>) -> io::Result<Self> {
        let events = Wal::replay(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let engine = Self {
            rooms: DashMap::new(),
            hotels: DashMap::new(),
            room_types: DashMap::new(),
            rate_plans: DashMap::new(),
            rooms_by_type: DashMap::new(),
            booking_to_room: DashMap::new(),
            seen_deliveries: DashSet::new(),
            wal_tx,
            notify,
        };

        // Replay. We are the sole owner of every room Arc here, so
        // try_write always succeeds instantly; never block inside what may
        // be an async context.
        for event in &events {
            match event {
                Event::HotelCreated {
                    id,
                    name,
                    currency,
                    tax_bps,
                    service_fee_minor,
                } => {
                    engine.hotels.insert(
                        *id,
                        Hotel {
                            id: *id,
                            name: name.clone(),
                            currency: currency.clone(),
                            tax_bps: *tax_bps,
                            service_fee_minor: *service_fee_minor,
                        },
                    );
                }
                Event::RoomTypeCreated {
                    id,
                    hotel_id,
                    name,
                    base_rate_minor,
                    max_occupancy,
                } => {
                    engine.room_types.insert(
                        *id,
                        RoomType {
                            id: *id,
                            hotel_id: *hotel_id,
                            name: name.clone(),
                            base_rate_minor: *base_rate_minor,
                            max_occupancy: *max_occupancy,
                        },
                    );
                }
                Event::RoomCreated {
                    id,
                    hotel_id,
                    room_type_id,
                    number,
                } => {
                    let rs = RoomState::new(*id, *hotel_id, *room_type_id, number.clone());
                    engine.rooms.insert(*id, Arc::new(RwLock::new(rs)));
                    engine.rooms_by_type.entry(*room_type_id).or_default().push(*id);
                }
                Event::RatePlanCreated { plan } => {
                    engine.rate_plans.insert(plan.id, plan.clone());
                }
                Event::RatePlanRemoved { id, .. } => {
                    engine.rate_plans.remove(id);
                }
                other => {
                    let room_id = match other {
                        Event::HoldOpened { booking } => Some(booking.room_id),
                        Event::HoldExtended { room_id, .. }
                        | Event::Transitioned { room_id, .. }
                        | Event::RoomConditionChanged { id: room_id, .. } => Some(*room_id),
                        _ => None,
                    };
                    if let Some(room_id) = room_id
                        && let Some(entry) = engine.rooms.get(&room_id) {
                            let rs_arc = entry.clone();
                            let mut guard = rs_arc.try_write().expect("replay: uncontended write");
                            apply_to_room(&mut guard, other, &engine.booking_to_room);
                        }
                }
            }
        }

        Ok(engine)
    }

    /// Write an event to the WAL via the group-commit writer.
    pub(super) async fn wal_append(&self, event: &Event) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    pub fn get_room(&self, id: &Ulid) -> Option<SharedRoomState> {
        self.rooms.get(id).map(|e| e.value().clone())
    }

    pub fn room_for_booking(&self, booking_id: &Ulid) -> Option<Ulid> {
        self.booking_to_room.get(booking_id).map(|e| *e.value())
    }

    /// WAL-append + apply + notify in one call. The WAL write commits
    /// first; on failure the in-memory state is untouched, which makes the
    /// audit record and the state change one unit.
    pub(super) async fn persist_and_apply(
        &self,
        rs: &mut RoomState,
        event: &Event,
    ) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        apply_to_room(rs, event, &self.booking_to_room);
        self.notify.send(event.hotel_id(), event);
        Ok(())
    }

    /// Booking id -> owning room, write-locked.
    pub(super) async fn resolve_booking_write(
        &self,
        booking_id: &Ulid,
    ) -> Result<(Ulid, tokio::sync::OwnedRwLockWriteGuard<RoomState>), EngineError> {
        let room_id = self
            .room_for_booking(booking_id)
            .ok_or(EngineError::NotFound(*booking_id))?;
        let rs = self
            .get_room(&room_id)
            .ok_or(EngineError::NotFound(room_id))?;
        let guard = rs.write_owned().await;
        Ok((room_id, guard))
    }

    /// Rewrite the WAL to the minimal event set recreating current state.
    /// Bookings are re-emitted as full snapshots (status + transition log
    /// intact), so terminal bookings keep their audit history across
    /// compactions.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        let mut events = Vec::new();

        for entry in self.hotels.iter() {
            let h = entry.value();
            events.push(Event::HotelCreated {
                id: h.id,
                name: h.name.clone(),
                currency: h.currency.clone(),
                tax_bps: h.tax_bps,
                service_fee_minor: h.service_fee_minor,
            });
        }
        for entry in self.room_types.iter() {
            let rt = entry.value();
            events.push(Event::RoomTypeCreated {
                id: rt.id,
                hotel_id: rt.hotel_id,
                name: rt.name.clone(),
                base_rate_minor: rt.base_rate_minor,
                max_occupancy: rt.max_occupancy,
            });
        }
        for entry in self.rate_plans.iter() {
            events.push(Event::RatePlanCreated {
                plan: entry.value().clone(),
            });
        }
        let room_arcs: Vec<SharedRoomState> =
            self.rooms.iter().map(|e| e.value().clone()).collect();
        for rs_arc in room_arcs {
            let guard = rs_arc.read().await;
            events.push(Event::RoomCreated {
                id: guard.id,
                hotel_id: guard.hotel_id,
                room_type_id: guard.room_type_id,
                number: guard.number.clone(),
            });
            if guard.condition != RoomCondition::Available {
                events.push(Event::RoomConditionChanged {
                    id: guard.id,
                    hotel_id: guard.hotel_id,
                    condition: guard.condition,
                });
            }
            for booking in &guard.bookings {
                events.push(Event::HoldOpened {
                    booking: booking.clone(),
                });
            }
        }

        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
