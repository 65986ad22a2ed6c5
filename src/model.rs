use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unix milliseconds — the only wall-clock type.
pub type Ms = i64;

/// Half-open date interval `[check_in, check_out)`. A one-night stay
/// checking in on the 10th has `check_out` on the 11th.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateSpan {
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
}

impl DateSpan {
    pub fn new(check_in: NaiveDate, check_out: NaiveDate) -> Self {
        debug_assert!(check_in < check_out, "DateSpan check_in must precede check_out");
        Self { check_in, check_out }
    }

    pub fn nights(&self) -> i64 {
        (self.check_out - self.check_in).num_days()
    }

    /// Two half-open ranges `[a,b)` and `[c,d)` overlap iff `a < d && c < b`.
    pub fn overlaps(&self, other: &DateSpan) -> bool {
        self.check_in < other.check_out && other.check_in < self.check_out
    }

    pub fn contains_date(&self, date: NaiveDate) -> bool {
        self.check_in <= date && date < self.check_out
    }

    /// Every night of the stay: `check_in` up to but excluding `check_out`.
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.check_in.iter_days().take_while(|d| *d < self.check_out)
    }
}

// ── Actors ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Guest,
    Staff,
    Owner,
    Admin,
    /// Internal actor for the reaper and payment-event plumbing.
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: Ulid,
    pub role: Role,
    /// Hotel scope for Staff and Owner. Ignored for other roles.
    pub hotel_id: Option<Ulid>,
}

impl Actor {
    pub fn system() -> Self {
        Self {
            id: Ulid::nil(),
            role: Role::System,
            hotel_id: None,
        }
    }

    pub fn guest(id: Ulid) -> Self {
        Self {
            id,
            role: Role::Guest,
            hotel_id: None,
        }
    }

    pub fn staff(id: Ulid, hotel_id: Ulid) -> Self {
        Self {
            id,
            role: Role::Staff,
            hotel_id: Some(hotel_id),
        }
    }
}

// ── Booking lifecycle ────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BookingStatus {
    Pending,
    Confirmed,
    CheckedIn,
    CheckedOut,
    Cancelled,
    Expired,
    NoShow,
}

impl BookingStatus {
    /// Terminal statuses accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BookingStatus::CheckedOut
                | BookingStatus::Cancelled
                | BookingStatus::Expired
                | BookingStatus::NoShow
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::CheckedIn => "checked_in",
            BookingStatus::CheckedOut => "checked_out",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Expired => "expired",
            BookingStatus::NoShow => "no_show",
        }
    }
}

/// One realized status change. Append-only: entries are never rewritten.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateLogEntry {
    pub from: BookingStatus,
    pub to: BookingStatus,
    pub actor: Actor,
    pub reason: Option<String>,
    pub at: Ms,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occupancy {
    pub adults: u8,
    pub children: u8,
}

impl Occupancy {
    pub fn total(&self) -> u8 {
        self.adults.saturating_add(self.children)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Ulid,
    pub hotel_id: Ulid,
    pub room_type_id: Ulid,
    pub room_id: Ulid,
    /// Absent for anonymous holds.
    pub guest_id: Option<Ulid>,
    pub stay: DateSpan,
    pub occupancy: Occupancy,
    pub status: BookingStatus,
    pub price: PriceBreakdown,
    /// Present only while `Pending`.
    pub hold_deadline: Option<Ms>,
    /// Cumulative extension applied so far, bounded by `limits::MAX_HOLD_EXTENSION_MS`.
    pub hold_extended_ms: Ms,
    /// Assigned once at creation, immutable afterwards.
    pub confirmation_code: String,
    pub cancellation_reason: Option<String>,
    pub created_at: Ms,
    pub updated_at: Ms,
    pub confirmed_at: Option<Ms>,
    pub checked_in_at: Option<Ms>,
    pub checked_out_at: Option<Ms>,
    pub cancelled_at: Option<Ms>,
    pub log: Vec<StateLogEntry>,
}

impl Booking {
    /// Whether this booking counts toward the no-overlap invariant at `now`.
    /// A pending hold past its stored deadline is inactive even before the
    /// reaper flips its status.
    pub fn blocks(&self, now: Ms) -> bool {
        match self.status {
            BookingStatus::Confirmed | BookingStatus::CheckedIn => true,
            BookingStatus::Pending => self.hold_deadline.is_some_and(|d| d > now),
            _ => false,
        }
    }
}

/// Confirmation codes are the tail of the booking ULID: unique per booking,
/// derivable without extra state, and safe to read over the phone.
pub fn confirmation_code(booking_id: &Ulid) -> String {
    let s = booking_id.to_string();
    s[s.len() - 8..].to_string()
}

// ── Inventory ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hotel {
    pub id: Ulid,
    pub name: String,
    /// ISO 4217 code; all amounts for this hotel are minor units of it.
    pub currency: String,
    /// Tax applied to the subtotal, in basis points (750 = 7.5%).
    pub tax_bps: u32,
    /// Flat per-stay service fee in minor units.
    pub service_fee_minor: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomType {
    pub id: Ulid,
    pub hotel_id: Ulid,
    pub name: String,
    /// Fallback nightly rate when no rate plan covers a night.
    pub base_rate_minor: Option<i64>,
    pub max_occupancy: u8,
}

/// Operational status, independent of booking status. Anything other than
/// `Available` removes the room from availability regardless of bookings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomCondition {
    Available,
    Maintenance,
    Blocked,
}

/// Per-room state: the unit of locking. `bookings` is sorted by
/// `stay.check_in` and retains terminal bookings for history.
#[derive(Debug, Clone)]
pub struct RoomState {
    pub id: Ulid,
    pub hotel_id: Ulid,
    pub room_type_id: Ulid,
    pub number: String,
    pub condition: RoomCondition,
    pub bookings: Vec<Booking>,
}

impl RoomState {
    pub fn new(id: Ulid, hotel_id: Ulid, room_type_id: Ulid, number: String) -> Self {
        Self {
            id,
            hotel_id,
            room_type_id,
            number,
            condition: RoomCondition::Available,
            bookings: Vec::new(),
        }
    }

    /// Insert keeping sort order by check-in date.
    pub fn insert_booking(&mut self, booking: Booking) {
        let pos = self
            .bookings
            .binary_search_by_key(&booking.stay.check_in, |b| b.stay.check_in)
            .unwrap_or_else(|e| e);
        self.bookings.insert(pos, booking);
    }

    pub fn booking(&self, id: Ulid) -> Option<&Booking> {
        self.bookings.iter().find(|b| b.id == id)
    }

    pub fn booking_mut(&mut self, id: Ulid) -> Option<&mut Booking> {
        self.bookings.iter_mut().find(|b| b.id == id)
    }

    /// Only bookings whose stay overlaps the query window. Binary search
    /// skips everything checking in at or after `query.check_out`.
    pub fn overlapping(&self, query: &DateSpan) -> impl Iterator<Item = &Booking> {
        let right_bound = self
            .bookings
            .partition_point(|b| b.stay.check_in < query.check_out);
        self.bookings[..right_bound]
            .iter()
            .filter(move |b| b.stay.check_out > query.check_in)
    }
}

// ── Rate plans ───────────────────────────────────────────────────

/// A pricing rule competing for each night of a stay. Among plans valid for
/// the same night, priority decides; ties break on restriction count, then
/// nightly price, then id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatePlan {
    pub id: Ulid,
    pub hotel_id: Ulid,
    pub room_type_ids: Vec<Ulid>,
    pub name: String,
    /// Nights on which this plan may price, half-open.
    pub valid: DateSpan,
    /// Higher wins.
    pub priority: i32,
    pub nightly_minor: i64,
    pub min_stay_nights: Option<u16>,
    pub max_stay_nights: Option<u16>,
    /// Bitmask of applicable weekdays, bit 0 = Monday. `None` = every day.
    pub days_of_week: Option<u8>,
    pub min_advance_days: Option<u16>,
    pub max_advance_days: Option<u16>,
    pub refundable: bool,
}

pub fn weekday_bit(day: Weekday) -> u8 {
    1 << (day.num_days_from_monday() as u8)
}

impl RatePlan {
    pub fn applies_to(&self, room_type_id: Ulid) -> bool {
        self.room_type_ids.contains(&room_type_id)
    }

    /// Validity window plus day-of-week gate for one night.
    pub fn applicable_on(&self, date: NaiveDate) -> bool {
        if !self.valid.contains_date(date) {
            return false;
        }
        match self.days_of_week {
            Some(mask) => mask & weekday_bit(date.weekday()) != 0,
            None => true,
        }
    }

    /// How many restriction predicates are declared — the tie-break after
    /// priority: the most specific plan wins.
    pub fn restriction_count(&self) -> u32 {
        self.min_stay_nights.is_some() as u32
            + self.max_stay_nights.is_some() as u32
            + self.days_of_week.is_some() as u32
            + self.min_advance_days.is_some() as u32
            + self.max_advance_days.is_some() as u32
    }
}

// ── WAL events ───────────────────────────────────────────────────

/// The durable record format: every committed mutation is one event.
/// `HoldOpened` carries the full booking row, so WAL compaction re-emits it
/// as a snapshot with the booking's current status and transition log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    HotelCreated {
        id: Ulid,
        name: String,
        currency: String,
        tax_bps: u32,
        service_fee_minor: i64,
    },
    RoomTypeCreated {
        id: Ulid,
        hotel_id: Ulid,
        name: String,
        base_rate_minor: Option<i64>,
        max_occupancy: u8,
    },
    RoomCreated {
        id: Ulid,
        hotel_id: Ulid,
        room_type_id: Ulid,
        number: String,
    },
    RoomConditionChanged {
        id: Ulid,
        hotel_id: Ulid,
        condition: RoomCondition,
    },
    RatePlanCreated {
        plan: RatePlan,
    },
    RatePlanRemoved {
        id: Ulid,
        hotel_id: Ulid,
    },
    HoldOpened {
        booking: Booking,
    },
    HoldExtended {
        id: Ulid,
        room_id: Ulid,
        hotel_id: Ulid,
        new_deadline: Ms,
        extended_ms: Ms,
        at: Ms,
    },
    Transitioned {
        id: Ulid,
        room_id: Ulid,
        hotel_id: Ulid,
        from: BookingStatus,
        to: BookingStatus,
        actor: Actor,
        reason: Option<String>,
        at: Ms,
    },
}

impl Event {
    pub fn hotel_id(&self) -> Ulid {
        match self {
            Event::HotelCreated { id, .. } => *id,
            Event::RoomTypeCreated { hotel_id, .. }
            | Event::RoomCreated { hotel_id, .. }
            | Event::RoomConditionChanged { hotel_id, .. }
            | Event::RatePlanRemoved { hotel_id, .. }
            | Event::HoldExtended { hotel_id, .. }
            | Event::Transitioned { hotel_id, .. } => *hotel_id,
            Event::RatePlanCreated { plan } => plan.hotel_id,
            Event::HoldOpened { booking } => booking.hotel_id,
        }
    }
}

// ── Operation payloads ───────────────────────────────────────────

/// Inbound booking request, as marshalled by the (external) API layer.
#[derive(Debug, Clone)]
pub struct HoldRequest {
    pub hotel_id: Ulid,
    pub room_type_id: Ulid,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub adults: u8,
    pub children: u8,
    pub guest_id: Option<Ulid>,
    /// Hold duration override; `limits::DEFAULT_HOLD_MS` when absent.
    pub hold_ms: Option<Ms>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoldReceipt {
    pub booking_id: Ulid,
    pub confirmation_code: String,
    pub price: PriceBreakdown,
    pub hold_deadline: Ms,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NightCharge {
    pub date: NaiveDate,
    /// `None` means the room type's base rate priced this night.
    pub rate_plan_id: Option<Ulid>,
    pub amount_minor: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub currency: String,
    pub nights: Vec<NightCharge>,
    pub subtotal_minor: i64,
    pub tax_minor: i64,
    pub fees_minor: i64,
    pub total_minor: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomInfo {
    pub id: Ulid,
    pub hotel_id: Ulid,
    pub room_type_id: Ulid,
    pub number: String,
    pub condition: RoomCondition,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn span_basics() {
        let s = DateSpan::new(d(2025, 6, 10), d(2025, 6, 13));
        assert_eq!(s.nights(), 3);
        assert!(s.contains_date(d(2025, 6, 10)));
        assert!(s.contains_date(d(2025, 6, 12)));
        assert!(!s.contains_date(d(2025, 6, 13))); // half-open
        let dates: Vec<_> = s.dates().collect();
        assert_eq!(dates, vec![d(2025, 6, 10), d(2025, 6, 11), d(2025, 6, 12)]);
    }

    #[test]
    fn span_overlap() {
        let a = DateSpan::new(d(2025, 6, 10), d(2025, 6, 13));
        let b = DateSpan::new(d(2025, 6, 12), d(2025, 6, 15));
        let c = DateSpan::new(d(2025, 6, 13), d(2025, 6, 16));
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c)); // back-to-back, not overlapping
    }

    #[test]
    fn status_terminality() {
        assert!(!BookingStatus::Pending.is_terminal());
        assert!(!BookingStatus::Confirmed.is_terminal());
        assert!(!BookingStatus::CheckedIn.is_terminal());
        assert!(BookingStatus::CheckedOut.is_terminal());
        assert!(BookingStatus::Cancelled.is_terminal());
        assert!(BookingStatus::Expired.is_terminal());
        assert!(BookingStatus::NoShow.is_terminal());
    }

    fn mk_booking(status: BookingStatus, deadline: Option<Ms>) -> Booking {
        let id = Ulid::new();
        Booking {
            id,
            hotel_id: Ulid::new(),
            room_type_id: Ulid::new(),
            room_id: Ulid::new(),
            guest_id: None,
            stay: DateSpan::new(d(2025, 6, 10), d(2025, 6, 12)),
            occupancy: Occupancy { adults: 2, children: 0 },
            status,
            price: PriceBreakdown {
                currency: "USD".into(),
                nights: vec![],
                subtotal_minor: 0,
                tax_minor: 0,
                fees_minor: 0,
                total_minor: 0,
            },
            hold_deadline: deadline,
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
    fn pending_blocks_until_deadline() {
        let b = mk_booking(BookingStatus::Pending, Some(5000));
        assert!(b.blocks(4999));
        assert!(!b.blocks(5000)); // deadline reached — lazily expired
    }

    #[test]
    fn terminal_states_never_block() {
        for status in [
            BookingStatus::CheckedOut,
            BookingStatus::Cancelled,
            BookingStatus::Expired,
            BookingStatus::NoShow,
        ] {
            assert!(!mk_booking(status, None).blocks(0));
        }
        assert!(mk_booking(BookingStatus::Confirmed, None).blocks(0));
        assert!(mk_booking(BookingStatus::CheckedIn, None).blocks(0));
    }

    #[test]
    fn room_bookings_stay_sorted() {
        let mut rs = RoomState::new(Ulid::new(), Ulid::new(), Ulid::new(), "101".into());
        let mut late = mk_booking(BookingStatus::Confirmed, None);
        late.stay = DateSpan::new(d(2025, 7, 1), d(2025, 7, 3));
        let mut early = mk_booking(BookingStatus::Confirmed, None);
        early.stay = DateSpan::new(d(2025, 6, 1), d(2025, 6, 3));
        rs.insert_booking(late);
        rs.insert_booking(early);
        assert_eq!(rs.bookings[0].stay.check_in, d(2025, 6, 1));
        assert_eq!(rs.bookings[1].stay.check_in, d(2025, 7, 1));
    }

    #[test]
    fn overlapping_scan_skips_disjoint() {
        let mut rs = RoomState::new(Ulid::new(), Ulid::new(), Ulid::new(), "101".into());
        for (ci, co) in [(1, 3), (10, 12), (20, 22)] {
            let mut b = mk_booking(BookingStatus::Confirmed, None);
            b.stay = DateSpan::new(d(2025, 6, ci), d(2025, 6, co));
            rs.insert_booking(b);
        }
        let query = DateSpan::new(d(2025, 6, 11), d(2025, 6, 15));
        let hits: Vec<_> = rs.overlapping(&query).collect();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].stay.check_in, d(2025, 6, 10));
    }

    #[test]
    fn overlapping_adjacent_not_included() {
        let mut rs = RoomState::new(Ulid::new(), Ulid::new(), Ulid::new(), "101".into());
        let mut b = mk_booking(BookingStatus::Confirmed, None);
        b.stay = DateSpan::new(d(2025, 6, 1), d(2025, 6, 5));
        rs.insert_booking(b);
        // Checks in exactly on the previous check-out day
        let query = DateSpan::new(d(2025, 6, 5), d(2025, 6, 8));
        assert_eq!(rs.overlapping(&query).count(), 0);
    }

    #[test]
    fn weekday_mask() {
        assert_eq!(weekday_bit(Weekday::Mon), 0b000_0001);
        assert_eq!(weekday_bit(Weekday::Sat), 0b010_0000);
        assert_eq!(weekday_bit(Weekday::Sun), 0b100_0000);
    }

    #[test]
    fn plan_day_of_week_gate() {
        let plan = RatePlan {
            id: Ulid::new(),
            hotel_id: Ulid::new(),
            room_type_ids: vec![],
            name: "Weekend".into(),
            valid: DateSpan::new(d(2025, 1, 1), d(2026, 1, 1)),
            priority: 10,
            nightly_minor: 12_000,
            min_stay_nights: None,
            max_stay_nights: None,
            days_of_week: Some(weekday_bit(Weekday::Sat)),
            min_advance_days: None,
            max_advance_days: None,
            refundable: true,
        };
        // 2025-06-14 is a Saturday
        assert!(plan.applicable_on(d(2025, 6, 14)));
        assert!(!plan.applicable_on(d(2025, 6, 13))); // Friday
        assert!(!plan.applicable_on(d(2026, 6, 13))); // outside validity
        assert_eq!(plan.restriction_count(), 1);
    }

    #[test]
    fn confirmation_code_is_ulid_tail() {
        let id = Ulid::new();
        let code = confirmation_code(&id);
        assert_eq!(code.len(), 8);
        assert!(id.to_string().ends_with(&code));
    }

    #[test]
    fn event_serialization_roundtrip() {
        let event = Event::Transitioned {
            id: Ulid::new(),
            room_id: Ulid::new(),
            hotel_id: Ulid::new(),
            from: BookingStatus::Pending,
            to: BookingStatus::Confirmed,
            actor: Actor::system(),
            reason: Some("payment pay_123".into()),
            at: 1_700_000_000_000,
        };
        let bytes = bincode::serialize(&event).unwrap();
        let decoded: Event = bincode::deserialize(&bytes).unwrap();
        assert_eq!(event, decoded);
    }
}
