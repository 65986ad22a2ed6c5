//! Rate resolution and stay pricing. Everything here is pure: the caller
//! supplies the plan set and today's date, so the same inputs always
//! produce the same breakdown — the engine re-runs it to verify quotes.
//!
//! All amounts are integer minor currency units. Never floats.

use std::cmp::Ordering;

use chrono::NaiveDate;

use crate::model::{DateSpan, Hotel, NightCharge, Occupancy, PriceBreakdown, RatePlan, RoomType};

use super::EngineError;

/// Total order over competing plans for one night. The winner is the least
/// element: priority (higher first), then restriction count (more specific
/// first), then nightly price (cheaper first), then id — so the outcome
/// never depends on storage order.
fn plan_rank(a: &RatePlan, b: &RatePlan) -> Ordering {
    b.priority
        .cmp(&a.priority)
        .then(b.restriction_count().cmp(&a.restriction_count()))
        .then(a.nightly_minor.cmp(&b.nightly_minor))
        .then(a.id.cmp(&b.id))
}

/// Pick the rate for one night.
///
/// Among plans valid for the night (validity window, day-of-week, room
/// type), the ranked winner must also satisfy its own stay-level
/// restrictions; a violated restriction rejects the stay rather than
/// silently falling through to a lower-ranked plan. With no applicable plan
/// the room type's base rate prices the night.
pub fn resolve_rate<'a>(
    plans: &'a [RatePlan],
    room_type: &RoomType,
    date: NaiveDate,
    stay_nights: i64,
    advance_days: i64,
) -> Result<(Option<&'a RatePlan>, i64), EngineError> {
    let winner = plans
        .iter()
        .filter(|p| p.applies_to(room_type.id) && p.applicable_on(date))
        .min_by(|a, b| plan_rank(a, b));

    match winner {
        Some(plan) => {
            if let Some(min) = plan.min_stay_nights
                && stay_nights < min as i64 {
                    return Err(EngineError::PricingUnavailable {
                        date,
                        detail: "stay shorter than plan minimum",
                    });
                }
            if let Some(max) = plan.max_stay_nights
                && stay_nights > max as i64 {
                    return Err(EngineError::PricingUnavailable {
                        date,
                        detail: "stay longer than plan maximum",
                    });
                }
            if let Some(min) = plan.min_advance_days
                && advance_days < min as i64 {
                    return Err(EngineError::PricingUnavailable {
                        date,
                        detail: "booked too close to check-in for plan",
                    });
                }
            if let Some(max) = plan.max_advance_days
                && advance_days > max as i64 {
                    return Err(EngineError::PricingUnavailable {
                        date,
                        detail: "booked too far ahead for plan",
                    });
                }
            Ok((Some(plan), plan.nightly_minor))
        }
        None => match room_type.base_rate_minor {
            Some(base) => Ok((None, base)),
            None => Err(EngineError::PricingUnavailable {
                date,
                detail: "no eligible rate plan and no base rate",
            }),
        },
    }
}

/// Price a full stay: one resolved rate per night, summed into a subtotal,
/// plus the hotel's tax (basis points, floored) and flat service fee.
pub fn price_stay(
    hotel: &Hotel,
    room_type: &RoomType,
    plans: &[RatePlan],
    stay: &DateSpan,
    occupancy: &Occupancy,
    today: NaiveDate,
) -> Result<PriceBreakdown, EngineError> {
    if occupancy.adults == 0 {
        return Err(EngineError::Validation("at least one adult required"));
    }
    if occupancy.total() > room_type.max_occupancy {
        return Err(EngineError::Validation("occupancy exceeds room type capacity"));
    }
    if stay.check_in < today {
        return Err(EngineError::Validation("check-in date is in the past"));
    }

    let stay_nights = stay.nights();
    let advance_days = (stay.check_in - today).num_days();

    let mut nights = Vec::with_capacity(stay_nights as usize);
    let mut subtotal: i64 = 0;
    for date in stay.dates() {
        let (plan, amount) = resolve_rate(plans, room_type, date, stay_nights, advance_days)?;
        subtotal += amount;
        nights.push(NightCharge {
            date,
            rate_plan_id: plan.map(|p| p.id),
            amount_minor: amount,
        });
    }

    let tax = subtotal * hotel.tax_bps as i64 / 10_000;
    let fees = hotel.service_fee_minor;
    Ok(PriceBreakdown {
        currency: hotel.currency.clone(),
        nights,
        subtotal_minor: subtotal,
        tax_minor: tax,
        fees_minor: fees,
        total_minor: subtotal + tax + fees,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::weekday_bit;
    use chrono::Weekday;
    use ulid::Ulid;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn hotel() -> Hotel {
        Hotel {
            id: Ulid::new(),
            name: "Harbor House".into(),
            currency: "USD".into(),
            tax_bps: 0,
            service_fee_minor: 0,
        }
    }

    fn standard_room(hotel_id: Ulid, base: Option<i64>) -> RoomType {
        RoomType {
            id: Ulid::new(),
            hotel_id,
            name: "Standard".into(),
            base_rate_minor: base,
            max_occupancy: 4,
        }
    }

    fn plan(room_type: &RoomType, priority: i32, nightly: i64) -> RatePlan {
        RatePlan {
            id: Ulid::new(),
            hotel_id: room_type.hotel_id,
            room_type_ids: vec![room_type.id],
            name: "plan".into(),
            valid: DateSpan::new(d(2025, 1, 1), d(2026, 1, 1)),
            priority,
            nightly_minor: nightly,
            min_stay_nights: None,
            max_stay_nights: None,
            days_of_week: None,
            min_advance_days: None,
            max_advance_days: None,
            refundable: true,
        }
    }

    fn two_adults() -> Occupancy {
        Occupancy { adults: 2, children: 0 }
    }

    #[test]
    fn weekend_plan_overrides_base_on_saturday_only() {
        // Base $100/night; "Weekend" plan at priority 10 charges $120 on
        // Saturdays. Fri -> Mon is 3 nights: 100 + 120 + 100 = 320.
        let h = hotel();
        let rt = standard_room(h.id, Some(10_000));
        let mut weekend = plan(&rt, 10, 12_000);
        weekend.name = "Weekend".into();
        weekend.days_of_week = Some(weekday_bit(Weekday::Sat));

        // 2025-06-13 is a Friday
        let stay = DateSpan::new(d(2025, 6, 13), d(2025, 6, 16));
        let breakdown =
            price_stay(&h, &rt, &[weekend.clone()], &stay, &two_adults(), d(2025, 6, 1)).unwrap();

        assert_eq!(breakdown.subtotal_minor, 32_000);
        assert_eq!(breakdown.total_minor, 32_000);
        assert_eq!(breakdown.nights.len(), 3);
        assert_eq!(breakdown.nights[0].rate_plan_id, None);
        assert_eq!(breakdown.nights[1].rate_plan_id, Some(weekend.id));
        assert_eq!(breakdown.nights[2].rate_plan_id, None);
    }

    #[test]
    fn pricing_is_deterministic() {
        let h = hotel();
        let rt = standard_room(h.id, Some(10_000));
        let plans = vec![plan(&rt, 5, 9_000), plan(&rt, 3, 8_000)];
        let stay = DateSpan::new(d(2025, 6, 10), d(2025, 6, 14));

        let a = price_stay(&h, &rt, &plans, &stay, &two_adults(), d(2025, 6, 1)).unwrap();
        let b = price_stay(&h, &rt, &plans, &stay, &two_adults(), d(2025, 6, 1)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn higher_priority_wins() {
        let h = hotel();
        let rt = standard_room(h.id, Some(10_000));
        let low = plan(&rt, 1, 7_000);
        let high = plan(&rt, 9, 11_000);
        let stay = DateSpan::new(d(2025, 6, 10), d(2025, 6, 11));

        let breakdown =
            price_stay(&h, &rt, &[low.clone(), high.clone()], &stay, &two_adults(), d(2025, 6, 1))
                .unwrap();
        assert_eq!(breakdown.nights[0].rate_plan_id, Some(high.id));
        assert_eq!(breakdown.subtotal_minor, 11_000);

        // Flip the priorities: the other plan must win now.
        let mut low2 = low.clone();
        low2.priority = 20;
        let breakdown2 =
            price_stay(&h, &rt, &[low2.clone(), high], &stay, &two_adults(), d(2025, 6, 1))
                .unwrap();
        assert_eq!(breakdown2.nights[0].rate_plan_id, Some(low2.id));
    }

    #[test]
    fn equal_priority_breaks_on_specificity_then_price() {
        let h = hotel();
        let rt = standard_room(h.id, None);

        let loose = plan(&rt, 5, 8_000);
        let mut specific = plan(&rt, 5, 9_500);
        specific.min_stay_nights = Some(1);
        let stay = DateSpan::new(d(2025, 6, 10), d(2025, 6, 12));

        let breakdown = price_stay(
            &h,
            &rt,
            &[loose.clone(), specific.clone()],
            &stay,
            &two_adults(),
            d(2025, 6, 1),
        )
        .unwrap();
        // More restrictions declared -> more specific -> wins despite price
        assert_eq!(breakdown.nights[0].rate_plan_id, Some(specific.id));

        // Same priority, same specificity: cheaper plan wins
        let cheap = plan(&rt, 5, 7_000);
        let dear = plan(&rt, 5, 9_000);
        let breakdown2 = price_stay(
            &h,
            &rt,
            &[dear, cheap.clone()],
            &stay,
            &two_adults(),
            d(2025, 6, 1),
        )
        .unwrap();
        assert_eq!(breakdown2.nights[0].rate_plan_id, Some(cheap.id));
    }

    #[test]
    fn winning_plan_min_stay_rejects_stay() {
        let h = hotel();
        let rt = standard_room(h.id, Some(10_000));
        let mut weekly = plan(&rt, 10, 6_000);
        weekly.min_stay_nights = Some(7);
        let stay = DateSpan::new(d(2025, 6, 10), d(2025, 6, 12));

        let err = price_stay(&h, &rt, &[weekly], &stay, &two_adults(), d(2025, 6, 1)).unwrap_err();
        assert!(matches!(err, EngineError::PricingUnavailable { .. }));
    }

    #[test]
    fn advance_window_enforced() {
        let h = hotel();
        let rt = standard_room(h.id, None);
        let mut early_bird = plan(&rt, 10, 6_000);
        early_bird.min_advance_days = Some(30);
        let stay = DateSpan::new(d(2025, 6, 10), d(2025, 6, 11));

        // Booked 9 days out: too close for the plan
        let err = price_stay(&h, &rt, &[early_bird.clone()], &stay, &two_adults(), d(2025, 6, 1))
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::PricingUnavailable { detail: "booked too close to check-in for plan", .. }
        ));

        // Booked 40 days out: fine
        let ok = price_stay(&h, &rt, &[early_bird], &stay, &two_adults(), d(2025, 5, 1));
        assert!(ok.is_ok());
    }

    #[test]
    fn night_without_any_rate_fails() {
        let h = hotel();
        let rt = standard_room(h.id, None); // no base rate
        let mut june_only = plan(&rt, 5, 9_000);
        june_only.valid = DateSpan::new(d(2025, 6, 1), d(2025, 7, 1));

        // Second night falls outside the plan's validity
        let stay = DateSpan::new(d(2025, 6, 30), d(2025, 7, 2));
        let err = price_stay(&h, &rt, &[june_only], &stay, &two_adults(), d(2025, 6, 1)).unwrap_err();
        match err {
            EngineError::PricingUnavailable { date, .. } => assert_eq!(date, d(2025, 7, 1)),
            other => panic!("expected PricingUnavailable, got {other:?}"),
        }
    }

    #[test]
    fn tax_and_fees_applied() {
        let mut h = hotel();
        h.tax_bps = 750; // 7.5%
        h.service_fee_minor = 2_500;
        let rt = standard_room(h.id, Some(10_000));
        let stay = DateSpan::new(d(2025, 6, 10), d(2025, 6, 12));

        let breakdown = price_stay(&h, &rt, &[], &stay, &two_adults(), d(2025, 6, 1)).unwrap();
        assert_eq!(breakdown.subtotal_minor, 20_000);
        assert_eq!(breakdown.tax_minor, 1_500);
        assert_eq!(breakdown.fees_minor, 2_500);
        assert_eq!(breakdown.total_minor, 24_000);
    }

    #[test]
    fn occupancy_validated_before_pricing() {
        let h = hotel();
        let rt = standard_room(h.id, Some(10_000));
        let stay = DateSpan::new(d(2025, 6, 10), d(2025, 6, 12));

        let none = Occupancy { adults: 0, children: 2 };
        assert!(matches!(
            price_stay(&h, &rt, &[], &stay, &none, d(2025, 6, 1)),
            Err(EngineError::Validation(_))
        ));

        let crowd = Occupancy { adults: 3, children: 2 }; // max is 4
        assert!(matches!(
            price_stay(&h, &rt, &[], &stay, &crowd, d(2025, 6, 1)),
            Err(EngineError::Validation(_))
        ));
    }

    #[test]
    fn plan_for_other_room_type_ignored() {
        let h = hotel();
        let rt = standard_room(h.id, Some(10_000));
        let other_rt = standard_room(h.id, Some(5_000));
        let other_plan = plan(&other_rt, 50, 1_000);
        let stay = DateSpan::new(d(2025, 6, 10), d(2025, 6, 11));

        let breakdown =
            price_stay(&h, &rt, &[other_plan], &stay, &two_adults(), d(2025, 6, 1)).unwrap();
        assert_eq!(breakdown.nights[0].rate_plan_id, None);
        assert_eq!(breakdown.subtotal_minor, 10_000);
    }
}
