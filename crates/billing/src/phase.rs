//! Phase calculator: pure functions deriving a subscription's pricing phase
//! and time left in it from stored boundaries and "now".
//!
//! Nothing here mutates a subscription. `Subscription::status` is a cache of
//! these functions, refreshed only by the manager's transition processing.

use azora_core::types::{BillingInterval, Phase, Subscription};
use chrono::{DateTime, Duration, Months, Utc};

/// Promotional months are fixed-length so the promotion does not depend on
/// the calendar month in which the trial ends.
pub const PROMO_MONTH_DAYS: i64 = 30;

const MILLIS_PER_DAY: i64 = 86_400_000;

/// End of a trial of `trial_days` starting at `start`.
pub fn trial_end(start: DateTime<Utc>, trial_days: u32) -> DateTime<Utc> {
    start + Duration::days(trial_days as i64)
}

/// End of a promotion of `promo_months` starting at `promo_start`.
pub fn promo_end(promo_start: DateTime<Utc>, promo_months: u32) -> DateTime<Utc> {
    promo_start + Duration::days(promo_months as i64 * PROMO_MONTH_DAYS)
}

/// `anchor` advanced by `periods` billing intervals, in calendar months.
pub fn add_periods(anchor: DateTime<Utc>, interval: BillingInterval, periods: u32) -> DateTime<Utc> {
    anchor
        .checked_add_months(Months::new(interval.months().saturating_mul(periods)))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Full-price billing period containing `now`, counted from `anchor`.
///
/// Returns `(start, end, index)` where `start <= now < end` and `index` is the
/// number of whole periods between `anchor` and `start`. A `now` before the
/// anchor yields the first period.
pub fn billing_period_at(
    anchor: DateTime<Utc>,
    interval: BillingInterval,
    now: DateTime<Utc>,
) -> (DateTime<Utc>, DateTime<Utc>, u32) {
    let mut index = 0u32;
    let mut start = anchor;
    let mut end = add_periods(anchor, interval, 1);
    // Offsets are always taken from the anchor so month-end clamping never
    // accumulates (Jan 31 -> Feb 28 -> Mar 31, not Mar 28).
    while end <= now && end < DateTime::<Utc>::MAX_UTC {
        index += 1;
        start = end;
        end = add_periods(anchor, interval, index + 1);
    }
    (start, end, index)
}

/// The pricing phase of `subscription` at `now`.
pub fn current_phase(subscription: &Subscription, now: DateTime<Utc>) -> Phase {
    if now < subscription.created_at || now < subscription.trial_end_date {
        Phase::Trial
    } else if now < subscription.promo_end_date {
        Phase::Promo
    } else {
        Phase::Full
    }
}

/// The boundary at which `phase` ends. For the full phase this is the end of
/// the recurring billing period containing `now`.
pub fn phase_end(subscription: &Subscription, phase: Phase, now: DateTime<Utc>) -> DateTime<Utc> {
    match phase {
        Phase::Trial => subscription.trial_end_date,
        Phase::Promo => subscription.promo_end_date,
        Phase::Full => {
            let (_, end, _) =
                billing_period_at(subscription.promo_end_date, subscription.billing_interval, now);
            end
        }
    }
}

/// Whole days (rounded up) until the current phase ends. Never negative.
pub fn days_remaining(subscription: &Subscription, now: DateTime<Utc>) -> i64 {
    if now < subscription.created_at {
        let trial_days = (subscription.trial_end_date - subscription.trial_start_date).num_days();
        return trial_days.max(0);
    }
    let phase = current_phase(subscription, now);
    ceil_days(phase_end(subscription, phase, now) - now)
}

/// The phase that follows `phase`, skipping an empty promotion.
pub fn next_phase(subscription: &Subscription, phase: Phase) -> Option<Phase> {
    match phase {
        Phase::Trial if subscription.has_promo() => Some(Phase::Promo),
        Phase::Trial | Phase::Promo => Some(Phase::Full),
        Phase::Full => None,
    }
}

fn ceil_days(delta: Duration) -> i64 {
    let millis = delta.num_milliseconds();
    if millis <= 0 {
        0
    } else {
        (millis + MILLIS_PER_DAY - 1) / MILLIS_PER_DAY
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use azora_core::types::{Currency, SubscriptionStatus};
    use chrono::TimeZone;
    use uuid::Uuid;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 15, 9, 0, 0).unwrap()
    }

    fn subscription(trial_days: u32, promo_months: u32, interval: BillingInterval) -> Subscription {
        let created = t0();
        let trial_end = trial_end(created, trial_days);
        let promo_end = promo_end(trial_end, promo_months);
        Subscription {
            id: Uuid::new_v4(),
            user_id: "user-1".into(),
            organization_id: "org-1".into(),
            tier_id: "tier".into(),
            billing_interval: interval,
            status: SubscriptionStatus::Trial,
            created_at: created,
            trial_start_date: created,
            trial_end_date: trial_end,
            promo_start_date: trial_end,
            promo_end_date: promo_end,
            current_period_start: created,
            current_period_end: trial_end,
            base_amount_minor: 100_000,
            promo_amount_minor: 25_000,
            current_amount_minor: 0,
            currency: Currency::Zar,
            cancelled_at: None,
            cancellation_reason: None,
            users_count: 0,
            assets_count: 0,
            corridors_count: 0,
            transaction_volume_minor: 0,
            version: 1,
            updated_at: created,
        }
    }

    #[test]
    fn test_phase_boundaries() {
        let sub = subscription(14, 3, BillingInterval::Monthly);

        assert_eq!(current_phase(&sub, t0()), Phase::Trial);
        assert_eq!(current_phase(&sub, t0() + Duration::days(13)), Phase::Trial);
        assert_eq!(days_remaining(&sub, t0() + Duration::days(13)), 1);

        // Boundaries are inclusive on the left.
        assert_eq!(current_phase(&sub, t0() + Duration::days(14)), Phase::Promo);
        assert_eq!(days_remaining(&sub, t0() + Duration::days(14)), 90);

        let promo_over = t0() + Duration::days(14 + 90);
        assert_eq!(current_phase(&sub, promo_over - Duration::seconds(1)), Phase::Promo);
        assert_eq!(current_phase(&sub, promo_over), Phase::Full);
    }

    #[test]
    fn test_days_remaining_rounds_up() {
        let sub = subscription(14, 3, BillingInterval::Monthly);
        let now = t0() + Duration::days(10) + Duration::hours(1);
        // 3 days 23 hours left
        assert_eq!(days_remaining(&sub, now), 4);
        assert_eq!(days_remaining(&sub, sub.trial_end_date - Duration::seconds(1)), 1);
    }

    #[test]
    fn test_no_promo_jumps_to_full() {
        let sub = subscription(14, 0, BillingInterval::Monthly);
        assert!(!sub.has_promo());
        assert_eq!(next_phase(&sub, Phase::Trial), Some(Phase::Full));

        let mut now = t0();
        while now < t0() + Duration::days(60) {
            assert_ne!(current_phase(&sub, now), Phase::Promo);
            now += Duration::hours(6);
        }
        assert_eq!(current_phase(&sub, t0() + Duration::days(14)), Phase::Full);
    }

    #[test]
    fn test_clock_skew_before_creation() {
        let sub = subscription(14, 3, BillingInterval::Monthly);
        let before = t0() - Duration::days(2);
        assert_eq!(current_phase(&sub, before), Phase::Trial);
        assert_eq!(days_remaining(&sub, before), 14);

        let zero_trial = subscription(0, 3, BillingInterval::Monthly);
        assert_eq!(current_phase(&zero_trial, before), Phase::Trial);
        assert_eq!(days_remaining(&zero_trial, before), 0);
    }

    #[test]
    fn test_full_phase_uses_billing_period() {
        let sub = subscription(14, 3, BillingInterval::Monthly);
        // promo ends 2025-04-29 09:00; first full period ends 2025-05-29
        let now = sub.promo_end_date + Duration::days(10);
        assert_eq!(current_phase(&sub, now), Phase::Full);
        assert_eq!(days_remaining(&sub, now), 20);
        assert_eq!(next_phase(&sub, Phase::Full), None);
    }

    #[test]
    fn test_billing_period_at_does_not_drift() {
        let anchor = Utc.with_ymd_and_hms(2025, 1, 31, 0, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2025, 3, 15, 0, 0, 0).unwrap();
        let (start, end, index) = billing_period_at(anchor, BillingInterval::Monthly, now);
        assert_eq!(start, Utc.with_ymd_and_hms(2025, 2, 28, 0, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2025, 3, 31, 0, 0, 0).unwrap());
        assert_eq!(index, 1);

        let (start, end, index) = billing_period_at(anchor, BillingInterval::Annual, now);
        assert_eq!(start, anchor);
        assert_eq!(end, Utc.with_ymd_and_hms(2026, 1, 31, 0, 0, 0).unwrap());
        assert_eq!(index, 0);

        // Before the anchor: first period.
        let (start, _, index) =
            billing_period_at(anchor, BillingInterval::Quarterly, anchor - Duration::days(5));
        assert_eq!(start, anchor);
        assert_eq!(index, 0);
    }

    #[test]
    fn test_phase_never_regresses_over_time() {
        let sub = subscription(14, 3, BillingInterval::Monthly);
        let mut last = Phase::Trial;
        for hours in 0..(24 * 200) {
            let phase = current_phase(&sub, t0() + Duration::hours(hours));
            assert!(phase >= last, "phase regressed at +{hours}h");
            last = phase;
        }
        assert_eq!(last, Phase::Full);
    }
}
