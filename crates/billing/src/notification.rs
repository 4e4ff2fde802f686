//! "Phase ending soon" notification policy.
//!
//! A read-only decision. The caller dispatches the notice and owns any
//! de-duplication or rate limiting; repeated calls inside the window keep
//! answering `should_notify: true`.

use crate::phase;
use azora_core::config::BillingConfig;
use azora_core::types::{format_minor, Phase, Subscription};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

/// Outcome of evaluating the policy against one subscription.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct NotificationDecision {
    pub should_notify: bool,
    pub phase: Phase,
    pub days_left: i64,
    pub message: String,
}

/// Notice windows, in days before the phase boundary.
#[derive(Debug, Clone, Copy)]
pub struct NotificationPolicy {
    pub trial_notice_days: i64,
    pub promo_notice_days: i64,
}

impl Default for NotificationPolicy {
    fn default() -> Self {
        Self {
            trial_notice_days: 3,
            promo_notice_days: 7,
        }
    }
}

impl NotificationPolicy {
    pub fn from_config(config: &BillingConfig) -> Self {
        Self {
            trial_notice_days: config.trial_notice_days,
            promo_notice_days: config.promo_notice_days,
        }
    }

    pub fn should_notify(&self, subscription: &Subscription, now: DateTime<Utc>) -> NotificationDecision {
        let current = phase::current_phase(subscription, now);
        let days_left = phase::days_remaining(subscription, now);

        if subscription.is_cancelled() {
            return NotificationDecision {
                should_notify: false,
                phase: current,
                days_left,
                message: "Subscription is cancelled".to_string(),
            };
        }

        let fire = match current {
            Phase::Trial => days_left <= self.trial_notice_days,
            Phase::Promo => days_left <= self.promo_notice_days,
            Phase::Full => false,
        };

        let message = if fire {
            phase_ending_message(subscription, current, days_left)
        } else {
            "No notification due".to_string()
        };

        NotificationDecision {
            should_notify: fire,
            phase: current,
            days_left,
            message,
        }
    }
}

fn phase_ending_message(subscription: &Subscription, current: Phase, days_left: i64) -> String {
    let when = match days_left {
        0 => "today".to_string(),
        1 => "in 1 day".to_string(),
        n => format!("in {n} days"),
    };
    let next = phase::next_phase(subscription, current).unwrap_or(Phase::Full);
    let next_price = format_minor(subscription.price_for_phase(next), subscription.currency);

    match (current, next) {
        (Phase::Trial, Phase::Promo) => format!(
            "Your free trial ends {when}. Promotional pricing of {next_price}/month starts next."
        ),
        (Phase::Trial, _) => {
            format!("Your free trial ends {when}. Full price of {next_price}/month starts next.")
        }
        _ => format!("Your promotional pricing ends {when}. Your plan renews at {next_price}/month."),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use azora_core::types::{BillingInterval, Currency, SubscriptionStatus};
    use chrono::{Duration, TimeZone};
    use uuid::Uuid;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn subscription(promo_months: u32) -> Subscription {
        let created = t0();
        let trial_end = phase::trial_end(created, 14);
        Subscription {
            id: Uuid::new_v4(),
            user_id: "user-1".into(),
            organization_id: "org-1".into(),
            tier_id: "tier".into(),
            billing_interval: BillingInterval::Monthly,
            status: SubscriptionStatus::Trial,
            created_at: created,
            trial_start_date: created,
            trial_end_date: trial_end,
            promo_start_date: trial_end,
            promo_end_date: phase::promo_end(trial_end, promo_months),
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
    fn test_trial_window_threshold() {
        let policy = NotificationPolicy::default();
        let sub = subscription(3);

        let at_three = policy.should_notify(&sub, t0() + Duration::days(11));
        assert_eq!(at_three.days_left, 3);
        assert_eq!(at_three.phase, Phase::Trial);
        assert!(at_three.should_notify);
        assert!(at_three.message.contains("in 3 days"));
        assert!(at_three.message.contains("R250.00"));

        let at_four = policy.should_notify(&sub, t0() + Duration::days(10));
        assert_eq!(at_four.days_left, 4);
        assert!(!at_four.should_notify);
    }

    #[test]
    fn test_promo_window_threshold() {
        let policy = NotificationPolicy::default();
        let sub = subscription(3);

        let eight_left = sub.promo_end_date - Duration::days(8);
        assert!(!policy.should_notify(&sub, eight_left).should_notify);

        let seven_left = sub.promo_end_date - Duration::days(7);
        let decision = policy.should_notify(&sub, seven_left);
        assert!(decision.should_notify);
        assert_eq!(decision.phase, Phase::Promo);
        assert!(decision.message.contains("R1000.00"));
    }

    #[test]
    fn test_never_fires_in_full_or_cancelled() {
        let policy = NotificationPolicy::default();
        let sub = subscription(3);

        // Last day of a monthly full-price period.
        let (_, period_end, _) =
            phase::billing_period_at(sub.promo_end_date, sub.billing_interval, sub.promo_end_date);
        let decision = policy.should_notify(&sub, period_end - Duration::hours(1));
        assert_eq!(decision.phase, Phase::Full);
        assert_eq!(decision.days_left, 1);
        assert!(!decision.should_notify);

        let mut cancelled = subscription(3);
        cancelled.status = SubscriptionStatus::Cancelled;
        let decision = policy.should_notify(&cancelled, t0() + Duration::days(13));
        assert!(!decision.should_notify);
        assert_eq!(decision.message, "Subscription is cancelled");
    }

    #[test]
    fn test_trial_without_promo_mentions_full_price() {
        let policy = NotificationPolicy::default();
        let sub = subscription(0);
        let decision = policy.should_notify(&sub, t0() + Duration::days(13));
        assert!(decision.should_notify);
        assert!(decision.message.contains("in 1 day"));
        assert!(decision.message.contains("Full price of R1000.00"));
    }

    #[test]
    fn test_thresholds_from_config() {
        let config = BillingConfig {
            trial_notice_days: 5,
            promo_notice_days: 1,
            ..BillingConfig::default()
        };
        let policy = NotificationPolicy::from_config(&config);
        let sub = subscription(3);
        assert!(policy.should_notify(&sub, t0() + Duration::days(9)).should_notify);
        assert!(!policy
            .should_notify(&sub, sub.promo_end_date - Duration::days(2))
            .should_notify);
    }
}
