use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;
use uuid::Uuid;

/// Basis-point denominator for promotional discounts (10_000 bps = 100%).
pub const BPS_DENOMINATOR: u64 = 10_000;

/// Largest price a catalog tier may carry, in minor units.
pub const MAX_PRICE_MINOR: u64 = 1_000_000_000_000_000;

// ---------------------------------------------------------------------------
// Pricing
// ---------------------------------------------------------------------------

/// Currency a tier is priced in. Amounts are always stored in minor units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Zar,
    Usd,
    Eur,
}

impl Currency {
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Zar => "R",
            Self::Usd => "$",
            Self::Eur => "€",
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Zar => "ZAR",
            Self::Usd => "USD",
            Self::Eur => "EUR",
        }
    }
}

/// Product family a pricing tier belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TierFamily {
    ProcurementCorridor,
    SafetyCorridor,
    HrCompliance,
    CitizenFederation,
    EnterpriseSuite,
}

/// A named pricing plan with a base price and promotional parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PricingTier {
    pub id: String,
    pub tier_name: String,
    pub family: TierFamily,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub features: Vec<String>,
    /// Full monthly price.
    pub base_price_minor: u64,
    /// Annual list price; informational, the lifecycle bills monthly equivalents.
    #[serde(default)]
    pub annual_price_minor: u64,
    pub currency: Currency,
    pub trial_days: u32,
    pub promo_months: u32,
    /// Promotional discount in basis points (7500 = 75% off).
    pub promo_discount_bps: u32,
    #[serde(default)]
    pub max_users: Option<u32>,
    #[serde(default)]
    pub max_assets: Option<u32>,
    #[serde(default)]
    pub max_corridors: Option<u32>,
}

impl PricingTier {
    /// Discount as a fraction in `[0, 1)`.
    pub fn promo_discount_fraction(&self) -> f64 {
        self.promo_discount_bps as f64 / BPS_DENOMINATOR as f64
    }

    /// Monthly price during the promotional phase, rounded half-up to the
    /// nearest minor unit.
    pub fn promo_price_minor(&self) -> u64 {
        let payable_bps = BPS_DENOMINATOR.saturating_sub(self.promo_discount_bps as u64);
        let rounded = (self.base_price_minor as u128 * payable_bps as u128
            + BPS_DENOMINATOR as u128 / 2)
            / BPS_DENOMINATOR as u128;
        // Never exceeds the base price, so it always fits back into u64.
        rounded as u64
    }

    /// Monthly price charged while in `phase`.
    pub fn price_for_phase(&self, phase: Phase) -> u64 {
        match phase {
            Phase::Trial => 0,
            Phase::Promo => self.promo_price_minor(),
            Phase::Full => self.base_price_minor,
        }
    }

    /// Monthly saving during the promotional phase.
    pub fn savings_per_month_minor(&self) -> u64 {
        self.base_price_minor.saturating_sub(self.promo_price_minor())
    }

    /// Conservative lifetime value estimate: 24 months at full price,
    /// saturating at `u64::MAX`.
    pub fn lifetime_value_minor(&self) -> u64 {
        self.base_price_minor.saturating_mul(24)
    }
}

/// Render a minor-unit amount for human-readable messages, e.g. `R1000.00`.
pub fn format_minor(amount_minor: u64, currency: Currency) -> String {
    format!(
        "{}{}.{:02}",
        currency.symbol(),
        amount_minor / 100,
        amount_minor % 100
    )
}

// ---------------------------------------------------------------------------
// Subscription lifecycle
// ---------------------------------------------------------------------------

/// Billing cadence of the recurring full-price period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum BillingInterval {
    Monthly,
    Quarterly,
    Annual,
}

impl BillingInterval {
    /// Length of one billing period in calendar months.
    pub fn months(&self) -> u32 {
        match self {
            Self::Monthly => 1,
            Self::Quarterly => 3,
            Self::Annual => 12,
        }
    }
}

/// Materialized lifecycle status of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Trial,
    Promotional,
    Active,
    Cancelled,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trial => "trial",
            Self::Promotional => "promotional",
            Self::Active => "active",
            Self::Cancelled => "cancelled",
        }
    }

    /// The pricing phase this status materializes, `None` once cancelled.
    pub fn phase(&self) -> Option<Phase> {
        match self {
            Self::Trial => Some(Phase::Trial),
            Self::Promotional => Some(Phase::Promo),
            Self::Active => Some(Phase::Full),
            Self::Cancelled => None,
        }
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Time-derived pricing stage. Ordered: trial < promo < full.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Trial,
    Promo,
    Full,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trial => "trial",
            Self::Promo => "promo",
            Self::Full => "full",
        }
    }

    /// Status that materializes this phase.
    pub fn status(&self) -> SubscriptionStatus {
        match self {
            Self::Trial => SubscriptionStatus::Trial,
            Self::Promo => SubscriptionStatus::Promotional,
            Self::Full => SubscriptionStatus::Active,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user's subscription to a pricing tier within an organization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Subscription {
    pub id: Uuid,
    pub user_id: String,
    pub organization_id: String,
    pub tier_id: String,
    pub billing_interval: BillingInterval,
    pub status: SubscriptionStatus,

    // Boundaries fixed at creation
    pub created_at: DateTime<Utc>,
    pub trial_start_date: DateTime<Utc>,
    pub trial_end_date: DateTime<Utc>,
    pub promo_start_date: DateTime<Utc>,
    pub promo_end_date: DateTime<Utc>,

    pub current_period_start: DateTime<Utc>,
    pub current_period_end: DateTime<Utc>,

    /// Tier prices captured at creation; later catalog edits do not reprice
    /// existing subscriptions.
    pub base_amount_minor: u64,
    pub promo_amount_minor: u64,
    pub current_amount_minor: u64,
    pub currency: Currency,

    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,

    // Usage metadata, opaque to the lifecycle
    pub users_count: u32,
    pub assets_count: u32,
    pub corridors_count: u32,
    pub transaction_volume_minor: u64,

    /// Optimistic concurrency token, bumped by the store on every write.
    pub version: u64,
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    pub fn is_cancelled(&self) -> bool {
        self.status == SubscriptionStatus::Cancelled
    }

    /// Whether the tier granted a non-empty promotional window.
    pub fn has_promo(&self) -> bool {
        self.promo_end_date > self.promo_start_date
    }

    /// Monthly price charged while in `phase`, from the creation snapshot.
    pub fn price_for_phase(&self, phase: Phase) -> u64 {
        match phase {
            Phase::Trial => 0,
            Phase::Promo => self.promo_amount_minor,
            Phase::Full => self.base_amount_minor,
        }
    }
}

/// Body of `POST /v1/subscriptions`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateSubscriptionRequest {
    pub user_id: String,
    pub organization_id: String,
    pub tier_id: String,
    #[serde(default = "default_interval")]
    pub interval: BillingInterval,
}

fn default_interval() -> BillingInterval {
    BillingInterval::Monthly
}

/// Replacement values for a subscription's usage counters. Absent fields
/// keep their current value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UsageUpdate {
    #[serde(default)]
    pub users_count: Option<u32>,
    #[serde(default)]
    pub assets_count: Option<u32>,
    #[serde(default)]
    pub corridors_count: Option<u32>,
    #[serde(default)]
    pub transaction_volume_minor: Option<u64>,
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Lifecycle event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionEventType {
    TrialStarted,
    TrialEnded,
    PromoStarted,
    PromoEnded,
    Renewed,
    Cancelled,
}

/// A lifecycle event handed to an `EventSink`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SubscriptionEvent {
    pub id: Uuid,
    pub subscription_id: Uuid,
    pub event_type: SubscriptionEventType,
    #[schema(value_type = Object)]
    pub metadata: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tier(base: u64, bps: u32) -> PricingTier {
        PricingTier {
            id: "t".into(),
            tier_name: "Test".into(),
            family: TierFamily::EnterpriseSuite,
            description: String::new(),
            features: vec![],
            base_price_minor: base,
            annual_price_minor: 0,
            currency: Currency::Zar,
            trial_days: 14,
            promo_months: 3,
            promo_discount_bps: bps,
            max_users: None,
            max_assets: None,
            max_corridors: None,
        }
    }

    #[test]
    fn test_promo_price_rounds_half_up() {
        assert_eq!(tier(100_000, 7500).promo_price_minor(), 25_000);
        // 499 * 0.25 = 124.75 -> 125
        assert_eq!(tier(499, 7500).promo_price_minor(), 125);
        // 2 * 0.25 = 0.5 -> 1 (half rounds up)
        assert_eq!(tier(2, 7500).promo_price_minor(), 1);
        assert_eq!(tier(1_000, 0).promo_price_minor(), 1_000);
    }

    #[test]
    fn test_price_for_phase() {
        let t = tier(100_000, 7500);
        assert_eq!(t.price_for_phase(Phase::Trial), 0);
        assert_eq!(t.price_for_phase(Phase::Promo), 25_000);
        assert_eq!(t.price_for_phase(Phase::Full), 100_000);
        assert_eq!(t.savings_per_month_minor(), 75_000);
        assert_eq!(t.lifetime_value_minor(), 2_400_000);
        assert!((t.promo_discount_fraction() - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn test_extreme_prices_do_not_overflow() {
        let t = tier(u64::MAX, 7500);
        assert_eq!(t.promo_price_minor(), u64::MAX / 4 + 1);
        assert_eq!(t.lifetime_value_minor(), u64::MAX);
        assert_eq!(tier(u64::MAX, 0).promo_price_minor(), u64::MAX);
        assert_eq!(tier(u64::MAX, 0).savings_per_month_minor(), 0);
    }

    #[test]
    fn test_format_minor() {
        assert_eq!(format_minor(100_000, Currency::Zar), "R1000.00");
        assert_eq!(format_minor(12_505, Currency::Usd), "$125.05");
    }

    #[test]
    fn test_status_phase_mapping() {
        assert_eq!(Phase::Promo.status(), SubscriptionStatus::Promotional);
        assert_eq!(SubscriptionStatus::Active.phase(), Some(Phase::Full));
        assert_eq!(SubscriptionStatus::Cancelled.phase(), None);
        assert!(Phase::Trial < Phase::Promo && Phase::Promo < Phase::Full);
        assert_eq!(
            serde_json::to_string(&SubscriptionStatus::Promotional).unwrap(),
            "\"promotional\""
        );
    }
}
