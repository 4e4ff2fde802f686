//! Pricing catalog: read-only lookup of pricing tiers, loaded once at
//! process start from the built-in table or a JSON file.

use azora_core::error::{BillingError, BillingResult};
use azora_core::types::{Currency, PricingTier, TierFamily, BPS_DENOMINATOR, MAX_PRICE_MINOR};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

/// On-disk catalog layout: `{ "tiers": [ ... ] }`.
#[derive(Debug, Deserialize)]
struct CatalogFile {
    tiers: Vec<PricingTier>,
}

/// Immutable set of pricing tiers, indexed by tier id.
#[derive(Debug, Clone)]
pub struct PricingCatalog {
    tiers: Vec<PricingTier>,
    index: HashMap<String, usize>,
}

impl Default for PricingCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PricingCatalog {
    /// Build a catalog from tiers, rejecting duplicate ids, out-of-range
    /// discounts and prices above `MAX_PRICE_MINOR`.
    pub fn from_tiers(tiers: Vec<PricingTier>) -> BillingResult<Self> {
        let mut seen = HashMap::new();
        for tier in &tiers {
            if tier.id.trim().is_empty() {
                return Err(BillingError::Config("tier id must not be empty".into()));
            }
            if tier.promo_discount_bps as u64 >= BPS_DENOMINATOR {
                return Err(BillingError::Config(format!(
                    "tier `{}`: promo discount must be below 100% ({} bps)",
                    tier.id, tier.promo_discount_bps
                )));
            }
            if tier.base_price_minor > MAX_PRICE_MINOR || tier.annual_price_minor > MAX_PRICE_MINOR {
                return Err(BillingError::Config(format!(
                    "tier `{}`: price exceeds {} minor units",
                    tier.id, MAX_PRICE_MINOR
                )));
            }
            if seen.insert(tier.id.as_str(), ()).is_some() {
                return Err(BillingError::Config(format!(
                    "duplicate tier id `{}`",
                    tier.id
                )));
            }
        }
        Ok(Self::build(tiers))
    }

    /// Load and validate a JSON catalog file.
    pub fn from_json_file(path: impl AsRef<Path>) -> BillingResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let file: CatalogFile = serde_json::from_str(&raw)?;
        let catalog = Self::from_tiers(file.tiers)?;
        info!(path = %path.display(), tiers = catalog.len(), "Pricing catalog loaded");
        Ok(catalog)
    }

    fn build(tiers: Vec<PricingTier>) -> Self {
        let index = tiers
            .iter()
            .enumerate()
            .map(|(i, t)| (t.id.clone(), i))
            .collect();
        Self { tiers, index }
    }

    /// Look up a tier. An unknown id is a client input error.
    pub fn get_tier(&self, tier_id: &str) -> BillingResult<&PricingTier> {
        self.index
            .get(tier_id)
            .map(|&i| &self.tiers[i])
            .ok_or_else(|| BillingError::TierNotFound(tier_id.to_string()))
    }

    /// All tiers in catalog order.
    pub fn tiers(&self) -> &[PricingTier] {
        &self.tiers
    }

    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    /// The default catalog: 14-day trial, then 75% off for 3 months, then
    /// full price. Prices in ZAR cents.
    pub fn builtin() -> Self {
        let tiers = vec![
            PricingTier {
                max_corridors: Some(1),
                ..tier(
                    "procurement_basic",
                    "Procurement Corridor - Basic",
                    TierFamily::ProcurementCorridor,
                    "Single government department or corporate division",
                    &[
                        "Immutable tender & bid tracking",
                        "Constitution-as-Code enforcement",
                        "Compliance verification",
                        "Basic corruption detection",
                        "Up to 100 tenders/month",
                        "Single corridor",
                    ],
                    16_666_700,
                    200_000_000,
                )
            },
            PricingTier {
                max_corridors: Some(10),
                ..tier(
                    "procurement_enterprise",
                    "Procurement Corridor - Enterprise",
                    TierFamily::ProcurementCorridor,
                    "Multi-department or large corporate",
                    &[
                        "Everything in Basic",
                        "Advanced AI corruption detection",
                        "Multi-corridor management",
                        "Unlimited tenders",
                        "Predictive analytics",
                        "Custom compliance rules",
                        "Dedicated support",
                    ],
                    41_666_700,
                    500_000_000,
                )
            },
            tier(
                "safety_aviation",
                "Safety Corridor - Aviation",
                TierFamily::SafetyCorridor,
                "Per aircraft/asset pricing",
                &[
                    "Predictive Twin for each asset",
                    "Pre-flight checklist automation",
                    "Incident anchoring",
                    "Near-miss detection",
                    "Equipment failure prediction",
                    "Maintenance optimization",
                ],
                1_666_700,
                20_000_000,
            ),
            PricingTier {
                max_users: Some(1000),
                ..tier(
                    "hr_compliance_standard",
                    "HR Compliance - Standard",
                    TierFamily::HrCompliance,
                    "CCMA-proof HR management",
                    &[
                        "AZORA HR AI Deputy",
                        "CCMA compliance automation",
                        "Compensation analysis",
                        "Recruitment AI",
                        "Performance management",
                        "Employee self-service",
                    ],
                    49_900,
                    539_000,
                )
            },
            tier(
                "citizen_federation_basic",
                "Citizen Federation - Basic",
                TierFamily::CitizenFederation,
                "Citizen engagement & reputation",
                &[
                    "Azora Wallet",
                    "Reputation credits",
                    "Whistleblower protection",
                    "Service delivery tracking",
                    "Community governance",
                ],
                10_000,
                108_000,
            ),
        ];
        Self::build(tiers)
    }
}

fn tier(
    id: &str,
    name: &str,
    family: TierFamily,
    description: &str,
    features: &[&str],
    base_price_minor: u64,
    annual_price_minor: u64,
) -> PricingTier {
    PricingTier {
        id: id.into(),
        tier_name: name.into(),
        family,
        description: description.into(),
        features: features.iter().map(|f| f.to_string()).collect(),
        base_price_minor,
        annual_price_minor,
        currency: Currency::Zar,
        trial_days: 14,
        promo_months: 3,
        promo_discount_bps: 7_500,
        max_users: None,
        max_assets: None,
        max_corridors: None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn custom(id: &str, bps: u32) -> PricingTier {
        let mut t = tier(id, "Custom", TierFamily::EnterpriseSuite, "", &[], 100_000, 0);
        t.promo_discount_bps = bps;
        t
    }

    #[test]
    fn test_builtin_catalog() {
        let catalog = PricingCatalog::builtin();
        assert_eq!(catalog.len(), 5);
        assert_eq!(catalog.tiers()[0].id, "procurement_basic");

        let hr = catalog.get_tier("hr_compliance_standard").unwrap();
        assert_eq!(hr.base_price_minor, 49_900);
        assert_eq!(hr.max_users, Some(1000));
        assert_eq!(hr.trial_days, 14);
        assert_eq!(hr.promo_months, 3);
        // R499 at 75% off = R124.75
        assert_eq!(hr.promo_price_minor(), 12_475);
    }

    #[test]
    fn test_unknown_tier_is_not_found() {
        let catalog = PricingCatalog::builtin();
        let err = catalog.get_tier("platinum").unwrap_err();
        assert!(matches!(err, BillingError::TierNotFound(ref id) if id == "platinum"));
    }

    #[test]
    fn test_from_tiers_validation() {
        assert!(PricingCatalog::from_tiers(vec![custom("a", 7_500), custom("b", 0)]).is_ok());

        let dup = PricingCatalog::from_tiers(vec![custom("a", 7_500), custom("a", 5_000)]);
        assert!(matches!(dup, Err(BillingError::Config(_))));

        let full_discount = PricingCatalog::from_tiers(vec![custom("a", 10_000)]);
        assert!(matches!(full_discount, Err(BillingError::Config(_))));

        let blank = PricingCatalog::from_tiers(vec![custom("  ", 0)]);
        assert!(matches!(blank, Err(BillingError::Config(_))));

        let mut huge = custom("a", 7_500);
        huge.base_price_minor = u64::MAX;
        let huge = PricingCatalog::from_tiers(vec![huge]);
        assert!(matches!(huge, Err(BillingError::Config(_))));

        let mut ceiling = custom("a", 7_500);
        ceiling.base_price_minor = MAX_PRICE_MINOR;
        assert!(PricingCatalog::from_tiers(vec![ceiling]).is_ok());
    }

    #[test]
    fn test_from_json_file() {
        let path = std::env::temp_dir().join(format!("azora-catalog-{}.json", uuid::Uuid::new_v4()));
        let body = serde_json::json!({
            "tiers": [{
                "id": "starter",
                "tier_name": "Starter",
                "family": "enterprise_suite",
                "base_price_minor": 100000,
                "currency": "ZAR",
                "trial_days": 14,
                "promo_months": 3,
                "promo_discount_bps": 7500
            }]
        });
        std::fs::write(&path, body.to_string()).unwrap();

        let catalog = PricingCatalog::from_json_file(&path).unwrap();
        let starter = catalog.get_tier("starter").unwrap();
        assert_eq!(starter.promo_price_minor(), 25_000);
        assert!(starter.features.is_empty());
        assert_eq!(starter.max_users, None);

        std::fs::remove_file(&path).unwrap();
        assert!(matches!(
            PricingCatalog::from_json_file(&path),
            Err(BillingError::Io(_))
        ));
    }
}
