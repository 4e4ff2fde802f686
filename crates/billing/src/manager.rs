//! Subscription manager. Owns creation, lazy phase materialization,
//! cancellation, usage recording and the periodic transition sweep.
//!
//! Every mutation is a read → compute → compare-and-swap loop, so a retried
//! webhook racing a sweep cannot lose an update, and events are emitted only
//! after the winning write.

use crate::catalog::PricingCatalog;
use crate::notification::{NotificationDecision, NotificationPolicy};
use crate::phase;
use crate::store::SubscriptionStore;
use azora_core::config::BillingConfig;
use azora_core::error::{BillingError, BillingResult};
use azora_core::event_bus::{make_event, EventSink};
use azora_core::types::{
    CreateSubscriptionRequest, Phase, Subscription, SubscriptionEventType, SubscriptionStatus,
    UsageUpdate,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Result of one `process_transition` call.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TransitionOutcome {
    pub subscription: Subscription,
    pub changed: bool,
    pub events: Vec<SubscriptionEventType>,
    pub message: String,
}

/// Pricing read-model for a single subscription.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SubscriptionView {
    pub subscription: Subscription,
    pub current_phase: Phase,
    pub days_left_in_phase: i64,
    pub current_monthly_price: u64,
    pub full_monthly_price: u64,
    pub savings_per_month: u64,
    pub next_phase: Option<Phase>,
    pub next_phase_price: Option<u64>,
}

/// A subscription the sweep could not process.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SweepFailure {
    pub subscription_id: Uuid,
    pub error: String,
}

/// Summary of one pass over every stored subscription.
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct SweepReport {
    pub processed: usize,
    pub transitioned: usize,
    pub skipped_cancelled: usize,
    pub failures: Vec<SweepFailure>,
}

/// Pending event produced while planning a transition.
struct PlannedEvent {
    event_type: SubscriptionEventType,
    metadata: serde_json::Value,
}

// ---------------------------------------------------------------------------
// Manager
// ---------------------------------------------------------------------------

/// Orchestrates the subscription lifecycle over an injected store and sink.
pub struct SubscriptionManager {
    catalog: Arc<PricingCatalog>,
    store: Arc<dyn SubscriptionStore>,
    events: Arc<dyn EventSink>,
    policy: NotificationPolicy,
    max_write_retries: u32,
}

impl SubscriptionManager {
    pub fn new(
        catalog: Arc<PricingCatalog>,
        store: Arc<dyn SubscriptionStore>,
        events: Arc<dyn EventSink>,
        config: &BillingConfig,
    ) -> Self {
        info!(
            tiers = catalog.len(),
            trial_notice_days = config.trial_notice_days,
            promo_notice_days = config.promo_notice_days,
            "SubscriptionManager initialized"
        );
        Self {
            catalog,
            store,
            events,
            policy: NotificationPolicy::from_config(config),
            max_write_retries: config.max_write_retries.max(1),
        }
    }

    pub fn catalog(&self) -> &PricingCatalog {
        &self.catalog
    }

    /// Start a subscription in its trial phase. All phase boundaries are
    /// fixed here and never recomputed.
    pub fn create(
        &self,
        request: CreateSubscriptionRequest,
        now: DateTime<Utc>,
    ) -> BillingResult<Subscription> {
        if request.user_id.trim().is_empty() {
            return Err(BillingError::Validation("user_id must not be empty".into()));
        }
        if request.organization_id.trim().is_empty() {
            return Err(BillingError::Validation(
                "organization_id must not be empty".into(),
            ));
        }
        let tier = self.catalog.get_tier(&request.tier_id)?;

        let trial_end = phase::trial_end(now, tier.trial_days);
        let promo_end = phase::promo_end(trial_end, tier.promo_months);

        let subscription = Subscription {
            id: Uuid::new_v4(),
            user_id: request.user_id,
            organization_id: request.organization_id,
            tier_id: tier.id.clone(),
            billing_interval: request.interval,
            status: SubscriptionStatus::Trial,
            created_at: now,
            trial_start_date: now,
            trial_end_date: trial_end,
            promo_start_date: trial_end,
            promo_end_date: promo_end,
            current_period_start: now,
            current_period_end: trial_end,
            base_amount_minor: tier.base_price_minor,
            promo_amount_minor: tier.promo_price_minor(),
            current_amount_minor: 0,
            currency: tier.currency,
            cancelled_at: None,
            cancellation_reason: None,
            users_count: 0,
            assets_count: 0,
            corridors_count: 0,
            transaction_volume_minor: 0,
            version: 0,
            updated_at: now,
        };
        let stored = self.store.insert(subscription)?;

        info!(
            subscription_id = %stored.id,
            tier_id = %stored.tier_id,
            organization_id = %stored.organization_id,
            trial_end = %stored.trial_end_date,
            promo_end = %stored.promo_end_date,
            "Subscription created"
        );
        metrics::counter!("billing.subscriptions.created").increment(1);

        self.events.emit(make_event(
            SubscriptionEventType::TrialStarted,
            stored.id,
            json!({
                "tier_id": stored.tier_id,
                "trial_end_date": stored.trial_end_date,
                "promo_end_date": stored.promo_end_date,
            }),
            now,
        ));
        Ok(stored)
    }

    pub fn get(&self, id: Uuid) -> BillingResult<Subscription> {
        self.store
            .get(id)?
            .ok_or(BillingError::SubscriptionNotFound(id))
    }

    /// All subscriptions of an organization, newest first.
    pub fn list_for_organization(&self, organization_id: &str) -> BillingResult<Vec<Subscription>> {
        let mut subs = self.store.list_by_organization(organization_id)?;
        subs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(subs)
    }

    /// Bring `status`, price and billing period in line with the phase at
    /// `now`. Safe after any gap: a single call reaches the correct state.
    /// Cancelled subscriptions are rejected.
    pub fn process_transition(&self, id: Uuid, now: DateTime<Utc>) -> BillingResult<TransitionOutcome> {
        for _ in 0..self.max_write_retries {
            let current = self.get(id)?;
            if current.is_cancelled() {
                return Err(BillingError::InvalidTransition {
                    id,
                    status: current.status,
                });
            }

            let Some((next, planned)) = plan_transition(&current, now) else {
                debug!(subscription_id = %id, status = %current.status, "No transition due");
                return Ok(TransitionOutcome {
                    subscription: current,
                    changed: false,
                    events: Vec::new(),
                    message: "No transition needed".to_string(),
                });
            };

            let Some(stored) = self.store.compare_and_swap(current.version, next)? else {
                metrics::counter!("billing.write_conflicts").increment(1);
                continue;
            };

            let message = if current.status == stored.status {
                "Billing period renewed".to_string()
            } else {
                format!("Transitioned from {} to {}", current.status, stored.status)
            };
            info!(
                subscription_id = %id,
                from = %current.status,
                to = %stored.status,
                amount = stored.current_amount_minor,
                period_end = %stored.current_period_end,
                "Subscription transitioned"
            );
            metrics::counter!("billing.transitions").increment(1);

            let mut emitted = Vec::with_capacity(planned.len());
            for event in planned {
                emitted.push(event.event_type);
                self.events
                    .emit(make_event(event.event_type, id, event.metadata, now));
            }

            return Ok(TransitionOutcome {
                subscription: stored,
                changed: true,
                events: emitted,
                message,
            });
        }
        Err(BillingError::Conflict(id))
    }

    /// Cancel from any state. Cancelling twice returns the record unchanged
    /// and emits nothing.
    pub fn cancel(
        &self,
        id: Uuid,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> BillingResult<Subscription> {
        for _ in 0..self.max_write_retries {
            let current = self.get(id)?;
            if current.is_cancelled() {
                debug!(subscription_id = %id, "Subscription already cancelled");
                return Ok(current);
            }

            let mut next = current.clone();
            next.status = SubscriptionStatus::Cancelled;
            next.cancelled_at = Some(now);
            next.cancellation_reason = reason.clone();
            next.current_amount_minor = 0;
            next.updated_at = now;

            let Some(stored) = self.store.compare_and_swap(current.version, next)? else {
                metrics::counter!("billing.write_conflicts").increment(1);
                continue;
            };

            info!(
                subscription_id = %id,
                previous_status = %current.status,
                reason = reason.as_deref().unwrap_or(""),
                "Subscription cancelled"
            );
            metrics::counter!("billing.subscriptions.cancelled").increment(1);
            self.events.emit(make_event(
                SubscriptionEventType::Cancelled,
                id,
                json!({
                    "previous_status": current.status,
                    "reason": reason,
                }),
                now,
            ));
            return Ok(stored);
        }
        Err(BillingError::Conflict(id))
    }

    /// Replace usage counters, enforcing the tier's limits.
    pub fn record_usage(
        &self,
        id: Uuid,
        update: UsageUpdate,
        now: DateTime<Utc>,
    ) -> BillingResult<Subscription> {
        for _ in 0..self.max_write_retries {
            let current = self.get(id)?;
            if current.is_cancelled() {
                return Err(BillingError::InvalidTransition {
                    id,
                    status: current.status,
                });
            }

            let mut next = current.clone();
            if let Some(users) = update.users_count {
                next.users_count = users;
            }
            if let Some(assets) = update.assets_count {
                next.assets_count = assets;
            }
            if let Some(corridors) = update.corridors_count {
                next.corridors_count = corridors;
            }
            if let Some(volume) = update.transaction_volume_minor {
                next.transaction_volume_minor = volume;
            }
            if let Ok(tier) = self.catalog.get_tier(&next.tier_id) {
                check_limit("users", tier.max_users, next.users_count)?;
                check_limit("assets", tier.max_assets, next.assets_count)?;
                check_limit("corridors", tier.max_corridors, next.corridors_count)?;
            }
            next.updated_at = now;

            match self.store.compare_and_swap(current.version, next)? {
                Some(stored) => {
                    debug!(subscription_id = %id, users = stored.users_count, "Usage recorded");
                    return Ok(stored);
                }
                None => {
                    metrics::counter!("billing.write_conflicts").increment(1);
                }
            }
        }
        Err(BillingError::Conflict(id))
    }

    /// Process every stored subscription. A failure on one record is
    /// collected in the report and never stops the sweep.
    pub fn sweep(&self, now: DateTime<Utc>) -> BillingResult<SweepReport> {
        let mut report = SweepReport::default();
        for id in self.store.ids()? {
            match self.process_transition(id, now) {
                Ok(outcome) => {
                    report.processed += 1;
                    if outcome.changed {
                        report.transitioned += 1;
                    }
                }
                Err(BillingError::InvalidTransition { .. }) => report.skipped_cancelled += 1,
                Err(e) => {
                    warn!(subscription_id = %id, error = %e, "Transition sweep failed for subscription");
                    metrics::counter!("billing.sweep.failures").increment(1);
                    report.failures.push(SweepFailure {
                        subscription_id: id,
                        error: e.to_string(),
                    });
                }
            }
        }
        info!(
            processed = report.processed,
            transitioned = report.transitioned,
            skipped = report.skipped_cancelled,
            failed = report.failures.len(),
            "Transition sweep complete"
        );
        Ok(report)
    }

    /// Pricing overview computed from the time-derived phase, not the cached
    /// status.
    pub fn view(&self, id: Uuid, now: DateTime<Utc>) -> BillingResult<SubscriptionView> {
        let subscription = self.get(id)?;
        let current_phase = phase::current_phase(&subscription, now);
        let days_left_in_phase = phase::days_remaining(&subscription, now);
        let full_monthly_price = subscription.base_amount_minor;

        let (current_monthly_price, next_phase) = if subscription.is_cancelled() {
            (0, None)
        } else {
            (
                subscription.price_for_phase(current_phase),
                phase::next_phase(&subscription, current_phase),
            )
        };
        let next_phase_price = next_phase.map(|p| subscription.price_for_phase(p));

        Ok(SubscriptionView {
            current_phase,
            days_left_in_phase,
            current_monthly_price,
            full_monthly_price,
            savings_per_month: full_monthly_price.saturating_sub(current_monthly_price),
            next_phase,
            next_phase_price,
            subscription,
        })
    }

    /// Evaluate the notification policy for a stored subscription.
    pub fn notification(&self, id: Uuid, now: DateTime<Utc>) -> BillingResult<NotificationDecision> {
        let subscription = self.get(id)?;
        Ok(self.policy.should_notify(&subscription, now))
    }
}

fn check_limit(metric: &'static str, limit: Option<u32>, requested: u32) -> BillingResult<()> {
    match limit {
        Some(limit) if requested > limit => Err(BillingError::UsageLimitExceeded {
            metric,
            limit,
            requested,
        }),
        _ => Ok(()),
    }
}

/// Compute the record `current` should become at `now`, with the events for
/// every boundary crossed. `None` when nothing changes.
fn plan_transition(
    current: &Subscription,
    now: DateTime<Utc>,
) -> Option<(Subscription, Vec<PlannedEvent>)> {
    let materialized = current.status.phase()?;
    let target = phase::current_phase(current, now);
    let mut next = current.clone();
    let mut events = Vec::new();

    let anchor = current.promo_end_date;
    let interval = current.billing_interval;

    if target > materialized {
        if materialized == Phase::Trial {
            let entered = phase::next_phase(current, Phase::Trial).unwrap_or(Phase::Full);
            let event_type = if entered == Phase::Promo {
                SubscriptionEventType::PromoStarted
            } else {
                SubscriptionEventType::TrialEnded
            };
            events.push(PlannedEvent {
                event_type,
                metadata: json!({
                    "effective_at": current.trial_end_date,
                    "amount_minor": current.price_for_phase(entered),
                }),
            });
        }
        if target == Phase::Full && current.has_promo() {
            events.push(PlannedEvent {
                event_type: SubscriptionEventType::PromoEnded,
                metadata: json!({
                    "effective_at": current.promo_end_date,
                    "amount_minor": current.base_amount_minor,
                }),
            });
        }

        next.status = target.status();
        next.current_amount_minor = current.price_for_phase(target);
        match target {
            Phase::Promo => {
                next.current_period_start = current.promo_start_date;
                next.current_period_end = current.promo_end_date;
            }
            Phase::Full => {
                let (start, end, index) = phase::billing_period_at(anchor, interval, now);
                events.extend(renewal_events(current, 0, index));
                next.current_period_start = start;
                next.current_period_end = end;
            }
            Phase::Trial => {}
        }
    } else if materialized == Phase::Full && now >= current.current_period_end {
        let (start, end, index) = phase::billing_period_at(anchor, interval, now);
        let (_, _, previous_index) =
            phase::billing_period_at(anchor, interval, current.current_period_start);
        events.extend(renewal_events(current, previous_index, index));
        next.current_period_start = start;
        next.current_period_end = end;
    } else {
        return None;
    }

    next.updated_at = now;
    Some((next, events))
}

/// One `renewed` event per full-price period boundary in
/// `(from_index, to_index]`, so a late catch-up emits the same stream as
/// frequent polling.
fn renewal_events(current: &Subscription, from_index: u32, to_index: u32) -> Vec<PlannedEvent> {
    let anchor = current.promo_end_date;
    let interval = current.billing_interval;
    (from_index + 1..=to_index)
        .map(|index| PlannedEvent {
            event_type: SubscriptionEventType::Renewed,
            metadata: json!({
                "period_index": index,
                "period_start": phase::add_periods(anchor, interval, index),
                "period_end": phase::add_periods(anchor, interval, index + 1),
                "amount_minor": current.base_amount_minor,
            }),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
