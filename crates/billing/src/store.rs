//! Record store the subscription manager writes through.
//!
//! Every mutation goes through `compare_and_swap` on the record's `version`,
//! so concurrent writers to one subscription cannot lose updates. The DashMap
//! store performs the swap under the key's shard lock; a database store
//! should use `UPDATE ... WHERE id = $1 AND version = $2`.

use azora_core::error::{BillingError, BillingResult};
use azora_core::types::Subscription;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::info;
use uuid::Uuid;

/// Keyed record store for subscriptions.
pub trait SubscriptionStore: Send + Sync {
    /// Fetch a record by id.
    fn get(&self, id: Uuid) -> BillingResult<Option<Subscription>>;

    /// Insert a new record. Fails if the id is already taken.
    fn insert(&self, subscription: Subscription) -> BillingResult<Subscription>;

    /// Replace the stored record if its version still equals
    /// `expected_version`. On success returns the stored record with its
    /// version bumped; returns `None` when another writer got there first.
    fn compare_and_swap(
        &self,
        expected_version: u64,
        subscription: Subscription,
    ) -> BillingResult<Option<Subscription>>;

    /// Ids of every stored record.
    fn ids(&self) -> BillingResult<Vec<Uuid>>;

    /// All records belonging to an organization.
    fn list_by_organization(&self, organization_id: &str) -> BillingResult<Vec<Subscription>>;
}

/// In-memory store backed by `DashMap`.
pub struct InMemorySubscriptionStore {
    records: DashMap<Uuid, Subscription>,
}

impl Default for InMemorySubscriptionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemorySubscriptionStore {
    pub fn new() -> Self {
        info!("Subscription store initialized (in-memory, development mode)");
        Self {
            records: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl SubscriptionStore for InMemorySubscriptionStore {
    fn get(&self, id: Uuid) -> BillingResult<Option<Subscription>> {
        Ok(self.records.get(&id).map(|r| r.value().clone()))
    }

    fn insert(&self, mut subscription: Subscription) -> BillingResult<Subscription> {
        match self.records.entry(subscription.id) {
            Entry::Occupied(_) => Err(BillingError::Validation(format!(
                "subscription {} already exists",
                subscription.id
            ))),
            Entry::Vacant(slot) => {
                subscription.version = 1;
                slot.insert(subscription.clone());
                Ok(subscription)
            }
        }
    }

    fn compare_and_swap(
        &self,
        expected_version: u64,
        mut subscription: Subscription,
    ) -> BillingResult<Option<Subscription>> {
        let mut stored = self
            .records
            .get_mut(&subscription.id)
            .ok_or(BillingError::SubscriptionNotFound(subscription.id))?;
        if stored.version != expected_version {
            return Ok(None);
        }
        subscription.version = expected_version + 1;
        *stored = subscription.clone();
        Ok(Some(subscription))
    }

    fn ids(&self) -> BillingResult<Vec<Uuid>> {
        Ok(self.records.iter().map(|r| *r.key()).collect())
    }

    fn list_by_organization(&self, organization_id: &str) -> BillingResult<Vec<Subscription>> {
        Ok(self
            .records
            .iter()
            .filter(|r| r.value().organization_id == organization_id)
            .map(|r| r.value().clone())
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
