//! Billing reconciliation against the provider.
//!
//! Reads bring local records up to date with the provider (fully on demand,
//! lazily otherwise); creation hands out an existing pending charge when there
//! is one and only talks to the provider when there is not.

use crate::models::{
    BillingCycle, BillingRecord, BillingStatus, BillingUpdate, NewBillingRecord, ProviderPayment,
    ProviderSnapshot, SnapshotSource, SubscriptionRequest,
};
use crate::services::links::resolve_payment_link;
use crate::services::metrics::{
    record_billing_created, record_billing_reused, record_lazy_refresh, record_sync_outcome,
};
use crate::services::provider::BillingProvider;
use crate::services::store::{BillingStore, UserDirectory};
use dashmap::DashMap;
use serde_json::Value;
use service_core::error::AppError;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

/// A user's current billing plus their full history, newest first.
#[derive(Debug, Clone)]
pub struct BillingOverview {
    pub latest: Option<BillingRecord>,
    pub records: Vec<BillingRecord>,
}

/// Validated input for opening a subscription.
#[derive(Debug, Clone)]
pub struct CreateBilling {
    pub user_id: String,
    pub plan_id: String,
    pub cycle: BillingCycle,
    pub amount_cents: Option<i64>,
}

#[derive(Debug, Clone)]
pub enum BillingOutcome {
    /// The latest record was pending with a link; nothing was created.
    Reused(BillingRecord),
    Created {
        record: BillingRecord,
        /// Provider response for the new subscription.
        subscription: Value,
        payment_link: Option<String>,
    },
}

impl BillingOutcome {
    pub fn record(&self) -> &BillingRecord {
        match self {
            BillingOutcome::Reused(record) => record,
            BillingOutcome::Created { record, .. } => record,
        }
    }

    pub fn payment_link(&self) -> Option<&str> {
        match self {
            BillingOutcome::Reused(record) => record.payment_link(),
            BillingOutcome::Created { payment_link, .. } => payment_link.as_deref(),
        }
    }
}

pub struct BillingReconciler {
    store: Arc<dyn BillingStore>,
    users: Arc<dyn UserDirectory>,
    provider: Arc<dyn BillingProvider>,
    /// Per-user creation locks. Only serialises requests inside this process.
    creation_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl BillingReconciler {
    pub fn new(
        store: Arc<dyn BillingStore>,
        users: Arc<dyn UserDirectory>,
        provider: Arc<dyn BillingProvider>,
    ) -> Self {
        Self {
            store,
            users,
            provider,
            creation_locks: DashMap::new(),
        }
    }

    /// Load a user's billings, syncing every record with the provider when `sync` is set.
    #[instrument(skip(self))]
    pub async fn overview(&self, user_id: &str, sync: bool) -> Result<BillingOverview, AppError> {
        let mut records = self.store.list_for_user(user_id).await?;

        if sync {
            for record in &records {
                self.sync_record(record).await;
            }
            records = self.store.list_for_user(user_id).await?;

            return Ok(BillingOverview {
                latest: records.first().cloned(),
                records,
            });
        }

        if let Some(first) = records.first_mut() {
            if let Some(refreshed) = self.refresh_missing_link(first).await {
                *first = refreshed;
            }
        }

        Ok(BillingOverview {
            latest: records.first().cloned(),
            records,
        })
    }

    /// Pull status, link and payments for one record. Failures leave the record as it is.
    async fn sync_record(&self, record: &BillingRecord) {
        let Some(subscription_id) = record.subscription_id() else {
            return;
        };

        let payments = match self.provider.list_subscription_payments(subscription_id).await {
            Ok(payments) => payments,
            Err(e) => {
                record_sync_outcome("failed");
                warn!(billing_id = %record.id, error = %e, "Failed to fetch subscription payments");
                return;
            }
        };

        let update = sync_update(record, &payments);

        match self.store.update(record.id, update).await {
            Ok(updated) => {
                record_sync_outcome("updated");
                info!(billing_id = %updated.id, status = updated.status.as_str(), "Billing synced");
            }
            Err(e) => {
                record_sync_outcome("failed");
                warn!(billing_id = %record.id, error = %e, "Failed to persist synced billing");
            }
        }
    }

    /// Try once to find a link for a record that has a subscription but no link.
    /// Returns the updated record, or `None` when nothing changed.
    async fn refresh_missing_link(&self, record: &BillingRecord) -> Option<BillingRecord> {
        let subscription_id = record.subscription_id()?;
        if record.payment_link().is_some() {
            return None;
        }

        let payments = match self.provider.list_subscription_payments(subscription_id).await {
            Ok(payments) => payments,
            Err(e) => {
                record_lazy_refresh("failed");
                warn!(billing_id = %record.id, error = %e, "Lazy link refresh failed");
                return None;
            }
        };

        let Some(link) = resolve_payment_link(&payments, None) else {
            record_lazy_refresh("no_link");
            return None;
        };

        let update = BillingUpdate {
            provider_payment_link: Some(link),
            ..Default::default()
        };

        match self.store.update(record.id, update).await {
            Ok(updated) => {
                record_lazy_refresh("updated");
                Some(updated)
            }
            Err(e) => {
                record_lazy_refresh("failed");
                warn!(billing_id = %record.id, error = %e, "Failed to persist refreshed link");
                None
            }
        }
    }

    /// Hand out the user's pending charge, or open a new subscription.
    #[instrument(skip(self, request), fields(user_id = %request.user_id, plan_id = %request.plan_id))]
    pub async fn create_or_reuse(&self, request: CreateBilling) -> Result<BillingOutcome, AppError> {
        let user = self
            .users
            .find_user(&request.user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("User not found")))?;

        let lock = self.creation_lock(&request.user_id);
        let outcome = {
            let _guard = lock.lock().await;
            self.create_locked(&request, &user.name, &user.email).await
        };
        drop(lock);
        self.release_creation_lock(&request.user_id);

        outcome
    }

    async fn create_locked(
        &self,
        request: &CreateBilling,
        name: &str,
        email: &str,
    ) -> Result<BillingOutcome, AppError> {
        let previous = self.store.latest_for_user(&request.user_id).await?;

        if let Some(previous) = previous.as_ref().filter(|p| p.is_reusable()) {
            record_billing_reused();
            info!(billing_id = %previous.id, "Reusing pending billing");
            return Ok(BillingOutcome::Reused(previous.clone()));
        }

        let customer_id = match previous.as_ref().and_then(|p| p.customer_id()) {
            Some(id) => id.to_string(),
            None => {
                self.provider
                    .create_customer(name, email)
                    .await
                    .map_err(AppError::ProcessingError)?
                    .id
            }
        };

        let subscription = self
            .provider
            .create_subscription(&SubscriptionRequest {
                customer_id: customer_id.clone(),
                plan_id: request.plan_id.clone(),
                amount_cents: request.amount_cents.unwrap_or(0),
                cycle: request.cycle,
            })
            .await
            .map_err(AppError::ProcessingError)?;

        let mut payment_link = subscription
            .payment_link()
            .map(str::to_string)
            .or_else(|| self.provider.extract_payment_link(&subscription));
        let mut snapshot = ProviderSnapshot::new(SnapshotSource::Subscription, subscription.raw.clone());

        if payment_link.is_none() {
            match self.provider.list_subscription_payments(&subscription.id).await {
                Ok(payments) => {
                    payment_link = resolve_payment_link(&payments, None);
                    snapshot = payments_snapshot(&payments);
                }
                Err(e) => {
                    warn!(subscription_id = %subscription.id, error = %e, "Could not fetch payments for new subscription");
                }
            }
        }

        let status = BillingStatus::from_provider_status(subscription.status.as_deref());
        let record = self
            .store
            .insert(NewBillingRecord {
                user_id: request.user_id.clone(),
                plan_id: request.plan_id.clone(),
                cycle: request.cycle,
                status,
                provider_customer_id: Some(customer_id),
                provider_subscription_id: Some(subscription.id.clone()),
                provider_payment_link: payment_link.clone(),
                price_cents: request.amount_cents.filter(|cents| *cents != 0),
                metadata: Some(snapshot.into_value()),
            })
            .await
            .map_err(|e| AppError::ProcessingError(anyhow::anyhow!("{}", e)))?;

        record_billing_created(status.as_str());
        info!(billing_id = %record.id, status = status.as_str(), "Billing created");

        Ok(BillingOutcome::Created {
            record,
            subscription: subscription.raw,
            payment_link,
        })
    }

    fn creation_lock(&self, user_id: &str) -> Arc<Mutex<()>> {
        self.creation_locks
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn release_creation_lock(&self, user_id: &str) {
        self.creation_locks
            .remove_if(user_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

/// Changes a successful payment fetch implies for a record.
fn sync_update(record: &BillingRecord, payments: &[ProviderPayment]) -> BillingUpdate {
    let provider_status = payments
        .first()
        .and_then(|p| p.status())
        .unwrap_or(record.status.as_str());

    BillingUpdate {
        status: Some(BillingStatus::from_provider_status(Some(provider_status))),
        provider_payment_link: resolve_payment_link(payments, record.payment_link()),
        metadata: (!payments.is_empty()).then(|| payments_snapshot(payments).into_value()),
    }
}

fn payments_snapshot(payments: &[ProviderPayment]) -> ProviderSnapshot {
    ProviderSnapshot::new(
        SnapshotSource::Payments,
        serde_json::to_value(payments).unwrap_or(Value::Null),
    )
}
