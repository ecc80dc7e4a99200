//! Billing provider abstraction.

mod asaas;

pub use asaas::AsaasClient;

use crate::models::{ProviderCustomer, ProviderPayment, ProviderSubscription, SubscriptionRequest};
use crate::services::links::scan_subscription_link;
use async_trait::async_trait;

/// External subscription-billing provider.
///
/// Calls are not retried; every error is reported as-is to the caller.
#[async_trait]
pub trait BillingProvider: Send + Sync {
    async fn create_customer(&self, name: &str, email: &str) -> anyhow::Result<ProviderCustomer>;

    async fn create_subscription(
        &self,
        request: &SubscriptionRequest,
    ) -> anyhow::Result<ProviderSubscription>;

    /// Payments of a subscription, in provider order.
    async fn list_subscription_payments(
        &self,
        subscription_id: &str,
    ) -> anyhow::Result<Vec<ProviderPayment>>;

    /// Link embedded in a freshly created subscription, if the provider sent one.
    fn extract_payment_link(&self, subscription: &ProviderSubscription) -> Option<String> {
        scan_subscription_link(&subscription.raw)
    }
}
