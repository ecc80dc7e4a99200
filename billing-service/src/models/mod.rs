//! Domain models for billing-service.

mod billing;
mod provider;
mod user;

pub use billing::{
    non_empty, BillingCycle, BillingRecord, BillingStatus, BillingUpdate, NewBillingRecord,
    ProviderSnapshot, SnapshotSource,
};
pub use provider::{
    PixDetails, ProviderCustomer, ProviderPayment, ProviderSubscription, SubscriptionRequest,
};
pub use user::User;
