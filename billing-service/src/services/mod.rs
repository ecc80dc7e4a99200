//! Services module for billing-service.

pub mod database;
pub mod links;
pub mod metrics;
pub mod provider;
pub mod reconciler;
pub mod store;

pub use database::Database;
pub use links::{resolve_payment_link, scan_subscription_link};
pub use metrics::{get_metrics, init_metrics};
pub use provider::{AsaasClient, BillingProvider};
pub use reconciler::{BillingOutcome, BillingOverview, BillingReconciler, CreateBilling};
pub use store::{BillingStore, UserDirectory};
