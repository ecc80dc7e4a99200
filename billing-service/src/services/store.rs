//! Persistence seams used by the reconciler.

use async_trait::async_trait;
use service_core::error::AppError;
use uuid::Uuid;

use crate::models::{BillingRecord, BillingUpdate, NewBillingRecord, User};

/// Billing record storage.
#[async_trait]
pub trait BillingStore: Send + Sync {
    /// Cheap connectivity probe for health endpoints.
    async fn health_check(&self) -> Result<(), AppError>;

    /// All records of a user, newest first.
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<BillingRecord>, AppError>;

    /// The user's most recent record, if any.
    async fn latest_for_user(&self, user_id: &str) -> Result<Option<BillingRecord>, AppError>;

    async fn insert(&self, record: NewBillingRecord) -> Result<BillingRecord, AppError>;

    /// Partial update; `NotFound` when the id does not exist.
    async fn update(&self, id: Uuid, update: BillingUpdate) -> Result<BillingRecord, AppError>;
}

/// User lookup.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_user(&self, user_id: &str) -> Result<Option<User>, AppError>;
}
