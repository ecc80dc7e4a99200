//! Database service for billing-service.

use crate::models::{
    BillingCycle, BillingRecord, BillingStatus, BillingUpdate, NewBillingRecord, User,
};
use crate::services::metrics::QueryTimer;
use crate::services::store::{BillingStore, UserDirectory};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

const BILLING_COLUMNS: &str = "id, user_id, plan_id, cycle, status, provider_customer_id, \
     provider_subscription_id, provider_payment_link, price_cents, metadata, created_at, updated_at";

/// Row shape of the `billings` table; status and cycle are stored as text.
#[derive(Debug, FromRow)]
struct BillingRow {
    id: Uuid,
    user_id: String,
    plan_id: String,
    cycle: String,
    status: String,
    provider_customer_id: Option<String>,
    provider_subscription_id: Option<String>,
    provider_payment_link: Option<String>,
    price_cents: Option<i64>,
    metadata: Option<serde_json::Value>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<BillingRow> for BillingRecord {
    fn from(row: BillingRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            plan_id: row.plan_id,
            cycle: BillingCycle::from_string(&row.cycle),
            status: BillingStatus::from_string(&row.status),
            provider_customer_id: row.provider_customer_id,
            provider_subscription_id: row.provider_subscription_id,
            provider_payment_link: row.provider_payment_link,
            price_cents: row.price_cents,
            metadata: row.metadata,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "billing-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }
}

#[async_trait]
impl BillingStore for Database {
    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), AppError> {
        let _timer = QueryTimer::start("health_check");

        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<BillingRecord>, AppError> {
        let _timer = QueryTimer::start("list_billings");

        let rows = sqlx::query_as::<_, BillingRow>(&format!(
            "SELECT {BILLING_COLUMNS} FROM billings WHERE user_id = $1 ORDER BY created_at DESC, id DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list billings: {}", e)))?;

        Ok(rows.into_iter().map(BillingRecord::from).collect())
    }

    #[instrument(skip(self))]
    async fn latest_for_user(&self, user_id: &str) -> Result<Option<BillingRecord>, AppError> {
        let _timer = QueryTimer::start("latest_billing");

        let row = sqlx::query_as::<_, BillingRow>(&format!(
            "SELECT {BILLING_COLUMNS} FROM billings WHERE user_id = $1 ORDER BY created_at DESC, id DESC LIMIT 1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to get latest billing: {}", e))
        })?;

        Ok(row.map(BillingRecord::from))
    }

    #[instrument(skip(self, record), fields(user_id = %record.user_id, plan_id = %record.plan_id))]
    async fn insert(&self, record: NewBillingRecord) -> Result<BillingRecord, AppError> {
        let _timer = QueryTimer::start("insert_billing");

        let row = sqlx::query_as::<_, BillingRow>(&format!(
            r#"
            INSERT INTO billings (id, user_id, plan_id, cycle, status, provider_customer_id,
                provider_subscription_id, provider_payment_link, price_cents, metadata)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {BILLING_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&record.user_id)
        .bind(&record.plan_id)
        .bind(record.cycle.as_str())
        .bind(record.status.as_str())
        .bind(&record.provider_customer_id)
        .bind(&record.provider_subscription_id)
        .bind(&record.provider_payment_link)
        .bind(record.price_cents)
        .bind(&record.metadata)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to create billing: {}", e)))?;

        info!(billing_id = %row.id, status = %row.status, "Billing created");

        Ok(row.into())
    }

    #[instrument(skip(self, update))]
    async fn update(&self, id: Uuid, update: BillingUpdate) -> Result<BillingRecord, AppError> {
        let _timer = QueryTimer::start("update_billing");

        let row = sqlx::query_as::<_, BillingRow>(&format!(
            r#"
            UPDATE billings
            SET status = COALESCE($2, status),
                provider_payment_link = COALESCE($3, provider_payment_link),
                metadata = COALESCE($4, metadata),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {BILLING_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(update.status.map(|s| s.as_str()))
        .bind(&update.provider_payment_link)
        .bind(&update.metadata)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update billing: {}", e)))?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Billing {} not found", id)))?;

        Ok(row.into())
    }
}

#[async_trait]
impl UserDirectory for Database {
    #[instrument(skip(self))]
    async fn find_user(&self, user_id: &str) -> Result<Option<User>, AppError> {
        let _timer = QueryTimer::start("find_user");

        sqlx::query_as::<_, User>("SELECT id, name, email FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get user: {}", e)))
    }
}
