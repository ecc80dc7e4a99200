//! Test helper module for billing-service integration tests.
//!
//! Spawns the HTTP router on a random port backed by in-memory persistence and
//! a `wiremock` stand-in for the Asaas API. PostgreSQL tests use their own
//! schema and need `TEST_DATABASE_URL`.

#![allow(dead_code)]

use async_trait::async_trait;
use billing_service::config::AsaasConfig;
use billing_service::models::{
    BillingCycle, BillingRecord, BillingStatus, BillingUpdate, NewBillingRecord, User,
};
use billing_service::services::{
    init_metrics, AsaasClient, BillingReconciler, BillingStore, Database, UserDirectory,
};
use billing_service::startup::{build_router, AppState};
use chrono::{Duration, Utc};
use secrecy::Secret;
use service_core::error::AppError;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;
use wiremock::MockServer;

pub const TEST_USER_ID: &str = "user-1";

// Counter for unique schema names
static SCHEMA_COUNTER: AtomicU32 = AtomicU32::new(0);

/// Billing store kept in a vector.
#[derive(Default)]
pub struct InMemoryBillingStore {
    records: Mutex<Vec<BillingRecord>>,
    unavailable: AtomicBool,
}

impl InMemoryBillingStore {
    pub fn seed(&self, record: BillingRecord) {
        self.records.lock().unwrap().push(record);
    }

    pub fn get(&self, id: Uuid) -> Option<BillingRecord> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.id == id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    /// Make every call fail as if the database were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), AppError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::DatabaseError(anyhow::anyhow!("connection refused")));
        }
        Ok(())
    }
}

#[async_trait]
impl BillingStore for InMemoryBillingStore {
    async fn health_check(&self) -> Result<(), AppError> {
        self.check()
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<BillingRecord>, AppError> {
        self.check()?;
        let mut records: Vec<_> = self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(records)
    }

    async fn latest_for_user(&self, user_id: &str) -> Result<Option<BillingRecord>, AppError> {
        Ok(self.list_for_user(user_id).await?.into_iter().next())
    }

    async fn insert(&self, record: NewBillingRecord) -> Result<BillingRecord, AppError> {
        self.check()?;
        let now = Utc::now();
        let record = BillingRecord {
            id: Uuid::new_v4(),
            user_id: record.user_id,
            plan_id: record.plan_id,
            cycle: record.cycle,
            status: record.status,
            provider_customer_id: record.provider_customer_id,
            provider_subscription_id: record.provider_subscription_id,
            provider_payment_link: record.provider_payment_link,
            price_cents: record.price_cents,
            metadata: record.metadata,
            created_at: now,
            updated_at: now,
        };
        self.records.lock().unwrap().push(record.clone());
        Ok(record)
    }

    async fn update(&self, id: Uuid, update: BillingUpdate) -> Result<BillingRecord, AppError> {
        self.check()?;
        let mut records = self.records.lock().unwrap();
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Billing {} not found", id)))?;
        update.apply_to(record);
        record.updated_at = Utc::now();
        Ok(record.clone())
    }
}

/// Users known to the test app.
#[derive(Default)]
pub struct InMemoryUsers {
    users: Vec<User>,
}

impl InMemoryUsers {
    pub fn with_test_user() -> Self {
        Self {
            users: vec![User {
                id: TEST_USER_ID.to_string(),
                name: "Ana Souza".to_string(),
                email: "ana@example.com".to_string(),
            }],
        }
    }
}

#[async_trait]
impl UserDirectory for InMemoryUsers {
    async fn find_user(&self, user_id: &str) -> Result<Option<User>, AppError> {
        Ok(self.users.iter().find(|u| u.id == user_id).cloned())
    }
}

pub fn asaas_config(base_url: &str) -> AsaasConfig {
    AsaasConfig {
        api_key: Secret::new("test_api_key".to_string()),
        api_base_url: base_url.to_string(),
        billing_type: "UNDEFINED".to_string(),
        due_in_days: 0,
    }
}

/// A pending monthly record for the test user, `age_minutes` old.
pub fn billing_record(
    subscription_id: Option<&str>,
    payment_link: Option<&str>,
    age_minutes: i64,
) -> BillingRecord {
    let created_at = Utc::now() - Duration::minutes(age_minutes);
    BillingRecord {
        id: Uuid::new_v4(),
        user_id: TEST_USER_ID.to_string(),
        plan_id: "pro".to_string(),
        cycle: BillingCycle::Monthly,
        status: BillingStatus::Pending,
        provider_customer_id: Some("cus_existing".to_string()),
        provider_subscription_id: subscription_id.map(str::to_string),
        provider_payment_link: payment_link.map(str::to_string),
        price_cents: Some(1990),
        metadata: None,
        created_at,
        updated_at: created_at,
    }
}

/// Test application wrapper for integration tests.
pub struct TestApp {
    pub address: String,
    pub store: Arc<InMemoryBillingStore>,
    pub asaas: MockServer,
    pub client: reqwest::Client,
}

impl TestApp {
    /// Spawn a new test application on a random port.
    pub async fn spawn() -> Self {
        init_metrics();

        let asaas = MockServer::start().await;
        let store = Arc::new(InMemoryBillingStore::default());
        let provider = Arc::new(AsaasClient::new(asaas_config(&asaas.uri())));
        let reconciler =
            BillingReconciler::new(store.clone(), Arc::new(InMemoryUsers::with_test_user()), provider);

        let router = build_router(AppState {
            store: store.clone(),
            reconciler: Arc::new(reconciler),
        });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind random port");
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            axum::serve(listener, router).await.ok();
        });

        TestApp {
            address: format!("http://127.0.0.1:{}", port),
            store,
            asaas,
            client: reqwest::Client::new(),
        }
    }

    pub async fn get_billing(&self, query: &str) -> reqwest::Response {
        self.client
            .get(format!("{}/billing{}", self.address, query))
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn post_billing(&self, body: serde_json::Value) -> reqwest::Response {
        self.client
            .post(format!("{}/billing", self.address))
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request")
    }
}

/// Get the database URL for testing, if one is configured.
pub fn test_database_url() -> Option<String> {
    std::env::var("TEST_DATABASE_URL").ok().filter(|s| !s.is_empty())
}

/// Migrated PostgreSQL database living in a throwaway schema.
pub struct TestDatabase {
    pub db: Database,
    base_url: String,
    schema_name: String,
}

impl TestDatabase {
    /// Panics when `TEST_DATABASE_URL` is not set.
    pub async fn connect() -> Self {
        let base_url = test_database_url()
            .expect("TEST_DATABASE_URL must be set to run PostgreSQL tests");
        let counter = SCHEMA_COUNTER.fetch_add(1, Ordering::SeqCst);
        let schema_name = format!("test_billing_{}_{}", std::process::id(), counter);

        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(1)
            .connect(&base_url)
            .await
            .expect("Failed to connect to test database");
        sqlx::query(&format!("CREATE SCHEMA {}", schema_name))
            .execute(&pool)
            .await
            .expect("Failed to create test schema");
        pool.close().await;

        let separator = if base_url.contains('?') { "&" } else { "?" };
        let url = format!(
            "{}{}options=-c search_path%3D{}",
            base_url, separator, schema_name
        );

        let db = Database::new(&url, 2, 1)
            .await
            .expect("Failed to create test database");
        db.run_migrations().await.expect("Failed to run migrations");

        Self {
            db,
            base_url,
            schema_name,
        }
    }

    pub async fn insert_user(&self, id: &str) {
        sqlx::query("INSERT INTO users (id, name, email) VALUES ($1, $2, $3)")
            .bind(id)
            .bind("Ana Souza")
            .bind(format!("{}@example.com", id))
            .execute(self.db.pool())
            .await
            .expect("Failed to insert user");
    }

    /// Drop the test schema.
    pub async fn cleanup(self) {
        self.db.pool().close().await;

        if let Ok(pool) = sqlx::postgres::PgPoolOptions::new()
            .max_connections(1)
            .connect(&self.base_url)
            .await
        {
            let _ = sqlx::query(&format!(
                "DROP SCHEMA IF EXISTS {} CASCADE",
                self.schema_name
            ))
            .execute(&pool)
            .await;
            pool.close().await;
        }
    }
}
