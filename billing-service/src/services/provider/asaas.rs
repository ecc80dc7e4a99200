//! Asaas subscription-billing client.
//!
//! Implements the customer, subscription and subscription-payment endpoints of
//! the Asaas v3 REST API.

use super::BillingProvider;
use crate::config::AsaasConfig;
use crate::models::{ProviderCustomer, ProviderPayment, ProviderSubscription, SubscriptionRequest};
use crate::services::metrics::record_provider_error;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, TimeDelta, Utc};
use reqwest::{Client, RequestBuilder, Url};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

/// Asaas client for interacting with the Asaas API.
#[derive(Clone)]
pub struct AsaasClient {
    client: Client,
    config: AsaasConfig,
}

#[derive(Debug, Serialize)]
struct CreateCustomerRequest<'a> {
    name: &'a str,
    email: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateSubscriptionRequest<'a> {
    customer: &'a str,
    billing_type: &'a str,
    /// Amount in reais.
    value: f64,
    next_due_date: NaiveDate,
    cycle: &'static str,
    description: String,
    external_reference: &'a str,
}

/// Paginated list envelope.
#[derive(Debug, Deserialize)]
struct PaymentList {
    #[serde(default)]
    data: Vec<ProviderPayment>,
}

/// Asaas API error response.
#[derive(Debug, Default, Deserialize)]
struct AsaasError {
    #[serde(default)]
    errors: Vec<AsaasErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct AsaasErrorDetail {
    code: Option<String>,
    description: Option<String>,
}

impl AsaasError {
    fn message(&self, fallback: &str) -> String {
        let parts: Vec<String> = self
            .errors
            .iter()
            .map(|e| match (&e.code, &e.description) {
                (Some(code), Some(description)) => format!("{} - {}", code, description),
                (None, Some(description)) => description.clone(),
                (Some(code), None) => code.clone(),
                (None, None) => "unknown error".to_string(),
            })
            .collect();

        if parts.is_empty() {
            fallback.to_string()
        } else {
            parts.join("; ")
        }
    }
}

impl AsaasClient {
    /// Create a new Asaas client.
    pub fn new(config: AsaasConfig) -> Self {
        let client = Client::builder()
            .user_agent(concat!("billing-service/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self { client, config }
    }

    /// Check if Asaas is configured (API key is set).
    pub fn is_configured(&self) -> bool {
        !self.config.api_base_url.is_empty() && !self.config.api_key.expose_secret().is_empty()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base_url.trim_end_matches('/'), path)
    }

    /// First due date: today plus the configured offset.
    fn next_due_date(&self) -> Result<NaiveDate> {
        let days = self.config.due_in_days;
        TimeDelta::try_days(days)
            .and_then(|offset| Utc::now().date_naive().checked_add_signed(offset))
            .ok_or_else(|| anyhow!("Invalid due date offset: {} days", days))
    }

    /// `/subscriptions/{id}/payments` with the id as a single encoded segment.
    fn payments_url(&self, subscription_id: &str) -> Result<Url> {
        let mut url = Url::parse(&self.url("/subscriptions"))?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("Asaas API URL cannot have a path"))?
            .push(subscription_id)
            .push("payments");
        Ok(url)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.header("access_token", self.config.api_key.expose_secret().as_str())
    }

    /// Send a request and return the body of a successful response.
    async fn send(&self, request: RequestBuilder, operation: &'static str) -> Result<String> {
        if !self.is_configured() {
            return Err(anyhow!("Asaas credentials not configured"));
        }

        let response = match self.authorized(request).send().await {
            Ok(response) => response,
            Err(e) => {
                record_provider_error(operation);
                return Err(anyhow!("Asaas request failed: {}", e));
            }
        };

        let status = response.status();
        let body = response.text().await?;

        tracing::debug!(operation, status = %status, "Asaas response");

        if status.is_success() {
            return Ok(body);
        }

        record_provider_error(operation);
        let error: AsaasError = serde_json::from_str(&body).unwrap_or_default();
        let message = error.message(&body);
        tracing::error!(operation, status = %status, error = %message, "Asaas request rejected");

        Err(anyhow!("Asaas error: {}", message))
    }
}

#[async_trait]
impl BillingProvider for AsaasClient {
    async fn create_customer(&self, name: &str, email: &str) -> Result<ProviderCustomer> {
        let request = self
            .client
            .post(self.url("/customers"))
            .json(&CreateCustomerRequest { name, email });

        let body = self.send(request, "create_customer").await?;
        let customer: ProviderCustomer = serde_json::from_str(&body)?;

        tracing::info!(customer_id = %customer.id, "Asaas customer created");
        Ok(customer)
    }

    async fn create_subscription(
        &self,
        request: &SubscriptionRequest,
    ) -> Result<ProviderSubscription> {
        let payload = CreateSubscriptionRequest {
            customer: &request.customer_id,
            billing_type: &self.config.billing_type,
            value: request.amount_cents as f64 / 100.0,
            next_due_date: self.next_due_date()?,
            cycle: request.cycle.as_str(),
            description: format!("Plan {}", request.plan_id),
            external_reference: &request.plan_id,
        };

        let http_request = self.client.post(self.url("/subscriptions")).json(&payload);
        let body = self.send(http_request, "create_subscription").await?;
        let subscription = ProviderSubscription::from_raw(serde_json::from_str(&body)?)?;

        tracing::info!(
            subscription_id = %subscription.id,
            customer_id = %request.customer_id,
            cycle = request.cycle.as_str(),
            "Asaas subscription created"
        );
        Ok(subscription)
    }

    async fn list_subscription_payments(
        &self,
        subscription_id: &str,
    ) -> Result<Vec<ProviderPayment>> {
        let request = self.client.get(self.payments_url(subscription_id)?);

        let body = self.send(request, "list_subscription_payments").await?;
        let list: PaymentList = serde_json::from_str(&body)?;

        Ok(list.data)
    }
}
