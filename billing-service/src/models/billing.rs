//! Local billing record and its normalized vocabularies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Local billing status.
///
/// The provider is the source of truth, so no value is terminal: a later sync
/// may move a record from any status to any other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BillingStatus {
    Pending,
    Active,
    Cancelled,
    Failed,
}

/// Provider status strings we recognise, upper-cased.
/// Anything outside this table normalizes to `Failed`.
const PROVIDER_STATUS_TABLE: &[(&str, BillingStatus)] = &[
    ("ACTIVE", BillingStatus::Active),
    ("RECEIVED", BillingStatus::Active),
    ("PENDING", BillingStatus::Pending),
    ("AWAITING", BillingStatus::Pending),
    ("PENDING_PAYMENT", BillingStatus::Pending),
    ("CANCELLED", BillingStatus::Cancelled),
    ("DELETED", BillingStatus::Cancelled),
];

impl BillingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingStatus::Pending => "PENDING",
            BillingStatus::Active => "ACTIVE",
            BillingStatus::Cancelled => "CANCELLED",
            BillingStatus::Failed => "FAILED",
        }
    }

    /// Map a provider status onto the local vocabulary.
    ///
    /// Missing or empty input is `Pending`; matching is case-insensitive; any
    /// unrecognised value is `Failed`.
    pub fn from_provider_status(status: Option<&str>) -> Self {
        let Some(status) = status.filter(|s| !s.is_empty()) else {
            return BillingStatus::Pending;
        };

        PROVIDER_STATUS_TABLE
            .iter()
            .find(|(known, _)| known.eq_ignore_ascii_case(status))
            .map(|(_, local)| *local)
            .unwrap_or(BillingStatus::Failed)
    }

    /// Parse a stored column value. Unknown values are treated as provider input.
    pub fn from_string(s: &str) -> Self {
        match s {
            "PENDING" => BillingStatus::Pending,
            "ACTIVE" => BillingStatus::Active,
            "CANCELLED" => BillingStatus::Cancelled,
            "FAILED" => BillingStatus::Failed,
            other => BillingStatus::from_provider_status(Some(other)),
        }
    }
}

/// Billing cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BillingCycle {
    Monthly,
    Yearly,
}

impl BillingCycle {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingCycle::Monthly => "MONTHLY",
            BillingCycle::Yearly => "YEARLY",
        }
    }

    /// Parse the cycle a client asked for: exactly `yearly` is yearly, everything else monthly.
    pub fn from_request(s: &str) -> Self {
        if s == "yearly" {
            BillingCycle::Yearly
        } else {
            BillingCycle::Monthly
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "YEARLY" => BillingCycle::Yearly,
            _ => BillingCycle::Monthly,
        }
    }
}

/// A user's billing record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingRecord {
    pub id: Uuid,
    pub user_id: String,
    pub plan_id: String,
    pub cycle: BillingCycle,
    pub status: BillingStatus,
    pub provider_customer_id: Option<String>,
    pub provider_subscription_id: Option<String>,
    pub provider_payment_link: Option<String>,
    pub price_cents: Option<i64>,
    /// Last provider snapshot, kept for humans only.
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BillingRecord {
    pub fn customer_id(&self) -> Option<&str> {
        non_empty(self.provider_customer_id.as_deref())
    }

    pub fn subscription_id(&self) -> Option<&str> {
        non_empty(self.provider_subscription_id.as_deref())
    }

    pub fn payment_link(&self) -> Option<&str> {
        non_empty(self.provider_payment_link.as_deref())
    }

    /// A pending record with a link can be handed out again instead of charging twice.
    pub fn is_reusable(&self) -> bool {
        self.status == BillingStatus::Pending && self.payment_link().is_some()
    }
}

/// Input for inserting a billing record.
#[derive(Debug, Clone)]
pub struct NewBillingRecord {
    pub user_id: String,
    pub plan_id: String,
    pub cycle: BillingCycle,
    pub status: BillingStatus,
    pub provider_customer_id: Option<String>,
    pub provider_subscription_id: Option<String>,
    pub provider_payment_link: Option<String>,
    pub price_cents: Option<i64>,
    pub metadata: Option<serde_json::Value>,
}

/// Partial update. `None` leaves the column as it is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BillingUpdate {
    pub status: Option<BillingStatus>,
    pub provider_payment_link: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

impl BillingUpdate {
    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.provider_payment_link.is_none() && self.metadata.is_none()
    }

    /// Apply to an in-memory copy the same way the store applies it to a row.
    pub fn apply_to(&self, record: &mut BillingRecord) {
        if let Some(status) = self.status {
            record.status = status;
        }
        if let Some(link) = &self.provider_payment_link {
            record.provider_payment_link = Some(link.clone());
        }
        if let Some(metadata) = &self.metadata {
            record.metadata = Some(metadata.clone());
        }
    }
}

/// Where a metadata snapshot came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotSource {
    Payments,
    Subscription,
}

/// Versioned envelope around a raw provider response.
///
/// Written into `metadata` and never read back by the service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSnapshot {
    pub version: u32,
    pub source: SnapshotSource,
    pub captured_at: DateTime<Utc>,
    pub data: serde_json::Value,
}

impl ProviderSnapshot {
    pub const VERSION: u32 = 1;

    pub fn new(source: SnapshotSource, data: serde_json::Value) -> Self {
        Self {
            version: Self::VERSION,
            source,
            captured_at: Utc::now(),
            data,
        }
    }

    pub fn into_value(self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Treat empty strings as absent.
pub fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_or_empty_status_is_pending() {
        assert_eq!(BillingStatus::from_provider_status(None), BillingStatus::Pending);
        assert_eq!(BillingStatus::from_provider_status(Some("")), BillingStatus::Pending);
    }

    #[test]
    fn recognised_statuses_map_case_insensitively() {
        let cases = [
            ("ACTIVE", BillingStatus::Active),
            ("received", BillingStatus::Active),
            ("Pending", BillingStatus::Pending),
            ("awaiting", BillingStatus::Pending),
            ("pending_payment", BillingStatus::Pending),
            ("CANCELLED", BillingStatus::Cancelled),
            ("deleted", BillingStatus::Cancelled),
        ];

        for (input, expected) in cases {
            assert_eq!(
                BillingStatus::from_provider_status(Some(input)),
                expected,
                "status {input}"
            );
        }
    }

    #[test]
    fn unrecognised_statuses_fail_closed() {
        for input in ["OVERDUE", "REFUNDED", "CONFIRMED", " active", "active ", "???"] {
            assert_eq!(
                BillingStatus::from_provider_status(Some(input)),
                BillingStatus::Failed,
                "status {input:?}"
            );
        }
    }

    #[test]
    fn stored_status_round_trips_through_column_text() {
        for status in [
            BillingStatus::Pending,
            BillingStatus::Active,
            BillingStatus::Cancelled,
            BillingStatus::Failed,
        ] {
            assert_eq!(BillingStatus::from_string(status.as_str()), status);
        }
    }

    #[test]
    fn only_yearly_requests_are_yearly() {
        assert_eq!(BillingCycle::from_request("yearly"), BillingCycle::Yearly);
        assert_eq!(BillingCycle::from_request("YEARLY"), BillingCycle::Monthly);
        assert_eq!(BillingCycle::from_request("Yearly"), BillingCycle::Monthly);
        assert_eq!(BillingCycle::from_request("monthly"), BillingCycle::Monthly);
        assert_eq!(BillingCycle::from_request("weekly"), BillingCycle::Monthly);
    }

    #[test]
    fn update_leaves_unset_columns_alone() {
        let mut record = BillingRecord {
            id: Uuid::new_v4(),
            user_id: "user-1".into(),
            plan_id: "pro".into(),
            cycle: BillingCycle::Monthly,
            status: BillingStatus::Pending,
            provider_customer_id: Some("cus_1".into()),
            provider_subscription_id: Some("sub_1".into()),
            provider_payment_link: Some("https://old".into()),
            price_cents: Some(1990),
            metadata: Some(serde_json::json!({"old": true})),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        BillingUpdate {
            status: Some(BillingStatus::Active),
            ..Default::default()
        }
        .apply_to(&mut record);

        assert_eq!(record.status, BillingStatus::Active);
        assert_eq!(record.provider_payment_link.as_deref(), Some("https://old"));
        assert_eq!(record.metadata, Some(serde_json::json!({"old": true})));
    }

    #[test]
    fn record_serializes_with_camel_case_keys() {
        let record = BillingRecord {
            id: Uuid::nil(),
            user_id: "user-1".into(),
            plan_id: "pro".into(),
            cycle: BillingCycle::Yearly,
            status: BillingStatus::Pending,
            provider_customer_id: None,
            provider_subscription_id: Some("sub_1".into()),
            provider_payment_link: Some("https://pay".into()),
            price_cents: None,
            metadata: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["userId"], "user-1");
        assert_eq!(json["cycle"], "YEARLY");
        assert_eq!(json["status"], "PENDING");
        assert_eq!(json["providerPaymentLink"], "https://pay");
        assert!(json["providerCustomerId"].is_null());
    }

    #[test]
    fn empty_link_does_not_make_a_record_reusable() {
        let mut record = BillingRecord {
            id: Uuid::new_v4(),
            user_id: "user-1".into(),
            plan_id: "pro".into(),
            cycle: BillingCycle::Monthly,
            status: BillingStatus::Pending,
            provider_customer_id: None,
            provider_subscription_id: None,
            provider_payment_link: Some(String::new()),
            price_cents: None,
            metadata: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(!record.is_reusable());

        record.provider_payment_link = Some("https://pay".into());
        assert!(record.is_reusable());

        record.status = BillingStatus::Active;
        assert!(!record.is_reusable());
    }
}
