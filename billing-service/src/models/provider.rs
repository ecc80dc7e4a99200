//! Read-only views of billing-provider objects.

use serde::{Deserialize, Serialize};

use super::billing::{non_empty, BillingCycle};

/// Payment as returned by the provider.
///
/// Only the fields the service reads are typed; everything else is carried in
/// `extra` so re-serializing yields the provider's object unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderPayment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoice_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bank_slip_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boleto_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pix_qr_code_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pix: Option<PixDetails>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PixDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qr_code_url: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ProviderPayment {
    pub fn status(&self) -> Option<&str> {
        non_empty(self.status.as_deref())
    }

    pub fn payment_link(&self) -> Option<&str> {
        non_empty(self.payment_link.as_deref())
    }

    /// Method-specific URLs in the order they are preferred.
    pub fn method_links(&self) -> [Option<&str>; 5] {
        [
            non_empty(self.invoice_url.as_deref()),
            non_empty(self.bank_slip_url.as_deref()),
            non_empty(self.boleto_url.as_deref()),
            non_empty(self.pix_qr_code_url.as_deref()),
            non_empty(
                self.pix
                    .as_ref()
                    .and_then(|pix| pix.qr_code_url.as_deref()),
            ),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProviderCustomer {
    pub id: String,
}

/// Subscription returned by the provider on creation.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderSubscription {
    pub id: String,
    pub status: Option<String>,
    pub payment_link: Option<String>,
    /// Full response body, used for link scanning and as a metadata snapshot.
    pub raw: serde_json::Value,
}

impl ProviderSubscription {
    /// Build from a raw response body. Fails only when `id` is missing.
    pub fn from_raw(raw: serde_json::Value) -> anyhow::Result<Self> {
        let field = |name: &str| {
            raw.get(name)
                .and_then(|v| v.as_str())
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string())
        };

        let id = field("id")
            .ok_or_else(|| anyhow::anyhow!("Subscription response is missing an id"))?;

        Ok(Self {
            id,
            status: field("status"),
            payment_link: field("paymentLink"),
            raw,
        })
    }

    pub fn payment_link(&self) -> Option<&str> {
        non_empty(self.payment_link.as_deref())
    }
}

/// What the provider needs to open a subscription.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionRequest {
    pub customer_id: String,
    pub plan_id: String,
    pub amount_cents: i64,
    pub cycle: BillingCycle,
}
