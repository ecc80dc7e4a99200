use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::BillingRecord;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingQuery {
    pub user_id: Option<String>,
    pub sync: Option<String>,
}

impl BillingQuery {
    /// Only the literal `true` asks for a full sync.
    pub fn sync_requested(&self) -> bool {
        self.sync.as_deref() == Some("true")
    }
}

#[derive(Debug, Serialize)]
pub struct BillingListResponse {
    pub billing: Option<BillingRecord>,
    pub billings: Vec<BillingRecord>,
}

/// Body of `POST /billing`. Every field is optional so missing ones can be
/// reported together.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBillingRequest {
    pub user_id: Option<String>,
    pub plan_id: Option<String>,
    pub billing_cycle: Option<String>,
    /// Number or numeric string.
    pub amount_cents: Option<Value>,
}

impl CreateBillingRequest {
    /// Parse `amountCents`. `Ok(None)` when absent or null.
    pub fn amount_cents(&self) -> Result<Option<i64>, String> {
        match &self.amount_cents {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().and_then(whole_cents))
                .map(Some)
                .ok_or_else(|| "amountCents must be a number".to_string()),
            Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
            Some(Value::String(s)) => s
                .trim()
                .parse::<i64>()
                .map(Some)
                .map_err(|_| "amountCents must be a number".to_string()),
            Some(_) => Err("amountCents must be a number".to_string()),
        }
    }
}

/// A float that is exactly a whole number inside the `i64` range.
fn whole_cents(value: f64) -> Option<i64> {
    let in_range = value >= i64::MIN as f64 && value < i64::MAX as f64;
    (in_range && value.fract() == 0.0).then_some(value as i64)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBillingResponse {
    pub billing: BillingRecord,
    /// Present only when a new subscription was opened.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription: Option<Value>,
    pub payment_link: Option<String>,
}
