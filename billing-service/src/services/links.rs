//! Payment-link selection.
//!
//! Providers expose the checkout URL under different field names depending on
//! the payment method. An explicit `paymentLink` anywhere in the list wins;
//! otherwise the method-specific URLs of the first payment are tried in order.

use crate::models::ProviderPayment;
use serde_json::Value;

/// Pick the best link from a payment list, as returned by the provider (not re-sorted).
///
/// 1. first payment carrying a `paymentLink`
/// 2. first payment's invoice, bank-slip, boleto, PIX and nested PIX URLs
/// 3. `fallback`
pub fn resolve_payment_link(
    payments: &[ProviderPayment],
    fallback: Option<&str>,
) -> Option<String> {
    payments
        .iter()
        .find_map(|p| p.payment_link())
        .or_else(|| {
            payments
                .first()
                .and_then(|first| first.method_links().into_iter().flatten().next())
        })
        .or_else(|| fallback.filter(|s| !s.is_empty()))
        .map(str::to_string)
}

const SUBSCRIPTION_LINK_KEYS: &[&[&str]] = &[
    &["paymentLink"],
    &["invoiceUrl"],
    &["bankSlipUrl"],
    &["boletoUrl"],
    &["pixQrCodeUrl"],
    &["pix", "qrCodeUrl"],
];

/// Best-effort scan of a raw subscription object for an embedded link.
pub fn scan_subscription_link(raw: &Value) -> Option<String> {
    SUBSCRIPTION_LINK_KEYS.iter().find_map(|path| {
        path.iter()
            .try_fold(raw, |node, key| node.get(*key))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    })
}
