//! Payment bridge against the Stripe Checkout Sessions API.
//!
//! The local side only marshals request/response shapes: session
//! creation builds one price line per invoice item (unit amounts in
//! minor currency units) plus an optional tax line, and status checks
//! mirror the session's tri-state payment status back to the caller.
//! Preconditions are validated before any request goes out.

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::model::{Currency, Invoice};

pub const DEFAULT_API_BASE: &str = "https://api.stripe.com/v1";

/// Opaque handle for a created checkout session. The client secret is
/// the continuation token the hosted checkout surface consumes.
#[derive(Debug, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    /// Hosted-checkout URL; null for embedded sessions.
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Pending,
    Paid,
    Failed,
}

impl SessionStatus {
    pub fn label(self) -> &'static str {
        match self {
            SessionStatus::Pending => "pending",
            SessionStatus::Paid => "paid",
            SessionStatus::Failed => "failed",
        }
    }
}

/// Result of a status poll; `payment_reference` is set once paid.
#[derive(Debug)]
pub struct StatusCheck {
    pub status: SessionStatus,
    pub payment_reference: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SessionStatusResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    payment_status: Option<String>,
    #[serde(default)]
    payment_intent: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
}

pub struct StripeClient {
    client: reqwest::blocking::Client,
    api_base: String,
    secret_key: String,
}

impl StripeClient {
    pub fn new(secret_key: String, api_base: impl Into<String>) -> StripeClient {
        StripeClient {
            client: reqwest::blocking::Client::new(),
            api_base: api_base.into(),
            secret_key,
        }
    }

    /// Reads the secret key from `STRIPE_SECRET_KEY`.
    pub fn from_env() -> Result<StripeClient> {
        let key = std::env::var("STRIPE_SECRET_KEY").map_err(|_| {
            Error::Validation(
                "STRIPE_SECRET_KEY is not set. Export your Stripe secret key first.".to_string(),
            )
        })?;
        Ok(StripeClient::new(key, DEFAULT_API_BASE))
    }

    /// Creates an embedded checkout session for the invoice. Validation
    /// runs before anything leaves the process.
    pub fn create_session(&self, invoice: &Invoice, currency: &Currency) -> Result<CheckoutSession> {
        let params = checkout_params(invoice, currency)?;

        let response = self
            .client
            .post(format!("{}/checkout/sessions", self.api_base))
            .basic_auth(&self.secret_key, None::<&str>)
            .form(&params)
            .send()?;

        let status = response.status();
        let body = response.text()?;
        if status.is_success() {
            let session: CheckoutSession = serde_json::from_str(&body)
                .map_err(|e| Error::ExternalService(format!("unexpected response: {}", e)))?;
            Ok(session)
        } else {
            Err(api_error(&body))
        }
    }

    /// Queries the session's payment status. `paid` (or a session that
    /// needed no payment) reports the payment-intent id as the reference.
    pub fn check_status(&self, session_id: &str) -> Result<StatusCheck> {
        let response = self
            .client
            .get(format!("{}/checkout/sessions/{}", self.api_base, session_id))
            .basic_auth(&self.secret_key, None::<&str>)
            .send()?;

        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            return Err(api_error(&body));
        }

        let session: SessionStatusResponse = serde_json::from_str(&body)
            .map_err(|e| Error::ExternalService(format!("unexpected response: {}", e)))?;

        let status = map_status(
            session.payment_status.as_deref(),
            session.status.as_deref(),
        );

        Ok(StatusCheck {
            payment_reference: match status {
                SessionStatus::Paid => session.payment_intent,
                _ => None,
            },
            status,
        })
    }
}

/// Tri-state view of a session: a settled payment (or one that required
/// none) is paid, an expired session failed, anything else is pending.
fn map_status(payment_status: Option<&str>, session_status: Option<&str>) -> SessionStatus {
    match (payment_status, session_status) {
        (Some("paid"), _) | (Some("no_payment_required"), _) => SessionStatus::Paid,
        (_, Some("expired")) => SessionStatus::Failed,
        _ => SessionStatus::Pending,
    }
}

fn api_error(body: &str) -> Error {
    let detail = serde_json::from_str::<ApiErrorEnvelope>(body)
        .map(|envelope| envelope.error)
        .unwrap_or(ApiErrorDetail {
            message: Some(body.to_string()),
            kind: None,
        });
    Error::ExternalService(format!(
        "Stripe error ({}): {}",
        detail.kind.unwrap_or_else(|| "unknown".to_string()),
        detail.message.unwrap_or_else(|| "no message".to_string()),
    ))
}

/// Preconditions for collecting payment: customer name and email, at
/// least one item, and a positive total.
pub fn validate_for_checkout(invoice: &Invoice) -> Result<()> {
    if invoice.customer.trim().is_empty() || invoice.customer_email.trim().is_empty() {
        return Err(Error::Validation(
            "Customer name and email are required.".to_string(),
        ));
    }
    if invoice.items.is_empty() {
        return Err(Error::Validation(
            "Invoice must have at least one item.".to_string(),
        ));
    }
    if invoice.total_amount <= 0.0 {
        return Err(Error::Validation(
            "Invoice total must be greater than zero.".to_string(),
        ));
    }
    Ok(())
}

/// Decimal major units to rounded minor units (cents).
pub fn to_minor_units(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

/// Form parameters for the create-session call: one line item per
/// invoice item, an extra tax line when tax applies, and the invoice
/// number carried in the metadata.
pub fn checkout_params(invoice: &Invoice, currency: &Currency) -> Result<Vec<(String, String)>> {
    validate_for_checkout(invoice)?;

    let code = currency.code.to_lowercase();
    let mut params = vec![
        ("mode".to_string(), "payment".to_string()),
        ("ui_mode".to_string(), "embedded".to_string()),
        ("redirect_on_completion".to_string(), "never".to_string()),
        (
            "customer_email".to_string(),
            invoice.customer_email.clone(),
        ),
        (
            "metadata[invoiceNumber]".to_string(),
            invoice.invoice_number.clone(),
        ),
        (
            "metadata[customerName]".to_string(),
            invoice.customer.clone(),
        ),
        (
            "payment_intent_data[description]".to_string(),
            format!("Invoice {} for {}", invoice.invoice_number, invoice.customer),
        ),
        (
            "payment_intent_data[metadata][invoiceNumber]".to_string(),
            invoice.invoice_number.clone(),
        ),
    ];

    for (index, item) in invoice.items.iter().enumerate() {
        let prefix = format!("line_items[{}]", index);
        params.push((
            format!("{}[price_data][currency]", prefix),
            code.clone(),
        ));
        params.push((
            format!("{}[price_data][product_data][name]", prefix),
            item.product.clone(),
        ));
        let description = match (item.category.is_empty(), item.product_type.is_empty()) {
            (false, false) => Some(format!("{} - {}", item.category, item.product_type)),
            (false, true) => Some(item.category.clone()),
            _ => None,
        };
        if let Some(description) = description {
            params.push((
                format!("{}[price_data][product_data][description]", prefix),
                description,
            ));
        }
        params.push((
            format!("{}[price_data][unit_amount]", prefix),
            to_minor_units(item.price_per_unit).to_string(),
        ));
        params.push((format!("{}[quantity]", prefix), item.quantity.to_string()));
    }

    if let Some(tax) = invoice.tax {
        if tax > 0.0 {
            let index = invoice.items.len();
            let prefix = format!("line_items[{}]", index);
            params.push((
                format!("{}[price_data][currency]", prefix),
                code.clone(),
            ));
            params.push((
                format!("{}[price_data][product_data][name]", prefix),
                "Tax".to_string(),
            ));
            params.push((
                format!("{}[price_data][product_data][description]", prefix),
                format!("{}% tax", invoice.tax_rate.unwrap_or(0.0)),
            ));
            params.push((
                format!("{}[price_data][unit_amount]", prefix),
                to_minor_units(tax).to_string(),
            ));
            params.push((format!("{}[quantity]", prefix), "1".to_string()));
        }
    }

    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Currency, Invoice};

    fn payable_invoice() -> Invoice {
        let mut invoice = Invoice::new("TEST-202508-007".to_string(), "item-0".to_string());
        invoice.customer = "Jane Doe".to_string();
        invoice.customer_email = "jane@example.com".to_string();
        invoice.items[0].product = "Widget".to_string();
        invoice.update_item_quantity("item-0", 3).unwrap();
        invoice.update_item_price("item-0", 9.99).unwrap();
        invoice
    }

    fn find<'a>(params: &'a [(String, String)], key: &str) -> Option<&'a str> {
        params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn missing_email_fails_validation_before_any_request() {
        let mut invoice = payable_invoice();
        invoice.customer_email = String::new();
        assert!(matches!(
            checkout_params(&invoice, &Currency::usd()),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn missing_customer_name_fails_validation() {
        let mut invoice = payable_invoice();
        invoice.customer = "  ".to_string();
        assert!(validate_for_checkout(&invoice).is_err());
    }

    #[test]
    fn zero_total_fails_validation() {
        let mut invoice = payable_invoice();
        invoice.update_item_price("item-0", 0.0).unwrap();
        assert!(matches!(
            validate_for_checkout(&invoice),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn unit_amounts_are_rounded_minor_units() {
        assert_eq!(to_minor_units(9.99), 999);
        assert_eq!(to_minor_units(10.0), 1000);
        assert_eq!(to_minor_units(0.005), 1);
    }

    #[test]
    fn params_carry_one_line_per_item() {
        let invoice = payable_invoice();
        let params = checkout_params(&invoice, &Currency::usd()).unwrap();

        assert_eq!(find(&params, "mode"), Some("payment"));
        assert_eq!(find(&params, "customer_email"), Some("jane@example.com"));
        assert_eq!(
            find(&params, "metadata[invoiceNumber]"),
            Some("TEST-202508-007")
        );
        assert_eq!(
            find(&params, "line_items[0][price_data][product_data][name]"),
            Some("Widget")
        );
        assert_eq!(
            find(&params, "line_items[0][price_data][unit_amount]"),
            Some("999")
        );
        assert_eq!(find(&params, "line_items[0][quantity]"), Some("3"));
        assert_eq!(
            find(&params, "line_items[0][price_data][currency]"),
            Some("usd")
        );
        assert!(find(&params, "line_items[1][quantity]").is_none());
    }

    #[test]
    fn tax_becomes_its_own_line_item() {
        let mut invoice = payable_invoice();
        invoice.tax_rate = Some(10.0);
        invoice.recalculate();
        let params = checkout_params(&invoice, &Currency::usd()).unwrap();

        assert_eq!(
            find(&params, "line_items[1][price_data][product_data][name]"),
            Some("Tax")
        );
        // 10% of 29.97, rounded to minor units.
        assert_eq!(
            find(&params, "line_items[1][price_data][unit_amount]"),
            Some("300")
        );
        assert_eq!(find(&params, "line_items[1][quantity]"), Some("1"));
    }

    #[test]
    fn session_status_mapping_is_tri_state() {
        assert_eq!(
            map_status(Some("paid"), Some("complete")),
            SessionStatus::Paid
        );
        assert_eq!(
            map_status(Some("no_payment_required"), Some("complete")),
            SessionStatus::Paid
        );
        assert_eq!(
            map_status(Some("unpaid"), Some("open")),
            SessionStatus::Pending
        );
        assert_eq!(
            map_status(Some("unpaid"), Some("expired")),
            SessionStatus::Failed
        );
        assert_eq!(map_status(None, None), SessionStatus::Pending);
    }

    #[test]
    fn session_status_labels_are_stable() {
        assert_eq!(SessionStatus::Pending.label(), "pending");
        assert_eq!(SessionStatus::Paid.label(), "paid");
        assert_eq!(SessionStatus::Failed.label(), "failed");
    }

    #[test]
    fn session_response_deserializes_with_optional_fields() {
        let paid: SessionStatusResponse = serde_json::from_str(
            r#"{"status":"complete","payment_status":"paid","payment_intent":"pi_42"}"#,
        )
        .unwrap();
        assert_eq!(paid.payment_intent.as_deref(), Some("pi_42"));

        let open: SessionStatusResponse =
            serde_json::from_str(r#"{"status":"open","payment_status":"unpaid"}"#).unwrap();
        assert_eq!(open.payment_intent, None);
    }
}
