use std::fmt;

use chrono::{Local, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::totals;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Draft,
    Sent,
    Paid,
    Overdue,
    Cancelled,
}

impl PaymentStatus {
    pub const ALL: [PaymentStatus; 5] = [
        PaymentStatus::Draft,
        PaymentStatus::Sent,
        PaymentStatus::Paid,
        PaymentStatus::Overdue,
        PaymentStatus::Cancelled,
    ];

    pub fn label(self) -> &'static str {
        match self {
            PaymentStatus::Draft => "Draft",
            PaymentStatus::Sent => "Sent",
            PaymentStatus::Paid => "Paid",
            PaymentStatus::Overdue => "Overdue",
            PaymentStatus::Cancelled => "Cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<PaymentStatus> {
        match s.trim().to_lowercase().as_str() {
            "draft" => Some(PaymentStatus::Draft),
            "sent" => Some(PaymentStatus::Sent),
            "paid" => Some(PaymentStatus::Paid),
            "overdue" => Some(PaymentStatus::Overdue),
            "cancelled" => Some(PaymentStatus::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CustomerType {
    Individual,
    Company,
    DirectOrder,
}

impl CustomerType {
    pub const ALL: [CustomerType; 3] = [
        CustomerType::Individual,
        CustomerType::Company,
        CustomerType::DirectOrder,
    ];

    pub fn label(self) -> &'static str {
        match self {
            CustomerType::Individual => "Individual",
            CustomerType::Company => "Company",
            CustomerType::DirectOrder => "Direct Order",
        }
    }

    pub fn parse(s: &str) -> Option<CustomerType> {
        match s.trim().to_lowercase().as_str() {
            "individual" => Some(CustomerType::Individual),
            "company" | "business" => Some(CustomerType::Company),
            "direct-order" | "direct order" => Some(CustomerType::DirectOrder),
            _ => None,
        }
    }
}

impl fmt::Display for CustomerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Currency {
    pub code: String,
    pub symbol: String,
    pub name: String,
}

pub const CURRENCIES: &[(&str, &str, &str)] = &[
    ("USD", "$", "US Dollar"),
    ("EUR", "€", "Euro"),
    ("GBP", "£", "British Pound"),
    ("JPY", "¥", "Japanese Yen"),
    ("CAD", "C$", "Canadian Dollar"),
    ("AUD", "A$", "Australian Dollar"),
    ("CHF", "CHF", "Swiss Franc"),
    ("CNY", "¥", "Chinese Yuan"),
    ("INR", "₹", "Indian Rupee"),
    ("MXN", "$", "Mexican Peso"),
    ("BRL", "R$", "Brazilian Real"),
    ("ZAR", "R", "South African Rand"),
    ("SGD", "S$", "Singapore Dollar"),
    ("HKD", "HK$", "Hong Kong Dollar"),
    ("SEK", "kr", "Swedish Krona"),
    ("NOK", "kr", "Norwegian Krone"),
    ("DKK", "kr", "Danish Krone"),
    ("NZD", "NZ$", "New Zealand Dollar"),
    ("KRW", "₩", "South Korean Won"),
    ("PLN", "zł", "Polish Zloty"),
];

impl Currency {
    pub fn usd() -> Currency {
        Currency::from_entry(CURRENCIES[0])
    }

    pub fn by_code(code: &str) -> Option<Currency> {
        CURRENCIES
            .iter()
            .find(|(c, _, _)| c.eq_ignore_ascii_case(code))
            .copied()
            .map(Currency::from_entry)
    }

    pub fn all() -> Vec<Currency> {
        CURRENCIES.iter().copied().map(Currency::from_entry).collect()
    }

    fn from_entry((code, symbol, name): (&str, &str, &str)) -> Currency {
        Currency {
            code: code.to_string(),
            symbol: symbol.to_string(),
            name: name.to_string(),
        }
    }
}

/// One product/service line on an invoice. `total` is derived: it is
/// recomputed by the setters and by `Invoice::recalculate`, never edited
/// on its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceItem {
    pub id: String,
    pub product: String,
    pub category: String,
    pub product_type: String,
    pub quantity: u32,
    pub price_per_unit: f64,
    pub total: f64,
}

impl InvoiceItem {
    pub fn blank(id: String) -> InvoiceItem {
        InvoiceItem {
            id,
            product: String::new(),
            category: String::new(),
            product_type: String::new(),
            quantity: 1,
            price_per_unit: 0.0,
            total: 0.0,
        }
    }

    pub fn set_quantity(&mut self, quantity: u32) {
        self.quantity = quantity.max(1);
        self.total = totals::item_total(self.quantity, self.price_per_unit);
    }

    pub fn set_price_per_unit(&mut self, price_per_unit: f64) {
        self.price_per_unit = price_per_unit.max(0.0);
        self.total = totals::item_total(self.quantity, self.price_per_unit);
    }
}

/// A billing document for one customer. Keyed by `invoice_number`;
/// records persist as camelCase JSON, so data files written by earlier
/// versions keep loading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub invoice_number: String,
    /// Issue date, `YYYY-MM-DD`.
    pub date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    pub customer: String,
    pub customer_type: CustomerType,
    pub customer_address: String,
    pub customer_email: String,
    pub items: Vec<InvoiceItem>,
    pub subtotal: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tax: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tax_rate: Option<f64>,
    pub total_amount: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub production_cost: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revenue: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revenue_ratio: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    pub status: PaymentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_reference: Option<String>,
}

impl Invoice {
    /// A fresh draft dated today with one blank item.
    pub fn new(invoice_number: String, item_id: String) -> Invoice {
        Invoice {
            invoice_number,
            date: Local::now().date_naive().to_string(),
            due_date: None,
            customer: String::new(),
            customer_type: CustomerType::Individual,
            customer_address: String::new(),
            customer_email: String::new(),
            items: vec![InvoiceItem::blank(item_id)],
            subtotal: 0.0,
            tax: None,
            tax_rate: None,
            total_amount: 0.0,
            production_cost: None,
            revenue: None,
            revenue_ratio: None,
            platform: None,
            status: PaymentStatus::Draft,
            notes: None,
            created_at: None,
            updated_at: None,
            paid_at: None,
            payment_reference: None,
        }
    }

    /// Re-derives every computed field from the items and the optional
    /// tax/cost inputs. This is the single place where absent optionals
    /// are normalized to zero.
    pub fn recalculate(&mut self) {
        for item in &mut self.items {
            item.total = totals::item_total(item.quantity, item.price_per_unit);
        }
        self.subtotal = totals::subtotal(&self.items);
        let tax_rate = self.tax_rate.unwrap_or(0.0);
        self.tax = if tax_rate > 0.0 {
            Some(self.subtotal * tax_rate / 100.0)
        } else {
            None
        };
        self.total_amount = totals::total_amount(self.subtotal, tax_rate);
        let cost = self.production_cost.unwrap_or(0.0);
        self.revenue = Some(totals::revenue(self.total_amount, cost));
        self.revenue_ratio = Some(totals::revenue_ratio(self.total_amount, cost));
    }

    pub fn add_item(&mut self, item: InvoiceItem) {
        self.items.push(item);
        self.recalculate();
    }

    /// Removing the last remaining item is rejected: an invoice always
    /// carries at least one line.
    pub fn remove_item(&mut self, item_id: &str) -> Result<()> {
        if self.items.len() <= 1 {
            return Err(Error::Validation(
                "At least one item is required.".to_string(),
            ));
        }
        self.items.retain(|item| item.id != item_id);
        self.recalculate();
        Ok(())
    }

    pub fn update_item_quantity(&mut self, item_id: &str, quantity: u32) -> Result<()> {
        self.item_mut(item_id)?.set_quantity(quantity);
        self.recalculate();
        Ok(())
    }

    pub fn update_item_price(&mut self, item_id: &str, price_per_unit: f64) -> Result<()> {
        self.item_mut(item_id)?.set_price_per_unit(price_per_unit);
        self.recalculate();
        Ok(())
    }

    fn item_mut(&mut self, item_id: &str) -> Result<&mut InvoiceItem> {
        self.items
            .iter_mut()
            .find(|item| item.id == item_id)
            .ok_or_else(|| Error::Validation(format!("No item with id {}", item_id)))
    }

    /// Stamps created/updated timestamps before a save.
    pub fn touch(&mut self) {
        let now = Utc::now().to_rfc3339();
        if self.created_at.is_none() {
            self.created_at = Some(now.clone());
        }
        self.updated_at = Some(now);
    }

    /// Export flips drafts to sent; later statuses stay put.
    pub fn mark_sent(&mut self) {
        if self.status == PaymentStatus::Draft {
            self.status = PaymentStatus::Sent;
        }
    }

    /// Payment confirmation: stamp paid_at and the external reference.
    pub fn mark_paid(&mut self, payment_reference: String) {
        self.status = PaymentStatus::Paid;
        self.paid_at = Some(Utc::now().to_rfc3339());
        self.payment_reference = Some(payment_reference);
    }
}

/// Process-wide preferences, loaded once at startup and saved explicitly
/// from the `config` command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    pub currency: Currency,
    pub invoice_prefix: String,
    pub data_root: String,
}

impl Default for AppSettings {
    fn default() -> AppSettings {
        AppSettings {
            currency: Currency::usd(),
            invoice_prefix: "TEST".to_string(),
            data_root: "~/Documents/Invoices".to_string(),
        }
    }
}

/// Issuer block printed at the top of every rendered invoice, read from
/// `issuer.toml` in the data root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuerConfig {
    pub name: String,
    pub address1: String,
    pub address2: String,
    pub email: String,
    pub phone: String,
    pub bank_info: String,
}
