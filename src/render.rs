//! Printable document rendering.
//!
//! Produces the styled HTML representation of an invoice from the
//! embedded tera template. Turning the markup into a PDF is delegated to
//! `wkhtmltopdf` when it is installed; otherwise the HTML file alone is
//! the export artifact.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Serialize;
use tera::{Context, Tera};

use crate::error::{Error, Result};
use crate::model::{Currency, CustomerType, Invoice, IssuerConfig, PaymentStatus};

// Embed template at compile time to ensure availability
const INVOICE_TEMPLATE: &str = include_str!("../templates/invoice.html.tera");

/// Document language. English is the default and adds no filename
/// suffix; Portuguese exports as `Invoice_{number}_PT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lang {
    #[default]
    En,
    Pt,
}

impl Lang {
    pub fn parse(s: &str) -> Option<Lang> {
        match s.trim().to_lowercase().as_str() {
            "en" | "english" => Some(Lang::En),
            "pt" | "portuguese" => Some(Lang::Pt),
            _ => None,
        }
    }

    pub fn suffix(self) -> &'static str {
        match self {
            Lang::En => "",
            Lang::Pt => "_PT",
        }
    }

    pub fn status_label(self, status: PaymentStatus) -> &'static str {
        match self {
            Lang::En => status.label(),
            Lang::Pt => match status {
                PaymentStatus::Draft => "Rascunho",
                PaymentStatus::Sent => "Enviado",
                PaymentStatus::Paid => "Pago",
                PaymentStatus::Overdue => "Vencido",
                PaymentStatus::Cancelled => "Cancelado",
            },
        }
    }

    pub fn customer_type_label(self, customer_type: CustomerType) -> &'static str {
        match self {
            Lang::En => customer_type.label(),
            Lang::Pt => match customer_type {
                CustomerType::Individual => "Individual",
                CustomerType::Company => "Empresa",
                CustomerType::DirectOrder => "Pedido Direto",
            },
        }
    }
}

/// Static document strings, one set per language.
#[derive(Serialize)]
struct Labels {
    invoice: &'static str,
    bill_to: &'static str,
    invoice_details: &'static str,
    issue_date: &'static str,
    due_date: &'static str,
    item: &'static str,
    qty: &'static str,
    unit_price: &'static str,
    subtotal: &'static str,
    tax: &'static str,
    total: &'static str,
    notes: &'static str,
    thank_you: &'static str,
}

fn labels(lang: Lang) -> Labels {
    match lang {
        Lang::En => Labels {
            invoice: "INVOICE",
            bill_to: "Bill To",
            invoice_details: "Invoice Details",
            issue_date: "Issue Date",
            due_date: "Due Date",
            item: "Item",
            qty: "Qty",
            unit_price: "Unit Price",
            subtotal: "Subtotal",
            tax: "Tax",
            total: "Total",
            notes: "Notes",
            thank_you: "Thank you for your business!",
        },
        Lang::Pt => Labels {
            invoice: "FATURA",
            bill_to: "Faturar a",
            invoice_details: "Detalhes da Fatura",
            issue_date: "Data de Emissão",
            due_date: "Data de Vencimento",
            item: "Item",
            qty: "Qtd",
            unit_price: "Preço Unitário",
            subtotal: "Subtotal",
            tax: "Imposto",
            total: "Total",
            notes: "Notas Adicionais",
            thank_you: "Obrigado pela sua preferência!",
        },
    }
}

#[derive(Serialize)]
struct ItemRow {
    product: String,
    details: String,
    quantity: u32,
    unit_price: String,
    line_total: String,
}

/// `amount` as `{symbol}{grouped}.{2 digits}`, e.g. `$1,234.50`.
pub fn format_amount(amount: f64, currency: &Currency) -> String {
    let cents = (amount * 100.0).round() as i64;
    let sign = if cents < 0 { "-" } else { "" };
    let cents = cents.abs();
    let whole = (cents / 100).to_string();
    let frac = cents % 100;

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    format!("{}{}{}.{:02}", sign, currency.symbol, grouped, frac)
}

/// Renders the full invoice document: issuer block, number and status,
/// bill-to, dates, one row per item, subtotal, conditional tax line,
/// total, conditional notes. Headings and value labels come from the
/// requested language; amounts keep the currency format regardless.
pub fn render(
    invoice: &Invoice,
    issuer: &IssuerConfig,
    currency: &Currency,
    lang: Lang,
) -> Result<String> {
    let mut tera = Tera::default();
    tera.add_raw_template("invoice.html", INVOICE_TEMPLATE)
        .map_err(|e| Error::Storage(format!("template: {}", e)))?;

    let items: Vec<ItemRow> = invoice
        .items
        .iter()
        .map(|item| {
            let details = match (item.category.is_empty(), item.product_type.is_empty()) {
                (false, false) => format!("{} - {}", item.category, item.product_type),
                (false, true) => item.category.clone(),
                (true, false) => item.product_type.clone(),
                (true, true) => String::new(),
            };
            ItemRow {
                product: item.product.clone(),
                details,
                quantity: item.quantity,
                unit_price: format_amount(item.price_per_unit, currency),
                line_total: format_amount(item.total, currency),
            }
        })
        .collect();

    let mut context = Context::new();
    context.insert("issuer", issuer);
    context.insert("invoice_number", &invoice.invoice_number);
    context.insert("status", &invoice.status);
    context.insert("status_label", lang.status_label(invoice.status));
    context.insert("customer", &invoice.customer);
    context.insert("customer_type", lang.customer_type_label(invoice.customer_type));
    context.insert("t", &labels(lang));
    context.insert("customer_address", &invoice.customer_address);
    context.insert("customer_email", &invoice.customer_email);
    context.insert("date", &invoice.date);
    context.insert("due_date", &invoice.due_date);
    context.insert("items", &items);
    context.insert("subtotal", &format_amount(invoice.subtotal, currency));
    context.insert(
        "tax",
        &invoice.tax.map(|tax| format_amount(tax, currency)),
    );
    context.insert("tax_rate", &format_rate(invoice.tax_rate.unwrap_or(0.0)));
    context.insert("total", &format_amount(invoice.total_amount, currency));
    context.insert("notes", &invoice.notes);

    tera.render("invoice.html", &context)
        .map_err(|e| Error::Storage(format!("template: {}", e)))
}

/// Tax rate without trailing zeros: 10.0 -> "10", 8.875 -> "8.875".
fn format_rate(rate: f64) -> String {
    if rate.fract() == 0.0 {
        format!("{}", rate as i64)
    } else {
        format!("{}", rate)
    }
}

/// Export filename stem: `Invoice_{invoiceNumber}`, plus the language
/// suffix for non-default languages.
pub fn export_file_stem(invoice: &Invoice, lang: Lang) -> String {
    format!("Invoice_{}{}", invoice.invoice_number, lang.suffix())
}

pub struct ExportOutcome {
    pub html_path: PathBuf,
    pub pdf_path: Option<PathBuf>,
}

/// Writes the rendered markup under `out_dir` and, when `wkhtmltopdf` is
/// available, compiles the PDF next to it.
pub fn export(
    out_dir: &Path,
    invoice: &Invoice,
    issuer: &IssuerConfig,
    currency: &Currency,
    lang: Lang,
) -> Result<ExportOutcome> {
    fs::create_dir_all(out_dir)?;
    let markup = render(invoice, issuer, currency, lang)?;

    let stem = export_file_stem(invoice, lang);
    let html_path = out_dir.join(format!("{}.html", stem));
    fs::write(&html_path, markup)?;

    if Command::new("wkhtmltopdf").arg("--version").output().is_err() {
        return Ok(ExportOutcome {
            html_path,
            pdf_path: None,
        });
    }

    let pdf_path = out_dir.join(format!("{}.pdf", stem));
    let status = Command::new("wkhtmltopdf")
        .arg("--quiet")
        .arg(&html_path)
        .arg(&pdf_path)
        .status()?;
    if !status.success() {
        return Err(Error::ExternalService(
            "wkhtmltopdf failed to produce the PDF.".to_string(),
        ));
    }

    Ok(ExportOutcome {
        html_path,
        pdf_path: Some(pdf_path),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Currency, Invoice, PaymentStatus};

    fn issuer() -> IssuerConfig {
        IssuerConfig {
            name: "Acme Studio".to_string(),
            address1: "1 Main St".to_string(),
            address2: "Springfield".to_string(),
            email: "billing@acme.test".to_string(),
            phone: "555-0100".to_string(),
            bank_info: "IBAN DE00 0000".to_string(),
        }
    }

    fn sample_invoice() -> Invoice {
        let mut invoice = Invoice::new("TEST-202508-042".to_string(), "item-0".to_string());
        invoice.customer = "Jane Doe".to_string();
        invoice.customer_email = "jane@example.com".to_string();
        invoice.items[0].product = "Widget".to_string();
        invoice.items[0].category = "Prototypes".to_string();
        invoice.items[0].product_type = "Resin Print".to_string();
        invoice.update_item_quantity("item-0", 3).unwrap();
        invoice.update_item_price("item-0", 9.99).unwrap();
        invoice
    }

    #[test]
    fn format_amount_groups_thousands_and_pads_cents() {
        let usd = Currency::usd();
        assert_eq!(format_amount(1234.5, &usd), "$1,234.50");
        assert_eq!(format_amount(0.0, &usd), "$0.00");
        assert_eq!(format_amount(1000000.0, &usd), "$1,000,000.00");
        assert_eq!(format_amount(-42.0, &usd), "-$42.00");
        assert_eq!(format_amount(29.97, &usd), "$29.97");
    }

    #[test]
    fn format_amount_uses_currency_symbol() {
        let eur = Currency::by_code("EUR").unwrap();
        assert_eq!(format_amount(12.3, &eur), "€12.30");
    }

    #[test]
    fn render_contains_required_blocks_in_order() {
        let invoice = sample_invoice();
        let markup = render(&invoice, &issuer(), &Currency::usd(), Lang::En).unwrap();

        let positions: Vec<usize> = [
            "Acme Studio",
            "TEST-202508-042",
            "Bill To",
            "Jane Doe",
            "Issue Date",
            "Widget",
            "Subtotal",
            "Total",
        ]
        .iter()
        .map(|needle| markup.find(needle).expect(needle))
        .collect();
        assert!(positions.windows(2).all(|pair| pair[0] < pair[1]));

        assert!(markup.contains("Prototypes - Resin Print"));
        assert!(markup.contains("$29.97"));
        assert!(markup.contains("$9.99"));
    }

    #[test]
    fn tax_line_only_renders_when_tax_present() {
        let mut invoice = sample_invoice();
        let markup = render(&invoice, &issuer(), &Currency::usd(), Lang::En).unwrap();
        assert!(!markup.contains("Tax ("));

        invoice.tax_rate = Some(10.0);
        invoice.recalculate();
        let markup = render(&invoice, &issuer(), &Currency::usd(), Lang::En).unwrap();
        assert!(markup.contains("Tax (10%)"));
        assert!(markup.contains("$3.00"));
    }

    #[test]
    fn notes_block_is_conditional() {
        let mut invoice = sample_invoice();
        let markup = render(&invoice, &issuer(), &Currency::usd(), Lang::En).unwrap();
        assert!(!markup.contains("class=\"notes\""));

        invoice.notes = Some("Handle with care".to_string());
        let markup = render(&invoice, &issuer(), &Currency::usd(), Lang::En).unwrap();
        assert!(markup.contains("Handle with care"));
    }

    #[test]
    fn status_badge_reflects_invoice_status() {
        let mut invoice = sample_invoice();
        invoice.status = PaymentStatus::Paid;
        let markup = render(&invoice, &issuer(), &Currency::usd(), Lang::En).unwrap();
        assert!(markup.contains("badge-paid"));
        assert!(markup.contains(">Paid<"));
    }

    #[test]
    fn portuguese_render_translates_labels() {
        let mut invoice = sample_invoice();
        invoice.status = PaymentStatus::Paid;
        invoice.tax_rate = Some(10.0);
        invoice.recalculate();
        let markup = render(&invoice, &issuer(), &Currency::usd(), Lang::Pt).unwrap();

        assert!(markup.contains("FATURA"));
        assert!(markup.contains("Faturar a"));
        assert!(markup.contains(">Pago<"));
        assert!(markup.contains("Imposto (10%)"));
        assert!(markup.contains("Preço Unitário"));
        // The badge class keeps the canonical status regardless of language.
        assert!(markup.contains("badge-paid"));
        assert!(markup.contains("$29.97"));
    }

    #[test]
    fn portuguese_customer_type_labels() {
        assert_eq!(
            Lang::Pt.customer_type_label(CustomerType::DirectOrder),
            "Pedido Direto"
        );
        assert_eq!(Lang::Pt.customer_type_label(CustomerType::Company), "Empresa");
        assert_eq!(
            Lang::En.customer_type_label(CustomerType::Company),
            "Company"
        );
    }

    #[test]
    fn export_stem_follows_filename_pattern() {
        let invoice = sample_invoice();
        assert_eq!(export_file_stem(&invoice, Lang::En), "Invoice_TEST-202508-042");
        assert_eq!(
            export_file_stem(&invoice, Lang::Pt),
            "Invoice_TEST-202508-042_PT"
        );
    }

    #[test]
    fn lang_parses_codes_and_defaults_to_english() {
        assert_eq!(Lang::parse("en"), Some(Lang::En));
        assert_eq!(Lang::parse("PT"), Some(Lang::Pt));
        assert_eq!(Lang::parse("portuguese"), Some(Lang::Pt));
        assert_eq!(Lang::parse("de"), None);
        assert_eq!(Lang::default(), Lang::En);
    }
}
