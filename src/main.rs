mod error;
mod ids;
mod import;
mod model;
mod payment;
mod render;
mod store;
mod totals;

use anyhow::{Context, anyhow, bail};
use clap::{Parser, Subcommand};
use comfy_table::{Attribute, Cell, Color, Table};
use inquire::{Confirm, DateSelect, Select, Text};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::import::{Field, FieldMapping, ParsedTable};
use crate::model::{
    AppSettings, Currency, CustomerType, Invoice, InvoiceItem, IssuerConfig, PaymentStatus,
};
use crate::payment::{SessionStatus, StripeClient};
use crate::store::Store;

// ==========================================
// Constants & Embeds
// ==========================================
const SKIP_OPT: &str = "➖ Don't map";

// Embed the default issuer block at compile time to ensure availability
const DEFAULT_ISSUER: &str = include_str!("../issuer.toml");

// ==========================================
// CLI Definition
// ==========================================

#[derive(Parser)]
#[command(name = "invoice-desk")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new invoice
    New,
    /// List saved invoices
    List {
        /// Only show invoices with this status (draft/sent/paid/overdue/cancelled)
        #[arg(long)]
        status: Option<String>,
    },
    /// Show one invoice in full
    Show { invoice_number: String },
    /// Edit a saved invoice
    Edit { invoice_number: String },
    /// Export an invoice to HTML/PDF (marks drafts as sent)
    Export {
        invoice_number: String,
        /// Document language (en/pt); pt adds a _PT filename suffix
        #[arg(long, default_value = "en")]
        lang: String,
    },
    /// Import invoices from a CSV file
    ImportCsv { file: PathBuf },
    /// Import invoices from a published Google Sheet
    ImportSheet {
        url: String,
        /// Sheet tab name
        #[arg(long, default_value = "Sheet1")]
        sheet: String,
    },
    /// Collect payment for an invoice through Stripe Checkout
    Pay { invoice_number: String },
    /// Check the status of an earlier checkout session
    CheckPayment {
        invoice_number: String,
        session_id: String,
    },
    /// Delete an invoice
    Delete { invoice_number: String },
    /// Monthly paid/unpaid summary
    Summary {
        /// Year to summarize (defaults to current year)
        year: Option<i32>,
    },
    /// Configure currency, invoice prefix and data directory
    Config,
}

// ==========================================
// Main Function
// ==========================================

fn main() {
    let cli = Cli::parse();

    if cli.command.is_none() {
        use clap::CommandFactory;
        Cli::command().print_help().ok();
        return;
    }
    let command = cli.command.unwrap();

    if matches!(command, Commands::Config) {
        if let Err(e) = setup_config_wizard() {
            eprintln!("❌ {e:#}");
            std::process::exit(1);
        }
        return;
    }

    // 1. Initialize configuration
    let settings = match load_settings() {
        Some(settings) => settings,
        None => match setup_config_wizard() {
            Ok(settings) => settings,
            Err(e) => {
                eprintln!("❌ {e:#}");
                std::process::exit(1);
            }
        },
    };

    let root = PathBuf::from(expand_home_dir(&settings.data_root));
    let store = match Store::open(&root) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("❌ {e}");
            std::process::exit(1);
        }
    };

    let result = match command {
        Commands::New => cmd_new(&store, &settings),
        Commands::List { status } => cmd_list(&store, &settings, status.as_deref()),
        Commands::Show { invoice_number } => cmd_show(&store, &settings, &invoice_number),
        Commands::Edit { invoice_number } => cmd_edit(&store, &settings, &invoice_number),
        Commands::Export {
            invoice_number,
            lang,
        } => cmd_export(&store, &settings, &invoice_number, &lang),
        Commands::ImportCsv { file } => cmd_import_csv(&store, &settings, &file),
        Commands::ImportSheet { url, sheet } => cmd_import_sheet(&store, &settings, &url, &sheet),
        Commands::Pay { invoice_number } => cmd_pay(&store, &settings, &invoice_number),
        Commands::CheckPayment {
            invoice_number,
            session_id,
        } => cmd_check_payment(&store, &invoice_number, &session_id),
        Commands::Delete { invoice_number } => cmd_delete(&store, &invoice_number),
        Commands::Summary { year } => cmd_summary(&store, &settings, year),
        Commands::Config => unreachable!(),
    };

    if let Err(e) = result {
        eprintln!("❌ {e:#}");
        std::process::exit(1);
    }
}

// ==========================================
// 1. Invoice Creation & Editing
// ==========================================

fn cmd_new(store: &Store, settings: &AppSettings) -> anyhow::Result<()> {
    println!("\n--- Creating New Invoice ---");

    let mut invoice = Invoice::new(
        ids::invoice_number(&settings.invoice_prefix),
        ids::item_id("item"),
    );
    println!("📄 Invoice Number: {}", invoice.invoice_number);

    invoice.customer = prompt_required("Customer Name:")?;
    invoice.customer_type = prompt_customer_type(invoice.customer_type)?;
    invoice.customer_email = Text::new("Customer Email (Optional):").prompt()?.trim().to_string();
    invoice.customer_address = Text::new("Billing Address (Optional):").prompt()?.trim().to_string();

    let items = enter_invoice_items()?;
    if items.is_empty() {
        println!("❌ No items entered. Aborting.");
        return Ok(());
    }
    invoice.items = items;

    let date = DateSelect::new("Invoice Date:")
        .with_default(chrono::Local::now().date_naive())
        .prompt()?;
    invoice.date = date.to_string();

    if Confirm::new("Add a due date?").with_default(false).prompt()? {
        let due = DateSelect::new("Due Date:").with_default(date).prompt()?;
        invoice.due_date = Some(due.to_string());
    }

    invoice.tax_rate = ask_for_tax_rate()?;
    invoice.production_cost = prompt_optional_f64("Production Cost (Optional):")?;
    invoice.platform = prompt_optional("Platform / Source (Optional):")?;
    invoice.notes = prompt_optional("Notes (Optional):")?;

    invoice.recalculate();
    invoice.touch();

    let number = invoice.invoice_number.clone();
    let total = render::format_amount(invoice.total_amount, &settings.currency);
    store.upsert(invoice)?;
    println!("✅ Saved invoice {} | Total {}", number, total);
    Ok(())
}

fn enter_invoice_items() -> anyhow::Result<Vec<InvoiceItem>> {
    let mut items = Vec::new();
    println!("\n--- Enter Invoice Items ---");
    println!("(Leave Product empty to finish)");

    loop {
        let product = Text::new("Product (leave empty to finish):").prompt()?;
        if product.trim().is_empty() {
            break;
        }

        let mut item = InvoiceItem::blank(ids::item_id("item"));
        item.product = product.trim().to_string();
        item.category = Text::new("Category (Optional):").prompt()?.trim().to_string();
        item.product_type = Text::new("Product Type (Optional):").prompt()?.trim().to_string();

        let quantity_str = Text::new("Quantity:").with_default("1").prompt()?;
        item.set_quantity(quantity_str.trim().parse().unwrap_or(1));

        let price_str = Text::new("Price per Unit:").prompt()?;
        item.set_price_per_unit(price_str.trim().parse().unwrap_or(0.0));

        items.push(item);
    }
    Ok(items)
}

// Returns the tax rate in percent, or None when the invoice is tax-free.
fn ask_for_tax_rate() -> anyhow::Result<Option<f64>> {
    let apply_tax = Confirm::new("Add Tax to Total?").with_default(false).prompt()?;
    if !apply_tax {
        return Ok(None);
    }
    let rate_str = Text::new("Tax Rate % (e.g. 8.875):").with_default("8.875").prompt()?;
    Ok(Some(rate_str.trim().parse().unwrap_or(0.0)))
}

fn cmd_edit(store: &Store, settings: &AppSettings, invoice_number: &str) -> anyhow::Result<()> {
    let mut invoice = require_invoice(store, invoice_number)?;

    let fields = vec![
        "Customer Name",
        "Customer Type",
        "Customer Email",
        "Billing Address",
        "Due Date",
        "Tax Rate",
        "Production Cost",
        "Platform",
        "Status",
        "Notes",
        "Item Quantity",
        "Item Price",
        "Add Item",
        "Remove Item",
    ];
    let choice = Select::new("Field to edit:", fields).prompt()?;

    match choice {
        "Customer Name" => invoice.customer = prompt_required("Customer Name:")?,
        "Customer Type" => invoice.customer_type = prompt_customer_type(invoice.customer_type)?,
        "Customer Email" => {
            invoice.customer_email = Text::new("Customer Email:").prompt()?.trim().to_string()
        }
        "Billing Address" => {
            invoice.customer_address = Text::new("Billing Address:").prompt()?.trim().to_string()
        }
        "Due Date" => {
            let due = DateSelect::new("Due Date:").prompt()?;
            invoice.due_date = Some(due.to_string());
        }
        "Tax Rate" => invoice.tax_rate = ask_for_tax_rate()?,
        "Production Cost" => invoice.production_cost = prompt_optional_f64("Production Cost:")?,
        "Platform" => invoice.platform = prompt_optional("Platform / Source:")?,
        "Status" => {
            let labels: Vec<&str> = PaymentStatus::ALL.iter().map(|s| s.label()).collect();
            let picked = Select::new("Status:", labels).prompt()?;
            invoice.status = PaymentStatus::parse(picked).unwrap_or(invoice.status);
        }
        "Notes" => invoice.notes = prompt_optional("Notes:")?,
        "Item Quantity" => {
            let id = pick_item(&invoice)?;
            let quantity_str = Text::new("Quantity:").prompt()?;
            invoice.update_item_quantity(&id, quantity_str.trim().parse().unwrap_or(1))?;
        }
        "Item Price" => {
            let id = pick_item(&invoice)?;
            let price_str = Text::new("Price per Unit:").prompt()?;
            invoice.update_item_price(&id, price_str.trim().parse().unwrap_or(0.0))?;
        }
        "Add Item" => {
            let mut added = enter_invoice_items()?;
            if added.is_empty() {
                println!("❌ No items entered.");
                return Ok(());
            }
            for item in added.drain(..) {
                invoice.add_item(item);
            }
        }
        "Remove Item" => {
            let id = pick_item(&invoice)?;
            invoice.remove_item(&id)?;
        }
        _ => unreachable!(),
    }

    invoice.recalculate();
    invoice.touch();
    let total = render::format_amount(invoice.total_amount, &settings.currency);
    store.upsert(invoice)?;
    println!("✅ Updated {} | Total {}", invoice_number, total);
    Ok(())
}

fn pick_item(invoice: &Invoice) -> anyhow::Result<String> {
    let options: Vec<String> = invoice
        .items
        .iter()
        .map(|item| format!("{} | {} x {}", item.product, item.quantity, item.price_per_unit))
        .collect();
    let picked = Select::new("Select Item:", options.clone()).prompt()?;
    let index = options
        .iter()
        .position(|option| *option == picked)
        .unwrap_or(0);
    Ok(invoice.items[index].id.clone())
}

fn prompt_customer_type(current: CustomerType) -> anyhow::Result<CustomerType> {
    let labels: Vec<&str> = CustomerType::ALL.iter().map(|t| t.label()).collect();
    let start = CustomerType::ALL.iter().position(|t| *t == current).unwrap_or(0);
    let picked = Select::new("Customer Type:", labels)
        .with_starting_cursor(start)
        .prompt()?;
    Ok(CustomerType::parse(picked).unwrap_or(current))
}

// ==========================================
// 2. Listing & Summary
// ==========================================

fn cmd_list(store: &Store, settings: &AppSettings, status: Option<&str>) -> anyhow::Result<()> {
    let filter = match status {
        Some(s) => Some(
            PaymentStatus::parse(s).ok_or_else(|| anyhow!("Unknown status: {}", s))?,
        ),
        None => None,
    };

    let invoices = store.load()?;
    let mut table = Table::new();
    table.set_header(vec![
        Cell::new("Invoice #"),
        Cell::new("Date"),
        Cell::new("Customer"),
        Cell::new("Status"),
        Cell::new("Total"),
    ]);

    let mut count = 0;
    for invoice in &invoices {
        if let Some(wanted) = filter {
            if invoice.status != wanted {
                continue;
            }
        }
        table.add_row(vec![
            Cell::new(&invoice.invoice_number),
            Cell::new(&invoice.date),
            Cell::new(&invoice.customer),
            status_cell(invoice.status),
            Cell::new(render::format_amount(invoice.total_amount, &settings.currency)),
        ]);
        count += 1;
    }

    if count == 0 {
        println!("(No invoices found)");
    } else {
        println!("{table}");
    }
    Ok(())
}

fn status_cell(status: PaymentStatus) -> Cell {
    let cell = Cell::new(status.label());
    match status {
        PaymentStatus::Paid => cell.fg(Color::Rgb { r: 4, g: 120, b: 87 }),
        PaymentStatus::Overdue => cell.fg(Color::Rgb { r: 185, g: 28, b: 28 }),
        _ => cell,
    }
}

fn cmd_show(store: &Store, settings: &AppSettings, invoice_number: &str) -> anyhow::Result<()> {
    let invoice = require_invoice(store, invoice_number)?;
    let currency = &settings.currency;

    println!("\n📄 Invoice {}  [{}]", invoice.invoice_number, invoice.status);
    println!("Customer: {} ({})", invoice.customer, invoice.customer_type);
    if !invoice.customer_email.is_empty() {
        println!("Email:    {}", invoice.customer_email);
    }
    if !invoice.customer_address.is_empty() {
        println!("Address:  {}", invoice.customer_address);
    }
    println!("Date:     {}", invoice.date);
    if let Some(due) = &invoice.due_date {
        println!("Due:      {}", due);
    }

    let mut table = Table::new();
    table.set_header(vec![
        Cell::new("Product"),
        Cell::new("Category"),
        Cell::new("Qty"),
        Cell::new("Unit Price"),
        Cell::new("Total"),
    ]);
    for item in &invoice.items {
        table.add_row(vec![
            Cell::new(&item.product),
            Cell::new(&item.category),
            Cell::new(item.quantity),
            Cell::new(render::format_amount(item.price_per_unit, currency)),
            Cell::new(render::format_amount(item.total, currency)),
        ]);
    }
    println!("{table}");

    println!("Subtotal: {}", render::format_amount(invoice.subtotal, currency));
    if let Some(tax) = invoice.tax {
        println!(
            "Tax ({}%): {}",
            invoice.tax_rate.unwrap_or(0.0),
            render::format_amount(tax, currency)
        );
    }
    println!("Total:    {}", render::format_amount(invoice.total_amount, currency));
    if let Some(revenue) = invoice.revenue {
        println!(
            "Revenue:  {} (ratio {:.2})",
            render::format_amount(revenue, currency),
            invoice.revenue_ratio.unwrap_or(0.0)
        );
    }
    if let Some(reference) = &invoice.payment_reference {
        println!("Payment:  {}", reference);
    }
    Ok(())
}

fn cmd_summary(store: &Store, settings: &AppSettings, year: Option<i32>) -> anyhow::Result<()> {
    use chrono::{Datelike, NaiveDate};

    let target_year = year.unwrap_or_else(|| chrono::Local::now().year());
    let invoices = store.load()?;

    // Key: (Year, Month), Value: (Paid, Unpaid)
    let mut monthly_totals: BTreeMap<(i32, u32), (f64, f64)> = BTreeMap::new();
    // Key: Customer, Value: (Paid, Unpaid)
    let mut customer_totals: BTreeMap<String, (f64, f64)> = BTreeMap::new();

    for invoice in &invoices {
        if invoice.status == PaymentStatus::Cancelled {
            continue;
        }
        let Ok(date) = NaiveDate::parse_from_str(&invoice.date, "%Y-%m-%d") else {
            continue;
        };
        if date.year() != target_year {
            continue;
        }
        let is_paid = invoice.status == PaymentStatus::Paid;

        let entry = monthly_totals.entry((date.year(), date.month())).or_insert((0.0, 0.0));
        if is_paid {
            entry.0 += invoice.total_amount;
        } else {
            entry.1 += invoice.total_amount;
        }

        let customer_entry = customer_totals
            .entry(invoice.customer.clone())
            .or_insert((0.0, 0.0));
        if is_paid {
            customer_entry.0 += invoice.total_amount;
        } else {
            customer_entry.1 += invoice.total_amount;
        }
    }

    if monthly_totals.is_empty() {
        println!("No invoices found for {}.", target_year);
        return Ok(());
    }

    let currency = &settings.currency;
    let mut table = Table::new();
    table.set_header(vec![
        Cell::new("Month"),
        Cell::new("Paid"),
        Cell::new("Unpaid"),
        Cell::new("Total"),
    ]);

    let mut total_paid = 0.0;
    let mut total_unpaid = 0.0;

    for ((year, month), (paid, unpaid)) in monthly_totals.iter().rev() {
        let month_str = NaiveDate::from_ymd_opt(*year, *month, 1)
            .unwrap()
            .format("%B %Y")
            .to_string();
        table.add_row(vec![
            Cell::new(month_str),
            amount_cell(*paid, currency, Color::Rgb { r: 4, g: 120, b: 87 }),
            amount_cell(*unpaid, currency, Color::Rgb { r: 185, g: 28, b: 28 }),
            Cell::new(render::format_amount(paid + unpaid, currency)),
        ]);
        total_paid += paid;
        total_unpaid += unpaid;
    }

    table.add_row(vec![
        Cell::new(format!("Total ({})", target_year)).add_attribute(Attribute::Bold),
        amount_cell(total_paid, currency, Color::Rgb { r: 4, g: 120, b: 87 })
            .add_attribute(Attribute::Bold),
        amount_cell(total_unpaid, currency, Color::Rgb { r: 185, g: 28, b: 28 })
            .add_attribute(Attribute::Bold),
        Cell::new(render::format_amount(total_paid + total_unpaid, currency))
            .add_attribute(Attribute::Bold),
    ]);

    println!("\n--- Monthly Invoice Summary ({}) ---", target_year);
    println!("{table}");

    let mut customer_table = Table::new();
    customer_table.set_header(vec![
        Cell::new("Customer"),
        Cell::new("Paid"),
        Cell::new("Unpaid"),
        Cell::new("Total"),
    ]);

    // Sort customers by total amount descending
    let mut customer_vec: Vec<_> = customer_totals.into_iter().collect();
    customer_vec.sort_by(|a, b| (b.1.0 + b.1.1).partial_cmp(&(a.1.0 + a.1.1)).unwrap());

    for (customer, (paid, unpaid)) in customer_vec {
        customer_table.add_row(vec![
            Cell::new(customer),
            amount_cell(paid, currency, Color::Rgb { r: 4, g: 120, b: 87 }),
            amount_cell(unpaid, currency, Color::Rgb { r: 185, g: 28, b: 28 }),
            Cell::new(render::format_amount(paid + unpaid, currency)),
        ]);
    }

    println!("\n--- Customer Summary ({}) ---", target_year);
    println!("{customer_table}");
    Ok(())
}

fn amount_cell(amount: f64, currency: &Currency, color: Color) -> Cell {
    let cell = Cell::new(render::format_amount(amount, currency));
    if amount > 0.0 { cell.fg(color) } else { cell }
}

// ==========================================
// 3. Import Flow
// ==========================================

fn cmd_import_csv(store: &Store, settings: &AppSettings, file: &Path) -> anyhow::Result<()> {
    let text = fs::read_to_string(file)
        .with_context(|| format!("Import Failed: cannot read {}", file.display()))?;
    run_import_flow(store, settings, &text).context("Import Failed")
}

fn cmd_import_sheet(
    store: &Store,
    settings: &AppSettings,
    url: &str,
    sheet: &str,
) -> anyhow::Result<()> {
    println!("🔗 Fetching sheet export...");
    let text = import::fetch_sheet_csv(url, sheet).context("Import Failed")?;
    run_import_flow(store, settings, &text).context("Import Failed")
}

fn run_import_flow(store: &Store, settings: &AppSettings, text: &str) -> anyhow::Result<()> {
    let table = import::parse_table(text)?;
    println!(
        "✅ Parsed {} columns, {} rows",
        table.headers.len(),
        table.rows.len()
    );
    print_preview(&table);

    let mut mapping = import::auto_map(&table.headers);
    println!("\n--- Map Columns to Invoice Fields ---");
    run_mapping_wizard(&table.headers, &mut mapping, false)?;

    // Required fields block the import until they are mapped.
    while let Err(e) = mapping.validate() {
        println!("⚠️  {}", e);
        if !Confirm::new("Map the missing fields now?").with_default(true).prompt()? {
            bail!("{}", e);
        }
        run_mapping_wizard(&table.headers, &mut mapping, true)?;
    }

    let existing = store.load()?;
    let batch = import::build_invoices(&table, &mapping, settings, &existing)?;

    let go = Confirm::new(&format!("Import {} invoices?", batch.len()))
        .with_default(true)
        .prompt()?;
    if !go {
        println!("Cancelled.");
        return Ok(());
    }

    let count = store.append_all(batch)?;
    println!("✅ Successfully imported {} invoices.", count);
    Ok(())
}

fn run_mapping_wizard(
    headers: &[String],
    mapping: &mut FieldMapping,
    missing_only: bool,
) -> anyhow::Result<()> {
    for field in Field::ALL {
        if missing_only && (!field.required() || mapping.column(field).is_some()) {
            continue;
        }

        let mut options = vec![SKIP_OPT.to_string()];
        options.extend(headers.iter().cloned());
        let start = mapping.column(field).map(|c| c + 1).unwrap_or(0);

        let marker = if field.required() { " *" } else { "" };
        let picked = Select::new(&format!("{}{}:", field.label(), marker), options.clone())
            .with_starting_cursor(start)
            .prompt()?;

        if picked == SKIP_OPT {
            mapping.clear(field);
        } else {
            // First occurrence wins when two headers share a name.
            let column = options.iter().position(|o| *o == picked).unwrap_or(1) - 1;
            mapping.set(field, column);
        }
    }
    Ok(())
}

fn print_preview(table: &ParsedTable) {
    let mut preview = Table::new();
    preview.set_header(table.headers.iter().map(Cell::new).collect::<Vec<_>>());
    for row in table.rows.iter().take(5) {
        preview.add_row(row.iter().map(Cell::new).collect::<Vec<_>>());
    }
    println!("{preview}");
    if table.rows.len() > 5 {
        println!("(Showing first 5 of {} rows)", table.rows.len());
    }
}

// ==========================================
// 4. Export
// ==========================================

fn cmd_export(
    store: &Store,
    settings: &AppSettings,
    invoice_number: &str,
    lang: &str,
) -> anyhow::Result<()> {
    let lang = render::Lang::parse(lang)
        .ok_or_else(|| anyhow!("Unknown language: {} (use en or pt)", lang))?;
    let mut invoice = require_invoice(store, invoice_number)?;
    let issuer = load_issuer_config(store.root())?;

    let out_dir = store.root().join("output");
    let outcome = render::export(&out_dir, &invoice, &issuer, &settings.currency, lang)?;

    invoice.mark_sent();
    invoice.touch();
    store.upsert(invoice)?;

    println!("✅ Exported: {:?}", outcome.html_path);
    match &outcome.pdf_path {
        Some(pdf) => {
            println!("✅ PDF Generated: {:?}", pdf);
            open_and_reveal(pdf);
        }
        None => println!(
            "💡 Install 'wkhtmltopdf' to get a PDF; the HTML file prints to PDF from any browser."
        ),
    }
    Ok(())
}

// ==========================================
// 5. Payment Flow
// ==========================================

fn cmd_pay(store: &Store, settings: &AppSettings, invoice_number: &str) -> anyhow::Result<()> {
    let invoice = require_invoice(store, invoice_number)?;
    payment::validate_for_checkout(&invoice)?;

    let client = StripeClient::from_env()?;
    println!("💳 Creating checkout session...");
    let session = client.create_session(&invoice, &settings.currency)?;

    println!("✅ Session created: {}", session.id);
    if let Some(secret) = &session.client_secret {
        println!("🔑 Client secret (for the embedded checkout page): {}", secret);
    }
    if let Some(url) = &session.url {
        println!("🔗 Checkout URL: {}", url);
    }

    loop {
        let check_now = Confirm::new("Check payment status now?")
            .with_default(true)
            .prompt()?;
        if !check_now {
            println!(
                "💡 Run `invoice-desk check-payment {} {}` once the customer has paid.",
                invoice_number, session.id
            );
            return Ok(());
        }
        if poll_session(store, &client, invoice_number, &session.id)? {
            return Ok(());
        }
    }
}

fn cmd_check_payment(store: &Store, invoice_number: &str, session_id: &str) -> anyhow::Result<()> {
    let client = StripeClient::from_env()?;
    poll_session(store, &client, invoice_number, session_id)?;
    Ok(())
}

/// One status poll. Returns true when the session reached a final state.
fn poll_session(
    store: &Store,
    client: &StripeClient,
    invoice_number: &str,
    session_id: &str,
) -> anyhow::Result<bool> {
    let check = client.check_status(session_id)?;
    println!("🔍 Session status: {}", check.status.label());
    match check.status {
        SessionStatus::Paid => {
            let mut invoice = require_invoice(store, invoice_number)?;
            invoice.mark_paid(check.payment_reference.unwrap_or_default());
            invoice.touch();
            store.upsert(invoice)?;
            println!("✅ Payment confirmed. Invoice {} marked as paid.", invoice_number);
            Ok(true)
        }
        SessionStatus::Pending => {
            println!("⏳ Payment still pending.");
            Ok(false)
        }
        SessionStatus::Failed => {
            bail!("The checkout session expired before payment completed.")
        }
    }
}

// ==========================================
// 6. Delete
// ==========================================

fn cmd_delete(store: &Store, invoice_number: &str) -> anyhow::Result<()> {
    let sure = Confirm::new(&format!("Delete invoice {}?", invoice_number))
        .with_default(false)
        .prompt()?;
    if !sure {
        println!("Cancelled.");
        return Ok(());
    }
    if store.delete(invoice_number)? {
        println!("✅ Deleted {}.", invoice_number);
    } else {
        println!("⚠️  Invoice {} not found; nothing deleted.", invoice_number);
    }
    Ok(())
}

// ==========================================
// 7. Config & Utilities
// ==========================================

fn get_config_path() -> PathBuf {
    if let Some(proj_dirs) = directories::ProjectDirs::from("com", "invoice-desk", "app") {
        let config_dir = proj_dirs.config_dir();
        if !config_dir.exists() {
            fs::create_dir_all(config_dir).ok();
        }
        return config_dir.join("settings.toml");
    }
    PathBuf::from("settings.toml")
}

fn load_settings() -> Option<AppSettings> {
    let path = get_config_path();
    if !path.exists() {
        return None;
    }
    let content = fs::read_to_string(path).ok()?;
    toml::from_str(&content).ok()
}

fn setup_config_wizard() -> anyhow::Result<AppSettings> {
    println!("\n⚙️  --- Configuration Setup ---");
    let current = load_settings().unwrap_or_default();

    let currency_options: Vec<String> = Currency::all()
        .iter()
        .map(|c| format!("{} - {} ({})", c.code, c.name, c.symbol))
        .collect();
    let start = Currency::all()
        .iter()
        .position(|c| c.code == current.currency.code)
        .unwrap_or(0);
    let picked = Select::new("Currency:", currency_options.clone())
        .with_starting_cursor(start)
        .prompt()?;
    let index = currency_options.iter().position(|o| *o == picked).unwrap_or(0);
    let currency = Currency::all().swap_remove(index);

    let invoice_prefix = Text::new("Invoice Prefix:")
        .with_default(&current.invoice_prefix)
        .prompt()?
        .trim()
        .to_string();

    println!("📂 Opening folder picker...");
    let picked_path = rfd::FileDialog::new()
        .set_title("Select Invoice Data Directory")
        .pick_folder();

    let data_root = if let Some(path) = picked_path {
        path.to_string_lossy().to_string()
    } else {
        println!("❌ No folder selected. Falling back to manual input.");
        Text::new("Enter Data Directory:")
            .with_default(&current.data_root)
            .prompt()?
    };

    let settings = AppSettings {
        currency,
        invoice_prefix,
        data_root,
    };

    let path = get_config_path();
    let toml_str = toml::to_string_pretty(&settings)?;
    fs::write(&path, toml_str).context("Failed to save settings")?;
    println!("✅ Settings saved.");
    Ok(settings)
}

fn load_issuer_config(root: &Path) -> anyhow::Result<IssuerConfig> {
    let path = root.join("issuer.toml");
    if path.exists() {
        let content = fs::read_to_string(&path)?;
        return toml::from_str(&content).context("Failed to parse issuer.toml");
    }
    println!("✨ Initializing default issuer configuration...");
    fs::write(&path, DEFAULT_ISSUER).context("Failed to write issuer.toml")?;
    Ok(toml::from_str(DEFAULT_ISSUER)?)
}

fn require_invoice(store: &Store, invoice_number: &str) -> anyhow::Result<Invoice> {
    store
        .find(invoice_number)?
        .ok_or_else(|| anyhow!("Invoice {} not found.", invoice_number))
}

fn prompt_required(label: &str) -> anyhow::Result<String> {
    loop {
        let value = Text::new(label).prompt()?;
        let value = value.trim();
        if !value.is_empty() {
            return Ok(value.to_string());
        }
        println!("⚠️  This field is required.");
    }
}

fn prompt_optional(label: &str) -> anyhow::Result<Option<String>> {
    let value = Text::new(label).prompt()?;
    let value = value.trim();
    Ok(if value.is_empty() { None } else { Some(value.to_string()) })
}

fn prompt_optional_f64(label: &str) -> anyhow::Result<Option<f64>> {
    let value = Text::new(label).prompt()?;
    Ok(value.trim().parse::<f64>().ok())
}

fn expand_home_dir(path: &str) -> String {
    if path.starts_with("~") {
        if let Some(base_dirs) = directories::BaseDirs::new() {
            let home = base_dirs.home_dir().to_string_lossy();
            return path.replacen("~", &home, 1);
        }
    }
    path.to_string()
}

// Helper: Open file and reveal in Finder/Explorer
fn open_and_reveal(path: &Path) {
    #[cfg(target_os = "macos")]
    Command::new("open").arg(path).spawn().ok();

    #[cfg(target_os = "windows")]
    Command::new("explorer").arg(path).spawn().ok();

    #[cfg(target_os = "linux")]
    Command::new("xdg-open").arg(path).spawn().ok();
}
