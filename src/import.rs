//! Import / field-mapping pipeline.
//!
//! Sources are a local comma-separated file or a published Google Sheet
//! fetched through its CSV export URL. Parsing uses a naive comma split:
//! surrounding quotes are stripped and a quoted value containing a
//! literal comma will be mis-split. Rows whose column count does not
//! match the header are dropped, not errors.

use std::collections::{HashMap, HashSet};

use regex::Regex;

use crate::error::{Error, Result};
use crate::ids;
use crate::model::{AppSettings, CustomerType, Invoice, InvoiceItem, PaymentStatus};

/// Invoice fields an imported column can be mapped onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Customer,
    CustomerType,
    CustomerEmail,
    CustomerAddress,
    Product,
    Category,
    ProductType,
    Quantity,
    PricePerUnit,
    Platform,
    Status,
    ProductionCost,
    Notes,
}

impl Field {
    pub const ALL: [Field; 13] = [
        Field::Customer,
        Field::CustomerType,
        Field::CustomerEmail,
        Field::CustomerAddress,
        Field::Product,
        Field::Category,
        Field::ProductType,
        Field::Quantity,
        Field::PricePerUnit,
        Field::Platform,
        Field::Status,
        Field::ProductionCost,
        Field::Notes,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Field::Customer => "Customer Name",
            Field::CustomerType => "Customer Type",
            Field::CustomerEmail => "Customer Email",
            Field::CustomerAddress => "Customer Address",
            Field::Product => "Product Name",
            Field::Category => "Product Category",
            Field::ProductType => "Product Type",
            Field::Quantity => "Quantity",
            Field::PricePerUnit => "Price per Unit",
            Field::Platform => "Platform",
            Field::Status => "Status",
            Field::ProductionCost => "Production Cost",
            Field::Notes => "Additional Notes",
        }
    }

    /// Import cannot proceed until every required field is mapped.
    pub fn required(self) -> bool {
        matches!(
            self,
            Field::Customer | Field::Product | Field::Quantity | Field::PricePerUnit
        )
    }
}

/// Mapping from invoice field to source column index.
#[derive(Debug, Default, Clone)]
pub struct FieldMapping {
    columns: HashMap<Field, usize>,
}

impl FieldMapping {
    pub fn set(&mut self, field: Field, column: usize) {
        self.columns.insert(field, column);
    }

    pub fn clear(&mut self, field: Field) {
        self.columns.remove(&field);
    }

    pub fn column(&self, field: Field) -> Option<usize> {
        self.columns.get(&field).copied()
    }

    pub fn missing_required(&self) -> Vec<Field> {
        Field::ALL
            .into_iter()
            .filter(|field| field.required() && !self.columns.contains_key(field))
            .collect()
    }

    pub fn validate(&self) -> Result<()> {
        let missing = self.missing_required();
        if missing.is_empty() {
            return Ok(());
        }
        let labels: Vec<&str> = missing.iter().map(|field| field.label()).collect();
        Err(Error::Validation(format!(
            "Missing required fields: {}",
            labels.join(", ")
        )))
    }
}

#[derive(Debug, Clone)]
pub struct ParsedTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Splits the input into a header row plus data rows. Blank lines are
/// skipped; rows with a mismatched column count are silently dropped.
pub fn parse_table(text: &str) -> Result<ParsedTable> {
    let mut lines = text.lines().filter(|line| !line.trim().is_empty());
    let header_line = lines
        .next()
        .ok_or_else(|| Error::Parse("The source is empty.".to_string()))?;
    let headers = split_row(header_line);
    let rows: Vec<Vec<String>> = lines
        .map(split_row)
        .filter(|row| row.len() == headers.len())
        .collect();
    if rows.is_empty() {
        return Err(Error::Parse(
            "The source must contain a header row and at least one data row.".to_string(),
        ));
    }
    Ok(ParsedTable { headers, rows })
}

fn split_row(line: &str) -> Vec<String> {
    line.split(',')
        .map(|value| value.trim().trim_matches('"').trim().to_string())
        .collect()
}

/// Best-effort header matching: first header whose lowercase form
/// contains, or is contained by, the field label's first word, or equals
/// the whole label. First match wins; unmatched fields stay unmapped.
pub fn auto_map(headers: &[String]) -> FieldMapping {
    let mut mapping = FieldMapping::default();
    for field in Field::ALL {
        let label = field.label().to_lowercase();
        let first_word = label.split_whitespace().next().unwrap_or("");
        let hit = headers.iter().position(|header| {
            let header = header.trim().to_lowercase();
            !header.is_empty()
                && (header.contains(first_word) || first_word.contains(&header) || header == label)
        });
        if let Some(column) = hit {
            mapping.set(field, column);
        }
    }
    mapping
}

/// Builds one single-item invoice per source row. Malformed numeric cells
/// fall back to defaults (quantity 1, price 0, cost 0) instead of
/// aborting the batch; every row gets a fresh, non-colliding invoice
/// number.
pub fn build_invoices(
    table: &ParsedTable,
    mapping: &FieldMapping,
    settings: &AppSettings,
    existing: &[Invoice],
) -> Result<Vec<Invoice>> {
    mapping.validate()?;

    let mut taken: HashSet<String> = existing
        .iter()
        .map(|invoice| invoice.invoice_number.clone())
        .collect();
    let mut batch = Vec::with_capacity(table.rows.len());

    for row in &table.rows {
        let value = |field: Field| -> &str {
            mapping
                .column(field)
                .and_then(|column| row.get(column))
                .map(String::as_str)
                .unwrap_or("")
        };

        let quantity = value(Field::Quantity).trim().parse::<u32>().unwrap_or(1).max(1);
        let price = value(Field::PricePerUnit).trim().parse::<f64>().unwrap_or(0.0);
        let cost = value(Field::ProductionCost).trim().parse::<f64>().unwrap_or(0.0);

        let number = ids::unique_invoice_number(&settings.invoice_prefix, &taken);
        taken.insert(number.clone());

        let mut item = InvoiceItem::blank(ids::item_id("item"));
        item.product = value(Field::Product).to_string();
        item.category = value(Field::Category).to_string();
        item.product_type = value(Field::ProductType).to_string();
        item.set_quantity(quantity);
        item.set_price_per_unit(price);

        let mut invoice = Invoice::new(number, item.id.clone());
        invoice.items = vec![item];
        invoice.customer = value(Field::Customer).to_string();
        invoice.customer_type =
            CustomerType::parse(value(Field::CustomerType)).unwrap_or(CustomerType::Individual);
        invoice.customer_email = value(Field::CustomerEmail).to_string();
        invoice.customer_address = value(Field::CustomerAddress).to_string();
        invoice.status = PaymentStatus::parse(value(Field::Status)).unwrap_or(PaymentStatus::Draft);
        invoice.platform = non_empty(value(Field::Platform));
        invoice.notes = non_empty(value(Field::Notes));
        if cost != 0.0 {
            invoice.production_cost = Some(cost);
        }
        invoice.touch();
        invoice.recalculate();
        batch.push(invoice);
    }

    Ok(batch)
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Sheet id from a shareable Google Sheets link.
pub fn extract_sheet_id(url: &str) -> Option<String> {
    let re = Regex::new(r"/spreadsheets/d/([a-zA-Z0-9-_]+)").unwrap();
    re.captures(url).map(|caps| caps[1].to_string())
}

/// Fetches a published sheet tab through its CSV export endpoint. The
/// sheet must be shared as "anyone with the link".
pub fn fetch_sheet_csv(url: &str, sheet_name: &str) -> Result<String> {
    let sheet_id = extract_sheet_id(url).ok_or_else(|| {
        Error::Validation("That does not look like a Google Sheets link.".to_string())
    })?;
    let export_url = format!(
        "https://docs.google.com/spreadsheets/d/{}/gviz/tq",
        sheet_id
    );
    let response = reqwest::blocking::Client::new()
        .get(&export_url)
        .query(&[("tqx", "out:csv"), ("sheet", sheet_name)])
        .send()?;
    if !response.status().is_success() {
        return Err(Error::ExternalService(
            "Failed to access the sheet. Make sure it is publicly accessible.".to_string(),
        ));
    }
    Ok(response.text()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AppSettings;

    const SAMPLE: &str = "Customer Name,Product Name,Quantity,Price Per Unit\nJane Doe,Widget,3,9.99\n";

    #[test]
    fn parses_header_and_data_rows() {
        let table = parse_table(SAMPLE).unwrap();
        assert_eq!(
            table.headers,
            vec!["Customer Name", "Product Name", "Quantity", "Price Per Unit"]
        );
        assert_eq!(table.rows, vec![vec!["Jane Doe", "Widget", "3", "9.99"]]);
    }

    #[test]
    fn strips_surrounding_quotes_and_blank_lines() {
        let text = "\"Name\",\"Amount\"\n\n\"Widget\",\"12.50\"\n";
        let table = parse_table(text).unwrap();
        assert_eq!(table.headers, vec!["Name", "Amount"]);
        assert_eq!(table.rows[0], vec!["Widget", "12.50"]);
    }

    #[test]
    fn drops_rows_with_mismatched_column_count() {
        let text = "A,B,C\n1,2,3\nonly,two\n4,5,6\n";
        let table = parse_table(text).unwrap();
        assert_eq!(table.rows.len(), 2);
    }

    #[test]
    fn header_only_input_is_a_parse_error() {
        assert!(matches!(
            parse_table("A,B,C\n"),
            Err(Error::Parse(_))
        ));
        assert!(matches!(parse_table(""), Err(Error::Parse(_))));
    }

    #[test]
    fn auto_map_matches_sample_headers() {
        let table = parse_table(SAMPLE).unwrap();
        let mapping = auto_map(&table.headers);
        assert_eq!(mapping.column(Field::Customer), Some(0));
        assert_eq!(mapping.column(Field::Product), Some(1));
        assert_eq!(mapping.column(Field::Quantity), Some(2));
        assert_eq!(mapping.column(Field::PricePerUnit), Some(3));
        assert!(mapping.validate().is_ok());
    }

    #[test]
    fn auto_map_leaves_unknown_headers_unmapped() {
        let headers = vec!["Foo".to_string(), "Bar".to_string()];
        let mapping = auto_map(&headers);
        assert_eq!(mapping.column(Field::Customer), None);
        let missing = mapping.missing_required();
        assert_eq!(missing.len(), 4);
    }

    #[test]
    fn validate_blocks_until_required_fields_mapped() {
        let mut mapping = FieldMapping::default();
        mapping.set(Field::Customer, 0);
        mapping.set(Field::Product, 1);
        mapping.set(Field::Quantity, 2);
        assert!(mapping.validate().is_err());
        mapping.set(Field::PricePerUnit, 3);
        assert!(mapping.validate().is_ok());
    }

    #[test]
    fn builds_one_invoice_with_one_item_per_row() {
        let table = parse_table(SAMPLE).unwrap();
        let mapping = auto_map(&table.headers);
        let settings = AppSettings::default();
        let batch = build_invoices(&table, &mapping, &settings, &[]).unwrap();

        assert_eq!(batch.len(), 1);
        let invoice = &batch[0];
        assert_eq!(invoice.customer, "Jane Doe");
        assert_eq!(invoice.items.len(), 1);
        assert_eq!(invoice.items[0].product, "Widget");
        assert_eq!(invoice.items[0].quantity, 3);
        assert_eq!(invoice.items[0].price_per_unit, 9.99);
        assert_eq!(invoice.items[0].total, 29.97);
        assert_eq!(invoice.subtotal, 29.97);
        assert_eq!(invoice.status, PaymentStatus::Draft);
        assert!(invoice.created_at.is_some());
    }

    #[test]
    fn malformed_numerics_fall_back_to_defaults() {
        let text = "Customer Name,Product Name,Quantity,Price Per Unit,Production Cost\n\
                    Jane Doe,Widget,lots,cheap,n/a\n";
        let table = parse_table(text).unwrap();
        let mapping = auto_map(&table.headers);
        let batch = build_invoices(&table, &mapping, &AppSettings::default(), &[]).unwrap();

        let invoice = &batch[0];
        assert_eq!(invoice.items[0].quantity, 1);
        assert_eq!(invoice.items[0].price_per_unit, 0.0);
        assert_eq!(invoice.production_cost, None);
        assert_eq!(invoice.total_amount, 0.0);
    }

    #[test]
    fn batch_numbers_do_not_collide_with_existing_or_each_other() {
        let mut text = String::from("Customer Name,Product Name,Quantity,Price Per Unit\n");
        for i in 0..50 {
            text.push_str(&format!("Customer {},Widget,1,1.00\n", i));
        }
        let table = parse_table(&text).unwrap();
        let mapping = auto_map(&table.headers);
        let batch = build_invoices(&table, &mapping, &AppSettings::default(), &[]).unwrap();

        let mut seen = HashSet::new();
        for invoice in &batch {
            assert!(seen.insert(invoice.invoice_number.clone()));
        }
    }

    #[test]
    fn unmapped_optional_fields_use_model_defaults() {
        let table = parse_table(SAMPLE).unwrap();
        let mapping = auto_map(&table.headers);
        let batch = build_invoices(&table, &mapping, &AppSettings::default(), &[]).unwrap();
        let invoice = &batch[0];
        assert_eq!(invoice.platform, None);
        assert_eq!(invoice.notes, None);
        assert_eq!(invoice.tax_rate, None);
    }

    #[test]
    fn sheet_id_extracted_from_shareable_link() {
        let url = "https://docs.google.com/spreadsheets/d/1AbC-dEf_123/edit#gid=0";
        assert_eq!(extract_sheet_id(url).as_deref(), Some("1AbC-dEf_123"));
        assert_eq!(extract_sheet_id("https://example.com/x"), None);
    }
}
