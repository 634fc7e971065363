//! Commission export in a fixed column layout.
//!
//! Formatting is locale- and timezone-free: numbers are rendered with two
//! decimal places and `.` as separator, dates as UTC `YYYY-MM-DD`.

use crate::domain::CommissionEntry;
use thiserror::Error;

pub const EXPORT_HEADER: [&str; 12] = [
    "Date",
    "Affiliate Name",
    "Affiliate ID",
    "Customer Name",
    "Customer Email",
    "Product Name",
    "Commission Type",
    "Order Total",
    "Commission Amount",
    "Commission Rate",
    "Status",
    "Payment Date",
];

/// One export line, in `EXPORT_HEADER` order.
pub type ExportRow = [String; 12];

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("CSV write failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("CSV flush failed: {0}")]
    Flush(String),

    #[error("CSV output is not UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

pub fn export_rows(entries: &[CommissionEntry]) -> Vec<ExportRow> {
    entries.iter().map(export_row).collect()
}

fn export_row(entry: &CommissionEntry) -> ExportRow {
    let text = |value: &Option<String>| value.clone().unwrap_or_default();

    [
        entry.created_at.to_iso_date(),
        text(&entry.affiliate_name),
        text(&entry.affiliate_external_id),
        text(&entry.metadata.customer_name),
        text(&entry.metadata.customer_email),
        text(&entry.metadata.product_name),
        entry.commission_type.to_string(),
        entry.order_total.to_fixed(2),
        entry.commission_amount.to_fixed(2),
        entry.commission_rate.to_fixed(2),
        entry.status.to_string(),
        entry
            .payment_date
            .map(|d| d.to_iso_date())
            .unwrap_or_default(),
    ]
}

/// Header plus one record per entry, RFC 4180 quoting, CRLF line endings.
pub fn export_csv(entries: &[CommissionEntry]) -> Result<String, ExportError> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::CRLF)
        .quote_style(csv::QuoteStyle::Necessary)
        .from_writer(Vec::new());

    writer.write_record(EXPORT_HEADER)?;
    for row in export_rows(entries) {
        writer.write_record(&row)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| ExportError::Flush(e.error().to_string()))?;
    Ok(String::from_utf8(bytes)?)
}
