//! Excel report generation.
//!
//! One workbook, three sheets: sales, purchases, and a run summary. The
//! metadata records stay untyped JSON end to end; the column table below
//! picks the fields worth showing and flattens nested paths with a dotted
//! selector, leaving blanks where a record lacks the field.

use std::path::Path;

use ksef_domain::{InvoiceRecord, KsefError, Result};
use rust_xlsxwriter::{Color, Format, Workbook, Worksheet, XlsxError};
use serde_json::Value;
use tracing::info;

struct Column {
    label: &'static str,
    width: f64,
    path: &'static str,
}

const COLUMNS: &[Column] = &[
    Column { label: "Category", width: 20.0, path: "" },
    Column { label: "KSeF number", width: 38.0, path: "ksefNumber" },
    Column { label: "Invoice number", width: 24.0, path: "invoiceNumber" },
    Column { label: "Type", width: 10.0, path: "invoiceType" },
    Column { label: "Issue date", width: 14.0, path: "issueDate" },
    Column { label: "Invoicing date", width: 22.0, path: "invoicingDate" },
    Column { label: "Seller name", width: 34.0, path: "seller.name" },
    Column { label: "Seller NIP", width: 14.0, path: "seller.nip" },
    Column { label: "Buyer name", width: 34.0, path: "buyer.name" },
    Column { label: "Buyer id", width: 14.0, path: "buyer.identifier.value" },
    Column { label: "Net", width: 14.0, path: "netAmount" },
    Column { label: "VAT", width: 14.0, path: "vatAmount" },
    Column { label: "Gross", width: 14.0, path: "grossAmount" },
    Column { label: "Currency", width: 10.0, path: "currency" },
];

const HEADER_FILL: Color = Color::RGB(0x1F4E79);
const ALT_ROW_FILL: Color = Color::RGB(0xF2F2F2);

/// Context for the summary sheet.
pub struct RunSummary {
    pub nip: String,
    pub environment: String,
    pub date_from: String,
    pub date_to: String,
}

/// Write both record sets and the summary to `path`, overwriting any
/// existing file.
pub fn write_workbook(
    path: &Path,
    issued: &[InvoiceRecord],
    received: &[InvoiceRecord],
    summary: &RunSummary,
) -> Result<()> {
    let mut workbook = Workbook::new();

    write_record_sheet(workbook.add_worksheet(), "Issued", issued)?;
    write_record_sheet(workbook.add_worksheet(), "Received", received)?;
    write_summary_sheet(workbook.add_worksheet(), issued.len(), received.len(), summary)?;

    workbook.save(path).map_err(xlsx_err)?;
    info!(
        path = %path.display(),
        issued = issued.len(),
        received = received.len(),
        "report written"
    );
    Ok(())
}

fn write_record_sheet(
    sheet: &mut Worksheet,
    name: &str,
    records: &[InvoiceRecord],
) -> Result<()> {
    sheet.set_name(name).map_err(xlsx_err)?;

    let header = Format::new()
        .set_bold()
        .set_font_color(Color::White)
        .set_background_color(HEADER_FILL);
    let alt_row = Format::new().set_background_color(ALT_ROW_FILL);

    for (col, column) in COLUMNS.iter().enumerate() {
        let col = col as u16;
        sheet.write_string_with_format(0, col, column.label, &header).map_err(xlsx_err)?;
        sheet.set_column_width(col, column.width).map_err(xlsx_err)?;
    }

    for (index, record) in records.iter().enumerate() {
        let row = (index + 1) as u32;
        for (col, column) in COLUMNS.iter().enumerate() {
            let text = if column.path.is_empty() {
                record.category.clone()
            } else {
                cell_text(&record.fields, column.path)
            };
            let col = col as u16;
            if index % 2 == 1 {
                sheet.write_string_with_format(row, col, &text, &alt_row).map_err(xlsx_err)?;
            } else {
                sheet.write_string(row, col, &text).map_err(xlsx_err)?;
            }
        }
    }

    sheet.set_freeze_panes(1, 0).map_err(xlsx_err)?;
    if !records.is_empty() {
        sheet
            .autofilter(0, 0, records.len() as u32, (COLUMNS.len() - 1) as u16)
            .map_err(xlsx_err)?;
    }
    Ok(())
}

fn write_summary_sheet(
    sheet: &mut Worksheet,
    issued: usize,
    received: usize,
    summary: &RunSummary,
) -> Result<()> {
    sheet.set_name("Summary").map_err(xlsx_err)?;
    let bold = Format::new().set_bold();

    let rows: &[(&str, String)] = &[
        ("NIP", summary.nip.clone()),
        ("Environment", summary.environment.clone()),
        ("Date from", summary.date_from.clone()),
        ("Date to", summary.date_to.clone()),
        ("Issued invoices", issued.to_string()),
        ("Received invoices", received.to_string()),
        ("Total", (issued + received).to_string()),
    ];
    for (row, (label, value)) in rows.iter().enumerate() {
        let row = row as u32;
        sheet.write_string_with_format(row, 0, *label, &bold).map_err(xlsx_err)?;
        sheet.write_string(row, 1, value).map_err(xlsx_err)?;
    }
    sheet.set_column_width(0, 22.0).map_err(xlsx_err)?;
    sheet.set_column_width(1, 36.0).map_err(xlsx_err)?;
    Ok(())
}

/// Resolve a dotted path into a record and render the leaf as cell text.
/// Missing segments and nulls become the empty string; scalars drop the
/// JSON quoting; anything structured falls back to compact JSON.
fn cell_text(fields: &Value, path: &str) -> String {
    let mut current = fields;
    for segment in path.split('.') {
        match current.get(segment) {
            Some(value) => current = value,
            None => return String::new(),
        }
    }
    match current {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn xlsx_err(err: XlsxError) -> KsefError {
    KsefError::Internal(format!("workbook error: {err}"))
}
