//! Spreadsheet report
//!
//! Writes the reconciliation result as a two-sheet workbook: one summary row
//! per table, then one row per finding for the tables that changed.

use crate::error::AppResult;
use crate::snapshot::DiffRecord;
use rust_xlsxwriter::{Color, Format, Workbook, Worksheet};
use std::path::Path;
use tracing::info;

/// Longest text written into one cell before truncation
pub const CELL_TEXT_LIMIT: usize = 32_000;

const TRUNCATION_SUFFIX: &str = "...(truncated)";

const SUMMARY_HEADERS: [&str; 6] = [
    "Schema",
    "Table",
    "Before Count",
    "After Count",
    "Is Change",
    "Change Type",
];

const DETAIL_HEADERS: [&str; 4] = ["Schema", "Table", "Change Type", "IDs/Details"];

/// Cut text to `CELL_TEXT_LIMIT` characters, marking the cut
pub fn truncate_for_cell(text: &str) -> String {
    match text.char_indices().nth(CELL_TEXT_LIMIT) {
        Some((cut, _)) => format!("{}{}", &text[..cut], TRUNCATION_SUFFIX),
        None => text.to_string(),
    }
}

/// Render `records` into an `.xlsx` file at `path`
pub fn write_report(records: &[DiffRecord], path: &Path) -> AppResult<()> {
    info!("Generating report...");

    let header = Format::new()
        .set_bold()
        .set_background_color(Color::RGB(0xCCCCCC));

    let mut workbook = Workbook::new();
    workbook.push_worksheet(summary_sheet(records, &header)?);
    workbook.push_worksheet(details_sheet(records, &header)?);
    workbook.save(path)?;

    info!("Comparison report generated: {}", path.display());
    Ok(())
}

fn write_header(sheet: &mut Worksheet, headers: &[&str], format: &Format) -> AppResult<()> {
    for (col, title) in headers.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *title, format)?;
    }
    Ok(())
}

fn summary_sheet(records: &[DiffRecord], header: &Format) -> AppResult<Worksheet> {
    let mut sheet = Worksheet::new();
    sheet.set_name("Summary")?;
    write_header(&mut sheet, &SUMMARY_HEADERS, header)?;

    for (idx, record) in records.iter().enumerate() {
        let row = idx as u32 + 1;
        sheet.write_string(row, 0, &record.schema)?;
        sheet.write_string(row, 1, &record.table)?;
        sheet.write_number(row, 2, record.count_before as f64)?;
        sheet.write_number(row, 3, record.count_after as f64)?;
        sheet.write_string(row, 4, if record.is_changed { "Y" } else { "N" })?;
        sheet.write_string(row, 5, record.tags_label())?;
    }

    sheet.set_column_width(0, 20)?;
    sheet.set_column_width(1, 32)?;
    sheet.set_column_width(5, 40)?;
    Ok(sheet)
}

fn details_sheet(records: &[DiffRecord], header: &Format) -> AppResult<Worksheet> {
    let mut sheet = Worksheet::new();
    sheet.set_name("Diff Details")?;
    write_header(&mut sheet, &DETAIL_HEADERS, header)?;

    let rows = records
        .iter()
        .flat_map(|record| record.details.iter().map(move |detail| (record, detail)));

    for (idx, (record, detail)) in rows.enumerate() {
        let row = idx as u32 + 1;
        sheet.write_string(row, 0, &record.schema)?;
        sheet.write_string(row, 1, &record.table)?;
        sheet.write_string(row, 2, detail.kind.to_string())?;
        sheet.write_string(row, 3, truncate_for_cell(&detail.text))?;
    }

    sheet.set_column_width(0, 20)?;
    sheet.set_column_width(1, 32)?;
    sheet.set_column_width(2, 18)?;
    sheet.set_column_width(3, 80)?;
    Ok(sheet)
}
