#![doc = include_str!("../README.md")]
use anyhow::Result;
use tracing::info;

use std::path::Path;

pub mod aggregate;
pub mod amount;
pub mod chart;
pub mod dates;
pub mod month;
pub mod table;

pub use aggregate::{aggregate, CategorySales, MonthlySales, SalesByCategory, SalesByMonth};
pub use amount::Amount;
pub use chart::{render, Chart, ChartOptions, ImageFormat};
pub use dates::DateParser;
pub use month::Month;
pub use table::{DateCell, LoadOptions, Record, RecordTable, Schema};

/// Controls how sales data is read and interpreted.
#[derive(Debug, Clone, Default)]
pub struct Options {
    pub load: LoadOptions,
    /// A `chrono` format string to try before the built-in date formats.
    pub date_format: Option<String>,
}

/// The result of analysing a sales file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Analysis {
    pub table: RecordTable,
    pub by_month: SalesByMonth,
    pub by_category: SalesByCategory,
}

/// Reads the sales data at `path` and aggregates it by month and by
/// category.
///
/// Dates that cannot be parsed are treated as missing: those rows count
/// towards their category, but not towards any month.
///
/// # Errors
///
/// Returns any errors from [`RecordTable::read_csv`].
pub fn analyze(path: impl AsRef<Path>, options: &Options) -> Result<Analysis> {
    let mut table = RecordTable::read_csv(&path, &options.load)?;
    let parser = match &options.date_format {
        Some(format) => DateParser::with_format(format),
        None => DateParser::new(),
    };
    table.normalize_dates(&parser);
    table.derive_months();
    let by_month = SalesByMonth::from_table(&table);
    let by_category = SalesByCategory::from_table(&table);
    info!(
        months = by_month.rows().len(),
        categories = by_category.rows().len(),
        "aggregated {}",
        path.as_ref().display()
    );
    Ok(Analysis {
        table,
        by_month,
        by_category,
    })
}
