use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::debug;

use std::{collections::BTreeMap, fmt::Display, path::Path};

use crate::{amount::Amount, month::Month, table::{Record, RecordTable}};

/// Sums the amount of every record, partitioned by `key`.
///
/// There is one entry per distinct key, in key order, so the result is the
/// same however many times it is computed from the same records. Records for
/// which `key` yields a "missing" value (such as `None`) form a partition of
/// their own; it is up to the caller whether to keep it.
pub fn aggregate<K, F>(records: &[Record], key: F) -> BTreeMap<K, Amount>
where
    K: Ord,
    F: Fn(&Record) -> K,
{
    let mut sums = BTreeMap::new();
    for record in records {
        *sums.entry(key(record)).or_default() += record.sales;
    }
    debug!(partitions = sums.len(), "aggregated sales");
    sums
}

/// Total sales for one month, keyed by the first instant of the month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlySales {
    #[serde(rename = "Month")]
    pub month: NaiveDateTime,
    #[serde(rename = "Sales")]
    pub sales: Amount,
}

/// Sales per month, in chronological order.
///
/// Records without a valid date are left out; their total is available from
/// [`Self::undated`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SalesByMonth {
    rows: Vec<MonthlySales>,
    undated: Amount,
}

impl SalesByMonth {
    /// Aggregates `table` by each record's month bucket.
    ///
    /// The table's months must already have been derived with
    /// [`RecordTable::derive_months`].
    #[must_use]
    pub fn from_table(table: &RecordTable) -> Self {
        Self::project(aggregate(table.records(), |r| r.month))
    }

    /// Replaces each month bucket with the first instant of that month,
    /// dropping the partition of records that had no month.
    #[must_use]
    pub fn project(buckets: BTreeMap<Option<Month>, Amount>) -> Self {
        let mut by_month = Self::default();
        for (bucket, sales) in buckets {
            match bucket {
                Some(month) => by_month.rows.push(MonthlySales {
                    month: month.start(),
                    sales,
                }),
                None => by_month.undated = sales,
            }
        }
        by_month
    }

    #[must_use]
    pub fn rows(&self) -> &[MonthlySales] {
        &self.rows
    }

    /// Returns the total sales of records left out for having no valid date.
    #[must_use]
    pub fn undated(&self) -> Amount {
        self.undated
    }

    #[must_use]
    pub fn total(&self) -> Amount {
        self.rows.iter().map(|r| r.sales).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Writes the table to `path` as CSV, with columns `Month` and `Sales`.
    ///
    /// # Errors
    ///
    /// Returns any errors from creating or writing the file.
    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        write_rows(path.as_ref(), &self.rows)
    }
}

impl Display for SalesByMonth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rows = self
            .rows
            .iter()
            .map(|r| (Month::of(&r.month).to_string(), r.sales));
        write_table(f, "Month", rows, self.total())
    }
}

/// Total sales for one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySales {
    #[serde(rename = "Category")]
    pub category: String,
    #[serde(rename = "Sales")]
    pub sales: Amount,
}

/// Sales per category, in category name order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SalesByCategory {
    rows: Vec<CategorySales>,
}

impl SalesByCategory {
    /// Aggregates every record of `table` by category, whether or not its
    /// date is valid.
    #[must_use]
    pub fn from_table(table: &RecordTable) -> Self {
        let rows = aggregate(table.records(), |r| r.category.clone())
            .into_iter()
            .map(|(category, sales)| CategorySales { category, sales })
            .collect();
        Self { rows }
    }

    #[must_use]
    pub fn rows(&self) -> &[CategorySales] {
        &self.rows
    }

    #[must_use]
    pub fn total(&self) -> Amount {
        self.rows.iter().map(|r| r.sales).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns the sales for `category`, if it occurs in the data.
    #[must_use]
    pub fn get(&self, category: &str) -> Option<Amount> {
        self.rows
            .iter()
            .find(|r| r.category == category)
            .map(|r| r.sales)
    }

    /// Writes the table to `path` as CSV, with columns `Category` and `Sales`.
    ///
    /// # Errors
    ///
    /// Returns any errors from creating or writing the file.
    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        write_rows(path.as_ref(), &self.rows)
    }
}

impl Display for SalesByCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rows = self.rows.iter().map(|r| (r.category.clone(), r.sales));
        write_table(f, "Category", rows, self.total())
    }
}

fn write_rows<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut wtr =
        csv::Writer::from_path(path).with_context(|| format!("creating {}", path.display()))?;
    for row in rows {
        wtr.serialize(row)
            .with_context(|| format!("writing {}", path.display()))?;
    }
    wtr.flush()?;
    Ok(())
}

fn write_table(
    f: &mut std::fmt::Formatter<'_>,
    heading: &str,
    rows: impl Iterator<Item = (String, Amount)>,
    total: Amount,
) -> std::fmt::Result {
    let rows: Vec<_> = rows.collect();
    let width = rows
        .iter()
        .map(|(name, _)| name.chars().count())
        .chain([heading.len(), "Total".len()])
        .max()
        .unwrap_or_default();
    writeln!(f, "{heading:width$} {:>14}", "Sales")?;
    let length = width + 15;
    writeln!(f, "{:-<length$}", "")?;
    for (name, sales) in &rows {
        writeln!(f, "{name:width$} {sales:>14}")?;
    }
    writeln!(f, "{:-<length$}", "")?;
    writeln!(f, "{:width$} {total:>14}", "Total")?;
    Ok(())
}
