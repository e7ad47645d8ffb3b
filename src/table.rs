use anyhow::{bail, Context, Result};
use chrono::NaiveDateTime;
use csv::StringRecord;
use encoding_rs::Encoding;
use serde::Deserialize;
use tracing::{debug, info};

use std::{fs, path::Path};

use crate::{
    amount::Amount,
    dates::{self, DateParser},
    month::Month,
};

/// Names the columns the analysis reads.
///
/// All other columns in the input are ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    pub date: String,
    pub amount: String,
    pub category: String,
}

impl Default for Schema {
    fn default() -> Self {
        Self {
            date: "Order Date".into(),
            amount: "Sales".into(),
            category: "Category".into(),
        }
    }
}

/// Controls how the input file is read.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub schema: Schema,
    /// An encoding label, such as `latin1` or `utf-8`. Latin-1 labels mean
    /// ISO-8859-1; any other WHATWG label is accepted.
    pub encoding: String,
    pub delimiter: u8,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            schema: Schema::default(),
            encoding: "latin1".into(),
            delimiter: b',',
        }
    }
}

/// The value of a row's date cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateCell {
    /// Text not yet interpreted as a date.
    Raw(String),
    Timestamp(NaiveDateTime),
    Missing,
}

impl DateCell {
    #[must_use]
    pub fn timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            Self::Timestamp(ts) => Some(*ts),
            Self::Raw(_) | Self::Missing => None,
        }
    }
}

/// One order line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub order_date: DateCell,
    pub sales: Amount,
    pub category: String,
    /// Set by [`RecordTable::derive_months`]; `None` until then, and for rows
    /// without a valid date.
    pub month: Option<Month>,
}

/// The fields of an input row the analysis reads, after the schema's column
/// names have been mapped onto these field names.
#[derive(Debug, Deserialize)]
struct Row {
    order_date: String,
    sales: Amount,
    category: String,
}

/// Holds every order line of the input, in file order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecordTable {
    records: Vec<Record>,
}

impl RecordTable {
    /// Reads the delimited file at `path`, decoding it with the configured
    /// encoding.
    ///
    /// Date cells in ISO-8601 form are parsed as they are read; any others
    /// are kept as raw text for [`Self::normalize_dates`].
    ///
    /// # Errors
    ///
    /// Returns errors if:
    /// * The file cannot be read
    /// * The encoding label is unknown, or the content is malformed in that
    ///   encoding
    /// * A schema column is missing from the header
    /// * A row cannot be parsed, including a non-numeric amount
    pub fn read_csv(path: impl AsRef<Path>, options: &LoadOptions) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        let text = decode(&bytes, &options.encoding)
            .with_context(|| format!("decoding {}", path.display()))?;
        Self::from_text(&text, options).with_context(|| format!("{}", path.display()))
    }

    /// Parses already-decoded delimited `text`.
    ///
    /// # Errors
    ///
    /// As [`Self::read_csv`], minus the file and decoding errors.
    pub fn from_text(text: &str, options: &LoadOptions) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(options.delimiter)
            .from_reader(text.as_bytes());
        let headers = field_headers(rdr.headers()?, &options.schema)?;
        let mut records = Vec::new();
        for (index, result) in rdr.records().enumerate() {
            // Line 1 is the header.
            let line = index + 2;
            let row: Row = result
                .and_then(|r| r.deserialize(Some(&headers)))
                .with_context(|| format!("row {line}"))?;
            let order_date = match dates::parse_iso(&row.order_date) {
                Some(ts) => DateCell::Timestamp(ts),
                None => DateCell::Raw(row.order_date),
            };
            records.push(Record {
                order_date,
                sales: row.sales,
                category: row.category,
                month: None,
            });
        }
        info!(rows = records.len(), "loaded sales records");
        Ok(Self { records })
    }

    /// Re-parses every date cell still holding raw text with `parser`.
    ///
    /// Afterwards every date cell is either a timestamp or missing. Returns
    /// the number of cells that could not be parsed.
    pub fn normalize_dates(&mut self, parser: &DateParser) -> usize {
        let mut missing = 0;
        for record in &mut self.records {
            if let DateCell::Raw(text) = &record.order_date {
                record.order_date = match parser.coerce(text) {
                    Some(ts) => DateCell::Timestamp(ts),
                    None => {
                        debug!(value = %text, "unparseable date treated as missing");
                        DateCell::Missing
                    }
                };
            }
            if record.order_date == DateCell::Missing {
                missing += 1;
            }
        }
        if missing > 0 {
            info!(missing, "dates could not be parsed");
        }
        missing
    }

    /// Sets each record's month bucket from its date.
    pub fn derive_months(&mut self) {
        for record in &mut self.records {
            record.month = record.order_date.timestamp().as_ref().map(Month::of);
        }
    }

    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns the total of every record's amount.
    #[must_use]
    pub fn total_sales(&self) -> Amount {
        self.records.iter().map(|r| r.sales).sum()
    }
}

/// Labels decoded as ISO-8859-1 proper, where every byte maps to the code
/// point of the same value. `encoding_rs` would otherwise treat them as
/// windows-1252, which differs for bytes 0x80-0x9F.
const LATIN1_LABELS: &[&str] = &[
    "latin1",
    "latin-1",
    "l1",
    "iso-8859-1",
    "iso8859-1",
    "iso88591",
    "iso_8859-1",
    "iso-ir-100",
    "cp819",
    "ibm819",
];

/// Decodes `bytes` with the encoding named by `label`.
///
/// A byte order mark, if present, overrides the label.
///
/// # Errors
///
/// Returns an error if the label is unknown or `bytes` is malformed in the
/// encoding.
pub fn decode(bytes: &[u8], label: &str) -> Result<String> {
    let label = label.trim();
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        return decode_strict(encoding, &bytes[bom_len..]);
    }
    if LATIN1_LABELS.iter().any(|l| l.eq_ignore_ascii_case(label)) {
        return Ok(encoding_rs::mem::decode_latin1(bytes).into_owned());
    }
    let Some(encoding) = Encoding::for_label(label.as_bytes()) else {
        bail!("unknown encoding {label:?}");
    };
    decode_strict(encoding, bytes)
}

fn decode_strict(encoding: &'static Encoding, bytes: &[u8]) -> Result<String> {
    let Some(text) = encoding.decode_without_bom_handling_and_without_replacement(bytes) else {
        bail!("content is not valid {}", encoding.name());
    };
    Ok(text.into_owned())
}

/// Maps the schema's column names onto [`Row`]'s field names, blanking
/// every other column so that it is ignored.
fn field_headers(headers: &StringRecord, schema: &Schema) -> Result<StringRecord> {
    let mut fields = vec![""; headers.len()];
    for (column, field) in [
        (&schema.date, "order_date"),
        (&schema.amount, "sales"),
        (&schema.category, "category"),
    ] {
        let Some(index) = headers.iter().position(|h| h.trim() == column) else {
            bail!("missing column {column:?}");
        };
        fields[index] = field;
    }
    Ok(StringRecord::from(fields))
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use std::str::FromStr;

    use super::*;

    const SAMPLE: &str = "\
Row ID,Order Date,Category,Sales
1,2023-01-15,Tech,100
2,1/20/2023,Tech,50
3,2023-02-01,Office,30
4,not-a-date,Tech,20
5,,Office,1.5
";

    fn sample() -> RecordTable {
        RecordTable::from_text(SAMPLE, &LoadOptions::default()).unwrap()
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn from_text_fn_parses_iso_dates_and_keeps_others_raw() {
        let table = sample();
        assert_eq!(table.len(), 5);
        let dates: Vec<_> = table.records().iter().map(|r| r.order_date.clone()).collect();
        assert_eq!(
            dates,
            vec![
                DateCell::Timestamp(ymd(2023, 1, 15)),
                DateCell::Raw("1/20/2023".into()),
                DateCell::Timestamp(ymd(2023, 2, 1)),
                DateCell::Raw("not-a-date".into()),
                DateCell::Raw(String::new()),
            ]
        );
        assert_eq!(table.records()[0].category, "Tech");
        assert_eq!(table.total_sales(), Amount::from_str("201.5").unwrap());
    }

    #[test]
    fn normalize_dates_fn_leaves_no_raw_text() {
        let mut table = sample();
        let missing = table.normalize_dates(&DateParser::new());
        assert_eq!(missing, 2);
        assert!(table
            .records()
            .iter()
            .all(|r| !matches!(r.order_date, DateCell::Raw(_))));
        assert_eq!(
            table.records()[1].order_date,
            DateCell::Timestamp(ymd(2023, 1, 20))
        );
        assert_eq!(table.records()[3].order_date, DateCell::Missing);
    }

    #[test]
    fn derive_months_fn_buckets_valid_dates_only() {
        let mut table = sample();
        table.normalize_dates(&DateParser::new());
        table.derive_months();
        let months: Vec<_> = table.records().iter().map(|r| r.month).collect();
        let jan = Month::new(2023, 1).ok();
        let feb = Month::new(2023, 2).ok();
        assert_eq!(months, vec![jan, jan, feb, None, None]);
    }

    #[test]
    fn from_text_fn_errors_on_missing_column() {
        let text = "Order Date,Sales\n2023-01-01,1\n";
        let err = RecordTable::from_text(text, &LoadOptions::default()).unwrap_err();
        assert!(err.to_string().contains("Category"), "{err}");
    }

    #[test]
    fn from_text_fn_errors_on_non_numeric_amount() {
        let text = "Order Date,Category,Sales\n2023-01-01,Tech,lots\n";
        let err = RecordTable::from_text(text, &LoadOptions::default()).unwrap_err();
        assert!(err.to_string().contains("row 2"), "{err}");
    }

    #[test]
    fn from_text_fn_honours_schema_and_delimiter() {
        let options = LoadOptions {
            schema: Schema {
                date: "when".into(),
                amount: "total".into(),
                category: "kind".into(),
            },
            delimiter: b';',
            ..LoadOptions::default()
        };
        let text = "kind;total;when;sales\nBooks;2.5;2024-03-09;ignored\n";
        let table = RecordTable::from_text(text, &options).unwrap();
        assert_eq!(table.records()[0].category, "Books");
        assert_eq!(table.records()[0].sales, Amount::from_str("2.5").unwrap());
    }

    #[test]
    fn decode_fn_reads_latin1() {
        let bytes = b"Caf\xe9";
        assert_eq!(decode(bytes, "latin1").unwrap(), "Café");
    }

    #[test]
    fn decode_fn_maps_latin1_bytes_to_same_code_points() {
        let bytes = [b'A', 0x80, 0x9f, 0xff];
        assert_eq!(decode(&bytes, "latin1").unwrap(), "A\u{80}\u{9f}\u{ff}");
        assert_eq!(decode(&bytes, "ISO-8859-1").unwrap(), "A\u{80}\u{9f}\u{ff}");
        assert_eq!(decode(&bytes, "windows-1252").unwrap(), "A\u{20ac}\u{178}\u{ff}");
    }

    #[test]
    fn decode_fn_rejects_malformed_utf8() {
        assert!(decode(b"Caf\xe9", "utf-8").is_err());
        assert_eq!(decode("Café".as_bytes(), "utf-8").unwrap(), "Café");
    }

    #[test]
    fn decode_fn_rejects_unknown_label() {
        assert!(decode(b"x", "klingon").is_err());
    }

    #[test]
    fn read_csv_fn_reports_missing_file() {
        let err = RecordTable::read_csv("testdata/nonexistent.csv", &LoadOptions::default())
            .unwrap_err();
        assert!(err.to_string().contains("nonexistent.csv"), "{err}");
    }
}
