//! Chart rendering for the aggregate tables.

use anyhow::{bail, Result};
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use plotters::{coord::Shift, prelude::*};
use tracing::info;

use std::path::PathBuf;

use crate::aggregate::{SalesByCategory, SalesByMonth};

const FONT: &str = "sans-serif";

const PALETTE: [RGBColor; 8] = [
    RGBColor(31, 119, 180),
    RGBColor(255, 127, 14),
    RGBColor(44, 160, 44),
    RGBColor(214, 39, 40),
    RGBColor(148, 103, 189),
    RGBColor(140, 86, 75),
    RGBColor(227, 119, 194),
    RGBColor(127, 127, 127),
];

/// Image file format for rendered charts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ImageFormat {
    #[default]
    Png,
    Svg,
}

impl ImageFormat {
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Svg => "svg",
        }
    }
}

/// Where and how charts are written.
#[derive(Debug, Clone)]
pub struct ChartOptions {
    pub output_dir: PathBuf,
    pub format: ImageFormat,
}

impl Default for ChartOptions {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            format: ImageFormat::default(),
        }
    }
}

/// A table that can be drawn as a chart.
pub trait Chart {
    fn title(&self) -> &'static str;

    /// File name, without extension, of the rendered image.
    fn file_stem(&self) -> &'static str;

    /// Image size in pixels.
    fn size(&self) -> (u32, u32);

    fn is_empty(&self) -> bool;

    /// Draws the chart onto `root`.
    ///
    /// # Errors
    ///
    /// Returns any error from the drawing backend, including failure to load
    /// fonts.
    fn draw<DB>(&self, root: &DrawingArea<DB, Shift>) -> Result<()>
    where
        DB: DrawingBackend,
        DB::ErrorType: 'static;
}

/// Renders `chart` to an image file in `options.output_dir`, returning its
/// path. The call returns once the image is completely written.
///
/// # Errors
///
/// Returns an error if the chart has no data, or if drawing or writing the
/// image fails.
pub fn render<C: Chart>(chart: &C, options: &ChartOptions) -> Result<PathBuf> {
    if chart.is_empty() {
        bail!("{}: no data to plot", chart.title());
    }
    let path = options
        .output_dir
        .join(format!("{}.{}", chart.file_stem(), options.format.extension()));
    let size = chart.size();
    match options.format {
        ImageFormat::Png => chart.draw(&BitMapBackend::new(&path, size).into_drawing_area())?,
        ImageFormat::Svg => chart.draw(&SVGBackend::new(&path, size).into_drawing_area())?,
    }
    info!(path = %path.display(), "rendered {}", chart.title());
    Ok(path)
}

impl Chart for SalesByMonth {
    fn title(&self) -> &'static str {
        "Sales Over Time"
    }

    fn file_stem(&self) -> &'static str {
        "sales_over_time"
    }

    fn size(&self) -> (u32, u32) {
        (1200, 600)
    }

    fn is_empty(&self) -> bool {
        SalesByMonth::is_empty(self)
    }

    fn draw<DB>(&self, root: &DrawingArea<DB, Shift>) -> Result<()>
    where
        DB: DrawingBackend,
        DB::ErrorType: 'static,
    {
        let points: Vec<(f64, f64)> = self
            .rows()
            .iter()
            .map(|r| (day_number(&r.month), r.sales.as_f64()))
            .collect();
        let (x_min, x_max) = padded_range(points.iter().map(|p| p.0), 15.0);
        let (y_min, y_max) = value_range(points.iter().map(|p| p.1));

        root.fill(&WHITE)?;
        let mut chart = ChartBuilder::on(root)
            .caption(self.title(), (FONT, 24))
            .margin(20)
            .x_label_area_size(90)
            .y_label_area_size(90)
            .build_cartesian_2d(x_min..x_max, y_min..y_max)?;

        // Tick labels are rotated so that consecutive months don't overlap.
        chart
            .configure_mesh()
            .x_desc("Order Date")
            .y_desc("Sales")
            .x_labels(points.len().clamp(2, 24))
            .x_label_formatter(&|x| month_label(*x))
            .x_label_style((FONT, 12).into_font().transform(FontTransform::Rotate90))
            .y_label_formatter(&|y| format!("{y:.0}"))
            .draw()?;

        let color = PALETTE[0];
        chart.draw_series(LineSeries::new(points.iter().copied(), color.stroke_width(2)))?;
        chart.draw_series(points.iter().map(|&p| Circle::new(p, 3, color.filled())))?;

        root.present()?;
        Ok(())
    }
}

impl Chart for SalesByCategory {
    fn title(&self) -> &'static str {
        "Sales by Category"
    }

    fn file_stem(&self) -> &'static str {
        "sales_by_category"
    }

    fn size(&self) -> (u32, u32) {
        (1000, 600)
    }

    fn is_empty(&self) -> bool {
        SalesByCategory::is_empty(self)
    }

    fn draw<DB>(&self, root: &DrawingArea<DB, Shift>) -> Result<()>
    where
        DB: DrawingBackend,
        DB::ErrorType: 'static,
    {
        let rows = self.rows();
        let (x_min, x_max) = value_range(rows.iter().map(|r| r.sales.as_f64()));
        let longest = rows
            .iter()
            .map(|r| r.category.chars().count())
            .max()
            .unwrap_or_default();
        let label_area = u32::try_from(longest * 8 + 40).unwrap_or(300).min(300);

        root.fill(&WHITE)?;
        let mut chart = ChartBuilder::on(root)
            .caption(self.title(), (FONT, 24))
            .margin(20)
            .x_label_area_size(50)
            .y_label_area_size(label_area)
            .build_cartesian_2d(x_min..x_max, (0..rows.len()).into_segmented())?;

        chart
            .configure_mesh()
            .disable_y_mesh()
            .x_desc("Sales")
            .y_desc("Category")
            .y_labels(rows.len())
            .y_label_formatter(&|y| match y {
                SegmentValue::CenterOf(i) => rows
                    .get(*i)
                    .map(|r| r.category.clone())
                    .unwrap_or_default(),
                _ => String::new(),
            })
            .x_label_formatter(&|x| format!("{x:.0}"))
            .draw()?;

        chart.draw_series(rows.iter().enumerate().map(|(i, row)| {
            let mut bar = Rectangle::new(
                [
                    (0.0, SegmentValue::Exact(i)),
                    (row.sales.as_f64(), SegmentValue::Exact(i + 1)),
                ],
                PALETTE[i % PALETTE.len()].filled(),
            );
            bar.set_margin(8, 8, 0, 0);
            bar
        }))?;

        root.present()?;
        Ok(())
    }
}

/// Maps a timestamp to a continuous axis value: days since 1 January of
/// year 1 CE.
fn day_number(timestamp: &NaiveDateTime) -> f64 {
    f64::from(timestamp.date().num_days_from_ce())
}

/// Formats an axis value produced by [`day_number`] as `YYYY-MM`.
#[allow(clippy::cast_possible_truncation)]
fn month_label(day: f64) -> String {
    NaiveDate::from_num_days_from_ce_opt(day.round() as i32)
        .map(|d| d.format("%Y-%m").to_string())
        .unwrap_or_default()
}

/// Returns the span of `values`, widened by `pad` on either side.
fn padded_range(values: impl Iterator<Item = f64>, pad: f64) -> (f64, f64) {
    let (min, max) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if min > max {
        return (0.0, 1.0);
    }
    (min - pad, max + pad)
}

/// Returns an axis range for amounts: always including zero, with 10%
/// headroom beyond the extreme values.
fn value_range(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (min, max) = values.fold((0.0_f64, 0.0_f64), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if min == 0.0 && max == 0.0 {
        return (0.0, 1.0);
    }
    (min * 1.1, max * 1.1)
}
