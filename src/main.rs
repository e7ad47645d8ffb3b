use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use std::{fs, path::PathBuf};

use salesplot::{analyze, render, ChartOptions, ImageFormat, LoadOptions, Options, Schema};

/// Charts sales over time and by category from a CSV file.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Sales data file
    #[arg(default_value = "global-superstore.csv")]
    input: PathBuf,

    /// Text encoding of the input file
    #[arg(long, default_value = "latin1")]
    encoding: String,

    /// Field delimiter
    #[arg(long, default_value_t = ',')]
    delimiter: char,

    /// Name of the order date column
    #[arg(long, default_value = "Order Date")]
    date_column: String,

    /// Name of the sales amount column
    #[arg(long, default_value = "Sales")]
    amount_column: String,

    /// Name of the category column
    #[arg(long, default_value = "Category")]
    category_column: String,

    /// Date format (chrono syntax) to try before the built-in formats
    #[arg(long)]
    date_format: Option<String>,

    /// Directory to write charts to
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Chart image format
    #[arg(long, value_enum, default_value_t = ImageFormat::Png)]
    format: ImageFormat,

    /// Also write the aggregate tables as CSV files to this directory
    #[arg(long)]
    export_dir: Option<PathBuf>,

    /// Don't render charts
    #[arg(long)]
    no_charts: bool,

    /// Don't print summary tables
    #[arg(short, long)]
    quiet: bool,

    /// Log level, used when RUST_LOG is not set
    #[arg(long, default_value = "warn")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();
    setup_logging(&args.log_level);

    let delimiter =
        u8::try_from(args.delimiter).context("delimiter must be a single-byte character")?;
    let options = Options {
        load: LoadOptions {
            schema: Schema {
                date: args.date_column,
                amount: args.amount_column,
                category: args.category_column,
            },
            encoding: args.encoding,
            delimiter,
        },
        date_format: args.date_format,
    };
    let analysis = analyze(&args.input, &options)?;

    if !args.quiet {
        println!("{}", analysis.by_month);
        println!("{}", analysis.by_category);
    }
    if let Some(dir) = &args.export_dir {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        analysis.by_month.write_csv(dir.join("sales_over_time.csv"))?;
        analysis.by_category.write_csv(dir.join("sales_by_category.csv"))?;
    }
    if !args.no_charts {
        fs::create_dir_all(&args.output_dir)
            .with_context(|| format!("creating {}", args.output_dir.display()))?;
        let chart_options = ChartOptions {
            output_dir: args.output_dir,
            format: args.format,
        };
        for path in [
            render(&analysis.by_month, &chart_options)?,
            render(&analysis.by_category, &chart_options)?,
        ] {
            eprintln!("wrote {}", path.display());
        }
    }
    Ok(())
}

/// Logs to stderr, filtered by `RUST_LOG` if set, otherwise by `level`.
fn setup_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}
