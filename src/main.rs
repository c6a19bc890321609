use std::path::PathBuf;

use anyhow::{Context, Result};
use creative_query::{Dataset, EngineConfig, FieldCategory};
use tracing_subscriber::EnvFilter;

#[cfg(not(target_env = "msvc"))]
use jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

const USAGE: &str = "usage: creative_query <data.csv> [search term] [config.toml]";

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let path = PathBuf::from(args.next().context(USAGE)?);
    let term = args.next().unwrap_or_default();
    let config = match args.next() {
        Some(config_path) => EngineConfig::load_from(&PathBuf::from(config_path))?,
        None => EngineConfig::default(),
    };

    let dataset = Dataset::load_csv(&path, &config)
        .with_context(|| format!("failed to load {}", path.display()))?;

    for category in [FieldCategory::Metric, FieldCategory::Tag, FieldCategory::Dimension] {
        let names: Vec<_> = dataset
            .schema()
            .by_category(category)
            .map(|f| f.name.as_str())
            .collect();
        println!("{category:>9}: {}", names.join(", "));
    }
    for error in &dataset.load_summary().errors {
        println!("skipped row {}: {}", error.row, error.reason);
    }

    let view = dataset.query().search(&term).execute();
    println!(
        "\npage {}/{} ({} rows)",
        view.page.page_index,
        view.page.total_pages,
        view.total_rows()
    );
    let names: Vec<_> = dataset.schema().names().collect();
    println!("{}", names.join(" | "));
    for record in dataset.rows(&view.page.rows) {
        let cells: Vec<_> = record.values().iter().map(|v| v.to_text()).collect();
        println!("{}", cells.join(" | "));
    }

    let totals = view.summary.totals;
    println!(
        "\nspend {:.2}  impressions {}  clicks {}  installs {}  CTR {}%  CVR {}%",
        totals.spend, totals.impressions, totals.clicks, totals.installs, view.summary.ctr,
        view.summary.cvr
    );
    Ok(())
}
