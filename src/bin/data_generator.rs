use anyhow::{Context, Result};
use rand::Rng;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;
use tracing_subscriber::EnvFilter;

const NETWORKS: [&str; 5] = ["Meta", "Google", "TikTok", "Unity", "AppLovin"];
const FORMATS: [&str; 4] = ["video_15s", "video_30s", "playable", "static"];
const HOOKS: [&str; 4] = ["gameplay", "ugc", "tutorial", "reward"];
const COUNTRIES: [&str; 6] = ["US", "DE", "JP", "BR", "IN", "GB"];

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let rows: usize = match args.next() {
        Some(n) => n.parse().context("row count must be a number")?,
        None => 100_000,
    };
    let path = args
        .next()
        .unwrap_or_else(|| format!("data/creatives_{rows}.csv"));
    let path = Path::new(&path);

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    let file = File::create(path).with_context(|| format!("cannot create {}", path.display()))?;
    let mut writer = BufWriter::new(file);

    writeln!(
        writer,
        "creative_id,creative_name,network,format,hook_tag,country,spend,impressions,clicks,installs,roas"
    )?;

    let mut rng = rand::rng();
    for i in 0..rows {
        let network = NETWORKS[rng.random_range(0..NETWORKS.len())];
        let format = FORMATS[rng.random_range(0..FORMATS.len())];
        let hook = HOOKS[rng.random_range(0..HOOKS.len())];
        let country = COUNTRIES[rng.random_range(0..COUNTRIES.len())];

        let impressions: u64 = rng.random_range(1_000..500_000);
        let clicks = impressions * rng.random_range(5..60) / 1_000;
        let installs = clicks * rng.random_range(2..30) / 100;
        let spend = impressions as f64 * rng.random_range(2.0..15.0) / 1_000.0;
        let roas: f64 = rng.random_range(0.2..3.5);

        // a few blank cells so loaders see nulls
        let roas = if rng.random_bool(0.02) {
            String::new()
        } else {
            format!("{roas:.2}")
        };

        writeln!(
            writer,
            "{i},\"{network} {format} #{i}\",{network},{format},{hook},{country},{spend:.2},{impressions},{clicks},{installs},{roas}"
        )?;
    }
    writer.flush()?;

    info!(rows, path = %path.display(), "Sample CSV generated");
    Ok(())
}
