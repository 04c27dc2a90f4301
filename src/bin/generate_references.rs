/// Prints reference DPO outputs for a candle CSV as JSON.
/// Used to cross-check other implementations against this crate.
use dpo_ta::indicators::dpo::{dpo_warmup, DpoBuilder};
use dpo_ta::utilities::data_loader::read_candles_from_csv;
use serde_json::json;
use std::env;
use tracing_subscriber::EnvFilter;

const DEFAULT_CSV: &str = "src/data/2018-09-01-sample-4h.csv";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();
    if args.iter().any(|a| a == "-h" || a == "--help") {
        eprintln!("Usage: {} [csv_path] [source] [period]", args[0]);
        eprintln!("Available sources: open, high, low, close, volume, hl2, hlc3, ohlc4, hlcc4");
        return Ok(());
    }

    let path = args.get(1).map(|s| s.as_str()).unwrap_or(DEFAULT_CSV);
    let source = args.get(2).map(|s| s.as_str()).unwrap_or("close");
    let period: usize = match args.get(3) {
        Some(p) => p.parse()?,
        None => 5,
    };

    let candles = read_candles_from_csv(path)?;
    tracing::info!(path, rows = candles.len(), "loaded candles");

    let values = DpoBuilder::new()
        .period(period)
        .apply_candles(&candles, source)?
        .values;

    let start = values.len().saturating_sub(5);
    // NaN has no JSON representation
    let last_five: Vec<Option<f64>> = values[start..]
        .iter()
        .map(|v| if v.is_nan() { None } else { Some(*v) })
        .collect();

    let output = json!({
        "indicator": "dpo",
        "source": source,
        "params": { "period": period },
        "length": values.len(),
        "warmup": dpo_warmup(period).min(values.len()),
        "last_5_values": last_five,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
