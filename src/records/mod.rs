use std::fs;
use std::path::{Path, PathBuf};

use log::info;

use crate::error::{Context, Result};
use crate::fetch::Candle;

/// Output filename: `{symbol-tail}_{resolution}_{start}_to_{end}.csv`,
/// where the symbol tail is the part after the exchange prefix
/// (`NSE:SBIN-EQ` -> `SBIN-EQ`).
pub fn csv_filename(script_name: &str, resolution: &str, start_date: &str, end_date: &str) -> String {
    let tail = script_name
        .split_once(':')
        .map(|(_, tail)| tail)
        .unwrap_or(script_name);
    format!("{tail}_{resolution}_{start_date}_to_{end_date}.csv")
}

/// Write the fetched series to `{dir}/{filename}`, creating the directory.
/// Nothing is written when the fetch failed upstream; callers only reach
/// this with a complete series.
pub fn save_candles(candles: &[Candle], dir: &Path, filename: &str) -> Result<PathBuf> {
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create output directory {}", dir.display()))?;
    let path = dir.join(filename);
    let mut writer = csv::Writer::from_path(&path)
        .with_context(|| format!("failed to create CSV writer for {}", path.display()))?;

    writer.write_record(["date_time", "open", "high", "low", "close", "volume"])?;
    for candle in candles {
        writer.write_record(&[
            candle.date_time.format("%Y-%m-%d %H:%M:%S").to_string(),
            candle.open.to_string(),
            candle.high.to_string(),
            candle.low.to_string(),
            candle.close.to_string(),
            candle.volume.to_string(),
        ])?;
    }
    writer.flush()?;

    info!("data saved: {}", path.display());
    Ok(path)
}
