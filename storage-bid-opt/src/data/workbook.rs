use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use calamine::{Data, Reader, open_workbook_auto};
use chrono::{NaiveDate, TimeDelta};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use storage_model::market::{DateSeries, DatedValue};
use tracing::{debug, info, warn};

/// Named date-indexed sheets of one market-data file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketWorkbook {
    pub sheets: IndexMap<String, DateSeries>,
}

impl MarketWorkbook {
    pub fn sheet(&self, name: &str) -> Option<&DateSeries> {
        self.sheets.get(name)
    }

    /// Reads a spreadsheet (`.xlsx`, `.xlsm`, `.xls`, `.ods`) or a
    /// `Date,Value` CSV file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("csv") => read_csv(path),
            Some("xlsx" | "xlsm" | "xlsb" | "xls" | "ods") => read_spreadsheet(path),
            _ => bail!("Unsupported market data file: {}", path.display()),
        }
    }
}

/// Whether a value came from the JSON cache or was parsed from the raw file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Loaded<T> {
    pub value: T,
    pub status: CacheStatus,
}

/// Days since the spreadsheet epoch (1899-12-30) to a calendar date.
fn serial_to_date(serial: f64) -> Option<NaiveDate> {
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    if !serial.is_finite() {
        return None;
    }
    epoch.checked_add_signed(TimeDelta::try_days(serial.floor() as i64)?)
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    let day = text.get(..10).unwrap_or(text);
    NaiveDate::parse_from_str(day, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(day, "%d.%m.%Y"))
        .ok()
}

fn cell_date(cell: &Data) -> Option<NaiveDate> {
    match cell {
        Data::DateTime(value) => serial_to_date(value.as_f64()),
        Data::Float(value) => serial_to_date(*value),
        Data::Int(value) => serial_to_date(*value as f64),
        Data::String(text) | Data::DateTimeIso(text) => parse_date(text),
        _ => None,
    }
}

fn cell_value(cell: &Data) -> Option<f64> {
    match cell {
        Data::Float(value) => Some(*value),
        Data::Int(value) => Some(*value as f64),
        Data::String(text) => text.trim().replace(',', ".").parse().ok(),
        _ => None,
    }
}

fn read_spreadsheet(path: &Path) -> Result<MarketWorkbook> {
    let mut workbook = open_workbook_auto(path)
        .with_context(|| format!("Failed to open workbook: {}", path.display()))?;

    let mut sheets = IndexMap::new();
    for name in workbook.sheet_names().to_vec() {
        let range = workbook
            .worksheet_range(&name)
            .with_context(|| format!("Failed to read sheet '{}'", name))?;

        let mut points = Vec::new();
        // first row holds the headers
        for (row_idx, row) in range.rows().enumerate().skip(1) {
            if row.iter().all(|cell| matches!(cell, Data::Empty)) {
                continue;
            }
            let row_num = row_idx + 1;
            let date = row.first().and_then(cell_date).ok_or_else(|| {
                anyhow!("Sheet '{}' row {}: no date in the first column", name, row_num)
            })?;
            let value = row.get(1).and_then(cell_value).ok_or_else(|| {
                anyhow!("Sheet '{}' row {}: no value in the second column", name, row_num)
            })?;
            points.push(DatedValue { date, value });
        }
        debug!(sheet = %name, points = points.len(), "read market sheet");
        sheets.insert(name, DateSeries::new(points));
    }

    Ok(MarketWorkbook { sheets })
}

fn read_csv(path: &Path) -> Result<MarketWorkbook> {
    let file =
        File::open(path).with_context(|| format!("Failed to open file: {}", path.display()))?;
    let reader = BufReader::new(file);

    let mut points = Vec::new();
    for (line_num, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read line {}", line_num + 1))?;
        let trimmed = line.trim();
        if line_num == 0 || trimmed.is_empty() {
            continue;
        }
        let (date, value) = trimmed.split_once([',', ';']).ok_or_else(|| {
            anyhow!("Line {}: expected 'date,value', got '{}'", line_num + 1, trimmed)
        })?;
        let date = parse_date(date)
            .ok_or_else(|| anyhow!("Line {}: invalid date '{}'", line_num + 1, date.trim()))?;
        let value: f64 = value
            .trim()
            .parse()
            .with_context(|| format!("Line {}: invalid value '{}'", line_num + 1, value.trim()))?;
        points.push(DatedValue { date, value });
    }

    let name = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("data")
        .to_string();
    let mut sheets = IndexMap::new();
    sheets.insert(name, DateSeries::new(points));
    Ok(MarketWorkbook { sheets })
}

fn cache_path(raw: &Path, cache_dir: &Path) -> PathBuf {
    let stem = raw.file_stem().and_then(|stem| stem.to_str()).unwrap_or("market");
    cache_dir.join(format!("{}.json", stem))
}

/// True when the raw file was modified after the cache was written.
fn cache_is_stale(raw: &Path, cache: &Path) -> bool {
    let modified = |path: &Path| fs::metadata(path).and_then(|meta| meta.modified()).ok();
    match (modified(raw), modified(cache)) {
        (Some(raw_time), Some(cache_time)) => raw_time > cache_time,
        _ => false,
    }
}

fn read_cache(cache: &Path) -> Result<MarketWorkbook> {
    let text = fs::read_to_string(cache)
        .with_context(|| format!("Failed to read cache: {}", cache.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse cache: {}", cache.display()))
}

/// Loads `raw` through a JSON cache in `cache_dir`.
///
/// A readable, up-to-date cache is a [`CacheStatus::Hit`]. Otherwise the raw
/// file is parsed and the cache rewritten, reported as a
/// [`CacheStatus::Miss`].
pub fn load_workbook(raw: &Path, cache_dir: &Path) -> Result<Loaded<MarketWorkbook>> {
    let cache = cache_path(raw, cache_dir);

    if cache.exists() && !cache_is_stale(raw, &cache) {
        match read_cache(&cache) {
            Ok(workbook) => {
                debug!(cache = %cache.display(), "market data cache hit");
                return Ok(Loaded {
                    value: workbook,
                    status: CacheStatus::Hit,
                });
            }
            Err(e) => warn!("Ignoring unreadable market data cache: {:#}", e),
        }
    }

    let workbook = MarketWorkbook::from_path(raw)?;
    info!(
        file = %raw.display(),
        sheets = workbook.sheets.len(),
        "parsed market data, refreshing cache"
    );

    fs::create_dir_all(cache_dir)
        .with_context(|| format!("Failed to create cache directory: {}", cache_dir.display()))?;
    let json = serde_json::to_string(&workbook).context("Failed to serialize market data")?;
    fs::write(&cache, json).with_context(|| format!("Failed to write cache: {}", cache.display()))?;

    Ok(Loaded {
        value: workbook,
        status: CacheStatus::Miss,
    })
}
