//! CSV file data adapter.
//!
//! Columns are located by header keyword (English or Chinese names). The
//! header may sit below a few title lines; rows above it are skipped. A file
//! with no recognizable header among its first rows is read positionally as
//! `date,open,high,low,close[,volume]`.

use crate::domain::error::TrendcrossError;
use crate::domain::ohlcv::{sort_by_date, Bar};
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use csv::StringRecord;
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;
use tracing::{debug, info, warn};

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%Y%m%d"];

/// How many leading records may be searched for the header row.
const HEADER_SCAN_ROWS: usize = 10;

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    /// Relative sources are resolved against `base_path`.
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, source: &str) -> PathBuf {
        self.base_path.join(source)
    }
}

impl DataPort for CsvAdapter {
    fn fetch_daily_bars(&self, source: &str) -> Result<Vec<Bar>, TrendcrossError> {
        let path = self.csv_path(source);
        let file = File::open(&path).map_err(|e| TrendcrossError::DataSource {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;
        let bars = parse_bars(file)?;
        info!(path = %path.display(), bars = bars.len(), "loaded daily bars");
        Ok(bars)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    Date,
    Open,
    High,
    Low,
    Close,
    Volume,
    Ma20,
}

impl Column {
    fn name(&self) -> &'static str {
        match self {
            Column::Date => "date",
            Column::Open => "open",
            Column::High => "high",
            Column::Low => "low",
            Column::Close => "close",
            Column::Volume => "volume",
            Column::Ma20 => "ma20",
        }
    }

    /// Ma20 is tested first so a moving-average header never claims a
    /// price role; open/high/low come before close so "open price" stays open.
    fn guess(header: &str) -> Option<Column> {
        let h = header.trim().to_lowercase();
        let has = |keys: &[&str]| keys.iter().any(|k| h.contains(k));
        if h == "ma.ma3" || has(&["ma20"]) {
            Some(Column::Ma20)
        } else if has(&["date", "time", "时间", "日期"]) {
            Some(Column::Date)
        } else if has(&["open", "开盘"]) {
            Some(Column::Open)
        } else if has(&["high", "最高"]) {
            Some(Column::High)
        } else if has(&["low", "最低"]) {
            Some(Column::Low)
        } else if has(&["close", "收盘", "price", "价格"]) {
            Some(Column::Close)
        } else if has(&["volume", "vol", "成交量"]) {
            Some(Column::Volume)
        } else {
            None
        }
    }
}

/// Resolved field index per column.
#[derive(Debug, Clone, PartialEq)]
struct ColumnMap {
    date: usize,
    open: usize,
    high: usize,
    low: usize,
    close: usize,
    volume: Option<usize>,
    ma20: Option<usize>,
}

impl ColumnMap {
    /// `None` when no header matched any keyword. A header that names some
    /// columns but no open column is read positionally.
    fn from_header(header: &StringRecord) -> Result<Option<Self>, TrendcrossError> {
        let mut found: Vec<(Column, usize)> = Vec::new();
        for (idx, field) in header.iter().enumerate() {
            if let Some(col) = Column::guess(field) {
                if !found.iter().any(|(c, _)| *c == col) {
                    found.push((col, idx));
                }
            }
        }
        if found.is_empty() {
            return Ok(None);
        }

        let lookup = |col: Column| found.iter().find(|(c, _)| *c == col).map(|(_, i)| *i);
        if lookup(Column::Open).is_none() {
            debug!(header = ?header, "no open column in header, reading columns by position");
            return Self::positional(header.len()).map(Some);
        }
        let require = |col: Column| {
            lookup(col).ok_or_else(|| TrendcrossError::Schema {
                field: col.name().to_string(),
                reason: format!("no header matches a {} column", col.name()),
            })
        };

        Ok(Some(ColumnMap {
            date: require(Column::Date)?,
            open: require(Column::Open)?,
            high: require(Column::High)?,
            low: require(Column::Low)?,
            close: require(Column::Close)?,
            volume: lookup(Column::Volume),
            ma20: lookup(Column::Ma20),
        }))
    }

    fn positional(width: usize) -> Result<Self, TrendcrossError> {
        if width < 5 {
            return Err(TrendcrossError::Schema {
                field: "ohlc".to_string(),
                reason: format!(
                    "headerless file needs at least 5 columns (date,open,high,low,close), got {}",
                    width
                ),
            });
        }
        Ok(ColumnMap {
            date: 0,
            open: 1,
            high: 2,
            low: 3,
            close: 4,
            volume: (width > 5).then_some(5),
            ma20: None,
        })
    }
}

/// Parse daily bars from CSV text. Rows with an unparsable date or price are
/// dropped; the result is sorted by date.
pub fn parse_bars<R: Read>(reader: R) -> Result<Vec<Bar>, TrendcrossError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut records = rdr.records();
    let mut pending: Vec<StringRecord> = Vec::new();
    let mut columns = None;
    for record in records.by_ref().take(HEADER_SCAN_ROWS) {
        let record = record.map_err(csv_error)?;
        if let Some(map) = ColumnMap::from_header(&record)? {
            if !pending.is_empty() {
                debug!(skipped = pending.len(), "skipping rows above the header");
            }
            pending.clear();
            columns = Some(map);
            break;
        }
        pending.push(record);
    }

    let columns = match columns {
        Some(map) => map,
        None if pending.is_empty() => return Ok(Vec::new()),
        None => {
            debug!("no recognizable header, reading columns by position");
            let width = pending.iter().map(StringRecord::len).max().unwrap_or(0);
            ColumnMap::positional(width)?
        }
    };

    let mut bars = Vec::new();
    let mut dropped = 0usize;
    let rest = records.map(|r| r.map_err(csv_error));
    for (line, record) in pending.into_iter().map(Ok).chain(rest).enumerate() {
        let record = record?;
        match parse_row(&record, &columns) {
            Some(bar) => bars.push(bar),
            None => {
                dropped += 1;
                debug!(row = line + 1, record = ?record, "dropping unparsable row");
            }
        }
    }

    if dropped > 0 {
        warn!(dropped, kept = bars.len(), "dropped rows with unparsable date or price");
    }
    sort_by_date(&mut bars);
    Ok(bars)
}

fn csv_error(e: csv::Error) -> TrendcrossError {
    TrendcrossError::DataSource {
        reason: format!("CSV parse error: {}", e),
    }
}

fn parse_row(record: &StringRecord, columns: &ColumnMap) -> Option<Bar> {
    let date = parse_date(record.get(columns.date)?)?;
    let price = |idx: usize| record.get(idx).and_then(parse_number);

    let mut bar = Bar::new(
        date,
        price(columns.open)?,
        price(columns.high)?,
        price(columns.low)?,
        price(columns.close)?,
    );
    if let Some(volume) = columns.volume.and_then(price) {
        bar = bar.with_volume(volume);
    }
    if let Some(ma20) = columns.ma20.and_then(price) {
        bar = bar.with_ma20(ma20);
    }
    Some(bar)
}

fn parse_number(raw: &str) -> Option<f64> {
    raw.trim()
        .replace(',', "")
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

/// Accepts a trailing time part (`2024-01-02 15:00:00`).
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let day = raw.split_whitespace().next()?;
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(day, fmt).ok())
}
