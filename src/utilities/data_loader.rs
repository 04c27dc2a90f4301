use csv::{ReaderBuilder, StringRecord};
use std::borrow::Cow;
use std::fs::File;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CandleError {
    #[error("candles: Unknown source type: {0}")]
    UnknownSourceType(String),

    #[error("candles: Failed to open candle file: {0}")]
    Io(#[from] std::io::Error),

    #[error("candles: Malformed CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("candles: Cannot parse {column} at row {row}: {value:?}")]
    Parse {
        row: usize,
        column: &'static str,
        value: String,
    },
}

/// Column-oriented candle history, oldest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Candles {
    pub timestamp: Vec<i64>,
    pub open: Vec<f64>,
    pub high: Vec<f64>,
    pub low: Vec<f64>,
    pub close: Vec<f64>,
    pub volume: Vec<f64>,
}

impl Candles {
    pub fn new(
        timestamp: Vec<i64>,
        open: Vec<f64>,
        high: Vec<f64>,
        low: Vec<f64>,
        close: Vec<f64>,
        volume: Vec<f64>,
    ) -> Self {
        Candles {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Builds a candle set where every price column is `close`.
    pub fn from_close(close: Vec<f64>) -> Self {
        let len = close.len();
        Candles {
            timestamp: (0..len as i64).collect(),
            open: close.clone(),
            high: close.clone(),
            low: close.clone(),
            volume: vec![0.0; len],
            close,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.timestamp.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.timestamp.is_empty()
    }

    /// Owned copy of the trailing `n` candles (all of them when `n >= len`).
    /// Each column is cut on its own, so ragged columns keep at most `n`
    /// trailing entries instead of panicking.
    pub fn tail(&self, n: usize) -> Candles {
        fn last_n<T: Clone>(col: &[T], n: usize) -> Vec<T> {
            col[col.len().saturating_sub(n)..].to_vec()
        }
        Candles {
            timestamp: last_n(&self.timestamp, n),
            open: last_n(&self.open, n),
            high: last_n(&self.high, n),
            low: last_n(&self.low, n),
            close: last_n(&self.close, n),
            volume: last_n(&self.volume, n),
        }
    }

    pub fn select_candle_field(&self, field: &str) -> Result<&[f64], CandleError> {
        match field.to_lowercase().as_str() {
            "open" => Ok(&self.open),
            "high" => Ok(&self.high),
            "low" => Ok(&self.low),
            "close" => Ok(&self.close),
            "volume" => Ok(&self.volume),
            _ => Err(CandleError::UnknownSourceType(field.to_string())),
        }
    }

    pub fn get_calculated_field(&self, field: &str) -> Result<Vec<f64>, CandleError> {
        match field.to_lowercase().as_str() {
            "hl2" => Ok(self.hl2()),
            "hlc3" => Ok(self.hlc3()),
            "ohlc4" => Ok(self.ohlc4()),
            "hlcc4" => Ok(self.hlcc4()),
            _ => Err(CandleError::UnknownSourceType(field.to_string())),
        }
    }

    pub fn hl2(&self) -> Vec<f64> {
        self.high
            .iter()
            .zip(self.low.iter())
            .map(|(&high, &low)| (high + low) / 2.0)
            .collect()
    }

    pub fn hlc3(&self) -> Vec<f64> {
        self.high
            .iter()
            .zip(self.low.iter())
            .zip(self.close.iter())
            .map(|((&high, &low), &close)| (high + low + close) / 3.0)
            .collect()
    }

    pub fn ohlc4(&self) -> Vec<f64> {
        self.open
            .iter()
            .zip(self.high.iter())
            .zip(self.low.iter())
            .zip(self.close.iter())
            .map(|(((&open, &high), &low), &close)| (open + high + low + close) / 4.0)
            .collect()
    }

    pub fn hlcc4(&self) -> Vec<f64> {
        self.high
            .iter()
            .zip(self.low.iter())
            .zip(self.close.iter())
            .map(|((&high, &low), &close)| (high + low + 2.0 * close) / 4.0)
            .collect()
    }
}

/// Resolves a named price series. Stored columns are borrowed, composite
/// prices (`hl2`, `hlc3`, `ohlc4`, `hlcc4`) are computed.
pub fn source_type<'a>(candles: &'a Candles, source: &str) -> Result<Cow<'a, [f64]>, CandleError> {
    match source.to_lowercase().as_str() {
        "hl2" | "hlc3" | "ohlc4" | "hlcc4" => {
            candles.get_calculated_field(source).map(Cow::Owned)
        }
        _ => candles.select_candle_field(source).map(Cow::Borrowed),
    }
}

fn parse_field<T: FromStr>(
    record: &StringRecord,
    row: usize,
    idx: usize,
    column: &'static str,
) -> Result<T, CandleError> {
    let raw = record.get(idx).unwrap_or("");
    raw.trim().parse::<T>().map_err(|_| CandleError::Parse {
        row,
        column,
        value: raw.to_string(),
    })
}

/// Reads candles from a headered CSV laid out as
/// `timestamp, open, close, high, low, volume`.
pub fn read_candles_from_csv<P: AsRef<Path>>(file_path: P) -> Result<Candles, CandleError> {
    let file = File::open(file_path)?;
    let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(file);

    let mut timestamp = Vec::new();
    let mut open = Vec::new();
    let mut high = Vec::new();
    let mut low = Vec::new();
    let mut close = Vec::new();
    let mut volume = Vec::new();

    for (row, result) in rdr.records().enumerate() {
        let record = result?;
        timestamp.push(parse_field(&record, row, 0, "timestamp")?);
        open.push(parse_field(&record, row, 1, "open")?);
        close.push(parse_field(&record, row, 2, "close")?);
        high.push(parse_field(&record, row, 3, "high")?);
        low.push(parse_field(&record, row, 4, "low")?);
        volume.push(parse_field(&record, row, 5, "volume")?);
    }

    Ok(Candles::new(timestamp, open, high, low, close, volume))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const FIXTURE: &str = "src/data/2018-09-01-sample-4h.csv";

    #[test]
    fn test_field_congruency() {
        let candles = read_candles_from_csv(FIXTURE).expect("Failed to load CSV for testing");

        let len = candles.timestamp.len();
        assert_eq!(len, 64);
        assert_eq!(candles.open.len(), len, "Open length mismatch");
        assert_eq!(candles.high.len(), len, "High length mismatch");
        assert_eq!(candles.low.len(), len, "Low length mismatch");
        assert_eq!(candles.close.len(), len, "Close length mismatch");
        assert_eq!(candles.volume.len(), len, "Volume length mismatch");
    }

    #[test]
    fn test_column_order() {
        let candles = read_candles_from_csv(FIXTURE).expect("Failed to load CSV for testing");
        assert_eq!(candles.timestamp[0], 1535760000000);
        assert_eq!(candles.open[0], 5994.75);
        assert_eq!(candles.close[0], 6003.5);
        assert_eq!(candles.high[0], 6021.25);
        assert_eq!(candles.low[0], 5973.25);
        assert_eq!(candles.volume[0], 150.0);
        assert_eq!(*candles.close.last().unwrap(), 6800.39);
    }

    #[test]
    fn test_source_type_borrows_stored_columns() {
        let candles = Candles::from_close(vec![1.0, 2.0, 3.0]);
        for name in ["open", "high", "low", "close", "volume", "CLOSE"] {
            let series = source_type(&candles, name).expect(name);
            assert!(matches!(series, Cow::Borrowed(_)), "{name} should borrow");
        }
    }

    #[test]
    fn test_calculated_fields() {
        let candles = Candles::new(
            vec![0, 1],
            vec![10.0, 20.0],
            vec![14.0, 24.0],
            vec![8.0, 16.0],
            vec![12.0, 22.0],
            vec![1.0, 1.0],
        );
        assert_eq!(&*source_type(&candles, "hl2").unwrap(), &[11.0, 20.0]);
        assert_eq!(&*source_type(&candles, "hlc3").unwrap(), &[34.0 / 3.0, 62.0 / 3.0]);
        assert_eq!(&*source_type(&candles, "ohlc4").unwrap(), &[11.0, 20.5]);
        assert_eq!(&*source_type(&candles, "hlcc4").unwrap(), &[11.5, 21.0]);
    }

    #[test]
    fn test_unknown_source_type() {
        let candles = Candles::from_close(vec![1.0, 2.0]);
        match source_type(&candles, "vwap") {
            Err(CandleError::UnknownSourceType(name)) => assert_eq!(name, "vwap"),
            other => panic!("expected UnknownSourceType, got {:?}", other),
        }
    }

    #[test]
    fn test_tail() {
        let candles = Candles::from_close(vec![1.0, 2.0, 3.0, 4.0]);
        let t = candles.tail(2);
        assert_eq!(t.close, vec![3.0, 4.0]);
        assert_eq!(t.timestamp, vec![2, 3]);
        assert_eq!(candles.tail(10), candles);
        assert!(candles.tail(0).is_empty());
    }

    #[test]
    fn test_tail_ragged_columns() {
        let mut candles = Candles::from_close(vec![1.0, 2.0, 3.0, 4.0]);
        candles.open = vec![9.0];
        let t = candles.tail(2);
        assert_eq!(t.timestamp, vec![2, 3]);
        assert_eq!(t.open, vec![9.0]);
        assert_eq!(t.close, vec![3.0, 4.0]);
    }

    #[test]
    fn test_parse_error_reports_row_and_column() {
        let path = std::env::temp_dir().join("dpo_ta_bad_candles.csv");
        {
            let mut f = File::create(&path).unwrap();
            writeln!(f, "timestamp,open,close,high,low,volume").unwrap();
            writeln!(f, "1,1.0,2.0,3.0,0.5,10").unwrap();
            writeln!(f, "2,1.0,oops,3.0,0.5,10").unwrap();
        }
        match read_candles_from_csv(&path) {
            Err(CandleError::Parse { row, column, value }) => {
                assert_eq!(row, 1);
                assert_eq!(column, "close");
                assert_eq!(value, "oops");
            }
            other => panic!("expected Parse error, got {:?}", other),
        }
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_missing_file() {
        let res = read_candles_from_csv("src/data/does-not-exist.csv");
        assert!(matches!(res, Err(CandleError::Io(_))));
    }
}
