use crate::error::{MarketDnaError, Result};
use polars::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use super::{
    types::{MarketDataKey, MarketDataSource, MarketSeries, RequiredColumn},
    validator::DataValidator,
};

const TIMESTAMP_ALIASES: [&str; 4] = ["timestamp", "time", "Timestamp", "Time"];

pub struct CsvConnector;

impl CsvConnector {
    /// Load CSV file into DataFrame
    pub fn load<P: AsRef<Path>>(path: P) -> Result<DataFrame> {
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .try_into_reader_with_file_path(Some(path.as_ref().to_path_buf()))?
            .finish()
            .map_err(|e| MarketDnaError::DataLoading(format!("Failed to read CSV: {}", e)))?;

        Ok(df)
    }

    /// Convert a validated frame into column vectors.
    pub fn to_series(df: &DataFrame, key: MarketDataKey) -> Result<MarketSeries> {
        let column_map = DataValidator::validate_ohlcv(df)?;
        DataValidator::validate_minimum_rows(df, 1)?;

        let null_report = DataValidator::check_nulls(df)?;
        if let Some((column, count)) = null_report
            .iter()
            .find(|(name, _)| column_map.values().any(|mapped| mapped == name))
        {
            return Err(MarketDnaError::DataLoading(format!(
                "{}: column '{}' has {} null values",
                key, column, count
            )));
        }

        let column = |required: RequiredColumn| -> Result<Vec<f64>> {
            let name = &column_map[&required];
            let values = df.column(name)?.cast(&DataType::Float64)?;
            let values = values.f64()?;
            Ok(values.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
        };

        let open = column(RequiredColumn::Open)?;
        let high = column(RequiredColumn::High)?;
        let low = column(RequiredColumn::Low)?;
        let close = column(RequiredColumn::Close)?;
        let volume = column(RequiredColumn::Volume)?;
        let timestamps = Self::timestamps(df)?;

        let series = MarketSeries {
            key,
            timestamps,
            open,
            high,
            low,
            close,
            volume,
        };
        series.check()?;
        Ok(series)
    }

    /// Integer timestamp column when present, otherwise the row index.
    fn timestamps(df: &DataFrame) -> Result<Vec<i64>> {
        let columns = df.get_column_names();
        let found = TIMESTAMP_ALIASES
            .iter()
            .find(|alias| columns.iter().any(|col| col.as_str() == **alias));

        if let Some(name) = found {
            let column = df.column(name)?;
            if matches!(
                column.dtype(),
                DataType::Int64 | DataType::Int32 | DataType::UInt64 | DataType::UInt32
            ) {
                let values = column.cast(&DataType::Int64)?;
                let values = values.i64()?;
                return Ok(values
                    .into_iter()
                    .enumerate()
                    .map(|(i, v)| v.unwrap_or(i as i64))
                    .collect());
            }
            log::debug!("Timestamp column '{}' is not integral, using row index", name);
        }

        Ok((0..df.height() as i64).collect())
    }
}

/// Reads `{dir}/{exchange}_{symbol}_{timeframe}.csv`, with `/` in symbols
/// replaced by `-`.
pub struct CsvMarketData {
    dir: PathBuf,
}

impl CsvMarketData {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, key: &MarketDataKey) -> PathBuf {
        let file = format!(
            "{}_{}_{}.csv",
            key.exchange,
            key.symbol.replace('/', "-"),
            key.timeframe
        );
        self.dir.join(file)
    }
}

impl MarketDataSource for CsvMarketData {
    fn load(&self, key: &MarketDataKey) -> Result<Arc<MarketSeries>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Err(MarketDnaError::DataLoading(format!(
                "No market data file for {} at {}",
                key,
                path.display()
            )));
        }
        let df = CsvConnector::load(&path)?;
        let series = CsvConnector::to_series(&df, key.clone())?;
        log::info!("Loaded {} bars for {} from {}", series.len(), key, path.display());
        Ok(Arc::new(series))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::df;

    #[test]
    fn test_to_series_with_aliases() {
        let df = df! {
            "timestamp" => &[1i64, 2, 3],
            "Open" => &[100.0, 101.0, 102.0],
            "HIGH" => &[101.0, 103.0, 104.0],
            "low" => &[99.0, 100.0, 101.0],
            "Close" => &[100.5, 102.0, 103.0],
            "Vol" => &[1000.0, 1500.0, 1200.0],
        }
        .unwrap();

        let series = CsvConnector::to_series(&df, MarketDataKey::new("binance", "BTC/USDT", "1h")).unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series.timestamps, vec![1, 2, 3]);
        assert_eq!(series.close, vec![100.5, 102.0, 103.0]);
    }

    #[test]
    fn test_invalid_bar_is_rejected() {
        let df = df! {
            "open" => &[100.0, 101.0],
            "high" => &[99.0, 103.0],
            "low" => &[99.0, 100.0],
            "close" => &[100.5, 102.0],
            "volume" => &[1000.0, 1500.0],
        }
        .unwrap();

        let result = CsvConnector::to_series(&df, MarketDataKey::new("binance", "ETH/USDT", "1h"));
        assert!(result.is_err());
    }

    #[test]
    fn test_path_for_key() {
        let source = CsvMarketData::new("/data");
        let path = source.path_for(&MarketDataKey::new("binance", "BTC/USDT", "4h"));
        assert_eq!(path, PathBuf::from("/data/binance_BTC-USDT_4h.csv"));
    }
}
