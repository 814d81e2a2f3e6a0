//! Descriptive statistics per bar series.

use kite_ingestor::models::bar_series::BarSeries;
use serde::Serialize;
use thiserror::Error;
use tracing::info;

/// Analysis was asked to run on nothing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
    /// The input collection was empty.
    #[error("No historical data to analyze")]
    NoData,
}

/// Price figures over the non-zero closes of a series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceAnalysis {
    /// First usable close.
    pub first_price: f64,
    /// Last usable close.
    pub last_price: f64,
    /// Lowest close.
    pub min_price: f64,
    /// Highest close.
    pub max_price: f64,
    /// Mean close.
    pub avg_price: f64,
    /// `last_price - first_price`.
    pub price_change: f64,
    /// Change relative to the first close, in percent. Zero when the first close is not positive.
    pub price_change_percent: f64,
    /// Population standard deviation of the closes.
    pub volatility: f64,
}

/// Volume figures over the non-zero volumes of a series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VolumeAnalysis {
    /// Mean volume, 0 when no bar traded.
    pub avg_volume: f64,
    /// Largest volume, 0 when no bar traded.
    pub max_volume: u64,
    /// Smallest non-zero volume, 0 when no bar traded.
    pub min_volume: u64,
}

/// Statistics for one instrument.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesStatistics {
    /// Symbol of the analyzed instrument.
    pub trading_symbol: String,
    /// Token of the analyzed instrument.
    pub instrument_token: u64,
    /// All bars in the series, including ones without a usable close.
    pub data_points: usize,
    /// Close-price figures.
    pub price_analysis: PriceAnalysis,
    /// Volume figures.
    pub volume_analysis: VolumeAnalysis,
}

/// Statistics for every series that had at least one usable close.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    /// Per-instrument results in input order.
    pub analysis_results: Vec<SeriesStatistics>,
    /// `analysis_results.len()`.
    pub total_analyzed: usize,
}

/// Computes statistics for one series, or `None` when it has no usable close.
///
/// Closes of zero or NaN and volumes of zero are treated as missing.
pub fn analyze_series(series: &BarSeries) -> Option<SeriesStatistics> {
    let closes: Vec<f64> = series
        .bars
        .iter()
        .map(|bar| bar.close)
        .filter(|close| *close != 0.0 && !close.is_nan())
        .collect();
    let (&first_price, &last_price) = (closes.first()?, closes.last()?);

    let count = closes.len() as f64;
    let min_price = closes.iter().copied().fold(f64::INFINITY, f64::min);
    let max_price = closes.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let avg_price = closes.iter().sum::<f64>() / count;
    let variance = closes.iter().map(|c| (c - avg_price).powi(2)).sum::<f64>() / count;

    let price_change = last_price - first_price;
    let price_change_percent = if first_price > 0.0 {
        price_change / first_price * 100.0
    } else {
        0.0
    };

    let volumes: Vec<u64> = series
        .bars
        .iter()
        .map(|bar| bar.volume)
        .filter(|volume| *volume != 0)
        .collect();
    let volume_analysis = if volumes.is_empty() {
        VolumeAnalysis {
            avg_volume: 0.0,
            max_volume: 0,
            min_volume: 0,
        }
    } else {
        VolumeAnalysis {
            avg_volume: volumes.iter().map(|v| *v as f64).sum::<f64>() / volumes.len() as f64,
            max_volume: volumes.iter().copied().max().unwrap_or_default(),
            min_volume: volumes.iter().copied().min().unwrap_or_default(),
        }
    };

    Some(SeriesStatistics {
        trading_symbol: series.trading_symbol.clone(),
        instrument_token: series.instrument_token,
        data_points: series.bars.len(),
        price_analysis: PriceAnalysis {
            first_price,
            last_price,
            min_price,
            max_price,
            avg_price,
            price_change,
            price_change_percent,
            volatility: variance.sqrt(),
        },
        volume_analysis,
    })
}

/// Analyzes every series, skipping those without a usable close.
pub fn analyze(series: &[BarSeries]) -> Result<AnalysisReport, AnalysisError> {
    if series.is_empty() {
        return Err(AnalysisError::NoData);
    }

    let analysis_results: Vec<SeriesStatistics> = series.iter().filter_map(analyze_series).collect();
    for stats in &analysis_results {
        let price = &stats.price_analysis;
        info!(
            symbol = %stats.trading_symbol,
            change = format_args!("{:.2}", price.price_change),
            change_pct = format_args!("{:.2}", price.price_change_percent),
            min = price.min_price,
            max = price.max_price,
            volatility = format_args!("{:.2}", price.volatility),
            avg_volume = format_args!("{:.0}", stats.volume_analysis.avg_volume),
            "series analyzed"
        );
    }

    Ok(AnalysisReport {
        total_analyzed: analysis_results.len(),
        analysis_results,
    })
}
