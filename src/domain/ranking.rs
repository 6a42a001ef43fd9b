//! Ranking and cross-sectional statistics over per-instrument results.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use super::backtest::BacktestResult;
use super::error::RankbtError;

/// Metric used to order a batch. Higher is better for every option;
/// `max_drawdown` is negative so the shallowest drawdown ranks first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RankingMetric {
    #[default]
    SharpeRatio,
    TotalReturn,
    AnnualizedReturn,
    MaxDrawdown,
    WinRate,
    FinalCapital,
    TradeCount,
}

impl RankingMetric {
    pub const ALL: [RankingMetric; 7] = [
        RankingMetric::SharpeRatio,
        RankingMetric::TotalReturn,
        RankingMetric::AnnualizedReturn,
        RankingMetric::MaxDrawdown,
        RankingMetric::WinRate,
        RankingMetric::FinalCapital,
        RankingMetric::TradeCount,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RankingMetric::SharpeRatio => "sharpe_ratio",
            RankingMetric::TotalReturn => "total_return",
            RankingMetric::AnnualizedReturn => "annualized_return",
            RankingMetric::MaxDrawdown => "max_drawdown",
            RankingMetric::WinRate => "win_rate",
            RankingMetric::FinalCapital => "final_capital",
            RankingMetric::TradeCount => "trade_count",
        }
    }

    pub fn value(&self, result: &BacktestResult) -> f64 {
        match self {
            RankingMetric::SharpeRatio => result.sharpe_ratio,
            RankingMetric::TotalReturn => result.total_return,
            RankingMetric::AnnualizedReturn => result.annualized_return,
            RankingMetric::MaxDrawdown => result.max_drawdown,
            RankingMetric::WinRate => result.win_rate,
            RankingMetric::FinalCapital => result.final_capital,
            RankingMetric::TradeCount => result.trade_count as f64,
        }
    }
}

impl fmt::Display for RankingMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RankingMetric {
    type Err = RankbtError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        match normalized.as_str() {
            "sharpe" | "sharpe_ratio" => Ok(RankingMetric::SharpeRatio),
            "return" | "total_return" => Ok(RankingMetric::TotalReturn),
            "annualized_return" | "cagr" => Ok(RankingMetric::AnnualizedReturn),
            "max_drawdown" | "drawdown" => Ok(RankingMetric::MaxDrawdown),
            "win_rate" => Ok(RankingMetric::WinRate),
            "final_capital" => Ok(RankingMetric::FinalCapital),
            "trade_count" | "trades" => Ok(RankingMetric::TradeCount),
            _ => Err(RankbtError::ConfigInvalid {
                section: "batch".into(),
                key: "ranking_metric".into(),
                reason: format!("unknown ranking metric '{s}'"),
            }),
        }
    }
}

/// Descending by `metric`, NaN last, ties broken by instrument id ascending.
pub fn compare_by(metric: RankingMetric, a: &BacktestResult, b: &BacktestResult) -> Ordering {
    let (va, vb) = (metric.value(a), metric.value(b));
    let by_value = match (va.is_nan(), vb.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => vb.total_cmp(&va),
    };
    by_value.then_with(|| a.instrument_id.cmp(&b.instrument_id))
}

pub fn rank(results: &mut [BacktestResult], metric: RankingMetric) {
    results.sort_by(|a, b| compare_by(metric, a, b));
}

/// Total-return histogram buckets, best first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnBucket {
    Above100,
    From50To100,
    From20To50,
    From0To20,
    FromMinus20To0,
    BelowMinus20,
}

impl ReturnBucket {
    pub const ALL: [ReturnBucket; 6] = [
        ReturnBucket::Above100,
        ReturnBucket::From50To100,
        ReturnBucket::From20To50,
        ReturnBucket::From0To20,
        ReturnBucket::FromMinus20To0,
        ReturnBucket::BelowMinus20,
    ];

    pub fn classify(total_return: f64) -> ReturnBucket {
        if total_return > 1.0 {
            ReturnBucket::Above100
        } else if total_return > 0.5 {
            ReturnBucket::From50To100
        } else if total_return > 0.2 {
            ReturnBucket::From20To50
        } else if total_return > 0.0 {
            ReturnBucket::From0To20
        } else if total_return > -0.2 {
            ReturnBucket::FromMinus20To0
        } else {
            ReturnBucket::BelowMinus20
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ReturnBucket::Above100 => "> 100%",
            ReturnBucket::From50To100 => "50% ~ 100%",
            ReturnBucket::From20To50 => "20% ~ 50%",
            ReturnBucket::From0To20 => "0% ~ 20%",
            ReturnBucket::FromMinus20To0 => "-20% ~ 0%",
            ReturnBucket::BelowMinus20 => "< -20%",
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BucketCount {
    pub bucket: ReturnBucket,
    pub count: usize,
    /// Fraction of all results.
    pub pct: f64,
}

/// Aggregate statistics across all successful instruments.
#[derive(Debug, Clone, PartialEq)]
pub struct CrossSectionSummary {
    pub count: usize,
    pub mean_return: f64,
    pub median_return: f64,
    pub positive_count: usize,
    pub positive_pct: f64,
    pub negative_count: usize,
    pub negative_pct: f64,
    pub mean_sharpe: f64,
    pub mean_max_drawdown: f64,
    pub mean_trade_count: f64,
    pub mean_win_rate: f64,
    pub histogram: [BucketCount; 6],
}

impl CrossSectionSummary {
    pub fn compute(results: &[BacktestResult]) -> Self {
        let count = results.len();
        let mut counts = [0usize; 6];
        for r in results {
            counts[ReturnBucket::classify(r.total_return).index()] += 1;
        }
        let fraction = |n: usize| if count == 0 { 0.0 } else { n as f64 / count as f64 };
        let histogram = ReturnBucket::ALL.map(|bucket| BucketCount {
            bucket,
            count: counts[bucket.index()],
            pct: fraction(counts[bucket.index()]),
        });

        let returns: Vec<f64> = results.iter().map(|r| r.total_return).collect();
        let positive_count = returns.iter().filter(|&&r| r > 0.0).count();
        let negative_count = returns.iter().filter(|&&r| r < 0.0).count();

        CrossSectionSummary {
            count,
            mean_return: mean(&returns),
            median_return: median(&returns),
            positive_count,
            positive_pct: fraction(positive_count),
            negative_count,
            negative_pct: fraction(negative_count),
            mean_sharpe: mean_of(results, |r| r.sharpe_ratio),
            mean_max_drawdown: mean_of(results, |r| r.max_drawdown),
            mean_trade_count: mean_of(results, |r| r.trade_count as f64),
            mean_win_rate: mean_of(results, |r| r.win_rate),
            histogram,
        }
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn mean_of(results: &[BacktestResult], field: impl Fn(&BacktestResult) -> f64) -> f64 {
    let values: Vec<f64> = results.iter().map(field).collect();
    mean(&values)
}

fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::collections::BTreeMap;

    fn result(id: &str, total_return: f64, sharpe: f64) -> BacktestResult {
        BacktestResult {
            instrument_id: id.into(),
            total_return,
            annualized_return: total_return,
            max_drawdown: -0.1,
            sharpe_ratio: sharpe,
            win_rate: 0.5,
            trade_count: 4,
            avg_holding_duration: 10.0,
            final_capital: 10_000.0 * (1.0 + total_return),
            initial_capital: 10_000.0,
            equity_curve: vec![],
            drawdown_curve: vec![],
            cumulative_return_curve: vec![],
            trades: vec![],
            open_position: None,
            extended_stats: BTreeMap::new(),
        }
    }

    fn ids(results: &[BacktestResult]) -> Vec<&str> {
        results.iter().map(|r| r.instrument_id.as_str()).collect()
    }

    #[test]
    fn parse_metric_names() {
        for metric in RankingMetric::ALL {
            assert_eq!(metric.as_str().parse::<RankingMetric>().unwrap(), metric);
        }
        assert_eq!("Sharpe".parse::<RankingMetric>().unwrap(), RankingMetric::SharpeRatio);
        assert_eq!(
            "total-return".parse::<RankingMetric>().unwrap(),
            RankingMetric::TotalReturn
        );
        assert!(matches!(
            "alpha".parse::<RankingMetric>(),
            Err(RankbtError::ConfigInvalid { .. })
        ));
    }

    #[test]
    fn rank_descending_with_id_tiebreak() {
        let mut results = vec![
            result("C", 0.1, 1.0),
            result("A", 0.2, 2.0),
            result("B", 0.3, 1.0),
        ];
        rank(&mut results, RankingMetric::SharpeRatio);
        assert_eq!(ids(&results), ["A", "B", "C"]);

        rank(&mut results, RankingMetric::TotalReturn);
        assert_eq!(ids(&results), ["B", "A", "C"]);
    }

    #[test]
    fn nan_ranks_last() {
        let mut results = vec![
            result("A", 0.1, f64::NAN),
            result("B", 0.1, -3.0),
            result("C", 0.1, 0.5),
        ];
        rank(&mut results, RankingMetric::SharpeRatio);
        assert_eq!(ids(&results), ["C", "B", "A"]);
    }

    #[test]
    fn shallow_drawdown_ranks_first() {
        let mut a = result("A", 0.0, 0.0);
        a.max_drawdown = -0.4;
        let mut b = result("B", 0.0, 0.0);
        b.max_drawdown = -0.05;
        let mut results = vec![a, b];
        rank(&mut results, RankingMetric::MaxDrawdown);
        assert_eq!(ids(&results), ["B", "A"]);
    }

    #[test]
    fn bucket_boundaries() {
        assert_eq!(ReturnBucket::classify(1.5), ReturnBucket::Above100);
        assert_eq!(ReturnBucket::classify(1.0), ReturnBucket::From50To100);
        assert_eq!(ReturnBucket::classify(0.5), ReturnBucket::From20To50);
        assert_eq!(ReturnBucket::classify(0.2), ReturnBucket::From0To20);
        assert_eq!(ReturnBucket::classify(0.0), ReturnBucket::FromMinus20To0);
        assert_eq!(ReturnBucket::classify(-0.2), ReturnBucket::BelowMinus20);
        assert_eq!(ReturnBucket::classify(-0.9), ReturnBucket::BelowMinus20);
    }

    #[test]
    fn summary_of_empty_is_zero() {
        let summary = CrossSectionSummary::compute(&[]);
        assert_eq!(summary.count, 0);
        assert_eq!(summary.mean_return, 0.0);
        assert_eq!(summary.median_return, 0.0);
        assert_eq!(summary.positive_pct, 0.0);
        assert!(summary.histogram.iter().all(|b| b.count == 0 && b.pct == 0.0));
    }

    #[test]
    fn summary_statistics() {
        let results = vec![
            result("A", 1.2, 2.0),
            result("B", 0.3, 1.0),
            result("C", -0.1, 0.0),
            result("D", -0.5, -1.0),
        ];
        let summary = CrossSectionSummary::compute(&results);

        assert_eq!(summary.count, 4);
        assert_abs_diff_eq!(summary.mean_return, 0.225, epsilon = 1e-12);
        assert_abs_diff_eq!(summary.median_return, 0.1, epsilon = 1e-12);
        assert_eq!(summary.positive_count, 2);
        assert_abs_diff_eq!(summary.positive_pct, 0.5);
        assert_eq!(summary.negative_count, 2);
        assert_abs_diff_eq!(summary.mean_sharpe, 0.5);
        assert_abs_diff_eq!(summary.mean_max_drawdown, -0.1);
        assert_abs_diff_eq!(summary.mean_trade_count, 4.0);
        assert_abs_diff_eq!(summary.mean_win_rate, 0.5);

        let counts: Vec<usize> = summary.histogram.iter().map(|b| b.count).collect();
        assert_eq!(counts, [1, 0, 1, 0, 1, 1]);
        assert_abs_diff_eq!(summary.histogram[0].pct, 0.25);
        assert_eq!(summary.histogram[5].bucket, ReturnBucket::BelowMinus20);
    }

    #[test]
    fn median_odd_count() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
    }
}
