//! Security Performance
//!
//! Forward returns of the traded security measured from the open on the
//! action date, plus two hypothetical exits priced at a quantile of the
//! daily price action over the classification window.
//!
//! Formulas (with `entry = open[action]`):
//! - `month_performance    = (close[month_check]    - entry) / entry`
//! - `two_week_performance = (close[two_week_check] - entry) / entry`
//! - `mid_exit_return      = (Q(midpoint) - entry) / entry`, `midpoint = (high + low) / 2`
//! - `open_exit_return     = (Q(open)     - entry) / entry`
//!
//! `Q` is the linearly interpolated quantile over bars dated
//! `[action, classification_end]`, where `action` is the entry bar's date
//! after alignment and `classification_end` is used as given. Offset `0` is
//! therefore always the entry bar. The holding period is the zero-based
//! offset of the first bar, in date order, whose statistic is at or above
//! the quantile. The maximum always qualifies, so the offset exists for any
//! non-empty window even when the quantile interpolates between bars.

use crate::config::{DateAlignment, EnrichConfig};
use crate::outcome::{Evaluation, Unavailable};
use crate::record::TransactionRecord;
use chrono::NaiveDate;
use form4_data::history::columns::{HIGH, LOW, OPEN};
use form4_data::{Bar, PriceHistory, SecurityDataProvider};
use polars::prelude::*;
use serde::Serialize;

/// Name of the derived midpoint column.
pub const MIDPOINT: &str = "midpoint";

/// Relative change from `open` to `close`.
pub fn period_return(open: f64, close: f64) -> f64 {
    (close - open) / open
}

/// Dates one security evaluation is measured over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecurityWindow {
    /// Entry date (open price)
    pub action_date: NaiveDate,
    /// Close date of the 1-month return
    pub month_check: NaiveDate,
    /// Close date of the 2-week return
    pub two_week_check: NaiveDate,
    /// Last date of the classification window
    pub classification_end: NaiveDate,
}

impl From<&TransactionRecord> for SecurityWindow {
    fn from(record: &TransactionRecord) -> Self {
        Self {
            action_date: record.action_date,
            month_check: record.performance_check_month,
            two_week_check: record.performance_check_2_weeks,
            classification_end: record.classification_check_month,
        }
    }
}

/// Derived security features for one record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SecurityPerformance {
    /// 1-month return
    pub month_performance: f64,
    /// 2-week return
    pub two_week_performance: f64,
    /// Return if exited at the midpoint quantile
    pub mid_exit_return: f64,
    /// Return if exited at the open quantile
    pub open_exit_return: f64,
    /// Trading days from entry to the midpoint exit
    pub days_to_mid_exit: usize,
    /// Trading days from entry to the open exit
    pub days_to_open_exit: usize,
}

/// Quantile exit prices and their offsets within a window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExitPoints {
    /// Midpoint quantile
    pub mid_exit: f64,
    /// Open quantile
    pub open_exit: f64,
    /// Offset of the first bar whose midpoint reaches `mid_exit`
    pub days_to_mid_exit: usize,
    /// Offset of the first bar whose open reaches `open_exit`
    pub days_to_open_exit: usize,
}

/// Evaluates [`SecurityPerformance`] against a security's own history.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SecurityEvaluator {
    exit_quantile: f64,
    alignment: DateAlignment,
}

impl SecurityEvaluator {
    /// Create an evaluator.
    pub const fn new(exit_quantile: f64, alignment: DateAlignment) -> Self {
        Self {
            exit_quantile,
            alignment,
        }
    }

    /// Create an evaluator from a run configuration.
    pub const fn from_config(config: &EnrichConfig) -> Self {
        Self::new(config.exit_quantile, config.date_alignment)
    }

    /// Fetch the history of `symbol` and evaluate it.
    pub async fn evaluate<P: SecurityDataProvider>(
        &self,
        provider: &P,
        symbol: &str,
        window: SecurityWindow,
    ) -> Evaluation<SecurityPerformance> {
        let history = provider
            .history(symbol)
            .await
            .map_err(|e| Unavailable::Provider {
                symbol: symbol.to_string(),
                reason: e.to_string(),
            })?;
        self.evaluate_history(&history, window)
    }

    /// Evaluate an already fetched history.
    pub fn evaluate_history(
        &self,
        history: &PriceHistory,
        window: SecurityWindow,
    ) -> Evaluation<SecurityPerformance> {
        let action = self.alignment.resolve(history, window.action_date)?;
        let month = self.alignment.resolve(history, window.month_check)?;
        let two_week = self.alignment.resolve(history, window.two_week_check)?;

        let entry = entry_open(history, action)?;
        let month_close = bar_on(history, month)?.close;
        let two_week_close = bar_on(history, two_week)?.close;
        // Window opens on the entry bar; its end is a range limit
        let exits = exit_points(history, action, window.classification_end, self.exit_quantile)?;

        Ok(SecurityPerformance {
            month_performance: period_return(entry, month_close),
            two_week_performance: period_return(entry, two_week_close),
            mid_exit_return: period_return(entry, exits.mid_exit),
            open_exit_return: period_return(entry, exits.open_exit),
            days_to_mid_exit: exits.days_to_mid_exit,
            days_to_open_exit: exits.days_to_open_exit,
        })
    }
}

pub(crate) fn bar_on(history: &PriceHistory, date: NaiveDate) -> Evaluation<Bar> {
    history
        .bar_on(date)
        .map_err(|e| Unavailable::from_data_error(history.symbol(), e))
}

/// Open on `date`, rejected when it cannot serve as a return denominator.
pub(crate) fn entry_open(history: &PriceHistory, date: NaiveDate) -> Evaluation<f64> {
    let open = bar_on(history, date)?.open;
    if open == 0.0 || !open.is_finite() {
        return Err(Unavailable::computation(format!(
            "{} entry open on {} is {}",
            history.symbol(),
            date,
            open
        )));
    }
    Ok(open)
}

/// Quantile exits over bars dated `[start, end]`.
pub fn exit_points(
    history: &PriceHistory,
    start: NaiveDate,
    end: NaiveDate,
    quantile: f64,
) -> Evaluation<ExitPoints> {
    let window = history.window(start, end);
    if window.height() == 0 {
        return Err(Unavailable::EmptyWindow {
            symbol: history.symbol().to_string(),
            start,
            end,
        });
    }

    let frame = window
        .lazy()
        .with_column(((col(HIGH) + col(LOW)) / lit(2.0)).alias(MIDPOINT))
        .collect()
        .map_err(Unavailable::computation)?;

    let stats = frame
        .clone()
        .lazy()
        .select([
            col(MIDPOINT)
                .quantile(lit(quantile), QuantileMethod::Linear)
                .alias(MIDPOINT),
            col(OPEN)
                .quantile(lit(quantile), QuantileMethod::Linear)
                .alias(OPEN),
        ])
        .collect()
        .map_err(Unavailable::computation)?;

    let mid_exit = scalar(&stats, MIDPOINT)?;
    let open_exit = scalar(&stats, OPEN)?;

    Ok(ExitPoints {
        mid_exit,
        open_exit,
        days_to_mid_exit: first_at_or_above(&values(&frame, MIDPOINT)?, mid_exit)?,
        days_to_open_exit: first_at_or_above(&values(&frame, OPEN)?, open_exit)?,
    })
}

fn scalar(frame: &DataFrame, name: &str) -> Evaluation<f64> {
    frame
        .column(name)
        .and_then(|c| c.f64().map(|ca| ca.get(0)))
        .map_err(Unavailable::computation)?
        .ok_or_else(|| Unavailable::computation(format!("{} quantile is null", name)))
}

fn values(frame: &DataFrame, name: &str) -> Evaluation<Vec<f64>> {
    let column = frame.column(name).map_err(Unavailable::computation)?;
    let values = column.f64().map_err(Unavailable::computation)?;
    Ok(values.to_vec().into_iter().flatten().collect())
}

fn first_at_or_above(values: &[f64], threshold: f64) -> Evaluation<usize> {
    values
        .iter()
        .position(|value| *value >= threshold)
        .ok_or_else(|| Unavailable::computation(format!("no bar reaches {}", threshold)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{Datelike, Weekday};
    use form4_data::StaticProvider;

    fn weekdays(start: NaiveDate, n: usize) -> Vec<NaiveDate> {
        start
            .iter_days()
            .filter(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
            .take(n)
            .collect()
    }

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 1, 10).unwrap()
    }

    /// Bar i opens at 100 + i with a symmetric range, so midpoint == open.
    fn rising(n: usize) -> PriceHistory {
        let bars = weekdays(start(), n)
            .into_iter()
            .enumerate()
            .map(|(i, d)| {
                let base = 100.0 + i as f64;
                Bar::new(d, base, base + 2.0, base - 2.0, base + 1.0)
            })
            .collect();
        PriceHistory::from_bars("ACME", bars).unwrap()
    }

    fn window_over(dates: &[NaiveDate], two_week: usize, month: usize, end: usize) -> SecurityWindow {
        SecurityWindow {
            action_date: dates[0],
            month_check: dates[month],
            two_week_check: dates[two_week],
            classification_end: dates[end],
        }
    }

    #[test]
    fn test_period_return() {
        assert_relative_eq!(period_return(100.0, 110.0), 0.10);
        assert_relative_eq!(period_return(50.0, 25.0), -0.5);
    }

    #[test]
    fn test_rising_series() {
        let history = rising(60);
        let dates = history.trading_dates().to_vec();
        let evaluator = SecurityEvaluator::new(0.75, DateAlignment::Exact);

        let perf = evaluator
            .evaluate_history(&history, window_over(&dates, 9, 20, 20))
            .unwrap();

        assert_relative_eq!(perf.month_performance, 0.21, epsilon = 1e-12);
        assert_relative_eq!(perf.two_week_performance, 0.10, epsilon = 1e-12);
        // 21 bars: position (21 - 1) * 0.75 = 15 lands exactly on bar 15
        assert_relative_eq!(perf.mid_exit_return, 0.15, epsilon = 1e-12);
        assert_relative_eq!(perf.open_exit_return, 0.15, epsilon = 1e-12);
        assert_eq!(perf.days_to_mid_exit, 15);
        assert_eq!(perf.days_to_open_exit, 15);
    }

    #[test]
    fn test_interpolated_quantile_picks_first_bar_above() {
        // Four bars with midpoints [10, 10, 50, 10]: position 2.25 gives 10 + 0.25 * 40 = 20
        let dates = weekdays(start(), 60);
        let bars = dates
            .iter()
            .enumerate()
            .map(|(i, &d)| {
                if i == 2 {
                    Bar::new(d, 10.0, 51.0, 49.0, 10.0)
                } else {
                    Bar::new(d, 10.0, 11.0, 9.0, 10.0)
                }
            })
            .collect();
        let history = PriceHistory::from_bars("ACME", bars).unwrap();

        let exits = exit_points(&history, dates[0], dates[3], 0.75).unwrap();
        assert_relative_eq!(exits.mid_exit, 20.0, epsilon = 1e-12);
        assert_eq!(exits.days_to_mid_exit, 2);
        assert_relative_eq!(exits.open_exit, 10.0);
        assert_eq!(exits.days_to_open_exit, 0);
    }

    #[test]
    fn test_window_bounds_need_not_be_trading_days() {
        let history = rising(10);
        let dates = history.trading_dates().to_vec();
        // Saturday end date still closes the window on the preceding Friday
        let saturday = dates[3] + chrono::Days::new(1);
        assert_eq!(saturday.weekday(), Weekday::Sat);
        let exits = exit_points(&history, dates[0], saturday, 1.0).unwrap();
        assert_relative_eq!(exits.open_exit, 103.0);
        assert_eq!(exits.days_to_open_exit, 3);
    }

    #[test]
    fn test_empty_window() {
        let history = rising(10);
        let dates = history.trading_dates().to_vec();
        let window = SecurityWindow {
            classification_end: dates[0] - chrono::Days::new(1),
            ..window_over(&dates, 2, 4, 4)
        };
        let result = SecurityEvaluator::new(0.75, DateAlignment::Exact)
            .evaluate_history(&history, window);
        assert!(matches!(result, Err(Unavailable::EmptyWindow { .. })));
    }

    #[test]
    fn test_non_trading_date_fails_closed() {
        let history = rising(30);
        let dates = history.trading_dates().to_vec();
        let sunday = dates[8] + chrono::Days::new(2);
        assert_eq!(sunday.weekday(), Weekday::Sun);
        let window = SecurityWindow {
            two_week_check: sunday,
            ..window_over(&dates, 9, 20, 20)
        };

        let exact = SecurityEvaluator::new(0.75, DateAlignment::Exact);
        assert!(matches!(
            exact.evaluate_history(&history, window),
            Err(Unavailable::DateNotFound { .. })
        ));

        // Aligned to Friday (bar 8)
        let aligned = SecurityEvaluator::new(0.75, DateAlignment::NearestEarlier);
        let perf = aligned.evaluate_history(&history, window).unwrap();
        assert_relative_eq!(perf.two_week_performance, 0.09, epsilon = 1e-12);
    }

    #[test]
    fn test_aligned_entry_bar_opens_exit_window() {
        let history = rising(30);
        let dates = history.trading_dates().to_vec();
        let saturday = dates[3] + chrono::Days::new(1);
        assert_eq!(saturday.weekday(), Weekday::Sat);
        let window = SecurityWindow {
            action_date: saturday,
            ..window_over(&dates, 9, 20, 20)
        };

        assert!(matches!(
            SecurityEvaluator::new(0.75, DateAlignment::Exact).evaluate_history(&history, window),
            Err(Unavailable::DateNotFound { .. })
        ));

        // Entry on Friday (bar 3, open 103); the window holds bars 3..=20,
        // position 17 * 0.75 = 12.75 gives 115.75, first reached by bar 16
        let perf = SecurityEvaluator::new(0.75, DateAlignment::NearestEarlier)
            .evaluate_history(&history, window)
            .unwrap();
        assert_relative_eq!(perf.month_performance, 18.0 / 103.0, epsilon = 1e-12);
        assert_relative_eq!(perf.open_exit_return, 12.75 / 103.0, epsilon = 1e-12);
        assert_eq!(perf.days_to_open_exit, 13);
        assert_eq!(perf.days_to_mid_exit, 13);
    }

    #[test]
    fn test_zero_entry_open() {
        let dates = weekdays(start(), 5);
        let bars = dates
            .iter()
            .map(|&d| Bar::new(d, 0.0, 1.0, 0.0, 1.0))
            .collect();
        let history = PriceHistory::from_bars("ZERO", bars).unwrap();
        let result = SecurityEvaluator::new(0.75, DateAlignment::Exact)
            .evaluate_history(&history, window_over(&dates, 1, 2, 4));
        assert!(matches!(result, Err(Unavailable::Computation { .. })));
    }

    #[tokio::test]
    async fn test_provider_failure_is_unavailable() {
        let provider = StaticProvider::new();
        let dates = weekdays(start(), 30);
        let result = SecurityEvaluator::new(0.75, DateAlignment::Exact)
            .evaluate(&provider, "ACME", window_over(&dates, 9, 20, 20))
            .await;
        assert!(matches!(result, Err(Unavailable::Provider { .. })));
    }

    #[tokio::test]
    async fn test_evaluation_is_deterministic() {
        let provider = StaticProvider::new().with_history(rising(60));
        let dates = weekdays(start(), 60);
        let evaluator = SecurityEvaluator::new(0.75, DateAlignment::Exact);
        let window = window_over(&dates, 9, 20, 40);

        let first = evaluator.evaluate(&provider, "ACME", window).await.unwrap();
        let second = evaluator.evaluate(&provider, "ACME", window).await.unwrap();
        assert_eq!(first, second);
    }
}
