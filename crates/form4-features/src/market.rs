//! Market Context
//!
//! Broad-index return and volatility-index change over the same windows as
//! the security evaluation, measured from the open on the action date:
//!
//! - `index_month_return         = (close_idx[month_check]    - open_idx[action]) / open_idx[action]`
//! - `index_two_week_return      = (close_idx[two_week_check] - open_idx[action]) / open_idx[action]`
//! - `volatility_*_change` likewise on the volatility series
//!
//! Both reference series are loaded once per run into a [`MarketReference`]
//! and shared read-only by every record evaluation.

use crate::config::{DateAlignment, EnrichConfig, VolatilityWindow};
use crate::outcome::Evaluation;
use crate::record::TransactionRecord;
use crate::security::{bar_on, entry_open, period_return};
use chrono::NaiveDate;
use form4_data::{PriceHistory, SecurityDataProvider};
use serde::Serialize;

/// The two reference series of a run.
#[derive(Debug, Clone)]
pub struct MarketReference {
    index: PriceHistory,
    volatility: PriceHistory,
}

impl MarketReference {
    /// Bundle already fetched reference series.
    pub const fn new(index: PriceHistory, volatility: PriceHistory) -> Self {
        Self { index, volatility }
    }

    /// Fetch both reference series named by `config`.
    pub async fn load<P: SecurityDataProvider>(
        provider: &P,
        config: &EnrichConfig,
    ) -> form4_data::Result<Self> {
        let index = provider.history(&config.index_symbol).await?;
        let volatility = provider.history(&config.volatility_symbol).await?;
        Ok(Self::new(index, volatility))
    }

    /// Broad market index series.
    pub const fn index(&self) -> &PriceHistory {
        &self.index
    }

    /// Volatility index series.
    pub const fn volatility(&self) -> &PriceHistory {
        &self.volatility
    }
}

/// Dates one market evaluation is measured over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarketWindow {
    /// Entry date (open price)
    pub action_date: NaiveDate,
    /// Close date of the 1-month figures
    pub month_check: NaiveDate,
    /// Close date of the 2-week figures
    pub two_week_check: NaiveDate,
}

impl From<&TransactionRecord> for MarketWindow {
    fn from(record: &TransactionRecord) -> Self {
        Self {
            action_date: record.action_date,
            month_check: record.performance_check_month,
            two_week_check: record.performance_check_2_weeks,
        }
    }
}

/// Derived market features for one record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MarketContext {
    /// 1-month index return
    pub index_month_return: f64,
    /// 2-week index return
    pub index_two_week_return: f64,
    /// 1-month volatility-index change
    pub volatility_month_change: f64,
    /// 2-week volatility-index change
    pub volatility_two_week_change: f64,
}

/// Evaluates [`MarketContext`] against a [`MarketReference`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarketEvaluator {
    alignment: DateAlignment,
    volatility_window: VolatilityWindow,
}

impl MarketEvaluator {
    /// Create an evaluator.
    pub const fn new(alignment: DateAlignment, volatility_window: VolatilityWindow) -> Self {
        Self {
            alignment,
            volatility_window,
        }
    }

    /// Create an evaluator from a run configuration.
    pub const fn from_config(config: &EnrichConfig) -> Self {
        Self::new(config.date_alignment, config.volatility_window)
    }

    /// Evaluate one record's window. Any lookup miss on either series makes
    /// all four figures unavailable.
    pub fn evaluate(
        &self,
        reference: &MarketReference,
        window: MarketWindow,
    ) -> Evaluation<MarketContext> {
        let (index_month_return, index_two_week_return) =
            self.window_returns(reference.index(), window)?;
        let (volatility_month, volatility_two_week) =
            self.window_returns(reference.volatility(), window)?;

        let (volatility_month_change, volatility_two_week_change) = match self.volatility_window {
            VolatilityWindow::Matched => (volatility_month, volatility_two_week),
            VolatilityWindow::Legacy => (volatility_two_week, volatility_two_week),
        };

        Ok(MarketContext {
            index_month_return,
            index_two_week_return,
            volatility_month_change,
            volatility_two_week_change,
        })
    }

    fn window_returns(&self, series: &PriceHistory, window: MarketWindow) -> Evaluation<(f64, f64)> {
        let action = self.alignment.resolve(series, window.action_date)?;
        let month = self.alignment.resolve(series, window.month_check)?;
        let two_week = self.alignment.resolve(series, window.two_week_check)?;

        let entry = entry_open(series, action)?;
        let month_close = bar_on(series, month)?.close;
        let two_week_close = bar_on(series, two_week)?.close;

        Ok((
            period_return(entry, month_close),
            period_return(entry, two_week_close),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::Unavailable;
    use approx::assert_relative_eq;
    use form4_data::{Bar, StaticProvider};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 1, d).unwrap()
    }

    /// Open 100 on the 10th, closes of 105 on the 17th and 110 on the 24th.
    fn index() -> PriceHistory {
        PriceHistory::from_bars(
            "^GSPC",
            vec![
                Bar::new(day(10), 100.0, 101.0, 99.0, 100.5),
                Bar::new(day(17), 104.0, 106.0, 103.0, 105.0),
                Bar::new(day(24), 109.0, 111.0, 108.0, 110.0),
            ],
        )
        .unwrap()
    }

    /// Open 20 on the 10th, closes of 25 on the 17th and 15 on the 24th.
    fn volatility() -> PriceHistory {
        PriceHistory::from_bars(
            "^VIX",
            vec![
                Bar::new(day(10), 20.0, 21.0, 19.0, 20.5),
                Bar::new(day(17), 24.0, 26.0, 23.0, 25.0),
                Bar::new(day(24), 16.0, 17.0, 14.0, 15.0),
            ],
        )
        .unwrap()
    }

    fn window() -> MarketWindow {
        MarketWindow {
            action_date: day(10),
            month_check: day(24),
            two_week_check: day(17),
        }
    }

    #[test]
    fn test_matched_windows() {
        let reference = MarketReference::new(index(), volatility());
        let evaluator = MarketEvaluator::new(DateAlignment::Exact, VolatilityWindow::Matched);
        let context = evaluator.evaluate(&reference, window()).unwrap();

        assert_relative_eq!(context.index_month_return, 0.10, epsilon = 1e-12);
        assert_relative_eq!(context.index_two_week_return, 0.05, epsilon = 1e-12);
        assert_relative_eq!(context.volatility_month_change, -0.25, epsilon = 1e-12);
        assert_relative_eq!(context.volatility_two_week_change, 0.25, epsilon = 1e-12);
    }

    #[test]
    fn test_legacy_volatility_window() {
        let reference = MarketReference::new(index(), volatility());
        let evaluator = MarketEvaluator::new(DateAlignment::Exact, VolatilityWindow::Legacy);
        let context = evaluator.evaluate(&reference, window()).unwrap();

        assert_relative_eq!(context.index_month_return, 0.10, epsilon = 1e-12);
        assert_relative_eq!(context.volatility_month_change, 0.25, epsilon = 1e-12);
        assert_relative_eq!(context.volatility_two_week_change, 0.25, epsilon = 1e-12);
    }

    #[test]
    fn test_missing_date_is_all_or_nothing() {
        // The volatility series lacks the 2-week close, so the index figures
        // are dropped as well
        let sparse_vix = PriceHistory::from_bars(
            "^VIX",
            vec![
                Bar::new(day(10), 20.0, 21.0, 19.0, 20.5),
                Bar::new(day(24), 16.0, 17.0, 14.0, 15.0),
            ],
        )
        .unwrap();
        let reference = MarketReference::new(index(), sparse_vix);

        let exact = MarketEvaluator::new(DateAlignment::Exact, VolatilityWindow::Matched);
        assert!(matches!(
            exact.evaluate(&reference, window()),
            Err(Unavailable::DateNotFound { .. })
        ));

        // Nearest earlier trading day for the 17th is the 10th
        let aligned = MarketEvaluator::new(DateAlignment::NearestEarlier, VolatilityWindow::Matched);
        let context = aligned.evaluate(&reference, window()).unwrap();
        assert_relative_eq!(context.volatility_two_week_change, 0.025, epsilon = 1e-12);
    }

    #[tokio::test]
    async fn test_load_reference() {
        let provider = StaticProvider::new()
            .with_history(index())
            .with_history(volatility());
        let reference = MarketReference::load(&provider, &EnrichConfig::default())
            .await
            .unwrap();
        assert_eq!(reference.index().symbol(), "^GSPC");
        assert_eq!(reference.volatility().symbol(), "^VIX");

        let empty = StaticProvider::new().with_history(index());
        assert!(
            MarketReference::load(&empty, &EnrichConfig::default())
                .await
                .is_err()
        );
    }
}
