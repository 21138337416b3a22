//! Enrichment driver.
//!
//! Runs the evaluators over every record of a table in three phases, each
//! fully drained before the next begins:
//!
//! 1. [`Phase::Sector`]: sector lookups, bounded by `concurrency`
//! 2. [`Phase::History`]: one task per ticker, with the same bound, that
//!    fetches the history and evaluates that ticker's records
//! 3. [`Phase::Related`]: related-transaction counts on the rayon pool
//!
//! The two reference series are loaded once before the first phase. Tasks
//! complete in any order; every result is re-associated with its record
//! before it is returned. A failed record degrades to unavailable values and
//! never aborts the run.

use crate::config::{ConfigError, EnrichConfig};
use crate::market::{MarketContext, MarketEvaluator, MarketReference, MarketWindow};
use crate::outcome::{Evaluation, Unavailable};
use crate::record::TransactionRecord;
use crate::related::{RelatedTransactionIndex, RelatedTransactions};
use crate::security::{SecurityEvaluator, SecurityPerformance, SecurityWindow};
use form4_data::SecurityDataProvider;
use futures::stream::{self, StreamExt};
use indicatif::ProgressBar;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::future::Future;
use thiserror::Error;
use tracing::{info, warn};

/// Errors that prevent a run from starting.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The run configuration is invalid
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

/// Enrichment phases, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Sector lookup
    Sector,
    /// Security and market performance
    History,
    /// Related-transaction counting
    Related,
}

impl Phase {
    /// Progress label.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Sector => "Looking up sectors",
            Self::History => "Evaluating performance",
            Self::Related => "Counting related filings",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sector => write!(f, "sector"),
            Self::History => write!(f, "history"),
            Self::Related => write!(f, "related"),
        }
    }
}

/// Every derived feature of one record.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordFeatures {
    /// Row of the originating record
    pub row: usize,
    /// Sector label, `None` when unknown or the lookup failed
    pub sector: Option<String>,
    /// Own-security performance
    pub security: Evaluation<SecurityPerformance>,
    /// Market context
    pub market: Evaluation<MarketContext>,
    /// Related filings in the trailing window
    pub related: RelatedTransactions,
}

/// Outcome counts of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EnrichSummary {
    /// Records enriched
    pub records: usize,
    /// Records with a known sector
    pub sectors_found: usize,
    /// Records with security performance
    pub security_evaluated: usize,
    /// Records with market context
    pub market_evaluated: usize,
    /// Records with at least one related filing
    pub with_related_activity: usize,
    /// Unavailable evaluations keyed by `<evaluator>.<reason>`
    pub unavailable: BTreeMap<String, usize>,
}

impl EnrichSummary {
    /// Tally a run's features.
    pub fn from_features(features: &[RecordFeatures]) -> Self {
        let mut summary = Self {
            records: features.len(),
            ..Self::default()
        };
        for record in features {
            if record.sector.is_some() {
                summary.sectors_found += 1;
            }
            match &record.security {
                Ok(_) => summary.security_evaluated += 1,
                Err(reason) => summary.count_unavailable("security", reason),
            }
            match &record.market {
                Ok(_) => summary.market_evaluated += 1,
                Err(reason) => summary.count_unavailable("market", reason),
            }
            if !record.related.is_empty() {
                summary.with_related_activity += 1;
            }
        }
        summary
    }

    fn count_unavailable(&mut self, evaluator: &str, reason: &Unavailable) {
        *self
            .unavailable
            .entry(format!("{}.{}", evaluator, reason.kind()))
            .or_insert(0) += 1;
    }
}

impl fmt::Display for EnrichSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Records:               {}", self.records)?;
        writeln!(f, "Sectors found:         {}", self.sectors_found)?;
        writeln!(f, "Security evaluated:    {}", self.security_evaluated)?;
        writeln!(f, "Market evaluated:      {}", self.market_evaluated)?;
        write!(f, "With related activity: {}", self.with_related_activity)?;
        for (reason, count) in &self.unavailable {
            write!(f, "\n  unavailable {:<32} {}", reason, count)?;
        }
        Ok(())
    }
}

/// Drives the evaluators over a transaction table.
#[derive(Debug)]
pub struct Enricher<P> {
    provider: P,
    config: EnrichConfig,
    security: SecurityEvaluator,
    market: MarketEvaluator,
}

impl<P: SecurityDataProvider> Enricher<P> {
    /// Create a driver over `provider`.
    ///
    /// # Errors
    /// Returns [`PipelineError::Config`] if `config` does not validate.
    pub fn new(provider: P, config: EnrichConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self {
            security: SecurityEvaluator::from_config(&config),
            market: MarketEvaluator::from_config(&config),
            provider,
            config,
        })
    }

    /// Run configuration.
    pub const fn config(&self) -> &EnrichConfig {
        &self.config
    }

    /// Underlying data provider.
    pub const fn provider(&self) -> &P {
        &self.provider
    }

    /// Enrich every record; the output is aligned with `records`.
    pub async fn enrich(
        &self,
        records: &[TransactionRecord],
        progress: Option<&ProgressBar>,
    ) -> Vec<RecordFeatures> {
        info!(
            records = records.len(),
            concurrency = self.config.concurrency,
            "starting enrichment"
        );

        let reference = self.load_reference().await;
        let sectors = self.collect_sectors(records, progress).await;
        let performance = self.evaluate_histories(records, reference.as_ref(), progress).await;
        let related = self.count_related(records, progress);

        records
            .iter()
            .zip(sectors)
            .zip(performance)
            .zip(related)
            .map(|(((record, sector), (security, market)), related)| RecordFeatures {
                row: record.row,
                sector,
                security,
                market,
                related,
            })
            .collect()
    }

    /// Fetch the two reference series of the run.
    pub async fn load_reference(&self) -> Evaluation<MarketReference> {
        MarketReference::load(&self.provider, &self.config)
            .await
            .map_err(|e| {
                warn!(error = %e, "reference series unavailable, market context disabled");
                Unavailable::ReferenceSeries {
                    reason: e.to_string(),
                }
            })
    }

    /// Sector label per record.
    pub async fn collect_sectors(
        &self,
        records: &[TransactionRecord],
        progress: Option<&ProgressBar>,
    ) -> Vec<Option<String>> {
        let tickers = unique_tickers(records);
        start_phase(Phase::Sector, tickers.len(), progress);

        let answers = run_bounded(&tickers, self.config.concurrency, progress, |ticker| async move {
            match self.provider.sector(ticker).await {
                Ok(sector) => sector,
                Err(e) => {
                    warn!(%ticker, error = %e, "sector lookup failed");
                    None
                }
            }
        })
        .await;

        let by_ticker: HashMap<&str, Option<String>> = tickers
            .iter()
            .map(String::as_str)
            .zip(answers)
            .collect();
        records
            .iter()
            .map(|record| by_ticker.get(record.ticker.as_str()).cloned().flatten())
            .collect()
    }

    /// Security performance and market context per record.
    ///
    /// Records are grouped by ticker and each group is one bounded task: the
    /// task fetches the ticker's history, evaluates every record of the group
    /// against it and drops it before returning.
    pub async fn evaluate_histories(
        &self,
        records: &[TransactionRecord],
        reference: Result<&MarketReference, &Unavailable>,
        progress: Option<&ProgressBar>,
    ) -> Vec<(Evaluation<SecurityPerformance>, Evaluation<MarketContext>)> {
        let groups = group_by_ticker(records);
        start_phase(Phase::History, groups.len(), progress);

        let outcomes = run_bounded(&groups, self.config.concurrency, progress, |(ticker, members)| {
            self.evaluate_group(ticker, members, records, reference)
        })
        .await;

        let mut slots: Vec<Option<HistoryOutcome>> = records.iter().map(|_| None).collect();
        for (position, outcome) in outcomes.into_iter().flatten() {
            slots[position] = Some(outcome);
        }
        slots
            .into_iter()
            .map(|slot| {
                slot.unwrap_or_else(|| {
                    let reason = Unavailable::computation("record was not evaluated");
                    (Err(reason.clone()), Err(reason))
                })
            })
            .collect()
    }

    /// Evaluate the records at `members` against one fetch of `ticker`.
    async fn evaluate_group(
        &self,
        ticker: &str,
        members: &[usize],
        records: &[TransactionRecord],
        reference: Result<&MarketReference, &Unavailable>,
    ) -> Vec<(usize, HistoryOutcome)> {
        let history = self.provider.history(ticker).await.map_err(|e| {
            warn!(%ticker, error = %e, "history unavailable");
            Unavailable::from_data_error(ticker, e)
        });

        members
            .iter()
            .map(|&position| {
                let record = &records[position];
                let security = match &history {
                    Ok(history) => self
                        .security
                        .evaluate_history(history, SecurityWindow::from(record)),
                    Err(reason) => Err(reason.clone()),
                };
                let market = reference
                    .map_err(Clone::clone)
                    .and_then(|reference| self.market.evaluate(reference, MarketWindow::from(record)));
                (position, (security, market))
            })
            .collect()
    }

    /// Related-transaction count and recency per record.
    pub fn count_related(
        &self,
        records: &[TransactionRecord],
        progress: Option<&ProgressBar>,
    ) -> Vec<RelatedTransactions> {
        start_phase(Phase::Related, records.len(), progress);
        let index = RelatedTransactionIndex::build(records);

        records
            .par_iter()
            .map(|record| {
                let related = index.lookup_record(record);
                if let Some(pb) = progress {
                    pb.inc(1);
                }
                related
            })
            .collect()
    }
}

/// Security and market outcome of one record.
type HistoryOutcome = (Evaluation<SecurityPerformance>, Evaluation<MarketContext>);

/// Distinct tickers in sorted order.
fn unique_tickers(records: &[TransactionRecord]) -> Vec<String> {
    let mut tickers: Vec<String> = records.iter().map(|r| r.ticker.clone()).collect();
    tickers.sort_unstable();
    tickers.dedup();
    tickers
}

/// Record positions per distinct ticker, tickers in sorted order.
fn group_by_ticker(records: &[TransactionRecord]) -> Vec<(&str, Vec<usize>)> {
    let mut groups: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (position, record) in records.iter().enumerate() {
        groups.entry(record.ticker.as_str()).or_default().push(position);
    }
    groups.into_iter().collect()
}

fn start_phase(phase: Phase, items: usize, progress: Option<&ProgressBar>) {
    info!(%phase, items, "phase started");
    if let Some(pb) = progress {
        pb.set_length(items as u64);
        pb.set_position(0);
        pb.set_message(phase.label());
    }
}

/// Run `task` over `items` with at most `concurrency` futures in flight.
///
/// Results come back in the order of `items` regardless of completion order.
async fn run_bounded<'a, T, F, Fut>(
    items: &'a [T],
    concurrency: usize,
    progress: Option<&ProgressBar>,
    task: F,
) -> Vec<Fut::Output>
where
    F: Fn(&'a T) -> Fut,
    Fut: Future,
{
    let mut results: Vec<(usize, Fut::Output)> = stream::iter(items.iter().enumerate())
        .map(|(i, item)| {
            let fut = task(item);
            async move { (i, fut.await) }
        })
        .buffer_unordered(concurrency.max(1))
        .inspect(|_| {
            if let Some(pb) = progress {
                pb.inc(1);
            }
        })
        .collect()
        .await;

    results.sort_unstable_by_key(|(i, _)| *i);
    results.into_iter().map(|(_, output)| output).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Days, NaiveDate, Weekday};
    use form4_data::{Bar, PriceHistory, StaticProvider};
    use std::time::Duration;

    fn weekdays(n: usize) -> Vec<NaiveDate> {
        NaiveDate::from_ymd_opt(2023, 1, 10)
            .unwrap()
            .iter_days()
            .filter(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
            .take(n)
            .collect()
    }

    fn flat(symbol: &str, price: f64) -> PriceHistory {
        let bars = weekdays(40)
            .into_iter()
            .map(|d| Bar::new(d, price, price + 1.0, price - 1.0, price))
            .collect();
        PriceHistory::from_bars(symbol, bars).unwrap()
    }

    fn record(row: usize, ticker: &str, offset: usize) -> TransactionRecord {
        let dates = weekdays(40);
        let action = dates[offset];
        TransactionRecord {
            row,
            ticker: ticker.to_string(),
            filing_date: action,
            trade_date: action - Days::new(2),
            action_date: action,
            filing_check_month: action - Days::new(30),
            performance_check_month: dates[offset + 20],
            performance_check_2_weeks: dates[offset + 10],
            classification_check_month: dates[offset + 20],
        }
    }

    fn provider() -> StaticProvider {
        StaticProvider::new()
            .with_history(flat("ACME", 50.0))
            .with_history(flat("BOLT", 20.0))
            .with_history(flat("^GSPC", 4000.0))
            .with_history(flat("^VIX", 18.0))
            .with_sector("ACME", "Industrials")
    }

    #[tokio::test]
    async fn test_features_follow_input_order() {
        let records = vec![
            record(0, "BOLT", 2),
            record(1, "ACME", 0),
            record(2, "ACME", 5),
            record(3, "BOLT", 1),
        ];
        let enricher = Enricher::new(provider(), EnrichConfig::default()).unwrap();
        let features = enricher.enrich(&records, None).await;

        let rows: Vec<usize> = features.iter().map(|f| f.row).collect();
        assert_eq!(rows, vec![0, 1, 2, 3]);
        assert_eq!(features[0].sector, None);
        assert_eq!(features[1].sector.as_deref(), Some("Industrials"));
        assert!(features.iter().all(|f| f.security.is_ok() && f.market.is_ok()));
        assert_eq!(features[2].related.count, 1);
        assert_eq!(features[0].related.count, 1);
    }

    #[tokio::test]
    async fn test_shared_ticker_results_keep_record_order() {
        let ramp = PriceHistory::from_bars(
            "BOLT",
            weekdays(40)
                .into_iter()
                .enumerate()
                .map(|(i, d)| {
                    let price = 20.0 + i as f64;
                    Bar::new(d, price, price + 1.0, price - 1.0, price + 0.5)
                })
                .collect(),
        )
        .unwrap();
        let provider = provider().with_history(ramp.clone()).with_failure("ACME");
        let records = vec![
            record(0, "BOLT", 7),
            record(1, "ACME", 0),
            record(2, "BOLT", 0),
            record(3, "BOLT", 4),
            record(4, "ACME", 2),
            record(5, "BOLT", 1),
        ];
        let config = EnrichConfig {
            concurrency: 1,
            ..EnrichConfig::default()
        };
        let enricher = Enricher::new(provider, config).unwrap();
        let features = enricher.enrich(&records, None).await;

        let evaluator = SecurityEvaluator::from_config(enricher.config());
        for (feature, record) in features.iter().zip(&records) {
            assert_eq!(feature.row, record.row);
            if record.ticker == "BOLT" {
                let expected = evaluator.evaluate_history(&ramp, SecurityWindow::from(record));
                assert_eq!(feature.security, expected);
                assert!(feature.security.is_ok());
            } else {
                assert!(matches!(feature.security, Err(Unavailable::Provider { .. })));
            }
            assert!(feature.market.is_ok());
        }
        assert_ne!(features[0].security, features[2].security);
        assert_eq!(enricher.provider().history_requests("BOLT"), 1);
    }

    #[test]
    fn test_group_by_ticker_keeps_positions() {
        let records = vec![record(0, "BOLT", 0), record(1, "ACME", 0), record(2, "BOLT", 1)];
        assert_eq!(
            group_by_ticker(&records),
            vec![("ACME", vec![1]), ("BOLT", vec![0, 2])]
        );
    }

    #[tokio::test]
    async fn test_histories_fetched_once_per_symbol() {
        let records: Vec<_> = (0..6).map(|row| record(row, "ACME", row)).collect();
        let enricher = Enricher::new(provider(), EnrichConfig::default()).unwrap();
        enricher.enrich(&records, None).await;

        assert_eq!(enricher.provider().history_requests("^GSPC"), 1);
        assert_eq!(enricher.provider().history_requests("^VIX"), 1);
        assert_eq!(enricher.provider().history_requests("ACME"), 1);
    }

    #[tokio::test]
    async fn test_failed_symbol_degrades_only_its_records() {
        let provider = provider().with_failure("BOLT");
        let records = vec![record(0, "BOLT", 0), record(1, "ACME", 0)];
        let enricher = Enricher::new(provider, EnrichConfig::default()).unwrap();
        let features = enricher.enrich(&records, None).await;

        assert!(matches!(features[0].security, Err(Unavailable::Provider { .. })));
        assert!(features[0].market.is_ok());
        assert_eq!(features[0].sector, None);
        assert!(features[1].security.is_ok());

        let summary = EnrichSummary::from_features(&features);
        assert_eq!(summary.security_evaluated, 1);
        assert_eq!(summary.unavailable.get("security.provider"), Some(&1));
    }

    #[tokio::test]
    async fn test_missing_reference_disables_market_context() {
        let provider = StaticProvider::new()
            .with_history(flat("ACME", 50.0))
            .with_history(flat("^GSPC", 4000.0));
        let records = vec![record(0, "ACME", 0), record(1, "ACME", 3)];
        let enricher = Enricher::new(provider, EnrichConfig::default()).unwrap();
        let features = enricher.enrich(&records, None).await;

        for f in &features {
            assert!(f.security.is_ok());
            assert!(matches!(f.market, Err(Unavailable::ReferenceSeries { .. })));
        }
        let summary = EnrichSummary::from_features(&features);
        assert_eq!(summary.market_evaluated, 0);
        assert_eq!(summary.unavailable.get("market.reference_series"), Some(&2));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = EnrichConfig {
            concurrency: 0,
            ..EnrichConfig::default()
        };
        assert!(matches!(
            Enricher::new(StaticProvider::new(), config),
            Err(PipelineError::Config(ConfigError::InvalidConcurrency))
        ));
    }

    #[tokio::test]
    async fn test_run_bounded_restores_submission_order() {
        let delays: Vec<u64> = vec![30, 5, 20, 0, 10, 25, 1];
        let outputs = run_bounded(&delays, 3, None, |delay| async move {
            tokio::time::sleep(Duration::from_millis(*delay)).await;
            *delay * 2
        })
        .await;
        assert_eq!(outputs, delays.iter().map(|d| d * 2).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_progress_reaches_item_count() {
        let records = vec![record(0, "ACME", 0), record(1, "BOLT", 0)];
        let enricher = Enricher::new(provider(), EnrichConfig::default()).unwrap();
        let pb = ProgressBar::hidden();
        enricher.enrich(&records, Some(&pb)).await;
        assert_eq!(pb.position(), 2);
        assert_eq!(pb.length(), Some(2));
    }

    #[test]
    fn test_summary_text() {
        let summary = EnrichSummary {
            records: 3,
            ..EnrichSummary::default()
        };
        assert!(summary.to_string().starts_with("Records:               3"));
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["records"], 3);
    }
}
