//! Related-transaction counting.
//!
//! For each record, counts the other filings on the same ticker whose filing
//! date falls in the record's trailing window
//! `[filing_check_month, filing_date]`, and the days elapsed since the latest
//! of them. The table is indexed by ticker once, so each lookup is a binary
//! search over one ticker's filings instead of a scan of the whole table.

use crate::record::TransactionRecord;
use chrono::NaiveDate;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashMap;

/// Count and recency of related filings for one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RelatedTransactions {
    /// Number of other filings in the trailing window
    pub count: usize,
    /// Days from the latest related filing to this record's filing, `-1` when
    /// there is none
    pub days_since_last: i64,
}

impl RelatedTransactions {
    /// No related filing in the window.
    pub const NONE: Self = Self {
        count: 0,
        days_since_last: -1,
    };

    /// Whether any related filing was found.
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Filings grouped by ticker, each group sorted by filing date then row.
#[derive(Debug, Clone, Default)]
pub struct RelatedTransactionIndex {
    by_ticker: HashMap<String, Vec<(NaiveDate, usize)>>,
}

impl RelatedTransactionIndex {
    /// Index every record of the table.
    pub fn build(records: &[TransactionRecord]) -> Self {
        let mut by_ticker: HashMap<String, Vec<(NaiveDate, usize)>> = HashMap::new();
        for record in records {
            by_ticker
                .entry(record.ticker.clone())
                .or_default()
                .push((record.filing_date, record.row));
        }
        for filings in by_ticker.values_mut() {
            filings.sort_unstable();
        }
        Self { by_ticker }
    }

    /// Number of distinct tickers indexed.
    pub fn ticker_count(&self) -> usize {
        self.by_ticker.len()
    }

    /// Related filings for `ticker` in `[window_start, filing_date]`,
    /// excluding the filing identified by `row`.
    pub fn lookup(
        &self,
        ticker: &str,
        row: usize,
        window_start: NaiveDate,
        filing_date: NaiveDate,
    ) -> RelatedTransactions {
        let Some(filings) = self.by_ticker.get(ticker) else {
            return RelatedTransactions::NONE;
        };
        if window_start > filing_date {
            return RelatedTransactions::NONE;
        }

        let lo = filings.partition_point(|(date, _)| *date < window_start);
        let hi = filings.partition_point(|(date, _)| *date <= filing_date);
        let mut matches = filings[lo..hi].iter().filter(|(_, r)| *r != row);

        // Sorted ascending, so the last match carries the latest filing date
        let Some(first) = matches.next() else {
            return RelatedTransactions::NONE;
        };
        let (count, latest) = matches.fold((1, first.0), |(n, _), (date, _)| (n + 1, *date));

        RelatedTransactions {
            count,
            days_since_last: (filing_date - latest).num_days(),
        }
    }

    /// [`lookup`](Self::lookup) with the record's own identity and window.
    pub fn lookup_record(&self, record: &TransactionRecord) -> RelatedTransactions {
        self.lookup(
            &record.ticker,
            record.row,
            record.filing_check_month,
            record.filing_date,
        )
    }

    /// Evaluate every record in parallel; output is aligned with `records`.
    pub fn evaluate_all(&self, records: &[TransactionRecord]) -> Vec<RelatedTransactions> {
        records
            .par_iter()
            .map(|record| self.lookup_record(record))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 3, d).unwrap()
    }

    fn record(row: usize, ticker: &str, filing: NaiveDate, lookback_days: u64) -> TransactionRecord {
        TransactionRecord {
            row,
            ticker: ticker.to_string(),
            filing_date: filing,
            trade_date: filing,
            action_date: filing,
            filing_check_month: filing - chrono::Days::new(lookback_days),
            performance_check_month: filing,
            performance_check_2_weeks: filing,
            classification_check_month: filing,
        }
    }

    fn three_filings() -> Vec<TransactionRecord> {
        vec![
            record(0, "ACME", day(1), 14),
            record(1, "ACME", day(6), 14),
            record(2, "ACME", day(11), 14),
        ]
    }

    #[test]
    fn test_counts_in_trailing_window() {
        let records = three_filings();
        let index = RelatedTransactionIndex::build(&records);
        let related = index.evaluate_all(&records);

        let counts: Vec<usize> = related.iter().map(|r| r.count).collect();
        assert_eq!(counts, vec![0, 1, 2]);
        assert_eq!(related[0], RelatedTransactions::NONE);
        assert_eq!(related[1].days_since_last, 5);
        assert_eq!(related[2].days_since_last, 5);
    }

    #[test]
    fn test_input_order_does_not_matter() {
        let mut records = three_filings();
        records.reverse();
        let index = RelatedTransactionIndex::build(&records);

        for record in &records {
            let related = index.lookup_record(record);
            assert_eq!(related.count, record.row);
        }
    }

    #[rstest]
    #[case(day(10), day(20), 1, 10)]
    #[case(day(11), day(20), 0, -1)]
    #[case(day(1), day(9), 0, -1)]
    #[case(day(20), day(10), 0, -1)]
    fn test_window_bounds(
        #[case] start: NaiveDate,
        #[case] filing: NaiveDate,
        #[case] count: usize,
        #[case] days: i64,
    ) {
        let records = vec![record(0, "ACME", day(10), 0)];
        let index = RelatedTransactionIndex::build(&records);
        let related = index.lookup("ACME", 99, start, filing);
        assert_eq!(related.count, count);
        assert_eq!(related.days_since_last, days);
    }

    #[test]
    fn test_recency_uses_latest_filing() {
        let records = vec![
            record(0, "ACME", day(8), 14),
            record(1, "ACME", day(2), 14),
            record(2, "ACME", day(5), 14),
            record(3, "ACME", day(10), 14),
        ];
        let index = RelatedTransactionIndex::build(&records);
        let related = index.lookup_record(&records[3]);
        assert_eq!(related.count, 3);
        assert_eq!(related.days_since_last, 2);
    }

    #[test]
    fn test_same_day_filings_count_each_other() {
        let records = vec![record(0, "ACME", day(10), 14), record(1, "ACME", day(10), 14)];
        let index = RelatedTransactionIndex::build(&records);
        let related = index.evaluate_all(&records);
        assert_eq!(
            related,
            vec![
                RelatedTransactions {
                    count: 1,
                    days_since_last: 0
                };
                2
            ]
        );
    }

    #[test]
    fn test_tickers_are_isolated() {
        let records = vec![
            record(0, "ACME", day(5), 14),
            record(1, "BOLT", day(6), 14),
            record(2, "ACME", day(7), 14),
        ];
        let index = RelatedTransactionIndex::build(&records);
        assert_eq!(index.ticker_count(), 2);
        assert!(index.lookup_record(&records[1]).is_empty());
        assert_eq!(index.lookup_record(&records[2]).count, 1);
        assert_eq!(index.lookup("ZZZZ", 0, day(1), day(30)), RelatedTransactions::NONE);
    }
}
