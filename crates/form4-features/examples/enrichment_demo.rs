//! Demonstration of the enrichment driver over an in-memory provider.

use chrono::{Datelike, Days, NaiveDate, Weekday};
use form4_features::data::{Bar, PriceHistory, StaticProvider};
use form4_features::{EnrichConfig, EnrichSummary, Enricher, TransactionRecord};

fn trading_days(start: NaiveDate, n: usize) -> Vec<NaiveDate> {
    start
        .iter_days()
        .filter(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
        .take(n)
        .collect()
}

/// A series drifting by `step` per day with a fixed 2% range.
fn series(symbol: &str, dates: &[NaiveDate], start: f64, step: f64) -> PriceHistory {
    let bars = dates
        .iter()
        .enumerate()
        .map(|(i, d)| {
            let open = start + step * i as f64;
            Bar::new(*d, open, open * 1.01, open * 0.99, open + step * 0.5)
        })
        .collect();
    PriceHistory::from_bars(symbol, bars).expect("non-empty series")
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== form4 Enrichment Demo ===\n");

    let dates = trading_days(NaiveDate::from_ymd_opt(2023, 1, 3).unwrap(), 80);
    let provider = StaticProvider::new()
        .with_history(series("ACME", &dates, 25.0, 0.15))
        .with_history(series("BOLT", &dates, 60.0, -0.2))
        .with_history(series("^GSPC", &dates, 3850.0, 4.0))
        .with_history(series("^VIX", &dates, 22.0, -0.05))
        .with_sector("ACME", "Industrials")
        .with_sector("BOLT", "Energy");

    // Filings a week apart; windows measured in trading days from the action date
    let records: Vec<TransactionRecord> = [("ACME", 5), ("BOLT", 8), ("ACME", 10), ("CRUX", 12)]
        .into_iter()
        .enumerate()
        .map(|(row, (ticker, at))| TransactionRecord {
            row,
            ticker: ticker.to_string(),
            filing_date: dates[at],
            trade_date: dates[at - 2],
            action_date: dates[at],
            filing_check_month: dates[at] - Days::new(30),
            performance_check_month: dates[at + 21],
            performance_check_2_weeks: dates[at + 10],
            classification_check_month: dates[at + 42],
        })
        .collect();

    let enricher = Enricher::new(provider, EnrichConfig::default())?;
    let features = enricher.enrich(&records, None).await;

    for (record, feature) in records.iter().zip(&features) {
        println!("{} filed {}", record.ticker, record.filing_date);
        println!("  Sector:  {}", feature.sector.as_deref().unwrap_or("-"));
        match &feature.security {
            Ok(perf) => println!(
                "  Month:   {:>7.2}%   open exit {:>7.2}% after {} days",
                perf.month_performance * 100.0,
                perf.open_exit_return * 100.0,
                perf.days_to_open_exit
            ),
            Err(reason) => println!("  Security unavailable: {}", reason),
        }
        match &feature.market {
            Ok(market) => println!(
                "  Index:   {:>7.2}%   volatility {:>7.2}%",
                market.index_month_return * 100.0,
                market.volatility_month_change * 100.0
            ),
            Err(reason) => println!("  Market unavailable: {}", reason),
        }
        println!(
            "  Related: {} (last {} days ago)\n",
            feature.related.count, feature.related.days_since_last
        );
    }

    println!("{}", EnrichSummary::from_features(&features));
    Ok(())
}
