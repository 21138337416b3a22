//! Trading-day alignment.

use crate::config::DateAlignment;
use crate::outcome::{Evaluation, Unavailable};
use chrono::NaiveDate;
use form4_data::PriceHistory;
use tracing::debug;

/// Latest date in `dates` strictly before `pivot`.
///
/// `dates` need not be sorted. Returns `None` when `dates` is empty or no
/// element precedes `pivot`; that is an expected outcome and is only logged.
pub fn nearest_earlier<'a, I>(dates: I, pivot: NaiveDate) -> Option<NaiveDate>
where
    I: IntoIterator<Item = &'a NaiveDate>,
{
    let near = dates.into_iter().copied().filter(|date| *date < pivot).max();
    if near.is_none() {
        debug!(%pivot, "no date earlier than pivot");
    }
    near
}

/// `pivot` itself if it is one of `dates`, otherwise [`nearest_earlier`].
pub fn align_to_trading_day(dates: &[NaiveDate], pivot: NaiveDate) -> Option<NaiveDate> {
    if dates.contains(&pivot) {
        Some(pivot)
    } else {
        nearest_earlier(dates, pivot)
    }
}

impl DateAlignment {
    /// Map `date` onto a trading day of `history` under this policy.
    pub fn resolve(self, history: &PriceHistory, date: NaiveDate) -> Evaluation<NaiveDate> {
        match self {
            Self::Exact if history.contains(date) => Ok(date),
            Self::Exact => Err(Unavailable::DateNotFound {
                symbol: history.symbol().to_string(),
                date,
            }),
            Self::NearestEarlier => align_to_trading_day(history.trading_dates(), date)
                .ok_or_else(|| Unavailable::NoEarlierTradingDay {
                    symbol: history.symbol().to_string(),
                    date,
                }),
        }
    }
}
