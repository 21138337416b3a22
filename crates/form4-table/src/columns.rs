//! Column names of the transaction table.
//!
//! Header names are part of the downstream contract and must match exactly.

/// Traded security
pub const TICKER: &str = "Ticker";
/// Disclosure date
pub const FILING_DATE: &str = "Filing Date";
/// Execution date
pub const TRADE_DATE: &str = "Trade Date";
/// Date performance windows start from
pub const ACTION_DATE: &str = "Action Date";
/// Start of the related-filing window
pub const FILING_CHECK_MONTH: &str = "filing_check_month";
/// 1-month evaluation date
pub const PERFORMANCE_CHECK_MONTH: &str = "performance_check_month";
/// 2-week evaluation date
pub const PERFORMANCE_CHECK_2_WEEKS: &str = "performance_check_2_weeks";
/// End of the classification window
pub const CLASSIFICATION_CHECK_MONTH: &str = "classification_check_month";

/// Input columns every table must carry.
pub const REQUIRED_COLUMNS: [&str; 8] = [
    TICKER,
    FILING_DATE,
    TRADE_DATE,
    ACTION_DATE,
    FILING_CHECK_MONTH,
    PERFORMANCE_CHECK_MONTH,
    PERFORMANCE_CHECK_2_WEEKS,
    CLASSIFICATION_CHECK_MONTH,
];

/// Days between trade and filing, computed upstream
pub const FILING_LAG: &str = "Difference btw. filing and trade date";
/// Declared transaction value
pub const VALUE: &str = "Value";
/// Change in ownership
pub const DELTA_OWN: &str = "Delta Own Conv.";

/// Sector label
pub const SECTOR: &str = "Sector";
/// 1-month own-security return
pub const MONTH_PERFORMANCE: &str = "One Month Prior Performance";
/// 2-week own-security return
pub const TWO_WEEK_PERFORMANCE: &str = "2-Week Prior Performance";
/// Return at the midpoint quantile exit
pub const MID_EXIT_RETURN: &str =
    "Return if exited at the 75th percentile midpoint of daily price action";
/// Return at the open quantile exit
pub const OPEN_EXIT_RETURN: &str = "Return if exited at the 75th percentile open of daily price action";
/// Holding period of the midpoint exit
pub const DAYS_TO_MID_EXIT: &str = "Days to midpoint exit";
/// Holding period of the open exit
pub const DAYS_TO_OPEN_EXIT: &str = "Days to open exit";
/// 1-month index return
pub const MONTH_MARKET_PERFORMANCE: &str = "One Month Prior Market Performance";
/// 2-week index return
pub const TWO_WEEK_INDEX_PERFORMANCE: &str = "2-Week Prior Index Performance";
/// 1-month volatility-index change
pub const MONTH_VOLATILITY_CHANGE: &str = "One Month Prior Volatility Change";
/// 2-week volatility-index change
pub const TWO_WEEK_VOLATILITY_CHANGE: &str = "2-Week Prior Volatility Change";
/// Related filings in the trailing window
pub const RECENT_TRANSACTIONS: &str = "Number of Recent Transactions";
/// Days since the latest related filing
pub const DAYS_SINCE_LAST_TRANSACTION: &str = "Days Since Last Recent Transaction";

/// Derived columns, in output order.
pub const FEATURE_COLUMNS: [&str; 13] = [
    SECTOR,
    MONTH_PERFORMANCE,
    TWO_WEEK_PERFORMANCE,
    MID_EXIT_RETURN,
    OPEN_EXIT_RETURN,
    DAYS_TO_MID_EXIT,
    DAYS_TO_OPEN_EXIT,
    MONTH_MARKET_PERFORMANCE,
    TWO_WEEK_INDEX_PERFORMANCE,
    MONTH_VOLATILITY_CHANGE,
    TWO_WEEK_VOLATILITY_CHANGE,
    RECENT_TRANSACTIONS,
    DAYS_SINCE_LAST_TRANSACTION,
];
