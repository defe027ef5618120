mod engine;
mod error;
mod report;
mod types;

pub use engine::{deflate, monthly_rate, simulate, summarize};
pub use error::{Result, SimError};
pub use report::{
    Breakdown, DisplayUnit, SummaryRow, balance_series, breakdown, convert, format_amount,
    render_summary_table, summary_rows,
};
pub use types::{
    CompoundingOrder, ContributionMode, Ledger, MAX_AMOUNT, MAX_HORIZON_MONTHS, MonthlyRecord,
    SimulationOutcome, SimulationParameters, SummaryAggregates,
};
