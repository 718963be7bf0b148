//! Ports - interfaces between the application core and the outside world.

mod period_reader;
mod score_provider;
mod usage_ledger;

pub use period_reader::{PeriodReadError, PeriodReader};
pub use score_provider::{
    ScorePayload, ScoreProvider, ScoreProviderError, ScoreRequest, ScoreResult,
};
pub use usage_ledger::{ChargeRequest, LedgerError, UsageLedger, UsageSummaryView};
