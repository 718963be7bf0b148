//! PostgreSQL adapters for the billing collaborator and the usage ledger.

mod period_reader;
mod usage_ledger;

pub use period_reader::PostgresPeriodReader;
pub use usage_ledger::PostgresUsageLedger;
