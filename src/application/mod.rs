//! Application layer: the metering pipeline and its components.

mod gateway;
mod quota_gate;
mod ticket_pool;
mod usage_summary;

pub use gateway::{RetryPolicy, ScoreCommand, ScoreReceipt, ScoringGateway};
pub use quota_gate::QuotaGate;
pub use ticket_pool::{AcquireError, Ticket, TicketPool};
pub use usage_summary::{GetUsageSummaryHandler, GetUsageSummaryQuery};
