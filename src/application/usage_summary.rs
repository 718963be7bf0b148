//! GetUsageSummaryHandler - read model for billing dashboards.

use std::sync::Arc;

use crate::domain::foundation::PeriodId;
use crate::ports::{LedgerError, UsageLedger, UsageSummaryView};

/// Query for a period's consumption summary.
#[derive(Debug, Clone)]
pub struct GetUsageSummaryQuery {
    pub period_id: PeriodId,
}

/// Handler answering usage summary queries from the ledger.
pub struct GetUsageSummaryHandler {
    ledger: Arc<dyn UsageLedger>,
}

impl GetUsageSummaryHandler {
    pub fn new(ledger: Arc<dyn UsageLedger>) -> Self {
        Self { ledger }
    }

    pub async fn handle(
        &self,
        query: GetUsageSummaryQuery,
    ) -> Result<UsageSummaryView, LedgerError> {
        self.ledger.summary(query.period_id).await
    }
}
