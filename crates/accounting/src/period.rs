use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Which business dates still accept postings.
///
/// Closing a period is owned elsewhere; the ledger only needs the boundary.
/// Every date on or before `closed_through` is closed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountingPeriods {
    closed_through: Option<NaiveDate>,
}

impl AccountingPeriods {
    pub fn all_open() -> Self {
        Self::default()
    }

    pub fn closed_through(date: NaiveDate) -> Self {
        Self {
            closed_through: Some(date),
        }
    }

    pub fn closed_through_date(&self) -> Option<NaiveDate> {
        self.closed_through
    }

    pub fn is_closed(&self, date: NaiveDate) -> bool {
        self.closed_through.is_some_and(|boundary| date <= boundary)
    }

    pub fn check(&self, date: NaiveDate) -> Result<(), ValidationError> {
        match self.closed_through {
            Some(closed_through) if date <= closed_through => {
                Err(ValidationError::PeriodClosed {
                    date,
                    closed_through,
                })
            }
            _ => Ok(()),
        }
    }
}
