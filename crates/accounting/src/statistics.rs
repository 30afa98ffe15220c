use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::entry::{EntryStatus, EntryType, JournalEntry};
use crate::error::LedgerError;

/// Journal activity summary over live (non-discarded) entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JournalStatistics {
    pub total_entries: usize,
    pub draft: usize,
    pub posted: usize,
    pub reversed: usize,
    pub by_type: BTreeMap<EntryType, usize>,
    pub by_source: BTreeMap<String, usize>,
    /// Sums over entries currently in `posted` status.
    pub total_posted_debit: Decimal,
    pub total_posted_credit: Decimal,
}

impl JournalStatistics {
    pub fn from_entries<'a>(
        entries: impl IntoIterator<Item = &'a JournalEntry>,
    ) -> Result<Self, LedgerError> {
        let mut stats = Self::default();
        for entry in entries.into_iter().filter(|e| e.is_live()) {
            stats.total_entries += 1;
            match entry.status() {
                EntryStatus::Draft => stats.draft += 1,
                EntryStatus::Posted => {
                    stats.posted += 1;
                    let (debit, credit) = entry.totals()?;
                    stats.total_posted_debit = stats
                        .total_posted_debit
                        .checked_add(debit)
                        .ok_or(LedgerError::TotalOutOfRange {
                            total: "total posted debit",
                        })?;
                    stats.total_posted_credit = stats
                        .total_posted_credit
                        .checked_add(credit)
                        .ok_or(LedgerError::TotalOutOfRange {
                            total: "total posted credit",
                        })?;
                }
                EntryStatus::Reversed => stats.reversed += 1,
            }
            *stats.by_type.entry(entry.entry_type()).or_default() += 1;
            let source = if entry.source().is_empty() {
                "unspecified"
            } else {
                entry.source()
            };
            *stats.by_source.entry(source.to_string()).or_default() += 1;
        }
        Ok(stats)
    }
}
