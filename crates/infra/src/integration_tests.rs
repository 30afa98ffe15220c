//! Integration tests for the full ledger pipeline.
//!
//! Tests: request -> GeneralLedger -> JournalStore -> registry -> EventBus
//!
//! Verifies:
//! - posting and reversal move cached balances and the projections together
//! - rejected requests leave every balance and entry untouched
//! - concurrent postings on shared accounts never lose an update
//! - committed events reach bus subscribers in log order

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use serde_json::Value as JsonValue;

    use forgeledger_accounting::{
        AccountSpec, AccountType, AccountingPeriods, DateRange, DraftEntry, DraftLine,
        DraftRevision, EntryFilter, EntryStatus, EntryType, LedgerError, Side,
        TrialBalanceOptions, ValidationError,
    };
    use forgeledger_core::{AccountId, EntryId};
    use forgeledger_events::{EventEnvelope, InMemoryEventBus};

    use crate::config::LedgerConfig;
    use crate::journal_store::{InMemoryJournalStore, JournalStore};
    use crate::ledger::{GeneralLedger, ServiceError};

    type TestLedger =
        GeneralLedger<Arc<InMemoryJournalStore>, Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>>;

    fn setup_with(config: LedgerConfig) -> (Arc<TestLedger>, Arc<InMemoryJournalStore>) {
        let store = Arc::new(InMemoryJournalStore::new());
        let bus = Arc::new(InMemoryEventBus::new());
        (
            Arc::new(GeneralLedger::new(store.clone(), bus, config)),
            store,
        )
    }

    fn setup() -> (Arc<TestLedger>, Arc<InMemoryJournalStore>) {
        setup_with(LedgerConfig::default())
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, d).unwrap()
    }

    fn account(ledger: &TestLedger, number: &str, name: &str, kind: AccountType) -> AccountId {
        ledger
            .create_account(AccountSpec::new(number, name, kind))
            .unwrap()
            .id_typed()
    }

    fn balance(ledger: &TestLedger, id: AccountId) -> Decimal {
        ledger.get_account(id).unwrap().current_balance()
    }

    fn sale(cash: AccountId, revenue: AccountId, amount: Decimal) -> DraftEntry {
        DraftEntry::new(day(1), "Cash sale")
            .reference("INV-2001")
            .source("sales")
            .entry_type(EntryType::Automatic)
            .line(DraftLine::debit(cash, amount))
            .line(DraftLine::credit(revenue, amount))
            .created_by("sales-service")
    }

    fn ledger_error(err: ServiceError) -> LedgerError {
        match err {
            ServiceError::Ledger(e) => e,
            other => panic!("expected a ledger error, got {other:?}"),
        }
    }

    #[test]
    fn cash_sale_posts_and_shows_in_trial_balance() {
        let (ledger, _) = setup();
        let cash = account(&ledger, "1000", "Cash", AccountType::Asset);
        let revenue = account(&ledger, "4000", "Revenue", AccountType::Revenue);

        let draft = ledger.submit_entry(sale(cash, revenue, dec!(1000))).unwrap();
        assert_eq!(draft.status(), EntryStatus::Draft);
        assert_eq!(balance(&ledger, cash), Decimal::ZERO);

        let posted = ledger.post_entry(draft.id_typed(), "controller").unwrap();
        assert_eq!(posted.status(), EntryStatus::Posted);
        assert_eq!(posted.posted_by(), Some("controller"));
        assert_eq!(balance(&ledger, cash), dec!(1000));
        assert_eq!(balance(&ledger, revenue), dec!(1000));

        let tb = ledger
            .trial_balance(day(30), TrialBalanceOptions::default())
            .unwrap();
        assert_eq!(tb.rows.len(), 2);
        assert_eq!(tb.rows[0].debit_balance, dec!(1000));
        assert_eq!(tb.rows[1].credit_balance, dec!(1000));
        assert!(tb.is_balanced());
    }

    #[test]
    fn reversal_restores_balances_and_preserves_lines() {
        let (ledger, _) = setup();
        let cash = account(&ledger, "1000", "Cash", AccountType::Asset);
        let revenue = account(&ledger, "4000", "Revenue", AccountType::Revenue);

        let entry = ledger.submit_entry(sale(cash, revenue, dec!(1000))).unwrap();
        let posted = ledger.post_entry(entry.id_typed(), "controller").unwrap();
        let reversed = ledger
            .reverse_entry(entry.id_typed(), "auditor", "duplicate invoice")
            .unwrap();

        assert_eq!(reversed.status(), EntryStatus::Reversed);
        assert_eq!(reversed.reversed_by(), Some("auditor"));
        assert_eq!(
            ledger.get_entry(entry.id_typed()).unwrap().reversal_reason(),
            Some("duplicate invoice")
        );
        assert_eq!(reversed.lines(), posted.lines());
        assert_eq!(reversed.totals(), Ok((dec!(1000), dec!(1000))));
        assert_eq!(balance(&ledger, cash), Decimal::ZERO);
        assert_eq!(balance(&ledger, revenue), Decimal::ZERO);
        assert!(ledger.reconcile().unwrap().is_empty());
    }

    #[test]
    fn reversal_without_a_reason_writes_nothing() {
        let (ledger, store) = setup();
        let cash = account(&ledger, "1000", "Cash", AccountType::Asset);
        let revenue = account(&ledger, "4000", "Revenue", AccountType::Revenue);
        let entry = ledger.submit_entry(sale(cash, revenue, dec!(60))).unwrap();
        ledger.post_entry(entry.id_typed(), "controller").unwrap();
        let logged = store.len();

        let err = ledger_error(
            ledger
                .reverse_entry(entry.id_typed(), "auditor", " ")
                .unwrap_err(),
        );

        assert_eq!(
            err,
            LedgerError::MissingReversalReason {
                entry_id: entry.id_typed()
            }
        );
        assert_eq!(store.len(), logged);
        assert_eq!(
            ledger.get_entry(entry.id_typed()).unwrap().status(),
            EntryStatus::Posted
        );
        assert_eq!(balance(&ledger, cash), dec!(60));
    }

    #[test]
    fn balance_past_the_decimal_range_is_rejected_before_append() {
        let (ledger, store) = setup();
        let cash = account(&ledger, "1000", "Cash", AccountType::Asset);
        let revenue = account(&ledger, "4000", "Revenue", AccountType::Revenue);
        let half = Decimal::MAX / dec!(2) + Decimal::ONE;

        let first = ledger.submit_entry(sale(cash, revenue, half)).unwrap();
        let second = ledger.submit_entry(sale(cash, revenue, half)).unwrap();
        ledger.post_entry(first.id_typed(), "controller").unwrap();
        let logged = store.len();

        let err = ledger_error(ledger.post_entry(second.id_typed(), "controller").unwrap_err());

        assert_eq!(err, LedgerError::BalanceOutOfRange { account_id: cash });
        assert_eq!(store.len(), logged);
        assert_eq!(
            ledger.get_entry(second.id_typed()).unwrap().status(),
            EntryStatus::Draft
        );
        assert_eq!(balance(&ledger, cash), half);
        assert!(ledger.reconcile().unwrap().is_empty());
        let tb = ledger
            .trial_balance(day(30), TrialBalanceOptions::default())
            .unwrap();
        assert_eq!(tb.total_debit, half);
    }

    #[test]
    fn oversized_draft_reports_a_problem_instead_of_failing() {
        let (ledger, _) = setup();
        let cash = account(&ledger, "1000", "Cash", AccountType::Asset);
        let revenue = account(&ledger, "4000", "Revenue", AccountType::Revenue);
        let draft = DraftEntry::new(day(2), "Typo")
            .line(DraftLine::debit(cash, Decimal::MAX))
            .line(DraftLine::debit(cash, Decimal::MAX))
            .line(DraftLine::credit(revenue, dec!(1)));
        let entry = ledger.submit_entry(draft).unwrap();

        let problems = ledger.validate_entry(entry.id_typed()).unwrap();
        assert_eq!(
            problems,
            vec![ValidationError::AmountOutOfRange {
                side: Side::Debit
            }]
        );

        let err = ledger_error(ledger.post_entry(entry.id_typed(), "controller").unwrap_err());
        assert_eq!(err.code(), "amount_out_of_range");
        assert_eq!(balance(&ledger, cash), Decimal::ZERO);
        assert_eq!(ledger.statistics().unwrap().draft, 1);
    }

    #[test]
    fn unbalanced_entry_is_refused_at_posting() {
        let (ledger, _) = setup();
        let a = account(&ledger, "1000", "Cash", AccountType::Asset);
        let b = account(&ledger, "4000", "Revenue", AccountType::Revenue);

        let draft = DraftEntry::new(day(2), "off by one")
            .line(DraftLine::debit(a, dec!(100)))
            .line(DraftLine::credit(b, dec!(99)));
        let entry = ledger.submit_entry(draft).unwrap();

        let err = ledger_error(ledger.post_entry(entry.id_typed(), "controller").unwrap_err());
        assert_eq!(
            err,
            LedgerError::Validation(ValidationError::Unbalanced {
                total_debit: dec!(100),
                total_credit: dec!(99),
                difference: dec!(1),
            })
        );
        assert_eq!(balance(&ledger, a), Decimal::ZERO);
        assert_eq!(balance(&ledger, b), Decimal::ZERO);
        assert_eq!(
            ledger.get_entry(entry.id_typed()).unwrap().status(),
            EntryStatus::Draft
        );
    }

    #[test]
    fn deactivated_account_blocks_posting() {
        let (ledger, _) = setup();
        let cash = account(&ledger, "1000", "Cash", AccountType::Asset);
        let revenue = account(&ledger, "4000", "Revenue", AccountType::Revenue);
        let entry = ledger.submit_entry(sale(cash, revenue, dec!(10))).unwrap();

        ledger.deactivate_account(revenue).unwrap();
        let err = ledger_error(ledger.post_entry(entry.id_typed(), "controller").unwrap_err());

        assert_eq!(err.code(), "invalid_account_reference");
        assert_eq!(balance(&ledger, cash), Decimal::ZERO);
        assert_eq!(balance(&ledger, revenue), Decimal::ZERO);
    }

    #[test]
    fn closed_period_blocks_posting() {
        let config = LedgerConfig::default().with_periods(AccountingPeriods::closed_through(day(15)));
        let (ledger, _) = setup_with(config);
        let cash = account(&ledger, "1000", "Cash", AccountType::Asset);
        let revenue = account(&ledger, "4000", "Revenue", AccountType::Revenue);
        let entry = ledger.submit_entry(sale(cash, revenue, dec!(10))).unwrap();

        let err = ledger_error(ledger.post_entry(entry.id_typed(), "controller").unwrap_err());
        assert_eq!(err.code(), "period_closed");
    }

    #[test]
    fn submission_reports_every_bad_line_and_stores_nothing() {
        let (ledger, store) = setup();
        let cash = account(&ledger, "1000", "Cash", AccountType::Asset);
        let ghost = AccountId::new();

        let mut both = DraftLine::debit(cash, dec!(5));
        both.credit_amount = dec!(5);
        let draft = DraftEntry::new(day(3), "bad")
            .line(both)
            .line(DraftLine::credit(ghost, dec!(5)));

        match ledger_error(ledger.submit_entry(draft).unwrap_err()) {
            LedgerError::Rejected(problems) => assert_eq!(problems.len(), 2),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(store.is_empty());
    }

    #[test]
    fn entry_numbers_are_sequential() {
        let (ledger, _) = setup();
        let cash = account(&ledger, "1000", "Cash", AccountType::Asset);
        let revenue = account(&ledger, "4000", "Revenue", AccountType::Revenue);

        let numbers = (0..3)
            .map(|_| {
                ledger
                    .submit_entry(sale(cash, revenue, dec!(1)))
                    .unwrap()
                    .entry_number()
                    .to_string()
            })
            .collect::<Vec<_>>();
        assert_eq!(numbers, vec!["JE-000001", "JE-000002", "JE-000003"]);
    }

    #[test]
    fn draft_can_be_revised_then_posted() {
        let (ledger, _) = setup();
        let cash = account(&ledger, "1000", "Cash", AccountType::Asset);
        let revenue = account(&ledger, "4000", "Revenue", AccountType::Revenue);
        let fees = account(&ledger, "4100", "Fee income", AccountType::Revenue);

        let draft = DraftEntry::new(day(4), "incomplete")
            .line(DraftLine::debit(cash, dec!(150)));
        let entry = ledger.submit_entry(draft).unwrap();
        let problems = ledger.validate_entry(entry.id_typed()).unwrap();
        assert_eq!(problems[0], ValidationError::InsufficientLines { found: 1 });
        assert!(matches!(problems[1], ValidationError::Unbalanced { .. }));

        let revised = ledger
            .revise_draft(
                entry.id_typed(),
                DraftRevision {
                    description: Some("Sale with fee".into()),
                    lines: Some(vec![
                        DraftLine::debit(cash, dec!(150)),
                        DraftLine::credit(revenue, dec!(100)),
                        DraftLine::credit(fees, dec!(50)).with_cost_center("CC-10"),
                    ]),
                    revised_by: "clerk".into(),
                    ..DraftRevision::default()
                },
            )
            .unwrap();
        assert_eq!(revised.lines().len(), 3);
        assert!(ledger.validate_entry(entry.id_typed()).unwrap().is_empty());

        ledger.post_entry(entry.id_typed(), "controller").unwrap();
        assert_eq!(balance(&ledger, fees), dec!(50));

        let err = ledger_error(
            ledger
                .revise_draft(entry.id_typed(), DraftRevision::default())
                .unwrap_err(),
        );
        assert!(matches!(err, LedgerError::AlreadyFinalized { .. }));
    }

    #[test]
    fn discarded_draft_is_gone() {
        let (ledger, _) = setup();
        let cash = account(&ledger, "1000", "Cash", AccountType::Asset);
        let revenue = account(&ledger, "4000", "Revenue", AccountType::Revenue);
        let entry = ledger.submit_entry(sale(cash, revenue, dec!(5))).unwrap();

        ledger.discard_draft(entry.id_typed(), "clerk").unwrap();

        let err = ledger_error(ledger.get_entry(entry.id_typed()).unwrap_err());
        assert_eq!(
            err,
            LedgerError::UnknownEntry {
                entry_id: entry.id_typed()
            }
        );
        assert!(ledger.list_entries(&EntryFilter::default()).unwrap().is_empty());
        assert_eq!(ledger.statistics().unwrap().total_entries, 0);
    }

    #[test]
    fn unknown_entry_operations_fail_cleanly() {
        let (ledger, _) = setup();
        let ghost = EntryId::new();
        for err in [
            ledger.post_entry(ghost, "x").unwrap_err(),
            ledger.reverse_entry(ghost, "x", "typo").unwrap_err(),
            ledger.get_entry(ghost).unwrap_err(),
        ] {
            assert_eq!(
                ledger_error(err),
                LedgerError::UnknownEntry { entry_id: ghost }
            );
        }
    }

    #[test]
    fn listing_statistics_and_account_ledger() {
        let (ledger, _) = setup();
        let cash = account(&ledger, "1000", "Cash", AccountType::Asset);
        let revenue = account(&ledger, "4000", "Revenue", AccountType::Revenue);
        let rent = account(&ledger, "6000", "Rent", AccountType::Expense);

        let first = ledger.submit_entry(sale(cash, revenue, dec!(500))).unwrap();
        ledger.post_entry(first.id_typed(), "controller").unwrap();
        let rent_draft = DraftEntry::new(day(10), "April rent")
            .source("manual")
            .line(DraftLine::debit(rent, dec!(200)))
            .line(DraftLine::credit(cash, dec!(200)));
        let second = ledger.submit_entry(rent_draft).unwrap();
        ledger.post_entry(second.id_typed(), "controller").unwrap();
        ledger.submit_entry(sale(cash, revenue, dec!(1))).unwrap();

        let posted = ledger
            .list_entries(&EntryFilter {
                status: Some(EntryStatus::Posted),
                ..EntryFilter::default()
            })
            .unwrap();
        assert_eq!(posted.len(), 2);
        assert!(posted[0].entry_number() < posted[1].entry_number());

        let stats = ledger.statistics().unwrap();
        assert_eq!((stats.draft, stats.posted), (1, 2));
        assert_eq!(stats.by_source["sales"], 2);
        assert_eq!(stats.total_posted_debit, dec!(700));

        let range = DateRange::new(Some(day(5)), None).unwrap();
        let cash_ledger = ledger.account_ledger(cash, range).unwrap();
        assert_eq!(cash_ledger.opening_balance, dec!(500));
        assert_eq!(cash_ledger.rows.len(), 1);
        assert_eq!(cash_ledger.closing_balance, dec!(300));

        // Projections are repeatable.
        assert_eq!(ledger.account_ledger(cash, range).unwrap(), cash_ledger);
    }

    #[test]
    fn committed_events_reach_subscribers_in_log_order() {
        let (ledger, _) = setup();
        let sub = ledger.subscribe();
        let cash = account(&ledger, "1000", "Cash", AccountType::Asset);
        let revenue = account(&ledger, "4000", "Revenue", AccountType::Revenue);

        let entry = ledger.submit_entry(sale(cash, revenue, dec!(9))).unwrap();
        ledger.post_entry(entry.id_typed(), "controller").unwrap();
        ledger
            .reverse_entry(entry.id_typed(), "auditor", "wrong amount")
            .unwrap();

        let envelopes = sub.drain();
        assert_eq!(
            envelopes.iter().map(|e| e.position()).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert_eq!(
            envelopes.iter().map(|e| e.sequence_number()).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert!(envelopes.iter().all(|e| e.stream_id() == *entry.id_typed().as_uuid()));
    }

    #[test]
    fn concurrent_postings_on_shared_accounts_lose_nothing() {
        let (ledger, store) = setup();
        let cash = account(&ledger, "1000", "Cash", AccountType::Asset);
        let revenue = account(&ledger, "4000", "Revenue", AccountType::Revenue);
        let payable = account(&ledger, "2000", "Payables", AccountType::Liability);

        let ids = (0..40)
            .map(|i| {
                let other = if i % 2 == 0 { revenue } else { payable };
                ledger
                    .submit_entry(sale(cash, other, dec!(2.50)))
                    .unwrap()
                    .id_typed()
            })
            .collect::<Vec<_>>();

        let handles = ids
            .chunks(10)
            .map(|chunk| {
                let ledger = ledger.clone();
                let chunk = chunk.to_vec();
                thread::spawn(move || {
                    for id in chunk {
                        ledger.post_entry(id, "worker").unwrap();
                    }
                })
            })
            .collect::<Vec<_>>();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(balance(&ledger, cash), dec!(100));
        assert_eq!(balance(&ledger, revenue), dec!(50));
        assert_eq!(balance(&ledger, payable), dec!(50));
        assert!(ledger.reconcile().unwrap().is_empty());
        // 40 submissions + 40 postings, nothing duplicated.
        assert_eq!(store.load_all().unwrap().len(), 80);
    }

    #[test]
    fn racing_posts_of_the_same_entry_apply_once() {
        let (ledger, _) = setup();
        let cash = account(&ledger, "1000", "Cash", AccountType::Asset);
        let revenue = account(&ledger, "4000", "Revenue", AccountType::Revenue);
        let id = ledger
            .submit_entry(sale(cash, revenue, dec!(7)))
            .unwrap()
            .id_typed();

        let handles = (0..4)
            .map(|_| {
                let ledger = ledger.clone();
                thread::spawn(move || ledger.post_entry(id, "worker"))
            })
            .collect::<Vec<_>>();
        let results = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .collect::<Vec<_>>();

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        for err in results.into_iter().filter_map(Result::err) {
            assert!(matches!(
                ledger_error(err),
                LedgerError::AlreadyFinalized { .. }
            ));
        }
        assert_eq!(balance(&ledger, cash), dec!(7));
    }

    #[test]
    fn contended_lock_times_out_as_retryable() {
        let config = LedgerConfig::default().with_lock_timeout(Duration::from_millis(20));
        let (ledger, _) = setup_with(config);
        let cash = account(&ledger, "1000", "Cash", AccountType::Asset);
        let revenue = account(&ledger, "4000", "Revenue", AccountType::Revenue);
        let id = ledger
            .submit_entry(sale(cash, revenue, dec!(3)))
            .unwrap()
            .id_typed();

        let _held = ledger
            .registry()
            .lock_accounts([cash], Duration::from_millis(20))
            .unwrap();
        let err = ledger.post_entry(id, "worker").unwrap_err();

        assert!(err.is_retryable());
        assert_eq!(err.code(), "lock_timeout");
        assert_eq!(balance(&ledger, cash), Decimal::ZERO);
        assert_eq!(ledger.get_entry(id).unwrap().status(), EntryStatus::Draft);
    }
}
