//! Property tests over both backends

use crate::bank::{Balance, MoneyDeposited, MoneyWithdrawn};
use crate::{account, open, BACKENDS};
use factlog::{ExistenceConstraint, StreamReader, WriteFaultKind};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Deposit(i64),
    Withdraw(i64),
    /// Append expecting a top that is `lag` behind the real one
    Stale(u64),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (1i64..500).prop_map(Op::Deposit),
        (1i64..500).prop_map(Op::Withdraw),
        (1u64..4).prop_map(Op::Stale),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn accepted_appends_are_contiguous_and_replay_matches(ops in proptest::collection::vec(op(), 0..30)) {
        for backend in BACKENDS {
            let (log, _) = open(backend);
            let stream = log.stream(account("P"));
            let mut expected_balance = 0i64;
            let mut top = 0u64;

            for op in &ops {
                match op {
                    Op::Deposit(amount) => {
                        let r = stream
                            .append_event(&MoneyDeposited { amount: *amount }, top, ExistenceConstraint::Loose)
                            .unwrap();
                        top += 1;
                        prop_assert_eq!(r.sequence_number, top);
                        expected_balance += amount;
                    }
                    Op::Withdraw(amount) => {
                        let r = stream
                            .append_event(&MoneyWithdrawn { amount: *amount }, top, ExistenceConstraint::Loose)
                            .unwrap();
                        top += 1;
                        prop_assert_eq!(r.sequence_number, top);
                        expected_balance -= amount;
                    }
                    Op::Stale(lag) => {
                        if top > *lag {
                            let err = stream
                                .append_event(&MoneyDeposited { amount: 1 }, top - lag, ExistenceConstraint::Loose)
                                .unwrap_err();
                            prop_assert_eq!(err.kind, WriteFaultKind::Concurrency);
                        }
                    }
                }
            }

            let events = log.reader(account("P")).get_all_events().unwrap();
            let seqs: Vec<u64> = events.iter().map(|e| e.sequence_number).collect();
            prop_assert_eq!(seqs, (1..=top).collect::<Vec<_>>());

            let first: Balance = log.project(&account("P"), None).unwrap();
            let second: Balance = log.project(&account("P"), None).unwrap();
            prop_assert_eq!(&first, &second);
            prop_assert_eq!(first.amount, expected_balance);
            prop_assert_eq!(first.current_sequence_number, top);
        }
    }
}
