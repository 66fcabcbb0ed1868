//! Concurrent writers on one stream

use crate::bank::{MoneyDeposited, MoneyWithdrawn, Opened};
use crate::{account, each_backend};
use factlog::{ExistenceConstraint, StreamReader, WriteFaultKind};
use std::sync::Barrier;
use std::thread;

#[test]
fn same_expected_top_exactly_one_wins() {
    each_backend(|backend, log, _| {
        let stream = log.stream(account("A"));
        stream
            .append_event(&Opened { owner: "alice".into() }, 0, ExistenceConstraint::MustBeNew)
            .unwrap();

        let writers = 8;
        let barrier = Barrier::new(writers);
        let results: Vec<_> = thread::scope(|s| {
            let handles: Vec<_> = (0..writers)
                .map(|_| {
                    s.spawn(|| {
                        let stream = log.stream(account("A"));
                        barrier.wait();
                        stream.append_event(
                            &MoneyWithdrawn { amount: 1 },
                            1,
                            ExistenceConstraint::MustExist,
                        )
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let winners = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(winners, 1, "{backend}");
        for loser in results.iter().filter_map(|r| r.as_ref().err()) {
            assert_eq!(loser.kind, WriteFaultKind::Concurrency, "{backend}");
        }
        assert_eq!(stream.last_sequence_number().unwrap(), 2, "{backend}");
    });
}

#[test]
fn loose_writers_never_collide() {
    each_backend(|backend, log, _| {
        let writers = 4;
        let per_writer = 25;
        thread::scope(|s| {
            for _ in 0..writers {
                s.spawn(|| {
                    let stream = log.stream(account("A"));
                    for _ in 0..per_writer {
                        stream
                            .append_event(&MoneyDeposited { amount: 1 }, 0, ExistenceConstraint::Loose)
                            .unwrap();
                    }
                });
            }
        });

        let events = log.reader(account("A")).get_all_events().unwrap();
        let seqs: Vec<u64> = events.iter().map(|e| e.sequence_number).collect();
        let expected: Vec<u64> = (1..=(writers * per_writer) as u64).collect();
        assert_eq!(seqs, expected, "{backend}");
    });
}

#[test]
fn distinct_streams_proceed_in_parallel() {
    each_backend(|backend, log, _| {
        thread::scope(|s| {
            for key in ["A", "B", "C", "D"] {
                s.spawn(move || {
                    let stream = log.stream(account(key));
                    for n in 1..=20u64 {
                        let r = stream
                            .append_event(&MoneyDeposited { amount: 1 }, n - 1, ExistenceConstraint::Loose)
                            .unwrap();
                        assert_eq!(r.sequence_number, n);
                    }
                });
            }
        });
        for key in ["A", "B", "C", "D"] {
            assert_eq!(log.reader(account(key)).get_all_events().unwrap().len(), 20, "{backend}");
        }
    });
}

#[test]
fn readers_see_a_consistent_prefix_during_writes() {
    each_backend(|backend, log, _| {
        thread::scope(|s| {
            s.spawn(|| {
                let stream = log.stream(account("A"));
                for _ in 0..50 {
                    stream
                        .append_event(&MoneyDeposited { amount: 1 }, 0, ExistenceConstraint::Loose)
                        .unwrap();
                }
            });
            s.spawn(|| {
                for _ in 0..50 {
                    let events = log.reader(account("A")).get_all_events().unwrap();
                    for (i, e) in events.iter().enumerate() {
                        assert_eq!(e.sequence_number, i as u64 + 1);
                    }
                }
            });
        });
        assert_eq!(log.reader(account("A")).get_all_events().unwrap().len(), 50, "{backend}");
    });
}
