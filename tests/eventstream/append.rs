//! Append preconditions and sequence assignment

use crate::bank::{MoneyDeposited, Opened};
use crate::{account, each_backend};
use factlog::{
    AppendOptions, ExistenceConstraint, PendingEvent, StreamReader, WriteContext, WriteFaultKind,
};

#[test]
fn first_append_creates_stream() {
    each_backend(|backend, log, _| {
        let stream = log.stream(account("A"));
        assert!(!stream.exists(), "{backend}");

        let result = stream
            .append_event(&Opened { owner: "alice".into() }, 0, ExistenceConstraint::MustBeNew)
            .unwrap();
        assert_eq!(result.sequence_number, 1, "{backend}");
        assert!(result.new_stream_created, "{backend}");
        assert!(stream.exists(), "{backend}");

        let second = stream
            .append_event(&MoneyDeposited { amount: 10 }, 1, ExistenceConstraint::MustExist)
            .unwrap();
        assert_eq!(second.sequence_number, 2, "{backend}");
        assert!(!second.new_stream_created, "{backend}");
    });
}

#[test]
fn sequences_are_contiguous_without_contention() {
    each_backend(|backend, log, _| {
        let stream = log.stream(account("A"));
        for n in 1..=25u64 {
            let result = stream
                .append_event(&MoneyDeposited { amount: n as i64 }, 0, ExistenceConstraint::Loose)
                .unwrap();
            assert_eq!(result.sequence_number, n, "{backend}");
        }
        let seqs: Vec<u64> = log
            .reader(account("A"))
            .get_all_events()
            .unwrap()
            .iter()
            .map(|e| e.sequence_number)
            .collect();
        assert_eq!(seqs, (1..=25).collect::<Vec<_>>(), "{backend}");
    });
}

#[test]
fn must_be_new_on_existing_stream_fails_without_mutation() {
    each_backend(|backend, log, _| {
        let stream = log.stream(account("A"));
        stream
            .append_event(&Opened { owner: "alice".into() }, 0, ExistenceConstraint::MustBeNew)
            .unwrap();

        let err = stream
            .append_event(&Opened { owner: "bob".into() }, 0, ExistenceConstraint::MustBeNew)
            .unwrap_err();
        assert_eq!(err.kind, WriteFaultKind::ExistenceConstraint, "{backend}");
        assert_eq!(stream.last_sequence_number().unwrap(), 1, "{backend}");
        assert_eq!(log.reader(account("A")).get_all_events().unwrap().len(), 1, "{backend}");
    });
}

#[test]
fn must_exist_on_empty_stream_fails() {
    each_backend(|backend, log, _| {
        let stream = log.stream(account("A"));
        let err = stream
            .append_event(&MoneyDeposited { amount: 1 }, 0, ExistenceConstraint::MustExist)
            .unwrap_err();
        assert_eq!(err.kind, WriteFaultKind::ExistenceConstraint, "{backend}");
        assert!(err.is_conflict(), "{backend}");
        assert!(!stream.exists(), "{backend}");
    });
}

#[test]
fn stale_expected_top_is_a_concurrency_fault() {
    each_backend(|backend, log, _| {
        let stream = log.stream(account("A"));
        for _ in 0..3 {
            stream
                .append_event(&MoneyDeposited { amount: 1 }, 0, ExistenceConstraint::Loose)
                .unwrap();
        }
        let err = stream
            .append_event(&MoneyDeposited { amount: 1 }, 1, ExistenceConstraint::Loose)
            .unwrap_err();
        assert_eq!(err.kind, WriteFaultKind::Concurrency, "{backend}");
        assert!(!err.is_retryable(), "{backend}");
        assert_eq!(stream.last_sequence_number().unwrap(), 3, "{backend}");
    });
}

#[test]
fn context_and_version_are_persisted() {
    each_backend(|backend, log, _| {
        let context = WriteContext::new()
            .with_who("teller-7")
            .with_source("branch")
            .with_correlation_id("corr-1");
        let stream = log.stream_with_context(account("A"), context.clone());
        stream
            .append_pending(
                PendingEvent::new("MoneyDeposited", r#"{"amount":5}"#),
                AppendOptions::new().with_version(3),
            )
            .unwrap();

        let events = log.reader(account("A")).get_all_events().unwrap();
        assert_eq!(events[0].write_context, context, "{backend}");
        assert_eq!(events[0].version_number, 3, "{backend}");
        assert_eq!(events[0].event_type_name, "MoneyDeposited", "{backend}");
    });
}

#[test]
fn streams_are_isolated_by_identity() {
    each_backend(|backend, log, _| {
        log.stream(account("A"))
            .append_event(&Opened { owner: "a".into() }, 0, ExistenceConstraint::MustBeNew)
            .unwrap();
        let other = log
            .stream(account("B"))
            .append_event(&Opened { owner: "b".into() }, 0, ExistenceConstraint::MustBeNew)
            .unwrap();
        assert_eq!(other.sequence_number, 1, "{backend}");

        let mut keys = log
            .instance_keys(&account("A").entity_type(), None)
            .unwrap();
        keys.sort();
        assert_eq!(keys, vec!["A", "B"], "{backend}");
    });
}
