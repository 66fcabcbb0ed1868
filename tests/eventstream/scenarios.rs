//! Business scenarios from the bank domain

use crate::bank::{
    Balance, Closed, InterestAccrued, InterestAccruedToday, LargeDeposit, MoneyDeposited,
    MoneyWithdrawn, Opened,
};
use crate::{account, each_backend};
use chrono::{Duration, Utc};
use factlog::{
    AppendOptions, ClassificationResult, ExistenceConstraint, PendingEvent, WriteFaultKind,
};

#[test]
fn deposit_then_withdraw() {
    each_backend(|backend, log, _| {
        let id = account("ACC-1");
        let stream = log.stream(id.clone());
        stream
            .append_event(&Opened { owner: "alice".into() }, 0, ExistenceConstraint::MustBeNew)
            .unwrap();
        stream
            .append_event(&MoneyDeposited { amount: 100 }, 1, ExistenceConstraint::MustExist)
            .unwrap();

        let balance: Balance = log.project(&id, None).unwrap();
        assert_eq!(balance.amount, 100, "{backend}");
        assert_eq!(balance.current_sequence_number, 2, "{backend}");
        assert_eq!(balance.owner.as_deref(), Some("alice"), "{backend}");

        let withdrawn = stream
            .append_event(&MoneyWithdrawn { amount: 30 }, 2, ExistenceConstraint::MustExist)
            .unwrap();
        assert_eq!(withdrawn.sequence_number, 3, "{backend}");

        let err = stream
            .append_event(&MoneyWithdrawn { amount: 30 }, 2, ExistenceConstraint::MustExist)
            .unwrap_err();
        assert_eq!(err.kind, WriteFaultKind::Concurrency, "{backend}");

        let balance: Balance = log.project(&id, None).unwrap();
        assert_eq!(balance.amount, 70, "{backend}");
        assert_eq!(balance.current_sequence_number, 3, "{backend}");
    });
}

#[test]
fn replay_is_repeatable() {
    each_backend(|backend, log, _| {
        let id = account("ACC-1");
        let stream = log.stream(id.clone());
        for amount in [5, 10, 20] {
            stream
                .append_event(&MoneyDeposited { amount }, 0, ExistenceConstraint::Loose)
                .unwrap();
        }
        let first: Balance = log.project(&id, None).unwrap();
        let second: Balance = log.project(&id, None).unwrap();
        assert_eq!(first, second, "{backend}");
        assert_eq!(first.current_sequence_number, 3, "{backend}");
    });
}

#[test]
fn projection_resumes_from_checkpoint() {
    each_backend(|backend, log, _| {
        let id = account("ACC-1");
        let stream = log.stream(id.clone());
        stream
            .append_event(&MoneyDeposited { amount: 100 }, 0, ExistenceConstraint::Loose)
            .unwrap();
        let checkpoint: Balance = log.project(&id, None).unwrap();

        stream
            .append_event(&MoneyWithdrawn { amount: 40 }, 1, ExistenceConstraint::MustExist)
            .unwrap();
        let resumed = log.project_from(&id, checkpoint, None).unwrap();
        assert_eq!(resumed, log.project::<Balance>(&id, None).unwrap(), "{backend}");
        assert_eq!(resumed.amount, 60, "{backend}");
    });
}

#[test]
fn projection_as_of_a_past_date() {
    each_backend(|backend, log, _| {
        let id = account("ACC-1");
        let stream = log.stream(id.clone());
        let week_ago = Utc::now() - Duration::days(7);
        let dated = |amount: i64, at| {
            PendingEvent::from_event(&MoneyDeposited { amount })
                .unwrap()
                .with_as_of_date(at)
        };
        stream
            .append_pending(dated(10, week_ago), AppendOptions::new())
            .unwrap();
        stream
            .append_pending(dated(20, week_ago + Duration::days(2)), AppendOptions::new())
            .unwrap();
        stream
            .append_event(&MoneyDeposited { amount: 40 }, 0, ExistenceConstraint::Loose)
            .unwrap();

        let then: Balance = log.project(&id, Some(week_ago + Duration::days(1))).unwrap();
        assert_eq!(then.amount, 10, "{backend}");
        assert_eq!(then.current_sequence_number, 1, "{backend}");

        let now: Balance = log.project(&id, None).unwrap();
        assert_eq!(now.amount, 70, "{backend}");
    });
}

#[test]
fn interest_accrued_today_classification() {
    each_backend(|backend, log, _| {
        let id = account("ACC-1");
        log.stream(id.clone())
            .append_event(&InterestAccrued { amount: 2 }, 0, ExistenceConstraint::Loose)
            .unwrap();

        let state = log.classify::<InterestAccruedToday>(&id, None).unwrap();
        assert_eq!(state.current_result, ClassificationResult::Include, "{backend}");
        assert!(state.ever_included, "{backend}");
        assert_eq!(state.current_sequence_number, 1, "{backend}");
    });
}

#[test]
fn empty_stream_classifies_unchanged() {
    each_backend(|backend, log, _| {
        let state = log
            .classify::<InterestAccruedToday>(&account("EMPTY"), None)
            .unwrap();
        assert_eq!(state.current_result, ClassificationResult::Unchanged, "{backend}");
        assert_eq!(state.current_sequence_number, 0, "{backend}");
    });
}

#[test]
fn closing_excludes_after_inclusion() {
    each_backend(|backend, log, _| {
        let id = account("ACC-1");
        let stream = log.stream(id.clone());
        stream
            .append_event(&InterestAccrued { amount: 2 }, 0, ExistenceConstraint::Loose)
            .unwrap();
        stream
            .append_event(&Closed {}, 1, ExistenceConstraint::MustExist)
            .unwrap();

        let state = log.classify::<InterestAccruedToday>(&id, None).unwrap();
        assert_eq!(state.current_result, ClassificationResult::Exclude, "{backend}");
        assert!(state.ever_included && state.ever_excluded, "{backend}");
    });
}

#[test]
fn parameterised_classification() {
    each_backend(|backend, log, _| {
        let id = account("ACC-1");
        log.stream(id.clone())
            .append_event(&MoneyDeposited { amount: 500 }, 0, ExistenceConstraint::Loose)
            .unwrap();

        let high = log
            .classify_with(LargeDeposit { threshold: 1000 }, &id, None)
            .unwrap();
        assert_eq!(high.current_result, ClassificationResult::Unchanged, "{backend}");
        let low = log
            .classify_with(LargeDeposit { threshold: 100 }, &id, None)
            .unwrap();
        assert_eq!(low.current_result, ClassificationResult::Include, "{backend}");
    });
}

#[test]
fn corrupt_payload_surfaces_as_replay_error() {
    each_backend(|backend, log, _| {
        let id = account("ACC-1");
        log.stream(id.clone())
            .append_pending(
                PendingEvent::new("MoneyDeposited", r#"{"amount":"lots"}"#),
                AppendOptions::new(),
            )
            .unwrap();
        let err = log.project::<Balance>(&id, None).unwrap_err();
        assert!(
            matches!(err, factlog::Error::Replay(factlog::ReplayError::Decode { sequence: 1, .. })),
            "{backend}: {err}"
        );
    });
}
