//! Notifications published by writes and replays

use crate::bank::{Balance, InterestAccrued, InterestAccruedToday, MoneyDeposited, Opened};
use crate::{account, each_backend, init_tracing};
use factlog::{
    ClassificationResult, EngineConfig, ExistenceConstraint, Factlog, Notification,
    NotificationTransport, TransportError, TransportErrorKind,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

fn kinds(notifications: &[Notification]) -> Vec<&'static str> {
    notifications.iter().map(|n| n.kind()).collect()
}

#[test]
fn appends_publish_creation_then_event() {
    each_backend(|backend, log, memory| {
        let stream = log.stream(account("A"));
        stream
            .append_event(&Opened { owner: "alice".into() }, 0, ExistenceConstraint::MustBeNew)
            .unwrap();
        stream
            .append_event(&MoneyDeposited { amount: 10 }, 1, ExistenceConstraint::MustExist)
            .unwrap();

        let delivered = memory.take();
        assert_eq!(
            kinds(&delivered),
            vec!["newEntityCreated", "newEventAppended", "newEventAppended"],
            "{backend}"
        );
        assert!(delivered.iter().all(|n| n.identity() == &account("A")), "{backend}");
        match &delivered[2] {
            Notification::NewEventAppended {
                sequence_number,
                event_type_name,
                payload,
                ..
            } => {
                assert_eq!(*sequence_number, 2, "{backend}");
                assert_eq!(event_type_name, "MoneyDeposited", "{backend}");
                assert_eq!(payload, r#"{"amount":10}"#, "{backend}");
            }
            other => panic!("unexpected {:?}", other),
        }
    });
}

#[test]
fn rejected_appends_publish_nothing() {
    each_backend(|backend, log, memory| {
        let stream = log.stream(account("A"));
        let _ = stream.append_event(&MoneyDeposited { amount: 1 }, 0, ExistenceConstraint::MustExist);
        assert!(memory.is_empty(), "{backend}");
    });
}

#[test]
fn replays_publish_completion() {
    each_backend(|backend, log, memory| {
        let id = account("A");
        log.stream(id.clone())
            .append_event(&InterestAccrued { amount: 1 }, 0, ExistenceConstraint::Loose)
            .unwrap();
        memory.take();

        log.project::<Balance>(&id, None).unwrap();
        log.classify::<InterestAccruedToday>(&id, None).unwrap();

        let delivered = memory.take();
        assert_eq!(
            kinds(&delivered),
            vec!["projectionCompleted", "classificationCompleted"],
            "{backend}"
        );
        match &delivered[0] {
            Notification::ProjectionCompleted {
                projection_name,
                as_of_sequence,
                ..
            } => {
                assert_eq!(projection_name, "Balance");
                assert_eq!(*as_of_sequence, 1);
            }
            other => panic!("unexpected {:?}", other),
        }
        match &delivered[1] {
            Notification::ClassificationCompleted { result, .. } => {
                assert_eq!(*result, ClassificationResult::Include);
            }
            other => panic!("unexpected {:?}", other),
        }
    });
}

#[test]
fn delivery_failure_never_fails_the_write() {
    init_tracing();
    let calls = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&calls);
    let transport: Arc<dyn NotificationTransport> =
        Arc::new(move |_: &Notification| -> Result<(), TransportError> {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(TransportError::new(TransportErrorKind::Unavailable, "bus offline"))
        });

    let mut config = EngineConfig::default();
    config.notifications.backoff_ms = 0;
    let log = Factlog::builder()
        .config(config)
        .transport(transport)
        .open()
        .unwrap();

    let result = log
        .stream(account("A"))
        .append_event(&Opened { owner: "alice".into() }, 0, ExistenceConstraint::MustBeNew)
        .unwrap();
    assert_eq!(result.sequence_number, 1);
    assert!(log.stream(account("A")).exists());

    // Two notifications, three attempts each
    assert_eq!(calls.load(Ordering::SeqCst), 6);
    let stats = log.dispatcher().stats();
    assert_eq!(stats.dropped, 2);
    assert_eq!(stats.retries, 4);
}

#[test]
fn disabled_notifications_are_not_delivered() {
    init_tracing();
    let memory = Arc::new(factlog::MemoryTransport::new());
    let transport: Arc<dyn NotificationTransport> = memory.clone();
    let config = EngineConfig::from_toml_str("[notifications]\nenabled = false\n").unwrap();
    let log = Factlog::builder()
        .config(config)
        .transport(transport)
        .open()
        .unwrap();

    log.stream(account("A"))
        .append_event(&Opened { owner: "alice".into() }, 0, ExistenceConstraint::MustBeNew)
        .unwrap();
    assert!(memory.is_empty());
}
