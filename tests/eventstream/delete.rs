//! Stream deletion

use crate::bank::{MoneyDeposited, Opened};
use crate::{account, each_backend};
use factlog::{ExistenceConstraint, StreamReader};

#[test]
fn delete_erases_every_event() {
    each_backend(|backend, log, _| {
        let stream = log.stream(account("A"));
        stream
            .append_event(&Opened { owner: "alice".into() }, 0, ExistenceConstraint::MustBeNew)
            .unwrap();
        stream
            .append_event(&MoneyDeposited { amount: 5 }, 1, ExistenceConstraint::MustExist)
            .unwrap();

        stream.delete_stream().unwrap();

        assert!(!stream.exists(), "{backend}");
        let reader = log.reader(account("A"));
        assert!(!reader.exists().unwrap(), "{backend}");
        assert!(reader.get_all_events().unwrap().is_empty(), "{backend}");
        assert!(
            log.instance_keys(&account("A").entity_type(), None)
                .unwrap()
                .is_empty(),
            "{backend}"
        );
    });
}

#[test]
fn deleting_a_missing_stream_succeeds() {
    each_backend(|backend, log, _| {
        assert!(log.stream(account("ghost")).delete_stream().is_ok(), "{backend}");
    });
}

#[test]
fn deleted_stream_can_be_recreated() {
    each_backend(|backend, log, _| {
        let stream = log.stream(account("A"));
        stream
            .append_event(&Opened { owner: "alice".into() }, 0, ExistenceConstraint::MustBeNew)
            .unwrap();
        stream.delete_stream().unwrap();

        let again = stream
            .append_event(&Opened { owner: "bob".into() }, 0, ExistenceConstraint::MustBeNew)
            .unwrap();
        assert_eq!(again.sequence_number, 1, "{backend}");
        assert!(again.new_stream_created, "{backend}");
        assert_eq!(log.reader(account("A")).get_all_events().unwrap().len(), 1, "{backend}");
    });
}

#[test]
fn delete_leaves_siblings_alone() {
    each_backend(|backend, log, _| {
        for key in ["A", "B"] {
            log.stream(account(key))
                .append_event(&Opened { owner: key.into() }, 0, ExistenceConstraint::MustBeNew)
                .unwrap();
        }
        log.stream(account("A")).delete_stream().unwrap();

        assert!(log.stream(account("B")).exists(), "{backend}");
        assert_eq!(
            log.instance_keys(&account("B").entity_type(), None).unwrap(),
            vec!["B"],
            "{backend}"
        );
    });
}
