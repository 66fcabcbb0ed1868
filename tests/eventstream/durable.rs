//! File-backed append-log store across reopen

use crate::bank::{Balance, MoneyDeposited, Opened};
use crate::{account, init_tracing};
use factlog::{DomainConfig, DurabilityMode, ExistenceConstraint, Factlog, StreamReader, TABLE_BACKEND};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

fn open_at(dir: &Path, mode: DurabilityMode) -> Factlog {
    init_tracing();
    let builder = Factlog::builder().path(dir);
    let builder = match mode {
        DurabilityMode::Strict => builder.strict(),
        DurabilityMode::Buffered => builder.buffered(),
        DurabilityMode::None => builder.no_durability(),
    };
    builder.open().expect("failed to open durable store")
}

#[test]
fn events_survive_reopen() {
    for mode in [DurabilityMode::Strict, DurabilityMode::Buffered] {
        let dir = tempfile::tempdir().unwrap();
        {
            let log = open_at(dir.path(), mode);
            let stream = log.stream(account("ACC-1"));
            stream
                .append_event(&Opened { owner: "alice".into() }, 0, ExistenceConstraint::MustBeNew)
                .unwrap();
            stream
                .append_event(&MoneyDeposited { amount: 100 }, 1, ExistenceConstraint::MustExist)
                .unwrap();
        }

        let log = open_at(dir.path(), mode);
        let balance: Balance = log.project(&account("ACC-1"), None).unwrap();
        assert_eq!(balance.amount, 100, "{mode:?}");
        assert_eq!(balance.current_sequence_number, 2, "{mode:?}");

        let next = log
            .stream(account("ACC-1"))
            .append_event(&MoneyDeposited { amount: 1 }, 2, ExistenceConstraint::MustExist)
            .unwrap();
        assert_eq!(next.sequence_number, 3, "{mode:?}");
        assert_eq!(
            log.instance_keys(&account("ACC-1").entity_type(), None).unwrap(),
            vec!["ACC-1"],
            "{mode:?}"
        );
    }
}

#[test]
fn torn_tail_is_discarded_on_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let log = open_at(dir.path(), DurabilityMode::Strict);
        let stream = log.stream(account("ACC-1"));
        for amount in [10, 20] {
            stream
                .append_event(&MoneyDeposited { amount }, 0, ExistenceConstraint::Loose)
                .unwrap();
        }
    }

    // A crash mid-append leaves a partial frame behind
    let path = dir.path().join("Bank").join("Account").join("ACC-1.log");
    let mut file = OpenOptions::new().append(true).open(&path).unwrap();
    file.write_all(&[0x40, 0x00, 0x00, 0x00, 0xde, 0xad]).unwrap();
    drop(file);

    let log = open_at(dir.path(), DurabilityMode::Strict);
    let events = log.reader(account("ACC-1")).get_all_events().unwrap();
    assert_eq!(events.len(), 2);

    let next = log
        .stream(account("ACC-1"))
        .append_event(&MoneyDeposited { amount: 30 }, 2, ExistenceConstraint::Loose)
        .unwrap();
    assert_eq!(next.sequence_number, 3);

    let balance: Balance = log.project(&account("ACC-1"), None).unwrap();
    assert_eq!(balance.amount, 60);
}

#[test]
fn append_after_failed_write_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("Bank").join("Account").join("ACC-1.log");
    {
        let log = open_at(dir.path(), DurabilityMode::Strict);
        let stream = log.stream(account("ACC-1"));
        stream
            .append_event(&MoneyDeposited { amount: 10 }, 0, ExistenceConstraint::MustBeNew)
            .unwrap();

        // A write that failed midway, while the store stays open
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(&[0x40, 0x00, 0x00, 0x00, 0xde, 0xad, 0xbe, 0xef, b'{']).unwrap();
        drop(file);

        let next = stream
            .append_event(&MoneyDeposited { amount: 20 }, 1, ExistenceConstraint::MustExist)
            .unwrap();
        assert_eq!(next.sequence_number, 2);
    }

    let log = open_at(dir.path(), DurabilityMode::Strict);
    let events = log.reader(account("ACC-1")).get_all_events().unwrap();
    assert_eq!(events.len(), 2);
    let balance: Balance = log.project(&account("ACC-1"), None).unwrap();
    assert_eq!(balance.amount, 30);
}

#[test]
fn long_instance_key_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let key = "/".repeat(256);
    {
        let log = open_at(dir.path(), DurabilityMode::Strict);
        log.stream(account(&key))
            .append_event(&Opened { owner: "alice".into() }, 0, ExistenceConstraint::MustBeNew)
            .unwrap();
    }

    let log = open_at(dir.path(), DurabilityMode::Strict);
    assert!(log.stream(account(&key)).exists());
    assert_eq!(
        log.instance_keys(&account(&key).entity_type(), None).unwrap(),
        vec![key]
    );
}

#[test]
fn deletion_removes_files() {
    let dir = tempfile::tempdir().unwrap();
    {
        let log = open_at(dir.path(), DurabilityMode::Strict);
        let stream = log.stream(account("ACC-1"));
        stream
            .append_event(&Opened { owner: "alice".into() }, 0, ExistenceConstraint::MustBeNew)
            .unwrap();
        stream.delete_stream().unwrap();
    }
    assert!(!dir.path().join("Bank/Account/ACC-1.log").exists());

    let log = open_at(dir.path(), DurabilityMode::Strict);
    assert!(!log.stream(account("ACC-1")).exists());
    assert!(log
        .instance_keys(&account("ACC-1").entity_type(), None)
        .unwrap()
        .is_empty());
}

#[test]
fn file_backed_mode_requires_a_path() {
    init_tracing();
    let err = Factlog::builder().strict().open().unwrap_err();
    assert!(matches!(err, factlog::Error::Engine(_) | factlog::Error::Config(_)));
}

#[test]
fn file_backed_mode_refuses_the_table_backend() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let err = Factlog::builder()
        .path(dir.path())
        .strict()
        .domain(DomainConfig {
            name: "Bank".into(),
            backend: Some(TABLE_BACKEND.into()),
            maintain_index: false,
        })
        .open()
        .unwrap_err();
    assert!(matches!(err, factlog::Error::Engine(_)));
    assert!(err.to_string().contains("cannot honour durability"), "{err}");

    let err = Factlog::builder()
        .path(dir.path())
        .buffered()
        .default_backend(TABLE_BACKEND)
        .open()
        .unwrap_err();
    assert!(err.to_string().contains("default_backend"), "{err}");
}
