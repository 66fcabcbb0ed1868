//! In-memory reader for replay tests

use chrono::{DateTime, Utc};
use factlog_core::{
    truncate_at_effective_date, EventRecord, PendingEvent, ReadFault, StreamIdentity,
    StreamReader, WriteContext,
};

pub(crate) fn record_at(seq: u64, pending: PendingEvent, written: DateTime<Utc>) -> EventRecord {
    pending.into_record(seq, written, WriteContext::new())
}

pub(crate) struct VecReader {
    identity: StreamIdentity,
    events: Vec<EventRecord>,
}

impl VecReader {
    pub(crate) fn new(pending: Vec<PendingEvent>) -> Self {
        let now = Utc::now();
        let events = pending
            .into_iter()
            .enumerate()
            .map(|(i, p)| record_at(i as u64 + 1, p, now))
            .collect();
        Self::from_records(events)
    }

    pub(crate) fn from_records(events: Vec<EventRecord>) -> Self {
        Self {
            identity: StreamIdentity::new("Bank", "Account", "ACC-1").unwrap(),
            events,
        }
    }
}

impl StreamReader for VecReader {
    fn identity(&self) -> &StreamIdentity {
        &self.identity
    }

    fn exists(&self) -> Result<bool, ReadFault> {
        Ok(!self.events.is_empty())
    }

    fn get_events(
        &self,
        from_sequence: u64,
        effective_date: Option<DateTime<Utc>>,
    ) -> Result<Vec<EventRecord>, ReadFault> {
        let mut events: Vec<EventRecord> = self
            .events
            .iter()
            .filter(|e| e.sequence_number >= from_sequence)
            .cloned()
            .collect();
        truncate_at_effective_date(&mut events, effective_date);
        Ok(events)
    }

    fn get_all_instance_keys(
        &self,
        _as_of_date: Option<DateTime<Utc>>,
    ) -> Result<Vec<String>, ReadFault> {
        Ok(vec![self.identity.instance_key().to_string()])
    }
}
