//! In-process review collection for local runs and tests.
//!
//! Counts every call it receives and can be told to fail the next N calls of
//! each operation, which is how store outages are simulated.
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use records::{Document, NewReview, RecordId, ReviewRecord};
use tokio::sync::Mutex;

use crate::database::{ReviewStore, StoreError};

#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<Vec<ReviewRecord>>,
    list_calls: AtomicUsize,
    create_calls: AtomicUsize,
    delete_calls: AtomicUsize,
    failing_lists: AtomicUsize,
    failing_creates: AtomicUsize,
    failing_deletes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<ReviewRecord>) -> Self {
        Self {
            records: Mutex::new(records),
            ..Self::default()
        }
    }

    pub async fn records(&self) -> Vec<ReviewRecord> {
        self.records.lock().await.clone()
    }

    pub fn fail_next_lists(&self, count: usize) {
        self.failing_lists.store(count, Ordering::SeqCst);
    }

    pub fn fail_next_creates(&self, count: usize) {
        self.failing_creates.store(count, Ordering::SeqCst);
    }

    pub fn fail_next_deletes(&self, count: usize) {
        self.failing_deletes.store(count, Ordering::SeqCst);
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.list_calls() + self.create_calls() + self.delete_calls()
    }
}

fn take_failure(remaining: &AtomicUsize, operation: &str) -> Result<(), StoreError> {
    let failed = remaining
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok();

    if failed {
        Err(StoreError::Unavailable(format!("simulated {operation} failure")))
    } else {
        Ok(())
    }
}

#[async_trait]
impl ReviewStore for MemoryStore {
    async fn list_all(&self) -> Result<Vec<ReviewRecord>, StoreError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        take_failure(&self.failing_lists, "list")?;

        Ok(self.records.lock().await.clone())
    }

    async fn create(&self, review: &NewReview) -> Result<RecordId, StoreError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        take_failure(&self.failing_creates, "create")?;

        let id = RecordId::generate();
        self.records
            .lock()
            .await
            .push(Document::from(review).into_record(id.clone()));

        Ok(id)
    }

    async fn delete_by_id(&self, id: &RecordId) -> Result<(), StoreError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        take_failure(&self.failing_deletes, "delete")?;

        self.records.lock().await.retain(|record| &record.id != id);

        Ok(())
    }
}
