//! In-memory stores backed by [`DashMap`], used by the simulator and by
//! tests (§9 "Durable queue and store abstractions admit an in-memory
//! implementation for tests").

use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use sentinel_core::{NotificationRecord, RunLogRecord, Signal, SignalId, UserId};

use crate::error::{Result, StoreError};
use crate::store::{CasResult, NotificationStore, RunLogStore, SignalStore};

#[derive(Default)]
pub struct MemorySignalStore {
    signals: DashMap<SignalId, Signal>,
}

impl MemorySignalStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SignalStore for MemorySignalStore {
    async fn create(&self, signal: Signal) -> Result<Signal> {
        self.signals.insert(signal.id, signal.clone());
        Ok(signal)
    }

    async fn get(&self, id: SignalId) -> Result<Option<Signal>> {
        Ok(self.signals.get(&id).map(|e| e.value().clone()))
    }

    async fn update(&self, signal: Signal) -> Result<Signal> {
        if !self.signals.contains_key(&signal.id) {
            return Err(StoreError::NotFound(signal.id.to_string()));
        }
        self.signals.insert(signal.id, signal.clone());
        Ok(signal)
    }

    async fn delete(&self, id: SignalId) -> Result<bool> {
        Ok(self.signals.remove(&id).is_some())
    }

    async fn list_by_user(&self, user_id: &UserId) -> Result<Vec<Signal>> {
        Ok(self
            .signals
            .iter()
            .filter(|e| &e.user_id == user_id)
            .map(|e| e.value().clone())
            .collect())
    }

    async fn list_active(&self) -> Result<Vec<Signal>> {
        Ok(self
            .signals
            .iter()
            .filter(|e| e.is_active)
            .map(|e| e.value().clone())
            .collect())
    }

    async fn stamp_evaluated(&self, id: SignalId, at: DateTime<Utc>) -> Result<()> {
        match self.signals.get_mut(&id) {
            Some(mut e) => {
                e.last_evaluated_at = Some(at);
                Ok(())
            }
            None => Err(StoreError::NotFound(id.to_string())),
        }
    }

    async fn compare_and_set_triggered(
        &self,
        id: SignalId,
        expected_last_triggered_at: Option<DateTime<Utc>>,
        at: DateTime<Utc>,
    ) -> Result<CasResult> {
        let mut entry = self.signals.get_mut(&id).ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        if entry.last_triggered_at != expected_last_triggered_at {
            return Ok(CasResult::Conflict {
                current_last_triggered_at: entry.last_triggered_at,
            });
        }
        entry.last_triggered_at = Some(at);
        Ok(CasResult::Ok)
    }
}

#[derive(Default)]
pub struct MemoryNotificationStore {
    records: RwLock<Vec<NotificationRecord>>,
}

impl MemoryNotificationStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NotificationStore for MemoryNotificationStore {
    async fn insert(&self, record: NotificationRecord) -> Result<()> {
        self.records
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(record);
        Ok(())
    }

    async fn list_by_signal(&self, signal_id: SignalId, limit: usize) -> Result<Vec<NotificationRecord>> {
        let records = self.records.read().unwrap_or_else(std::sync::PoisonError::into_inner);
        Ok(records
            .iter()
            .filter(|r| r.signal_id == signal_id)
            .rev()
            .take(limit)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct MemoryRunLogStore {
    records: RwLock<Vec<RunLogRecord>>,
}

impl MemoryRunLogStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RunLogStore for MemoryRunLogStore {
    async fn insert(&self, record: RunLogRecord) -> Result<()> {
        self.records
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(record);
        Ok(())
    }

    async fn list_by_signal(&self, signal_id: SignalId, limit: usize) -> Result<Vec<RunLogRecord>> {
        let records = self.records.read().unwrap_or_else(std::sync::PoisonError::into_inner);
        Ok(records
            .iter()
            .filter(|r| r.signal_id == signal_id)
            .rev()
            .take(limit)
            .cloned()
            .collect())
    }
}
