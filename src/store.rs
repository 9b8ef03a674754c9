// src/store.rs

//! In-memory repositories for every record collection.
//!
//! Each collection lives behind its own `RwLock`. Writes go through
//! [`Repository::update`], which applies the mutation to a copy and only
//! commits when it succeeds, bumping the record version. Every commit is
//! announced on a broadcast channel shared by the whole [`CareStore`].

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{RwLock, broadcast};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::models::{
    Appointment, ChatMessage, FundRequest, HomeVisitRecord, Patient, ReferralRecord, TeleConsult,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Patients,
    HomeVisits,
    Referrals,
    FundRequests,
    Appointments,
    TeleConsults,
    ChatMessages,
    Drafts,
}

pub trait Record: Clone + Send + Sync + 'static {
    const COLLECTION: Collection;
    fn id(&self) -> Uuid;
}

#[derive(Debug, Clone, Serialize)]
pub struct Versioned<T> {
    pub version: u64,
    #[serde(flatten)]
    pub record: T,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Inserted,
    Updated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreEvent {
    pub collection: Collection,
    pub id: Uuid,
    pub kind: ChangeKind,
    pub version: u64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("{collection:?} record {id} not found")]
    NotFound { collection: Collection, id: Uuid },
    #[error("record {id} is at version {actual}, expected {expected}")]
    VersionConflict { id: Uuid, expected: u64, actual: u64 },
}

#[async_trait]
pub trait Repository<T: Record>: Send + Sync {
    async fn get(&self, id: Uuid) -> Option<Versioned<T>>;

    /// All records in insertion order.
    async fn list(&self) -> Vec<Versioned<T>>;

    async fn insert(&self, record: T) -> Versioned<T>;

    /// Apply `mutate` to the record. With `expected_version` set, the update is
    /// refused unless the stored version still matches.
    async fn update<F, E>(
        &self,
        id: Uuid,
        expected_version: Option<u64>,
        mutate: F,
    ) -> Result<Versioned<T>, E>
    where
        F: FnOnce(&mut T) -> Result<(), E> + Send,
        E: From<StoreError> + Send;

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent>;
}

struct Table<T> {
    rows: Vec<Versioned<T>>,
    index: HashMap<Uuid, usize>,
}

pub struct InMemoryRepository<T> {
    table: RwLock<Table<T>>,
    events: broadcast::Sender<StoreEvent>,
}

impl<T: Record> InMemoryRepository<T> {
    pub fn new(events: broadcast::Sender<StoreEvent>) -> Self {
        Self {
            table: RwLock::new(Table { rows: Vec::new(), index: HashMap::new() }),
            events,
        }
    }

    pub async fn filter<P>(&self, pred: P) -> Vec<Versioned<T>>
    where
        P: Fn(&T) -> bool,
    {
        let table = self.table.read().await;
        table.rows.iter().filter(|v| pred(&v.record)).cloned().collect()
    }

    pub async fn find<P>(&self, pred: P) -> Option<Versioned<T>>
    where
        P: Fn(&T) -> bool,
    {
        let table = self.table.read().await;
        table.rows.iter().find(|v| pred(&v.record)).cloned()
    }

    pub async fn len(&self) -> usize {
        self.table.read().await.rows.len()
    }

    fn publish(&self, id: Uuid, kind: ChangeKind, version: u64) {
        // no receivers is fine
        let _ = self.events.send(StoreEvent { collection: T::COLLECTION, id, kind, version });
    }
}

#[async_trait]
impl<T: Record> Repository<T> for InMemoryRepository<T> {
    async fn get(&self, id: Uuid) -> Option<Versioned<T>> {
        let table = self.table.read().await;
        table.index.get(&id).map(|&i| table.rows[i].clone())
    }

    async fn list(&self) -> Vec<Versioned<T>> {
        self.table.read().await.rows.clone()
    }

    async fn insert(&self, record: T) -> Versioned<T> {
        let id = record.id();
        let stored = {
            let mut table = self.table.write().await;
            let stored = Versioned { version: 1, record };
            match table.index.get(&id).copied() {
                Some(i) => table.rows[i] = stored.clone(),
                None => {
                    let i = table.rows.len();
                    table.rows.push(stored.clone());
                    table.index.insert(id, i);
                }
            }
            stored
        };
        self.publish(id, ChangeKind::Inserted, stored.version);
        stored
    }

    async fn update<F, E>(
        &self,
        id: Uuid,
        expected_version: Option<u64>,
        mutate: F,
    ) -> Result<Versioned<T>, E>
    where
        F: FnOnce(&mut T) -> Result<(), E> + Send,
        E: From<StoreError> + Send,
    {
        let stored = {
            let mut table = self.table.write().await;
            let Some(&i) = table.index.get(&id) else {
                return Err(StoreError::NotFound { collection: T::COLLECTION, id }.into());
            };

            let current = &table.rows[i];
            if let Some(expected) = expected_version {
                if expected != current.version {
                    return Err(StoreError::VersionConflict {
                        id,
                        expected,
                        actual: current.version,
                    }
                    .into());
                }
            }

            let mut draft = current.record.clone();
            mutate(&mut draft)?;

            let stored = Versioned { version: current.version + 1, record: draft };
            table.rows[i] = stored.clone();
            stored
        };
        self.publish(id, ChangeKind::Updated, stored.version);
        Ok(stored)
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }
}

/// Form snapshot saved from the evidence step of the home-visit wizard.
#[derive(Debug, Clone, Serialize)]
pub struct Draft {
    pub id: Uuid,
    pub key: String,
    pub snapshot: serde_json::Value,
    pub saved_at: DateTime<Utc>,
}

pub struct CareStore {
    pub patients: InMemoryRepository<Patient>,
    pub visits: InMemoryRepository<HomeVisitRecord>,
    pub referrals: InMemoryRepository<ReferralRecord>,
    pub funds: InMemoryRepository<FundRequest>,
    pub appointments: InMemoryRepository<Appointment>,
    pub teleconsults: InMemoryRepository<TeleConsult>,
    pub chat: InMemoryRepository<ChatMessage>,
    drafts: RwLock<HashMap<String, Draft>>,
    events: broadcast::Sender<StoreEvent>,
}

impl CareStore {
    pub fn new(event_buffer: usize) -> Self {
        let (events, _) = broadcast::channel(event_buffer.max(1));
        Self {
            patients: InMemoryRepository::new(events.clone()),
            visits: InMemoryRepository::new(events.clone()),
            referrals: InMemoryRepository::new(events.clone()),
            funds: InMemoryRepository::new(events.clone()),
            appointments: InMemoryRepository::new(events.clone()),
            teleconsults: InMemoryRepository::new(events.clone()),
            chat: InMemoryRepository::new(events.clone()),
            drafts: RwLock::new(HashMap::new()),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    pub async fn patient_by_hn(&self, hn: &str) -> Option<Versioned<Patient>> {
        self.patients.find(|p| p.hn == hn).await
    }

    /// Overwrites any previous snapshot under the same key.
    pub async fn save_draft(&self, key: &str, snapshot: serde_json::Value) -> Draft {
        let draft = {
            let mut drafts = self.drafts.write().await;
            let id = drafts.get(key).map(|d| d.id).unwrap_or_else(Uuid::new_v4);
            let draft = Draft { id, key: key.to_string(), snapshot, saved_at: Utc::now() };
            drafts.insert(key.to_string(), draft.clone());
            draft
        };
        let _ = self.events.send(StoreEvent {
            collection: Collection::Drafts,
            id: draft.id,
            kind: ChangeKind::Updated,
            version: 1,
        });
        draft
    }

    pub async fn draft(&self, key: &str) -> Option<Draft> {
        self.drafts.read().await.get(key).cloned()
    }
}

/// Log every store change until the channel closes.
pub fn spawn_event_logger(mut rx: broadcast::Receiver<StoreEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(ev) => tracing::info!(
                    collection = ?ev.collection,
                    id = %ev.id,
                    kind = ?ev.kind,
                    version = ev.version,
                    "store change"
                ),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event logger lagging, dropped store events");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Appointment;

    fn appointment(hn: &str) -> Appointment {
        Appointment {
            id: Uuid::new_v4(),
            hn: hn.to_string(),
            date: "2025-12-10".into(),
            time: "09:00".into(),
            location: "PCU Ban Nong".into(),
            purpose: None,
            note: None,
        }
    }

    #[tokio::test]
    async fn insert_get_and_list_keep_order() {
        let store = CareStore::new(16);
        let a = store.appointments.insert(appointment("HN001")).await;
        let b = store.appointments.insert(appointment("HN002")).await;

        assert_eq!(a.version, 1);
        let got = store.appointments.get(b.record.id).await.expect("stored");
        assert_eq!(got.record.hn, "HN002");

        let hns: Vec<_> = store.appointments.list().await.into_iter().map(|v| v.record.hn).collect();
        assert_eq!(hns, vec!["HN001", "HN002"]);
    }

    #[tokio::test]
    async fn update_bumps_version_and_publishes() {
        let store = CareStore::new(16);
        let mut rx = store.subscribe();
        let a = store.appointments.insert(appointment("HN001")).await;

        let updated = store
            .appointments
            .update(a.record.id, Some(1), |r| {
                r.time = "13:30".into();
                Ok::<_, StoreError>(())
            })
            .await
            .expect("update");
        assert_eq!(updated.version, 2);
        assert_eq!(updated.record.time, "13:30");

        let first = rx.recv().await.unwrap();
        assert_eq!(first.kind, ChangeKind::Inserted);
        let second = rx.recv().await.unwrap();
        assert_eq!(second.kind, ChangeKind::Updated);
        assert_eq!(second.collection, Collection::Appointments);
        assert_eq!(second.version, 2);
    }

    #[tokio::test]
    async fn stale_version_is_refused() {
        let store = CareStore::new(16);
        let a = store.appointments.insert(appointment("HN001")).await;
        let id = a.record.id;

        store
            .appointments
            .update(id, None, |r| {
                r.note = Some("first tab".into());
                Ok::<_, StoreError>(())
            })
            .await
            .unwrap();

        let err = store
            .appointments
            .update(id, Some(1), |r| {
                r.note = Some("second tab".into());
                Ok::<_, StoreError>(())
            })
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::VersionConflict { id, expected: 1, actual: 2 });
        assert_eq!(
            store.appointments.get(id).await.unwrap().record.note.as_deref(),
            Some("first tab")
        );
    }

    #[tokio::test]
    async fn failed_mutation_leaves_record_untouched() {
        #[derive(Debug)]
        enum Oops {
            Store,
            Nope,
        }
        impl From<StoreError> for Oops {
            fn from(_: StoreError) -> Self {
                Oops::Store
            }
        }

        let store = CareStore::new(16);
        let a = store.appointments.insert(appointment("HN001")).await;
        let res = store
            .appointments
            .update(a.record.id, None, |r| {
                r.time = "changed".into();
                Err(Oops::Nope)
            })
            .await;
        assert!(matches!(res, Err(Oops::Nope)));

        let got = store.appointments.get(a.record.id).await.unwrap();
        assert_eq!(got.version, 1);
        assert_eq!(got.record.time, "09:00");

        let missing = store
            .appointments
            .update(Uuid::new_v4(), None, |_| Ok::<_, Oops>(()))
            .await;
        assert!(matches!(missing, Err(Oops::Store)));
    }

    #[tokio::test]
    async fn drafts_overwrite_by_key() {
        let store = CareStore::new(4);
        let first = store.save_draft("home_visit_draft", serde_json::json!({"step": 7})).await;
        let second = store.save_draft("home_visit_draft", serde_json::json!({"step": 8})).await;
        assert_eq!(first.id, second.id);
        let got = store.draft("home_visit_draft").await.unwrap();
        assert_eq!(got.snapshot["step"], 8);
        assert!(store.draft("other").await.is_none());
    }

    #[tokio::test]
    async fn slow_subscribers_lag_and_logger_stops_on_close() {
        let store = CareStore::new(1);
        let mut rx = store.subscribe();
        let logger_rx = store.subscribe();
        for hn in ["HN001", "HN002", "HN003"] {
            store.appointments.insert(appointment(hn)).await;
        }

        assert_eq!(rx.recv().await, Err(broadcast::error::RecvError::Lagged(2)));
        let last = rx.recv().await.unwrap();
        assert_eq!(last.collection, Collection::Appointments);

        let logger = spawn_event_logger(logger_rx);
        drop(store);
        logger.await.expect("logger exits once every sender is gone");
        assert_eq!(rx.recv().await, Err(broadcast::error::RecvError::Closed));
    }
}
