//! In-memory collaborators shared by the ingest integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;

use marketfeed_athena::{AthenaError, PartitionCatalog, PartitionKey};
use marketfeed_ingest::{
    ErrorReporter, FetchError, FetchWorker, Fetcher, JobPipeline, MarkerStore, Staging,
};
use marketfeed_notify::{Dispatcher, Notification, Notifier, NotifyError};
use marketfeed_queue::{MemoryQueue, QueueConsumer};
use marketfeed_storage::{BlobStore, SourceRegistry, StorageBackend, StorageError};

pub const SUBJECT: &str = "Error from Marketdata Downloader!";
pub const HEADER: &str = "ID,URL,Interval,Note,Active,Owner,Added,Type,Pattern,UTC";

/// One registry row with the ten significant columns.
pub fn row(id: &str, url: &str, interval: &str, status: &str, kind: &str, pattern: &str, utc: &str) -> String {
    format!("{id},{url},{interval},,{status},ops,2018,{kind},{pattern},{utc}")
}

pub fn registry_csv(rows: &[String]) -> String {
    let mut out = String::from(HEADER);
    out.push_str("\r\n");
    for r in rows {
        out.push_str(r);
        out.push_str("\r\n");
    }
    out
}

// ── Fetcher ─────────────────────────────────────────────────────────

#[derive(Default)]
struct Script {
    bodies: HashMap<String, Result<Bytes, String>>,
    listings: HashMap<String, Result<Vec<String>, String>>,
    fetched: Vec<String>,
}

/// Answers fetches from a fixed script; unknown URLs fail like a 404.
#[derive(Default, Clone)]
pub struct ScriptedFetcher {
    script: Arc<Mutex<Script>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn body(&self, url: &str, data: &[u8]) -> &Self {
        self.script
            .lock()
            .unwrap()
            .bodies
            .insert(url.to_string(), Ok(Bytes::copy_from_slice(data)));
        self
    }

    pub fn fail(&self, url: &str, reason: &str) -> &Self {
        self.script
            .lock()
            .unwrap()
            .bodies
            .insert(url.to_string(), Err(reason.to_string()));
        self
    }

    pub fn listing(&self, url: &str, lines: &[&str]) -> &Self {
        self.script.lock().unwrap().listings.insert(
            url.to_string(),
            Ok(lines.iter().map(|l| l.to_string()).collect()),
        );
        self
    }

    pub fn fail_listing(&self, url: &str, reason: &str) -> &Self {
        self.script
            .lock()
            .unwrap()
            .listings
            .insert(url.to_string(), Err(reason.to_string()));
        self
    }

    /// URLs passed to `fetch`, in call order.
    pub fn fetched(&self) -> Vec<String> {
        self.script.lock().unwrap().fetched.clone()
    }
}

fn scripted_error(url: &str, reason: &str) -> FetchError {
    FetchError::Task(format!("{url}: {reason}"))
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes, FetchError> {
        let mut script = self.script.lock().unwrap();
        script.fetched.push(url.to_string());
        match script.bodies.get(url) {
            Some(Ok(data)) => Ok(data.clone()),
            Some(Err(reason)) => Err(scripted_error(url, reason)),
            None => Err(FetchError::Status {
                url: url.to_string(),
                status: 404,
            }),
        }
    }

    async fn list(&self, url: &str) -> Result<Vec<String>, FetchError> {
        match self.script.lock().unwrap().listings.get(url) {
            Some(Ok(lines)) => Ok(lines.clone()),
            Some(Err(reason)) => Err(scripted_error(url, reason)),
            None => Err(FetchError::Status {
                url: url.to_string(),
                status: 404,
            }),
        }
    }
}

// ── Notifier ────────────────────────────────────────────────────────

#[derive(Default, Clone)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<Notification>>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "recording"
    }
}

// ── Catalog ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogCall {
    Repair(String),
    AddPartition(String, PartitionKey),
}

#[derive(Default, Clone)]
pub struct RecordingCatalog {
    calls: Arc<Mutex<Vec<CatalogCall>>>,
    fail_repair: Arc<Mutex<bool>>,
}

impl RecordingCatalog {
    pub fn calls(&self) -> Vec<CatalogCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn set_fail_repair(&self, fail: bool) {
        *self.fail_repair.lock().unwrap() = fail;
    }
}

#[async_trait]
impl PartitionCatalog for RecordingCatalog {
    async fn repair(&self, bucket: &str) -> Result<(), AthenaError> {
        if *self.fail_repair.lock().unwrap() {
            return Err(AthenaError::QueryFailed {
                query_id: "q-1".into(),
                reason: "table not found".into(),
            });
        }
        self.calls.lock().unwrap().push(CatalogCall::Repair(bucket.to_string()));
        Ok(())
    }

    async fn add_partition(&self, bucket: &str, key: &PartitionKey) -> Result<(), AthenaError> {
        self.calls
            .lock()
            .unwrap()
            .push(CatalogCall::AddPartition(bucket.to_string(), *key));
        Ok(())
    }
}

// ── Markers ─────────────────────────────────────────────────────────

/// Marker bucket whose reads or writes can be made to fail.
#[derive(Clone)]
pub struct FlakyMarkers {
    inner: BlobStore,
    fail_exists: Arc<Mutex<bool>>,
    fail_put: Arc<Mutex<bool>>,
}

impl FlakyMarkers {
    pub fn new(inner: BlobStore) -> Self {
        Self {
            inner,
            fail_exists: Arc::default(),
            fail_put: Arc::default(),
        }
    }

    pub fn set_fail_exists(&self, fail: bool) {
        *self.fail_exists.lock().unwrap() = fail;
    }

    pub fn set_fail_put(&self, fail: bool) {
        *self.fail_put.lock().unwrap() = fail;
    }
}

#[async_trait]
impl MarkerStore for FlakyMarkers {
    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        if *self.fail_exists.lock().unwrap() {
            return Err(StorageError::Other("access denied".into()));
        }
        self.inner.exists(key).await
    }

    async fn put(&self, key: &str, body: Bytes) -> Result<(), StorageError> {
        if *self.fail_put.lock().unwrap() {
            return Err(StorageError::Other("access denied".into()));
        }
        self.inner.put(key, body).await
    }
}

// ── Wiring ──────────────────────────────────────────────────────────

pub struct Harness {
    pub backend: StorageBackend,
    pub queue: Arc<MemoryQueue>,
    pub fetcher: ScriptedFetcher,
    pub notifier: RecordingNotifier,
    pub registry: Arc<SourceRegistry>,
    pub staging: tempfile::TempDir,
}

impl Harness {
    /// Memory-backed world with `csv` stored at `sources/sources.csv`.
    pub async fn new(csv: &str) -> Self {
        let backend = StorageBackend::in_memory();
        let sources = backend.open("sources").unwrap();
        sources
            .put("sources.csv", Bytes::from(csv.to_string()))
            .await
            .unwrap();
        let registry = Arc::new(SourceRegistry::new(
            sources,
            "sources.csv",
            backend.open("dex.test").unwrap(),
            "ttt/sources.csv",
        ));
        Self {
            backend,
            queue: Arc::new(MemoryQueue::new()),
            fetcher: ScriptedFetcher::new(),
            notifier: RecordingNotifier::default(),
            registry,
            staging: tempfile::tempdir().unwrap(),
        }
    }

    pub fn landing(&self) -> BlobStore {
        self.backend.open("dex.test").unwrap()
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.staging.path().to_path_buf()
    }

    pub fn pipeline(&self) -> JobPipeline {
        let queue: Arc<dyn QueueConsumer> = self.queue.clone();
        let channels: Vec<Box<dyn Notifier>> = vec![Box::new(self.notifier.clone())];
        let alerts = Arc::new(Dispatcher::new(channels));
        let reporter = ErrorReporter::new(self.registry.clone(), alerts, queue.clone(), SUBJECT);
        JobPipeline::new(
            Arc::new(self.fetcher.clone()),
            self.landing(),
            "POC",
            Staging::new(self.staging_dir()),
            queue,
            reporter,
        )
    }

    pub fn worker(&self, batch_size: u32) -> FetchWorker {
        FetchWorker::new(self.queue.clone(), self.pipeline(), batch_size)
    }

    /// Rows of the corrected registry, if one was written.
    pub async fn written_back(&self) -> Option<Vec<Vec<String>>> {
        let store = self.landing();
        if !store.exists("ttt/sources.csv").await.unwrap() {
            return None;
        }
        let data = store.get("ttt/sources.csv").await.unwrap();
        Some(marketfeed_storage::registry::parse_rows(&data).unwrap())
    }

    pub fn staging_is_empty(&self) -> bool {
        std::fs::read_dir(self.staging.path())
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(true)
    }
}
