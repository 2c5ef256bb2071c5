//! Source registry: a CSV object read by the harvester and corrected by the
//! error path.
//!
//! Corrections are a full read-modify-write of the whole object with no
//! locking. Two reporters racing on the same object can lose one update.
//!
//! Each correction starts from the source object, not from the previous
//! write-back, so the write-back holds only the latest correction and the
//! harvester, which reads the source, sees none of them.

use bytes::Bytes;
use csv::{ReaderBuilder, Terminator, WriterBuilder};
use tracing::{debug, info};

use marketfeed_core::config::RegistryConfig;
use marketfeed_core::source::{SourceRecord, SourceStatus, COL_ID, COL_STATUS};

use crate::backend::{BlobStore, StorageBackend};
use crate::error::StorageError;

pub type Row = Vec<String>;

pub struct SourceRegistry {
    source: BlobStore,
    source_key: String,
    writeback: BlobStore,
    writeback_key: String,
}

impl SourceRegistry {
    pub fn new(
        source: BlobStore,
        source_key: impl Into<String>,
        writeback: BlobStore,
        writeback_key: impl Into<String>,
    ) -> Self {
        Self {
            source,
            source_key: source_key.into(),
            writeback,
            writeback_key: writeback_key.into(),
        }
    }

    /// Registry read from `source_bucket/source_key`, corrected into
    /// `writeback_bucket/ttt/<source_key>`.
    pub fn from_config(backend: &StorageBackend, cfg: &RegistryConfig) -> Result<Self, StorageError> {
        Ok(Self::new(
            backend.open(&cfg.source_bucket)?,
            cfg.source_key.clone(),
            backend.open(&cfg.writeback_bucket)?,
            cfg.writeback_key(),
        ))
    }

    /// Every row of the registry, header included, columns untouched.
    pub async fn load_rows(&self) -> Result<Vec<Row>, StorageError> {
        let data = self.source.get(&self.source_key).await?;
        parse_rows(&data)
    }

    /// Rows that describe a source. Headers and malformed rows are skipped.
    pub async fn load(&self) -> Result<Vec<SourceRecord>, StorageError> {
        let rows = self.load_rows().await?;
        let total = rows.len();
        let records: Vec<SourceRecord> = rows
            .iter()
            .enumerate()
            .filter_map(|(line, row)| match SourceRecord::from_row(row) {
                Ok(rec) => Some(rec),
                Err(e) => {
                    debug!(line, error = %e, "Skipping registry row");
                    None
                }
            })
            .collect();
        debug!(rows = total, records = records.len(), key = %self.source_key, "Loaded source registry");
        Ok(records)
    }

    /// Set every row with this id to `needs_fix` and write the whole
    /// registry to the write-back location, replacing any earlier
    /// correction. Returns the number of rows changed.
    pub async fn mark_needs_fix(&self, id: &str) -> Result<usize, StorageError> {
        let mut rows = self.load_rows().await?;
        let changed = set_status(&mut rows, id, SourceStatus::NeedsFix);
        let data = write_rows(&rows)?;
        self.writeback.put(&self.writeback_key, data).await?;
        info!(
            source_id = id,
            rows_changed = changed,
            bucket = %self.writeback.bucket(),
            key = %self.writeback_key,
            "Registry written back"
        );
        Ok(changed)
    }
}

pub fn parse_rows(data: &[u8]) -> Result<Vec<Row>, StorageError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(data);

    let mut rows = Vec::new();
    for record in reader.records() {
        rows.push(record?.iter().map(str::to_string).collect());
    }
    Ok(rows)
}

pub fn write_rows(rows: &[Row]) -> Result<Bytes, StorageError> {
    let mut writer = WriterBuilder::new()
        .flexible(true)
        .terminator(Terminator::CRLF)
        .from_writer(Vec::new());
    for row in rows {
        writer.write_record(row)?;
    }
    let data = writer
        .into_inner()
        .map_err(|e| StorageError::Other(format!("registry flush failed: {e}")))?;
    Ok(Bytes::from(data))
}

fn set_status(rows: &mut [Row], id: &str, status: SourceStatus) -> usize {
    let mut changed = 0;
    for row in rows.iter_mut() {
        if row.get(COL_ID).map(String::as_str) == Some(id) && row.len() > COL_STATUS {
            row[COL_STATUS] = status.marker().to_string();
            changed += 1;
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;

    const REGISTRY: &str = "ID,URL,Interval,Note,Active,Owner,Added,Type,Pattern,UTC\r\n\
        1,http://x/dir,daily,,1,ops,2018,FTP_FILES,*.csv,0\r\n\
        2,http://y/{year},hourly,,1,ops,2018,LINKS,,10\r\n\
        3,http://z/a.zip,daily,,0,ops,2018,DIRECT,a.zip,0\r\n";

    async fn registry(backend: &StorageBackend) -> SourceRegistry {
        let src = backend.open("sources").unwrap();
        src.put("sources.csv", Bytes::from_static(REGISTRY.as_bytes()))
            .await
            .unwrap();
        SourceRegistry::new(src, "sources.csv", backend.open("dex.test").unwrap(), "ttt/sources.csv")
    }

    #[tokio::test]
    async fn load_skips_header() {
        let backend = StorageBackend::in_memory();
        let reg = registry(&backend).await;
        let records = reg.load().await.unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].id, "1");
        assert_eq!(reg.load_rows().await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn mark_needs_fix_rewrites_only_that_row() {
        let backend = StorageBackend::in_memory();
        let reg = registry(&backend).await;

        assert_eq!(reg.mark_needs_fix("2").await.unwrap(), 1);

        let written = backend.open("dex.test").unwrap().get("ttt/sources.csv").await.unwrap();
        let rows = parse_rows(&written).unwrap();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0][COL_STATUS], "Active");
        assert_eq!(rows[1][COL_STATUS], "1");
        assert_eq!(rows[2][COL_STATUS], "2");
        assert_eq!(rows[2][1], "http://y/{year}");
        assert_eq!(rows[3][COL_STATUS], "0");
    }

    #[tokio::test]
    async fn concurrent_corrections_lose_an_update() {
        let backend = StorageBackend::in_memory();
        let reg = registry(&backend).await;

        // Both reporters read before either writes.
        let (a, b) = tokio::join!(reg.mark_needs_fix("1"), reg.mark_needs_fix("2"));
        assert_eq!(a.unwrap(), 1);
        assert_eq!(b.unwrap(), 1);

        let written = backend.open("dex.test").unwrap().get("ttt/sources.csv").await.unwrap();
        let rows = parse_rows(&written).unwrap();
        let fixed = rows.iter().skip(1).filter(|r| r[COL_STATUS] == "2").count();
        assert_eq!(fixed, 1, "last writer wins; one correction is lost");
    }

    #[tokio::test]
    async fn sequential_corrections_keep_only_the_last() {
        let backend = StorageBackend::in_memory();
        let reg = registry(&backend).await;

        reg.mark_needs_fix("1").await.unwrap();
        reg.mark_needs_fix("2").await.unwrap();

        let written = backend.open("dex.test").unwrap().get("ttt/sources.csv").await.unwrap();
        let rows = parse_rows(&written).unwrap();
        assert_eq!(rows[1][COL_STATUS], "1", "first correction overwritten");
        assert_eq!(rows[2][COL_STATUS], "2");

        // The harvester keeps reading the uncorrected source.
        let records = reg.load().await.unwrap();
        assert!(records.iter().all(|r| r.status != SourceStatus::NeedsFix));
    }

    #[tokio::test]
    async fn unknown_id_still_writes_back() {
        let backend = StorageBackend::in_memory();
        let reg = registry(&backend).await;
        assert_eq!(reg.mark_needs_fix("99").await.unwrap(), 0);
        assert!(backend.open("dex.test").unwrap().exists("ttt/sources.csv").await.unwrap());
    }

    #[tokio::test]
    async fn missing_registry_is_an_error() {
        let backend = StorageBackend::in_memory();
        let reg = SourceRegistry::new(
            backend.open("sources").unwrap(),
            "absent.csv",
            backend.open("dex.test").unwrap(),
            "ttt/absent.csv",
        );
        assert!(reg.load().await.is_err());
        assert!(reg.mark_needs_fix("1").await.is_err());
    }

    #[tokio::test]
    async fn from_config_writes_back_under_ttt() {
        let backend = StorageBackend::in_memory();
        backend
            .open("sources")
            .unwrap()
            .put("sources.csv", Bytes::from_static(REGISTRY.as_bytes()))
            .await
            .unwrap();
        let cfg = RegistryConfig {
            source_bucket: "sources".into(),
            source_key: "sources.csv".into(),
            writeback_bucket: "dex.test".into(),
        };
        let reg = SourceRegistry::from_config(&backend, &cfg).unwrap();
        reg.mark_needs_fix("1").await.unwrap();
        assert!(backend.open("dex.test").unwrap().exists("ttt/sources.csv").await.unwrap());
    }

    #[test]
    fn write_uses_crlf_and_keeps_ragged_rows() {
        let rows = vec![vec!["a".to_string(), "b".to_string()], vec!["c".to_string()]];
        let out = write_rows(&rows).unwrap();
        assert_eq!(&out[..], b"a,b\r\nc\r\n");
    }

    #[test]
    fn parse_accepts_lf_and_crlf() {
        let rows = parse_rows(b"a,b\nc,d\r\ne,f").unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2], vec!["e".to_string(), "f".to_string()]);
    }
}
