//! Partition catalog operations: full repair and incremental partition add.

use async_trait::async_trait;
use chrono::{Datelike, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::client::{AthenaClient, AthenaError};

/// Time-bucketed partition coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionKey {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
}

impl PartitionKey {
    pub fn from_timestamp(ts: NaiveDateTime) -> Self {
        Self {
            year: ts.year(),
            month: ts.month(),
            day: ts.day(),
            hour: ts.hour(),
            minute: ts.minute(),
        }
    }
}

/// A rendered statement with its execution context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogStatement {
    pub sql: String,
    pub database: String,
    pub output_location: String,
}

/// First dot-separated label of a bucket name.
fn bucket_label(bucket: &str) -> &str {
    bucket.split('.').next().unwrap_or(bucket)
}

/// Full repair of the table named after the landed bucket.
pub fn repair_statement(bucket: &str) -> CatalogStatement {
    let name = bucket_label(bucket);
    CatalogStatement {
        sql: format!("MSCK REPAIR TABLE {name}"),
        database: name.to_string(),
        output_location: format!("s3://{name}.log/"),
    }
}

/// Incremental add of one partition to the staging table for `bucket`.
pub fn add_partition_statement(
    database_name: &str,
    bucket: &str,
    key: &PartitionKey,
) -> CatalogStatement {
    let name = bucket_label(bucket).replace('-', "_");
    CatalogStatement {
        sql: format!(
            "ALTER TABLE precis_forecast_{name}_data_add ADD PARTITION \
             (year={},month={},date={},hour={},minute={})",
            key.year, key.month, key.day, key.hour, key.minute
        ),
        database: format!("{database_name}_staging"),
        output_location: format!("s3://{name}.log/"),
    }
}

/// Catalog operations the partition registrar depends on.
///
/// Repair must be safe to repeat. Adding a partition twice is left to the
/// catalog's own duplicate handling.
#[async_trait]
pub trait PartitionCatalog: Send + Sync {
    async fn repair(&self, bucket: &str) -> Result<(), AthenaError>;

    async fn add_partition(&self, bucket: &str, key: &PartitionKey) -> Result<(), AthenaError>;
}

/// [`PartitionCatalog`] backed by Athena DDL statements.
pub struct AthenaCatalog {
    client: AthenaClient,
}

impl AthenaCatalog {
    pub fn new(client: AthenaClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PartitionCatalog for AthenaCatalog {
    async fn repair(&self, bucket: &str) -> Result<(), AthenaError> {
        let meta = self.client.execute(&repair_statement(bucket)).await?;
        info!(bucket, query_id = %meta.query_id, state = %meta.state, "Repair submitted");
        Ok(())
    }

    async fn add_partition(&self, bucket: &str, key: &PartitionKey) -> Result<(), AthenaError> {
        let statement = add_partition_statement(&self.client.config().database_name, bucket, key);
        let meta = self.client.execute(&statement).await?;
        info!(bucket, ?key, query_id = %meta.query_id, state = %meta.state, "Partition add submitted");
        Ok(())
    }
}
