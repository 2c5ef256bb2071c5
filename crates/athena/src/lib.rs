pub mod catalog;
pub mod client;
pub mod config;

pub use catalog::{
    add_partition_statement, repair_statement, AthenaCatalog, CatalogStatement, PartitionCatalog,
    PartitionKey,
};
pub use client::{AthenaClient, AthenaError, QueryMetadata};
pub use config::AthenaConfig;
