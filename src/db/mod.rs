//! Data manager behind the data service and the gateway.
//!
//! # Responsibilities
//! - Create and look up databases (threads) by id
//! - Store JSON instances per database and collection
//!
//! # Design Decisions
//! - All state lives under the `/data` namespace of the shared datastore
//! - Multi-instance writes go through one buffered transaction so a call
//!   either lands completely or not at all

pub mod manager;

use thiserror::Error;

use crate::storage::StoreError;

pub use manager::{DbInfo, Manager, DATA_NAMESPACE};

#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("invalid instance: {0}")]
    InvalidInstance(String),

    #[error("invalid name {0:?}")]
    InvalidName(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("encoding: {0}")]
    Encoding(#[from] serde_json::Error),
}
