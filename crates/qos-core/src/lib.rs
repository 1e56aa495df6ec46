//! # QoS Core
//!
//! Endpoint quality tracking and selection for a multi-chain RPC gateway.
//!
//! For every service (one blockchain network) the engine keeps what it has
//! observed about each endpoint, derives a perceived chain state from those
//! observations, and uses both to pick endpoints that are on the right chain,
//! in sync and not sanctioned.
//!
//! - **[`observation`]**: Decoded response variants fed into the engine.
//!
//! - **[`store`]**: Per-service endpoint records, one write lock per batch.
//!
//! - **[`estimator`]**: Perceived block height, epoch and archival target, published as
//!   lock-free snapshots.
//!
//! - **[`validation`]**: One validator per chain family (EVM, CometBFT, Cosmos SDK, Solana).
//!
//! - **[`selector`]**: Validity filtering, random fallback and TLD-diverse multi-selection.
//!
//! - **[`scheduler`]**: Synthetic checks due per endpoint.
//!
//! - **[`service`]** / **[`registry`]**: Per-service facade and the map of all services.
//!
//! - **[`hydrator`]**: Background task running due checks through an injected executor.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          QosRegistry                         │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │                 QosService<V: Validator>               │  │
//! │  │  ┌───────────────┐  ┌────────────────┐  ┌───────────┐  │  │
//! │  │  │ EndpointStore │─►│ StateEstimator │  │ Validator │  │  │
//! │  │  └───────┬───────┘  └───────┬────────┘  └─────┬─────┘  │  │
//! │  │          └──────────────────┼─────────────────┘        │  │
//! │  │                     ┌───────▼───────┐                  │  │
//! │  │                     │   Selector    │                  │  │
//! │  │                     └───────────────┘                  │  │
//! │  └────────────────────────────────────────────────────────┘  │
//! └───────────────▲──────────────────────────────┬───────────────┘
//!                 │ observations                 │ required checks
//!          ┌──────┴───────┐               ┌──────▼───────┐
//!          │   Gateway    │               │   Hydrator   │
//!          │ interpreters │               │ (tokio task) │
//!          └──────────────┘               └──────────────┘
//! ```
//!
//! ## Data Flow
//!
//! ```text
//! candidates ──► select ──► relay ──► interpreter ──► Observation
//!                  ▲                                      │
//!                  │                                      ▼
//!           perceived state ◄── estimator ◄── changed records ◄── store
//! ```

pub mod clock;
pub mod config;
pub mod endpoint;
pub mod errors;
pub mod estimator;
pub mod hydrator;
pub mod metrics;
pub mod observation;
pub mod registry;
pub mod scheduler;
pub mod selector;
pub mod service;
pub mod store;
pub mod types;
pub mod validation;

pub use errors::{QosError, SelectionError};
pub use observation::{Observation, ObservationBatch, ObservationKind};
pub use registry::QosRegistry;
pub use service::{QosService, ServiceQos};
pub use types::{ChainFamily, EndpointAddr, ServiceId};
