//! Mock Infrastructure for Testing the QoS Engine
//!
//! Reusable fixtures for driving services without a gateway in front of them.
//!
//! ## Components
//!
//! - `ObservationBuilder`: Per-endpoint observation factories for every chain family
//! - `StaticEndpointSource` / `ScriptedExecutor`: Hydrator collaborators with canned answers
//! - Test helpers for building services and registries on a manual clock
//!
//! ## Usage
//!
//! ```ignore
//! use tests::mock_infrastructure::{evm_service, ObservationBuilder};
//!
//! let (service, clock) = evm_service(ValidatorSettings::default());
//! let obs = ObservationBuilder::new("node-1", base_time());
//! service.apply_observations(&batch("eth", obs.evm("0x1", 100)))?;
//! ```

pub mod mocks;

pub use mocks::{ScriptedExecutor, StaticEndpointSource};
pub use test_helpers::*;
