//! Storage routing for uploaded files
//!
//! A [`StorageRouter`] picks the [`AccessPolicy`] registered for a content
//! type, validates and stores uploads through the configured backends and
//! resolves storage URLs back to read URLs and metadata.

pub mod configured;
pub mod error;
pub mod path;
pub mod policy;
pub mod registry;
pub mod router;
pub mod telemetry;
mod upload;

pub use configured::{build_policies, load_policies, ConfiguredPolicy, PolicyDefinition, ReadAccess};
pub use error::{FssError, FssResult};
pub use policy::AccessPolicy;
pub use registry::{Registry, RegistryBuilder, RegistryError};
pub use router::StorageRouter;
pub use telemetry::init_telemetry;
