// Licensed under the Apache-2.0 license

//! Register-map reconciliation and array synthesis.
//!
//! Takes the register map of a device (or one map per core of a dual-core
//! device), merges the cores into one map without losing or duplicating
//! core-specific resources, and detects families of structurally repeated
//! peripherals, registers, fields and interrupts whose names differ only by
//! an index. Each family is annotated so a renderer can emit a single array
//! declaration for it.
//!
//! ```
//! use mcu_registers_regmap::{normalize, Config, Device};
//!
//! let device: Device = serde_json::from_str(r#"{ "name": "dev" }"#).unwrap();
//! let output = normalize(Some(device), None, &Config::single_core()).unwrap();
//! assert!(output.dimensions.is_empty());
//! ```

pub mod cluster;
pub mod config;
pub mod dims;
pub mod equality;
pub mod error;
pub mod model;
pub mod normalize;
pub mod pattern;
mod pipeline;
pub mod reconcile;
pub mod txn;

pub use config::{ClusterConfig, Config, CorePrefixes, EqualityPolicy, LevelPolicy};
pub use dims::{
    Dimensions, Family, FamilyId, FamilyKey, Rollback, RollbackReason, Scope, Slot,
};
pub use error::{Error, Result};
pub use model::{Access, DimTag, Device, EntityPath, Field, Interrupt, Peripheral, Register};
pub use pipeline::{normalize, Output};
