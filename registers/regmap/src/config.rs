// Licensed under the Apache-2.0 license

//! Policies for merging, normalizing and clustering a register map.
//!
//! Every knob the engine consults lives here instead of being hard-coded, so
//! the behavior for a given chip family can be pinned in a TOML file:
//!
//! ```toml
//! [cores]
//! primary = "CM7"
//! secondary = "CM4"
//!
//! [cluster.registers]
//! min_members = 2
//! skip_within = ["RCC"]
//! ```
//!
//! # Example
//!
//! ```
//! use mcu_registers_regmap::config::{ClusterConfig, LevelPolicy};
//!
//! let config = ClusterConfig::with_defaults()
//!     .placeholder('X')
//!     .fields(LevelPolicy::digits().min_members(2));
//! assert_eq!(config.fields.min_members, 2);
//! assert!(!config.fields.letters);
//! ```

use crate::error::{Error, Result};
use crate::pattern::DiffModes;
use serde::{Deserialize, Serialize};

/// Largest extent accepted by default at every level.
pub const DEFAULT_MAX_EXTENT: u32 = 100;

/// Name prefixes identifying each core of a dual-core device.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawCorePrefixes")]
pub struct CorePrefixes {
    primary: String,
    secondary: String,
}

#[derive(Deserialize)]
struct RawCorePrefixes {
    primary: String,
    secondary: String,
}

impl TryFrom<RawCorePrefixes> for CorePrefixes {
    type Error = Error;

    fn try_from(raw: RawCorePrefixes) -> Result<Self> {
        CorePrefixes::new(&raw.primary, &raw.secondary)
    }
}

impl CorePrefixes {
    /// Both prefixes must be non-empty, distinct and made of identifier
    /// characters, otherwise prefixed names could collide.
    pub fn new(primary: &str, secondary: &str) -> Result<Self> {
        for prefix in [primary, secondary] {
            if prefix.is_empty()
                || !prefix
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_')
            {
                return Err(Error::InvalidPrefix(prefix.to_string()));
            }
        }
        if primary == secondary {
            return Err(Error::InvalidPrefix(secondary.to_string()));
        }
        Ok(Self {
            primary: primary.to_string(),
            secondary: secondary.to_string(),
        })
    }

    pub fn primary(&self) -> &str {
        &self.primary
    }

    pub fn secondary(&self) -> &str {
        &self.secondary
    }

    /// `name` as owned exclusively by the primary core.
    pub fn primary_name(&self, name: &str) -> String {
        format!("{}_{}", self.primary, name)
    }

    /// `name` as owned exclusively by the secondary core.
    pub fn secondary_name(&self, name: &str) -> String {
        format!("{}_{}", self.secondary, name)
    }
}

/// Clustering policy for one level of the hierarchy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelPolicy {
    /// Group names differing by a decimal run (`TIM2`, `TIM3`).
    pub digits: bool,
    /// Group names differing by a single letter (`GPIOA`, `GPIOB`).
    pub letters: bool,
    /// Families with fewer members are rolled back.
    pub min_members: usize,
    /// Families whose extent would exceed this are rolled back.
    pub max_extent: u32,
    /// Entity names that are never clustered.
    pub skip_names: Vec<String>,
    /// Parent names whose children are never clustered at this level.
    pub skip_within: Vec<String>,
}

impl Default for LevelPolicy {
    fn default() -> Self {
        Self::digits()
    }
}

impl LevelPolicy {
    /// Digit mode only, pairs allowed.
    pub fn digits() -> Self {
        Self {
            digits: true,
            letters: false,
            min_members: 2,
            max_extent: DEFAULT_MAX_EXTENT,
            skip_names: vec![],
            skip_within: vec![],
        }
    }

    /// Digit and letter mode, pairs allowed.
    pub fn digits_and_letters() -> Self {
        Self {
            letters: true,
            ..Self::digits()
        }
    }

    /// Clustering switched off for this level.
    pub fn disabled() -> Self {
        Self {
            digits: false,
            letters: false,
            ..Self::digits()
        }
    }

    pub fn min_members(mut self, min: usize) -> Self {
        self.min_members = min;
        self
    }

    pub fn max_extent(mut self, max: u32) -> Self {
        self.max_extent = max;
        self
    }

    pub fn letters(mut self, enabled: bool) -> Self {
        self.letters = enabled;
        self
    }

    pub fn skip_name(mut self, name: &str) -> Self {
        self.skip_names.push(name.to_string());
        self
    }

    pub fn skip_within(mut self, parent: &str) -> Self {
        self.skip_within.push(parent.to_string());
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.digits || self.letters
    }

    pub fn modes(&self) -> DiffModes {
        DiffModes {
            digits: self.digits,
            letters: self.letters,
        }
    }

    pub fn skips(&self, name: &str) -> bool {
        self.skip_names.iter().any(|n| n == name)
    }

    pub fn skips_within(&self, parent: &str) -> bool {
        self.skip_within.iter().any(|n| n == parent)
    }

    fn check(&self, level: &str) -> Result<()> {
        if self.max_extent == 0 {
            return Err(Error::Config(format!("{level}: max_extent must be positive")));
        }
        Ok(())
    }
}

/// Knobs of the structural equality check.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EqualityPolicy {
    /// Registers only match when their reset values match.
    pub compare_reset: bool,
    /// Children of a pair matched by identical name may still pair through
    /// the index-aware name check instead of requiring identical names.
    pub reindex_named_pairs: bool,
}

impl Default for EqualityPolicy {
    fn default() -> Self {
        Self {
            compare_reset: false,
            reindex_named_pairs: true,
        }
    }
}

/// Policies for all clustering levels.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    pub peripherals: LevelPolicy,
    pub registers: LevelPolicy,
    pub fields: LevelPolicy,
    pub interrupts: LevelPolicy,
    /// Character standing in for the index inside template names.
    pub placeholder: char,
    pub equality: EqualityPolicy,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl ClusterConfig {
    /// Policy table used for STM32-style descriptions.
    ///
    /// - peripherals: digits and letters, at least 2 members
    /// - registers, fields: digits, at least 3 members
    /// - interrupts: digits, at least 2 members
    /// - extent capped at [`DEFAULT_MAX_EXTENT`] everywhere
    pub fn with_defaults() -> Self {
        Self {
            peripherals: LevelPolicy::digits_and_letters(),
            registers: LevelPolicy::digits().min_members(3),
            fields: LevelPolicy::digits().min_members(3),
            interrupts: LevelPolicy::digits(),
            placeholder: 'x',
            equality: EqualityPolicy::default(),
        }
    }

    /// Every level switched off.
    pub fn none() -> Self {
        Self {
            peripherals: LevelPolicy::disabled(),
            registers: LevelPolicy::disabled(),
            fields: LevelPolicy::disabled(),
            interrupts: LevelPolicy::disabled(),
            ..Self::with_defaults()
        }
    }

    pub fn peripherals(mut self, policy: LevelPolicy) -> Self {
        self.peripherals = policy;
        self
    }

    pub fn registers(mut self, policy: LevelPolicy) -> Self {
        self.registers = policy;
        self
    }

    pub fn fields(mut self, policy: LevelPolicy) -> Self {
        self.fields = policy;
        self
    }

    pub fn interrupts(mut self, policy: LevelPolicy) -> Self {
        self.interrupts = policy;
        self
    }

    pub fn placeholder(mut self, placeholder: char) -> Self {
        self.placeholder = placeholder;
        self
    }

    pub fn equality(mut self, equality: EqualityPolicy) -> Self {
        self.equality = equality;
        self
    }

    /// Reject values the engine cannot honor.
    ///
    /// A placeholder that could itself be part of an index (a digit) would
    /// make templates ambiguous.
    pub fn check(&self) -> Result<()> {
        if self.placeholder.is_ascii_digit() || self.placeholder.is_whitespace() {
            return Err(Error::Config(format!(
                "placeholder {:?} cannot mark an index",
                self.placeholder
            )));
        }
        self.peripherals.check("peripherals")?;
        self.registers.check("registers")?;
        self.fields.check("fields")?;
        self.interrupts.check("interrupts")
    }
}

/// Complete pipeline configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Present for dual-core devices.
    pub cores: Option<CorePrefixes>,
    /// Drop peripheral-name words from register names (`TIM_CR1` → `CR1`).
    pub strip_register_prefixes: bool,
    /// Collapse whitespace and sentence-case every description.
    pub tidy_descriptions: bool,
    pub cluster: ClusterConfig,
}

impl Config {
    pub fn single_core() -> Self {
        Self::default()
    }

    pub fn dual_core(prefixes: CorePrefixes) -> Self {
        Self {
            cores: Some(prefixes),
            ..Self::default()
        }
    }

    pub fn strip_register_prefixes(mut self, strip: bool) -> Self {
        self.strip_register_prefixes = strip;
        self
    }

    pub fn tidy_descriptions(mut self, tidy: bool) -> Self {
        self.tidy_descriptions = tidy;
        self
    }

    pub fn cluster(mut self, cluster: ClusterConfig) -> Self {
        self.cluster = cluster;
        self
    }
}
