// Licensed under the Apache-2.0 license

//! Dimension tables handed to the renderer.
//!
//! Every finalized family is listed with its extent and an index-ordered
//! slot table, so array declarations can be emitted in index order with a
//! reserved entry wherever no member carries an index.

use crate::model::{Device, EntityPath};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Identity of a family; stored in every member's [`DimTag`](crate::model::DimTag).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FamilyId(pub u32);

impl fmt::Display for FamilyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The sibling set a family was formed in.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "level")]
pub enum Scope {
    Peripherals,
    /// Registers of one peripheral.
    Registers { peripheral: usize },
    /// Fields of one register.
    Fields { peripheral: usize, register: usize },
    /// Interrupts of the whole device.
    Interrupts,
}

impl Scope {
    /// Scope holding the entity at `path` and its siblings.
    pub fn of(path: EntityPath) -> Self {
        match path {
            EntityPath::Peripheral { .. } => Scope::Peripherals,
            EntityPath::Register { peripheral, .. } => Scope::Registers { peripheral },
            EntityPath::Field {
                peripheral,
                register,
                ..
            } => Scope::Fields {
                peripheral,
                register,
            },
            EntityPath::Interrupt { .. } => Scope::Interrupts,
        }
    }

    /// Paths of every entity in this scope, in sibling order.
    pub fn members(&self, device: &Device) -> Vec<EntityPath> {
        match *self {
            Scope::Peripherals => (0..device.peripherals.len())
                .map(|peripheral| EntityPath::Peripheral { peripheral })
                .collect(),
            Scope::Registers { peripheral } => {
                let count = device
                    .peripherals
                    .get(peripheral)
                    .map_or(0, |p| p.registers.len());
                (0..count)
                    .map(|register| EntityPath::Register {
                        peripheral,
                        register,
                    })
                    .collect()
            }
            Scope::Fields {
                peripheral,
                register,
            } => {
                let count = device
                    .peripherals
                    .get(peripheral)
                    .and_then(|p| p.registers.get(register))
                    .map_or(0, |r| r.fields.len());
                (0..count)
                    .map(|field| EntityPath::Field {
                        peripheral,
                        register,
                        field,
                    })
                    .collect()
            }
            Scope::Interrupts => device
                .peripherals
                .iter()
                .enumerate()
                .flat_map(|(peripheral, p)| {
                    (0..p.interrupts.len()).map(move |interrupt| EntityPath::Interrupt {
                        peripheral,
                        interrupt,
                    })
                })
                .collect(),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Peripherals => write!(f, "peripherals"),
            Scope::Registers { peripheral } => write!(f, "registers of p{peripheral}"),
            Scope::Fields {
                peripheral,
                register,
            } => write!(f, "fields of p{peripheral}.r{register}"),
            Scope::Interrupts => write!(f, "interrupts"),
        }
    }
}

/// A template within a scope.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FamilyKey {
    pub scope: Scope,
    pub template: String,
}

impl fmt::Display for FamilyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} in {}", self.template, self.scope)
    }
}

/// One index of a family.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Slot {
    Member(EntityPath),
    /// No member carries this index; rendered as a reserved entry.
    Vacant,
}

/// A finalized family of structurally identical siblings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Family {
    pub id: FamilyId,
    pub key: FamilyKey,
    /// Array length: largest member index plus one.
    pub extent: u32,
    /// `slots[i]` holds the member with index `i`.
    pub slots: Vec<Slot>,
}

impl Family {
    /// Build the slot table from members keyed by index.
    ///
    /// Returns `None` for an empty member set, or when the largest index
    /// leaves no room for an extent.
    pub fn new(id: FamilyId, key: FamilyKey, members: &BTreeMap<u32, EntityPath>) -> Option<Self> {
        let (&last, _) = members.last_key_value()?;
        let extent = last.checked_add(1)?;
        let slots = (0..extent)
            .map(|i| members.get(&i).map_or(Slot::Vacant, |p| Slot::Member(*p)))
            .collect();
        Some(Self {
            id,
            key,
            extent,
            slots,
        })
    }

    pub fn member(&self, index: u32) -> Option<EntityPath> {
        match self.slots.get(index as usize) {
            Some(Slot::Member(path)) => Some(*path),
            _ => None,
        }
    }

    /// Members in index order.
    pub fn members(&self) -> impl Iterator<Item = (u32, EntityPath)> + '_ {
        self.slots.iter().enumerate().filter_map(|(i, slot)| match slot {
            Slot::Member(path) => Some((i as u32, *path)),
            Slot::Vacant => None,
        })
    }

    pub fn member_count(&self) -> usize {
        self.members().count()
    }

    /// Indices inside the extent that no member carries.
    pub fn vacant(&self) -> impl Iterator<Item = u32> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| matches!(slot, Slot::Vacant))
            .map(|(i, _)| i as u32)
    }
}

/// Why a tentative family was rolled back.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollbackReason {
    /// A member index reached the configured maximum extent.
    MaxExtent { index: u32, max: u32 },
    /// The seed's scan ended with fewer members than required.
    TooFewMembers { found: usize, min: usize },
}

impl fmt::Display for RollbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RollbackReason::MaxExtent { index, max } => {
                write!(f, "index {index} exceeds maximum extent {max}")
            }
            RollbackReason::TooFewMembers { found, min } => {
                write!(f, "{found} members, at least {min} required")
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rollback {
    pub key: FamilyKey,
    pub reason: RollbackReason,
}

/// Every family resolved during a run, plus the rollback log.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    families: Vec<Family>,
    rollbacks: Vec<Rollback>,
}

impl Dimensions {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, family: Family) {
        self.families.push(family);
    }

    pub(crate) fn record_rollback(&mut self, rollback: Rollback) {
        self.rollbacks.push(rollback);
    }

    pub fn get(&self, id: FamilyId) -> Option<&Family> {
        self.families.iter().find(|f| f.id == id)
    }

    pub fn find(&self, key: &FamilyKey) -> Option<&Family> {
        self.families.iter().find(|f| &f.key == key)
    }

    /// Convenience lookup by scope and template name.
    pub fn find_template(&self, scope: &Scope, template: &str) -> Option<&Family> {
        self.families
            .iter()
            .find(|f| &f.key.scope == scope && f.key.template == template)
    }

    /// Families in creation order.
    pub fn iter(&self) -> std::slice::Iter<'_, Family> {
        self.families.iter()
    }

    pub fn len(&self) -> usize {
        self.families.len()
    }

    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }

    pub fn rollbacks(&self) -> &[Rollback] {
        &self.rollbacks
    }
}

impl<'a> IntoIterator for &'a Dimensions {
    type Item = &'a Family;
    type IntoIter = std::slice::Iter<'a, Family>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
