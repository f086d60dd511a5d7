// Licensed under the Apache-2.0 license

//! Register-map entity graph.
//!
//! The model mirrors what a CMSIS-SVD style description carries once an
//! external loader has resolved it:
//!
//! ```text
//! Device
//! └── peripherals: Vec<Peripheral>
//!     ├── interrupts: Vec<Interrupt>
//!     └── registers: Vec<Register>
//!         └── fields: Vec<Field>
//! ```
//!
//! Entities are built once and only mutated in place afterwards, either by
//! the dual-core merge (renames, ownership moves) or by the clustering engine
//! (dimension tags and template relabels). Sibling order is the input order
//! and is never changed, so an [`EntityPath`] stays valid for the lifetime of
//! a device once the merge has run.

use crate::dims::FamilyId;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Register sizes accepted by [`Device::validate`].
pub const REGISTER_SIZES: [u32; 4] = [8, 16, 32, 64];

//=============================================================================
// Access
//=============================================================================

/// Software access rights of a register or field.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Access {
    ReadOnly,
    WriteOnly,
    /// Fallback applied upstream when the description leaves access unspecified.
    #[default]
    ReadWrite,
    WriteOnce,
    ReadWriteOnce,
}

//=============================================================================
// Dimension tag
//=============================================================================

/// Array membership attached to an entity by the clustering engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimTag {
    /// Index-stripped name shared by every member of the family.
    pub template: String,
    /// Position of this entity within the family.
    pub index: u32,
    /// Family this entity belongs to.
    pub family: FamilyId,
}

//=============================================================================
// Entities
//=============================================================================

/// A vector-table entry owned by a peripheral.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interrupt {
    pub name: String,
    /// Vector number.
    pub value: u32,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dim: Option<DimTag>,
}

/// A named bit range within a register.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub bit_offset: u32,
    pub bit_width: u32,
    #[serde(default)]
    pub description: String,
    /// Inherits the owning register's access when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access: Option<Access>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dim: Option<DimTag>,
}

impl Field {
    /// Bit just past the most significant bit of this field; `None` when
    /// the range does not fit in 32 bits.
    pub fn end_bit(&self) -> Option<u32> {
        self.bit_offset.checked_add(self.bit_width)
    }
}

/// A fixed-width addressable location within a peripheral.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Register {
    pub name: String,
    /// Byte offset from the owning peripheral's base address.
    pub address_offset: u64,
    /// Width in bits.
    pub size: u32,
    #[serde(default)]
    pub access: Access,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reset_value: Option<u64>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub fields: Vec<Field>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dim: Option<DimTag>,
}

impl Register {
    /// Effective access of a field, resolving inheritance from this register.
    pub fn field_access(&self, field: &Field) -> Access {
        field.access.unwrap_or(self.access)
    }
}

/// A named, base-addressed block of registers.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peripheral {
    pub name: String,
    pub base_address: u64,
    /// Size of the address block in bytes; zero when the description omits it.
    #[serde(default)]
    pub address_size: u64,
    #[serde(default)]
    pub registers: Vec<Register>,
    #[serde(default)]
    pub interrupts: Vec<Interrupt>,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub derived_from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dim: Option<DimTag>,
}

impl Peripheral {
    pub fn register_named(&self, name: &str) -> Option<&Register> {
        self.registers.iter().find(|r| r.name == name)
    }
}

/// A register map for one core, or the merged map of several cores.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub peripherals: Vec<Peripheral>,
}

//=============================================================================
// EntityPath
//=============================================================================

/// Typed position of an entity inside a [`Device`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum EntityPath {
    Peripheral {
        peripheral: usize,
    },
    Register {
        peripheral: usize,
        register: usize,
    },
    Field {
        peripheral: usize,
        register: usize,
        field: usize,
    },
    Interrupt {
        peripheral: usize,
        interrupt: usize,
    },
}

impl fmt::Display for EntityPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityPath::Peripheral { peripheral } => write!(f, "p{peripheral}"),
            EntityPath::Register {
                peripheral,
                register,
            } => write!(f, "p{peripheral}.r{register}"),
            EntityPath::Field {
                peripheral,
                register,
                field,
            } => write!(f, "p{peripheral}.r{register}.f{field}"),
            EntityPath::Interrupt {
                peripheral,
                interrupt,
            } => write!(f, "p{peripheral}.i{interrupt}"),
        }
    }
}

impl Device {
    pub fn peripheral_named(&self, name: &str) -> Option<&Peripheral> {
        self.peripherals.iter().find(|p| p.name == name)
    }

    /// Name of the entity at `path`.
    pub fn name(&self, path: EntityPath) -> Option<&str> {
        match path {
            EntityPath::Peripheral { peripheral } => {
                self.peripherals.get(peripheral).map(|p| p.name.as_str())
            }
            EntityPath::Register {
                peripheral,
                register,
            } => self.register(peripheral, register).map(|r| r.name.as_str()),
            EntityPath::Field {
                peripheral,
                register,
                field,
            } => self
                .register(peripheral, register)
                .and_then(|r| r.fields.get(field))
                .map(|f| f.name.as_str()),
            EntityPath::Interrupt {
                peripheral,
                interrupt,
            } => self
                .peripherals
                .get(peripheral)
                .and_then(|p| p.interrupts.get(interrupt))
                .map(|i| i.name.as_str()),
        }
    }

    pub fn name_mut(&mut self, path: EntityPath) -> Option<&mut String> {
        match path {
            EntityPath::Peripheral { peripheral } => {
                self.peripherals.get_mut(peripheral).map(|p| &mut p.name)
            }
            EntityPath::Register {
                peripheral,
                register,
            } => self.register_mut(peripheral, register).map(|r| &mut r.name),
            EntityPath::Field {
                peripheral,
                register,
                field,
            } => self
                .register_mut(peripheral, register)
                .and_then(|r| r.fields.get_mut(field))
                .map(|f| &mut f.name),
            EntityPath::Interrupt {
                peripheral,
                interrupt,
            } => self
                .peripherals
                .get_mut(peripheral)
                .and_then(|p| p.interrupts.get_mut(interrupt))
                .map(|i| &mut i.name),
        }
    }

    /// Dimension tag of the entity at `path`. `None` when the path is stale
    /// or the entity is not part of a family.
    pub fn dim(&self, path: EntityPath) -> Option<&DimTag> {
        match path {
            EntityPath::Peripheral { peripheral } => {
                self.peripherals.get(peripheral).and_then(|p| p.dim.as_ref())
            }
            EntityPath::Register {
                peripheral,
                register,
            } => self
                .register(peripheral, register)
                .and_then(|r| r.dim.as_ref()),
            EntityPath::Field {
                peripheral,
                register,
                field,
            } => self
                .register(peripheral, register)
                .and_then(|r| r.fields.get(field))
                .and_then(|f| f.dim.as_ref()),
            EntityPath::Interrupt {
                peripheral,
                interrupt,
            } => self
                .peripherals
                .get(peripheral)
                .and_then(|p| p.interrupts.get(interrupt))
                .and_then(|i| i.dim.as_ref()),
        }
    }

    pub fn dim_mut(&mut self, path: EntityPath) -> Option<&mut Option<DimTag>> {
        match path {
            EntityPath::Peripheral { peripheral } => {
                self.peripherals.get_mut(peripheral).map(|p| &mut p.dim)
            }
            EntityPath::Register {
                peripheral,
                register,
            } => self.register_mut(peripheral, register).map(|r| &mut r.dim),
            EntityPath::Field {
                peripheral,
                register,
                field,
            } => self
                .register_mut(peripheral, register)
                .and_then(|r| r.fields.get_mut(field))
                .map(|f| &mut f.dim),
            EntityPath::Interrupt {
                peripheral,
                interrupt,
            } => self
                .peripherals
                .get_mut(peripheral)
                .and_then(|p| p.interrupts.get_mut(interrupt))
                .map(|i| &mut i.dim),
        }
    }

    fn register(&self, peripheral: usize, register: usize) -> Option<&Register> {
        self.peripherals
            .get(peripheral)
            .and_then(|p| p.registers.get(register))
    }

    fn register_mut(&mut self, peripheral: usize, register: usize) -> Option<&mut Register> {
        self.peripherals
            .get_mut(peripheral)
            .and_then(|p| p.registers.get_mut(register))
    }

    /// Total number of interrupts, registers and fields in the device.
    pub fn entity_count(&self) -> usize {
        self.peripherals
            .iter()
            .map(|p| {
                1 + p.interrupts.len()
                    + p.registers
                        .iter()
                        .map(|r| 1 + r.fields.len())
                        .sum::<usize>()
            })
            .sum()
    }

    /// Check the well-formedness rules the core relies on.
    ///
    /// This belongs to the loading boundary: merging and clustering assume a
    /// device that passes it and never call it themselves.
    pub fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        for periph in &self.peripherals {
            if !names.insert(periph.name.as_str()) {
                return Err(malformed(&periph.name, "duplicate peripheral name"));
            }
            periph.validate()?;
        }
        Ok(())
    }
}

impl Peripheral {
    fn validate(&self) -> Result<()> {
        let mut interrupts = HashSet::new();
        for isr in &self.interrupts {
            if !interrupts.insert(isr.name.as_str()) {
                return Err(malformed(
                    &format!("{}.{}", self.name, isr.name),
                    "duplicate interrupt name",
                ));
            }
        }

        let mut registers = HashSet::new();
        for reg in &self.registers {
            let path = format!("{}.{}", self.name, reg.name);
            if !registers.insert(reg.name.as_str()) {
                return Err(malformed(&path, "duplicate register name"));
            }
            if !REGISTER_SIZES.contains(&reg.size) {
                return Err(malformed(
                    &path,
                    &format!("unsupported register size {}", reg.size),
                ));
            }
            let end = reg.address_offset.checked_add(u64::from(reg.size / 8));
            if self.address_size > 0 && end.map_or(true, |end| end > self.address_size) {
                return Err(malformed(
                    &path,
                    &format!(
                        "offset 0x{:x} lies outside the 0x{:x} byte address block",
                        reg.address_offset, self.address_size
                    ),
                ));
            }

            let mut fields = HashSet::new();
            for field in &reg.fields {
                let path = format!("{path}.{}", field.name);
                if !fields.insert(field.name.as_str()) {
                    return Err(malformed(&path, "duplicate field name"));
                }
                if field.bit_width == 0 {
                    return Err(malformed(&path, "zero bit width"));
                }
                if field.end_bit().map_or(true, |end| end > reg.size) {
                    return Err(malformed(
                        &path,
                        &format!(
                            "{} bits at bit {} exceed the {}-bit register",
                            field.bit_width, field.bit_offset, reg.size
                        ),
                    ));
                }
            }
        }
        Ok(())
    }
}

fn malformed(path: &str, reason: &str) -> Error {
    Error::Malformed {
        path: path.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timer() -> Peripheral {
        Peripheral {
            name: "TIM2".into(),
            base_address: 0x4000_0000,
            address_size: 0x400,
            registers: vec![Register {
                name: "CR1".into(),
                address_offset: 0,
                size: 32,
                fields: vec![
                    Field {
                        name: "CEN".into(),
                        bit_offset: 0,
                        bit_width: 1,
                        ..Default::default()
                    },
                    Field {
                        name: "CKD".into(),
                        bit_offset: 8,
                        bit_width: 2,
                        ..Default::default()
                    },
                ],
                ..Default::default()
            }],
            interrupts: vec![Interrupt {
                name: "TIM2".into(),
                value: 28,
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_access_defaults_to_read_write() {
        assert_eq!(Access::default(), Access::ReadWrite);
        let mut reg = timer().registers.remove(0);
        reg.access = Access::ReadOnly;
        assert_eq!(reg.field_access(&reg.fields[0]), Access::ReadOnly);
        reg.fields[0].access = Some(Access::WriteOnly);
        assert_eq!(reg.field_access(&reg.fields[0]), Access::WriteOnly);
    }

    #[test]
    fn test_paths() {
        let mut device = Device {
            name: "dev".into(),
            peripherals: vec![timer()],
            ..Default::default()
        };
        let field = EntityPath::Field {
            peripheral: 0,
            register: 0,
            field: 1,
        };
        assert_eq!(device.name(field), Some("CKD"));
        *device.name_mut(field).unwrap() = "CKDIV".into();
        assert_eq!(device.peripherals[0].registers[0].fields[1].name, "CKDIV");
        assert!(device.dim(field).is_none());
        assert!(device
            .name(EntityPath::Register {
                peripheral: 0,
                register: 4
            })
            .is_none());
        assert_eq!(field.to_string(), "p0.r0.f1");
        assert_eq!(device.entity_count(), 5);
    }

    #[test]
    fn test_validate_accepts_well_formed() {
        let device = Device {
            name: "dev".into(),
            peripherals: vec![timer()],
            ..Default::default()
        };
        device.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_overflowing_field() {
        let mut periph = timer();
        periph.registers[0].fields[1].bit_offset = 31;
        let device = Device {
            name: "dev".into(),
            peripherals: vec![periph],
            ..Default::default()
        };
        match device.validate() {
            Err(Error::Malformed { path, .. }) => assert_eq!(path, "TIM2.CR1.CKD"),
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn test_validate_rejects_overflowing_ranges() {
        let mut periph = timer();
        periph.registers[0].fields[0].bit_offset = u32::MAX;
        let device = Device {
            name: "dev".into(),
            peripherals: vec![periph],
            ..Default::default()
        };
        assert!(matches!(device.validate(), Err(Error::Malformed { .. })));

        let mut periph = timer();
        periph.registers[0].address_offset = u64::MAX;
        let device = Device {
            name: "dev".into(),
            peripherals: vec![periph],
            ..Default::default()
        };
        match device.validate() {
            Err(Error::Malformed { path, .. }) => assert_eq!(path, "TIM2.CR1"),
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn test_validate_rejects_register_outside_block() {
        let mut periph = timer();
        periph.registers[0].address_offset = 0x400;
        let device = Device {
            name: "dev".into(),
            peripherals: vec![periph],
            ..Default::default()
        };
        assert!(device.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_duplicate_peripherals() {
        let device = Device {
            name: "dev".into(),
            peripherals: vec![timer(), timer()],
            ..Default::default()
        };
        assert!(device.validate().is_err());
    }

    #[test]
    fn test_deserialize_applies_fallbacks() {
        let json = r#"{
            "name": "dev",
            "peripherals": [{
                "name": "GPIOA",
                "base_address": 1207959552,
                "registers": [{ "name": "MODER", "address_offset": 0, "size": 32 }]
            }]
        }"#;
        let device: Device = serde_json::from_str(json).unwrap();
        let reg = &device.peripherals[0].registers[0];
        assert_eq!(reg.access, Access::ReadWrite);
        assert!(reg.fields.is_empty());
        assert!(reg.dim.is_none());
    }
}
