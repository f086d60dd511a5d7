// Licensed under the Apache-2.0 license

//! Structural acceptance of a candidate pair at each level.

use crate::config::EqualityPolicy;
use crate::equality::{compare, Naming, Pairing, Shape};
use crate::model::{Device, EntityPath};

/// A pending rename of a child entity to its family-wide template name.
pub(super) type Relabel = (EntityPath, String);

/// Check that `seed` and `cand` are the same hardware structure.
///
/// Returns the children whose names carry the tested index, paired with the
/// template they should be renamed to once the family is finalized.
pub(super) fn accept(
    device: &Device,
    seed: EntityPath,
    cand: EntityPath,
    naming: &Naming,
    policy: &EqualityPolicy,
) -> Option<Vec<Relabel>> {
    let mut relabels = Vec::new();
    match (seed, cand) {
        (EntityPath::Peripheral { peripheral: a }, EntityPath::Peripheral { peripheral: b }) => {
            let pairs = compare(
                device.peripherals.get(a)?,
                device.peripherals.get(b)?,
                naming,
                policy,
            )?;
            for reg in &pairs {
                if let Some(template) = &reg.template {
                    relabels.push((register(a, reg.left), template.clone()));
                    relabels.push((register(b, reg.right), template.clone()));
                }
                field_relabels((a, reg.left), (b, reg.right), &reg.parts, &mut relabels);
            }
        }
        (
            EntityPath::Register {
                peripheral,
                register: a,
            },
            EntityPath::Register { register: b, .. },
        ) => {
            let registers = &device.peripherals.get(peripheral)?.registers;
            let pairs = compare(registers.get(a)?, registers.get(b)?, naming, policy)?;
            field_relabels((peripheral, a), (peripheral, b), &pairs, &mut relabels);
        }
        (
            EntityPath::Field {
                peripheral,
                register,
                field: a,
            },
            EntityPath::Field { field: b, .. },
        ) => {
            let reg = device.peripherals.get(peripheral)?.registers.get(register)?;
            let (a, b) = (reg.fields.get(a)?, reg.fields.get(b)?);
            if !reg.same_inherited(reg, a, b) {
                return None;
            }
            compare(a, b, naming, policy)?;
        }
        (
            EntityPath::Interrupt {
                peripheral: pa,
                interrupt: a,
            },
            EntityPath::Interrupt {
                peripheral: pb,
                interrupt: b,
            },
        ) => {
            let a = device.peripherals.get(pa)?.interrupts.get(a)?;
            let b = device.peripherals.get(pb)?.interrupts.get(b)?;
            // One vector line listed twice is not a family.
            if a.value == b.value {
                return None;
            }
            compare(a, b, naming, policy)?;
        }
        _ => return None,
    }
    Some(relabels)
}

fn register(peripheral: usize, register: usize) -> EntityPath {
    EntityPath::Register {
        peripheral,
        register,
    }
}

fn field_relabels(
    left: (usize, usize),
    right: (usize, usize),
    pairs: &[Pairing],
    relabels: &mut Vec<Relabel>,
) {
    for field in pairs {
        if let Some(template) = &field.template {
            relabels.push((
                EntityPath::Field {
                    peripheral: left.0,
                    register: left.1,
                    field: field.left,
                },
                template.clone(),
            ));
            relabels.push((
                EntityPath::Field {
                    peripheral: right.0,
                    register: right.1,
                    field: field.right,
                },
                template.clone(),
            ));
        }
    }
}
