// Licensed under the Apache-2.0 license

//! Dual-core reconciliation.
//!
//! A dual-core part ships one register map per core. Most blocks are visible
//! identically from both; some exist on one core only. [`merge`] unions the
//! two maps into the first one so that:
//!
//! - an entity present identically on both cores appears once, unprefixed;
//! - an entity present on one core only appears once, its name prefixed with
//!   that core's prefix;
//! - nothing is dropped.
//!
//! Match keys per level:
//!
//! | level      | key                                   |
//! |------------|---------------------------------------|
//! | peripheral | name, base address                    |
//! | interrupt  | name, vector number                   |
//! | register   | name, offset, size, access            |
//! | field      | name, bit offset, bit width           |

use crate::config::CorePrefixes;
use crate::model::{Device, Field, Interrupt, Peripheral, Register};
use log::{debug, info};

fn same_peripheral(a: &Peripheral, b: &Peripheral) -> bool {
    a.name == b.name && a.base_address == b.base_address
}

fn same_interrupt(a: &Interrupt, b: &Interrupt) -> bool {
    a.name == b.name && a.value == b.value
}

fn same_register(a: &Register, b: &Register) -> bool {
    a.name == b.name
        && a.address_offset == b.address_offset
        && a.size == b.size
        && a.access == b.access
}

fn same_field(a: &Field, b: &Field) -> bool {
    a.name == b.name && a.bit_offset == b.bit_offset && a.bit_width == b.bit_width
}

#[derive(Debug, Default)]
struct MergeStats {
    shared: usize,
    primary_only: usize,
    secondary_only: usize,
}

/// Merge the secondary core's map into the primary core's map.
///
/// Core-2-only peripherals are appended to `core1`; core-2-only interrupts,
/// registers and fields are moved into their matching core-1 parent. The
/// order of existing core-1 siblings never changes.
pub fn merge(mut core1: Device, core2: Device, prefixes: &CorePrefixes) -> Device {
    let mut stats = MergeStats::default();

    // Core 1 against core 2: find partners, prefix what core 2 lacks.
    let mut partner = vec![None; core2.peripherals.len()];
    for (i, p1) in core1.peripherals.iter_mut().enumerate() {
        let found = core2
            .peripherals
            .iter()
            .enumerate()
            .find(|(j, p2)| partner[*j].is_none() && same_peripheral(p1, p2))
            .map(|(j, _)| j);
        match found {
            Some(j) => {
                partner[j] = Some(i);
                stats.shared += 1;
                mark_primary_only(p1, &core2.peripherals[j], prefixes);
            }
            None => {
                let name = prefixes.primary_name(&p1.name);
                debug!(
                    "peripheral {} only on {}, renamed {}",
                    p1.name,
                    prefixes.primary(),
                    name
                );
                p1.name = name;
                stats.primary_only += 1;
            }
        }
    }

    // Core 2 against core 1: move or append what core 1 lacks.
    for (j, mut p2) in core2.peripherals.into_iter().enumerate() {
        match partner[j] {
            Some(i) => absorb(&mut core1.peripherals[i], p2, prefixes),
            None => {
                let name = prefixes.secondary_name(&p2.name);
                debug!(
                    "peripheral {} only on {}, appended as {}",
                    p2.name,
                    prefixes.secondary(),
                    name
                );
                p2.name = name;
                core1.peripherals.push(p2);
                stats.secondary_only += 1;
            }
        }
    }

    info!(
        "merged {} and {}: {} shared peripherals, {} {}-only, {} {}-only",
        prefixes.primary(),
        prefixes.secondary(),
        stats.shared,
        stats.primary_only,
        prefixes.primary(),
        stats.secondary_only,
        prefixes.secondary()
    );
    core1
}

fn mark_primary_only(p1: &mut Peripheral, p2: &Peripheral, prefixes: &CorePrefixes) {
    for isr in p1.interrupts.iter_mut() {
        if !p2.interrupts.iter().any(|other| same_interrupt(isr, other)) {
            let name = prefixes.primary_name(&isr.name);
            debug!(
                "{}: interrupt {} only on {}",
                p1.name,
                isr.name,
                prefixes.primary()
            );
            isr.name = name;
        }
    }

    for reg in p1.registers.iter_mut() {
        match p2.registers.iter().find(|other| same_register(reg, other)) {
            Some(other) => {
                for field in reg.fields.iter_mut() {
                    if !other.fields.iter().any(|f| same_field(field, f)) {
                        let name = prefixes.primary_name(&field.name);
                        debug!(
                            "{}.{}: field {} only on {}",
                            p1.name,
                            reg.name,
                            field.name,
                            prefixes.primary()
                        );
                        field.name = name;
                    }
                }
            }
            None => {
                let name = prefixes.primary_name(&reg.name);
                debug!(
                    "{}: register {} only on {}",
                    p1.name,
                    reg.name,
                    prefixes.primary()
                );
                reg.name = name;
            }
        }
    }
}

/// Move the secondary core's unmatched children of `p2` into `p1`.
///
/// Only children `p1` had before the call are searched, so moved entries
/// never match each other.
fn absorb(p1: &mut Peripheral, p2: Peripheral, prefixes: &CorePrefixes) {
    let native = p1.interrupts.len();
    for mut isr in p2.interrupts {
        if !p1.interrupts[..native].iter().any(|own| same_interrupt(own, &isr)) {
            isr.name = prefixes.secondary_name(&isr.name);
            debug!(
                "{}: interrupt {} moved from {}",
                p1.name,
                isr.name,
                prefixes.secondary()
            );
            p1.interrupts.push(isr);
        }
    }

    let native = p1.registers.len();
    for mut reg in p2.registers {
        match p1.registers[..native]
            .iter_mut()
            .find(|own| same_register(own, &reg))
        {
            Some(own) => absorb_fields(own, reg.fields, prefixes),
            None => {
                reg.name = prefixes.secondary_name(&reg.name);
                debug!(
                    "{}: register {} moved from {}",
                    p1.name,
                    reg.name,
                    prefixes.secondary()
                );
                p1.registers.push(reg);
            }
        }
    }
}

fn absorb_fields(own: &mut Register, fields: Vec<Field>, prefixes: &CorePrefixes) {
    let native = own.fields.len();
    for mut field in fields {
        if !own.fields[..native].iter().any(|f| same_field(f, &field)) {
            field.name = prefixes.secondary_name(&field.name);
            debug!(
                "{}: field {} moved from {}",
                own.name,
                field.name,
                prefixes.secondary()
            );
            own.fields.push(field);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Access;

    fn prefixes() -> CorePrefixes {
        CorePrefixes::new("CM7", "CM4").unwrap()
    }

    fn field(name: &str, bit_offset: u32) -> Field {
        Field {
            name: name.into(),
            bit_offset,
            bit_width: 1,
            ..Default::default()
        }
    }

    fn register(name: &str, address_offset: u64, fields: Vec<Field>) -> Register {
        Register {
            name: name.into(),
            address_offset,
            size: 32,
            fields,
            ..Default::default()
        }
    }

    fn peripheral(name: &str, base_address: u64, registers: Vec<Register>) -> Peripheral {
        Peripheral {
            name: name.into(),
            base_address,
            registers,
            ..Default::default()
        }
    }

    fn interrupt(name: &str, value: u32) -> Interrupt {
        Interrupt {
            name: name.into(),
            value,
            ..Default::default()
        }
    }

    fn device(peripherals: Vec<Peripheral>) -> Device {
        Device {
            name: "STM32H7".into(),
            peripherals,
            ..Default::default()
        }
    }

    fn names(device: &Device) -> Vec<&str> {
        device.peripherals.iter().map(|p| p.name.as_str()).collect()
    }

    #[test]
    fn test_shared_peripheral_stays_single() {
        let tim = peripheral(
            "TIM2",
            0x4000_0000,
            vec![register("CR1", 0, vec![field("CEN", 0)])],
        );
        let merged = merge(device(vec![tim.clone()]), device(vec![tim.clone()]), &prefixes());
        assert_eq!(merged.peripherals, vec![tim]);
    }

    #[test]
    fn test_exclusive_peripherals_are_prefixed() {
        let core1 = device(vec![peripheral("UART1", 0x4001_1000, vec![])]);
        let core2 = device(vec![peripheral("HSEM", 0x5802_6400, vec![])]);
        let merged = merge(core1, core2, &prefixes());
        assert_eq!(names(&merged), vec!["CM7_UART1", "CM4_HSEM"]);
    }

    #[test]
    fn test_base_address_is_part_of_the_key() {
        let core1 = device(vec![peripheral("WWDG", 0x5000_3000, vec![])]);
        let core2 = device(vec![peripheral("WWDG", 0x4000_2c00, vec![])]);
        let merged = merge(core1, core2, &prefixes());
        assert_eq!(names(&merged), vec!["CM7_WWDG", "CM4_WWDG"]);
    }

    #[test]
    fn test_registers_reconciled_inside_shared_peripheral() {
        let core1 = device(vec![peripheral(
            "RCC",
            0x5802_4400,
            vec![register("CR", 0, vec![]), register("C1_AHB1ENR", 0x138, vec![])],
        )]);
        let core2 = device(vec![peripheral(
            "RCC",
            0x5802_4400,
            vec![register("CR", 0, vec![]), register("C2_AHB1ENR", 0x198, vec![])],
        )]);
        let merged = merge(core1, core2, &prefixes());
        let regs: Vec<&str> = merged.peripherals[0]
            .registers
            .iter()
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(regs, vec!["CR", "CM7_C1_AHB1ENR", "CM4_C2_AHB1ENR"]);
    }

    #[test]
    fn test_register_access_is_part_of_the_key() {
        let mut ro = register("SR", 4, vec![]);
        ro.access = Access::ReadOnly;
        let core1 = device(vec![peripheral(
            "ADC1",
            0x4002_2000,
            vec![register("SR", 4, vec![])],
        )]);
        let core2 = device(vec![peripheral("ADC1", 0x4002_2000, vec![ro])]);
        let merged = merge(core1, core2, &prefixes());
        let regs = &merged.peripherals[0].registers;
        assert_eq!(regs.len(), 2);
        assert_eq!(regs[0].name, "CM7_SR");
        assert_eq!(regs[1].name, "CM4_SR");
        assert_eq!(regs[1].access, Access::ReadOnly);
    }

    #[test]
    fn test_fields_reconciled_inside_shared_register() {
        let core1 = device(vec![peripheral(
            "EXTI",
            0x5800_0000,
            vec![register("CR", 0, vec![field("EN", 0), field("C1IE", 1)])],
        )]);
        let core2 = device(vec![peripheral(
            "EXTI",
            0x5800_0000,
            vec![register("CR", 0, vec![field("EN", 0), field("C2IE", 2)])],
        )]);
        let merged = merge(core1, core2, &prefixes());
        let fields: Vec<&str> = merged.peripherals[0].registers[0]
            .fields
            .iter()
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(fields, vec!["EN", "CM7_C1IE", "CM4_C2IE"]);
    }

    #[test]
    fn test_interrupts_reconciled() {
        let mut p1 = peripheral("HSEM", 0x5802_6400, vec![]);
        p1.interrupts = vec![interrupt("HSEM0", 125)];
        let mut p2 = p1.clone();
        p2.interrupts = vec![interrupt("HSEM0", 125), interrupt("HSEM1", 126)];
        let mut core1_only = p1.clone();
        core1_only.interrupts = vec![interrupt("HSEM0", 125), interrupt("WAKEUP", 3)];

        let merged = merge(device(vec![core1_only]), device(vec![p2]), &prefixes());
        let isrs: Vec<&str> = merged.peripherals[0]
            .interrupts
            .iter()
            .map(|i| i.name.as_str())
            .collect();
        assert_eq!(isrs, vec!["HSEM0", "CM7_WAKEUP", "CM4_HSEM1"]);
    }

    #[test]
    fn test_merge_is_lossless() {
        let shared = register("CR", 0, vec![field("EN", 0)]);
        let core1 = device(vec![
            peripheral(
                "GPIOA",
                0x5802_0000,
                vec![shared.clone(), register("A", 4, vec![field("X", 0)])],
            ),
            peripheral("UART1", 0x4001_1000, vec![register("ISR", 0x1c, vec![field("TXE", 7)])]),
        ]);
        let core2 = device(vec![
            peripheral("GPIOA", 0x5802_0000, vec![shared, register("B", 8, vec![field("Y", 0)])]),
            peripheral("HSEM", 0x5802_6400, vec![register("C1IER", 0x100, vec![])]),
        ]);

        let before = core1.entity_count() + core2.entity_count();
        // GPIOA, its CR and the CR.EN field exist on both cores.
        let shared_count = 3;
        let merged = merge(core1, core2, &prefixes());
        assert_eq!(merged.entity_count(), before - shared_count);
        merged.validate().unwrap();
    }
}
