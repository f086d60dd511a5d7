// Licensed under the Apache-2.0 license

//! Optional name and text clean-ups applied between merging and clustering.

use crate::model::Device;
use log::debug;

/// Drop words of a register name that repeat the owning peripheral's name.
///
/// Names are split on `_`. A register word is dropped when it equals a word
/// of the peripheral name with its leading and trailing digits removed, so
/// `TIM_CR1` inside `TIM2` becomes `CR1`. Single-word names are left alone,
/// as are renames that would empty the name or collide with a sibling.
///
/// Returns the number of registers renamed.
pub fn strip_register_prefixes(device: &mut Device) -> usize {
    let mut renamed = 0;
    for periph in device.peripherals.iter_mut() {
        let words: Vec<String> = periph
            .name
            .split('_')
            .map(|w| w.trim_matches(|c: char| c.is_ascii_digit()).to_string())
            .collect();

        for i in 0..periph.registers.len() {
            let Some(stripped) = stripped_name(&words, &periph.registers[i].name) else {
                continue;
            };
            if periph.registers.iter().any(|r| r.name == stripped) {
                continue;
            }
            debug!(
                "{}: register {} renamed {}",
                periph.name,
                periph.registers[i].name,
                stripped
            );
            periph.registers[i].name = stripped;
            renamed += 1;
        }
    }
    renamed
}

fn stripped_name(periph_words: &[String], register: &str) -> Option<String> {
    if !register.contains('_') {
        return None;
    }
    let kept: Vec<&str> = register
        .split('_')
        .filter(|w| !periph_words.iter().any(|p| p == w))
        .collect();
    if kept.is_empty() {
        return None;
    }
    let name = kept.join("_");
    (name != register).then_some(name)
}

/// Placeholder given to peripherals, interrupts, registers and fields that
/// carry no description.
pub const NO_DESCRIPTION: &str = "No description.";

/// Rewrite every description with [`tidy_description`].
///
/// Below the device, empty descriptions become [`NO_DESCRIPTION`].
pub fn tidy_descriptions(device: &mut Device) {
    device.description = tidy_description(&device.description);
    for periph in device.peripherals.iter_mut() {
        tidy_or_fill(&mut periph.description);
        for isr in periph.interrupts.iter_mut() {
            tidy_or_fill(&mut isr.description);
        }
        for reg in periph.registers.iter_mut() {
            tidy_or_fill(&mut reg.description);
            for field in reg.fields.iter_mut() {
                tidy_or_fill(&mut field.description);
            }
        }
    }
}

fn tidy_or_fill(description: &mut String) {
    let tidy = tidy_description(description);
    *description = if tidy.is_empty() {
        NO_DESCRIPTION.to_string()
    } else {
        tidy
    };
}

/// Collapse whitespace and apply sentence case.
///
/// The first word of each sentence is capitalized, all-caps words such as
/// acronyms and register names are kept, and every other word is lowered.
pub fn tidy_description(text: &str) -> String {
    let mut words = Vec::new();
    let mut sentence_start = true;
    for word in text.split_whitespace() {
        let tidy = if sentence_start {
            let mut chars = word.chars();
            chars
                .next()
                .map(|c| c.to_uppercase().chain(chars).collect())
                .unwrap_or_default()
        } else if is_all_caps(word) {
            word.to_string()
        } else {
            word.to_lowercase()
        };
        sentence_start = word.ends_with('.');
        words.push(tidy);
    }
    words.join(" ")
}

fn is_all_caps(word: &str) -> bool {
    word.chars().any(char::is_alphabetic) && !word.chars().any(char::is_lowercase)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Field, Interrupt, Peripheral, Register};

    fn periph(name: &str, registers: &[&str]) -> Peripheral {
        Peripheral {
            name: name.into(),
            registers: registers
                .iter()
                .enumerate()
                .map(|(i, r)| Register {
                    name: r.to_string(),
                    address_offset: 4 * i as u64,
                    size: 32,
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }
    }

    fn register_names(device: &Device) -> Vec<&str> {
        device.peripherals[0]
            .registers
            .iter()
            .map(|r| r.name.as_str())
            .collect()
    }

    #[test]
    fn test_strip_peripheral_words() {
        let mut device = Device {
            peripherals: vec![periph("TIM2", &["TIM_CR1", "TIM_SR", "CCMR1"])],
            ..Default::default()
        };
        assert_eq!(strip_register_prefixes(&mut device), 2);
        assert_eq!(register_names(&device), vec!["CR1", "SR", "CCMR1"]);
    }

    #[test]
    fn test_strip_multi_word_peripheral() {
        let mut device = Device {
            peripherals: vec![periph("DMA2_STREAM1", &["DMA_STREAM_CR", "STREAM_NDTR"])],
            ..Default::default()
        };
        strip_register_prefixes(&mut device);
        assert_eq!(register_names(&device), vec!["CR", "NDTR"]);
    }

    #[test]
    fn test_strip_skips_collisions_and_empty_names() {
        let mut device = Device {
            peripherals: vec![periph("ADC1", &["ADC_CR", "CR", "ADC_ADC", "ADC"])],
            ..Default::default()
        };
        assert_eq!(strip_register_prefixes(&mut device), 0);
        assert_eq!(register_names(&device), vec!["ADC_CR", "CR", "ADC_ADC", "ADC"]);
    }

    #[test]
    fn test_tidy_description() {
        assert_eq!(
            tidy_description("  general   Purpose\n timer. counter ENABLE  "),
            "General purpose timer. Counter ENABLE"
        );
        assert_eq!(tidy_description("TIM2 control register 1"), "TIM2 control register 1");
        assert_eq!(tidy_description("end. next DMA channel"), "End. Next DMA channel");
        assert_eq!(tidy_description(""), "");
    }

    #[test]
    fn test_tidy_descriptions_walks_every_level() {
        let mut device = Device {
            description: "a   device".into(),
            peripherals: vec![periph("TIM2", &["CR1"])],
            ..Default::default()
        };
        device.peripherals[0].registers[0].description = "control\nREGISTER".into();
        tidy_descriptions(&mut device);
        assert_eq!(device.description, "A device");
        assert_eq!(device.peripherals[0].registers[0].description, "Control REGISTER");
    }

    #[test]
    fn test_missing_descriptions_are_filled() {
        let mut device = Device {
            peripherals: vec![periph("TIM2", &["CR1"])],
            ..Default::default()
        };
        device.peripherals[0].registers[0].fields = vec![Field {
            name: "CEN".into(),
            bit_width: 1,
            description: " \n ".into(),
            ..Default::default()
        }];
        device.peripherals[0].interrupts = vec![Interrupt {
            name: "TIM2".into(),
            value: 28,
            ..Default::default()
        }];
        tidy_descriptions(&mut device);

        let periph = &device.peripherals[0];
        assert_eq!(periph.description, NO_DESCRIPTION);
        assert_eq!(periph.interrupts[0].description, NO_DESCRIPTION);
        assert_eq!(periph.registers[0].description, NO_DESCRIPTION);
        assert_eq!(periph.registers[0].fields[0].description, NO_DESCRIPTION);
        assert_eq!(device.description, "");
    }
}
