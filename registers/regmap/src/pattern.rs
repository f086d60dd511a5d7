// Licensed under the Apache-2.0 license

//! Name-pattern differ.
//!
//! Two names belong to the same indexed family when they differ in exactly
//! one place, and that place is either a decimal run (`TIM2`/`TIM3`,
//! `CH2EN`/`CH12EN`) or a single letter (`GPIOA`/`GPIOB`). The differ finds
//! that place, derives the template name with the varying part replaced by a
//! placeholder, and returns the index each name encodes.
//!
//! # Examples
//!
//! ```
//! use mcu_registers_regmap::pattern::{diff, DiffModes};
//!
//! let d = diff("TIM2", "TIM3", DiffModes::ALL, 'x').unwrap();
//! assert_eq!(d.template, "TIMx");
//! assert_eq!((d.index_a, d.index_b), (2, 3));
//!
//! let d = diff("GPIOA", "GPIOC", DiffModes::ALL, 'x').unwrap();
//! assert_eq!(d.template, "GPIOx");
//! assert_eq!((d.index_a, d.index_b), (0, 2));
//!
//! // Two varying runs never match.
//! assert!(diff("DMA1_S2", "DMA2_S3", DiffModes::ALL, 'x').is_none());
//! ```

use serde::{Deserialize, Serialize};

/// How the varying part of a name is interpreted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffMode {
    /// A decimal run parsed as the index.
    Digits,
    /// One letter; the index is its alphabet position, case-insensitive.
    Letter,
}

/// Which modes a comparison may use.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DiffModes {
    pub digits: bool,
    pub letters: bool,
}

impl DiffModes {
    pub const ALL: DiffModes = DiffModes {
        digits: true,
        letters: true,
    };
    pub const DIGITS: DiffModes = DiffModes {
        digits: true,
        letters: false,
    };
    pub const NONE: DiffModes = DiffModes {
        digits: false,
        letters: false,
    };
}

/// The single varying place between two names.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NameDiff {
    /// Shared name with the varying part replaced by the placeholder.
    pub template: String,
    pub index_a: u32,
    pub index_b: u32,
    /// Character position of the placeholder within `template`.
    pub position: usize,
    pub mode: DiffMode,
}

impl NameDiff {
    /// Whether `other` varies at the same place with the same pair of indices.
    pub fn aligned_with(&self, other: &NameDiff) -> bool {
        self.position == other.position
            && self.mode == other.mode
            && self.index_a == other.index_a
            && self.index_b == other.index_b
    }
}

/// Find the single varying digit run or letter between `a` and `b`.
///
/// The first differing character decides the mode: two digits select digit
/// mode, two letters select letter mode, anything else is no match. Digit
/// runs start at the first difference and extend as far as the digits go in
/// each name, so digits shared before it stay in the template (`TIM12`/`TIM13`
/// give `TIM1x` with 2 and 3). Names that are equal, where one is a prefix of
/// the other, that vary in more than one place, or that encode the same
/// index return `None`.
pub fn diff(a: &str, b: &str, modes: DiffModes, placeholder: char) -> Option<NameDiff> {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let first = a.iter().zip(b.iter()).position(|(x, y)| x != y)?;

    let (ca, cb) = (a[first], b[first]);
    let found = if ca.is_ascii_digit() && cb.is_ascii_digit() {
        if !modes.digits {
            return None;
        }
        digit_diff(&a, &b, first, placeholder)?
    } else if ca.is_ascii_alphabetic() && cb.is_ascii_alphabetic() {
        if !modes.letters {
            return None;
        }
        letter_diff(&a, &b, first, placeholder)?
    } else {
        return None;
    };

    if found.index_a == found.index_b {
        return None;
    }
    Some(found)
}

fn digit_diff(a: &[char], b: &[char], first: usize, placeholder: char) -> Option<NameDiff> {
    let end_a = run_end(a, first);
    let end_b = run_end(b, first);
    if a[end_a..] != b[end_b..] {
        return None;
    }

    let index_a = parse_run(&a[first..end_a])?;
    let index_b = parse_run(&b[first..end_b])?;
    Some(NameDiff {
        template: splice(&a[..first], placeholder, &a[end_a..]),
        index_a,
        index_b,
        position: first,
        mode: DiffMode::Digits,
    })
}

fn letter_diff(a: &[char], b: &[char], at: usize, placeholder: char) -> Option<NameDiff> {
    if a[at + 1..] != b[at + 1..] {
        return None;
    }
    Some(NameDiff {
        template: splice(&a[..at], placeholder, &a[at + 1..]),
        index_a: letter_index(a[at]),
        index_b: letter_index(b[at]),
        position: at,
        mode: DiffMode::Letter,
    })
}

fn run_end(name: &[char], from: usize) -> usize {
    name[from..]
        .iter()
        .position(|c| !c.is_ascii_digit())
        .map_or(name.len(), |n| from + n)
}

fn parse_run(run: &[char]) -> Option<u32> {
    run.iter().collect::<String>().parse().ok()
}

fn letter_index(c: char) -> u32 {
    u32::from(c.to_ascii_lowercase()) - u32::from('a')
}

fn splice(head: &[char], placeholder: char, tail: &[char]) -> String {
    head.iter()
        .copied()
        .chain(std::iter::once(placeholder))
        .chain(tail.iter().copied())
        .collect()
}

/// Rebuild a member name from a template.
///
/// Returns `None` when `position` does not hold a character of `template`.
/// Letter indices are rendered upper-case.
pub fn instantiate(template: &str, position: usize, mode: DiffMode, index: u32) -> Option<String> {
    let chars: Vec<char> = template.chars().collect();
    if position >= chars.len() {
        return None;
    }
    let replacement = match mode {
        DiffMode::Digits => index.to_string(),
        DiffMode::Letter => char::from_u32(u32::from('A') + index)
            .filter(char::is_ascii_uppercase)?
            .to_string(),
    };
    let mut name: String = chars[..position].iter().collect();
    name.push_str(&replacement);
    name.extend(&chars[position + 1..]);
    Some(name)
}
