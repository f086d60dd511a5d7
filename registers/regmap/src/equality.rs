// Licensed under the Apache-2.0 license

//! Structural equality of register-map entities.
//!
//! Two peripherals (or registers, or fields) are "the same hardware block"
//! when their own attributes agree and their children can be paired one to
//! one with equal structure, recursively. The recursion is written once over
//! the [`Shape`] trait and reused at every level.
//!
//! Children pair up in two ways:
//!
//! - by identical name, provided they also sit in the same slot (same
//!   address offset for registers, same bit range for fields);
//! - in the same slot with names that differ only by the index currently
//!   being tested, when the comparison is index-aware ([`Naming::Indexed`]).
//!   `TIM2_CR1` inside `TIM2` pairs with `TIM3_CR1` inside `TIM3` because
//!   both names vary at the same position with the same indices as the
//!   peripheral names do.
//!
//! The checker has no side effects. It reports how children were paired
//! ([`Pairing`]) so the clustering engine can relabel index-carrying
//! children to their shared template name.

use crate::config::EqualityPolicy;
use crate::model::{Field, Interrupt, Peripheral, Register};
use crate::pattern::{diff, DiffModes, NameDiff};

/// An entity that can be compared structurally.
pub trait Shape {
    type Part: Shape;

    fn name(&self) -> &str;

    fn parts(&self) -> &[Self::Part];

    /// Whether the entity's own attributes agree, position excluded.
    fn same_layout(&self, other: &Self, policy: &EqualityPolicy) -> bool;

    /// Whether two children occupy the same place in their parents.
    fn same_slot(&self, other: &Self) -> bool;

    /// Whether `a`, a child of `self`, and `b`, a child of `other`, agree on
    /// what they inherit from their parents.
    fn same_inherited(&self, _other: &Self, _a: &Self::Part, _b: &Self::Part) -> bool {
        true
    }
}

impl Shape for Field {
    type Part = Field;

    fn name(&self) -> &str {
        &self.name
    }

    fn parts(&self) -> &[Field] {
        &[]
    }

    /// Access is inherited, so it is compared by the owning register.
    fn same_layout(&self, other: &Self, _policy: &EqualityPolicy) -> bool {
        self.bit_width == other.bit_width
    }

    fn same_slot(&self, other: &Self) -> bool {
        self.bit_offset == other.bit_offset && self.bit_width == other.bit_width
    }
}

impl Shape for Register {
    type Part = Field;

    fn name(&self) -> &str {
        &self.name
    }

    fn parts(&self) -> &[Field] {
        &self.fields
    }

    fn same_layout(&self, other: &Self, policy: &EqualityPolicy) -> bool {
        self.size == other.size
            && self.access == other.access
            && (!policy.compare_reset || self.reset_value == other.reset_value)
    }

    fn same_slot(&self, other: &Self) -> bool {
        self.address_offset == other.address_offset
    }

    fn same_inherited(&self, other: &Self, a: &Field, b: &Field) -> bool {
        self.field_access(a) == other.field_access(b)
    }
}

impl Shape for Peripheral {
    type Part = Register;

    fn name(&self) -> &str {
        &self.name
    }

    fn parts(&self) -> &[Register] {
        &self.registers
    }

    fn same_layout(&self, _other: &Self, _policy: &EqualityPolicy) -> bool {
        true
    }

    fn same_slot(&self, other: &Self) -> bool {
        self.base_address == other.base_address
    }
}

impl Shape for Interrupt {
    type Part = Interrupt;

    fn name(&self) -> &str {
        &self.name
    }

    fn parts(&self) -> &[Interrupt] {
        &[]
    }

    fn same_layout(&self, _other: &Self, _policy: &EqualityPolicy) -> bool {
        true
    }

    fn same_slot(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

/// How names of paired entities must relate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Naming {
    /// Names must be identical.
    Exact,
    /// Names may also differ at the position, and by the indices, of `outer`.
    Indexed {
        outer: NameDiff,
        modes: DiffModes,
        placeholder: char,
    },
}

impl Naming {
    pub fn indexed(outer: NameDiff, modes: DiffModes, placeholder: char) -> Self {
        Naming::Indexed {
            outer,
            modes,
            placeholder,
        }
    }

    /// Template shared by two differently named entities, if this naming
    /// discipline lets them pair.
    pub fn shared_template(&self, a: &str, b: &str) -> Option<String> {
        match self {
            Naming::Exact => None,
            Naming::Indexed {
                outer,
                modes,
                placeholder,
            } => diff(a, b, *modes, *placeholder)
                .filter(|d| d.aligned_with(outer))
                .map(|d| d.template),
        }
    }

    /// Whether `a` and `b` may stand for the same entity.
    pub fn accepts(&self, a: &str, b: &str) -> bool {
        a == b || self.shared_template(a, b).is_some()
    }
}

/// How one child of the left entity was paired with a child of the right.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pairing {
    /// Index among the left entity's children.
    pub left: usize,
    /// Index among the right entity's children.
    pub right: usize,
    /// Shared template when the two names differ by the tested index.
    pub template: Option<String>,
    /// Pairings of the children's own children.
    pub parts: Vec<Pairing>,
}

/// Compare two entities, returning how their children paired up.
///
/// `None` means the entities are not structurally equal.
pub fn compare<T: Shape>(
    a: &T,
    b: &T,
    naming: &Naming,
    policy: &EqualityPolicy,
) -> Option<Vec<Pairing>> {
    if !naming.accepts(a.name(), b.name()) || !a.same_layout(b, policy) {
        return None;
    }
    match_parts(a, b, naming, policy)
}

/// Pair the children of two entities one to one.
///
/// Each left child first looks for an unclaimed right child with the same
/// name in the same slot, then for one in the same slot whose name differs
/// only by the tested index. The first candidate found is final: a pairing
/// whose deeper structure disagrees fails the whole comparison.
pub fn match_parts<T: Shape>(
    parent_a: &T,
    parent_b: &T,
    naming: &Naming,
    policy: &EqualityPolicy,
) -> Option<Vec<Pairing>> {
    let (left, right) = (parent_a.parts(), parent_b.parts());
    if left.len() != right.len() {
        return None;
    }

    let mut claimed = vec![false; right.len()];
    let mut pairings = Vec::with_capacity(left.len());
    for (i, a) in left.iter().enumerate() {
        let open = |j: &usize| !claimed[*j] && a.same_slot(&right[*j]);
        let (j, template) = match (0..right.len())
            .filter(open)
            .find(|&j| right[j].name() == a.name())
        {
            Some(j) => (j, None),
            None => (0..right.len()).filter(open).find_map(|j| {
                naming
                    .shared_template(a.name(), right[j].name())
                    .map(|t| (j, Some(t)))
            })?,
        };

        let b = &right[j];
        if !a.same_layout(b, policy) || !parent_a.same_inherited(parent_b, a, b) {
            return None;
        }
        let inner = if template.is_none() && !policy.reindex_named_pairs {
            Naming::Exact
        } else {
            naming.clone()
        };
        let parts = match_parts(a, b, &inner, policy)?;

        claimed[j] = true;
        pairings.push(Pairing {
            left: i,
            right: j,
            template,
            parts,
        });
    }
    Some(pairings)
}

/// Same bit range and effective access; names identical or differing by the
/// tested index. `reg_a` and `reg_b` own `a` and `b` and supply the access
/// a field without its own inherits.
pub fn fields_equal(
    reg_a: &Register,
    a: &Field,
    reg_b: &Register,
    b: &Field,
    naming: &Naming,
    policy: &EqualityPolicy,
) -> bool {
    a.same_slot(b) && reg_a.same_inherited(reg_b, a, b) && compare(a, b, naming, policy).is_some()
}

/// Same size, access and (when checked) reset value, with pairwise equal
/// fields. The address offset of the registers themselves is ignored.
pub fn registers_equal(
    a: &Register,
    b: &Register,
    naming: &Naming,
    policy: &EqualityPolicy,
) -> bool {
    compare(a, b, naming, policy).is_some()
}

/// Same number of registers, each pairing with an equal register at the
/// same offset.
pub fn peripherals_equal(
    a: &Peripheral,
    b: &Peripheral,
    naming: &Naming,
    policy: &EqualityPolicy,
) -> bool {
    compare(a, b, naming, policy).is_some()
}
