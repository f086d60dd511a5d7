// Licensed under the Apache-2.0 license

//! Undo log for tentative families.
//!
//! Every dimension tag and relabel applied while a family is being built goes
//! through a [`Transaction`]. Aborting the family replays the log in reverse,
//! which restores each touched entity exactly as it was, including entities
//! relabeled more than once.

use crate::model::{DimTag, Device, EntityPath};

#[derive(Debug)]
enum Undo {
    Tag {
        target: EntityPath,
        previous: Option<DimTag>,
    },
    Name {
        target: EntityPath,
        previous: String,
    },
}

#[derive(Debug, Default)]
pub struct Transaction {
    log: Vec<Undo>,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `tag` to the entity at `target`. Returns `false`, recording
    /// nothing, when the path does not resolve.
    pub fn tag(&mut self, device: &mut Device, target: EntityPath, tag: DimTag) -> bool {
        let Some(slot) = device.dim_mut(target) else {
            return false;
        };
        let previous = slot.replace(tag);
        self.log.push(Undo::Tag { target, previous });
        true
    }

    /// Rename the entity at `target`. Returns `false`, recording nothing,
    /// when the path does not resolve.
    pub fn rename(&mut self, device: &mut Device, target: EntityPath, name: String) -> bool {
        let Some(slot) = device.name_mut(target) else {
            return false;
        };
        let previous = std::mem::replace(slot, name);
        self.log.push(Undo::Name { target, previous });
        true
    }

    /// Undo every recorded change, newest first. Returns how many were undone.
    pub fn rollback(self, device: &mut Device) -> usize {
        let undone = self.log.len();
        for undo in self.log.into_iter().rev() {
            match undo {
                Undo::Tag { target, previous } => {
                    if let Some(slot) = device.dim_mut(target) {
                        *slot = previous;
                    }
                }
                Undo::Name { target, previous } => {
                    if let Some(slot) = device.name_mut(target) {
                        *slot = previous;
                    }
                }
            }
        }
        undone
    }

    /// Keep every recorded change. Returns how many there were.
    pub fn commit(self) -> usize {
        self.log.len()
    }
}
