// Licensed under the Apache-2.0 license

//! Clustering and dimension synthesis.
//!
//! Siblings that are structurally identical and whose names differ only by
//! an index (`TIM2`/`TIM3`, `CH1EN`/`CH2EN`) are grouped into families and
//! annotated with a shared template name and their own index, so the
//! renderer can emit one array declaration per family.
//!
//! Levels run strictly in this order, each once:
//!
//! 1. peripherals of the device
//! 2. registers of each peripheral
//! 3. fields of each register
//! 4. interrupts of the whole device
//!
//! Within a scope every unannotated entity in turn is a seed, scanned
//! against every other unannotated sibling in input order, earlier ones
//! included:
//!
//! - the first accepted candidate binds the seed to a template; candidates
//!   yielding any other template are skipped for this seed;
//! - accepted members are annotated at once through a [`Transaction`];
//! - an index at or past the level's maximum extent aborts the family;
//! - a candidate whose index is already taken is rejected, the family goes on;
//! - when the scan ends, a family below the level's minimum size is aborted.
//!
//! Aborting rolls back every annotation and relabel of the family and
//! excludes its template for the rest of the scope. A template names at most
//! one family per scope, so a finalized template is closed to later seeds.
//!
//! Scopes that already carry annotations are reported as they stand and not
//! rescanned, which makes a second run over a clustered device a no-op.
//! Annotations that do not describe well-formed families (an index past the
//! maximum extent, an index or template claimed twice, a family id shared
//! with another scope) are cleared and the scope is scanned afresh.

mod pairs;

use crate::config::{ClusterConfig, LevelPolicy};
use crate::dims::{Dimensions, Family, FamilyId, FamilyKey, Rollback, RollbackReason, Scope};
use crate::equality::Naming;
use crate::model::{DimTag, Device, EntityPath};
use crate::pattern::{diff, DiffMode, NameDiff};
use crate::txn::Transaction;
use log::{debug, info, trace};
use pairs::Relabel;
use std::collections::{BTreeMap, HashSet};

/// Annotate every family found in `device` and return the dimension tables.
pub fn cluster(device: &mut Device, config: &ClusterConfig) -> Dimensions {
    let mut engine = Engine {
        next_id: first_free_id(device),
        device,
        config,
        dims: Dimensions::new(),
    };
    engine.run();
    let dims = engine.dims;
    info!(
        "clustering found {} families, rolled back {}",
        dims.len(),
        dims.rollbacks().len()
    );
    dims
}

/// A family being built for one seed.
struct Draft {
    id: FamilyId,
    template: String,
    position: usize,
    mode: DiffMode,
    members: BTreeMap<u32, EntityPath>,
    relabels: Vec<Relabel>,
    txn: Transaction,
}

impl Draft {
    fn binds(&self, d: &NameDiff) -> bool {
        self.template == d.template && self.position == d.position && self.mode == d.mode
    }
}

struct Engine<'a> {
    device: &'a mut Device,
    config: &'a ClusterConfig,
    dims: Dimensions,
    next_id: u32,
}

impl Engine<'_> {
    fn run(&mut self) {
        self.scan(Scope::Peripherals);

        for peripheral in 0..self.device.peripherals.len() {
            self.scan(Scope::Registers { peripheral });
        }

        // Collected up front: `scan` needs the device mutably.
        let field_scopes: Vec<Scope> = self
            .device
            .peripherals
            .iter()
            .enumerate()
            .flat_map(|(peripheral, p)| {
                (0..p.registers.len()).map(move |register| Scope::Fields {
                    peripheral,
                    register,
                })
            })
            .collect();
        for scope in field_scopes {
            self.scan(scope);
        }

        self.scan(Scope::Interrupts);
    }

    fn scan(&mut self, scope: Scope) {
        let config = self.config;
        let policy = level_policy(config, &scope);
        if !policy.is_enabled() {
            return;
        }
        if let Some(parent) = self.parent_name(&scope) {
            if policy.skips_within(parent) {
                trace!("{scope}: skipped by policy");
                return;
            }
        }

        let members = scope.members(self.device);
        if members.iter().any(|path| self.device.dim(*path).is_some())
            && self.recollect(&scope, &members, policy)
        {
            return;
        }

        // Templates rolled back or already finalized in this scope.
        let mut excluded = HashSet::new();
        for &seed in &members {
            if !self.eligible(seed, policy) {
                continue;
            }
            let mut draft: Option<Draft> = None;
            for &cand in &members {
                if cand == seed || !self.eligible(cand, policy) {
                    continue;
                }
                let (Some(a), Some(b)) = (self.device.name(seed), self.device.name(cand)) else {
                    continue;
                };
                let Some(d) = diff(a, b, policy.modes(), config.placeholder) else {
                    continue;
                };
                if excluded.contains(&d.template) {
                    continue;
                }
                if draft.as_ref().is_some_and(|draft| !draft.binds(&d)) {
                    continue;
                }

                let naming = Naming::indexed(d.clone(), policy.modes(), config.placeholder);
                let Some(relabels) =
                    pairs::accept(self.device, seed, cand, &naming, &config.equality)
                else {
                    continue;
                };
                trace!(
                    "{scope}: {seed} ~ {cand} as {} [{}, {}]",
                    d.template,
                    d.index_a,
                    d.index_b
                );

                let key = FamilyKey {
                    scope: scope.clone(),
                    template: d.template.clone(),
                };
                if let Some(index) = [d.index_a, d.index_b]
                    .into_iter()
                    .find(|i| *i >= policy.max_extent)
                {
                    let reason = RollbackReason::MaxExtent {
                        index,
                        max: policy.max_extent,
                    };
                    self.abort(draft.take(), key, reason, &mut excluded);
                    continue;
                }

                if draft.is_none() {
                    draft = Some(self.open(seed, &d));
                }
                let Some(family) = draft.as_mut() else {
                    continue;
                };
                if family.members.contains_key(&d.index_b) {
                    debug!("{key}: index {} already taken, {cand} rejected", d.index_b);
                    continue;
                }
                let tag = DimTag {
                    template: d.template.clone(),
                    index: d.index_b,
                    family: family.id,
                };
                family.txn.tag(self.device, cand, tag);
                family.members.insert(d.index_b, cand);
                for relabel in relabels {
                    if !family.relabels.iter().any(|(path, _)| *path == relabel.0) {
                        family.relabels.push(relabel);
                    }
                }
            }

            if let Some(draft) = draft {
                self.close(&scope, draft, policy, &mut excluded);
            }
        }
    }

    /// Start a family from `seed`, annotating the seed itself.
    fn open(&mut self, seed: EntityPath, d: &NameDiff) -> Draft {
        let id = FamilyId(self.next_id);
        let mut txn = Transaction::new();
        let tag = DimTag {
            template: d.template.clone(),
            index: d.index_a,
            family: id,
        };
        txn.tag(self.device, seed, tag);
        Draft {
            id,
            template: d.template.clone(),
            position: d.position,
            mode: d.mode,
            members: BTreeMap::from([(d.index_a, seed)]),
            relabels: Vec::new(),
            txn,
        }
    }

    fn close(
        &mut self,
        scope: &Scope,
        draft: Draft,
        policy: &LevelPolicy,
        excluded: &mut HashSet<String>,
    ) {
        let key = FamilyKey {
            scope: scope.clone(),
            template: draft.template.clone(),
        };
        if draft.members.len() < policy.min_members {
            let reason = RollbackReason::TooFewMembers {
                found: draft.members.len(),
                min: policy.min_members,
            };
            self.abort(Some(draft), key, reason, excluded);
            return;
        }

        let Draft {
            id,
            members,
            relabels,
            mut txn,
            ..
        } = draft;
        for (path, name) in relabels {
            if sibling_named(self.device, path, &name) {
                debug!("{key}: {path} keeps its name, {name} is taken");
                continue;
            }
            txn.rename(self.device, path, name);
        }
        let changes = txn.commit();
        excluded.insert(key.template.clone());

        if let Some(family) = Family::new(id, key, &members) {
            debug!(
                "{} {}: extent {}, {} members, {} changes",
                family.id,
                family.key,
                family.extent,
                members.len(),
                changes
            );
            self.dims.insert(family);
            self.next_id = self.next_id.saturating_add(1);
        }
    }

    fn abort(
        &mut self,
        draft: Option<Draft>,
        key: FamilyKey,
        reason: RollbackReason,
        excluded: &mut HashSet<String>,
    ) {
        let undone = draft.map_or(0, |d| d.txn.rollback(self.device));
        debug!("{key}: rolled back, {reason} ({undone} changes undone)");
        excluded.insert(key.template.clone());
        self.dims.record_rollback(Rollback { key, reason });
    }

    /// Report a scope clustered by an earlier run from its annotations.
    ///
    /// Returns `false`, with every annotation of the scope cleared, when the
    /// annotations do not describe well-formed families.
    fn recollect(&mut self, scope: &Scope, members: &[EntityPath], policy: &LevelPolicy) -> bool {
        match self.settled(scope, members, policy) {
            Ok(families) => {
                debug!(
                    "{scope}: already clustered, {} families kept",
                    families.len()
                );
                for family in families {
                    self.dims.insert(family);
                }
                true
            }
            Err(problem) => {
                debug!("{scope}: {problem}, annotations cleared");
                for &path in members {
                    if let Some(dim) = self.device.dim_mut(path) {
                        *dim = None;
                    }
                }
                false
            }
        }
    }

    fn settled(
        &self,
        scope: &Scope,
        members: &[EntityPath],
        policy: &LevelPolicy,
    ) -> Result<Vec<Family>, String> {
        let mut found: BTreeMap<FamilyId, (&str, BTreeMap<u32, EntityPath>)> = BTreeMap::new();
        for &path in members {
            let Some(tag) = self.device.dim(path) else {
                continue;
            };
            if tag.index >= policy.max_extent {
                return Err(format!(
                    "{path} has index {} past the maximum extent {}",
                    tag.index, policy.max_extent
                ));
            }
            if self.dims.get(tag.family).is_some() {
                return Err(format!("family {} is used by another scope", tag.family));
            }
            let (template, indices) = found
                .entry(tag.family)
                .or_insert_with(|| (tag.template.as_str(), BTreeMap::new()));
            if *template != tag.template {
                return Err(format!(
                    "family {} mixes templates {template} and {}",
                    tag.family, tag.template
                ));
            }
            if indices.insert(tag.index, path).is_some() {
                return Err(format!("family {} has index {} twice", tag.family, tag.index));
            }
        }

        let mut templates = HashSet::new();
        let mut families = Vec::with_capacity(found.len());
        for (id, (template, indices)) in found {
            if !templates.insert(template) {
                return Err(format!("template {template} names two families"));
            }
            let key = FamilyKey {
                scope: scope.clone(),
                template: template.to_string(),
            };
            families.extend(Family::new(id, key, &indices));
        }
        Ok(families)
    }

    /// Whether `path` may join a family at this level.
    fn eligible(&self, path: EntityPath, policy: &LevelPolicy) -> bool {
        if self.device.dim(path).is_some() {
            return false;
        }
        if self.device.name(path).map_or(true, |name| policy.skips(name)) {
            return false;
        }
        match path {
            EntityPath::Interrupt { peripheral, .. } => self
                .device
                .peripherals
                .get(peripheral)
                .is_some_and(|p| !policy.skips_within(&p.name)),
            _ => true,
        }
    }

    fn parent_name(&self, scope: &Scope) -> Option<&str> {
        match *scope {
            Scope::Registers { peripheral } => self
                .device
                .name(EntityPath::Peripheral { peripheral }),
            Scope::Fields {
                peripheral,
                register,
            } => self.device.name(EntityPath::Register {
                peripheral,
                register,
            }),
            Scope::Peripherals | Scope::Interrupts => None,
        }
    }
}

fn level_policy<'a>(config: &'a ClusterConfig, scope: &Scope) -> &'a LevelPolicy {
    match scope {
        Scope::Peripherals => &config.peripherals,
        Scope::Registers { .. } => &config.registers,
        Scope::Fields { .. } => &config.fields,
        Scope::Interrupts => &config.interrupts,
    }
}

/// Whether a sibling other than `path` is already called `name`.
fn sibling_named(device: &Device, path: EntityPath, name: &str) -> bool {
    Scope::of(path)
        .members(device)
        .into_iter()
        .any(|other| other != path && device.name(other) == Some(name))
}

/// First family id not used by an annotation already in `device`.
fn first_free_id(device: &Device) -> u32 {
    let mut next = 0;
    let mut see = |dim: &Option<DimTag>| {
        if let Some(tag) = dim {
            next = next.max(tag.family.0.saturating_add(1));
        }
    };
    for p in &device.peripherals {
        see(&p.dim);
        for isr in &p.interrupts {
            see(&isr.dim);
        }
        for reg in &p.registers {
            see(&reg.dim);
            for field in &reg.fields {
                see(&field.dim);
            }
        }
    }
    next
}
