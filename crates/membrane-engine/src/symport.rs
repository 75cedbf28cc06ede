//! [`SymportAntiport`] — pure object transport between adjacent regions and
//! the environment.
//!
//! ## Step protocol
//!
//! 1. **Gate** — if no rule is applicable anywhere, emit the finished
//!    notification and do nothing else.
//! 2. **Visit** — walk the regions in a uniformly shuffled order; per region
//!    run select-and-apply where every drawn index leaves the pool
//!    immediately, applicable or not, so each rule fires at most once per
//!    visit. (The base model keeps applicable rules in the pool; the two
//!    policies are deliberately different.)
//! 3. **Merge** — every region folds `new_objects` into `objects`. Transport
//!    rules never dissolve a region.
//! 4. **Report** — bump the step counter and emit the step notification.
//!
//! ## Staging asymmetry
//!
//! A root antiport round-trips through the environment **immediately** —
//! the environment is shared and always consistent, so it updates in place.
//! A non-root antiport removes immediately (`objects`) but delivers staged
//! (`new_objects`) on both sides, so no rule observes another rule's
//! uncommitted effect within the regions it concerns.

use std::path::Path;

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;

use membrane_core::{
    CoreError, Environment, FormatError, Multiset, Region, RegionId, Rule, TransportKind,
};

use crate::codec::{self, ModelDocument, ModelKind, SYMPORT_TYPE};
use crate::error::EngineError;
use crate::events::EventSink;
use crate::system::MembraneSystem;

// ─────────────────────────────────────────────
// SymportAntiport
// ─────────────────────────────────────────────

/// Transport P-system over a shared [`MembraneSystem`] chassis, with a
/// designated output region.
pub struct SymportAntiport {
    system:    MembraneSystem,
    output_id: RegionId,
}

impl SymportAntiport {
    /// Build a model from a structure string. Letters before the first
    /// bracket become infinite-supply environment symbols; `#` marks the
    /// output region and is required.
    pub fn from_structure_str(input: &str) -> Result<Self, EngineError> {
        let parsed = codec::parse_structure(input, ModelKind::Symport)?;
        let output_id = parsed.output.ok_or(FormatError::MissingOutputRegion)?;
        Ok(Self {
            system: MembraneSystem::new(
                parsed.tree,
                parsed.regions,
                Environment::new(Multiset::new(), parsed.infinite),
                Some(input.to_string()),
            ),
            output_id,
        })
    }

    /// Rebuild a model from a persisted document (structure replay restores
    /// the output region and the infinite symbols).
    pub fn from_document(doc: &ModelDocument) -> Result<Self, EngineError> {
        if doc.model_type != SYMPORT_TYPE {
            return Err(FormatError::UnknownModelType(doc.model_type.clone()).into());
        }
        let structure = doc
            .structure
            .as_deref()
            .ok_or(FormatError::MissingStructure)?;
        let mut model = Self::from_structure_str(structure)?;
        let root = model.system.root_id();
        for (&relative, strings) in &doc.rules {
            let rules = strings
                .iter()
                .map(|s| Rule::parse_transport(s))
                .collect::<Result<Vec<_>, _>>()?;
            model.system.set_region_rules(root + relative, rules)?;
        }
        Ok(model)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        Self::from_document(&ModelDocument::read_from(path)?)
    }

    pub fn to_document(&self) -> ModelDocument {
        let root = self.system.root_id();
        ModelDocument {
            model_type: SYMPORT_TYPE.to_string(),
            structure: self.system.structure_str.clone(),
            rules: self
                .system
                .regions
                .iter()
                .filter(|(_, region)| !region.rules.is_empty())
                .map(|(&id, region)| {
                    (id - root, region.rules.iter().map(Rule::to_string).collect())
                })
                .collect(),
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), EngineError> {
        self.to_document().write_to(path)
    }

    // ── Shared-chassis access ──────────────────────────

    pub fn system(&self) -> &MembraneSystem {
        &self.system
    }

    /// The region whose contents are the computation's result.
    pub fn output_id(&self) -> RegionId {
        self.output_id
    }

    pub fn subscribe(&mut self, sink: impl EventSink + 'static) {
        self.system.subscribe(sink);
    }

    /// Re-seed the scheduling RNG for reproducible runs.
    pub fn seed(&mut self, seed: u64) {
        self.system.seed(seed);
    }

    /// Replace a region's objects from its string form — an observable
    /// assignment.
    pub fn mutate_region_objects(&mut self, id: RegionId, input: &str) -> Result<(), EngineError> {
        self.system
            .set_region_objects(id, Multiset::parse_default(input))
    }

    /// Replace a region's rules from a newline-separated listing — an
    /// observable assignment.
    pub fn mutate_region_rules(&mut self, id: RegionId, input: &str) -> Result<(), EngineError> {
        let rules = codec::parse_rule_lines(input, Rule::parse_transport)?;
        self.system.set_region_rules(id, rules)
    }

    // ── Applicability ──────────────────────────────────

    /// Whether `rule` could fire on the region right now.
    pub fn is_applicable(&self, rule: &Rule, region_id: RegionId) -> bool {
        let Rule::Transport(t) = rule else {
            // Rewriting rules belong to the base model.
            return false;
        };
        let Some(region) = self.system.regions.get(&region_id) else {
            return false;
        };
        let at_root = region_id == self.system.root_id();

        match t.kind {
            TransportKind::Antiport => {
                let (Some(imported), Some(exported)) = (&t.imported, &t.exported) else {
                    return false;
                };
                if at_root {
                    self.system.environment.has_subset(imported)
                        && region.objects.has_subset(exported)
                } else {
                    let Some(parent) = self.parent_region(region_id) else {
                        return false;
                    };
                    region.objects.has_subset(exported) && parent.objects.has_subset(imported)
                }
            }
            TransportKind::SymportIn => {
                let Some(imported) = &t.imported else { return false };
                if at_root {
                    self.system.environment.has_subset(imported)
                } else {
                    self.parent_region(region_id)
                        .is_some_and(|parent| parent.objects.has_subset(imported))
                }
            }
            TransportKind::SymportOut => {
                let Some(exported) = &t.exported else { return false };
                region.objects.has_subset(exported)
            }
        }
    }

    fn parent_region(&self, id: RegionId) -> Option<&Region> {
        let parent = self.system.tree.parent_of(id).ok()??;
        self.system.regions.get(&parent)
    }

    /// True iff some region holds some applicable rule.
    pub fn any_rule_applicable(&self) -> bool {
        self.system.regions.values().any(|region| {
            region
                .rules
                .iter()
                .any(|rule| self.is_applicable(rule, region.id))
        })
    }

    // ── Application ────────────────────────────────────

    /// Fire `rule` once on the region. The caller must have checked
    /// applicability; a core error here is an engine invariant violation.
    pub fn apply(&mut self, rule: &Rule, region_id: RegionId) -> Result<(), EngineError> {
        let Rule::Transport(t) = rule else {
            return Err(CoreError::InvalidOperation("rewriting rule in a transport engine").into());
        };
        let at_root = region_id == self.system.root_id();

        match t.kind {
            TransportKind::SymportIn => {
                let imported = required(&t.imported, "symport-in without an imported side")?;
                if at_root {
                    self.system.environment.subtract(imported)?;
                } else {
                    let parent_id = self.parent_id(region_id)?;
                    self.region_mut(parent_id)?.objects.subtract(imported)?;
                    self.system.notify_objects(parent_id);
                }
                self.region_mut(region_id)?.new_objects.merge(imported);
            }

            TransportKind::SymportOut => {
                let exported = required(&t.exported, "symport-out without an exported side")?;
                self.region_mut(region_id)?.objects.subtract(exported)?;
                self.system.notify_objects(region_id);
                if at_root {
                    self.system.environment.merge(exported);
                } else {
                    let parent_id = self.parent_id(region_id)?;
                    self.region_mut(parent_id)?.new_objects.merge(exported);
                }
            }

            TransportKind::Antiport => {
                let imported = required(&t.imported, "antiport without an imported side")?;
                let exported = required(&t.exported, "antiport without an exported side")?;
                if at_root {
                    // Immediate on both sides: the environment round-trips
                    // within the same step.
                    let region = self.region_mut(region_id)?;
                    region.objects.subtract(exported)?;
                    region.objects.merge(imported);
                    self.system.environment.merge(exported);
                    self.system.environment.subtract(imported)?;
                    self.system.notify_objects(region_id);
                } else {
                    // Removals immediate, deliveries staged.
                    let parent_id = self.parent_id(region_id)?;
                    {
                        let region = self.region_mut(region_id)?;
                        region.objects.subtract(exported)?;
                        region.new_objects.merge(imported);
                    }
                    {
                        let parent = self.region_mut(parent_id)?;
                        parent.new_objects.merge(exported);
                        parent.objects.subtract(imported)?;
                    }
                    self.system.notify_objects(region_id);
                    self.system.notify_objects(parent_id);
                }
            }
        }
        Ok(())
    }

    fn parent_id(&self, id: RegionId) -> Result<RegionId, EngineError> {
        Ok(self
            .system
            .tree
            .parent_of(id)?
            .ok_or(CoreError::InvalidOperation("transport across the skin without environment"))?)
    }

    fn region_mut(&mut self, id: RegionId) -> Result<&mut Region, EngineError> {
        self.system
            .regions
            .get_mut(&id)
            .ok_or(EngineError::RegionNotFound(id))
    }

    // ── Scheduling ─────────────────────────────────────

    /// Select-and-apply for one region: every drawn index is excluded
    /// immediately, so each rule is attempted at most once per visit.
    fn select_and_apply(&mut self, region_id: RegionId) -> Result<(), EngineError> {
        let rule_count = self
            .system
            .regions
            .get(&region_id)
            .map_or(0, |r| r.rules.len());
        let mut remaining: Vec<usize> = (0..rule_count).collect();

        while !remaining.is_empty() {
            let slot = self.system.rng.gen_range(0..remaining.len());
            let index = remaining.swap_remove(slot);
            let rule = self.system.regions[&region_id].rules[index].clone();
            if self.is_applicable(&rule, region_id) {
                self.apply(&rule, region_id)?;
            }
        }
        Ok(())
    }

    /// Run one step of the protocol described in the module docs.
    pub fn simulate_step(&mut self) -> Result<(), EngineError> {
        if !self.any_rule_applicable() {
            let result = self.get_result().to_string();
            self.system.finish(result);
            return Ok(());
        }
        debug!(step = self.system.step_count + 1, "symport/antiport step");

        let mut ids: Vec<RegionId> = self.system.regions.keys().copied().collect();
        ids.shuffle(&mut self.system.rng);
        for id in ids {
            self.select_and_apply(id)?;
        }
        // Transport rules never set the dissolve flag.
        self.system.merge_new_objects();
        self.system.complete_step();
        Ok(())
    }

    /// Step while any rule is applicable (optionally bounded), then emit the
    /// final result.
    pub fn simulate_computation(&mut self, max_steps: Option<u64>) -> Result<(), EngineError> {
        let mut steps = 0u64;
        while self.any_rule_applicable() {
            if max_steps.is_some_and(|max| steps >= max) {
                break;
            }
            self.simulate_step()?;
            steps += 1;
        }
        let result = self.get_result().to_string();
        self.system.finish(result);
        Ok(())
    }

    /// The computation's result: the output region's contents.
    pub fn get_result(&self) -> Multiset {
        self.system
            .regions
            .get(&self.output_id)
            .map(|region| region.objects.clone())
            .unwrap_or_default()
    }
}

fn required<'a>(
    side: &'a Option<Multiset>,
    invariant: &'static str,
) -> Result<&'a Multiset, EngineError> {
    Ok(side
        .as_ref()
        .ok_or(CoreError::InvalidOperation(invariant))?)
}
