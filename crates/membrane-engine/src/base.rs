//! [`BaseModel`] — object rewriting with HERE/IN/OUT routing, rule priority
//! and region dissolution.
//!
//! ## Step protocol
//!
//! 1. **Gate** — if no rule is applicable anywhere, emit the finished
//!    notification and do nothing else.
//! 2. **Visit** — walk the regions in map (= id) order; per region run
//!    select-and-apply: draw a uniformly random rule index from the
//!    not-yet-excluded set; an inapplicable draw excludes the index for the
//!    rest of the visit, a successful application excludes it only when the
//!    applied rule dissolves the region. Ordinary rules stay in the pool and
//!    model parallel multiplicity through repeated application.
//! 3. **Merge** — every region folds `new_objects` into `objects`.
//! 4. **Dissolve** — regions flagged during the visit dissolve into their
//!    parents.
//! 5. **Report** — bump the step counter and emit the step notification.

use std::path::Path;

use rand::Rng;
use tracing::debug;

use membrane_core::{
    CoreError, Direction, Environment, FormatError, Multiset, Region, RegionId, RewriteRule, Rule,
};

use crate::codec::{self, ModelDocument, ModelKind, BASE_MODEL_TYPE};
use crate::error::EngineError;
use crate::events::EventSink;
use crate::system::MembraneSystem;

// ─────────────────────────────────────────────
// BaseModel
// ─────────────────────────────────────────────

/// Rewriting P-system over a shared [`MembraneSystem`] chassis.
pub struct BaseModel {
    system: MembraneSystem,
}

impl BaseModel {
    /// Build a model from a structure string: brackets nest regions,
    /// lowercase letters seed objects.
    pub fn from_structure_str(input: &str) -> Result<Self, EngineError> {
        let parsed = codec::parse_structure(input, ModelKind::Base)?;
        Ok(Self {
            system: MembraneSystem::new(
                parsed.tree,
                parsed.regions,
                Environment::default(),
                Some(input.to_string()),
            ),
        })
    }

    /// Rebuild a model from a persisted document: replay the structure, then
    /// re-attach each region's rules.
    pub fn from_document(doc: &ModelDocument) -> Result<Self, EngineError> {
        if doc.model_type != BASE_MODEL_TYPE {
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
                .map(|s| Rule::parse_base(s))
                .collect::<Result<Vec<_>, _>>()?;
            model.system.set_region_rules(root + relative, rules)?;
        }
        Ok(model)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        Self::from_document(&ModelDocument::read_from(path)?)
    }

    /// Persisted form: structure string plus encoded rules per region id
    /// relative to the root.
    pub fn to_document(&self) -> ModelDocument {
        let root = self.system.root_id();
        ModelDocument {
            model_type: BASE_MODEL_TYPE.to_string(),
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
        let rules = codec::parse_rule_lines(input, Rule::parse_base)?;
        self.system.set_region_rules(id, rules)
    }

    // ── Applicability ──────────────────────────────────

    /// Whether `rule` could fire on the region right now.
    pub fn is_applicable(&self, rule: &Rule, region_id: RegionId) -> bool {
        let Some(region) = self.system.regions.get(&region_id) else {
            return false;
        };
        match rule {
            Rule::Priority { strong, weak } => {
                self.is_applicable(strong, region_id) || self.is_applicable(weak, region_id)
            }
            Rule::Rewrite(r) => self.rewrite_applicable(r, region, false),
            Rule::Dissolving(r) => self.rewrite_applicable(r, region, true),
            // Transport rules belong to the symport/antiport model.
            Rule::Transport(_) => false,
        }
    }

    fn rewrite_applicable(&self, rule: &RewriteRule, region: &Region, dissolving: bool) -> bool {
        let tree = self.system.structure();
        if dissolving && region.id == tree.root_id() {
            return false;
        }
        if rule.has_in_object() && tree.num_children(region.id).unwrap_or(0) == 0 {
            return false;
        }
        region.objects.has_subset(&rule.left_side)
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
        self.apply_resolved(rule, region_id).map(|_| ())
    }

    /// Like [`apply`](Self::apply), returning whether the applied
    /// (priority-resolved) rule flagged the region for dissolution.
    fn apply_resolved(&mut self, rule: &Rule, region_id: RegionId) -> Result<bool, EngineError> {
        let rule = match rule {
            Rule::Priority { strong, weak } => {
                if self.is_applicable(strong, region_id) {
                    strong.as_ref()
                } else {
                    weak.as_ref()
                }
            }
            other => other,
        };
        let (rewrite, dissolving) = match rule {
            Rule::Rewrite(r) => (r, false),
            Rule::Dissolving(r) => (r, true),
            _ => {
                return Err(
                    CoreError::InvalidOperation("transport rule in a rewriting engine").into(),
                )
            }
        };

        {
            let region = self
                .system
                .regions
                .get_mut(&region_id)
                .ok_or(EngineError::RegionNotFound(region_id))?;
            region.objects.subtract(&rewrite.left_side)?;
        }
        self.system.notify_objects(region_id);

        let root = self.system.root_id();
        let parent = self.system.tree.parent_of(region_id)?;
        let children: Vec<RegionId> = self.system.tree.children_of(region_id)?.to_vec();

        for (&(symbol, direction), &count) in &rewrite.right_side {
            match direction {
                Direction::Here => {
                    if let Some(region) = self.system.regions.get_mut(&region_id) {
                        region.new_objects.add(symbol, count);
                    }
                }
                Direction::Out => {
                    if region_id == root {
                        self.system.environment.add(symbol, count);
                    } else {
                        let parent_id = parent
                            .ok_or(CoreError::InvalidOperation("non-root region without parent"))?;
                        let parent = self
                            .system
                            .regions
                            .get_mut(&parent_id)
                            .ok_or(EngineError::RegionNotFound(parent_id))?;
                        parent.new_objects.add(symbol, count);
                    }
                }
                Direction::In => {
                    // Applicability guarantees at least one child exists.
                    if children.is_empty() {
                        return Err(
                            CoreError::InvalidOperation("inward routing without children").into()
                        );
                    }
                    let child = children[self.system.rng.gen_range(0..children.len())];
                    let child = self
                        .system
                        .regions
                        .get_mut(&child)
                        .ok_or(EngineError::RegionNotFound(child))?;
                    child.new_objects.add(symbol, count);
                }
            }
        }

        if dissolving {
            if let Some(region) = self.system.regions.get_mut(&region_id) {
                region.dissolving = true;
            }
        }
        Ok(dissolving)
    }

    // ── Scheduling ─────────────────────────────────────

    /// Select-and-apply for one region. Indices leave the pool when drawn
    /// inapplicable, or after applying a dissolving rule; ordinary rules
    /// remain drawable until the shrinking multiset starves them.
    fn select_and_apply(&mut self, region_id: RegionId) -> Result<(), EngineError> {
        let rule_count = self
            .system
            .regions
            .get(&region_id)
            .map_or(0, |r| r.rules.len());
        let mut remaining: Vec<usize> = (0..rule_count).collect();

        while !remaining.is_empty() {
            let slot = self.system.rng.gen_range(0..remaining.len());
            let index = remaining[slot];
            let rule = self.system.regions[&region_id].rules[index].clone();
            if self.is_applicable(&rule, region_id) {
                if self.apply_resolved(&rule, region_id)? {
                    remaining.swap_remove(slot);
                }
            } else {
                remaining.swap_remove(slot);
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
        debug!(step = self.system.step_count + 1, "base model step");

        let ids: Vec<RegionId> = self.system.regions.keys().copied().collect();
        for id in ids {
            self.select_and_apply(id)?;
        }
        let dissolving = self.system.merge_new_objects();
        for id in dissolving {
            self.system.dissolve_region(id)?;
        }
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

    /// The computation's result: the environment's contents.
    pub fn get_result(&self) -> Multiset {
        self.system.environment.objects().clone()
    }
}
