//! Shared engine chassis: the state both execution models step over, plus
//! the step-end bookkeeping they have in common.
//!
//! The two models differ only in applicability, application and selection
//! policy; the tree, the region map, the environment, the step counter, the
//! scheduling RNG and the notification plumbing all live here.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;

use membrane_core::{
    CoreError, Environment, MembraneStructure, Multiset, Region, RegionId, Rule,
};

use crate::error::EngineError;
use crate::events::{EventSink, SimulationEvent};

// ─────────────────────────────────────────────
// MembraneSystem
// ─────────────────────────────────────────────

/// Tree + regions + environment + step counter: the state every membrane
/// system evolves, independent of the rewriting discipline.
pub struct MembraneSystem {
    pub(crate) tree:          MembraneStructure,
    pub(crate) regions:       BTreeMap<RegionId, Region>,
    pub(crate) environment:   Environment,
    pub(crate) step_count:    u64,
    pub(crate) structure_str: Option<String>,
    pub(crate) rng:           StdRng,
    sinks:                    Vec<Box<dyn EventSink>>,
}

impl MembraneSystem {
    pub(crate) fn new(
        tree: MembraneStructure,
        regions: BTreeMap<RegionId, Region>,
        environment: Environment,
        structure_str: Option<String>,
    ) -> Self {
        Self {
            tree,
            regions,
            environment,
            step_count: 0,
            structure_str,
            rng: StdRng::from_entropy(),
            sinks: Vec::new(),
        }
    }

    // ── Read access ────────────────────────────────────

    pub fn root_id(&self) -> RegionId {
        self.tree.root_id()
    }

    pub fn structure(&self) -> &MembraneStructure {
        &self.tree
    }

    pub fn regions(&self) -> &BTreeMap<RegionId, Region> {
        &self.regions
    }

    pub fn region(&self, id: RegionId) -> Option<&Region> {
        self.regions.get(&id)
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    /// The structure string the model was built from, if any.
    pub fn structure_str(&self) -> Option<&str> {
        self.structure_str.as_deref()
    }

    // ── Notifications and RNG ──────────────────────────

    /// Register a notification sink. The engine works headlessly with none.
    pub fn subscribe(&mut self, sink: impl EventSink + 'static) {
        self.sinks.push(Box::new(sink));
    }

    /// Re-seed the scheduling RNG for reproducible runs.
    pub fn seed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    pub(crate) fn emit(&mut self, event: SimulationEvent) {
        for sink in &mut self.sinks {
            sink.emit(&event);
        }
    }

    /// Emit an object-changed notification carrying the region's current
    /// contents. Unknown ids are ignored (the region may just have dissolved).
    pub(crate) fn notify_objects(&mut self, id: RegionId) {
        let objects = match self.regions.get(&id) {
            Some(region) => region.objects.to_string(),
            None => return,
        };
        self.emit(SimulationEvent::ObjectsChanged { region: id, objects });
    }

    // ── Observable assignments ─────────────────────────

    /// Replace a region's objects — an observable assignment.
    pub(crate) fn set_region_objects(
        &mut self,
        id: RegionId,
        objects: Multiset,
    ) -> Result<(), EngineError> {
        let region = self
            .regions
            .get_mut(&id)
            .ok_or(EngineError::RegionNotFound(id))?;
        region.objects = objects;
        self.notify_objects(id);
        Ok(())
    }

    /// Replace a region's rule list — an observable assignment.
    pub(crate) fn set_region_rules(
        &mut self,
        id: RegionId,
        rules: Vec<Rule>,
    ) -> Result<(), EngineError> {
        let region = self
            .regions
            .get_mut(&id)
            .ok_or(EngineError::RegionNotFound(id))?;
        region.rules = rules;
        let rules = region.rules_string();
        self.emit(SimulationEvent::RulesChanged { region: id, rules });
        Ok(())
    }

    // ── End-of-step bookkeeping ────────────────────────

    /// Merge every region's staged objects into its contents, reset the
    /// staging multisets and return the regions whose dissolve flag is set.
    pub(crate) fn merge_new_objects(&mut self) -> Vec<RegionId> {
        let mut dissolving = Vec::new();
        let ids: Vec<RegionId> = self.regions.keys().copied().collect();
        for id in ids {
            let Some(region) = self.regions.get_mut(&id) else { continue };
            let staged = std::mem::take(&mut region.new_objects);
            let changed = !staged.is_empty();
            region.objects.merge(&staged);
            if region.dissolving {
                dissolving.push(id);
            }
            if changed {
                self.notify_objects(id);
            }
        }
        dissolving
    }

    /// Dissolve one region: its objects move to the parent, its node is
    /// removed from the tree (children re-parented) and its region entry is
    /// deleted. The skin never dissolves — applicability rejects dissolving
    /// rules on the root upstream.
    pub(crate) fn dissolve_region(&mut self, id: RegionId) -> Result<(), EngineError> {
        let parent_id = self
            .tree
            .parent_of(id)?
            .ok_or(CoreError::InvalidOperation("the skin region cannot dissolve"))?;
        let objects = self
            .regions
            .get(&id)
            .map(|r| r.objects.clone())
            .ok_or(EngineError::RegionNotFound(id))?;

        let parent = self
            .regions
            .get_mut(&parent_id)
            .ok_or(EngineError::RegionNotFound(parent_id))?;
        parent.objects.merge(&objects);
        self.notify_objects(parent_id);

        self.tree.remove_node(id)?;
        self.regions.remove(&id);
        info!(region = id, "region dissolved");
        self.emit(SimulationEvent::RegionDissolved { region: id });
        Ok(())
    }

    /// Bump the step counter and announce the completed step.
    pub(crate) fn complete_step(&mut self) {
        self.step_count += 1;
        let step = self.step_count;
        self.emit(SimulationEvent::StepCompleted { step });
    }

    /// Announce that the computation halted, carrying the rendered result.
    pub(crate) fn finish(&mut self, result: String) {
        self.emit(SimulationEvent::SimulationFinished { result });
    }
}
