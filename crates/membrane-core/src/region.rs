//! Per-node mutable region state.

use crate::multiset::Multiset;
use crate::rules::Rule;
use crate::structure::NodeId;

/// Identifier of a region — the id of its tree node.
pub type RegionId = NodeId;

/// The mutable state attached to one membrane: current objects, objects
/// staged for the end of the step, the rule list and the dissolve flag.
#[derive(Debug, Clone, Default)]
pub struct Region {
    pub id:          RegionId,
    pub objects:     Multiset,
    pub new_objects: Multiset,
    pub rules:       Vec<Rule>,
    pub dissolving:  bool,
}

impl Region {
    pub fn new(id: RegionId) -> Self {
        Self { id, ..Self::default() }
    }

    pub fn with_objects(id: RegionId, objects: Multiset) -> Self {
        Self { id, objects, ..Self::default() }
    }

    pub fn add_rule(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    /// The newline-joined encoded rule list, as shown and edited by the
    /// presentation layer.
    pub fn rules_string(&self) -> String {
        self.rules
            .iter()
            .map(Rule::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }
}
