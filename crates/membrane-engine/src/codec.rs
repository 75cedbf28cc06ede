//! Construction and persistence codecs.
//!
//! ## Structure strings
//!
//! Nested bracket pairs from `()`, `{}`, `[]` (kinds must pair, nesting is
//! checked with a stack); lowercase letters add one object to the innermost
//! open region; whitespace is ignored. Symport/antiport only: letters before
//! the first bracket are infinite-supply environment symbols, and `#` marks
//! its enclosing region as the output region (last occurrence wins). Any
//! other character — and a second outermost region — is a format error.
//!
//! ## Documents
//!
//! A model persists as one JSON object:
//!
//! ```json
//! { "type": "BaseModel", "structure": "[a[b]]", "rules": { "0": ["a -> HERE: b"] } }
//! ```
//!
//! `rules` keys are region ids relative to the root; loading replays
//! `structure` through the structure-string constructor and re-attaches each
//! rule list at `root_id + relative_id`.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};

use membrane_core::{FormatError, MembraneStructure, NodeIdGen, Region, RegionId, Rule};

use crate::base::BaseModel;
use crate::error::EngineError;
use crate::symport::SymportAntiport;

/// Document `type` tag of a base-model system.
pub const BASE_MODEL_TYPE: &str = "BaseModel";
/// Document `type` tag of a symport/antiport system.
pub const SYMPORT_TYPE: &str = "SymportAntiport";

// ─────────────────────────────────────────────
// Model kind
// ─────────────────────────────────────────────

/// Which rewriting discipline a structure string should be read as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    Base,
    Symport,
}

// ─────────────────────────────────────────────
// Structure-string parsing
// ─────────────────────────────────────────────

/// Outcome of parsing a structure string.
pub(crate) struct ParsedStructure {
    pub tree:     MembraneStructure,
    pub regions:  BTreeMap<RegionId, Region>,
    pub infinite: BTreeSet<char>,
    pub output:   Option<RegionId>,
}

pub(crate) fn parse_structure(
    input: &str,
    kind: ModelKind,
) -> Result<ParsedStructure, FormatError> {
    let mut gen = NodeIdGen::new();
    let mut tree: Option<MembraneStructure> = None;
    let mut regions: BTreeMap<RegionId, Region> = BTreeMap::new();
    // (open region, expected closing bracket)
    let mut stack: Vec<(RegionId, char)> = Vec::new();
    let mut infinite = BTreeSet::new();
    let mut output = None;
    let mut root_closed = false;

    for (pos, ch) in input.chars().enumerate() {
        match ch {
            c if c.is_whitespace() => {}

            '(' | '{' | '[' => {
                if root_closed {
                    return Err(FormatError::MultipleRoots);
                }
                let closer = match ch {
                    '(' => ')',
                    '{' => '}',
                    _ => ']',
                };
                let id = match (&mut tree, stack.last()) {
                    (None, _) => {
                        let t = MembraneStructure::new(&mut gen);
                        let id = t.root_id();
                        tree = Some(t);
                        id
                    }
                    (Some(t), Some(&(parent, _))) => t
                        .add_child(parent, &mut gen)
                        .map_err(|_| FormatError::UnbalancedBrackets)?,
                    // A live tree with an empty stack means the root closed.
                    (Some(_), None) => return Err(FormatError::MultipleRoots),
                };
                regions.insert(id, Region::new(id));
                stack.push((id, closer));
            }

            ')' | '}' | ']' => match stack.pop() {
                Some((_, closer)) if closer == ch => {
                    if stack.is_empty() {
                        root_closed = true;
                    }
                }
                _ => return Err(FormatError::UnbalancedBrackets),
            },

            c if c.is_ascii_lowercase() => match stack.last() {
                Some(&(id, _)) => {
                    if let Some(region) = regions.get_mut(&id) {
                        region.objects.add(c, 1);
                    }
                }
                None if kind == ModelKind::Symport && tree.is_none() => {
                    // Environment prefix; repeats are idempotent.
                    infinite.insert(c);
                }
                None => return Err(FormatError::UnexpectedChar { ch: c, pos }),
            },

            '#' if kind == ModelKind::Symport => match stack.last() {
                Some(&(id, _)) => output = Some(id),
                None => return Err(FormatError::UnexpectedChar { ch, pos }),
            },

            c => return Err(FormatError::UnexpectedChar { ch: c, pos }),
        }
    }

    if !stack.is_empty() {
        return Err(FormatError::UnbalancedBrackets);
    }
    let tree = tree.ok_or(FormatError::EmptyStructure)?;
    Ok(ParsedStructure { tree, regions, infinite, output })
}

/// Parse a newline-separated rule listing with the given per-line grammar.
pub(crate) fn parse_rule_lines(
    input: &str,
    parse: impl Fn(&str) -> Result<Rule, FormatError>,
) -> Result<Vec<Rule>, FormatError> {
    input
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| parse(line))
        .collect()
}

// ─────────────────────────────────────────────
// Persisted document
// ─────────────────────────────────────────────

/// The persisted JSON form of a model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelDocument {
    #[serde(rename = "type")]
    pub model_type: String,
    pub structure:  Option<String>,
    /// Rule strings per region id relative to the root.
    pub rules:      BTreeMap<RegionId, Vec<String>>,
}

impl ModelDocument {
    pub fn read_from(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<(), EngineError> {
        let file = File::create(path)?;
        Ok(serde_json::to_writer_pretty(BufWriter::new(file), self)?)
    }
}

// ─────────────────────────────────────────────
// Model-agnostic construction
// ─────────────────────────────────────────────

/// A membrane system of either discipline, for callers that only learn the
/// kind at runtime (dialogs, document loading).
pub enum MembraneModel {
    Base(BaseModel),
    Symport(SymportAntiport),
}

impl MembraneModel {
    /// Construct a model of the requested kind from a structure string.
    pub fn from_structure_str(kind: ModelKind, input: &str) -> Result<Self, EngineError> {
        match kind {
            ModelKind::Base => BaseModel::from_structure_str(input).map(Self::Base),
            ModelKind::Symport => SymportAntiport::from_structure_str(input).map(Self::Symport),
        }
    }

    /// Rebuild a model from a persisted document.
    pub fn from_document(doc: &ModelDocument) -> Result<Self, EngineError> {
        match doc.model_type.as_str() {
            BASE_MODEL_TYPE => BaseModel::from_document(doc).map(Self::Base),
            SYMPORT_TYPE => SymportAntiport::from_document(doc).map(Self::Symport),
            other => Err(FormatError::UnknownModelType(other.to_string()).into()),
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        Self::from_document(&ModelDocument::read_from(path)?)
    }

    // The engine operations the presentation layer drives, dispatched to the
    // concrete model.

    pub fn system(&self) -> &crate::system::MembraneSystem {
        match self {
            Self::Base(m) => m.system(),
            Self::Symport(m) => m.system(),
        }
    }

    pub fn subscribe(&mut self, sink: impl crate::events::EventSink + 'static) {
        match self {
            Self::Base(m) => m.subscribe(sink),
            Self::Symport(m) => m.subscribe(sink),
        }
    }

    pub fn any_rule_applicable(&self) -> bool {
        match self {
            Self::Base(m) => m.any_rule_applicable(),
            Self::Symport(m) => m.any_rule_applicable(),
        }
    }

    pub fn simulate_step(&mut self) -> Result<(), EngineError> {
        match self {
            Self::Base(m) => m.simulate_step(),
            Self::Symport(m) => m.simulate_step(),
        }
    }

    pub fn simulate_computation(&mut self, max_steps: Option<u64>) -> Result<(), EngineError> {
        match self {
            Self::Base(m) => m.simulate_computation(max_steps),
            Self::Symport(m) => m.simulate_computation(max_steps),
        }
    }

    pub fn get_result(&self) -> membrane_core::Multiset {
        match self {
            Self::Base(m) => m.get_result(),
            Self::Symport(m) => m.get_result(),
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), EngineError> {
        match self {
            Self::Base(m) => m.save(path),
            Self::Symport(m) => m.save(path),
        }
    }

    pub fn mutate_region_objects(&mut self, id: RegionId, input: &str) -> Result<(), EngineError> {
        match self {
            Self::Base(m) => m.mutate_region_objects(id, input),
            Self::Symport(m) => m.mutate_region_objects(id, input),
        }
    }

    pub fn mutate_region_rules(&mut self, id: RegionId, input: &str) -> Result<(), EngineError> {
        match self {
            Self::Base(m) => m.mutate_region_rules(id, input),
            Self::Symport(m) => m.mutate_region_rules(id, input),
        }
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
