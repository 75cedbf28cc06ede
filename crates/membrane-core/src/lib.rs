//! `membrane-core` — data model for membrane-computing (P-system) simulation.
//!
//! ## Crate structure
//!
//! | Module          | Responsibility                                         |
//! |-----------------|--------------------------------------------------------|
//! | [`multiset`]    | symbol→count algebra: subset, union, difference        |
//! | [`environment`] | multiset with infinite-supply symbols outside the skin |
//! | [`structure`]   | arena-backed membrane tree with guarded traversal      |
//! | [`region`]      | per-membrane mutable state (objects, rules, dissolve)  |
//! | [`rules`]       | rule variants, string grammar, canonical encoding      |
//! | [`error`]       | [`CoreError`] and recoverable [`FormatError`]          |

pub mod environment;
pub mod error;
pub mod multiset;
pub mod region;
pub mod rules;
pub mod structure;

pub use environment::Environment;
pub use error::{CoreError, FormatError};
pub use multiset::Multiset;
pub use region::{Region, RegionId};
pub use rules::{Direction, RewriteRule, RightSide, Rule, TransportKind, TransportRule};
pub use structure::{MembraneStructure, NodeId, NodeIdGen};
