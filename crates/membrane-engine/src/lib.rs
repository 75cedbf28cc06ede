//! `membrane-engine` — simulation engines for membrane-computing (P-system)
//! models.
//!
//! ## Crate structure
//!
//! | Module      | Responsibility                                              |
//! |-------------|-------------------------------------------------------------|
//! | [`system`]  | shared chassis: tree + regions + environment + step + RNG   |
//! | [`base`]    | [`BaseModel`] — rewriting, priority, dissolution            |
//! | [`symport`] | [`SymportAntiport`] — transport rules, output region        |
//! | [`events`]  | engine notifications and the [`EventSink`] interface        |
//! | [`codec`]   | structure-string parsing, JSON document save/load           |
//! | [`error`]   | [`EngineError`]                                             |
//!
//! ## Quick start
//!
//! ```rust
//! use membrane_engine::BaseModel;
//!
//! let mut model = BaseModel::from_structure_str("[ab]")?;
//! let root = model.system().root_id();
//! model.mutate_region_rules(root, "ab -> OUT: cc")?;
//! model.simulate_computation(Some(100))?;
//! assert_eq!(model.get_result().to_string(), "cc");
//! # Ok::<(), membrane_engine::EngineError>(())
//! ```

pub mod base;
pub mod codec;
pub mod error;
pub mod events;
pub mod symport;
pub mod system;

pub use base::BaseModel;
pub use codec::{MembraneModel, ModelDocument, ModelKind, BASE_MODEL_TYPE, SYMPORT_TYPE};
pub use error::EngineError;
pub use events::{EventSink, RecordingSink, SimulationEvent};
pub use symport::SymportAntiport;
pub use system::MembraneSystem;
