//! Engine notifications consumed by the presentation layer.
//!
//! Events are emitted synchronously at the point of mutation. Per step the
//! order is: zero or more object/rule changes during rule application, zero
//! or more dissolutions during end-of-step cleanup, then exactly one
//! [`SimulationEvent::StepCompleted`] — or, when no rule was applicable,
//! exactly one [`SimulationEvent::SimulationFinished`] instead.
//!
//! The engines are fully usable headlessly: sinks are optional and nothing
//! here depends on any UI machinery.

use std::cell::RefCell;
use std::rc::Rc;

use membrane_core::RegionId;

// ─────────────────────────────────────────────
// Events
// ─────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimulationEvent {
    /// A region's object multiset was reassigned or visibly mutated.
    ObjectsChanged { region: RegionId, objects: String },
    /// A region's rule list was reassigned (newline-joined encoded rules).
    RulesChanged { region: RegionId, rules: String },
    /// A region dissolved during end-of-step cleanup.
    RegionDissolved { region: RegionId },
    /// One simulation step finished; carries the new step counter.
    StepCompleted { step: u64 },
    /// No rule is applicable anywhere; carries the rendered result.
    SimulationFinished { result: String },
}

/// Receiver of engine notifications.
pub trait EventSink {
    fn emit(&mut self, event: &SimulationEvent);
}

// ─────────────────────────────────────────────
// Recording sink
// ─────────────────────────────────────────────

/// Sink that records every event, for tests and headless inspection.
///
/// Clones share one buffer: subscribe one clone and read the other.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    events: Rc<RefCell<Vec<SimulationEvent>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far.
    pub fn events(&self) -> Vec<SimulationEvent> {
        self.events.borrow().clone()
    }

    /// Drain the recorded events.
    pub fn take(&self) -> Vec<SimulationEvent> {
        std::mem::take(&mut *self.events.borrow_mut())
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &SimulationEvent) {
        self.events.borrow_mut().push(event.clone());
    }
}
