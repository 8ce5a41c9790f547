//! Per-run resolution state
//!
//! The registry itself is immutable. Everything a resolution run flips
//! (required, declared, validity annotations, run phase) lives in a
//! `ResolutionContext` created fresh for that run, so several
//! configurations can be resolved against one registry.

use serde::Serialize;
use std::fmt;

use super::{EntityDef, EntityId, Registry};
use crate::error::{RegistryError, Result};
use crate::schema::UsageDef;

// =============================================================================
// Lifecycle
// =============================================================================

/// Required/declared pair shared by every entity kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Lifecycle {
    /// Should this entity be part of the resolved interface?
    pub required: bool,
    /// Has this entity been generated in the current run?
    pub declared: bool,
}

/// Valid-usage annotations collected from version/extension fragments
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidityNotes {
    pub additional: Vec<UsageDef>,
    pub removed: Vec<UsageDef>,
}

/// Kind-specific run state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KindState {
    Type(ValidityNotes),
    EnumGroup,
    Enumerant,
    Command(ValidityNotes),
}

impl KindState {
    fn fresh(def: &EntityDef<'_>) -> Self {
        match def {
            EntityDef::Type(_) => Self::Type(ValidityNotes::default()),
            EntityDef::EnumGroup(_) => Self::EnumGroup,
            EntityDef::Enumerant(_) => Self::Enumerant,
            EntityDef::Command(_) => Self::Command(ValidityNotes::default()),
        }
    }
}

/// Run state of one entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityState {
    pub lifecycle: Lifecycle,
    pub payload: KindState,
}

// =============================================================================
// Run Phase
// =============================================================================

/// `Reset -> Tagging -> Emitting -> Done`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunPhase {
    Reset,
    Tagging,
    Emitting,
    Done,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reset => write!(f, "reset"),
            Self::Tagging => write!(f, "tagging"),
            Self::Emitting => write!(f, "emitting"),
            Self::Done => write!(f, "done"),
        }
    }
}

// =============================================================================
// Resolution Context
// =============================================================================

/// Mutable state of one resolution run
#[derive(Debug, Clone)]
pub struct ResolutionContext {
    states: Vec<EntityState>,
    phase: RunPhase,
}

impl ResolutionContext {
    /// Fresh state for every entity of `registry`
    pub fn new(registry: &Registry<'_>) -> Self {
        let states = registry
            .entities()
            .map(|record| EntityState {
                lifecycle: Lifecycle::default(),
                payload: KindState::fresh(&record.def),
            })
            .collect();
        Self {
            states,
            phase: RunPhase::Reset,
        }
    }

    /// Clear every flag and annotation and return to the `Reset` phase
    pub fn reset(&mut self) {
        for state in &mut self.states {
            state.lifecycle = Lifecycle::default();
            match &mut state.payload {
                KindState::Type(notes) | KindState::Command(notes) => *notes = ValidityNotes::default(),
                KindState::EnumGroup | KindState::Enumerant => {}
            }
        }
        self.phase = RunPhase::Reset;
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    /// Advance to `next`; only the forward transitions are legal
    pub(crate) fn enter(&mut self, next: RunPhase) -> Result<()> {
        let legal = matches!(
            (self.phase, next),
            (RunPhase::Reset, RunPhase::Tagging)
                | (RunPhase::Tagging, RunPhase::Emitting)
                | (RunPhase::Emitting, RunPhase::Done)
        );
        if !legal {
            return Err(RegistryError::PhaseViolation {
                operation: phase_operation(next),
                phase: self.phase.to_string(),
            });
        }
        self.phase = next;
        Ok(())
    }

    /// Fail unless required flags may still change
    pub(crate) fn ensure_tagging(&self, operation: &'static str) -> Result<()> {
        match self.phase {
            RunPhase::Reset | RunPhase::Tagging => Ok(()),
            RunPhase::Emitting | RunPhase::Done => Err(RegistryError::PhaseViolation {
                operation,
                phase: self.phase.to_string(),
            }),
        }
    }

    pub fn state(&self, id: EntityId) -> &EntityState {
        &self.states[id.index()]
    }

    pub fn lifecycle(&self, id: EntityId) -> Lifecycle {
        self.states[id.index()].lifecycle
    }

    pub fn is_required(&self, id: EntityId) -> bool {
        self.lifecycle(id).required
    }

    pub fn is_declared(&self, id: EntityId) -> bool {
        self.lifecycle(id).declared
    }

    pub(crate) fn set_required(&mut self, id: EntityId, required: bool) {
        self.states[id.index()].lifecycle.required = required;
    }

    /// Mark an entity declared. There is no way back short of `reset`.
    pub(crate) fn declare(&mut self, id: EntityId) {
        self.states[id.index()].lifecycle.declared = true;
    }

    /// Validity annotations (types and commands only)
    pub fn validity(&self, id: EntityId) -> Option<&ValidityNotes> {
        match &self.states[id.index()].payload {
            KindState::Type(notes) | KindState::Command(notes) => Some(notes),
            KindState::EnumGroup | KindState::Enumerant => None,
        }
    }

    pub(crate) fn validity_mut(&mut self, id: EntityId) -> Option<&mut ValidityNotes> {
        match &mut self.states[id.index()].payload {
            KindState::Type(notes) | KindState::Command(notes) => Some(notes),
            KindState::EnumGroup | KindState::Enumerant => None,
        }
    }

    /// Ids of every entity currently required
    pub fn required_ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.ids_where(|l| l.required)
    }

    /// Ids of every entity declared so far
    pub fn declared_ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.ids_where(|l| l.declared)
    }

    fn ids_where(&self, pred: impl Fn(&Lifecycle) -> bool + 'static) -> impl Iterator<Item = EntityId> + '_ {
        self.states
            .iter()
            .enumerate()
            .filter(move |(_, s)| pred(&s.lifecycle))
            .map(|(i, _)| EntityId::new(i))
    }
}

fn phase_operation(next: RunPhase) -> &'static str {
    match next {
        RunPhase::Reset => "reset",
        RunPhase::Tagging => "start tagging",
        RunPhase::Emitting => "start emitting",
        RunPhase::Done => "finish",
    }
}
