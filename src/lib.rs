//! API Registry Resolver
//!
//! Resolves which declarations of a versioned, extensible API registry are
//! in scope for a requested api, profile, set of core versions and set of
//! extensions, and walks them in dependency order for an emitter. Also
//! checks that each command's declared return codes agree with the types it
//! accepts.
//!
//! ## Features
//!
//! - **Entity Store**: types, enum groups, enumerants and commands, keyed by
//!   name with optional api qualification
//! - **Requirement Marking**: feature require/remove deltas, filtered by
//!   api and profile
//! - **Two-Pass Generation**: tag everything first, then emit every required
//!   declaration exactly once, dependencies first
//! - **Handle Hierarchy**: transitive parent/child relations between handles
//! - **Return-Code Checking**: missing and unexplained codes, with the
//!   reference chain that implicated each type
//!
//! ## Architecture
//!
//! ```text
//! SchemaTree ──► Registry (immutable)
//!                   │
//!      ┌────────────┴─────────────┐
//!      ▼                          ▼
//! Generator::run            ConsistencyChecker
//!   select_features           HandleHierarchy
//!   Marker (pass 1)           ReferenceGraph ×2
//!   Emission (pass 2)         Diagnostics
//!      │
//!      ▼
//!   Emitter
//! ```

pub mod check;
pub mod config;
pub mod enum_value;
pub mod error;
pub mod graph;
pub mod registry;
pub mod resolve;
pub mod schema;

pub use check::{ConsistencyChecker, Diagnostics, Finding, FindingKind, Severity};
pub use config::RegistryConfig;
pub use enum_value::EnumValue;
pub use error::{RegistryError, Result};
pub use graph::{HandleHierarchy, ReferenceGraph};
pub use registry::{EntityId, EntityKind, FeatureRecord, Registry, ResolutionContext, RunPhase};
pub use resolve::{Emitter, GenOptions, Generator, RecordingEmitter, Resolution};
pub use schema::SchemaTree;
