//! Structural graphs over the registry
//!
//! - [`handles`]: handle parent/child hierarchy
//! - [`references`]: transitive type references of structs and commands,
//!   backed by a petgraph `DiGraph` for path explanations
//! - [`memo`]: the three-state memo table both are built on

pub mod handles;
pub mod memo;
pub mod references;

pub use handles::{HandleHierarchy, HandleSet};
pub use memo::{CacheEntry, Lookup, MemoTable};
pub use references::{MemberClassifier, MemberPredicate, ReferenceGraph, TypeSet};
