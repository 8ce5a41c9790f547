//! Resolution of a requested configuration
//!
//! - [`options`]: what to resolve (api, profile, selection patterns)
//! - [`select`]: which versions/extensions are in scope, and their order
//! - [`marker`]: require/remove deltas over a [`ResolutionContext`]
//! - [`driver`]: the two passes and the [`Emitter`] interface
//! - [`emit`]: an emitter that records the callback sequence
//!
//! [`ResolutionContext`]: crate::registry::ResolutionContext

pub mod driver;
pub mod emit;
pub mod marker;
pub mod options;
pub mod select;

pub use driver::{Emitter, Generator, GroupMember, Resolution};
pub use emit::{EmitEvent, MemberEvent, RecordingEmitter};
pub use marker::Marker;
pub use options::{GenOptions, Pattern};
pub use select::{select_features, DefaultFeatureOrder, FeatureOrder, SelectedFeature, SelectionOrder};
