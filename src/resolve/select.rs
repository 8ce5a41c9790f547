//! Feature selection and ordering
//!
//! Chooses the core versions and extensions in scope for a run and fixes
//! the order both passes walk them in.

use tracing::{debug, warn};

use super::options::{GenOptions, Pattern};
use crate::registry::{FeatureRecord, Registry};

/// A feature in scope for one run
#[derive(Debug, Clone, Copy)]
pub struct SelectedFeature<'s> {
    pub feature: FeatureRecord<'s>,
    /// Render declarations for this feature (otherwise only mark them declared)
    pub emit: bool,
}

// =============================================================================
// Ordering
// =============================================================================

/// Orders the selected features; must be a stable sort
pub trait FeatureOrder {
    fn sort(&self, features: &mut [SelectedFeature<'_>]);
}

/// Keeps selection order: versions as listed, then extensions by number
#[derive(Debug, Clone, Copy, Default)]
pub struct SelectionOrder;

impl FeatureOrder for SelectionOrder {
    fn sort(&self, _features: &mut [SelectedFeature<'_>]) {}
}

/// Core versions first, then ratified vendor extensions, then the rest;
/// ties broken by version number, then extension number
#[derive(Debug, Clone)]
pub struct DefaultFeatureOrder {
    ratified: Vec<String>,
}

impl Default for DefaultFeatureOrder {
    fn default() -> Self {
        Self::new(["KHR", "ARB", "OES"])
    }
}

impl DefaultFeatureOrder {
    pub fn new<I, S>(ratified: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ratified: ratified.into_iter().map(Into::into).collect(),
        }
    }

    fn rank(&self, feature: &FeatureRecord<'_>) -> u8 {
        if feature.is_core_version() {
            0
        } else if self.ratified.iter().any(|tag| tag == feature.category) {
            1
        } else {
            2
        }
    }
}

impl FeatureOrder for DefaultFeatureOrder {
    fn sort(&self, features: &mut [SelectedFeature<'_>]) {
        features.sort_by(|a, b| {
            let (a, b) = (&a.feature, &b.feature);
            self.rank(a)
                .cmp(&self.rank(b))
                .then_with(|| a.version_number().total_cmp(&b.version_number()))
                .then_with(|| a.number.cmp(&b.number))
        });
    }
}

// =============================================================================
// Selection
// =============================================================================

/// Select the features in scope for `options`, ordered by `order`.
pub fn select_features<'s>(
    registry: &Registry<'s>,
    options: &GenOptions,
    order: &dyn FeatureOrder,
) -> Vec<SelectedFeature<'s>> {
    let mut selected = Vec::new();

    let mut api_matched = false;
    for feature in registry.features().iter().filter(|f| f.is_core_version()) {
        if feature.api != options.api.as_deref() {
            debug!(feature = feature.name, api = ?feature.api, "not including version (api differs)");
            continue;
        }
        api_matched = true;

        if !version_matches(options.versions.as_ref(), feature) {
            debug!(feature = feature.name, "not including version (does not match requested versions)");
            continue;
        }
        let emit = version_matches(options.emit_versions.as_ref(), feature);
        if !emit {
            debug!(feature = feature.name, "not tagging version for emission");
        }
        selected.push(SelectedFeature {
            feature: *feature,
            emit,
        });
    }
    if !api_matched {
        warn!(api = ?options.api, "no matching api versions found");
    }

    let mut extensions: Vec<&FeatureRecord<'s>> =
        registry.features().iter().filter(|f| !f.is_core_version()).collect();
    extensions.sort_by_key(|f| f.number);

    for ext in extensions {
        let mut include = false;
        if let Some(selector) = options.default_extensions.as_deref() {
            if supported_matches(ext, selector) {
                debug!(extension = ext.name, "including extension (supported matches default selector)");
                include = true;
            }
        }
        if options.add_extensions.as_ref().is_some_and(|p| p.matches(ext.name)) {
            debug!(extension = ext.name, "including extension (explicitly added)");
            include = true;
        }
        if options.remove_extensions.as_ref().is_some_and(|p| p.matches(ext.name)) {
            debug!(extension = ext.name, "removing extension (explicitly removed)");
            include = false;
        }

        if include {
            selected.push(SelectedFeature {
                feature: *ext,
                emit: true,
            });
        } else {
            debug!(extension = ext.name, "not including extension");
        }
    }

    order.sort(&mut selected);
    selected
}

fn version_matches(pattern: Option<&Pattern>, feature: &FeatureRecord<'_>) -> bool {
    pattern.map_or(true, |p| p.matches(feature.name) || p.matches(feature.version))
}

/// Does the extension's `supported` pattern match the whole selector?
fn supported_matches(ext: &FeatureRecord<'_>, selector: &str) -> bool {
    let Some(supported) = ext.supported else {
        return false;
    };
    match Pattern::exact(supported) {
        Ok(pattern) => pattern.matches(selector),
        Err(e) => {
            warn!(extension = ext.name, supported, error = %e, "unusable supported pattern");
            false
        }
    }
}
