//! Generator options
//!
//! What to resolve: the requested api/profile plus the patterns selecting
//! core versions and extensions.

use regex::Regex;
use std::fmt;

use crate::error::{RegistryError, Result};

/// A regular expression anchored at the start of the text only, so
/// `VK_VERSION_1_[01]` matches `VK_VERSION_1_0` and also `VK_VERSION_1_0_X`.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    pub fn new(source: &str) -> Result<Self> {
        Self::compile(source, format!("^(?:{})", source))
    }

    /// Pattern that must match the whole text
    pub fn exact(source: &str) -> Result<Self> {
        Self::compile(source, format!("^(?:{})$", source))
    }

    fn compile(source: &str, anchored: String) -> Result<Self> {
        let regex = Regex::new(&anchored).map_err(|e| RegistryError::Pattern {
            pattern: source.to_string(),
            source: e,
        })?;
        Ok(Self {
            source: source.to_string(),
            regex,
        })
    }

    pub fn matches(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

/// Requested configuration for one resolution run
#[derive(Debug, Clone)]
pub struct GenOptions {
    /// Requested api name, e.g. `vulkan`
    pub api: Option<String>,
    pub profile: Option<String>,
    /// Core versions to include (matched against name or number);
    /// `None` includes every version of the api
    pub versions: Option<Pattern>,
    /// Included core versions whose declarations are rendered;
    /// `None` renders all of them
    pub emit_versions: Option<Pattern>,
    /// Selector matched against each extension's `supported` pattern
    pub default_extensions: Option<String>,
    /// Extensions forced in by name
    pub add_extensions: Option<Pattern>,
    /// Extensions forced out by name
    pub remove_extensions: Option<Pattern>,
}

impl GenOptions {
    /// All versions of `api`, all emitted, no extensions
    pub fn new(api: impl Into<String>) -> Self {
        Self {
            api: Some(api.into()),
            profile: None,
            versions: None,
            emit_versions: None,
            default_extensions: None,
            add_extensions: None,
            remove_extensions: None,
        }
    }

    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    pub fn with_versions(mut self, pattern: &str) -> Result<Self> {
        self.versions = Some(Pattern::new(pattern)?);
        Ok(self)
    }

    pub fn with_emit_versions(mut self, pattern: &str) -> Result<Self> {
        self.emit_versions = Some(Pattern::new(pattern)?);
        Ok(self)
    }

    pub fn with_default_extensions(mut self, selector: impl Into<String>) -> Self {
        self.default_extensions = Some(selector.into());
        self
    }

    pub fn with_add_extensions(mut self, pattern: &str) -> Result<Self> {
        self.add_extensions = Some(Pattern::new(pattern)?);
        Ok(self)
    }

    pub fn with_remove_extensions(mut self, pattern: &str) -> Result<Self> {
        self.remove_extensions = Some(Pattern::new(pattern)?);
        Ok(self)
    }
}
