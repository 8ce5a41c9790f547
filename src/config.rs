//! Configuration management for registry resolution and checking
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (registry.toml)
//! - Environment variables (APIREG__*)
//!
//! ## Example config file (registry.toml):
//! ```toml
//! [schema]
//! path = "registry.json"
//!
//! [generate]
//! api = "vulkan"
//! versions = "VK_VERSION_1_[0-2]"
//! emit_versions = "VK_VERSION_1_2"
//! default_extensions = "vulkan"
//! remove_extensions = "VK_KHR_video_.*"
//!
//! [check]
//! type_prefix = "Vk"
//! result_type = "VkResult"
//!
//! [[check.manual]]
//! type_name = "VkFormat"
//! codes = ["VK_ERROR_FORMAT_NOT_SUPPORTED"]
//!
//! [[check.suppressions]]
//! command = "vkGetDeviceQueue"
//! contains = ["VK_ERROR_DEVICE_LOST"]
//! ```
//!
//! Type and command names are case-sensitive, so code maps are lists of
//! entries rather than tables keyed by name.

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use crate::check::codes::CodeSets;
use crate::error::Result;
use crate::resolve::{DefaultFeatureOrder, GenOptions, Pattern};

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryConfig {
    #[serde(default)]
    pub schema: SchemaConfig,

    #[serde(default)]
    pub generate: GenerateConfig,

    #[serde(default)]
    pub check: CheckConfig,
}

/// Where the schema tree comes from
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaConfig {
    /// JSON rendition of the registry
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Resolution settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateConfig {
    #[serde(default = "default_api")]
    pub api: String,

    #[serde(default)]
    pub profile: Option<String>,

    /// Core versions to include
    #[serde(default = "default_match_all")]
    pub versions: String,

    /// Included core versions whose declarations are emitted
    #[serde(default = "default_match_all")]
    pub emit_versions: String,

    /// Selector matched against each extension's `supported` attribute
    #[serde(default = "default_extensions")]
    pub default_extensions: Option<String>,

    #[serde(default)]
    pub add_extensions: Option<String>,

    #[serde(default)]
    pub remove_extensions: Option<String>,

    /// Vendor tags ordered ahead of the rest when features are sorted
    #[serde(default = "default_ratified_tags")]
    pub ratified_tags: Vec<String>,
}

/// One `type -> codes` rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeRule {
    pub type_name: String,
    pub codes: Vec<String>,
}

/// Findings on `command` whose message contains any of `contains` are dropped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suppression {
    pub command: String,
    pub contains: Vec<String>,
}

/// Return-code consistency settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckConfig {
    /// Api whose qualified definitions take precedence
    #[serde(default = "default_api")]
    pub api: String,

    /// Prefix that marks the api's own types in declarations
    #[serde(default = "default_type_prefix")]
    pub type_prefix: String,

    /// Commands returning this type get detailed checks
    #[serde(default = "default_result_type")]
    pub result_type: String,

    /// Enum group that defines every valid return code
    #[serde(default = "default_result_type")]
    pub result_group: String,

    /// Rules applied in both directions
    #[serde(default = "default_manual")]
    pub manual: Vec<CodeRule>,

    /// An input of the type implies the codes, but the codes need no such input
    #[serde(default)]
    pub forward_only: Vec<CodeRule>,

    /// The codes need an input of the type, but the type implies nothing
    #[serde(default)]
    pub reverse_only: Vec<CodeRule>,

    #[serde(default)]
    pub suppressions: Vec<Suppression>,

    /// Commands that only get the basic checks
    #[serde(default)]
    pub skip_detailed: Vec<String>,
}

// Default value functions
fn default_api() -> String {
    "vulkan".to_string()
}

fn default_match_all() -> String {
    ".*".to_string()
}

fn default_extensions() -> Option<String> {
    Some("vulkan".to_string())
}

fn default_ratified_tags() -> Vec<String> {
    ["KHR", "ARB", "OES"].iter().map(|s| s.to_string()).collect()
}

fn default_type_prefix() -> String {
    "Vk".to_string()
}

fn default_result_type() -> String {
    "VkResult".to_string()
}

fn default_manual() -> Vec<CodeRule> {
    vec![CodeRule {
        type_name: "VkFormat".to_string(),
        codes: vec!["VK_ERROR_FORMAT_NOT_SUPPORTED".to_string()],
    }]
}

impl Default for GenerateConfig {
    fn default() -> Self {
        Self {
            api: default_api(),
            profile: None,
            versions: default_match_all(),
            emit_versions: default_match_all(),
            default_extensions: default_extensions(),
            add_extensions: None,
            remove_extensions: None,
            ratified_tags: default_ratified_tags(),
        }
    }
}

impl GenerateConfig {
    /// Compile the patterns into generator options
    pub fn to_options(&self) -> Result<GenOptions> {
        Ok(GenOptions {
            api: Some(self.api.clone()),
            profile: self.profile.clone(),
            versions: Some(Pattern::new(&self.versions)?),
            emit_versions: Some(Pattern::new(&self.emit_versions)?),
            default_extensions: self.default_extensions.clone(),
            add_extensions: self.add_extensions.as_deref().map(Pattern::new).transpose()?,
            remove_extensions: self.remove_extensions.as_deref().map(Pattern::new).transpose()?,
        })
    }

    pub fn feature_order(&self) -> DefaultFeatureOrder {
        DefaultFeatureOrder::new(self.ratified_tags.iter().cloned())
    }
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            api: default_api(),
            type_prefix: default_type_prefix(),
            result_type: default_result_type(),
            result_group: default_result_type(),
            manual: default_manual(),
            forward_only: Vec::new(),
            reverse_only: Vec::new(),
            suppressions: Vec::new(),
            skip_detailed: Vec::new(),
        }
    }
}

impl CheckConfig {
    /// Seed for `type -> codes`: manual plus forward-only rules
    pub fn forward_seed(&self) -> CodeSets {
        rules_to_sets(self.manual.iter().chain(&self.forward_only))
    }

    /// Seed for `code -> types`, still keyed by type: manual plus reverse-only rules
    pub fn reverse_seed(&self) -> CodeSets {
        rules_to_sets(self.manual.iter().chain(&self.reverse_only))
    }

    /// Every code any rule mentions
    pub fn mentioned_codes(&self) -> BTreeSet<&str> {
        self.manual
            .iter()
            .chain(&self.forward_only)
            .chain(&self.reverse_only)
            .flat_map(|rule| rule.codes.iter().map(String::as_str))
            .collect()
    }

    /// Suppression substrings grouped by command
    pub fn suppressions_by_command(&self) -> BTreeMap<String, Vec<String>> {
        let mut out: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for s in &self.suppressions {
            out.entry(s.command.clone()).or_default().extend(s.contains.iter().cloned());
        }
        out
    }
}

fn rules_to_sets<'a>(rules: impl Iterator<Item = &'a CodeRule>) -> CodeSets {
    let mut sets = CodeSets::new();
    for rule in rules {
        sets.entry(rule.type_name.clone())
            .or_default()
            .extend(rule.codes.iter().cloned());
    }
    sets
}

impl RegistryConfig {
    /// Load configuration from default locations
    pub fn load() -> std::result::Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration, layering an explicit file over the defaults
    pub fn load_from(config_path: Option<&str>) -> std::result::Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let config_locations = ["registry.toml", ".registry.toml", "config/registry.toml"];
        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        if let Some(dirs) = directories::ProjectDirs::from("dev", "familiar", "api-registry") {
            let xdg_config = dirs.config_dir().join("registry.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // APIREG__GENERATE__API=vulkansc
        builder = builder.add_source(
            Environment::with_prefix("APIREG")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Schema path, resolved against the working directory
    pub fn schema_path(&self) -> Option<PathBuf> {
        self.schema.path.as_ref().map(|p| {
            if p.is_absolute() {
                p.clone()
            } else {
                std::env::current_dir().unwrap_or_default().join(p)
            }
        })
    }
}
