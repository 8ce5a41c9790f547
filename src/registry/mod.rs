//! Entity store
//!
//! Typed records for every schema entity, built once from a [`SchemaTree`]
//! and immutable afterwards. Records borrow their definitions from the
//! tree; per-run flags live in [`ResolutionContext`].
//!
//! ## Keys
//!
//! Each record is keyed by `(kind, name, api)`. A record with an api
//! qualifier takes precedence over the unqualified record of the same name
//! when looking up for that api. Redefining a key is a warning and the
//! first definition wins.

pub mod profile;
pub mod state;

pub use profile::matches;
pub use state::{EntityState, KindState, Lifecycle, ResolutionContext, RunPhase, ValidityNotes};

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use tracing::{debug, warn};

use crate::enum_value::{enumerant_value, EnumValue};
use crate::error::Result;
use crate::schema::{
    CommandDef, EnumGroupDef, EnumerantDef, Fragment, MemberDecl, SchemaTree, TypeCategory, TypeDef,
};

// =============================================================================
// Entity Records
// =============================================================================

/// Index of an entity record inside its registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(usize);

impl EntityId {
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

/// Kind of a tracked entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    Type,
    EnumGroup,
    Enumerant,
    Command,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Type => write!(f, "type"),
            Self::EnumGroup => write!(f, "group"),
            Self::Enumerant => write!(f, "enum"),
            Self::Command => write!(f, "command"),
        }
    }
}

/// An enumerant definition together with where it came from
#[derive(Debug, Clone, Copy)]
pub struct EnumerantSource<'s> {
    pub def: &'s EnumerantDef,
    /// Owning group, or the group named by `extends`
    pub group: Option<&'s str>,
    /// Number of the contributing extension
    pub ext_number: Option<u32>,
    /// Name of the contributing version or extension
    pub feature: Option<&'s str>,
}

impl<'s> EnumerantSource<'s> {
    /// Was this enumerant added to its group by a version or extension?
    pub fn is_contributed(&self) -> bool {
        self.def.extends.is_some()
    }

    pub fn value(&self) -> Result<Option<EnumValue>> {
        enumerant_value(self.def, self.ext_number)
    }
}

/// Borrowed definition of an entity, tagged by kind
#[derive(Debug, Clone, Copy)]
pub enum EntityDef<'s> {
    Type(&'s TypeDef),
    EnumGroup(&'s EnumGroupDef),
    Enumerant(EnumerantSource<'s>),
    Command(&'s CommandDef),
}

impl<'s> EntityDef<'s> {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Type(_) => EntityKind::Type,
            Self::EnumGroup(_) => EntityKind::EnumGroup,
            Self::Enumerant(_) => EntityKind::Enumerant,
            Self::Command(_) => EntityKind::Command,
        }
    }
}

/// One tracked schema entity
#[derive(Debug, Clone)]
pub struct EntityRecord<'s> {
    pub id: EntityId,
    pub name: &'s str,
    pub api: Option<&'s str>,
    pub def: EntityDef<'s>,
}

impl<'s> EntityRecord<'s> {
    pub fn kind(&self) -> EntityKind {
        self.def.kind()
    }

    pub fn as_type(&self) -> Option<&'s TypeDef> {
        match self.def {
            EntityDef::Type(ty) => Some(ty),
            _ => None,
        }
    }

    pub fn as_command(&self) -> Option<&'s CommandDef> {
        match self.def {
            EntityDef::Command(cmd) => Some(cmd),
            _ => None,
        }
    }

    pub fn as_group(&self) -> Option<&'s EnumGroupDef> {
        match self.def {
            EntityDef::EnumGroup(group) => Some(group),
            _ => None,
        }
    }

    pub fn as_enumerant(&self) -> Option<EnumerantSource<'s>> {
        match self.def {
            EntityDef::Enumerant(source) => Some(source),
            _ => None,
        }
    }
}

// =============================================================================
// Feature Records
// =============================================================================

/// Core version or extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeatureKind {
    CoreVersion,
    Extension,
}

/// A core version or extension with borrowed require/remove fragments
#[derive(Debug, Clone, Copy)]
pub struct FeatureRecord<'s> {
    pub name: &'s str,
    pub kind: FeatureKind,
    /// Api of a core version
    pub api: Option<&'s str>,
    /// `VERSION`, or the vendor tag of an extension (`KHR` in `VK_KHR_surface`)
    pub category: &'s str,
    /// Version number of a core version (`"1.1"`), `"0"` for extensions
    pub version: &'s str,
    /// Ordering number of an extension, 0 for core versions
    pub number: u32,
    /// Supported-api pattern of an extension
    pub supported: Option<&'s str>,
    pub require: &'s [Fragment],
    pub remove: &'s [Fragment],
}

impl<'s> FeatureRecord<'s> {
    pub fn is_core_version(&self) -> bool {
        self.kind == FeatureKind::CoreVersion
    }

    /// Version number as a float for ordering; unparsable numbers sort first
    pub fn version_number(&self) -> f64 {
        self.version.parse().unwrap_or(0.0)
    }
}

fn vendor_tag(name: &str) -> &str {
    name.split('_').nth(1).unwrap_or("")
}

// =============================================================================
// Registry
// =============================================================================

/// Slots for one name: the unqualified record plus any api-qualified ones
#[derive(Debug, Default)]
struct NameSlots<'s> {
    unqualified: Option<EntityId>,
    qualified: HashMap<&'s str, EntityId>,
}

/// Immutable entity store built from a schema tree
#[derive(Debug)]
pub struct Registry<'s> {
    tree: &'s SchemaTree,
    entities: Vec<EntityRecord<'s>>,
    index: HashMap<EntityKind, HashMap<&'s str, NameSlots<'s>>>,
    features: Vec<FeatureRecord<'s>>,
    /// Group name -> own enumerants followed by contributed ones
    group_members: HashMap<&'s str, Vec<EntityId>>,
    /// Struct name -> structs that may extend it
    struct_extends: BTreeMap<&'s str, BTreeSet<&'s str>>,
}

impl<'s> Registry<'s> {
    /// Populate the store from a schema tree
    pub fn new(tree: &'s SchemaTree) -> Self {
        let mut registry = Self {
            tree,
            entities: Vec::new(),
            index: HashMap::new(),
            features: Vec::new(),
            group_members: HashMap::new(),
            struct_extends: BTreeMap::new(),
        };

        for ty in &tree.types {
            registry.add(&ty.name, ty.api.as_deref(), EntityDef::Type(ty));
            for parent in ty.extended_structs() {
                registry.struct_extends.entry(parent).or_default().insert(&ty.name);
            }
        }

        for group in &tree.enum_groups {
            registry.add(&group.name, group.api.as_deref(), EntityDef::EnumGroup(group));
            for def in &group.enumerants {
                let source = EnumerantSource {
                    def,
                    group: Some(&group.name),
                    ext_number: None,
                    feature: None,
                };
                if let Some(id) = registry.add(&def.name, def.api.as_deref(), EntityDef::Enumerant(source)) {
                    registry.group_members.entry(&group.name).or_default().push(id);
                }
            }
        }

        for cmd in &tree.commands {
            registry.add(&cmd.name, cmd.api.as_deref(), EntityDef::Command(cmd));
        }

        for feature in &tree.features {
            registry.features.push(FeatureRecord {
                name: &feature.name,
                kind: FeatureKind::CoreVersion,
                api: Some(&feature.api),
                category: "VERSION",
                version: &feature.number,
                number: 0,
                supported: None,
                require: &feature.require,
                remove: &feature.remove,
            });
            registry.add_fragment_enums(&feature.name, None, &feature.require);
        }

        for ext in &tree.extensions {
            registry.features.push(FeatureRecord {
                name: &ext.name,
                kind: FeatureKind::Extension,
                api: None,
                category: vendor_tag(&ext.name),
                version: "0",
                number: ext.number,
                supported: Some(&ext.supported),
                require: &ext.require,
                remove: &ext.remove,
            });
            registry.add_fragment_enums(&ext.name, Some(ext.number), &ext.require);
        }

        debug!(
            entities = registry.entities.len(),
            features = registry.features.len(),
            "registry populated"
        );
        registry
    }

    /// Register enumerants defined inside require fragments
    fn add_fragment_enums(&mut self, feature: &'s str, ext_number: Option<u32>, fragments: &'s [Fragment]) {
        for fragment in fragments {
            for def in &fragment.enums {
                let source = EnumerantSource {
                    def,
                    group: def.extends.as_deref(),
                    ext_number,
                    feature: Some(feature),
                };
                match def.extends.as_deref() {
                    Some(group) => {
                        let id = self.add(&def.name, def.api.as_deref(), EntityDef::Enumerant(source));
                        if !self.has_name(EntityKind::EnumGroup, group) {
                            warn!(enumerant = %def.name, group, feature, "enumerant extends undefined group");
                        } else if let Some(id) = id {
                            self.group_members.entry(group).or_default().push(id);
                        }
                    }
                    None if def.value.is_some() || def.bitpos.is_some() => {
                        self.add(&def.name, def.api.as_deref(), EntityDef::Enumerant(source));
                    }
                    None => {}
                }
            }
        }
    }

    /// Insert a record; returns `None` (with a warning) on redefinition
    fn add(&mut self, name: &'s str, api: Option<&'s str>, def: EntityDef<'s>) -> Option<EntityId> {
        let kind = def.kind();
        let slots = self.index.entry(kind).or_default().entry(name).or_default();
        let slot = match api {
            Some(api) => slots.qualified.get(api).copied(),
            None => slots.unqualified,
        };
        if slot.is_some() {
            warn!(kind = %kind, name, api, "attempt to redefine, keeping first definition");
            return None;
        }

        let id = EntityId::new(self.entities.len());
        match api {
            Some(api) => {
                slots.qualified.insert(api, id);
            }
            None => slots.unqualified = Some(id),
        }
        self.entities.push(EntityRecord { id, name, api, def });
        Some(id)
    }

    fn has_name(&self, kind: EntityKind, name: &str) -> bool {
        self.index.get(&kind).is_some_and(|names| names.contains_key(name))
    }

    pub fn tree(&self) -> &'s SchemaTree {
        self.tree
    }

    /// Look up an entity; the `(name, api)` record wins over the unqualified one
    pub fn lookup(&self, name: &str, kind: EntityKind, api: Option<&str>) -> Option<EntityId> {
        let slots = self.index.get(&kind)?.get(name)?;
        api.and_then(|api| slots.qualified.get(api).copied())
            .or(slots.unqualified)
    }

    /// Look up and return the record
    pub fn record(&self, name: &str, kind: EntityKind, api: Option<&str>) -> Option<&EntityRecord<'s>> {
        self.lookup(name, kind, api).map(|id| self.entity(id))
    }

    /// One record per name of `kind`, in schema order, picked as [`Registry::lookup`] would
    pub fn resolved(&self, kind: EntityKind, api: Option<&str>) -> Vec<&EntityRecord<'s>> {
        let mut seen = BTreeSet::new();
        self.entities
            .iter()
            .filter(|record| record.kind() == kind && seen.insert(record.name))
            .filter_map(|record| self.record(record.name, kind, api))
            .collect()
    }

    pub fn entity(&self, id: EntityId) -> &EntityRecord<'s> {
        &self.entities[id.index()]
    }

    pub fn entities(&self) -> impl Iterator<Item = &EntityRecord<'s>> {
        self.entities.iter()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Core versions and extensions in schema order
    pub fn features(&self) -> &[FeatureRecord<'s>] {
        &self.features
    }

    pub fn feature(&self, name: &str) -> Option<&FeatureRecord<'s>> {
        self.features.iter().find(|f| f.name == name)
    }

    /// Enumerants of a group: its own, then those contributed by features
    pub fn group_members(&self, group: &str) -> &[EntityId] {
        self.group_members.get(group).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every handle type, one per name
    pub fn handles(&self, api: Option<&str>) -> impl Iterator<Item = &'s TypeDef> + '_ {
        self.resolved(EntityKind::Type, api)
            .into_iter()
            .filter_map(EntityRecord::as_type)
            .filter(|ty| ty.is_handle())
    }

    /// Every command record
    pub fn commands(&self) -> impl Iterator<Item = &'s CommandDef> + '_ {
        self.entities.iter().filter_map(EntityRecord::as_command)
    }

    /// Members of a struct/union, or parameters of a command
    pub fn members_of(&self, name: &str, api: Option<&str>) -> Option<&'s [MemberDecl]> {
        if let Some(ty) = self.record(name, EntityKind::Type, api).and_then(EntityRecord::as_type) {
            return ty
                .category
                .filter(TypeCategory::has_members)
                .map(|_| ty.members.as_slice());
        }
        self.record(name, EntityKind::Command, api)
            .and_then(EntityRecord::as_command)
            .map(|cmd| cmd.params.as_slice())
    }

    /// Structs whose `structextends` names `parent`, sorted by name
    pub fn struct_extends(&self, parent: &str) -> Vec<&'s str> {
        self.struct_extends
            .get(parent)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Count `group` attributes on command prototypes and parameters that
    /// name no known enum group
    pub fn validate_groups(&self) -> BTreeMap<String, usize> {
        let mut bad: BTreeMap<String, usize> = BTreeMap::new();
        for cmd in self.commands() {
            for decl in std::iter::once(&cmd.proto).chain(cmd.params.iter()) {
                if let Some(group) = decl.group.as_deref() {
                    if !self.has_name(EntityKind::EnumGroup, group) {
                        *bad.entry(group.to_string()).or_default() += 1;
                    }
                }
            }
        }
        for (group, count) in &bad {
            warn!(group = %group, count, "group attribute names no enum group");
        }
        bad
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ExtensionDef, FeatureDef};

    fn tree() -> SchemaTree {
        serde_json::from_value(serde_json::json!({
            "types": [
                {"name": "VkFoo", "category": "struct"},
                {"name": "VkFoo", "api": "vulkansc", "category": "struct"},
                {"name": "VkFoo", "category": "union"},
                {"name": "VkBar", "category": "struct", "structextends": "VkFoo"},
                {"name": "VkBaz", "category": "struct", "structextends": "VkFoo, VkQux"}
            ],
            "enum_groups": [
                {"name": "VkResult", "type": "enum", "enumerants": [
                    {"name": "VK_SUCCESS", "value": "0"}
                ]}
            ],
            "commands": [
                {"name": "vkDoThing",
                 "proto": {"name": "vkDoThing", "type": "VkResult"},
                 "params": [{"name": "mode", "type": "VkMode", "group": "VkMode"}]}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_qualified_lookup_wins() {
        let tree = tree();
        let registry = Registry::new(&tree);

        let plain = registry.lookup("VkFoo", EntityKind::Type, Some("vulkan")).unwrap();
        let sc = registry.lookup("VkFoo", EntityKind::Type, Some("vulkansc")).unwrap();
        assert_ne!(plain, sc);
        assert_eq!(registry.entity(sc).api, Some("vulkansc"));
        assert_eq!(registry.entity(plain).api, None);
        assert_eq!(registry.lookup("VkFoo", EntityKind::Command, None), None);
    }

    #[test]
    fn test_resolved_yields_one_record_per_name() {
        let tree = tree();
        let registry = Registry::new(&tree);

        let sc = registry.resolved(EntityKind::Type, Some("vulkansc"));
        let names: Vec<&str> = sc.iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["VkFoo", "VkBar", "VkBaz"]);
        assert_eq!(sc[0].api, Some("vulkansc"));

        let plain = registry.resolved(EntityKind::Type, Some("vulkan"));
        assert_eq!(plain.len(), 3);
        assert_eq!(plain[0].api, None);
    }

    #[test]
    fn test_first_definition_wins() {
        let tree = tree();
        let registry = Registry::new(&tree);
        let foo = registry.record("VkFoo", EntityKind::Type, None).unwrap();
        assert_eq!(foo.as_type().unwrap().category, Some(TypeCategory::Struct));
    }

    #[test]
    fn test_struct_extends_index() {
        let tree = tree();
        let registry = Registry::new(&tree);
        assert_eq!(registry.struct_extends("VkFoo"), vec!["VkBar", "VkBaz"]);
        assert_eq!(registry.struct_extends("VkQux"), vec!["VkBaz"]);
        assert!(registry.struct_extends("VkBar").is_empty());
    }

    #[test]
    fn test_validate_groups_counts_unknown() {
        let tree = tree();
        let registry = Registry::new(&tree);
        let bad = registry.validate_groups();
        assert_eq!(bad.get("VkMode"), Some(&1));
        assert_eq!(bad.len(), 1);
    }

    #[test]
    fn test_extension_enumerants_join_group() {
        let mut tree = tree();
        tree.extensions.push(ExtensionDef {
            name: "VK_KHR_surface".into(),
            number: 1,
            supported: "vulkan".into(),
            require: vec![Fragment {
                enums: vec![
                    EnumerantDef {
                        name: "VK_ERROR_SURFACE_LOST_KHR".into(),
                        offset: Some(0),
                        dir: Some("-".into()),
                        extends: Some("VkResult".into()),
                        ..EnumerantDef::default()
                    },
                    EnumerantDef {
                        name: "VK_KHR_SURFACE_SPEC_VERSION".into(),
                        value: Some("25".into()),
                        ..EnumerantDef::default()
                    },
                    EnumerantDef::named("VK_SUCCESS"),
                ],
                ..Fragment::default()
            }],
            ..ExtensionDef::default()
        });
        tree.features.push(FeatureDef {
            name: "VK_VERSION_1_0".into(),
            api: "vulkan".into(),
            number: "1.0".into(),
            ..FeatureDef::default()
        });
        let registry = Registry::new(&tree);

        let members: Vec<_> = registry
            .group_members("VkResult")
            .iter()
            .map(|id| registry.entity(*id).name)
            .collect();
        assert_eq!(members, vec!["VK_SUCCESS", "VK_ERROR_SURFACE_LOST_KHR"]);

        let lost = registry
            .record("VK_ERROR_SURFACE_LOST_KHR", EntityKind::Enumerant, None)
            .and_then(EntityRecord::as_enumerant)
            .unwrap();
        assert_eq!(lost.value().unwrap(), Some(EnumValue::Int(-1_000_000_000)));
        assert!(registry.lookup("VK_KHR_SURFACE_SPEC_VERSION", EntityKind::Enumerant, None).is_some());

        let ext = registry.feature("VK_KHR_surface").unwrap();
        assert_eq!(ext.category, "KHR");
        assert_eq!(registry.feature("VK_VERSION_1_0").unwrap().category, "VERSION");
    }
}
