//! Two-pass generator driver
//!
//! ```text
//! Reset ──▶ Tagging ──▶ Emitting ──▶ Done
//!           (pass 1)    (pass 2)
//! ```
//!
//! Pass 1 applies every selected feature's deltas, emitted or not, so the
//! required flags are final before anything is generated. Pass 2 walks the
//! same feature list and generates each required entity once, after its
//! dependencies, handing it to the [`Emitter`] when the current feature is
//! tagged for emission.

use std::collections::HashSet;
use tracing::{debug, error};

use super::marker::Marker;
use super::options::GenOptions;
use super::select::{select_features, DefaultFeatureOrder, FeatureOrder, SelectedFeature};
use crate::enum_value::EnumValue;
use crate::error::Result;
use crate::registry::{
    matches, EntityDef, EntityId, EntityKind, EntityRecord, EnumerantSource, FeatureRecord, Registry,
    ResolutionContext, RunPhase,
};
use crate::schema::{CommandDef, EnumGroupDef, TypeCategory, TypeDef};

// =============================================================================
// Emitter
// =============================================================================

/// One enumerant handed to [`Emitter::gen_group`]
#[derive(Debug, Clone)]
pub struct GroupMember<'s> {
    pub id: EntityId,
    pub name: &'s str,
    pub source: EnumerantSource<'s>,
    pub value: Option<EnumValue>,
}

/// Renders what the driver decides to produce. It never influences
/// which entities are included.
pub trait Emitter {
    fn begin_file(&mut self, _options: &GenOptions) {}

    fn begin_feature(&mut self, _feature: &FeatureRecord<'_>, _emit: bool) {}

    fn gen_type(&mut self, record: &EntityRecord<'_>, def: &TypeDef);

    /// An enum group with its own enumerants plus the required ones
    /// contributed by versions and extensions
    fn gen_group(&mut self, record: &EntityRecord<'_>, def: &EnumGroupDef, members: &[GroupMember<'_>]);

    fn gen_enum(&mut self, record: &EntityRecord<'_>, source: &EnumerantSource<'_>, value: Option<&EnumValue>);

    fn gen_cmd(&mut self, record: &EntityRecord<'_>, def: &CommandDef);

    fn end_feature(&mut self) {}

    fn end_file(&mut self) {}
}

// =============================================================================
// Generator
// =============================================================================

/// Outcome of one run
#[derive(Debug)]
pub struct Resolution<'s> {
    pub features: Vec<SelectedFeature<'s>>,
    pub context: ResolutionContext,
}

/// Resolves one configuration against a registry
pub struct Generator<'r, 's> {
    registry: &'r Registry<'s>,
    options: &'r GenOptions,
    order: Box<dyn FeatureOrder + 'r>,
}

impl<'r, 's> Generator<'r, 's> {
    pub fn new(registry: &'r Registry<'s>, options: &'r GenOptions) -> Self {
        Self {
            registry,
            options,
            order: Box::new(DefaultFeatureOrder::default()),
        }
    }

    /// Replace the feature ordering procedure
    pub fn with_order(mut self, order: impl FeatureOrder + 'r) -> Self {
        self.order = Box::new(order);
        self
    }

    /// Features in scope, in the order both passes visit them
    pub fn features(&self) -> Vec<SelectedFeature<'s>> {
        select_features(self.registry, self.options, self.order.as_ref())
    }

    /// Run both passes in a fresh context
    pub fn run(&self, emitter: &mut dyn Emitter) -> Result<Resolution<'s>> {
        let mut context = ResolutionContext::new(self.registry);
        let features = self.run_in(&mut context, emitter)?;
        Ok(Resolution { features, context })
    }

    /// Run both passes in `ctx`, resetting it first
    pub fn run_in(&self, ctx: &mut ResolutionContext, emitter: &mut dyn Emitter) -> Result<Vec<SelectedFeature<'s>>> {
        debug!(api = ?self.options.api, profile = ?self.options.profile, "resolving api");
        ctx.reset();
        let features = self.features();

        ctx.enter(RunPhase::Tagging)?;
        self.tag(ctx, &features)?;

        ctx.enter(RunPhase::Emitting)?;
        self.emit(ctx, &features, emitter)?;

        ctx.enter(RunPhase::Done)?;
        Ok(features)
    }

    /// Pass 1
    fn tag(&self, ctx: &mut ResolutionContext, features: &[SelectedFeature<'s>]) -> Result<()> {
        let api = self.options.api.as_deref();
        let profile = self.options.profile.as_deref();
        let mut marker = Marker::new(self.registry, ctx, api, profile);
        for selected in features {
            debug!(feature = selected.feature.name, "pass 1: tagging");
            marker.require_and_remove(&selected.feature)?;
            marker.assign_additional_validity(&selected.feature)?;
        }
        Ok(())
    }

    /// Pass 2
    fn emit(
        &self,
        ctx: &mut ResolutionContext,
        features: &[SelectedFeature<'s>],
        emitter: &mut dyn Emitter,
    ) -> Result<()> {
        emitter.begin_file(self.options);
        for selected in features {
            self.emit_feature(ctx, selected, emitter)?;
        }
        emitter.end_file();
        Ok(())
    }

    fn emit_feature(
        &self,
        ctx: &mut ResolutionContext,
        selected: &SelectedFeature<'s>,
        emitter: &mut dyn Emitter,
    ) -> Result<()> {
        let api = self.options.api.as_deref();
        let profile = self.options.profile.as_deref();
        let feature = &selected.feature;
        debug!(feature = feature.name, emit = selected.emit, "pass 2: generating interface");
        emitter.begin_feature(feature, selected.emit);

        let mut pass = Emission {
            registry: self.registry,
            api,
            ctx,
            emitter: &mut *emitter,
            emit: selected.emit,
            generating: HashSet::new(),
        };
        for fragment in feature.require {
            if !matches(api, profile, fragment)? {
                continue;
            }
            for name in &fragment.types {
                pass.generate(name, EntityKind::Type);
            }
            for def in &fragment.enums {
                pass.generate(&def.name, EntityKind::Enumerant);
            }
            for name in &fragment.commands {
                pass.generate(name, EntityKind::Command);
            }
        }

        emitter.end_feature();
        Ok(())
    }
}

// =============================================================================
// Pass 2 State
// =============================================================================

/// Generation state for one feature of pass 2
struct Emission<'a, 's> {
    registry: &'a Registry<'s>,
    api: Option<&'a str>,
    ctx: &'a mut ResolutionContext,
    emitter: &'a mut dyn Emitter,
    emit: bool,
    /// Entities whose dependencies are being generated
    generating: HashSet<EntityId>,
}

impl<'a, 's> Emission<'a, 's> {
    fn generate(&mut self, name: &str, kind: EntityKind) {
        match self.registry.lookup(name, kind, self.api) {
            Some(id) => self.generate_id(id),
            None => debug!(kind = %kind, name, "no entry found, skipping"),
        }
    }

    fn generate_id(&mut self, id: EntityId) {
        let registry = self.registry;
        let record = registry.entity(id);
        if !self.ctx.is_required(id) {
            debug!(kind = %record.kind(), name = record.name, "skipping (not required)");
            return;
        }
        if self.ctx.is_declared(id) {
            debug!(kind = %record.kind(), name = record.name, "skipping (already declared)");
            return;
        }
        if !self.generating.insert(id) {
            debug!(kind = %record.kind(), name = record.name, "dependency cycle, deferring");
            return;
        }

        match record.def {
            EntityDef::Type(ty) => {
                if let Some(dep) = ty.requires.as_deref() {
                    self.generate(dep, EntityKind::Type);
                }
                for nested in ty.nested_types() {
                    self.generate(nested, EntityKind::Type);
                }
                for nested in ty.nested_enums() {
                    self.generate(nested, EntityKind::Enumerant);
                }
            }
            EntityDef::Command(cmd) => {
                for ty in cmd.nested_types() {
                    self.generate(ty, EntityKind::Type);
                }
            }
            EntityDef::EnumGroup(_) | EntityDef::Enumerant(_) => {}
        }

        self.generating.remove(&id);
        self.ctx.declare(id);
        let group = self.group_of(record);
        if let Some(group) = group {
            self.ctx.declare(group.id);
        }

        if !self.emit {
            debug!(kind = %record.kind(), name = record.name, "skipping (feature not emitted)");
            return;
        }
        self.render(record);
    }

    fn render(&mut self, record: &EntityRecord<'s>) {
        match record.def {
            EntityDef::Type(ty) if ty.category == Some(TypeCategory::Enum) => self.render_group_of(record),
            EntityDef::Type(ty) => self.emitter.gen_type(record, ty),
            EntityDef::EnumGroup(group) => self.render_group(record, group),
            EntityDef::Enumerant(source) if source.is_contributed() => {
                debug!(name = record.name, group = ?source.group, "rendered with its group");
            }
            EntityDef::Enumerant(source) => {
                let value = self.value_of(record.name, &source);
                self.emitter.gen_enum(record, &source, value.as_ref());
            }
            EntityDef::Command(cmd) => self.emitter.gen_cmd(record, cmd),
        }
    }

    /// The group an enum-category type is rendered through
    fn group_of(&self, record: &EntityRecord<'s>) -> Option<&'a EntityRecord<'s>> {
        match record.def {
            EntityDef::Type(ty) if ty.category == Some(TypeCategory::Enum) => {
                self.registry.record(record.name, EntityKind::EnumGroup, self.api)
            }
            _ => None,
        }
    }

    /// Enum-category types are rendered by the group of the same name
    fn render_group_of(&mut self, record: &EntityRecord<'s>) {
        let Some(group_record) = self.group_of(record) else {
            error!(type_name = record.name, "no matching enum group found");
            return;
        };
        if let Some(group) = group_record.as_group() {
            self.render_group(group_record, group);
        }
    }

    fn render_group(&mut self, record: &EntityRecord<'s>, group: &EnumGroupDef) {
        let registry = self.registry;
        let members: Vec<GroupMember<'s>> = registry
            .group_members(&group.name)
            .iter()
            .filter_map(|&id| {
                let member = registry.entity(id);
                let source = member.as_enumerant()?;
                if source.is_contributed() && !self.ctx.is_required(id) {
                    return None;
                }
                Some(GroupMember {
                    id,
                    name: member.name,
                    source,
                    value: self.value_of(member.name, &source),
                })
            })
            .collect();
        self.emitter.gen_group(record, group, &members);
    }

    fn value_of(&self, name: &str, source: &EnumerantSource<'_>) -> Option<EnumValue> {
        source.value().unwrap_or_else(|e| {
            error!(enum_name = name, error = %e, "cannot compute enumerant value");
            None
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::emit::RecordingEmitter;
    use crate::schema::SchemaTree;
    use std::collections::BTreeSet;

    fn tree() -> SchemaTree {
        serde_json::from_value(serde_json::json!({
            "types": [
                {"name": "Bar", "category": "basetype"},
                {"name": "VkMode", "category": "enum"},
                {"name": "Foo", "category": "struct", "requires": "Bar", "members": [
                    {"name": "mode", "type": "VkMode", "decl": "VkMode mode"}
                ]}
            ],
            "enum_groups": [
                {"name": "VkMode", "type": "enum", "enumerants": [
                    {"name": "VK_MODE_A", "value": "0"}
                ]}
            ],
            "features": [
                {"name": "V1", "api": "vulkan", "number": "1.0", "require": [
                    {"types": ["Bar", "VkMode"]}
                ]},
                {"name": "V2", "api": "vulkan", "number": "2.0", "require": [
                    {"types": ["Foo"]}
                ]}
            ]
        }))
        .unwrap()
    }

    fn options() -> GenOptions {
        GenOptions::new("vulkan")
            .with_versions("V1|V2")
            .unwrap()
            .with_emit_versions("V2")
            .unwrap()
    }

    #[test]
    fn test_declared_set_only_grows_during_pass_two() {
        let tree = tree();
        let registry = Registry::new(&tree);
        let options = options();
        let generator = Generator::new(&registry, &options);
        let features = generator.features();
        assert_eq!(features.iter().map(|f| f.emit).collect::<Vec<_>>(), vec![false, true]);

        let mut ctx = ResolutionContext::new(&registry);
        ctx.enter(RunPhase::Tagging).unwrap();
        generator.tag(&mut ctx, &features).unwrap();
        ctx.enter(RunPhase::Emitting).unwrap();
        assert_eq!(ctx.declared_ids().count(), 0);

        let mut emitter = RecordingEmitter::new();
        let mut previous: BTreeSet<EntityId> = BTreeSet::new();
        for selected in &features {
            generator.emit_feature(&mut ctx, selected, &mut emitter).unwrap();
            let current: BTreeSet<EntityId> = ctx.declared_ids().collect();
            assert!(current.is_superset(&previous), "{} undeclared something", selected.feature.name);
            assert!(current.len() > previous.len(), "{} declared nothing", selected.feature.name);
            previous = current;
        }
        assert_eq!(emitter.declared(), vec!["Foo"]);
    }

    #[test]
    fn test_unemitted_enum_type_declares_its_group() {
        let tree = tree();
        let registry = Registry::new(&tree);
        let options = options();
        let resolution = Generator::new(&registry, &options)
            .run(&mut RecordingEmitter::new())
            .unwrap();

        let ty = registry.lookup("VkMode", EntityKind::Type, Some("vulkan")).unwrap();
        let group = registry.lookup("VkMode", EntityKind::EnumGroup, Some("vulkan")).unwrap();
        assert!(resolution.context.is_declared(ty));
        assert!(resolution.context.is_declared(group));
    }
}
