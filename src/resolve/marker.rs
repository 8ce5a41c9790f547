//! Requirement marking
//!
//! Flips required flags in a [`ResolutionContext`]. Requiring a type or a
//! command pulls in its structural dependencies; removing only clears the
//! named entity's own flag. Dependencies are often shared by other
//! entities that stay required, so removal never propagates.

use std::collections::HashSet;
use tracing::{debug, warn};

use crate::error::Result;
use crate::registry::{matches, EntityId, EntityKind, FeatureRecord, Registry, ResolutionContext};
use crate::schema::{Fragment, UsageDef};

/// Applies require/remove deltas to one resolution context
pub struct Marker<'a, 's> {
    registry: &'a Registry<'s>,
    ctx: &'a mut ResolutionContext,
    api: Option<&'a str>,
    profile: Option<&'a str>,
}

impl<'a, 's> Marker<'a, 's> {
    pub fn new(
        registry: &'a Registry<'s>,
        ctx: &'a mut ResolutionContext,
        api: Option<&'a str>,
        profile: Option<&'a str>,
    ) -> Self {
        Self {
            registry,
            ctx,
            api,
            profile,
        }
    }

    /// Require a type with everything it depends on, or clear only its own flag
    pub fn mark_type_required(&mut self, name: &str, required: bool) {
        debug!(type_name = name, required, "tagging type");
        if required {
            let mut visited = HashSet::new();
            self.require_type(name, &mut visited);
        } else {
            match self.registry.lookup(name, EntityKind::Type, self.api) {
                Some(id) => self.ctx.set_required(id, false),
                None => warn!(type_name = name, "type is not defined"),
            }
        }
    }

    /// Each type is expanded once per top-level walk, so reference cycles end
    fn require_type(&mut self, name: &str, visited: &mut HashSet<EntityId>) {
        let registry = self.registry;
        let Some(id) = registry.lookup(name, EntityKind::Type, self.api) else {
            warn!(type_name = name, "type is not defined");
            return;
        };
        if !visited.insert(id) {
            return;
        }

        if let Some(ty) = registry.entity(id).as_type() {
            if let Some(dep) = ty.requires.as_deref() {
                debug!(type_name = name, dependency = dep, "requiring dependent type");
                self.require_type(dep, visited);
            }
            for nested in ty.nested_types() {
                self.require_type(nested, visited);
            }
            for nested in ty.nested_enums() {
                self.mark_enum_required(nested, true);
            }
        }
        self.ctx.set_required(id, true);
    }

    /// Set an enumerant's flag; enumerants have no dependencies
    pub fn mark_enum_required(&mut self, name: &str, required: bool) {
        debug!(enum_name = name, required, "tagging enum");
        match self.registry.lookup(name, EntityKind::Enumerant, self.api) {
            Some(id) => self.ctx.set_required(id, required),
            None => warn!(enum_name = name, "enum is not defined"),
        }
    }

    /// Set a command's flag; requiring it also requires its parameter types
    pub fn mark_command(&mut self, name: &str, required: bool) {
        debug!(command = name, required, "tagging command");
        let registry = self.registry;
        let Some(id) = registry.lookup(name, EntityKind::Command, self.api) else {
            warn!(command = name, "command is not defined");
            return;
        };
        self.ctx.set_required(id, required);

        if required {
            if let Some(cmd) = registry.entity(id).as_command() {
                let mut visited = HashSet::new();
                for ty in cmd.nested_types() {
                    self.require_type(ty, &mut visited);
                }
            }
        }
    }

    /// Apply one `<require>` (`required = true`) or `<remove>` fragment.
    ///
    /// Returns whether the fragment matched the requested api/profile.
    pub fn apply_delta(&mut self, fragment: &Fragment, required: bool) -> Result<bool> {
        self.ctx.ensure_tagging("apply a delta")?;
        if !matches(self.api, self.profile, fragment)? {
            debug!(comment = ?fragment.comment, "fragment does not match api/profile");
            return Ok(false);
        }

        for name in &fragment.types {
            self.mark_type_required(name, required);
        }
        for def in &fragment.enums {
            self.mark_enum_required(&def.name, required);
        }
        for name in &fragment.commands {
            self.mark_command(name, required);
        }
        Ok(true)
    }

    /// Apply a feature's require fragments, then its remove fragments
    pub fn require_and_remove(&mut self, feature: &FeatureRecord<'_>) -> Result<()> {
        debug!(feature = feature.name, "tagging required and removed entities");
        for fragment in feature.require {
            self.apply_delta(fragment, true)?;
        }
        for fragment in feature.remove {
            self.apply_delta(fragment, false)?;
        }
        Ok(())
    }

    /// Attach `<usage>` statements of matching fragments to their command
    /// or struct
    pub fn assign_additional_validity(&mut self, feature: &FeatureRecord<'_>) -> Result<()> {
        self.ctx.ensure_tagging("assign validity")?;
        for fragment in feature.require {
            if matches(self.api, self.profile, fragment)? {
                for usage in &fragment.usages {
                    self.attach_usage(usage, false);
                }
            }
        }
        for fragment in feature.remove {
            if matches(self.api, self.profile, fragment)? {
                for usage in &fragment.usages {
                    self.attach_usage(usage, true);
                }
            }
        }
        Ok(())
    }

    fn attach_usage(&mut self, usage: &UsageDef, removed: bool) {
        let targets = [
            (usage.command.as_deref(), EntityKind::Command),
            (usage.structure.as_deref(), EntityKind::Type),
        ];
        for (name, kind) in targets {
            let Some(name) = name else { continue };
            let notes = self
                .registry
                .lookup(name, kind, self.api)
                .and_then(|id| self.ctx.validity_mut(id));
            match notes {
                Some(notes) if removed => notes.removed.push(usage.clone()),
                Some(notes) => notes.additional.push(usage.clone()),
                None => warn!(kind = %kind, name, "usage names an undefined entity"),
            }
        }
    }
}
