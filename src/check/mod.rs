//! Return-code consistency checking
//!
//! Verifies that each command's declared success/error codes agree with the
//! types it accepts:
//!
//! - **Missing code**: an input type implies a code the command does not
//!   declare. The finding carries the reference chain that reached the type.
//! - **Unexplained code**: a declared code is only justified by types the
//!   command never references.
//!
//! Every command with codes also gets the basic checks (duplicates, overlap,
//! `_ERROR_` naming, codes outside the result group). The detailed checks
//! run only for commands that return the result type.

pub mod codes;
pub mod diagnostics;

pub use codes::{compute_codes_requiring_type, compute_type_to_codes, merge_into, CodeSets};
pub use diagnostics::{Diagnostics, Finding, FindingKind, Severity};

use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

use crate::config::CheckConfig;
use crate::error::{RegistryError, Result};
use crate::graph::{HandleHierarchy, MemberClassifier, ReferenceGraph};
use crate::registry::{EntityKind, EntityRecord, Registry};
use crate::schema::{CommandDef, MemberDecl};

pub struct ConsistencyChecker<'r, 's> {
    registry: &'r Registry<'s>,
    api: String,
    result_type: String,
    result_codes: BTreeSet<&'s str>,
    input_type_to_codes: CodeSets,
    codes_requiring_type: CodeSets,
    /// Input-typed members only
    referenced_inputs: ReferenceGraph<'r, 's>,
    /// Every member naming an api type
    referenced_types: ReferenceGraph<'r, 's>,
    suppressions: BTreeMap<String, Vec<String>>,
    skip_detailed: BTreeSet<String>,
    handles: HandleHierarchy,
}

impl<'r, 's> ConsistencyChecker<'r, 's> {
    /// Build both code maps from the configured seeds
    ///
    /// Fails when a seeded code is not an enumerant of the result group, or
    /// when the handle hierarchy has a parent cycle.
    pub fn new(registry: &'r Registry<'s>, config: &CheckConfig) -> Result<Self> {
        let result_codes: BTreeSet<&'s str> = registry
            .group_members(&config.result_group)
            .iter()
            .map(|&id| registry.entity(id).name)
            .collect();

        let unknown: Vec<&str> = config
            .mentioned_codes()
            .into_iter()
            .filter(|code| !result_codes.contains(code))
            .collect();
        if !unknown.is_empty() {
            return Err(RegistryError::UnknownReturnCode(unknown.join(", ")));
        }

        let mut handles = HandleHierarchy::new(registry, Some(config.api.as_str()));
        let input_type_to_codes = compute_type_to_codes(&mut handles, &config.forward_seed())?;
        let codes_requiring_type = compute_codes_requiring_type(&mut handles, &config.reverse_seed())?;
        debug!(
            types = input_type_to_codes.len(),
            codes = codes_requiring_type.len(),
            "return-code maps computed"
        );

        let classifier = MemberClassifier::new(config.type_prefix.clone())?;
        let inputs = classifier.clone();

        Ok(Self {
            registry,
            api: config.api.clone(),
            result_type: config.result_type.clone(),
            result_codes,
            input_type_to_codes,
            codes_requiring_type,
            referenced_inputs: ReferenceGraph::new(registry, move |m: &MemberDecl| inputs.is_input(m))
                .with_api(config.api.as_str()),
            referenced_types: ReferenceGraph::new(registry, move |m: &MemberDecl| classifier.is_api_type(m))
                .with_api(config.api.as_str()),
            suppressions: config.suppressions_by_command(),
            skip_detailed: config.skip_detailed.iter().cloned().collect(),
            handles,
        })
    }

    /// Codes implied by an input of type `ty`
    pub fn codes_for_type(&self, ty: &str) -> Option<&BTreeSet<String>> {
        self.input_type_to_codes.get(ty)
    }

    /// Types that can justify `code`
    pub fn types_for_code(&self, code: &str) -> Option<&BTreeSet<String>> {
        self.codes_requiring_type.get(code)
    }

    pub fn handles(&mut self) -> &mut HandleHierarchy {
        &mut self.handles
    }

    /// Check every command of the registry, once per name
    pub fn check(&mut self) -> Diagnostics {
        let mut diags = Diagnostics::new();
        let registry = self.registry;
        let commands = registry.resolved(EntityKind::Command, Some(self.api.as_str()));
        for cmd in commands.into_iter().filter_map(EntityRecord::as_command) {
            diags.merge(self.check_command(cmd));
        }
        info!(
            errors = diags.error_count(),
            warnings = diags.warning_count(),
            "return-code check complete"
        );
        diags
    }

    /// Check one command
    pub fn check_command(&mut self, cmd: &CommandDef) -> Diagnostics {
        let mut diags = Diagnostics::new();
        self.check_basic(cmd, &mut diags);

        if cmd.return_type() != Some(self.result_type.as_str()) {
            debug!(command = %cmd.name, "skipping detailed return-code checks (return type)");
        } else if self.skip_detailed.contains(&cmd.name) {
            debug!(command = %cmd.name, "skipping detailed return-code checks (configured)");
        } else {
            self.check_detailed(cmd, &mut diags);
        }

        if let Some(patterns) = self.suppressions.get(&cmd.name) {
            diags.retain(|finding| !patterns.iter().any(|p| finding.message.contains(p.as_str())));
        }
        diags
    }

    fn check_basic(&self, cmd: &CommandDef, diags: &mut Diagnostics) {
        let name = cmd.name.as_str();

        for (list, codes) in [("errorcodes", &cmd.error_codes), ("successcodes", &cmd.success_codes)] {
            let mut seen = BTreeSet::new();
            for code in codes {
                if !seen.insert(code.as_str()) {
                    diags.basic(
                        name,
                        FindingKind::DuplicateCode,
                        code,
                        format!("Contains a duplicate in {}: {}", list, code),
                    );
                }
            }
        }

        let errors: BTreeSet<&str> = cmd.error_codes.iter().map(String::as_str).collect();
        let successes: BTreeSet<&str> = cmd.success_codes.iter().map(String::as_str).collect();

        for code in errors.intersection(&successes) {
            diags.basic(
                name,
                FindingKind::OverlappingCodes,
                code,
                format!("Has errorcodes and successcodes that overlap: {}", code),
            );
        }

        for code in &errors {
            if !code.contains("_ERROR_") {
                diags.basic(
                    name,
                    FindingKind::MisfiledCode,
                    code,
                    format!("{} in errorcodes but doesn't contain _ERROR_", code),
                );
            }
        }
        for code in &successes {
            if code.contains("_ERROR_") {
                diags.basic(
                    name,
                    FindingKind::MisfiledCode,
                    code,
                    format!("{} in successcodes but contains _ERROR_", code),
                );
            }
        }

        for code in errors.union(&successes) {
            if !self.result_codes.contains(code) {
                diags.basic(
                    name,
                    FindingKind::UnrecognizedCode,
                    code,
                    format!("Unrecognized return code: {}", code),
                );
            }
        }
    }

    fn check_detailed(&mut self, cmd: &CommandDef, diags: &mut Diagnostics) {
        let name = cmd.name.as_str();
        let declared: BTreeSet<&str> = cmd
            .success_codes
            .iter()
            .chain(&cmd.error_codes)
            .map(String::as_str)
            .collect();

        for ty in self.referenced_inputs.referenced_types(name) {
            let Some(implied) = self.input_type_to_codes.get(&ty) else {
                continue;
            };
            let missing: Vec<&String> = implied.iter().filter(|c| !declared.contains(c.as_str())).collect();
            if missing.is_empty() {
                continue;
            }
            let path = self.referenced_inputs.shortest_path(name, &ty).unwrap_or_default();
            for code in missing {
                diags.missing_code(name, code, &ty, path.clone());
            }
        }

        let referenced = self.referenced_types.referenced_types(name);
        for code in &declared {
            let Some(required) = self.codes_requiring_type.get(*code) else {
                continue;
            };
            if required.is_disjoint(&referenced) {
                let candidates: Vec<String> = required.iter().cloned().collect();
                diags.unexplained_code(name, code, &candidates);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CodeRule, Suppression};
    use crate::schema::SchemaTree;

    fn tree() -> SchemaTree {
        serde_json::from_value(serde_json::json!({
            "types": [
                {"name": "VkInstance", "category": "handle"},
                {"name": "VkDevice", "category": "handle", "parent": "VkInstance"},
                {"name": "VkFormat", "category": "enum"},
                {"name": "VkImageCreateInfo", "category": "struct", "members": [
                    {"name": "format", "type": "VkFormat", "decl": "VkFormat format"}
                ]}
            ],
            "enum_groups": [
                {"name": "VkResult", "type": "enum", "enumerants": [
                    {"name": "VK_SUCCESS", "value": "0"},
                    {"name": "VK_INCOMPLETE", "value": "5"},
                    {"name": "VK_ERROR_DEVICE_LOST", "value": "-4"},
                    {"name": "VK_ERROR_FORMAT_NOT_SUPPORTED", "value": "-11"}
                ]}
            ],
            "commands": [
                {"name": "vkCreateImage",
                 "proto": {"name": "vkCreateImage", "type": "VkResult"},
                 "params": [
                    {"name": "device", "type": "VkDevice", "decl": "VkDevice device"},
                    {"name": "pCreateInfo", "type": "VkImageCreateInfo", "decl": "const VkImageCreateInfo* pCreateInfo"}
                 ],
                 "success_codes": ["VK_SUCCESS"]},
                {"name": "vkDoNothing",
                 "proto": {"name": "vkDoNothing", "type": "VkResult"},
                 "params": [{"name": "count", "type": "uint32_t", "decl": "uint32_t count"}],
                 "success_codes": ["VK_SUCCESS", "VK_SUCCESS", "VK_ERROR_DEVICE_LOST"],
                 "error_codes": ["VK_INCOMPLETE", "VK_ERROR_DEVICE_LOST", "VK_ERROR_BOGUS"]}
            ]
        }))
        .unwrap()
    }

    fn config() -> CheckConfig {
        CheckConfig {
            forward_only: vec![CodeRule {
                type_name: "VkDevice".into(),
                codes: vec!["VK_ERROR_DEVICE_LOST".into()],
            }],
            reverse_only: vec![CodeRule {
                type_name: "VkDevice".into(),
                codes: vec!["VK_ERROR_DEVICE_LOST".into()],
            }],
            ..CheckConfig::default()
        }
    }

    #[test]
    fn test_unknown_seeded_code_is_rejected() {
        let tree = tree();
        let registry = Registry::new(&tree);
        let mut config = config();
        config.manual.push(CodeRule {
            type_name: "VkFormat".into(),
            codes: vec!["VK_ERROR_NOT_A_CODE".into()],
        });
        match ConsistencyChecker::new(&registry, &config) {
            Err(RegistryError::UnknownReturnCode(codes)) => assert_eq!(codes, "VK_ERROR_NOT_A_CODE"),
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("expected an error"),
        };
    }

    #[test]
    fn test_missing_codes_carry_the_path() {
        let tree = tree();
        let registry = Registry::new(&tree);
        let mut checker = ConsistencyChecker::new(&registry, &config()).unwrap();
        let cmd = &tree.commands[0];
        let diags = checker.check_command(cmd);

        let missing: Vec<&Finding> = diags.of_kind(FindingKind::MissingCode).collect();
        assert_eq!(missing.len(), 2);
        let format = missing.iter().find(|f| f.code == "VK_ERROR_FORMAT_NOT_SUPPORTED").unwrap();
        assert_eq!(format.path, vec!["vkCreateImage", "VkImageCreateInfo", "VkFormat"]);
        let lost = missing.iter().find(|f| f.code == "VK_ERROR_DEVICE_LOST").unwrap();
        assert_eq!(lost.path, vec!["vkCreateImage", "VkDevice"]);
    }

    #[test]
    fn test_basic_checks() {
        let tree = tree();
        let registry = Registry::new(&tree);
        let mut checker = ConsistencyChecker::new(&registry, &config()).unwrap();
        let diags = checker.check_command(&tree.commands[1]);

        assert_eq!(diags.of_kind(FindingKind::DuplicateCode).count(), 1);
        assert_eq!(diags.of_kind(FindingKind::OverlappingCodes).count(), 1);
        // VK_INCOMPLETE as an error and VK_ERROR_DEVICE_LOST as a success
        assert_eq!(diags.of_kind(FindingKind::MisfiledCode).count(), 2);
        let unrecognized: Vec<&str> = diags
            .of_kind(FindingKind::UnrecognizedCode)
            .map(|f| f.code.as_str())
            .collect();
        assert_eq!(unrecognized, vec!["VK_ERROR_BOGUS"]);
        // No handle reachable, so DEVICE_LOST is unexplained
        assert_eq!(diags.of_kind(FindingKind::UnexplainedCode).count(), 1);
    }

    #[test]
    fn test_skip_and_suppress() {
        let tree = tree();
        let registry = Registry::new(&tree);
        let mut config = config();
        config.skip_detailed.push("vkDoNothing".into());
        config.suppressions.push(Suppression {
            command: "vkCreateImage".into(),
            contains: vec!["VkFormat".into()],
        });
        let mut checker = ConsistencyChecker::new(&registry, &config).unwrap();

        let skipped = checker.check_command(&tree.commands[1]);
        assert_eq!(skipped.of_kind(FindingKind::UnexplainedCode).count(), 0);

        let suppressed = checker.check_command(&tree.commands[0]);
        let codes: Vec<&str> = suppressed.all().iter().map(|f| f.code.as_str()).collect();
        assert_eq!(codes, vec!["VK_ERROR_DEVICE_LOST"]);
    }

    #[test]
    fn test_each_command_checked_once_with_api_definition() {
        let tree: SchemaTree = serde_json::from_value(serde_json::json!({
            "types": [
                {"name": "VkFormat", "category": "enum"},
                {"name": "VkImageCreateInfo", "category": "struct", "members": [
                    {"name": "format", "type": "VkFormat", "decl": "VkFormat format"}
                ]}
            ],
            "enum_groups": [
                {"name": "VkResult", "type": "enum", "enumerants": [
                    {"name": "VK_SUCCESS", "value": "0"},
                    {"name": "VK_ERROR_FORMAT_NOT_SUPPORTED", "value": "-11"}
                ]}
            ],
            "commands": [
                {"name": "vkMake",
                 "proto": {"name": "vkMake", "type": "VkResult"},
                 "params": [
                    {"name": "pInfo", "type": "VkImageCreateInfo", "decl": "const VkImageCreateInfo* pInfo"}
                 ],
                 "success_codes": ["VK_SUCCESS"]},
                {"name": "vkMake", "api": "vulkansc",
                 "proto": {"name": "vkMake", "type": "VkResult"},
                 "success_codes": ["VK_SUCCESS"]}
            ]
        }))
        .unwrap();
        let registry = Registry::new(&tree);

        let mut checker = ConsistencyChecker::new(&registry, &CheckConfig::default()).unwrap();
        let diags = checker.check();
        assert_eq!(diags.len(), 1);
        assert_eq!(diags.all()[0].kind, FindingKind::MissingCode);

        let sc = CheckConfig {
            api: "vulkansc".into(),
            ..CheckConfig::default()
        };
        let mut checker = ConsistencyChecker::new(&registry, &sc).unwrap();
        assert!(checker.check().is_empty());
    }
}
