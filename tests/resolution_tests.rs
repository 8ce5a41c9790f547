//! Resolution Tests
//!
//! End-to-end runs of the two-pass generator against small registries.

use std::collections::HashSet;

use api_registry::resolve::{EmitEvent, Marker, MemberEvent};
use api_registry::schema::Fragment;
use api_registry::{
    EntityKind, GenOptions, Generator, RecordingEmitter, Registry, RegistryError, ResolutionContext, RunPhase,
    SchemaTree,
};

fn load(content: &str) -> SchemaTree {
    SchemaTree::from_json_str(content).unwrap()
}

fn run(tree: &SchemaTree, options: &GenOptions) -> (Vec<String>, ResolutionContext) {
    let registry = Registry::new(tree);
    let mut emitter = RecordingEmitter::new();
    let resolution = Generator::new(&registry, options).run(&mut emitter).unwrap();
    let declared = emitter.declared().into_iter().map(String::from).collect();
    (declared, resolution.context)
}

// =============================================================================
// Version Selection
// =============================================================================

#[test]
fn test_dependency_emitted_immediately_before_dependent() {
    let tree = load(include_str!("fixtures/scenario_versions.json"));
    let options = GenOptions::new("vulkan")
        .with_versions("V1|V2")
        .unwrap()
        .with_emit_versions("V2")
        .unwrap();

    let registry = Registry::new(&tree);
    let mut emitter = RecordingEmitter::new();
    Generator::new(&registry, &options).run(&mut emitter).unwrap();

    assert_eq!(emitter.declared(), vec!["Bar", "Foo"]);
    assert_eq!(
        emitter.events().first(),
        Some(&EmitEvent::BeginFile {
            api: Some("vulkan".into())
        })
    );
    assert!(emitter.events().contains(&EmitEvent::BeginFeature {
        name: "V1".into(),
        emit: false
    }));
}

#[test]
fn test_unselected_version_contributes_nothing() {
    let tree = load(include_str!("fixtures/scenario_versions.json"));
    let options = GenOptions::new("vulkan").with_versions("V1").unwrap();
    let (declared, ctx) = run(&tree, &options);

    assert!(declared.is_empty());
    let registry = Registry::new(&tree);
    for name in ["Foo", "Bar"] {
        let id = registry.lookup(name, EntityKind::Type, Some("vulkan")).unwrap();
        assert!(!ctx.is_required(id), "{} should not be required", name);
    }
}

#[test]
fn test_unemitted_version_still_declares() {
    let tree = load(include_str!("fixtures/scenario_versions.json"));
    let options = GenOptions::new("vulkan")
        .with_versions("V1|V2")
        .unwrap()
        .with_emit_versions("V1")
        .unwrap();
    let (declared, ctx) = run(&tree, &options);

    assert!(declared.is_empty());
    let registry = Registry::new(&tree);
    let foo = registry.lookup("Foo", EntityKind::Type, None).unwrap();
    assert!(ctx.is_declared(foo));
}

// =============================================================================
// Require / Remove
// =============================================================================

fn group_members(events: &[EmitEvent], group: &str) -> Vec<MemberEvent> {
    events
        .iter()
        .find_map(|e| match e {
            EmitEvent::Group { name, members } if name == group => Some(members.clone()),
            _ => None,
        })
        .unwrap_or_default()
}

#[test]
fn test_later_extension_removes_enumerant() {
    let tree = load(include_str!("fixtures/scenario_removal.json"));
    let registry = Registry::new(&tree);
    let x = registry.lookup("VK_G_X_EXT", EntityKind::Enumerant, None).unwrap();

    let both = GenOptions::new("vulkan").with_add_extensions("VK_EXT_(first|second)").unwrap();
    let mut emitter = RecordingEmitter::new();
    let resolution = Generator::new(&registry, &both).run(&mut emitter).unwrap();
    assert!(!resolution.context.is_required(x));
    assert_eq!(
        group_members(emitter.events(), "VkG"),
        vec![MemberEvent {
            name: "VK_G_ZERO".into(),
            value: Some("0".into())
        }]
    );

    let first = GenOptions::new("vulkan").with_add_extensions("VK_EXT_first").unwrap();
    let mut emitter = RecordingEmitter::new();
    let resolution = Generator::new(&registry, &first).run(&mut emitter).unwrap();
    assert!(resolution.context.is_required(x));
    let members = group_members(emitter.events(), "VkG");
    assert_eq!(members.len(), 2);
    assert_eq!(members[1].value.as_deref(), Some("1000009000"));
}

#[test]
fn test_removal_does_not_propagate_to_dependencies() {
    let tree = load(include_str!("fixtures/registry.json"));
    let options = GenOptions::new("vulkan").with_default_extensions("vulkan");
    let (_, ctx) = run(&tree, &options);

    let registry = Registry::new(&tree);
    let info = registry.lookup("VkWidgetInfoKHR", EntityKind::Type, None).unwrap();
    let flags = registry.lookup("VkWidgetFlagsKHR", EntityKind::Type, None).unwrap();
    assert!(!ctx.is_required(info));
    assert!(ctx.is_required(flags));
}

// =============================================================================
// Emission Order
// =============================================================================

#[test]
fn test_declaration_sequence() {
    let tree = load(include_str!("fixtures/registry.json"));
    let options = GenOptions::new("vulkan").with_default_extensions("vulkan");
    let (declared, _) = run(&tree, &options);

    assert_eq!(
        declared,
        vec![
            "VkResult",
            "VkInstance",
            "VkFlags",
            "VkDeviceCreateFlags",
            "uint32_t",
            "VkDeviceCreateInfo",
            "VkDevice",
            "vkCreateDevice",
        ]
    );
}

#[test]
fn test_each_entity_rendered_at_most_once() {
    let tree = load(include_str!("fixtures/registry.json"));
    let options = GenOptions::new("vulkan").with_default_extensions("vulkan");
    let (declared, _) = run(&tree, &options);

    let unique: HashSet<&String> = declared.iter().collect();
    assert_eq!(unique.len(), declared.len());
}

#[test]
fn test_dependencies_precede_dependents() {
    let tree = load(include_str!("fixtures/registry.json"));
    let options = GenOptions::new("vulkan").with_default_extensions("vulkan");
    let (declared, _) = run(&tree, &options);
    let position = |name: &str| declared.iter().position(|d| d == name).unwrap();

    let registry = Registry::new(&tree);
    for record in registry.entities() {
        if !declared.iter().any(|d| d == record.name) {
            continue;
        }
        let deps: Vec<&str> = match (record.as_type(), record.as_command()) {
            (Some(ty), _) => ty.requires.as_deref().into_iter().chain(ty.nested_types()).collect(),
            (_, Some(cmd)) => cmd.nested_types().collect(),
            _ => Vec::new(),
        };
        for dep in deps.into_iter().filter(|d| *d != record.name) {
            if declared.iter().any(|d| d == dep) {
                assert!(position(dep) < position(record.name), "{} before {}", dep, record.name);
            }
        }
    }
}

#[test]
fn test_extension_enumerant_listed_in_group() {
    let tree = load(include_str!("fixtures/registry.json"));
    let options = GenOptions::new("vulkan").with_default_extensions("vulkan");
    let registry = Registry::new(&tree);
    let mut emitter = RecordingEmitter::new();
    Generator::new(&registry, &options).run(&mut emitter).unwrap();

    let names: Vec<(String, Option<String>)> = group_members(emitter.events(), "VkResult")
        .into_iter()
        .map(|m| (m.name, m.value))
        .collect();
    assert_eq!(
        names,
        vec![
            ("VK_SUCCESS".to_string(), Some("0".to_string())),
            ("VK_ERROR_DEVICE_LOST".to_string(), Some("-4".to_string())),
            ("VK_ERROR_WIDGET_LOST_KHR".to_string(), Some("-1000002000".to_string())),
        ]
    );
}

#[test]
fn test_enum_type_without_group_is_declared_but_not_rendered() {
    let tree = load(include_str!("fixtures/registry.json"));
    let options = GenOptions::new("vulkan").with_default_extensions("vulkan");
    let (declared, ctx) = run(&tree, &options);

    let registry = Registry::new(&tree);
    let orphan = registry.lookup("VkOrphan", EntityKind::Type, None).unwrap();
    assert!(ctx.is_declared(orphan));
    assert!(!declared.iter().any(|d| d == "VkOrphan"));
}

#[test]
fn test_fragments_for_other_apis_and_disabled_extensions_are_skipped() {
    let tree = load(include_str!("fixtures/registry.json"));
    let options = GenOptions::new("vulkan").with_default_extensions("vulkan");
    let (_, ctx) = run(&tree, &options);

    let registry = Registry::new(&tree);
    let sc = registry.lookup("VkScOnly", EntityKind::Type, None).unwrap();
    assert!(!ctx.is_required(sc));
}

#[test]
fn test_usage_statements_are_attached() {
    let tree = load(include_str!("fixtures/registry.json"));
    let options = GenOptions::new("vulkan");
    let (_, ctx) = run(&tree, &options);

    let registry = Registry::new(&tree);
    let cmd = registry.lookup("vkCreateDevice", EntityKind::Command, None).unwrap();
    let notes = ctx.validity(cmd).unwrap();
    assert_eq!(notes.additional.len(), 1);
    assert_eq!(notes.additional[0].text, "pCreateInfo must be valid");
    assert!(notes.removed.is_empty());
}

// =============================================================================
// Run Lifecycle
// =============================================================================

#[test]
fn test_context_is_reset_between_runs() {
    let tree = load(include_str!("fixtures/scenario_versions.json"));
    let registry = Registry::new(&tree);
    let all = GenOptions::new("vulkan");
    let only_v1 = GenOptions::new("vulkan").with_versions("V1").unwrap();
    let foo = registry.lookup("Foo", EntityKind::Type, None).unwrap();

    let mut ctx = ResolutionContext::new(&registry);
    let mut first = RecordingEmitter::new();
    Generator::new(&registry, &all).run_in(&mut ctx, &mut first).unwrap();
    assert!(ctx.is_declared(foo));
    assert_eq!(ctx.phase(), RunPhase::Done);

    let mut second = RecordingEmitter::new();
    Generator::new(&registry, &only_v1).run_in(&mut ctx, &mut second).unwrap();
    assert!(!ctx.is_declared(foo));
    assert!(second.declared().is_empty());

    let mut third = RecordingEmitter::new();
    Generator::new(&registry, &all).run_in(&mut ctx, &mut third).unwrap();
    assert_eq!(first.events(), third.events());
}

#[test]
fn test_marking_outside_tagging_phase_fails() {
    let tree = load(include_str!("fixtures/scenario_versions.json"));
    let registry = Registry::new(&tree);
    let options = GenOptions::new("vulkan");
    let mut ctx = ResolutionContext::new(&registry);
    Generator::new(&registry, &options)
        .run_in(&mut ctx, &mut RecordingEmitter::new())
        .unwrap();

    let mut marker = Marker::new(&registry, &mut ctx, Some("vulkan"), None);
    let fragment = Fragment {
        types: vec!["Foo".into()],
        ..Fragment::default()
    };
    match marker.apply_delta(&fragment, false) {
        Err(RegistryError::PhaseViolation { phase, .. }) => assert_eq!(phase, "done"),
        other => panic!("unexpected result: {:?}", other),
    }
    let foo = registry.lookup("Foo", EntityKind::Type, None).unwrap();
    assert!(ctx.is_required(foo));
}

#[test]
fn test_unrequested_profile_aborts_the_run() {
    let tree: SchemaTree = serde_json::from_value(serde_json::json!({
        "types": [{"name": "Foo", "category": "struct"}],
        "features": [
            {"name": "V1", "api": "vulkan", "number": "1.0", "require": [
                {"profile": "core", "types": ["Foo"]}
            ]}
        ]
    }))
    .unwrap();
    let registry = Registry::new(&tree);

    let err = Generator::new(&registry, &GenOptions::new("vulkan"))
        .run(&mut RecordingEmitter::new())
        .unwrap_err();
    assert!(matches!(err, RegistryError::UnrequestedAttribute { attribute: "profile", .. }));

    let core = GenOptions::new("vulkan").with_profile("core");
    let mut emitter = RecordingEmitter::new();
    Generator::new(&registry, &core).run(&mut emitter).unwrap();
    assert_eq!(emitter.declared(), vec!["Foo"]);
}
