//! Schema tree
//!
//! The already-parsed API registry that the resolver works from. Parsing the
//! registry's XML syntax happens elsewhere; this module only defines the
//! tree shape and loads it from its JSON rendition.
//!
//! ## Shape
//!
//! ```text
//! SchemaTree
//! ├── types         (struct, union, handle, enum, bitmask, basetype, ...)
//! ├── enum_groups   (enumerants given by value, bitpos, or extension offset)
//! ├── commands      (prototype + ordered parameters + return codes)
//! ├── features      (core versions, always api-qualified)
//! └── extensions    (numbered, with a "supported" api pattern)
//! ```

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;

use crate::error::Result;

// =============================================================================
// Tree Root
// =============================================================================

/// A complete, already-parsed registry
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaTree {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub types: Vec<TypeDef>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub enum_groups: Vec<EnumGroupDef>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub commands: Vec<CommandDef>,

    /// Core versions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub features: Vec<FeatureDef>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extensions: Vec<ExtensionDef>,

    /// SHA256 of the source document (empty when built in code)
    #[serde(skip)]
    pub bundle_hash: String,
}

impl SchemaTree {
    /// Parse a tree from its JSON rendition
    pub fn from_json_str(content: &str) -> Result<Self> {
        let mut tree: SchemaTree = serde_json::from_str(content)?;
        tree.bundle_hash = format!("{:x}", Sha256::digest(content.as_bytes()));
        Ok(tree)
    }

    /// Load a tree from a JSON file
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }
}

// =============================================================================
// Types
// =============================================================================

/// Category of a `<type>` definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeCategory {
    Struct,
    Union,
    Handle,
    /// The type is rendered by its enum group of the same name
    Enum,
    Bitmask,
    Basetype,
    Define,
    #[serde(rename = "funcpointer")]
    FuncPointer,
    Include,
}

impl TypeCategory {
    /// Does this category carry members?
    pub fn has_members(&self) -> bool {
        matches!(self, Self::Struct | Self::Union)
    }
}

/// A member of a struct/union, a parameter of a command, or a prototype
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberDecl {
    #[serde(default)]
    pub name: String,

    /// Referenced type, if the declaration names one
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,

    /// Full declaration text, e.g. `const VkFooCreateInfo* pCreateInfo`
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub decl: String,

    /// Constant referenced in the declaration, e.g. an array length
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enum_ref: Option<String>,

    /// Enum group this value is drawn from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

impl MemberDecl {
    /// Declaration text, falling back to `type name` when no text was given
    pub fn text(&self) -> String {
        if !self.decl.is_empty() {
            return self.decl.clone();
        }
        match &self.type_name {
            Some(ty) if self.name.is_empty() => ty.clone(),
            Some(ty) => format!("{} {}", ty, self.name),
            None => self.name.clone(),
        }
    }
}

/// A `<type>` definition
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TypeDef {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api: Option<String>,

    /// Absent for types defined outside the API (platform types)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<TypeCategory>,

    /// Single type this one depends on (e.g. a header include)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires: Option<String>,

    /// Comma-separated parent handles (handles only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,

    /// Comma-separated structs this struct may extend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structextends: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<MemberDecl>,

    /// Nested type references outside of members (funcpointer signatures, defines)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub type_refs: Vec<String>,

    /// Nested enum references outside of members
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub enum_refs: Vec<String>,
}

impl TypeDef {
    /// Every type referenced anywhere inside this definition
    pub fn nested_types(&self) -> impl Iterator<Item = &str> {
        self.members
            .iter()
            .filter_map(|m| m.type_name.as_deref())
            .chain(self.type_refs.iter().map(String::as_str))
    }

    /// Every enumerant referenced anywhere inside this definition
    pub fn nested_enums(&self) -> impl Iterator<Item = &str> {
        self.members
            .iter()
            .filter_map(|m| m.enum_ref.as_deref())
            .chain(self.enum_refs.iter().map(String::as_str))
    }

    /// Immediate parent handles
    pub fn parents(&self) -> impl Iterator<Item = &str> {
        split_list(self.parent.as_deref())
    }

    /// Structs this struct extends
    pub fn extended_structs(&self) -> impl Iterator<Item = &str> {
        split_list(self.structextends.as_deref())
    }

    pub fn is_handle(&self) -> bool {
        self.category == Some(TypeCategory::Handle)
    }
}

fn split_list(attr: Option<&str>) -> impl Iterator<Item = &str> {
    attr.unwrap_or("")
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

// =============================================================================
// Enumerations
// =============================================================================

/// Kind of an `<enums>` block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupKind {
    Enum,
    Bitmask,
    Constants,
}

/// An `<enums>` block
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnumGroupDef {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api: Option<String>,

    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<GroupKind>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub enumerants: Vec<EnumerantDef>,
}

/// An `<enum>` element, either defining a value or referring to one by name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumerantDef {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bitpos: Option<u32>,

    /// Offset inside the contributing extension's value block
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,

    /// Group this enumerant is added to (extension-contributed values)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,

    /// `-` for negative offset values
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,

    /// Explicit extension number, overriding the contributing extension's
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extnumber: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

impl EnumerantDef {
    /// Reference-only element, e.g. `{"name": "VK_MAX_EXTENSION_NAME_SIZE"}`
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn is_negative(&self) -> bool {
        self.dir.as_deref() == Some("-")
    }

    /// Does this element carry its own value (rather than only naming one)?
    pub fn defines_value(&self) -> bool {
        self.value.is_some() || self.bitpos.is_some() || self.offset.is_some() || self.alias.is_some()
    }
}

// =============================================================================
// Commands
// =============================================================================

/// A `<command>` definition
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommandDef {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api: Option<String>,

    /// Return type declaration
    #[serde(default)]
    pub proto: MemberDecl,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<MemberDecl>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub success_codes: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub error_codes: Vec<String>,
}

impl CommandDef {
    /// Every type referenced in the prototype and parameter list
    pub fn nested_types(&self) -> impl Iterator<Item = &str> {
        self.proto
            .type_name
            .as_deref()
            .into_iter()
            .chain(self.params.iter().filter_map(|p| p.type_name.as_deref()))
    }

    pub fn return_type(&self) -> Option<&str> {
        self.proto.type_name.as_deref()
    }
}

// =============================================================================
// Features (core versions and extensions)
// =============================================================================

/// A `<require>` or `<remove>` block
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Fragment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub types: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub enums: Vec<EnumerantDef>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub commands: Vec<String>,

    /// Additional valid-usage statements attached to a command or struct
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub usages: Vec<UsageDef>,
}

/// A `<usage>` statement inside a fragment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageDef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    #[serde(default, rename = "struct", skip_serializing_if = "Option::is_none")]
    pub structure: Option<String>,

    #[serde(default)]
    pub text: String,
}

/// A core version (`<feature>`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureDef {
    /// e.g. `VK_VERSION_1_1`
    pub name: String,

    pub api: String,

    /// Version number, e.g. `1.1`
    pub number: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub require: Vec<Fragment>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub remove: Vec<Fragment>,
}

/// An optional `<extension>`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtensionDef {
    /// e.g. `VK_KHR_surface`
    pub name: String,

    /// Ordering number, also the enumerant value block index
    pub number: u32,

    /// Pattern of api names this extension is supported for
    #[serde(default)]
    pub supported: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub require: Vec<Fragment>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub remove: Vec<Fragment>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_tree() {
        let tree = SchemaTree::from_json_str(
            r#"{
                "types": [
                    {"name": "VkDevice", "category": "handle", "parent": "VkPhysicalDevice"},
                    {"name": "VkFoo", "category": "struct", "members": [
                        {"name": "format", "type": "VkFormat"},
                        {"name": "data", "type": "char", "decl": "char data[VK_MAX_SIZE]", "enum_ref": "VK_MAX_SIZE"}
                    ]}
                ],
                "features": [{"name": "VK_VERSION_1_0", "api": "vulkan", "number": "1.0"}]
            }"#,
        )
        .unwrap();

        assert_eq!(tree.types.len(), 2);
        assert_eq!(tree.types[0].parents().collect::<Vec<_>>(), vec!["VkPhysicalDevice"]);
        assert_eq!(tree.types[1].nested_types().collect::<Vec<_>>(), vec!["VkFormat", "char"]);
        assert_eq!(tree.types[1].nested_enums().collect::<Vec<_>>(), vec!["VK_MAX_SIZE"]);
        assert_eq!(tree.bundle_hash.len(), 64);
    }

    #[test]
    fn test_member_text_fallback() {
        let member = MemberDecl {
            name: "device".into(),
            type_name: Some("VkDevice".into()),
            ..MemberDecl::default()
        };
        assert_eq!(member.text(), "VkDevice device");
    }

    #[test]
    fn test_parent_list_is_trimmed() {
        let ty = TypeDef {
            name: "VkSwapchainKHR".into(),
            parent: Some("VkSurfaceKHR, VkDevice".into()),
            ..TypeDef::default()
        };
        assert_eq!(ty.parents().collect::<Vec<_>>(), vec!["VkSurfaceKHR", "VkDevice"]);
    }
}
