//! Findings
//!
//! Collects return-code findings. Nothing here is fatal; a run with
//! findings still completes.

use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Finding Kinds
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FindingKind {
    // === Detailed ===
    /// An input type implies a code the command does not declare
    MissingCode,
    /// A declared code has no referenced type that could justify it
    UnexplainedCode,

    // === Basic ===
    /// Same code listed twice in one list
    DuplicateCode,
    /// Code listed as both success and error
    OverlappingCodes,
    /// Error code without `_ERROR_`, or success code with it
    MisfiledCode,
    /// Code is not an enumerant of the result group
    UnrecognizedCode,
}

impl FindingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingCode => "E001",
            Self::UnexplainedCode => "E002",
            Self::OverlappingCodes => "E003",
            Self::UnrecognizedCode => "E004",
            Self::DuplicateCode => "W001",
            Self::MisfiledCode => "W002",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Self::MissingCode | Self::UnexplainedCode | Self::OverlappingCodes | Self::UnrecognizedCode => {
                Severity::Error
            }
            Self::DuplicateCode | Self::MisfiledCode => Severity::Warning,
        }
    }
}

impl fmt::Display for FindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

// =============================================================================
// Finding
// =============================================================================

/// One finding about one command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub command: String,
    pub kind: FindingKind,
    pub code: String,
    /// Implicated type, or the candidate types for an unexplained code
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub types: Vec<String>,
    /// Reference chain from the command to the implicated type
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<String>,
    pub message: String,
}

impl Finding {
    pub fn new(command: impl Into<String>, kind: FindingKind, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            kind,
            code: code.into(),
            types: Vec::new(),
            path: Vec::new(),
            message: message.into(),
        }
    }

    pub fn with_types(mut self, types: impl IntoIterator<Item = String>) -> Self {
        self.types.extend(types);
        self
    }

    pub fn with_path(mut self, path: Vec<String>) -> Self {
        self.path = path;
        self
    }

    pub fn severity(&self) -> Severity {
        self.kind.severity()
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {} ({})", self.kind, self.severity(), self.message, self.command)
    }
}

// =============================================================================
// Diagnostics Collection
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Diagnostics {
    items: Vec<Finding>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, item: Finding) {
        self.items.push(item);
    }

    /// Input type implies `code` but the command does not declare it
    pub fn missing_code(&mut self, command: &str, code: &str, ty: &str, path: Vec<String>) {
        let message = format!(
            "Missing expected return code {} implied because of input of type {} found via path {}",
            code,
            ty,
            path.join(" -> ")
        );
        self.push(
            Finding::new(command, FindingKind::MissingCode, code, message)
                .with_types([ty.to_string()])
                .with_path(path),
        );
    }

    /// Declared `code` with none of `candidates` among the referenced types
    pub fn unexplained_code(&mut self, command: &str, code: &str, candidates: &[String]) {
        let message = format!(
            "Unexpected return code {} - none of these types: {} found in the set of referenced types",
            code,
            candidates.join(", ")
        );
        self.push(
            Finding::new(command, FindingKind::UnexplainedCode, code, message).with_types(candidates.iter().cloned()),
        );
    }

    pub fn basic(&mut self, command: &str, kind: FindingKind, code: &str, message: impl Into<String>) {
        self.push(Finding::new(command, kind, code, message));
    }

    /// Keep only the findings for which `keep` is true
    pub fn retain(&mut self, keep: impl FnMut(&Finding) -> bool) {
        self.items.retain(keep);
    }

    pub fn has_errors(&self) -> bool {
        self.items.iter().any(|i| i.severity() == Severity::Error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Finding> {
        self.items.iter().filter(|i| i.severity() == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Finding> {
        self.items.iter().filter(|i| i.severity() == Severity::Warning)
    }

    pub fn of_kind(&self, kind: FindingKind) -> impl Iterator<Item = &Finding> {
        self.items.iter().filter(move |i| i.kind == kind)
    }

    pub fn for_command<'a>(&'a self, command: &'a str) -> impl Iterator<Item = &'a Finding> {
        self.items.iter().filter(move |i| i.command == command)
    }

    pub fn all(&self) -> &[Finding] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    pub fn warning_count(&self) -> usize {
        self.warnings().count()
    }

    pub fn merge(&mut self, other: Diagnostics) {
        self.items.extend(other.items);
    }

    /// Findings grouped by command, followed by totals
    pub fn format_all(&self) -> String {
        let mut output = String::new();
        let mut current: Option<&str> = None;

        for item in &self.items {
            if current != Some(item.command.as_str()) {
                output.push_str(&format!("\nMessages for {}\n", item.command));
                current = Some(item.command.as_str());
            }
            output.push_str(&format!("  {}\n", item));
        }

        if !self.is_empty() {
            output.push_str(&format!(
                "\n{} error(s), {} warning(s)\n",
                self.error_count(),
                self.warning_count()
            ));
        }
        output
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_all())
    }
}

impl IntoIterator for Diagnostics {
    type Item = Finding;
    type IntoIter = std::vec::IntoIter<Finding>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Finding;
    type IntoIter = std::slice::Iter<'a, Finding>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
