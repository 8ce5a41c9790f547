//! Recording emitter
//!
//! Captures the callback sequence of a run as plain events, for the
//! command-line output and for tests.

use serde::Serialize;

use super::driver::{Emitter, GroupMember};
use super::options::GenOptions;
use crate::enum_value::EnumValue;
use crate::registry::{EntityRecord, EnumerantSource, FeatureRecord};
use crate::schema::{CommandDef, EnumGroupDef, TypeCategory, TypeDef};

/// An enumerant as recorded inside a group event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberEvent {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// One emitter callback
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EmitEvent {
    BeginFile {
        api: Option<String>,
    },
    BeginFeature {
        name: String,
        emit: bool,
    },
    Type {
        name: String,
        category: Option<TypeCategory>,
    },
    Group {
        name: String,
        members: Vec<MemberEvent>,
    },
    Enum {
        name: String,
        value: Option<String>,
    },
    Command {
        name: String,
    },
    EndFeature,
    EndFile,
}

impl EmitEvent {
    /// Name of the declared entity, for declaration events
    pub fn declared_name(&self) -> Option<&str> {
        match self {
            Self::Type { name, .. } | Self::Group { name, .. } | Self::Enum { name, .. } | Self::Command { name } => {
                Some(name.as_str())
            }
            Self::BeginFile { .. } | Self::BeginFeature { .. } | Self::EndFeature | Self::EndFile => None,
        }
    }
}

/// Emitter that records every callback
#[derive(Debug, Default)]
pub struct RecordingEmitter {
    events: Vec<EmitEvent>,
}

impl RecordingEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[EmitEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<EmitEvent> {
        self.events
    }

    /// Names of rendered entities in declaration order
    pub fn declared(&self) -> Vec<&str> {
        self.events.iter().filter_map(EmitEvent::declared_name).collect()
    }
}

fn value_text(value: Option<&EnumValue>) -> Option<String> {
    value.map(ToString::to_string)
}

impl Emitter for RecordingEmitter {
    fn begin_file(&mut self, options: &GenOptions) {
        self.events.push(EmitEvent::BeginFile {
            api: options.api.clone(),
        });
    }

    fn begin_feature(&mut self, feature: &FeatureRecord<'_>, emit: bool) {
        self.events.push(EmitEvent::BeginFeature {
            name: feature.name.to_string(),
            emit,
        });
    }

    fn gen_type(&mut self, record: &EntityRecord<'_>, def: &TypeDef) {
        self.events.push(EmitEvent::Type {
            name: record.name.to_string(),
            category: def.category,
        });
    }

    fn gen_group(&mut self, record: &EntityRecord<'_>, _def: &EnumGroupDef, members: &[GroupMember<'_>]) {
        let members = members
            .iter()
            .map(|m| MemberEvent {
                name: m.name.to_string(),
                value: value_text(m.value.as_ref()),
            })
            .collect();
        self.events.push(EmitEvent::Group {
            name: record.name.to_string(),
            members,
        });
    }

    fn gen_enum(&mut self, record: &EntityRecord<'_>, _source: &EnumerantSource<'_>, value: Option<&EnumValue>) {
        self.events.push(EmitEvent::Enum {
            name: record.name.to_string(),
            value: value_text(value),
        });
    }

    fn gen_cmd(&mut self, record: &EntityRecord<'_>, _def: &CommandDef) {
        self.events.push(EmitEvent::Command {
            name: record.name.to_string(),
        });
    }

    fn end_feature(&mut self) {
        self.events.push(EmitEvent::EndFeature);
    }

    fn end_file(&mut self) {
        self.events.push(EmitEvent::EndFile);
    }
}
