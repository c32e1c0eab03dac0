//! Loads a [`CommandDatabase`] from the engine's XML command config.
//!
//! Schema (see `SPEC_FULL.md` §4.1):
//! ```xml
//! <commands>
//!   <command name="CREATE_CAR" opcode="2" entity_type="1">
//!     <param kind="int32"/>
//!     <param kind="local_var" out="true"/>
//!   </command>
//!   <command name="SET_VAR_INT" opcode="1" supported="true" keyword="false">
//!     <param kind="global_var"/>
//!     <param kind="int32"/>
//!   </command>
//!   <command name="TERMINATE_THIS_SCRIPT" opcode="3" terminator="true"/>
//!   <alternators>
//!     <alternator name="SET">
//!       <command ref="SET_VAR_INT"/>
//!     </alternator>
//!   </alternators>
//! </commands>
//! ```

use super::{Alternator, Command, CommandDatabase, EntityType, EnumId, ParamDesc, ParamKind};
use serde::Deserialize;
use std::fmt;
use std::path::Path;

#[derive(Debug, Deserialize)]
#[serde(rename = "commands")]
struct CommandsXml {
    #[serde(rename = "command", default)]
    commands: Vec<CommandXml>,
    #[serde(rename = "alternators", default)]
    alternators: Option<AlternatorsXml>,
}

#[derive(Debug, Deserialize)]
struct CommandXml {
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "@opcode")]
    opcode: u16,
    #[serde(rename = "@supported", default = "default_true")]
    supported: bool,
    #[serde(rename = "@keyword", default)]
    keyword: bool,
    #[serde(rename = "@entity_type", default)]
    entity_type: Option<u32>,
    #[serde(rename = "@terminator", default)]
    terminator: bool,
    #[serde(rename = "param", default)]
    params: Vec<ParamXml>,
}

#[derive(Debug, Deserialize)]
struct ParamXml {
    #[serde(rename = "@kind")]
    kind: String,
    #[serde(rename = "@enum", default)]
    r#enum: Option<u32>,
    #[serde(rename = "@optional", default)]
    optional: bool,
    #[serde(rename = "@out", default)]
    out: bool,
    #[serde(rename = "@entity_type", default)]
    entity_type: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct AlternatorsXml {
    #[serde(rename = "alternator", default)]
    alternators: Vec<AlternatorXml>,
}

#[derive(Debug, Deserialize)]
struct AlternatorXml {
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "command", default)]
    commands: Vec<AlternatorCommandRefXml>,
}

#[derive(Debug, Deserialize)]
struct AlternatorCommandRefXml {
    #[serde(rename = "@ref")]
    r#ref: String,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DbLoadError {
    Io(String),
    Parse(String),
    UnknownParamKind(String),
}

impl fmt::Display for DbLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DbLoadError::Io(msg) => write!(f, "failed to read command database: {msg}"),
            DbLoadError::Parse(msg) => write!(f, "failed to parse command database: {msg}"),
            DbLoadError::UnknownParamKind(kind) => write!(f, "unknown param kind: {kind}"),
        }
    }
}

impl std::error::Error for DbLoadError {}

fn parse_param_kind(kind: &str, enum_ref: Option<u32>) -> Result<ParamKind, DbLoadError> {
    Ok(match kind {
        "int8" => ParamKind::Int8,
        "int16" => ParamKind::Int16,
        "int32" => ParamKind::Int32,
        "float16" => ParamKind::Float16,
        "float32" => ParamKind::Float32,
        "global_var" => ParamKind::GlobalVar,
        "local_var" => ParamKind::LocalVar,
        "text_label" => ParamKind::TextLabel,
        "string" => ParamKind::String,
        "label" => ParamKind::Label,
        "enum" => ParamKind::Enum(EnumId(enum_ref.ok_or_else(|| {
            DbLoadError::Parse("enum param is missing an enum id".to_string())
        })?)),
        other => return Err(DbLoadError::UnknownParamKind(other.to_string())),
    })
}

/// Loads and validates a command database from an XML file on disk.
pub fn load_from_xml(path: &Path, text_label_vars: bool) -> Result<CommandDatabase, DbLoadError> {
    let contents = std::fs::read_to_string(path).map_err(|e| DbLoadError::Io(e.to_string()))?;
    load_from_xml_str(&contents, text_label_vars)
}

pub fn load_from_xml_str(xml: &str, text_label_vars: bool) -> Result<CommandDatabase, DbLoadError> {
    let parsed: CommandsXml =
        quick_xml::de::from_str(xml).map_err(|e| DbLoadError::Parse(e.to_string()))?;

    let mut db = CommandDatabase::new(text_label_vars);
    for command_xml in parsed.commands {
        let params = command_xml
            .params
            .iter()
            .map(|p| {
                Ok(ParamDesc {
                    kind: parse_param_kind(&p.kind, p.r#enum)?,
                    optional: p.optional,
                    out: p.out,
                    entity_type: p.entity_type.map(EntityType),
                })
            })
            .collect::<Result<Vec<_>, DbLoadError>>()?;

        db.insert_command(Command {
            name: command_xml.name,
            opcode: command_xml.opcode,
            supported: command_xml.supported,
            params,
            entity_type: command_xml.entity_type.map(EntityType),
            is_keyword: command_xml.keyword,
            is_terminator: command_xml.terminator,
        });
    }

    if let Some(alternators) = parsed.alternators {
        for alt in alternators.alternators {
            db.insert_alternator(Alternator {
                name: alt.name,
                commands: alt.commands.into_iter().map(|c| c.r#ref).collect(),
            });
        }
    }

    Ok(db)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_commands_and_alternators() {
        let xml = r#"
            <commands>
              <command name="SET_VAR_INT" opcode="1">
                <param kind="global_var"/>
                <param kind="int32"/>
              </command>
              <command name="SET_VAR_FLOAT" opcode="2">
                <param kind="global_var"/>
                <param kind="float32"/>
              </command>
              <command name="OLD_UNSUPPORTED" opcode="3" supported="false"/>
              <alternators>
                <alternator name="SET">
                  <command ref="SET_VAR_INT"/>
                  <command ref="SET_VAR_FLOAT"/>
                </alternator>
              </alternators>
            </commands>
        "#;
        let db = load_from_xml_str(xml, false).unwrap();
        assert_eq!(db.find_command("set_var_int").unwrap().opcode, 1);
        assert!(!db.find_command("OLD_UNSUPPORTED").unwrap().supported);
        assert!(db.find_alternator("SET").is_some());
    }

    #[test]
    fn loads_the_terminator_attribute() {
        let xml = r#"
            <commands>
              <command name="TERMINATE_THIS_SCRIPT" opcode="1" terminator="true"/>
              <command name="WAIT" opcode="2"/>
            </commands>
        "#;
        let db = load_from_xml_str(xml, false).unwrap();
        assert!(db.find_command("TERMINATE_THIS_SCRIPT").unwrap().is_terminator);
        assert!(!db.find_command("WAIT").unwrap().is_terminator);
    }

    #[test]
    fn rejects_unknown_param_kind() {
        let xml = r#"
            <commands>
              <command name="X" opcode="1">
                <param kind="nonsense"/>
              </command>
            </commands>
        "#;
        assert!(matches!(
            load_from_xml_str(xml, false),
            Err(DbLoadError::UnknownParamKind(_))
        ));
    }
}
