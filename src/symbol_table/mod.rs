//! Per-script and global symbol tables: variables, labels, scripts, and
//! `#DEFINE` constants.

use crate::command_db::{EntityType, EnumId};
use indexmap::IndexMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariableScope {
    Global,
    Local,
    MissionLocal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariableType {
    Int,
    Float,
    TextLabel,
    IntArray,
    FloatArray,
    TextLabelArray,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    pub name: String,
    pub scope: VariableScope,
    pub var_type: VariableType,
    pub index: u32,
    pub array_len: Option<u32>,
    pub enum_binding: Option<EnumId>,
    /// Entity type (car, player, object…) this variable was last assigned
    /// from an annotated command's output, tracked when `entity_tracking`
    /// is enabled. `None` means untracked, not "known to hold no entity".
    pub entity: Option<EntityType>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LabelId(pub u32);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    pub id: LabelId,
    pub name: String,
    pub owning_script: String,
    /// Filled in once the control-flow lowerer assigns this label a
    /// position in the linear IR; `None` until then.
    pub target: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptKind {
    Main,
    Subscript,
    Mission,
    Streamed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptEntry {
    pub path: String,
    pub kind: ScriptKind,
    pub entry_label: Option<LabelId>,
    pub size_on_disk: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolError {
    DuplicateVariable,
    DuplicateLabel,
    DuplicateScriptName,
}

impl fmt::Display for SymbolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymbolError::DuplicateVariable => write!(f, "variable already declared in this scope"),
            SymbolError::DuplicateLabel => write!(f, "label already declared"),
            SymbolError::DuplicateScriptName => write!(f, "SCRIPT_NAME already used elsewhere"),
        }
    }
}

impl std::error::Error for SymbolError {}

/// A single lexical scope of variables. Scopes nest; lookups walk outward
/// to the innermost enclosing declaration, as required by the analyzer's
/// identifier-binding rule.
#[derive(Debug, Default, Clone)]
struct Scope {
    variables: IndexMap<String, Variable>,
    labels: IndexMap<String, LabelId>,
}

/// Per-script symbol table: a stack of lexical scopes plus the script's own
/// label and variable namespaces. `scope_then_label` governs whether a
/// freshly opened block scope is visible to a label declared in the same
/// statement before the scope itself is pushed.
#[derive(Debug, Clone)]
pub struct SymbolTable {
    script_name: String,
    scopes: Vec<Scope>,
    next_label_id: u32,
    labels: IndexMap<LabelId, Label>,
    scope_then_label: bool,
}

impl SymbolTable {
    pub fn new(script_name: impl Into<String>, scope_then_label: bool) -> Self {
        SymbolTable {
            script_name: script_name.into(),
            scopes: vec![Scope::default()],
            next_label_id: 0,
            labels: IndexMap::new(),
            scope_then_label,
        }
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(Scope::default());
    }

    pub fn pop_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    pub fn declare_variable(&mut self, variable: Variable) -> Result<(), SymbolError> {
        let scope = self.scopes.last_mut().expect("at least the root scope always exists");
        if scope.variables.contains_key(&variable.name) {
            return Err(SymbolError::DuplicateVariable);
        }
        scope.variables.insert(variable.name.clone(), variable);
        Ok(())
    }

    pub fn resolve_variable(&self, name: &str) -> Option<&Variable> {
        self.scopes.iter().rev().find_map(|scope| scope.variables.get(name))
    }

    /// Records `entity_type` as `name`'s tracked entity, e.g. after it is
    /// assigned from an entity-annotated command's output slot. A no-op if
    /// `name` isn't a declared variable in any visible scope.
    pub fn set_variable_entity(&mut self, name: &str, entity_type: EntityType) {
        if let Some(variable) = self.scopes.iter_mut().rev().find_map(|scope| scope.variables.get_mut(name)) {
            variable.entity = Some(entity_type);
        }
    }

    /// Declares a scoped label. With `scope_then_label` the label is placed
    /// into the scope that is about to be opened (so it is visible from
    /// inside that block even before any statement runs); without it, the
    /// label belongs to the currently innermost scope.
    pub fn declare_label(&mut self, name: impl Into<String>) -> Result<LabelId, SymbolError> {
        let name = name.into();
        let id = LabelId(self.next_label_id);
        let target_scope_index = if self.scope_then_label {
            self.scopes.len()
        } else {
            self.scopes.len() - 1
        };
        let scope = if target_scope_index >= self.scopes.len() {
            self.scopes.push(Scope::default());
            self.scopes.last_mut().unwrap()
        } else {
            &mut self.scopes[target_scope_index]
        };
        if scope.labels.contains_key(&name) {
            return Err(SymbolError::DuplicateLabel);
        }
        self.next_label_id += 1;
        scope.labels.insert(name.clone(), id);
        self.labels.insert(
            id,
            Label {
                id,
                name,
                owning_script: self.script_name.clone(),
                target: None,
            },
        );
        Ok(id)
    }

    pub fn resolve_label(&self, name: &str) -> Option<LabelId> {
        self.scopes.iter().rev().find_map(|scope| scope.labels.get(name).copied())
    }

    pub fn set_label_target(&mut self, id: LabelId, target: u32) {
        if let Some(label) = self.labels.get_mut(&id) {
            label.target = Some(target);
        }
    }

    pub fn label(&self, id: LabelId) -> Option<&Label> {
        self.labels.get(&id)
    }

    pub fn unresolved_labels(&self) -> impl Iterator<Item = &Label> {
        self.labels.values().filter(|l| l.target.is_none())
    }
}

/// Tracks `SCRIPT_NAME` uniqueness across the whole program (spanning every
/// job), per `script_name_check`.
#[derive(Debug, Default)]
pub struct ScriptNameRegistry {
    names: IndexMap<String, String>,
}

impl ScriptNameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `name` as declared by `script_path`. Returns the path of
    /// the earlier declaration if this is a duplicate.
    pub fn declare(&mut self, name: &str, script_path: &str) -> Result<(), String> {
        if let Some(existing) = self.names.get(name) {
            return Err(existing.clone());
        }
        self.names.insert(name.to_string(), script_path.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int_var(name: &str, index: u32) -> Variable {
        Variable {
            name: name.to_string(),
            scope: VariableScope::Local,
            var_type: VariableType::Int,
            index,
            array_len: None,
            enum_binding: None,
            entity: None,
        }
    }

    #[test]
    fn inner_scope_shadows_outer() {
        let mut table = SymbolTable::new("main.sc", false);
        table.declare_variable(int_var("x", 0)).unwrap();
        table.push_scope();
        table.declare_variable(int_var("x", 1)).unwrap();
        assert_eq!(table.resolve_variable("x").unwrap().index, 1);
        table.pop_scope();
        assert_eq!(table.resolve_variable("x").unwrap().index, 0);
    }

    #[test]
    fn set_variable_entity_updates_an_existing_declaration() {
        let mut table = SymbolTable::new("main.sc", false);
        table.declare_variable(int_var("car", 0)).unwrap();
        assert_eq!(table.resolve_variable("car").unwrap().entity, None);
        table.set_variable_entity("car", EntityType(1));
        assert_eq!(table.resolve_variable("car").unwrap().entity, Some(EntityType(1)));
    }

    #[test]
    fn duplicate_variable_in_same_scope_errors() {
        let mut table = SymbolTable::new("main.sc", false);
        table.declare_variable(int_var("x", 0)).unwrap();
        assert_eq!(table.declare_variable(int_var("x", 1)), Err(SymbolError::DuplicateVariable));
    }

    #[test]
    fn unresolved_label_detected_until_target_set() {
        let mut table = SymbolTable::new("main.sc", false);
        let id = table.declare_label("top").unwrap();
        assert_eq!(table.unresolved_labels().count(), 1);
        table.set_label_target(id, 42);
        assert_eq!(table.unresolved_labels().count(), 0);
    }

    #[test]
    fn duplicate_script_name_is_rejected() {
        let mut registry = ScriptNameRegistry::new();
        registry.declare("MAIN", "main.sc").unwrap();
        assert_eq!(registry.declare("MAIN", "other.sc"), Err("main.sc".to_string()));
    }
}
