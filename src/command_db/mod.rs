//! Immutable catalog of every engine command, built once from an XML config
//! and shared read-only by every compile job (see [`crate::job`]).

mod xml;

use indexmap::IndexMap;
use std::fmt;

pub use xml::{DbLoadError, load_from_xml};

/// An interned name, cheap to copy and compare, used for entity types and
/// enum bindings rather than raw `String`s in hot resolver paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EnumId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityType(pub u32);

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entity type {}", self.0)
    }
}

/// The shape of a single command parameter slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamKind {
    Int8,
    Int16,
    Int32,
    Float16,
    Float32,
    GlobalVar,
    LocalVar,
    TextLabel,
    String,
    Enum(EnumId),
    Label,
}

impl ParamKind {
    /// Whether `other` may be substituted in a slot of `self`'s kind, not
    /// accounting for the `text_label_vars` widening rule (applied by the
    /// caller, since it is a compile-time option, not a DB-level fact).
    fn base_compatible(&self, other: &ArgType) -> bool {
        match (self, other) {
            (ParamKind::Int8, ArgType::IntLiteral(v)) => *v >= i8::MIN as i64 && *v <= i8::MAX as i64,
            (ParamKind::Int16, ArgType::IntLiteral(v)) => *v >= i16::MIN as i64 && *v <= i16::MAX as i64,
            (ParamKind::Int32, ArgType::IntLiteral(v)) => *v >= i32::MIN as i64 && *v <= i32::MAX as i64,
            (ParamKind::Float16, ArgType::FloatLiteral(_)) => true,
            (ParamKind::Float32, ArgType::FloatLiteral(_)) => true,
            (ParamKind::GlobalVar, ArgType::GlobalVar) => true,
            (ParamKind::LocalVar, ArgType::LocalVar) => true,
            (ParamKind::TextLabel, ArgType::TextLabel) => true,
            (ParamKind::String, ArgType::String) => true,
            (ParamKind::Label, ArgType::Label) => true,
            (ParamKind::Enum(expected), ArgType::Enum(actual)) => expected == actual,
            _ => false,
        }
    }

    /// A rough specificity score used for tie-breaking: smaller-integer
    /// slots and exact matches are considered more specific than wide or
    /// widened ones.
    fn specificity(&self) -> u8 {
        match self {
            ParamKind::Int8 => 1,
            ParamKind::Int16 => 2,
            ParamKind::Int32 => 3,
            ParamKind::Float16 => 1,
            ParamKind::Float32 => 2,
            ParamKind::GlobalVar | ParamKind::LocalVar => 1,
            ParamKind::TextLabel => 1,
            ParamKind::String => 1,
            ParamKind::Enum(_) => 1,
            ParamKind::Label => 1,
        }
    }
}

/// The statically inferred type of a call-site argument, as produced by the
/// semantic analyzer's expression pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgType {
    IntLiteral(i64),
    FloatLiteral(ordered_float_bits::OrderedF32Bits),
    GlobalVar,
    LocalVar,
    TextLabel,
    String,
    Enum(EnumId),
    Label,
}

/// Minimal bit-comparable float wrapper so `ArgType` can derive `Eq`
/// without pulling in a crate solely for this.
pub mod ordered_float_bits {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OrderedF32Bits(u32);

    impl From<f32> for OrderedF32Bits {
        fn from(v: f32) -> Self {
            OrderedF32Bits(v.to_bits())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParamDesc {
    pub kind: ParamKind,
    pub optional: bool,
    pub out: bool,
    /// Expected entity type for this slot (e.g. a `car` handle), checked
    /// against the argument variable's tracked entity when `entity_tracking`
    /// is enabled. Unrelated to `Command::entity_type`, which annotates an
    /// `out` slot's *produced* entity rather than an expected one.
    pub entity_type: Option<EntityType>,
}

impl ParamDesc {
    pub fn new(kind: ParamKind) -> Self {
        ParamDesc {
            kind,
            optional: false,
            out: false,
            entity_type: None,
        }
    }

    pub fn with_entity_type(mut self, entity_type: EntityType) -> Self {
        self.entity_type = Some(entity_type);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Command {
    pub name: String,
    pub opcode: u16,
    pub supported: bool,
    pub params: Vec<ParamDesc>,
    pub entity_type: Option<EntityType>,
    pub is_keyword: bool,
    /// Never returns control to the following statement (`TERMINATE_THIS_SCRIPT`,
    /// `RETURN`…). A `SWITCH` case may end in one of these in place of `BREAK`
    /// without being flagged as falling through.
    pub is_terminator: bool,
}

impl Command {
    /// Number of required (non-optional) leading parameters.
    pub fn required_param_count(&self) -> usize {
        self.params.iter().filter(|p| !p.optional).count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alternator {
    pub name: String,
    pub commands: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveError {
    NoMatch,
    Ambiguous,
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveError::NoMatch => write!(f, "no matching overload"),
            ResolveError::Ambiguous => write!(f, "ambiguous overload"),
        }
    }
}

impl std::error::Error for ResolveError {}

/// Immutable catalog of every engine command and alternator group, built
/// once before any compile job begins (see the concurrency model in
/// `SPEC_FULL.md` §5) and shared by `Arc` thereafter.
#[derive(Debug, Default)]
pub struct CommandDatabase {
    commands: IndexMap<String, Command>,
    alternators: IndexMap<String, Alternator>,
    text_label_vars: bool,
}

impl CommandDatabase {
    pub fn new(text_label_vars: bool) -> Self {
        CommandDatabase {
            commands: IndexMap::new(),
            alternators: IndexMap::new(),
            text_label_vars,
        }
    }

    pub fn insert_command(&mut self, command: Command) {
        self.commands.insert(command.name.to_ascii_uppercase(), command);
    }

    pub fn insert_alternator(&mut self, alternator: Alternator) {
        self.alternators.insert(alternator.name.to_ascii_uppercase(), alternator);
    }

    pub fn find_command(&self, name: &str) -> Option<&Command> {
        self.commands.get(&name.to_ascii_uppercase())
    }

    pub fn find_alternator(&self, name: &str) -> Option<&Alternator> {
        self.alternators.get(&name.to_ascii_uppercase())
    }

    /// Resolves an alternator to the single command whose parameter kinds
    /// match `arg_types`. See `SPEC_FULL.md` §4.1 for the tie-breaking
    /// policy: two equally specific candidates is an ambiguity error, never
    /// a silent pick.
    pub fn resolve_alternator(
        &self,
        alternator: &Alternator,
        arg_types: &[ArgType],
    ) -> Result<&Command, ResolveError> {
        let mut best: Option<(&Command, u32)> = None;
        let mut best_is_unique = true;

        for command_name in &alternator.commands {
            let Some(command) = self.commands.get(&command_name.to_ascii_uppercase()) else {
                continue;
            };
            if !self.arity_and_kinds_match(command, arg_types) {
                continue;
            }
            let score = self.specificity_score(command, arg_types);
            match best {
                None => {
                    best = Some((command, score));
                    best_is_unique = true;
                }
                Some((_, best_score)) if score > best_score => {
                    best = Some((command, score));
                    best_is_unique = true;
                }
                Some((_, best_score)) if score == best_score => {
                    best_is_unique = false;
                }
                _ => {}
            }
        }

        match best {
            None => Err(ResolveError::NoMatch),
            Some((command, _)) if best_is_unique => Ok(command),
            Some(_) => Err(ResolveError::Ambiguous),
        }
    }

    fn arity_and_kinds_match(&self, command: &Command, arg_types: &[ArgType]) -> bool {
        if arg_types.len() < command.required_param_count() || arg_types.len() > command.params.len() {
            return false;
        }
        arg_types.iter().zip(command.params.iter()).all(|(arg, param)| {
            if param.kind == ParamKind::TextLabel && self.text_label_vars {
                matches!(arg, ArgType::TextLabel) || param.kind.base_compatible(arg)
            } else {
                param.kind.base_compatible(arg)
            }
        })
    }

    fn specificity_score(&self, command: &Command, arg_types: &[ArgType]) -> u32 {
        command
            .params
            .iter()
            .zip(arg_types.iter())
            .map(|(param, _)| param.kind.specificity() as u32)
            .sum()
    }
}
