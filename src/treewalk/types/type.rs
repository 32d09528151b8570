/// The builtin types that can be named, called to construct values, and passed to `isinstance`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinType {
    Object,
    Type,
    Bool,
    Int,
    Float,
    Str,
    Bytes,
    List,
    Tuple,
    Dict,
    Set,
    FrozenSet,
    Range,
    Slice,
    Staticmethod,
    Classmethod,
    Property,
}

const ALL: [BuiltinType; 17] = [
    BuiltinType::Object,
    BuiltinType::Type,
    BuiltinType::Bool,
    BuiltinType::Int,
    BuiltinType::Float,
    BuiltinType::Str,
    BuiltinType::Bytes,
    BuiltinType::List,
    BuiltinType::Tuple,
    BuiltinType::Dict,
    BuiltinType::Set,
    BuiltinType::FrozenSet,
    BuiltinType::Range,
    BuiltinType::Slice,
    BuiltinType::Staticmethod,
    BuiltinType::Classmethod,
    BuiltinType::Property,
];

impl BuiltinType {
    pub fn all() -> &'static [BuiltinType] {
        &ALL
    }

    pub fn name(&self) -> &'static str {
        match self {
            BuiltinType::Object => "object",
            BuiltinType::Type => "type",
            BuiltinType::Bool => "bool",
            BuiltinType::Int => "int",
            BuiltinType::Float => "float",
            BuiltinType::Str => "str",
            BuiltinType::Bytes => "bytes",
            BuiltinType::List => "list",
            BuiltinType::Tuple => "tuple",
            BuiltinType::Dict => "dict",
            BuiltinType::Set => "set",
            BuiltinType::FrozenSet => "frozenset",
            BuiltinType::Range => "range",
            BuiltinType::Slice => "slice",
            BuiltinType::Staticmethod => "staticmethod",
            BuiltinType::Classmethod => "classmethod",
            BuiltinType::Property => "property",
        }
    }

    /// Whether a value whose `type_name()` is `name` is an instance of this type.
    pub fn matches_type_name(&self, name: &str) -> bool {
        match self {
            BuiltinType::Object => true,
            BuiltinType::Int => name == "int" || name == "bool",
            BuiltinType::Tuple => name == "tuple" || name == "sys.version_info",
            BuiltinType::Set | BuiltinType::FrozenSet => name == "set",
            BuiltinType::Type => name == "type",
            other => other.name() == name,
        }
    }
}
