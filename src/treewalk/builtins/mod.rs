//! Everything the sandbox provides without an import: builtin functions, type constructors,
//! exception types, the hooks the neutralizer rewrites calls into, and the host modules.

mod functions;
pub mod methods;
pub mod modules;

use crate::{
    core::Container,
    domain::{utils::quote_str, ExceptionKind},
    treewalk::{
        types::{BuiltinType, Class, Dict, Exception, Object, Range, Set, Slice},
        utils::{check_args, Args},
        DomainResult, Raise, Scope, TreewalkInterpreter, TreewalkResult, TreewalkValue,
    },
};

pub(crate) use functions::sort_values;

pub type BuiltinFn = fn(&TreewalkInterpreter<'_>, Args) -> TreewalkResult<TreewalkValue>;

/// A function implemented in Rust. Instances live in static tables and are referenced by values.
pub struct Builtin {
    pub name: &'static str,
    pub call: BuiltinFn,
}

/// The namespace consulted after a frame's globals.
pub fn builtin_scope() -> Scope {
    let mut scope = Scope::default();
    for builtin in functions::BUILTINS.iter() {
        scope.insert(builtin.name, TreewalkValue::BuiltinFunction(builtin));
    }
    for builtin_type in BuiltinType::all() {
        scope.insert(builtin_type.name(), TreewalkValue::Type(*builtin_type));
    }
    for kind in ExceptionKind::all() {
        scope.insert(kind.name(), TreewalkValue::ExceptionType(*kind));
    }
    scope
        .insert("IOError", TreewalkValue::ExceptionType(ExceptionKind::OSError))
        .insert(
            "EnvironmentError",
            TreewalkValue::ExceptionType(ExceptionKind::OSError),
        )
        .insert("NotImplemented", TreewalkValue::NotImplemented)
        .insert("Ellipsis", TreewalkValue::Ellipsis)
        .insert("__debug__", TreewalkValue::Bool(true));
    scope
}

fn at_most(args: &Args, name: &str, max: usize) -> DomainResult<()> {
    check_args(args, name, |n| n <= max, &format!("at most {max}"))
}

/// Call a builtin type, e.g. `int("3")` or `dict(a=1)`.
pub fn construct(
    interpreter: &TreewalkInterpreter<'_>,
    builtin_type: BuiltinType,
    args: Args,
) -> TreewalkResult<TreewalkValue> {
    let name = builtin_type.name();
    match builtin_type {
        BuiltinType::Object => {
            at_most(&args, name, 0).raise(interpreter)?;
            Ok(TreewalkValue::Object(Container::new(Object::new(
                interpreter.object_class(),
            ))))
        }
        BuiltinType::Type => construct_type(interpreter, args),
        BuiltinType::Bool => {
            at_most(&args, name, 1).raise(interpreter)?;
            match args.get_arg(0) {
                Some(value) => Ok(TreewalkValue::Bool(interpreter.is_truthy(value)?)),
                None => Ok(TreewalkValue::Bool(false)),
            }
        }
        BuiltinType::Int => construct_int(interpreter, args),
        BuiltinType::Float => construct_float(interpreter, args),
        BuiltinType::Str => {
            at_most(&args, name, 3).raise(interpreter)?;
            match (args.get_arg(0), args.get(1, "encoding")) {
                (None, _) => Ok(TreewalkValue::str("")),
                (Some(TreewalkValue::Bytes(bytes)), Some(_)) => {
                    Ok(TreewalkValue::Str(decode_utf8(bytes).raise(interpreter)?))
                }
                (Some(value), _) => Ok(TreewalkValue::Str(interpreter.str(value)?)),
            }
        }
        BuiltinType::Bytes => {
            at_most(&args, name, 3).raise(interpreter)?;
            match args.get_arg(0) {
                None => Ok(TreewalkValue::Bytes(vec![])),
                Some(TreewalkValue::Str(s)) => {
                    if args.get(1, "encoding").is_none() {
                        return Exception::type_error("string argument without an encoding")
                            .raise(interpreter);
                    }
                    Ok(TreewalkValue::Bytes(s.as_bytes().to_vec()))
                }
                Some(TreewalkValue::Int(n)) => {
                    let count = usize::try_from(*n)
                        .map_err(|_| interpreter.raise(Exception::value_error("negative count")))?;
                    Ok(TreewalkValue::Bytes(vec![0; count]))
                }
                Some(iterable) => {
                    let bytes = interpreter
                        .collect(iterable)?
                        .iter()
                        .map(|item| {
                            item.as_int().and_then(|i| {
                                u8::try_from(i).map_err(|_| {
                                    Exception::value_error("bytes must be in range(0, 256)")
                                })
                            })
                        })
                        .collect::<Result<Vec<u8>, Exception>>()
                        .raise(interpreter)?;
                    Ok(TreewalkValue::Bytes(bytes))
                }
            }
        }
        BuiltinType::List => {
            at_most(&args, name, 1).raise(interpreter)?;
            match args.get_arg(0) {
                Some(iterable) => Ok(TreewalkValue::list(interpreter.collect(iterable)?)),
                None => Ok(TreewalkValue::list(vec![])),
            }
        }
        BuiltinType::Tuple => {
            at_most(&args, name, 1).raise(interpreter)?;
            match args.get_arg(0) {
                Some(TreewalkValue::Tuple(tuple)) => Ok(TreewalkValue::Tuple(tuple.clone())),
                Some(iterable) => Ok(TreewalkValue::tuple(interpreter.collect(iterable)?)),
                None => Ok(TreewalkValue::tuple(vec![])),
            }
        }
        BuiltinType::Dict => {
            at_most(&args, name, 1).raise(interpreter)?;
            let dict = Container::new(Dict::default());
            if let Some(source) = args.get_arg(0) {
                interpreter.update_dict(&dict, source)?;
            }
            for (key, value) in args.kwargs() {
                dict.borrow_mut()
                    .insert(TreewalkValue::str(key.as_str()), value.clone())
                    .raise(interpreter)?;
            }
            Ok(TreewalkValue::Dict(dict))
        }
        BuiltinType::Set | BuiltinType::FrozenSet => {
            at_most(&args, name, 1).raise(interpreter)?;
            let items = match args.get_arg(0) {
                Some(iterable) => interpreter.collect(iterable)?,
                None => vec![],
            };
            Ok(TreewalkValue::set(Set::from_items(items).raise(interpreter)?))
        }
        BuiltinType::Range => {
            let ints = args
                .args()
                .iter()
                .map(TreewalkValue::as_int)
                .collect::<Result<Vec<_>, _>>()
                .raise(interpreter)?;
            let range = match *ints.as_slice() {
                [stop] => Range::new(0, stop, 1),
                [start, stop] => Range::new(start, stop, 1),
                [start, stop, step] => Range::new(start, stop, step),
                _ => Err(Exception::type_error(format!(
                    "range expected 1 to 3 arguments, got {}",
                    ints.len()
                ))),
            };
            Ok(TreewalkValue::Range(range.raise(interpreter)?))
        }
        BuiltinType::Slice => {
            let bounds = args
                .args()
                .iter()
                .map(|value| match value {
                    TreewalkValue::None => Ok(None),
                    other => other.as_int().map(Some),
                })
                .collect::<Result<Vec<_>, _>>()
                .raise(interpreter)?;
            let slice = match *bounds.as_slice() {
                [stop] => Slice::new(None, stop, None),
                [start, stop] => Slice::new(start, stop, None),
                [start, stop, step] => Slice::new(start, stop, step),
                _ => {
                    return Exception::type_error(format!(
                        "slice expected 1 to 3 arguments, got {}",
                        bounds.len()
                    ))
                    .raise(interpreter)
                }
            };
            Ok(TreewalkValue::Slice(slice))
        }
        BuiltinType::Staticmethod | BuiltinType::Classmethod | BuiltinType::Property => {
            check_args(&args, name, |n| n == 1, "exactly one").raise(interpreter)?;
            let wrapped = Box::new(args.args()[0].clone());
            Ok(match builtin_type {
                BuiltinType::Staticmethod => TreewalkValue::Staticmethod(wrapped),
                BuiltinType::Classmethod => TreewalkValue::Classmethod(wrapped),
                _ => TreewalkValue::Property(wrapped),
            })
        }
    }
}

/// `type(x)` or `type(name, bases, namespace)`.
fn construct_type(
    interpreter: &TreewalkInterpreter<'_>,
    args: Args,
) -> TreewalkResult<TreewalkValue> {
    match args.args() {
        [value] => Ok(interpreter.type_of(value)),
        [name, bases, namespace] => {
            let name = name.as_str().raise(interpreter)?.to_string();
            let bases = interpreter.collect(bases)?;
            let mut scope = Scope::default();
            for (key, value) in interpreter.mapping_items(namespace)? {
                scope.insert(key.as_str().raise(interpreter)?, value);
            }
            let class = Class::new(&name, &bases, scope).raise(interpreter)?;
            Ok(TreewalkValue::Class(Container::new(class)))
        }
        _ => Exception::type_error("type() takes 1 or 3 arguments").raise(interpreter),
    }
}

fn decode_utf8(bytes: &[u8]) -> DomainResult<String> {
    String::from_utf8(bytes.to_vec()).map_err(|e| {
        Exception::new(
            ExceptionKind::UnicodeError,
            vec![TreewalkValue::Str(format!("'utf-8' codec can't decode bytes: {e}"))],
        )
    })
}

/// Parse an integer literal the way `int(text, base)` does, including `_` separators and, for
/// base 0, the `0x`/`0o`/`0b` prefixes.
pub(crate) fn parse_int(text: &str, base: u32) -> Option<i64> {
    let trimmed = text.trim();
    let (negative, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let lower = digits.to_ascii_lowercase();
    let (base, digits) = match (base, lower.get(..2)) {
        (0 | 16, Some("0x")) => (16, &lower[2..]),
        (0 | 8, Some("0o")) => (8, &lower[2..]),
        (0 | 2, Some("0b")) => (2, &lower[2..]),
        (0, _) => (10, lower.as_str()),
        (base, _) => (base, lower.as_str()),
    };
    if digits.is_empty() || digits.starts_with('_') || digits.ends_with('_') || digits.contains("__")
    {
        return None;
    }
    let digits = digits.replace('_', "");
    let magnitude = i64::from_str_radix(&digits, base).ok()?;
    Some(if negative { -magnitude } else { magnitude })
}

fn construct_int(interpreter: &TreewalkInterpreter<'_>, args: Args) -> TreewalkResult<TreewalkValue> {
    at_most(&args, "int", 2).raise(interpreter)?;
    let base = match args.get(1, "base") {
        Some(base) => Some(base.as_int().raise(interpreter)?),
        None => None,
    };
    let Some(value) = args.get_arg(0) else {
        return Ok(TreewalkValue::Int(0));
    };

    let int = match (value, base) {
        (TreewalkValue::Str(s), base) => {
            let base = base.unwrap_or(10);
            if base != 0 && !(2..=36).contains(&base) {
                return Exception::value_error("int() base must be >= 2 and <= 36, or 0")
                    .raise(interpreter);
            }
            parse_int(s, base as u32).ok_or_else(|| {
                interpreter.raise(Exception::value_error(format!(
                    "invalid literal for int() with base {base}: {}",
                    quote_str(s)
                )))
            })?
        }
        (_, Some(_)) => {
            return Exception::type_error("int() can't convert non-string with explicit base")
                .raise(interpreter)
        }
        (TreewalkValue::Int(i), None) => *i,
        (TreewalkValue::Bool(b), None) => i64::from(*b),
        (TreewalkValue::Float(f), None) => {
            if !f.is_finite() {
                return Exception::overflow_error("cannot convert float infinity or NaN to integer")
                    .raise(interpreter);
            }
            f.trunc() as i64
        }
        (TreewalkValue::Stub(_), None) => 1,
        (TreewalkValue::Object(_), None) => {
            let result = interpreter.call_method(value, "__int__", Args::default())?;
            result.as_int().raise(interpreter)?
        }
        (other, None) => {
            return Exception::type_error(format!(
                "int() argument must be a string, a bytes-like object or a real number, not '{}'",
                other.type_name()
            ))
            .raise(interpreter)
        }
    };
    Ok(TreewalkValue::Int(int))
}

fn construct_float(
    interpreter: &TreewalkInterpreter<'_>,
    args: Args,
) -> TreewalkResult<TreewalkValue> {
    at_most(&args, "float", 1).raise(interpreter)?;
    let Some(value) = args.get_arg(0) else {
        return Ok(TreewalkValue::Float(0.0));
    };
    let float = match value {
        TreewalkValue::Stub(_) => 1.0,
        TreewalkValue::Str(s) => {
            let text = s.trim().to_ascii_lowercase().replace('_', "");
            let parsed = match text.trim_start_matches(['+', '-']) {
                "inf" | "infinity" | "nan" => text.parse::<f64>().ok(),
                _ => text.parse::<f64>().ok().filter(|f| f.is_finite()),
            };
            parsed.ok_or_else(|| {
                interpreter.raise(Exception::value_error(format!(
                    "could not convert string to float: {}",
                    quote_str(s)
                )))
            })?
        }
        TreewalkValue::Object(_) => {
            let result = interpreter.call_method(value, "__float__", Args::default())?;
            match result.as_number() {
                Some(number) => number.as_f64(),
                None => {
                    return Exception::type_error("__float__ returned non-float")
                        .raise(interpreter)
                }
            }
        }
        other => match other.as_number() {
            Some(number) => number.as_f64(),
            None => {
                return Exception::type_error(format!(
                    "float() argument must be a string or a real number, not '{}'",
                    other.type_name()
                ))
                .raise(interpreter)
            }
        },
    };
    Ok(TreewalkValue::Float(float))
}
