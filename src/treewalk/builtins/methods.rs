use crate::{
    core::Container,
    domain::utils::{normalize_index, wrap_negative},
    treewalk::{
        builtins::{decode_utf8, sort_values},
        types::{BuiltinType, Dict, Exception, Set, StringIO},
        utils::{check_args, Args},
        DomainResult, Raise, TreewalkInterpreter, TreewalkResult, TreewalkValue,
    },
};

static STR_METHODS: [&str; 41] = [
    "format",
    "upper",
    "lower",
    "casefold",
    "swapcase",
    "strip",
    "lstrip",
    "rstrip",
    "split",
    "rsplit",
    "splitlines",
    "join",
    "replace",
    "startswith",
    "endswith",
    "find",
    "rfind",
    "index",
    "rindex",
    "count",
    "partition",
    "rpartition",
    "isdigit",
    "isdecimal",
    "isnumeric",
    "isalpha",
    "isalnum",
    "isspace",
    "isupper",
    "islower",
    "isidentifier",
    "title",
    "capitalize",
    "encode",
    "zfill",
    "ljust",
    "rjust",
    "center",
    "removeprefix",
    "removesuffix",
    "expandtabs",
];

static LIST_METHODS: [&str; 11] = [
    "append", "extend", "insert", "pop", "remove", "index", "count", "sort", "reverse", "copy",
    "clear",
];

static DICT_METHODS: [&str; 11] = [
    "get",
    "keys",
    "values",
    "items",
    "setdefault",
    "update",
    "pop",
    "popitem",
    "copy",
    "clear",
    "fromkeys",
];

static SET_METHODS: [&str; 13] = [
    "add",
    "update",
    "discard",
    "remove",
    "union",
    "intersection",
    "difference",
    "symmetric_difference",
    "issubset",
    "issuperset",
    "copy",
    "pop",
    "clear",
];

static TUPLE_METHODS: [&str; 2] = ["index", "count"];

static BYTES_METHODS: [&str; 1] = ["decode"];

static STRING_IO_METHODS: [&str; 10] = [
    "read",
    "readline",
    "readlines",
    "write",
    "getvalue",
    "seek",
    "tell",
    "close",
    "__enter__",
    "__exit__",
];

fn type_methods(builtin_type: BuiltinType) -> &'static [&'static str] {
    match builtin_type {
        BuiltinType::Str => &STR_METHODS,
        BuiltinType::List => &LIST_METHODS,
        BuiltinType::Dict => &DICT_METHODS,
        BuiltinType::Set | BuiltinType::FrozenSet => &SET_METHODS,
        BuiltinType::Tuple => &TUPLE_METHODS,
        BuiltinType::Bytes => &BYTES_METHODS,
        _ => &[],
    }
}

/// Names of the native methods available on `value`, as `dir()` lists them.
pub fn names(value: &TreewalkValue) -> &'static [&'static str] {
    match value {
        TreewalkValue::Str(_) => &STR_METHODS,
        TreewalkValue::List(_) => &LIST_METHODS,
        TreewalkValue::Dict(_) => &DICT_METHODS,
        TreewalkValue::Set(_) => &SET_METHODS,
        TreewalkValue::Tuple(_) => &TUPLE_METHODS,
        TreewalkValue::Bytes(_) => &BYTES_METHODS,
        TreewalkValue::StringIO(_) => &STRING_IO_METHODS,
        TreewalkValue::Type(builtin_type) => type_methods(*builtin_type),
        _ => &[],
    }
}

/// Resolve `value.name` to a native method, if there is one.
pub fn lookup(value: &TreewalkValue, name: &str) -> Option<&'static str> {
    names(value).iter().copied().find(|method| *method == name)
}

/// Call a method found by [`lookup`]. A method looked up on a type, such as `str.upper`, takes
/// its receiver as the first argument.
pub fn call_method(
    interpreter: &TreewalkInterpreter<'_>,
    receiver: &TreewalkValue,
    name: &'static str,
    args: Args,
) -> TreewalkResult<TreewalkValue> {
    if let TreewalkValue::Type(builtin_type) = receiver {
        if name == "fromkeys" {
            return dict_from_keys(interpreter, args);
        }
        let (positional, keywords) = args.into_parts();
        let mut positional = positional.into_iter();
        let target = positional.next().filter(|target| {
            builtin_type.matches_type_name(&target.type_name())
        });
        let Some(target) = target else {
            return Exception::type_error(format!(
                "descriptor '{name}' for '{}' objects needs an argument of that type",
                builtin_type.name()
            ))
            .raise(interpreter);
        };
        return call_method(
            interpreter,
            &target,
            name,
            Args::new(positional.collect(), keywords),
        );
    }

    match receiver {
        TreewalkValue::Str(s) => str_method(interpreter, s, name, args),
        TreewalkValue::List(list) => list_method(interpreter, list, name, args),
        TreewalkValue::Dict(dict) => dict_method(interpreter, dict, name, args),
        TreewalkValue::Set(set) => set_method(interpreter, set, name, args),
        TreewalkValue::Tuple(tuple) => sequence_method(interpreter, tuple.items(), name, args),
        TreewalkValue::Bytes(bytes) => match name {
            "decode" => Ok(TreewalkValue::Str(decode_utf8(bytes).raise(interpreter)?)),
            _ => missing(interpreter, receiver, name),
        },
        TreewalkValue::StringIO(stream) => string_io_method(interpreter, receiver, stream, name, args),
        // `object.__init__` reached through `super()`.
        TreewalkValue::Object(object) if name == "__init__" => {
            let is_exception = object.borrow().class.borrow().exception_kind.is_some();
            if is_exception {
                object
                    .borrow_mut()
                    .attrs
                    .insert("args", TreewalkValue::tuple(args.args().to_vec()));
            }
            Ok(TreewalkValue::None)
        }
        TreewalkValue::Class(_) if name == "__init__" => Ok(TreewalkValue::None),
        _ => missing(interpreter, receiver, name),
    }
}

fn missing(
    interpreter: &TreewalkInterpreter<'_>,
    receiver: &TreewalkValue,
    name: &str,
) -> TreewalkResult<TreewalkValue> {
    Exception::attribute_error(&receiver.type_name(), name).raise(interpreter)
}

fn arity(args: &Args, name: &str, min: usize, max: usize) -> DomainResult<()> {
    let expected = if min == max {
        min.to_string()
    } else {
        format!("{min} to {max}")
    };
    check_args(args, name, |n| (min..=max).contains(&n), &expected)
}

fn str_arg<'a>(
    interpreter: &TreewalkInterpreter<'_>,
    args: &'a Args,
    index: usize,
    name: &str,
) -> TreewalkResult<Option<&'a str>> {
    match args.get(index, name) {
        None | Some(TreewalkValue::None) => Ok(None),
        Some(TreewalkValue::Str(s)) => Ok(Some(s)),
        Some(other) => Exception::type_error(format!(
            "must be str or None, not {}",
            other.type_name()
        ))
        .raise(interpreter),
    }
}

fn int_arg(
    interpreter: &TreewalkInterpreter<'_>,
    args: &Args,
    index: usize,
    name: &str,
    default: i64,
) -> TreewalkResult<i64> {
    match args.get(index, name) {
        Some(value) => value.as_int().raise(interpreter),
        None => Ok(default),
    }
}

fn required_str<'a>(
    interpreter: &TreewalkInterpreter<'_>,
    args: &'a Args,
    index: usize,
    name: &str,
) -> TreewalkResult<&'a str> {
    str_arg(interpreter, args, index, name)?.ok_or_else(|| {
        interpreter.raise(Exception::type_error(format!(
            "expected a str argument '{name}'"
        )))
    })
}

fn text(s: impl Into<String>) -> TreewalkValue {
    TreewalkValue::Str(s.into())
}

fn strs(items: Vec<String>) -> TreewalkValue {
    TreewalkValue::list(items.into_iter().map(TreewalkValue::Str).collect())
}

/// Offsets into Python strings count characters, not bytes.
fn char_offset(s: &str, byte_index: usize) -> i64 {
    s[..byte_index].chars().count() as i64
}

/// The part of `s` selected by optional `start`/`end` arguments at `index` and `index + 1`,
/// with the character offset it begins at. `None` when the window is empty because `start`
/// lies past the end of `s` or past `end`.
fn str_window<'s>(
    interpreter: &TreewalkInterpreter<'_>,
    s: &'s str,
    args: &Args,
    index: usize,
) -> TreewalkResult<Option<(&'s str, i64)>> {
    let bound = |i: usize, name: &str| match args.get(i, name) {
        None | Some(TreewalkValue::None) => Ok(None),
        Some(value) => value.as_int().raise(interpreter).map(Some),
    };
    let len = s.chars().count();
    let start = bound(index, "start")?.map_or(0, |i| wrap_negative(i, len).max(0));
    let end = bound(index + 1, "end")?.map_or(len as i64, |i| {
        wrap_negative(i, len).clamp(0, len as i64)
    });
    if start > len as i64 || start > end {
        return Ok(None);
    }
    let byte = |chars: i64| {
        s.char_indices()
            .nth(chars as usize)
            .map_or(s.len(), |(byte, _)| byte)
    };
    Ok(Some((&s[byte(start)..byte(end)], start)))
}

fn expand_tabs(s: &str, tabsize: i64) -> String {
    let mut expanded = String::with_capacity(s.len());
    let mut column = 0;
    for c in s.chars() {
        match c {
            '\t' if tabsize > 0 => {
                let pad = tabsize - column % tabsize;
                expanded.extend(std::iter::repeat(' ').take(pad as usize));
                column += pad;
            }
            '\t' => {}
            '\n' | '\r' => {
                expanded.push(c);
                column = 0;
            }
            c => {
                expanded.push(c);
                column += 1;
            }
        }
    }
    expanded
}

fn split_whitespace(s: &str, maxsplit: Option<usize>) -> Vec<String> {
    let mut parts = vec![];
    let mut rest = s.trim_start();
    while !rest.is_empty() {
        if maxsplit.is_some_and(|max| parts.len() == max) {
            parts.push(rest.to_string());
            break;
        }
        match rest.find(char::is_whitespace) {
            Some(end) => {
                parts.push(rest[..end].to_string());
                rest = rest[end..].trim_start();
            }
            None => {
                parts.push(rest.to_string());
                break;
            }
        }
    }
    parts
}

fn rsplit_whitespace(s: &str, maxsplit: Option<usize>) -> Vec<String> {
    let mut parts = vec![];
    let mut rest = s.trim_end();
    while !rest.is_empty() {
        if maxsplit.is_some_and(|max| parts.len() == max) {
            parts.push(rest.to_string());
            break;
        }
        match rest.rfind(char::is_whitespace) {
            Some(start) => {
                let boundary = start + rest[start..].chars().next().map_or(1, char::len_utf8);
                parts.push(rest[boundary..].to_string());
                rest = rest[..start].trim_end();
            }
            None => {
                parts.push(rest.to_string());
                break;
            }
        }
    }
    parts.reverse();
    parts
}

/// `str.splitlines`, which breaks on `\n`, `\r\n` and a lone `\r`.
fn split_lines(s: &str, keepends: bool) -> Vec<String> {
    let mut lines = vec![];
    let mut current = String::new();
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\n' | '\r' => {
                let mut ending = c.to_string();
                if c == '\r' && chars.peek() == Some(&'\n') {
                    chars.next();
                    ending.push('\n');
                }
                if keepends {
                    current.push_str(&ending);
                }
                lines.push(std::mem::take(&mut current));
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

fn title_case(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut in_word = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if in_word {
                result.extend(c.to_lowercase());
            } else {
                result.extend(c.to_uppercase());
            }
            in_word = true;
        } else {
            result.push(c);
            in_word = false;
        }
    }
    result
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

fn zfill(s: &str, width: usize) -> String {
    let len = s.chars().count();
    if len >= width {
        return s.to_string();
    }
    let zeros = "0".repeat(width - len);
    match s.strip_prefix(['-', '+']) {
        Some(digits) => format!("{}{zeros}{digits}", &s[..1]),
        None => format!("{zeros}{s}"),
    }
}

/// `str.center` puts the odd padding character on the left when the width is odd.
fn justify(s: &str, width: usize, fill: char, method: &str) -> String {
    let len = s.chars().count();
    if len >= width {
        return s.to_string();
    }
    let margin = width - len;
    let left = match method {
        "ljust" => 0,
        "rjust" => margin,
        _ => margin / 2 + (margin & width & 1),
    };
    let pad = |n: usize| fill.to_string().repeat(n);
    format!("{}{s}{}", pad(left), pad(margin - left))
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    chars
        .next()
        .is_some_and(|c| c == '_' || c.is_alphabetic())
        && chars.all(|c| c == '_' || c.is_alphanumeric())
}

fn has_cased(s: &str, predicate: fn(char) -> bool, opposite: fn(char) -> bool) -> bool {
    s.chars().any(predicate) && !s.chars().any(opposite)
}

/// Run a prefix or suffix test against a string or a tuple of them.
fn affix_test(
    interpreter: &TreewalkInterpreter<'_>,
    s: &str,
    affix: &TreewalkValue,
    name: &str,
    test: fn(&str, &str) -> bool,
) -> TreewalkResult<bool> {
    match affix {
        TreewalkValue::Str(affix) => Ok(test(s, affix)),
        TreewalkValue::Tuple(affixes) => {
            for affix in affixes.iter() {
                if affix_test(interpreter, s, affix, name, test)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        other => Exception::type_error(format!(
            "{name} first arg must be str or a tuple of str, not {}",
            other.type_name()
        ))
        .raise(interpreter),
    }
}

fn str_method(
    interpreter: &TreewalkInterpreter<'_>,
    s: &str,
    name: &'static str,
    args: Args,
) -> TreewalkResult<TreewalkValue> {
    let result = match name {
        "format" => text(interpreter.str_format(s, &args)?),
        "upper" => text(s.to_uppercase()),
        "lower" | "casefold" => text(s.to_lowercase()),
        "swapcase" => text(
            s.chars()
                .flat_map(|c| -> Box<dyn Iterator<Item = char>> {
                    if c.is_uppercase() {
                        Box::new(c.to_lowercase())
                    } else {
                        Box::new(c.to_uppercase())
                    }
                })
                .collect::<String>(),
        ),
        "strip" | "lstrip" | "rstrip" => {
            arity(&args, name, 0, 1).raise(interpreter)?;
            let chars = str_arg(interpreter, &args, 0, "chars")?;
            let matches = |c: char| match chars {
                Some(chars) => chars.contains(c),
                None => c.is_whitespace(),
            };
            text(match name {
                "strip" => s.trim_matches(matches),
                "lstrip" => s.trim_start_matches(matches),
                _ => s.trim_end_matches(matches),
            })
        }
        "split" | "rsplit" => {
            arity(&args, name, 0, 2).raise(interpreter)?;
            let sep = str_arg(interpreter, &args, 0, "sep")?;
            let maxsplit = usize::try_from(int_arg(interpreter, &args, 1, "maxsplit", -1)?).ok();
            let parts = match (sep, maxsplit) {
                (Some(""), _) => {
                    return Exception::value_error("empty separator").raise(interpreter)
                }
                (None, _) if name == "split" => split_whitespace(s, maxsplit),
                (None, _) => rsplit_whitespace(s, maxsplit),
                (Some(sep), None) => s.split(sep).map(str::to_string).collect(),
                (Some(sep), Some(max)) if name == "split" => {
                    s.splitn(max + 1, sep).map(str::to_string).collect()
                }
                (Some(sep), Some(max)) => {
                    let mut parts: Vec<String> =
                        s.rsplitn(max + 1, sep).map(str::to_string).collect();
                    parts.reverse();
                    parts
                }
            };
            strs(parts)
        }
        "splitlines" => {
            let keepends = match args.get(0, "keepends") {
                Some(keepends) => interpreter.is_truthy(keepends)?,
                None => false,
            };
            strs(split_lines(s, keepends))
        }
        "join" => {
            arity(&args, name, 1, 1).raise(interpreter)?;
            let items = interpreter.collect(&args.args()[0])?;
            let mut parts = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                match item {
                    TreewalkValue::Str(part) => parts.push(part.as_str()),
                    other => {
                        return Exception::type_error(format!(
                            "sequence item {i}: expected str instance, {} found",
                            other.type_name()
                        ))
                        .raise(interpreter)
                    }
                }
            }
            text(parts.join(s))
        }
        "replace" => {
            arity(&args, name, 2, 3).raise(interpreter)?;
            let old = required_str(interpreter, &args, 0, "old")?;
            let new = required_str(interpreter, &args, 1, "new")?;
            match usize::try_from(int_arg(interpreter, &args, 2, "count", -1)?) {
                Ok(count) => text(s.replacen(old, new, count)),
                Err(_) => text(s.replace(old, new)),
            }
        }
        "startswith" | "endswith" => {
            arity(&args, name, 1, 3).raise(interpreter)?;
            let test: fn(&str, &str) -> bool = if name == "startswith" {
                |s, affix| s.starts_with(affix)
            } else {
                |s, affix| s.ends_with(affix)
            };
            let holds = match str_window(interpreter, s, &args, 1)? {
                Some((window, _)) => affix_test(interpreter, window, &args.args()[0], name, test)?,
                None => false,
            };
            TreewalkValue::Bool(holds)
        }
        "find" | "rfind" | "index" | "rindex" => {
            arity(&args, name, 1, 3).raise(interpreter)?;
            let sub = required_str(interpreter, &args, 0, "sub")?;
            let found = str_window(interpreter, s, &args, 1)?.and_then(|(window, offset)| {
                let found = if name.starts_with('r') {
                    window.rfind(sub)
                } else {
                    window.find(sub)
                };
                found.map(|index| offset + char_offset(window, index))
            });
            match (found, name) {
                (Some(index), _) => TreewalkValue::Int(index),
                (None, "find" | "rfind") => TreewalkValue::Int(-1),
                (None, _) => {
                    return Exception::value_error("substring not found").raise(interpreter)
                }
            }
        }
        "count" => {
            arity(&args, name, 1, 3).raise(interpreter)?;
            let sub = required_str(interpreter, &args, 0, "sub")?;
            let count = match str_window(interpreter, s, &args, 1)? {
                None => 0,
                Some((window, _)) if sub.is_empty() => window.chars().count() + 1,
                Some((window, _)) => window.matches(sub).count(),
            };
            TreewalkValue::Int(count as i64)
        }
        "expandtabs" => {
            arity(&args, name, 0, 1).raise(interpreter)?;
            text(expand_tabs(s, int_arg(interpreter, &args, 0, "tabsize", 8)?))
        }
        "partition" | "rpartition" => {
            arity(&args, name, 1, 1).raise(interpreter)?;
            let sep = required_str(interpreter, &args, 0, "sep")?;
            if sep.is_empty() {
                return Exception::value_error("empty separator").raise(interpreter);
            }
            let split = if name == "partition" {
                s.split_once(sep)
            } else {
                s.rsplit_once(sep)
            };
            let parts = match (split, name) {
                (Some((head, tail)), _) => [head, sep, tail],
                (None, "partition") => [s, "", ""],
                (None, _) => ["", "", s],
            };
            TreewalkValue::tuple(parts.into_iter().map(text).collect())
        }
        "isdigit" | "isdecimal" | "isnumeric" => {
            TreewalkValue::Bool(!s.is_empty() && s.chars().all(|c| c.is_numeric()))
        }
        "isalpha" => TreewalkValue::Bool(!s.is_empty() && s.chars().all(char::is_alphabetic)),
        "isalnum" => TreewalkValue::Bool(!s.is_empty() && s.chars().all(char::is_alphanumeric)),
        "isspace" => TreewalkValue::Bool(!s.is_empty() && s.chars().all(char::is_whitespace)),
        "isupper" => TreewalkValue::Bool(has_cased(s, char::is_uppercase, char::is_lowercase)),
        "islower" => TreewalkValue::Bool(has_cased(s, char::is_lowercase, char::is_uppercase)),
        "isidentifier" => TreewalkValue::Bool(is_identifier(s)),
        "title" => text(title_case(s)),
        "capitalize" => text(capitalize(s)),
        "encode" => TreewalkValue::Bytes(s.as_bytes().to_vec()),
        "zfill" => {
            arity(&args, name, 1, 1).raise(interpreter)?;
            let width = int_arg(interpreter, &args, 0, "width", 0)?;
            text(zfill(s, usize::try_from(width).unwrap_or(0)))
        }
        "ljust" | "rjust" | "center" => {
            arity(&args, name, 1, 2).raise(interpreter)?;
            let width = int_arg(interpreter, &args, 0, "width", 0)?;
            let fill = match str_arg(interpreter, &args, 1, "fillchar")? {
                None => ' ',
                Some(fill) if fill.chars().count() == 1 => fill.chars().next().unwrap_or(' '),
                Some(_) => {
                    return Exception::type_error(
                        "The fill character must be exactly one character long",
                    )
                    .raise(interpreter)
                }
            };
            text(justify(s, usize::try_from(width).unwrap_or(0), fill, name))
        }
        "removeprefix" => {
            let prefix = required_str(interpreter, &args, 0, "prefix")?;
            text(s.strip_prefix(prefix).unwrap_or(s))
        }
        "removesuffix" => {
            let suffix = required_str(interpreter, &args, 0, "suffix")?;
            text(s.strip_suffix(suffix).unwrap_or(s))
        }
        _ => return missing(interpreter, &text(s), name),
    };
    Ok(result)
}

/// Position of the first item equal to `needle`. Comparison may run user code, so callers pass a
/// snapshot rather than a borrowed container.
fn position(
    interpreter: &TreewalkInterpreter<'_>,
    items: &[TreewalkValue],
    needle: &TreewalkValue,
) -> TreewalkResult<Option<usize>> {
    for (i, item) in items.iter().enumerate() {
        if interpreter.equals(item, needle)? {
            return Ok(Some(i));
        }
    }
    Ok(None)
}

/// `index` and `count`, shared by lists and tuples.
fn sequence_method(
    interpreter: &TreewalkInterpreter<'_>,
    items: &[TreewalkValue],
    name: &'static str,
    args: Args,
) -> TreewalkResult<TreewalkValue> {
    arity(&args, name, 1, 1).raise(interpreter)?;
    let needle = &args.args()[0];
    match name {
        "index" => match position(interpreter, items, needle)? {
            Some(i) => Ok(TreewalkValue::Int(i as i64)),
            None => Exception::value_error(format!(
                "{} is not in list",
                interpreter.repr(needle)?
            ))
            .raise(interpreter),
        },
        "count" => {
            let mut count = 0;
            for item in items {
                if interpreter.equals(item, needle)? {
                    count += 1;
                }
            }
            Ok(TreewalkValue::Int(count))
        }
        _ => missing(interpreter, &TreewalkValue::tuple(items.to_vec()), name),
    }
}

fn list_method(
    interpreter: &TreewalkInterpreter<'_>,
    list: &Container<Vec<TreewalkValue>>,
    name: &'static str,
    args: Args,
) -> TreewalkResult<TreewalkValue> {
    match name {
        "append" => {
            arity(&args, name, 1, 1).raise(interpreter)?;
            list.borrow_mut().push(args.args()[0].clone());
        }
        "extend" => {
            arity(&args, name, 1, 1).raise(interpreter)?;
            let items = interpreter.collect(&args.args()[0])?;
            list.borrow_mut().extend(items);
        }
        "insert" => {
            arity(&args, name, 2, 2).raise(interpreter)?;
            let index = args.args()[0].as_int().raise(interpreter)?;
            let len = list.borrow().len() as i64;
            let index = if index < 0 { index + len } else { index }.clamp(0, len);
            list.borrow_mut()
                .insert(index as usize, args.args()[1].clone());
        }
        "pop" => {
            arity(&args, name, 0, 1).raise(interpreter)?;
            let index = int_arg(interpreter, &args, 0, "index", -1)?;
            let mut items = list.borrow_mut();
            if items.is_empty() {
                return Exception::index_error("pop from empty list").raise(interpreter);
            }
            return match normalize_index(index, items.len()) {
                Some(index) => Ok(items.remove(index)),
                None => Exception::index_error("pop index out of range").raise(interpreter),
            };
        }
        "remove" => {
            arity(&args, name, 1, 1).raise(interpreter)?;
            let snapshot = list.borrow().clone();
            match position(interpreter, &snapshot, &args.args()[0])? {
                Some(i) => {
                    list.borrow_mut().remove(i);
                }
                None => {
                    return Exception::value_error("list.remove(x): x not in list")
                        .raise(interpreter)
                }
            }
        }
        "index" | "count" => {
            let snapshot = list.borrow().clone();
            return sequence_method(interpreter, &snapshot, name, args);
        }
        "sort" => {
            arity(&args, name, 0, 0).raise(interpreter)?;
            let mut items = list.borrow().clone();
            let reverse = match args.get_kwarg("reverse") {
                Some(reverse) => interpreter.is_truthy(reverse)?,
                None => false,
            };
            sort_values(interpreter, &mut items, args.get_kwarg("key"), reverse)?;
            *list.borrow_mut() = items;
        }
        "reverse" => list.borrow_mut().reverse(),
        "copy" => return Ok(TreewalkValue::list(list.borrow().clone())),
        "clear" => list.borrow_mut().clear(),
        _ => return missing(interpreter, &TreewalkValue::List(list.clone()), name),
    }
    Ok(TreewalkValue::None)
}

fn dict_from_keys(
    interpreter: &TreewalkInterpreter<'_>,
    args: Args,
) -> TreewalkResult<TreewalkValue> {
    arity(&args, "fromkeys", 1, 2).raise(interpreter)?;
    let value = args.get_arg(1).cloned().unwrap_or(TreewalkValue::None);
    let keys = interpreter.collect(&args.args()[0])?;
    let dict = Dict::from_items(keys.into_iter().map(|key| (key, value.clone())).collect())
        .raise(interpreter)?;
    Ok(TreewalkValue::dict(dict))
}

fn dict_method(
    interpreter: &TreewalkInterpreter<'_>,
    dict: &Container<Dict>,
    name: &'static str,
    args: Args,
) -> TreewalkResult<TreewalkValue> {
    match name {
        "get" => {
            arity(&args, name, 1, 2).raise(interpreter)?;
            let found = dict.borrow().get(&args.args()[0]).raise(interpreter)?;
            Ok(found.unwrap_or_else(|| args.get_arg(1).cloned().unwrap_or(TreewalkValue::None)))
        }
        "keys" => Ok(TreewalkValue::list(dict.borrow().keys())),
        "values" => Ok(TreewalkValue::list(dict.borrow().values())),
        "items" => Ok(TreewalkValue::list(
            dict.borrow()
                .items()
                .into_iter()
                .map(|(key, value)| TreewalkValue::tuple(vec![key, value]))
                .collect(),
        )),
        "setdefault" => {
            arity(&args, name, 1, 2).raise(interpreter)?;
            let key = &args.args()[0];
            let found = dict.borrow().get(key).raise(interpreter)?;
            match found {
                Some(value) => Ok(value),
                None => {
                    let default = args.get_arg(1).cloned().unwrap_or(TreewalkValue::None);
                    dict.borrow_mut()
                        .insert(key.clone(), default.clone())
                        .raise(interpreter)?;
                    Ok(default)
                }
            }
        }
        "update" => {
            arity(&args, name, 0, 1).raise(interpreter)?;
            if let Some(other) = args.get_arg(0) {
                interpreter.update_dict(dict, other)?;
            }
            for (key, value) in args.kwargs() {
                dict.borrow_mut()
                    .insert(TreewalkValue::str(key.as_str()), value.clone())
                    .raise(interpreter)?;
            }
            Ok(TreewalkValue::None)
        }
        "pop" => {
            arity(&args, name, 1, 2).raise(interpreter)?;
            let key = &args.args()[0];
            let removed = dict.borrow_mut().remove(key).raise(interpreter)?;
            match (removed, args.get_arg(1)) {
                (Some(value), _) => Ok(value),
                (None, Some(default)) => Ok(default.clone()),
                (None, None) => Exception::key_error(key.clone()).raise(interpreter),
            }
        }
        "popitem" => {
            let last = dict.borrow_mut().pop_last();
            match last {
                Some((key, value)) => Ok(TreewalkValue::tuple(vec![key, value])),
                None => Exception::key_error(text("popitem(): dictionary is empty"))
                    .raise(interpreter),
            }
        }
        "copy" => Ok(TreewalkValue::dict(dict.borrow().clone())),
        "clear" => {
            dict.borrow_mut().clear();
            Ok(TreewalkValue::None)
        }
        "fromkeys" => dict_from_keys(interpreter, args),
        _ => missing(interpreter, &TreewalkValue::Dict(dict.clone()), name),
    }
}

/// Collect each positional argument into a set.
fn set_args(interpreter: &TreewalkInterpreter<'_>, args: &Args) -> TreewalkResult<Vec<Set>> {
    args.args()
        .iter()
        .map(|arg| {
            let items = interpreter.collect(arg)?;
            Set::from_items(items).raise(interpreter)
        })
        .collect()
}

fn set_method(
    interpreter: &TreewalkInterpreter<'_>,
    set: &Container<Set>,
    name: &'static str,
    args: Args,
) -> TreewalkResult<TreewalkValue> {
    match name {
        "add" => {
            arity(&args, name, 1, 1).raise(interpreter)?;
            set.borrow_mut()
                .add(args.args()[0].clone())
                .raise(interpreter)?;
            Ok(TreewalkValue::None)
        }
        "update" => {
            for other in set_args(interpreter, &args)? {
                for item in other.items() {
                    set.borrow_mut().add(item).raise(interpreter)?;
                }
            }
            Ok(TreewalkValue::None)
        }
        "discard" | "remove" => {
            arity(&args, name, 1, 1).raise(interpreter)?;
            let item = &args.args()[0];
            let removed = set.borrow_mut().remove(item).raise(interpreter)?;
            if !removed && name == "remove" {
                return Exception::key_error(item.clone()).raise(interpreter);
            }
            Ok(TreewalkValue::None)
        }
        "union" => {
            let mut result = set.borrow().clone();
            for other in set_args(interpreter, &args)? {
                for item in other.items() {
                    result.add(item).raise(interpreter)?;
                }
            }
            Ok(TreewalkValue::set(result))
        }
        "intersection" | "difference" => {
            let others = set_args(interpreter, &args)?;
            let mut kept = vec![];
            for item in set.borrow().items() {
                let mut in_all = true;
                let mut in_any = false;
                for other in &others {
                    let found = other.contains(&item).raise(interpreter)?;
                    in_all &= found;
                    in_any |= found;
                }
                let keep = if name == "intersection" { in_all } else { !in_any };
                if keep {
                    kept.push(item);
                }
            }
            Ok(TreewalkValue::set(Set::from_items(kept).raise(interpreter)?))
        }
        "symmetric_difference" => {
            arity(&args, name, 1, 1).raise(interpreter)?;
            let other = set_args(interpreter, &args)?.remove(0);
            let mine = set.borrow().clone();
            let mut result = Set::default();
            for item in mine.items() {
                if !other.contains(&item).raise(interpreter)? {
                    result.add(item).raise(interpreter)?;
                }
            }
            for item in other.items() {
                if !mine.contains(&item).raise(interpreter)? {
                    result.add(item).raise(interpreter)?;
                }
            }
            Ok(TreewalkValue::set(result))
        }
        "issubset" | "issuperset" => {
            arity(&args, name, 1, 1).raise(interpreter)?;
            let other = set_args(interpreter, &args)?.remove(0);
            let mine = set.borrow().clone();
            let (inner, outer) = if name == "issubset" {
                (&mine, &other)
            } else {
                (&other, &mine)
            };
            for item in inner.items() {
                if !outer.contains(&item).raise(interpreter)? {
                    return Ok(TreewalkValue::Bool(false));
                }
            }
            Ok(TreewalkValue::Bool(true))
        }
        "copy" => Ok(TreewalkValue::set(set.borrow().clone())),
        "pop" => {
            let popped = set.borrow_mut().pop();
            popped.ok_or_else(|| {
                interpreter.raise(Exception::key_error(text("pop from an empty set")))
            })
        }
        "clear" => {
            set.borrow_mut().clear();
            Ok(TreewalkValue::None)
        }
        _ => missing(interpreter, &TreewalkValue::Set(set.clone()), name),
    }
}

fn string_io_method(
    interpreter: &TreewalkInterpreter<'_>,
    receiver: &TreewalkValue,
    stream: &Container<StringIO>,
    name: &'static str,
    args: Args,
) -> TreewalkResult<TreewalkValue> {
    if stream.borrow().is_closed() && !matches!(name, "close" | "__exit__") {
        return Exception::value_error("I/O operation on closed file.").raise(interpreter);
    }
    let result = match name {
        "read" => {
            let size = match args.get(0, "size") {
                None | Some(TreewalkValue::None) => None,
                Some(size) => Some(size.as_int().raise(interpreter)?),
            };
            text(stream.borrow_mut().read(size))
        }
        "readline" => text(stream.borrow_mut().readline()),
        "readlines" => strs(stream.borrow_mut().readlines()),
        "write" => {
            arity(&args, name, 1, 1).raise(interpreter)?;
            let written = match &args.args()[0] {
                TreewalkValue::Str(s) => stream.borrow_mut().write(s),
                other => {
                    return Exception::type_error(format!(
                        "string argument expected, got '{}'",
                        other.type_name()
                    ))
                    .raise(interpreter)
                }
            };
            TreewalkValue::Int(written as i64)
        }
        "getvalue" => text(stream.borrow().getvalue()),
        "seek" => {
            arity(&args, name, 1, 2).raise(interpreter)?;
            let position = args.args()[0].as_int().raise(interpreter)?;
            let position = usize::try_from(position).map_err(|_| {
                interpreter.raise(Exception::value_error(format!(
                    "Negative seek position {position}"
                )))
            })?;
            TreewalkValue::Int(stream.borrow_mut().seek(position) as i64)
        }
        "tell" => TreewalkValue::Int(stream.borrow().tell() as i64),
        "close" | "__exit__" => {
            stream.borrow_mut().close();
            if name == "__exit__" {
                TreewalkValue::Bool(false)
            } else {
                TreewalkValue::None
            }
        }
        "__enter__" => receiver.clone(),
        _ => return missing(interpreter, receiver, name),
    };
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{domain::ExceptionKind, treewalk::test_utils::*};

    #[test]
    fn str_splitting() {
        assert_eq!(
            eval("'  a b\\tc  '.split()"),
            list_of_strs(&["a", "b", "c"])
        );
        assert_eq!(eval("'a b  c'.split(None, 1)"), list_of_strs(&["a", "b  c"]));
        assert_eq!(eval("'a,b,,c'.split(',')"), list_of_strs(&["a", "b", "", "c"]));
        assert_eq!(eval("'a.b.c'.rsplit('.', 1)"), list_of_strs(&["a.b", "c"]));
        assert_eq!(eval("'a b c'.rsplit(None, 1)"), list_of_strs(&["a b", "c"]));
        assert_eq!(
            eval("'one\\ntwo\\r\\nthree\\n'.splitlines()"),
            list_of_strs(&["one", "two", "three"])
        );
        assert_eq!(
            eval("'x\\ny'.splitlines(True)"),
            list_of_strs(&["x\n", "y"])
        );
        assert_eq!(
            eval("'k=v=w'.partition('=') == ('k', '=', 'v=w')"),
            TreewalkValue::Bool(true)
        );
        assert_eq!(
            run_expect_error("'a'.split('')").exception.kind,
            ExceptionKind::ValueError
        );
    }

    #[test]
    fn str_transforms() {
        assert_eq!(eval("'  pkg \\n'.strip()"), TreewalkValue::str("pkg"));
        assert_eq!(eval("'xxpkgxx'.strip('x')"), TreewalkValue::str("pkg"));
        assert_eq!(eval("'v1.2'.lstrip('v')"), TreewalkValue::str("1.2"));
        assert_eq!(eval("'-'.join(['a', 'b'])"), TreewalkValue::str("a-b"));
        assert_eq!(eval("'aaa'.replace('a', 'b', 2)"), TreewalkValue::str("bba"));
        assert_eq!(eval("'hello world'.title()"), TreewalkValue::str("Hello World"));
        assert_eq!(eval("'pYTHON'.capitalize()"), TreewalkValue::str("Python"));
        assert_eq!(eval("'-42'.zfill(5)"), TreewalkValue::str("-0042"));
        assert_eq!(eval("'ab'.center(5, '*')"), TreewalkValue::str("**ab*"));
        assert_eq!(eval("'ab'.ljust(4) + '|'"), TreewalkValue::str("ab  |"));
        assert_eq!(
            eval("'pkg.tar.gz'.removesuffix('.gz')"),
            TreewalkValue::str("pkg.tar")
        );
        assert_raises!(
            run_expect_error("'-'.join(['a', 1])"),
            TypeError,
            "sequence item 1: expected str instance, int found"
        );
    }

    #[test]
    fn str_queries_with_bounds() {
        assert_eq!(eval("'v1.2.3'.startswith('1', 1)"), TreewalkValue::Bool(true));
        assert_eq!(eval("'v1.2.3'.startswith('1', 2)"), TreewalkValue::Bool(false));
        assert_eq!(eval("'setup.py'.endswith('setup', 0, 5)"), TreewalkValue::Bool(true));
        assert_eq!(eval("'abc'.startswith('', 4)"), TreewalkValue::Bool(false));
        assert_eq!(eval("'a-b-c'.find('-', 2)"), TreewalkValue::Int(3));
        assert_eq!(eval("'a-b-c'.rfind('-', 0, 3)"), TreewalkValue::Int(1));
        assert_eq!(eval("'héllo'.index('l', -2)"), TreewalkValue::Int(3));
        assert_eq!(eval("'abc'.find('', 5)"), TreewalkValue::Int(-1));
        assert_eq!(eval("'abc'.find('', 3)"), TreewalkValue::Int(3));
        assert_eq!(eval("'aaaa'.count('a', 1, -1)"), TreewalkValue::Int(2));
        assert_raises!(
            run_expect_error("'abc'.index('a', 1)"),
            ValueError,
            "substring not found"
        );
    }

    #[test]
    fn str_expandtabs() {
        assert_eq!(eval("'a\\tbc\\td'.expandtabs(4)"), TreewalkValue::str("a   bc  d"));
        assert_eq!(eval("'\\tx'.expandtabs()"), TreewalkValue::str("        x"));
        assert_eq!(eval("'x\\n\\ty'.expandtabs(2)"), TreewalkValue::str("x\n  y"));
        assert_eq!(eval("'a\\tb'.expandtabs(0)"), TreewalkValue::str("ab"));
    }

    #[test]
    fn str_queries() {
        assert_eq!(eval("'setup.py'.endswith(('.py', '.cfg'))"), TreewalkValue::Bool(true));
        assert_eq!(eval("'héllo'.find('l')"), TreewalkValue::Int(2));
        assert_eq!(eval("'abc'.find('z')"), TreewalkValue::Int(-1));
        assert_eq!(eval("'a.b.c'.rfind('.')"), TreewalkValue::Int(3));
        assert_eq!(eval("'banana'.count('an')"), TreewalkValue::Int(2));
        assert_eq!(eval("'123'.isdigit()"), TreewalkValue::Bool(true));
        assert_eq!(eval("'ABC1'.isupper()"), TreewalkValue::Bool(true));
        assert_eq!(eval("'_name1'.isidentifier()"), TreewalkValue::Bool(true));
        assert_eq!(
            run_expect_error("'abc'.index('z')").exception.kind,
            ExceptionKind::ValueError
        );
    }

    #[test]
    fn unbound_methods() {
        assert_eq!(eval("str.upper('abc')"), TreewalkValue::str("ABC"));
        assert_eq!(
            eval("list(map(str.strip, [' a ', 'b ']))"),
            list_of_strs(&["a", "b"])
        );
        assert_eq!(
            eval("dict.fromkeys(['a', 'b'], 0) == {'a': 0, 'b': 0}"),
            TreewalkValue::Bool(true)
        );
        assert_eq!(
            run_expect_error("str.upper(1)").exception.kind,
            ExceptionKind::TypeError
        );
    }

    #[test]
    fn list_methods() {
        let interpreter = run(r#"
items = ["b"]
items.append("c")
items.insert(0, "a")
items.extend(("d", "e"))
last = items.pop()
items.remove("d")
where = items.index("c")
items.reverse()
items.sort(key=lambda s: s)
copied = items.copy()
copied.clear()
"#);
        assert_eq!(read(&interpreter, "items"), list_of_strs(&["a", "b", "c"]));
        assert_eq!(read(&interpreter, "last"), TreewalkValue::str("e"));
        assert_eq!(read(&interpreter, "where"), TreewalkValue::Int(2));
        assert_eq!(read(&interpreter, "copied"), list_of_strs(&[]));
        assert_eq!(
            run_expect_error("[].pop()").exception.kind,
            ExceptionKind::IndexError
        );
        assert_eq!(
            run_expect_error("[1].remove(2)").exception.kind,
            ExceptionKind::ValueError
        );
    }

    #[test]
    fn dict_methods() {
        let interpreter = run(r#"
extras = {"test": ["pytest"]}
extras.update({"docs": ["sphinx"]}, lint=["flake8"])
got = extras.get("test")
missing = extras.get("nope", [])
default = extras.setdefault("dev", ["tox"])
names = list(extras.keys())
popped = extras.pop("lint")
fallback = extras.pop("lint", None)
flat = sorted(r for reqs in extras.values() for r in reqs)
"#);
        assert_eq!(read(&interpreter, "got"), list_of_strs(&["pytest"]));
        assert_eq!(read(&interpreter, "missing"), list_of_strs(&[]));
        assert_eq!(read(&interpreter, "default"), list_of_strs(&["tox"]));
        assert_eq!(
            read(&interpreter, "names"),
            list_of_strs(&["test", "docs", "lint", "dev"])
        );
        assert_eq!(read(&interpreter, "popped"), list_of_strs(&["flake8"]));
        assert_eq!(read(&interpreter, "fallback"), TreewalkValue::None);
        assert_eq!(
            read(&interpreter, "flat"),
            list_of_strs(&["pytest", "sphinx", "tox"])
        );
        assert_eq!(
            run_expect_error("{}.pop('x')").exception.kind,
            ExceptionKind::KeyError
        );
    }

    #[test]
    fn set_methods() {
        let interpreter = run(r#"
s = {1, 2}
s.add(3)
s.discard(10)
u = sorted(s.union([4], [5]))
i = sorted(s.intersection([2, 3, 4]))
d = sorted(s.difference([1]))
sub = {1}.issubset(s)
"#);
        assert_eq!(read(&interpreter, "u"), list_of_ints(&[1, 2, 3, 4, 5]));
        assert_eq!(read(&interpreter, "i"), list_of_ints(&[2, 3]));
        assert_eq!(read(&interpreter, "d"), list_of_ints(&[2, 3]));
        assert_eq!(read(&interpreter, "sub"), TreewalkValue::Bool(true));
        assert_eq!(
            run_expect_error("set().remove(1)").exception.kind,
            ExceptionKind::KeyError
        );
    }

    #[test]
    fn string_io_methods() {
        let interpreter = run(r#"
import io
stream = io.StringIO("first\nsecond\n")
line = stream.readline()
rest = stream.readlines()
stream.seek(0)
whole = stream.read()
stream.write("third")
value = stream.getvalue()
stream.close()
"#);
        assert_eq!(read(&interpreter, "line"), TreewalkValue::str("first\n"));
        assert_eq!(read(&interpreter, "rest"), list_of_strs(&["second\n"]));
        assert_eq!(read(&interpreter, "whole"), TreewalkValue::str("first\nsecond\n"));
        assert_eq!(
            read(&interpreter, "value"),
            TreewalkValue::str("first\nsecond\nthird")
        );
        let interpreter = run(r#"
import io
stream = io.StringIO("año")
stream.seek(1)
stream.write("N")
value = stream.getvalue()
position = stream.tell()
"#);
        assert_eq!(read(&interpreter, "value"), TreewalkValue::str("aNo"));
        assert_eq!(read(&interpreter, "position"), TreewalkValue::Int(2));
        let error = run_expect_error("import io\ns = io.StringIO()\ns.close()\ns.read()");
        assert_eq!(error.exception.kind, ExceptionKind::ValueError);
        assert_eq!(error.line, 4);
    }

    #[test]
    fn bytes_and_tuples() {
        assert_eq!(eval("'é'.encode().decode()"), TreewalkValue::str("é"));
        assert_eq!(eval("(1, 2, 1).count(1)"), TreewalkValue::Int(2));
        assert_eq!(eval("('a', 'b').index('b')"), TreewalkValue::Int(1));
    }

    #[test]
    fn method_names() {
        assert!(names(&TreewalkValue::list(vec![])).contains(&"append"));
        assert_eq!(lookup(&TreewalkValue::str("x"), "removesuffix"), Some("removesuffix"));
        assert_eq!(lookup(&TreewalkValue::Int(1), "append"), None);
    }
}
