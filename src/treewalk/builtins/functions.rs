use std::{
    cmp::Ordering,
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
};

use crate::{
    capture::split_requirement_lines,
    core::{log, Container, LogLevel},
    domain::{ExceptionKind, ModuleName, Text},
    parser::{
        parse,
        types::{Ast, CompareOp, StatementKind},
        types::BinOp,
    },
    sanitizer::neutralize,
    treewalk::{
        builtins::{methods, Builtin},
        compile::{compile, fix_missing_locations},
        interpreter::Frame,
        types::{Class, Exception, Iter, StringIO, Stub, Super},
        utils::{check_args, Args},
        DomainResult, Raise, Scope, TreewalkInterpreter, TreewalkResult, TreewalkValue,
    },
};

pub(super) static BUILTINS: [Builtin; 49] = [
    Builtin { name: "print", call: print },
    Builtin { name: "len", call: len },
    Builtin { name: "repr", call: repr },
    Builtin { name: "ascii", call: repr },
    Builtin { name: "abs", call: abs },
    Builtin { name: "min", call: min },
    Builtin { name: "max", call: max },
    Builtin { name: "sum", call: sum },
    Builtin { name: "any", call: any },
    Builtin { name: "all", call: all },
    Builtin { name: "sorted", call: sorted },
    Builtin { name: "reversed", call: reversed },
    Builtin { name: "enumerate", call: enumerate },
    Builtin { name: "zip", call: zip },
    Builtin { name: "map", call: map },
    Builtin { name: "filter", call: filter },
    Builtin { name: "isinstance", call: isinstance },
    Builtin { name: "issubclass", call: issubclass },
    Builtin { name: "hasattr", call: hasattr },
    Builtin { name: "getattr", call: getattr },
    Builtin { name: "setattr", call: setattr },
    Builtin { name: "delattr", call: delattr },
    Builtin { name: "iter", call: iter },
    Builtin { name: "next", call: next },
    Builtin { name: "open", call: open },
    Builtin { name: "exec", call: exec },
    Builtin { name: "eval", call: eval },
    Builtin { name: "compile", call: compile_source },
    Builtin { name: "globals", call: globals },
    Builtin { name: "locals", call: locals },
    Builtin { name: "vars", call: vars },
    Builtin { name: "dir", call: dir },
    Builtin { name: "id", call: id },
    Builtin { name: "hash", call: hash },
    Builtin { name: "callable", call: callable },
    Builtin { name: "round", call: round },
    Builtin { name: "divmod", call: divmod },
    Builtin { name: "pow", call: pow },
    Builtin { name: "chr", call: chr },
    Builtin { name: "ord", call: ord },
    Builtin { name: "format", call: format },
    Builtin { name: "hex", call: hex },
    Builtin { name: "oct", call: oct },
    Builtin { name: "bin", call: bin },
    Builtin { name: "super", call: super_ },
    Builtin { name: "__import__", call: import },
    Builtin { name: crate::sanitizer::STUB_FACTORY, call: sandbox_stub },
    Builtin { name: crate::sanitizer::STRING_IO_FACTORY, call: sandbox_string_io },
    Builtin { name: crate::sanitizer::REGISTRATION_INTERCEPTOR, call: sandbox_register },
];

fn exactly(args: &Args, name: &str, count: usize) -> DomainResult<()> {
    check_args(args, name, |n| n == count, &count.to_string())
}

fn between(args: &Args, name: &str, min: usize, max: usize) -> DomainResult<()> {
    check_args(
        args,
        name,
        |n| (min..=max).contains(&n),
        &format!("{min} to {max}"),
    )
}

/// `sep` and `end` accept `None` as "use the default".
fn text_option(
    interpreter: &TreewalkInterpreter<'_>,
    value: Option<&TreewalkValue>,
    default: &str,
) -> TreewalkResult<String> {
    match value {
        None | Some(TreewalkValue::None) => Ok(default.to_string()),
        Some(TreewalkValue::Str(s)) => Ok(s.clone()),
        Some(other) => Exception::type_error(format!(
            "sep and end must be None or a string, not {}",
            other.type_name()
        ))
        .raise(interpreter),
    }
}

/// Script output never reaches stdout. It goes to the log, or into a `StringIO` passed as `file`.
fn print(interpreter: &TreewalkInterpreter<'_>, args: Args) -> TreewalkResult<TreewalkValue> {
    let sep = text_option(interpreter, args.get_kwarg("sep"), " ")?;
    let end = text_option(interpreter, args.get_kwarg("end"), "\n")?;
    let parts = args
        .args()
        .iter()
        .map(|value| interpreter.str(value))
        .collect::<TreewalkResult<Vec<_>>>()?;
    let text = format!("{}{end}", parts.join(&sep));

    match args.get_kwarg("file") {
        Some(TreewalkValue::StringIO(stream)) => {
            stream.borrow_mut().write(&text);
        }
        _ => {
            tracing::debug!(
                target: "setupdeps::sandbox",
                line = interpreter.line(),
                "{}",
                text.trim_end_matches('\n')
            );
        }
    }
    Ok(TreewalkValue::None)
}

fn len(interpreter: &TreewalkInterpreter<'_>, args: Args) -> TreewalkResult<TreewalkValue> {
    exactly(&args, "len", 1).raise(interpreter)?;
    let len = interpreter.len(&args.args()[0])?;
    Ok(TreewalkValue::Int(len as i64))
}

fn repr(interpreter: &TreewalkInterpreter<'_>, args: Args) -> TreewalkResult<TreewalkValue> {
    exactly(&args, "repr", 1).raise(interpreter)?;
    Ok(TreewalkValue::Str(interpreter.repr(&args.args()[0])?))
}

fn abs(interpreter: &TreewalkInterpreter<'_>, args: Args) -> TreewalkResult<TreewalkValue> {
    exactly(&args, "abs", 1).raise(interpreter)?;
    let value = &args.args()[0];
    match value {
        TreewalkValue::Int(i) => i
            .checked_abs()
            .map(TreewalkValue::Int)
            .ok_or_else(|| interpreter.raise(Exception::overflow_error("integer overflow"))),
        TreewalkValue::Bool(b) => Ok(TreewalkValue::Int(i64::from(*b))),
        TreewalkValue::Float(f) => Ok(TreewalkValue::Float(f.abs())),
        TreewalkValue::Object(_) => interpreter.call_method(value, "__abs__", Args::default()),
        other => Exception::type_error(format!(
            "bad operand type for abs(): '{}'",
            other.type_name()
        ))
        .raise(interpreter),
    }
}

/// Shared body of `min` and `max`. The first of several equal candidates wins.
fn extremum(
    interpreter: &TreewalkInterpreter<'_>,
    args: Args,
    name: &str,
    op: CompareOp,
    wanted: Ordering,
) -> TreewalkResult<TreewalkValue> {
    let candidates = match args.args() {
        [] => {
            return Exception::type_error(format!(
                "{name} expected at least 1 argument, got 0"
            ))
            .raise(interpreter)
        }
        [iterable] => interpreter.collect(iterable)?,
        many => many.to_vec(),
    };
    let key = args.get_kwarg("key").filter(|key| !key.is_none());

    let mut best: Option<(TreewalkValue, TreewalkValue)> = None;
    for candidate in candidates {
        let rank = match key {
            Some(key) => interpreter.call(key, Args::positional(vec![candidate.clone()]))?,
            None => candidate.clone(),
        };
        let replace = match &best {
            None => true,
            Some((best_rank, _)) => interpreter.ordering(&rank, best_rank, op)? == wanted,
        };
        if replace {
            best = Some((rank, candidate));
        }
    }

    match (best, args.get_kwarg("default")) {
        (Some((_, value)), _) => Ok(value),
        (None, Some(default)) => Ok(default.clone()),
        (None, None) => {
            Exception::value_error(format!("{name}() arg is an empty sequence")).raise(interpreter)
        }
    }
}

fn min(interpreter: &TreewalkInterpreter<'_>, args: Args) -> TreewalkResult<TreewalkValue> {
    extremum(interpreter, args, "min", CompareOp::LessThan, Ordering::Less)
}

fn max(interpreter: &TreewalkInterpreter<'_>, args: Args) -> TreewalkResult<TreewalkValue> {
    extremum(interpreter, args, "max", CompareOp::GreaterThan, Ordering::Greater)
}

fn sum(interpreter: &TreewalkInterpreter<'_>, args: Args) -> TreewalkResult<TreewalkValue> {
    between(&args, "sum", 1, 2).raise(interpreter)?;
    let mut total = args
        .get(1, "start")
        .cloned()
        .unwrap_or(TreewalkValue::Int(0));
    if let TreewalkValue::Str(_) = total {
        return Exception::type_error("sum() can't sum strings [use ''.join(seq) instead]")
            .raise(interpreter);
    }
    for item in interpreter.collect(&args.args()[0])? {
        total = interpreter.binary_op(BinOp::Add, &total, &item)?;
    }
    Ok(total)
}

fn any(interpreter: &TreewalkInterpreter<'_>, args: Args) -> TreewalkResult<TreewalkValue> {
    exactly(&args, "any", 1).raise(interpreter)?;
    for item in interpreter.collect(&args.args()[0])? {
        if interpreter.is_truthy(&item)? {
            return Ok(TreewalkValue::Bool(true));
        }
    }
    Ok(TreewalkValue::Bool(false))
}

fn all(interpreter: &TreewalkInterpreter<'_>, args: Args) -> TreewalkResult<TreewalkValue> {
    exactly(&args, "all", 1).raise(interpreter)?;
    for item in interpreter.collect(&args.args()[0])? {
        if !interpreter.is_truthy(&item)? {
            return Ok(TreewalkValue::Bool(false));
        }
    }
    Ok(TreewalkValue::Bool(true))
}

/// Stable merge sort with a comparison that may raise.
fn merge_sort<T>(
    mut items: Vec<T>,
    is_less: &mut dyn FnMut(&T, &T) -> TreewalkResult<bool>,
) -> TreewalkResult<Vec<T>> {
    if items.len() <= 1 {
        return Ok(items);
    }
    let right = items.split_off(items.len() / 2);
    let left = merge_sort(items, is_less)?;
    let right = merge_sort(right, is_less)?;

    let mut merged = Vec::with_capacity(left.len() + right.len());
    let mut left = left.into_iter().peekable();
    let mut right = right.into_iter().peekable();
    while let (Some(l), Some(r)) = (left.peek(), right.peek()) {
        let take_right = is_less(r, l)?;
        let next = if take_right { right.next() } else { left.next() };
        merged.extend(next);
    }
    merged.extend(left);
    merged.extend(right);
    Ok(merged)
}

/// Sort in place the way `list.sort` does: stable, by `key` when given, and keeping equal items
/// in their original order when `reverse` is set.
pub(crate) fn sort_values(
    interpreter: &TreewalkInterpreter<'_>,
    items: &mut Vec<TreewalkValue>,
    key: Option<&TreewalkValue>,
    reverse: bool,
) -> TreewalkResult<()> {
    let ranked = items
        .drain(..)
        .map(|item| match key {
            Some(key) if !key.is_none() => {
                let rank = interpreter.call(key, Args::positional(vec![item.clone()]))?;
                Ok((rank, item))
            }
            _ => Ok((item.clone(), item)),
        })
        .collect::<TreewalkResult<Vec<_>>>()?;

    let sorted = merge_sort(ranked, &mut |(a, _), (b, _)| {
        let ordering = if reverse {
            interpreter.ordering(b, a, CompareOp::LessThan)?
        } else {
            interpreter.ordering(a, b, CompareOp::LessThan)?
        };
        Ok(ordering == Ordering::Less)
    })?;
    items.extend(sorted.into_iter().map(|(_, item)| item));
    Ok(())
}

fn sorted(interpreter: &TreewalkInterpreter<'_>, args: Args) -> TreewalkResult<TreewalkValue> {
    exactly(&args, "sorted", 1).raise(interpreter)?;
    let mut items = interpreter.collect(&args.args()[0])?;
    let reverse = match args.get_kwarg("reverse") {
        Some(reverse) => interpreter.is_truthy(reverse)?,
        None => false,
    };
    sort_values(interpreter, &mut items, args.get_kwarg("key"), reverse)?;
    Ok(TreewalkValue::list(items))
}

fn iterator(items: Vec<TreewalkValue>) -> TreewalkValue {
    TreewalkValue::Iterator(Container::new(Iter::from_items(items)))
}

fn reversed(interpreter: &TreewalkInterpreter<'_>, args: Args) -> TreewalkResult<TreewalkValue> {
    exactly(&args, "reversed", 1).raise(interpreter)?;
    let mut items = interpreter.collect(&args.args()[0])?;
    items.reverse();
    Ok(iterator(items))
}

fn enumerate(interpreter: &TreewalkInterpreter<'_>, args: Args) -> TreewalkResult<TreewalkValue> {
    between(&args, "enumerate", 1, 2).raise(interpreter)?;
    let start = match args.get(1, "start") {
        Some(start) => start.as_int().raise(interpreter)?,
        None => 0,
    };
    let items = interpreter
        .collect(&args.args()[0])?
        .into_iter()
        .zip(start..)
        .map(|(item, i)| TreewalkValue::tuple(vec![TreewalkValue::Int(i), item]))
        .collect();
    Ok(iterator(items))
}

/// The items of several iterables, grouped position by position and cut to the shortest.
fn transpose(
    interpreter: &TreewalkInterpreter<'_>,
    iterables: &[TreewalkValue],
) -> TreewalkResult<Vec<Vec<TreewalkValue>>> {
    let columns = iterables
        .iter()
        .map(|iterable| interpreter.collect(iterable))
        .collect::<TreewalkResult<Vec<_>>>()?;
    let len = columns.iter().map(Vec::len).min().unwrap_or(0);
    Ok((0..len)
        .map(|i| columns.iter().map(|column| column[i].clone()).collect())
        .collect())
}

fn zip(interpreter: &TreewalkInterpreter<'_>, args: Args) -> TreewalkResult<TreewalkValue> {
    let rows = transpose(interpreter, args.args())?;
    Ok(iterator(rows.into_iter().map(TreewalkValue::tuple).collect()))
}

fn map(interpreter: &TreewalkInterpreter<'_>, args: Args) -> TreewalkResult<TreewalkValue> {
    check_args(&args, "map", |n| n >= 2, "at least 2").raise(interpreter)?;
    let (function, iterables) = args.args().split_at(1);
    let results = transpose(interpreter, iterables)?
        .into_iter()
        .map(|row| interpreter.call(&function[0], Args::positional(row)))
        .collect::<TreewalkResult<Vec<_>>>()?;
    Ok(iterator(results))
}

fn filter(interpreter: &TreewalkInterpreter<'_>, args: Args) -> TreewalkResult<TreewalkValue> {
    exactly(&args, "filter", 2).raise(interpreter)?;
    let predicate = &args.args()[0];
    let mut kept = vec![];
    for item in interpreter.collect(&args.args()[1])? {
        let verdict = match predicate {
            TreewalkValue::None => item.clone(),
            _ => interpreter.call(predicate, Args::positional(vec![item.clone()]))?,
        };
        if interpreter.is_truthy(&verdict)? {
            kept.push(item);
        }
    }
    Ok(iterator(kept))
}

fn isinstance(interpreter: &TreewalkInterpreter<'_>, args: Args) -> TreewalkResult<TreewalkValue> {
    exactly(&args, "isinstance", 2).raise(interpreter)?;
    let result = interpreter.is_instance(&args.args()[0], &args.args()[1])?;
    Ok(TreewalkValue::Bool(result))
}

fn is_subclass(
    interpreter: &TreewalkInterpreter<'_>,
    class: &TreewalkValue,
    parent: &TreewalkValue,
) -> TreewalkResult<bool> {
    Ok(match (class, parent) {
        (_, TreewalkValue::Tuple(parents)) => {
            for parent in parents.iter() {
                if is_subclass(interpreter, class, parent)? {
                    return Ok(true);
                }
            }
            false
        }
        (_, TreewalkValue::Type(parent)) if parent.name() == "object" => true,
        (TreewalkValue::Class(a), TreewalkValue::Class(b)) => Class::is_subclass_of(a, b),
        (TreewalkValue::Class(a), TreewalkValue::ExceptionType(kind)) => a
            .borrow()
            .exception_kind
            .is_some_and(|k| k.is_subclass_of(kind)),
        (TreewalkValue::ExceptionType(a), TreewalkValue::ExceptionType(b)) => a.is_subclass_of(b),
        (TreewalkValue::Type(a), TreewalkValue::Type(b)) => b.matches_type_name(a.name()),
        (TreewalkValue::Stub(_), _) | (_, TreewalkValue::Stub(_)) => false,
        (
            TreewalkValue::Type(_) | TreewalkValue::ExceptionType(_),
            TreewalkValue::Class(_) | TreewalkValue::Type(_) | TreewalkValue::ExceptionType(_),
        ) => false,
        _ => {
            return Exception::type_error("issubclass() arg 1 must be a class").raise(interpreter)
        }
    })
}

fn issubclass(interpreter: &TreewalkInterpreter<'_>, args: Args) -> TreewalkResult<TreewalkValue> {
    exactly(&args, "issubclass", 2).raise(interpreter)?;
    let result = is_subclass(interpreter, &args.args()[0], &args.args()[1])?;
    Ok(TreewalkValue::Bool(result))
}

fn attr_name<'v>(
    interpreter: &TreewalkInterpreter<'_>,
    value: &'v TreewalkValue,
) -> TreewalkResult<&'v str> {
    value.as_str().map_err(|_| {
        interpreter.raise(Exception::type_error("attribute name must be string"))
    })
}

fn hasattr(interpreter: &TreewalkInterpreter<'_>, args: Args) -> TreewalkResult<TreewalkValue> {
    exactly(&args, "hasattr", 2).raise(interpreter)?;
    let name = attr_name(interpreter, &args.args()[1])?;
    Ok(TreewalkValue::Bool(
        interpreter.has_attr(&args.args()[0], name)?,
    ))
}

fn getattr(interpreter: &TreewalkInterpreter<'_>, args: Args) -> TreewalkResult<TreewalkValue> {
    between(&args, "getattr", 2, 3).raise(interpreter)?;
    let name = attr_name(interpreter, &args.args()[1])?;
    match (interpreter.get_attr(&args.args()[0], name), args.get_arg(2)) {
        (Err(raised), Some(default))
            if raised
                .exception
                .kind
                .is_subclass_of(&ExceptionKind::AttributeError) =>
        {
            Ok(default.clone())
        }
        (result, _) => result,
    }
}

fn setattr(interpreter: &TreewalkInterpreter<'_>, args: Args) -> TreewalkResult<TreewalkValue> {
    exactly(&args, "setattr", 3).raise(interpreter)?;
    let name = attr_name(interpreter, &args.args()[1])?;
    interpreter.set_attr(&args.args()[0], name, args.args()[2].clone())?;
    Ok(TreewalkValue::None)
}

fn delattr(interpreter: &TreewalkInterpreter<'_>, args: Args) -> TreewalkResult<TreewalkValue> {
    exactly(&args, "delattr", 2).raise(interpreter)?;
    let name = attr_name(interpreter, &args.args()[1])?;
    interpreter.delete_attr(&args.args()[0], name)?;
    Ok(TreewalkValue::None)
}

fn iter(interpreter: &TreewalkInterpreter<'_>, args: Args) -> TreewalkResult<TreewalkValue> {
    exactly(&args, "iter", 1).raise(interpreter)?;
    Ok(TreewalkValue::Iterator(
        interpreter.iterate(&args.args()[0])?,
    ))
}

fn next(interpreter: &TreewalkInterpreter<'_>, args: Args) -> TreewalkResult<TreewalkValue> {
    between(&args, "next", 1, 2).raise(interpreter)?;
    let item = match &args.args()[0] {
        TreewalkValue::Iterator(iter) => iter.borrow_mut().next(),
        TreewalkValue::Object(_) => {
            return interpreter.call_method(&args.args()[0], "__next__", Args::default())
        }
        other => {
            return Exception::type_error(format!(
                "'{}' object is not an iterator",
                other.type_name()
            ))
            .raise(interpreter)
        }
    };
    match (item, args.get_arg(1)) {
        (Some(item), _) => Ok(item),
        (None, Some(default)) => Ok(default.clone()),
        (None, None) => Exception::stop_iteration().raise(interpreter),
    }
}

/// Only read-mode opens are rewritten into streams; anything that reaches here would touch the
/// real filesystem.
fn open(interpreter: &TreewalkInterpreter<'_>, args: Args) -> TreewalkResult<TreewalkValue> {
    let target = match args.get(0, "file") {
        Some(file) => interpreter.repr(file)?,
        None => "file".to_string(),
    };
    log(LogLevel::Debug, || format!("Refusing open({target})"));
    Exception::permission_error(format!("sandbox does not allow opening {target}"))
        .raise(interpreter)
}

fn syntax_error(message: impl Into<String>) -> Exception {
    Exception::new(
        ExceptionKind::SyntaxError,
        vec![TreewalkValue::Str(message.into())],
    )
}

/// Parse and neutralize source handed to `exec` or `eval`, so dynamic code gets the same
/// treatment as the descriptor itself.
fn prepare_source(
    interpreter: &TreewalkInterpreter<'_>,
    source: &TreewalkValue,
    name: &str,
) -> TreewalkResult<Ast> {
    let text = match source {
        TreewalkValue::Str(s) => s.clone(),
        TreewalkValue::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
        other => {
            return Exception::type_error(format!(
                "{name}() arg 1 must be a string, bytes or code object, not {}",
                other.type_name()
            ))
            .raise(interpreter)
        }
    };

    let ast = parse(&Text::new(&text)).map_err(|e| {
        interpreter.raise(syntax_error(format!("{} (line {})", e.message(), e.line())))
    })?;
    let mut ast = neutralize(ast, interpreter.prober(), interpreter.config());
    fix_missing_locations(&mut ast);
    compile(&ast).map_err(|e| interpreter.raise(syntax_error(e.message)))?;
    Ok(ast)
}

/// Run `body` with `globals` as the module namespace when a dict is given, writing the final
/// bindings back into that dict. Without one, `body` runs in the caller's frame.
fn with_namespace<T>(
    interpreter: &TreewalkInterpreter<'_>,
    globals: Option<&TreewalkValue>,
    body: impl FnOnce() -> TreewalkResult<T>,
) -> TreewalkResult<T> {
    let dict = match globals {
        None | Some(TreewalkValue::None) => return body(),
        Some(TreewalkValue::Dict(dict)) => dict,
        Some(other) => {
            return Exception::type_error(format!(
                "globals must be a dict, not {}",
                other.type_name()
            ))
            .raise(interpreter)
        }
    };

    let mut scope = Scope::default();
    for (key, value) in dict.borrow().items() {
        if let TreewalkValue::Str(name) = key {
            scope.insert(&name, value);
        }
    }
    let namespace = Container::new(scope);
    let result = interpreter.with_depth(|| {
        interpreter.with_frame(Frame::module(namespace.clone()), body)
    });

    for (name, value) in &*namespace.borrow() {
        dict.borrow_mut()
            .insert(TreewalkValue::str(name.as_str()), value.clone())
            .raise(interpreter)?;
    }
    result
}

fn exec(interpreter: &TreewalkInterpreter<'_>, args: Args) -> TreewalkResult<TreewalkValue> {
    between(&args, "exec", 1, 3).raise(interpreter)?;
    let ast = prepare_source(interpreter, &args.args()[0], "exec")?;
    log(LogLevel::Debug, || {
        format!("exec() running {} statement(s)", ast.len())
    });
    with_namespace(interpreter, args.get(1, "globals"), || {
        interpreter.execute_block(&ast).map(|_| ())
    })?;
    Ok(TreewalkValue::None)
}

fn eval(interpreter: &TreewalkInterpreter<'_>, args: Args) -> TreewalkResult<TreewalkValue> {
    between(&args, "eval", 1, 3).raise(interpreter)?;
    let ast = prepare_source(interpreter, &args.args()[0], "eval")?;
    let expr = match ast.as_slice() {
        [statement] => match &statement.kind {
            StatementKind::Expression(expr) => expr.clone(),
            _ => return syntax_error("invalid syntax").raise(interpreter),
        },
        _ => return syntax_error("invalid syntax").raise(interpreter),
    };
    with_namespace(interpreter, args.get(1, "globals"), || {
        interpreter.evaluate_expr(&expr)
    })
}

/// Code objects are represented by their source text, which `exec` and `eval` accept.
fn compile_source(
    interpreter: &TreewalkInterpreter<'_>,
    args: Args,
) -> TreewalkResult<TreewalkValue> {
    between(&args, "compile", 3, 6).raise(interpreter)?;
    let source = &args.args()[0];
    prepare_source(interpreter, source, "compile")?;
    Ok(source.clone())
}

fn globals(interpreter: &TreewalkInterpreter<'_>, args: Args) -> TreewalkResult<TreewalkValue> {
    exactly(&args, "globals", 0).raise(interpreter)?;
    let globals = interpreter.current_frame().globals;
    let dict = globals.borrow().to_dict();
    Ok(TreewalkValue::dict(dict))
}

fn locals(interpreter: &TreewalkInterpreter<'_>, args: Args) -> TreewalkResult<TreewalkValue> {
    exactly(&args, "locals", 0).raise(interpreter)?;
    let locals = interpreter.current_frame().locals;
    let dict = locals.borrow().to_dict();
    Ok(TreewalkValue::dict(dict))
}

fn vars(interpreter: &TreewalkInterpreter<'_>, args: Args) -> TreewalkResult<TreewalkValue> {
    between(&args, "vars", 0, 1).raise(interpreter)?;
    match args.get_arg(0) {
        None => locals(interpreter, Args::default()),
        Some(TreewalkValue::Object(object)) => {
            Ok(TreewalkValue::dict(object.borrow().attrs.to_dict()))
        }
        Some(TreewalkValue::Class(class)) => {
            Ok(TreewalkValue::dict(class.borrow().namespace.to_dict()))
        }
        Some(value @ TreewalkValue::Module(_)) => interpreter.get_attr(value, "__dict__"),
        Some(other) => Exception::type_error(format!(
            "vars() argument must have __dict__ attribute, not {}",
            other.type_name()
        ))
        .raise(interpreter),
    }
}

fn dir(interpreter: &TreewalkInterpreter<'_>, args: Args) -> TreewalkResult<TreewalkValue> {
    between(&args, "dir", 0, 1).raise(interpreter)?;
    let mut names: Vec<String> = match args.get_arg(0) {
        None => interpreter.current_frame().locals.borrow().symbols(),
        Some(TreewalkValue::Module(module)) => module.borrow().dir(),
        Some(TreewalkValue::Object(object)) => {
            let object = object.borrow();
            let mut names = object.attrs.symbols();
            for class in Class::full_mro(&object.class) {
                names.extend(class.borrow().namespace.symbols());
            }
            names
        }
        Some(TreewalkValue::Class(class)) => Class::full_mro(class)
            .iter()
            .flat_map(|class| class.borrow().namespace.symbols())
            .collect(),
        Some(TreewalkValue::Stub(_)) => vec![],
        Some(other) => methods::names(other)
            .iter()
            .map(|name| name.to_string())
            .collect(),
    };
    names.sort();
    names.dedup();
    Ok(TreewalkValue::list(
        names.into_iter().map(TreewalkValue::Str).collect(),
    ))
}

fn identity(value: &TreewalkValue) -> Option<usize> {
    Some(match value {
        TreewalkValue::List(c) => c.address(),
        TreewalkValue::Dict(c) => c.address(),
        TreewalkValue::Set(c) => c.address(),
        TreewalkValue::Iterator(c) => c.address(),
        TreewalkValue::Function(c) => c.address(),
        TreewalkValue::Class(c) => c.address(),
        TreewalkValue::Object(c) => c.address(),
        TreewalkValue::Module(c) => c.address(),
        TreewalkValue::StringIO(c) => c.address(),
        TreewalkValue::Stub(s) => s.address(),
        _ => return None,
    })
}

fn hash_of(interpreter: &TreewalkInterpreter<'_>, value: &TreewalkValue) -> TreewalkResult<i64> {
    match value {
        TreewalkValue::Int(i) => Ok(*i),
        TreewalkValue::Bool(b) => Ok(i64::from(*b)),
        _ => {
            let key = value.hash_key().raise(interpreter)?;
            let mut hasher = DefaultHasher::new();
            key.hash(&mut hasher);
            Ok(hasher.finish() as i64)
        }
    }
}

fn id(interpreter: &TreewalkInterpreter<'_>, args: Args) -> TreewalkResult<TreewalkValue> {
    exactly(&args, "id", 1).raise(interpreter)?;
    let value = &args.args()[0];
    let id = match identity(value) {
        Some(address) => address as i64,
        None => hash_of(interpreter, value).unwrap_or_default(),
    };
    Ok(TreewalkValue::Int(id))
}

fn hash(interpreter: &TreewalkInterpreter<'_>, args: Args) -> TreewalkResult<TreewalkValue> {
    exactly(&args, "hash", 1).raise(interpreter)?;
    Ok(TreewalkValue::Int(hash_of(interpreter, &args.args()[0])?))
}

fn callable(interpreter: &TreewalkInterpreter<'_>, args: Args) -> TreewalkResult<TreewalkValue> {
    exactly(&args, "callable", 1).raise(interpreter)?;
    Ok(TreewalkValue::Bool(
        interpreter.is_callable(&args.args()[0]),
    ))
}

/// Python rounds halves to even.
fn round(interpreter: &TreewalkInterpreter<'_>, args: Args) -> TreewalkResult<TreewalkValue> {
    between(&args, "round", 1, 2).raise(interpreter)?;
    let ndigits = match args.get(1, "ndigits") {
        None | Some(TreewalkValue::None) => None,
        Some(n) => Some(n.as_int().raise(interpreter)?),
    };
    let number = &args.args()[0];
    match (number, ndigits) {
        (TreewalkValue::Int(_) | TreewalkValue::Bool(_), None) => {
            Ok(TreewalkValue::Int(number.as_int().raise(interpreter)?))
        }
        (TreewalkValue::Int(i), Some(n)) if n < 0 => {
            let factor = 10f64.powi(i32::try_from(-n).unwrap_or(i32::MAX));
            Ok(TreewalkValue::Int(
                ((*i as f64 / factor).round_ties_even() * factor) as i64,
            ))
        }
        (TreewalkValue::Int(i), Some(_)) => Ok(TreewalkValue::Int(*i)),
        (TreewalkValue::Float(f), None) => {
            if !f.is_finite() {
                return Exception::overflow_error("cannot convert float infinity or NaN to integer")
                    .raise(interpreter);
            }
            Ok(TreewalkValue::Int(f.round_ties_even() as i64))
        }
        (TreewalkValue::Float(f), Some(n)) => {
            let factor = 10f64.powi(i32::try_from(n).unwrap_or(i32::MAX));
            Ok(TreewalkValue::Float((f * factor).round_ties_even() / factor))
        }
        (TreewalkValue::Object(_), _) => interpreter.call_method(
            number,
            "__round__",
            Args::positional(ndigits.map(TreewalkValue::Int).into_iter().collect()),
        ),
        (other, _) => Exception::type_error(format!(
            "type {} doesn't define __round__ method",
            other.type_name()
        ))
        .raise(interpreter),
    }
}

fn divmod(interpreter: &TreewalkInterpreter<'_>, args: Args) -> TreewalkResult<TreewalkValue> {
    exactly(&args, "divmod", 2).raise(interpreter)?;
    let (a, b) = (&args.args()[0], &args.args()[1]);
    Ok(TreewalkValue::tuple(vec![
        interpreter.binary_op(BinOp::IntegerDiv, a, b)?,
        interpreter.binary_op(BinOp::Mod, a, b)?,
    ]))
}

fn pow(interpreter: &TreewalkInterpreter<'_>, args: Args) -> TreewalkResult<TreewalkValue> {
    between(&args, "pow", 2, 3).raise(interpreter)?;
    let (base, exponent) = (&args.args()[0], &args.args()[1]);
    let Some(modulus) = args.get(2, "mod") else {
        return interpreter.binary_op(BinOp::Expo, base, exponent);
    };

    let (base, exponent, modulus) = (
        base.as_int().raise(interpreter)?,
        exponent.as_int().raise(interpreter)?,
        modulus.as_int().raise(interpreter)?,
    );
    if modulus == 0 {
        return Exception::value_error("pow() 3rd argument cannot be 0").raise(interpreter);
    }
    if exponent < 0 {
        return Exception::value_error("base is not invertible for the given modulus")
            .raise(interpreter);
    }
    let modulus = i128::from(modulus);
    let mut result: i128 = 1;
    let mut base = i128::from(base).rem_euclid(modulus);
    let mut exponent = exponent;
    while exponent > 0 {
        if exponent & 1 == 1 {
            result = (result * base).rem_euclid(modulus);
        }
        base = (base * base).rem_euclid(modulus);
        exponent >>= 1;
    }
    // A negative modulus gives a result with its sign.
    if modulus < 0 && result > 0 {
        result += modulus;
    }
    Ok(TreewalkValue::Int(result as i64))
}

fn chr(interpreter: &TreewalkInterpreter<'_>, args: Args) -> TreewalkResult<TreewalkValue> {
    exactly(&args, "chr", 1).raise(interpreter)?;
    let code = args.args()[0].as_int().raise(interpreter)?;
    u32::try_from(code)
        .ok()
        .and_then(char::from_u32)
        .map(|c| TreewalkValue::Str(c.to_string()))
        .ok_or_else(|| interpreter.raise(Exception::value_error("chr() arg not in range(0x110000)")))
}

fn ord(interpreter: &TreewalkInterpreter<'_>, args: Args) -> TreewalkResult<TreewalkValue> {
    exactly(&args, "ord", 1).raise(interpreter)?;
    match &args.args()[0] {
        TreewalkValue::Str(s) if s.chars().count() == 1 => {
            Ok(TreewalkValue::Int(s.chars().map(|c| c as i64).sum()))
        }
        TreewalkValue::Str(s) => Exception::type_error(format!(
            "ord() expected a character, but string of length {} found",
            s.chars().count()
        ))
        .raise(interpreter),
        other => Exception::type_error(format!(
            "ord() expected string of length 1, but {} found",
            other.type_name()
        ))
        .raise(interpreter),
    }
}

fn format(interpreter: &TreewalkInterpreter<'_>, args: Args) -> TreewalkResult<TreewalkValue> {
    between(&args, "format", 1, 2).raise(interpreter)?;
    let spec = match args.get(1, "format_spec") {
        Some(spec) => spec.as_str().raise(interpreter)?.to_string(),
        None => String::new(),
    };
    Ok(TreewalkValue::Str(
        interpreter.format_value(&args.args()[0], &spec)?,
    ))
}

fn radix(
    interpreter: &TreewalkInterpreter<'_>,
    args: Args,
    name: &str,
    render: fn(u64) -> String,
) -> TreewalkResult<TreewalkValue> {
    exactly(&args, name, 1).raise(interpreter)?;
    let value = args.args()[0].as_int().raise(interpreter)?;
    let sign = if value < 0 { "-" } else { "" };
    Ok(TreewalkValue::Str(format!(
        "{sign}{}",
        render(value.unsigned_abs())
    )))
}

fn hex(interpreter: &TreewalkInterpreter<'_>, args: Args) -> TreewalkResult<TreewalkValue> {
    radix(interpreter, args, "hex", |n| format!("0x{n:x}"))
}

fn oct(interpreter: &TreewalkInterpreter<'_>, args: Args) -> TreewalkResult<TreewalkValue> {
    radix(interpreter, args, "oct", |n| format!("0o{n:o}"))
}

fn bin(interpreter: &TreewalkInterpreter<'_>, args: Args) -> TreewalkResult<TreewalkValue> {
    radix(interpreter, args, "bin", |n| format!("0b{n:b}"))
}

fn super_(interpreter: &TreewalkInterpreter<'_>, args: Args) -> TreewalkResult<TreewalkValue> {
    let (class, receiver) = match args.args() {
        [] => interpreter.implicit_super()?,
        [TreewalkValue::Class(class), receiver] => (class.clone(), receiver.clone()),
        _ => {
            return Exception::type_error("super() argument 1 must be a type").raise(interpreter)
        }
    };
    Ok(TreewalkValue::Super(Super {
        class,
        receiver: Box::new(receiver),
    }))
}

/// `__import__(name, globals, locals, fromlist, level)`: the top-level package unless `fromlist`
/// asks for the leaf.
fn import(interpreter: &TreewalkInterpreter<'_>, args: Args) -> TreewalkResult<TreewalkValue> {
    between(&args, "__import__", 1, 5).raise(interpreter)?;
    let name = args.args()[0].as_str().raise(interpreter)?;
    let level = match args.get(4, "level") {
        Some(level) => level.as_int().raise(interpreter)?,
        None => 0,
    };
    if level > 0 || name.is_empty() {
        return Exception::import_error("attempted relative import with no known parent package")
            .raise(interpreter);
    }

    let module_name = ModuleName::from_dotted(name);
    let module = interpreter.import_module(&module_name)?;
    let wants_leaf = match args.get(3, "fromlist") {
        Some(fromlist) => interpreter.is_truthy(fromlist)?,
        None => false,
    };
    if wants_leaf {
        return Ok(TreewalkValue::Module(module));
    }
    let root = interpreter.import_module(&ModuleName::from_dotted(module_name.head()))?;
    Ok(TreewalkValue::Module(root))
}

fn sandbox_stub(interpreter: &TreewalkInterpreter<'_>, args: Args) -> TreewalkResult<TreewalkValue> {
    exactly(&args, "__sandbox_stub__", 1).raise(interpreter)?;
    let name = args.args()[0].as_str().raise(interpreter)?;
    Ok(TreewalkValue::Stub(Stub::new(name)))
}

fn sandbox_string_io(
    interpreter: &TreewalkInterpreter<'_>,
    args: Args,
) -> TreewalkResult<TreewalkValue> {
    between(&args, "__sandbox_string_io__", 0, 1).raise(interpreter)?;
    let initial = match args.get_arg(0) {
        Some(value) => interpreter.str(value)?,
        None => String::new(),
    };
    Ok(TreewalkValue::StringIO(Container::new(StringIO::new(initial))))
}

/// The registration interceptor. Records the requirements keyword argument, converted to text,
/// and returns `None` the way the real call would.
fn sandbox_register(
    interpreter: &TreewalkInterpreter<'_>,
    args: Args,
) -> TreewalkResult<TreewalkValue> {
    let keyword = &interpreter.config().requirements_keyword;
    let sentinel = &interpreter.config().sentinel;
    let requirements = match args.get_kwarg(keyword) {
        None | Some(TreewalkValue::None) => vec![],
        Some(TreewalkValue::Str(text)) => split_requirement_lines(text),
        Some(TreewalkValue::Stub(_)) => vec![sentinel.clone()],
        Some(iterable) => interpreter
            .collect(iterable)?
            .iter()
            .map(|item| match item {
                TreewalkValue::Str(s) => Ok(s.clone()),
                TreewalkValue::Stub(_) => Ok(sentinel.clone()),
                other => interpreter.str(other),
            })
            .collect::<TreewalkResult<Vec<_>>>()?,
    };
    interpreter.capture().borrow_mut().record(requirements);
    Ok(TreewalkValue::None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::treewalk::test_utils::*;
    // The `eval` builtin above would otherwise shadow the helper.
    use crate::treewalk::test_utils::eval;

    #[test]
    fn aggregates() {
        assert_eq!(eval("len([1, 2, 3])"), TreewalkValue::Int(3));
        assert_eq!(eval("min(3, 1, 2)"), TreewalkValue::Int(1));
        assert_eq!(eval("max([3, 1, 2])"), TreewalkValue::Int(3));
        assert_eq!(eval("max(['a', 'bbb', 'cc'], key=len)"), TreewalkValue::str("bbb"));
        assert_eq!(eval("min([], default=0)"), TreewalkValue::Int(0));
        assert_eq!(eval("sum([1, 2, 3], 10)"), TreewalkValue::Int(16));
        assert_eq!(eval("sum([[1], [2]], [])"), list_of_ints(&[1, 2]));
        assert_eq!(eval("any([0, '', 'x'])"), TreewalkValue::Bool(true));
        assert_eq!(eval("all([1, []])"), TreewalkValue::Bool(false));
        assert_eq!(eval("abs(-3)"), TreewalkValue::Int(3));
        assert_raises!(
            run_expect_error("max([])"),
            ValueError,
            "max() arg is an empty sequence"
        );
    }

    #[test]
    fn sorting() {
        assert_eq!(eval("sorted([3, 1, 2])"), list_of_ints(&[1, 2, 3]));
        assert_eq!(eval("sorted([3, 1, 2], reverse=True)"), list_of_ints(&[3, 2, 1]));
        assert_eq!(
            eval("sorted(['bb', 'a', 'ccc', 'dd'], key=len)"),
            list_of_strs(&["a", "bb", "dd", "ccc"])
        );
        assert_eq!(
            eval("sorted(['bb', 'a', 'ccc', 'dd'], key=len, reverse=True)"),
            list_of_strs(&["ccc", "bb", "dd", "a"])
        );
        assert_eq!(
            eval("sorted({'b': 1, 'a': 2})"),
            list_of_strs(&["a", "b"])
        );
        assert_eq!(
            run_expect_error("sorted([1, 'a'])").exception.kind,
            ExceptionKind::TypeError
        );
    }

    #[test]
    fn iteration_helpers() {
        assert_eq!(
            eval("list(enumerate(['a', 'b'], 1)) == [(1, 'a'), (2, 'b')]"),
            TreewalkValue::Bool(true)
        );
        assert_eq!(
            eval("list(zip([1, 2, 3], 'ab')) == [(1, 'a'), (2, 'b')]"),
            TreewalkValue::Bool(true)
        );
        assert_eq!(eval("list(map(str.upper, ['a']))"), list_of_strs(&["A"]));
        assert_eq!(
            eval("list(map(lambda a, b: a + b, [1, 2], [10, 20]))"),
            list_of_ints(&[11, 22])
        );
        assert_eq!(eval("list(filter(None, [0, 1, '', 2]))"), list_of_ints(&[1, 2]));
        assert_eq!(eval("list(reversed([1, 2]))"), list_of_ints(&[2, 1]));

        let interpreter = run(r#"
it = iter([1, 2])
first = next(it)
second = next(it)
fallback = next(it, "done")
"#);
        assert_eq!(read(&interpreter, "first"), TreewalkValue::Int(1));
        assert_eq!(read(&interpreter, "second"), TreewalkValue::Int(2));
        assert_eq!(read(&interpreter, "fallback"), TreewalkValue::str("done"));
        assert_eq!(
            run_expect_error("next(iter([]))").exception.kind,
            ExceptionKind::StopIteration
        );
    }

    #[test]
    fn attribute_builtins() {
        let interpreter = run(r#"
class Config:
    pass

c = Config()
setattr(c, "name", "pkg")
has_name = hasattr(c, "name")
name = getattr(c, "name")
missing = getattr(c, "version", "0.0")
delattr(c, "name")
gone = not hasattr(c, "name")
"#);
        assert_eq!(read(&interpreter, "has_name"), TreewalkValue::Bool(true));
        assert_eq!(read(&interpreter, "name"), TreewalkValue::str("pkg"));
        assert_eq!(read(&interpreter, "missing"), TreewalkValue::str("0.0"));
        assert_eq!(read(&interpreter, "gone"), TreewalkValue::Bool(true));
    }

    #[test]
    fn type_checks() {
        assert_eq!(eval("issubclass(bool, int)"), TreewalkValue::Bool(true));
        assert_eq!(
            eval("issubclass(ModuleNotFoundError, (ImportError, OSError))"),
            TreewalkValue::Bool(true)
        );
        assert_eq!(eval("callable(len)"), TreewalkValue::Bool(true));
        assert_eq!(eval("callable(3)"), TreewalkValue::Bool(false));
    }

    #[test]
    fn numeric_builtins() {
        assert_eq!(eval("round(2.5)"), TreewalkValue::Int(2));
        assert_eq!(eval("round(3.5)"), TreewalkValue::Int(4));
        assert_eq!(eval("round(2.675, 1)"), TreewalkValue::Float(2.7));
        assert_eq!(eval("divmod(7, -2) == (-4, -1)"), TreewalkValue::Bool(true));
        assert_eq!(eval("pow(3, 4, 5)"), TreewalkValue::Int(1));
        assert_eq!(eval("pow(2, 8)"), TreewalkValue::Int(256));
        assert_eq!(eval("chr(65) + str(ord('a'))"), TreewalkValue::str("A97"));
        assert_eq!(eval("hex(-255)"), TreewalkValue::str("-0xff"));
        assert_eq!(eval("oct(8) + bin(5)"), TreewalkValue::str("0o100b101"));
        assert_eq!(eval("hash(7)"), TreewalkValue::Int(7));
        assert_eq!(eval("hash('a') == hash('a')"), TreewalkValue::Bool(true));
        assert_eq!(
            run_expect_error("hash([])").exception.kind,
            ExceptionKind::TypeError
        );
    }

    #[test]
    fn print_is_silent() {
        let interpreter = run(r#"
import io
buffer = io.StringIO()
print("a", "b", sep="-", end="!", file=buffer)
print("to the log")
captured = buffer.getvalue()
"#);
        assert_eq!(read(&interpreter, "captured"), TreewalkValue::str("a-b!"));
    }

    #[test]
    fn open_is_refused() {
        assert_raises!(
            run_expect_error("open('out.txt', 'w')"),
            PermissionError,
            "sandbox does not allow opening 'out.txt'"
        );
    }

    #[test]
    fn exec_and_eval() {
        let interpreter = run(r#"
namespace = {"base": ["six"]}
exec("reqs = base + ['attrs']\nversion = '1.0'", namespace)
exec("shared = 1")
value = eval("shared + 1")
scoped = eval("len(reqs)", namespace)
"#);
        assert_eq!(
            eval_in(&interpreter, "namespace['reqs']"),
            list_of_strs(&["six", "attrs"])
        );
        assert_eq!(
            eval_in(&interpreter, "namespace['version']"),
            TreewalkValue::str("1.0")
        );
        assert_eq!(read(&interpreter, "shared"), TreewalkValue::Int(1));
        assert_eq!(read(&interpreter, "value"), TreewalkValue::Int(2));
        assert_eq!(read(&interpreter, "scoped"), TreewalkValue::Int(2));

        let error = run_expect_error("exec('def broken(:')");
        assert_eq!(error.exception.kind, ExceptionKind::SyntaxError);
        let error = run_expect_error("exec('return 1')");
        assert_eq!(error.exception.kind, ExceptionKind::SyntaxError);
    }

    #[test]
    fn exec_neutralizes_its_source() {
        let interpreter = run(r#"
ns = {}
exec("import numpy\nfrom Cython.Build import cythonize\nversion = open('VERSION').read()", ns)
numpy_version = str(ns["numpy"].__version__)
version = ns["version"]
"#);
        assert_eq!(read(&interpreter, "numpy_version"), TreewalkValue::str("FIXME"));
        assert_eq!(read(&interpreter, "version"), TreewalkValue::str("FIXME"));
    }

    #[test]
    fn namespace_introspection() {
        let interpreter = run(r#"
x = 1
def f():
    y = 2
    return sorted(locals())
inner = f()
has_x = "x" in globals()
names = dir()
"#);
        assert_eq!(read(&interpreter, "inner"), list_of_strs(&["y"]));
        assert_eq!(read(&interpreter, "has_x"), TreewalkValue::Bool(true));
        assert_eq!(
            eval_in(&interpreter, "'x' in names and 'f' in names"),
            TreewalkValue::Bool(true)
        );
    }

    #[test]
    fn dunder_import() {
        let interpreter = run(r#"
os_module = __import__("os.path")
path_module = __import__("os.path", fromlist=["join"])
"#);
        assert_eq!(
            eval_in(&interpreter, "os_module.__name__"),
            TreewalkValue::str("os")
        );
        assert_eq!(
            eval_in(&interpreter, "path_module.__name__"),
            TreewalkValue::str("os.path")
        );
        assert_eq!(
            run_expect_error("__import__('numpy')").exception.kind,
            ExceptionKind::ModuleNotFoundError
        );
    }

    #[test]
    fn registration_interceptor() {
        let interpreter = run(r#"
__sandbox_register__(name="pkg", install_requires=["a>=1", __sandbox_stub__("v"), 3])
__sandbox_register__(install_requires="""
    b
    c>2

""")
__sandbox_register__(name="no-deps")
"#);
        let mut capture = interpreter.take_capture();
        assert_eq!(capture.records(), 3);
        assert_eq!(capture.drain(), vec!["a>=1", "FIXME", "3", "b", "c>2"]);
    }
}
