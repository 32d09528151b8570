use crate::{
    domain::{
        utils::{format_bytes, format_comma_separated, quote_str},
        ExceptionKind,
    },
    treewalk::{
        types::{Class, Exception},
        utils::Args,
        DomainResult, Raise, TreewalkInterpreter, TreewalkResult, TreewalkValue,
    },
};

/// Python's `repr()` of a float: the shortest text that round-trips, switching to exponent
/// notation outside `1e-4 <= |x| < 1e16`.
pub fn format_float(value: f64) -> String {
    if value.is_nan() {
        return "nan".into();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf".into() } else { "-inf".into() };
    }
    if value == 0.0 {
        return if value.is_sign_negative() { "-0.0".into() } else { "0.0".into() };
    }

    let scientific = format!("{value:e}");
    let (mantissa, exponent) = split_exponent(&scientific);
    if !(-4..16).contains(&exponent) {
        return format!("{mantissa}e{}", signed_exponent(exponent));
    }

    let plain = format!("{value}");
    if plain.contains('.') {
        plain
    } else {
        format!("{plain}.0")
    }
}

/// Split Rust's `{:e}` output into mantissa text and exponent.
fn split_exponent(text: &str) -> (&str, i32) {
    match text.split_once('e') {
        Some((mantissa, exponent)) => (mantissa, exponent.parse().unwrap_or(0)),
        None => (text, 0),
    }
}

fn signed_exponent(exponent: i32) -> String {
    let sign = if exponent < 0 { '-' } else { '+' };
    format!("{sign}{:02}", exponent.unsigned_abs())
}

/// A parsed format specification: `[[fill]align][sign][#][0][width][,|_][.precision][type]`.
#[derive(Debug, Default, Clone, PartialEq)]
struct FormatSpec {
    fill: Option<char>,
    align: Option<char>,
    sign: Option<char>,
    alternate: bool,
    zero: bool,
    width: usize,
    grouping: Option<char>,
    precision: Option<usize>,
    kind: Option<char>,
}

impl FormatSpec {
    fn parse(spec: &str) -> DomainResult<Self> {
        let invalid = || Exception::value_error(format!("Invalid format specifier '{spec}'"));
        let chars: Vec<char> = spec.chars().collect();
        let mut parsed = FormatSpec::default();
        let mut i = 0;

        let is_align = |c: char| matches!(c, '<' | '>' | '^' | '=');
        if chars.len() >= 2 && is_align(chars[1]) {
            parsed.fill = Some(chars[0]);
            parsed.align = Some(chars[1]);
            i = 2;
        } else if chars.first().copied().is_some_and(is_align) {
            parsed.align = Some(chars[0]);
            i = 1;
        }
        if let Some(&c @ ('+' | '-' | ' ')) = chars.get(i) {
            parsed.sign = Some(c);
            i += 1;
        }
        if chars.get(i) == Some(&'#') {
            parsed.alternate = true;
            i += 1;
        }
        if chars.get(i) == Some(&'0') {
            parsed.zero = true;
            i += 1;
        }
        let start = i;
        while chars.get(i).is_some_and(char::is_ascii_digit) {
            i += 1;
        }
        if i > start {
            parsed.width = chars[start..i]
                .iter()
                .collect::<String>()
                .parse()
                .map_err(|_| invalid())?;
        }
        if let Some(&c @ (',' | '_')) = chars.get(i) {
            parsed.grouping = Some(c);
            i += 1;
        }
        if chars.get(i) == Some(&'.') {
            i += 1;
            let start = i;
            while chars.get(i).is_some_and(char::is_ascii_digit) {
                i += 1;
            }
            if i == start {
                return Err(invalid());
            }
            parsed.precision = Some(
                chars[start..i]
                    .iter()
                    .collect::<String>()
                    .parse()
                    .map_err(|_| invalid())?,
            );
        }
        if let Some(&c) = chars.get(i) {
            parsed.kind = Some(c);
            i += 1;
        }
        if i != chars.len() {
            return Err(invalid());
        }
        Ok(parsed)
    }

    /// Pad `body` to the width. `sign` is kept in front of any zero padding.
    fn pad(&self, sign: &str, body: &str, numeric: bool) -> String {
        let len = sign.chars().count() + body.chars().count();
        if len >= self.width {
            return format!("{sign}{body}");
        }
        let padding = self.width - len;
        let (fill, align) = match (self.fill, self.align) {
            (fill, Some(align)) => (fill.unwrap_or(' '), align),
            (_, None) if self.zero && numeric => ('0', '='),
            (_, None) if numeric => (' ', '>'),
            (_, None) => (' ', '<'),
        };
        let fill_with = |n: usize| fill.to_string().repeat(n);
        match align {
            '<' => format!("{sign}{body}{}", fill_with(padding)),
            '^' => format!(
                "{}{sign}{body}{}",
                fill_with(padding / 2),
                fill_with(padding - padding / 2)
            ),
            '=' => format!("{sign}{}{body}", fill_with(padding)),
            _ => format!("{}{sign}{body}", fill_with(padding)),
        }
    }

    fn sign_for(&self, negative: bool) -> &'static str {
        match (negative, self.sign) {
            (true, _) => "-",
            (false, Some('+')) => "+",
            (false, Some(' ')) => " ",
            _ => "",
        }
    }
}

fn group_digits(digits: &str, separator: char) -> String {
    let count = digits.chars().count();
    let mut grouped = String::with_capacity(count + count / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (count - i) % 3 == 0 {
            grouped.push(separator);
        }
        grouped.push(c);
    }
    grouped
}

/// Apply digit grouping to the integer part of a formatted number.
fn group_number(body: &str, separator: Option<char>) -> String {
    let Some(separator) = separator else {
        return body.to_string();
    };
    let split = body
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(body.len());
    format!("{}{}", group_digits(&body[..split], separator), &body[split..])
}

fn format_exponent(value: f64, precision: usize, upper: bool) -> String {
    let text = format!("{value:.precision$e}");
    let (mantissa, exponent) = split_exponent(&text);
    let formatted = format!("{mantissa}e{}", signed_exponent(exponent));
    if upper {
        formatted.to_uppercase()
    } else {
        formatted
    }
}

fn strip_trailing_zeros(text: &str) -> String {
    if !text.contains('.') {
        return text.to_string();
    }
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

/// The `g` presentation type.
fn format_general(value: f64, precision: usize, alternate: bool, upper: bool) -> String {
    if !value.is_finite() {
        return format_float(value);
    }
    let precision = precision.max(1);
    let rounded = format!("{:.*e}", precision - 1, value);
    let (_, exponent) = split_exponent(&rounded);
    let text = if exponent >= -4 && exponent < precision as i32 {
        let decimals = usize::try_from(precision as i32 - 1 - exponent).unwrap_or(0);
        format!("{value:.decimals$}")
    } else {
        format_exponent(value, precision - 1, false)
    };
    let text = if alternate {
        text
    } else if let Some((mantissa, exponent)) = text.split_once('e') {
        format!("{}e{exponent}", strip_trailing_zeros(mantissa))
    } else {
        strip_trailing_zeros(&text)
    };
    if upper {
        text.to_uppercase()
    } else {
        text
    }
}

fn format_integer(value: i64, spec: &FormatSpec) -> DomainResult<String> {
    let magnitude = value.unsigned_abs();
    let (prefix, digits) = match spec.kind {
        None | Some('d') | Some('n') => ("", magnitude.to_string()),
        Some('x') => ("0x", format!("{magnitude:x}")),
        Some('X') => ("0X", format!("{magnitude:X}")),
        Some('o') => ("0o", format!("{magnitude:o}")),
        Some('b') => ("0b", format!("{magnitude:b}")),
        Some('c') => {
            let c = u32::try_from(value)
                .ok()
                .and_then(char::from_u32)
                .ok_or_else(|| Exception::overflow_error("%c arg not in range(0x110000)"))?;
            return Ok(spec.pad("", &c.to_string(), false));
        }
        Some('e' | 'E' | 'f' | 'F' | 'g' | 'G' | '%') => {
            return format_float_spec(value as f64, spec)
        }
        Some(kind) => {
            return Err(Exception::value_error(format!(
                "Unknown format code '{kind}' for object of type 'int'"
            )))
        }
    };
    let digits = group_number(&digits, spec.grouping);
    let prefix = if spec.alternate { prefix } else { "" };
    let sign = format!("{}{prefix}", spec.sign_for(value < 0));
    Ok(spec.pad(&sign, &digits, true))
}

fn format_float_spec(value: f64, spec: &FormatSpec) -> DomainResult<String> {
    let magnitude = value.abs();
    let body = match spec.kind {
        Some('f' | 'F') => format!("{magnitude:.*}", spec.precision.unwrap_or(6)),
        Some('e') => format_exponent(magnitude, spec.precision.unwrap_or(6), false),
        Some('E') => format_exponent(magnitude, spec.precision.unwrap_or(6), true),
        Some('g') => format_general(magnitude, spec.precision.unwrap_or(6), spec.alternate, false),
        Some('G') => format_general(magnitude, spec.precision.unwrap_or(6), spec.alternate, true),
        Some('%') => format!("{:.*}%", spec.precision.unwrap_or(6), magnitude * 100.0),
        None => match spec.precision {
            Some(precision) => format_general(magnitude, precision, spec.alternate, false),
            None => format_float(magnitude),
        },
        Some(kind) => {
            return Err(Exception::value_error(format!(
                "Unknown format code '{kind}' for object of type 'float'"
            )))
        }
    };
    let body = group_number(&body, spec.grouping);
    Ok(spec.pad(spec.sign_for(value.is_sign_negative() && value != 0.0), &body, true))
}

fn format_text(text: &str, spec: &FormatSpec, type_name: &str) -> DomainResult<String> {
    match spec.kind {
        None | Some('s') => {}
        Some(kind) => {
            return Err(Exception::value_error(format!(
                "Unknown format code '{kind}' for object of type '{type_name}'"
            )))
        }
    }
    let text: String = match spec.precision {
        Some(precision) => text.chars().take(precision).collect(),
        None => text.to_string(),
    };
    Ok(spec.pad("", &text, false))
}

impl TreewalkInterpreter<'_> {
    /// `str(value)`.
    pub fn str(&self, value: &TreewalkValue) -> TreewalkResult<String> {
        match value {
            TreewalkValue::Str(s) => Ok(s.clone()),
            TreewalkValue::Exception(exception) => self.exception_message(exception.kind, &exception.payload),
            TreewalkValue::Object(object) => {
                let class = object.borrow().class.clone();
                if Class::lookup(&class, "__str__").is_some() {
                    let result = self.call_method(value, "__str__", Args::default())?;
                    return self.expect_text(result, "__str__");
                }
                let kind = class.borrow().exception_kind;
                match kind {
                    Some(kind) if Class::lookup(&class, "__repr__").is_none() => {
                        let args = object.borrow().attrs.get("args");
                        let payload = match args {
                            Some(TreewalkValue::Tuple(args)) => args.into_items(),
                            _ => vec![],
                        };
                        self.exception_message(kind, &payload)
                    }
                    _ => self.repr(value),
                }
            }
            _ => self.repr(value),
        }
    }

    fn exception_message(
        &self,
        kind: ExceptionKind,
        payload: &[TreewalkValue],
    ) -> TreewalkResult<String> {
        match payload {
            [] => Ok(String::new()),
            [arg] if kind == ExceptionKind::KeyError => self.repr(arg),
            [arg] => self.str(arg),
            args => self.repr(&TreewalkValue::tuple(args.to_vec())),
        }
    }

    fn expect_text(&self, value: TreewalkValue, method: &str) -> TreewalkResult<String> {
        match value {
            TreewalkValue::Str(s) => Ok(s),
            TreewalkValue::Stub(_) => Ok(self.config().sentinel.clone()),
            other => Exception::type_error(format!(
                "{method} returned non-string (type {})",
                other.type_name()
            ))
            .raise(self),
        }
    }

    /// `repr(value)`.
    pub fn repr(&self, value: &TreewalkValue) -> TreewalkResult<String> {
        self.repr_inner(value, &mut vec![])
    }

    fn repr_items<'v>(
        &self,
        items: impl IntoIterator<Item = &'v TreewalkValue>,
        seen: &mut Vec<usize>,
    ) -> TreewalkResult<Vec<String>> {
        items
            .into_iter()
            .map(|item| self.repr_inner(item, seen))
            .collect()
    }

    /// `seen` holds the containers being printed, so a list that contains itself renders `[...]`.
    fn repr_inner(&self, value: &TreewalkValue, seen: &mut Vec<usize>) -> TreewalkResult<String> {
        let text = match value {
            TreewalkValue::None => "None".into(),
            TreewalkValue::Ellipsis => "Ellipsis".into(),
            TreewalkValue::NotImplemented => "NotImplemented".into(),
            TreewalkValue::Bool(true) => "True".into(),
            TreewalkValue::Bool(false) => "False".into(),
            TreewalkValue::Int(i) => i.to_string(),
            TreewalkValue::Float(f) => format_float(*f),
            TreewalkValue::Str(s) => quote_str(s),
            TreewalkValue::Bytes(b) => format_bytes(b),
            TreewalkValue::List(list) => {
                if seen.contains(&list.address()) {
                    return Ok("[...]".into());
                }
                let Some(items) = list.try_borrow().map(|items| items.clone()) else {
                    return Ok("[...]".into());
                };
                seen.push(list.address());
                let parts = self.repr_items(&items, seen);
                seen.pop();
                format!("[{}]", parts?.join(", "))
            }
            TreewalkValue::Tuple(tuple) => {
                let parts = self.repr_items(tuple.iter(), seen)?;
                match tuple.fields() {
                    Some(fields) => format!(
                        "{}({})",
                        fields.type_name,
                        format_comma_separated(
                            fields
                                .names
                                .iter()
                                .zip(parts)
                                .map(|(name, part)| format!("{name}={part}"))
                        )
                    ),
                    None if parts.len() == 1 => format!("({},)", parts[0]),
                    None => format!("({})", parts.join(", ")),
                }
            }
            TreewalkValue::Dict(dict) => {
                if seen.contains(&dict.address()) {
                    return Ok("{...}".into());
                }
                let Some(entries) = dict.try_borrow().map(|dict| dict.items()) else {
                    return Ok("{...}".into());
                };
                seen.push(dict.address());
                let parts: TreewalkResult<Vec<String>> = entries
                    .iter()
                    .map(|(key, value)| {
                        Ok(format!(
                            "{}: {}",
                            self.repr_inner(key, seen)?,
                            self.repr_inner(value, seen)?
                        ))
                    })
                    .collect();
                seen.pop();
                format!("{{{}}}", parts?.join(", "))
            }
            TreewalkValue::Set(set) => {
                let items = set.borrow().items();
                if items.is_empty() {
                    "set()".into()
                } else {
                    format!("{{{}}}", self.repr_items(&items, seen)?.join(", "))
                }
            }
            TreewalkValue::Range(range) if range.step == 1 => {
                format!("range({}, {})", range.start, range.stop)
            }
            TreewalkValue::Range(range) => {
                format!("range({}, {}, {})", range.start, range.stop, range.step)
            }
            TreewalkValue::Slice(slice) => {
                let bound = |b: Option<i64>| b.map_or("None".to_string(), |i| i.to_string());
                format!(
                    "slice({}, {}, {})",
                    bound(slice.start),
                    bound(slice.stop),
                    bound(slice.step)
                )
            }
            TreewalkValue::Iterator(iter) => format!("<iterator object at 0x{:x}>", iter.address()),
            TreewalkValue::Function(function) => format!(
                "<function {} at 0x{:x}>",
                function.borrow().name,
                function.address()
            ),
            TreewalkValue::Method(method) => format!(
                "<bound method {} of {}>",
                method.function.borrow().name,
                self.repr_inner(&method.receiver, seen)?
            ),
            TreewalkValue::BuiltinFunction(builtin) => {
                format!("<built-in function {}>", builtin.name)
            }
            TreewalkValue::BuiltinMethod(method) => format!(
                "<built-in method {} of {} object>",
                method.name,
                method.receiver.type_name()
            ),
            TreewalkValue::Type(t) => format!("<class '{}'>", t.name()),
            TreewalkValue::ExceptionType(kind) => format!("<class '{kind}'>"),
            TreewalkValue::Class(class) => format!("<class '__main__.{}'>", class.borrow().name),
            TreewalkValue::Object(object) => {
                let class = object.borrow().class.clone();
                if Class::lookup(&class, "__repr__").is_some() {
                    let result = self.call_method(value, "__repr__", Args::default())?;
                    return self.expect_text(result, "__repr__");
                }
                let (name, kind) = {
                    let class = class.borrow();
                    (class.name.clone(), class.exception_kind)
                };
                match kind {
                    Some(_) => {
                        let args = object.borrow().attrs.get("args");
                        let args = match args {
                            Some(TreewalkValue::Tuple(args)) => args.into_items(),
                            _ => vec![],
                        };
                        format!("{name}({})", self.repr_items(&args, seen)?.join(", "))
                    }
                    None => format!("<__main__.{name} object at 0x{:x}>", object.address()),
                }
            }
            TreewalkValue::Super(proxy) => {
                format!("<super: <class '{}'>>", proxy.class.borrow().name)
            }
            TreewalkValue::Staticmethod(_) => "<staticmethod object>".into(),
            TreewalkValue::Classmethod(_) => "<classmethod object>".into(),
            TreewalkValue::Property(_) => "<property object>".into(),
            TreewalkValue::Module(module) => format!("<module '{}'>", module.borrow().name()),
            TreewalkValue::Exception(exception) => format!(
                "{}({})",
                exception.type_name(),
                self.repr_items(&exception.payload, seen)?.join(", ")
            ),
            TreewalkValue::Stub(_) => self.config().sentinel.clone(),
            TreewalkValue::StringIO(stream) => {
                format!("<_io.StringIO object at 0x{:x}>", stream.address())
            }
        };
        Ok(text)
    }

    /// `format(value, spec)`, which f-string replacement fields also go through.
    pub fn format_value(&self, value: &TreewalkValue, spec: &str) -> TreewalkResult<String> {
        if let TreewalkValue::Object(object) = value {
            let class = object.borrow().class.clone();
            if Class::lookup(&class, "__format__").is_some() {
                let result = self.call_method(
                    value,
                    "__format__",
                    Args::positional(vec![TreewalkValue::str(spec)]),
                )?;
                return self.expect_text(result, "__format__");
            }
        }
        if spec.is_empty() {
            return self.str(value);
        }

        let parsed = FormatSpec::parse(spec).raise(self)?;
        let formatted = match value {
            TreewalkValue::Bool(_) if parsed.kind.is_none() => {
                format_text(&self.str(value)?, &parsed, "bool")
            }
            TreewalkValue::Bool(b) => format_integer(i64::from(*b), &parsed),
            TreewalkValue::Int(i) => format_integer(*i, &parsed),
            TreewalkValue::Float(f) => format_float_spec(*f, &parsed),
            TreewalkValue::Str(s) => format_text(s, &parsed, "str"),
            TreewalkValue::Stub(_) => format_text(&self.config().sentinel, &parsed, "str"),
            other => {
                if parsed.kind.is_some() {
                    Err(Exception::type_error(format!(
                        "unsupported format string passed to {}.__format__",
                        other.type_name()
                    )))
                } else {
                    format_text(&self.str(other)?, &parsed, "str")
                }
            }
        };
        formatted.raise(self)
    }

    /// printf-style formatting, `template % args`.
    pub(crate) fn percent_format(
        &self,
        template: &str,
        args: &TreewalkValue,
    ) -> TreewalkResult<String> {
        let positional = match args {
            TreewalkValue::Tuple(tuple) => tuple.items().to_vec(),
            other => vec![other.clone()],
        };
        let mut positional = positional.into_iter();
        let mut result = String::with_capacity(template.len());
        let mut chars = template.chars().peekable();

        while let Some(c) = chars.next() {
            if c != '%' {
                result.push(c);
                continue;
            }
            if chars.peek() == Some(&'%') {
                chars.next();
                result.push('%');
                continue;
            }

            let mut key = None;
            if chars.peek() == Some(&'(') {
                chars.next();
                let name: String = chars.by_ref().take_while(|c| *c != ')').collect();
                key = Some(name);
            }

            let mut spec = FormatSpec::default();
            while let Some(&flag) = chars.peek() {
                match flag {
                    '-' => spec.align = Some('<'),
                    '0' => spec.zero = true,
                    '+' => spec.sign = Some('+'),
                    ' ' if spec.sign.is_none() => spec.sign = Some(' '),
                    ' ' => {}
                    '#' => spec.alternate = true,
                    _ => break,
                }
                chars.next();
            }
            let mut width = String::new();
            while let Some(&d) = chars.peek().filter(|d| d.is_ascii_digit() || **d == '*') {
                width.push(d);
                chars.next();
            }
            if width == "*" {
                let value = positional.next().unwrap_or(TreewalkValue::None);
                spec.width = usize::try_from(value.as_int().raise(self)?).unwrap_or(0);
            } else if !width.is_empty() {
                spec.width = width.parse().unwrap_or(0);
            }
            if chars.peek() == Some(&'.') {
                chars.next();
                let mut precision = String::new();
                while let Some(&d) = chars.peek().filter(|d| d.is_ascii_digit()) {
                    precision.push(d);
                    chars.next();
                }
                spec.precision = Some(precision.parse().unwrap_or(0));
            }
            let Some(conversion) = chars.next() else {
                return Exception::value_error("incomplete format").raise(self);
            };

            let value = match &key {
                Some(name) => self.get_item(args, &TreewalkValue::str(name.as_str()))?,
                None => match positional.next() {
                    Some(value) => value,
                    None => {
                        return Exception::type_error("not enough arguments for format string")
                            .raise(self)
                    }
                },
            };

            let formatted = match conversion {
                's' => format_text(&self.str(&value)?, &spec, "str"),
                'r' | 'a' => format_text(&self.repr(&value)?, &spec, "str"),
                'd' | 'i' | 'u' => match value {
                    TreewalkValue::Float(f) => format_integer(f.trunc() as i64, &spec),
                    TreewalkValue::Stub(_) => format_integer(1, &spec),
                    other => format_integer(other.as_int().raise(self)?, &spec),
                },
                'x' | 'X' | 'o' | 'c' => {
                    spec.kind = Some(conversion);
                    format_integer(value.as_int().raise(self)?, &spec)
                }
                'f' | 'F' | 'e' | 'E' | 'g' | 'G' => {
                    spec.kind = Some(conversion);
                    let number = match value.as_number() {
                        Some(number) => number.as_f64(),
                        None => {
                            return Exception::type_error(format!(
                                "must be real number, not {}",
                                value.type_name()
                            ))
                            .raise(self)
                        }
                    };
                    format_float_spec(number, &spec)
                }
                other => Err(Exception::value_error(format!(
                    "unsupported format character '{other}'"
                ))),
            };
            result.push_str(&formatted.raise(self)?);
        }

        if key_free_and_unused(args, template) && positional.next().is_some() {
            return Exception::type_error("not all arguments converted during string formatting")
                .raise(self);
        }
        Ok(result)
    }

    /// `template.format(*args, **kwargs)`.
    pub(crate) fn str_format(&self, template: &str, args: &Args) -> TreewalkResult<String> {
        let mut result = String::with_capacity(template.len());
        let mut chars = template.chars().peekable();
        let mut next_index = 0;

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    result.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    result.push('}');
                }
                '}' => {
                    return Exception::value_error("Single '}' encountered in format string")
                        .raise(self)
                }
                '{' => {
                    let mut field = String::new();
                    let mut depth = 1;
                    for c in chars.by_ref() {
                        match c {
                            '{' => depth += 1,
                            '}' => {
                                depth -= 1;
                                if depth == 0 {
                                    break;
                                }
                            }
                            _ => {}
                        }
                        field.push(c);
                    }
                    if depth != 0 {
                        return Exception::value_error("expected '}' before end of string")
                            .raise(self);
                    }
                    result.push_str(&self.replacement_field(&field, args, &mut next_index)?);
                }
                c => result.push(c),
            }
        }
        Ok(result)
    }

    fn replacement_field(
        &self,
        field: &str,
        args: &Args,
        next_index: &mut usize,
    ) -> TreewalkResult<String> {
        let (field, spec) = match field.split_once(':') {
            Some((field, spec)) => (field, spec),
            None => (field, ""),
        };
        let (field, conversion) = match field.split_once('!') {
            Some((field, conversion)) => (field, Some(conversion)),
            None => (field, None),
        };

        let end = field.find(['.', '[']).unwrap_or(field.len());
        let (name, mut rest) = field.split_at(end);
        let mut value = if name.is_empty() {
            let index = *next_index;
            *next_index += 1;
            self.positional_field(args, index)?
        } else if let Ok(index) = name.parse::<usize>() {
            self.positional_field(args, index)?
        } else {
            match args.get_kwarg(name) {
                Some(value) => value.clone(),
                None => return Exception::key_error(TreewalkValue::str(name)).raise(self),
            }
        };

        while !rest.is_empty() {
            if let Some(after) = rest.strip_prefix('.') {
                let end = after.find(['.', '[']).unwrap_or(after.len());
                value = self.get_attr(&value, &after[..end])?;
                rest = &after[end..];
            } else if let Some(after) = rest.strip_prefix('[') {
                let Some(end) = after.find(']') else {
                    return Exception::value_error("Missing ']' in format string").raise(self);
                };
                let key = &after[..end];
                let key = match key.parse::<i64>() {
                    Ok(i) => TreewalkValue::Int(i),
                    Err(_) => TreewalkValue::str(key),
                };
                value = self.get_item(&value, &key)?;
                rest = &after[end + 1..];
            } else {
                return Exception::value_error("Only '.' or '[' may follow ']' in format field specifier")
                    .raise(self);
            }
        }

        let value = match conversion {
            None => value,
            Some("r") | Some("a") => TreewalkValue::Str(self.repr(&value)?),
            Some("s") => TreewalkValue::Str(self.str(&value)?),
            Some(other) => {
                return Exception::value_error(format!(
                    "Unknown conversion specifier {other}"
                ))
                .raise(self)
            }
        };
        let spec = if spec.contains('{') {
            self.str_format(spec, args)?
        } else {
            spec.to_string()
        };
        self.format_value(&value, &spec)
    }

    fn positional_field(&self, args: &Args, index: usize) -> TreewalkResult<TreewalkValue> {
        match args.get_arg(index) {
            Some(value) => Ok(value.clone()),
            None => Exception::index_error(format!(
                "Replacement index {index} out of range for positional args tuple"
            ))
            .raise(self),
        }
    }
}

/// Leftover positional arguments are an error unless the template reads from a mapping.
fn key_free_and_unused(args: &TreewalkValue, template: &str) -> bool {
    !matches!(args, TreewalkValue::Dict(_) | TreewalkValue::Object(_)) || !template.contains("%(")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::treewalk::test_utils::*;

    #[test]
    fn float_repr() {
        assert_eq!(format_float(1.0), "1.0");
        assert_eq!(format_float(0.1), "0.1");
        assert_eq!(format_float(1e20), "1e+20");
        assert_eq!(format_float(1.5e-5), "1.5e-05");
        assert_eq!(format_float(123456.789), "123456.789");
        assert_eq!(format_float(-0.0), "-0.0");
        assert_eq!(format_float(f64::INFINITY), "inf");
    }

    #[test]
    fn spec_parsing() {
        let spec = FormatSpec::parse("*^+#012,.3f").expect("valid spec");
        assert_eq!(spec.fill, Some('*'));
        assert_eq!(spec.align, Some('^'));
        assert_eq!(spec.sign, Some('+'));
        assert!(spec.alternate);
        assert!(spec.zero);
        assert_eq!(spec.width, 12);
        assert_eq!(spec.grouping, Some(','));
        assert_eq!(spec.precision, Some(3));
        assert_eq!(spec.kind, Some('f'));

        assert!(FormatSpec::parse("10.").is_err());
        assert!(FormatSpec::parse("dd").is_err());
    }

    #[test]
    fn format_builtin() {
        assert_eq!(eval("format(42, '05d')"), TreewalkValue::str("00042"));
        assert_eq!(eval("format(-42, '05d')"), TreewalkValue::str("-0042"));
        assert_eq!(eval("format(255, '#x')"), TreewalkValue::str("0xff"));
        assert_eq!(eval("format(1234567, ',')"), TreewalkValue::str("1,234,567"));
        assert_eq!(eval("format(0.5, '.1%')"), TreewalkValue::str("50.0%"));
        assert_eq!(eval("format(12345.678, '.3g')"), TreewalkValue::str("1.23e+04"));
        assert_eq!(eval("format(0.0001, 'g')"), TreewalkValue::str("0.0001"));
        assert_eq!(eval("format('ab', '*^6')"), TreewalkValue::str("**ab**"));
        assert_eq!(eval("format('abcdef', '.3')"), TreewalkValue::str("abc"));
    }

    #[test]
    fn printf_style() {
        assert_eq!(
            eval("'%s==%d.%02d' % ('pkg', 1, 5)"),
            TreewalkValue::str("pkg==1.05")
        );
        assert_eq!(eval("'%-5s|' % 'ab'"), TreewalkValue::str("ab   |"));
        assert_eq!(eval("'%.2f%%' % 99.5"), TreewalkValue::str("99.50%"));
        assert_eq!(
            eval("'%(name)s>=%(version)s' % {'name': 'six', 'version': '1.0'}"),
            TreewalkValue::str("six>=1.0")
        );
        assert_eq!(eval("'%r' % 'x'"), TreewalkValue::str("'x'"));

        let error = run_expect_error("'%s %s' % ('a',)");
        assert_eq!(error.exception.kind, ExceptionKind::TypeError);
        let error = run_expect_error("'%s' % ('a', 'b')");
        assert_eq!(error.exception.kind, ExceptionKind::TypeError);
    }

    #[test]
    fn str_format_method() {
        assert_eq!(
            eval("'{}>={}'.format('numpy', '1.20')"),
            TreewalkValue::str("numpy>=1.20")
        );
        assert_eq!(
            eval("'{1}-{0}'.format('a', 'b')"),
            TreewalkValue::str("b-a")
        );
        assert_eq!(
            eval("'{name}=={v[0]}.{v[1]}'.format(name='pkg', v=(2, 3))"),
            TreewalkValue::str("pkg==2.3")
        );
        assert_eq!(
            eval("'{{literal}} {0!r:>5}'.format('x')"),
            TreewalkValue::str("{literal}   'x'")
        );
        assert_eq!(
            eval("'{0:{1}}'.format(7, '03')"),
            TreewalkValue::str("007")
        );
        assert_eq!(
            run_expect_error("'{missing}'.format()").exception.kind,
            ExceptionKind::KeyError
        );
    }

    #[test]
    fn str_and_repr() {
        assert_eq!(eval("str([1, 'a', None])"), TreewalkValue::str("[1, 'a', None]"));
        assert_eq!(eval("repr((1,))"), TreewalkValue::str("(1,)"));
        assert_eq!(eval("str({'a': 1.5})"), TreewalkValue::str("{'a': 1.5}"));
        assert_eq!(eval("str(set())"), TreewalkValue::str("set()"));
        assert_eq!(eval("str(range(3))"), TreewalkValue::str("range(0, 3)"));
        assert_eq!(eval("repr(ValueError('bad'))"), TreewalkValue::str("ValueError('bad')"));
        assert_eq!(eval("str(KeyError('k'))"), TreewalkValue::str("'k'"));
        assert_eq!(
            eval("str(__import__('sys').version_info)"),
            TreewalkValue::str(
                "sys.version_info(major=3, minor=11, micro=0, releaselevel='final', serial=0)"
            )
        );

        let interpreter = run("a = [1]\na.append(a)\ntext = str(a)\n");
        assert_eq!(read(&interpreter, "text"), TreewalkValue::str("[1, [...]]"));
    }

    #[test]
    fn user_str_and_repr() {
        let interpreter = run(r#"
class Req:
    def __init__(self, name):
        self.name = name
    def __str__(self):
        return self.name + ">=1"
    def __repr__(self):
        return "Req(" + repr(self.name) + ")"

r = Req("six")
as_str = str(r)
as_repr = repr([r])
in_fstring = f"{r}"
"#);
        assert_eq!(read(&interpreter, "as_str"), TreewalkValue::str("six>=1"));
        assert_eq!(read(&interpreter, "as_repr"), TreewalkValue::str("[Req('six')]"));
        assert_eq!(read(&interpreter, "in_fstring"), TreewalkValue::str("six>=1"));
    }

    #[test]
    fn stubs_render_as_the_sentinel() {
        assert_eq!(
            eval("str(__sandbox_stub__('numpy').__version__)"),
            TreewalkValue::str("FIXME")
        );
        assert_eq!(
            eval("'numpy>=' + f\"{__sandbox_stub__('v')}\""),
            TreewalkValue::str("numpy>=FIXME")
        );
        assert_eq!(
            eval("'%s' % __sandbox_stub__('v')"),
            TreewalkValue::str("FIXME")
        );
    }
}
