use std::mem;

use crate::{
    domain::Text,
    lexer::Lexer,
    parser::{
        types::{Expr, ExprFormat, FStringPart, FormatOption},
        Parser, ParserError,
    },
};

impl Parser<'_> {
    /// Split an f-string body into literal text and replacement fields. `{{` and `}}` are
    /// escapes; each field is `{expr[=][!conversion][:spec]}`.
    pub(super) fn parse_fstring_body(
        &self,
        body: &str,
        line: usize,
    ) -> Result<Vec<FStringPart>, ParserError> {
        let chars: Vec<char> = body.chars().collect();
        let mut parts = vec![];
        let mut literal = String::new();
        let mut i = 0;

        while i < chars.len() {
            match chars[i] {
                '{' if chars.get(i + 1) == Some(&'{') => {
                    literal.push('{');
                    i += 2;
                }
                '}' if chars.get(i + 1) == Some(&'}') => {
                    literal.push('}');
                    i += 2;
                }
                '{' => {
                    let field = ReplacementField::scan(&chars, i + 1, line)?;
                    if let Some(echo) = &field.echo {
                        literal.push_str(echo);
                    }
                    if !literal.is_empty() {
                        parts.push(FStringPart::String(mem::take(&mut literal)));
                    }
                    parts.push(FStringPart::Expr(ExprFormat {
                        expr: Box::new(parse_field_expr(&field.expr, line)?),
                        format: field.format,
                        spec: field.spec,
                    }));
                    i = field.end;
                }
                '}' => {
                    return Err(ParserError::syntax_error(
                        "f-string: single '}' is not allowed",
                        line,
                    ));
                }
                c => {
                    literal.push(c);
                    i += 1;
                }
            }
        }

        if !literal.is_empty() {
            parts.push(FStringPart::String(literal));
        }
        Ok(parts)
    }
}

struct ReplacementField {
    expr: String,
    /// The `expr=` text echoed before the value by the self-documenting form.
    echo: Option<String>,
    format: FormatOption,
    spec: Option<String>,
    /// Index just past the closing brace.
    end: usize,
}

impl ReplacementField {
    fn scan(chars: &[char], start: usize, line: usize) -> Result<Self, ParserError> {
        let error = |message: &str| ParserError::syntax_error(format!("f-string: {message}"), line);

        let mut depth = 0usize;
        let mut quote: Option<char> = None;
        let mut i = start;
        let expr_end = loop {
            let c = *chars.get(i).ok_or_else(|| error("expecting '}'"))?;
            match (quote, c) {
                (Some(q), c) if c == q => quote = None,
                (Some(_), _) => {}
                (None, '\'' | '"') => quote = Some(c),
                (None, '(' | '[' | '{') => depth += 1,
                (None, ')' | ']') => depth = depth.saturating_sub(1),
                (None, '}') if depth > 0 => depth -= 1,
                (None, '}') => break i,
                (None, '!') if depth == 0 && chars.get(i + 1) != Some(&'=') => break i,
                (None, ':') if depth == 0 => break i,
                _ => {}
            }
            i += 1;
        };

        let mut expr: String = chars[start..expr_end].iter().collect();
        let mut echo = None;
        let trimmed = expr.trim_end();
        if trimmed.ends_with('=')
            && !["==", "!=", "<=", ">="]
                .iter()
                .any(|op| trimmed.ends_with(op))
        {
            echo = Some(expr.clone());
            expr = trimmed[..trimmed.len() - 1].to_string();
        }
        if expr.trim().is_empty() {
            return Err(error("empty expression not allowed"));
        }

        let mut i = expr_end;
        let mut format = if echo.is_some() {
            FormatOption::Repr
        } else {
            FormatOption::Str
        };
        if chars[i] == '!' {
            format = match chars.get(i + 1) {
                Some('r') => FormatOption::Repr,
                Some('s') => FormatOption::Str,
                Some('a') => FormatOption::Ascii,
                _ => return Err(error("invalid conversion character")),
            };
            i += 2;
        }

        let mut spec = None;
        if chars.get(i) == Some(&':') {
            let spec_start = i + 1;
            let mut depth = 0usize;
            i = spec_start;
            loop {
                match chars.get(i) {
                    None => return Err(error("expecting '}'")),
                    Some('{') => depth += 1,
                    Some('}') if depth > 0 => depth -= 1,
                    Some('}') => break,
                    _ => {}
                }
                i += 1;
            }
            spec = Some(chars[spec_start..i].iter().collect());
        }

        if chars.get(i) != Some(&'}') {
            return Err(error("expecting '}'"));
        }

        Ok(Self {
            expr,
            echo,
            format,
            spec,
            end: i + 1,
        })
    }
}

/// Parse the text of one replacement field. It is wrapped in parentheses so that line breaks and
/// leading whitespace inside the braces carry no layout meaning.
fn parse_field_expr(text: &str, line: usize) -> Result<Expr, ParserError> {
    let wrap = |e: ParserError| ParserError::syntax_error(format!("f-string: {}", e.message()), line);

    let source = format!("({})", text.trim());
    let tokens = Lexer::new(&Text::new(&source))
        .tokenize()
        .map_err(|e| wrap(e.into()))?;

    let mut parser = Parser::new(&tokens);
    let expr = parser.parse_expr().map_err(wrap)?;
    parser.consume_newlines();
    if !parser.is_finished() {
        return Err(ParserError::syntax_error(
            "f-string: expecting '}'",
            line,
        ));
    }
    Ok(expr)
}
