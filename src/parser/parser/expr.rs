use crate::{
    core::{log, LogLevel},
    lexer::Token,
    parser::{
        types::{
            BinOp, CallArg, CallArgs, CompareOp, DictOperation, Expr, FStringPart, ForClause,
            LogicalOp, SliceParams, UnaryOp,
        },
        Parser, ParserError,
    },
};

impl Parser<'_> {
    /// Parse an expression in a context where tuples may be expected. A good option if you're not
    /// sure. By tuples here, we mean those that are not indicated by parentheses (those are
    /// handled in `parse_tuple`).
    ///
    /// ```python
    /// 4, 5
    /// a = 4, 5
    /// a = 1,
    /// ```
    pub fn parse_expr(&mut self) -> Result<Expr, ParserError> {
        log(LogLevel::Trace, || "parse_expr".to_string());
        if self.current_token() == &Token::Yield {
            return self.parse_yield();
        }

        let left = self.parse_star_or_simple_expr()?;

        if self.current_token() != &Token::Comma {
            return match left {
                Expr::Starred(_) => Err(self.syntax_error("can't use starred expression here")),
                _ => Ok(left),
            };
        }

        let mut items = vec![left];
        while self.consume_optional(&Token::Comma) {
            // A trailing comma, most often used for a tuple with a single element.
            if self.ends_expression_list() {
                break;
            }
            items.push(self.parse_star_or_simple_expr()?);
        }

        Ok(Expr::Tuple(items))
    }

    /// Parse an expression where open tuples are not expected. If you need to support this in a
    /// given context (i.e. a = 4, 5), try `parse_expr`.
    pub fn parse_simple_expr(&mut self) -> Result<Expr, ParserError> {
        log(LogLevel::Trace, || "parse_simple_expr".to_string());
        match self.current_token() {
            Token::Lambda => self.parse_lambda(),
            Token::Identifier(_) if self.tokens.peek(1) == &Token::Walrus => {
                let target = self.parse_identifier()?;
                self.consume(&Token::Walrus)?;
                let value = self.parse_simple_expr()?;
                Ok(Expr::NamedExpr {
                    target,
                    value: Box::new(value),
                })
            }
            _ => self.parse_ternary_expr(),
        }
    }

    /// A single assignment target, as found after `as` or inside a target list.
    pub fn parse_target(&mut self) -> Result<Expr, ParserError> {
        let target = if self.consume_optional(&Token::Asterisk) {
            Expr::Starred(Box::new(self.parse_bitwise_or()?))
        } else {
            self.parse_bitwise_or()?
        };

        if target.is_assignable() {
            Ok(target)
        } else {
            Err(self.syntax_error("cannot assign to expression"))
        }
    }

    /// The comma-separated targets of a `for` loop or comprehension, which stop before `in`.
    pub fn parse_target_list(&mut self) -> Result<Expr, ParserError> {
        let first = self.parse_target()?;
        if self.current_token() != &Token::Comma {
            return Ok(first);
        }

        let mut items = vec![first];
        while self.consume_optional(&Token::Comma) {
            if self.current_token() == &Token::In {
                break;
            }
            items.push(self.parse_target()?);
        }
        Ok(Expr::Tuple(items))
    }

    fn ends_expression_list(&self) -> bool {
        self.end_of_statement()
            || matches!(
                self.current_token(),
                Token::Assign
                    | Token::RParen
                    | Token::RBracket
                    | Token::RBrace
                    | Token::Colon
                    | Token::In
            )
            || self.current_token().is_compound_assign()
    }

    fn parse_star_or_simple_expr(&mut self) -> Result<Expr, ParserError> {
        if self.consume_optional(&Token::Asterisk) {
            let inner = self.parse_bitwise_or()?;
            Ok(Expr::Starred(Box::new(inner)))
        } else {
            self.parse_simple_expr()
        }
    }

    fn parse_yield(&mut self) -> Result<Expr, ParserError> {
        self.consume(&Token::Yield)?;

        if self.consume_optional(&Token::From) {
            let expr = self.parse_simple_expr()?;
            return Ok(Expr::YieldFrom(Box::new(expr)));
        }

        // The [`Token::RParen`] can be found on parenthesized yields.
        if self.end_of_statement() || self.current_token() == &Token::RParen {
            Ok(Expr::Yield(None))
        } else {
            let expr = self.parse_expr()?;
            Ok(Expr::Yield(Some(Box::new(expr))))
        }
    }

    /// Implements the Python precedence order in reverse call stack order, meaning the operators
    /// evaluated last will be detected first during this recursive descent.
    ///
    /// - Ternary expression (inline-if) - `parse_ternary_expr`
    /// - Boolean OR, AND, NOT - `parse_or_test`, `parse_and_test`, `parse_not_test`
    /// - Comparisons, membership and identity - `parse_comparison`
    /// - Bitwise OR, XOR, AND - `parse_bitwise_or`, `parse_bitwise_xor`, `parse_bitwise_and`
    /// - Shifts - `parse_bitwise_shift`
    /// - Addition, Subtraction - `parse_add_sub`
    /// - Multiplication, Division, Modulo, MatMul - `parse_term`
    /// - Unary plus, minus, invert - `parse_factor`
    /// - Exponentiation - `parse_exponentiation`
    /// - Member access, index access, calls - `parse_access_operations`
    /// - Literals, identifiers, displays - `parse_atom`
    fn parse_ternary_expr(&mut self) -> Result<Expr, ParserError> {
        log(LogLevel::Trace, || "parse_ternary_expr".to_string());
        let if_value = self.parse_or_test()?;

        if self.consume_optional(&Token::If) {
            let condition = self.parse_or_test()?;
            self.consume(&Token::Else)?;
            let else_value = self.parse_simple_expr()?;

            return Ok(Expr::TernaryOp {
                condition: Box::new(condition),
                if_value: Box::new(if_value),
                else_value: Box::new(else_value),
            });
        }

        Ok(if_value)
    }

    fn parse_or_test(&mut self) -> Result<Expr, ParserError> {
        let mut left = self.parse_and_test()?;
        while self.consume_optional(&Token::Or) {
            let right = self.parse_and_test()?;
            left = Expr::LogicalOperation {
                left: Box::new(left),
                op: LogicalOp::Or,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_and_test(&mut self) -> Result<Expr, ParserError> {
        let mut left = self.parse_not_test()?;
        while self.consume_optional(&Token::And) {
            let right = self.parse_not_test()?;
            left = Expr::LogicalOperation {
                left: Box::new(left),
                op: LogicalOp::And,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_not_test(&mut self) -> Result<Expr, ParserError> {
        if self.consume_optional(&Token::Not) {
            let right = self.parse_not_test()?;
            return Ok(Expr::UnaryOperation {
                op: UnaryOp::Not,
                right: Box::new(right),
            });
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParserError> {
        log(LogLevel::Trace, || "parse_comparison".to_string());
        let left = self.parse_bitwise_or()?;

        let mut cmp_ops = vec![];
        loop {
            // Handle two tokens to produce one `CompareOp::NotIn` or `CompareOp::IsNot`.
            let op = if self.tokens.peek_ahead_contains(&[Token::Not, Token::In]) {
                self.consume(&Token::Not)?;
                self.consume(&Token::In)?;
                CompareOp::NotIn
            } else if self.tokens.peek_ahead_contains(&[Token::Is, Token::Not]) {
                self.consume(&Token::Is)?;
                self.consume(&Token::Not)?;
                CompareOp::IsNot
            } else if let Ok(op) = CompareOp::try_from(self.current_token()) {
                self.consume_current();
                op
            } else {
                break;
            };

            // Since we are building a flat chain of compare ops, we call the next level down.
            let right = self.parse_bitwise_or()?;
            cmp_ops.push((op, right));
        }

        if cmp_ops.is_empty() {
            Ok(left)
        } else {
            Ok(Expr::ComparisonChain {
                left: Box::new(left),
                ops: cmp_ops,
            })
        }
    }

    /// Left-associative binary operators at one precedence level.
    fn parse_binary_level<F>(
        &mut self,
        operators: &[Token],
        mut next: F,
    ) -> Result<Expr, ParserError>
    where
        F: FnMut(&mut Self) -> Result<Expr, ParserError>,
    {
        let mut left = next(self)?;

        while operators.contains(self.current_token()) {
            let op = BinOp::try_from(self.current_token()).map_err(|_| self.unexpected())?;
            self.consume_current();
            let right = next(self)?;
            left = Expr::BinaryOperation {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    fn parse_bitwise_or(&mut self) -> Result<Expr, ParserError> {
        self.parse_binary_level(&[Token::BitwiseOr], Self::parse_bitwise_xor)
    }

    fn parse_bitwise_xor(&mut self) -> Result<Expr, ParserError> {
        self.parse_binary_level(&[Token::BitwiseXor], Self::parse_bitwise_and)
    }

    fn parse_bitwise_and(&mut self) -> Result<Expr, ParserError> {
        self.parse_binary_level(&[Token::BitwiseAnd], Self::parse_bitwise_shift)
    }

    fn parse_bitwise_shift(&mut self) -> Result<Expr, ParserError> {
        self.parse_binary_level(&[Token::LeftShift, Token::RightShift], Self::parse_add_sub)
    }

    fn parse_add_sub(&mut self) -> Result<Expr, ParserError> {
        self.parse_binary_level(&[Token::Plus, Token::Minus], Self::parse_term)
    }

    fn parse_term(&mut self) -> Result<Expr, ParserError> {
        self.parse_binary_level(
            &[
                Token::Asterisk,
                Token::Slash,
                Token::DoubleSlash,
                Token::Modulo,
                Token::AtSign,
            ],
            Self::parse_factor,
        )
    }

    fn parse_factor(&mut self) -> Result<Expr, ParserError> {
        let op = match self.current_token() {
            Token::Minus => UnaryOp::Minus,
            Token::Plus => UnaryOp::Plus,
            Token::BitwiseNot => UnaryOp::BitwiseNot,
            _ => return self.parse_exponentiation(),
        };
        self.consume_current();

        // Fold negative literals, unless the literal is the base of a power: -2 ** 2 == -(2 ** 2)
        if op == UnaryOp::Minus && self.tokens.peek(1) != &Token::DoubleAsterisk {
            match *self.current_token() {
                Token::Integer(i) => {
                    self.consume_current();
                    return Ok(Expr::Integer(-i));
                }
                Token::FloatingPoint(f) => {
                    self.consume_current();
                    return Ok(Expr::Float(-f));
                }
                _ => {}
            }
        }

        let right = self.parse_factor()?;
        Ok(Expr::UnaryOperation {
            op,
            right: Box::new(right),
        })
    }

    /// This is recursive to the right to create a right-associativity binary operator.
    fn parse_exponentiation(&mut self) -> Result<Expr, ParserError> {
        let left = self.parse_access_operations()?;

        if self.consume_optional(&Token::DoubleAsterisk) {
            let right = self.parse_factor()?;
            return Ok(Expr::BinaryOperation {
                left: Box::new(left),
                op: BinOp::Expo,
                right: Box::new(right),
            });
        }

        Ok(left)
    }

    fn parse_access_operations(&mut self) -> Result<Expr, ParserError> {
        log(LogLevel::Trace, || "parse_access_operations".to_string());
        let mut left = self.parse_atom()?;

        loop {
            left = match self.current_token() {
                Token::Dot => self.parse_member_access(left)?,
                Token::LBracket => self.parse_index_access(left)?,
                Token::LParen => {
                    let args = self.parse_function_call_args()?;
                    Expr::call(left, args)
                }
                _ => break,
            };
        }

        Ok(left)
    }

    fn parse_member_access(&mut self, left: Expr) -> Result<Expr, ParserError> {
        self.consume(&Token::Dot)?;
        let field = self.parse_identifier()?;

        Ok(Expr::MemberAccess {
            object: Box::new(left),
            field,
        })
    }

    fn parse_index_access(&mut self, left: Expr) -> Result<Expr, ParserError> {
        self.consume(&Token::LBracket)?;

        let first = self.parse_subscript_item()?;
        let expr = match first {
            SubscriptItem::Slice(params) if self.current_token() == &Token::RBracket => {
                Expr::SliceOperation {
                    object: Box::new(left),
                    params: Box::new(params),
                }
            }
            SubscriptItem::Index(index) if self.current_token() == &Token::RBracket => {
                Expr::IndexAccess {
                    object: Box::new(left),
                    index: Box::new(index),
                }
            }
            SubscriptItem::Index(index) => {
                // a[1, 2] indexes with a tuple.
                let mut items = vec![index];
                while self.consume_optional(&Token::Comma) {
                    if self.current_token() == &Token::RBracket {
                        break;
                    }
                    match self.parse_subscript_item()? {
                        SubscriptItem::Index(item) => items.push(item),
                        SubscriptItem::Slice(_) => {
                            return Err(self.syntax_error("extended slices are not supported"));
                        }
                    }
                }
                Expr::IndexAccess {
                    object: Box::new(left),
                    index: Box::new(Expr::Tuple(items)),
                }
            }
            SubscriptItem::Slice(_) => {
                return Err(self.syntax_error("extended slices are not supported"));
            }
        };

        self.consume(&Token::RBracket)?;
        Ok(expr)
    }

    fn parse_subscript_item(&mut self) -> Result<SubscriptItem, ParserError> {
        let start = if self.current_token() == &Token::Colon {
            None
        } else {
            let expr = self.parse_star_or_simple_expr()?;
            if self.current_token() != &Token::Colon {
                return Ok(SubscriptItem::Index(expr));
            }
            Some(expr)
        };

        self.consume(&Token::Colon)?;
        let stop = self.parse_optional_slice_bound()?;
        let step = if self.consume_optional(&Token::Colon) {
            self.parse_optional_slice_bound()?
        } else {
            None
        };

        Ok(SubscriptItem::Slice(SliceParams { start, stop, step }))
    }

    fn parse_optional_slice_bound(&mut self) -> Result<Option<Expr>, ParserError> {
        if matches!(
            self.current_token(),
            Token::Colon | Token::RBracket | Token::Comma
        ) {
            Ok(None)
        } else {
            Ok(Some(self.parse_simple_expr()?))
        }
    }

    fn parse_atom(&mut self) -> Result<Expr, ParserError> {
        log(LogLevel::Trace, || {
            format!("parse_atom: {:?}", self.current_token())
        });
        let expr = match self.current_token().clone() {
            Token::None => Expr::None,
            Token::Ellipsis => Expr::Ellipsis,
            Token::Integer(i) => Expr::Integer(i),
            Token::FloatingPoint(f) => Expr::Float(f),
            Token::BooleanLiteral(b) => Expr::Boolean(b),
            Token::Identifier(name) => Expr::Variable(name),
            Token::StringLiteral(_) | Token::FStringLiteral(_) | Token::BytesLiteral(_) => {
                return self.parse_string_literals();
            }
            Token::LParen => return self.parse_tuple(),
            Token::LBracket => return self.parse_list(),
            Token::LBrace => return self.parse_brace_display(),
            Token::Await => {
                return Err(self.syntax_error("'await' outside async function"));
            }
            _ => return Err(self.unexpected()),
        };
        self.consume_current();
        Ok(expr)
    }

    /// Adjacent literals are concatenated at parse time, so `"a" f"{b}"` becomes one f-string.
    fn parse_string_literals(&mut self) -> Result<Expr, ParserError> {
        if let Token::BytesLiteral(_) = self.current_token() {
            let mut bytes = vec![];
            while let Token::BytesLiteral(b) = self.current_token() {
                bytes.extend_from_slice(b);
                self.consume_current();
            }
            if self.current_token().is_string() {
                return Err(self.syntax_error("cannot mix bytes and nonbytes literals"));
            }
            return Ok(Expr::BytesLiteral(bytes));
        }

        let mut parts = vec![];
        let mut is_fstring = false;
        while self.current_token().is_string() {
            let line = self.line_number();
            match self.current_token().clone() {
                Token::StringLiteral(s) => {
                    parts.push(FStringPart::String(s));
                }
                Token::FStringLiteral(body) => {
                    is_fstring = true;
                    parts.extend(self.parse_fstring_body(&body, line)?);
                }
                _ => unreachable!("is_string only matches string tokens"),
            }
            self.consume_current();
        }

        if matches!(self.current_token(), Token::BytesLiteral(_)) {
            return Err(self.syntax_error("cannot mix bytes and nonbytes literals"));
        }

        if !is_fstring {
            let joined = parts
                .into_iter()
                .map(|part| match part {
                    FStringPart::String(s) => s,
                    FStringPart::Expr(_) => String::new(),
                })
                .collect();
            return Ok(Expr::StringLiteral(joined));
        }

        Ok(Expr::FString(merge_literal_parts(parts)))
    }

    fn parse_lambda(&mut self) -> Result<Expr, ParserError> {
        self.consume(&Token::Lambda)?;
        let args = self.parse_function_def_args(&Token::Colon)?;
        self.consume(&Token::Colon)?;
        let expr = self.parse_simple_expr()?;

        Ok(Expr::Lambda {
            args,
            expr: Box::new(expr),
        })
    }

    fn parse_list(&mut self) -> Result<Expr, ParserError> {
        log(LogLevel::Trace, || "parse_list".to_string());
        self.consume(&Token::LBracket)?;

        if self.consume_optional(&Token::RBracket) {
            return Ok(Expr::List(vec![]));
        }

        let first = self.parse_star_or_simple_expr()?;
        if self.current_token() == &Token::For {
            let clauses = self.parse_comprehension_clauses()?;
            self.consume(&Token::RBracket)?;
            return Ok(Expr::ListComprehension {
                body: Box::new(first),
                clauses,
            });
        }

        let items = self.parse_display_items(first, &Token::RBracket)?;
        self.consume(&Token::RBracket)?;
        Ok(Expr::List(items))
    }

    /// Single elements without a comma will be returned as is, everything else will be wrapped in
    /// `Expr::Tuple`.
    ///
    /// For example:
    ///
    /// (4) => int(4)
    /// (4,) => Expr::Tuple(vec!\[int(4)\])
    fn parse_tuple(&mut self) -> Result<Expr, ParserError> {
        log(LogLevel::Trace, || "parse_tuple".to_string());
        self.consume(&Token::LParen)?;

        if self.consume_optional(&Token::RParen) {
            return Ok(Expr::Tuple(vec![]));
        }

        if self.current_token() == &Token::Yield {
            let expr = self.parse_yield()?;
            self.consume(&Token::RParen)?;
            return Ok(expr);
        }

        let first = self.parse_star_or_simple_expr()?;

        let expr = match self.current_token() {
            Token::For => {
                let clauses = self.parse_comprehension_clauses()?;
                Expr::GeneratorComprehension {
                    body: Box::new(first),
                    clauses,
                }
            }
            Token::Comma => Expr::Tuple(self.parse_display_items(first, &Token::RParen)?),
            _ => match first {
                Expr::Starred(_) => {
                    return Err(self.syntax_error("can't use starred expression here"));
                }
                _ => first,
            },
        };

        self.consume(&Token::RParen)?;
        Ok(expr)
    }

    /// The remaining comma-separated items of a list, tuple or set display.
    fn parse_display_items(&mut self, first: Expr, close: &Token) -> Result<Vec<Expr>, ParserError> {
        let mut items = vec![first];
        while self.consume_optional(&Token::Comma) {
            if self.current_token() == close {
                break;
            }
            items.push(self.parse_star_or_simple_expr()?);
        }
        Ok(items)
    }

    /// A `{` starts a dict, a set, or a comprehension of either.
    fn parse_brace_display(&mut self) -> Result<Expr, ParserError> {
        self.consume(&Token::LBrace)?;

        if self.consume_optional(&Token::RBrace) {
            return Ok(Expr::Dict(vec![]));
        }

        if self.consume_optional(&Token::DoubleAsterisk) {
            let first = DictOperation::Unpack(self.parse_bitwise_or()?);
            return self.parse_dict_rest(first);
        }

        let key = self.parse_star_or_simple_expr()?;

        if !matches!(key, Expr::Starred(_)) && self.consume_optional(&Token::Colon) {
            let value = self.parse_simple_expr()?;
            if self.current_token() == &Token::For {
                let clauses = self.parse_comprehension_clauses()?;
                self.consume(&Token::RBrace)?;
                return Ok(Expr::DictComprehension {
                    key_body: Box::new(key),
                    value_body: Box::new(value),
                    clauses,
                });
            }
            return self.parse_dict_rest(DictOperation::Pair(key, value));
        }

        if self.current_token() == &Token::For {
            let clauses = self.parse_comprehension_clauses()?;
            self.consume(&Token::RBrace)?;
            return Ok(Expr::SetComprehension {
                body: Box::new(key),
                clauses,
            });
        }

        let items = self.parse_display_items(key, &Token::RBrace)?;
        self.consume(&Token::RBrace)?;
        Ok(Expr::Set(items))
    }

    fn parse_dict_rest(&mut self, first: DictOperation) -> Result<Expr, ParserError> {
        let mut ops = vec![first];
        while self.consume_optional(&Token::Comma) {
            if self.current_token() == &Token::RBrace {
                break;
            }
            if self.consume_optional(&Token::DoubleAsterisk) {
                ops.push(DictOperation::Unpack(self.parse_bitwise_or()?));
                continue;
            }
            let key = self.parse_simple_expr()?;
            self.consume(&Token::Colon)?;
            let value = self.parse_simple_expr()?;
            ops.push(DictOperation::Pair(key, value));
        }
        self.consume(&Token::RBrace)?;
        Ok(Expr::Dict(ops))
    }

    /// Arguments are kept in source order. A lone generator expression may be passed without its
    /// own parentheses, as in `any(x for x in y)`.
    pub fn parse_function_call_args(&mut self) -> Result<CallArgs, ParserError> {
        self.consume(&Token::LParen)?;

        let mut args = Vec::new();
        while self.current_token() != &Token::RParen {
            let arg = if self.consume_optional(&Token::Asterisk) {
                CallArg::Unpack(self.parse_simple_expr()?)
            } else if self.consume_optional(&Token::DoubleAsterisk) {
                CallArg::KwargsUnpack(self.parse_simple_expr()?)
            } else if matches!(self.current_token(), Token::Identifier(_))
                && self.tokens.peek(1) == &Token::Assign
            {
                let arg = self.parse_identifier()?;
                self.consume(&Token::Assign)?;
                CallArg::Keyword {
                    arg,
                    expr: self.parse_simple_expr()?,
                }
            } else {
                let expr = self.parse_simple_expr()?;
                if self.current_token() == &Token::For {
                    let clauses = self.parse_comprehension_clauses()?;
                    CallArg::Positional(Expr::GeneratorComprehension {
                        body: Box::new(expr),
                        clauses,
                    })
                } else {
                    CallArg::Positional(expr)
                }
            };

            if matches!(arg, CallArg::Positional(_) | CallArg::Unpack(_))
                && args
                    .iter()
                    .any(|a| matches!(a, CallArg::KwargsUnpack(_)))
            {
                return Err(self.syntax_error(
                    "positional argument follows keyword argument unpacking",
                ));
            }
            if matches!(arg, CallArg::Positional(_))
                && args.iter().any(|a| matches!(a, CallArg::Keyword { .. }))
            {
                return Err(self.syntax_error("positional argument follows keyword argument"));
            }
            args.push(arg);

            if !self.consume_optional(&Token::Comma) {
                break;
            }
        }

        self.consume(&Token::RParen)?;
        Ok(CallArgs { args })
    }

    fn parse_comprehension_clauses(&mut self) -> Result<Vec<ForClause>, ParserError> {
        let mut clauses = vec![];
        while self.current_token() == &Token::For {
            clauses.push(self.parse_comprehension_clause()?);
        }
        Ok(clauses)
    }

    fn parse_comprehension_clause(&mut self) -> Result<ForClause, ParserError> {
        self.consume(&Token::For)?;
        let target = self.parse_target_list()?;
        self.consume(&Token::In)?;

        // We do not use `parse_simple_expr` here because it can think that an expression of the
        // form `a if True` is the start of a ternary operation and expect an `else` token next.
        let iterable = self.parse_or_test()?;

        let mut conditions = vec![];
        while self.consume_optional(&Token::If) {
            conditions.push(self.parse_or_test()?);
        }

        Ok(ForClause {
            target,
            iterable,
            conditions,
        })
    }
}

enum SubscriptItem {
    Index(Expr),
    Slice(SliceParams),
}

/// Join neighbouring literal parts so `"a" f"b{c}"` yields `["ab", {c}]`.
fn merge_literal_parts(parts: Vec<FStringPart>) -> Vec<FStringPart> {
    let mut merged: Vec<FStringPart> = vec![];
    for part in parts {
        match (merged.last_mut(), part) {
            (Some(FStringPart::String(prev)), FStringPart::String(s)) => prev.push_str(&s),
            (_, FStringPart::String(s)) if s.is_empty() => {}
            (_, part) => merged.push(part),
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::parser::{
        test_utils::*,
        types::{ExprFormat, FormatOption, Params},
    };

    #[test]
    fn precedence() {
        assert_expr_eq!(
            "1 + 2 * 3",
            bin_op!(int!(1), Add, bin_op!(int!(2), Mul, int!(3)))
        );
        assert_expr_eq!(
            "a or b and not c",
            Expr::LogicalOperation {
                left: Box::new(var!("a")),
                op: LogicalOp::Or,
                right: Box::new(Expr::LogicalOperation {
                    left: Box::new(var!("b")),
                    op: LogicalOp::And,
                    right: Box::new(Expr::UnaryOperation {
                        op: UnaryOp::Not,
                        right: Box::new(var!("c")),
                    }),
                }),
            }
        );
        assert_expr_eq!(
            "x | y & z",
            bin_op!(var!("x"), BitwiseOr, bin_op!(var!("y"), BitwiseAnd, var!("z")))
        );
    }

    #[test]
    fn exponent_binds_tighter_than_unary_minus() {
        assert_expr_eq!(
            "-2 ** 2",
            Expr::UnaryOperation {
                op: UnaryOp::Minus,
                right: Box::new(bin_op!(int!(2), Expo, int!(2))),
            }
        );
        assert_expr_eq!("-2", int!(-2));
        assert_expr_eq!(
            "2 ** 3 ** 2",
            bin_op!(int!(2), Expo, bin_op!(int!(3), Expo, int!(2)))
        );
    }

    #[test]
    fn comparison_chain() {
        assert_expr_eq!(
            "a < b <= c not in d is not e",
            Expr::ComparisonChain {
                left: Box::new(var!("a")),
                ops: vec![
                    (CompareOp::LessThan, var!("b")),
                    (CompareOp::LessThanOrEqual, var!("c")),
                    (CompareOp::NotIn, var!("d")),
                    (CompareOp::IsNot, var!("e")),
                ],
            }
        );
    }

    #[test]
    fn ternary_and_lambda() {
        assert_expr_eq!(
            "a if cond else b",
            Expr::TernaryOp {
                condition: Box::new(var!("cond")),
                if_value: Box::new(var!("a")),
                else_value: Box::new(var!("b")),
            }
        );
        assert_expr_eq!(
            "lambda: 1",
            Expr::Lambda {
                args: Params::default(),
                expr: Box::new(int!(1)),
            }
        );
    }

    #[test]
    fn call_args_keep_source_order() {
        assert_expr_eq!(
            "setup(name, *extra, install_requires=reqs, **kwargs)",
            call!(
                var!("setup"),
                CallArgs {
                    args: vec![
                        CallArg::Positional(var!("name")),
                        CallArg::Unpack(var!("extra")),
                        CallArg::Keyword {
                            arg: ident!("install_requires"),
                            expr: var!("reqs"),
                        },
                        CallArg::KwargsUnpack(var!("kwargs")),
                    ],
                }
            )
        );
    }

    #[test]
    fn positional_after_keyword() {
        assert!(matches!(
            expect_error!("f(a=1, b)"),
            ParserError::SyntaxError { .. }
        ));
    }

    #[test]
    fn generator_argument() {
        let expr = parse_expr!("any(x for x in y)");
        let Expr::FunctionCall { args, .. } = expr else {
            panic!("expected a call");
        };
        assert!(matches!(
            args.args[0],
            CallArg::Positional(Expr::GeneratorComprehension { .. })
        ));
    }

    #[test]
    fn access_chain() {
        assert_expr_eq!(
            "os.path.join(here, 'README')",
            call!(
                member_access!(member_access!(var!("os"), "path"), "join"),
                CallArgs::positional(vec![var!("here"), str!("README")])
            )
        );
    }

    #[test]
    fn slices_and_indexes() {
        assert_expr_eq!(
            "a[1:]",
            Expr::SliceOperation {
                object: Box::new(var!("a")),
                params: Box::new(SliceParams {
                    start: Some(int!(1)),
                    stop: None,
                    step: None,
                }),
            }
        );
        assert_expr_eq!(
            "a[::-1]",
            Expr::SliceOperation {
                object: Box::new(var!("a")),
                params: Box::new(SliceParams {
                    start: None,
                    stop: None,
                    step: Some(int!(-1)),
                }),
            }
        );
        assert_expr_eq!(
            "a[1, 2]",
            Expr::IndexAccess {
                object: Box::new(var!("a")),
                index: Box::new(tuple![int!(1), int!(2)]),
            }
        );
    }

    #[test]
    fn displays() {
        assert_expr_eq!("()", tuple![]);
        assert_expr_eq!("(1,)", tuple![int!(1)]);
        assert_expr_eq!("(1)", int!(1));
        assert_expr_eq!("[1, 2,]", list![int!(1), int!(2)]);
        assert_expr_eq!("{}", Expr::Dict(vec![]));
        assert_expr_eq!("{1, 2}", Expr::Set(vec![int!(1), int!(2)]));
        assert_expr_eq!(
            "{'a': 1, **extra}",
            Expr::Dict(vec![
                DictOperation::Pair(str!("a"), int!(1)),
                DictOperation::Unpack(var!("extra")),
            ])
        );
        assert_expr_eq!(
            "[*base, 'x']",
            list![Expr::Starred(Box::new(var!("base"))), str!("x")]
        );
    }

    #[test]
    fn dict_comprehension() {
        assert_expr_eq!(
            "{k: v for k, v in pairs}",
            Expr::DictComprehension {
                key_body: Box::new(var!("k")),
                value_body: Box::new(var!("v")),
                clauses: vec![ForClause {
                    target: tuple![var!("k"), var!("v")],
                    iterable: var!("pairs"),
                    conditions: vec![],
                }],
            }
        );
    }

    #[test]
    fn comprehension_with_ternary_body() {
        let expr = parse_expr!("[a if a else b for a in c if a if not b]");
        let Expr::ListComprehension { body, clauses } = expr else {
            panic!("expected list comprehension");
        };
        assert!(matches!(*body, Expr::TernaryOp { .. }));
        assert_eq!(clauses[0].conditions.len(), 2);
    }

    #[test]
    fn adjacent_strings_concatenate() {
        assert_expr_eq!("'a' \"b\" '''c'''", str!("abc"));
        assert_expr_eq!(
            "'x' f'{y!r:>4}' 'z'",
            Expr::FString(vec![
                FStringPart::String("x".into()),
                FStringPart::Expr(ExprFormat {
                    expr: Box::new(var!("y")),
                    format: FormatOption::Repr,
                    spec: Some(">4".into()),
                }),
                FStringPart::String("z".into()),
            ])
        );
    }

    #[test]
    fn walrus() {
        assert_expr_eq!(
            "(n := 10)",
            Expr::NamedExpr {
                target: ident!("n"),
                value: Box::new(int!(10)),
            }
        );
    }

    #[test]
    fn unexpected_token() {
        assert!(matches!(
            expect_error!("a = )"),
            ParserError::UnexpectedToken {
                token: Token::RParen,
                ..
            }
        ));
    }
}
