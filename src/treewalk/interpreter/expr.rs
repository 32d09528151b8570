use std::rc::Rc;

use crate::{
    core::Container,
    parser::types::{
        BinOp, CallArg, CallArgs, CompareOp, DictOperation, Expr, FStringPart, ForClause,
        FormatOption, LogicalOp, SliceParams, UnaryOp,
    },
    treewalk::{
        interpreter::{Frame, FrameKind},
        types::{Dict, Exception, FunctionBody, Iter, Set, Slice},
        utils::Args,
        Raise, Scope, TreewalkInterpreter, TreewalkResult, TreewalkValue,
    },
};

impl TreewalkInterpreter<'_> {
    pub fn evaluate_expr(&self, expr: &Expr) -> TreewalkResult<TreewalkValue> {
        match expr {
            Expr::None => Ok(TreewalkValue::None),
            Expr::Ellipsis => Ok(TreewalkValue::Ellipsis),
            Expr::Boolean(b) => Ok(TreewalkValue::Bool(*b)),
            Expr::Integer(i) => Ok(TreewalkValue::Int(*i)),
            Expr::Float(f) => Ok(TreewalkValue::Float(*f)),
            Expr::StringLiteral(s) => Ok(TreewalkValue::str(s.as_str())),
            Expr::BytesLiteral(b) => Ok(TreewalkValue::Bytes(b.clone())),
            Expr::FString(parts) => self.evaluate_fstring(parts),
            Expr::Variable(name) => self.load_var(name),
            Expr::List(items) => Ok(TreewalkValue::list(self.evaluate_items(items)?)),
            Expr::Tuple(items) => Ok(TreewalkValue::tuple(self.evaluate_items(items)?)),
            Expr::Set(items) => {
                let set = Set::from_items(self.evaluate_items(items)?).raise(self)?;
                Ok(TreewalkValue::set(set))
            }
            Expr::Dict(ops) => self.evaluate_dict(ops),
            Expr::Starred(_) => {
                Exception::runtime_error("can't use starred expression here").raise(self)
            }
            Expr::MemberAccess { object, field } => {
                let object = self.evaluate_expr(object)?;
                self.get_attr(&object, field)
            }
            Expr::IndexAccess { object, index } => {
                let object = self.evaluate_expr(object)?;
                let index = self.evaluate_expr(index)?;
                self.get_item(&object, &index)
            }
            Expr::SliceOperation { object, params } => {
                let object = self.evaluate_expr(object)?;
                let slice = self.evaluate_slice(params)?;
                self.get_item(&object, &slice)
            }
            Expr::FunctionCall { callee, args } => {
                let callee = self.evaluate_expr(callee)?;
                let args = self.evaluate_args(args)?;
                self.call(&callee, args)
            }
            Expr::UnaryOperation { op, right } => {
                let right = self.evaluate_expr(right)?;
                self.unary_op(*op, &right)
            }
            Expr::BinaryOperation { left, op, right } => {
                let left = self.evaluate_expr(left)?;
                let right = self.evaluate_expr(right)?;
                self.binary_op(*op, &left, &right)
            }
            Expr::LogicalOperation { left, op, right } => {
                let left = self.evaluate_expr(left)?;
                let truthy = self.is_truthy(&left)?;
                match (op, truthy) {
                    (LogicalOp::And, false) | (LogicalOp::Or, true) => Ok(left),
                    _ => self.evaluate_expr(right),
                }
            }
            Expr::ComparisonChain { left, ops } => self.evaluate_comparison(left, ops),
            Expr::TernaryOp {
                condition,
                if_value,
                else_value,
            } => {
                let condition = self.evaluate_expr(condition)?;
                if self.is_truthy(&condition)? {
                    self.evaluate_expr(if_value)
                } else {
                    self.evaluate_expr(else_value)
                }
            }
            Expr::Lambda { args, expr } => {
                let body = FunctionBody::Expr(Rc::new(expr.as_ref().clone()));
                self.define_function("<lambda>", args, body)
            }
            Expr::NamedExpr { target, value } => {
                let value = self.evaluate_expr(value)?;
                self.store_var(target, value.clone());
                Ok(value)
            }
            Expr::ListComprehension { body, clauses } => {
                let mut items = vec![];
                self.comprehension(clauses, &mut |interpreter| {
                    items.push(interpreter.evaluate_expr(body)?);
                    Ok(())
                })?;
                Ok(TreewalkValue::list(items))
            }
            Expr::SetComprehension { body, clauses } => {
                let mut set = Set::default();
                self.comprehension(clauses, &mut |interpreter| {
                    let item = interpreter.evaluate_expr(body)?;
                    set.add(item).raise(interpreter)
                })?;
                Ok(TreewalkValue::set(set))
            }
            Expr::DictComprehension {
                key_body,
                value_body,
                clauses,
            } => {
                let mut dict = Dict::default();
                self.comprehension(clauses, &mut |interpreter| {
                    let key = interpreter.evaluate_expr(key_body)?;
                    let value = interpreter.evaluate_expr(value_body)?;
                    dict.insert(key, value).raise(interpreter)
                })?;
                Ok(TreewalkValue::dict(dict))
            }
            // Generator expressions are evaluated eagerly.
            Expr::GeneratorComprehension { body, clauses } => {
                let mut items = vec![];
                self.comprehension(clauses, &mut |interpreter| {
                    items.push(interpreter.evaluate_expr(body)?);
                    Ok(())
                })?;
                Ok(TreewalkValue::Iterator(Container::new(Iter::from_items(
                    items,
                ))))
            }
            Expr::Yield(value) => {
                let value = match value {
                    Some(expr) => self.evaluate_expr(expr)?,
                    None => TreewalkValue::None,
                };
                self.push_yielded(vec![value])?;
                Ok(TreewalkValue::None)
            }
            Expr::YieldFrom(expr) => {
                let iterable = self.evaluate_expr(expr)?;
                let items = self.collect(&iterable)?;
                self.push_yielded(items)?;
                Ok(TreewalkValue::None)
            }
        }
    }

    fn push_yielded(&self, items: Vec<TreewalkValue>) -> TreewalkResult<()> {
        match self.current_frame().yielded {
            Some(yielded) => {
                yielded.borrow_mut().extend(items);
                Ok(())
            }
            None => Exception::runtime_error("'yield' outside function").raise(self),
        }
    }

    /// Evaluate display items, expanding `*iterable` in place.
    fn evaluate_items(&self, items: &[Expr]) -> TreewalkResult<Vec<TreewalkValue>> {
        let mut values = vec![];
        for item in items {
            match item {
                Expr::Starred(inner) => {
                    let iterable = self.evaluate_expr(inner)?;
                    values.extend(self.collect(&iterable)?);
                }
                _ => values.push(self.evaluate_expr(item)?),
            }
        }
        Ok(values)
    }

    fn evaluate_dict(&self, ops: &[DictOperation]) -> TreewalkResult<TreewalkValue> {
        let mut dict = Dict::default();
        for op in ops {
            match op {
                DictOperation::Pair(key, value) => {
                    let key = self.evaluate_expr(key)?;
                    let value = self.evaluate_expr(value)?;
                    dict.insert(key, value).raise(self)?;
                }
                DictOperation::Unpack(expr) => {
                    let mapping = self.evaluate_expr(expr)?;
                    for (key, value) in self.mapping_items(&mapping)? {
                        dict.insert(key, value).raise(self)?;
                    }
                }
            }
        }
        Ok(TreewalkValue::dict(dict))
    }

    /// The key/value pairs of a value used with `**`.
    pub(crate) fn mapping_items(
        &self,
        mapping: &TreewalkValue,
    ) -> TreewalkResult<Vec<(TreewalkValue, TreewalkValue)>> {
        match mapping {
            TreewalkValue::Dict(dict) => Ok(dict.borrow().items()),
            TreewalkValue::Stub(_) => Ok(vec![]),
            TreewalkValue::Object(_) => {
                let keys = self.call_method(mapping, "keys", Args::default())?;
                self.collect(&keys)?
                    .into_iter()
                    .map(|key| Ok((key.clone(), self.get_item(mapping, &key)?)))
                    .collect()
            }
            _ => Exception::type_error(format!(
                "'{}' object is not a mapping",
                mapping.type_name()
            ))
            .raise(self),
        }
    }

    fn evaluate_slice(&self, params: &SliceParams) -> TreewalkResult<TreewalkValue> {
        let bound = |expr: &Option<Expr>| -> TreewalkResult<Option<i64>> {
            match expr {
                Some(expr) => match self.evaluate_expr(expr)? {
                    TreewalkValue::None => Ok(None),
                    value => value.as_int().map(Some).raise(self),
                },
                None => Ok(None),
            }
        };
        Ok(TreewalkValue::Slice(Slice::new(
            bound(&params.start)?,
            bound(&params.stop)?,
            bound(&params.step)?,
        )))
    }

    pub(crate) fn evaluate_args(&self, call_args: &CallArgs) -> TreewalkResult<Args> {
        let mut positional = vec![];
        let mut args = Args::default();
        for arg in &call_args.args {
            match arg {
                CallArg::Positional(expr) => positional.push(self.evaluate_expr(expr)?),
                CallArg::Unpack(expr) => {
                    let iterable = self.evaluate_expr(expr)?;
                    positional.extend(self.collect(&iterable)?);
                }
                CallArg::Keyword { arg, expr } => {
                    let value = self.evaluate_expr(expr)?;
                    args.push_kwarg(arg.to_string(), value).raise(self)?;
                }
                CallArg::KwargsUnpack(expr) => {
                    let mapping = self.evaluate_expr(expr)?;
                    for (key, value) in self.mapping_items(&mapping)? {
                        let key = match key {
                            TreewalkValue::Str(key) => key,
                            _ => {
                                return Exception::type_error("keywords must be strings")
                                    .raise(self)
                            }
                        };
                        args.push_kwarg(key, value).raise(self)?;
                    }
                }
            }
        }
        let (_, keywords) = args.into_parts();
        Ok(Args::new(positional, keywords))
    }

    fn evaluate_comparison(
        &self,
        left: &Expr,
        ops: &[(CompareOp, Expr)],
    ) -> TreewalkResult<TreewalkValue> {
        let mut left = self.evaluate_expr(left)?;
        for (op, right) in ops {
            let right = self.evaluate_expr(right)?;
            if !self.compare(*op, &left, &right)? {
                return Ok(TreewalkValue::Bool(false));
            }
            left = right;
        }
        Ok(TreewalkValue::Bool(true))
    }

    fn evaluate_fstring(&self, parts: &[FStringPart]) -> TreewalkResult<TreewalkValue> {
        let mut result = String::new();
        for part in parts {
            match part {
                FStringPart::String(s) => result.push_str(s),
                FStringPart::Expr(format) => {
                    let value = self.evaluate_expr(&format.expr)?;
                    let value = match format.format {
                        FormatOption::Str => value,
                        FormatOption::Repr => TreewalkValue::Str(self.repr(&value)?),
                        FormatOption::Ascii => {
                            let repr = self.repr(&value)?;
                            TreewalkValue::Str(repr.escape_default().to_string())
                        }
                    };
                    let spec = format.spec.as_deref().unwrap_or_default();
                    result.push_str(&self.format_value(&value, spec)?);
                }
            }
        }
        Ok(TreewalkValue::Str(result))
    }

    /// Run `body` once per combination the `for`/`if` clauses produce, inside a scope of its own
    /// so loop variables do not leak.
    fn comprehension(
        &self,
        clauses: &[ForClause],
        body: &mut dyn FnMut(&Self) -> TreewalkResult<()>,
    ) -> TreewalkResult<()> {
        let Some((first, _)) = clauses.split_first() else {
            return body(self);
        };

        // The outermost iterable is evaluated in the enclosing scope.
        let iterable = self.evaluate_expr(&first.iterable)?;
        let frame = self.current_frame();
        let scope = Frame {
            kind: FrameKind::Function,
            locals: Container::new(Scope::default()),
            enclosing: frame.closure(),
            globals: frame.globals.clone(),
            function: frame.function.clone(),
            yielded: None,
        };
        self.with_frame(scope, || self.comprehension_clauses(clauses, Some(iterable), body))
    }

    fn comprehension_clauses(
        &self,
        clauses: &[ForClause],
        first_iterable: Option<TreewalkValue>,
        body: &mut dyn FnMut(&Self) -> TreewalkResult<()>,
    ) -> TreewalkResult<()> {
        let Some((clause, rest)) = clauses.split_first() else {
            return body(self);
        };

        let iterable = match first_iterable {
            Some(iterable) => iterable,
            None => self.evaluate_expr(&clause.iterable)?,
        };
        let iterator = self.iterate(&iterable)?;
        loop {
            let item = iterator.borrow_mut().next();
            let Some(item) = item else {
                return Ok(());
            };
            self.assign(&clause.target, item)?;

            let mut keep = true;
            for condition in &clause.conditions {
                let condition = self.evaluate_expr(condition)?;
                if !self.is_truthy(&condition)? {
                    keep = false;
                    break;
                }
            }
            if keep {
                self.comprehension_clauses(rest, None, body)?;
            }
        }
    }

    /// Bind `value` to an assignment target.
    pub(crate) fn assign(&self, target: &Expr, value: TreewalkValue) -> TreewalkResult<()> {
        match target {
            Expr::Variable(name) => {
                self.store_var(name, value);
                Ok(())
            }
            Expr::MemberAccess { object, field } => {
                let object = self.evaluate_expr(object)?;
                self.set_attr(&object, field, value)
            }
            Expr::IndexAccess { object, index } => {
                let object = self.evaluate_expr(object)?;
                let index = self.evaluate_expr(index)?;
                self.set_item(&object, index, value)
            }
            Expr::SliceOperation { object, params } => {
                let object = self.evaluate_expr(object)?;
                let slice = self.evaluate_slice(params)?;
                self.set_item(&object, slice, value)
            }
            Expr::Tuple(targets) | Expr::List(targets) => self.unpack(targets, value),
            _ => Exception::type_error("cannot assign to expression").raise(self),
        }
    }

    /// Destructure `value` across `targets`, allowing one starred target.
    pub(crate) fn unpack(&self, targets: &[Expr], value: TreewalkValue) -> TreewalkResult<()> {
        let items = self.collect(&value)?;
        let starred = targets.iter().position(|t| matches!(t, Expr::Starred(_)));

        match starred {
            None => {
                if items.len() != targets.len() {
                    let message = if items.len() < targets.len() {
                        format!(
                            "not enough values to unpack (expected {}, got {})",
                            targets.len(),
                            items.len()
                        )
                    } else {
                        format!("too many values to unpack (expected {})", targets.len())
                    };
                    return Exception::value_error(message).raise(self);
                }
                for (target, item) in targets.iter().zip(items) {
                    self.assign(target, item)?;
                }
            }
            Some(position) => {
                let after = targets.len() - position - 1;
                if items.len() < targets.len() - 1 {
                    return Exception::value_error(format!(
                        "not enough values to unpack (expected at least {}, got {})",
                        targets.len() - 1,
                        items.len()
                    ))
                    .raise(self);
                }
                let mut items = items;
                let tail = items.split_off(items.len() - after);
                let middle = items.split_off(position);
                for (target, item) in targets[..position].iter().zip(items) {
                    self.assign(target, item)?;
                }
                if let Expr::Starred(inner) = &targets[position] {
                    self.assign(inner, TreewalkValue::list(middle))?;
                }
                for (target, item) in targets[position + 1..].iter().zip(tail) {
                    self.assign(target, item)?;
                }
            }
        }
        Ok(())
    }

    /// `target op= value`. Lists extend in place, so aliases observe the change.
    pub(crate) fn compound_assign(
        &self,
        op: BinOp,
        target: &Expr,
        value: TreewalkValue,
    ) -> TreewalkResult<()> {
        let in_place = |current: TreewalkValue| -> TreewalkResult<TreewalkValue> {
            match (&current, op) {
                (TreewalkValue::List(list), BinOp::Add) => {
                    let items = self.collect(&value)?;
                    list.borrow_mut().extend(items);
                    Ok(current)
                }
                (TreewalkValue::Dict(dict), BinOp::BitwiseOr) => {
                    for (key, item) in self.mapping_items(&value)? {
                        dict.borrow_mut().insert(key, item).raise(self)?;
                    }
                    Ok(current)
                }
                _ => self.binary_op(op, &current, &value),
            }
        };

        match target {
            Expr::Variable(name) => {
                let current = self.load_var(name)?;
                let updated = in_place(current)?;
                self.store_var(name, updated);
                Ok(())
            }
            Expr::MemberAccess { object, field } => {
                let object = self.evaluate_expr(object)?;
                let current = self.get_attr(&object, field)?;
                let updated = in_place(current)?;
                self.set_attr(&object, field, updated)
            }
            Expr::IndexAccess { object, index } => {
                let object = self.evaluate_expr(object)?;
                let index = self.evaluate_expr(index)?;
                let current = self.get_item(&object, &index)?;
                let updated = in_place(current)?;
                self.set_item(&object, index, updated)
            }
            _ => Exception::type_error("illegal expression for augmented assignment").raise(self),
        }
    }

    pub(crate) fn delete(&self, target: &Expr) -> TreewalkResult<()> {
        match target {
            Expr::Variable(name) => self.delete_var(name),
            Expr::MemberAccess { object, field } => {
                let object = self.evaluate_expr(object)?;
                self.delete_attr(&object, field)
            }
            Expr::IndexAccess { object, index } => {
                let object = self.evaluate_expr(object)?;
                let index = self.evaluate_expr(index)?;
                self.delete_item(&object, &index)
            }
            Expr::Tuple(targets) | Expr::List(targets) => {
                targets.iter().try_for_each(|target| self.delete(target))
            }
            _ => Exception::type_error("cannot delete expression").raise(self),
        }
    }

    pub(crate) fn unary_op(
        &self,
        op: UnaryOp,
        value: &TreewalkValue,
    ) -> TreewalkResult<TreewalkValue> {
        match (op, value) {
            (UnaryOp::Not, _) => Ok(TreewalkValue::Bool(!self.is_truthy(value)?)),
            (UnaryOp::Minus, TreewalkValue::Float(f)) => Ok(TreewalkValue::Float(-f)),
            (UnaryOp::Minus, _) if value.as_int().is_ok() => {
                let i = value.as_int().raise(self)?;
                match i.checked_neg() {
                    Some(negated) => Ok(TreewalkValue::Int(negated)),
                    None => Exception::overflow_error("integer overflow").raise(self),
                }
            }
            (UnaryOp::Plus, TreewalkValue::Float(f)) => Ok(TreewalkValue::Float(*f)),
            (UnaryOp::Plus, _) if value.as_int().is_ok() => {
                Ok(TreewalkValue::Int(value.as_int().raise(self)?))
            }
            (UnaryOp::BitwiseNot, _) if value.as_int().is_ok() => {
                Ok(TreewalkValue::Int(!value.as_int().raise(self)?))
            }
            (_, TreewalkValue::Object(_)) => {
                let dunder = match op {
                    UnaryOp::Minus => "__neg__",
                    UnaryOp::Plus => "__pos__",
                    _ => "__invert__",
                };
                self.call_method(value, dunder, Args::default())
            }
            _ => {
                let symbol = match op {
                    UnaryOp::Minus => "-",
                    UnaryOp::Plus => "+",
                    _ => "~",
                };
                Exception::type_error(format!(
                    "bad operand type for unary {symbol}: '{}'",
                    value.type_name()
                ))
                .raise(self)
            }
        }
    }
}
