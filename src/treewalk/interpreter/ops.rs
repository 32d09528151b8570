use std::cmp::Ordering;

use crate::{
    core::Container,
    domain::{
        utils::{normalize_index, wrap_negative},
        ExceptionKind,
    },
    parser::types::{BinOp, CompareOp},
    treewalk::{
        types::{BuiltinType, Class, Dict, Exception, Iter, Set, Slice},
        utils::Args,
        value::Number,
        DomainResult, Raise, TreewalkInterpreter, TreewalkResult, TreewalkValue,
    },
};

fn dunder_for(op: BinOp) -> (&'static str, &'static str) {
    match op {
        BinOp::Add => ("__add__", "__radd__"),
        BinOp::Sub => ("__sub__", "__rsub__"),
        BinOp::Mul => ("__mul__", "__rmul__"),
        BinOp::Div => ("__truediv__", "__rtruediv__"),
        BinOp::IntegerDiv => ("__floordiv__", "__rfloordiv__"),
        BinOp::Mod => ("__mod__", "__rmod__"),
        BinOp::Expo => ("__pow__", "__rpow__"),
        BinOp::MatMul => ("__matmul__", "__rmatmul__"),
        BinOp::LeftShift => ("__lshift__", "__rlshift__"),
        BinOp::RightShift => ("__rshift__", "__rrshift__"),
        BinOp::BitwiseAnd => ("__and__", "__rand__"),
        BinOp::BitwiseOr => ("__or__", "__ror__"),
        BinOp::BitwiseXor => ("__xor__", "__rxor__"),
    }
}

fn overflow() -> Exception {
    Exception::overflow_error("integer overflow")
}

fn floor_div(a: i64, b: i64) -> DomainResult<i64> {
    if b == 0 {
        return Err(Exception::div_by_zero_error(
            "integer division or modulo by zero",
        ));
    }
    let quotient = a.checked_div(b).ok_or_else(overflow)?;
    if a % b != 0 && ((a < 0) != (b < 0)) {
        Ok(quotient - 1)
    } else {
        Ok(quotient)
    }
}

fn floor_mod(a: i64, b: i64) -> DomainResult<i64> {
    if b == 0 {
        return Err(Exception::div_by_zero_error(
            "integer division or modulo by zero",
        ));
    }
    let remainder = a.checked_rem(b).unwrap_or(0);
    if remainder != 0 && ((remainder < 0) != (b < 0)) {
        Ok(remainder + b)
    } else {
        Ok(remainder)
    }
}

fn int_op(op: BinOp, a: i64, b: i64) -> DomainResult<Option<TreewalkValue>> {
    let value = match op {
        BinOp::Add => TreewalkValue::Int(a.checked_add(b).ok_or_else(overflow)?),
        BinOp::Sub => TreewalkValue::Int(a.checked_sub(b).ok_or_else(overflow)?),
        BinOp::Mul => TreewalkValue::Int(a.checked_mul(b).ok_or_else(overflow)?),
        BinOp::Div => {
            if b == 0 {
                return Err(Exception::div_by_zero_error("division by zero"));
            }
            TreewalkValue::Float(a as f64 / b as f64)
        }
        BinOp::IntegerDiv => TreewalkValue::Int(floor_div(a, b)?),
        BinOp::Mod => TreewalkValue::Int(floor_mod(a, b)?),
        BinOp::Expo if b < 0 => TreewalkValue::Float((a as f64).powf(b as f64)),
        BinOp::Expo => {
            let exponent = u32::try_from(b).map_err(|_| overflow())?;
            TreewalkValue::Int(a.checked_pow(exponent).ok_or_else(overflow)?)
        }
        BinOp::LeftShift => {
            let shift = u32::try_from(b)
                .map_err(|_| Exception::value_error("negative shift count"))?;
            let shifted = a.checked_shl(shift).ok_or_else(overflow)?;
            if shifted >> shift != a {
                return Err(overflow());
            }
            TreewalkValue::Int(shifted)
        }
        BinOp::RightShift => {
            let shift = u32::try_from(b)
                .map_err(|_| Exception::value_error("negative shift count"))?;
            TreewalkValue::Int(a >> shift.min(63))
        }
        BinOp::BitwiseAnd => TreewalkValue::Int(a & b),
        BinOp::BitwiseOr => TreewalkValue::Int(a | b),
        BinOp::BitwiseXor => TreewalkValue::Int(a ^ b),
        BinOp::MatMul => return Ok(None),
    };
    Ok(Some(value))
}

fn float_op(op: BinOp, a: f64, b: f64) -> DomainResult<Option<TreewalkValue>> {
    let value = match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::Div if b == 0.0 => {
            return Err(Exception::div_by_zero_error("float division by zero"))
        }
        BinOp::Div => a / b,
        BinOp::IntegerDiv if b == 0.0 => {
            return Err(Exception::div_by_zero_error("float floor division by zero"))
        }
        BinOp::IntegerDiv => (a / b).floor(),
        BinOp::Mod if b == 0.0 => {
            return Err(Exception::div_by_zero_error("float modulo"))
        }
        BinOp::Mod => a - b * (a / b).floor(),
        BinOp::Expo => a.powf(b),
        _ => return Ok(None),
    };
    Ok(Some(TreewalkValue::Float(value)))
}

fn repeat<T: Clone>(items: &[T], times: i64) -> Vec<T> {
    let times = usize::try_from(times).unwrap_or(0);
    std::iter::repeat(items).take(times).flatten().cloned().collect()
}

impl TreewalkInterpreter<'_> {
    pub fn binary_op(
        &self,
        op: BinOp,
        left: &TreewalkValue,
        right: &TreewalkValue,
    ) -> TreewalkResult<TreewalkValue> {
        if let Some(value) = self.builtin_binary_op(op, left, right)? {
            return Ok(value);
        }

        let (forward, reflected) = dunder_for(op);
        for (receiver, other, dunder) in [(left, right, forward), (right, left, reflected)] {
            // Stubs implement every numeric dunder, reflected ones included.
            if let TreewalkValue::Stub(stub) = receiver {
                return Ok(TreewalkValue::Stub(stub.operated(dunder)));
            }
            let TreewalkValue::Object(object) = receiver else {
                continue;
            };
            let class = object.borrow().class.clone();
            if let Some(method) = Class::lookup(&class, dunder) {
                let method = self.bind(method, Some(receiver.clone()), class)?;
                let result = self.call(&method, Args::positional(vec![other.clone()]))?;
                if !matches!(result, TreewalkValue::NotImplemented) {
                    return Ok(result);
                }
            }
        }

        Exception::type_error(format!(
            "unsupported operand type(s) for {}: '{}' and '{}'",
            op.symbol(),
            left.type_name(),
            right.type_name()
        ))
        .raise(self)
    }

    fn builtin_binary_op(
        &self,
        op: BinOp,
        left: &TreewalkValue,
        right: &TreewalkValue,
    ) -> TreewalkResult<Option<TreewalkValue>> {
        if let (Some(a), Some(b)) = (left.as_number(), right.as_number()) {
            return match (a, b) {
                (Number::Int(a), Number::Int(b)) => int_op(op, a, b).raise(self),
                (a, b) => float_op(op, a.as_f64(), b.as_f64()).raise(self),
            };
        }

        let value = match (left, right, op) {
            (TreewalkValue::Str(a), TreewalkValue::Str(b), BinOp::Add) => {
                TreewalkValue::Str(format!("{a}{b}"))
            }
            (TreewalkValue::Str(s), n, BinOp::Mul) | (n, TreewalkValue::Str(s), BinOp::Mul)
                if n.as_int().is_ok() =>
            {
                TreewalkValue::Str(s.repeat(usize::try_from(n.as_int().raise(self)?).unwrap_or(0)))
            }
            (TreewalkValue::Str(format), args, BinOp::Mod) => {
                TreewalkValue::Str(self.percent_format(format, args)?)
            }
            (TreewalkValue::Bytes(a), TreewalkValue::Bytes(b), BinOp::Add) => {
                TreewalkValue::Bytes([a.as_slice(), b.as_slice()].concat())
            }
            (TreewalkValue::List(a), TreewalkValue::List(b), BinOp::Add) => {
                let mut items = a.borrow().clone();
                items.extend(b.borrow().iter().cloned());
                TreewalkValue::list(items)
            }
            (TreewalkValue::List(l), n, BinOp::Mul) | (n, TreewalkValue::List(l), BinOp::Mul)
                if n.as_int().is_ok() =>
            {
                TreewalkValue::list(repeat(&l.borrow(), n.as_int().raise(self)?))
            }
            (TreewalkValue::Tuple(a), TreewalkValue::Tuple(b), BinOp::Add) => {
                TreewalkValue::tuple(a.iter().chain(b.iter()).cloned().collect())
            }
            (TreewalkValue::Tuple(t), n, BinOp::Mul) | (n, TreewalkValue::Tuple(t), BinOp::Mul)
                if n.as_int().is_ok() =>
            {
                TreewalkValue::tuple(repeat(t.items(), n.as_int().raise(self)?))
            }
            (TreewalkValue::Dict(a), TreewalkValue::Dict(b), BinOp::BitwiseOr) => {
                let mut merged = a.borrow().clone();
                merged.extend(&b.borrow());
                TreewalkValue::dict(merged)
            }
            (TreewalkValue::Set(a), TreewalkValue::Set(b), _) => {
                let a = a.borrow().items();
                let b = b.borrow();
                let items: Vec<TreewalkValue> = match op {
                    BinOp::BitwiseOr => a.into_iter().chain(b.items()).collect(),
                    BinOp::BitwiseAnd => a
                        .into_iter()
                        .filter(|item| b.contains(item).unwrap_or(false))
                        .collect(),
                    BinOp::Sub => a
                        .into_iter()
                        .filter(|item| !b.contains(item).unwrap_or(false))
                        .collect(),
                    BinOp::BitwiseXor => {
                        let a_set = Set::from_items(a.clone()).raise(self)?;
                        a.into_iter()
                            .filter(|item| !b.contains(item).unwrap_or(false))
                            .chain(
                                b.items()
                                    .into_iter()
                                    .filter(|item| !a_set.contains(item).unwrap_or(false)),
                            )
                            .collect()
                    }
                    _ => return Ok(None),
                };
                TreewalkValue::set(Set::from_items(items).raise(self)?)
            }
            _ => return Ok(None),
        };
        Ok(Some(value))
    }

    pub fn compare(
        &self,
        op: CompareOp,
        left: &TreewalkValue,
        right: &TreewalkValue,
    ) -> TreewalkResult<bool> {
        match op {
            CompareOp::Equals => self.equals(left, right),
            CompareOp::NotEquals => Ok(!self.equals(left, right)?),
            CompareOp::Is => Ok(left.is(right)),
            CompareOp::IsNot => Ok(!left.is(right)),
            CompareOp::In => self.contains(right, left),
            CompareOp::NotIn => Ok(!self.contains(right, left)?),
            CompareOp::LessThan
            | CompareOp::LessThanOrEqual
            | CompareOp::GreaterThan
            | CompareOp::GreaterThanOrEqual => self.rich_compare(op, left, right),
        }
    }

    fn rich_compare(
        &self,
        op: CompareOp,
        left: &TreewalkValue,
        right: &TreewalkValue,
    ) -> TreewalkResult<bool> {
        if let Some(holds) = self.compare_dunder(op, left, right)? {
            return Ok(holds);
        }
        let ordering = self.ordering(left, right, op)?;
        Ok(match op {
            CompareOp::LessThan => ordering == Ordering::Less,
            CompareOp::LessThanOrEqual => ordering != Ordering::Greater,
            CompareOp::GreaterThan => ordering == Ordering::Greater,
            _ => ordering != Ordering::Less,
        })
    }

    /// Try `left.__op__(right)`, then the reflection `right.__rop__(left)`. `None` when neither
    /// side is an instance defining the method or both return `NotImplemented`.
    fn compare_dunder(
        &self,
        op: CompareOp,
        left: &TreewalkValue,
        right: &TreewalkValue,
    ) -> TreewalkResult<Option<bool>> {
        let (forward, reflected) = match op {
            CompareOp::LessThan => ("__lt__", "__gt__"),
            CompareOp::LessThanOrEqual => ("__le__", "__ge__"),
            CompareOp::GreaterThan => ("__gt__", "__lt__"),
            CompareOp::GreaterThanOrEqual => ("__ge__", "__le__"),
            _ => return Ok(None),
        };
        for (receiver, other, dunder) in [(left, right, forward), (right, left, reflected)] {
            let TreewalkValue::Object(object) = receiver else {
                continue;
            };
            let class = object.borrow().class.clone();
            if let Some(method) = Class::lookup(&class, dunder) {
                let method = self.bind(method, Some(receiver.clone()), class)?;
                let result = self.call(&method, Args::positional(vec![other.clone()]))?;
                if !matches!(result, TreewalkValue::NotImplemented) {
                    return Ok(Some(self.is_truthy(&result)?));
                }
            }
        }
        Ok(None)
    }

    pub fn equals(&self, left: &TreewalkValue, right: &TreewalkValue) -> TreewalkResult<bool> {
        for (receiver, other) in [(left, right), (right, left)] {
            if let TreewalkValue::Object(object) = receiver {
                let class = object.borrow().class.clone();
                if let Some(method) = Class::lookup(&class, "__eq__") {
                    let method = self.bind(method, Some(receiver.clone()), class)?;
                    let result = self.call(&method, Args::positional(vec![other.clone()]))?;
                    if !matches!(result, TreewalkValue::NotImplemented) {
                        return self.is_truthy(&result);
                    }
                }
            }
        }
        Ok(left == right)
    }

    /// Total order between two values, as `<` and friends see it.
    pub fn ordering(
        &self,
        left: &TreewalkValue,
        right: &TreewalkValue,
        op: CompareOp,
    ) -> TreewalkResult<Ordering> {
        if let (Some(a), Some(b)) = (left.as_number(), right.as_number()) {
            return Ok(match (a, b) {
                (Number::Int(a), Number::Int(b)) => a.cmp(&b),
                (a, b) => a
                    .as_f64()
                    .partial_cmp(&b.as_f64())
                    .unwrap_or(Ordering::Equal),
            });
        }

        match (left, right) {
            (TreewalkValue::Str(a), TreewalkValue::Str(b)) => return Ok(a.cmp(b)),
            (TreewalkValue::Bytes(a), TreewalkValue::Bytes(b)) => return Ok(a.cmp(b)),
            (TreewalkValue::List(a), TreewalkValue::List(b)) => {
                let (a, b) = (a.borrow().clone(), b.borrow().clone());
                return self.sequence_ordering(&a, &b, op);
            }
            (TreewalkValue::Tuple(a), TreewalkValue::Tuple(b)) => {
                return self.sequence_ordering(a.items(), b.items(), op)
            }
            (TreewalkValue::Object(_), _) | (_, TreewalkValue::Object(_)) => {
                // Sorting and min/max only ever ask for `<`, as CPython does.
                let less = CompareOp::LessThan;
                match self.compare_dunder(less, left, right)? {
                    Some(true) => return Ok(Ordering::Less),
                    Some(false) => {
                        return Ok(match self.compare_dunder(less, right, left)? {
                            Some(true) => Ordering::Greater,
                            _ => Ordering::Equal,
                        })
                    }
                    None => {
                        if let Some(greater) = self.compare_dunder(less, right, left)? {
                            return Ok(if greater {
                                Ordering::Greater
                            } else {
                                Ordering::Equal
                            });
                        }
                    }
                }
            }
            _ => {}
        }

        let symbol = match op {
            CompareOp::LessThan => "<",
            CompareOp::LessThanOrEqual => "<=",
            CompareOp::GreaterThan => ">",
            _ => ">=",
        };
        Exception::type_error(format!(
            "'{symbol}' not supported between instances of '{}' and '{}'",
            left.type_name(),
            right.type_name()
        ))
        .raise(self)
    }

    fn sequence_ordering(
        &self,
        a: &[TreewalkValue],
        b: &[TreewalkValue],
        op: CompareOp,
    ) -> TreewalkResult<Ordering> {
        for (x, y) in a.iter().zip(b) {
            if !self.equals(x, y)? {
                return self.ordering(x, y, op);
            }
        }
        Ok(a.len().cmp(&b.len()))
    }

    /// `item in container`.
    pub fn contains(
        &self,
        container: &TreewalkValue,
        item: &TreewalkValue,
    ) -> TreewalkResult<bool> {
        match container {
            TreewalkValue::Str(haystack) => match item {
                TreewalkValue::Str(needle) => Ok(haystack.contains(needle.as_str())),
                _ => Exception::type_error(format!(
                    "'in <string>' requires string as left operand, not {}",
                    item.type_name()
                ))
                .raise(self),
            },
            TreewalkValue::Dict(dict) => dict.borrow().contains(item).raise(self),
            TreewalkValue::Set(set) => set.borrow().contains(item).raise(self),
            TreewalkValue::Range(range) => Ok(match item.as_number() {
                Some(Number::Int(i)) => range.contains(i),
                _ => false,
            }),
            TreewalkValue::Stub(_) => Ok(false),
            TreewalkValue::Object(object) => {
                let class = object.borrow().class.clone();
                match Class::lookup(&class, "__contains__") {
                    Some(method) => {
                        let method = self.bind(method, Some(container.clone()), class)?;
                        let result = self.call(&method, Args::positional(vec![item.clone()]))?;
                        self.is_truthy(&result)
                    }
                    None => self.contains_by_iteration(container, item),
                }
            }
            _ => self.contains_by_iteration(container, item),
        }
    }

    fn contains_by_iteration(
        &self,
        container: &TreewalkValue,
        item: &TreewalkValue,
    ) -> TreewalkResult<bool> {
        for candidate in self.collect(container)? {
            if self.equals(&candidate, item)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub fn is_truthy(&self, value: &TreewalkValue) -> TreewalkResult<bool> {
        if let TreewalkValue::Object(object) = value {
            let class = object.borrow().class.clone();
            if let Some(method) = Class::lookup(&class, "__bool__") {
                let method = self.bind(method, Some(value.clone()), class)?;
                let result = self.call(&method, Args::default())?;
                return Ok(result.is_truthy());
            }
            if Class::lookup(&class, "__len__").is_some() {
                return Ok(self.len(value)? > 0);
            }
        }
        Ok(value.is_truthy())
    }

    /// An iterator over `value`. Iterating an iterator continues it rather than restarting.
    pub fn iterate(&self, value: &TreewalkValue) -> TreewalkResult<Container<Iter>> {
        let iter = match value {
            TreewalkValue::Iterator(iter) => return Ok(iter.clone()),
            TreewalkValue::List(list) => Iter::from_items(list.borrow().clone()),
            TreewalkValue::Tuple(tuple) => Iter::from_items(tuple.items().to_vec()),
            TreewalkValue::Str(s) => {
                Iter::from_items(s.chars().map(|c| TreewalkValue::Str(c.to_string())))
            }
            TreewalkValue::Bytes(b) => {
                Iter::from_items(b.iter().map(|byte| TreewalkValue::Int(i64::from(*byte))))
            }
            TreewalkValue::Dict(dict) => Iter::from_items(dict.borrow().keys()),
            TreewalkValue::Set(set) => Iter::from_items(set.borrow().items()),
            TreewalkValue::Range(range) => Iter::from_range(range),
            TreewalkValue::StringIO(stream) => Iter::from_items(
                stream
                    .borrow_mut()
                    .readlines()
                    .into_iter()
                    .map(TreewalkValue::Str),
            ),
            TreewalkValue::Stub(_) => Iter::empty(),
            TreewalkValue::Object(object) => {
                let class = object.borrow().class.clone();
                if Class::lookup(&class, "__iter__").is_some() {
                    let iterable = self.call_method(value, "__iter__", Args::default())?;
                    if let TreewalkValue::Object(_) = iterable {
                        return self.drain_iterator_object(&iterable);
                    }
                    return self.iterate(&iterable);
                }
                return Exception::type_error(format!(
                    "'{}' object is not iterable",
                    value.type_name()
                ))
                .raise(self);
            }
            _ => {
                return Exception::type_error(format!(
                    "'{}' object is not iterable",
                    value.type_name()
                ))
                .raise(self)
            }
        };
        Ok(Container::new(iter))
    }

    /// Exhaust a user iterator object by calling `__next__` until `StopIteration`.
    fn drain_iterator_object(&self, iterator: &TreewalkValue) -> TreewalkResult<Container<Iter>> {
        let mut items = vec![];
        loop {
            match self.call_method(iterator, "__next__", Args::default()) {
                Ok(item) => items.push(item),
                Err(raised)
                    if raised
                        .exception
                        .kind
                        .is_subclass_of(&ExceptionKind::StopIteration) =>
                {
                    return Ok(Container::new(Iter::from_items(items)))
                }
                Err(raised) => return Err(raised),
            }
        }
    }

    /// Every item `value` yields when iterated.
    pub fn collect(&self, value: &TreewalkValue) -> TreewalkResult<Vec<TreewalkValue>> {
        match value {
            TreewalkValue::List(list) => Ok(list.borrow().clone()),
            TreewalkValue::Tuple(tuple) => Ok(tuple.items().to_vec()),
            _ => {
                let iterator = self.iterate(value)?;
                let items = iterator.borrow_mut().by_ref().collect();
                Ok(items)
            }
        }
    }

    pub fn len(&self, value: &TreewalkValue) -> TreewalkResult<usize> {
        let len = match value {
            TreewalkValue::Str(s) => s.chars().count(),
            TreewalkValue::Bytes(b) => b.len(),
            TreewalkValue::List(list) => list.borrow().len(),
            TreewalkValue::Tuple(tuple) => tuple.len(),
            TreewalkValue::Dict(dict) => dict.borrow().len(),
            TreewalkValue::Set(set) => set.borrow().len(),
            TreewalkValue::Range(range) => range.len(),
            TreewalkValue::Stub(_) => 0,
            TreewalkValue::Object(_) => {
                let result = self.call_method(value, "__len__", Args::default())?;
                let len = result.as_int().raise(self)?;
                return usize::try_from(len)
                    .map_err(|_| self.raise(Exception::value_error("__len__() should return >= 0")));
            }
            _ => {
                return Exception::type_error(format!(
                    "object of type '{}' has no len()",
                    value.type_name()
                ))
                .raise(self)
            }
        };
        Ok(len)
    }

    pub fn get_item(
        &self,
        object: &TreewalkValue,
        index: &TreewalkValue,
    ) -> TreewalkResult<TreewalkValue> {
        match (object, index) {
            (TreewalkValue::Stub(stub), _) => Ok(TreewalkValue::Stub(stub.item())),
            (TreewalkValue::Dict(dict), _) => {
                let found = dict.borrow().get(index).raise(self)?;
                match found {
                    Some(value) => Ok(value),
                    None => Exception::key_error(index.clone()).raise(self),
                }
            }
            (TreewalkValue::List(list), TreewalkValue::Slice(slice)) => {
                Ok(TreewalkValue::list(self.apply_slice(slice, &list.borrow())?))
            }
            (TreewalkValue::Tuple(tuple), TreewalkValue::Slice(slice)) => {
                Ok(TreewalkValue::tuple(self.apply_slice(slice, tuple.items())?))
            }
            (TreewalkValue::Str(s), TreewalkValue::Slice(slice)) => {
                let chars: Vec<char> = s.chars().collect();
                Ok(TreewalkValue::Str(self.apply_slice(slice, &chars)?.into_iter().collect()))
            }
            (TreewalkValue::Bytes(b), TreewalkValue::Slice(slice)) => {
                Ok(TreewalkValue::Bytes(self.apply_slice(slice, b)?))
            }
            (TreewalkValue::List(list), _) => {
                let list = list.borrow();
                let i = self.sequence_index(index, list.len(), "list")?;
                Ok(list[i].clone())
            }
            (TreewalkValue::Tuple(tuple), _) => {
                let i = self.sequence_index(index, tuple.len(), "tuple")?;
                Ok(tuple.items()[i].clone())
            }
            (TreewalkValue::Str(s), _) => {
                let chars: Vec<char> = s.chars().collect();
                let i = self.sequence_index(index, chars.len(), "string")?;
                Ok(TreewalkValue::Str(chars[i].to_string()))
            }
            (TreewalkValue::Bytes(b), _) => {
                let i = self.sequence_index(index, b.len(), "index")?;
                Ok(TreewalkValue::Int(i64::from(b[i])))
            }
            (TreewalkValue::Range(range), _) => {
                let i = self.sequence_index(index, range.len(), "range object")?;
                Ok(TreewalkValue::Int(range.get(i).unwrap_or_default()))
            }
            (TreewalkValue::Object(_), _) => {
                self.call_method(object, "__getitem__", Args::positional(vec![index.clone()]))
            }
            // Subscripted types only appear in annotations, e.g. `list[str]`.
            (TreewalkValue::Type(_) | TreewalkValue::Class(_), _) => Ok(object.clone()),
            _ => Exception::type_error(format!(
                "'{}' object is not subscriptable",
                object.type_name()
            ))
            .raise(self),
        }
    }

    fn apply_slice<T: Clone>(&self, slice: &Slice, items: &[T]) -> TreewalkResult<Vec<T>> {
        slice
            .apply(items)
            .ok_or_else(|| self.raise(Exception::value_error("slice step cannot be zero")))
    }

    fn sequence_index(&self, index: &TreewalkValue, len: usize, kind: &str) -> TreewalkResult<usize> {
        let i = index.as_int().map_err(|_| {
            self.raise(Exception::type_error(format!(
                "{kind} indices must be integers or slices, not {}",
                index.type_name()
            )))
        })?;
        normalize_index(i, len)
            .ok_or_else(|| self.raise(Exception::index_error(format!("{kind} index out of range"))))
    }

    pub fn set_item(
        &self,
        object: &TreewalkValue,
        index: TreewalkValue,
        value: TreewalkValue,
    ) -> TreewalkResult<()> {
        match (object, &index) {
            (TreewalkValue::Stub(_), _) => Ok(()),
            (TreewalkValue::Dict(dict), _) => dict.borrow_mut().insert(index, value).raise(self),
            (TreewalkValue::List(list), TreewalkValue::Slice(slice)) => {
                let replacement = self.collect(&value)?;
                let mut list = list.borrow_mut();
                let len = list.len();
                match slice.step {
                    None | Some(1) => {
                        let indices = slice.indices(len).unwrap_or_default();
                        let start = indices.first().copied().unwrap_or_else(|| {
                            usize::try_from(wrap_negative(
                                slice.start.unwrap_or(0),
                                len,
                            ))
                            .unwrap_or(0)
                            .min(len)
                        });
                        let end = start + indices.len();
                        list.splice(start..end, replacement);
                        Ok(())
                    }
                    Some(_) => {
                        let indices = slice.indices(len).unwrap_or_default();
                        if indices.len() != replacement.len() {
                            return Exception::value_error(format!(
                                "attempt to assign sequence of size {} to extended slice of size {}",
                                replacement.len(),
                                indices.len()
                            ))
                            .raise(self);
                        }
                        for (i, item) in indices.into_iter().zip(replacement) {
                            list[i] = item;
                        }
                        Ok(())
                    }
                }
            }
            (TreewalkValue::List(list), _) => {
                let len = list.borrow().len();
                let i = self.sequence_index(&index, len, "list assignment")?;
                list.borrow_mut()[i] = value;
                Ok(())
            }
            (TreewalkValue::Object(_), _) => {
                self.call_method(object, "__setitem__", Args::positional(vec![index, value]))?;
                Ok(())
            }
            _ => Exception::type_error(format!(
                "'{}' object does not support item assignment",
                object.type_name()
            ))
            .raise(self),
        }
    }

    pub fn delete_item(&self, object: &TreewalkValue, index: &TreewalkValue) -> TreewalkResult<()> {
        match object {
            TreewalkValue::Dict(dict) => {
                let removed = dict.borrow_mut().remove(index).raise(self)?;
                match removed {
                    Some(_) => Ok(()),
                    None => Exception::key_error(index.clone()).raise(self),
                }
            }
            TreewalkValue::List(list) => {
                let len = list.borrow().len();
                match index {
                    TreewalkValue::Slice(slice) => {
                        let mut indices = slice.indices(len).unwrap_or_default();
                        indices.sort_unstable();
                        for i in indices.into_iter().rev() {
                            list.borrow_mut().remove(i);
                        }
                    }
                    _ => {
                        let i = self.sequence_index(index, len, "list assignment")?;
                        list.borrow_mut().remove(i);
                    }
                }
                Ok(())
            }
            TreewalkValue::Stub(_) => Ok(()),
            TreewalkValue::Object(_) => {
                self.call_method(object, "__delitem__", Args::positional(vec![index.clone()]))?;
                Ok(())
            }
            _ => Exception::type_error(format!(
                "'{}' object does not support item deletion",
                object.type_name()
            ))
            .raise(self),
        }
    }

    /// `type(value)`.
    pub fn type_of(&self, value: &TreewalkValue) -> TreewalkValue {
        match value {
            TreewalkValue::Object(object) => TreewalkValue::Class(object.borrow().class.clone()),
            TreewalkValue::Exception(exception) => match &exception.instance {
                Some(object) => TreewalkValue::Class(object.borrow().class.clone()),
                None => TreewalkValue::ExceptionType(exception.kind),
            },
            TreewalkValue::Stub(stub) => TreewalkValue::Stub(stub.attribute("__class__")),
            TreewalkValue::Class(_) | TreewalkValue::Type(_) | TreewalkValue::ExceptionType(_) => {
                TreewalkValue::Type(BuiltinType::Type)
            }
            _ => BuiltinType::all()
                .iter()
                .find(|t| t.name() == value.type_name())
                .map(|t| TreewalkValue::Type(*t))
                .unwrap_or(TreewalkValue::Type(BuiltinType::Object)),
        }
    }

    /// `isinstance(value, filter)` for one filter.
    pub fn is_instance(&self, value: &TreewalkValue, filter: &TreewalkValue) -> TreewalkResult<bool> {
        match filter {
            TreewalkValue::Tuple(filters) => {
                for filter in filters.iter() {
                    if self.is_instance(value, filter)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            TreewalkValue::Type(BuiltinType::Object) => Ok(true),
            TreewalkValue::Type(t) => Ok(!matches!(value, TreewalkValue::Object(_))
                && t.matches_type_name(&value.type_name())),
            TreewalkValue::Class(class) => Ok(match value {
                TreewalkValue::Object(object) => {
                    Class::is_subclass_of(&object.borrow().class, class)
                }
                TreewalkValue::Exception(exception) => match &exception.instance {
                    Some(object) => Class::is_subclass_of(&object.borrow().class, class),
                    None => false,
                },
                _ => false,
            }),
            TreewalkValue::ExceptionType(kind) => Ok(match value {
                TreewalkValue::Exception(exception) => exception.kind.is_subclass_of(kind),
                TreewalkValue::Object(object) => object
                    .borrow()
                    .class
                    .borrow()
                    .exception_kind
                    .is_some_and(|k| k.is_subclass_of(kind)),
                _ => false,
            }),
            TreewalkValue::Stub(_) => Ok(false),
            _ => Exception::type_error(
                "isinstance() arg 2 must be a type, a tuple of types, or a union",
            )
            .raise(self),
        }
    }

    /// Merge `other` into a dict, as `dict.update` and `|=` do.
    pub(crate) fn update_dict(
        &self,
        dict: &Container<Dict>,
        other: &TreewalkValue,
    ) -> TreewalkResult<()> {
        let pairs = match other {
            TreewalkValue::Dict(_) | TreewalkValue::Object(_) | TreewalkValue::Stub(_) => {
                self.mapping_items(other)?
            }
            _ => self
                .collect(other)?
                .into_iter()
                .map(|pair| {
                    let items = self.collect(&pair)?;
                    match <[TreewalkValue; 2]>::try_from(items) {
                        Ok([key, value]) => Ok((key, value)),
                        Err(_) => Exception::value_error(
                            "dictionary update sequence element has wrong length",
                        )
                        .raise(self),
                    }
                })
                .collect::<TreewalkResult<Vec<_>>>()?,
        };
        let mut dict = dict.borrow_mut();
        for (key, value) in pairs {
            dict.insert(key, value).raise(self)?;
        }
        Ok(())
    }
}
