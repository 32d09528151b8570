//! Shorthand constructors for expected trees.

macro_rules! ident {
    ($name:expr) => {
        crate::domain::Identifier::new($name).expect("Invalid identifier")
    };
}

macro_rules! var {
    ($name:expr) => {
        crate::parser::types::Expr::Variable(ident!($name))
    };
}

macro_rules! int {
    ($val:expr) => {
        crate::parser::types::Expr::Integer($val)
    };
}

macro_rules! str {
    ($val:expr) => {
        crate::parser::types::Expr::StringLiteral($val.to_string())
    };
}

macro_rules! bool {
    ($val:expr) => {
        crate::parser::types::Expr::Boolean($val)
    };
}

macro_rules! list {
    ($($item:expr),* $(,)?) => {
        crate::parser::types::Expr::List(vec![$($item),*])
    };
}

macro_rules! tuple {
    ($($item:expr),* $(,)?) => {
        crate::parser::types::Expr::Tuple(vec![$($item),*])
    };
}

macro_rules! bin_op {
    ($left:expr, $op:ident, $right:expr) => {
        crate::parser::types::Expr::BinaryOperation {
            left: Box::new($left),
            op: crate::parser::types::BinOp::$op,
            right: Box::new($right),
        }
    };
}

macro_rules! member_access {
    ($object:expr, $field:expr) => {
        crate::parser::types::Expr::MemberAccess {
            object: Box::new($object),
            field: ident!($field),
        }
    };
}

macro_rules! call {
    ($callee:expr) => {
        crate::parser::types::Expr::call($callee, crate::parser::types::CallArgs::default())
    };
    ($callee:expr, $args:expr) => {
        crate::parser::types::Expr::call($callee, $args)
    };
}

macro_rules! stmt {
    ($kind:expr) => {
        crate::parser::types::Statement::new(0, $kind)
    };
}

macro_rules! stmt_expr {
    ($expr:expr) => {
        stmt!(crate::parser::types::StatementKind::Expression($expr))
    };
}

macro_rules! stmt_assign {
    ($left:expr, $right:expr) => {
        stmt!(crate::parser::types::StatementKind::Assignment {
            left: $left,
            right: $right,
        })
    };
}

pub(crate) use bin_op;
pub(crate) use bool;
pub(crate) use call;
pub(crate) use ident;
pub(crate) use int;
pub(crate) use list;
pub(crate) use member_access;
pub(crate) use stmt;
pub(crate) use stmt_assign;
pub(crate) use stmt_expr;
pub(crate) use str;
pub(crate) use tuple;
pub(crate) use var;
