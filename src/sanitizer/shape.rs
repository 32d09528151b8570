use crate::parser::types::{Expr, StatementKind};

/// The coarse classification the rewrite rules are keyed on. Anything that no rule cares about is
/// `Other` and passes through the neutralizer untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeShape<'a> {
    Import,
    CallOf(CallTarget<'a>),
    Other,
}

/// How a call names its callee.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallTarget<'a> {
    /// `open(...)`
    Bare(&'a str),
    /// `setuptools.setup(...)`: the first and final segments of the path.
    Dotted { root: &'a str, name: &'a str },
}

impl<'a> CallTarget<'a> {
    pub fn name(&self) -> &'a str {
        match self {
            CallTarget::Bare(name) | CallTarget::Dotted { name, .. } => name,
        }
    }

    pub fn is_bare(&self) -> bool {
        matches!(self, CallTarget::Bare(_))
    }
}

impl<'a> NodeShape<'a> {
    pub fn of_statement(kind: &'a StatementKind) -> Self {
        match kind {
            StatementKind::RegularImport(_) | StatementKind::SelectiveImport { .. } => {
                NodeShape::Import
            }
            _ => NodeShape::Other,
        }
    }

    pub fn of_expr(expr: &'a Expr) -> Self {
        let Expr::FunctionCall { callee, .. } = expr else {
            return NodeShape::Other;
        };

        match callee.as_ref() {
            Expr::Variable(name) => NodeShape::CallOf(CallTarget::Bare(name.as_str())),
            Expr::MemberAccess { field, .. } => match callee
                .as_dotted_name()
                .and_then(|path| path.first().copied())
            {
                Some(root) => NodeShape::CallOf(CallTarget::Dotted {
                    root: root.as_str(),
                    name: field.as_str(),
                }),
                _ => NodeShape::Other,
            },
            _ => NodeShape::Other,
        }
    }
}
