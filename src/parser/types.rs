use crate::{
    domain::{FromImportPath, Identifier, ModulePath},
    lexer::Token,
};

pub type Ast = Vec<Statement>;

macro_rules! ast {
    ($($stmt:expr),* $(,)?) => {
        vec![$($stmt),*]
    };
}

pub(crate) use ast;

#[derive(Debug, PartialEq, Clone)]
pub struct Statement {
    /// The source line this statement starts on. Zero means "unknown", which only happens for
    /// synthesized nodes before locations are fixed.
    pub line: usize,
    pub kind: StatementKind,
}

impl Statement {
    pub fn new(line: usize, kind: StatementKind) -> Self {
        Self { line, kind }
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct ConditionalAst {
    pub condition: Expr,
    pub ast: Ast,
}

#[derive(Debug, PartialEq, Clone)]
pub struct ExceptHandler {
    pub exception: Option<Expr>,
    pub alias: Option<Identifier>,
    pub block: Ast,
}

impl ExceptHandler {
    pub fn default(block: Ast) -> Self {
        Self {
            exception: None,
            alias: None,
            block,
        }
    }

    pub fn typed(exception: Expr, alias: Option<Identifier>, block: Ast) -> Self {
        Self {
            exception: Some(exception),
            alias,
            block,
        }
    }

    pub fn is_default(&self) -> bool {
        self.exception.is_none()
    }
}

#[derive(Debug, PartialEq, Clone)]
pub enum RaiseKind {
    Reraise,
    Raise(Expr),
    RaiseFrom { exception: Expr, cause: Expr },
}

#[derive(Debug, PartialEq, Clone)]
pub struct RegularImport {
    pub module_path: ModulePath,
    pub alias: Option<Identifier>,
}

impl RegularImport {
    /// `import a.b` binds `a`, `import a.b as c` binds `c`.
    pub fn bound_name(&self) -> Option<&Identifier> {
        self.alias.as_ref().or_else(|| self.module_path.head())
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct FromImportItem {
    pub symbol: Identifier,
    pub alias: Option<Identifier>,
}

impl FromImportItem {
    pub fn direct(symbol: Identifier) -> Self {
        Self {
            symbol,
            alias: None,
        }
    }

    pub fn aliased(symbol: Identifier, alias: Identifier) -> Self {
        Self {
            symbol,
            alias: Some(alias),
        }
    }

    pub fn bound_name(&self) -> &Identifier {
        self.alias.as_ref().unwrap_or(&self.symbol)
    }
}

#[derive(Debug, PartialEq, Clone)]
pub enum FromImportMode {
    All,
    List(Vec<FromImportItem>),
}

#[derive(Debug, PartialEq, Clone)]
pub struct WithItem {
    pub expr: Expr,
    pub target: Option<Expr>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct Param {
    pub arg: Identifier,
    pub default: Option<Expr>,
}

#[derive(Debug, Default, PartialEq, Clone)]
pub struct Params {
    pub args: Vec<Param>,
    pub args_var: Option<Identifier>,
    pub kwonly_args: Vec<Param>,
    pub kwargs_var: Option<Identifier>,
}

#[derive(Debug, PartialEq, Clone)]
pub enum StatementKind {
    Expression(Expr),
    Assignment {
        left: Expr,
        right: Expr,
    },
    /// `a = b = value`
    MultipleAssignment {
        left: Vec<Expr>,
        right: Expr,
    },
    /// `a, b = value`
    UnpackingAssignment {
        left: Vec<Expr>,
        right: Expr,
    },
    CompoundAssignment {
        operator: BinOp,
        target: Box<Expr>,
        value: Box<Expr>,
    },
    AnnotatedAssignment {
        target: Expr,
        annotation: Expr,
        value: Option<Expr>,
    },
    IfElse {
        if_part: ConditionalAst,
        elif_parts: Vec<ConditionalAst>,
        else_part: Option<Ast>,
    },
    WhileLoop {
        body: ConditionalAst,
        else_block: Option<Ast>,
    },
    ForInLoop {
        index: Expr,
        iterable: Expr,
        body: Ast,
        else_block: Option<Ast>,
    },
    FunctionDef {
        name: Identifier,
        args: Params,
        body: Ast,
        decorators: Vec<Expr>,
        is_async: bool,
    },
    ClassDef {
        name: Identifier,
        parents: Vec<Expr>,
        keywords: Vec<(Identifier, Expr)>,
        body: Ast,
        decorators: Vec<Expr>,
    },
    Return(Option<Expr>),
    Pass,
    Break,
    Continue,
    Global(Vec<Identifier>),
    Nonlocal(Vec<Identifier>),
    Delete(Vec<Expr>),
    Assert {
        test: Expr,
        message: Option<Expr>,
    },
    TryExcept {
        try_block: Ast,
        handlers: Vec<ExceptHandler>,
        else_block: Option<Ast>,
        finally_block: Option<Ast>,
    },
    Raise(RaiseKind),
    ContextManager {
        items: Vec<WithItem>,
        block: Ast,
    },
    RegularImport(Vec<RegularImport>),
    SelectiveImport {
        import_path: FromImportPath,
        mode: FromImportMode,
    },
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    IntegerDiv,
    Mod,
    Expo,
    MatMul,
    LeftShift,
    RightShift,
    BitwiseAnd,
    BitwiseOr,
    BitwiseXor,
}

impl BinOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::IntegerDiv => "//",
            BinOp::Mod => "%",
            BinOp::Expo => "**",
            BinOp::MatMul => "@",
            BinOp::LeftShift => "<<",
            BinOp::RightShift => ">>",
            BinOp::BitwiseAnd => "&",
            BinOp::BitwiseOr => "|",
            BinOp::BitwiseXor => "^",
        }
    }

    /// The operator behind a compound assignment token such as `+=`.
    pub fn from_compound(token: &Token) -> Option<Self> {
        let op = match token {
            Token::PlusEquals => BinOp::Add,
            Token::MinusEquals => BinOp::Sub,
            Token::AsteriskEquals => BinOp::Mul,
            Token::SlashEquals => BinOp::Div,
            Token::DoubleSlashEquals => BinOp::IntegerDiv,
            Token::ModEquals => BinOp::Mod,
            Token::ExpoEquals => BinOp::Expo,
            Token::MatMulEquals => BinOp::MatMul,
            Token::LeftShiftEquals => BinOp::LeftShift,
            Token::RightShiftEquals => BinOp::RightShift,
            Token::BitwiseAndEquals => BinOp::BitwiseAnd,
            Token::BitwiseOrEquals => BinOp::BitwiseOr,
            Token::BitwiseXorEquals => BinOp::BitwiseXor,
            _ => return None,
        };
        Some(op)
    }
}

impl TryFrom<&Token> for BinOp {
    type Error = ();

    fn try_from(token: &Token) -> Result<Self, Self::Error> {
        let op = match token {
            Token::Plus => BinOp::Add,
            Token::Minus => BinOp::Sub,
            Token::Asterisk => BinOp::Mul,
            Token::Slash => BinOp::Div,
            Token::DoubleSlash => BinOp::IntegerDiv,
            Token::Modulo => BinOp::Mod,
            Token::DoubleAsterisk => BinOp::Expo,
            Token::AtSign => BinOp::MatMul,
            Token::LeftShift => BinOp::LeftShift,
            Token::RightShift => BinOp::RightShift,
            Token::BitwiseAnd => BinOp::BitwiseAnd,
            Token::BitwiseOr => BinOp::BitwiseOr,
            Token::BitwiseXor => BinOp::BitwiseXor,
            _ => return Err(()),
        };
        Ok(op)
    }
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum CompareOp {
    Equals,
    NotEquals,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    In,
    NotIn,
    Is,
    IsNot,
}

impl TryFrom<&Token> for CompareOp {
    type Error = ();

    fn try_from(token: &Token) -> Result<Self, Self::Error> {
        let op = match token {
            Token::Equal => CompareOp::Equals,
            Token::NotEqual => CompareOp::NotEquals,
            Token::LessThan => CompareOp::LessThan,
            Token::LessThanOrEqual => CompareOp::LessThanOrEqual,
            Token::GreaterThan => CompareOp::GreaterThan,
            Token::GreaterThanOrEqual => CompareOp::GreaterThanOrEqual,
            Token::In => CompareOp::In,
            Token::Is => CompareOp::Is,
            _ => return Err(()),
        };
        Ok(op)
    }
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum UnaryOp {
    Minus,
    Plus,
    Not,
    BitwiseNot,
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Debug, PartialEq, Clone)]
pub struct SliceParams {
    pub start: Option<Expr>,
    pub stop: Option<Expr>,
    pub step: Option<Expr>,
}

#[derive(Debug, PartialEq, Clone)]
pub enum CallArg {
    Positional(Expr),
    Keyword { arg: Identifier, expr: Expr },
    /// `*iterable`
    Unpack(Expr),
    /// `**mapping`
    KwargsUnpack(Expr),
}

/// Arguments in source order, so `f(a, *b, c=1, **d)` is forwarded exactly as written.
#[derive(Debug, Default, PartialEq, Clone)]
pub struct CallArgs {
    pub args: Vec<CallArg>,
}

impl CallArgs {
    pub fn positional(args: Vec<Expr>) -> Self {
        Self {
            args: args.into_iter().map(CallArg::Positional).collect(),
        }
    }

    pub fn keyword(&self, name: &str) -> Option<&Expr> {
        self.args.iter().find_map(|arg| match arg {
            CallArg::Keyword { arg, expr } if arg.as_str() == name => Some(expr),
            _ => None,
        })
    }

    pub fn positional_at(&self, index: usize) -> Option<&Expr> {
        self.args
            .iter()
            .filter_map(|arg| match arg {
                CallArg::Positional(expr) => Some(expr),
                _ => None,
            })
            .nth(index)
    }

    pub fn has_unpacking(&self) -> bool {
        self.args
            .iter()
            .any(|arg| matches!(arg, CallArg::Unpack(_) | CallArg::KwargsUnpack(_)))
    }
}

#[derive(Debug, PartialEq, Clone)]
pub enum DictOperation {
    Pair(Expr, Expr),
    Unpack(Expr),
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum FormatOption {
    Str,
    Repr,
    Ascii,
}

#[derive(Debug, PartialEq, Clone)]
pub struct ExprFormat {
    pub expr: Box<Expr>,
    pub format: FormatOption,
    pub spec: Option<String>,
}

#[derive(Debug, PartialEq, Clone)]
pub enum FStringPart {
    String(String),
    Expr(ExprFormat),
}

#[derive(Debug, PartialEq, Clone)]
pub struct ForClause {
    pub target: Expr,
    pub iterable: Expr,
    pub conditions: Vec<Expr>,
}

#[derive(Debug, PartialEq, Clone)]
pub enum Expr {
    None,
    Ellipsis,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    StringLiteral(String),
    BytesLiteral(Vec<u8>),
    FString(Vec<FStringPart>),
    Variable(Identifier),
    List(Vec<Expr>),
    Tuple(Vec<Expr>),
    Set(Vec<Expr>),
    Dict(Vec<DictOperation>),
    Starred(Box<Expr>),
    MemberAccess {
        object: Box<Expr>,
        field: Identifier,
    },
    IndexAccess {
        object: Box<Expr>,
        index: Box<Expr>,
    },
    SliceOperation {
        object: Box<Expr>,
        params: Box<SliceParams>,
    },
    FunctionCall {
        callee: Box<Expr>,
        args: CallArgs,
    },
    UnaryOperation {
        op: UnaryOp,
        right: Box<Expr>,
    },
    BinaryOperation {
        left: Box<Expr>,
        op: BinOp,
        right: Box<Expr>,
    },
    LogicalOperation {
        left: Box<Expr>,
        op: LogicalOp,
        right: Box<Expr>,
    },
    ComparisonChain {
        left: Box<Expr>,
        ops: Vec<(CompareOp, Expr)>,
    },
    TernaryOp {
        condition: Box<Expr>,
        if_value: Box<Expr>,
        else_value: Box<Expr>,
    },
    Lambda {
        args: Params,
        expr: Box<Expr>,
    },
    NamedExpr {
        target: Identifier,
        value: Box<Expr>,
    },
    ListComprehension {
        body: Box<Expr>,
        clauses: Vec<ForClause>,
    },
    SetComprehension {
        body: Box<Expr>,
        clauses: Vec<ForClause>,
    },
    DictComprehension {
        key_body: Box<Expr>,
        value_body: Box<Expr>,
        clauses: Vec<ForClause>,
    },
    GeneratorComprehension {
        body: Box<Expr>,
        clauses: Vec<ForClause>,
    },
    Yield(Option<Box<Expr>>),
    YieldFrom(Box<Expr>),
}

impl Expr {
    pub fn var(name: &Identifier) -> Self {
        Expr::Variable(name.clone())
    }

    pub fn call(callee: Expr, args: CallArgs) -> Self {
        Expr::FunctionCall {
            callee: Box::new(callee),
            args,
        }
    }

    pub fn as_variable(&self) -> Option<&Identifier> {
        match self {
            Expr::Variable(name) => Some(name),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&str> {
        match self {
            Expr::StringLiteral(s) => Some(s),
            _ => None,
        }
    }

    /// The dotted name this expression spells, if it is a plain `a.b.c` chain of names.
    pub fn as_dotted_name(&self) -> Option<Vec<&Identifier>> {
        match self {
            Expr::Variable(name) => Some(vec![name]),
            Expr::MemberAccess { object, field } => {
                let mut path = object.as_dotted_name()?;
                path.push(field);
                Some(path)
            }
            _ => None,
        }
    }

    /// Direct subexpressions, excluding the body of a lambda, which runs in its own frame.
    pub fn children(&self) -> Vec<&Expr> {
        fn clause_exprs(clauses: &[ForClause]) -> impl Iterator<Item = &Expr> {
            clauses.iter().flat_map(|clause| {
                [&clause.target, &clause.iterable]
                    .into_iter()
                    .chain(clause.conditions.iter())
            })
        }

        match self {
            Expr::None
            | Expr::Ellipsis
            | Expr::Boolean(_)
            | Expr::Integer(_)
            | Expr::Float(_)
            | Expr::StringLiteral(_)
            | Expr::BytesLiteral(_)
            | Expr::Variable(_)
            | Expr::Yield(None) => vec![],
            Expr::FString(parts) => parts
                .iter()
                .filter_map(|part| match part {
                    FStringPart::Expr(format) => Some(format.expr.as_ref()),
                    FStringPart::String(_) => None,
                })
                .collect(),
            Expr::List(items) | Expr::Tuple(items) | Expr::Set(items) => items.iter().collect(),
            Expr::Dict(ops) => ops
                .iter()
                .flat_map(|op| match op {
                    DictOperation::Pair(key, value) => vec![key, value],
                    DictOperation::Unpack(expr) => vec![expr],
                })
                .collect(),
            Expr::Starred(inner)
            | Expr::UnaryOperation { right: inner, .. }
            | Expr::NamedExpr { value: inner, .. }
            | Expr::YieldFrom(inner)
            | Expr::Yield(Some(inner))
            | Expr::MemberAccess { object: inner, .. } => vec![inner.as_ref()],
            Expr::IndexAccess { object, index } => vec![object.as_ref(), index.as_ref()],
            Expr::SliceOperation { object, params } => {
                let mut children = vec![object.as_ref()];
                children.extend(
                    [&params.start, &params.stop, &params.step]
                        .into_iter()
                        .flatten(),
                );
                children
            }
            Expr::FunctionCall { callee, args } => {
                let mut children = vec![callee.as_ref()];
                children.extend(args.args.iter().map(|arg| match arg {
                    CallArg::Positional(expr)
                    | CallArg::Keyword { expr, .. }
                    | CallArg::Unpack(expr)
                    | CallArg::KwargsUnpack(expr) => expr,
                }));
                children
            }
            Expr::BinaryOperation { left, right, .. }
            | Expr::LogicalOperation { left, right, .. } => vec![left.as_ref(), right.as_ref()],
            Expr::ComparisonChain { left, ops } => {
                let mut children = vec![left.as_ref()];
                children.extend(ops.iter().map(|(_, expr)| expr));
                children
            }
            Expr::TernaryOp {
                condition,
                if_value,
                else_value,
            } => vec![condition.as_ref(), if_value.as_ref(), else_value.as_ref()],
            Expr::Lambda { args, .. } => args
                .args
                .iter()
                .chain(args.kwonly_args.iter())
                .filter_map(|param| param.default.as_ref())
                .collect(),
            Expr::ListComprehension { body, clauses }
            | Expr::SetComprehension { body, clauses }
            | Expr::GeneratorComprehension { body, clauses } => {
                let mut children = vec![body.as_ref()];
                children.extend(clause_exprs(clauses));
                children
            }
            Expr::DictComprehension {
                key_body,
                value_body,
                clauses,
            } => {
                let mut children = vec![key_body.as_ref(), value_body.as_ref()];
                children.extend(clause_exprs(clauses));
                children
            }
        }
    }

    /// Whether this expression may appear on the left-hand side of an assignment.
    pub fn is_assignable(&self) -> bool {
        match self {
            Expr::Variable(_)
            | Expr::MemberAccess { .. }
            | Expr::IndexAccess { .. }
            | Expr::SliceOperation { .. } => true,
            Expr::Starred(inner) => inner.is_assignable(),
            Expr::Tuple(items) | Expr::List(items) => items.iter().all(Expr::is_assignable),
            _ => false,
        }
    }
}
