use crate::domain::Identifier;

#[derive(Debug, PartialEq, Clone)]
pub enum Token {
    // Literals and names
    Identifier(Identifier),
    Integer(i64),
    FloatingPoint(f64),
    StringLiteral(String),
    BytesLiteral(Vec<u8>),
    /// The body of an f-string with escapes already processed. Replacement fields are parsed
    /// later by the parser.
    FStringLiteral(String),
    BooleanLiteral(bool),
    None,

    // Keywords
    And,
    As,
    Assert,
    Async,
    Await,
    Break,
    Class,
    Continue,
    Def,
    Del,
    Elif,
    Else,
    Except,
    Finally,
    For,
    From,
    Global,
    If,
    Import,
    In,
    Is,
    Lambda,
    Nonlocal,
    Not,
    Or,
    Pass,
    Raise,
    Return,
    Try,
    While,
    With,
    Yield,

    // Operators
    Plus,
    Minus,
    Asterisk,
    DoubleAsterisk,
    Slash,
    DoubleSlash,
    Modulo,
    AtSign,
    LeftShift,
    RightShift,
    BitwiseAnd,
    BitwiseOr,
    BitwiseXor,
    BitwiseNot,
    LessThan,
    GreaterThan,
    LessThanOrEqual,
    GreaterThanOrEqual,
    Equal,
    NotEqual,
    Walrus,

    // Assignment
    Assign,
    PlusEquals,
    MinusEquals,
    AsteriskEquals,
    SlashEquals,
    DoubleSlashEquals,
    ModEquals,
    ExpoEquals,
    MatMulEquals,
    BitwiseAndEquals,
    BitwiseOrEquals,
    BitwiseXorEquals,
    LeftShiftEquals,
    RightShiftEquals,

    // Delimiters
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Semicolon,
    Dot,
    Ellipsis,
    ReturnTypeArrow,

    // Layout
    Newline,
    Indent,
    Dedent,
    Eof,
}

impl Token {
    pub fn is_compound_assign(&self) -> bool {
        matches!(
            self,
            Token::PlusEquals
                | Token::MinusEquals
                | Token::AsteriskEquals
                | Token::SlashEquals
                | Token::DoubleSlashEquals
                | Token::ModEquals
                | Token::ExpoEquals
                | Token::MatMulEquals
                | Token::BitwiseAndEquals
                | Token::BitwiseOrEquals
                | Token::BitwiseXorEquals
                | Token::LeftShiftEquals
                | Token::RightShiftEquals
        )
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Token::StringLiteral(_) | Token::FStringLiteral(_))
    }

    pub fn keyword(word: &str) -> Option<Token> {
        let token = match word {
            "False" => Token::BooleanLiteral(false),
            "True" => Token::BooleanLiteral(true),
            "None" => Token::None,
            "and" => Token::And,
            "as" => Token::As,
            "assert" => Token::Assert,
            "async" => Token::Async,
            "await" => Token::Await,
            "break" => Token::Break,
            "class" => Token::Class,
            "continue" => Token::Continue,
            "def" => Token::Def,
            "del" => Token::Del,
            "elif" => Token::Elif,
            "else" => Token::Else,
            "except" => Token::Except,
            "finally" => Token::Finally,
            "for" => Token::For,
            "from" => Token::From,
            "global" => Token::Global,
            "if" => Token::If,
            "import" => Token::Import,
            "in" => Token::In,
            "is" => Token::Is,
            "lambda" => Token::Lambda,
            "nonlocal" => Token::Nonlocal,
            "not" => Token::Not,
            "or" => Token::Or,
            "pass" => Token::Pass,
            "raise" => Token::Raise,
            "return" => Token::Return,
            "try" => Token::Try,
            "while" => Token::While,
            "with" => Token::With,
            "yield" => Token::Yield,
            _ => return None,
        };
        Some(token)
    }
}

/// A token together with the line it started on.
#[derive(Debug, PartialEq, Clone)]
pub struct SpannedToken {
    pub token: Token,
    pub line: usize,
}
