use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum LexerError {
    #[error("line {line}: unexpected character {character:?}")]
    UnexpectedCharacter { line: usize, character: char },
    #[error("line {line}: invalid token: {token}")]
    InvalidToken { line: usize, token: String },
    #[error("line {line}: unterminated string literal")]
    UnterminatedString { line: usize },
    #[error("line {line}: unindent does not match any outer indentation level")]
    InconsistentDedent { line: usize },
}

impl LexerError {
    pub fn line(&self) -> usize {
        match self {
            LexerError::UnexpectedCharacter { line, .. }
            | LexerError::InvalidToken { line, .. }
            | LexerError::UnterminatedString { line }
            | LexerError::InconsistentDedent { line } => *line,
        }
    }
}

pub type LexerResult<T> = Result<T, LexerError>;
