use crate::lexer::{SpannedToken, Token};

/// A cursor over an already-lexed token stream. The lexer always terminates the stream with
/// [`Token::Eof`], so peeking past the end keeps returning it.
pub struct TokenBuffer<'a> {
    tokens: &'a [SpannedToken],
    position: usize,
}

impl<'a> TokenBuffer<'a> {
    pub fn new(tokens: &'a [SpannedToken]) -> Self {
        Self {
            tokens,
            position: 0,
        }
    }

    /// Look `n` tokens ahead of the cursor without consuming anything.
    pub fn peek(&self, n: usize) -> &Token {
        self.tokens
            .get(self.position + n)
            .or_else(|| self.tokens.last())
            .map(|spanned| &spanned.token)
            .unwrap_or(&Token::Eof)
    }

    /// The line of the token under the cursor.
    pub fn line(&self) -> usize {
        self.tokens
            .get(self.position)
            .or_else(|| self.tokens.last())
            .map(|spanned| spanned.line)
            .unwrap_or(1)
    }

    /// The most recently consumed token, if any.
    pub fn previous(&self) -> Option<&Token> {
        self.position
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .map(|spanned| &spanned.token)
    }

    pub fn consume(&mut self) {
        if self.position < self.tokens.len() {
            self.position += 1;
        }
    }

    /// Whether the upcoming tokens match `expected` in order.
    pub fn peek_ahead_contains(&self, expected: &[Token]) -> bool {
        expected
            .iter()
            .enumerate()
            .all(|(i, token)| self.peek(i) == token)
    }

    pub fn is_exhausted(&self) -> bool {
        self.peek(0) == &Token::Eof
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::{domain::Text, lexer::Lexer};

    fn tokens(input: &str) -> Vec<SpannedToken> {
        Lexer::new(&Text::new(input))
            .tokenize()
            .expect("Failed to tokenize")
    }

    #[test]
    fn peek_does_not_consume() {
        let tokens = tokens("a = 1");
        let buffer = TokenBuffer::new(&tokens);
        assert_eq!(buffer.peek(1), &Token::Assign);
        assert_eq!(buffer.peek(1), &Token::Assign);
        assert!(!buffer.peek_ahead_contains(&[Token::Assign, Token::Integer(1)]));

        let a = Token::Identifier(crate::domain::Identifier::new("a").unwrap());
        assert!(buffer.peek_ahead_contains(&[a, Token::Assign, Token::Integer(1)]));
    }

    #[test]
    fn peek_past_end_is_eof() {
        let tokens = tokens("a");
        let mut buffer = TokenBuffer::new(&tokens);
        for _ in 0..10 {
            buffer.consume();
        }
        assert!(buffer.is_exhausted());
        assert_eq!(buffer.peek(3), &Token::Eof);
    }

    #[test]
    fn line_follows_cursor() {
        let tokens = tokens("a\nb\n");
        let mut buffer = TokenBuffer::new(&tokens);
        assert_eq!(buffer.line(), 1);
        buffer.consume();
        buffer.consume();
        assert_eq!(buffer.line(), 2);
    }
}
