use crate::{
    core::{log, LogLevel},
    domain::{Identifier, Text},
    lexer::{LexerError, LexerResult, SpannedToken, Token},
};

const TAB_WIDTH: usize = 8;

/// Turns Python source into a flat token stream, including the synthetic `Newline`, `Indent`,
/// and `Dedent` tokens which encode block structure.
pub struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    indent_stack: Vec<usize>,
    delimiter_depth: usize,
    at_line_start: bool,
    tokens: Vec<SpannedToken>,
}

#[derive(Default, Clone, Copy)]
struct StringPrefix {
    raw: bool,
    bytes: bool,
    format: bool,
}

impl StringPrefix {
    fn parse(word: &str) -> Option<Self> {
        let lower = word.to_ascii_lowercase();
        if lower.is_empty() || lower.len() > 2 {
            return None;
        }
        let mut prefix = StringPrefix::default();
        for c in lower.chars() {
            match c {
                'r' if !prefix.raw => prefix.raw = true,
                'b' if !prefix.bytes && !prefix.format => prefix.bytes = true,
                'f' if !prefix.format && !prefix.bytes => prefix.format = true,
                'u' if lower.len() == 1 => {}
                _ => return None,
            }
        }
        Some(prefix)
    }
}

impl Lexer {
    pub fn new(text: &Text) -> Self {
        Self {
            chars: text.as_str().chars().collect(),
            pos: 0,
            line: 1,
            indent_stack: vec![0],
            delimiter_depth: 0,
            at_line_start: true,
            tokens: vec![],
        }
    }

    pub fn tokenize(mut self) -> LexerResult<Vec<SpannedToken>> {
        while !self.is_finished() {
            if self.at_line_start && self.delimiter_depth == 0 {
                self.handle_indentation()?;
                continue;
            }

            let c = self.current();
            match c {
                ' ' | '\t' | '\r' | '\x0c' => self.advance(),
                '\n' => {
                    self.advance();
                    if self.delimiter_depth == 0 {
                        self.emit_newline();
                        self.at_line_start = true;
                    }
                    self.line += 1;
                }
                '#' => self.skip_comment(),
                '\\' => self.line_continuation()?,
                '"' | '\'' => {
                    let line = self.line;
                    let token = self.read_string(StringPrefix::default())?;
                    self.push_at(token, line);
                }
                c if c.is_ascii_digit() => {
                    let token = self.read_number()?;
                    self.push(token);
                }
                '.' if self.peek(1).is_some_and(|n| n.is_ascii_digit()) => {
                    let token = self.read_number()?;
                    self.push(token);
                }
                c if c.is_alphabetic() || c == '_' => self.read_word()?,
                _ => self.read_operator()?,
            }
        }

        self.emit_newline();
        while self.indent_stack.len() > 1 {
            self.indent_stack.pop();
            self.push(Token::Dedent);
        }
        self.push(Token::Eof);

        log(LogLevel::Trace, || {
            format!("Lexed {} tokens", self.tokens.len())
        });
        Ok(self.tokens)
    }

    fn is_finished(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn current(&self) -> char {
        self.chars[self.pos]
    }

    fn peek(&self, n: usize) -> Option<char> {
        self.chars.get(self.pos + n).copied()
    }

    fn advance(&mut self) {
        self.pos += 1;
    }

    fn push(&mut self, token: Token) {
        self.push_at(token, self.line);
    }

    fn push_at(&mut self, token: Token, line: usize) {
        self.tokens.push(SpannedToken { token, line });
    }

    /// Newlines are only significant after a statement, so blank lines and comment-only lines
    /// never produce one.
    fn emit_newline(&mut self) {
        match self.tokens.last() {
            None => {}
            Some(last) if matches!(last.token, Token::Newline) => {}
            Some(_) => self.push(Token::Newline),
        }
    }

    fn handle_indentation(&mut self) -> LexerResult<()> {
        let mut column = 0;
        while let Some(c) = self.peek(0) {
            match c {
                ' ' => column += 1,
                '\t' => column = (column / TAB_WIDTH + 1) * TAB_WIDTH,
                '\x0c' => column = 0,
                _ => break,
            }
            self.advance();
        }

        self.at_line_start = false;

        // Blank and comment-only lines do not affect indentation.
        if matches!(self.peek(0), None | Some('\n') | Some('#') | Some('\r')) {
            return Ok(());
        }

        let current = self.indent_stack.last().copied().unwrap_or(0);
        if column > current {
            self.indent_stack.push(column);
            self.push(Token::Indent);
        } else if column < current {
            while self.indent_stack.last().is_some_and(|top| *top > column) {
                self.indent_stack.pop();
                self.push(Token::Dedent);
            }
            if self.indent_stack.last() != Some(&column) {
                return Err(LexerError::InconsistentDedent { line: self.line });
            }
        }

        Ok(())
    }

    fn skip_comment(&mut self) {
        while !self.is_finished() && self.current() != '\n' {
            self.advance();
        }
    }

    fn line_continuation(&mut self) -> LexerResult<()> {
        self.advance();
        if self.peek(0) == Some('\r') {
            self.advance();
        }
        match self.peek(0) {
            Some('\n') => {
                self.advance();
                self.line += 1;
                Ok(())
            }
            None => Ok(()),
            Some(c) => Err(LexerError::UnexpectedCharacter {
                line: self.line,
                character: c,
            }),
        }
    }

    fn read_word(&mut self) -> LexerResult<()> {
        let start = self.pos;
        while self
            .peek(0)
            .is_some_and(|c| c.is_alphanumeric() || c == '_')
        {
            self.advance();
        }
        let word: String = self.chars[start..self.pos].iter().collect();

        if matches!(self.peek(0), Some('"') | Some('\'')) {
            if let Some(prefix) = StringPrefix::parse(&word) {
                let line = self.line;
                let token = self.read_string(prefix)?;
                self.push_at(token, line);
                return Ok(());
            }
        }

        let token = match Token::keyword(&word) {
            Some(keyword) => keyword,
            None => {
                let ident = Identifier::new(word).map_err(|e| LexerError::InvalidToken {
                    line: self.line,
                    token: e.0,
                })?;
                Token::Identifier(ident)
            }
        };
        self.push(token);
        Ok(())
    }

    fn read_string(&mut self, prefix: StringPrefix) -> LexerResult<Token> {
        let start_line = self.line;
        let quote = self.current();
        let triple = self.peek(1) == Some(quote) && self.peek(2) == Some(quote);
        self.pos += if triple { 3 } else { 1 };

        let mut value = String::new();
        loop {
            let Some(c) = self.peek(0) else {
                return Err(LexerError::UnterminatedString { line: start_line });
            };

            if c == quote {
                if !triple {
                    self.advance();
                    break;
                }
                if self.peek(1) == Some(quote) && self.peek(2) == Some(quote) {
                    self.pos += 3;
                    break;
                }
                value.push(c);
                self.advance();
                continue;
            }

            match c {
                '\n' if !triple => {
                    return Err(LexerError::UnterminatedString { line: start_line });
                }
                '\n' => {
                    self.line += 1;
                    value.push(c);
                    self.advance();
                }
                '\\' => {
                    self.advance();
                    let Some(escaped) = self.peek(0) else {
                        return Err(LexerError::UnterminatedString { line: start_line });
                    };
                    if prefix.raw {
                        value.push('\\');
                        value.push(escaped);
                        if escaped == '\n' {
                            self.line += 1;
                        }
                        self.advance();
                    } else {
                        self.read_escape(&mut value)?;
                    }
                }
                _ => {
                    value.push(c);
                    self.advance();
                }
            }
        }

        Ok(if prefix.bytes {
            Token::BytesLiteral(value.chars().map(|c| c as u32 as u8).collect())
        } else if prefix.format {
            Token::FStringLiteral(value)
        } else {
            Token::StringLiteral(value)
        })
    }

    /// Process the escape sequence following a backslash, which has already been consumed.
    fn read_escape(&mut self, value: &mut String) -> LexerResult<()> {
        let c = self.current();
        self.advance();
        match c {
            '\n' => self.line += 1,
            'n' => value.push('\n'),
            't' => value.push('\t'),
            'r' => value.push('\r'),
            '0'..='7' => {
                let mut digits = c.to_string();
                while digits.len() < 3 && self.peek(0).is_some_and(|d| ('0'..='7').contains(&d)) {
                    digits.push(self.current());
                    self.advance();
                }
                value.push(self.code_point(&digits, 8)?);
            }
            'x' => {
                let digits = self.take_hex_digits(2)?;
                value.push(self.code_point(&digits, 16)?);
            }
            'u' => {
                let digits = self.take_hex_digits(4)?;
                value.push(self.code_point(&digits, 16)?);
            }
            'U' => {
                let digits = self.take_hex_digits(8)?;
                value.push(self.code_point(&digits, 16)?);
            }
            'a' => value.push('\x07'),
            'b' => value.push('\x08'),
            'f' => value.push('\x0c'),
            'v' => value.push('\x0b'),
            '\\' | '\'' | '"' => value.push(c),
            other => {
                value.push('\\');
                value.push(other);
            }
        }
        Ok(())
    }

    fn take_hex_digits(&mut self, count: usize) -> LexerResult<String> {
        let mut digits = String::new();
        for _ in 0..count {
            match self.peek(0) {
                Some(d) if d.is_ascii_hexdigit() => {
                    digits.push(d);
                    self.advance();
                }
                _ => {
                    return Err(LexerError::InvalidToken {
                        line: self.line,
                        token: format!("\\x{digits}"),
                    })
                }
            }
        }
        Ok(digits)
    }

    fn code_point(&self, digits: &str, radix: u32) -> LexerResult<char> {
        u32::from_str_radix(digits, radix)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| LexerError::InvalidToken {
                line: self.line,
                token: digits.to_string(),
            })
    }

    fn read_number(&mut self) -> LexerResult<Token> {
        let start = self.pos;

        if self.current() == '0' {
            let radix = match self.peek(1) {
                Some('x') | Some('X') => Some(16),
                Some('o') | Some('O') => Some(8),
                Some('b') | Some('B') => Some(2),
                _ => None,
            };
            if let Some(radix) = radix {
                self.pos += 2;
                while self.peek(0).is_some_and(|c| c.is_ascii_alphanumeric() || c == '_') {
                    self.advance();
                }
                let literal: String = self.chars[start..self.pos].iter().collect();
                let digits = literal[2..].replace('_', "");
                return i64::from_str_radix(&digits, radix)
                    .map(Token::Integer)
                    .map_err(|_| self.invalid(literal));
            }
        }

        let mut is_float = false;
        self.take_digits();
        if self.peek(0) == Some('.') && !matches!(self.peek(1), Some('.')) {
            is_float = true;
            self.advance();
            self.take_digits();
        }
        if matches!(self.peek(0), Some('e') | Some('E')) {
            let sign_offset = usize::from(matches!(self.peek(1), Some('+') | Some('-')));
            if self.peek(1 + sign_offset).is_some_and(|c| c.is_ascii_digit()) {
                is_float = true;
                self.pos += 1 + sign_offset;
                self.take_digits();
            }
        }

        let literal: String = self.chars[start..self.pos].iter().collect();
        if self.peek(0).is_some_and(|c| c.is_alphabetic() || c == '_') {
            return Err(self.invalid(format!("{literal}{}", self.current())));
        }

        let digits = literal.replace('_', "");
        if is_float {
            digits
                .parse::<f64>()
                .map(Token::FloatingPoint)
                .map_err(|_| self.invalid(literal))
        } else {
            digits
                .parse::<i64>()
                .map(Token::Integer)
                .map_err(|_| self.invalid(literal))
        }
    }

    fn take_digits(&mut self) {
        while self.peek(0).is_some_and(|c| c.is_ascii_digit() || c == '_') {
            self.advance();
        }
    }

    fn invalid(&self, token: String) -> LexerError {
        LexerError::InvalidToken {
            line: self.line,
            token,
        }
    }

    fn read_operator(&mut self) -> LexerResult<()> {
        let c = self.current();
        let next = self.peek(1);
        let third = self.peek(2);

        let three = match (c, next, third) {
            ('*', Some('*'), Some('=')) => Some(Token::ExpoEquals),
            ('/', Some('/'), Some('=')) => Some(Token::DoubleSlashEquals),
            ('>', Some('>'), Some('=')) => Some(Token::RightShiftEquals),
            ('<', Some('<'), Some('=')) => Some(Token::LeftShiftEquals),
            ('.', Some('.'), Some('.')) => Some(Token::Ellipsis),
            _ => None,
        };
        if let Some(token) = three {
            self.pos += 3;
            self.push(token);
            return Ok(());
        }

        let two = match (c, next) {
            ('*', Some('*')) => Some(Token::DoubleAsterisk),
            ('/', Some('/')) => Some(Token::DoubleSlash),
            ('<', Some('<')) => Some(Token::LeftShift),
            ('>', Some('>')) => Some(Token::RightShift),
            ('<', Some('=')) => Some(Token::LessThanOrEqual),
            ('>', Some('=')) => Some(Token::GreaterThanOrEqual),
            ('=', Some('=')) => Some(Token::Equal),
            ('!', Some('=')) => Some(Token::NotEqual),
            ('-', Some('>')) => Some(Token::ReturnTypeArrow),
            ('+', Some('=')) => Some(Token::PlusEquals),
            ('-', Some('=')) => Some(Token::MinusEquals),
            ('*', Some('=')) => Some(Token::AsteriskEquals),
            ('/', Some('=')) => Some(Token::SlashEquals),
            ('%', Some('=')) => Some(Token::ModEquals),
            ('@', Some('=')) => Some(Token::MatMulEquals),
            ('&', Some('=')) => Some(Token::BitwiseAndEquals),
            ('|', Some('=')) => Some(Token::BitwiseOrEquals),
            ('^', Some('=')) => Some(Token::BitwiseXorEquals),
            (':', Some('=')) => Some(Token::Walrus),
            _ => None,
        };
        if let Some(token) = two {
            self.pos += 2;
            self.push(token);
            return Ok(());
        }

        let token = match c {
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Asterisk,
            '/' => Token::Slash,
            '%' => Token::Modulo,
            '@' => Token::AtSign,
            '&' => Token::BitwiseAnd,
            '|' => Token::BitwiseOr,
            '^' => Token::BitwiseXor,
            '~' => Token::BitwiseNot,
            '<' => Token::LessThan,
            '>' => Token::GreaterThan,
            '=' => Token::Assign,
            ',' => Token::Comma,
            ':' => Token::Colon,
            ';' => Token::Semicolon,
            '.' => Token::Dot,
            '(' | '[' | '{' => {
                self.delimiter_depth += 1;
                match c {
                    '(' => Token::LParen,
                    '[' => Token::LBracket,
                    _ => Token::LBrace,
                }
            }
            ')' | ']' | '}' => {
                self.delimiter_depth = self.delimiter_depth.saturating_sub(1);
                match c {
                    ')' => Token::RParen,
                    ']' => Token::RBracket,
                    _ => Token::RBrace,
                }
            }
            other => {
                return Err(LexerError::UnexpectedCharacter {
                    line: self.line,
                    character: other,
                })
            }
        };
        self.advance();
        self.push(token);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(text: &str) -> Vec<Token> {
        Lexer::new(&Text::new(text))
            .tokenize()
            .expect("Failed to tokenize")
            .into_iter()
            .map(|t| t.token)
            .collect()
    }

    fn ident(name: &str) -> Token {
        Token::Identifier(Identifier::new(name).expect("valid identifier"))
    }

    #[test]
    fn simple_assignment() {
        assert_eq!(
            tokens("a = 10"),
            vec![
                ident("a"),
                Token::Assign,
                Token::Integer(10),
                Token::Newline,
                Token::Eof
            ]
        );
    }

    #[test]
    fn indented_block() {
        let input = "
if True:
    x = 1

    # comment
y = 2
";
        assert_eq!(
            tokens(input),
            vec![
                Token::If,
                Token::BooleanLiteral(true),
                Token::Colon,
                Token::Newline,
                Token::Indent,
                ident("x"),
                Token::Assign,
                Token::Integer(1),
                Token::Newline,
                Token::Dedent,
                ident("y"),
                Token::Assign,
                Token::Integer(2),
                Token::Newline,
                Token::Eof
            ]
        );
    }

    #[test]
    fn dedent_at_eof() {
        let input = "def f():\n    return 1";
        let toks = tokens(input);
        assert_eq!(
            &toks[toks.len() - 3..],
            &[Token::Newline, Token::Dedent, Token::Eof]
        );
    }

    #[test]
    fn newlines_inside_brackets_are_ignored() {
        let input = "setup(\n    name='x',\n)\n";
        assert_eq!(
            tokens(input),
            vec![
                ident("setup"),
                Token::LParen,
                ident("name"),
                Token::Assign,
                Token::StringLiteral("x".to_string()),
                Token::Comma,
                Token::RParen,
                Token::Newline,
                Token::Eof
            ]
        );
    }

    #[test]
    fn string_prefixes_and_escapes() {
        assert_eq!(
            tokens(r#"r'\d+' b"ab" f'{x}' u'\t'"#),
            vec![
                Token::StringLiteral("\\d+".to_string()),
                Token::BytesLiteral(b"ab".to_vec()),
                Token::FStringLiteral("{x}".to_string()),
                Token::StringLiteral("\t".to_string()),
                Token::Newline,
                Token::Eof
            ]
        );
    }

    #[test]
    fn triple_quoted_string_counts_lines() {
        let input = "a = '''one\ntwo'''\nb = 1";
        let spanned = Lexer::new(&Text::new(input))
            .tokenize()
            .expect("Failed to tokenize");
        let b = spanned
            .iter()
            .find(|t| t.token == ident("b"))
            .expect("b should be lexed");
        assert_eq!(b.line, 3);
        assert_eq!(
            spanned[2].token,
            Token::StringLiteral("one\ntwo".to_string())
        );
    }

    #[test]
    fn numbers() {
        assert_eq!(
            tokens("0x1F 1_000 2.5 1e3 .5"),
            vec![
                Token::Integer(31),
                Token::Integer(1000),
                Token::FloatingPoint(2.5),
                Token::FloatingPoint(1000.0),
                Token::FloatingPoint(0.5),
                Token::Newline,
                Token::Eof
            ]
        );
    }

    #[test]
    fn line_continuation() {
        assert_eq!(
            tokens("a = 1 + \\\n    2"),
            vec![
                ident("a"),
                Token::Assign,
                Token::Integer(1),
                Token::Plus,
                Token::Integer(2),
                Token::Newline,
                Token::Eof
            ]
        );
    }

    #[test]
    fn unterminated_string() {
        let result = Lexer::new(&Text::new("a = 'oops\n")).tokenize();
        assert_eq!(result, Err(LexerError::UnterminatedString { line: 1 }));
    }

    #[test]
    fn inconsistent_dedent() {
        let input = "if x:\n        a = 1\n    b = 2\n";
        let result = Lexer::new(&Text::new(input)).tokenize();
        assert_eq!(result, Err(LexerError::InconsistentDedent { line: 3 }));
    }

    #[test]
    fn unexpected_character() {
        let result = Lexer::new(&Text::new("a = $")).tokenize();
        assert_eq!(
            result,
            Err(LexerError::UnexpectedCharacter {
                line: 1,
                character: '$'
            })
        );
    }
}
