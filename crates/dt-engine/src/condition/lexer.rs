//! Tokenizer for condition expressions.

use super::ParseError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    Ident(String),
    Number(f64),
    Str(String),
    True,
    False,
    Dot,
    LParen,
    RParen,
    AndAnd,
    OrOr,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Eof,
}

impl TokenKind {
    /// Short description used in parse error messages.
    pub(crate) fn describe(&self) -> String {
        match self {
            TokenKind::Ident(name) => format!("identifier '{}'", name),
            TokenKind::Number(n) => format!("number {}", n),
            TokenKind::Str(s) => format!("string {:?}", s),
            TokenKind::True => "'true'".to_string(),
            TokenKind::False => "'false'".to_string(),
            TokenKind::Dot => "'.'".to_string(),
            TokenKind::LParen => "'('".to_string(),
            TokenKind::RParen => "')'".to_string(),
            TokenKind::AndAnd => "'&&'".to_string(),
            TokenKind::OrOr => "'||'".to_string(),
            TokenKind::EqEq => "'=='".to_string(),
            TokenKind::NotEq => "'!='".to_string(),
            TokenKind::Lt => "'<'".to_string(),
            TokenKind::Le => "'<='".to_string(),
            TokenKind::Gt => "'>'".to_string(),
            TokenKind::Ge => "'>='".to_string(),
            TokenKind::Eof => "end of input".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    /// Byte offset of the first character of the token.
    pub position: usize,
}

pub(crate) struct Lexer<'a> {
    source: &'a str,
    input: &'a [u8],
    cursor: usize,
}

impl<'a> Lexer<'a> {
    pub(crate) fn new(source: &'a str) -> Self {
        Self {
            source,
            input: source.as_bytes(),
            cursor: 0,
        }
    }

    /// Tokenizes the whole input. The last token is always `Eof`.
    pub(crate) fn tokenize(mut self) -> Result<Vec<Token>, ParseError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    fn next_token(&mut self) -> Result<Token, ParseError> {
        self.skip_whitespace();
        let position = self.cursor;
        let Some(byte) = self.peek() else {
            return Ok(Token {
                kind: TokenKind::Eof,
                position,
            });
        };

        let kind = match byte {
            b'(' => self.single(TokenKind::LParen),
            b')' => self.single(TokenKind::RParen),
            b'.' => self.single(TokenKind::Dot),
            b'&' => self.pair(b'&', TokenKind::AndAnd, "'&&'")?,
            b'|' => self.pair(b'|', TokenKind::OrOr, "'||'")?,
            b'=' => self.pair(b'=', TokenKind::EqEq, "'=='")?,
            b'!' => self.pair(b'=', TokenKind::NotEq, "'!='")?,
            b'<' => self.with_optional_eq(TokenKind::Lt, TokenKind::Le),
            b'>' => self.with_optional_eq(TokenKind::Gt, TokenKind::Ge),
            b'"' | b'\'' => self.string(byte)?,
            b'-' => {
                if self.peek_at(1).is_some_and(|b| b.is_ascii_digit()) {
                    self.number()?
                } else {
                    return Err(ParseError::new("expected a digit after '-'", position));
                }
            }
            b if b.is_ascii_digit() => self.number()?,
            b if b.is_ascii_alphabetic() || b == b'_' => self.word(),
            _ => {
                let unexpected = self.source[position..].chars().next().unwrap_or('?');
                return Err(ParseError::new(
                    format!("unexpected character '{}'", unexpected),
                    position,
                ));
            }
        };

        Ok(Token { kind, position })
    }

    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.cursor += 1;
        kind
    }

    fn pair(
        &mut self,
        second: u8,
        kind: TokenKind,
        expected: &str,
    ) -> Result<TokenKind, ParseError> {
        if self.peek_at(1) == Some(second) {
            self.cursor += 2;
            Ok(kind)
        } else {
            Err(ParseError::new(format!("expected {}", expected), self.cursor))
        }
    }

    fn with_optional_eq(&mut self, bare: TokenKind, with_eq: TokenKind) -> TokenKind {
        if self.peek_at(1) == Some(b'=') {
            self.cursor += 2;
            with_eq
        } else {
            self.cursor += 1;
            bare
        }
    }

    fn string(&mut self, quote: u8) -> Result<TokenKind, ParseError> {
        let start = self.cursor;
        self.cursor += 1;
        let mut parsed = String::new();

        loop {
            let Some(current) = self.source[self.cursor..].chars().next() else {
                return Err(ParseError::new("unterminated string literal", start));
            };
            self.cursor += current.len_utf8();
            match current {
                c if c as u32 == u32::from(quote) => break,
                '\\' => {
                    let escape_at = self.cursor - 1;
                    let Some(escaped) = self.peek() else {
                        return Err(ParseError::new("unterminated string literal", start));
                    };
                    self.cursor += 1;
                    let translated = match escaped {
                        b'\\' => '\\',
                        b'"' => '"',
                        b'\'' => '\'',
                        b'n' => '\n',
                        b't' => '\t',
                        _ => {
                            return Err(ParseError::new("invalid escape sequence", escape_at));
                        }
                    };
                    parsed.push(translated);
                }
                c => parsed.push(c),
            }
        }

        Ok(TokenKind::Str(parsed))
    }

    fn number(&mut self) -> Result<TokenKind, ParseError> {
        let start = self.cursor;
        if self.peek() == Some(b'-') {
            self.cursor += 1;
        }
        self.digits();
        if self.peek() == Some(b'.') && self.peek_at(1).is_some_and(|b| b.is_ascii_digit()) {
            self.cursor += 1;
            self.digits();
        }
        if matches!(self.peek(), Some(b'e' | b'E')) {
            let mut offset = 1;
            if matches!(self.peek_at(1), Some(b'+' | b'-')) {
                offset = 2;
            }
            if self.peek_at(offset).is_some_and(|b| b.is_ascii_digit()) {
                self.cursor += offset;
                self.digits();
            }
        }
        if self
            .peek()
            .is_some_and(|b| b.is_ascii_alphabetic() || b == b'_')
        {
            return Err(ParseError::new("malformed number", start));
        }

        let text = &self.source[start..self.cursor];
        text.parse::<f64>()
            .map(TokenKind::Number)
            .map_err(|_| ParseError::new(format!("malformed number '{}'", text), start))
    }

    fn digits(&mut self) {
        while self.peek().is_some_and(|b| b.is_ascii_digit()) {
            self.cursor += 1;
        }
    }

    fn word(&mut self) -> TokenKind {
        let start = self.cursor;
        while self
            .peek()
            .is_some_and(|b| b.is_ascii_alphanumeric() || b == b'_')
        {
            self.cursor += 1;
        }
        match &self.source[start..self.cursor] {
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            word => TokenKind::Ident(word.to_string()),
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
            self.cursor += 1;
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.cursor).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.input.get(self.cursor + offset).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Lexer::new(source)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_reference_and_operators() {
        assert_eq!(
            kinds("host.sys_load >= 1.5 && x.y != 'a'"),
            vec![
                TokenKind::Ident("host".to_string()),
                TokenKind::Dot,
                TokenKind::Ident("sys_load".to_string()),
                TokenKind::Ge,
                TokenKind::Number(1.5),
                TokenKind::AndAnd,
                TokenKind::Ident("x".to_string()),
                TokenKind::Dot,
                TokenKind::Ident("y".to_string()),
                TokenKind::NotEq,
                TokenKind::Str("a".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(kinds("-2")[0], TokenKind::Number(-2.0));
        assert_eq!(kinds("1e3")[0], TokenKind::Number(1000.0));
        assert_eq!(kinds("0.25")[0], TokenKind::Number(0.25));
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            kinds(r#""say \"hi\"\n""#)[0],
            TokenKind::Str("say \"hi\"\n".to_string())
        );
        assert_eq!(kinds(r"'it\'s'")[0], TokenKind::Str("it's".to_string()));
    }

    #[test]
    fn test_positions() {
        let tokens = Lexer::new("  a.b < 3").tokenize().unwrap();
        let positions: Vec<usize> = tokens.iter().map(|t| t.position).collect();
        assert_eq!(positions, vec![2, 3, 4, 6, 8, 9]);
    }

    #[test]
    fn test_errors() {
        let err = Lexer::new("a.b = 1").tokenize().unwrap_err();
        assert_eq!(err.position, 4);

        let err = Lexer::new("a.b & c.d").tokenize().unwrap_err();
        assert_eq!(err.position, 4);

        let err = Lexer::new("'open").tokenize().unwrap_err();
        assert_eq!(err.message, "unterminated string literal");

        let err = Lexer::new("a.b > 1x").tokenize().unwrap_err();
        assert_eq!(err.message, "malformed number");

        let err = Lexer::new("a.b > ¤").tokenize().unwrap_err();
        assert_eq!(err.position, 6);
    }
}
