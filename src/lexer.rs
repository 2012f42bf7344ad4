//! Source text to token stream.
//!
//! Scans a `&str` left to right, producing [`Token`](crate::token::Token)s
//! with [`Span`](crate::token::Span)s for diagnostics. No escape handling
//! inside strings beyond pass-through, matching the grammar pinned by
//! `spec.md` §4.1.

use crate::token::{Span, Token, TokenKind};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("tokenizing error at line {line}: unterminated string")]
    UnterminatedString { line: usize, span: Span },
    #[error("tokenizing error at line {line}: unrecognized byte {byte:?}")]
    UnrecognizedByte { line: usize, byte: char, span: Span },
}

impl Error {
    /// The source range this error covers, for [`crate::diagnostics::render`].
    pub fn span(&self) -> Span {
        match self {
            Error::UnterminatedString { span, .. } => *span,
            Error::UnrecognizedByte { span, .. } => *span,
        }
    }
}

struct Lexer<'src> {
    source: &'src str,
    bytes: &'src [u8],
    start: usize,
    current: usize,
    line: usize,
}

fn is_digit(b: u8) -> bool {
    b.is_ascii_digit()
}

fn is_alpha(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

impl<'src> Lexer<'src> {
    fn new(source: &'src str) -> Lexer<'src> {
        Lexer {
            source,
            bytes: source.as_bytes(),
            start: 0,
            current: 0,
            line: 1,
        }
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.bytes.len()
    }

    fn peek(&self, distance: usize) -> u8 {
        *self.bytes.get(self.current + distance).unwrap_or(&0)
    }

    fn advance(&mut self) -> u8 {
        let b = self.bytes[self.current];
        self.current += 1;
        b
    }

    fn matches(&mut self, expected: u8) -> bool {
        if self.peek(0) == expected {
            self.current += 1;
            true
        } else {
            false
        }
    }

    fn skip_whitespace(&mut self) {
        loop {
            match self.peek(0) {
                b' ' | b'\r' | b'\t' => {
                    self.advance();
                }
                b'\n' => {
                    self.line += 1;
                    self.advance();
                }
                _ => return,
            }
        }
    }

    fn lexeme(&self) -> &'src str {
        &self.source[self.start..self.current]
    }

    fn span(&self) -> Span {
        Span::new(self.start, self.current, self.line)
    }

    fn make(&self, kind: TokenKind) -> Token<'src> {
        Token::new(kind, self.lexeme(), self.span())
    }

    fn number(&mut self) -> Token<'src> {
        while is_digit(self.peek(0)) {
            self.advance();
        }
        if self.peek(0) == b'.' && is_digit(self.peek(1)) {
            self.advance();
            while is_digit(self.peek(0)) {
                self.advance();
            }
        }
        self.make(TokenKind::Number)
    }

    fn string(&mut self) -> Result<Token<'src>, Error> {
        while self.peek(0) != b'"' && !self.is_at_end() {
            if self.peek(0) == b'\n' {
                self.line += 1;
            }
            self.advance();
        }
        if self.is_at_end() {
            return Err(Error::UnterminatedString {
                line: self.line,
                span: self.span(),
            });
        }
        self.advance(); // closing quote
        Ok(self.make(TokenKind::String))
    }

    fn identifier(&mut self) -> Token<'src> {
        while is_digit(self.peek(0)) || is_alpha(self.peek(0)) {
            self.advance();
        }
        let kind = match self.lexeme() {
            "let" => TokenKind::Let,
            "print" => TokenKind::Print,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "while" => TokenKind::While,
            "for" => TokenKind::For,
            "break" => TokenKind::Break,
            "continue" => TokenKind::Continue,
            "fn" => TokenKind::Fn,
            "return" => TokenKind::Return,
            "struct" => TokenKind::Struct,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "null" => TokenKind::Null,
            "use" => TokenKind::Use,
            "yield" => TokenKind::Yield,
            "assert" => TokenKind::Assert,
            "impl" => TokenKind::Impl,
            _ => TokenKind::Identifier,
        };
        self.make(kind)
    }

    fn next_token(&mut self) -> Result<Token<'src>, Error> {
        self.skip_whitespace();
        self.start = self.current;

        if self.is_at_end() {
            return Ok(self.make(TokenKind::Eof));
        }

        let c = self.advance();

        if is_digit(c) {
            return Ok(self.number());
        }
        if is_alpha(c) {
            return Ok(self.identifier());
        }

        let kind = match c {
            b'+' => TokenKind::Plus,
            b'-' => {
                if self.matches(b'>') {
                    TokenKind::Arrow
                } else {
                    TokenKind::Minus
                }
            }
            b'*' => TokenKind::Star,
            b'/' => TokenKind::Slash,
            b'%' => TokenKind::Percent,
            b'(' => TokenKind::LeftParen,
            b')' => TokenKind::RightParen,
            b'{' => TokenKind::LeftBrace,
            b'}' => TokenKind::RightBrace,
            b'[' => TokenKind::LeftBracket,
            b']' => TokenKind::RightBracket,
            b':' => TokenKind::Colon,
            b';' => TokenKind::Semicolon,
            b',' => TokenKind::Comma,
            b'.' => TokenKind::Dot,
            b'?' => TokenKind::Question,
            b'"' => return self.string(),
            b'>' => {
                if self.matches(b'=') {
                    TokenKind::GreaterEqual
                } else {
                    TokenKind::Greater
                }
            }
            b'<' => {
                if self.matches(b'=') {
                    TokenKind::LessEqual
                } else {
                    TokenKind::Less
                }
            }
            b'!' => {
                if self.matches(b'=') {
                    TokenKind::BangEqual
                } else {
                    TokenKind::Bang
                }
            }
            b'=' => {
                if self.matches(b'=') {
                    TokenKind::EqualEqual
                } else {
                    TokenKind::Equal
                }
            }
            b'&' if self.matches(b'&') => TokenKind::AmpAmp,
            b'|' if self.matches(b'|') => TokenKind::PipePipe,
            other => {
                return Err(Error::UnrecognizedByte {
                    line: self.line,
                    byte: other as char,
                    span: self.span(),
                })
            }
        };
        Ok(self.make(kind))
    }
}

/// Lexes the whole source string, returning every token up to and
/// including a trailing `Eof`.
pub fn lex(source: &str) -> Result<Vec<Token<'_>>, Error> {
    let mut lexer = Lexer::new(source);
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        let done = token.kind == TokenKind::Eof;
        tokens.push(token);
        if done {
            break;
        }
    }
    log::trace!("lexed {} tokens", tokens.len());
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        lex(source).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_simple_arithmetic() {
        assert_eq!(
            kinds("1 + 2 * 3;"),
            vec![
                TokenKind::Number,
                TokenKind::Plus,
                TokenKind::Number,
                TokenKind::Star,
                TokenKind::Number,
                TokenKind::Semicolon,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_keywords_vs_identifiers() {
        assert_eq!(kinds("while"), vec![TokenKind::While, TokenKind::Eof]);
        assert_eq!(
            kinds("whilelatch"),
            vec![TokenKind::Identifier, TokenKind::Eof]
        );
    }

    #[test]
    fn test_multi_char_operators() {
        assert_eq!(
            kinds("a == b != c && d || e"),
            vec![
                TokenKind::Identifier,
                TokenKind::EqualEqual,
                TokenKind::Identifier,
                TokenKind::BangEqual,
                TokenKind::Identifier,
                TokenKind::AmpAmp,
                TokenKind::Identifier,
                TokenKind::PipePipe,
                TokenKind::Identifier,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_string_literal() {
        let tokens = lex("\"hello world\"").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::String);
        assert_eq!(tokens[0].lexeme, "\"hello world\"");
    }

    #[test]
    fn test_unterminated_string_errors() {
        let err = lex("\"unterminated").unwrap_err();
        assert!(matches!(err, Error::UnterminatedString { line: 1, .. }));
    }

    #[test]
    fn test_tracks_line_numbers() {
        let tokens = lex("let x\n= 1;").unwrap();
        let eq = tokens
            .iter()
            .find(|t| t.kind == TokenKind::Equal)
            .unwrap();
        assert_eq!(eq.span.line, 2);
    }

    #[test]
    fn test_unrecognized_byte_errors() {
        let err = lex("@").unwrap_err();
        assert!(matches!(
            err,
            Error::UnrecognizedByte {
                line: 1,
                byte: '@',
                ..
            }
        ));
    }
}
