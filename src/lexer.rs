/// Hand-written lexer. Deliberately thin — this language's tokens are a
/// small fixed set (keywords, one- and two-character operators, integer and
/// float literals) and don't need a generated scanner.
use crate::errors::{LexError, Span};

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    IntLit(i64),
    FloatLit(String),
    Identifier(String),
    // keywords
    KwInt,
    KwLong,
    KwBool,
    KwFloat,
    KwArray,
    KwVoid,
    KwStruct,
    KwNone,
    KwTrue,
    KwFalse,
    KwIf,
    KwElif,
    KwElse,
    KwWhile,
    KwFor,
    KwBreak,
    KwContinue,
    KwReturn,
    KwAnd,
    KwOr,
    KwNot,
    // punctuation
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Semi,
    Comma,
    Colon,
    Dot,
    // operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Assign,
    PlusEq,
    MinusEq,
    StarEq,
    SlashEq,
    PercentEq,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Eof,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

const KEYWORDS: &[(&str, TokenKind)] = &[
    ("int", TokenKind::KwInt),
    ("long", TokenKind::KwLong),
    ("bool", TokenKind::KwBool),
    ("float", TokenKind::KwFloat),
    ("array", TokenKind::KwArray),
    ("void", TokenKind::KwVoid),
    ("struct", TokenKind::KwStruct),
    ("none", TokenKind::KwNone),
    ("true", TokenKind::KwTrue),
    ("false", TokenKind::KwFalse),
    ("if", TokenKind::KwIf),
    ("elif", TokenKind::KwElif),
    ("else", TokenKind::KwElse),
    ("while", TokenKind::KwWhile),
    ("for", TokenKind::KwFor),
    ("break", TokenKind::KwBreak),
    ("continue", TokenKind::KwContinue),
    ("return", TokenKind::KwReturn),
    ("and", TokenKind::KwAnd),
    ("or", TokenKind::KwOr),
    ("not", TokenKind::KwNot),
];

pub struct Lexer<'a> {
    src: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Lexer { src: src.as_bytes(), pos: 0 }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia();
            let start = self.pos;
            let Some(c) = self.peek() else {
                tokens.push(Token { kind: TokenKind::Eof, span: Span::new(start, start) });
                break;
            };
            let tok = if c.is_ascii_digit() {
                self.lex_number(start)?
            } else if c == b'_' || c.is_ascii_alphabetic() {
                self.lex_identifier(start)
            } else {
                self.lex_operator(start)?
            };
            tokens.push(tok);
        }
        Ok(tokens)
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.src.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(b' ') | Some(b'\t') | Some(b'\r') | Some(b'\n') => {
                    self.pos += 1;
                }
                Some(b'/') if self.peek_at(1) == Some(b'/') => {
                    while let Some(c) = self.peek() {
                        if c == b'\n' {
                            break;
                        }
                        self.pos += 1;
                    }
                }
                _ => break,
            }
        }
    }

    fn lex_number(&mut self, start: usize) -> Result<Token, LexError> {
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.pos += 1;
        }
        let mut is_float = false;
        if self.peek() == Some(b'.') && matches!(self.peek_at(1), Some(c) if c.is_ascii_digit()) {
            is_float = true;
            self.pos += 1;
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        if matches!(self.peek(), Some(b'e') | Some(b'E')) {
            let save = self.pos;
            self.pos += 1;
            if matches!(self.peek(), Some(b'+') | Some(b'-')) {
                self.pos += 1;
            }
            if matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                is_float = true;
                while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                    self.pos += 1;
                }
            } else {
                self.pos = save;
            }
        }
        let text = std::str::from_utf8(&self.src[start..self.pos]).unwrap().to_string();
        let span = Span::new(start, self.pos);
        if is_float {
            Ok(Token { kind: TokenKind::FloatLit(text), span })
        } else {
            match text.parse::<i64>() {
                Ok(v) => Ok(Token { kind: TokenKind::IntLit(v), span }),
                Err(_) => Err(LexError::InvalidNumber { text, span }),
            }
        }
    }

    fn lex_identifier(&mut self, start: usize) -> Token {
        while matches!(self.peek(), Some(c) if c == b'_' || c.is_ascii_alphanumeric()) {
            self.pos += 1;
        }
        let text = std::str::from_utf8(&self.src[start..self.pos]).unwrap();
        let span = Span::new(start, self.pos);
        let kind = KEYWORDS
            .iter()
            .find(|(kw, _)| *kw == text)
            .map(|(_, k)| k.clone())
            .unwrap_or_else(|| TokenKind::Identifier(text.to_string()));
        Token { kind, span }
    }

    fn lex_operator(&mut self, start: usize) -> Result<Token, LexError> {
        let c = self.advance().unwrap();
        let kind = match c {
            b'(' => TokenKind::LParen,
            b')' => TokenKind::RParen,
            b'{' => TokenKind::LBrace,
            b'}' => TokenKind::RBrace,
            b'[' => TokenKind::LBracket,
            b']' => TokenKind::RBracket,
            b';' => TokenKind::Semi,
            b',' => TokenKind::Comma,
            b':' => TokenKind::Colon,
            b'.' => TokenKind::Dot,
            b'+' => {
                if self.peek() == Some(b'=') {
                    self.pos += 1;
                    TokenKind::PlusEq
                } else {
                    TokenKind::Plus
                }
            }
            b'-' => {
                if self.peek() == Some(b'=') {
                    self.pos += 1;
                    TokenKind::MinusEq
                } else {
                    TokenKind::Minus
                }
            }
            b'*' => {
                if self.peek() == Some(b'=') {
                    self.pos += 1;
                    TokenKind::StarEq
                } else {
                    TokenKind::Star
                }
            }
            b'/' => {
                if self.peek() == Some(b'=') {
                    self.pos += 1;
                    TokenKind::SlashEq
                } else {
                    TokenKind::Slash
                }
            }
            b'%' => {
                if self.peek() == Some(b'=') {
                    self.pos += 1;
                    TokenKind::PercentEq
                } else {
                    TokenKind::Percent
                }
            }
            b'=' => {
                if self.peek() == Some(b'=') {
                    self.pos += 1;
                    TokenKind::EqEq
                } else {
                    TokenKind::Assign
                }
            }
            b'!' => {
                if self.peek() == Some(b'=') {
                    self.pos += 1;
                    TokenKind::NotEq
                } else {
                    return Err(LexError::UnexpectedCharacter { ch: c as char, span: Span::new(start, self.pos) });
                }
            }
            b'<' => {
                if self.peek() == Some(b'=') {
                    self.pos += 1;
                    TokenKind::Le
                } else {
                    TokenKind::Lt
                }
            }
            b'>' => {
                if self.peek() == Some(b'=') {
                    self.pos += 1;
                    TokenKind::Ge
                } else {
                    TokenKind::Gt
                }
            }
            other => {
                return Err(LexError::UnexpectedCharacter { ch: other as char, span: Span::new(start, self.pos) });
            }
        };
        Ok(Token { kind, span: Span::new(start, self.pos) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Lexer::new(src).tokenize().unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn keywords_and_identifiers() {
        let k = kinds("if elif else whiley");
        assert_eq!(k[0], TokenKind::KwIf);
        assert_eq!(k[1], TokenKind::KwElif);
        assert_eq!(k[2], TokenKind::KwElse);
        assert_eq!(k[3], TokenKind::Identifier("whiley".into()));
    }

    #[test]
    fn numbers() {
        let k = kinds("42 3.14 1e10 2.5e-3");
        assert_eq!(k[0], TokenKind::IntLit(42));
        assert_eq!(k[1], TokenKind::FloatLit("3.14".into()));
        assert_eq!(k[2], TokenKind::FloatLit("1e10".into()));
        assert_eq!(k[3], TokenKind::FloatLit("2.5e-3".into()));
    }

    #[test]
    fn two_char_operators() {
        let k = kinds("+= -= == != <= >=");
        assert_eq!(
            k,
            vec![
                TokenKind::PlusEq,
                TokenKind::MinusEq,
                TokenKind::EqEq,
                TokenKind::NotEq,
                TokenKind::Le,
                TokenKind::Ge,
            ]
        );
    }
}
