//! The rill lexer.

use crate::token::{Token, TokenKind};
use rill_common::Span;
use thiserror::Error;

/// A lexing failure.
#[derive(Debug, Clone, Error)]
pub enum LexError {
    #[error("unexpected character `{ch}` at byte {}", .span.start.0)]
    UnexpectedChar { ch: char, span: Span },

    #[error("unterminated string literal starting at byte {}", .span.start.0)]
    UnterminatedString { span: Span },

    #[error("unterminated block comment starting at byte {}", .span.start.0)]
    UnterminatedComment { span: Span },

    #[error("integer literal out of range at byte {}", .span.start.0)]
    IntOutOfRange { span: Span },
}

/// Mode for the lexer state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexerMode {
    Normal,
    /// Inside a `"…"` string, emitting chunks and interpolation markers.
    InString,
    /// Inside `${…}`, counting brace depth so nested attribute sets do not
    /// terminate the interpolation early.
    InInterp { depth: u32 },
}

/// The rill lexer.
///
/// Converts source code into a sequence of tokens. String literals are
/// split into chunk/interpolation pieces; the parser reassembles them.
pub struct Lexer<'src> {
    chars: std::iter::Peekable<std::str::CharIndices<'src>>,
    /// Current byte position in the source.
    pos: usize,
    mode_stack: Vec<LexerMode>,
}

fn is_ident_start(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_'
}

fn is_ident_continue(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_' || ch == '\'' || ch == '-'
}

fn is_path_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-' | '+' | '/')
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str) -> Self {
        Self {
            chars: source.char_indices().peekable(),
            pos: 0,
            mode_stack: vec![LexerMode::Normal],
        }
    }

    /// Tokenize the entire source.
    pub fn tokenize(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();

        loop {
            let token = self.next_token()?;
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }

        Ok(tokens)
    }

    fn current_mode(&self) -> LexerMode {
        *self.mode_stack.last().unwrap_or(&LexerMode::Normal)
    }

    fn advance(&mut self) -> Option<(usize, char)> {
        let next = self.chars.next();
        if let Some((pos, ch)) = next {
            self.pos = pos + ch.len_utf8();
        }
        next
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().map(|&(_, ch)| ch)
    }

    fn next_token(&mut self) -> Result<Token, LexError> {
        match self.current_mode() {
            LexerMode::InString => self.string_piece(),
            LexerMode::InInterp { depth } => {
                let token = self.next_token_normal()?;
                match token.kind {
                    TokenKind::LBrace => {
                        *self.mode_stack.last_mut().unwrap() =
                            LexerMode::InInterp { depth: depth + 1 };
                        Ok(token)
                    }
                    TokenKind::RBrace => {
                        if depth == 0 {
                            self.mode_stack.pop();
                            Ok(Token::new(TokenKind::InterpEnd, token.span))
                        } else {
                            *self.mode_stack.last_mut().unwrap() =
                                LexerMode::InInterp { depth: depth - 1 };
                            Ok(token)
                        }
                    }
                    _ => Ok(token),
                }
            }
            LexerMode::Normal => self.next_token_normal(),
        }
    }

    /// Lex the next piece of a string literal: a chunk of characters, the
    /// start of an interpolation, or the closing quote.
    fn string_piece(&mut self) -> Result<Token, LexError> {
        let start = self.pos;
        let mut text = String::new();

        loop {
            match self.peek_char() {
                None => {
                    return Err(LexError::UnterminatedString {
                        span: Span::from_usize(start, self.pos),
                    })
                }
                Some('"') => {
                    if text.is_empty() {
                        self.advance();
                        self.mode_stack.pop();
                        return Ok(Token::new(TokenKind::StrEnd, Span::from_usize(start, self.pos)));
                    }
                    return Ok(Token::new(
                        TokenKind::StrChunk(text),
                        Span::from_usize(start, self.pos),
                    ));
                }
                Some('$') => {
                    // `${` starts an interpolation; a lone `$` is literal.
                    let mut lookahead = self.chars.clone();
                    lookahead.next();
                    if lookahead.peek().map(|&(_, ch)| ch) == Some('{') {
                        if text.is_empty() {
                            self.advance();
                            self.advance();
                            self.mode_stack.push(LexerMode::InInterp { depth: 0 });
                            return Ok(Token::new(
                                TokenKind::InterpStart,
                                Span::from_usize(start, self.pos),
                            ));
                        }
                        return Ok(Token::new(
                            TokenKind::StrChunk(text),
                            Span::from_usize(start, self.pos),
                        ));
                    }
                    self.advance();
                    text.push('$');
                }
                Some('\\') => {
                    self.advance();
                    let Some((_, escaped)) = self.advance() else {
                        return Err(LexError::UnterminatedString {
                            span: Span::from_usize(start, self.pos),
                        });
                    };
                    text.push(match escaped {
                        'n' => '\n',
                        'r' => '\r',
                        't' => '\t',
                        other => other,
                    });
                }
                Some(ch) => {
                    self.advance();
                    text.push(ch);
                }
            }
        }
    }

    fn next_token_normal(&mut self) -> Result<Token, LexError> {
        self.skip_trivia()?;

        let start = self.pos;

        let Some((_, ch)) = self.advance() else {
            return Ok(Token::new(TokenKind::Eof, Span::from_usize(start, start)));
        };

        let kind = match ch {
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            ',' => TokenKind::Comma,
            ';' => TokenKind::Semicolon,
            ':' => TokenKind::Colon,
            '@' => TokenKind::At,
            '?' => TokenKind::Question,

            '"' => {
                self.mode_stack.push(LexerMode::InString);
                TokenKind::StrStart
            }

            '=' => {
                if self.peek_char() == Some('=') {
                    self.advance();
                    TokenKind::EqEq
                } else {
                    TokenKind::Assign
                }
            }

            '!' => {
                if self.peek_char() == Some('=') {
                    self.advance();
                    TokenKind::BangEq
                } else {
                    TokenKind::Bang
                }
            }

            '+' => {
                if self.peek_char() == Some('+') {
                    self.advance();
                    TokenKind::PlusPlus
                } else {
                    TokenKind::Plus
                }
            }

            '&' => {
                if self.peek_char() == Some('&') {
                    self.advance();
                    TokenKind::AndAnd
                } else {
                    return Err(LexError::UnexpectedChar {
                        ch,
                        span: Span::from_usize(start, self.pos),
                    });
                }
            }

            '|' => {
                if self.peek_char() == Some('|') {
                    self.advance();
                    TokenKind::OrOr
                } else {
                    return Err(LexError::UnexpectedChar {
                        ch,
                        span: Span::from_usize(start, self.pos),
                    });
                }
            }

            // `//`, `/…` path literal, or lone slash (an error).
            '/' => match self.peek_char() {
                Some('/') => {
                    self.advance();
                    TokenKind::SlashSlash
                }
                Some(c) if is_path_char(c) => self.scan_path(start, "/"),
                _ => {
                    return Err(LexError::UnexpectedChar {
                        ch,
                        span: Span::from_usize(start, self.pos),
                    })
                }
            },

            // `.`, `...`, or a path starting with `./` or `../`.
            '.' => {
                if self.peek_char() == Some('/') {
                    self.advance();
                    self.scan_path(start, "./")
                } else if self.peek_char() == Some('.') {
                    self.advance();
                    if self.peek_char() == Some('/') {
                        self.advance();
                        self.scan_path(start, "../")
                    } else if self.peek_char() == Some('.') {
                        self.advance();
                        TokenKind::Ellipsis
                    } else {
                        return Err(LexError::UnexpectedChar {
                            ch: '.',
                            span: Span::from_usize(start, self.pos),
                        });
                    }
                } else {
                    TokenKind::Dot
                }
            }

            '-' => {
                if self.peek_char() == Some('>') {
                    self.advance();
                    TokenKind::Arrow
                } else if self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
                    self.scan_int(start, None)?
                } else {
                    return Err(LexError::UnexpectedChar {
                        ch,
                        span: Span::from_usize(start, self.pos),
                    });
                }
            }

            c if c.is_ascii_digit() => self.scan_int(start, Some(c))?,

            c if is_ident_start(c) => {
                let mut name = String::new();
                name.push(c);
                while let Some(next) = self.peek_char() {
                    if is_ident_continue(next) {
                        name.push(next);
                        self.advance();
                    } else {
                        break;
                    }
                }
                TokenKind::keyword_from_str(&name).unwrap_or(TokenKind::Ident(name))
            }

            _ => {
                return Err(LexError::UnexpectedChar {
                    ch,
                    span: Span::from_usize(start, self.pos),
                })
            }
        };

        Ok(Token::new(kind, Span::from_usize(start, self.pos)))
    }

    /// Scan the remainder of a path literal whose prefix has already been
    /// consumed.
    fn scan_path(&mut self, _start: usize, prefix: &str) -> TokenKind {
        let mut path = String::from(prefix);
        while let Some(ch) = self.peek_char() {
            if is_path_char(ch) {
                path.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        TokenKind::PathLit(path)
    }

    /// Scan an integer literal. `first` is the digit the caller already
    /// consumed; `None` means the trigger was a leading minus sign.
    fn scan_int(&mut self, start: usize, first: Option<char>) -> Result<TokenKind, LexError> {
        let mut digits = String::new();
        match first {
            Some(digit) => digits.push(digit),
            None => digits.push('-'),
        }
        while let Some(ch) = self.peek_char() {
            if ch.is_ascii_digit() {
                digits.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        digits
            .parse::<i64>()
            .map(TokenKind::Int)
            .map_err(|_| LexError::IntOutOfRange {
                span: Span::from_usize(start, self.pos),
            })
    }

    /// Skip whitespace and comments (`# …` and `/* … */`).
    fn skip_trivia(&mut self) -> Result<(), LexError> {
        loop {
            match self.peek_char() {
                Some(ch) if ch.is_whitespace() => {
                    self.advance();
                }
                Some('#') => {
                    while let Some(ch) = self.peek_char() {
                        if ch == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                Some('/') => {
                    // Only `/*` is trivia; leave `//` and paths alone.
                    let mut lookahead = self.chars.clone();
                    lookahead.next();
                    if lookahead.peek().map(|&(_, ch)| ch) != Some('*') {
                        return Ok(());
                    }
                    let start = self.pos;
                    self.advance();
                    self.advance();
                    loop {
                        match self.advance() {
                            Some((_, '*')) if self.peek_char() == Some('/') => {
                                self.advance();
                                break;
                            }
                            Some(_) => {}
                            None => {
                                return Err(LexError::UnterminatedComment {
                                    span: Span::from_usize(start, self.pos),
                                })
                            }
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenKind::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Lexer::new(source)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn punctuation_and_keywords() {
        assert_eq!(
            kinds("rec { a = 1; }"),
            vec![
                Rec,
                LBrace,
                Ident("a".into()),
                Assign,
                Int(1),
                Semicolon,
                RBrace,
                Eof
            ]
        );
    }

    #[test]
    fn operators() {
        assert_eq!(
            kinds("a ++ b // c -> d"),
            vec![
                Ident("a".into()),
                PlusPlus,
                Ident("b".into()),
                SlashSlash,
                Ident("c".into()),
                Arrow,
                Ident("d".into()),
                Eof
            ]
        );
    }

    #[test]
    fn path_literals() {
        assert_eq!(kinds("./foo/bar"), vec![PathLit("./foo/bar".into()), Eof]);
        assert_eq!(kinds("../up"), vec![PathLit("../up".into()), Eof]);
        assert_eq!(kinds("/bin/sh"), vec![PathLit("/bin/sh".into()), Eof]);
    }

    #[test]
    fn ellipsis_vs_path() {
        assert_eq!(
            kinds("{ x, ... }"),
            vec![LBrace, Ident("x".into()), Comma, Ellipsis, RBrace, Eof]
        );
    }

    #[test]
    fn plain_string() {
        assert_eq!(
            kinds(r#""hi\n""#),
            vec![StrStart, StrChunk("hi\n".into()), StrEnd, Eof]
        );
    }

    #[test]
    fn interpolated_string() {
        assert_eq!(
            kinds(r#""a${x}b""#),
            vec![
                StrStart,
                StrChunk("a".into()),
                InterpStart,
                Ident("x".into()),
                InterpEnd,
                StrChunk("b".into()),
                StrEnd,
                Eof
            ]
        );
    }

    #[test]
    fn interpolation_with_nested_braces() {
        assert_eq!(
            kinds(r#""${ { a = 1; }.a }""#),
            vec![
                StrStart,
                InterpStart,
                LBrace,
                Ident("a".into()),
                Assign,
                Int(1),
                Semicolon,
                RBrace,
                Dot,
                Ident("a".into()),
                InterpEnd,
                StrEnd,
                Eof
            ]
        );
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(kinds("1 # tail\n/* block */ 2"), vec![Int(1), Int(2), Eof]);
    }

    #[test]
    fn negative_int() {
        assert_eq!(kinds("-42"), vec![Int(-42), Eof]);
    }
}
