//! The rill parser.
//!
//! A recursive-descent parser over the token stream. Several surface forms
//! are desugared here so the evaluator never sees them:
//!
//! - `let binds in body` becomes a recursive attribute set selected on a
//!   reserved `<let-body>` attribute;
//! - `a + b` and interpolated strings become `ConcatStrings`;
//! - `inherit a;` becomes an ordinary binding of `a` to the variable `a`
//!   (a non-recursive binding inside `rec`), and `inherit (e) a;` becomes
//!   `a = e.a`;
//! - relative path literals are resolved against the base directory.

use rill_common::{canon_path, Interner, Span, Symbol};
use rill_lexer::{LexError, Token, TokenKind};
use rill_syntax::{Binding, Expr, ExprKind, Formal, Pattern};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use thiserror::Error;

/// A parsing failure.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error(transparent)]
    Lex(#[from] LexError),

    #[error("cannot read `{path}`: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("unexpected {found}, expected {expected} at byte {}", .span.start.0)]
    Unexpected {
        found: String,
        expected: String,
        span: Span,
    },

    #[error("duplicate attribute `{name}` at byte {}", .span.start.0)]
    DuplicateAttr { name: String, span: Span },

    #[error("duplicate formal argument `{name}` at byte {}", .span.start.0)]
    DuplicateFormal { name: String, span: Span },
}

/// Parse an expression from a source string. Relative path literals are
/// resolved against `base_dir`.
pub fn parse_expr_from_str(
    source: &str,
    base_dir: &Path,
    symbols: &mut Interner,
) -> Result<Rc<Expr>, ParseError> {
    let tokens = rill_lexer::tokenize(source)?;
    let mut parser = Parser::new(tokens, base_dir.to_path_buf(), symbols);
    let expr = parser.parse_expr()?;
    parser.expect(&TokenKind::Eof, "end of input")?;
    Ok(expr)
}

/// Parse an expression from a file. Relative path literals are resolved
/// against the file's directory.
pub fn parse_expr_from_file(
    path: &Path,
    symbols: &mut Interner,
) -> Result<Rc<Expr>, ParseError> {
    let source = std::fs::read_to_string(path).map_err(|e| ParseError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("/")).to_path_buf();
    let tokens = rill_lexer::tokenize(&source)?;
    let mut parser = Parser::new(tokens, base_dir, symbols);
    let expr = parser.parse_expr()?;
    parser.expect(&TokenKind::Eof, "end of input")?;
    Ok(expr)
}

/// The rill parser.
pub struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    base_dir: PathBuf,
    symbols: &'a mut Interner,
}

/// One parsed attribute binding, tagged with whether it came from a plain
/// `inherit` (those are non-recursive inside `rec`).
struct ParsedBinding {
    binding: Binding,
    inherited: bool,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: Vec<Token>, base_dir: PathBuf, symbols: &'a mut Interner) -> Self {
        Self {
            tokens,
            pos: 0,
            base_dir,
            symbols,
        }
    }

    fn current(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn current_kind(&self) -> &TokenKind {
        &self.current().kind
    }

    fn current_span(&self) -> Span {
        self.current().span
    }

    fn peek_kind(&self, offset: usize) -> &TokenKind {
        let idx = (self.pos + offset).min(self.tokens.len() - 1);
        &self.tokens[idx].kind
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.current_kind() == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind, what: &str) -> Result<Token, ParseError> {
        if self.current_kind() == kind {
            Ok(self.advance())
        } else {
            Err(self.unexpected(what))
        }
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        ParseError::Unexpected {
            found: format!("{:?}", self.current_kind()),
            expected: expected.to_string(),
            span: self.current_span(),
        }
    }

    fn parse_ident(&mut self) -> Result<(Symbol, Span), ParseError> {
        match self.current_kind().clone() {
            TokenKind::Ident(name) => {
                let span = self.current_span();
                self.advance();
                Ok((self.symbols.intern(&name), span))
            }
            _ => Err(self.unexpected("an identifier")),
        }
    }

    /// An attribute name: a bare identifier or a plain (non-interpolated)
    /// string literal.
    fn parse_attr_name(&mut self) -> Result<(Symbol, Span), ParseError> {
        match self.current_kind() {
            TokenKind::Ident(_) => self.parse_ident(),
            TokenKind::StrStart => {
                let start = self.current_span();
                self.advance();
                let name = match self.current_kind().clone() {
                    TokenKind::StrChunk(text) => {
                        self.advance();
                        text
                    }
                    TokenKind::StrEnd => String::new(),
                    _ => return Err(self.unexpected("a literal attribute name")),
                };
                let end = self.expect(&TokenKind::StrEnd, "closing quote")?.span;
                Ok((self.symbols.intern(&name), start.merge(end)))
            }
            _ => Err(self.unexpected("an attribute name")),
        }
    }

    // ------------------------------------------------------------------
    // Expressions, loosest binding first
    // ------------------------------------------------------------------

    pub fn parse_expr(&mut self) -> Result<Rc<Expr>, ParseError> {
        let start = self.current_span();

        // Lambdas need lookahead: `x:`, `x @ {`, or `{ … } :` / `{ … } @`.
        if matches!(self.current_kind(), TokenKind::Ident(_))
            && matches!(self.peek_kind(1), TokenKind::Colon | TokenKind::At)
        {
            return self.parse_lambda(start);
        }
        if *self.current_kind() == TokenKind::LBrace && self.brace_group_is_pattern() {
            return self.parse_lambda(start);
        }

        match self.current_kind() {
            TokenKind::Let => self.parse_let(start),
            TokenKind::With => {
                self.advance();
                let attrs = self.parse_expr()?;
                self.expect(&TokenKind::Semicolon, "`;` after `with` expression")?;
                let body = self.parse_expr()?;
                let span = start.merge(body.span);
                Ok(Rc::new(Expr::new(ExprKind::With(attrs, body), span)))
            }
            TokenKind::Assert => {
                let pos = self.advance().span;
                let cond = self.parse_expr()?;
                self.expect(&TokenKind::Semicolon, "`;` after `assert` condition")?;
                let body = self.parse_expr()?;
                let span = start.merge(body.span);
                Ok(Rc::new(Expr::new(
                    ExprKind::Assert { cond, body, pos },
                    span,
                )))
            }
            TokenKind::If => {
                self.advance();
                let cond = self.parse_expr()?;
                self.expect(&TokenKind::Then, "`then`")?;
                let then = self.parse_expr()?;
                self.expect(&TokenKind::Else, "`else`")?;
                let els = self.parse_expr()?;
                let span = start.merge(els.span);
                Ok(Rc::new(Expr::new(ExprKind::If { cond, then, els }, span)))
            }
            _ => self.parse_op_impl(),
        }
    }

    /// `a -> b`, right associative.
    fn parse_op_impl(&mut self) -> Result<Rc<Expr>, ParseError> {
        let left = self.parse_op_or()?;
        if self.eat(&TokenKind::Arrow) {
            let right = self.parse_op_impl()?;
            let span = left.span.merge(right.span);
            return Ok(Rc::new(Expr::new(ExprKind::OpImpl(left, right), span)));
        }
        Ok(left)
    }

    fn parse_op_or(&mut self) -> Result<Rc<Expr>, ParseError> {
        let mut left = self.parse_op_and()?;
        while self.eat(&TokenKind::OrOr) {
            let right = self.parse_op_and()?;
            let span = left.span.merge(right.span);
            left = Rc::new(Expr::new(ExprKind::OpOr(left, right), span));
        }
        Ok(left)
    }

    fn parse_op_and(&mut self) -> Result<Rc<Expr>, ParseError> {
        let mut left = self.parse_op_eq()?;
        while self.eat(&TokenKind::AndAnd) {
            let right = self.parse_op_eq()?;
            let span = left.span.merge(right.span);
            left = Rc::new(Expr::new(ExprKind::OpAnd(left, right), span));
        }
        Ok(left)
    }

    fn parse_op_eq(&mut self) -> Result<Rc<Expr>, ParseError> {
        let left = self.parse_op_update()?;
        match self.current_kind() {
            TokenKind::EqEq => {
                self.advance();
                let right = self.parse_op_update()?;
                let span = left.span.merge(right.span);
                Ok(Rc::new(Expr::new(ExprKind::OpEq(left, right), span)))
            }
            TokenKind::BangEq => {
                self.advance();
                let right = self.parse_op_update()?;
                let span = left.span.merge(right.span);
                Ok(Rc::new(Expr::new(ExprKind::OpNeq(left, right), span)))
            }
            _ => Ok(left),
        }
    }

    /// `a // b`, right associative.
    fn parse_op_update(&mut self) -> Result<Rc<Expr>, ParseError> {
        let left = self.parse_op_not()?;
        if self.eat(&TokenKind::SlashSlash) {
            let right = self.parse_op_update()?;
            let span = left.span.merge(right.span);
            return Ok(Rc::new(Expr::new(ExprKind::OpUpdate(left, right), span)));
        }
        Ok(left)
    }

    fn parse_op_not(&mut self) -> Result<Rc<Expr>, ParseError> {
        if *self.current_kind() == TokenKind::Bang {
            let start = self.advance().span;
            let operand = self.parse_op_not()?;
            let span = start.merge(operand.span);
            return Ok(Rc::new(Expr::new(ExprKind::OpNot(operand), span)));
        }
        self.parse_op_plus()
    }

    /// `a + b + c` collects into a single ConcatStrings node.
    fn parse_op_plus(&mut self) -> Result<Rc<Expr>, ParseError> {
        let first = self.parse_op_concat()?;
        if *self.current_kind() != TokenKind::Plus {
            return Ok(first);
        }
        let mut parts = vec![first];
        while self.eat(&TokenKind::Plus) {
            parts.push(self.parse_op_concat()?);
        }
        let span = parts[0].span.merge(parts[parts.len() - 1].span);
        Ok(Rc::new(Expr::new(ExprKind::ConcatStrings(parts), span)))
    }

    /// `a ++ b`, right associative.
    fn parse_op_concat(&mut self) -> Result<Rc<Expr>, ParseError> {
        let left = self.parse_op_has_attr()?;
        if self.eat(&TokenKind::PlusPlus) {
            let right = self.parse_op_concat()?;
            let span = left.span.merge(right.span);
            return Ok(Rc::new(Expr::new(ExprKind::OpConcat(left, right), span)));
        }
        Ok(left)
    }

    fn parse_op_has_attr(&mut self) -> Result<Rc<Expr>, ParseError> {
        let left = self.parse_app()?;
        if self.eat(&TokenKind::Question) {
            let (name, name_span) = self.parse_attr_name()?;
            let span = left.span.merge(name_span);
            return Ok(Rc::new(Expr::new(ExprKind::OpHasAttr(left, name), span)));
        }
        Ok(left)
    }

    fn parse_app(&mut self) -> Result<Rc<Expr>, ParseError> {
        let mut fun = self.parse_select()?;
        while self.starts_atom() {
            let arg = self.parse_select()?;
            let span = fun.span.merge(arg.span);
            fun = Rc::new(Expr::new(ExprKind::Call(fun, arg), span));
        }
        Ok(fun)
    }

    fn parse_select(&mut self) -> Result<Rc<Expr>, ParseError> {
        let mut expr = self.parse_atom()?;
        while self.eat(&TokenKind::Dot) {
            let (name, name_span) = self.parse_attr_name()?;
            let span = expr.span.merge(name_span);
            expr = Rc::new(Expr::new(ExprKind::Select(expr, name), span));
        }
        Ok(expr)
    }

    /// Whether the current token can begin a function argument.
    fn starts_atom(&self) -> bool {
        matches!(
            self.current_kind(),
            TokenKind::Int(_)
                | TokenKind::StrStart
                | TokenKind::PathLit(_)
                | TokenKind::Ident(_)
                | TokenKind::LParen
                | TokenKind::LBrace
                | TokenKind::LBracket
                | TokenKind::Rec
        )
    }

    fn parse_atom(&mut self) -> Result<Rc<Expr>, ParseError> {
        let start = self.current_span();
        match self.current_kind().clone() {
            TokenKind::Int(n) => {
                self.advance();
                Ok(Rc::new(Expr::new(ExprKind::Int(n), start)))
            }

            TokenKind::StrStart => self.parse_string(start),

            TokenKind::PathLit(text) => {
                self.advance();
                let resolved = if text.starts_with('/') {
                    canon_path(&text)
                } else {
                    canon_path(&format!("{}/{}", self.base_dir.display(), text))
                };
                Ok(Rc::new(Expr::new(ExprKind::Path(resolved), start)))
            }

            TokenKind::Ident(name) => {
                self.advance();
                let sym = self.symbols.intern(&name);
                Ok(Rc::new(Expr::new(ExprKind::Var(sym), start)))
            }

            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expr()?;
                self.expect(&TokenKind::RParen, "`)`")?;
                Ok(expr)
            }

            TokenKind::LBracket => {
                self.advance();
                let mut elems = Vec::new();
                while *self.current_kind() != TokenKind::RBracket {
                    elems.push(self.parse_select()?);
                }
                let end = self.expect(&TokenKind::RBracket, "`]`")?.span;
                Ok(Rc::new(Expr::new(ExprKind::List(elems), start.merge(end))))
            }

            TokenKind::LBrace => {
                self.advance();
                let bindings = self.parse_bindings()?;
                let end = self.expect(&TokenKind::RBrace, "`}`")?.span;
                let all = bindings.into_iter().map(|b| b.binding).collect();
                Ok(Rc::new(Expr::new(ExprKind::Attrs(all), start.merge(end))))
            }

            TokenKind::Rec => {
                self.advance();
                self.expect(&TokenKind::LBrace, "`{` after `rec`")?;
                let bindings = self.parse_bindings()?;
                let end = self.expect(&TokenKind::RBrace, "`}`")?.span;
                let (non_rec, rec): (Vec<_>, Vec<_>) =
                    bindings.into_iter().partition(|b| b.inherited);
                Ok(Rc::new(Expr::new(
                    ExprKind::Rec {
                        rec_bindings: rec.into_iter().map(|b| b.binding).collect(),
                        non_rec_bindings: non_rec.into_iter().map(|b| b.binding).collect(),
                    },
                    start.merge(end),
                )))
            }

            _ => Err(self.unexpected("an expression")),
        }
    }

    /// Parse the pieces of a string literal. A plain string stays `Str`;
    /// anything with interpolation becomes `ConcatStrings`.
    fn parse_string(&mut self, start: Span) -> Result<Rc<Expr>, ParseError> {
        self.expect(&TokenKind::StrStart, "`\"`")?;
        let mut parts: Vec<Rc<Expr>> = Vec::new();
        let mut interpolated = false;

        loop {
            match self.current_kind().clone() {
                TokenKind::StrChunk(text) => {
                    let span = self.advance().span;
                    parts.push(Rc::new(Expr::new(ExprKind::Str(text), span)));
                }
                TokenKind::InterpStart => {
                    self.advance();
                    interpolated = true;
                    parts.push(self.parse_expr()?);
                    self.expect(&TokenKind::InterpEnd, "`}` closing the interpolation")?;
                }
                TokenKind::StrEnd => {
                    let end = self.advance().span;
                    let span = start.merge(end);
                    return Ok(match (parts.len(), interpolated) {
                        (0, _) => Rc::new(Expr::new(ExprKind::Str(String::new()), span)),
                        (1, false) => parts.pop().expect("one part"),
                        _ => Rc::new(Expr::new(ExprKind::ConcatStrings(parts), span)),
                    });
                }
                _ => return Err(self.unexpected("a string piece")),
            }
        }
    }

    // ------------------------------------------------------------------
    // Attribute sets and let
    // ------------------------------------------------------------------

    fn parse_bindings(&mut self) -> Result<Vec<ParsedBinding>, ParseError> {
        let mut bindings: Vec<ParsedBinding> = Vec::new();
        let mut seen: HashSet<Symbol> = HashSet::new();

        while !matches!(self.current_kind(), TokenKind::RBrace | TokenKind::In) {
            if self.eat(&TokenKind::Inherit) {
                if self.eat(&TokenKind::LParen) {
                    // `inherit (e) a b;` — ordinary Select bindings.
                    let source = self.parse_expr()?;
                    self.expect(&TokenKind::RParen, "`)`")?;
                    while !self.eat(&TokenKind::Semicolon) {
                        let (name, span) = self.parse_attr_name()?;
                        self.check_duplicate(&mut seen, name, span)?;
                        bindings.push(ParsedBinding {
                            binding: Binding {
                                name,
                                value: Rc::new(Expr::new(
                                    ExprKind::Select(source.clone(), name),
                                    span,
                                )),
                                span,
                            },
                            inherited: false,
                        });
                    }
                } else {
                    // `inherit a b;` — variables from the enclosing scope.
                    while !self.eat(&TokenKind::Semicolon) {
                        let (name, span) = self.parse_attr_name()?;
                        self.check_duplicate(&mut seen, name, span)?;
                        bindings.push(ParsedBinding {
                            binding: Binding {
                                name,
                                value: Rc::new(Expr::new(ExprKind::Var(name), span)),
                                span,
                            },
                            inherited: true,
                        });
                    }
                }
            } else {
                let (name, span) = self.parse_attr_name()?;
                self.check_duplicate(&mut seen, name, span)?;
                self.expect(&TokenKind::Assign, "`=`")?;
                let value = self.parse_expr()?;
                self.expect(&TokenKind::Semicolon, "`;` after binding")?;
                bindings.push(ParsedBinding {
                    binding: Binding { name, value, span },
                    inherited: false,
                });
            }
        }

        Ok(bindings)
    }

    fn check_duplicate(
        &self,
        seen: &mut HashSet<Symbol>,
        name: Symbol,
        span: Span,
    ) -> Result<(), ParseError> {
        if !seen.insert(name) {
            return Err(ParseError::DuplicateAttr {
                name: self.symbols.resolve(name).to_string(),
                span,
            });
        }
        Ok(())
    }

    /// `let binds in body` desugars to `(rec { binds; <let-body> = body; }).<let-body>`.
    fn parse_let(&mut self, start: Span) -> Result<Rc<Expr>, ParseError> {
        self.expect(&TokenKind::Let, "`let`")?;
        let bindings = self.parse_bindings()?;
        self.expect(&TokenKind::In, "`in`")?;
        let body = self.parse_expr()?;
        let span = start.merge(body.span);

        let body_sym = self.symbols.intern("<let-body>");
        let (non_rec, mut rec): (Vec<_>, Vec<_>) =
            bindings.into_iter().partition(|b| b.inherited);
        let mut rec_bindings: Vec<Binding> = rec.drain(..).map(|b| b.binding).collect();
        rec_bindings.push(Binding {
            name: body_sym,
            value: body,
            span,
        });

        let set = Rc::new(Expr::new(
            ExprKind::Rec {
                rec_bindings,
                non_rec_bindings: non_rec.into_iter().map(|b| b.binding).collect(),
            },
            span,
        ));
        Ok(Rc::new(Expr::new(ExprKind::Select(set, body_sym), span)))
    }

    // ------------------------------------------------------------------
    // Lambdas
    // ------------------------------------------------------------------

    /// Decide whether the `{ … }` group starting at the current token is an
    /// attribute set pattern (followed by `:` or `@`) rather than an
    /// attribute set literal. Scans ahead over balanced braces.
    fn brace_group_is_pattern(&self) -> bool {
        debug_assert_eq!(*self.current_kind(), TokenKind::LBrace);
        let mut depth = 0usize;
        let mut idx = self.pos;
        loop {
            match &self.tokens[idx.min(self.tokens.len() - 1)].kind {
                TokenKind::LBrace => depth += 1,
                TokenKind::RBrace => {
                    depth -= 1;
                    if depth == 0 {
                        return matches!(
                            self.tokens[(idx + 1).min(self.tokens.len() - 1)].kind,
                            TokenKind::Colon | TokenKind::At
                        );
                    }
                }
                TokenKind::Eof => return false,
                _ => {}
            }
            idx += 1;
        }
    }

    fn parse_lambda(&mut self, start: Span) -> Result<Rc<Expr>, ParseError> {
        // `x: body` or `x @ { … }: body`
        if let TokenKind::Ident(name) = self.current_kind().clone() {
            let sym = self.symbols.intern(&name);
            self.advance();
            if self.eat(&TokenKind::Colon) {
                let body = self.parse_expr()?;
                let span = start.merge(body.span);
                return Ok(Rc::new(Expr::new(
                    ExprKind::Lambda {
                        pat: Rc::new(Pattern::Var(sym)),
                        body,
                    },
                    span,
                )));
            }
            self.expect(&TokenKind::At, "`:` or `@`")?;
            let (formals, ellipsis) = self.parse_formals()?;
            self.expect(&TokenKind::Colon, "`:` after pattern")?;
            let body = self.parse_expr()?;
            let span = start.merge(body.span);
            return Ok(Rc::new(Expr::new(
                ExprKind::Lambda {
                    pat: Rc::new(Pattern::Attrs {
                        formals,
                        ellipsis,
                        alias: Some(sym),
                    }),
                    body,
                },
                span,
            )));
        }

        // `{ … }: body` or `{ … } @ x: body`
        let (formals, ellipsis) = self.parse_formals()?;
        let alias = if self.eat(&TokenKind::At) {
            let (sym, _) = self.parse_ident()?;
            Some(sym)
        } else {
            None
        };
        self.expect(&TokenKind::Colon, "`:` after pattern")?;
        let body = self.parse_expr()?;
        let span = start.merge(body.span);
        Ok(Rc::new(Expr::new(
            ExprKind::Lambda {
                pat: Rc::new(Pattern::Attrs {
                    formals,
                    ellipsis,
                    alias,
                }),
                body,
            },
            span,
        )))
    }

    fn parse_formals(&mut self) -> Result<(Vec<Formal>, bool), ParseError> {
        self.expect(&TokenKind::LBrace, "`{`")?;
        let mut formals = Vec::new();
        let mut ellipsis = false;
        let mut seen: HashSet<Symbol> = HashSet::new();

        loop {
            match self.current_kind().clone() {
                TokenKind::RBrace => break,
                TokenKind::Ellipsis => {
                    self.advance();
                    ellipsis = true;
                    break;
                }
                TokenKind::Ident(name) => {
                    let span = self.current_span();
                    self.advance();
                    let sym = self.symbols.intern(&name);
                    if !seen.insert(sym) {
                        return Err(ParseError::DuplicateFormal { name, span });
                    }
                    let default = if self.eat(&TokenKind::Question) {
                        Some(self.parse_expr()?)
                    } else {
                        None
                    };
                    formals.push(Formal { name: sym, default });
                    if !self.eat(&TokenKind::Comma) {
                        break;
                    }
                }
                _ => return Err(self.unexpected("a formal argument, `...`, or `}`")),
            }
        }

        self.expect(&TokenKind::RBrace, "`}` closing the pattern")?;
        Ok((formals, ellipsis))
    }
}
