//! Read position over a lexed token sequence. The semantic analyzer and the
//! TAC generator each walk the same tokens with their own cursor.

use crate::{
    diagnostics::CompilationError,
    frontend::lexer::{Keyword, Token, TokenKind},
};

#[derive(Debug, Clone)]
pub struct TokenCursor<'t> {
    tokens: &'t [Token],
    position: usize,
}

impl<'t> TokenCursor<'t> {
    /// `tokens` must end with an EOF token, as produced by the lexer
    pub fn new(tokens: &'t [Token]) -> Self {
        debug_assert!(
            tokens.last().is_some_and(|t| t.kind == TokenKind::Eof),
            "token stream must be terminated by EOF"
        );

        Self {
            tokens,
            position: 0,
        }
    }

    pub fn peek(&self) -> &'t Token {
        self.peek_nth(0)
    }

    /// Looks `n` tokens ahead. Reading past the end keeps returning EOF.
    pub fn peek_nth(&self, n: usize) -> &'t Token {
        let index = (self.position + n).min(self.tokens.len() - 1);
        &self.tokens[index]
    }

    pub fn is_eof(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    pub fn next_is(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    pub fn next_is_keyword(&self, keyword: Keyword) -> bool {
        self.next_is(TokenKind::Keyword(keyword))
    }

    pub fn next(&mut self) -> &'t Token {
        let token = self.peek();

        if token.kind != TokenKind::Eof {
            self.position += 1;
        }

        token
    }

    /// Consumes the next token if it is one of `kinds`
    pub fn eat_any(&mut self, kinds: &[TokenKind]) -> Option<&'t Token> {
        kinds.contains(&self.peek().kind).then(|| self.next())
    }

    pub fn eat(&mut self, kind: TokenKind) -> Option<&'t Token> {
        self.eat_any(&[kind])
    }

    pub fn expect_next_to_be(
        &mut self,
        kind: TokenKind,
        expecting: &str,
    ) -> Result<&'t Token, CompilationError> {
        let token = self.peek();

        if token.kind != kind {
            return Err(Self::unexpected(token, expecting));
        }

        Ok(self.next())
    }

    pub fn expect_keyword(&mut self, keyword: Keyword) -> Result<&'t Token, CompilationError> {
        let expecting: &'static str = keyword.into();
        self.expect_next_to_be(TokenKind::Keyword(keyword), &format!("'{expecting}'"))
    }

    pub fn unexpected(token: &Token, expecting: &str) -> CompilationError {
        CompilationError::syntactic(
            token.line,
            token.column,
            "Unexpected token",
            format!("Expected {expecting} but found {}", token.describe()),
        )
    }
}
