//! Lexer for the preprocessed C subset
//!
//! The lexer converts preprocessed source text into a stream of tokens.
//! It uses the `logos` crate for efficient lexing.

use crate::span::Span;
use crate::token::{Token, TokenKind};
use logos::Logos;
use thiserror::Error;

/// Lexer errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LexerError {
    #[error("unexpected character at position {0}")]
    UnexpectedChar(usize),
}

/// The lexer for the C subset
pub struct Lexer<'src> {
    source: &'src str,
    inner: logos::Lexer<'src, TokenKind>,
    peeked: Option<Token>,
    errors: Vec<LexerError>,
}

impl<'src> Lexer<'src> {
    /// Create a new lexer for the given source code
    pub fn new(source: &'src str) -> Self {
        Self {
            source,
            inner: TokenKind::lexer(source),
            peeked: None,
            errors: Vec::new(),
        }
    }

    /// Get the source code
    pub fn source(&self) -> &'src str {
        self.source
    }

    /// Get any errors that occurred during lexing
    pub fn errors(&self) -> &[LexerError] {
        &self.errors
    }

    /// Peek at the next token without consuming it
    pub fn peek(&mut self) -> Option<&Token> {
        if self.peeked.is_none() {
            self.peeked = self.next_token();
        }
        self.peeked.as_ref()
    }

    /// Get the next token
    pub fn next_token(&mut self) -> Option<Token> {
        if let Some(token) = self.peeked.take() {
            return Some(token);
        }

        loop {
            match self.inner.next() {
                Some(Ok(kind)) => {
                    let span = self.inner.span();
                    return Some(Token::new(kind, Span::new(span.start, span.end)));
                }
                Some(Err(())) => {
                    // Skip invalid tokens and record error
                    let span = self.inner.span();
                    self.errors.push(LexerError::UnexpectedChar(span.start));
                    continue;
                }
                None => {
                    // End of input - return EOF token
                    let pos = self.source.len();
                    return Some(Token::new(TokenKind::Eof, Span::new(pos, pos)));
                }
            }
        }
    }

    /// Collect all tokens into a vector
    pub fn tokenize(mut self) -> (Vec<Token>, Vec<LexerError>) {
        let mut tokens = Vec::new();

        loop {
            match self.next_token() {
                Some(token) if token.kind == TokenKind::Eof => {
                    tokens.push(token);
                    break;
                }
                Some(token) => tokens.push(token),
                None => break,
            }
        }

        (tokens, self.errors)
    }
}

impl<'src> Iterator for Lexer<'src> {
    type Item = Token;

    fn next(&mut self) -> Option<Self::Item> {
        let token = self.next_token()?;
        if token.kind == TokenKind::Eof {
            None
        } else {
            Some(token)
        }
    }
}

/// Helper function to lex source code
pub fn lex(source: &str) -> (Vec<Token>, Vec<LexerError>) {
    Lexer::new(source).tokenize()
}
