//! Conditional compilation tracking
//!
//! The `#if` family is handled by a stack of frames; each frame records
//! whether the enclosing context is active, whether the current branch is
//! active, and whether any branch of the group has yet been taken. A region
//! is active iff every frame on the stack has both its own and its parent's
//! active flag set.

use super::macros::{is_ident_cont, is_ident_start, MacroTable};

/// State of a single #if/#ifdef/#ifndef group.
#[derive(Debug, Clone, Copy)]
struct CondFrame {
    /// Whether the enclosing context is active
    parent_active: bool,
    /// Whether the current branch is active
    this_active: bool,
    /// Whether any branch of this group has been taken
    any_taken: bool,
}

/// The conditional-compilation stack.
#[derive(Debug, Default)]
pub struct ConditionalStack {
    stack: Vec<CondFrame>,
}

impl ConditionalStack {
    pub fn new() -> Self {
        Self { stack: Vec::new() }
    }

    /// True when text lines should currently be emitted.
    pub fn is_active(&self) -> bool {
        self.stack
            .iter()
            .all(|f| f.this_active && f.parent_active)
    }

    /// Current nesting depth.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Push a new #if/#ifdef/#ifndef frame.
    pub fn push_if(&mut self, condition: bool) {
        let parent_active = self.is_active();
        let this_active = parent_active && condition;
        self.stack.push(CondFrame {
            parent_active,
            this_active,
            any_taken: this_active,
        });
    }

    /// Handle #elif. Returns false when there is no matching #if.
    pub fn handle_elif(&mut self, condition: bool) -> bool {
        let Some(frame) = self.stack.last_mut() else {
            return false;
        };
        if frame.any_taken {
            frame.this_active = false;
        } else {
            frame.this_active = frame.parent_active && condition;
            frame.any_taken |= frame.this_active;
        }
        true
    }

    /// Handle #else. Returns false when there is no matching #if.
    pub fn handle_else(&mut self) -> bool {
        let Some(frame) = self.stack.last_mut() else {
            return false;
        };
        if frame.any_taken {
            frame.this_active = false;
        } else {
            frame.this_active = frame.parent_active;
            frame.any_taken = true;
        }
        true
    }

    /// Handle #endif. Returns false when there is no matching #if.
    pub fn handle_endif(&mut self) -> bool {
        self.stack.pop().is_some()
    }
}

/// Evaluate a `#if`/`#elif` condition.
///
/// The expression language is deliberately small: `defined(NAME)` or
/// `defined NAME`, identifiers (1 if defined as a macro, else 0), decimal
/// integers, parentheses, `!`, `&&`, `||`. `&&` binds tighter than `||`.
/// The evaluator is total; anything unrecognised yields 0.
pub fn eval_condition(expr: &str, macros: &MacroTable) -> bool {
    let tokens = tokenize(expr);
    let mut parser = CondParser {
        tokens: &tokens,
        pos: 0,
        macros,
    };
    parser.parse_or() != 0
}

#[derive(Debug, Clone, PartialEq)]
enum CondToken {
    Num(i64),
    Ident(String),
    Defined,
    Not,
    AndAnd,
    OrOr,
    LParen,
    RParen,
}

fn tokenize(expr: &str) -> Vec<CondToken> {
    let bytes = expr.as_bytes();
    let len = bytes.len();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < len {
        let b = bytes[i];
        if b.is_ascii_whitespace() {
            i += 1;
        } else if b.is_ascii_digit() {
            let start = i;
            while i < len && bytes[i].is_ascii_digit() {
                i += 1;
            }
            let value = expr[start..i].parse().unwrap_or(0);
            tokens.push(CondToken::Num(value));
        } else if is_ident_start(b) {
            let start = i;
            while i < len && is_ident_cont(bytes[i]) {
                i += 1;
            }
            let ident = &expr[start..i];
            if ident == "defined" {
                tokens.push(CondToken::Defined);
            } else {
                tokens.push(CondToken::Ident(ident.to_string()));
            }
        } else if b == b'!' {
            tokens.push(CondToken::Not);
            i += 1;
        } else if b == b'&' && i + 1 < len && bytes[i + 1] == b'&' {
            tokens.push(CondToken::AndAnd);
            i += 2;
        } else if b == b'|' && i + 1 < len && bytes[i + 1] == b'|' {
            tokens.push(CondToken::OrOr);
            i += 2;
        } else if b == b'(' {
            tokens.push(CondToken::LParen);
            i += 1;
        } else if b == b')' {
            tokens.push(CondToken::RParen);
            i += 1;
        } else {
            // Unrecognised construct: skip it, the evaluator stays total
            i += 1;
        }
    }

    tokens
}

struct CondParser<'a> {
    tokens: &'a [CondToken],
    pos: usize,
    macros: &'a MacroTable,
}

impl<'a> CondParser<'a> {
    fn peek(&self) -> Option<&CondToken> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<&CondToken> {
        let tok = self.tokens.get(self.pos);
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn parse_or(&mut self) -> i64 {
        let mut left = self.parse_and();
        while self.peek() == Some(&CondToken::OrOr) {
            self.bump();
            let right = self.parse_and();
            left = i64::from(left != 0 || right != 0);
        }
        left
    }

    fn parse_and(&mut self) -> i64 {
        let mut left = self.parse_unary();
        while self.peek() == Some(&CondToken::AndAnd) {
            self.bump();
            let right = self.parse_unary();
            left = i64::from(left != 0 && right != 0);
        }
        left
    }

    fn parse_unary(&mut self) -> i64 {
        if self.peek() == Some(&CondToken::Not) {
            self.bump();
            return i64::from(self.parse_unary() == 0);
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> i64 {
        match self.bump().cloned() {
            Some(CondToken::Num(n)) => n,
            Some(CondToken::Ident(name)) => i64::from(self.macros.is_defined(&name)),
            Some(CondToken::Defined) => {
                // defined(NAME) or defined NAME
                let parenthesised = self.peek() == Some(&CondToken::LParen);
                if parenthesised {
                    self.bump();
                }
                let value = match self.bump().cloned() {
                    Some(CondToken::Ident(name)) => i64::from(self.macros.is_defined(&name)),
                    _ => 0,
                };
                if parenthesised && self.peek() == Some(&CondToken::RParen) {
                    self.bump();
                }
                value
            }
            Some(CondToken::LParen) => {
                let value = self.parse_or();
                if self.peek() == Some(&CondToken::RParen) {
                    self.bump();
                }
                value
            }
            _ => 0,
        }
    }
}
