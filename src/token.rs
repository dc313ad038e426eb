//! Token definitions for the C subset
//!
//! This module defines all the tokens the lexer can produce from
//! preprocessed source text.

use crate::span::Span;
use logos::Logos;
use std::fmt;

/// A token produced by the lexer
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Get the text of this token from source
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        self.span.text(source)
    }
}

/// All possible token types in the accepted C subset
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n\f]+")] // Skip whitespace
#[logos(skip r"//[^\n]*")] // Skip line comments
#[logos(skip r"/\*([^*]|\*+[^*/])*\*+/")] // Skip block comments
pub enum TokenKind {
    // ============ Literals ============

    /// Integer constant: 42, 0xFF, 052
    #[regex(r"[0-9][0-9]*", priority = 2)]
    #[regex(r"0[xX][0-9a-fA-F]+")]
    IntConstant,

    /// Floating constant: 3.14, 1e10, 2.5e-3
    #[regex(r"[0-9]+\.[0-9]*([eE][+-]?[0-9]+)?")]
    #[regex(r"\.[0-9]+([eE][+-]?[0-9]+)?")]
    #[regex(r"[0-9]+[eE][+-]?[0-9]+")]
    FloatConstant,

    /// Character constant: 'a'
    #[regex(r"'([^'\\]|\\.)'")]
    CharConstant,

    /// String literal: "hello"
    #[regex(r#""([^"\\]|\\.)*""#)]
    StringLiteral,

    // ============ Type keywords ============

    #[token("int")]
    Int,
    #[token("char")]
    Char,
    #[token("float")]
    Float,
    #[token("double")]
    Double,
    #[token("void")]
    Void,
    #[token("long")]
    Long,
    #[token("short")]
    Short,
    #[token("signed")]
    Signed,
    #[token("unsigned")]
    Unsigned,
    #[token("_Bool")]
    Bool,

    // ============ Statement keywords ============

    #[token("return")]
    Return,
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("while")]
    While,
    #[token("for")]
    For,
    #[token("break")]
    Break,
    #[token("continue")]
    Continue,
    #[token("sizeof")]
    Sizeof,

    // ============ Operators ============

    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,

    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("<=")]
    LtEq,
    #[token(">=")]
    GtEq,

    #[token("&&")]
    AndAnd,
    #[token("||")]
    OrOr,
    #[token("!")]
    Not,

    #[token("&")]
    Amp,
    #[token("|")]
    Pipe,
    #[token("^")]
    Caret,
    #[token("~")]
    Tilde,
    #[token("<<")]
    Shl,
    #[token(">>")]
    Shr,

    #[token("=")]
    Eq,
    #[token("+=")]
    PlusEq,
    #[token("-=")]
    MinusEq,
    #[token("*=")]
    StarEq,
    #[token("/=")]
    SlashEq,
    #[token("%=")]
    PercentEq,

    #[token("++")]
    PlusPlus,
    #[token("--")]
    MinusMinus,

    #[token("->")]
    Arrow,
    #[token(".")]
    Dot,
    #[token("?")]
    Question,
    #[token(":")]
    Colon,

    // ============ Delimiters ============

    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token(";")]
    Semicolon,
    #[token(",")]
    Comma,

    // ============ Other ============

    /// Identifier: variable and function names
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*")]
    Ident,

    /// End of file (synthesised by the lexer, never matched by logos)
    Eof,
}

impl TokenKind {
    /// Is this token a declaration-specifier type keyword?
    pub fn is_type_specifier(&self) -> bool {
        matches!(
            self,
            TokenKind::Int
                | TokenKind::Char
                | TokenKind::Float
                | TokenKind::Double
                | TokenKind::Void
                | TokenKind::Long
                | TokenKind::Short
                | TokenKind::Signed
                | TokenKind::Unsigned
                | TokenKind::Bool
        )
    }

    /// Is this token an assignment operator?
    pub fn is_assignment_op(&self) -> bool {
        matches!(
            self,
            TokenKind::Eq
                | TokenKind::PlusEq
                | TokenKind::MinusEq
                | TokenKind::StarEq
                | TokenKind::SlashEq
                | TokenKind::PercentEq
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TokenKind::IntConstant => "integer constant",
            TokenKind::FloatConstant => "floating constant",
            TokenKind::CharConstant => "character constant",
            TokenKind::StringLiteral => "string literal",
            TokenKind::Int => "int",
            TokenKind::Char => "char",
            TokenKind::Float => "float",
            TokenKind::Double => "double",
            TokenKind::Void => "void",
            TokenKind::Long => "long",
            TokenKind::Short => "short",
            TokenKind::Signed => "signed",
            TokenKind::Unsigned => "unsigned",
            TokenKind::Bool => "_Bool",
            TokenKind::Return => "return",
            TokenKind::If => "if",
            TokenKind::Else => "else",
            TokenKind::While => "while",
            TokenKind::For => "for",
            TokenKind::Break => "break",
            TokenKind::Continue => "continue",
            TokenKind::Sizeof => "sizeof",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            TokenKind::EqEq => "==",
            TokenKind::NotEq => "!=",
            TokenKind::Lt => "<",
            TokenKind::Gt => ">",
            TokenKind::LtEq => "<=",
            TokenKind::GtEq => ">=",
            TokenKind::AndAnd => "&&",
            TokenKind::OrOr => "||",
            TokenKind::Not => "!",
            TokenKind::Amp => "&",
            TokenKind::Pipe => "|",
            TokenKind::Caret => "^",
            TokenKind::Tilde => "~",
            TokenKind::Shl => "<<",
            TokenKind::Shr => ">>",
            TokenKind::Eq => "=",
            TokenKind::PlusEq => "+=",
            TokenKind::MinusEq => "-=",
            TokenKind::StarEq => "*=",
            TokenKind::SlashEq => "/=",
            TokenKind::PercentEq => "%=",
            TokenKind::PlusPlus => "++",
            TokenKind::MinusMinus => "--",
            TokenKind::Arrow => "->",
            TokenKind::Dot => ".",
            TokenKind::Question => "?",
            TokenKind::Colon => ":",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::Semicolon => ";",
            TokenKind::Comma => ",",
            TokenKind::Ident => "identifier",
            TokenKind::Eof => "end of file",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        TokenKind::lexer(source).filter_map(|t| t.ok()).collect()
    }

    #[test]
    fn test_constants() {
        assert_eq!(
            kinds("42 0xFF 3.14 1e10 'a' \"hi\""),
            vec![
                TokenKind::IntConstant,
                TokenKind::IntConstant,
                TokenKind::FloatConstant,
                TokenKind::FloatConstant,
                TokenKind::CharConstant,
                TokenKind::StringLiteral,
            ]
        );
    }

    #[test]
    fn test_compound_operators() {
        assert_eq!(
            kinds("+= -= *= /= %= ++ -- << >> && ||"),
            vec![
                TokenKind::PlusEq,
                TokenKind::MinusEq,
                TokenKind::StarEq,
                TokenKind::SlashEq,
                TokenKind::PercentEq,
                TokenKind::PlusPlus,
                TokenKind::MinusMinus,
                TokenKind::Shl,
                TokenKind::Shr,
                TokenKind::AndAnd,
                TokenKind::OrOr,
            ]
        );
    }

    #[test]
    fn test_keywords_vs_identifiers() {
        assert_eq!(
            kinds("int interior _Bool boolean"),
            vec![
                TokenKind::Int,
                TokenKind::Ident,
                TokenKind::Bool,
                TokenKind::Ident,
            ]
        );
    }

    #[test]
    fn test_comments_skipped() {
        assert_eq!(
            kinds("int /* block */ x; // line\nreturn"),
            vec![
                TokenKind::Int,
                TokenKind::Ident,
                TokenKind::Semicolon,
                TokenKind::Return,
            ]
        );
    }
}
