//! Grammar-shaped parse tree
//!
//! The parser produces this tree; the AST builder consumes it. Rule nodes
//! correspond one-to-one to the grammar productions of the accepted C
//! subset, and terminal nodes carry the original token text so the builder
//! can tag operators and classify constants by lexical shape. Neither the
//! AST nor the IR layers see these types.

use crate::span::Position;

/// A grammar production in the accepted subset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    TranslationUnit,
    ExternalDeclaration,
    FunctionDefinition,
    Declaration,
    DeclarationSpecifiers,
    TypeSpecifier,
    Declarator,
    Pointer,
    DirectDeclarator,
    ParameterTypeList,
    ParameterList,
    ParameterDeclaration,
    InitDeclarator,
    Initializer,
    CompoundStatement,
    BlockItem,
    Statement,
    ExpressionStatement,
    SelectionStatement,
    IterationStatement,
    JumpStatement,
    ForCondition,
    ForDeclaration,
    ForExpression,
    Expression,
    AssignmentExpression,
    AssignmentOperator,
    ConditionalExpression,
    LogicalOrExpression,
    LogicalAndExpression,
    InclusiveOrExpression,
    ExclusiveOrExpression,
    AndExpression,
    EqualityExpression,
    RelationalExpression,
    ShiftExpression,
    AdditiveExpression,
    MultiplicativeExpression,
    CastExpression,
    UnaryExpression,
    UnaryOperator,
    PostfixExpression,
    PrimaryExpression,
    ArgumentExpressionList,
}

/// One node of the parse tree.
#[derive(Debug, Clone)]
pub enum ParseNode {
    Rule(RuleNode),
    /// A terminal, carrying its source text
    Token(TokenNode),
}

/// An interior node labelled with its grammar production.
#[derive(Debug, Clone)]
pub struct RuleNode {
    pub kind: RuleKind,
    pub children: Vec<ParseNode>,
    pub pos: Position,
}

/// A terminal node.
#[derive(Debug, Clone)]
pub struct TokenNode {
    pub text: String,
    pub pos: Position,
}

impl ParseNode {
    pub fn rule(kind: RuleKind, children: Vec<ParseNode>, pos: Position) -> Self {
        ParseNode::Rule(RuleNode {
            kind,
            children,
            pos,
        })
    }

    pub fn token(text: impl Into<String>, pos: Position) -> Self {
        ParseNode::Token(TokenNode {
            text: text.into(),
            pos,
        })
    }

    pub fn pos(&self) -> Position {
        match self {
            ParseNode::Rule(r) => r.pos,
            ParseNode::Token(t) => t.pos,
        }
    }

    pub fn as_rule(&self) -> Option<&RuleNode> {
        match self {
            ParseNode::Rule(r) => Some(r),
            ParseNode::Token(_) => None,
        }
    }

    /// The rule node, when this node is the given production.
    pub fn as_rule_of(&self, kind: RuleKind) -> Option<&RuleNode> {
        self.as_rule().filter(|r| r.kind == kind)
    }

    pub fn as_token_text(&self) -> Option<&str> {
        match self {
            ParseNode::Token(t) => Some(t.text.as_str()),
            ParseNode::Rule(_) => None,
        }
    }
}

impl RuleNode {
    /// First child that is the given production.
    pub fn child(&self, kind: RuleKind) -> Option<&RuleNode> {
        self.children.iter().find_map(|c| c.as_rule_of(kind))
    }

    /// All children that are the given production, in order.
    pub fn children_of(&self, kind: RuleKind) -> Vec<&RuleNode> {
        self.children
            .iter()
            .filter_map(|c| c.as_rule_of(kind))
            .collect()
    }

    /// First terminal child text, if any.
    pub fn first_token(&self) -> Option<&str> {
        self.children.iter().find_map(|c| c.as_token_text())
    }

    /// Whether some terminal child has exactly this text.
    pub fn has_token(&self, text: &str) -> bool {
        self.children
            .iter()
            .any(|c| c.as_token_text() == Some(text))
    }

    /// Terminal text at a child index, if that child is a terminal.
    pub fn token_at(&self, index: usize) -> Option<&str> {
        self.children.get(index).and_then(|c| c.as_token_text())
    }
}
