//! Parser for the C subset
//!
//! A recursive descent parser that turns tokens into the grammar-shaped
//! parse tree consumed by the AST builder. Precedence and associativity are
//! encoded in the left-recursive expression cascade, so the builder never
//! has to re-implement them.

use crate::lexer::Lexer;
use crate::parse_tree::{ParseNode, RuleKind};
use crate::span::{Position, Span};
use crate::token::{Token, TokenKind};
use thiserror::Error;

/// Parser errors
#[derive(Error, Debug, Clone)]
pub enum ParseError {
    #[error("unexpected token at {position}: expected {expected}, found {found}")]
    UnexpectedToken {
        expected: String,
        found: TokenKind,
        position: Position,
    },

    #[error("unexpected end of file")]
    UnexpectedEof,
}

/// Parse result
pub type ParseResult<T> = Result<T, ParseError>;

/// The parser for the C subset.
pub struct Parser<'src> {
    lexer: Lexer<'src>,
    current: Token,
    previous: Token,
    errors: Vec<ParseError>,
}

impl<'src> Parser<'src> {
    /// Create a new parser
    pub fn new(source: &'src str) -> Self {
        let mut lexer = Lexer::new(source);
        let current = lexer.next_token().unwrap_or(Token::new(
            TokenKind::Eof,
            Span::new(source.len(), source.len()),
        ));
        let previous = current.clone();

        Self {
            lexer,
            current,
            previous,
            errors: Vec::new(),
        }
    }

    /// Get the source code
    pub fn source(&self) -> &'src str {
        self.lexer.source()
    }

    /// Get parse errors
    pub fn errors(&self) -> &[ParseError] {
        &self.errors
    }

    /// Advance to next token
    fn advance(&mut self) -> Token {
        self.previous = self.current.clone();
        self.current = self.lexer.next_token().unwrap_or(Token::new(
            TokenKind::Eof,
            Span::new(self.source().len(), self.source().len()),
        ));
        self.previous.clone()
    }

    /// Check if current token matches
    fn check(&self, kind: TokenKind) -> bool {
        self.current.kind == kind
    }

    /// Check if at end of file
    fn is_at_end(&self) -> bool {
        self.check(TokenKind::Eof)
    }

    /// Consume token if it matches, otherwise error
    fn expect(&mut self, kind: TokenKind) -> ParseResult<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(&format!("{}", kind)))
        }
    }

    /// Consume token if it matches
    fn consume(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        ParseError::UnexpectedToken {
            expected: expected.to_string(),
            found: self.current.kind,
            position: self.here(),
        }
    }

    /// Line/column of the current token
    fn here(&self) -> Position {
        Position::from_offset(self.source(), self.current.span.start)
    }

    /// Terminal parse node for a consumed token
    fn token_node(&self, token: &Token) -> ParseNode {
        ParseNode::token(
            token.text(self.source()),
            Position::from_offset(self.source(), token.span.start),
        )
    }

    /// Skip forward to a statement boundary after an error. Always consumes
    /// at least one token so recovery makes progress.
    fn synchronize(&mut self) {
        self.advance();
        while !self.is_at_end() {
            if matches!(
                self.previous.kind,
                TokenKind::Semicolon | TokenKind::RBrace
            ) {
                return;
            }
            self.advance();
        }
    }

    // ============ Top-level parsing ============

    /// Parse a complete translation unit
    pub fn parse_translation_unit(&mut self) -> ParseNode {
        let pos = self.here();
        let mut children = Vec::new();

        while !self.is_at_end() {
            match self.parse_external_declaration() {
                Ok(decl) => children.push(decl),
                Err(e) => {
                    self.errors.push(e);
                    self.synchronize();
                }
            }
        }

        ParseNode::rule(RuleKind::TranslationUnit, children, pos)
    }

    /// externalDeclaration: functionDefinition | declaration
    fn parse_external_declaration(&mut self) -> ParseResult<ParseNode> {
        let pos = self.here();
        let specifiers = self.parse_declaration_specifiers()?;
        let declarator = self.parse_declarator()?;

        let inner = if self.check(TokenKind::LBrace) {
            let body = self.parse_compound_statement()?;
            ParseNode::rule(
                RuleKind::FunctionDefinition,
                vec![specifiers, declarator, body],
                pos,
            )
        } else {
            self.finish_declaration(specifiers, declarator, pos)?
        };

        Ok(ParseNode::rule(
            RuleKind::ExternalDeclaration,
            vec![inner],
            pos,
        ))
    }

    /// The tail of a declaration after its declarator: optional initializer
    /// and the terminating semicolon.
    fn finish_declaration(
        &mut self,
        specifiers: ParseNode,
        declarator: ParseNode,
        pos: Position,
    ) -> ParseResult<ParseNode> {
        let mut init_children = vec![declarator];
        if self.check(TokenKind::Eq) {
            let eq = self.advance();
            init_children.push(self.token_node(&eq));
            let value = self.parse_assignment_expression()?;
            init_children.push(ParseNode::rule(
                RuleKind::Initializer,
                vec![value],
                pos,
            ));
        }
        let init_declarator = ParseNode::rule(RuleKind::InitDeclarator, init_children, pos);

        let semi = self.expect(TokenKind::Semicolon)?;
        Ok(ParseNode::rule(
            RuleKind::Declaration,
            vec![specifiers, init_declarator, self.token_node(&semi)],
            pos,
        ))
    }

    /// declaration: declarationSpecifiers initDeclarator ';'
    fn parse_declaration(&mut self) -> ParseResult<ParseNode> {
        let pos = self.here();
        let specifiers = self.parse_declaration_specifiers()?;
        let declarator = self.parse_declarator()?;
        self.finish_declaration(specifiers, declarator, pos)
    }

    /// declarationSpecifiers: typeSpecifier+
    fn parse_declaration_specifiers(&mut self) -> ParseResult<ParseNode> {
        let pos = self.here();
        let mut children = Vec::new();

        while self.current.kind.is_type_specifier() {
            let spec_pos = self.here();
            let tok = self.advance();
            children.push(ParseNode::rule(
                RuleKind::TypeSpecifier,
                vec![self.token_node(&tok)],
                spec_pos,
            ));
        }

        if children.is_empty() {
            return Err(self.unexpected("type specifier"));
        }

        Ok(ParseNode::rule(
            RuleKind::DeclarationSpecifiers,
            children,
            pos,
        ))
    }

    /// declarator: pointer? directDeclarator
    fn parse_declarator(&mut self) -> ParseResult<ParseNode> {
        let pos = self.here();
        let mut children = Vec::new();

        if self.check(TokenKind::Star) {
            let ptr_pos = self.here();
            let mut stars = Vec::new();
            while self.check(TokenKind::Star) {
                let tok = self.advance();
                stars.push(self.token_node(&tok));
            }
            children.push(ParseNode::rule(RuleKind::Pointer, stars, ptr_pos));
        }

        children.push(self.parse_direct_declarator()?);
        Ok(ParseNode::rule(RuleKind::Declarator, children, pos))
    }

    /// directDeclarator: Identifier ('(' parameterTypeList? ')')?
    fn parse_direct_declarator(&mut self) -> ParseResult<ParseNode> {
        let pos = self.here();
        let ident = self.expect(TokenKind::Ident)?;
        let mut children = vec![self.token_node(&ident)];

        if self.check(TokenKind::LParen) {
            let open = self.advance();
            children.push(self.token_node(&open));
            if !self.check(TokenKind::RParen) {
                children.push(self.parse_parameter_type_list()?);
            }
            let close = self.expect(TokenKind::RParen)?;
            children.push(self.token_node(&close));
        }

        Ok(ParseNode::rule(RuleKind::DirectDeclarator, children, pos))
    }

    /// parameterTypeList: parameterList
    fn parse_parameter_type_list(&mut self) -> ParseResult<ParseNode> {
        let pos = self.here();
        let mut params = vec![self.parse_parameter_declaration()?];
        while self.consume(TokenKind::Comma) {
            params.push(self.parse_parameter_declaration()?);
        }
        let list = ParseNode::rule(RuleKind::ParameterList, params, pos);
        Ok(ParseNode::rule(RuleKind::ParameterTypeList, vec![list], pos))
    }

    /// parameterDeclaration: declarationSpecifiers declarator?
    ///
    /// The declarator is optional so prototypes such as `int even(int);`
    /// parse; a bare `*` chain without a name is also accepted.
    fn parse_parameter_declaration(&mut self) -> ParseResult<ParseNode> {
        let pos = self.here();
        let specifiers = self.parse_declaration_specifiers()?;
        let mut children = vec![specifiers];

        if self.check(TokenKind::Star) || self.check(TokenKind::Ident) {
            let decl_pos = self.here();
            let mut decl_children = Vec::new();
            if self.check(TokenKind::Star) {
                let ptr_pos = self.here();
                let mut stars = Vec::new();
                while self.check(TokenKind::Star) {
                    let tok = self.advance();
                    stars.push(self.token_node(&tok));
                }
                decl_children.push(ParseNode::rule(RuleKind::Pointer, stars, ptr_pos));
            }
            if self.check(TokenKind::Ident) {
                let ident = self.advance();
                let dd = ParseNode::rule(
                    RuleKind::DirectDeclarator,
                    vec![self.token_node(&ident)],
                    decl_pos,
                );
                decl_children.push(dd);
            }
            children.push(ParseNode::rule(
                RuleKind::Declarator,
                decl_children,
                decl_pos,
            ));
        }

        Ok(ParseNode::rule(
            RuleKind::ParameterDeclaration,
            children,
            pos,
        ))
    }

    // ============ Statements ============

    /// statement: one of the five statement productions
    fn parse_statement(&mut self) -> ParseResult<ParseNode> {
        let pos = self.here();
        let inner = match self.current.kind {
            TokenKind::LBrace => self.parse_compound_statement()?,
            TokenKind::If => self.parse_selection_statement()?,
            TokenKind::While | TokenKind::For => self.parse_iteration_statement()?,
            TokenKind::Return | TokenKind::Break | TokenKind::Continue => {
                self.parse_jump_statement()?
            }
            _ => self.parse_expression_statement()?,
        };
        Ok(ParseNode::rule(RuleKind::Statement, vec![inner], pos))
    }

    /// compoundStatement: '{' blockItem* '}'
    fn parse_compound_statement(&mut self) -> ParseResult<ParseNode> {
        let pos = self.here();
        self.expect(TokenKind::LBrace)?;
        let mut children = Vec::new();

        while !self.check(TokenKind::RBrace) && !self.is_at_end() {
            let item_pos = self.here();
            let item = if self.current.kind.is_type_specifier() {
                self.parse_declaration()?
            } else {
                self.parse_statement()?
            };
            children.push(ParseNode::rule(RuleKind::BlockItem, vec![item], item_pos));
        }

        self.expect(TokenKind::RBrace)?;
        Ok(ParseNode::rule(RuleKind::CompoundStatement, children, pos))
    }

    /// expressionStatement: expression? ';'
    fn parse_expression_statement(&mut self) -> ParseResult<ParseNode> {
        let pos = self.here();
        let mut children = Vec::new();
        if !self.check(TokenKind::Semicolon) {
            children.push(self.parse_expression()?);
        }
        let semi = self.expect(TokenKind::Semicolon)?;
        children.push(self.token_node(&semi));
        Ok(ParseNode::rule(
            RuleKind::ExpressionStatement,
            children,
            pos,
        ))
    }

    /// selectionStatement: 'if' '(' expression ')' statement ('else' statement)?
    fn parse_selection_statement(&mut self) -> ParseResult<ParseNode> {
        let pos = self.here();
        let kw = self.expect(TokenKind::If)?;
        let mut children = vec![self.token_node(&kw)];
        self.expect(TokenKind::LParen)?;
        children.push(self.parse_expression()?);
        self.expect(TokenKind::RParen)?;
        children.push(self.parse_statement()?);
        if self.check(TokenKind::Else) {
            let else_kw = self.advance();
            children.push(self.token_node(&else_kw));
            children.push(self.parse_statement()?);
        }
        Ok(ParseNode::rule(RuleKind::SelectionStatement, children, pos))
    }

    /// iterationStatement: while-loop or for-loop
    fn parse_iteration_statement(&mut self) -> ParseResult<ParseNode> {
        let pos = self.here();
        if self.check(TokenKind::While) {
            let kw = self.advance();
            let mut children = vec![self.token_node(&kw)];
            self.expect(TokenKind::LParen)?;
            children.push(self.parse_expression()?);
            self.expect(TokenKind::RParen)?;
            children.push(self.parse_statement()?);
            return Ok(ParseNode::rule(RuleKind::IterationStatement, children, pos));
        }

        let kw = self.expect(TokenKind::For)?;
        let mut children = vec![self.token_node(&kw)];
        self.expect(TokenKind::LParen)?;
        children.push(self.parse_for_condition()?);
        self.expect(TokenKind::RParen)?;
        children.push(self.parse_statement()?);
        Ok(ParseNode::rule(RuleKind::IterationStatement, children, pos))
    }

    /// forCondition: (forDeclaration | expression?) ';' forExpression? ';' forExpression?
    ///
    /// The two semicolons are kept as terminals so the builder can split the
    /// three optional slots positionally.
    fn parse_for_condition(&mut self) -> ParseResult<ParseNode> {
        let pos = self.here();
        let mut children = Vec::new();

        if self.current.kind.is_type_specifier() {
            children.push(self.parse_for_declaration()?);
        } else {
            if !self.check(TokenKind::Semicolon) {
                children.push(self.parse_for_expression()?);
            }
            let semi = self.expect(TokenKind::Semicolon)?;
            children.push(self.token_node(&semi));
        }

        if !self.check(TokenKind::Semicolon) {
            children.push(self.parse_for_expression()?);
        }
        let semi = self.expect(TokenKind::Semicolon)?;
        children.push(self.token_node(&semi));

        if !self.check(TokenKind::RParen) {
            children.push(self.parse_for_expression()?);
        }

        Ok(ParseNode::rule(RuleKind::ForCondition, children, pos))
    }

    /// forDeclaration: declarationSpecifiers initDeclarator ';'
    fn parse_for_declaration(&mut self) -> ParseResult<ParseNode> {
        let pos = self.here();
        let specifiers = self.parse_declaration_specifiers()?;
        let declarator = self.parse_declarator()?;

        let mut init_children = vec![declarator];
        if self.check(TokenKind::Eq) {
            let eq = self.advance();
            init_children.push(self.token_node(&eq));
            let value = self.parse_assignment_expression()?;
            init_children.push(ParseNode::rule(RuleKind::Initializer, vec![value], pos));
        }
        let init_declarator = ParseNode::rule(RuleKind::InitDeclarator, init_children, pos);

        let semi = self.expect(TokenKind::Semicolon)?;
        Ok(ParseNode::rule(
            RuleKind::ForDeclaration,
            vec![specifiers, init_declarator, self.token_node(&semi)],
            pos,
        ))
    }

    /// forExpression: assignmentExpression (',' assignmentExpression)*
    fn parse_for_expression(&mut self) -> ParseResult<ParseNode> {
        let pos = self.here();
        let mut children = vec![self.parse_assignment_expression()?];
        while self.check(TokenKind::Comma) {
            let comma = self.advance();
            children.push(self.token_node(&comma));
            children.push(self.parse_assignment_expression()?);
        }
        Ok(ParseNode::rule(RuleKind::ForExpression, children, pos))
    }

    /// jumpStatement: 'return' expression? ';' | 'break' ';' | 'continue' ';'
    fn parse_jump_statement(&mut self) -> ParseResult<ParseNode> {
        let pos = self.here();
        let kw = self.advance();
        let mut children = vec![self.token_node(&kw)];

        if kw.kind == TokenKind::Return && !self.check(TokenKind::Semicolon) {
            children.push(self.parse_expression()?);
        }

        let semi = self.expect(TokenKind::Semicolon)?;
        children.push(self.token_node(&semi));
        Ok(ParseNode::rule(RuleKind::JumpStatement, children, pos))
    }

    // ============ Expressions ============

    /// expression: assignmentExpression (',' assignmentExpression)*
    fn parse_expression(&mut self) -> ParseResult<ParseNode> {
        let pos = self.here();
        let mut children = vec![self.parse_assignment_expression()?];
        while self.check(TokenKind::Comma) {
            let comma = self.advance();
            children.push(self.token_node(&comma));
            children.push(self.parse_assignment_expression()?);
        }
        Ok(ParseNode::rule(RuleKind::Expression, children, pos))
    }

    /// assignmentExpression: conditionalExpression
    ///                     | unaryExpression assignmentOperator assignmentExpression
    ///
    /// Parsed by first reading a conditional expression and reinterpreting
    /// it as the assignment target when an assignment operator follows.
    fn parse_assignment_expression(&mut self) -> ParseResult<ParseNode> {
        let pos = self.here();
        let target = self.parse_conditional_expression()?;

        if self.current.kind.is_assignment_op() {
            let op_pos = self.here();
            let op = self.advance();
            let op_node = ParseNode::rule(
                RuleKind::AssignmentOperator,
                vec![self.token_node(&op)],
                op_pos,
            );
            let value = self.parse_assignment_expression()?;
            return Ok(ParseNode::rule(
                RuleKind::AssignmentExpression,
                vec![target, op_node, value],
                pos,
            ));
        }

        Ok(ParseNode::rule(
            RuleKind::AssignmentExpression,
            vec![target],
            pos,
        ))
    }

    /// conditionalExpression: logicalOrExpression ('?' expression ':' conditionalExpression)?
    fn parse_conditional_expression(&mut self) -> ParseResult<ParseNode> {
        let pos = self.here();
        let cond = self.parse_logical_or()?;

        if self.check(TokenKind::Question) {
            let q = self.advance();
            let then_expr = self.parse_expression()?;
            let colon = self.expect(TokenKind::Colon)?;
            let else_expr = self.parse_conditional_expression()?;
            return Ok(ParseNode::rule(
                RuleKind::ConditionalExpression,
                vec![
                    cond,
                    self.token_node(&q),
                    then_expr,
                    self.token_node(&colon),
                    else_expr,
                ],
                pos,
            ));
        }

        Ok(ParseNode::rule(
            RuleKind::ConditionalExpression,
            vec![cond],
            pos,
        ))
    }

    /// One level of the left-associative binary cascade.
    fn parse_binary_level(
        &mut self,
        kind: RuleKind,
        ops: &[TokenKind],
        next: fn(&mut Self) -> ParseResult<ParseNode>,
    ) -> ParseResult<ParseNode> {
        let pos = self.here();
        let mut children = vec![next(self)?];
        while ops.contains(&self.current.kind) {
            let op = self.advance();
            children.push(self.token_node(&op));
            children.push(next(self)?);
        }
        Ok(ParseNode::rule(kind, children, pos))
    }

    fn parse_logical_or(&mut self) -> ParseResult<ParseNode> {
        self.parse_binary_level(
            RuleKind::LogicalOrExpression,
            &[TokenKind::OrOr],
            Self::parse_logical_and,
        )
    }

    fn parse_logical_and(&mut self) -> ParseResult<ParseNode> {
        self.parse_binary_level(
            RuleKind::LogicalAndExpression,
            &[TokenKind::AndAnd],
            Self::parse_inclusive_or,
        )
    }

    fn parse_inclusive_or(&mut self) -> ParseResult<ParseNode> {
        self.parse_binary_level(
            RuleKind::InclusiveOrExpression,
            &[TokenKind::Pipe],
            Self::parse_exclusive_or,
        )
    }

    fn parse_exclusive_or(&mut self) -> ParseResult<ParseNode> {
        self.parse_binary_level(
            RuleKind::ExclusiveOrExpression,
            &[TokenKind::Caret],
            Self::parse_and,
        )
    }

    fn parse_and(&mut self) -> ParseResult<ParseNode> {
        self.parse_binary_level(
            RuleKind::AndExpression,
            &[TokenKind::Amp],
            Self::parse_equality,
        )
    }

    fn parse_equality(&mut self) -> ParseResult<ParseNode> {
        self.parse_binary_level(
            RuleKind::EqualityExpression,
            &[TokenKind::EqEq, TokenKind::NotEq],
            Self::parse_relational,
        )
    }

    fn parse_relational(&mut self) -> ParseResult<ParseNode> {
        self.parse_binary_level(
            RuleKind::RelationalExpression,
            &[
                TokenKind::Lt,
                TokenKind::Gt,
                TokenKind::LtEq,
                TokenKind::GtEq,
            ],
            Self::parse_shift,
        )
    }

    fn parse_shift(&mut self) -> ParseResult<ParseNode> {
        self.parse_binary_level(
            RuleKind::ShiftExpression,
            &[TokenKind::Shl, TokenKind::Shr],
            Self::parse_additive,
        )
    }

    fn parse_additive(&mut self) -> ParseResult<ParseNode> {
        self.parse_binary_level(
            RuleKind::AdditiveExpression,
            &[TokenKind::Plus, TokenKind::Minus],
            Self::parse_multiplicative,
        )
    }

    fn parse_multiplicative(&mut self) -> ParseResult<ParseNode> {
        self.parse_binary_level(
            RuleKind::MultiplicativeExpression,
            &[TokenKind::Star, TokenKind::Slash, TokenKind::Percent],
            Self::parse_cast,
        )
    }

    /// castExpression: unaryExpression (casts are outside the subset)
    fn parse_cast(&mut self) -> ParseResult<ParseNode> {
        let pos = self.here();
        let unary = self.parse_unary()?;
        Ok(ParseNode::rule(RuleKind::CastExpression, vec![unary], pos))
    }

    /// unaryExpression: ('++' | '--')* (postfixExpression
    ///                                 | unaryOperator castExpression
    ///                                 | 'sizeof' ...)
    fn parse_unary(&mut self) -> ParseResult<ParseNode> {
        let pos = self.here();
        let mut children = Vec::new();

        while matches!(self.current.kind, TokenKind::PlusPlus | TokenKind::MinusMinus) {
            let tok = self.advance();
            children.push(self.token_node(&tok));
        }

        match self.current.kind {
            TokenKind::Sizeof => {
                let kw = self.advance();
                children.push(self.token_node(&kw));
                if self.check(TokenKind::LParen) {
                    let open = self.advance();
                    children.push(self.token_node(&open));
                    if self.current.kind.is_type_specifier() {
                        // sizeof(type): keep the type words as terminals
                        while self.current.kind.is_type_specifier()
                            || self.check(TokenKind::Star)
                        {
                            let tok = self.advance();
                            children.push(self.token_node(&tok));
                        }
                    } else {
                        children.push(self.parse_expression()?);
                    }
                    let close = self.expect(TokenKind::RParen)?;
                    children.push(self.token_node(&close));
                } else {
                    children.push(self.parse_unary()?);
                }
            }
            TokenKind::Amp
            | TokenKind::Star
            | TokenKind::Plus
            | TokenKind::Minus
            | TokenKind::Tilde
            | TokenKind::Not => {
                let op_pos = self.here();
                let op = self.advance();
                children.push(ParseNode::rule(
                    RuleKind::UnaryOperator,
                    vec![self.token_node(&op)],
                    op_pos,
                ));
                children.push(self.parse_cast()?);
            }
            _ => children.push(self.parse_postfix()?),
        }

        Ok(ParseNode::rule(RuleKind::UnaryExpression, children, pos))
    }

    /// postfixExpression: primaryExpression with postfix wrappers applied
    /// left-to-right: `++`, `--`, call, subscript, member access
    fn parse_postfix(&mut self) -> ParseResult<ParseNode> {
        let pos = self.here();
        let mut children = vec![self.parse_primary()?];

        loop {
            match self.current.kind {
                TokenKind::PlusPlus | TokenKind::MinusMinus => {
                    let tok = self.advance();
                    children.push(self.token_node(&tok));
                }
                TokenKind::LParen => {
                    let open = self.advance();
                    children.push(self.token_node(&open));
                    if !self.check(TokenKind::RParen) {
                        children.push(self.parse_argument_expression_list()?);
                    }
                    let close = self.expect(TokenKind::RParen)?;
                    children.push(self.token_node(&close));
                }
                TokenKind::LBracket => {
                    let open = self.advance();
                    children.push(self.token_node(&open));
                    children.push(self.parse_expression()?);
                    let close = self.expect(TokenKind::RBracket)?;
                    children.push(self.token_node(&close));
                }
                TokenKind::Dot | TokenKind::Arrow => {
                    let op = self.advance();
                    children.push(self.token_node(&op));
                    let field = self.expect(TokenKind::Ident)?;
                    children.push(self.token_node(&field));
                }
                _ => break,
            }
        }

        Ok(ParseNode::rule(RuleKind::PostfixExpression, children, pos))
    }

    /// argumentExpressionList: assignmentExpression (',' assignmentExpression)*
    fn parse_argument_expression_list(&mut self) -> ParseResult<ParseNode> {
        let pos = self.here();
        let mut children = vec![self.parse_assignment_expression()?];
        while self.check(TokenKind::Comma) {
            let comma = self.advance();
            children.push(self.token_node(&comma));
            children.push(self.parse_assignment_expression()?);
        }
        Ok(ParseNode::rule(
            RuleKind::ArgumentExpressionList,
            children,
            pos,
        ))
    }

    /// primaryExpression: Identifier | Constant | StringLiteral | '(' expression ')'
    fn parse_primary(&mut self) -> ParseResult<ParseNode> {
        let pos = self.here();
        match self.current.kind {
            TokenKind::Ident
            | TokenKind::IntConstant
            | TokenKind::FloatConstant
            | TokenKind::CharConstant
            | TokenKind::StringLiteral => {
                let tok = self.advance();
                Ok(ParseNode::rule(
                    RuleKind::PrimaryExpression,
                    vec![self.token_node(&tok)],
                    pos,
                ))
            }
            TokenKind::LParen => {
                let open = self.advance();
                let open_node = self.token_node(&open);
                let expr = self.parse_expression()?;
                let close = self.expect(TokenKind::RParen)?;
                Ok(ParseNode::rule(
                    RuleKind::PrimaryExpression,
                    vec![open_node, expr, self.token_node(&close)],
                    pos,
                ))
            }
            _ => Err(self.unexpected("expression")),
        }
    }
}

/// Helper function to parse a translation unit
pub fn parse(source: &str) -> (ParseNode, Vec<ParseError>) {
    let mut parser = Parser::new(source);
    let tree = parser.parse_translation_unit();
    (tree, parser.errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_tree::RuleKind;

    fn parse_ok(source: &str) -> ParseNode {
        let (tree, errors) = parse(source);
        assert!(errors.is_empty(), "parse errors: {:?}", errors);
        tree
    }

    #[test]
    fn test_empty_translation_unit() {
        let tree = parse_ok("");
        let root = tree.as_rule_of(RuleKind::TranslationUnit).unwrap();
        assert!(root.children.is_empty());
    }

    #[test]
    fn test_function_definition_shape() {
        let tree = parse_ok("int main() { return 0; }");
        let root = tree.as_rule().unwrap();
        let ext = root.children[0]
            .as_rule_of(RuleKind::ExternalDeclaration)
            .unwrap();
        let func = ext.child(RuleKind::FunctionDefinition).unwrap();
        assert!(func.child(RuleKind::DeclarationSpecifiers).is_some());
        assert!(func.child(RuleKind::Declarator).is_some());
        assert!(func.child(RuleKind::CompoundStatement).is_some());
    }

    #[test]
    fn test_prototype_is_declaration() {
        let tree = parse_ok("int even(int);");
        let root = tree.as_rule().unwrap();
        let ext = root.children[0].as_rule().unwrap();
        assert!(ext.child(RuleKind::Declaration).is_some());
    }

    #[test]
    fn test_global_with_initializer() {
        let tree = parse_ok("int g = 42;");
        let root = tree.as_rule().unwrap();
        let ext = root.children[0].as_rule().unwrap();
        let decl = ext.child(RuleKind::Declaration).unwrap();
        let init = decl.child(RuleKind::InitDeclarator).unwrap();
        assert!(init.child(RuleKind::Initializer).is_some());
    }

    #[test]
    fn test_cascade_depth() {
        let tree = parse_ok("int main() { return 1 + 2 * 3; }");
        // find the additive node and check it folds one '+' with two operands
        fn find<'a>(
            node: &'a ParseNode,
            kind: RuleKind,
            want_children: usize,
        ) -> Option<&'a crate::parse_tree::RuleNode> {
            let rule = node.as_rule()?;
            if rule.kind == kind && rule.children.len() == want_children {
                return Some(rule);
            }
            rule.children.iter().find_map(|c| find(c, kind, want_children))
        }
        let add = find(&tree, RuleKind::AdditiveExpression, 3).unwrap();
        assert_eq!(add.token_at(1), Some("+"));
        assert_eq!(
            add.children_of(RuleKind::MultiplicativeExpression).len(),
            2
        );
    }

    #[test]
    fn test_for_condition_segments() {
        let tree = parse_ok("int main() { for (int i = 0; i < 5; i = i + 1) ; return 0; }");
        fn find_kind<'a>(
            node: &'a ParseNode,
            kind: RuleKind,
        ) -> Option<&'a crate::parse_tree::RuleNode> {
            let rule = node.as_rule()?;
            if rule.kind == kind {
                return Some(rule);
            }
            rule.children.iter().find_map(|c| find_kind(c, kind))
        }
        let cond = find_kind(&tree, RuleKind::ForCondition).unwrap();
        assert!(cond.child(RuleKind::ForDeclaration).is_some());
        assert_eq!(cond.children_of(RuleKind::ForExpression).len(), 2);
    }

    #[test]
    fn test_parse_error_recovery() {
        let (_, errors) = parse("int main() { return ; } int ok() { return 1; }");
        assert!(errors.is_empty());
        let (_, errors) = parse("int bad() { return + ; } int ok() { return 1; }");
        assert!(!errors.is_empty());
    }

    #[test]
    fn test_postfix_call_chain() {
        let tree = parse_ok("int main() { return f(1, 2); }");
        fn find_kind<'a>(
            node: &'a ParseNode,
            kind: RuleKind,
        ) -> Option<&'a crate::parse_tree::RuleNode> {
            let rule = node.as_rule()?;
            if rule.kind == kind {
                return Some(rule);
            }
            rule.children.iter().find_map(|c| find_kind(c, kind))
        }
        let args = find_kind(&tree, RuleKind::ArgumentExpressionList).unwrap();
        assert_eq!(
            args.children_of(RuleKind::AssignmentExpression).len(),
            2
        );
    }
}
