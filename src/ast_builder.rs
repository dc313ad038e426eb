//! Parse tree to AST construction
//!
//! Walks the grammar-shaped parse tree and produces the semantic AST. For
//! each production of the accepted subset the builder yields exactly one
//! AST node or propagates its single child; operator precedence is
//! inherited from the cascade and never re-derived here.
//!
//! The builder is permissive: malformed subtrees degrade to default-typed
//! or zero-valued nodes. The one structural error is a function definition
//! without a compound body.

use crate::ast::{
    BinaryOp, Decl, Expr, ExprKind, FunctionDecl, Param, Stmt, StmtKind, TranslationUnit, UnaryOp,
    VarDecl,
};
use crate::parse_tree::{ParseNode, RuleKind, RuleNode};
use crate::span::Position;
use thiserror::Error;

/// AST construction errors
#[derive(Error, Debug, Clone)]
pub enum BuildError {
    #[error("function '{name}' is missing a compound body")]
    MissingFunctionBody { name: String },
}

/// Build the AST for a whole translation unit.
pub fn build_translation_unit(tree: &ParseNode) -> Result<TranslationUnit, BuildError> {
    let mut decls = Vec::new();

    if let Some(root) = tree.as_rule_of(RuleKind::TranslationUnit) {
        for child in &root.children {
            let Some(ext) = child.as_rule_of(RuleKind::ExternalDeclaration) else {
                continue;
            };
            if let Some(decl) = build_external_declaration(ext)? {
                decls.push(decl);
            }
        }
    }

    Ok(TranslationUnit { decls })
}

fn build_external_declaration(rule: &RuleNode) -> Result<Option<Decl>, BuildError> {
    if let Some(func) = rule.child(RuleKind::FunctionDefinition) {
        return Ok(Some(build_function_definition(func)?));
    }
    if let Some(decl) = rule.child(RuleKind::Declaration) {
        return Ok(build_declaration(decl));
    }
    Ok(None)
}

fn build_function_definition(rule: &RuleNode) -> Result<Decl, BuildError> {
    let return_type = declared_type(rule);
    let name = rule
        .child(RuleKind::Declarator)
        .and_then(declarator_name)
        .unwrap_or_default();
    let params = rule
        .child(RuleKind::Declarator)
        .map(declarator_params)
        .unwrap_or_default();

    let body = rule
        .child(RuleKind::CompoundStatement)
        .map(build_compound_statement)
        .ok_or(BuildError::MissingFunctionBody { name: name.clone() })?;

    Ok(Decl::Function(FunctionDecl {
        name,
        return_type,
        params,
        body: Some(body),
        loc: Some(rule.pos),
    }))
}

/// A top-level declaration: a variable, or a function prototype when the
/// declarator carries a parameter list.
fn build_declaration(rule: &RuleNode) -> Option<Decl> {
    let init_decl = rule.child(RuleKind::InitDeclarator)?;
    let declarator = init_decl.child(RuleKind::Declarator)?;
    let name = declarator_name(declarator)?;
    let ty = declared_type(rule);

    if declarator_is_function(declarator) {
        return Some(Decl::Function(FunctionDecl {
            name,
            return_type: ty,
            params: declarator_params(declarator),
            body: None,
            loc: Some(rule.pos),
        }));
    }

    let init = init_decl
        .child(RuleKind::Initializer)
        .and_then(|i| i.child(RuleKind::AssignmentExpression))
        .map(build_expr_rule);

    Some(Decl::Var(VarDecl {
        name,
        ty,
        init,
        loc: Some(rule.pos),
    }))
}

/// Build a `VarDecl` statement out of a declaration-shaped rule
/// (block-item declaration or for-loop init declaration).
fn build_var_decl_stmt(rule: &RuleNode) -> Option<Stmt> {
    match build_declaration(rule)? {
        Decl::Var(var) => {
            let loc = var.loc;
            Some(Stmt::new(StmtKind::VarDecl(var), loc))
        }
        // Function prototypes inside a block are outside the subset
        Decl::Function(_) => None,
    }
}

// ============ Type extraction ============

/// Read the type string of a declaration-shaped rule: the concatenated
/// recognised type words of its specifiers, plus one `*` per star in its
/// declarator. An empty specifier list defaults to `int`.
fn declared_type(rule: &RuleNode) -> String {
    let mut ty = rule
        .child(RuleKind::DeclarationSpecifiers)
        .map(extract_type_from_specifiers)
        .unwrap_or_default();
    if ty.is_empty() {
        ty = "int".to_string();
    }
    let stars = rule
        .child(RuleKind::InitDeclarator)
        .and_then(|i| i.child(RuleKind::Declarator))
        .or_else(|| rule.child(RuleKind::Declarator))
        .map(declarator_stars)
        .unwrap_or(0);
    for _ in 0..stars {
        ty.push('*');
    }
    ty
}

fn extract_type_from_specifiers(rule: &RuleNode) -> String {
    let mut ty = String::new();
    for spec in rule.children_of(RuleKind::TypeSpecifier) {
        let text = spec.first_token().unwrap_or("");
        match text {
            "int" | "char" | "float" | "double" | "void" | "long" | "short" | "signed"
            | "unsigned" => ty.push_str(text),
            other => ty.push_str(other),
        }
    }
    ty
}

fn declarator_stars(declarator: &RuleNode) -> usize {
    declarator
        .child(RuleKind::Pointer)
        .map(|p| p.children.iter().filter(|c| c.as_token_text() == Some("*")).count())
        .unwrap_or(0)
}

fn declarator_name(declarator: &RuleNode) -> Option<String> {
    declarator
        .child(RuleKind::DirectDeclarator)
        .and_then(|dd| dd.first_token())
        .map(|s| s.to_string())
}

fn declarator_is_function(declarator: &RuleNode) -> bool {
    declarator
        .child(RuleKind::DirectDeclarator)
        .map(|dd| dd.has_token("("))
        .unwrap_or(false)
}

fn declarator_params(declarator: &RuleNode) -> Vec<Param> {
    let Some(list) = declarator
        .child(RuleKind::DirectDeclarator)
        .and_then(|dd| dd.child(RuleKind::ParameterTypeList))
        .and_then(|ptl| ptl.child(RuleKind::ParameterList))
    else {
        return Vec::new();
    };

    let mut params = Vec::new();
    for param in list.children_of(RuleKind::ParameterDeclaration) {
        let mut ty = param
            .child(RuleKind::DeclarationSpecifiers)
            .map(extract_type_from_specifiers)
            .unwrap_or_default();
        if ty.is_empty() {
            ty = "int".to_string();
        }
        let stars = param
            .child(RuleKind::Declarator)
            .map(declarator_stars)
            .unwrap_or(0);
        for _ in 0..stars {
            ty.push('*');
        }
        let name = param
            .child(RuleKind::Declarator)
            .and_then(declarator_name)
            .unwrap_or_default();

        // `f(void)` declares no parameters
        if ty == "void" && name.is_empty() {
            continue;
        }
        params.push(Param { ty, name });
    }
    params
}

// ============ Statements ============

fn build_compound_statement(rule: &RuleNode) -> Stmt {
    let mut stmts = Vec::new();
    for item in rule.children_of(RuleKind::BlockItem) {
        if let Some(decl) = item.child(RuleKind::Declaration) {
            if let Some(stmt) = build_var_decl_stmt(decl) {
                stmts.push(stmt);
            }
        } else if let Some(stmt_rule) = item.child(RuleKind::Statement) {
            if let Some(stmt) = build_statement(stmt_rule) {
                stmts.push(stmt);
            }
        }
    }
    Stmt::new(StmtKind::Compound(stmts), Some(rule.pos))
}

fn build_statement(rule: &RuleNode) -> Option<Stmt> {
    if let Some(compound) = rule.child(RuleKind::CompoundStatement) {
        return Some(build_compound_statement(compound));
    }
    if let Some(expr_stmt) = rule.child(RuleKind::ExpressionStatement) {
        let expr = expr_stmt
            .child(RuleKind::Expression)
            .map(build_expr_rule);
        return Some(Stmt::new(StmtKind::Expr(expr), Some(expr_stmt.pos)));
    }
    if let Some(selection) = rule.child(RuleKind::SelectionStatement) {
        return build_selection_statement(selection);
    }
    if let Some(iteration) = rule.child(RuleKind::IterationStatement) {
        return build_iteration_statement(iteration);
    }
    if let Some(jump) = rule.child(RuleKind::JumpStatement) {
        return build_jump_statement(jump);
    }
    None
}

fn build_selection_statement(rule: &RuleNode) -> Option<Stmt> {
    if !rule.has_token("if") {
        return None;
    }
    let cond = rule
        .child(RuleKind::Expression)
        .map(build_expr_rule)
        .unwrap_or_else(|| zero_expr(rule.pos));

    let statements = rule.children_of(RuleKind::Statement);
    let then_stmt = statements
        .first()
        .and_then(|s| build_statement(s))
        .unwrap_or_else(|| empty_stmt(rule.pos));
    let else_stmt = statements
        .get(1)
        .and_then(|s| build_statement(s))
        .map(Box::new);

    Some(Stmt::new(
        StmtKind::If {
            cond,
            then_stmt: Box::new(then_stmt),
            else_stmt,
        },
        Some(rule.pos),
    ))
}

fn build_iteration_statement(rule: &RuleNode) -> Option<Stmt> {
    let body = rule
        .child(RuleKind::Statement)
        .and_then(build_statement)
        .unwrap_or_else(|| empty_stmt(rule.pos));

    if rule.has_token("while") {
        let cond = rule
            .child(RuleKind::Expression)
            .map(build_expr_rule)
            .unwrap_or_else(|| zero_expr(rule.pos));
        return Some(Stmt::new(
            StmtKind::While {
                cond,
                body: Box::new(body),
            },
            Some(rule.pos),
        ));
    }

    if rule.has_token("for") {
        let (init, cond, step) = rule
            .child(RuleKind::ForCondition)
            .map(decompose_for_condition)
            .unwrap_or((None, None, None));
        return Some(Stmt::new(
            StmtKind::For {
                init: init.map(Box::new),
                cond,
                step,
                body: Box::new(body),
            },
            Some(rule.pos),
        ));
    }

    None
}

/// Split the `for(...)` clause into its three optional slots. The init slot
/// may be a declaration or an expression (wrapped as an expression
/// statement); the condition and step are expressions.
fn decompose_for_condition(rule: &RuleNode) -> (Option<Stmt>, Option<Expr>, Option<Expr>) {
    let mut segments: Vec<Vec<&ParseNode>> = vec![Vec::new()];

    for child in &rule.children {
        match child {
            ParseNode::Token(tok) if tok.text == ";" => segments.push(Vec::new()),
            // the for-declaration carries its own semicolon
            ParseNode::Rule(r) if r.kind == RuleKind::ForDeclaration => {
                if let Some(segment) = segments.last_mut() {
                    segment.push(child);
                }
                segments.push(Vec::new());
            }
            other => {
                if let Some(segment) = segments.last_mut() {
                    segment.push(other);
                }
            }
        }
    }

    let slot = |idx: usize| -> Option<&RuleNode> {
        segments
            .get(idx)
            .and_then(|seg| seg.first())
            .and_then(|n| n.as_rule())
    };

    let init = slot(0).and_then(|r| match r.kind {
        RuleKind::ForDeclaration => build_var_decl_stmt(r),
        RuleKind::ForExpression => {
            let expr = build_for_expression(r);
            Some(Stmt::new(StmtKind::Expr(Some(expr)), Some(r.pos)))
        }
        _ => None,
    });

    let cond = slot(1).and_then(|r| (r.kind == RuleKind::ForExpression).then(|| build_for_expression(r)));
    let step = slot(2).and_then(|r| (r.kind == RuleKind::ForExpression).then(|| build_for_expression(r)));

    (init, cond, step)
}

/// Comma semantics: a for-expression resolves to its last assignment
/// expression.
fn build_for_expression(rule: &RuleNode) -> Expr {
    rule.children_of(RuleKind::AssignmentExpression)
        .last()
        .map(|r| build_expr_rule(r))
        .unwrap_or_else(|| zero_expr(rule.pos))
}

fn build_jump_statement(rule: &RuleNode) -> Option<Stmt> {
    let keyword = rule.first_token()?;
    let kind = match keyword {
        "return" => StmtKind::Return(rule.child(RuleKind::Expression).map(build_expr_rule)),
        "break" => StmtKind::Break,
        "continue" => StmtKind::Continue,
        _ => return None,
    };
    Some(Stmt::new(kind, Some(rule.pos)))
}

// ============ Expressions ============

/// Build an expression from any rule in the expression cascade. Rules with
/// a single operand propagate their child; the rest construct one node.
fn build_expr_rule(rule: &RuleNode) -> Expr {
    match rule.kind {
        // Comma operator: resolve to the last expression
        RuleKind::Expression | RuleKind::ForExpression => rule
            .children_of(RuleKind::AssignmentExpression)
            .last()
            .map(|r| build_expr_rule(r))
            .unwrap_or_else(|| zero_expr(rule.pos)),

        RuleKind::AssignmentExpression => build_assignment_expression(rule),
        RuleKind::ConditionalExpression => build_conditional_expression(rule),

        RuleKind::LogicalOrExpression => {
            fold_binary(rule, RuleKind::LogicalAndExpression, |_| BinaryOp::LogicalOr)
        }
        RuleKind::LogicalAndExpression => {
            fold_binary(rule, RuleKind::InclusiveOrExpression, |_| BinaryOp::LogicalAnd)
        }
        RuleKind::InclusiveOrExpression => {
            fold_binary(rule, RuleKind::ExclusiveOrExpression, |_| BinaryOp::BitOr)
        }
        RuleKind::ExclusiveOrExpression => {
            fold_binary(rule, RuleKind::AndExpression, |_| BinaryOp::BitXor)
        }
        RuleKind::AndExpression => {
            fold_binary(rule, RuleKind::EqualityExpression, |_| BinaryOp::BitAnd)
        }
        RuleKind::EqualityExpression => {
            fold_binary(rule, RuleKind::RelationalExpression, |text| match text {
                "==" => BinaryOp::Eq,
                _ => BinaryOp::Ne,
            })
        }
        RuleKind::RelationalExpression => {
            fold_binary(rule, RuleKind::ShiftExpression, |text| match text {
                ">" => BinaryOp::Gt,
                "<=" => BinaryOp::Le,
                ">=" => BinaryOp::Ge,
                _ => BinaryOp::Lt,
            })
        }
        // Defaults to left-shift when the operator text is unavailable
        RuleKind::ShiftExpression => {
            fold_binary(rule, RuleKind::AdditiveExpression, |text| match text {
                ">>" => BinaryOp::Shr,
                _ => BinaryOp::Shl,
            })
        }
        RuleKind::AdditiveExpression => {
            fold_binary(rule, RuleKind::MultiplicativeExpression, |text| match text {
                "-" => BinaryOp::Sub,
                _ => BinaryOp::Add,
            })
        }
        RuleKind::MultiplicativeExpression => {
            fold_binary(rule, RuleKind::CastExpression, |text| match text {
                "/" => BinaryOp::Div,
                "%" => BinaryOp::Mod,
                _ => BinaryOp::Mul,
            })
        }

        RuleKind::CastExpression => rule
            .child(RuleKind::UnaryExpression)
            .map(build_unary_expression)
            .unwrap_or_else(|| zero_expr(rule.pos)),

        RuleKind::UnaryExpression => build_unary_expression(rule),
        RuleKind::PostfixExpression => build_postfix_expression(rule),
        RuleKind::PrimaryExpression => build_primary_expression(rule),

        _ => zero_expr(rule.pos),
    }
}

/// Fold one left-associative cascade level.
fn fold_binary(rule: &RuleNode, operand_kind: RuleKind, tag: impl Fn(&str) -> BinaryOp) -> Expr {
    let operands = rule.children_of(operand_kind);
    let Some(first) = operands.first() else {
        return zero_expr(rule.pos);
    };
    let mut expr = build_expr_rule(first);

    for (i, operand) in operands.iter().enumerate().skip(1) {
        let op = tag(rule.token_at(2 * i - 1).unwrap_or(""));
        let rhs = build_expr_rule(operand);
        expr = Expr::new(
            ExprKind::Binary {
                op,
                lhs: Box::new(expr),
                rhs: Box::new(rhs),
            },
            Some(rule.pos),
        );
    }
    expr
}

fn build_assignment_expression(rule: &RuleNode) -> Expr {
    let operands: Vec<&RuleNode> = rule
        .children
        .iter()
        .filter_map(|c| c.as_rule())
        .filter(|r| r.kind != RuleKind::AssignmentOperator)
        .collect();

    let Some(op_rule) = rule.child(RuleKind::AssignmentOperator) else {
        return operands
            .first()
            .map(|r| build_expr_rule(r))
            .unwrap_or_else(|| zero_expr(rule.pos));
    };

    let op = match op_rule.first_token().unwrap_or("=") {
        "+=" => BinaryOp::AddAssign,
        "-=" => BinaryOp::SubAssign,
        "*=" => BinaryOp::MulAssign,
        "/=" => BinaryOp::DivAssign,
        "%=" => BinaryOp::ModAssign,
        _ => BinaryOp::Assign,
    };

    let lhs = operands
        .first()
        .map(|r| build_expr_rule(r))
        .unwrap_or_else(|| zero_expr(rule.pos));
    let rhs = operands
        .get(1)
        .map(|r| build_expr_rule(r))
        .unwrap_or_else(|| zero_expr(rule.pos));

    Expr::new(
        ExprKind::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        },
        Some(rule.pos),
    )
}

/// The ternary is constructed only when both arms are present; otherwise
/// the logical-or subexpression passes through unchanged.
fn build_conditional_expression(rule: &RuleNode) -> Expr {
    let cond = rule
        .child(RuleKind::LogicalOrExpression)
        .map(|r| build_expr_rule(r))
        .unwrap_or_else(|| zero_expr(rule.pos));

    let then_rule = rule.child(RuleKind::Expression);
    let else_rule = rule.child(RuleKind::ConditionalExpression);

    match (then_rule, else_rule) {
        (Some(t), Some(e)) => Expr::new(
            ExprKind::Conditional {
                cond: Box::new(cond),
                then_expr: Box::new(build_expr_rule(t)),
                else_expr: Box::new(build_expr_rule(e)),
            },
            Some(rule.pos),
        ),
        _ => cond,
    }
}

fn build_unary_expression(rule: &RuleNode) -> Expr {
    // sizeof lowers to the documented stub constant
    if rule.has_token("sizeof") {
        return Expr::new(ExprKind::IntLiteral(4), Some(rule.pos));
    }

    let mut base = if let Some(op_rule) = rule.child(RuleKind::UnaryOperator) {
        let operand = rule
            .child(RuleKind::CastExpression)
            .map(|r| build_expr_rule(r))
            .unwrap_or_else(|| zero_expr(rule.pos));
        let op = match op_rule.first_token().unwrap_or("+") {
            "&" => UnaryOp::AddressOf,
            "*" => UnaryOp::Dereference,
            "-" => UnaryOp::Minus,
            "~" => UnaryOp::BitNot,
            "!" => UnaryOp::Not,
            _ => UnaryOp::Plus,
        };
        Expr::new(
            ExprKind::Unary {
                op,
                operand: Box::new(operand),
                is_prefix: true,
            },
            Some(rule.pos),
        )
    } else if let Some(postfix) = rule.child(RuleKind::PostfixExpression) {
        build_postfix_expression(postfix)
    } else {
        zero_expr(rule.pos)
    };

    // Wrap prefix ++/-- chains, innermost first
    for child in rule.children.iter().rev() {
        let op = match child.as_token_text() {
            Some("++") => UnaryOp::Increment,
            Some("--") => UnaryOp::Decrement,
            _ => continue,
        };
        base = Expr::new(
            ExprKind::Unary {
                op,
                operand: Box::new(base),
                is_prefix: true,
            },
            Some(rule.pos),
        );
    }

    base
}

/// Wrap the primary expression left-to-right by its postfix tokens.
fn build_postfix_expression(rule: &RuleNode) -> Expr {
    let mut expr = rule
        .child(RuleKind::PrimaryExpression)
        .map(build_primary_expression)
        .unwrap_or_else(|| zero_expr(rule.pos));

    let mut i = 1;
    while i < rule.children.len() {
        let child = &rule.children[i];
        match child.as_token_text() {
            Some("++") | Some("--") => {
                let op = if child.as_token_text() == Some("++") {
                    UnaryOp::Increment
                } else {
                    UnaryOp::Decrement
                };
                expr = Expr::new(
                    ExprKind::Unary {
                        op,
                        operand: Box::new(expr),
                        is_prefix: false,
                    },
                    Some(rule.pos),
                );
                i += 1;
            }
            Some("(") => {
                let mut args = Vec::new();
                if let Some(list) = rule
                    .children
                    .get(i + 1)
                    .and_then(|c| c.as_rule_of(RuleKind::ArgumentExpressionList))
                {
                    for arg in list.children_of(RuleKind::AssignmentExpression) {
                        args.push(build_expr_rule(arg));
                    }
                    i += 3; // '(', argument list, ')'
                } else {
                    i += 2; // '(', ')'
                }
                expr = Expr::new(
                    ExprKind::Call {
                        callee: Box::new(expr),
                        args,
                    },
                    Some(rule.pos),
                );
            }
            Some("[") => {
                let index = rule
                    .children
                    .get(i + 1)
                    .and_then(|c| c.as_rule_of(RuleKind::Expression))
                    .map(|r| build_expr_rule(r))
                    .unwrap_or_else(|| zero_expr(rule.pos));
                expr = Expr::new(
                    ExprKind::ArraySubscript {
                        base: Box::new(expr),
                        index: Box::new(index),
                    },
                    Some(rule.pos),
                );
                i += 3; // '[', expression, ']'
            }
            Some(".") | Some("->") => {
                let arrow = child.as_token_text() == Some("->");
                let field = rule
                    .children
                    .get(i + 1)
                    .and_then(|c| c.as_token_text())
                    .unwrap_or("")
                    .to_string();
                expr = Expr::new(
                    ExprKind::Member {
                        base: Box::new(expr),
                        field,
                        arrow,
                    },
                    Some(rule.pos),
                );
                i += 2; // '.' or '->', field
            }
            _ => i += 1,
        }
    }

    expr
}

fn build_primary_expression(rule: &RuleNode) -> Expr {
    // Parenthesised expression
    if let Some(inner) = rule.child(RuleKind::Expression) {
        return build_expr_rule(inner);
    }

    let Some(text) = rule.first_token() else {
        return zero_expr(rule.pos);
    };
    let pos = Some(rule.pos);

    let bytes = text.as_bytes();
    if bytes.first() == Some(&b'"') {
        let stripped = text
            .strip_prefix('"')
            .and_then(|s| s.strip_suffix('"'))
            .unwrap_or("");
        return Expr::new(ExprKind::StringLiteral(stripped.to_string()), pos);
    }
    if bytes.first() == Some(&b'\'') {
        let value = bytes.get(1).copied().unwrap_or(0);
        return Expr::new(ExprKind::CharLiteral(value), pos);
    }
    if bytes.first().map(|b| b.is_ascii_digit()).unwrap_or(false)
        || (bytes.first() == Some(&b'.') && bytes.len() > 1)
    {
        return Expr::new(classify_numeric_constant(text), pos);
    }

    Expr::new(ExprKind::Identifier(text.to_string()), pos)
}

/// Classify a numeric-literal token by lexical shape: `0x`-prefixed forms
/// are integers; a `.` or exponent marks a floating literal; anything else
/// is an integer in the usual radix conventions.
fn classify_numeric_constant(text: &str) -> ExprKind {
    if text.starts_with("0x") || text.starts_with("0X") {
        let value = i64::from_str_radix(&text[2..], 16).unwrap_or(0);
        return ExprKind::IntLiteral(value);
    }
    if text.contains('.') || text.contains('e') || text.contains('E') {
        return ExprKind::FloatLiteral(text.parse().unwrap_or(0.0));
    }
    if text.len() > 1 && text.starts_with('0') {
        return ExprKind::IntLiteral(i64::from_str_radix(&text[1..], 8).unwrap_or(0));
    }
    ExprKind::IntLiteral(text.parse().unwrap_or(0))
}

fn zero_expr(pos: Position) -> Expr {
    Expr::new(ExprKind::IntLiteral(0), Some(pos))
}

fn empty_stmt(pos: Position) -> Stmt {
    Stmt::new(StmtKind::Expr(None), Some(pos))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn build(source: &str) -> TranslationUnit {
        let (tree, errors) = parse(source);
        assert!(errors.is_empty(), "parse errors: {:?}", errors);
        build_translation_unit(&tree).unwrap()
    }

    fn main_body(source: &str) -> Vec<Stmt> {
        let tu = build(source);
        for decl in tu.decls {
            if let Decl::Function(f) = decl {
                if let Some(Stmt {
                    kind: StmtKind::Compound(stmts),
                    ..
                }) = f.body
                {
                    return stmts;
                }
            }
        }
        panic!("no function body found");
    }

    fn return_expr(source: &str) -> Expr {
        let stmts = main_body(source);
        for stmt in stmts {
            if let StmtKind::Return(Some(expr)) = stmt.kind {
                return expr;
            }
        }
        panic!("no return with value found");
    }

    #[test]
    fn test_precedence_from_cascade() {
        let expr = return_expr("int main() { return 1 + 2 * 3; }");
        let ExprKind::Binary { op, rhs, .. } = expr.kind else {
            panic!("expected binary");
        };
        assert_eq!(op, BinaryOp::Add);
        let ExprKind::Binary { op: inner, .. } = rhs.kind else {
            panic!("expected nested binary");
        };
        assert_eq!(inner, BinaryOp::Mul);
    }

    #[test]
    fn test_left_associativity() {
        // (10 - 4) - 3
        let expr = return_expr("int main() { return 10 - 4 - 3; }");
        let ExprKind::Binary { op, lhs, .. } = expr.kind else {
            panic!("expected binary");
        };
        assert_eq!(op, BinaryOp::Sub);
        assert!(matches!(lhs.kind, ExprKind::Binary { op: BinaryOp::Sub, .. }));
    }

    #[test]
    fn test_assignment_is_right_associative() {
        let stmts = main_body("int main() { int a; int b; a = b = 1; return a; }");
        let StmtKind::Expr(Some(ref expr)) = stmts[2].kind else {
            panic!("expected expression statement");
        };
        let ExprKind::Binary { op, rhs, .. } = &expr.kind else {
            panic!("expected assignment");
        };
        assert_eq!(*op, BinaryOp::Assign);
        assert!(matches!(
            rhs.kind,
            ExprKind::Binary { op: BinaryOp::Assign, .. }
        ));
    }

    #[test]
    fn test_compound_assignment_tagging() {
        let stmts = main_body("int main() { int x = 1; x += 5; x %= 2; return x; }");
        let StmtKind::Expr(Some(ref expr)) = stmts[1].kind else {
            panic!();
        };
        assert!(matches!(
            expr.kind,
            ExprKind::Binary { op: BinaryOp::AddAssign, .. }
        ));
        let StmtKind::Expr(Some(ref expr)) = stmts[2].kind else {
            panic!();
        };
        assert!(matches!(
            expr.kind,
            ExprKind::Binary { op: BinaryOp::ModAssign, .. }
        ));
    }

    #[test]
    fn test_ternary_built_only_with_both_arms() {
        let expr = return_expr("int main() { return 1 ? 2 : 3; }");
        assert!(matches!(expr.kind, ExprKind::Conditional { .. }));

        let expr = return_expr("int main() { return 1 || 0; }");
        assert!(matches!(
            expr.kind,
            ExprKind::Binary { op: BinaryOp::LogicalOr, .. }
        ));
    }

    #[test]
    fn test_numeric_classification() {
        assert!(matches!(
            return_expr("int main() { return 42; }").kind,
            ExprKind::IntLiteral(42)
        ));
        assert!(matches!(
            return_expr("int main() { return 0x1F; }").kind,
            ExprKind::IntLiteral(31)
        ));
        assert!(matches!(
            return_expr("int main() { return 052; }").kind,
            ExprKind::IntLiteral(42)
        ));
        let expr = return_expr("double main() { return 2.5; }");
        assert!(matches!(expr.kind, ExprKind::FloatLiteral(v) if v == 2.5));
        assert!(matches!(
            return_expr("char main() { return 'a'; }").kind,
            ExprKind::CharLiteral(b'a')
        ));
    }

    #[test]
    fn test_sizeof_stub_constant() {
        assert!(matches!(
            return_expr("int main() { return sizeof(int); }").kind,
            ExprKind::IntLiteral(4)
        ));
        assert!(matches!(
            return_expr("int main() { int x; return sizeof x; }").kind,
            ExprKind::IntLiteral(4)
        ));
    }

    #[test]
    fn test_pointer_type_extraction() {
        let stmts = main_body("int main() { int **pp; return 0; }");
        let StmtKind::VarDecl(ref var) = stmts[0].kind else {
            panic!("expected declaration");
        };
        assert_eq!(var.ty, "int**");
        assert_eq!(var.name, "pp");
    }

    #[test]
    fn test_unsigned_type_concatenation() {
        let stmts = main_body("int main() { unsigned int u; return 0; }");
        let StmtKind::VarDecl(ref var) = stmts[0].kind else {
            panic!();
        };
        assert_eq!(var.ty, "unsignedint");
    }

    #[test]
    fn test_prototype_becomes_bodyless_function() {
        let tu = build("int even(int);");
        let Decl::Function(ref f) = tu.decls[0] else {
            panic!("expected function");
        };
        assert_eq!(f.name, "even");
        assert!(f.body.is_none());
        assert_eq!(f.params.len(), 1);
        assert_eq!(f.params[0].ty, "int");
    }

    #[test]
    fn test_for_decomposition() {
        let stmts = main_body("int main() { for (int i = 0; i < 5; i = i + 1) ; return 0; }");
        let StmtKind::For {
            ref init,
            ref cond,
            ref step,
            ..
        } = stmts[0].kind
        else {
            panic!("expected for");
        };
        assert!(matches!(
            init.as_deref(),
            Some(Stmt { kind: StmtKind::VarDecl(_), .. })
        ));
        assert!(cond.is_some());
        assert!(step.is_some());
    }

    #[test]
    fn test_for_with_expression_init() {
        let stmts = main_body("int main() { int i; for (i = 0; ; ) break; return 0; }");
        let StmtKind::For {
            ref init,
            ref cond,
            ref step,
            ..
        } = stmts[1].kind
        else {
            panic!("expected for");
        };
        assert!(matches!(
            init.as_deref(),
            Some(Stmt { kind: StmtKind::Expr(Some(_)), .. })
        ));
        assert!(cond.is_none());
        assert!(step.is_none());
    }

    #[test]
    fn test_empty_expression_statement() {
        let stmts = main_body("int main() { ; return 0; }");
        assert!(matches!(stmts[0].kind, StmtKind::Expr(None)));
    }

    #[test]
    fn test_postfix_chain_and_calls() {
        let expr = return_expr("int main() { return f(1)(2); }");
        let ExprKind::Call { callee, args } = expr.kind else {
            panic!("expected call");
        };
        assert_eq!(args.len(), 1);
        assert!(matches!(callee.kind, ExprKind::Call { .. }));
    }

    #[test]
    fn test_prefix_and_postfix_increment() {
        let expr = return_expr("int main() { int x = 0; return ++x; }");
        assert!(matches!(
            expr.kind,
            ExprKind::Unary { op: UnaryOp::Increment, is_prefix: true, .. }
        ));
        let expr = return_expr("int main() { int x = 0; return x--; }");
        assert!(matches!(
            expr.kind,
            ExprKind::Unary { op: UnaryOp::Decrement, is_prefix: false, .. }
        ));
    }

    #[test]
    fn test_address_of_and_dereference() {
        let stmts = main_body("int main() { int x = 1; int *p = &x; return *p; }");
        let StmtKind::VarDecl(ref var) = stmts[1].kind else {
            panic!();
        };
        assert!(matches!(
            var.init.as_ref().unwrap().kind,
            ExprKind::Unary { op: UnaryOp::AddressOf, .. }
        ));
    }

    #[test]
    fn test_string_literal_stripping() {
        let expr = return_expr("int main() { return \"abc\"; }");
        let ExprKind::StringLiteral(s) = expr.kind else {
            panic!();
        };
        assert_eq!(s, "abc");
    }

    #[test]
    fn test_global_variable() {
        let tu = build("int g = 7;");
        let Decl::Var(ref var) = tu.decls[0] else {
            panic!("expected variable");
        };
        assert_eq!(var.name, "g");
        assert!(var.init.is_some());
    }
}
