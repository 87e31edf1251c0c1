//! Recursive-descent / precedence-climbing parser producing an
//! [`Ast`] plus its [`SourceInfo`] side table.
//!
//! Grammar, tightest to loosest binding: primary/member postfixes,
//! unary (`!`, `-`), multiplicative, additive, relational, `&&`,
//! `||`, the ternary conditional. Macro calls (`has`, `all`, `exists`,
//! `exists_one`, `filter`, `map`) are recognized and expanded to
//! [`crate::ast::ComprehensionExpr`] nodes as soon as their call shape
//! is parsed; they never appear as a distinct node kind downstream.

pub mod lexer;
pub mod macros;

use crate::ast::{
    Ast, CallExpr, Expr, IdGen, IdedExpr, LiteralKind, ListExpr, MapEntry, MapExpr, NodeId, SelectExpr, SourceInfo,
    StructExpr, StructFieldInit,
};
use crate::diagnostic::Diagnostic;
use crate::source::Source;
use lexer::{lex, Tok, Token};
use std::cell::Cell;
use std::sync::Arc;

/// Hard cap on parser recursion depth. Pathological input (thousands
/// of nested parens or unary operators) hits this instead of
/// overflowing the call stack.
pub const MAX_RECURSION_DEPTH: usize = 250;

pub struct ParseError {
    pub offset: u32,
    pub message: String,
}

impl ParseError {
    pub fn into_diagnostic(self, source: &Source) -> Diagnostic {
        Diagnostic::error(source.location(self.offset), self.message)
    }
}

pub fn parse(source: &Source) -> Result<Ast, Vec<Diagnostic>> {
    let tokens = lex(source.text()).map_err(|e| vec![Diagnostic::error(source.location(e.offset), e.message)])?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        idgen: IdGen::new(),
        positions: Default::default(),
        macro_calls: Default::default(),
        depth: Cell::new(0),
    };
    let root = parser
        .parse_expr()
        .map_err(|e| vec![e.into_diagnostic(source)])?;
    if !parser.at_eof() {
        let tok = parser.peek();
        return Err(vec![ParseError {
            offset: tok.offset,
            message: format!("unexpected trailing input near {:?}", tok.tok),
        }
        .into_diagnostic(source)]);
    }
    Ok(Ast {
        root,
        source_info: SourceInfo {
            positions: parser.positions,
            macro_calls: parser.macro_calls,
        },
    })
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    idgen: IdGen,
    positions: hashbrown::HashMap<NodeId, u32>,
    macro_calls: hashbrown::HashMap<NodeId, IdedExpr>,
    depth: Cell<usize>,
}

type PResult<T> = Result<T, ParseError>;

struct DepthGuard(*const Cell<usize>);
impl Drop for DepthGuard {
    fn drop(&mut self) {
        // SAFETY: the pointer comes from `&self.depth` in `Parser::enter`,
        // and the guard never outlives the `Parser` it was created from.
        let depth = unsafe { &*self.0 };
        depth.set(depth.get() - 1);
    }
}

impl Parser {
    fn enter(&self) -> PResult<DepthGuard> {
        self.depth.set(self.depth.get() + 1);
        if self.depth.get() > MAX_RECURSION_DEPTH {
            return Err(ParseError {
                offset: self.peek().offset,
                message: "expression nested too deeply".to_string(),
            });
        }
        Ok(DepthGuard(&self.depth as *const Cell<usize>))
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn at_eof(&self) -> bool {
        matches!(self.peek().tok, Tok::Eof)
    }

    fn advance(&mut self) -> Token {
        let t = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        t
    }

    fn expect(&mut self, tok: &Tok, what: &str) -> PResult<Token> {
        if &self.peek().tok == tok {
            Ok(self.advance())
        } else {
            Err(ParseError {
                offset: self.peek().offset,
                message: format!("expected {what}, found {:?}", self.peek().tok),
            })
        }
    }

    fn new_id(&mut self, offset: u32) -> NodeId {
        let id = self.idgen.next_id();
        self.positions.insert(id, offset);
        id
    }

    fn node(&mut self, offset: u32, expr: Expr) -> IdedExpr {
        let id = self.new_id(offset);
        IdedExpr::new(id, expr)
    }

    // --- precedence ladder ---

    fn parse_expr(&mut self) -> PResult<IdedExpr> {
        self.parse_ternary()
    }

    fn parse_ternary(&mut self) -> PResult<IdedExpr> {
        let _g = self.enter()?;
        let cond = self.parse_or()?;
        if matches!(self.peek().tok, Tok::Question) {
            let offset = self.advance().offset;
            let then_branch = self.parse_or()?;
            self.expect(&Tok::Colon, "':' in conditional expression")?;
            let else_branch = self.parse_ternary()?;
            return Ok(self.node(
                offset,
                Expr::Call(Box::new(CallExpr {
                    target: None,
                    function: "_?_:_".into(),
                    args: vec![cond, then_branch, else_branch],
                })),
            ));
        }
        Ok(cond)
    }

    fn parse_or(&mut self) -> PResult<IdedExpr> {
        let _g = self.enter()?;
        let mut left = self.parse_and()?;
        while matches!(self.peek().tok, Tok::OrOr) {
            let offset = self.advance().offset;
            let right = self.parse_and()?;
            left = self.node(
                offset,
                Expr::Call(Box::new(CallExpr { target: None, function: "_||_".into(), args: vec![left, right] })),
            );
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> PResult<IdedExpr> {
        let _g = self.enter()?;
        let mut left = self.parse_relation()?;
        while matches!(self.peek().tok, Tok::AndAnd) {
            let offset = self.advance().offset;
            let right = self.parse_relation()?;
            left = self.node(
                offset,
                Expr::Call(Box::new(CallExpr { target: None, function: "_&&_".into(), args: vec![left, right] })),
            );
        }
        Ok(left)
    }

    fn parse_relation(&mut self) -> PResult<IdedExpr> {
        let _g = self.enter()?;
        let left = self.parse_addition()?;
        let func = match self.peek().tok {
            Tok::Eq => "_==_",
            Tok::Ne => "_!=_",
            Tok::Lt => "_<_",
            Tok::Le => "_<=_",
            Tok::Gt => "_>_",
            Tok::Ge => "_>=_",
            Tok::In => "@in",
            _ => return Ok(left),
        };
        let offset = self.advance().offset;
        let right = self.parse_addition()?;
        Ok(self.node(
            offset,
            Expr::Call(Box::new(CallExpr { target: None, function: func.into(), args: vec![left, right] })),
        ))
    }

    fn parse_addition(&mut self) -> PResult<IdedExpr> {
        let _g = self.enter()?;
        let mut left = self.parse_multiplication()?;
        loop {
            let func = match self.peek().tok {
                Tok::Plus => "_+_",
                Tok::Minus => "_-_",
                _ => break,
            };
            let offset = self.advance().offset;
            let right = self.parse_multiplication()?;
            left = self.node(
                offset,
                Expr::Call(Box::new(CallExpr { target: None, function: func.into(), args: vec![left, right] })),
            );
        }
        Ok(left)
    }

    fn parse_multiplication(&mut self) -> PResult<IdedExpr> {
        let _g = self.enter()?;
        let mut left = self.parse_unary()?;
        loop {
            let func = match self.peek().tok {
                Tok::Star => "_*_",
                Tok::Slash => "_/_",
                Tok::Percent => "_%_",
                _ => break,
            };
            let offset = self.advance().offset;
            let right = self.parse_unary()?;
            left = self.node(
                offset,
                Expr::Call(Box::new(CallExpr { target: None, function: func.into(), args: vec![left, right] })),
            );
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> PResult<IdedExpr> {
        let _g = self.enter()?;
        match self.peek().tok {
            Tok::Bang => {
                let offset = self.advance().offset;
                let operand = self.parse_unary()?;
                Ok(self.node(
                    offset,
                    Expr::Call(Box::new(CallExpr { target: None, function: "!_".into(), args: vec![operand] })),
                ))
            }
            Tok::Minus => {
                let offset = self.advance().offset;
                let operand = self.parse_unary()?;
                Ok(self.node(
                    offset,
                    Expr::Call(Box::new(CallExpr { target: None, function: "-_".into(), args: vec![operand] })),
                ))
            }
            _ => self.parse_member(),
        }
    }

    fn parse_member(&mut self) -> PResult<IdedExpr> {
        let _g = self.enter()?;
        let mut expr = self.parse_primary()?;
        loop {
            match &self.peek().tok {
                Tok::Dot => {
                    let offset = self.advance().offset;
                    let field = self.expect_ident("field name")?;
                    if matches!(self.peek().tok, Tok::LParen) {
                        self.advance();
                        let args = self.parse_arg_list(Tok::RParen)?;
                        expr = self.build_call(offset, Some(expr), field, args)?;
                    } else {
                        expr = self.node(
                            offset,
                            Expr::Select(Box::new(SelectExpr { operand: expr, field: field.into(), test_only: false })),
                        );
                    }
                }
                Tok::LBracket => {
                    let offset = self.advance().offset;
                    let index = self.parse_expr()?;
                    self.expect(&Tok::RBracket, "']'")?;
                    expr = self.node(
                        offset,
                        Expr::Call(Box::new(CallExpr { target: None, function: "_[_]".into(), args: vec![expr, index] })),
                    );
                }
                Tok::LBrace if is_message_path(&expr) => {
                    let offset = self.advance().offset;
                    let fields = self.parse_struct_fields()?;
                    let name = message_path_string(&expr);
                    expr = self.node(offset, Expr::Struct(Box::new(StructExpr { message_name: name.into(), fields })));
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn build_call(&mut self, offset: u32, target: Option<IdedExpr>, function: String, args: Vec<IdedExpr>) -> PResult<IdedExpr> {
        let has_target = target.is_some();
        if let Some(kind) = macros::recognize(&function, has_target, args.len()) {
            let id = self.new_id(offset);
            let original = CallExpr {
                target: target.clone().map(Box::new),
                function: Arc::from(function.as_str()),
                args: args.clone(),
            };
            match macros::expand(&mut self.idgen, kind, target, args) {
                Ok(expanded) => {
                    let expanded = IdedExpr::new(id, expanded);
                    self.macro_calls.insert(id, IdedExpr::new(id, Expr::Call(Box::new(original))));
                    return Ok(expanded);
                }
                Err(message) => return Err(ParseError { offset, message }),
            }
        }
        Ok(self.node(
            offset,
            Expr::Call(Box::new(CallExpr { target: target.map(Box::new), function: function.into(), args })),
        ))
    }

    fn parse_arg_list(&mut self, close: Tok) -> PResult<Vec<IdedExpr>> {
        let mut args = Vec::new();
        if self.peek().tok == close {
            self.advance();
            return Ok(args);
        }
        loop {
            args.push(self.parse_expr()?);
            match &self.peek().tok {
                Tok::Comma => {
                    self.advance();
                }
                t if *t == close => {
                    self.advance();
                    break;
                }
                _ => {
                    return Err(ParseError {
                        offset: self.peek().offset,
                        message: "expected ',' or closing delimiter".to_string(),
                    })
                }
            }
        }
        Ok(args)
    }

    fn parse_struct_fields(&mut self) -> PResult<Vec<StructFieldInit>> {
        let mut fields = Vec::new();
        if matches!(self.peek().tok, Tok::RBrace) {
            self.advance();
            return Ok(fields);
        }
        loop {
            let offset = self.peek().offset;
            let name = self.expect_ident("field name")?;
            self.expect(&Tok::Colon, "':' after field name")?;
            let value = self.parse_expr()?;
            let id = self.new_id(offset);
            fields.push(StructFieldInit { id, name: name.into(), value });
            match &self.peek().tok {
                Tok::Comma => {
                    self.advance();
                }
                Tok::RBrace => {
                    self.advance();
                    break;
                }
                _ => {
                    return Err(ParseError { offset: self.peek().offset, message: "expected ',' or '}'".to_string() })
                }
            }
        }
        Ok(fields)
    }

    fn expect_ident(&mut self, what: &str) -> PResult<String> {
        match &self.peek().tok {
            Tok::Ident(name) => {
                let name = name.to_string();
                self.advance();
                Ok(name)
            }
            // contextual keywords are valid identifiers in field/function position
            Tok::In => {
                self.advance();
                Ok("in".to_string())
            }
            Tok::As => {
                self.advance();
                Ok("as".to_string())
            }
            _ => Err(ParseError { offset: self.peek().offset, message: format!("expected {what}") }),
        }
    }

    fn parse_primary(&mut self) -> PResult<IdedExpr> {
        let _g = self.enter()?;
        let offset = self.peek().offset;
        match self.peek().tok.clone() {
            Tok::Int(v) => {
                self.advance();
                Ok(self.node(offset, Expr::Literal(LiteralKind::Int(v))))
            }
            Tok::UInt(v) => {
                self.advance();
                Ok(self.node(offset, Expr::Literal(LiteralKind::UInt(v))))
            }
            Tok::Double(v) => {
                self.advance();
                Ok(self.node(offset, Expr::Literal(LiteralKind::Double(v))))
            }
            Tok::Str(s) => {
                self.advance();
                Ok(self.node(offset, Expr::Literal(LiteralKind::String(s))))
            }
            Tok::Bytes(b) => {
                self.advance();
                Ok(self.node(offset, Expr::Literal(LiteralKind::Bytes(b))))
            }
            Tok::True => {
                self.advance();
                Ok(self.node(offset, Expr::Literal(LiteralKind::Bool(true))))
            }
            Tok::False => {
                self.advance();
                Ok(self.node(offset, Expr::Literal(LiteralKind::Bool(false))))
            }
            Tok::Null => {
                self.advance();
                Ok(self.node(offset, Expr::Literal(LiteralKind::Null)))
            }
            Tok::LParen => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(&Tok::RParen, "')'")?;
                Ok(inner)
            }
            Tok::LBracket => {
                self.advance();
                let elements = self.parse_arg_list(Tok::RBracket)?;
                Ok(self.node(offset, Expr::List(ListExpr { elements })))
            }
            Tok::LBrace => {
                self.advance();
                let entries = self.parse_map_entries()?;
                Ok(self.node(offset, Expr::Map(MapExpr { entries })))
            }
            Tok::Dot => {
                // leading-dot absolute reference: `.pkg.Type` or `.ident`
                self.advance();
                let name = self.expect_ident("identifier after '.'")?;
                self.parse_ident_or_call(offset, format!(".{name}"))
            }
            Tok::Ident(name) => {
                self.advance();
                self.parse_ident_or_call(offset, name.to_string())
            }
            ref other => Err(ParseError { offset, message: format!("unexpected token {other:?}") }),
        }
    }

    fn parse_ident_or_call(&mut self, offset: u32, name: String) -> PResult<IdedExpr> {
        if matches!(self.peek().tok, Tok::LParen) {
            self.advance();
            let args = self.parse_arg_list(Tok::RParen)?;
            return self.build_call(offset, None, name, args);
        }
        Ok(self.node(offset, Expr::Ident(name.into())))
    }

    fn parse_map_entries(&mut self) -> PResult<Vec<MapEntry>> {
        let mut entries = Vec::new();
        if matches!(self.peek().tok, Tok::RBrace) {
            self.advance();
            return Ok(entries);
        }
        loop {
            let offset = self.peek().offset;
            let key = self.parse_expr()?;
            self.expect(&Tok::Colon, "':' in map entry")?;
            let value = self.parse_expr()?;
            let id = self.new_id(offset);
            entries.push(MapEntry { id, key, value });
            match &self.peek().tok {
                Tok::Comma => {
                    self.advance();
                }
                Tok::RBrace => {
                    self.advance();
                    break;
                }
                _ => return Err(ParseError { offset: self.peek().offset, message: "expected ',' or '}'".to_string() }),
            }
        }
        Ok(entries)
    }
}

/// True when `expr` is a plain dotted path of identifiers — the only
/// shape that can precede a `{...}` message-construction literal.
fn is_message_path(expr: &IdedExpr) -> bool {
    match &expr.expr {
        Expr::Ident(_) => true,
        Expr::Select(s) => !s.test_only && is_message_path(&s.operand),
        _ => false,
    }
}

fn message_path_string(expr: &IdedExpr) -> String {
    match &expr.expr {
        Expr::Ident(name) => name.to_string(),
        Expr::Select(s) => format!("{}.{}", message_path_string(&s.operand), s.field),
        _ => unreachable!("checked by is_message_path"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::Source;

    fn parse_ok(src: &str) -> Ast {
        let source = Source::from(src);
        parse(&source).unwrap_or_else(|d| panic!("parse error: {:?}", d.into_iter().map(|d| d.to_string()).collect::<Vec<_>>()))
    }

    fn call_fn(e: &IdedExpr) -> &str {
        match &e.expr {
            Expr::Call(c) => &c.function,
            _ => panic!("not a call: {e:?}"),
        }
    }

    #[test]
    fn precedence_multiplication_over_addition() {
        let ast = parse_ok("1 + 2 * 3");
        assert_eq!(call_fn(&ast.root), "_+_");
    }

    #[test]
    fn ternary_is_right_associative_and_loosest() {
        let ast = parse_ok("a ? b : c ? d : e");
        match &ast.root.expr {
            Expr::Call(c) => {
                assert_eq!(&*c.function, "_?_:_");
                assert_eq!(call_fn(&c.args[2]), "_?_:_");
            }
            _ => panic!("expected ternary"),
        }
    }

    #[test]
    fn field_select_chain() {
        let ast = parse_ok("a.b.c");
        match &ast.root.expr {
            Expr::Select(s) => assert_eq!(&*s.field, "c"),
            _ => panic!("expected select"),
        }
    }

    #[test]
    fn index_and_member_call_mix() {
        let ast = parse_ok("a[0].b(1)");
        match &ast.root.expr {
            Expr::Call(c) => {
                assert_eq!(&*c.function, "b");
                assert!(c.target.is_some());
            }
            _ => panic!("expected call"),
        }
    }

    #[test]
    fn has_macro_expands_to_test_only_select() {
        let ast = parse_ok("has(a.b)");
        match &ast.root.expr {
            Expr::Select(s) => assert!(s.test_only),
            _ => panic!("expected test-only select"),
        }
    }

    #[test]
    fn all_macro_expands_to_comprehension_and_records_macro_call() {
        let ast = parse_ok("[1, 2].all(x, x > 0)");
        assert!(matches!(ast.root.expr, Expr::Comprehension(_)));
        assert_eq!(ast.source_info.macro_calls.len(), 1);
    }

    #[test]
    fn message_construction_literal() {
        let ast = parse_ok("pkg.Msg{a: 1}");
        match &ast.root.expr {
            Expr::Struct(s) => assert_eq!(&*s.message_name, "pkg.Msg"),
            _ => panic!("expected struct"),
        }
    }

    #[test]
    fn deeply_nested_parens_trip_recursion_guard() {
        let src = format!("{}1{}", "(".repeat(MAX_RECURSION_DEPTH + 50), ")".repeat(MAX_RECURSION_DEPTH + 50));
        let source = Source::from(src.as_str());
        assert!(parse(&source).is_err());
    }
}
