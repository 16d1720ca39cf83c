//! Parser for Sable
//!
//! Recursive descent parser with precedence climbing for expressions.

use crate::frontend::ast::*;
use crate::frontend::lexer::Lexer;
use crate::frontend::token::{Token, TokenKind};
use crate::types::PrimitiveType;
use crate::utils::{Error, Result, Span};

/// Prefix of the synthetic names given to function literals
pub const FN_LITERAL_PREFIX: &str = "__fn_lit_";

/// Lex and parse a whole source file
pub fn parse_source(source: &str, file_id: usize) -> Result<Program> {
    Parser::new(Lexer::new(source, file_id))?.parse_program()
}

/// The parser
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    /// Counter for function literal names
    literals: usize,
}

impl Parser {
    /// Create a new parser from a lexer
    pub fn new(mut lexer: Lexer) -> Result<Self> {
        Ok(Self::from_tokens(lexer.tokenize()?))
    }

    /// Create a parser from pre-tokenized input
    pub fn from_tokens(mut tokens: Vec<Token>) -> Self {
        if tokens.last().map_or(true, |t| t.kind != TokenKind::Eof) {
            let end = tokens.last().map_or(Span::dummy(), |t| t.span);
            tokens.push(Token::eof(Span::new(end.end, end.end, end.file_id)));
        }
        Self {
            tokens,
            pos: 0,
            literals: 0,
        }
    }

    // ==================== Helper Methods ====================

    fn current(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn current_kind(&self) -> &TokenKind {
        &self.current().kind
    }

    fn peek_kind(&self) -> &TokenKind {
        let idx = (self.pos + 1).min(self.tokens.len() - 1);
        &self.tokens[idx].kind
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(self.current_kind()) == std::mem::discriminant(kind)
    }

    fn is_at_end(&self) -> bool {
        matches!(self.current_kind(), TokenKind::Eof)
    }

    fn expect(&mut self, expected: TokenKind) -> Result<Token> {
        if self.check(&expected) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(&expected.to_string()))
        }
    }

    fn consume(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn unexpected(&self, expected: &str) -> Error {
        Error::UnexpectedToken {
            expected: expected.to_string(),
            got: self.current_kind().to_string(),
            span: self.current().span,
        }
    }

    /// Span from `start` to the last consumed token
    fn span_from(&self, start: Span) -> Span {
        start.merge(&self.tokens[self.pos.saturating_sub(1)].span)
    }

    // ==================== Statements ====================

    /// Parse a complete program
    pub fn parse_program(&mut self) -> Result<Program> {
        let start = self.current().span;
        let mut stmts = Vec::new();

        while !self.is_at_end() {
            if self.consume(&TokenKind::Semicolon) {
                continue;
            }
            stmts.push(self.parse_stmt()?);
        }

        Ok(Program {
            stmts,
            span: start.merge(&self.current().span),
        })
    }

    fn parse_stmt(&mut self) -> Result<Stmt> {
        let stmt = match self.current_kind() {
            TokenKind::Import => Stmt::Import(self.parse_import()?),
            TokenKind::Fn if matches!(self.peek_kind(), TokenKind::LParen) => {
                Stmt::Method(self.parse_method()?)
            }
            TokenKind::Fn => Stmt::Function(self.parse_function()?),
            TokenKind::Let | TokenKind::Const => Stmt::VarDecl(self.parse_var_decl()?),
            TokenKind::Type => Stmt::TypeDecl(self.parse_type_decl()?),
            TokenKind::If => Stmt::If(self.parse_if()?),
            TokenKind::Return => self.parse_return()?,
            TokenKind::LBrace => Stmt::Block(self.parse_block()?),
            _ => self.parse_expr_stmt()?,
        };
        // Statement terminators are optional
        self.consume(&TokenKind::Semicolon);
        Ok(stmt)
    }

    /// `import "path" [as alias]`
    fn parse_import(&mut self) -> Result<Import> {
        let start = self.current().span;
        self.expect(TokenKind::Import)?;

        let path = match self.current_kind() {
            TokenKind::StringLit(path) => path.clone(),
            _ => return Err(self.unexpected("import path string")),
        };
        self.advance();

        let alias = if self.consume(&TokenKind::As) {
            Some(self.parse_ident()?)
        } else {
            None
        };

        Ok(Import {
            path,
            alias,
            span: self.span_from(start),
        })
    }

    /// Parse a function definition
    fn parse_function(&mut self) -> Result<Function> {
        let start = self.current().span;
        self.expect(TokenKind::Fn)?;
        let name = self.parse_ident()?;
        self.parse_function_rest(name, start)
    }

    /// Parameters, optional return type and body
    fn parse_function_rest(&mut self, name: Ident, start: Span) -> Result<Function> {
        self.expect(TokenKind::LParen)?;
        let params = self.parse_params()?;
        self.expect(TokenKind::RParen)?;

        let ret_type = if self.consume(&TokenKind::Arrow) {
            Some(self.parse_type()?)
        } else {
            None
        };

        let body = self.parse_block()?;

        Ok(Function {
            name,
            params,
            ret_type,
            body,
            span: self.span_from(start),
        })
    }

    /// `fn (recv: T) name(params) -> R { ... }`
    fn parse_method(&mut self) -> Result<Method> {
        let start = self.current().span;
        self.expect(TokenKind::Fn)?;
        self.expect(TokenKind::LParen)?;
        let receiver = self.parse_param()?;
        self.expect(TokenKind::RParen)?;

        let name = self.parse_ident()?;
        let function = self.parse_function_rest(name, start)?;

        Ok(Method {
            receiver,
            span: function.span,
            function,
        })
    }

    fn parse_params(&mut self) -> Result<Vec<Param>> {
        let mut params = Vec::new();
        while !self.check(&TokenKind::RParen) && !self.is_at_end() {
            params.push(self.parse_param()?);
            if !self.consume(&TokenKind::Comma) {
                break;
            }
        }
        Ok(params)
    }

    fn parse_param(&mut self) -> Result<Param> {
        let start = self.current().span;
        let name = self.parse_ident()?;
        self.expect(TokenKind::Colon)?;
        let ty = self.parse_type()?;
        Ok(Param {
            name,
            ty,
            span: self.span_from(start),
        })
    }

    /// `let a[: T], b[: U] [= | :=] e1, e2`
    fn parse_var_decl(&mut self) -> Result<VarDecl> {
        let start = self.current().span;
        let is_const = self.check(&TokenKind::Const);
        self.advance();

        let mut targets = Vec::new();
        loop {
            let name = self.parse_ident()?;
            let ty = if self.consume(&TokenKind::Colon) {
                Some(self.parse_type()?)
            } else {
                None
            };
            targets.push(VarTarget { name, ty });
            if !self.consume(&TokenKind::Comma) {
                break;
            }
        }

        let values = if self.consume(&TokenKind::Eq) || self.consume(&TokenKind::ColonEq) {
            self.parse_expr_list()?
        } else {
            Vec::new()
        };

        Ok(VarDecl {
            targets,
            values,
            is_const,
            span: self.span_from(start),
        })
    }

    /// `type Name T`
    fn parse_type_decl(&mut self) -> Result<TypeDecl> {
        let start = self.current().span;
        self.expect(TokenKind::Type)?;
        let name = self.parse_ident()?;
        let ty = self.parse_type()?;
        Ok(TypeDecl {
            name,
            ty,
            span: self.span_from(start),
        })
    }

    fn parse_if(&mut self) -> Result<IfStmt> {
        let start = self.current().span;
        self.expect(TokenKind::If)?;
        let cond = self.parse_expr()?;
        let then_block = self.parse_block()?;

        let else_branch = if self.consume(&TokenKind::Else) {
            let branch = if self.check(&TokenKind::If) {
                Stmt::If(self.parse_if()?)
            } else {
                Stmt::Block(self.parse_block()?)
            };
            Some(Box::new(branch))
        } else {
            None
        };

        Ok(IfStmt {
            cond,
            then_block,
            else_branch,
            span: self.span_from(start),
        })
    }

    fn parse_return(&mut self) -> Result<Stmt> {
        let start = self.current().span;
        self.expect(TokenKind::Return)?;
        let value = match self.current_kind() {
            TokenKind::Semicolon | TokenKind::RBrace | TokenKind::Eof => None,
            _ => Some(self.parse_expr()?),
        };
        Ok(Stmt::Return {
            value,
            span: self.span_from(start),
        })
    }

    /// Expression statement or assignment `a, b = x, y`
    fn parse_expr_stmt(&mut self) -> Result<Stmt> {
        let start = self.current().span;
        let targets = self.parse_expr_list()?;

        if self.consume(&TokenKind::Eq) {
            let values = self.parse_expr_list()?;
            return Ok(Stmt::Assign(Assign {
                targets,
                values,
                span: self.span_from(start),
            }));
        }

        let mut targets = targets;
        if targets.len() != 1 {
            return Err(self.unexpected("'='"));
        }
        Ok(Stmt::Expr(targets.remove(0)))
    }

    fn parse_block(&mut self) -> Result<Block> {
        let start = self.current().span;
        self.expect(TokenKind::LBrace)?;

        let mut stmts = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            if self.consume(&TokenKind::Semicolon) {
                continue;
            }
            stmts.push(self.parse_stmt()?);
        }
        self.expect(TokenKind::RBrace)?;

        Ok(Block {
            stmts,
            span: self.span_from(start),
        })
    }

    // ==================== Expressions ====================

    fn parse_expr_list(&mut self) -> Result<Vec<Expr>> {
        let mut exprs = vec![self.parse_expr()?];
        while self.consume(&TokenKind::Comma) {
            exprs.push(self.parse_expr()?);
        }
        Ok(exprs)
    }

    pub fn parse_expr(&mut self) -> Result<Expr> {
        self.parse_binary(0)
    }

    fn parse_binary(&mut self, min_prec: u8) -> Result<Expr> {
        let mut left = self.parse_unary()?;

        while let Some(prec) = self.current_kind().binary_precedence() {
            if prec < min_prec {
                break;
            }
            let op = match self.advance().kind {
                TokenKind::OrOr => BinOp::Or,
                TokenKind::AndAnd => BinOp::And,
                TokenKind::EqEq => BinOp::Eq,
                TokenKind::Ne => BinOp::Ne,
                TokenKind::Lt => BinOp::Lt,
                TokenKind::Le => BinOp::Le,
                TokenKind::Gt => BinOp::Gt,
                TokenKind::Ge => BinOp::Ge,
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                TokenKind::Star => BinOp::Mul,
                TokenKind::Slash => BinOp::Div,
                _ => BinOp::Mod,
            };
            let right = self.parse_binary(prec + 1)?;
            let span = left.span().merge(&right.span());
            left = Expr::Binary {
                left: Box::new(left),
                op,
                right: Box::new(right),
                span,
            };
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        let start = self.current().span;
        let op = match self.current_kind() {
            TokenKind::Minus => UnOp::Neg,
            TokenKind::Not => UnOp::Not,
            _ => return self.parse_postfix(),
        };
        self.advance();
        let expr = self.parse_unary()?;
        Ok(Expr::Unary {
            op,
            expr: Box::new(expr),
            span: self.span_from(start),
        })
    }

    fn parse_postfix(&mut self) -> Result<Expr> {
        let start = self.current().span;
        let mut expr = self.parse_primary()?;

        loop {
            if self.consume(&TokenKind::LParen) {
                let args = if self.check(&TokenKind::RParen) {
                    Vec::new()
                } else {
                    self.parse_expr_list()?
                };
                self.expect(TokenKind::RParen)?;
                expr = Expr::Call {
                    func: Box::new(expr),
                    args,
                    span: self.span_from(start),
                };
            } else if self.consume(&TokenKind::Dot) {
                let field = self.parse_ident()?;
                expr = Expr::Field {
                    expr: Box::new(expr),
                    field,
                    span: self.span_from(start),
                };
            } else if self.consume(&TokenKind::LBracket) {
                let index = self.parse_expr()?;
                self.expect(TokenKind::RBracket)?;
                expr = Expr::Index {
                    expr: Box::new(expr),
                    index: Box::new(index),
                    span: self.span_from(start),
                };
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        let start = self.current().span;
        match self.current_kind().clone() {
            TokenKind::IntLit(v) => {
                self.advance();
                Ok(Expr::Literal(Literal::Int(v, start)))
            }
            TokenKind::FloatLit(v) => {
                self.advance();
                Ok(Expr::Literal(Literal::Float(v, start)))
            }
            TokenKind::StringLit(s) => {
                self.advance();
                Ok(Expr::Literal(Literal::String(s, start)))
            }
            TokenKind::True | TokenKind::False => {
                let value = self.check(&TokenKind::True);
                self.advance();
                Ok(Expr::Literal(Literal::Bool(value, start)))
            }
            TokenKind::Ident(_) => {
                let ident = self.parse_ident()?;
                if self.consume(&TokenKind::ColonColon) {
                    let name = self.parse_ident()?;
                    return Ok(Expr::Scoped {
                        module: ident,
                        name,
                        span: self.span_from(start),
                    });
                }
                Ok(Expr::Ident(ident))
            }
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                Ok(expr)
            }
            TokenKind::LBracket => {
                self.advance();
                let elements = if self.check(&TokenKind::RBracket) {
                    Vec::new()
                } else {
                    self.parse_expr_list()?
                };
                self.expect(TokenKind::RBracket)?;
                Ok(Expr::Array {
                    elements,
                    span: self.span_from(start),
                })
            }
            TokenKind::Fn => {
                self.advance();
                let name = Ident::new(format!("{}{}", FN_LITERAL_PREFIX, self.literals), start);
                self.literals += 1;
                let function = self.parse_function_rest(name, start)?;
                Ok(Expr::Function(Box::new(function)))
            }
            _ => Err(Error::ExpectedExpr { span: start }),
        }
    }

    fn parse_ident(&mut self) -> Result<Ident> {
        match self.current_kind() {
            TokenKind::Ident(name) => {
                let ident = Ident::new(name.clone(), self.current().span);
                self.advance();
                Ok(ident)
            }
            _ => Err(Error::ExpectedIdent {
                span: self.current().span,
            }),
        }
    }

    // ==================== Types ====================

    fn parse_type(&mut self) -> Result<TypeExpr> {
        let start = self.current().span;

        // []T
        if self.consume(&TokenKind::LBracket) {
            self.expect(TokenKind::RBracket)?;
            let elem = self.parse_type()?;
            return Ok(TypeExpr::Array {
                elem: Box::new(elem),
                span: self.span_from(start),
            });
        }

        // struct { .a: T, .b: U }
        if self.consume(&TokenKind::Struct) {
            self.expect(TokenKind::LBrace)?;
            let mut fields = Vec::new();
            while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
                let field_start = self.current().span;
                self.consume(&TokenKind::Dot);
                let name = self.parse_ident()?;
                self.expect(TokenKind::Colon)?;
                let ty = self.parse_type()?;
                fields.push(FieldDecl {
                    name,
                    ty,
                    span: self.span_from(field_start),
                });
                if !self.consume(&TokenKind::Comma) {
                    break;
                }
            }
            self.expect(TokenKind::RBrace)?;
            return Ok(TypeExpr::Struct {
                fields,
                span: self.span_from(start),
            });
        }

        // fn(T, U) -> R
        if self.consume(&TokenKind::Fn) {
            self.expect(TokenKind::LParen)?;
            let mut params = Vec::new();
            while !self.check(&TokenKind::RParen) && !self.is_at_end() {
                params.push(self.parse_type()?);
                if !self.consume(&TokenKind::Comma) {
                    break;
                }
            }
            self.expect(TokenKind::RParen)?;
            let ret = if self.consume(&TokenKind::Arrow) {
                Some(Box::new(self.parse_type()?))
            } else {
                None
            };
            return Ok(TypeExpr::Function {
                params,
                ret,
                span: self.span_from(start),
            });
        }

        let ident = match self.current_kind() {
            TokenKind::Ident(_) => self.parse_ident()?,
            _ => return Err(Error::ExpectedType { span: start }),
        };

        if self.consume(&TokenKind::ColonColon) {
            let name = self.parse_ident()?;
            return Ok(TypeExpr::Scoped {
                module: ident,
                name,
                span: self.span_from(start),
            });
        }

        Ok(match PrimitiveType::from_name(&ident.name) {
            Some(prim) => TypeExpr::Primitive {
                prim,
                span: ident.span,
            },
            None => TypeExpr::Named(ident),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(source: &str) -> Result<Program> {
        parse_source(source, 0)
    }

    #[test]
    fn test_empty_function() {
        let program = parse("fn main() {}").unwrap();
        assert_eq!(program.stmts.len(), 1);
    }

    #[test]
    fn test_function_with_return() {
        let program = parse("fn add(a: i32, b: i32) -> i32 { return a + b }").unwrap();
        let Stmt::Function(func) = &program.stmts[0] else {
            panic!("expected function");
        };
        assert_eq!(func.name.name, "add");
        assert_eq!(func.params.len(), 2);
        assert!(matches!(
            func.ret_type,
            Some(TypeExpr::Primitive { prim: PrimitiveType::I32, .. })
        ));
        assert!(matches!(func.body.stmts[0], Stmt::Return { value: Some(_), .. }));
    }

    #[test]
    fn test_imports() {
        let program = parse(r#"import "lib/math" as m; import "utils";"#).unwrap();
        let aliases: Vec<String> = program
            .stmts
            .iter()
            .map(|s| match s {
                Stmt::Import(i) => i.alias_name(),
                _ => panic!("expected import"),
            })
            .collect();
        assert_eq!(aliases, vec!["m".to_string(), "utils".to_string()]);
    }

    #[test]
    fn test_multi_var_decl() {
        let program = parse("let a: i32, b := 1, \"two\";").unwrap();
        let Stmt::VarDecl(decl) = &program.stmts[0] else {
            panic!("expected var decl");
        };
        assert_eq!(decl.targets.len(), 2);
        assert!(decl.targets[0].ty.is_some());
        assert!(decl.targets[1].ty.is_none());
        assert_eq!(decl.values.len(), 2);
        assert!(!decl.is_const);
    }

    #[test]
    fn test_struct_type_decl() {
        let program = parse("type Point struct { .x: i32, .y: m::Coord };").unwrap();
        let Stmt::TypeDecl(decl) = &program.stmts[0] else {
            panic!("expected type decl");
        };
        assert_eq!(decl.name.name, "Point");
        let TypeExpr::Struct { fields, .. } = &decl.ty else {
            panic!("expected struct type");
        };
        assert_eq!(fields[0].name.name, "x");
        assert!(matches!(fields[1].ty, TypeExpr::Scoped { .. }));
    }

    #[test]
    fn test_method_decl() {
        let program = parse("fn (p: Point) len() -> f64 { return 0.0; }").unwrap();
        let Stmt::Method(method) = &program.stmts[0] else {
            panic!("expected method");
        };
        assert_eq!(method.receiver.name.name, "p");
        assert_eq!(method.function.name.name, "len");
    }

    #[test]
    fn test_function_literals_get_unique_names() {
        let program = parse("let f := fn(a: i32) {}; let g := fn() -> bool { return true; };").unwrap();
        let names: Vec<String> = program
            .stmts
            .iter()
            .map(|s| match s {
                Stmt::VarDecl(VarDecl { values, .. }) => match &values[0] {
                    Expr::Function(f) => f.name.name.clone(),
                    _ => panic!("expected literal"),
                },
                _ => panic!("expected var decl"),
            })
            .collect();
        assert_eq!(names, vec!["__fn_lit_0".to_string(), "__fn_lit_1".to_string()]);
    }

    #[test]
    fn test_precedence() {
        let program = parse("x = 1 + 2 * 3;").unwrap();
        let Stmt::Assign(assign) = &program.stmts[0] else {
            panic!("expected assignment");
        };
        let Expr::Binary { op, right, .. } = &assign.values[0] else {
            panic!("expected binary");
        };
        assert_eq!(*op, BinOp::Add);
        assert!(matches!(**right, Expr::Binary { op: BinOp::Mul, .. }));
    }

    #[test]
    fn test_if_else_chain() {
        let program = parse("fn main() { if x > 0 { return 1 } else if x < 0 { return 2 } else { return 0 } }").unwrap();
        let Stmt::Function(func) = &program.stmts[0] else {
            panic!("expected function");
        };
        let Stmt::If(stmt) = &func.body.stmts[0] else {
            panic!("expected if");
        };
        assert!(matches!(stmt.else_branch.as_deref(), Some(Stmt::If(_))));
    }

    #[test]
    fn test_missing_brace_is_error() {
        let err = parse("fn main() { let x = 1;").unwrap_err();
        assert!(matches!(err, Error::UnexpectedToken { .. }));
    }
}
