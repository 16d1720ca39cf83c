//! Abstract Syntax Tree definitions for Sable
//!
//! The tree is a closed set of sum types; the semantic passes dispatch on
//! them with exhaustive matches.

use crate::types::PrimitiveType;
use crate::utils::Span;

/// A complete program (compilation unit)
#[derive(Debug, Clone)]
pub struct Program {
    pub stmts: Vec<Stmt>,
    pub span: Span,
}

/// Statements
#[derive(Debug, Clone)]
pub enum Stmt {
    Import(Import),
    Function(Function),
    Method(Method),
    VarDecl(VarDecl),
    TypeDecl(TypeDecl),
    Assign(Assign),
    If(IfStmt),
    Return { value: Option<Expr>, span: Span },
    Block(Block),
    Expr(Expr),
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::Import(i) => i.span,
            Stmt::Function(f) => f.span,
            Stmt::Method(m) => m.span,
            Stmt::VarDecl(v) => v.span,
            Stmt::TypeDecl(t) => t.span,
            Stmt::Assign(a) => a.span,
            Stmt::If(i) => i.span,
            Stmt::Return { span, .. } => *span,
            Stmt::Block(b) => b.span,
            Stmt::Expr(e) => e.span(),
        }
    }
}

/// `import "path" [as alias];`
#[derive(Debug, Clone)]
pub struct Import {
    pub path: String,
    pub alias: Option<Ident>,
    pub span: Span,
}

impl Import {
    /// Explicit alias, or the last path segment without its extension
    pub fn alias_name(&self) -> String {
        if let Some(alias) = &self.alias {
            return alias.name.clone();
        }
        let normalized = self.path.replace('\\', "/");
        let last = normalized
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or_default();
        match last.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem.to_string(),
            _ => last.to_string(),
        }
    }
}

/// Function definition. Function literals reuse this shape with a
/// synthetic name.
#[derive(Debug, Clone)]
pub struct Function {
    pub name: Ident,
    pub params: Vec<Param>,
    pub ret_type: Option<TypeExpr>,
    pub body: Block,
    pub span: Span,
}

/// Method definition: `fn (recv: T) name(params) -> R { ... }`
#[derive(Debug, Clone)]
pub struct Method {
    pub receiver: Param,
    pub function: Function,
    pub span: Span,
}

/// Function parameter
#[derive(Debug, Clone)]
pub struct Param {
    pub name: Ident,
    pub ty: TypeExpr,
    pub span: Span,
}

/// `let` / `const` declaration, possibly declaring several names
#[derive(Debug, Clone)]
pub struct VarDecl {
    pub targets: Vec<VarTarget>,
    pub values: Vec<Expr>,
    pub is_const: bool,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct VarTarget {
    pub name: Ident,
    pub ty: Option<TypeExpr>,
}

/// `type Name T;`
#[derive(Debug, Clone)]
pub struct TypeDecl {
    pub name: Ident,
    pub ty: TypeExpr,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Assign {
    pub targets: Vec<Expr>,
    pub values: Vec<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct IfStmt {
    pub cond: Expr,
    pub then_block: Block,
    /// Either another `if` or a plain block
    pub else_branch: Option<Box<Stmt>>,
    pub span: Span,
}

/// Block of statements
#[derive(Debug, Clone)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub span: Span,
}

/// Expressions
#[derive(Debug, Clone)]
pub enum Expr {
    /// Literal value
    Literal(Literal),
    /// Identifier
    Ident(Ident),
    /// Module-qualified name (`m::x`)
    Scoped {
        module: Ident,
        name: Ident,
        span: Span,
    },
    /// Binary operation
    Binary {
        left: Box<Expr>,
        op: BinOp,
        right: Box<Expr>,
        span: Span,
    },
    /// Unary operation
    Unary {
        op: UnOp,
        expr: Box<Expr>,
        span: Span,
    },
    /// Function call
    Call {
        func: Box<Expr>,
        args: Vec<Expr>,
        span: Span,
    },
    /// Field access (expr.field)
    Field {
        expr: Box<Expr>,
        field: Ident,
        span: Span,
    },
    /// Index access (expr[index])
    Index {
        expr: Box<Expr>,
        index: Box<Expr>,
        span: Span,
    },
    /// Array literal
    Array { elements: Vec<Expr>, span: Span },
    /// Function literal
    Function(Box<Function>),
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Literal(lit) => lit.span(),
            Expr::Ident(ident) => ident.span,
            Expr::Function(func) => func.span,
            Expr::Scoped { span, .. }
            | Expr::Binary { span, .. }
            | Expr::Unary { span, .. }
            | Expr::Call { span, .. }
            | Expr::Field { span, .. }
            | Expr::Index { span, .. }
            | Expr::Array { span, .. } => *span,
        }
    }
}

/// Type syntax
#[derive(Debug, Clone)]
pub enum TypeExpr {
    Primitive { prim: PrimitiveType, span: Span },
    /// `[]T`
    Array { elem: Box<TypeExpr>, span: Span },
    /// `struct { .a: T, .b: U }`
    Struct { fields: Vec<FieldDecl>, span: Span },
    /// `fn(T, U) -> R`
    Function {
        params: Vec<TypeExpr>,
        ret: Option<Box<TypeExpr>>,
        span: Span,
    },
    /// User type name
    Named(Ident),
    /// `m::T`
    Scoped {
        module: Ident,
        name: Ident,
        span: Span,
    },
}

impl TypeExpr {
    pub fn span(&self) -> Span {
        match self {
            TypeExpr::Named(ident) => ident.span,
            TypeExpr::Primitive { span, .. }
            | TypeExpr::Array { span, .. }
            | TypeExpr::Struct { span, .. }
            | TypeExpr::Function { span, .. }
            | TypeExpr::Scoped { span, .. } => *span,
        }
    }
}

/// Struct field declaration
#[derive(Debug, Clone)]
pub struct FieldDecl {
    pub name: Ident,
    pub ty: TypeExpr,
    pub span: Span,
}

/// Literal values
#[derive(Debug, Clone)]
pub enum Literal {
    Int(i64, Span),
    Float(f64, Span),
    String(String, Span),
    Bool(bool, Span),
}

impl Literal {
    pub fn span(&self) -> Span {
        match self {
            Literal::Int(_, s) => *s,
            Literal::Float(_, s) => *s,
            Literal::String(_, s) => *s,
            Literal::Bool(_, s) => *s,
        }
    }
}

/// Identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

impl Ident {
    pub fn new(name: impl Into<String>, span: Span) -> Self {
        Self {
            name: name.into(),
            span,
        }
    }
}

/// Binary operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    // Comparison
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    // Logical
    And,
    Or,
}

/// Unary operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Not,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn import(path: &str, alias: Option<&str>) -> Import {
        Import {
            path: path.to_string(),
            alias: alias.map(|a| Ident::new(a, Span::dummy())),
            span: Span::dummy(),
        }
    }

    #[test]
    fn test_default_alias() {
        assert_eq!(import("lib/math", None).alias_name(), "math");
        assert_eq!(import("lib\\io.sbl", None).alias_name(), "io");
        assert_eq!(import("github.com/x/strings", None).alias_name(), "strings");
        assert_eq!(import("lib/math", Some("m")).alias_name(), "m");
    }
}
