//! Abstract Syntax Tree definitions

mod expr;
mod span;

pub use expr::*;
pub use span::*;

use serde::{Deserialize, Serialize};

/// A program is a sequence of top-level statements
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Program {
    pub statements: Vec<Stmt>,
}

/// Statement node. The evaluator matches on this exhaustively.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Stmt {
    Var(VarDecl),
    Intent(IntentDecl),
    Class(ClassDecl),
    Interface(InterfaceDecl),
    Assign(Assign),
    If(IfStmt),
    While(WhileStmt),
    For(ForStmt),
    ForIn(ForInStmt),
    ForOf(ForOfStmt),
    Try(TryStmt),
    Throw(ThrowStmt),
    Return(ReturnStmt),
    Import(ImportDecl),
    Dataset(DatasetOp),
    Model(ModelOp),
    Expr(Spanned<Expr>),
}

/// Variable declaration: `var name: Type = expr;`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VarDecl {
    pub name: String,
    pub type_annotation: Option<String>,
    pub value: Spanned<Expr>,
    pub span: Span,
}

/// Intent parameter with optional declared type and default expression
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub type_annotation: Option<String>,
    pub default: Option<Spanned<Expr>>,
}

/// Intent (function) declaration, also the payload of methods and lambdas
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentDecl {
    pub name: String,
    pub params: Vec<Param>,
    pub return_type: Option<String>,
    pub body: Vec<Stmt>,
    pub is_async: bool,
    pub span: Span,
}

/// Class member: a field or a method
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Member {
    Field(FieldDecl),
    Method(MethodDecl),
}

/// Field declaration inside a class body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDecl {
    pub name: String,
    pub type_annotation: Option<String>,
    pub value: Option<Spanned<Expr>>,
    pub is_static: bool,
    pub is_private: bool,
    pub span: Span,
}

/// Method declaration inside a class body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodDecl {
    pub intent: IntentDecl,
    pub is_static: bool,
    pub is_private: bool,
    pub is_abstract: bool,
}

/// Class declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassDecl {
    pub name: String,
    pub members: Vec<Member>,
    pub extends: Option<String>,
    pub implements: Vec<String>,
    pub is_abstract: bool,
    pub generic_params: Vec<String>,
    pub span: Span,
}

/// Interface declaration: required method signatures only
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterfaceDecl {
    pub name: String,
    pub methods: Vec<MethodSig>,
    pub span: Span,
}

/// A bodyless method signature, as required by an interface
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodSig {
    pub name: String,
    pub params: Vec<Param>,
    pub return_type: Option<String>,
    pub span: Span,
}

/// Assignment to an identifier or a property chain
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assign {
    pub target: Spanned<Expr>,
    pub value: Spanned<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IfStmt {
    pub condition: Spanned<Expr>,
    pub then_branch: Vec<Stmt>,
    pub else_branch: Option<Vec<Stmt>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhileStmt {
    pub condition: Spanned<Expr>,
    pub body: Vec<Stmt>,
}

/// Traditional for loop: `for (init; condition; update) { body }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForStmt {
    pub init: Option<Box<Stmt>>,
    pub condition: Option<Spanned<Expr>>,
    pub update: Option<Box<Stmt>>,
    pub body: Vec<Stmt>,
}

/// `for (var item in collection)` — iterates keys
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForInStmt {
    pub variable: String,
    pub type_annotation: Option<String>,
    pub iterable: Spanned<Expr>,
    pub body: Vec<Stmt>,
}

/// `for (var item of collection)` — iterates values
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForOfStmt {
    pub variable: String,
    pub type_annotation: Option<String>,
    pub iterable: Spanned<Expr>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatchClause {
    pub exception_type: Option<String>,
    pub exception_var: Option<String>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TryStmt {
    pub try_block: Vec<Stmt>,
    pub catch_clauses: Vec<CatchClause>,
    pub finally_block: Option<Vec<Stmt>>,
    pub span: Span,
}

/// `throw expr;` — a bare `throw;` rethrows the active exception
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThrowStmt {
    pub expression: Option<Spanned<Expr>>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnStmt {
    pub value: Option<Spanned<Expr>>,
    pub span: Span,
}

/// `import dotted.name;`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportDecl {
    pub name: String,
    pub span: Span,
}

/// Dataset simulation statement: `dataset load users("users.csv")`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetOp {
    pub operation: String,
    pub target: String,
    pub params: Vec<(String, String)>,
    pub span: Span,
}

/// Model simulation statement: `model train clf(dataset="users")`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelOp {
    pub operation: String,
    pub model_name: String,
    pub params: Vec<(String, String)>,
    pub span: Span,
}
