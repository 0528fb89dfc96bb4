use super::locations::{Pos, SourceFile};
use super::tokenizer::Token;
use crate::scope::{ObjId, Objects};
use derivative::Derivative;

// Positions and object handles are left out of the `Debug` output, so a dumped
// tree only shows its shape.

#[derive(Debug, Clone)]
pub enum Expr {
    BasicLit(BasicLit),
    Ident(Ident),
    Unary(UnaryExpr),
    Binary(BinaryExpr),
    Call(CallExpr),
    Bad(BadExpr),
}

#[derive(Clone, Derivative)]
#[derivative(Debug)]
pub struct BasicLit {
    #[derivative(Debug = "ignore")]
    pub pos: Pos,
    pub kind: Token,
    pub value: String,
}

#[derive(Clone, Derivative)]
#[derivative(Debug)]
pub struct Ident {
    #[derivative(Debug = "ignore")]
    pub pos: Pos,
    pub name: String,
    #[derivative(Debug = "ignore")]
    pub obj: Option<ObjId>,
}

impl Ident {
    pub fn new(pos: Pos, name: &str) -> Self {
        Self {
            pos,
            name: name.to_string(),
            obj: None,
        }
    }

    /// The blank identifier `_` never binds anything.
    pub fn is_blank(&self) -> bool {
        self.name == "_"
    }
}

#[derive(Clone, Derivative)]
#[derivative(Debug)]
pub struct UnaryExpr {
    #[derivative(Debug = "ignore")]
    pub op_pos: Pos,
    pub op: Token,
    pub x: Box<Expr>,
}

#[derive(Clone, Derivative)]
#[derivative(Debug)]
pub struct BinaryExpr {
    pub x: Box<Expr>,
    #[derivative(Debug = "ignore")]
    pub op_pos: Pos,
    pub op: Token,
    pub y: Box<Expr>,
}

#[derive(Clone, Derivative)]
#[derivative(Debug)]
pub struct CallExpr {
    pub fun: Box<Expr>,
    #[derivative(Debug = "ignore")]
    pub lparen: Pos,
    pub args: Vec<Expr>,
    #[derivative(Debug = "ignore")]
    pub rparen: Pos,
}

/// Placeholder for an expression that failed to parse.
#[derive(Debug, Clone)]
pub struct BadExpr {
    pub from: Pos,
    pub to: Pos,
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Var(VarStmt),
    Assign(AssignStmt),
    Expr(ExprStmt),
    Block(BlockStmt),
    If(IfStmt),
    Func(FuncStmt),
    Return(ReturnStmt),
    Empty(EmptyStmt),
    Bad(BadStmt),
}

/// `var a, b [T] [= x, y]`. `values` is empty when there is no initializer.
#[derive(Clone, Derivative)]
#[derivative(Debug)]
pub struct VarStmt {
    #[derivative(Debug = "ignore")]
    pub var_pos: Pos,
    pub names: Vec<Ident>,
    pub typ: Option<Ident>,
    pub values: Vec<Expr>,
}

/// Plain (`=`) or short (`:=`) assignment.
#[derive(Clone, Derivative)]
#[derivative(Debug)]
pub struct AssignStmt {
    pub lhs: Vec<Expr>,
    #[derivative(Debug = "ignore")]
    pub tok_pos: Pos,
    pub tok: Token,
    pub rhs: Vec<Expr>,
}

#[derive(Debug, Clone)]
pub struct ExprStmt {
    pub x: Expr,
}

#[derive(Clone, Derivative)]
#[derivative(Debug)]
pub struct BlockStmt {
    #[derivative(Debug = "ignore")]
    pub lbrace: Pos,
    pub stmts: Vec<Stmt>,
    #[derivative(Debug = "ignore")]
    pub rbrace: Pos,
}

#[derive(Clone, Derivative)]
#[derivative(Debug)]
pub struct IfStmt {
    #[derivative(Debug = "ignore")]
    pub if_pos: Pos,
    pub init: Option<Box<Stmt>>,
    pub cond: Expr,
    pub body: BlockStmt,
    /// Either a [`Stmt::Block`] or a nested [`Stmt::If`].
    pub else_: Option<Box<Stmt>>,
}

#[derive(Clone, Derivative)]
#[derivative(Debug)]
pub struct FuncStmt {
    #[derivative(Debug = "ignore")]
    pub func_pos: Pos,
    pub name: Ident,
    pub params: FieldList,
    pub results: Option<FieldList>,
    pub body: BlockStmt,
}

#[derive(Clone, Derivative)]
#[derivative(Debug)]
pub struct ReturnStmt {
    #[derivative(Debug = "ignore")]
    pub return_pos: Pos,
    pub results: Vec<Expr>,
}

/// A lone `;`.
#[derive(Debug, Clone)]
pub struct EmptyStmt {
    pub semicolon: Pos,
}

#[derive(Debug, Clone)]
pub struct BadStmt {
    pub from: Pos,
    pub to: Pos,
}

/// Parameter or result list. The bracket positions are [`NO_POS`] for a
/// single unparenthesized result type.
///
/// [`NO_POS`]: super::locations::NO_POS
#[derive(Clone, Derivative)]
#[derivative(Debug)]
pub struct FieldList {
    #[derivative(Debug = "ignore")]
    pub opening: Pos,
    pub fields: Vec<Field>,
    #[derivative(Debug = "ignore")]
    pub closing: Pos,
}

/// A group of names sharing one type, e.g. `a, b int`.
#[derive(Debug, Clone)]
pub struct Field {
    pub names: Vec<Ident>,
    pub typ: Option<Ident>,
}

/// A parsed source unit. `objects` owns every object the identifiers of
/// `stmts` refer to.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct File {
    pub name: String,
    pub stmts: Vec<Stmt>,
    #[derivative(Debug = "ignore")]
    pub source: SourceFile,
    #[derivative(Debug = "ignore")]
    pub objects: Objects,
}

impl Expr {
    pub fn as_ident(&self) -> Option<&Ident> {
        match self {
            Self::Ident(ident) => Some(ident),
            _ => None,
        }
    }
}
