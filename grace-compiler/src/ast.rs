//! Syntax tree handed over by the parser.
//!
//! The tree owns its children; every statement and expression carries the
//! source position used when reporting diagnostics.

use serde::{Deserialize, Serialize};

use crate::types::Type;

/// 1-based line/column of a node; `0:0` when the parser did not record one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pos {
    pub line: usize,
    pub column: usize,
}

impl Pos {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub body: Block,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub stmts: Vec<Stmt>,
}

impl Block {
    pub fn new(stmts: Vec<Stmt>) -> Self {
        Self { stmts }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub ty: Type,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stmt {
    /// Nested statement block with its own scope
    Block { pos: Pos, body: Block },
    VarDecl {
        pos: Pos,
        name: String,
        ty: Type,
        init: Option<Expr>,
    },
    /// `x = e`
    Assign { pos: Pos, name: String, value: Expr },
    /// `x += e`, `x -= e`, ...
    CompoundAssign {
        pos: Pos,
        name: String,
        op: CompoundOp,
        value: Expr,
    },
    /// `a = {1, 2, 3}`
    ArrayAssign {
        pos: Pos,
        name: String,
        elements: Vec<Literal>,
    },
    /// `a[i] = e`
    IndexAssign {
        pos: Pos,
        name: String,
        index: Expr,
        value: Expr,
    },
    /// Function (`return_type` set) or procedure (`return_type` absent)
    FuncDecl {
        pos: Pos,
        name: String,
        return_type: Option<Type>,
        params: Vec<Param>,
        body: Block,
    },
    If {
        pos: Pos,
        condition: Expr,
        then_block: Block,
        else_block: Option<Block>,
    },
    While {
        pos: Pos,
        condition: Expr,
        body: Block,
    },
    For {
        pos: Pos,
        init: Box<Stmt>,
        condition: Expr,
        step: Box<Stmt>,
        body: Block,
    },
    Return { pos: Pos, value: Option<Expr> },
    /// Continue the innermost loop
    Skip { pos: Pos },
    /// Leave the innermost loop
    Stop { pos: Pos },
    /// Formatted output: `write("x = %d\n", x)`
    Write {
        pos: Pos,
        format: String,
        args: Vec<Expr>,
    },
    /// Expression evaluated for its side effects (procedure calls)
    Expr { pos: Pos, expr: Expr },
}

impl Stmt {
    pub fn pos(&self) -> Pos {
        match self {
            Stmt::Block { pos, .. } => *pos,
            Stmt::VarDecl { pos, .. } => *pos,
            Stmt::Assign { pos, .. } => *pos,
            Stmt::CompoundAssign { pos, .. } => *pos,
            Stmt::ArrayAssign { pos, .. } => *pos,
            Stmt::IndexAssign { pos, .. } => *pos,
            Stmt::FuncDecl { pos, .. } => *pos,
            Stmt::If { pos, .. } => *pos,
            Stmt::While { pos, .. } => *pos,
            Stmt::For { pos, .. } => *pos,
            Stmt::Return { pos, .. } => *pos,
            Stmt::Skip { pos } => *pos,
            Stmt::Stop { pos } => *pos,
            Stmt::Write { pos, .. } => *pos,
            Stmt::Expr { pos, .. } => *pos,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Literal(Pos, Literal),
    Ident(Pos, String),
    /// `a[i]`
    Index {
        pos: Pos,
        name: String,
        index: Box<Expr>,
    },
    Unary {
        pos: Pos,
        op: UnOp,
        operand: Box<Expr>,
    },
    Binary {
        pos: Pos,
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Call {
        pos: Pos,
        callee: String,
        args: Vec<Expr>,
    },
}

impl Expr {
    pub fn pos(&self) -> Pos {
        match self {
            Expr::Literal(pos, _) => *pos,
            Expr::Ident(pos, _) => *pos,
            Expr::Index { pos, .. } => *pos,
            Expr::Unary { pos, .. } => *pos,
            Expr::Binary { pos, .. } => *pos,
            Expr::Call { pos, .. } => *pos,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Literal {
    Int(i32),
    Bool(bool),
    Str(String),
}

impl Literal {
    pub fn ty(&self) -> Type {
        match self {
            Literal::Int(_) => Type::Int,
            Literal::Bool(_) => Type::Bool,
            Literal::Str(_) => Type::String,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    And,
    Or,
}

impl std::fmt::Display for BinOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::And => "&&",
            BinOp::Or => "||",
        };
        write!(f, "{s}")
    }
}

/// Operator of a compound assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompoundOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl CompoundOp {
    /// The binary operator applied between the current value and the operand.
    pub fn bin_op(self) -> BinOp {
        match self {
            CompoundOp::Add => BinOp::Add,
            CompoundOp::Sub => BinOp::Sub,
            CompoundOp::Mul => BinOp::Mul,
            CompoundOp::Div => BinOp::Div,
            CompoundOp::Mod => BinOp::Mod,
        }
    }
}
