//! Expression AST.

use serde_json::Value;

/// Binary operators, grouped by precedence tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    // multiplicative
    Mul,
    Div,
    Rem,
    // additive
    Add,
    Sub,
    // comparison (lowest precedence)
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
        }
    }
}

/// A parsed expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Numeric, string, or boolean literal.
    Literal(Value),
    /// `$node["Name"]` — lookup of a prior node's output by name.
    NodeRef(String),
    /// Dot access: `base.field`.
    Field { base: Box<Expr>, name: String },
    /// Bracket access: `base["key"]` or `base[index]`.
    Index { base: Box<Expr>, index: Box<Expr> },
    /// Unary negation.
    Neg(Box<Expr>),
    Binary {
        left: Box<Expr>,
        op: BinOp,
        right: Box<Expr>,
    },
}
