//! Typed statement tree for the supported SQL subset.

/// A parsed statement. Only SELECT carries a body; the write-path variants
/// exist so the executor can refuse them with a precise message.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Select(SelectStatement),
    Insert,
    Update,
    Delete,
}

impl Statement {
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Select(_) => "SELECT",
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectStatement {
    pub projection: Projection,
    pub table: String,
    pub where_clause: Option<Expr>,
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    /// `SELECT *`: all columns in schema order.
    Star,
    /// `SELECT COUNT(*)`.
    CountStar,
    /// An explicit column list, emitted in list order.
    Columns(Vec<String>),
}

/// A WHERE expression: comparisons joined by AND/OR, with parentheses
/// resolved into the tree shape during parsing.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Comparison {
        column: String,
        op: CompareOp,
        literal: Literal,
    },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl CompareOp {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::LtEq => "<=",
            Self::Gt => ">",
            Self::GtEq => ">=",
        }
    }
}

/// A comparison literal. Numbers keep their written form so comparisons
/// stay string-wise, exactly as rows are rendered.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Number(String),
}

impl Literal {
    pub fn render(&self) -> &str {
        match self {
            Self::String(s) | Self::Number(s) => s,
        }
    }
}
