//! Language-neutral syntax tree consumed by the zone pattern recognizers.
//!
//! A [`SyntaxTreeProvider`] lowers one source language into this tree. The
//! tree only models what the recognizers look at: simple-name assignments,
//! conditional chains, nested blocks, and literal expressions. Everything
//! else is kept as [`Stmt::Other`] / [`Expr::Opaque`].

use std::path::Path;

/// Parses target source of one language into a [`Module`].
pub trait SyntaxTreeProvider: Send + Sync {
    /// Short language tag, e.g. `python`.
    fn language(&self) -> &'static str;

    /// Whether this provider understands the given target.
    fn accepts(&self, path: &Path, source: &str) -> bool;

    fn parse(&self, source: &str) -> Result<Module, SyntaxError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} (line {line})")]
pub struct SyntaxError {
    pub message: String,
    pub line: usize,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, line: usize) -> Self {
        Self {
            message: message.into(),
            line,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Module {
    pub body: Vec<Stmt>,
}

impl Module {
    /// Every statement in pre-order, nested bodies included.
    pub fn walk(&self) -> Vec<&Stmt> {
        let mut out = Vec::new();
        walk_into(&self.body, &mut out);
        out
    }
}

fn walk_into<'a>(body: &'a [Stmt], out: &mut Vec<&'a Stmt>) {
    for stmt in body {
        out.push(stmt);
        match stmt {
            Stmt::If(chain) => {
                for branch in &chain.branches {
                    walk_into(&branch.body, out);
                }
                if let Some(orelse) = &chain.orelse {
                    walk_into(orelse, out);
                }
            }
            Stmt::Block { body, .. } => walk_into(body, out),
            Stmt::Assign { .. } | Stmt::Other { .. } => {}
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// `name = value` or `name: annotation = value`.
    Assign {
        target: String,
        value: Expr,
        line: usize,
    },
    /// `if` with its `elif` branches and optional `else`.
    If(IfChain),
    /// Any other compound statement (`def`, `class`, `for`, ...).
    Block {
        keyword: String,
        body: Vec<Stmt>,
        line: usize,
    },
    Other {
        line: usize,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfChain {
    pub branches: Vec<Branch>,
    pub orelse: Option<Vec<Stmt>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Branch {
    pub test: Expr,
    pub body: Vec<Stmt>,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    None,
    Name(String),
    List(Vec<Expr>),
    Tuple(Vec<Expr>),
    Dict(Vec<(Expr, Expr)>),
    Compare {
        left: Box<Expr>,
        op: CmpOp,
        right: Box<Expr>,
    },
    Opaque,
}

impl Expr {
    /// Numeric literal value; booleans are not numbers here.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Int(value) => Some(*value as f64),
            Self::Float(value) => Some(*value),
            _ => None,
        }
    }

    /// Deterministic rendering of a scalar literal, used for mapping keys.
    pub fn literal_key(&self) -> Option<String> {
        match self {
            Self::Int(value) => Some(value.to_string()),
            Self::Float(value) => Some(format!("{value:?}")),
            Self::Str(value) => Some(value.clone()),
            Self::Bool(true) => Some("True".to_string()),
            Self::Bool(false) => Some("False".to_string()),
            Self::None => Some("None".to_string()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Lt,
    LtE,
    Gt,
    GtE,
    Eq,
    NotEq,
}

impl CmpOp {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "<" => Some(Self::Lt),
            "<=" => Some(Self::LtE),
            ">" => Some(Self::Gt),
            ">=" => Some(Self::GtE),
            "==" => Some(Self::Eq),
            "!=" => Some(Self::NotEq),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walk_visits_nested_bodies_in_order() {
        let module = Module {
            body: vec![
                Stmt::Other { line: 1 },
                Stmt::Block {
                    keyword: "def".to_string(),
                    line: 2,
                    body: vec![Stmt::If(IfChain {
                        branches: vec![Branch {
                            test: Expr::Opaque,
                            body: vec![Stmt::Other { line: 4 }],
                            line: 3,
                        }],
                        orelse: Some(vec![Stmt::Other { line: 6 }]),
                    })],
                },
            ],
        };
        let lines: Vec<String> = module
            .walk()
            .iter()
            .map(|stmt| match stmt {
                Stmt::Other { line } => format!("other@{line}"),
                Stmt::Block { keyword, .. } => keyword.clone(),
                Stmt::If(_) => "if".to_string(),
                Stmt::Assign { target, .. } => target.clone(),
            })
            .collect();
        assert_eq!(lines, vec!["other@1", "def", "if", "other@4", "other@6"]);
    }

    #[test]
    fn literal_keys_are_deterministic() {
        assert_eq!(Expr::Int(3).literal_key().as_deref(), Some("3"));
        assert_eq!(Expr::Float(1.0).literal_key().as_deref(), Some("1.0"));
        assert_eq!(Expr::Str("A".into()).literal_key().as_deref(), Some("A"));
        assert_eq!(Expr::Bool(true).literal_key().as_deref(), Some("True"));
        assert_eq!(Expr::Name("x".into()).literal_key(), None);
    }
}
