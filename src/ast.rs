/// Canonical AST produced by the parser and consumed by the compiler.
///
/// Every node that carries a source position keeps a `Span` for diagnostics;
/// nodes synthesized purely at compile time (none exist in this front end)
/// would not need one. Mirrors the span-carrying-enum shape of the teacher's
/// own AST (`axm::ast`) but the node set itself is this language's own:
/// typed declarations, fixed-size arrays, C-style `for`, `elif` chains.
use crate::errors::Span;
use crate::decimal::BigFloat;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeVar {
    Int,
    Long,
    Bool,
    Float,
    Array(Box<TypeVarInner>),
    Struct,
    None,
}

// `Box<TypeVar>` directly would make `TypeVar` infinitely-sized through the
// `Array` variant; `TypeVarInner` breaks the cycle while keeping `TypeVar`
// itself `Copy` for the common scalar cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeVarInner(pub ScalarType);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarType {
    Int,
    Long,
    Bool,
    Float,
}

impl TypeVar {
    pub fn array_of(elem: ScalarType) -> TypeVar {
        TypeVar::Array(Box::new(TypeVarInner(elem)))
    }

    pub fn name(&self) -> String {
        match self {
            TypeVar::Int => "int".into(),
            TypeVar::Long => "long".into(),
            TypeVar::Bool => "bool".into(),
            TypeVar::Float => "float".into(),
            TypeVar::Struct => "struct".into(),
            TypeVar::None => "none".into(),
            TypeVar::Array(inner) => format!("{}[]", scalar_name(inner.0)),
        }
    }
}

fn scalar_name(s: ScalarType) -> &'static str {
    match s {
        ScalarType::Int => "int",
        ScalarType::Long => "long",
        ScalarType::Bool => "bool",
        ScalarType::Float => "float",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Pos,
    Neg,
    Not,
}

#[derive(Debug, Clone)]
pub enum Expr {
    IntLit(i64, Span),
    FloatLit(BigFloat, Span),
    BoolLit(bool, Span),
    NoneLit(Span),
    Identifier(String, Span),
    ArrayLit(Vec<Expr>, Span),
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
        span: Span,
    },
    Unary {
        op: UnOp,
        operand: Box<Expr>,
        span: Span,
    },
    Call {
        callee: String,
        args: Vec<Expr>,
        span: Span,
    },
    Index {
        array: Box<Expr>,
        index: Box<Expr>,
        span: Span,
    },
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::IntLit(_, s)
            | Expr::FloatLit(_, s)
            | Expr::BoolLit(_, s)
            | Expr::NoneLit(s)
            | Expr::Identifier(_, s)
            | Expr::ArrayLit(_, s)
            | Expr::Binary { span: s, .. }
            | Expr::Unary { span: s, .. }
            | Expr::Call { span: s, .. }
            | Expr::Index { span: s, .. } => *s,
        }
    }
}

#[derive(Debug, Clone)]
pub enum AssignTarget {
    Name(String),
    Index { array: Box<Expr>, index: Box<Expr> },
}

#[derive(Debug, Clone)]
pub enum Stmt {
    ExprStmt(Expr),
    VarDecl {
        name: String,
        ty: TypeVar,
        init: Option<Expr>,
        span: Span,
    },
    ArrayDecl {
        name: String,
        elem_ty: ScalarType,
        size: Option<Expr>,
        init: Option<Expr>,
        span: Span,
    },
    Assign {
        target: AssignTarget,
        value: Expr,
        span: Span,
    },
    If {
        branches: Vec<(Expr, Vec<Stmt>)>,
        else_body: Option<Vec<Stmt>>,
        span: Span,
    },
    While {
        cond: Expr,
        body: Vec<Stmt>,
        span: Span,
    },
    For {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        incr: Option<Box<Stmt>>,
        body: Vec<Stmt>,
        span: Span,
    },
    Break(Span),
    Continue(Span),
    Return(Option<Expr>, Span),
    FunctionDecl {
        name: String,
        params: Vec<(String, TypeVar)>,
        return_ty: TypeVar,
        body: Vec<Stmt>,
        span: Span,
    },
}

pub type Module = Vec<Stmt>;
