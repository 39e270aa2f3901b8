use std::rc::Rc;

/// Byte offset counted from the end of the input, as produced by the parser.
pub type Pos = usize;

pub type Name = String;

#[derive(Clone,PartialEq,Debug)]
pub struct Program {
    pub body: Vec<Stmt>,
}

#[derive(Clone,PartialEq,Debug)]
pub enum Stmt {
    Expr(Expr),
    Var(VarDecl),
    Function(Rc<Function>),
    Return(Option<Expr>),
    If(Expr, Box<Stmt>, Option<Box<Stmt>>),
    Block(Vec<Stmt>),
    For(ForStmt),
    While(Expr, Box<Stmt>),
    Switch(Expr, Vec<SwitchCase>),
    Try(TryStmt),
    Throw(Expr),
    Break,
    Continue,
    Empty,
}

#[derive(Clone,Copy,PartialEq,Eq,Debug)]
pub enum VarKind {
    Var,
    Let,
    Const,
}

#[derive(Clone,PartialEq,Debug)]
pub struct VarDecl {
    pub kind: VarKind,
    pub declarations: Vec<Declarator>,
}

#[derive(Clone,PartialEq,Debug)]
pub struct Declarator {
    pub id: Name,
    pub init: Option<Expr>,
}

/// Shared by function declarations and function expressions. Declarations always carry an id.
/// Held behind `Rc` so closures share the body with the tree.
#[derive(Clone,PartialEq,Debug)]
pub struct Function {
    pub id: Option<Name>,
    pub params: Vec<Name>,
    pub body: Vec<Stmt>,
}

#[derive(Clone,PartialEq,Debug)]
pub struct Arrow {
    pub params: Vec<Name>,
    pub body: ArrowBody,
}

#[derive(Clone,PartialEq,Debug)]
pub enum ArrowBody {
    Expr(Expr),
    Block(Vec<Stmt>),
}

#[derive(Clone,PartialEq,Debug)]
pub enum ForInit {
    Var(VarDecl),
    Expr(Expr),
}

#[derive(Clone,PartialEq,Debug)]
pub struct ForStmt {
    pub init: Option<ForInit>,
    pub test: Option<Expr>,
    pub update: Option<Expr>,
    pub body: Box<Stmt>,
}

/// `test` is None for the `default` clause.
#[derive(Clone,PartialEq,Debug)]
pub struct SwitchCase {
    pub test: Option<Expr>,
    pub body: Vec<Stmt>,
}

#[derive(Clone,PartialEq,Debug)]
pub struct TryStmt {
    pub block: Vec<Stmt>,
    pub handler: Option<CatchClause>,
    pub finalizer: Option<Vec<Stmt>>,
}

#[derive(Clone,PartialEq,Debug)]
pub struct CatchClause {
    pub param: Option<Name>,
    pub body: Vec<Stmt>,
}

#[derive(Clone,PartialEq,Debug)]
pub enum Lit {
    Num(f64),
    Str(String),
    Bool(bool),
    Null,
}

#[derive(Clone,PartialEq,Debug)]
pub enum PropKey {
    Ident(Name),
    Str(String),
    Num(f64),
}

#[derive(Clone,PartialEq,Debug)]
pub enum Expr {
    Ident(Name),
    Lit(Lit),
    This,
    Array(Vec<Expr>),
    Object(Vec<(PropKey, Expr)>),
    Function(Rc<Function>),
    Arrow(Rc<Arrow>),
    Call(Box<Expr>, Vec<Expr>),
    New(Box<Expr>, Vec<Expr>),
    /// Non-computed members hold their property as `Expr::Ident`.
    Member(Box<Expr>, Box<Expr>, bool),
    Assign(AssignOp, Box<Expr>, Box<Expr>),
    Logical(LogicalOp, Box<Expr>, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Update(UpdateOp, bool/*prefix*/, Box<Expr>),
    Conditional(Box<Expr>, Box<Expr>, Box<Expr>),
    Sequence(Vec<Expr>),
}

#[derive(Clone,Copy,PartialEq,Eq,Debug)]
pub enum AssignOp {
    Assign,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Shl,
    Shr,
    UShr,
    BitAnd,
    BitOr,
    BitXor,
}

#[derive(Clone,Copy,PartialEq,Eq,Debug)]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Clone,Copy,PartialEq,Eq,Debug)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Shl,
    Shr,
    UShr,
    BitAnd,
    BitOr,
    BitXor,
    In,
    InstanceOf,
}

#[derive(Clone,Copy,PartialEq,Eq,Debug)]
pub enum UnaryOp {
    Not,
    Neg,
    Plus,
    BitNot,
    TypeOf,
    Void,
    Delete,
}

#[derive(Clone,Copy,PartialEq,Eq,Debug)]
pub enum UpdateOp {
    Inc,
    Dec,
}

impl VarKind {
    pub fn as_str(self) -> &'static str {
        match self {
            VarKind::Var => "var",
            VarKind::Let => "let",
            VarKind::Const => "const",
        }
    }
}

impl AssignOp {
    pub fn as_str(self) -> &'static str {
        match self {
            AssignOp::Assign => "=",
            AssignOp::Add => "+=",
            AssignOp::Sub => "-=",
            AssignOp::Mul => "*=",
            AssignOp::Div => "/=",
            AssignOp::Rem => "%=",
            AssignOp::Shl => "<<=",
            AssignOp::Shr => ">>=",
            AssignOp::UShr => ">>>=",
            AssignOp::BitAnd => "&=",
            AssignOp::BitOr => "|=",
            AssignOp::BitXor => "^=",
        }
    }
    /// The binary operator a compound assignment applies, None for plain `=`.
    pub fn binary(self) -> Option<BinaryOp> {
        match self {
            AssignOp::Assign => None,
            AssignOp::Add => Some(BinaryOp::Add),
            AssignOp::Sub => Some(BinaryOp::Sub),
            AssignOp::Mul => Some(BinaryOp::Mul),
            AssignOp::Div => Some(BinaryOp::Div),
            AssignOp::Rem => Some(BinaryOp::Rem),
            AssignOp::Shl => Some(BinaryOp::Shl),
            AssignOp::Shr => Some(BinaryOp::Shr),
            AssignOp::UShr => Some(BinaryOp::UShr),
            AssignOp::BitAnd => Some(BinaryOp::BitAnd),
            AssignOp::BitOr => Some(BinaryOp::BitOr),
            AssignOp::BitXor => Some(BinaryOp::BitXor),
        }
    }
}

impl LogicalOp {
    pub fn as_str(self) -> &'static str {
        match self {
            LogicalOp::And => "&&",
            LogicalOp::Or => "||",
        }
    }
}

impl BinaryOp {
    pub fn as_str(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::StrictEq => "===",
            BinaryOp::StrictNotEq => "!==",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::UShr => ">>>",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::In => "in",
            BinaryOp::InstanceOf => "instanceof",
        }
    }
}

impl UnaryOp {
    pub fn as_str(self) -> &'static str {
        match self {
            UnaryOp::Not => "!",
            UnaryOp::Neg => "-",
            UnaryOp::Plus => "+",
            UnaryOp::BitNot => "~",
            UnaryOp::TypeOf => "typeof",
            UnaryOp::Void => "void",
            UnaryOp::Delete => "delete",
        }
    }
}

impl UpdateOp {
    pub fn as_str(self) -> &'static str {
        match self {
            UpdateOp::Inc => "++",
            UpdateOp::Dec => "--",
        }
    }
}

impl Expr {
    pub fn ident(name: &str) -> Self {
        Expr::Ident(name.to_string())
    }
    pub fn str(value: &str) -> Self {
        Expr::Lit(Lit::Str(value.to_string()))
    }
    pub fn call(callee: Expr, args: Vec<Expr>) -> Self {
        Expr::Call(Box::new(callee), args)
    }
    /// Non-computed member access, `object.name`
    pub fn dot(object: Expr, name: &str) -> Self {
        Expr::Member(Box::new(object), Box::new(Expr::ident(name)), false)
    }
    pub fn assign(left: Expr, right: Expr) -> Self {
        Expr::Assign(AssignOp::Assign, Box::new(left), Box::new(right))
    }
    pub fn arrow(params: Vec<Name>, body: Expr) -> Self {
        Expr::Arrow(Rc::new(Arrow{params, body: ArrowBody::Expr(body)}))
    }
    pub fn as_ident(&self) -> Option<&str> {
        match self {
            Expr::Ident(name) => Some(name),
            _ => None
        }
    }
    pub fn as_function(&self) -> Option<&Function> {
        match self {
            Expr::Function(f) => Some(&**f),
            _ => None
        }
    }
}

impl Stmt {
    pub fn var(kind: VarKind, id: &str, init: Expr) -> Self {
        Stmt::Var(VarDecl {
            kind,
            declarations: vec![Declarator{id: id.to_string(), init: Some(init)}],
        })
    }
}

pub fn is_ident_start(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_' || ch == '$'
}

pub fn is_ident_char(ch: char) -> bool {
    is_ident_start(ch) || ch.is_ascii_digit()
}

pub const RESERVED: &[&str] = &[
    "break", "case", "catch", "const", "continue", "default", "delete", "do", "else",
    "false", "finally", "for", "function", "if", "in", "instanceof", "let", "new",
    "null", "return", "switch", "this", "throw", "true", "try", "typeof", "var",
    "void", "while",
];

pub fn is_reserved(word: &str) -> bool {
    RESERVED.contains(&word)
}
