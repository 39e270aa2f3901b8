use log::trace;
use crate::js::ast::*;

/// This matches syntax trees against declarative shapes.
///
/// A pattern only says something about the fields it names, so a pattern for
/// `Identifier` matches every identifier whatever its name, and a pattern for a
/// call that names only `callee` doesn't care about the arguments.
///
/// For example, the shape of `x = [y]` would be written as
/// - Exact ExpressionStatement
///   - expression: Exact AssignmentExpression
///     - operator: Literal "="
///     - left: Exact Identifier
///     - right: Exact ArrayExpression
///       - elements: Sequence [Exact Identifier]
///
/// and it would also match `a = [b]` or `foo = [bar]`, but not `a = [b, c]`
/// (sequences are positional and fixed length) nor `a += [b]`.
#[derive(Clone,PartialEq,Debug)]
pub enum Pattern {
    /// Node of the given kind (or any present node when None) whose named fields match.
    Exact(Option<Kind>, Vec<(Field, Pattern)>),
    /// Primitive equality. `Literal(Null)` also accepts a missing field.
    Literal(Lit),
    /// At least one alternative matches.
    Alternation(Vec<Pattern>),
    /// Every pattern matches some element of the node's children. Elements may be reused.
    Existential(Vec<Pattern>),
    /// Same length, matched position by position.
    Sequence(Vec<Pattern>),
    Wildcard,
}

#[derive(Clone,Copy,PartialEq,Eq,Hash,Debug)]
pub enum Kind {
    ExpressionStatement,
    VariableDeclaration,
    VariableDeclarator,
    FunctionDeclaration,
    ReturnStatement,
    IfStatement,
    BlockStatement,
    ForStatement,
    WhileStatement,
    SwitchStatement,
    SwitchCase,
    TryStatement,
    CatchClause,
    ThrowStatement,
    BreakStatement,
    ContinueStatement,
    EmptyStatement,
    Identifier,
    Literal,
    ThisExpression,
    ArrayExpression,
    ObjectExpression,
    Property,
    FunctionExpression,
    ArrowFunctionExpression,
    CallExpression,
    NewExpression,
    MemberExpression,
    AssignmentExpression,
    LogicalExpression,
    BinaryExpression,
    UnaryExpression,
    UpdateExpression,
    ConditionalExpression,
    SequenceExpression,
}

#[derive(Clone,Copy,PartialEq,Eq,Hash,Debug)]
pub enum Field {
    Alternate,
    Argument,
    Arguments,
    Block,
    Body,
    Callee,
    Cases,
    Computed,
    Consequent,
    Declarations,
    Discriminant,
    Elements,
    Expression,
    Expressions,
    Finalizer,
    Handler,
    Id,
    Init,
    Key,
    Kind,
    Left,
    Name,
    Object,
    Operator,
    Optional,
    Param,
    Params,
    Prefix,
    Properties,
    Property,
    Right,
    Test,
    Update,
    Value,
}

/// A read-only view of one position in a syntax tree: a node, a list of nodes or a primitive.
#[derive(Clone,Copy,Debug)]
pub enum Node<'a> {
    Stmt(&'a Stmt),
    Expr(&'a Expr),
    VarDecl(&'a VarDecl),
    Declarator(&'a Declarator),
    Catch(&'a CatchClause),
    Case(&'a SwitchCase),
    Property(&'a (PropKey, Expr)),
    /// Identifier in binding position: declarator ids, function names, params
    Binding(&'a str),
    Stmts(&'a [Stmt]),
    Exprs(&'a [Expr]),
    Declarators(&'a [Declarator]),
    Names(&'a [Name]),
    Cases(&'a [SwitchCase]),
    Properties(&'a [(PropKey, Expr)]),
    Str(&'a str),
    Num(f64),
    Bool(bool),
    Null,
    Absent,
}

fn opt_expr(e: &Option<Expr>) -> Node {
    e.as_ref().map_or(Node::Absent, Node::Expr)
}

fn opt_binding(name: &Option<Name>) -> Node {
    name.as_ref().map_or(Node::Absent, |n|Node::Binding(n))
}

fn lit_value(lit: &Lit) -> Node {
    match lit {
        Lit::Num(n) => Node::Num(*n),
        Lit::Str(s) => Node::Str(s),
        Lit::Bool(b) => Node::Bool(*b),
        Lit::Null => Node::Null,
    }
}

fn function_field(f: &Function, field: Field) -> Node {
    match field {
        Field::Id => opt_binding(&f.id),
        Field::Params => Node::Names(&f.params),
        Field::Body => Node::Stmts(&f.body),
        _ => Node::Absent,
    }
}

const FUNCTION_FIELDS: &[Field] = &[Field::Id, Field::Params, Field::Body];

impl<'a> Node<'a> {
    pub fn kind(&self) -> Option<Kind> {
        let kind = match self {
            Node::Stmt(s) => match s {
                Stmt::Expr(_) => Kind::ExpressionStatement,
                Stmt::Var(_) => Kind::VariableDeclaration,
                Stmt::Function(_) => Kind::FunctionDeclaration,
                Stmt::Return(_) => Kind::ReturnStatement,
                Stmt::If(_,_,_) => Kind::IfStatement,
                Stmt::Block(_) => Kind::BlockStatement,
                Stmt::For(_) => Kind::ForStatement,
                Stmt::While(_,_) => Kind::WhileStatement,
                Stmt::Switch(_,_) => Kind::SwitchStatement,
                Stmt::Try(_) => Kind::TryStatement,
                Stmt::Throw(_) => Kind::ThrowStatement,
                Stmt::Break => Kind::BreakStatement,
                Stmt::Continue => Kind::ContinueStatement,
                Stmt::Empty => Kind::EmptyStatement,
            },
            Node::Expr(e) => match e {
                Expr::Ident(_) => Kind::Identifier,
                Expr::Lit(_) => Kind::Literal,
                Expr::This => Kind::ThisExpression,
                Expr::Array(_) => Kind::ArrayExpression,
                Expr::Object(_) => Kind::ObjectExpression,
                Expr::Function(_) => Kind::FunctionExpression,
                Expr::Arrow(_) => Kind::ArrowFunctionExpression,
                Expr::Call(_,_) => Kind::CallExpression,
                Expr::New(_,_) => Kind::NewExpression,
                Expr::Member(_,_,_) => Kind::MemberExpression,
                Expr::Assign(_,_,_) => Kind::AssignmentExpression,
                Expr::Logical(_,_,_) => Kind::LogicalExpression,
                Expr::Binary(_,_,_) => Kind::BinaryExpression,
                Expr::Unary(_,_) => Kind::UnaryExpression,
                Expr::Update(_,_,_) => Kind::UpdateExpression,
                Expr::Conditional(_,_,_) => Kind::ConditionalExpression,
                Expr::Sequence(_) => Kind::SequenceExpression,
            },
            Node::VarDecl(_) => Kind::VariableDeclaration,
            Node::Declarator(_) => Kind::VariableDeclarator,
            Node::Catch(_) => Kind::CatchClause,
            Node::Case(_) => Kind::SwitchCase,
            Node::Property(_) => Kind::Property,
            Node::Binding(_) => Kind::Identifier,
            _ => return None,
        };
        Some(kind)
    }

    pub fn is_absent(&self) -> bool {
        match self {
            Node::Absent => true,
            _ => false
        }
    }

    /// The fields a node of this shape carries, in source order.
    fn field_names(&self) -> &'static [Field] {
        match self {
            Node::Stmt(s) => match s {
                Stmt::Expr(_) => &[Field::Expression],
                Stmt::Var(_) => &[Field::Kind, Field::Declarations],
                Stmt::Function(_) => FUNCTION_FIELDS,
                Stmt::Return(_) | Stmt::Throw(_) => &[Field::Argument],
                Stmt::If(_,_,_) => &[Field::Test, Field::Consequent, Field::Alternate],
                Stmt::Block(_) => &[Field::Body],
                Stmt::For(_) => &[Field::Init, Field::Test, Field::Update, Field::Body],
                Stmt::While(_,_) => &[Field::Test, Field::Body],
                Stmt::Switch(_,_) => &[Field::Discriminant, Field::Cases],
                Stmt::Try(_) => &[Field::Block, Field::Handler, Field::Finalizer],
                Stmt::Break | Stmt::Continue | Stmt::Empty => &[],
            },
            Node::Expr(e) => match e {
                Expr::Ident(_) => &[Field::Name],
                Expr::Lit(_) => &[Field::Value],
                Expr::This => &[],
                Expr::Array(_) => &[Field::Elements],
                Expr::Object(_) => &[Field::Properties],
                Expr::Function(_) => FUNCTION_FIELDS,
                Expr::Arrow(_) => &[Field::Params, Field::Body],
                Expr::Call(_,_) => &[Field::Callee, Field::Arguments, Field::Optional],
                Expr::New(_,_) => &[Field::Callee, Field::Arguments],
                Expr::Member(_,_,_) => &[Field::Object, Field::Property, Field::Computed, Field::Optional],
                Expr::Assign(_,_,_) | Expr::Logical(_,_,_) | Expr::Binary(_,_,_) => &[Field::Operator, Field::Left, Field::Right],
                Expr::Unary(_,_) | Expr::Update(_,_,_) => &[Field::Operator, Field::Prefix, Field::Argument],
                Expr::Conditional(_,_,_) => &[Field::Test, Field::Consequent, Field::Alternate],
                Expr::Sequence(_) => &[Field::Expressions],
            },
            Node::VarDecl(_) => &[Field::Kind, Field::Declarations],
            Node::Declarator(_) => &[Field::Id, Field::Init],
            Node::Catch(_) => &[Field::Param, Field::Body],
            Node::Case(_) => &[Field::Test, Field::Consequent],
            Node::Property(_) => &[Field::Key, Field::Value],
            Node::Binding(_) => &[Field::Name],
            _ => &[],
        }
    }

    /// Child at `field`, `Node::Absent` when this node has no such field.
    pub fn field(&self, field: Field) -> Node<'a> {
        match *self {
            Node::Stmt(s) => match (s, field) {
                (Stmt::Expr(e), Field::Expression) => Node::Expr(e),
                (Stmt::Var(d), _) => Node::VarDecl(d).field(field),
                (Stmt::Function(f), _) => function_field(f, field),
                (Stmt::Return(arg), Field::Argument) => opt_expr(arg),
                (Stmt::Throw(arg), Field::Argument) => Node::Expr(arg),
                (Stmt::If(test,_,_), Field::Test) => Node::Expr(test),
                (Stmt::If(_,cons,_), Field::Consequent) => Node::Stmt(cons),
                (Stmt::If(_,_,alt), Field::Alternate) => alt.as_ref().map_or(Node::Absent, |s|Node::Stmt(s)),
                (Stmt::Block(body), Field::Body) => Node::Stmts(body),
                (Stmt::For(f), Field::Init) => match &f.init {
                    Some(ForInit::Var(d)) => Node::VarDecl(d),
                    Some(ForInit::Expr(e)) => Node::Expr(e),
                    None => Node::Absent,
                },
                (Stmt::For(f), Field::Test) => opt_expr(&f.test),
                (Stmt::For(f), Field::Update) => opt_expr(&f.update),
                (Stmt::For(f), Field::Body) => Node::Stmt(&f.body),
                (Stmt::While(test,_), Field::Test) => Node::Expr(test),
                (Stmt::While(_,body), Field::Body) => Node::Stmt(body),
                (Stmt::Switch(disc,_), Field::Discriminant) => Node::Expr(disc),
                (Stmt::Switch(_,cases), Field::Cases) => Node::Cases(cases),
                (Stmt::Try(t), Field::Block) => Node::Stmts(&t.block),
                (Stmt::Try(t), Field::Handler) => t.handler.as_ref().map_or(Node::Absent, Node::Catch),
                (Stmt::Try(t), Field::Finalizer) => t.finalizer.as_ref().map_or(Node::Absent, |f|Node::Stmts(f)),
                _ => Node::Absent,
            },
            Node::Expr(e) => match (e, field) {
                (Expr::Ident(name), Field::Name) => Node::Str(name),
                (Expr::Lit(lit), Field::Value) => lit_value(lit),
                (Expr::Array(items), Field::Elements) => Node::Exprs(items),
                (Expr::Object(props), Field::Properties) => Node::Properties(props),
                (Expr::Function(f), _) => function_field(f, field),
                (Expr::Arrow(a), Field::Params) => Node::Names(&a.params),
                (Expr::Arrow(a), Field::Body) => match &a.body {
                    ArrowBody::Expr(body) => Node::Expr(body),
                    ArrowBody::Block(body) => Node::Stmts(body),
                },
                (Expr::Call(callee,_), Field::Callee) | (Expr::New(callee,_), Field::Callee) => Node::Expr(callee),
                (Expr::Call(_,args), Field::Arguments) | (Expr::New(_,args), Field::Arguments) => Node::Exprs(args),
                (Expr::Call(_,_), Field::Optional) | (Expr::Member(_,_,_), Field::Optional) => Node::Bool(false),
                (Expr::Member(object,_,_), Field::Object) => Node::Expr(object),
                (Expr::Member(_,property,_), Field::Property) => Node::Expr(property),
                (Expr::Member(_,_,computed), Field::Computed) => Node::Bool(*computed),
                (Expr::Assign(o,_,_), Field::Operator) => Node::Str(o.as_str()),
                (Expr::Logical(o,_,_), Field::Operator) => Node::Str(o.as_str()),
                (Expr::Binary(o,_,_), Field::Operator) => Node::Str(o.as_str()),
                (Expr::Unary(o,_), Field::Operator) => Node::Str(o.as_str()),
                (Expr::Update(o,_,_), Field::Operator) => Node::Str(o.as_str()),
                (Expr::Assign(_,left,_), Field::Left)
                    | (Expr::Logical(_,left,_), Field::Left)
                    | (Expr::Binary(_,left,_), Field::Left) => Node::Expr(left),
                (Expr::Assign(_,_,right), Field::Right)
                    | (Expr::Logical(_,_,right), Field::Right)
                    | (Expr::Binary(_,_,right), Field::Right) => Node::Expr(right),
                (Expr::Unary(_,arg), Field::Argument) | (Expr::Update(_,_,arg), Field::Argument) => Node::Expr(arg),
                (Expr::Unary(_,_), Field::Prefix) => Node::Bool(true),
                (Expr::Update(_,prefix,_), Field::Prefix) => Node::Bool(*prefix),
                (Expr::Conditional(test,_,_), Field::Test) => Node::Expr(test),
                (Expr::Conditional(_,cons,_), Field::Consequent) => Node::Expr(cons),
                (Expr::Conditional(_,_,alt), Field::Alternate) => Node::Expr(alt),
                (Expr::Sequence(items), Field::Expressions) => Node::Exprs(items),
                _ => Node::Absent,
            },
            Node::VarDecl(d) => match field {
                Field::Kind => Node::Str(d.kind.as_str()),
                Field::Declarations => Node::Declarators(&d.declarations),
                _ => Node::Absent,
            },
            Node::Declarator(d) => match field {
                Field::Id => Node::Binding(&d.id),
                Field::Init => opt_expr(&d.init),
                _ => Node::Absent,
            },
            Node::Catch(c) => match field {
                Field::Param => opt_binding(&c.param),
                Field::Body => Node::Stmts(&c.body),
                _ => Node::Absent,
            },
            Node::Case(c) => match field {
                Field::Test => opt_expr(&c.test),
                Field::Consequent => Node::Stmts(&c.body),
                _ => Node::Absent,
            },
            Node::Property((key,value)) => match field {
                Field::Key => match key {
                    PropKey::Ident(name) => Node::Binding(name),
                    PropKey::Str(s) => Node::Str(s),
                    PropKey::Num(n) => Node::Num(*n),
                },
                Field::Value => Node::Expr(value),
                _ => Node::Absent,
            },
            Node::Binding(name) => match field {
                Field::Name => Node::Str(name),
                _ => Node::Absent,
            },
            _ => Node::Absent,
        }
    }

    /// Elements, when this is a list.
    pub fn items(&self) -> Option<Vec<Node<'a>>> {
        let items: Vec<Node<'a>> = match *self {
            Node::Stmts(list) => list.iter().map(Node::Stmt).collect(),
            Node::Exprs(list) => list.iter().map(Node::Expr).collect(),
            Node::Declarators(list) => list.iter().map(Node::Declarator).collect(),
            Node::Names(list) => list.iter().map(|n|Node::Binding(n)).collect(),
            Node::Cases(list) => list.iter().map(Node::Case).collect(),
            Node::Properties(list) => list.iter().map(Node::Property).collect(),
            _ => return None,
        };
        Some(items)
    }

    /// What an existential pattern searches: list elements, or the values of a node's fields.
    fn haystack(&self) -> Vec<Node<'a>> {
        match self.items() {
            Some(items) => items,
            None => self.field_names().iter().map(|f|self.field(*f)).collect(),
        }
    }

    fn equals_literal(&self, lit: &Lit) -> bool {
        match (self, lit) {
            (Node::Str(a), Lit::Str(b)) => *a == b.as_str(),
            (Node::Num(a), Lit::Num(b)) => a == b,
            (Node::Bool(a), Lit::Bool(b)) => a == b,
            (Node::Null, Lit::Null) | (Node::Absent, Lit::Null) => true,
            _ => false
        }
    }
}

pub fn matches(node: Node, pattern: &Pattern) -> bool {
    match pattern {
        Pattern::Wildcard => true,
        Pattern::Literal(lit) => node.equals_literal(lit),
        Pattern::Alternation(options) => options.iter().any(|p|matches(node, p)),
        Pattern::Existential(required) => {
            if node.is_absent() {
                return false;
            }
            let haystack = node.haystack();
            required.iter().all(|p|haystack.iter().any(|el|matches(*el, p)))
        }
        Pattern::Sequence(patterns) => match node.items() {
            Some(items) => items.len() == patterns.len() && items.iter().zip(patterns).all(|(el,p)|matches(*el, p)),
            None => false,
        },
        Pattern::Exact(kind, fields) => {
            if node.is_absent() {
                return false;
            }
            if let Some(kind) = kind {
                if node.kind() != Some(*kind) {
                    trace!("kind mismatch: wanted {:?}, got {:?}", kind, node.kind());
                    return false;
                }
            }
            for (field,p) in fields {
                if !matches(node.field(*field), p) {
                    trace!("field {:?} of {:?} does not match", field, node.kind());
                    return false;
                }
            }
            true
        }
    }
}

////////////////
//
// Pattern building
//
////////////////

pub fn node(kind: Kind, fields: Vec<(Field, Pattern)>) -> Pattern {
    Pattern::Exact(Some(kind), fields)
}

/// Any present node, whatever its kind
pub fn present() -> Pattern {
    Pattern::Exact(None, vec![])
}

pub fn kind(kind: Kind) -> Pattern {
    Pattern::Exact(Some(kind), vec![])
}

pub fn text(s: &str) -> Pattern {
    Pattern::Literal(Lit::Str(s.to_string()))
}

pub fn flag(b: bool) -> Pattern {
    Pattern::Literal(Lit::Bool(b))
}

pub fn or(options: Vec<Pattern>) -> Pattern {
    Pattern::Alternation(options)
}

pub fn anykey(required: Vec<Pattern>) -> Pattern {
    Pattern::Existential(required)
}

pub fn seq(items: Vec<Pattern>) -> Pattern {
    Pattern::Sequence(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::js::parse::{parse,parse_expr};

    fn expr_matches(text: &str, pattern: &Pattern) -> bool {
        let e = parse_expr(text).unwrap();
        matches(Node::Expr(&e), pattern)
    }

    #[test]
    fn partial_field_match() {
        let literal = kind(Kind::Literal);
        assert!(expr_matches("1", &literal));
        assert!(expr_matches("'x'", &literal));
        assert!(expr_matches("null", &literal));
        assert!(!expr_matches("x", &literal));
    }

    #[test]
    fn declared_fields_are_checked() {
        let p = node(Kind::AssignmentExpression, vec![
            (Field::Operator, text("=")),
            (Field::Left, kind(Kind::Identifier)),
        ]);
        assert!(expr_matches("a = b(c)", &p));
        assert!(!expr_matches("a += 1", &p));
        assert!(!expr_matches("a.b = 1", &p));
    }

    #[test]
    fn identifier_names_can_be_pinned() {
        let p = node(Kind::Identifier, vec![(Field::Name, text("decodeURIComponent"))]);
        assert!(expr_matches("decodeURIComponent", &p));
        assert!(!expr_matches("encodeURIComponent", &p));
    }

    #[test]
    fn alternation_is_disjunction() {
        let p1 = kind(Kind::Identifier);
        let p2 = kind(Kind::Literal);
        let both = or(vec![p1.clone(), p2.clone()]);
        for text in &["a", "1", "a.b", "[a]", "f()"] {
            let e = parse_expr(text).unwrap();
            let n = Node::Expr(&e);
            assert_eq!(matches(n, &both), matches(n, &p1) || matches(n, &p2), "{}", text);
        }
    }

    #[test]
    fn existential_reuses_elements() {
        let p1 = kind(Kind::Identifier);
        let p2 = node(Kind::Identifier, vec![(Field::Name, text("a"))]);
        let p = anykey(vec![p1, p2]);
        // a single element satisfies both required patterns
        assert!(expr_matches("[a]", &node(Kind::ArrayExpression, vec![(Field::Elements, p.clone())])));
        assert!(!expr_matches("[b, 1]", &node(Kind::ArrayExpression, vec![(Field::Elements, p)])));
    }

    #[test]
    fn existential_over_node_fields() {
        let p = anykey(vec![kind(Kind::CallExpression)]);
        assert!(expr_matches("a + f()", &p));
        assert!(!expr_matches("a + b", &p));
    }

    #[test]
    fn sequences_are_positional() {
        let p = node(Kind::ArrayExpression, vec![(Field::Elements, seq(vec![kind(Kind::Identifier), kind(Kind::Literal)]))]);
        assert!(expr_matches("[a, 1]", &p));
        assert!(!expr_matches("[1, a]", &p));
        assert!(!expr_matches("[a, 1, 2]", &p));
        assert!(!expr_matches("[a]", &p));
    }

    #[test]
    fn absent_fields() {
        let program = parse("var a;").unwrap();
        let stmt = Node::Stmt(&program.body[0]);
        let declarators = stmt.field(Field::Declarations).items().unwrap();
        assert!(declarators[0].field(Field::Init).is_absent());
        assert!(matches(declarators[0], &node(Kind::VariableDeclarator, vec![(Field::Init, Pattern::Wildcard)])));
        assert!(matches(declarators[0], &node(Kind::VariableDeclarator, vec![(Field::Init, Pattern::Literal(Lit::Null))])));
        assert!(!matches(declarators[0], &node(Kind::VariableDeclarator, vec![(Field::Init, present())])));
        assert!(!matches(declarators[0], &node(Kind::VariableDeclarator, vec![(Field::Init, anykey(vec![]))])));
    }

    #[test]
    fn params_are_identifiers() {
        let program = parse("function f(a, b, c) {}").unwrap();
        let p = node(Kind::FunctionDeclaration, vec![
            (Field::Params, seq(vec![present(), present(), kind(Kind::Identifier)])),
            (Field::Id, node(Kind::Identifier, vec![(Field::Name, text("f"))])),
        ]);
        assert!(matches(Node::Stmt(&program.body[0]), &p));
    }
}
