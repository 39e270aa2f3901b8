use crate::solver::tree_matcher::*;
use crate::solver::tree_matcher::Pattern::Wildcard;

/// The shapes the two transforms take in a player script.
///
/// Only structure that survives obfuscation rounds is pinned down: parameter
/// counts, statement positions and operator tokens. Names are never constrained.
pub struct Catalog {
    /// `var a = [b]` or `a = [b]`
    pub n_alias: Pattern,
    /// One-parameter function, in any of its three spellings.
    pub n_function: Pattern,
    /// Catch body `return x[0] + a` (or `return x + a`)
    pub n_guard: Pattern,
    /// Three-parameter function, in any of its three spellings.
    pub sig_function: Pattern,
    /// `c && (c = f(decode(c)), g())`
    pub sig_guard: Pattern,
}

fn ident() -> Pattern {
    kind(Kind::Identifier)
}

/// Array literal holding exactly one bare identifier
fn single_ident_array() -> Pattern {
    node(Kind::ArrayExpression, vec![(Field::Elements, seq(vec![ident()]))])
}

fn arity(count: usize) -> Pattern {
    seq(vec![present(); count])
}

/// `function f(a,..){}`, `f = function(a,..){}` and `var f = function(a,..){}`
fn function_shape(params: usize) -> Pattern {
    let function_expr = node(Kind::FunctionExpression, vec![(Field::Params, arity(params))]);
    or(vec![
        node(Kind::FunctionDeclaration, vec![(Field::Params, arity(params))]),
        node(Kind::ExpressionStatement, vec![
            (Field::Expression, node(Kind::AssignmentExpression, vec![
                (Field::Operator, text("=")),
                (Field::Left, ident()),
                (Field::Right, function_expr.clone()),
            ])),
        ]),
        node(Kind::VariableDeclaration, vec![
            (Field::Declarations, anykey(vec![
                node(Kind::VariableDeclarator, vec![
                    (Field::Id, ident()),
                    (Field::Init, function_expr),
                ]),
            ])),
        ]),
    ])
}

fn n_alias() -> Pattern {
    or(vec![
        node(Kind::VariableDeclaration, vec![
            (Field::Kind, text("var")),
            (Field::Declarations, anykey(vec![
                node(Kind::VariableDeclarator, vec![
                    (Field::Id, ident()),
                    (Field::Init, single_ident_array()),
                ]),
            ])),
        ]),
        node(Kind::ExpressionStatement, vec![
            (Field::Expression, node(Kind::AssignmentExpression, vec![
                (Field::Left, ident()),
                (Field::Operator, text("=")),
                (Field::Right, single_ident_array()),
            ])),
        ]),
    ])
}

fn n_guard() -> Pattern {
    let indexed = node(Kind::MemberExpression, vec![
        (Field::Object, ident()),
        (Field::Computed, flag(true)),
        (Field::Property, kind(Kind::Literal)),
        (Field::Optional, flag(false)),
    ]);
    node(Kind::TryStatement, vec![
        (Field::Handler, node(Kind::CatchClause, vec![
            (Field::Body, seq(vec![
                node(Kind::ReturnStatement, vec![
                    (Field::Argument, node(Kind::BinaryExpression, vec![
                        (Field::Left, or(vec![indexed, ident()])),
                        (Field::Operator, text("+")),
                        (Field::Right, ident()),
                    ])),
                ]),
            ])),
        ])),
    ])
}

fn sig_guard() -> Pattern {
    let decode = node(Kind::CallExpression, vec![
        (Field::Callee, ident()),
        (Field::Arguments, seq(vec![ident()])),
        (Field::Optional, flag(false)),
    ]);
    node(Kind::ExpressionStatement, vec![
        (Field::Expression, node(Kind::LogicalExpression, vec![
            (Field::Left, ident()),
            (Field::Operator, text("&&")),
            (Field::Right, node(Kind::SequenceExpression, vec![
                (Field::Expressions, seq(vec![
                    node(Kind::AssignmentExpression, vec![
                        (Field::Left, ident()),
                        (Field::Operator, text("=")),
                        (Field::Right, node(Kind::CallExpression, vec![
                            (Field::Callee, ident()),
                            (Field::Arguments, or(vec![
                                seq(vec![kind(Kind::Literal), decode.clone()]),
                                seq(vec![decode]),
                            ])),
                            (Field::Optional, flag(false)),
                        ])),
                    ]),
                    node(Kind::CallExpression, vec![(Field::Callee, Wildcard)]),
                ])),
            ])),
        ])),
    ])
}

impl Catalog {
    pub fn new() -> Self {
        Catalog {
            n_alias: n_alias(),
            n_function: function_shape(1),
            n_guard: n_guard(),
            sig_function: function_shape(3),
            sig_guard: sig_guard(),
        }
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Catalog::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::js::parse::parse;

    fn stmt_matches(text: &str, pattern: &Pattern) -> bool {
        let program = parse(text).unwrap();
        matches(Node::Stmt(&program.body[0]), pattern)
    }

    #[test]
    fn alias_shapes() {
        let catalog = Catalog::new();
        assert!(stmt_matches("var a = [b];", &catalog.n_alias));
        assert!(stmt_matches("var x = 1, a = [b];", &catalog.n_alias));
        assert!(stmt_matches("a = [b];", &catalog.n_alias));
        assert!(!stmt_matches("let a = [b];", &catalog.n_alias));
        assert!(!stmt_matches("var a = [b, c];", &catalog.n_alias));
        assert!(!stmt_matches("var a = [1];", &catalog.n_alias));
        assert!(!stmt_matches("a.b = [c];", &catalog.n_alias));
    }

    #[test]
    fn function_shapes_count_params() {
        let catalog = Catalog::new();
        assert!(stmt_matches("function f(a) {}", &catalog.n_function));
        assert!(stmt_matches("f = function(a) {};", &catalog.n_function));
        assert!(stmt_matches("var f = function(a) {};", &catalog.n_function));
        assert!(!stmt_matches("function f(a, b) {}", &catalog.n_function));
        assert!(!stmt_matches("f.g = function(a) {};", &catalog.n_function));
        assert!(stmt_matches("function f(a, b, c) {}", &catalog.sig_function));
        assert!(stmt_matches("var x = 1, f = function(a, b, c) {};", &catalog.sig_function));
        assert!(!stmt_matches("var f = function(a, b) {};", &catalog.sig_function));
    }

    #[test]
    fn decoy_guard() {
        let catalog = Catalog::new();
        assert!(stmt_matches("try { b() } catch (c) { return d[0] + a; }", &catalog.n_guard));
        assert!(stmt_matches("try { b() } catch (c) { return d + a; }", &catalog.n_guard));
        assert!(!stmt_matches("try { b() } catch (c) { return d.e + a; }", &catalog.n_guard));
        assert!(!stmt_matches("try { b() } catch (c) { log(c); return d[0] + a; }", &catalog.n_guard));
        assert!(!stmt_matches("try { b() } catch (c) { return a; }", &catalog.n_guard));
    }

    #[test]
    fn signature_guard() {
        let catalog = Catalog::new();
        assert!(stmt_matches("c && (c = Xy(decodeURIComponent(c)), a.set(b, encodeURIComponent(c)));", &catalog.sig_guard));
        assert!(stmt_matches("c && (c = Xy(12, decodeURIComponent(c)), a.set(b, c));", &catalog.sig_guard));
        assert!(!stmt_matches("c && (c = Xy(c), a.set(b, c));", &catalog.sig_guard));
        assert!(!stmt_matches("c || (c = Xy(decodeURIComponent(c)), a.set(b, c));", &catalog.sig_guard));
        assert!(!stmt_matches("c && (c = Xy(decodeURIComponent(c)));", &catalog.sig_guard));
    }
}
