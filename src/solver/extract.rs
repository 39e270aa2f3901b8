use std::fmt;
use log::{debug,warn};
use crate::js::ast::*;
use crate::js::print::print_expr;
use crate::solver::catalog::Catalog;
use crate::solver::tree_matcher::{matches,Node};

#[derive(Clone,Copy,PartialEq,Eq,Hash,Debug)]
pub enum TransformKind {
    N,
    Sig,
}

impl TransformKind {
    pub const ALL: [TransformKind;2] = [TransformKind::N, TransformKind::Sig];

    /// Slot name in the result record, and the wrapper's parameter name.
    pub fn name(self) -> &'static str {
        match self {
            TransformKind::N => "n",
            TransformKind::Sig => "sig",
        }
    }
}

impl fmt::Display for TransformKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// How to invoke a transform found in the script: call `callee` with the
/// `leading` arguments followed by the input token.
#[derive(Clone,PartialEq,Debug)]
pub struct Candidate {
    pub kind: TransformKind,
    pub callee: Name,
    pub leading: Vec<Expr>,
}

impl Candidate {
    fn new(kind: TransformKind, callee: &str, leading: Vec<Expr>) -> Self {
        Candidate{kind, callee: callee.to_string(), leading}
    }

    /// The one-parameter arrow function, e.g. `sig => Xy(12, sig)`
    pub fn wrapper(&self) -> Expr {
        let param = self.kind.name();
        let mut args = self.leading.clone();
        args.push(Expr::ident(param));
        Expr::arrow(vec![param.to_string()], Expr::call(Expr::ident(&self.callee), args))
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", print_expr(&self.wrapper()))
    }
}

/// Every function a statement defines with exactly `arity` parameters, with
/// the name it is bound to. Covers declarations, `f = function..` and each
/// suitable declarator of a `var` chain.
fn defined_functions(stmt: &Stmt, arity: usize) -> Vec<(&str, &Function)> {
    match stmt {
        Stmt::Function(f) if f.params.len() == arity => f.id.as_deref().map(|id|(id, &**f)).into_iter().collect(),
        Stmt::Expr(Expr::Assign(AssignOp::Assign, left, right)) => {
            match (left.as_ident(), right.as_function()) {
                (Some(name), Some(f)) if f.params.len() == arity => vec![(name, f)],
                _ => vec![]
            }
        }
        Stmt::Var(decl) => decl.declarations.iter().filter_map(|d| {
            let f = d.init.as_ref()?.as_function()?;
            if f.params.len() == arity {
                Some((d.id.as_str(), f))
            } else {
                None
            }
        }).collect(),
        _ => vec![]
    }
}

fn second_to_last(body: &[Stmt]) -> Option<&Stmt> {
    if body.len() < 2 {
        None
    } else {
        Some(&body[body.len() - 2])
    }
}

/// The identifier held by a single-element array initialiser.
fn aliased(stmt: &Stmt) -> Option<&str> {
    fn single(e: &Expr) -> Option<&str> {
        match e {
            Expr::Array(items) if items.len() == 1 => items[0].as_ident(),
            _ => None
        }
    }
    match stmt {
        Stmt::Var(decl) => decl.declarations.iter().find_map(|d|single(d.init.as_ref()?)),
        Stmt::Expr(Expr::Assign(AssignOp::Assign, _, right)) => single(right),
        _ => None
    }
}

/// The right operand of the decoy `return x[0] + a` in a try statement's catch body.
fn decoy_operand(stmt: &Stmt) -> Option<&str> {
    match stmt {
        Stmt::Try(TryStmt{handler: Some(handler), ..}) => match handler.body.as_slice() {
            [Stmt::Return(Some(Expr::Binary(BinaryOp::Add, _, right)))] => right.as_ident(),
            _ => None
        },
        _ => None
    }
}

pub fn extract_n(stmt: &Stmt, catalog: &Catalog) -> Option<Candidate> {
    if matches(Node::Stmt(stmt), &catalog.n_alias) {
        let target = aliased(stmt)?;
        debug!("n alias of {}", target);
        return Some(Candidate::new(TransformKind::N, target, vec![]));
    }
    if !matches(Node::Stmt(stmt), &catalog.n_function) {
        return None;
    }
    for (name, function) in defined_functions(stmt, 1) {
        let guard = match second_to_last(&function.body) {
            Some(guard) if matches(Node::Stmt(guard), &catalog.n_guard) => guard,
            _ => continue,
        };
        // the decoy appends the function's own argument
        if decoy_operand(guard) != Some(function.params[0].as_str()) {
            warn!("{} has a guard that does not return its argument", name);
            continue;
        }
        debug!("n function {}", name);
        return Some(Candidate::new(TransformKind::N, name, vec![]));
    }
    None
}

/// The call inside `c && (c = f(..), g())`
fn guarded_call(stmt: &Stmt) -> Option<(&str, &[Expr])> {
    match stmt {
        Stmt::Expr(Expr::Logical(_, _, right)) => match &**right {
            Expr::Sequence(items) => match items.first()? {
                Expr::Assign(_, _, value) => match &**value {
                    Expr::Call(callee, args) => Some((callee.as_ident()?, args.as_slice())),
                    _ => None
                },
                _ => None
            },
            _ => None
        },
        _ => None
    }
}

pub fn extract_sig(stmt: &Stmt, catalog: &Catalog) -> Option<Candidate> {
    if !matches(Node::Stmt(stmt), &catalog.sig_function) {
        return None;
    }
    for (name, function) in defined_functions(stmt, 3) {
        let guard = match second_to_last(&function.body) {
            Some(guard) if matches(Node::Stmt(guard), &catalog.sig_guard) => guard,
            _ => continue,
        };
        let (callee, args) = match guarded_call(guard) {
            Some(call) => call,
            None => continue,
        };
        let leading = match args {
            [_] => vec![],
            [first, _] => vec![first.clone()],
            _ => continue
        };
        debug!("sig guard in {} calls {}", name, callee);
        return Some(Candidate::new(TransformKind::Sig, callee, leading));
    }
    None
}

pub fn extract(kind: TransformKind, stmt: &Stmt, catalog: &Catalog) -> Option<Candidate> {
    match kind {
        TransformKind::N => extract_n(stmt, catalog),
        TransformKind::Sig => extract_sig(stmt, catalog),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use crate::js::parse::parse;

    fn first_stmt(text: &str) -> Stmt {
        parse(text).unwrap().body.remove(0)
    }

    fn n_wrapper(text: &str) -> Option<String> {
        extract_n(&first_stmt(text), &Catalog::new()).map(|c|c.to_string())
    }

    fn sig_wrapper(text: &str) -> Option<String> {
        extract_sig(&first_stmt(text), &Catalog::new()).map(|c|c.to_string())
    }

    #[test]
    fn n_from_alias() {
        assert_eq!(n_wrapper("var a = [b];"), Some("n => b(n)".to_string()));
        assert_eq!(n_wrapper("var z = 3, a = [qR];"), Some("n => qR(n)".to_string()));
        assert_eq!(n_wrapper("a = [b];"), Some("n => b(n)".to_string()));
        assert_eq!(n_wrapper("var a = [b, c];"), None);
    }

    #[test]
    fn n_from_guarded_function() {
        let decl = "function Xq(a) { var b = a.split(''); try { b.reverse() } catch (c) { return y[3] + a; } return b.join(''); }";
        assert_eq!(n_wrapper(decl), Some("n => Xq(n)".to_string()));
        let assigned = "Xq = function(a) { var b = 1; try { f() } catch (c) { return y + a; } return b; };";
        assert_eq!(n_wrapper(assigned), Some("n => Xq(n)".to_string()));
        let declared = "var Xq = function(a) { try { f() } catch (c) { return y[0] + a; } return a; };";
        assert_eq!(n_wrapper(declared), Some("n => Xq(n)".to_string()));
    }

    #[test]
    fn guarded_function_later_in_var_chain() {
        let chain = "var Ha = function(a) { return a; }, Ja = function(a) { try { x() } catch (c) { return y[0] + a; } return a; };";
        assert_eq!(n_wrapper(chain), Some("n => Ja(n)".to_string()));
        let sig_chain = "var Vt = function(a, b, c) { return a; }, Wt = function(a, b, c) { c && (c = Ry(decodeURIComponent(c)), a.set(b, c)); return a; };";
        assert_eq!(sig_wrapper(sig_chain), Some("sig => Ry(sig)".to_string()));
    }

    #[test]
    fn unrelated_try_is_not_n() {
        let logging = "function Xq(a) { try { f() } catch (c) { console.log(c); } return a; }";
        assert_eq!(n_wrapper(logging), None);
        let wrong_position = "function Xq(a) { try { f() } catch (c) { return y[0] + a; } g(); return a; }";
        assert_eq!(n_wrapper(wrong_position), None);
        let other_operand = "function Xq(a) { try { f() } catch (c) { return y[0] + c; } return a; }";
        assert_eq!(n_wrapper(other_operand), None);
        let two_params = "function Xq(a, d) { try { f() } catch (c) { return y[0] + a; } return a; }";
        assert_eq!(n_wrapper(two_params), None);
    }

    #[test]
    fn sig_with_one_argument() {
        let text = "Wt = function(a, b, c) { a = 1; c && (c = Ry(decodeURIComponent(c)), a.set(b, encodeURIComponent(c))); return a; };";
        assert_eq!(sig_wrapper(text), Some("sig => Ry(sig)".to_string()));
    }

    #[test]
    fn sig_keeps_first_argument() {
        let text = "function Wt(a, b, c) { c && (c = Ry(47, decodeURIComponent(c)), a.set(b, c)); return a; }";
        assert_eq!(sig_wrapper(text), Some("sig => Ry(47, sig)".to_string()));
        let declared = "var q = 0, Wt = function(a, b, c) { c && (c = Ry('k', unescape(c)), a.set(b, c)); return a; };";
        assert_eq!(sig_wrapper(declared), Some("sig => Ry(\"k\", sig)".to_string()));
    }

    #[test]
    fn sig_rejects_other_shapes() {
        assert_eq!(sig_wrapper("function Wt(a, b) { c && (c = Ry(decodeURIComponent(c)), a.set(b, c)); return a; }"), None);
        assert_eq!(sig_wrapper("function Wt(a, b, c) { c && (c = Ry(decodeURIComponent(c)), a.set(b, c)); }"), None);
        assert_eq!(sig_wrapper("function Wt(a, b, c) { c && (c = Ry(c), a.set(b, c)); return a; }"), None);
        assert_eq!(sig_wrapper("var a = [b];"), None);
    }

    #[test]
    fn identical_candidates_are_equal() {
        let catalog = Catalog::new();
        let a = extract_n(&first_stmt("var a = [b];"), &catalog);
        let b = extract_n(&first_stmt("c = [b];"), &catalog);
        assert_eq!(a, b);
        assert_eq!(a.map(|c|c.wrapper()), b.map(|c|c.wrapper()));
    }
}
