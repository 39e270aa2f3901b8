pub mod builtins;
pub mod interp;
pub mod value;

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use log::{debug,info};
use crate::js::ast::Pos;
use crate::js::parse::parse;
use crate::sandbox::interp::{describe,Fault,Interpreter};
use crate::sandbox::value::{Object,Value};
use crate::solver::{TransformKind,RESULT_BINDING};

#[derive(Debug,PartialEq)]
pub enum EvaluationError {
    Syntax{pos: Pos},
    /// An uncaught script exception, described as `name: message`
    Thrown(String),
    Fatal(String),
    /// A result slot holding something other than a function or null
    NotCallable(TransformKind, String),
    /// A transform that returned something other than a string
    NotAString(TransformKind, String),
}

impl fmt::Display for EvaluationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EvaluationError::Syntax{pos} => write!(f, "syntax error {} bytes before end of input", pos),
            EvaluationError::Thrown(e) => write!(f, "uncaught {}", e),
            EvaluationError::Fatal(e) => write!(f, "{}", e),
            EvaluationError::NotCallable(kind, v) => write!(f, "{} is not a function: {}", kind, v),
            EvaluationError::NotAString(kind, v) => write!(f, "{} returned a non-string: {}", kind, v),
        }
    }
}

impl std::error::Error for EvaluationError {}

impl From<Fault> for EvaluationError {
    fn from(f: Fault) -> Self {
        match f {
            Fault::Throw(v) => EvaluationError::Thrown(describe(&v)),
            Fault::Fatal(m) => EvaluationError::Fatal(m),
        }
    }
}

/// One transform, bound to the interpreter that defined it.
pub struct Solver {
    kind: TransformKind,
    interp: Rc<RefCell<Interpreter>>,
    func: Value,
}

impl Solver {
    pub fn kind(&self) -> TransformKind {
        self.kind
    }

    pub fn call(&self, input: &str) -> Result<String,EvaluationError> {
        let result = self.interp.borrow_mut().call(&self.func, Value::Undefined, vec![Value::str(input)])?;
        match result {
            Value::Str(s) => Ok(s.to_string()),
            other => Err(EvaluationError::NotAString(self.kind, format!("{:?}", other))),
        }
    }
}

impl fmt::Debug for Solver {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Solver({})", self.kind)
    }
}

/// The callables a reduced program populated. Either may be absent.
#[derive(Debug)]
pub struct SolverPair {
    pub n: Option<Solver>,
    pub sig: Option<Solver>,
}

impl SolverPair {
    pub fn get(&self, kind: TransformKind) -> Option<&Solver> {
        match kind {
            TransformKind::N => self.n.as_ref(),
            TransformKind::Sig => self.sig.as_ref(),
        }
    }
}

fn slot(interp: &Rc<RefCell<Interpreter>>, record: &Value, kind: TransformKind) -> Result<Option<Solver>,EvaluationError> {
    let value = interp.borrow_mut().get_property(record, kind.name())?;
    match value {
        Value::Null => Ok(None),
        f if f.is_function() => Ok(Some(Solver{kind, interp: interp.clone(), func: f})),
        other => Err(EvaluationError::NotCallable(kind, format!("{:?}", other))),
    }
}

/// Runs a reduced program in a fresh interpreter and collects the callables
/// it assigned to the result record.
pub fn evaluate(text: &str) -> Result<SolverPair,EvaluationError> {
    let program = parse(text).map_err(|e|EvaluationError::Syntax{pos: e.pos})?;
    let record = Object::plain();
    record.borrow_mut().set(TransformKind::N.name(), Value::Null);
    record.borrow_mut().set(TransformKind::Sig.name(), Value::Null);
    let record = Value::Object(record);

    let interp = Rc::new(RefCell::new(Interpreter::new()));
    interp.borrow_mut().bind(RESULT_BINDING, record.clone());
    interp.borrow_mut().run(&program)?;
    debug!("program ran");

    let pair = SolverPair {
        n: slot(&interp, &record, TransformKind::N)?,
        sig: slot(&interp, &record, TransformKind::Sig)?,
    };
    info!("evaluated: n {}, sig {}",
        if pair.n.is_some() { "present" } else { "absent" },
        if pair.sig.is_some() { "present" } else { "absent" });
    Ok(pair)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use crate::solver::compile;

    #[test]
    fn populated_slots() {
        let pair = evaluate("_result.n = n => n.split('').reverse().join(''); _result.sig = function(s) { return s + '!'; };").unwrap();
        assert_eq!(pair.n.as_ref().unwrap().call("abc"), Ok("cba".to_string()));
        assert_eq!(pair.sig.as_ref().unwrap().call("x"), Ok("x!".to_string()));
        assert_eq!(pair.get(TransformKind::Sig).map(|s|s.kind()), Some(TransformKind::Sig));
    }

    #[test]
    fn absent_slots() {
        let pair = evaluate("var unrelated = 1;").unwrap();
        assert!(pair.n.is_none());
        assert!(pair.sig.is_none());
    }

    #[test]
    fn non_function_slot() {
        match evaluate("_result.n = 5;") {
            Err(EvaluationError::NotCallable(TransformKind::N, _)) => {}
            other => panic!("unexpected {:?}", other.map(|_|())),
        }
    }

    #[test]
    fn unpopulated_stand_in_field() {
        let text = "var self = this; var x = self.extra.field; _result.n = n => n;";
        match evaluate(text) {
            Err(EvaluationError::Thrown(e)) => assert!(e.starts_with("TypeError")),
            other => panic!("unexpected {:?}", other.map(|_|())),
        }
    }

    #[test]
    fn syntax_error() {
        match evaluate("_result.n = ;") {
            Err(EvaluationError::Syntax{..}) => {}
            other => panic!("unexpected {:?}", other.map(|_|())),
        }
    }

    #[test]
    fn state_persists_between_calls() {
        let pair = evaluate("var k = 0; _result.n = n => n + (k++);").unwrap();
        let n = pair.n.unwrap();
        assert_eq!(n.call("a"), Ok("a0".to_string()));
        assert_eq!(n.call("a"), Ok("a1".to_string()));
    }

    #[test]
    fn evaluations_do_not_share_globals() {
        let first = evaluate("var self = this; self.leak = 1; var kept = 2; _result.n = n => n + self.leak + kept;").unwrap();
        assert_eq!(first.n.as_ref().unwrap().call("a"), Ok("a12".to_string()));
        let second = evaluate("var self = this; _result.n = n => n + self.leak + ',' + typeof kept;").unwrap();
        assert_eq!(second.n.unwrap().call("a"), Ok("aundefined,undefined".to_string()));
        assert_eq!(first.n.unwrap().call("b"), Ok("b12".to_string()));
    }

    #[test]
    fn failures_inside_a_transform() {
        let pair = evaluate("_result.n = n => missing(n); _result.sig = s => s.length;").unwrap();
        match pair.n.unwrap().call("a") {
            Err(EvaluationError::Thrown(e)) => assert_eq!(e, "ReferenceError: missing is not defined"),
            other => panic!("unexpected {:?}", other),
        }
        match pair.sig.unwrap().call("abc") {
            Err(EvaluationError::NotAString(TransformKind::Sig, v)) => assert_eq!(v, "3"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn runaway_recursion() {
        let pair = evaluate("function f(s) { return f(s); } _result.n = f;").unwrap();
        match pair.n.unwrap().call("a") {
            Err(EvaluationError::Fatal(_)) => {}
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn compiled_player_end_to_end() {
        let player = "var _yt_player = {}; (function(g) { \
            var window = this; \
            var Ja = function(a) { var b = a.split(''); try { b.reverse() } catch (c) { return q[0] + a; } return b.join(''); }; \
            var Ka = [Ja]; \
            var Mb = function(a) { return a.split('').slice(1).join(''); }; \
            function Nb(a, b, c) { c && (c = Mb(decodeURIComponent(c)), a.set(b, encodeURIComponent(c))); return a; } \
            g.noise(); \
            })(_yt_player);";
        let reduced = compile(player).unwrap();
        let pair = evaluate(&reduced).unwrap();
        assert_eq!(pair.n.unwrap().call("abcd"), Ok("dcba".to_string()));
        assert_eq!(pair.sig.unwrap().call("abcd"), Ok("bcd".to_string()));
    }
}
