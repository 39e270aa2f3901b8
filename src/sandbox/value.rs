use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use rustc_hash::FxHashMap;
use crate::js::ast::{Arrow,Function};
use crate::js::print::number_to_string;
use crate::sandbox::builtins::Builtin;
use crate::sandbox::interp::ScopeRef;

pub type ObjRef = Rc<RefCell<Object>>;

/// Arrays store elements densely up to this length. Larger indices are kept
/// as ordinary properties and larger explicit lengths are rejected.
pub const MAX_DENSE_LENGTH: usize = 1 << 24;

#[derive(Clone)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Num(f64),
    Str(Rc<str>),
    Object(ObjRef),
}

/// Something that can be invoked.
#[derive(Clone)]
pub enum Callable {
    /// Function declaration or expression, closing over the scope it was created in.
    Closure(Rc<Function>, ScopeRef),
    /// Arrow functions also capture `this`.
    Arrow(Rc<Arrow>, ScopeRef, Value),
    Native(Builtin),
}

pub enum ObjectKind {
    Plain,
    Array(Vec<Value>),
    Function(Callable),
}

pub struct Object {
    pub kind: ObjectKind,
    pub props: FxHashMap<String, Value>,
    pub proto: Option<ObjRef>,
}

impl Object {
    fn with_kind(kind: ObjectKind) -> ObjRef {
        Rc::new(RefCell::new(Object{kind, props: FxHashMap::default(), proto: None}))
    }

    pub fn plain() -> ObjRef {
        Object::with_kind(ObjectKind::Plain)
    }

    pub fn array(items: Vec<Value>) -> ObjRef {
        Object::with_kind(ObjectKind::Array(items))
    }

    pub fn function(callable: Callable) -> ObjRef {
        Object::with_kind(ObjectKind::Function(callable))
    }

    pub fn is_function(&self) -> bool {
        match self.kind {
            ObjectKind::Function(_) => true,
            _ => false
        }
    }

    /// Own property, including array elements and `length`.
    pub fn get_own(&self, key: &str) -> Option<Value> {
        if let ObjectKind::Array(items) = &self.kind {
            if key == "length" {
                return Some(Value::Num(items.len() as f64));
            }
            if let Some(v) = array_index(key).and_then(|i|items.get(i)) {
                return Some(v.clone());
            }
        }
        self.props.get(key).cloned()
    }

    /// Own property or one inherited through `proto`.
    pub fn lookup(&self, key: &str) -> Option<Value> {
        match self.get_own(key) {
            Some(v) => Some(v),
            None => self.proto.as_ref().and_then(|p|p.borrow().lookup(key)),
        }
    }

    pub fn set(&mut self, key: &str, value: Value) {
        if let ObjectKind::Array(items) = &mut self.kind {
            if key == "length" {
                let len = value.to_number();
                if len >= 0.0 && len.fract() == 0.0 {
                    if len <= MAX_DENSE_LENGTH as f64 {
                        items.resize(len as usize, Value::Undefined);
                    }
                    return;
                }
            }
            if let Some(i) = array_index(key).filter(|i|*i < MAX_DENSE_LENGTH) {
                if i >= items.len() {
                    items.resize(i + 1, Value::Undefined);
                }
                items[i] = value;
                return;
            }
        }
        self.props.insert(key.to_string(), value);
    }

    /// Whether assigning `value` to `key` would set an array length beyond the dense limit.
    pub fn rejects_length(&self, key: &str, value: &Value) -> bool {
        match self.kind {
            ObjectKind::Array(_) if key == "length" => value.to_number() > MAX_DENSE_LENGTH as f64,
            _ => false
        }
    }

    pub fn remove(&mut self, key: &str) {
        if let ObjectKind::Array(items) = &mut self.kind {
            if let Some(i) = array_index(key).filter(|i|*i < items.len()) {
                items[i] = Value::Undefined;
                return;
            }
        }
        self.props.remove(key);
    }
}

/// Canonical array index: digits without a leading zero.
pub fn array_index(key: &str) -> Option<usize> {
    if key.is_empty() || !key.bytes().all(|b|b.is_ascii_digit()) || (key.len() > 1 && key.starts_with('0')) {
        return None;
    }
    key.parse().ok()
}

/// Number parsing used by `Number(..)` style coercion: trimmed, empty is zero, hex allowed.
pub fn string_to_number(s: &str) -> f64 {
    let s = s.trim();
    if s.is_empty() {
        return 0.0;
    }
    if let Some(hex) = s.strip_prefix("0x").or_else(||s.strip_prefix("0X")) {
        return u64::from_str_radix(hex, 16).map_or(f64::NAN, |n|n as f64);
    }
    match s {
        "Infinity" | "+Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        _ => {
            if s.bytes().all(|b|b.is_ascii_digit() || b == b'.' || b == b'e' || b == b'E' || b == b'+' || b == b'-') {
                s.parse().unwrap_or(f64::NAN)
            } else {
                f64::NAN
            }
        }
    }
}

fn join_into(out: &mut String, items: &[Value], sep: &str, seen: &mut Vec<*const RefCell<Object>>) {
    for (i,item) in items.iter().enumerate() {
        if i > 0 {
            out.push_str(sep);
        }
        match item {
            Value::Undefined | Value::Null => {}
            Value::Object(o) => {
                // cyclic arrays print as empty
                if !seen.contains(&Rc::as_ptr(o)) {
                    seen.push(Rc::as_ptr(o));
                    out.push_str(&object_to_string(o, seen));
                    seen.pop();
                }
            }
            other => out.push_str(&other.to_string()),
        }
    }
}

fn object_to_string(o: &ObjRef, seen: &mut Vec<*const RefCell<Object>>) -> String {
    let object = o.borrow();
    match &object.kind {
        ObjectKind::Array(items) => {
            let mut out = String::new();
            join_into(&mut out, items, ",", seen);
            out
        }
        ObjectKind::Function(_) => "function () { [native code] }".to_string(),
        ObjectKind::Plain => "[object Object]".to_string(),
    }
}

/// `Array.prototype.join`
pub fn join(items: &[Value], sep: &str, this: &ObjRef) -> String {
    let mut out = String::new();
    let mut seen = vec![Rc::as_ptr(this)];
    join_into(&mut out, items, sep, &mut seen);
    out
}

impl Value {
    pub fn str(s: &str) -> Value {
        Value::Str(Rc::from(s))
    }

    pub fn new_array(items: Vec<Value>) -> Value {
        Value::Object(Object::array(items))
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Num(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
            Value::Object(_) => true,
        }
    }

    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => if *b { 1.0 } else { 0.0 },
            Value::Num(n) => *n,
            Value::Str(s) => string_to_number(s),
            Value::Object(o) => {
                if o.borrow().is_function() {
                    f64::NAN
                } else {
                    string_to_number(&object_to_string(o, &mut vec![Rc::as_ptr(o)]))
                }
            }
        }
    }

    pub fn to_int32(&self) -> i32 {
        self.to_uint32() as i32
    }

    pub fn to_uint32(&self) -> u32 {
        let n = self.to_number();
        if !n.is_finite() {
            return 0;
        }
        n.trunc().rem_euclid(4294967296.0) as u32
    }

    /// Integer argument the way string and array methods read them, NaN as zero.
    pub fn to_integer(&self) -> f64 {
        let n = self.to_number();
        if n.is_nan() {
            0.0
        } else {
            n.trunc()
        }
    }

    /// Strings and numbers as they are, objects converted to their string form.
    pub fn to_primitive(&self) -> Value {
        match self {
            Value::Object(o) => Value::str(&object_to_string(o, &mut vec![Rc::as_ptr(o)])),
            other => other.clone(),
        }
    }

    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "object",
            Value::Bool(_) => "boolean",
            Value::Num(_) => "number",
            Value::Str(_) => "string",
            Value::Object(o) => if o.borrow().is_function() { "function" } else { "object" },
        }
    }

    pub fn as_object(&self) -> Option<&ObjRef> {
        match self {
            Value::Object(o) => Some(o),
            _ => None
        }
    }

    pub fn is_function(&self) -> bool {
        self.as_object().map_or(false, |o|o.borrow().is_function())
    }

    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Num(a), Value::Num(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            _ => false
        }
    }

    pub fn loose_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Null) | (Value::Null, Value::Undefined) => true,
            (Value::Undefined, _) | (Value::Null, _) | (_, Value::Undefined) | (_, Value::Null) => self.strict_equals(other),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Object(_), _) => self.to_primitive().loose_equals(other),
            (_, Value::Object(_)) => self.loose_equals(&other.to_primitive()),
            (Value::Str(a), Value::Str(b)) => a == b,
            _ => self.to_number() == other.to_number(),
        }
    }
}

/// The `ToString` conversion.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Num(n) => write!(f, "{}", number_to_string(*n)),
            Value::Str(s) => write!(f, "{}", s),
            Value::Object(o) => write!(f, "{}", object_to_string(o, &mut vec![Rc::as_ptr(o)])),
        }
    }
}

/// Shallow, objects may be cyclic.
impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{:?}", s),
            Value::Object(o) => match &o.borrow().kind {
                ObjectKind::Plain => write!(f, "[object]"),
                ObjectKind::Array(items) => write!(f, "[array of {}]", items.len()),
                ObjectKind::Function(_) => write!(f, "[function]"),
            },
            other => write!(f, "{}", other),
        }
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Rc::from(s))
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Num(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn number_coercion() {
        assert_eq!(Value::str(" 12 ").to_number(), 12.0);
        assert_eq!(Value::str("").to_number(), 0.0);
        assert_eq!(Value::str("0x1f").to_number(), 31.0);
        assert!(Value::str("12px").to_number().is_nan());
        assert_eq!(Value::Null.to_number(), 0.0);
        assert!(Value::Undefined.to_number().is_nan());
        assert_eq!(Value::new_array(vec![Value::Num(7.0)]).to_number(), 7.0);
    }

    #[test]
    fn int32_wraps() {
        assert_eq!(Value::Num(4294967297.0).to_int32(), 1);
        assert_eq!(Value::Num(-1.0).to_uint32(), 4294967295);
        assert_eq!(Value::Num(2147483648.0).to_int32(), -2147483648);
        assert_eq!(Value::Num(f64::NAN).to_int32(), 0);
    }

    #[test]
    fn string_conversion() {
        let nested = Value::new_array(vec![Value::Num(1.0), Value::new_array(vec![Value::str("a"), Value::Null])]);
        assert_eq!(nested.to_string(), "1,a,");
        assert_eq!(Value::Num(0.5).to_string(), "0.5");
        assert_eq!(Value::Object(Object::plain()).to_string(), "[object Object]");
    }

    #[test]
    fn cyclic_array_prints() {
        let a = Object::array(vec![Value::Num(1.0)]);
        a.borrow_mut().set("1", Value::Object(a.clone()));
        assert_eq!(Value::Object(a).to_string(), "1,");
    }

    #[test]
    fn equality() {
        assert!(Value::Null.loose_equals(&Value::Undefined));
        assert!(!Value::Null.strict_equals(&Value::Undefined));
        assert!(Value::str("1").loose_equals(&Value::Num(1.0)));
        assert!(Value::Bool(true).loose_equals(&Value::Num(1.0)));
        assert!(!Value::Num(f64::NAN).strict_equals(&Value::Num(f64::NAN)));
        let o = Value::Object(Object::plain());
        assert!(o.strict_equals(&o.clone()));
        assert!(!o.strict_equals(&Value::Object(Object::plain())));
    }

    #[test]
    fn array_length_and_holes() {
        let a = Object::array(vec![]);
        a.borrow_mut().set("3", Value::Num(1.0));
        assert_eq!(a.borrow().get_own("length").map(|v|v.to_number()), Some(4.0));
        a.borrow_mut().set("length", Value::Num(1.0));
        assert_eq!(a.borrow().get_own("length").map(|v|v.to_number()), Some(1.0));
        assert_eq!(array_index("01"), None);
        assert_eq!(array_index("10"), Some(10));
    }

    #[test]
    fn huge_indices_stay_sparse() {
        let a = Object::array(vec![]);
        a.borrow_mut().set("3000000000", Value::Num(1.0));
        assert_eq!(a.borrow().get_own("3000000000").map(|v|v.to_number()), Some(1.0));
        assert_eq!(a.borrow().get_own("length").map(|v|v.to_number()), Some(0.0));
        assert!(a.borrow().rejects_length("length", &Value::Num(1e10)));
        assert!(!a.borrow().rejects_length("length", &Value::Num(10.0)));
        a.borrow_mut().set("length", Value::Num(1e10));
        assert_eq!(a.borrow().get_own("length").map(|v|v.to_number()), Some(0.0));
    }
}
