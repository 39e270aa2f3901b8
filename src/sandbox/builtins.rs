use log::trace;
use crate::sandbox::interp::{throw,Eval,Interpreter};
use crate::sandbox::value::*;

/// Native functions. They receive `this` from the call site like any other function.
#[derive(Clone,Copy,PartialEq,Eq,Debug)]
pub enum Builtin {
    StrSplit,
    StrCharAt,
    StrCharCodeAt,
    StrIndexOf,
    StrSlice,
    StrSubstring,
    StrSubstr,
    StrConcat,
    StrReplace,
    ToString,
    ArrPush,
    ArrPop,
    ArrShift,
    ArrUnshift,
    ArrSplice,
    ArrReverse,
    ArrSlice,
    ArrJoin,
    ArrIndexOf,
    ArrConcat,
    ArrForEach,
    ArrMap,
    FunCall,
    FunApply,
    StringCtor,
    FromCharCode,
    MathFloor,
    MathAbs,
    MathMin,
    MathMax,
    MathPow,
    MathRound,
    MathCeil,
    ParseInt,
    IsNaN,
    IsArray,
    DecodeUriComponent,
    EncodeUriComponent,
}

pub fn string_method(name: &str) -> Option<Builtin> {
    let b = match name {
        "split" => Builtin::StrSplit,
        "charAt" => Builtin::StrCharAt,
        "charCodeAt" => Builtin::StrCharCodeAt,
        "indexOf" => Builtin::StrIndexOf,
        "slice" => Builtin::StrSlice,
        "substring" => Builtin::StrSubstring,
        "substr" => Builtin::StrSubstr,
        "concat" => Builtin::StrConcat,
        "replace" => Builtin::StrReplace,
        "toString" => Builtin::ToString,
        _ => return None
    };
    Some(b)
}

pub fn array_method(name: &str) -> Option<Builtin> {
    let b = match name {
        "push" => Builtin::ArrPush,
        "pop" => Builtin::ArrPop,
        "shift" => Builtin::ArrShift,
        "unshift" => Builtin::ArrUnshift,
        "splice" => Builtin::ArrSplice,
        "reverse" => Builtin::ArrReverse,
        "slice" => Builtin::ArrSlice,
        "join" => Builtin::ArrJoin,
        "indexOf" => Builtin::ArrIndexOf,
        "concat" => Builtin::ArrConcat,
        "forEach" => Builtin::ArrForEach,
        "map" => Builtin::ArrMap,
        "toString" => Builtin::ToString,
        _ => return None
    };
    Some(b)
}

pub fn function_method(name: &str) -> Option<Builtin> {
    match name {
        "call" => Some(Builtin::FunCall),
        "apply" => Some(Builtin::FunApply),
        "toString" => Some(Builtin::ToString),
        _ => None
    }
}

pub fn native(b: Builtin) -> Value {
    Value::Object(Object::function(Callable::Native(b)))
}

fn namespace(members: &[(&str, Builtin)]) -> ObjRef {
    let object = Object::plain();
    for (name,b) in members {
        object.borrow_mut().set(name, native(*b));
    }
    object
}

/// Populates a fresh global object.
pub fn install_globals(global: &ObjRef) {
    let string = Object::function(Callable::Native(Builtin::StringCtor));
    string.borrow_mut().set("fromCharCode", native(Builtin::FromCharCode));
    let math = namespace(&[
        ("floor", Builtin::MathFloor),
        ("abs", Builtin::MathAbs),
        ("min", Builtin::MathMin),
        ("max", Builtin::MathMax),
        ("pow", Builtin::MathPow),
        ("round", Builtin::MathRound),
        ("ceil", Builtin::MathCeil),
    ]);
    let array = namespace(&[("isArray", Builtin::IsArray)]);

    let mut g = global.borrow_mut();
    g.set("String", Value::Object(string));
    g.set("Math", Value::Object(math));
    g.set("Array", Value::Object(array));
    g.set("parseInt", native(Builtin::ParseInt));
    g.set("isNaN", native(Builtin::IsNaN));
    g.set("decodeURIComponent", native(Builtin::DecodeUriComponent));
    g.set("encodeURIComponent", native(Builtin::EncodeUriComponent));
    g.set("undefined", Value::Undefined);
    g.set("NaN", Value::Num(f64::NAN));
    g.set("Infinity", Value::Num(f64::INFINITY));
}

fn arg(args: &[Value], i: usize) -> Value {
    args.get(i).cloned().unwrap_or(Value::Undefined)
}

/// Resolves a possibly negative position against `len`, as `slice` does.
fn relative(n: f64, len: usize) -> usize {
    if n < 0.0 {
        (len as f64 + n).max(0.0) as usize
    } else {
        n.min(len as f64) as usize
    }
}

fn clamp(n: f64, len: usize) -> usize {
    n.max(0.0).min(len as f64) as usize
}

fn find_chars(hay: &[char], needle: &[char], from: usize) -> Option<usize> {
    if needle.is_empty() {
        return Some(from.min(hay.len()));
    }
    if needle.len() > hay.len() {
        return None;
    }
    (from..=hay.len() - needle.len()).find(|&i|hay[i..i + needle.len()] == *needle)
}

fn collect(chars: &[char]) -> Value {
    Value::from(chars.iter().collect::<String>())
}

fn string_builtin(interp: &mut Interpreter, b: Builtin, s: &str, args: &[Value]) -> Eval<Value> {
    let chars: Vec<char> = s.chars().collect();
    let len = chars.len();
    let result = match b {
        Builtin::StrSplit => {
            let parts: Vec<Value> = match arg(args, 0) {
                Value::Undefined => vec![Value::str(s)],
                sep => {
                    let sep = sep.to_string();
                    if sep.is_empty() {
                        chars.iter().map(|c|Value::from(c.to_string())).collect()
                    } else {
                        s.split(sep.as_str()).map(Value::str).collect()
                    }
                }
            };
            let parts = match arg(args, 1) {
                Value::Undefined => parts,
                limit => parts.into_iter().take(limit.to_uint32() as usize).collect(),
            };
            Value::new_array(parts)
        }
        Builtin::StrCharAt => {
            let i = arg(args, 0).to_integer();
            if i >= 0.0 && (i as usize) < len {
                Value::from(chars[i as usize].to_string())
            } else {
                Value::str("")
            }
        }
        Builtin::StrCharCodeAt => {
            let i = arg(args, 0).to_integer();
            if i >= 0.0 && (i as usize) < len {
                Value::Num(chars[i as usize] as u32 as f64)
            } else {
                Value::Num(f64::NAN)
            }
        }
        Builtin::StrIndexOf => {
            let needle: Vec<char> = arg(args, 0).to_string().chars().collect();
            let from = clamp(arg(args, 1).to_integer(), len);
            Value::Num(find_chars(&chars, &needle, from).map_or(-1.0, |i|i as f64))
        }
        Builtin::StrSlice => {
            let start = relative(arg(args, 0).to_integer(), len);
            let end = match arg(args, 1) {
                Value::Undefined => len,
                e => relative(e.to_integer(), len),
            };
            collect(&chars[start..end.max(start)])
        }
        Builtin::StrSubstring => {
            let start = clamp(arg(args, 0).to_integer(), len);
            let end = match arg(args, 1) {
                Value::Undefined => len,
                e => clamp(e.to_integer(), len),
            };
            collect(&chars[start.min(end)..start.max(end)])
        }
        Builtin::StrSubstr => {
            let start = relative(arg(args, 0).to_integer(), len);
            let count = match arg(args, 1) {
                Value::Undefined => len - start,
                c => clamp(c.to_integer(), len - start),
            };
            collect(&chars[start..start + count])
        }
        Builtin::StrConcat => {
            let mut out = s.to_string();
            for a in args {
                out.push_str(&a.to_string());
            }
            Value::from(out)
        }
        Builtin::StrReplace => {
            let pattern = arg(args, 0).to_string();
            match s.find(pattern.as_str()) {
                None => Value::str(s),
                Some(at) => {
                    let replacement = match arg(args, 1) {
                        f if f.is_function() => {
                            let offset = s[..at].chars().count() as f64;
                            let found = vec![Value::str(&pattern), Value::Num(offset), Value::str(s)];
                            interp.call(&f, Value::Undefined, found)?.to_string()
                        }
                        r => r.to_string(),
                    };
                    Value::from(format!("{}{}{}", &s[..at], replacement, &s[at + pattern.len()..]))
                }
            }
        }
        _ => return throw("TypeError", format!("{:?} called on a string", b)),
    };
    Ok(result)
}

fn array_builtin(interp: &mut Interpreter, b: Builtin, this: &ObjRef, args: Vec<Value>) -> Eval<Value> {
    let items = match &this.borrow().kind {
        ObjectKind::Array(items) => items.clone(),
        _ => return throw("TypeError", format!("{:?} called on a non-array", b)),
    };
    let len = items.len();
    let replace = |items: Vec<Value>| {
        if let ObjectKind::Array(current) = &mut this.borrow_mut().kind {
            *current = items;
        }
    };
    let result = match b {
        Builtin::ArrPush => {
            let mut items = items;
            items.extend(args);
            let len = items.len();
            replace(items);
            Value::Num(len as f64)
        }
        Builtin::ArrPop => {
            let mut items = items;
            let last = items.pop().unwrap_or(Value::Undefined);
            replace(items);
            last
        }
        Builtin::ArrShift => {
            if items.is_empty() {
                Value::Undefined
            } else {
                let mut items = items;
                let first = items.remove(0);
                replace(items);
                first
            }
        }
        Builtin::ArrUnshift => {
            let mut front = args;
            front.extend(items);
            let len = front.len();
            replace(front);
            Value::Num(len as f64)
        }
        Builtin::ArrSplice => {
            let start = relative(arg(&args, 0).to_integer(), len);
            let count = if args.len() < 2 {
                len - start
            } else {
                clamp(arg(&args, 1).to_integer(), len - start)
            };
            let mut items = items;
            let inserted: Vec<Value> = args.into_iter().skip(2).collect();
            let removed: Vec<Value> = items.splice(start..start + count, inserted).collect();
            replace(items);
            Value::new_array(removed)
        }
        Builtin::ArrReverse => {
            let mut items = items;
            items.reverse();
            replace(items);
            Value::Object(this.clone())
        }
        Builtin::ArrSlice => {
            let start = relative(arg(&args, 0).to_integer(), len);
            let end = match arg(&args, 1) {
                Value::Undefined => len,
                e => relative(e.to_integer(), len),
            };
            let part = if start < end { items[start..end].to_vec() } else { vec![] };
            Value::new_array(part)
        }
        Builtin::ArrJoin | Builtin::ToString => {
            let sep = match arg(&args, 0) {
                Value::Undefined => ",".to_string(),
                s if b == Builtin::ArrJoin => s.to_string(),
                _ => ",".to_string(),
            };
            Value::from(join(&items, &sep, this))
        }
        Builtin::ArrIndexOf => {
            let target = arg(&args, 0);
            let from = relative(arg(&args, 1).to_integer(), len);
            let found = items.iter().skip(from).position(|v|v.strict_equals(&target));
            Value::Num(found.map_or(-1.0, |i|(i + from) as f64))
        }
        Builtin::ArrConcat => {
            let mut out = items;
            for a in args {
                match &a {
                    Value::Object(o) => match &o.borrow().kind {
                        ObjectKind::Array(more) => {
                            out.extend(more.iter().cloned());
                            continue;
                        }
                        _ => {}
                    },
                    _ => {}
                }
                out.push(a);
            }
            Value::new_array(out)
        }
        Builtin::ArrForEach | Builtin::ArrMap => {
            let f = arg(&args, 0);
            if !f.is_function() {
                return throw("TypeError", format!("{:?} expects a function", f));
            }
            let mut mapped = Vec::with_capacity(len);
            for (i,item) in items.into_iter().enumerate() {
                let call_args = vec![item, Value::Num(i as f64), Value::Object(this.clone())];
                mapped.push(interp.call(&f, arg(&args, 1), call_args)?);
            }
            if b == Builtin::ArrMap {
                Value::new_array(mapped)
            } else {
                Value::Undefined
            }
        }
        _ => return throw("TypeError", format!("{:?} called on an array", b)),
    };
    Ok(result)
}

fn radix_string(n: f64, radix: u32) -> Option<String> {
    if n.fract() != 0.0 || !n.is_finite() || n.abs() > 9007199254740991.0 {
        return None;
    }
    let mut digits = vec![];
    let mut value = n.abs() as u64;
    loop {
        digits.push(std::char::from_digit((value % radix as u64) as u32, radix)?);
        value /= radix as u64;
        if value == 0 {
            break;
        }
    }
    if n < 0.0 {
        digits.push('-');
    }
    Some(digits.iter().rev().collect())
}

fn to_string_builtin(this: &Value, args: &[Value]) -> Value {
    if let Value::Num(n) = this {
        let radix = arg(args, 0);
        if let Value::Num(r) = radix {
            if r >= 2.0 && r <= 36.0 && r != 10.0 {
                if let Some(s) = radix_string(*n, r as u32) {
                    return Value::from(s);
                }
            }
        }
    }
    Value::from(this.to_string())
}

fn parse_int(s: &str, radix: &Value) -> f64 {
    let s = s.trim_start();
    let (negative, s) = match s.chars().next() {
        Some('-') => (true, &s[1..]),
        Some('+') => (false, &s[1..]),
        _ => (false, s),
    };
    let mut radix = radix.to_int32() as u32;
    let mut s = s;
    if radix == 0 || radix == 16 {
        if let Some(rest) = s.strip_prefix("0x").or_else(||s.strip_prefix("0X")) {
            s = rest;
            radix = 16;
        }
    }
    if radix == 0 {
        radix = 10;
    }
    if radix < 2 || radix > 36 {
        return f64::NAN;
    }
    let digits: Vec<u32> = s.chars().take_while(|c|c.is_digit(radix)).filter_map(|c|c.to_digit(radix)).collect();
    if digits.is_empty() {
        return f64::NAN;
    }
    let n = digits.iter().fold(0.0, |acc, d|acc * radix as f64 + *d as f64);
    if negative { -n } else { n }
}

fn hex_value(b: u8) -> Option<u8> {
    (b as char).to_digit(16).map(|d|d as u8)
}

fn decode_uri_component(s: &str) -> Option<String> {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hi = hex_value(*bytes.get(i + 1)?)?;
            let lo = hex_value(*bytes.get(i + 2)?)?;
            out.push(hi * 16 + lo);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

fn encode_uri_component(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        if b.is_ascii_alphanumeric() || b"-_.!~*'()".contains(&b) {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{:02X}", b));
        }
    }
    out
}

fn numbers(args: &[Value]) -> Vec<f64> {
    args.iter().map(|a|a.to_number()).collect()
}

pub fn call(interp: &mut Interpreter, b: Builtin, this: Value, args: Vec<Value>) -> Eval<Value> {
    trace!("builtin {:?}", b);
    let result = match b {
        Builtin::FunCall => {
            let mut args = args.into_iter();
            let this_arg = args.next().unwrap_or(Value::Undefined);
            return interp.call(&this, this_arg, args.collect());
        }
        Builtin::FunApply => {
            let list = match arg(&args, 1) {
                Value::Undefined | Value::Null => vec![],
                Value::Object(o) => match &o.borrow().kind {
                    ObjectKind::Array(items) => items.clone(),
                    _ => return throw("TypeError", "apply expects an array".to_string()),
                },
                _ => return throw("TypeError", "apply expects an array".to_string()),
            };
            return interp.call(&this, arg(&args, 0), list);
        }
        Builtin::ToString => match &this {
            Value::Object(o) if !o.borrow().is_function() => return array_builtin(interp, b, o, args).or_else(|_|Ok(Value::from(this.to_string()))),
            _ => to_string_builtin(&this, &args),
        },
        Builtin::StringCtor => Value::from(args.first().map_or(String::new(), |a|a.to_string())),
        Builtin::FromCharCode => {
            let s: String = args.iter()
                .map(|a|std::char::from_u32(a.to_uint32() & 0xffff).unwrap_or('\u{fffd}'))
                .collect();
            Value::from(s)
        }
        Builtin::MathFloor => Value::Num(arg(&args, 0).to_number().floor()),
        Builtin::MathCeil => Value::Num(arg(&args, 0).to_number().ceil()),
        Builtin::MathAbs => Value::Num(arg(&args, 0).to_number().abs()),
        Builtin::MathRound => Value::Num((arg(&args, 0).to_number() + 0.5).floor()),
        Builtin::MathPow => Value::Num(arg(&args, 0).to_number().powf(arg(&args, 1).to_number())),
        Builtin::MathMin => Value::Num(numbers(&args).into_iter().fold(f64::INFINITY, |x, y|if x.is_nan() || y.is_nan() { f64::NAN } else { x.min(y) })),
        Builtin::MathMax => Value::Num(numbers(&args).into_iter().fold(f64::NEG_INFINITY, |x, y|if x.is_nan() || y.is_nan() { f64::NAN } else { x.max(y) })),
        Builtin::ParseInt => Value::Num(parse_int(&arg(&args, 0).to_string(), &arg(&args, 1))),
        Builtin::IsNaN => Value::Bool(arg(&args, 0).to_number().is_nan()),
        Builtin::IsArray => Value::Bool(match arg(&args, 0) {
            Value::Object(o) => match o.borrow().kind {
                ObjectKind::Array(_) => true,
                _ => false
            },
            _ => false
        }),
        Builtin::DecodeUriComponent => match decode_uri_component(&arg(&args, 0).to_string()) {
            Some(s) => Value::from(s),
            None => return throw("URIError", "URI malformed".to_string()),
        },
        Builtin::EncodeUriComponent => Value::from(encode_uri_component(&arg(&args, 0).to_string())),
        _ => match &this {
            Value::Object(o) => return array_builtin(interp, b, o, args),
            Value::Undefined | Value::Null => return throw("TypeError", format!("{:?} called on {}", b, this)),
            other => return string_builtin(interp, b, &other.to_string(), &args),
        },
    };
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn int_parsing() {
        assert_eq!(parse_int("  42px", &Value::Undefined), 42.0);
        assert_eq!(parse_int("-0x1A", &Value::Undefined), -26.0);
        assert_eq!(parse_int("ff", &Value::Num(16.0)), 255.0);
        assert!(parse_int("z", &Value::Num(10.0)).is_nan());
    }

    #[test]
    fn uri_components() {
        assert_eq!(encode_uri_component("a b/é"), "a%20b%2F%C3%A9");
        assert_eq!(decode_uri_component("a%20b%2F%C3%A9"), Some("a b/é".to_string()));
        assert_eq!(decode_uri_component("%E0%A4%A"), None);
        assert_eq!(decode_uri_component("%FF"), None);
    }

    #[test]
    fn radix_strings() {
        assert_eq!(radix_string(255.0, 16), Some("ff".to_string()));
        assert_eq!(radix_string(-5.0, 2), Some("-101".to_string()));
        assert_eq!(radix_string(1.5, 2), None);
    }

    #[test]
    fn relative_positions() {
        assert_eq!(relative(-2.0, 5), 3);
        assert_eq!(relative(-9.0, 5), 0);
        assert_eq!(relative(9.0, 5), 5);
        assert_eq!(find_chars(&['a','b','c'], &['c'], 0), Some(2));
        assert_eq!(find_chars(&['a'], &['a','b'], 0), None);
    }
}
