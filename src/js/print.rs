use std::fmt::Write;
use crate::js::ast::*;

const INDENT: &str = "  ";

/// Binding strength of an expression, higher binds tighter.
fn precedence(e: &Expr) -> u8 {
    match e {
        Expr::Sequence(_) => 1,
        Expr::Assign(_,_,_) | Expr::Arrow(_) => 2,
        Expr::Conditional(_,_,_) => 3,
        Expr::Logical(LogicalOp::Or,_,_) => 4,
        Expr::Logical(LogicalOp::And,_,_) => 5,
        Expr::Binary(o,_,_) => binary_precedence(*o),
        Expr::Unary(_,_) | Expr::Update(_,true,_) => 14,
        Expr::Update(_,false,_) => 15,
        Expr::Call(_,_) | Expr::New(_,_) | Expr::Member(_,_,_) => 17,
        Expr::Ident(_) | Expr::Lit(_) | Expr::This | Expr::Array(_) | Expr::Object(_) | Expr::Function(_) => 18,
    }
}

fn binary_precedence(o: BinaryOp) -> u8 {
    match o {
        BinaryOp::BitOr => 6,
        BinaryOp::BitXor => 7,
        BinaryOp::BitAnd => 8,
        BinaryOp::Eq | BinaryOp::NotEq | BinaryOp::StrictEq | BinaryOp::StrictNotEq => 9,
        BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq | BinaryOp::In | BinaryOp::InstanceOf => 10,
        BinaryOp::Shl | BinaryOp::Shr | BinaryOp::UShr => 11,
        BinaryOp::Add | BinaryOp::Sub => 12,
        BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => 13,
    }
}

/// Would printing `e` at the start of a statement begin with `function` or `{`?
fn starts_ambiguously(e: &Expr) -> bool {
    match e {
        Expr::Function(_) | Expr::Object(_) => true,
        Expr::Call(callee,_) => starts_ambiguously(callee),
        Expr::Member(object,_,_) => starts_ambiguously(object),
        Expr::Assign(_,left,_) | Expr::Logical(_,left,_) | Expr::Binary(_,left,_) => starts_ambiguously(left),
        Expr::Conditional(test,_,_) => starts_ambiguously(test),
        Expr::Update(_,false,arg) => starts_ambiguously(arg),
        Expr::Sequence(items) => items.first().map_or(false, starts_ambiguously),
        _ => false
    }
}

/// Number to text the way script engines render it: shortest round-trip
/// digits, plain notation for decimal exponents in [-6, 21), otherwise `1e+21` style.
pub fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    } else if n.is_infinite() {
        return if n > 0.0 { "Infinity".to_string() } else { "-Infinity".to_string() };
    } else if n == 0.0 {
        return "0".to_string();
    }
    let sign = if n < 0.0 { "-" } else { "" };
    // `{:e}` gives the shortest digits, e.g. `1.5e-7`
    let scientific = format!("{:e}", n.abs());
    let (mantissa, exponent) = match scientific.find('e') {
        Some(i) => (&scientific[..i], &scientific[i + 1..]),
        None => (scientific.as_str(), "0"),
    };
    let digits: String = mantissa.chars().filter(|c|*c != '.').collect();
    let k = digits.len() as i32;
    let point = exponent.parse::<i32>().unwrap_or(0) + 1;
    let body = if k <= point && point <= 21 {
        format!("{}{}", digits, "0".repeat((point - k) as usize))
    } else if 0 < point && point <= 21 {
        format!("{}.{}", &digits[..point as usize], &digits[point as usize..])
    } else if -6 < point && point <= 0 {
        format!("0.{}{}", "0".repeat((-point) as usize), digits)
    } else {
        let e = point - 1;
        let e_sign = if e < 0 { '-' } else { '+' };
        if k == 1 {
            format!("{}e{}{}", digits, e_sign, e.abs())
        } else {
            format!("{}.{}e{}{}", &digits[..1], &digits[1..], e_sign, e.abs())
        }
    };
    format!("{}{}", sign, body)
}

pub fn quote_string(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 2);
    result.push('"');
    for c in s.chars() {
        match c {
            '"' => result.push_str("\\\""),
            '\\' => result.push_str("\\\\"),
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            '\t' => result.push_str("\\t"),
            '\u{2028}' | '\u{2029}' => {
                let _ = write!(result, "\\u{:04x}", c as u32);
            }
            c if (c as u32) < 0x20 || c as u32 == 0x7f => {
                let _ = write!(result, "\\x{:02x}", c as u32);
            }
            c => result.push(c),
        }
    }
    result.push('"');
    result
}

struct Printer {
    out: String,
    depth: usize,
}

impl Printer {
    fn indent(&mut self) {
        for _ in 0..self.depth {
            self.out.push_str(INDENT);
        }
    }

    fn block(&mut self, stmts: &[Stmt]) {
        if stmts.is_empty() {
            self.out.push_str("{}");
            return;
        }
        self.out.push_str("{\n");
        self.depth += 1;
        for s in stmts {
            self.indent();
            self.stmt(s);
            self.out.push('\n');
        }
        self.depth -= 1;
        self.indent();
        self.out.push('}');
    }

    /// Body of if/for/while: blocks stay on the same line.
    fn nested(&mut self, s: &Stmt) {
        self.out.push(' ');
        self.stmt(s);
    }

    fn var_decl(&mut self, decl: &VarDecl) {
        self.out.push_str(decl.kind.as_str());
        self.out.push(' ');
        for (i,d) in decl.declarations.iter().enumerate() {
            if i > 0 {
                self.out.push_str(", ");
            }
            self.out.push_str(&d.id);
            if let Some(init) = &d.init {
                self.out.push_str(" = ");
                self.expr(init, 2);
            }
        }
    }

    fn function(&mut self, f: &Function) {
        self.out.push_str("function");
        if let Some(id) = &f.id {
            self.out.push(' ');
            self.out.push_str(id);
        }
        self.params(&f.params);
        self.out.push(' ');
        self.block(&f.body);
    }

    fn params(&mut self, params: &[Name]) {
        self.out.push('(');
        self.out.push_str(&params.join(", "));
        self.out.push(')');
    }

    fn stmt(&mut self, s: &Stmt) {
        match s {
            Stmt::Expr(e) => {
                if starts_ambiguously(e) {
                    self.out.push('(');
                    self.expr(e, 0);
                    self.out.push(')');
                } else {
                    self.expr(e, 0);
                }
                self.out.push(';');
            }
            Stmt::Var(decl) => {
                self.var_decl(decl);
                self.out.push(';');
            }
            Stmt::Function(f) => self.function(f),
            Stmt::Return(arg) => {
                self.out.push_str("return");
                if let Some(arg) = arg {
                    self.out.push(' ');
                    self.expr(arg, 0);
                }
                self.out.push(';');
            }
            Stmt::If(test, cons, alt) => {
                self.out.push_str("if (");
                self.expr(test, 0);
                self.out.push(')');
                match (&**cons, alt) {
                    // keep a trailing else from attaching to the inner if
                    (Stmt::If(_,_,None), Some(_)) => {
                        self.out.push(' ');
                        self.block(std::slice::from_ref(&**cons));
                    }
                    _ => self.nested(cons),
                }
                if let Some(alt) = alt {
                    self.out.push_str(" else");
                    self.nested(alt);
                }
            }
            Stmt::Block(stmts) => self.block(stmts),
            Stmt::For(f) => {
                self.out.push_str("for (");
                match &f.init {
                    Some(ForInit::Var(decl)) => self.var_decl(decl),
                    Some(ForInit::Expr(e)) => self.expr(e, 0),
                    None => {}
                }
                self.out.push(';');
                if let Some(test) = &f.test {
                    self.out.push(' ');
                    self.expr(test, 0);
                }
                self.out.push(';');
                if let Some(update) = &f.update {
                    self.out.push(' ');
                    self.expr(update, 0);
                }
                self.out.push(')');
                self.nested(&f.body);
            }
            Stmt::While(test, body) => {
                self.out.push_str("while (");
                self.expr(test, 0);
                self.out.push(')');
                self.nested(body);
            }
            Stmt::Switch(disc, cases) => {
                self.out.push_str("switch (");
                self.expr(disc, 0);
                self.out.push_str(") {\n");
                self.depth += 1;
                for case in cases {
                    self.indent();
                    match &case.test {
                        Some(test) => {
                            self.out.push_str("case ");
                            self.expr(test, 0);
                            self.out.push_str(":\n");
                        }
                        None => self.out.push_str("default:\n"),
                    }
                    self.depth += 1;
                    for s in &case.body {
                        self.indent();
                        self.stmt(s);
                        self.out.push('\n');
                    }
                    self.depth -= 1;
                }
                self.depth -= 1;
                self.indent();
                self.out.push('}');
            }
            Stmt::Try(t) => {
                self.out.push_str("try ");
                self.block(&t.block);
                if let Some(handler) = &t.handler {
                    self.out.push_str(" catch ");
                    if let Some(param) = &handler.param {
                        self.out.push('(');
                        self.out.push_str(param);
                        self.out.push_str(") ");
                    }
                    self.block(&handler.body);
                }
                if let Some(finalizer) = &t.finalizer {
                    self.out.push_str(" finally ");
                    self.block(finalizer);
                }
            }
            Stmt::Throw(e) => {
                self.out.push_str("throw ");
                self.expr(e, 0);
                self.out.push(';');
            }
            Stmt::Break => self.out.push_str("break;"),
            Stmt::Continue => self.out.push_str("continue;"),
            Stmt::Empty => self.out.push(';'),
        }
    }

    fn list(&mut self, items: &[Expr]) {
        for (i,item) in items.iter().enumerate() {
            if i > 0 {
                self.out.push_str(", ");
            }
            self.expr(item, 2);
        }
    }

    /// Prints `e`, parenthesized when it binds looser than `min`.
    fn expr(&mut self, e: &Expr, min: u8) {
        let prec = precedence(e);
        if prec < min {
            self.out.push('(');
            self.expr_inner(e, prec);
            self.out.push(')');
        } else {
            self.expr_inner(e, prec);
        }
    }

    fn expr_inner(&mut self, e: &Expr, prec: u8) {
        match e {
            Expr::Ident(name) => self.out.push_str(name),
            Expr::Lit(lit) => self.lit(lit),
            Expr::This => self.out.push_str("this"),
            Expr::Array(items) => {
                self.out.push('[');
                self.list(items);
                self.out.push(']');
            }
            Expr::Object(props) => {
                if props.is_empty() {
                    self.out.push_str("{}");
                    return;
                }
                self.out.push('{');
                for (i,(key,value)) in props.iter().enumerate() {
                    if i > 0 {
                        self.out.push_str(", ");
                    }
                    match key {
                        PropKey::Ident(name) => self.out.push_str(name),
                        PropKey::Str(s) => self.out.push_str(&quote_string(s)),
                        PropKey::Num(n) => self.out.push_str(&number_to_string(*n)),
                    }
                    self.out.push_str(": ");
                    self.expr(value, 2);
                }
                self.out.push('}');
            }
            Expr::Function(f) => self.function(f),
            Expr::Arrow(arrow) => {
                if arrow.params.len() == 1 {
                    self.out.push_str(&arrow.params[0]);
                } else {
                    self.params(&arrow.params);
                }
                self.out.push_str(" => ");
                match &arrow.body {
                    ArrowBody::Expr(body @ Expr::Object(_)) => {
                        self.out.push('(');
                        self.expr(body, 0);
                        self.out.push(')');
                    }
                    ArrowBody::Expr(body) => self.expr(body, 2),
                    ArrowBody::Block(stmts) => self.block(stmts),
                }
            }
            Expr::Call(callee, args) => {
                self.expr(callee, 17);
                self.out.push('(');
                self.list(args);
                self.out.push(')');
            }
            Expr::New(callee, args) => {
                self.out.push_str("new ");
                if let Expr::Call(_,_) = &**callee {
                    self.out.push('(');
                    self.expr(callee, 0);
                    self.out.push(')');
                } else {
                    self.expr(callee, 17);
                }
                self.out.push('(');
                self.list(args);
                self.out.push(')');
            }
            Expr::Member(object, property, computed) => {
                if let Expr::Lit(Lit::Num(_)) = &**object {
                    self.out.push('(');
                    self.expr(object, 0);
                    self.out.push(')');
                } else {
                    self.expr(object, 17);
                }
                if *computed {
                    self.out.push('[');
                    self.expr(property, 0);
                    self.out.push(']');
                } else {
                    self.out.push('.');
                    self.expr(property, 18);
                }
            }
            Expr::Assign(o, left, right) => {
                self.expr(left, 17);
                self.out.push(' ');
                self.out.push_str(o.as_str());
                self.out.push(' ');
                self.expr(right, 2);
            }
            Expr::Logical(o, left, right) => {
                self.expr(left, prec);
                self.out.push(' ');
                self.out.push_str(o.as_str());
                self.out.push(' ');
                self.expr(right, prec + 1);
            }
            Expr::Binary(o, left, right) => {
                self.expr(left, prec);
                self.out.push(' ');
                self.out.push_str(o.as_str());
                self.out.push(' ');
                self.expr(right, prec + 1);
            }
            Expr::Unary(o, arg) => {
                self.out.push_str(o.as_str());
                let word = match o {
                    UnaryOp::TypeOf | UnaryOp::Void | UnaryOp::Delete => true,
                    _ => false
                };
                let start = self.out.len();
                if word {
                    self.out.push(' ');
                }
                self.expr(arg, 14);
                // `- -a` and `+ ++a` must not fuse into one token
                if !word && self.out[start..].starts_with(o.as_str()) {
                    self.out.insert(start, ' ');
                }
            }
            Expr::Update(o, true, arg) => {
                self.out.push_str(o.as_str());
                self.expr(arg, 14);
            }
            Expr::Update(o, false, arg) => {
                self.expr(arg, 17);
                self.out.push_str(o.as_str());
            }
            Expr::Conditional(test, cons, alt) => {
                self.expr(test, 4);
                self.out.push_str(" ? ");
                self.expr(cons, 2);
                self.out.push_str(" : ");
                self.expr(alt, 2);
            }
            Expr::Sequence(items) => {
                for (i,item) in items.iter().enumerate() {
                    if i > 0 {
                        self.out.push_str(", ");
                    }
                    self.expr(item, 2);
                }
            }
        }
    }

    fn lit(&mut self, lit: &Lit) {
        match lit {
            Lit::Num(n) => self.out.push_str(&number_to_string(*n)),
            Lit::Str(s) => self.out.push_str(&quote_string(s)),
            Lit::Bool(b) => self.out.push_str(if *b { "true" } else { "false" }),
            Lit::Null => self.out.push_str("null"),
        }
    }
}

pub fn print_program(program: &Program) -> String {
    let mut printer = Printer{out: String::new(), depth: 0};
    for s in &program.body {
        printer.stmt(s);
        printer.out.push('\n');
    }
    printer.out
}

pub fn print_expr(e: &Expr) -> String {
    let mut printer = Printer{out: String::new(), depth: 0};
    printer.expr(e, 0);
    printer.out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::js::parse::{parse,parse_expr};
    use pretty_assertions::assert_eq;

    fn reprint(text: &str) -> String {
        print_expr(&parse_expr(text).unwrap())
    }

    #[test]
    fn parentheses_follow_precedence() {
        assert_eq!(reprint("(a+b)*c"), "(a + b) * c");
        assert_eq!(reprint("a+(b*c)"), "a + b * c");
        assert_eq!(reprint("a-(b-c)"), "a - (b - c)");
        assert_eq!(reprint("(a,b)"), "a, b");
        assert_eq!(reprint("f((a,b))"), "f((a, b))");
        assert_eq!(reprint("c&&(c=d(e),f())"), "c && (c = d(e), f())");
        assert_eq!(reprint("-(-a)"), "- -a");
        assert_eq!(reprint("(a?b:c)?d:e"), "(a ? b : c) ? d : e");
    }

    #[test]
    fn arrow_and_function_expressions() {
        assert_eq!(reprint("n=>f(n)"), "n => f(n)");
        assert_eq!(reprint("(a,b)=>a"), "(a, b) => a");
        assert_eq!(reprint("function(a){return a}"), "function(a) {\n  return a;\n}");
    }

    #[test]
    fn statements_starting_with_function_are_wrapped() {
        let program = parse("(function(){var a=1})();").unwrap();
        assert_eq!(print_program(&program), "(function() {\n  var a = 1;\n}());\n");
    }

    #[test]
    fn strings_and_numbers() {
        assert_eq!(reprint(r#"'a"b\n'"#), r#""a\"b\n""#);
        assert_eq!(reprint("1.50"), "1.5");
        assert_eq!(reprint("0x10"), "16");
        assert_eq!(number_to_string(-0.0), "0");
        assert_eq!(number_to_string(f64::NAN), "NaN");
    }

    #[test]
    fn exponent_notation_outside_plain_range() {
        assert_eq!(number_to_string(1e21), "1e+21");
        assert_eq!(number_to_string(2e25), "2e+25");
        assert_eq!(number_to_string(1.5e-7), "1.5e-7");
        assert_eq!(number_to_string(-1.25e30), "-1.25e+30");
        assert_eq!(number_to_string(1e20), "100000000000000000000");
        assert_eq!(number_to_string(1e-6), "0.000001");
        assert_eq!(number_to_string(123.456), "123.456");
        assert_eq!(number_to_string(-0.5), "-0.5");
        let program = parse("var k = 1000000000000000000000, j = 0.00000015;").unwrap();
        assert_eq!(print_program(&program), "var k = 1e+21, j = 1.5e-7;\n");
        assert_eq!(reprint("1e+21 + 1.5e-7"), "1e+21 + 1.5e-7");
    }

    #[test]
    fn printed_program_reparses_to_same_tree() {
        let text = "var a={AB:function(a,b){a.splice(0,b)},'c d':[1,2]};\
            function f(x){if(x)if(y)g();else h();for(var i=0;i<x.length;i++){x[i]^=1}\
            switch(x){case 1:break;default:x=typeof x}try{throw new Error(\"e\")}catch(e){}finally{}return x}";
        let program = parse(text).unwrap();
        let printed = print_program(&program);
        assert_eq!(parse(&printed).unwrap(), program);
    }
}
