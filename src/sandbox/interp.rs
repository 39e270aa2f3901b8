use std::cell::RefCell;
use std::cmp::Ordering;
use std::rc::Rc;
use log::trace;
use rustc_hash::FxHashMap;
use crate::js::ast::*;
use crate::js::print::{number_to_string,print_expr};
use crate::sandbox::builtins::{self,array_method,function_method,native,string_method};
use crate::sandbox::value::*;

/// Nested calls beyond this abort evaluation. Scripts cannot catch it.
pub const MAX_CALL_DEPTH: usize = 10_000;

const STACK_RED_ZONE: usize = 64 * 1024;
const STACK_GROWTH: usize = 1024 * 1024;

pub enum Fault {
    /// A script-level exception, catchable by `try`.
    Throw(Value),
    Fatal(String),
}

pub type Eval<T> = Result<T, Fault>;

/// An error object the way scripts see it: `name` and `message` properties.
pub fn error_value(name: &str, message: &str) -> Value {
    let error = Object::plain();
    {
        let mut e = error.borrow_mut();
        e.set("name", Value::str(name));
        e.set("message", Value::str(message));
    }
    Value::Object(error)
}

pub fn throw<T>(name: &str, message: String) -> Eval<T> {
    Err(Fault::Throw(error_value(name, &message)))
}

/// Human readable form of a thrown value.
pub fn describe(thrown: &Value) -> String {
    if let Value::Object(o) = thrown {
        let o = o.borrow();
        if let Some(message) = o.get_own("message") {
            let name = o.get_own("name").map_or("Error".to_string(), |n|n.to_string());
            return format!("{}: {}", name, message);
        }
    }
    thrown.to_string()
}

pub type ScopeRef = Rc<RefCell<Scope>>;

pub struct Scope {
    vars: FxHashMap<Name, Value>,
    parent: Option<ScopeRef>,
}

impl Scope {
    fn root() -> ScopeRef {
        Rc::new(RefCell::new(Scope{vars: FxHashMap::default(), parent: None}))
    }

    fn child(parent: &ScopeRef) -> ScopeRef {
        Rc::new(RefCell::new(Scope{vars: FxHashMap::default(), parent: Some(parent.clone())}))
    }
}

enum Completion {
    Normal,
    Return(Value),
    Break,
    Continue,
}

#[derive(Clone)]
struct Ctx {
    scope: ScopeRef,
    this: Value,
}

impl Ctx {
    fn block(&self) -> Ctx {
        Ctx{scope: Scope::child(&self.scope), this: self.this.clone()}
    }
}

enum Place {
    Var(Name),
    Prop(Value, String),
}

/// `var` names declared anywhere in a function body, outside nested functions.
fn hoisted_vars(stmts: &[Stmt], names: &mut Vec<Name>) {
    for s in stmts {
        match s {
            Stmt::Var(decl) if decl.kind == VarKind::Var => {
                names.extend(decl.declarations.iter().map(|d|d.id.clone()));
            }
            Stmt::If(_, cons, alt) => {
                hoisted_vars(std::slice::from_ref(&**cons), names);
                if let Some(alt) = alt {
                    hoisted_vars(std::slice::from_ref(&**alt), names);
                }
            }
            Stmt::Block(body) => hoisted_vars(body, names),
            Stmt::For(f) => {
                if let Some(ForInit::Var(decl)) = &f.init {
                    if decl.kind == VarKind::Var {
                        names.extend(decl.declarations.iter().map(|d|d.id.clone()));
                    }
                }
                hoisted_vars(std::slice::from_ref(&*f.body), names);
            }
            Stmt::While(_, body) => hoisted_vars(std::slice::from_ref(&**body), names),
            Stmt::Switch(_, cases) => {
                for case in cases {
                    hoisted_vars(&case.body, names);
                }
            }
            Stmt::Try(t) => {
                hoisted_vars(&t.block, names);
                if let Some(handler) = &t.handler {
                    hoisted_vars(&handler.body, names);
                }
                if let Some(finalizer) = &t.finalizer {
                    hoisted_vars(finalizer, names);
                }
            }
            _ => {}
        }
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a.to_primitive(), b.to_primitive()) {
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(&b)),
        (a, b) => a.to_number().partial_cmp(&b.to_number()),
    }
}

fn arithmetic(op: BinaryOp, a: &Value, b: &Value) -> Value {
    match op {
        BinaryOp::Add => {
            let (a, b) = (a.to_primitive(), b.to_primitive());
            match (&a, &b) {
                (Value::Str(_), _) | (_, Value::Str(_)) => Value::from(format!("{}{}", a, b)),
                _ => Value::Num(a.to_number() + b.to_number()),
            }
        }
        BinaryOp::Sub => Value::Num(a.to_number() - b.to_number()),
        BinaryOp::Mul => Value::Num(a.to_number() * b.to_number()),
        BinaryOp::Div => Value::Num(a.to_number() / b.to_number()),
        BinaryOp::Rem => Value::Num(a.to_number() % b.to_number()),
        BinaryOp::Shl => Value::Num(a.to_int32().wrapping_shl(b.to_uint32() & 31) as f64),
        BinaryOp::Shr => Value::Num((a.to_int32() >> (b.to_uint32() & 31)) as f64),
        BinaryOp::UShr => Value::Num((a.to_uint32() >> (b.to_uint32() & 31)) as f64),
        BinaryOp::BitAnd => Value::Num((a.to_int32() & b.to_int32()) as f64),
        BinaryOp::BitOr => Value::Num((a.to_int32() | b.to_int32()) as f64),
        BinaryOp::BitXor => Value::Num((a.to_int32() ^ b.to_int32()) as f64),
        BinaryOp::Eq => Value::Bool(a.loose_equals(b)),
        BinaryOp::NotEq => Value::Bool(!a.loose_equals(b)),
        BinaryOp::StrictEq => Value::Bool(a.strict_equals(b)),
        BinaryOp::StrictNotEq => Value::Bool(!a.strict_equals(b)),
        BinaryOp::Lt => Value::Bool(compare(a, b) == Some(Ordering::Less)),
        BinaryOp::Gt => Value::Bool(compare(a, b) == Some(Ordering::Greater)),
        BinaryOp::LtEq => Value::Bool(match compare(a, b) {
            Some(Ordering::Less) | Some(Ordering::Equal) => true,
            _ => false
        }),
        BinaryOp::GtEq => Value::Bool(match compare(a, b) {
            Some(Ordering::Greater) | Some(Ordering::Equal) => true,
            _ => false
        }),
        BinaryOp::In | BinaryOp::InstanceOf => Value::Bool(false),
    }
}

/// A tree-walking interpreter over one program. Globals live on a global
/// object that top-level `this` refers to.
pub struct Interpreter {
    global: ObjRef,
    root: ScopeRef,
    depth: usize,
}

impl Interpreter {
    pub fn new() -> Self {
        let global = Object::plain();
        builtins::install_globals(&global);
        Interpreter{global, root: Scope::root(), depth: 0}
    }

    pub fn global(&self) -> &ObjRef {
        &self.global
    }

    /// Binds a name visible to the whole program without making it a global property.
    pub fn bind(&mut self, name: &str, value: Value) {
        self.root.borrow_mut().vars.insert(name.to_string(), value);
    }

    pub fn run(&mut self, program: &Program) -> Eval<()> {
        let ctx = Ctx{scope: self.root.clone(), this: Value::Object(self.global.clone())};
        let mut names = vec![];
        hoisted_vars(&program.body, &mut names);
        for name in names {
            self.declare_var(&ctx.scope, name);
        }
        self.exec_block(&program.body, &ctx)?;
        Ok(())
    }

    ////////////////
    //
    // Scopes
    //
    ////////////////

    fn is_root(&self, scope: &ScopeRef) -> bool {
        Rc::ptr_eq(scope, &self.root)
    }

    fn declare_var(&mut self, scope: &ScopeRef, name: Name) {
        if self.is_root(scope) {
            let mut global = self.global.borrow_mut();
            if global.get_own(&name).is_none() {
                global.set(&name, Value::Undefined);
            }
        } else {
            scope.borrow_mut().vars.entry(name).or_insert(Value::Undefined);
        }
    }

    fn define(&mut self, scope: &ScopeRef, name: &str, value: Value) {
        if self.is_root(scope) {
            self.global.borrow_mut().set(name, value);
        } else {
            scope.borrow_mut().vars.insert(name.to_string(), value);
        }
    }

    fn lookup(&self, scope: &ScopeRef, name: &str) -> Option<Value> {
        let mut current = scope.clone();
        loop {
            let parent = {
                let s = current.borrow();
                if let Some(v) = s.vars.get(name) {
                    return Some(v.clone());
                }
                s.parent.clone()
            };
            match parent {
                Some(p) => current = p,
                None => break,
            }
        }
        self.global.borrow().lookup(name)
    }

    /// Assigns to the innermost binding, or creates a global.
    fn assign_var(&mut self, scope: &ScopeRef, name: &str, value: Value) {
        let mut current = scope.clone();
        loop {
            let parent = {
                let mut s = current.borrow_mut();
                if let Some(slot) = s.vars.get_mut(name) {
                    *slot = value;
                    return;
                }
                s.parent.clone()
            };
            match parent {
                Some(p) => current = p,
                None => break,
            }
        }
        self.global.borrow_mut().set(name, value);
    }

    ////////////////
    //
    // Properties
    //
    ////////////////

    pub fn get_property(&mut self, target: &Value, key: &str) -> Eval<Value> {
        let o = match target {
            Value::Undefined | Value::Null => {
                return throw("TypeError", format!("Cannot read properties of {} (reading '{}')", target, key));
            }
            Value::Str(s) => {
                if key == "length" {
                    return Ok(Value::Num(s.chars().count() as f64));
                }
                if let Some(i) = array_index(key) {
                    return Ok(s.chars().nth(i).map_or(Value::Undefined, |c|Value::from(c.to_string())));
                }
                return Ok(string_method(key).map_or(Value::Undefined, native));
            }
            Value::Num(_) | Value::Bool(_) => {
                return Ok(if key == "toString" { native(builtins::Builtin::ToString) } else { Value::Undefined });
            }
            Value::Object(o) => o,
        };
        if let Some(v) = o.borrow().get_own(key) {
            return Ok(v);
        }
        let (is_function, proto) = {
            let object = o.borrow();
            let method = match &object.kind {
                ObjectKind::Array(_) => array_method(key),
                ObjectKind::Function(_) => function_method(key),
                ObjectKind::Plain => None,
            };
            if let Some(b) = method {
                return Ok(native(b));
            }
            (object.is_function(), object.proto.clone())
        };
        if is_function && key == "prototype" {
            let prototype = Value::Object(Object::plain());
            o.borrow_mut().set(key, prototype.clone());
            return Ok(prototype);
        }
        Ok(proto.as_ref().and_then(|p|p.borrow().lookup(key)).unwrap_or(Value::Undefined))
    }

    fn set_property(&mut self, target: &Value, key: &str, value: Value) -> Eval<()> {
        match target {
            Value::Object(o) => {
                if o.borrow().rejects_length(key, &value) {
                    return throw("RangeError", "Invalid array length".to_string());
                }
                o.borrow_mut().set(key, value)
            }
            Value::Undefined | Value::Null => {
                return throw("TypeError", format!("Cannot set properties of {} (setting '{}')", target, key));
            }
            _ => {}
        }
        Ok(())
    }

    fn property_key(&mut self, property: &Expr, computed: bool, ctx: &Ctx) -> Eval<String> {
        match (property, computed) {
            (Expr::Ident(name), false) => Ok(name.clone()),
            _ => Ok(self.eval(property, ctx)?.to_string()),
        }
    }

    fn place(&mut self, e: &Expr, ctx: &Ctx) -> Eval<Place> {
        match e {
            Expr::Ident(name) => Ok(Place::Var(name.clone())),
            Expr::Member(object, property, computed) => {
                let target = self.eval(object, ctx)?;
                let key = self.property_key(property, *computed, ctx)?;
                Ok(Place::Prop(target, key))
            }
            _ => throw("SyntaxError", format!("invalid assignment target {}", print_expr(e))),
        }
    }

    fn read(&mut self, place: &Place, ctx: &Ctx) -> Eval<Value> {
        match place {
            Place::Var(name) => match self.lookup(&ctx.scope, name) {
                Some(v) => Ok(v),
                None => throw("ReferenceError", format!("{} is not defined", name)),
            },
            Place::Prop(target, key) => self.get_property(target, key),
        }
    }

    fn write(&mut self, place: &Place, value: Value, ctx: &Ctx) -> Eval<()> {
        match place {
            Place::Var(name) => {
                self.assign_var(&ctx.scope, name, value);
                Ok(())
            }
            Place::Prop(target, key) => self.set_property(target, key, value),
        }
    }

    fn instance_of(&mut self, value: &Value, constructor: &Value) -> Eval<bool> {
        if !constructor.is_function() {
            return throw("TypeError", "Right-hand side of 'instanceof' is not callable".to_string());
        }
        let prototype = match self.get_property(constructor, "prototype")? {
            Value::Object(p) => p,
            _ => return Ok(false),
        };
        let mut current = match value {
            Value::Object(o) => o.borrow().proto.clone(),
            _ => None,
        };
        while let Some(p) = current {
            if Rc::ptr_eq(&p, &prototype) {
                return Ok(true);
            }
            current = p.borrow().proto.clone();
        }
        Ok(false)
    }

    ////////////////
    //
    // Calls
    //
    ////////////////

    pub fn call(&mut self, f: &Value, this: Value, args: Vec<Value>) -> Eval<Value> {
        let callable = match f {
            Value::Object(o) => match &o.borrow().kind {
                ObjectKind::Function(c) => c.clone(),
                _ => return throw("TypeError", "object is not a function".to_string()),
            },
            _ => return throw("TypeError", format!("{} is not a function", f)),
        };
        if self.depth >= MAX_CALL_DEPTH {
            return Err(Fault::Fatal("Maximum call stack size exceeded".to_string()));
        }
        self.depth += 1;
        let result = stacker::maybe_grow(STACK_RED_ZONE, STACK_GROWTH, || self.invoke(callable, this, args));
        self.depth -= 1;
        result
    }

    fn bind_params(scope: &ScopeRef, params: &[Name], args: &[Value]) {
        let mut s = scope.borrow_mut();
        for (i,p) in params.iter().enumerate() {
            s.vars.insert(p.clone(), args.get(i).cloned().unwrap_or(Value::Undefined));
        }
    }

    fn run_body(&mut self, body: &[Stmt], ctx: &Ctx) -> Eval<Value> {
        let mut names = vec![];
        hoisted_vars(body, &mut names);
        for name in names {
            self.declare_var(&ctx.scope, name);
        }
        match self.exec_block(body, ctx)? {
            Completion::Return(v) => Ok(v),
            _ => Ok(Value::Undefined),
        }
    }

    fn invoke(&mut self, callable: Callable, this: Value, args: Vec<Value>) -> Eval<Value> {
        match callable {
            Callable::Native(b) => builtins::call(self, b, this, args),
            Callable::Closure(f, scope) => {
                let scope = Scope::child(&scope);
                let this = match this {
                    Value::Undefined | Value::Null => Value::Object(self.global.clone()),
                    this => this,
                };
                Interpreter::bind_params(&scope, &f.params, &args);
                scope.borrow_mut().vars.entry("arguments".to_string()).or_insert_with(||Value::new_array(args));
                self.run_body(&f.body, &Ctx{scope, this})
            }
            Callable::Arrow(a, scope, this) => {
                let scope = Scope::child(&scope);
                Interpreter::bind_params(&scope, &a.params, &args);
                let ctx = Ctx{scope, this};
                match &a.body {
                    ArrowBody::Expr(e) => self.eval(e, &ctx),
                    ArrowBody::Block(body) => self.run_body(body, &ctx),
                }
            }
        }
    }

    fn construct(&mut self, f: &Value, args: Vec<Value>) -> Eval<Value> {
        if !f.is_function() {
            return throw("TypeError", format!("{} is not a constructor", f));
        }
        let instance = Object::plain();
        if let Value::Object(p) = self.get_property(f, "prototype")? {
            instance.borrow_mut().proto = Some(p);
        }
        match self.call(f, Value::Object(instance.clone()), args)? {
            result @ Value::Object(_) => Ok(result),
            _ => Ok(Value::Object(instance)),
        }
    }

    fn closure(&mut self, f: &Rc<Function>, ctx: &Ctx) -> Value {
        // a named function expression sees its own name
        let scope = match &f.id {
            Some(_) => Scope::child(&ctx.scope),
            None => ctx.scope.clone(),
        };
        let value = Value::Object(Object::function(Callable::Closure(f.clone(), scope.clone())));
        if let Some(id) = &f.id {
            scope.borrow_mut().vars.insert(id.clone(), value.clone());
        }
        value
    }

    fn args(&mut self, args: &[Expr], ctx: &Ctx) -> Eval<Vec<Value>> {
        args.iter().map(|a|self.eval(a, ctx)).collect()
    }

    ////////////////
    //
    // Statements
    //
    ////////////////

    fn exec_block(&mut self, stmts: &[Stmt], ctx: &Ctx) -> Eval<Completion> {
        for s in stmts {
            if let Stmt::Function(f) = s {
                if let Some(id) = &f.id {
                    let value = Value::Object(Object::function(Callable::Closure(f.clone(), ctx.scope.clone())));
                    self.define(&ctx.scope, id, value);
                }
            }
        }
        for s in stmts {
            match self.exec(s, ctx)? {
                Completion::Normal => {}
                other => return Ok(other),
            }
        }
        Ok(Completion::Normal)
    }

    fn exec_var(&mut self, decl: &VarDecl, ctx: &Ctx) -> Eval<()> {
        for d in &decl.declarations {
            let value = match &d.init {
                Some(init) => self.eval(init, ctx)?,
                None if decl.kind == VarKind::Var => continue,
                None => Value::Undefined,
            };
            match decl.kind {
                VarKind::Var => self.assign_var(&ctx.scope, &d.id, value),
                VarKind::Let | VarKind::Const => self.define(&ctx.scope, &d.id, value),
            }
        }
        Ok(())
    }

    fn exec(&mut self, s: &Stmt, ctx: &Ctx) -> Eval<Completion> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROWTH, || self.exec_inner(s, ctx))
    }

    /// Runs a loop body, returning Some when the loop should end with that completion.
    fn loop_body(&mut self, body: &Stmt, ctx: &Ctx) -> Eval<Option<Completion>> {
        match self.exec(body, ctx)? {
            Completion::Break => Ok(Some(Completion::Normal)),
            Completion::Return(v) => Ok(Some(Completion::Return(v))),
            Completion::Normal | Completion::Continue => Ok(None),
        }
    }

    fn exec_inner(&mut self, s: &Stmt, ctx: &Ctx) -> Eval<Completion> {
        match s {
            Stmt::Expr(e) => {
                self.eval(e, ctx)?;
            }
            Stmt::Var(decl) => self.exec_var(decl, ctx)?,
            Stmt::Function(_) | Stmt::Empty => {}
            Stmt::Return(arg) => {
                let value = match arg {
                    Some(e) => self.eval(e, ctx)?,
                    None => Value::Undefined,
                };
                return Ok(Completion::Return(value));
            }
            Stmt::If(test, cons, alt) => {
                if self.eval(test, ctx)?.truthy() {
                    return self.exec(cons, ctx);
                } else if let Some(alt) = alt {
                    return self.exec(alt, ctx);
                }
            }
            Stmt::Block(body) => return self.exec_block(body, &ctx.block()),
            Stmt::For(f) => {
                let ctx = ctx.block();
                match &f.init {
                    Some(ForInit::Var(decl)) => self.exec_var(decl, &ctx)?,
                    Some(ForInit::Expr(e)) => {
                        self.eval(e, &ctx)?;
                    }
                    None => {}
                }
                loop {
                    if let Some(test) = &f.test {
                        if !self.eval(test, &ctx)?.truthy() {
                            break;
                        }
                    }
                    if let Some(done) = self.loop_body(&f.body, &ctx)? {
                        return Ok(done);
                    }
                    if let Some(update) = &f.update {
                        self.eval(update, &ctx)?;
                    }
                }
            }
            Stmt::While(test, body) => {
                while self.eval(test, ctx)?.truthy() {
                    if let Some(done) = self.loop_body(body, ctx)? {
                        return Ok(done);
                    }
                }
            }
            Stmt::Switch(discriminant, cases) => {
                let value = self.eval(discriminant, ctx)?;
                let mut start = None;
                for (i,case) in cases.iter().enumerate() {
                    if let Some(test) = &case.test {
                        if self.eval(test, ctx)?.strict_equals(&value) {
                            start = Some(i);
                            break;
                        }
                    }
                }
                let start = start.or_else(||cases.iter().position(|c|c.test.is_none()));
                if let Some(start) = start {
                    let ctx = ctx.block();
                    for case in &cases[start..] {
                        match self.exec_block(&case.body, &ctx)? {
                            Completion::Normal => {}
                            Completion::Break => break,
                            other => return Ok(other),
                        }
                    }
                }
            }
            Stmt::Try(t) => {
                let mut result = self.exec_block(&t.block, &ctx.block());
                if let Some(handler) = &t.handler {
                    result = match result {
                        Err(Fault::Throw(thrown)) => {
                            trace!("caught {}", describe(&thrown));
                            let catch_ctx = ctx.block();
                            if let Some(param) = &handler.param {
                                catch_ctx.scope.borrow_mut().vars.insert(param.clone(), thrown);
                            }
                            self.exec_block(&handler.body, &catch_ctx)
                        }
                        other => other,
                    };
                }
                if let Some(finalizer) = &t.finalizer {
                    if let Err(Fault::Fatal(_)) = result {
                        return result;
                    }
                    match self.exec_block(finalizer, &ctx.block())? {
                        Completion::Normal => {}
                        other => return Ok(other),
                    }
                }
                return result;
            }
            Stmt::Throw(e) => {
                let thrown = self.eval(e, ctx)?;
                return Err(Fault::Throw(thrown));
            }
            Stmt::Break => return Ok(Completion::Break),
            Stmt::Continue => return Ok(Completion::Continue),
        }
        Ok(Completion::Normal)
    }

    ////////////////
    //
    // Expressions
    //
    ////////////////

    fn eval(&mut self, e: &Expr, ctx: &Ctx) -> Eval<Value> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROWTH, || self.eval_inner(e, ctx))
    }

    fn eval_inner(&mut self, e: &Expr, ctx: &Ctx) -> Eval<Value> {
        let value = match e {
            Expr::Ident(name) => match self.lookup(&ctx.scope, name) {
                Some(v) => v,
                None => return throw("ReferenceError", format!("{} is not defined", name)),
            },
            Expr::Lit(lit) => match lit {
                Lit::Num(n) => Value::Num(*n),
                Lit::Str(s) => Value::str(s),
                Lit::Bool(b) => Value::Bool(*b),
                Lit::Null => Value::Null,
            },
            Expr::This => ctx.this.clone(),
            Expr::Array(items) => Value::new_array(self.args(items, ctx)?),
            Expr::Object(props) => {
                let object = Object::plain();
                for (key,value) in props {
                    let value = self.eval(value, ctx)?;
                    let key = match key {
                        PropKey::Ident(name) | PropKey::Str(name) => name.clone(),
                        PropKey::Num(n) => number_to_string(*n),
                    };
                    object.borrow_mut().set(&key, value);
                }
                Value::Object(object)
            }
            Expr::Function(f) => self.closure(f, ctx),
            Expr::Arrow(a) => Value::Object(Object::function(Callable::Arrow(a.clone(), ctx.scope.clone(), ctx.this.clone()))),
            Expr::Call(callee, args) => {
                let (f, this) = match &**callee {
                    Expr::Member(object, property, computed) => {
                        let target = self.eval(object, ctx)?;
                        let key = self.property_key(property, *computed, ctx)?;
                        (self.get_property(&target, &key)?, target)
                    }
                    other => (self.eval(other, ctx)?, Value::Undefined),
                };
                let args = self.args(args, ctx)?;
                if !f.is_function() {
                    return throw("TypeError", format!("{} is not a function", print_expr(callee)));
                }
                self.call(&f, this, args)?
            }
            Expr::New(callee, args) => {
                let f = self.eval(callee, ctx)?;
                let args = self.args(args, ctx)?;
                self.construct(&f, args)?
            }
            Expr::Member(object, property, computed) => {
                let target = self.eval(object, ctx)?;
                let key = self.property_key(property, *computed, ctx)?;
                self.get_property(&target, &key)?
            }
            Expr::Assign(op, left, right) => {
                let place = self.place(left, ctx)?;
                let value = match op.binary() {
                    None => self.eval(right, ctx)?,
                    Some(binary) => {
                        let current = self.read(&place, ctx)?;
                        let operand = self.eval(right, ctx)?;
                        arithmetic(binary, &current, &operand)
                    }
                };
                self.write(&place, value.clone(), ctx)?;
                value
            }
            Expr::Logical(op, left, right) => {
                let left = self.eval(left, ctx)?;
                match (op, left.truthy()) {
                    (LogicalOp::And, true) | (LogicalOp::Or, false) => self.eval(right, ctx)?,
                    _ => left,
                }
            }
            Expr::Binary(op, left, right) => {
                let left = self.eval(left, ctx)?;
                let right = self.eval(right, ctx)?;
                match op {
                    BinaryOp::In => match &right {
                        Value::Object(o) => Value::Bool(o.borrow().lookup(&left.to_string()).is_some()),
                        _ => return throw("TypeError", format!("Cannot use 'in' operator to search for '{}' in {}", left, right)),
                    },
                    BinaryOp::InstanceOf => Value::Bool(self.instance_of(&left, &right)?),
                    op => arithmetic(*op, &left, &right),
                }
            }
            Expr::Unary(op, arg) => match op {
                UnaryOp::TypeOf => match &**arg {
                    Expr::Ident(name) => Value::str(self.lookup(&ctx.scope, name).map_or("undefined", |v|v.type_of())),
                    other => Value::str(self.eval(other, ctx)?.type_of()),
                },
                UnaryOp::Delete => match &**arg {
                    Expr::Member(_,_,_) => {
                        if let Place::Prop(Value::Object(o), key) = self.place(arg, ctx)? {
                            o.borrow_mut().remove(&key);
                        }
                        Value::Bool(true)
                    }
                    _ => Value::Bool(false),
                },
                op => {
                    let v = self.eval(arg, ctx)?;
                    match op {
                        UnaryOp::Not => Value::Bool(!v.truthy()),
                        UnaryOp::Neg => Value::Num(-v.to_number()),
                        UnaryOp::Plus => Value::Num(v.to_number()),
                        UnaryOp::BitNot => Value::Num(!v.to_int32() as f64),
                        _ => Value::Undefined,
                    }
                }
            },
            Expr::Update(op, prefix, arg) => {
                let place = self.place(arg, ctx)?;
                let old = self.read(&place, ctx)?.to_number();
                let new = match op {
                    UpdateOp::Inc => old + 1.0,
                    UpdateOp::Dec => old - 1.0,
                };
                self.write(&place, Value::Num(new), ctx)?;
                Value::Num(if *prefix { new } else { old })
            }
            Expr::Conditional(test, cons, alt) => {
                if self.eval(test, ctx)?.truthy() {
                    self.eval(cons, ctx)?
                } else {
                    self.eval(alt, ctx)?
                }
            }
            Expr::Sequence(items) => {
                let mut last = Value::Undefined;
                for item in items {
                    last = self.eval(item, ctx)?;
                }
                last
            }
        };
        Ok(value)
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Interpreter::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use crate::js::parse::parse;

    /// Runs `text` and returns the global `out` as a string.
    fn run(text: &str) -> String {
        let mut interp = Interpreter::new();
        let program = parse(text).unwrap();
        match interp.run(&program) {
            Ok(()) => {}
            Err(Fault::Throw(v)) => panic!("uncaught {}", describe(&v)),
            Err(Fault::Fatal(m)) => panic!("fatal {}", m),
        }
        let out = interp.global().borrow().get_own("out").unwrap_or(Value::Undefined);
        out.to_string()
    }

    fn fails(text: &str) -> Fault {
        let mut interp = Interpreter::new();
        match interp.run(&parse(text).unwrap()) {
            Ok(()) => panic!("expected failure"),
            Err(f) => f,
        }
    }

    #[test]
    fn arithmetic_and_strings() {
        assert_eq!(run("var out = 1 + 2 * 3 - 4 / 2;"), "5");
        assert_eq!(run("var out = 'a' + 1 + 2;"), "a12");
        assert_eq!(run("var out = 1 + 2 + 'a';"), "3a");
        assert_eq!(run("var out = -7 % 3;"), "-1");
        assert_eq!(run("var out = (5 >>> 1) + (-8 >> 1) + (1 << 31);"), "-2147483650");
        assert_eq!(run("var out = [1, 2] + '';"), "1,2");
        assert_eq!(run("var out = typeof nothing + typeof 1 + typeof null;"), "undefinednumberobject");
    }

    #[test]
    fn hoisting_and_closures() {
        let text = "var out = f(2); function f(x) { return g() + x; function g() { return y; } var y = 3; }";
        assert_eq!(run(text), "NaN");
        let counter = "function mk() { var n = 0; return function() { n++; return n; }; }\
            var c = mk(); c(); c(); var out = c();";
        assert_eq!(run(counter), "3");
    }

    #[test]
    fn block_scope() {
        assert_eq!(run("let a = 1; { let a = 2; } var out = a;"), "1");
        assert_eq!(run("var a = 1; { var a = 2; } var out = a;"), "2");
    }

    #[test]
    fn control_flow() {
        let text = "var out = ''; for (var i = 0; i < 10; i++) { if (i == 2) continue; if (i > 4) break; out += i; }";
        assert_eq!(run(text), "0134");
        let switch = "var out = ''; switch (2) { case 1: out += 'a'; case 2: out += 'b'; case 3: out += 'c'; break; default: out += 'd'; }";
        assert_eq!(run(switch), "bc");
        let default = "var out = ''; switch ('x') { case 1: out += 'a'; default: out += 'd'; }";
        assert_eq!(run(default), "d");
        assert_eq!(run("var out = 0; while (out < 5) out += 2;"), "6");
    }

    #[test]
    fn exceptions() {
        let text = "var out; try { null.x } catch (e) { out = e.name; } finally { out += '!'; }";
        assert_eq!(run(text), "TypeError!");
        assert_eq!(run("var out; try { throw 'boom' } catch (e) { out = e; }"), "boom");
        let ret = "function f() { try { return 1; } finally { out = 2; } } var out; f();";
        assert_eq!(run(ret), "2");
        match fails("undefinedThing();") {
            Fault::Throw(v) => assert_eq!(describe(&v), "ReferenceError: undefinedThing is not defined"),
            Fault::Fatal(m) => panic!("{}", m),
        }
    }

    #[test]
    fn this_and_new() {
        let text = "var o = {v: 4, get: function() { return this.v; }}; var out = o.get();";
        assert_eq!(run(text), "4");
        let ctor = "function P(x) { this.x = x; } P.prototype.twice = function() { return this.x * 2; };\
            var p = new P(21); var out = p.twice() + (p instanceof P ? '' : 'no');";
        assert_eq!(run(ctor), "42");
        assert_eq!(run("var out = this === window; var window = this;"), "false");
        assert_eq!(run("var window = this; var out = this === window;"), "true");
        assert_eq!(run("var g = 5; var out = this.g;"), "5");
    }

    #[test]
    fn call_and_apply() {
        let text = "function f(a, b) { return this.k + a + b; } var o = {k: 'k'};\
            var out = f.call(o, 1, 2) + f.apply(o, [3, 4]);";
        assert_eq!(run(text), "k12k34");
        assert_eq!(run("var out = (function() { return arguments.length; })(1, 2, 3);"), "3");
    }

    #[test]
    fn arrows_capture_this() {
        let text = "var o = {v: 1, f: function() { return [1, 2].map(x => x + this.v); }}; var out = o.f();";
        assert_eq!(run(text), "2,3");
    }

    #[test]
    fn array_methods() {
        let text = "var a = [1, 2, 3, 4, 5]; a.splice(1, 2); a.reverse(); a.push(9); a.unshift(a.shift() + 10);\
            var out = a.join('-') + '|' + a.slice(-2) + '|' + a.indexOf(9);";
        assert_eq!(run(text), "15-4-1-9|1,9|3");
        assert_eq!(run("var a = []; a[3] = 1; var out = a.length;"), "4");
        assert_eq!(run("var a = [1]; a.push(a); var out = a.join();"), "1,");
    }

    #[test]
    fn string_methods() {
        let text = "var s = 'abcdef'; var out = s.split('').reverse().join('') + s.charAt(1) + s.charCodeAt(0)\
            + s.indexOf('cd') + s.slice(-2) + s.substring(4, 2) + s.substr(1, 2) + s.replace('b', 'X') + s.length + s[2];";
        assert_eq!(run(text), "fedcbab972efcdbcaXcdef6c");
        assert_eq!(run("var out = String.fromCharCode(72, 105) + Math.floor(-1.5) + parseInt('12ab');"), "Hi-212");
        assert_eq!(run("var out = decodeURIComponent('%41%20b') + encodeURIComponent('a=b');"), "A ba%3Db");
    }

    #[test]
    fn huge_array_writes_do_not_allocate() {
        assert_eq!(run("var b = []; b[3000000000] = 1; var out = b[3000000000] + ',' + b.length;"), "1,0");
        let text = "var out; var b = [1]; try { b.length = 1e10; } catch (e) { out = e.name + b.length; }";
        assert_eq!(run(text), "RangeError1");
    }

    #[test]
    fn large_and_small_numbers_use_exponents() {
        assert_eq!(run("var out = String(1e21) + ',' + String(1.5e-7) + ',' + (2e25 + '');"), "1e+21,1.5e-7,2e+25");
    }

    #[test]
    fn deep_recursion_is_fatal() {
        match fails("function f(n) { return f(n + 1); } try { f(0); } catch (e) {}") {
            Fault::Fatal(m) => assert!(m.contains("call stack")),
            Fault::Throw(v) => panic!("caught {}", describe(&v)),
        }
    }

    #[test]
    fn undefined_stand_in_fields_fail() {
        match fails("var self = this; self.extra.y;") {
            Fault::Throw(v) => assert!(describe(&v).starts_with("TypeError")),
            Fault::Fatal(m) => panic!("{}", m),
        }
    }
}
