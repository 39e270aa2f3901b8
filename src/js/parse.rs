use std::rc::Rc;
use nom::IResult;
use nom::branch::alt;
use nom::bytes::complete::{tag,take_while,take_while1};
use nom::character::complete::{anychar,char,digit0,digit1,one_of};
use nom::combinator::{all_consuming,map,not,opt,peek,recognize,value,verify};
use nom::error::ErrorKind;
use nom::multi::{many0,separated_list,separated_nonempty_list};
use nom::sequence::{delimited,pair,preceded,terminated,tuple};
use crate::js::ast::*;

/// Red zone and growth size handed to `stacker` on every recursive descent step.
const STACK_RED_ZONE: usize = 64 * 1024;
const STACK_GROWTH: usize = 1024 * 1024;

#[derive(Debug,Clone,PartialEq,Eq)]
pub struct ParseError {
    pub pos: Pos
}

impl<'a> nom::error::ParseError<&'a str> for ParseError {
    fn from_error_kind(input: &'a str, _kind: ErrorKind) -> Self {
        ParseError { pos: input.len() }
    }
    fn append(_input: &'a str, _kind: ErrorKind, other: Self) -> Self {
        other
    }
}

type PResult<'a, T> = IResult<&'a str, T, ParseError>;

fn error<T>(input: &str) -> PResult<T> {
    Err(nom::Err::Error(ParseError{pos: input.len()}))
}

fn fail<T>(input: &str) -> PResult<T> {
    Err(nom::Err::Failure(ParseError{pos: input.len()}))
}

fn eof(input: &str) -> PResult<()> {
    if input.is_empty() {
        Ok((input,()))
    } else {
        error(input)
    }
}

/// Zero or more whitespace, including comments
fn ws0(input: &str) -> PResult<()> {
    let mut rest = input;
    loop {
        let trimmed = rest.trim_start();
        if trimmed.starts_with("//") {
            rest = match trimmed.find('\n') {
                Some(i) => &trimmed[i..],
                None => "",
            };
        } else if trimmed.starts_with("/*") {
            match trimmed[2..].find("*/") {
                Some(i) => rest = &trimmed[i + 4..],
                None => return fail(trimmed),
            }
        } else {
            return Ok((trimmed,()));
        }
    }
}

/// Succeeds without consuming when the next char can't continue a word
fn word_gap(input: &str) -> PResult<()> {
    match input.chars().next() {
        Some(c) if is_ident_char(c) => error(input),
        _ => Ok((input,())),
    }
}

fn symbol(sym:&'static str) -> impl Fn(&str) -> PResult<()> {
    move|input| {
        preceded(tag(sym), ws0)(input)
    }
}

/// A punctuator that must not be directly followed by any char of `not_before`,
/// so that `+` doesn't eat the start of `++` or `+=`.
fn op(sym:&'static str, not_before:&'static str) -> impl Fn(&str) -> PResult<()> {
    move|input| {
        let (input,_) = tag(sym)(input)?;
        let (input,_) = not(one_of(not_before))(input)?;
        ws0(input)
    }
}

fn keyword(kw:&'static str) -> impl Fn(&str) -> PResult<()> {
    move|input| {
        let (input,_) = tag(kw)(input)?;
        let (input,_) = word_gap(input)?;
        ws0(input)
    }
}

/// Any identifier-shaped word, reserved or not. Used for property names.
fn ident_name(input: &str) -> PResult<&str> {
    terminated(
        recognize(preceded(verify(anychar, |c:&char|is_ident_start(*c)), take_while(is_ident_char))),
        ws0)(input)
}

fn ident(input: &str) -> PResult<Name> {
    let (rest,word) = ident_name(input)?;
    if is_reserved(word) {
        error(input)
    } else {
        Ok((rest,word.to_string()))
    }
}

/////////////
//
// Literals
//
/////////////

fn hex_number(input: &str) -> PResult<f64> {
    let (rest,digits) = preceded(alt((tag("0x"),tag("0X"))), take_while1(|c:char|c.is_ascii_hexdigit()))(input)?;
    let (rest,_) = word_gap(rest)?;
    let (rest,_) = ws0(rest)?;
    match u64::from_str_radix(digits, 16) {
        Ok(n) => Ok((rest,n as f64)),
        Err(_) => fail(input)
    }
}

fn decimal_number(input: &str) -> PResult<f64> {
    let (rest,text) = recognize(tuple((
        alt((
            recognize(pair(digit1, opt(pair(char('.'), digit0)))),
            recognize(pair(char('.'), digit1)),
        )),
        opt(tuple((one_of("eE"), opt(one_of("+-")), digit1))),
    )))(input)?;
    let (rest,_) = word_gap(rest)?;
    let (rest,_) = ws0(rest)?;
    match text.parse() {
        Ok(n) => Ok((rest,n)),
        Err(_) => fail(input)
    }
}

fn number(input: &str) -> PResult<f64> {
    alt((hex_number, decimal_number))(input)
}

fn hex_code<I:Iterator<Item=(usize,char)>>(chars: &mut I, count: usize) -> Option<u32> {
    let mut code = 0;
    for _ in 0..count {
        let (_,c) = chars.next()?;
        code = code * 16 + c.to_digit(16)?;
    }
    Some(code)
}

fn hex_escape<I:Iterator<Item=(usize,char)>>(chars: &mut I, count: usize) -> Option<char> {
    let code = hex_code(chars, count)?;
    Some(std::char::from_u32(code).unwrap_or('\u{fffd}'))
}

/// `\u{1F600}`, or `\uXXXX` where a high surrogate followed by a low one
/// forms a single character. Unpaired surrogates become U+FFFD.
fn unicode_escape<I:Iterator<Item=(usize,char)>+Clone>(chars: &mut I) -> Option<char> {
    let mut ahead = chars.clone();
    if let Some((_,'{')) = ahead.next() {
        let mut code: u32 = 0;
        let mut digits = 0;
        loop {
            let (_,c) = ahead.next()?;
            if c == '}' {
                break;
            }
            code = code.checked_mul(16)?.checked_add(c.to_digit(16)?)?;
            digits += 1;
        }
        if digits == 0 || code > 0x10ffff {
            return None;
        }
        *chars = ahead;
        return Some(std::char::from_u32(code).unwrap_or('\u{fffd}'));
    }
    let high = hex_code(chars, 4)?;
    if (0xd800..0xdc00).contains(&high) {
        let mut ahead = chars.clone();
        if let (Some((_,'\\')), Some((_,'u'))) = (ahead.next(), ahead.next()) {
            if let Some(low) = hex_code(&mut ahead, 4).filter(|low|(0xdc00..0xe000).contains(low)) {
                *chars = ahead;
                return std::char::from_u32(0x10000 + ((high - 0xd800) << 10) + (low - 0xdc00));
            }
        }
    }
    Some(std::char::from_u32(high).unwrap_or('\u{fffd}'))
}

fn string_lit(input: &str) -> PResult<String> {
    let quote = match input.chars().next() {
        Some(q) if q == '"' || q == '\'' => q,
        _ => return error(input)
    };
    let body = &input[1..];
    let mut result = String::new();
    let mut chars = body.char_indices();
    while let Some((i,c)) = chars.next() {
        if c == quote {
            let (rest,_) = ws0(&body[i + 1..])?;
            return Ok((rest,result));
        }
        match c {
            '\\' => {
                let escaped = match chars.next() {
                    Some((_,e)) => e,
                    None => return fail(input)
                };
                match escaped {
                    'n' => result.push('\n'),
                    't' => result.push('\t'),
                    'r' => result.push('\r'),
                    'b' => result.push('\u{8}'),
                    'f' => result.push('\u{c}'),
                    'v' => result.push('\u{b}'),
                    '0' => result.push('\0'),
                    'x' => match hex_escape(&mut chars, 2) {
                        Some(ch) => result.push(ch),
                        None => return fail(input)
                    },
                    'u' => match unicode_escape(&mut chars) {
                        Some(ch) => result.push(ch),
                        None => return fail(input)
                    },
                    '\n' => {}
                    other => result.push(other),
                }
            }
            '\n' => return fail(&body[i..]),
            _ => result.push(c),
        }
    }
    fail(input)
}

/////////////
//
// Expressions
//
/////////////

#[derive(Clone,Copy,PartialEq,Eq,Debug)]
enum Infix {
    Logical(LogicalOp),
    Binary(BinaryOp),
}

impl Infix {
    fn combine(self,a:Expr,b:Expr) -> Expr {
        match self {
            Infix::Logical(o) => Expr::Logical(o, Box::new(a), Box::new(b)),
            Infix::Binary(o) => Expr::Binary(o, Box::new(a), Box::new(b)),
        }
    }
}

/// (token, chars that must not follow it, is it a word operator, operator)
type InfixTable = &'static [(&'static str, &'static str, bool, Infix)];

const LOGICAL_OR: InfixTable = &[("||", "=", false, Infix::Logical(LogicalOp::Or))];
const LOGICAL_AND: InfixTable = &[("&&", "=", false, Infix::Logical(LogicalOp::And))];
const BIT_OR: InfixTable = &[("|", "|=", false, Infix::Binary(BinaryOp::BitOr))];
const BIT_XOR: InfixTable = &[("^", "=", false, Infix::Binary(BinaryOp::BitXor))];
const BIT_AND: InfixTable = &[("&", "&=", false, Infix::Binary(BinaryOp::BitAnd))];
const EQUALITY: InfixTable = &[
    ("===", "", false, Infix::Binary(BinaryOp::StrictEq)),
    ("!==", "", false, Infix::Binary(BinaryOp::StrictNotEq)),
    ("==", "", false, Infix::Binary(BinaryOp::Eq)),
    ("!=", "", false, Infix::Binary(BinaryOp::NotEq)),
];
const RELATIONAL: InfixTable = &[
    ("<=", "", false, Infix::Binary(BinaryOp::LtEq)),
    (">=", "", false, Infix::Binary(BinaryOp::GtEq)),
    ("<", "<", false, Infix::Binary(BinaryOp::Lt)),
    (">", ">", false, Infix::Binary(BinaryOp::Gt)),
    ("instanceof", "", true, Infix::Binary(BinaryOp::InstanceOf)),
    ("in", "", true, Infix::Binary(BinaryOp::In)),
];
const SHIFT: InfixTable = &[
    (">>>", "=", false, Infix::Binary(BinaryOp::UShr)),
    (">>", ">=", false, Infix::Binary(BinaryOp::Shr)),
    ("<<", "=", false, Infix::Binary(BinaryOp::Shl)),
];
const ADDITIVE: InfixTable = &[
    ("+", "+=", false, Infix::Binary(BinaryOp::Add)),
    ("-", "-=", false, Infix::Binary(BinaryOp::Sub)),
];
const MULTIPLICATIVE: InfixTable = &[
    ("*", "=", false, Infix::Binary(BinaryOp::Mul)),
    ("/", "=", false, Infix::Binary(BinaryOp::Div)),
    ("%", "=", false, Infix::Binary(BinaryOp::Rem)),
];

fn infix_token(input: &str, table: InfixTable) -> Option<(&str, Infix)> {
    for &(sym, not_before, word, infix) in table {
        let parsed = if word {
            keyword(sym)(input)
        } else {
            op(sym, not_before)(input)
        };
        if let Ok((rest,())) = parsed {
            return Some((rest, infix));
        }
    }
    None
}

/// Left-associative chain of `next` separated by any operator in `table`
fn infix_chain<'a>(input: &'a str, table: InfixTable, next: fn(&str) -> PResult<Expr>) -> PResult<'a, Expr> {
    let (mut input,mut left) = next(input)?;
    while let Some((rest,infix)) = infix_token(input, table) {
        let (rest,right) = next(rest)?;
        left = infix.combine(left, right);
        input = rest;
    }
    Ok((input,left))
}

fn logical_or(input: &str) -> PResult<Expr> {
    infix_chain(input, LOGICAL_OR, logical_and)
}
fn logical_and(input: &str) -> PResult<Expr> {
    infix_chain(input, LOGICAL_AND, bit_or)
}
fn bit_or(input: &str) -> PResult<Expr> {
    infix_chain(input, BIT_OR, bit_xor)
}
fn bit_xor(input: &str) -> PResult<Expr> {
    infix_chain(input, BIT_XOR, bit_and)
}
fn bit_and(input: &str) -> PResult<Expr> {
    infix_chain(input, BIT_AND, equality)
}
fn equality(input: &str) -> PResult<Expr> {
    infix_chain(input, EQUALITY, relational)
}
fn relational(input: &str) -> PResult<Expr> {
    infix_chain(input, RELATIONAL, shift)
}
fn shift(input: &str) -> PResult<Expr> {
    infix_chain(input, SHIFT, additive)
}
fn additive(input: &str) -> PResult<Expr> {
    infix_chain(input, ADDITIVE, multiplicative)
}
fn multiplicative(input: &str) -> PResult<Expr> {
    infix_chain(input, MULTIPLICATIVE, unary)
}

fn unary_op(input: &str) -> PResult<UnaryOp> {
    alt((
        value(UnaryOp::Not, op("!", "=")),
        value(UnaryOp::Neg, op("-", "-=")),
        value(UnaryOp::Plus, op("+", "+=")),
        value(UnaryOp::BitNot, op("~", "")),
        value(UnaryOp::TypeOf, keyword("typeof")),
        value(UnaryOp::Void, keyword("void")),
        value(UnaryOp::Delete, keyword("delete")),
    ))(input)
}

fn update_op(input: &str) -> PResult<UpdateOp> {
    alt((
        value(UpdateOp::Inc, symbol("++")),
        value(UpdateOp::Dec, symbol("--")),
    ))(input)
}

fn unary(input: &str) -> PResult<Expr> {
    if let Ok((rest,o)) = unary_op(input) {
        let (rest,arg) = unary(rest)?;
        return Ok((rest,Expr::Unary(o, Box::new(arg))));
    }
    if let Ok((rest,o)) = update_op(input) {
        let (rest,arg) = unary(rest)?;
        return Ok((rest,Expr::Update(o, true, Box::new(arg))));
    }
    let (rest,e) = call_member(input)?;
    match update_op(rest) {
        Ok((rest2,o)) => Ok((rest2,Expr::Update(o, false, Box::new(e)))),
        Err(_) => Ok((rest,e)),
    }
}

fn arguments(input: &str) -> PResult<Vec<Expr>> {
    let (input,_) = symbol("(")(input)?;
    let (input,args) = separated_list(symbol(","), assign_expr)(input)?;
    let (input,_) = opt(symbol(","))(input)?;
    let (input,_) = symbol(")")(input)?;
    Ok((input,args))
}

/// Applies `.name`, `[expr]` and, when `calls` is set, `(args)` suffixes to `e`
fn member_tail(mut input: &str, mut e: Expr, calls: bool) -> PResult<Expr> {
    loop {
        if let Ok((rest,())) = op(".", ".")(input) {
            let (rest,name) = ident_name(rest)?;
            e = Expr::Member(Box::new(e), Box::new(Expr::ident(name)), false);
            input = rest;
        } else if let Ok((rest,())) = symbol("[")(input) {
            let (rest,prop) = expr(rest)?;
            let (rest,_) = symbol("]")(rest)?;
            e = Expr::Member(Box::new(e), Box::new(prop), true);
            input = rest;
        } else if calls && input.starts_with('(') {
            let (rest,args) = arguments(input)?;
            e = Expr::call(e, args);
            input = rest;
        } else {
            return Ok((input,e));
        }
    }
}

fn new_expr(input: &str) -> PResult<Expr> {
    let (input,_) = keyword("new")(input)?;
    let (input,callee) = alt((new_expr, primary))(input)?;
    let (input,callee) = member_tail(input, callee, false)?;
    let (input,args) = opt(arguments)(input)?;
    Ok((input,Expr::New(Box::new(callee), args.unwrap_or_else(Vec::new))))
}

fn call_member(input: &str) -> PResult<Expr> {
    let (input,e) = alt((new_expr, primary))(input)?;
    member_tail(input, e, true)
}

fn prop_key(input: &str) -> PResult<PropKey> {
    alt((
        map(string_lit, PropKey::Str),
        map(number, PropKey::Num),
        map(ident_name, |n|PropKey::Ident(n.to_string())),
    ))(input)
}

fn object_lit(input: &str) -> PResult<Expr> {
    let (input,_) = symbol("{")(input)?;
    let (input,props) = separated_list(symbol(","), pair(terminated(prop_key, symbol(":")), assign_expr))(input)?;
    let (input,_) = opt(symbol(","))(input)?;
    let (input,_) = symbol("}")(input)?;
    Ok((input,Expr::Object(props)))
}

fn array_lit(input: &str) -> PResult<Expr> {
    let (input,_) = symbol("[")(input)?;
    let (input,elements) = separated_list(symbol(","), assign_expr)(input)?;
    let (input,_) = opt(symbol(","))(input)?;
    let (input,_) = symbol("]")(input)?;
    Ok((input,Expr::Array(elements)))
}

fn params(input: &str) -> PResult<Vec<Name>> {
    delimited(symbol("("), separated_list(symbol(","), ident), symbol(")"))(input)
}

fn function_expr(input: &str) -> PResult<Expr> {
    let (input,_) = keyword("function")(input)?;
    let (input,id) = opt(ident)(input)?;
    let (input,params) = params(input)?;
    let (input,body) = block_body(input)?;
    Ok((input,Expr::Function(Rc::new(Function{id, params, body}))))
}

fn primary(input: &str) -> PResult<Expr> {
    alt((
        map(number, |n|Expr::Lit(Lit::Num(n))),
        map(string_lit, |s|Expr::Lit(Lit::Str(s))),
        value(Expr::Lit(Lit::Bool(true)), keyword("true")),
        value(Expr::Lit(Lit::Bool(false)), keyword("false")),
        value(Expr::Lit(Lit::Null), keyword("null")),
        value(Expr::This, keyword("this")),
        function_expr,
        array_lit,
        object_lit,
        delimited(symbol("("), expr, symbol(")")),
        map(ident, Expr::Ident),
    ))(input)
}

fn arrow_fn(input: &str) -> PResult<Expr> {
    let (input,params) = alt((
        map(ident, |n|vec![n]),
        params,
    ))(input)?;
    let (input,_) = symbol("=>")(input)?;
    let (input,body) = alt((
        map(block_body, ArrowBody::Block),
        map(assign_expr, ArrowBody::Expr),
    ))(input)?;
    Ok((input,Expr::Arrow(Rc::new(Arrow{params, body}))))
}

fn conditional(input: &str) -> PResult<Expr> {
    let (input,test) = logical_or(input)?;
    match symbol("?")(input) {
        Ok((rest,())) => {
            let (rest,cons) = assign_expr(rest)?;
            let (rest,_) = symbol(":")(rest)?;
            let (rest,alt) = assign_expr(rest)?;
            Ok((rest,Expr::Conditional(Box::new(test), Box::new(cons), Box::new(alt))))
        }
        Err(_) => Ok((input,test))
    }
}

fn assign_op(input: &str) -> PResult<AssignOp> {
    alt((
        value(AssignOp::UShr, symbol(">>>=")),
        value(AssignOp::Shr, symbol(">>=")),
        value(AssignOp::Shl, symbol("<<=")),
        value(AssignOp::Add, symbol("+=")),
        value(AssignOp::Sub, symbol("-=")),
        value(AssignOp::Mul, symbol("*=")),
        value(AssignOp::Div, symbol("/=")),
        value(AssignOp::Rem, symbol("%=")),
        value(AssignOp::BitAnd, symbol("&=")),
        value(AssignOp::BitOr, symbol("|=")),
        value(AssignOp::BitXor, symbol("^=")),
        value(AssignOp::Assign, op("=", "=>")),
    ))(input)
}

fn is_assign_target(e: &Expr) -> bool {
    match e {
        Expr::Ident(_) | Expr::Member(_,_,_) => true,
        _ => false
    }
}

fn assign_expr(input: &str) -> PResult<Expr> {
    stacker::maybe_grow(STACK_RED_ZONE, STACK_GROWTH, || {
        if let Ok(result) = arrow_fn(input) {
            return Ok(result);
        }
        let (rest,left) = conditional(input)?;
        match assign_op(rest) {
            Ok((rest2,o)) => {
                if !is_assign_target(&left) {
                    return error(rest);
                }
                let (rest2,right) = assign_expr(rest2)?;
                Ok((rest2,Expr::Assign(o, Box::new(left), Box::new(right))))
            }
            Err(_) => Ok((rest,left))
        }
    })
}

fn expr(input: &str) -> PResult<Expr> {
    let (input,mut exprs) = separated_nonempty_list(symbol(","), assign_expr)(input)?;
    if exprs.len() == 1 {
        Ok((input,exprs.remove(0)))
    } else {
        Ok((input,Expr::Sequence(exprs)))
    }
}

///////////////
//
// Statements
//
///////////////

/// Statement terminator: a semicolon, or nothing before `}` or the end of input
fn semi(input: &str) -> PResult<()> {
    alt((
        symbol(";"),
        value((), peek(tag("}"))),
        eof,
    ))(input)
}

fn block_body(input: &str) -> PResult<Vec<Stmt>> {
    delimited(symbol("{"), many0(statement), symbol("}"))(input)
}

fn var_kind(input: &str) -> PResult<VarKind> {
    alt((
        value(VarKind::Var, keyword("var")),
        value(VarKind::Let, keyword("let")),
        value(VarKind::Const, keyword("const")),
    ))(input)
}

fn declarator(input: &str) -> PResult<Declarator> {
    let (input,id) = ident(input)?;
    let (input,init) = opt(preceded(op("=", "=>"), assign_expr))(input)?;
    Ok((input,Declarator{id, init}))
}

fn var_decl(input: &str) -> PResult<VarDecl> {
    let (input,kind) = var_kind(input)?;
    let (input,declarations) = separated_nonempty_list(symbol(","), declarator)(input)?;
    Ok((input,VarDecl{kind, declarations}))
}

fn var_stmt(input: &str) -> PResult<Stmt> {
    map(terminated(var_decl, semi), Stmt::Var)(input)
}

fn function_decl(input: &str) -> PResult<Stmt> {
    let (input,_) = keyword("function")(input)?;
    let (input,id) = ident(input)?;
    let (input,params) = params(input)?;
    let (input,body) = block_body(input)?;
    Ok((input,Stmt::Function(Rc::new(Function{id: Some(id), params, body}))))
}

fn paren_expr(input: &str) -> PResult<Expr> {
    delimited(symbol("("), expr, symbol(")"))(input)
}

fn return_stmt(input: &str) -> PResult<Stmt> {
    let (input,_) = keyword("return")(input)?;
    let (input,arg) = opt(expr)(input)?;
    let (input,_) = semi(input)?;
    Ok((input,Stmt::Return(arg)))
}

fn if_stmt(input: &str) -> PResult<Stmt> {
    let (input,_) = keyword("if")(input)?;
    let (input,test) = paren_expr(input)?;
    let (input,cons) = statement(input)?;
    let (input,alt) = opt(preceded(keyword("else"), statement))(input)?;
    Ok((input,Stmt::If(test, Box::new(cons), alt.map(Box::new))))
}

fn for_init(input: &str) -> PResult<ForInit> {
    alt((
        map(var_decl, ForInit::Var),
        map(expr, ForInit::Expr),
    ))(input)
}

fn for_stmt(input: &str) -> PResult<Stmt> {
    let (input,_) = keyword("for")(input)?;
    let (input,_) = symbol("(")(input)?;
    let (input,init) = opt(for_init)(input)?;
    let (input,_) = symbol(";")(input)?;
    let (input,test) = opt(expr)(input)?;
    let (input,_) = symbol(";")(input)?;
    let (input,update) = opt(expr)(input)?;
    let (input,_) = symbol(")")(input)?;
    let (input,body) = statement(input)?;
    Ok((input,Stmt::For(ForStmt{init, test, update, body: Box::new(body)})))
}

fn while_stmt(input: &str) -> PResult<Stmt> {
    let (input,_) = keyword("while")(input)?;
    let (input,test) = paren_expr(input)?;
    let (input,body) = statement(input)?;
    Ok((input,Stmt::While(test, Box::new(body))))
}

fn switch_case(input: &str) -> PResult<SwitchCase> {
    let (input,test) = alt((
        map(delimited(keyword("case"), expr, symbol(":")), Some),
        value(None, terminated(keyword("default"), symbol(":"))),
    ))(input)?;
    let (input,body) = many0(statement)(input)?;
    Ok((input,SwitchCase{test, body}))
}

fn switch_stmt(input: &str) -> PResult<Stmt> {
    let (input,_) = keyword("switch")(input)?;
    let (input,disc) = paren_expr(input)?;
    let (input,cases) = delimited(symbol("{"), many0(switch_case), symbol("}"))(input)?;
    Ok((input,Stmt::Switch(disc, cases)))
}

fn catch_clause(input: &str) -> PResult<CatchClause> {
    let (input,_) = keyword("catch")(input)?;
    let (input,param) = opt(delimited(symbol("("), ident, symbol(")")))(input)?;
    let (input,body) = block_body(input)?;
    Ok((input,CatchClause{param, body}))
}

fn try_stmt(input: &str) -> PResult<Stmt> {
    let start = input;
    let (input,_) = keyword("try")(input)?;
    let (input,block) = block_body(input)?;
    let (input,handler) = opt(catch_clause)(input)?;
    let (input,finalizer) = opt(preceded(keyword("finally"), block_body))(input)?;
    if handler.is_none() && finalizer.is_none() {
        return error(start);
    }
    Ok((input,Stmt::Try(TryStmt{block, handler, finalizer})))
}

fn throw_stmt(input: &str) -> PResult<Stmt> {
    map(delimited(keyword("throw"), expr, semi), Stmt::Throw)(input)
}

fn expr_stmt(input: &str) -> PResult<Stmt> {
    map(terminated(expr, semi), Stmt::Expr)(input)
}

fn statement(input: &str) -> PResult<Stmt> {
    stacker::maybe_grow(STACK_RED_ZONE, STACK_GROWTH, || {
        alt((
            map(block_body, Stmt::Block),
            var_stmt,
            function_decl,
            return_stmt,
            if_stmt,
            for_stmt,
            while_stmt,
            switch_stmt,
            try_stmt,
            throw_stmt,
            value(Stmt::Break, terminated(keyword("break"), semi)),
            value(Stmt::Continue, terminated(keyword("continue"), semi)),
            value(Stmt::Empty, symbol(";")),
            expr_stmt,
        ))(input)
    })
}

fn parse_program(input: &str) -> PResult<Program> {
    let (input,_) = ws0(input)?;
    let (input,body) = many0(statement)(input)?;
    Ok((input,Program{body}))
}

pub fn parse(input: &str) -> Result<Program, ParseError> {
    match all_consuming(parse_program)(input) {
        Ok((_,program)) => Ok(program),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(e),
        Err(nom::Err::Incomplete(_)) => Err(ParseError{pos:0})
    }
}

/// Parses a single expression, surrounding whitespace allowed.
pub fn parse_expr(input: &str) -> Result<Expr, ParseError> {
    match all_consuming(preceded(ws0, expr))(input) {
        Ok((_,e)) => Ok(e),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(e),
        Err(nom::Err::Incomplete(_)) => Err(ParseError{pos:0})
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn num(n: f64) -> Expr {
        Expr::Lit(Lit::Num(n))
    }

    #[test]
    fn precedence_of_binary_operators() {
        let e = parse_expr("a + b * 2 - c").unwrap();
        let expected = Expr::Binary(BinaryOp::Sub,
            Box::new(Expr::Binary(BinaryOp::Add,
                Box::new(Expr::ident("a")),
                Box::new(Expr::Binary(BinaryOp::Mul, Box::new(Expr::ident("b")), Box::new(num(2.0)))))),
            Box::new(Expr::ident("c")));
        assert_eq!(e, expected);
    }

    #[test]
    fn operators_sharing_a_prefix() {
        let e = parse_expr("a===b").unwrap();
        assert_eq!(e, Expr::Binary(BinaryOp::StrictEq, Box::new(Expr::ident("a")), Box::new(Expr::ident("b"))));
        let e = parse_expr("a>>>=2").unwrap();
        assert_eq!(e, Expr::Assign(AssignOp::UShr, Box::new(Expr::ident("a")), Box::new(num(2.0))));
        let e = parse_expr("a++ + +b").unwrap();
        assert_eq!(e, Expr::Binary(BinaryOp::Add,
            Box::new(Expr::Update(UpdateOp::Inc, false, Box::new(Expr::ident("a")))),
            Box::new(Expr::Unary(UnaryOp::Plus, Box::new(Expr::ident("b"))))));
    }

    #[test]
    fn unicode_escapes() {
        assert_eq!(parse_expr(r"'\uD83D\uDE00'").unwrap(), Expr::str("\u{1F600}"));
        assert_eq!(parse_expr(r"'\u{1F600}!'").unwrap(), Expr::str("\u{1F600}!"));
        assert_eq!(parse_expr(r"'A\x42'").unwrap(), Expr::str("AB"));
        assert_eq!(parse_expr(r"'\uD83Dx'").unwrap(), Expr::str("\u{fffd}x"));
        assert!(parse_expr(r"'\u{110000}'").is_err());
    }

    #[test]
    fn guard_statement_shape() {
        let e = parse_expr("c&&(c=Xy(decodeURIComponent(c)),a.set(b,encodeURIComponent(c)))").unwrap();
        match e {
            Expr::Logical(LogicalOp::And, left, right) => {
                assert_eq!(*left, Expr::ident("c"));
                match *right {
                    Expr::Sequence(items) => assert_eq!(items.len(), 2),
                    other => panic!("expected sequence, got {:?}", other),
                }
            }
            other => panic!("expected logical and, got {:?}", other),
        }
    }

    #[test]
    fn member_and_call_chains() {
        let e = parse_expr("a.b[0](c).d").unwrap();
        let expected = Expr::dot(
            Expr::call(
                Expr::Member(Box::new(Expr::dot(Expr::ident("a"), "b")), Box::new(num(0.0)), true),
                vec![Expr::ident("c")]),
            "d");
        assert_eq!(e, expected);
    }

    #[test]
    fn reserved_words_allowed_as_property_names() {
        let e = parse_expr("a.default.new").unwrap();
        assert_eq!(e, Expr::dot(Expr::dot(Expr::ident("a"), "default"), "new"));
    }

    #[test]
    fn arrow_functions() {
        let e = parse_expr("n=>f(n)").unwrap();
        assert_eq!(e, Expr::arrow(vec!["n".to_string()], Expr::call(Expr::ident("f"), vec![Expr::ident("n")])));
        let e = parse_expr("(a,b)=>{return a}").unwrap();
        match e {
            Expr::Arrow(arrow) => {
                assert_eq!(arrow.params, vec!["a".to_string(), "b".to_string()]);
                assert_eq!(arrow.body, ArrowBody::Block(vec![Stmt::Return(Some(Expr::ident("a")))]));
            }
            other => panic!("expected arrow, got {:?}", other),
        }
    }

    #[test]
    fn literals() {
        assert_eq!(parse_expr("0x1F").unwrap(), num(31.0));
        assert_eq!(parse_expr(".5").unwrap(), num(0.5));
        assert_eq!(parse_expr("1e3").unwrap(), num(1000.0));
        assert_eq!(parse_expr(r#"'it\'s\x41B'"#).unwrap(), Expr::str("it'sAB"));
        assert_eq!(parse_expr(r#""a\"b""#).unwrap(), Expr::str("a\"b"));
    }

    #[test]
    fn statements_and_comments() {
        let program = parse("/* head */ var a = [b], c; // tail\nfunction f(x){try{x()}catch(e){return x[1]+e}return x}").unwrap();
        assert_eq!(program.body.len(), 2);
        match &program.body[1] {
            Stmt::Function(f) => {
                assert_eq!(f.id.as_ref().map(|s|s.as_str()), Some("f"));
                assert_eq!(f.body.len(), 2);
                assert!(matches!(f.body[0], Stmt::Try(_)));
            }
            other => panic!("expected function, got {:?}", other),
        }
    }

    #[test]
    fn control_flow_statements() {
        let program = parse("for(var i=0;i<3;i++){if(i==1)continue;else break}while(x)x--;switch(a){case 1:b();break;default:c()}").unwrap();
        assert_eq!(program.body.len(), 3);
        match &program.body[2] {
            Stmt::Switch(_, cases) => {
                assert_eq!(cases.len(), 2);
                assert!(cases[1].test.is_none());
            }
            other => panic!("expected switch, got {:?}", other),
        }
    }

    #[test]
    fn object_literals_and_new() {
        let e = parse_expr("{AB:function(a){a.reverse()},'x':1,2:null}").unwrap();
        match e {
            Expr::Object(props) => {
                assert_eq!(props.len(), 3);
                assert_eq!(props[0].0, PropKey::Ident("AB".to_string()));
                assert_eq!(props[1].0, PropKey::Str("x".to_string()));
                assert_eq!(props[2].0, PropKey::Num(2.0));
            }
            other => panic!("expected object, got {:?}", other),
        }
        let e = parse_expr("new a.B(1)").unwrap();
        assert_eq!(e, Expr::New(Box::new(Expr::dot(Expr::ident("a"), "B")), vec![num(1.0)]));
    }

    #[test]
    fn unsupported_syntax_is_rejected() {
        assert!(parse("var a = `template`;").is_err());
        assert!(parse("var a = [...b];").is_err());
        assert!(parse("class A {}").is_err());
    }

    #[test]
    fn error_position_points_at_bad_statement() {
        let text = "var a = 1;\nvar b = #;";
        let e = parse(text).unwrap_err();
        assert_eq!(e.pos, "var b = #;".len());
    }
}
