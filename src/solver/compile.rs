use std::fmt;
use std::rc::Rc;
use log::{debug,info};
use crate::js::ast::*;
use crate::js::parse::parse;
use crate::js::print::print_program;
use crate::solver::catalog::Catalog;
use crate::solver::extract::{extract,Candidate,TransformKind};

/// Name the reduced program assigns its two wrappers through.
pub const RESULT_BINDING: &str = "_result";

/// Page the location stand-in pretends to be on.
pub const CANONICAL_URL: &str = "https://www.youtube.com/watch?v=yt-dlp-wins";

#[derive(Debug,PartialEq)]
pub enum CompileError {
    Syntax{pos: Pos},
    StructureNotRecognized,
    CandidateNotFound(TransformKind),
    /// Printed wrappers of every distinct candidate
    CandidateAmbiguous(TransformKind, Vec<String>),
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CompileError::Syntax{pos} => write!(f, "syntax error {} bytes before end of input", pos),
            CompileError::StructureNotRecognized => write!(f, "unexpected top-level structure"),
            CompileError::CandidateNotFound(kind) => write!(f, "found 0 {} function possibilities", kind),
            CompileError::CandidateAmbiguous(kind, options) => write!(f, "found {} {} function possibilities: {}", options.len(), kind, options.join(", ")),
        }
    }
}

impl std::error::Error for CompileError {}

/// The module function and the number of its leading statements to skip, for the
/// two wrappers players ship in: `(function(g){..}).call(this)` on its own, or
/// `var x = ..; (function(g){..})(x)` where the first statement of the module is dropped.
fn module_function(program: &Program) -> Option<(&Function, usize)> {
    match program.body.as_slice() {
        [Stmt::Expr(Expr::Call(callee, _))] => match &**callee {
            Expr::Member(object, _, _) => object.as_function().map(|f|(f, 0)),
            Expr::Function(f) => Some((&**f, 0)),
            _ => None
        },
        [_, Stmt::Expr(Expr::Call(callee, _))] => callee.as_function().map(|f|(f, 1)),
        _ => None
    }
}

fn with_body(f: &Function, body: Vec<Stmt>) -> Expr {
    Expr::Function(Rc::new(Function{id: f.id.clone(), params: f.params.clone(), body}))
}

/// A copy of the program's wrapper around a new module body.
fn rewrap(program: &Program, body: Vec<Stmt>) -> Option<Program> {
    let (last, leading) = program.body.split_last()?;
    let call = match last {
        Stmt::Expr(Expr::Call(callee, args)) => {
            let callee = match &**callee {
                Expr::Member(object, property, computed) => {
                    Expr::Member(Box::new(with_body(object.as_function()?, body)), property.clone(), *computed)
                }
                Expr::Function(f) => with_body(f, body),
                _ => return None
            };
            Expr::Call(Box::new(callee), args.clone())
        }
        _ => return None
    };
    let mut statements = leading.to_vec();
    statements.push(Stmt::Expr(call));
    Some(Program{body: statements})
}

/// Expression statements survive only when they assign or are bare literals.
fn retained(stmt: &Stmt) -> bool {
    match stmt {
        Stmt::Expr(Expr::Assign(_,_,_)) | Stmt::Expr(Expr::Lit(_)) => true,
        Stmt::Expr(_) => false,
        _ => true
    }
}

fn object(fields: Vec<(&str, Expr)>) -> Expr {
    Expr::Object(fields.into_iter().map(|(k,v)|(PropKey::Ident(k.to_string()), v)).collect())
}

/// The fields of `window.location` for an absolute http(s) url.
pub fn location_fields(url: &str) -> Vec<(&'static str, String)> {
    let (scheme, rest) = match url.find("://") {
        Some(i) => (&url[..i], &url[i + 3..]),
        None => ("", url),
    };
    let host_end = rest.find(|c: char|c == '/' || c == '?' || c == '#').unwrap_or(rest.len());
    let (host, rest) = rest.split_at(host_end);
    let (rest, hash) = match rest.find('#') {
        Some(i) => rest.split_at(i),
        None => (rest, ""),
    };
    let (path, search) = match rest.find('?') {
        Some(i) => rest.split_at(i),
        None => (rest, ""),
    };
    let (hostname, port) = match host.rfind(':') {
        Some(i) => (&host[..i], &host[i + 1..]),
        None => (host, ""),
    };
    let protocol = format!("{}:", scheme);
    let pathname = if path.is_empty() { "/" } else { path };
    vec![
        ("hash", hash.to_string()),
        ("host", host.to_string()),
        ("hostname", hostname.to_string()),
        ("href", url.to_string()),
        ("origin", format!("{}//{}", protocol, host)),
        ("password", String::new()),
        ("pathname", pathname.to_string()),
        ("port", port.to_string()),
        ("protocol", protocol),
        ("search", search.to_string()),
        ("username", String::new()),
    ]
}

/// Stand-ins for browser globals the module touches while it loads.
fn bootstrap() -> Vec<Stmt> {
    let location = location_fields(CANONICAL_URL).into_iter()
        .map(|(k,v)|(k, Expr::str(&v)))
        .collect();
    vec![
        Stmt::var(VarKind::Var, "XMLHttpRequest", object(vec![("prototype", object(vec![]))])),
        Stmt::var(VarKind::Var, "window", Expr::This),
        Stmt::var(VarKind::Var, "self", Expr::This),
        Stmt::Expr(Expr::assign(Expr::dot(Expr::ident("window"), "location"), object(location))),
        Stmt::var(VarKind::Var, "document", object(vec![])),
        Stmt::var(VarKind::Var, "navigator", object(vec![])),
    ]
}

/// Exactly one distinct candidate, by structural equality.
fn unique(kind: TransformKind, found: Vec<Candidate>) -> Result<Candidate,CompileError> {
    let mut distinct: Vec<Candidate> = vec![];
    for c in found {
        if !distinct.contains(&c) {
            distinct.push(c);
        }
    }
    info!("{} distinct {} candidates", distinct.len(), kind);
    match distinct.len() {
        0 => Err(CompileError::CandidateNotFound(kind)),
        1 => Ok(distinct.remove(0)),
        _ => Err(CompileError::CandidateAmbiguous(kind, distinct.iter().map(|c|c.to_string()).collect())),
    }
}

/// The reduced program for a parsed player script, built from new nodes: the
/// wrapper, the retained module statements and one `_result` assignment per
/// transform, preceded by the browser stand-ins.
pub fn reduce(program: &Program) -> Result<Program,CompileError> {
    let catalog = Catalog::new();
    let (module, skip) = module_function(program).ok_or(CompileError::StructureNotRecognized)?;
    let body = &module.body[skip.min(module.body.len())..];
    debug!("module body has {} statements", body.len());

    let mut found: Vec<Vec<Candidate>> = vec![vec![]; TransformKind::ALL.len()];
    let mut kept = vec![];
    for stmt in body {
        for (i,kind) in TransformKind::ALL.iter().enumerate() {
            if let Some(c) = extract(*kind, stmt, &catalog) {
                found[i].push(c);
            }
        }
        if retained(stmt) {
            kept.push(stmt.clone());
        }
    }
    debug!("kept {} statements", kept.len());

    for (kind,candidates) in TransformKind::ALL.iter().zip(found) {
        let candidate = unique(*kind, candidates)?;
        let slot = Expr::dot(Expr::ident(RESULT_BINDING), kind.name());
        kept.push(Stmt::Expr(Expr::assign(slot, candidate.wrapper())));
    }

    let wrapped = rewrap(program, kept).ok_or(CompileError::StructureNotRecognized)?;
    let mut statements = bootstrap();
    statements.extend(wrapped.body);
    Ok(Program{body: statements})
}

/// Reduces a player script to the text of the program that defines the two transforms.
pub fn compile(text: &str) -> Result<String,CompileError> {
    let program = parse(text).map_err(|e|CompileError::Syntax{pos: e.pos})?;
    Ok(print_program(&reduce(&program)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const N_HELPER: &str = "var Ja = function(a) { var b = a.split(''); b.reverse(); return b.join(''); };";
    const N_ALIAS: &str = "var Ka = [Ja];";
    const SIG_HELPER: &str = "var Mb = function(a) { a = a.split(''); a.splice(0, 1); return a.join(''); };";
    const SIG_FUNCTION: &str = "var Nb = function(a, b, c) { c && (c = Mb(decodeURIComponent(c)), a.set(b, encodeURIComponent(c))); return a; };";

    fn player(statements: &[&str]) -> String {
        format!("var _yt_player = {{}};\n(function(g) {{\nvar window = this;\n{}\n}})(_yt_player);\n", statements.join("\n"))
    }

    fn standard() -> Vec<&'static str> {
        vec![N_HELPER, N_ALIAS, SIG_HELPER, SIG_FUNCTION]
    }

    #[test]
    fn unique_candidates_compile() {
        let reduced = compile(&player(&standard())).unwrap();
        assert!(reduced.contains("_result.n = n => Ja(n);"), "{}", reduced);
        assert!(reduced.contains("_result.sig = sig => Mb(sig);"), "{}", reduced);
        assert_eq!(reduced.matches("_result.").count(), 2);
        let n = reduced.find("_result.n").unwrap();
        let sig = reduced.find("_result.sig").unwrap();
        assert!(n < sig);
    }

    #[test]
    fn wrapper_kept_around_module() {
        let reduced = compile(&player(&standard())).unwrap();
        assert!(reduced.contains("var _yt_player = {};"));
        assert!(reduced.contains("}(_yt_player));"));
        assert!(reduced.starts_with("var XMLHttpRequest = {prototype: {}};\nvar window = this;\n"));
    }

    #[test]
    fn single_statement_form() {
        let text = format!("(function(g) {{ {} }}).call(this, {{}});", standard().join(" "));
        let reduced = compile(&text).unwrap();
        assert!(reduced.contains("var Ja = function(a) {"));
        assert!(reduced.contains("}.call(this, {}));"));
    }

    #[test]
    fn junk_expressions_dropped() {
        let mut statements = standard();
        statements.push("console.log('loaded');");
        statements.push("g.x = 5;");
        statements.push("'use strict';");
        let reduced = compile(&player(&statements)).unwrap();
        assert!(!reduced.contains("console"));
        assert!(reduced.contains("g.x = 5;"));
        assert!(reduced.contains("\"use strict\";"));
    }

    #[test]
    fn first_module_statement_dropped() {
        let reduced = compile(&player(&standard())).unwrap();
        assert_eq!(reduced.matches("var window = this;").count(), 1);
    }

    #[test]
    fn parsed_tree_left_unchanged() {
        let program = parse(&player(&standard())).unwrap();
        let before = program.clone();
        let reduced = reduce(&program).unwrap();
        assert_eq!(program, before);
        assert!(reduced.body.len() > program.body.len());
    }

    #[test]
    fn deterministic() {
        let text = player(&standard());
        assert_eq!(compile(&text).unwrap(), compile(&text).unwrap());
    }

    #[test]
    fn distinct_n_candidates_are_ambiguous() {
        let mut statements = standard();
        statements.push("var La = [Mb];");
        match compile(&player(&statements)) {
            Err(CompileError::CandidateAmbiguous(TransformKind::N, options)) => {
                assert_eq!(options, vec!["n => Ja(n)".to_string(), "n => Mb(n)".to_string()]);
            }
            other => panic!("{:?}", other),
        }
    }

    #[test]
    fn identical_candidates_are_one() {
        let mut statements = standard();
        statements.push("Oa = [Ja];");
        assert!(compile(&player(&statements)).is_ok());
    }

    #[test]
    fn missing_candidates() {
        let statements = vec![N_HELPER, SIG_HELPER, SIG_FUNCTION];
        assert_eq!(compile(&player(&statements)), Err(CompileError::CandidateNotFound(TransformKind::N)));
        let statements = vec![N_HELPER, N_ALIAS, SIG_HELPER];
        assert_eq!(compile(&player(&statements)), Err(CompileError::CandidateNotFound(TransformKind::Sig)));
    }

    #[test]
    fn alias_alone() {
        let statements = vec!["var a = [b];", SIG_HELPER, SIG_FUNCTION];
        let reduced = compile(&player(&statements)).unwrap();
        assert!(reduced.contains("_result.n = n => b(n);"));
    }

    #[test]
    fn unrelated_try_catch_ignored() {
        let statements = vec![
            "function Pa(a) { try { a.go() } catch (e) { console.log(e); } return a; }",
            SIG_HELPER,
            SIG_FUNCTION,
        ];
        assert_eq!(compile(&player(&statements)), Err(CompileError::CandidateNotFound(TransformKind::N)));
    }

    #[test]
    fn three_top_level_statements() {
        let text = format!("var a = 1;\nvar b = 2;\n{}", player(&standard()));
        assert_eq!(compile(&text), Err(CompileError::StructureNotRecognized));
        assert_eq!(compile("var a = 1;"), Err(CompileError::StructureNotRecognized));
    }

    #[test]
    fn syntax_errors() {
        match compile("(function(){ var = ; })()") {
            Err(CompileError::Syntax{..}) => {}
            other => panic!("{:?}", other),
        }
    }

    #[test]
    fn canonical_location() {
        let fields = location_fields(CANONICAL_URL);
        let get = |k: &str| fields.iter().find(|(name,_)|*name == k).map(|(_,v)|v.as_str());
        assert_eq!(get("host"), Some("www.youtube.com"));
        assert_eq!(get("origin"), Some("https://www.youtube.com"));
        assert_eq!(get("pathname"), Some("/watch"));
        assert_eq!(get("protocol"), Some("https:"));
        assert_eq!(get("search"), Some("?v=yt-dlp-wins"));
        assert_eq!(get("hash"), Some(""));
        assert_eq!(get("port"), Some(""));
    }
}
