use std::fs::{read_dir,read_to_string};
use std::path::Path;
use clap::clap_app;
use log::info;
use player_solver::js::ast::Pos;
use player_solver::{compile,evaluate,signature_timestamp,CompileError,EvaluationError,SolverPair,TransformKind};

#[derive(Debug)]
pub struct ProcessingError {
    line: String,
    typ: ErrorType,
}

#[derive(Debug)]
pub enum ErrorType {
    Compile(CompileError),
    Evaluation(EvaluationError),
    Parse,
    IO(std::io::Error),
    NoTransform(TransformKind),
    NoTimestamp,
    BadExpectation,
    Mismatch{expected: String, actual: String},
    TestsFailed(Vec<String>),
    BadFileName,
    Unexpected,
}

impl ErrorType {
    fn nowhere(self) -> ProcessingError {
        ProcessingError {
            line: String::new(),
            typ: self
        }
    }
    fn at(self, pos:Pos, text:&str) -> ProcessingError {
        let mut linenum = text[..text.len() - pos].lines().count();
        let lines:Vec<&str> = text.lines().collect();
        let line = if linenum >= lines.len() {
            "EOF".to_string()
        } else {
            if linenum > 0 {
                linenum -= 1;
            }
            format!("{} {}", linenum + 1, lines[linenum])
        };
        ProcessingError{line, typ:self}
    }
    fn on(self, line:&str) -> ProcessingError {
        ProcessingError{line: line.to_string(), typ:self}
    }
}

impl From<std::io::Error> for ProcessingError {
    fn from(e: std::io::Error) -> Self {
        ErrorType::IO(e).nowhere()
    }
}

impl From<log::SetLoggerError> for ProcessingError {
    fn from(_: log::SetLoggerError) -> Self {
        ErrorType::Unexpected.nowhere()
    }
}

impl From<EvaluationError> for ProcessingError {
    fn from(e: EvaluationError) -> Self {
        ErrorType::Evaluation(e).nowhere()
    }
}

fn compile_script(text: &str) -> Result<String,ProcessingError> {
    compile(text).map_err(|e| match e {
        CompileError::Syntax{pos} => ErrorType::Parse.at(pos, text),
        e => ErrorType::Compile(e).nowhere(),
    })
}

fn evaluate_program(text: &str) -> Result<SolverPair,ProcessingError> {
    evaluate(text).map_err(|e| match e {
        EvaluationError::Syntax{pos} => ErrorType::Parse.at(pos, text),
        e => ErrorType::Evaluation(e).nowhere(),
    })
}

fn solve(pair: &SolverPair, kind: TransformKind, input: &str) -> Result<String,ProcessingError> {
    let solver = pair.get(kind).ok_or_else(||ErrorType::NoTransform(kind).nowhere())?;
    Ok(solver.call(input)?)
}

/// Checks the `n <in> <out>` and `sig <in> <out>` lines of an expectation file.
fn check_expectations(pair: &SolverPair, expect: &str) -> Result<(),ProcessingError> {
    for line in expect.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let words:Vec<&str> = line.split_whitespace().collect();
        let (kind, input, expected) = match words.as_slice() {
            ["n", input, expected] => (TransformKind::N, *input, *expected),
            ["sig", input, expected] => (TransformKind::Sig, *input, *expected),
            _ => return Err(ErrorType::BadExpectation.on(line)),
        };
        let actual = solve(pair, kind, input)?;
        if actual != expected {
            return Err(ErrorType::Mismatch{expected: expected.to_string(), actual}.on(line));
        }
    }
    Ok(())
}

fn process_fixture(filename: &str) -> Result<(),ProcessingError> {
    let text = read_to_string(filename)?;
    let reduced = compile_script(&text)?;
    let pair = evaluate_program(&reduced)?;
    let expect = Path::new(filename).with_extension("expect");
    if expect.exists() {
        check_expectations(&pair, &read_to_string(expect)?)?;
    }
    Ok(())
}

/// Script files in `dir`, skipping hidden files and expectation files.
fn read_dir_sorted(dir: &str) -> Result<Vec<String>,ProcessingError> {
    let mut result = vec![];
    for entry in read_dir(dir)? {
        let path = entry?.path();
        if path.extension().map_or(false, |e|e == "js") {
            let hidden = path.file_name().and_then(|n|n.to_str()).map_or(true, |n|n.starts_with('.'));
            if !hidden {
                result.push(path.to_str().ok_or_else(||ErrorType::BadFileName.nowhere())?.to_string());
            }
        }
    }
    result.sort();
    Ok(result)
}

fn run_tests() -> Result<(),ProcessingError> {
    let mut failures = vec![];
    for filename in &read_dir_sorted("test/compile_good")? {
        match process_fixture(filename) {
            Ok(()) => println!("{:48} PASS", filename),
            Err(e) => {
                println!("{:48} !!!! {:?}", filename, e);
                failures.push(filename.to_string());
            }
        }
    }
    for filename in &read_dir_sorted("test/compile_bad")? {
        match process_fixture(filename) {
            Ok(()) => {
                println!("{:48} !!!!", filename);
                failures.push(filename.to_string());
            }
            Err(_) => println!("{:48} FAIL as expected", filename)
        }
    }

    if !failures.is_empty() {
        return Err(ErrorType::TestsFailed(failures).nowhere())
    }

    Ok(())
}

fn main() -> Result<(),ProcessingError> {
    let matches = clap_app!(player_solver =>
            (version: "0.1")
            (author: "Giles Edkins")
            (about: "Extracts and runs the n and sig transforms of a player script")
            (@arg INPUT: "Player script to solve")
            (@arg TEST: --test "Run tests, expecting test/compile_good to pass and test/compile_bad to fail")
            (@arg COMPILED: --compiled "Input is an already reduced program")
            (@arg EMIT: --emit "Print the reduced program")
            (@arg N: -n +takes_value "Print the n transform of this token")
            (@arg SIG: -s +takes_value "Print the sig transform of this token")
            (@arg STS: --sts "Print the signature timestamp")
            (@arg QUIET: -q "Disables logging output")
            (@arg VERBOSITY: -v +multiple "Set verbosity level of logging")
    ).get_matches();

    stderrlog::new()
        .module(module_path!())
        .quiet(matches.is_present("QUIET"))
        .verbosity(matches.occurrences_of("VERBOSITY") as usize)
        .timestamp(stderrlog::Timestamp::Millisecond)
        .init()?;

    if matches.is_present("TEST") {
        run_tests()?;
        return Ok(());
    }

    let filename = matches.value_of("INPUT").ok_or_else(||ErrorType::BadFileName.nowhere())?;
    let text = read_to_string(filename)?;
    if matches.is_present("STS") {
        let sts = signature_timestamp(&text).ok_or_else(||ErrorType::NoTimestamp.nowhere())?;
        println!("{}", sts);
    }

    let reduced = if matches.is_present("COMPILED") {
        text
    } else {
        compile_script(&text)?
    };
    if matches.is_present("EMIT") {
        print!("{}", reduced);
    }

    let pair = evaluate_program(&reduced)?;
    info!("{} solved", filename);
    if let Some(token) = matches.value_of("N") {
        println!("{}", solve(&pair, TransformKind::N, token)?);
    }
    if let Some(token) = matches.value_of("SIG") {
        println!("{}", solve(&pair, TransformKind::Sig, token)?);
    }

    Ok(())
}
