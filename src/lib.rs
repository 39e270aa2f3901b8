pub mod js;
pub mod sandbox;
pub mod solver;
pub mod timestamp;

pub use sandbox::{evaluate,EvaluationError,Solver,SolverPair};
pub use solver::{compile,reduce,CompileError,TransformKind};
pub use timestamp::signature_timestamp;
