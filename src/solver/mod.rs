pub mod catalog;
pub mod compile;
pub mod extract;
pub mod tree_matcher;

pub use compile::{compile,reduce,CompileError,RESULT_BINDING};
pub use extract::TransformKind;
