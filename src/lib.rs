pub mod compiler;
pub mod diagnostics;
pub mod frontend;
pub mod index;
pub mod middle;

pub use compiler::{CompilationResult, Compiler, CompilerOptions};
pub use diagnostics::{CompilationError, ErrorKind, ErrorManager};
