//! Abstract-interpretation type analysis (component F) and the structural
//! oracle bundle (component G) layered on top of [`stgraph_core`]'s
//! control/data-flow graph.

pub mod analyzer;
pub mod context;
pub mod globals;
pub mod oracle;
pub mod types;

pub use analyzer::{AnalyzerConfig, TypeAnalyzer};
pub use context::{Diagnostic, TypeContext};
pub use globals::Globals;
pub use oracle::{check_all, OracleViolation};
pub use types::{ObjectRef, ObjectValue, Type};
