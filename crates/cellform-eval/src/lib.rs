//! Formula evaluation engine: token tree -> AST -> result value.
//!
//! The pipeline is exposed piecewise (`build_ast`, `Evaluator`) and through
//! the [`FormulaEngine`] façade which runs tokenize -> build -> evaluate for
//! one formula against a read-only data snapshot.

pub mod ast;
pub mod builder;
pub mod builtins;
pub mod engine;
pub mod function;
pub mod interpreter;
pub mod reference;
pub mod registry;
pub mod resolver;

pub use ast::{Ast, AstNode, NodeFlags, NodeId, NodeKind, PrefixOp};
pub use builder::{BuildError, build_ast};
pub use engine::{EngineError, Evaluation, FormulaEngine};
pub use function::{FnCaps, FnResult, Function, FunctionContext, PendingValue};
pub use interpreter::{EvalState, Evaluator};
pub use reference::{CellAddr, Reference};
pub use registry::FunctionRegistry;
pub use resolver::{ReferenceResolver, SheetSnapshot};

// Re-export the lower layers.
pub use cellform_common::{CellValue, FormulaError, FormulaErrorKind};
pub use cellform_parse::{LexError, TokenTree, tokenize};
