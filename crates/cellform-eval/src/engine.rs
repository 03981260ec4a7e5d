//! End-to-end façade: formula text in, value out.

use cellform_parse::{LexError, tokenize};

use crate::ast::Ast;
use crate::builder::{BuildError, build_ast};
use crate::interpreter::{EvalState, Evaluator};
use crate::reference::CellAddr;
use crate::registry::FunctionRegistry;
use crate::resolver::SheetSnapshot;

use cellform_common::CellValue;

/// A fault in the formula's shape. Never produced for semantic problems,
/// which evaluate to error values instead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("tokenize failed: {0}")]
    Lex(#[from] LexError),
    #[error("ast build failed: {0}")]
    Build(#[from] BuildError),
}

/// The result of one engine run: the outcome plus the tree it came from, so
/// hosts can inspect references or the async flag after the fact.
#[derive(Debug)]
pub struct Evaluation {
    pub state: EvalState,
    pub ast: Ast,
}

impl Evaluation {
    /// Block until the value settles.
    pub fn settle(self) -> CellValue {
        self.state.settle()
    }
}

/// Tokenize -> build -> evaluate pipeline over one registry and snapshot.
#[derive(Debug)]
pub struct FormulaEngine {
    registry: FunctionRegistry,
    snapshot: SheetSnapshot,
    current_sheet: String,
}

impl Default for FormulaEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl FormulaEngine {
    /// An engine with the builtin catalog and an empty snapshot.
    pub fn new() -> Self {
        FormulaEngine {
            registry: FunctionRegistry::with_builtins(),
            snapshot: SheetSnapshot::new(),
            current_sheet: "Sheet1".to_string(),
        }
    }

    pub fn with_registry(mut self, registry: FunctionRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_snapshot(mut self, snapshot: SheetSnapshot) -> Self {
        self.snapshot = snapshot;
        self
    }

    pub fn with_current_sheet<S: Into<String>>(mut self, sheet: S) -> Self {
        self.current_sheet = sheet.into();
        self
    }

    pub fn registry_mut(&mut self) -> &mut FunctionRegistry {
        &mut self.registry
    }

    /// Tokenize and build without evaluating. Useful for dependency
    /// extraction: `parse(f)?.references()`.
    pub fn parse(&self, formula: &str) -> Result<Ast, EngineError> {
        let tree = tokenize(formula)?;
        Ok(build_ast(&tree, &self.registry)?)
    }

    pub fn evaluate(&self, formula: &str) -> Result<Evaluation, EngineError> {
        let ast = self.parse(formula)?;
        let state = Evaluator::new(&ast, &self.snapshot, &self.current_sheet).run();
        Ok(Evaluation { state, ast })
    }

    /// Evaluate with a known origin cell, for functions that ask where the
    /// formula lives.
    pub fn evaluate_at(&self, formula: &str, origin: CellAddr) -> Result<Evaluation, EngineError> {
        let ast = self.parse(formula)?;
        let state = Evaluator::new(&ast, &self.snapshot, &self.current_sheet)
            .with_origin(origin)
            .run();
        Ok(Evaluation { state, ast })
    }

    /// Re-run an already built tree against the engine's current snapshot.
    pub fn evaluate_ast(&self, ast: &Ast) -> EvalState {
        Evaluator::new(ast, &self.snapshot, &self.current_sheet).run()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cellform_common::FormulaErrorKind;

    #[test]
    fn faults_and_error_values_stay_distinct() {
        let engine = FormulaEngine::new();

        // Malformed text is a fault, not a value.
        assert!(matches!(
            engine.evaluate("=SUM(1,"),
            Err(EngineError::Lex(_))
        ));
        assert!(matches!(
            engine.evaluate("=1+"),
            Err(EngineError::Build(_))
        ));

        // A well-formed formula that misbehaves is a value.
        let CellValue::Error(e) = engine.evaluate("=1/0").map(Evaluation::settle).unwrap() else {
            panic!();
        };
        assert_eq!(e.kind, FormulaErrorKind::Div);
    }

    #[test]
    fn parse_exposes_references_without_evaluating() {
        let engine = FormulaEngine::new();
        let ast = engine.parse("=SUM(A1:A3)+B2").unwrap();
        assert_eq!(ast.references().len(), 2);
    }

    #[test]
    fn same_ast_reruns_against_new_snapshots() {
        let engine = FormulaEngine::new()
            .with_snapshot(SheetSnapshot::new().with_cell_a1("Sheet1", "A1", CellValue::Int(2)));
        let ast = engine.parse("=A1*10").unwrap();
        assert_eq!(engine.evaluate_ast(&ast).settle(), CellValue::Number(20.0));

        let engine = engine
            .with_snapshot(SheetSnapshot::new().with_cell_a1("Sheet1", "A1", CellValue::Int(3)));
        assert_eq!(engine.evaluate_ast(&ast).settle(), CellValue::Number(30.0));
    }
}
