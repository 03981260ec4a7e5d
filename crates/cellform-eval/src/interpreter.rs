//! Tree-walking evaluation.
//!
//! Nodes are evaluated post-order, left to right. Errors travel as values:
//! a call whose executor lacks `ERROR_AWARE` short-circuits to its first
//! error-typed argument without being invoked. Suspension surfaces from the
//! outermost node only; a pending value produced deeper in the tree is
//! settled inline before its parent combines it.

use cellform_common::{CellValue, FormulaError, FormulaErrorKind};

use crate::ast::{Ast, NodeId, NodeKind, PrefixOp};
use crate::function::{FnCaps, FnResult, FunctionContext, PendingValue};
use crate::reference::CellAddr;
use crate::resolver::ReferenceResolver;

/// Outcome of one evaluation pass.
#[derive(Debug)]
pub enum EvalState {
    Ready(CellValue),
    Suspended(PendingValue),
}

impl EvalState {
    /// Block until a value is available either way.
    pub fn settle(self) -> CellValue {
        match self {
            EvalState::Ready(v) => v,
            EvalState::Suspended(p) => p.wait(),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, EvalState::Ready(_))
    }
}

/// One-shot evaluator for a built [`Ast`] against a resolver snapshot.
///
/// The evaluator borrows everything, so the same `Ast` can be re-run against
/// a fresh snapshot after a recalculation.
pub struct Evaluator<'a> {
    ast: &'a Ast,
    resolver: &'a dyn ReferenceResolver,
    current_sheet: &'a str,
    origin: Option<CellAddr>,
}

impl<'a> Evaluator<'a> {
    pub fn new(ast: &'a Ast, resolver: &'a dyn ReferenceResolver, current_sheet: &'a str) -> Self {
        Evaluator {
            ast,
            resolver,
            current_sheet,
            origin: None,
        }
    }

    /// Record the cell the formula lives in, for `ADDRESS`-capable functions.
    pub fn with_origin(mut self, origin: CellAddr) -> Self {
        self.origin = Some(origin);
        self
    }

    /// Evaluate the whole tree. `Suspended` is returned only when the root
    /// itself is an in-flight async call.
    pub fn run(&self) -> EvalState {
        match self.eval_outcome(self.ast.root()) {
            Outcome::Value(v) => EvalState::Ready(v),
            Outcome::Pending(p) => EvalState::Suspended(p),
        }
    }

    /// Evaluate a subtree to a settled value.
    fn eval_node(&self, id: NodeId) -> CellValue {
        match self.eval_outcome(id) {
            Outcome::Value(v) => v,
            Outcome::Pending(p) => p.wait(),
        }
    }

    fn eval_outcome(&self, id: NodeId) -> Outcome {
        let node = self.ast.node(id);
        match &node.kind {
            NodeKind::Value(v) => Outcome::Value(v.clone()),

            NodeKind::Reference(r) => {
                Outcome::Value(match self.resolver.resolve(r, self.current_sheet) {
                    Ok(v) => v,
                    Err(e) => CellValue::Error(e),
                })
            }

            NodeKind::Prefix(op) => {
                let Some(&child) = node.children.first() else {
                    return Outcome::Value(CellValue::Error(
                        FormulaError::new(FormulaErrorKind::Value)
                            .with_message("prefix operator without operand"),
                    ));
                };
                Outcome::Value(self.apply_prefix(*op, self.eval_node(child)))
            }

            NodeKind::Call { func, .. } => {
                let args: Vec<CellValue> =
                    node.children.iter().map(|&c| self.eval_node(c)).collect();

                // An error argument wins over an arity complaint.
                if !func.caps().contains(FnCaps::ERROR_AWARE) {
                    if let Some(err) = args.iter().find(|a| a.is_error()) {
                        return Outcome::Value(err.clone());
                    }
                }

                if args.len() < func.min_args()
                    || func.max_args().is_some_and(|max| args.len() > max)
                {
                    return Outcome::Value(CellValue::Error(
                        FormulaError::new(FormulaErrorKind::Value)
                            .with_message(format!("wrong argument count for {}", func.name())),
                    ));
                }

                let ctx = FunctionContext {
                    resolver: self.resolver,
                    current_sheet: self.current_sheet,
                    origin: self.origin,
                };
                match func.call(&args, &ctx) {
                    FnResult::Value(v) => Outcome::Value(v),
                    FnResult::Pending(p) => Outcome::Pending(p),
                }
            }
        }
    }

    fn apply_prefix(&self, op: PrefixOp, value: CellValue) -> CellValue {
        if value.is_error() {
            return value;
        }
        let single = match value.coerce_to_single_value() {
            Ok(v) => v,
            Err(e) => return CellValue::Error(e),
        };
        match op {
            PrefixOp::Intersect => single,
            PrefixOp::Minus => match single {
                CellValue::Int(i) => CellValue::Int(-i),
                other => match other.as_number() {
                    Some(n) => CellValue::Number(-n),
                    None => CellValue::Error(
                        FormulaError::new(FormulaErrorKind::Value)
                            .with_message("cannot negate a non-numeric value"),
                    ),
                },
            },
        }
    }
}

enum Outcome {
    Value(CellValue),
    Pending(PendingValue),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::build_ast;
    use crate::registry::FunctionRegistry;
    use crate::resolver::SheetSnapshot;
    use cellform_parse::tokenize;

    fn eval(formula: &str) -> CellValue {
        let registry = FunctionRegistry::with_builtins();
        let ast = build_ast(&tokenize(formula).unwrap(), &registry).unwrap();
        let snap = SheetSnapshot::new().with_sheet("Sheet1", 4, 4);
        Evaluator::new(&ast, &snap, "Sheet1").run().settle()
    }

    #[test]
    fn arithmetic_with_precedence() {
        assert_eq!(eval("=1+2*3"), CellValue::Number(7.0));
        assert_eq!(eval("=(1+2)*3"), CellValue::Number(9.0));
    }

    #[test]
    fn unary_minus_beats_power() {
        assert_eq!(eval("=-2^2"), CellValue::Number(4.0));
        assert_eq!(eval("=0-2^2"), CellValue::Number(-4.0));
    }

    #[test]
    fn errors_flow_through_operators() {
        let CellValue::Error(e) = eval("=1/0+5") else {
            panic!("expected an error value");
        };
        assert_eq!(e.kind, FormulaErrorKind::Div);
    }

    #[test]
    fn prefix_on_non_numeric_is_value_error() {
        let CellValue::Error(e) = eval("=-\"abc\"") else {
            panic!();
        };
        assert_eq!(e.kind, FormulaErrorKind::Value);
    }

    #[test]
    fn intersect_collapses_singleton_range() {
        let registry = FunctionRegistry::with_builtins();
        let ast = build_ast(&tokenize("=@A1:A1").unwrap(), &registry).unwrap();
        let snap = SheetSnapshot::new().with_cell("Sheet1", 1, 1, CellValue::Int(7));
        let value = Evaluator::new(&ast, &snap, "Sheet1").run().settle();
        assert_eq!(value, CellValue::Int(7));

        // A wider range cannot intersect to a single value.
        let ast = build_ast(&tokenize("=@A1:B1").unwrap(), &registry).unwrap();
        let snap = snap.with_cell("Sheet1", 1, 2, CellValue::Int(8));
        let CellValue::Error(e) = Evaluator::new(&ast, &snap, "Sheet1").run().settle() else {
            panic!();
        };
        assert_eq!(e.kind, FormulaErrorKind::Value);
    }

    #[test]
    fn empty_reference_negates_to_zero() {
        assert_eq!(eval("=-A1"), CellValue::Number(-0.0));
    }
}
