//! Logical and error-handling functions.

use std::sync::Arc;

use cellform_common::{CellValue, FormulaError, FormulaErrorKind};

use crate::function::{FnCaps, FnResult, Function, FunctionContext};
use crate::registry::FunctionRegistry;

pub(crate) fn install(registry: &mut FunctionRegistry) {
    registry.register(Arc::new(If));
    registry.register(Arc::new(Junction { name: "AND", any: false }));
    registry.register(Arc::new(Junction { name: "OR", any: true }));
    registry.register(Arc::new(Not));
    registry.register(Arc::new(Constant { name: "TRUE", value: true }));
    registry.register(Arc::new(Constant { name: "FALSE", value: false }));
    registry.register(Arc::new(IfError));
    registry.register(Arc::new(IsError));
    registry.register(Arc::new(IsBlank));
}

struct If;

impl Function for If {
    fn name(&self) -> &'static str {
        "IF"
    }

    fn min_args(&self) -> usize {
        2
    }

    fn max_args(&self) -> Option<usize> {
        Some(3)
    }

    fn call(&self, args: &[CellValue], _: &FunctionContext<'_>) -> FnResult {
        let condition = match args[0].coerce_to_single_value() {
            Ok(v) => v,
            Err(e) => return e.into(),
        };
        let value = if condition.is_truthy() {
            args[1].clone()
        } else {
            // A missing else-branch yields FALSE.
            args.get(2).cloned().unwrap_or(CellValue::Boolean(false))
        };
        value.into()
    }
}

/// AND / OR over every scalar in the flattened argument list.
struct Junction {
    name: &'static str,
    any: bool,
}

impl Junction {
    fn truths(&self, v: &CellValue, out: &mut Vec<bool>) -> Result<(), FormulaError> {
        match v {
            CellValue::Array(rows) => {
                for row in rows {
                    for cell in row {
                        self.truths(cell, out)?;
                    }
                }
                Ok(())
            }
            CellValue::Error(e) => Err(e.clone()),
            CellValue::Empty => Ok(()),
            other => {
                out.push(other.is_truthy());
                Ok(())
            }
        }
    }
}

impl Function for Junction {
    fn name(&self) -> &'static str {
        self.name
    }

    fn min_args(&self) -> usize {
        1
    }

    fn call(&self, args: &[CellValue], _: &FunctionContext<'_>) -> FnResult {
        let mut truths = Vec::new();
        for arg in args {
            if let Err(e) = self.truths(arg, &mut truths) {
                return e.into();
            }
        }
        if truths.is_empty() {
            return FormulaError::new(FormulaErrorKind::Value)
                .with_message("no testable values")
                .into();
        }
        let result = if self.any {
            truths.iter().any(|t| *t)
        } else {
            truths.iter().all(|t| *t)
        };
        CellValue::Boolean(result).into()
    }
}

struct Not;

impl Function for Not {
    fn name(&self) -> &'static str {
        "NOT"
    }

    fn min_args(&self) -> usize {
        1
    }

    fn max_args(&self) -> Option<usize> {
        Some(1)
    }

    fn call(&self, args: &[CellValue], _: &FunctionContext<'_>) -> FnResult {
        match args[0].coerce_to_single_value() {
            Ok(v) => CellValue::Boolean(!v.is_truthy()).into(),
            Err(e) => e.into(),
        }
    }
}

/// `TRUE()` / `FALSE()`.
struct Constant {
    name: &'static str,
    value: bool,
}

impl Function for Constant {
    fn name(&self) -> &'static str {
        self.name
    }

    fn max_args(&self) -> Option<usize> {
        Some(0)
    }

    fn call(&self, _: &[CellValue], _: &FunctionContext<'_>) -> FnResult {
        CellValue::Boolean(self.value).into()
    }
}

/// `IFERROR(value, fallback)`; sees its error arguments instead of
/// short-circuiting on them.
struct IfError;

impl Function for IfError {
    fn name(&self) -> &'static str {
        "IFERROR"
    }

    fn caps(&self) -> FnCaps {
        FnCaps::PURE | FnCaps::ERROR_AWARE
    }

    fn min_args(&self) -> usize {
        2
    }

    fn max_args(&self) -> Option<usize> {
        Some(2)
    }

    fn call(&self, args: &[CellValue], _: &FunctionContext<'_>) -> FnResult {
        if args[0].is_error() {
            args[1].clone().into()
        } else {
            args[0].clone().into()
        }
    }
}

struct IsError;

impl Function for IsError {
    fn name(&self) -> &'static str {
        "ISERROR"
    }

    fn caps(&self) -> FnCaps {
        FnCaps::PURE | FnCaps::ERROR_AWARE
    }

    fn min_args(&self) -> usize {
        1
    }

    fn max_args(&self) -> Option<usize> {
        Some(1)
    }

    fn call(&self, args: &[CellValue], _: &FunctionContext<'_>) -> FnResult {
        CellValue::Boolean(args[0].is_error()).into()
    }
}

struct IsBlank;

impl Function for IsBlank {
    fn name(&self) -> &'static str {
        "ISBLANK"
    }

    fn min_args(&self) -> usize {
        1
    }

    fn max_args(&self) -> Option<usize> {
        Some(1)
    }

    fn call(&self, args: &[CellValue], _: &FunctionContext<'_>) -> FnResult {
        CellValue::Boolean(matches!(args[0], CellValue::Empty)).into()
    }
}
