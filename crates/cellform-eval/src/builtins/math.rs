//! Numeric worksheet functions.

use std::sync::Arc;

use cellform_common::{CellValue, FormulaError, FormulaErrorKind};

use super::utils::{collect_numbers, to_number};
use crate::function::{FnResult, Function, FunctionContext};
use crate::registry::FunctionRegistry;

pub(crate) fn install(registry: &mut FunctionRegistry) {
    let folds: [(&'static str, FoldFn); 4] = [
        ("SUM", |ns| ns.iter().sum()),
        ("PRODUCT", |ns| ns.iter().product()),
        ("MIN", |ns| ns.iter().cloned().fold(f64::INFINITY, f64::min)),
        (
            "MAX",
            |ns| ns.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
        ),
    ];
    for (name, fold) in folds {
        registry.register(Arc::new(Fold { name, fold }));
    }
    registry.register(Arc::new(Average));
    registry.register(Arc::new(Count));
    registry.register(Arc::new(Abs));
    registry.register(Arc::new(Round));
    registry.register(Arc::new(Mod_));
}

type FoldFn = fn(&[f64]) -> f64;

/// Variadic aggregate over flattened numeric arguments. An all-empty input
/// folds to zero, the way worksheet aggregates do.
struct Fold {
    name: &'static str,
    fold: FoldFn,
}

impl Function for Fold {
    fn name(&self) -> &'static str {
        self.name
    }

    fn min_args(&self) -> usize {
        1
    }

    fn call(&self, args: &[CellValue], _: &FunctionContext<'_>) -> FnResult {
        match collect_numbers(args) {
            Ok(ns) if ns.is_empty() => CellValue::Number(0.0).into(),
            Ok(ns) => {
                let n = (self.fold)(&ns);
                if n.is_finite() {
                    CellValue::Number(n).into()
                } else {
                    FormulaError::new(FormulaErrorKind::Num).into()
                }
            }
            Err(e) => e.into(),
        }
    }
}

struct Average;

impl Function for Average {
    fn name(&self) -> &'static str {
        "AVERAGE"
    }

    fn min_args(&self) -> usize {
        1
    }

    fn call(&self, args: &[CellValue], _: &FunctionContext<'_>) -> FnResult {
        match collect_numbers(args) {
            Ok(ns) if ns.is_empty() => FormulaError::new(FormulaErrorKind::Div)
                .with_message("no numeric values to average")
                .into(),
            Ok(ns) => CellValue::Number(ns.iter().sum::<f64>() / ns.len() as f64).into(),
            Err(e) => e.into(),
        }
    }
}

/// Counts numeric values. Unlike the aggregates, error cells inside a range
/// are simply not counted.
struct Count;

impl Count {
    fn count(v: &CellValue) -> i64 {
        match v {
            CellValue::Array(rows) => rows
                .iter()
                .flat_map(|row| row.iter())
                .map(Self::count)
                .sum(),
            CellValue::Int(_) | CellValue::Number(_) => 1,
            CellValue::Text(s) if s.trim().parse::<f64>().is_ok() => 1,
            _ => 0,
        }
    }
}

impl Function for Count {
    fn name(&self) -> &'static str {
        "COUNT"
    }

    fn min_args(&self) -> usize {
        1
    }

    fn call(&self, args: &[CellValue], _: &FunctionContext<'_>) -> FnResult {
        CellValue::Int(args.iter().map(Self::count).sum()).into()
    }
}

struct Abs;

impl Function for Abs {
    fn name(&self) -> &'static str {
        "ABS"
    }

    fn min_args(&self) -> usize {
        1
    }

    fn max_args(&self) -> Option<usize> {
        Some(1)
    }

    fn call(&self, args: &[CellValue], _: &FunctionContext<'_>) -> FnResult {
        match to_number(&args[0]) {
            Ok(n) => CellValue::Number(n.abs()).into(),
            Err(e) => e.into(),
        }
    }
}

struct Round;

impl Function for Round {
    fn name(&self) -> &'static str {
        "ROUND"
    }

    fn min_args(&self) -> usize {
        1
    }

    fn max_args(&self) -> Option<usize> {
        Some(2)
    }

    fn call(&self, args: &[CellValue], _: &FunctionContext<'_>) -> FnResult {
        let rounded = (|| {
            let n = to_number(&args[0])?;
            let digits = match args.get(1) {
                Some(d) => to_number(d)? as i32,
                None => 0,
            };
            let factor = 10f64.powi(digits);
            // Round half away from zero, the worksheet convention.
            Ok::<_, FormulaError>((n * factor).round() / factor)
        })();
        match rounded {
            Ok(n) if n.is_finite() => CellValue::Number(n).into(),
            Ok(_) => FormulaError::new(FormulaErrorKind::Num).into(),
            Err(e) => e.into(),
        }
    }
}

struct Mod_;

impl Function for Mod_ {
    fn name(&self) -> &'static str {
        "MOD"
    }

    fn min_args(&self) -> usize {
        2
    }

    fn max_args(&self) -> Option<usize> {
        Some(2)
    }

    fn call(&self, args: &[CellValue], _: &FunctionContext<'_>) -> FnResult {
        let result = (|| {
            let a = to_number(&args[0])?;
            let b = to_number(&args[1])?;
            if b == 0.0 {
                return Err(FormulaError::new(FormulaErrorKind::Div));
            }
            // Result takes the sign of the divisor.
            Ok(a - b * (a / b).floor())
        })();
        match result {
            Ok(n) => CellValue::Number(n).into(),
            Err(e) => e.into(),
        }
    }
}
