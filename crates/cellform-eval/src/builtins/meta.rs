//! Operator executors.
//!
//! The builder rewrites every infix and postfix operator into a call on one
//! of these, so `=1+2` and `=PLUS(1,2)` are the same tree. Shadowing an
//! entry in a custom registry changes the operator's behaviour.

use std::cmp::Ordering;
use std::sync::Arc;

use cellform_common::{CellValue, FormulaError, FormulaErrorKind};

use super::utils::{to_number, to_text};
use crate::function::{FnResult, Function, FunctionContext};
use crate::registry::FunctionRegistry;

pub(crate) fn install(registry: &mut FunctionRegistry) {
    let arith: [(&'static str, ArithFn); 5] = [
        ("PLUS", |a, b| Ok(a + b)),
        ("MINUS", |a, b| Ok(a - b)),
        ("MULTIPLY", |a, b| Ok(a * b)),
        ("DIVIDE", |a, b| {
            if b == 0.0 {
                Err(FormulaError::new(FormulaErrorKind::Div))
            } else {
                Ok(a / b)
            }
        }),
        ("POWER", |a, b| Ok(a.powf(b))),
    ];
    for (name, apply) in arith {
        registry.register(Arc::new(Arith { name, apply }));
    }

    let compares: [(&'static str, CmpFn); 6] = [
        ("EQ", |o| o == Ordering::Equal),
        ("NE", |o| o != Ordering::Equal),
        ("GT", |o| o == Ordering::Greater),
        ("LT", |o| o == Ordering::Less),
        ("GE", |o| o != Ordering::Less),
        ("LE", |o| o != Ordering::Greater),
    ];
    for (name, test) in compares {
        registry.register(Arc::new(Compare { name, test }));
    }

    registry.register(Arc::new(Concat));
    registry.register(Arc::new(Percent));
}

type ArithFn = fn(f64, f64) -> Result<f64, FormulaError>;

struct Arith {
    name: &'static str,
    apply: ArithFn,
}

impl Function for Arith {
    fn name(&self) -> &'static str {
        self.name
    }

    fn min_args(&self) -> usize {
        2
    }

    fn max_args(&self) -> Option<usize> {
        Some(2)
    }

    fn call(&self, args: &[CellValue], _: &FunctionContext<'_>) -> FnResult {
        let pair = (|| {
            let a = to_number(&args[0])?;
            let b = to_number(&args[1])?;
            (self.apply)(a, b)
        })();
        match pair {
            Ok(n) if n.is_finite() => CellValue::Number(n).into(),
            Ok(_) => FormulaError::new(FormulaErrorKind::Num).into(),
            Err(e) => e.into(),
        }
    }
}

type CmpFn = fn(Ordering) -> bool;

struct Compare {
    name: &'static str,
    test: CmpFn,
}

impl Function for Compare {
    fn name(&self) -> &'static str {
        self.name
    }

    fn min_args(&self) -> usize {
        2
    }

    fn max_args(&self) -> Option<usize> {
        Some(2)
    }

    fn call(&self, args: &[CellValue], _: &FunctionContext<'_>) -> FnResult {
        match compare_values(&args[0], &args[1]) {
            Ok(ordering) => CellValue::Boolean((self.test)(ordering)).into(),
            Err(e) => e.into(),
        }
    }
}

/// Worksheet comparison order: numbers sort below text, text below logicals.
/// Text compares case-insensitively; an empty cell borrows the other side's
/// type (zero, empty string, or FALSE).
fn compare_values(a: &CellValue, b: &CellValue) -> Result<Ordering, FormulaError> {
    let a = a.coerce_to_single_value()?;
    let b = b.coerce_to_single_value()?;

    fn rank(v: &CellValue) -> u8 {
        match v {
            CellValue::Int(_) | CellValue::Number(_) | CellValue::Empty => 0,
            CellValue::Text(_) => 1,
            CellValue::Boolean(_) => 2,
            // Coercion above leaves no other variants.
            _ => 3,
        }
    }

    let ordering = match (&a, &b) {
        (CellValue::Text(x), CellValue::Text(y)) => {
            x.to_lowercase().cmp(&y.to_lowercase())
        }
        (CellValue::Text(x), CellValue::Empty) => x.to_lowercase().cmp(&String::new()),
        (CellValue::Empty, CellValue::Text(y)) => String::new().cmp(&y.to_lowercase()),
        (CellValue::Boolean(x), CellValue::Boolean(y)) => x.cmp(y),
        (CellValue::Boolean(x), CellValue::Empty) => x.cmp(&false),
        (CellValue::Empty, CellValue::Boolean(y)) => false.cmp(y),
        _ => match (a.as_number(), b.as_number()) {
            (Some(x), Some(y)) if rank(&a) == 0 && rank(&b) == 0 => {
                x.partial_cmp(&y).unwrap_or(Ordering::Equal)
            }
            _ => rank(&a).cmp(&rank(&b)),
        },
    };
    Ok(ordering)
}

struct Concat;

impl Function for Concat {
    fn name(&self) -> &'static str {
        "CONCAT"
    }

    fn min_args(&self) -> usize {
        2
    }

    fn max_args(&self) -> Option<usize> {
        Some(2)
    }

    fn call(&self, args: &[CellValue], _: &FunctionContext<'_>) -> FnResult {
        let joined = (|| {
            let mut s = to_text(&args[0])?;
            s.push_str(&to_text(&args[1])?);
            Ok::<_, FormulaError>(s)
        })();
        match joined {
            Ok(s) => CellValue::Text(s).into(),
            Err(e) => e.into(),
        }
    }
}

struct Percent;

impl Function for Percent {
    fn name(&self) -> &'static str {
        "PERCENT"
    }

    fn min_args(&self) -> usize {
        1
    }

    fn max_args(&self) -> Option<usize> {
        Some(1)
    }

    fn call(&self, args: &[CellValue], _: &FunctionContext<'_>) -> FnResult {
        match to_number(&args[0]) {
            Ok(n) => CellValue::Number(n / 100.0).into(),
            Err(e) => e.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::SheetSnapshot;

    fn call(f: &dyn Function, args: &[CellValue]) -> CellValue {
        let snap = SheetSnapshot::new();
        let ctx = FunctionContext {
            resolver: &snap,
            current_sheet: "Sheet1",
            origin: None,
        };
        match f.call(args, &ctx) {
            FnResult::Value(v) => v,
            FnResult::Pending(_) => panic!("operators never suspend"),
        }
    }

    #[test]
    fn division_by_zero() {
        let div = Arith {
            name: "DIVIDE",
            apply: |a, b| {
                if b == 0.0 {
                    Err(FormulaError::new(FormulaErrorKind::Div))
                } else {
                    Ok(a / b)
                }
            },
        };
        let CellValue::Error(e) = call(&div, &[CellValue::Int(1), CellValue::Int(0)]) else {
            panic!();
        };
        assert_eq!(e.kind, FormulaErrorKind::Div);
    }

    #[test]
    fn non_finite_power_is_num_error() {
        let pow = Arith {
            name: "POWER",
            apply: |a, b| Ok(a.powf(b)),
        };
        let CellValue::Error(e) = call(
            &pow,
            &[CellValue::Number(1e300), CellValue::Number(10.0)],
        ) else {
            panic!();
        };
        assert_eq!(e.kind, FormulaErrorKind::Num);
    }

    #[test]
    fn text_compares_case_insensitively() {
        assert_eq!(
            compare_values(
                &CellValue::Text("Apple".into()),
                &CellValue::Text("apple".into())
            )
            .unwrap(),
            Ordering::Equal
        );
    }

    #[test]
    fn numbers_sort_below_text() {
        assert_eq!(
            compare_values(&CellValue::Int(999), &CellValue::Text("a".into())).unwrap(),
            Ordering::Less
        );
    }

    #[test]
    fn empty_borrows_the_other_type() {
        assert_eq!(
            compare_values(&CellValue::Empty, &CellValue::Int(0)).unwrap(),
            Ordering::Equal
        );
        assert_eq!(
            compare_values(&CellValue::Empty, &CellValue::Text("".into())).unwrap(),
            Ordering::Equal
        );
    }
}
