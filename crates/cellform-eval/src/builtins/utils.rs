//! Coercion helpers shared by the builtin executors.

use cellform_common::{CellValue, FormulaError, FormulaErrorKind};

/// Strict numeric coercion: implicit intersection first, then the lenient
/// numeric view. Non-numeric input is a `#VALUE!`.
pub(crate) fn to_number(v: &CellValue) -> Result<f64, FormulaError> {
    let single = v.coerce_to_single_value()?;
    single.as_number().ok_or_else(|| {
        FormulaError::new(FormulaErrorKind::Value).with_message(format!("'{single}' is not numeric"))
    })
}

/// Text coercion. `Empty` reads as the empty string; booleans as
/// `TRUE`/`FALSE`.
pub(crate) fn to_text(v: &CellValue) -> Result<String, FormulaError> {
    match v.coerce_to_single_value()? {
        CellValue::Empty => Ok(String::new()),
        other => Ok(other.to_string()),
    }
}

/// Flatten aggregate arguments into a number list.
///
/// Range semantics: inside arrays, non-numeric cells are skipped and error
/// cells propagate. A scalar argument must itself be numeric.
pub(crate) fn collect_numbers(args: &[CellValue]) -> Result<Vec<f64>, FormulaError> {
    let mut out = Vec::new();
    for arg in args {
        push_numbers(arg, true, &mut out)?;
    }
    Ok(out)
}

fn push_numbers(v: &CellValue, top_level: bool, out: &mut Vec<f64>) -> Result<(), FormulaError> {
    match v {
        CellValue::Array(rows) => {
            for row in rows {
                for cell in row {
                    push_numbers(cell, false, out)?;
                }
            }
            Ok(())
        }
        CellValue::Error(e) => Err(e.clone()),
        CellValue::Empty => Ok(()),
        CellValue::Int(i) => {
            out.push(*i as f64);
            Ok(())
        }
        CellValue::Number(n) => {
            out.push(*n);
            Ok(())
        }
        other => {
            // A literal argument must be numeric; a cell inside a range that
            // holds text or a boolean is simply not counted.
            if top_level {
                match other.as_number() {
                    Some(n) => {
                        out.push(n);
                        Ok(())
                    }
                    None => Err(FormulaError::new(FormulaErrorKind::Value)
                        .with_message(format!("'{other}' is not numeric"))),
                }
            } else {
                Ok(())
            }
        }
    }
}
