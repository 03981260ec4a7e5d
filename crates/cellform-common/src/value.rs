use std::{
    fmt::{self, Display},
    hash::{Hash, Hasher},
};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{FormulaError, FormulaErrorKind};

/// An interpreter value: the tagged result every expression node produces.
///
/// Arrays are row-major (`values[row][col]`). `Empty` is the empty-cell
/// sentinel and also stands in for elided optional arguments.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Int(i64),
    Number(f64),
    Text(String),
    Boolean(bool),
    Array(Vec<Vec<CellValue>>),
    Empty,
    Error(FormulaError),
}

impl Hash for CellValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            CellValue::Int(i) => i.hash(state),
            CellValue::Number(n) => n.to_bits().hash(state),
            CellValue::Text(s) => s.hash(state),
            CellValue::Boolean(b) => b.hash(state),
            CellValue::Array(a) => a.hash(state),
            CellValue::Empty => state.write_u8(0),
            CellValue::Error(e) => e.hash(state),
        }
    }
}

impl Eq for CellValue {}

impl Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Int(i) => write!(f, "{i}"),
            CellValue::Number(n) => write!(f, "{n}"),
            CellValue::Text(s) => write!(f, "{s}"),
            CellValue::Boolean(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            CellValue::Array(a) => write!(f, "{a:?}"),
            CellValue::Empty => write!(f, ""),
            CellValue::Error(e) => write!(f, "{e}"),
        }
    }
}

impl CellValue {
    /// Implicit intersection: reduce an array to the single value it holds.
    ///
    /// Scalars pass through; a 1x1 array unwraps; an empty array collapses to
    /// `Empty`; anything larger yields `#VALUE!`.
    pub fn coerce_to_single_value(&self) -> Result<CellValue, FormulaError> {
        match self {
            CellValue::Array(arr) => {
                if arr.len() == 1 && arr[0].len() == 1 {
                    Ok(arr[0][0].clone())
                } else if arr.is_empty() || arr[0].is_empty() {
                    Ok(CellValue::Empty)
                } else {
                    Err(FormulaError::new(FormulaErrorKind::Value)
                        .with_message("implicit intersection over a multi-cell array"))
                }
            }
            _ => Ok(self.clone()),
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            CellValue::Boolean(b) => *b,
            CellValue::Int(i) => *i != 0,
            CellValue::Number(n) => *n != 0.0,
            CellValue::Text(s) => !s.is_empty(),
            CellValue::Array(arr) => !arr.is_empty(),
            CellValue::Empty => false,
            CellValue::Error(_) => false,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, CellValue::Error(_))
    }

    /// Lenient numeric view: ints, numbers, booleans and numeric text all
    /// read as `f64`; everything else is `None`.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Int(i) => Some(*i as f64),
            CellValue::Number(n) => Some(*n),
            CellValue::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            CellValue::Text(s) => s.trim().parse::<f64>().ok(),
            CellValue::Empty => Some(0.0),
            _ => None,
        }
    }
}
