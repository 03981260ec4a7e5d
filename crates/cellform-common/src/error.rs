//! Spreadsheet-style error representation.
//!
//! - **`FormulaErrorKind`** : the canonical set of error codes
//! - **`FormulaError`**     : kind + optional human message
//!
//! Formula errors are *values*, not faults: evaluation carries them inside
//! [`CellValue::Error`](crate::CellValue::Error) and returns them like any
//! other result. `std::error::Error` is implemented so they can still cross
//! a `Result` boundary where a function genuinely cannot proceed.

use std::{error::Error, fmt};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::CellValue;

/// All recognised formula error codes.
///
/// Names are CamelCase while `Display` renders them the way a sheet shows
/// them (`#DIV/0!`, …).
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum FormulaErrorKind {
    /// `#NAME?` – unknown function or unresolvable identifier.
    Name,
    /// `#REF!` – invalid or out-of-bounds reference.
    Ref,
    /// `#VALUE!` – type-mismatched argument.
    Value,
    /// `#DIV/0!`
    Div,
    /// `#NUM!` – numeric domain failure.
    Num,
    /// `#N/A`
    Na,
    /// `#CANCELLED!` – a deferred computation was abandoned by its producer.
    Cancelled,
    /// `#ERROR!` – uncategorised executor failure.
    Error,
}

impl fmt::Display for FormulaErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Name => "#NAME?",
            Self::Ref => "#REF!",
            Self::Value => "#VALUE!",
            Self::Div => "#DIV/0!",
            Self::Num => "#NUM!",
            Self::Na => "#N/A",
            Self::Cancelled => "#CANCELLED!",
            Self::Error => "#ERROR!",
        })
    }
}

impl FormulaErrorKind {
    /// Parse a literal error code as it appears in formula text.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "#NAME?" => Some(Self::Name),
            "#REF!" => Some(Self::Ref),
            "#VALUE!" => Some(Self::Value),
            "#DIV/0!" => Some(Self::Div),
            "#NUM!" => Some(Self::Num),
            "#N/A" => Some(Self::Na),
            "#CANCELLED!" => Some(Self::Cancelled),
            "#ERROR!" => Some(Self::Error),
            _ => None,
        }
    }
}

/// The single error struct the API passes around: mandatory kind plus an
/// optional human explanation.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FormulaError {
    pub kind: FormulaErrorKind,
    pub message: Option<String>,
}

impl From<FormulaErrorKind> for FormulaError {
    fn from(kind: FormulaErrorKind) -> Self {
        Self {
            kind,
            message: None,
        }
    }
}

impl FormulaError {
    /// Basic constructor (no message).
    pub fn new(kind: FormulaErrorKind) -> Self {
        kind.into()
    }

    /// Attach a human-readable explanation.
    pub fn with_message<S: Into<String>>(mut self, msg: S) -> Self {
        self.message = Some(msg.into());
        self
    }
}

impl fmt::Display for FormulaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(ref msg) = self.message {
            write!(f, ": {msg}")?;
        }
        Ok(())
    }
}

impl Error for FormulaError {}

impl From<FormulaError> for CellValue {
    fn from(error: FormulaError) -> Self {
        CellValue::Error(error)
    }
}

impl PartialEq<str> for FormulaErrorKind {
    fn eq(&self, other: &str) -> bool {
        self.to_string() == other
    }
}

impl PartialEq<str> for FormulaError {
    fn eq(&self, other: &str) -> bool {
        self.kind.to_string() == other
    }
}

impl PartialEq<&str> for FormulaError {
    fn eq(&self, other: &&str) -> bool {
        self.kind.to_string() == *other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_sheet_codes() {
        assert_eq!(FormulaErrorKind::Div.to_string(), "#DIV/0!");
        assert_eq!(FormulaErrorKind::Name.to_string(), "#NAME?");
        assert_eq!(
            FormulaError::new(FormulaErrorKind::Ref)
                .with_message("sheet 'Missing' not found")
                .to_string(),
            "#REF!: sheet 'Missing' not found"
        );
    }

    #[test]
    fn parse_round_trips_every_kind() {
        for kind in [
            FormulaErrorKind::Name,
            FormulaErrorKind::Ref,
            FormulaErrorKind::Value,
            FormulaErrorKind::Div,
            FormulaErrorKind::Num,
            FormulaErrorKind::Na,
            FormulaErrorKind::Cancelled,
            FormulaErrorKind::Error,
        ] {
            assert_eq!(FormulaErrorKind::parse(&kind.to_string()), Some(kind));
        }
        assert_eq!(FormulaErrorKind::parse("#BOGUS!"), None);
    }

    #[test]
    fn compares_against_code_strings() {
        let e = FormulaError::new(FormulaErrorKind::Value).with_message("bad arg");
        assert_eq!(e, "#VALUE!");
    }
}
