//! Reference resolution against a read-only sheet-data snapshot.

use rustc_hash::FxHashMap;

use cellform_common::{CellValue, FormulaError, FormulaErrorKind};

use crate::reference::Reference;

/// The seam between the engine and the host's cell storage.
///
/// Resolution never mutates the snapshot; a failed lookup is reported as a
/// `#REF!`-class error value, not a fault.
pub trait ReferenceResolver: Send + Sync {
    /// A single-cell reference yields a scalar (or `Empty`); a range yields a
    /// row-major 2-D array.
    fn resolve(
        &self,
        reference: &Reference,
        current_sheet: &str,
    ) -> Result<CellValue, FormulaError>;
}

#[derive(Debug, Default, Clone)]
struct Sheet {
    rows: u32,
    cols: u32,
    cells: FxHashMap<(u32, u32), CellValue>,
}

/// In-memory snapshot of sheet data: `{sheet -> {(row, col) -> value}}` with
/// explicit per-sheet bounds. Built once by the host, read-only during
/// evaluation.
#[derive(Debug, Default, Clone)]
pub struct SheetSnapshot {
    sheets: FxHashMap<String, Sheet>,
}

impl SheetSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a sheet with explicit bounds. Addresses outside the bounds
    /// resolve to `#REF!`.
    pub fn with_sheet<S: Into<String>>(mut self, name: S, rows: u32, cols: u32) -> Self {
        let sheet = self.sheets.entry(name.into()).or_default();
        sheet.rows = sheet.rows.max(rows);
        sheet.cols = sheet.cols.max(cols);
        self
    }

    /// Set a cell, growing the sheet's bounds to include it.
    pub fn with_cell<S: Into<String>>(mut self, sheet: S, row: u32, col: u32, v: CellValue) -> Self {
        let sheet = self.sheets.entry(sheet.into()).or_default();
        sheet.rows = sheet.rows.max(row);
        sheet.cols = sheet.cols.max(col);
        sheet.cells.insert((row, col), v);
        self
    }

    /// Set a cell by A1 text.
    ///
    /// # Panics
    /// Panics when `a1` is not a single-cell address; this is a construction
    /// helper, not a parse entry point.
    pub fn with_cell_a1<S: Into<String>, A: AsRef<str>>(self, sheet: S, a1: A, v: CellValue) -> Self {
        match Reference::parse(a1.as_ref()) {
            Some(Reference::Cell { addr, .. }) => self.with_cell(sheet, addr.row, addr.col, v),
            _ => panic!("bad A1 ref in with_cell_a1: {}", a1.as_ref()),
        }
    }

    fn sheet(&self, name: &str) -> Result<&Sheet, FormulaError> {
        self.sheets.get(name).ok_or_else(|| {
            FormulaError::new(FormulaErrorKind::Ref).with_message(format!("unknown sheet '{name}'"))
        })
    }
}

impl ReferenceResolver for SheetSnapshot {
    fn resolve(
        &self,
        reference: &Reference,
        current_sheet: &str,
    ) -> Result<CellValue, FormulaError> {
        let sheet_name = reference.sheet().unwrap_or(current_sheet);
        let sheet = self.sheet(sheet_name)?;

        match reference {
            Reference::Cell { addr, .. } => {
                if addr.row > sheet.rows || addr.col > sheet.cols {
                    return Err(FormulaError::new(FormulaErrorKind::Ref)
                        .with_message(format!("{reference} is outside '{sheet_name}'")));
                }
                Ok(sheet
                    .cells
                    .get(&(addr.row, addr.col))
                    .cloned()
                    .unwrap_or(CellValue::Empty))
            }
            Reference::Range { start, end, .. } => {
                if end.row > sheet.rows || end.col > sheet.cols {
                    return Err(FormulaError::new(FormulaErrorKind::Ref)
                        .with_message(format!("{reference} is outside '{sheet_name}'")));
                }
                let mut data = Vec::with_capacity((end.row - start.row + 1) as usize);
                for r in start.row..=end.row {
                    let mut row = Vec::with_capacity((end.col - start.col + 1) as usize);
                    for c in start.col..=end.col {
                        row.push(sheet.cells.get(&(r, c)).cloned().unwrap_or(CellValue::Empty));
                    }
                    data.push(row);
                }
                Ok(CellValue::Array(data))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> SheetSnapshot {
        SheetSnapshot::new()
            .with_sheet("Sheet1", 3, 3)
            .with_cell_a1("Sheet1", "A1", CellValue::Int(5))
            .with_cell_a1("Sheet1", "B1", CellValue::Int(10))
    }

    #[test]
    fn single_cell_scalar() {
        let snap = snapshot();
        let r = Reference::parse("A1").unwrap();
        assert_eq!(snap.resolve(&r, "Sheet1").unwrap(), CellValue::Int(5));
    }

    #[test]
    fn empty_cell_sentinel() {
        let snap = snapshot();
        let r = Reference::parse("C3").unwrap();
        assert_eq!(snap.resolve(&r, "Sheet1").unwrap(), CellValue::Empty);
    }

    #[test]
    fn range_is_row_major() {
        let snap = snapshot().with_cell_a1("Sheet1", "A2", CellValue::Int(7));
        let r = Reference::parse("A1:B2").unwrap();
        let CellValue::Array(rows) = snap.resolve(&r, "Sheet1").unwrap() else {
            panic!();
        };
        assert_eq!(rows[0], vec![CellValue::Int(5), CellValue::Int(10)]);
        assert_eq!(rows[1], vec![CellValue::Int(7), CellValue::Empty]);
    }

    #[test]
    fn unknown_sheet_is_ref_error() {
        let snap = snapshot();
        let r = Reference::parse("Missing!A1").unwrap();
        let err = snap.resolve(&r, "Sheet1").unwrap_err();
        assert_eq!(err.kind, FormulaErrorKind::Ref);
    }

    #[test]
    fn out_of_bounds_is_ref_error() {
        let snap = snapshot(); // 3 columns
        let r = Reference::parse("A1:Z1").unwrap();
        let err = snap.resolve(&r, "Sheet1").unwrap_err();
        assert_eq!(err.kind, FormulaErrorKind::Ref);
    }

    #[test]
    fn qualified_reference_overrides_current_sheet() {
        let snap = snapshot()
            .with_sheet("Data", 2, 2)
            .with_cell_a1("Data", "A1", CellValue::Int(42));
        let r = Reference::parse("Data!A1").unwrap();
        assert_eq!(snap.resolve(&r, "Sheet1").unwrap(), CellValue::Int(42));
    }
}
