//! Position-aware functions: these ask where the formula lives.

use std::sync::Arc;

use cellform_common::{CellValue, FormulaError, FormulaErrorKind};

use super::utils::to_number;
use crate::function::{FnCaps, FnResult, Function, FunctionContext};
use crate::reference::col_to_letters;
use crate::registry::FunctionRegistry;

pub(crate) fn install(registry: &mut FunctionRegistry) {
    registry.register(Arc::new(Origin { name: "ROW", row: true }));
    registry.register(Arc::new(Origin { name: "COLUMN", row: false }));
    registry.register(Arc::new(Address));
}

/// ROW() / COLUMN() of the evaluation origin.
struct Origin {
    name: &'static str,
    row: bool,
}

impl Function for Origin {
    fn name(&self) -> &'static str {
        self.name
    }

    fn caps(&self) -> FnCaps {
        FnCaps::PURE | FnCaps::ADDRESS
    }

    fn max_args(&self) -> Option<usize> {
        Some(0)
    }

    fn call(&self, _: &[CellValue], ctx: &FunctionContext<'_>) -> FnResult {
        match ctx.origin {
            Some(addr) => {
                let n = if self.row { addr.row } else { addr.col };
                CellValue::Int(n as i64).into()
            }
            None => FormulaError::new(FormulaErrorKind::Value)
                .with_message("evaluation origin unknown")
                .into(),
        }
    }
}

/// `ADDRESS(row, col)` -> absolute A1 text.
struct Address;

impl Function for Address {
    fn name(&self) -> &'static str {
        "ADDRESS"
    }

    fn min_args(&self) -> usize {
        2
    }

    fn max_args(&self) -> Option<usize> {
        Some(2)
    }

    fn call(&self, args: &[CellValue], _: &FunctionContext<'_>) -> FnResult {
        let text = (|| {
            let row = to_number(&args[0])? as i64;
            let col = to_number(&args[1])? as i64;
            if row < 1 || col < 1 {
                return Err(FormulaError::new(FormulaErrorKind::Value)
                    .with_message("row and column are 1-based"));
            }
            Ok(format!("${}${row}", col_to_letters(col as u32)))
        })();
        match text {
            Ok(s) => CellValue::Text(s).into(),
            Err(e) => e.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::CellAddr;
    use crate::resolver::SheetSnapshot;

    #[test]
    fn row_and_column_need_an_origin() {
        let snap = SheetSnapshot::new();
        let row = Origin { name: "ROW", row: true };

        let without = FunctionContext {
            resolver: &snap,
            current_sheet: "Sheet1",
            origin: None,
        };
        let FnResult::Value(CellValue::Error(e)) = row.call(&[], &without) else {
            panic!();
        };
        assert_eq!(e.kind, FormulaErrorKind::Value);

        let with = FunctionContext {
            resolver: &snap,
            current_sheet: "Sheet1",
            origin: Some(CellAddr::new(5, 2)),
        };
        let FnResult::Value(v) = row.call(&[], &with) else {
            panic!();
        };
        assert_eq!(v, CellValue::Int(5));
    }

    #[test]
    fn address_formats_absolute_a1() {
        let snap = SheetSnapshot::new();
        let ctx = FunctionContext {
            resolver: &snap,
            current_sheet: "Sheet1",
            origin: None,
        };
        let FnResult::Value(v) = Address.call(&[CellValue::Int(2), CellValue::Int(28)], &ctx)
        else {
            panic!();
        };
        assert_eq!(v, CellValue::Text("$AB$2".into()));
    }
}
