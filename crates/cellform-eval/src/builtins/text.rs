//! Text functions.

use std::sync::Arc;

use cellform_common::{CellValue, FormulaError, FormulaErrorKind};

use super::utils::{to_number, to_text};
use crate::function::{FnResult, Function, FunctionContext};
use crate::registry::FunctionRegistry;

pub(crate) fn install(registry: &mut FunctionRegistry) {
    registry.register(Arc::new(Concatenate));
    registry.register(Arc::new(Len));
    let maps: [(&'static str, MapFn); 3] = [
        ("UPPER", |s| s.to_uppercase()),
        ("LOWER", |s| s.to_lowercase()),
        ("TRIM", |s| s.trim().to_string()),
    ];
    for (name, apply) in maps {
        registry.register(Arc::new(TextMap { name, apply }));
    }
    registry.register(Arc::new(Slice { name: "LEFT", from_end: false }));
    registry.register(Arc::new(Slice { name: "RIGHT", from_end: true }));
}

struct Concatenate;

impl Function for Concatenate {
    fn name(&self) -> &'static str {
        "CONCATENATE"
    }

    fn min_args(&self) -> usize {
        1
    }

    fn call(&self, args: &[CellValue], _: &FunctionContext<'_>) -> FnResult {
        let mut out = String::new();
        for arg in args {
            match to_text(arg) {
                Ok(s) => out.push_str(&s),
                Err(e) => return e.into(),
            }
        }
        CellValue::Text(out).into()
    }
}

struct Len;

impl Function for Len {
    fn name(&self) -> &'static str {
        "LEN"
    }

    fn min_args(&self) -> usize {
        1
    }

    fn max_args(&self) -> Option<usize> {
        Some(1)
    }

    fn call(&self, args: &[CellValue], _: &FunctionContext<'_>) -> FnResult {
        match to_text(&args[0]) {
            Ok(s) => CellValue::Int(s.chars().count() as i64).into(),
            Err(e) => e.into(),
        }
    }
}

type MapFn = fn(&str) -> String;

struct TextMap {
    name: &'static str,
    apply: MapFn,
}

impl Function for TextMap {
    fn name(&self) -> &'static str {
        self.name
    }

    fn min_args(&self) -> usize {
        1
    }

    fn max_args(&self) -> Option<usize> {
        Some(1)
    }

    fn call(&self, args: &[CellValue], _: &FunctionContext<'_>) -> FnResult {
        match to_text(&args[0]) {
            Ok(s) => CellValue::Text((self.apply)(&s)).into(),
            Err(e) => e.into(),
        }
    }
}

/// LEFT / RIGHT with an optional count, defaulting to one character.
struct Slice {
    name: &'static str,
    from_end: bool,
}

impl Function for Slice {
    fn name(&self) -> &'static str {
        self.name
    }

    fn min_args(&self) -> usize {
        1
    }

    fn max_args(&self) -> Option<usize> {
        Some(2)
    }

    fn call(&self, args: &[CellValue], _: &FunctionContext<'_>) -> FnResult {
        let sliced = (|| {
            let text = to_text(&args[0])?;
            let count = match args.get(1) {
                Some(n) => {
                    let n = to_number(n)?;
                    if n < 0.0 {
                        return Err(FormulaError::new(FormulaErrorKind::Value)
                            .with_message("negative character count"));
                    }
                    n as usize
                }
                None => 1,
            };
            let chars: Vec<char> = text.chars().collect();
            let count = count.min(chars.len());
            let slice: String = if self.from_end {
                chars[chars.len() - count..].iter().collect()
            } else {
                chars[..count].iter().collect()
            };
            Ok(slice)
        })();
        match sliced {
            Ok(s) => CellValue::Text(s).into(),
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
            FnResult::Pending(_) => panic!("text functions never suspend"),
        }
    }

    #[test]
    fn concatenate_coerces_every_argument() {
        let out = call(
            &Concatenate,
            &[
                CellValue::Text("n=".into()),
                CellValue::Int(3),
                CellValue::Boolean(true),
                CellValue::Empty,
            ],
        );
        assert_eq!(out, CellValue::Text("n=3TRUE".into()));
    }

    #[test]
    fn len_counts_chars_not_bytes() {
        assert_eq!(
            call(&Len, &[CellValue::Text("héllo".into())]),
            CellValue::Int(5)
        );
    }

    #[test]
    fn left_and_right_clamp_to_length() {
        let left = Slice { name: "LEFT", from_end: false };
        let right = Slice { name: "RIGHT", from_end: true };
        assert_eq!(
            call(&left, &[CellValue::Text("abc".into()), CellValue::Int(10)]),
            CellValue::Text("abc".into())
        );
        assert_eq!(
            call(&right, &[CellValue::Text("abc".into())]),
            CellValue::Text("c".into())
        );
    }
}
