//! Parsed cell/range locators.
//!
//! A [`Reference`] is the build-time form of a reference token; it is
//! resolved against a sheet-data snapshot only at evaluation time and never
//! cached across snapshots.

use std::fmt::{self, Display};

/// Highest column a reference may name (`XFD`).
const MAX_COL: u32 = 16_384;
/// Highest row a reference may name.
const MAX_ROW: u32 = 1_048_576;

/// A single cell coordinate, 1-based, with `$` absoluteness markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellAddr {
    pub row: u32,
    pub col: u32,
    pub abs_row: bool,
    pub abs_col: bool,
}

impl CellAddr {
    pub fn new(row: u32, col: u32) -> Self {
        CellAddr {
            row,
            col,
            abs_row: false,
            abs_col: false,
        }
    }
}

impl Display for CellAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.abs_col {
            f.write_str("$")?;
        }
        f.write_str(&col_to_letters(self.col))?;
        if self.abs_row {
            f.write_str("$")?;
        }
        write!(f, "{}", self.row)
    }
}

/// A parsed `(sheet, cell)` or `(sheet, range)` locator.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Reference {
    Cell {
        sheet: Option<String>,
        addr: CellAddr,
    },
    Range {
        sheet: Option<String>,
        start: CellAddr,
        end: CellAddr,
    },
}

impl Reference {
    /// Parse A1-form reference text: `B2`, `$A$1`, `A1:C3`, `Sheet1!A1:B2`,
    /// `'My Sheet'!A1`. Returns `None` for anything else, so identifier
    /// tokens that are not references fall through to the name-error path.
    pub fn parse(text: &str) -> Option<Reference> {
        let (sheet, body) = split_sheet(text)?;

        match body.split_once(':') {
            None => Some(Reference::Cell {
                sheet,
                addr: parse_a1(body)?,
            }),
            Some((a, b)) => {
                let first = parse_a1(a)?;
                let second = parse_a1(b)?;
                // Normalise so start is the top-left corner.
                let start = CellAddr {
                    row: first.row.min(second.row),
                    col: first.col.min(second.col),
                    abs_row: first.abs_row,
                    abs_col: first.abs_col,
                };
                let end = CellAddr {
                    row: first.row.max(second.row),
                    col: first.col.max(second.col),
                    abs_row: second.abs_row,
                    abs_col: second.abs_col,
                };
                Some(Reference::Range { sheet, start, end })
            }
        }
    }

    pub fn sheet(&self) -> Option<&str> {
        match self {
            Reference::Cell { sheet, .. } | Reference::Range { sheet, .. } => sheet.as_deref(),
        }
    }

    /// (rows, cols) footprint of the reference.
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            Reference::Cell { .. } => (1, 1),
            Reference::Range { start, end, .. } => {
                (end.row - start.row + 1, end.col - start.col + 1)
            }
        }
    }
}

impl Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_sheet = |f: &mut fmt::Formatter<'_>, sheet: &Option<String>| -> fmt::Result {
            if let Some(name) = sheet {
                if name.chars().all(|c| c.is_alphanumeric() || c == '_') {
                    write!(f, "{name}!")?;
                } else {
                    write!(f, "'{}'!", name.replace('\'', "''"))?;
                }
            }
            Ok(())
        };
        match self {
            Reference::Cell { sheet, addr } => {
                write_sheet(f, sheet)?;
                write!(f, "{addr}")
            }
            Reference::Range { sheet, start, end } => {
                write_sheet(f, sheet)?;
                write!(f, "{start}:{end}")
            }
        }
    }
}

/// Split an optional sheet qualifier off the front of reference text.
fn split_sheet(text: &str) -> Option<(Option<String>, &str)> {
    if let Some(rest) = text.strip_prefix('\'') {
        // Quoted sheet name; '' inside the quotes escapes a quote.
        let mut name = String::new();
        let bytes = rest.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] == b'\'' {
                if bytes.get(i + 1) == Some(&b'\'') {
                    name.push('\'');
                    i += 2;
                } else {
                    let tail = &rest[i + 1..];
                    let body = tail.strip_prefix('!')?;
                    if name.is_empty() {
                        return None;
                    }
                    return Some((Some(name), body));
                }
            } else {
                let ch = rest[i..].chars().next()?;
                name.push(ch);
                i += ch.len_utf8();
            }
        }
        None // unterminated quote
    } else {
        match text.split_once('!') {
            None => Some((None, text)),
            Some((sheet, body)) => {
                if sheet.is_empty()
                    || !sheet
                        .chars()
                        .all(|c| c.is_alphanumeric() || c == '_' || c == '.')
                {
                    return None;
                }
                Some((Some(sheet.to_string()), body))
            }
        }
    }
}

/// Parse a single A1 coordinate with optional `$` markers.
fn parse_a1(text: &str) -> Option<CellAddr> {
    let mut rest = text;
    let abs_col = rest.starts_with('$');
    if abs_col {
        rest = &rest[1..];
    }

    let letters_end = rest
        .bytes()
        .position(|b| !b.is_ascii_alphabetic())
        .unwrap_or(rest.len());
    if letters_end == 0 || letters_end > 3 {
        return None;
    }
    let mut col = 0u32;
    for b in rest[..letters_end].bytes() {
        col = col * 26 + (b.to_ascii_uppercase() - b'A' + 1) as u32;
    }
    rest = &rest[letters_end..];

    let abs_row = rest.starts_with('$');
    if abs_row {
        rest = &rest[1..];
    }
    if rest.is_empty() || !rest.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let row: u32 = rest.parse().ok()?;
    if row == 0 || row > MAX_ROW || col > MAX_COL {
        return None;
    }

    Some(CellAddr {
        row,
        col,
        abs_row,
        abs_col,
    })
}

/// 1-based column index to letters (1 -> A, 27 -> AA).
pub fn col_to_letters(mut col: u32) -> String {
    let mut out = String::new();
    while col > 0 {
        let rem = ((col - 1) % 26) as u8;
        out.insert(0, (b'A' + rem) as char);
        col = (col - 1) / 26;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_cell() {
        let r = Reference::parse("B2").unwrap();
        assert_eq!(
            r,
            Reference::Cell {
                sheet: None,
                addr: CellAddr::new(2, 2),
            }
        );
    }

    #[test]
    fn parses_absolute_markers() {
        let Reference::Cell { addr, .. } = Reference::parse("$AB$10").unwrap() else {
            panic!();
        };
        assert_eq!(addr.col, 28);
        assert_eq!(addr.row, 10);
        assert!(addr.abs_col && addr.abs_row);
    }

    #[test]
    fn parses_sheet_qualified_range() {
        let r = Reference::parse("Sheet1!A1:B2").unwrap();
        assert_eq!(r.sheet(), Some("Sheet1"));
        assert_eq!(r.dimensions(), (2, 2));
    }

    #[test]
    fn parses_quoted_sheet_name() {
        let r = Reference::parse("'My Sheet'!C3").unwrap();
        assert_eq!(r.sheet(), Some("My Sheet"));

        let r = Reference::parse("'It''s'!A1").unwrap();
        assert_eq!(r.sheet(), Some("It's"));
    }

    #[test]
    fn normalises_range_order() {
        let Reference::Range { start, end, .. } = Reference::parse("B2:A1").unwrap() else {
            panic!();
        };
        assert_eq!((start.row, start.col), (1, 1));
        assert_eq!((end.row, end.col), (2, 2));
    }

    #[test]
    fn rejects_non_references() {
        for bad in ["FOO", "A", "1A", "A0", "AAAA1", "A1B", "Sheet1!", "!A1", "'x!A1"] {
            assert!(Reference::parse(bad).is_none(), "{bad} should not parse");
        }
    }

    #[test]
    fn column_letters_round_trip() {
        assert_eq!(col_to_letters(1), "A");
        assert_eq!(col_to_letters(26), "Z");
        assert_eq!(col_to_letters(27), "AA");
        assert_eq!(col_to_letters(703), "AAA");
    }

    #[test]
    fn display_round_trip() {
        for text in ["A1", "$B$2", "Sheet1!A1:C3", "'My Sheet'!D4"] {
            let r = Reference::parse(text).unwrap();
            assert_eq!(Reference::parse(&r.to_string()), Some(r));
        }
    }
}
