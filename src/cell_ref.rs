//! A1-style cell references.
//!
//! The grid model addresses cells by zero-based `(row, col)` coordinates;
//! these helpers convert to and from the textual form used in sheet XML.

/// Parse a reference like "B3" into zero-based `(col, row)`.
///
/// `$` anchors are ignored. Returns `None` when either the column letters or
/// the row digits are missing.
pub fn parse_cell_ref(cell_ref: &str) -> Option<(u32, u32)> {
    parse_cell_ref_bytes(cell_ref.trim().as_bytes())
}

/// Bytes variant of [`parse_cell_ref`] for raw quick-xml attribute values.
pub fn parse_cell_ref_bytes(ref_bytes: &[u8]) -> Option<(u32, u32)> {
    let mut col: u32 = 0;
    let mut row: u32 = 0;
    let mut saw_col = false;
    let mut saw_row = false;

    for &b in ref_bytes {
        if b == b'$' {
            continue;
        }
        if b.is_ascii_alphabetic() && !saw_row {
            let upper = b.to_ascii_uppercase();
            col = col
                .saturating_mul(26)
                .saturating_add(u32::from(upper - b'A') + 1);
            saw_col = true;
        } else if b.is_ascii_digit() {
            row = row.saturating_mul(10).saturating_add(u32::from(b - b'0'));
            saw_row = true;
        } else {
            return None;
        }
    }

    if !saw_col || !saw_row {
        return None;
    }

    Some((col.saturating_sub(1), row.saturating_sub(1)))
}

/// Parse a range like "A1:C4" (or a single cell) into
/// `(start_row, start_col, end_row, end_col)`, normalised so start <= end.
pub fn parse_cell_range(range: &str) -> Option<(u32, u32, u32, u32)> {
    let (start, end) = range.split_once(':').unwrap_or((range, range));
    let (c1, r1) = parse_cell_ref(start)?;
    let (c2, r2) = parse_cell_ref(end)?;
    Some((r1.min(r2), c1.min(c2), r1.max(r2), c1.max(c2)))
}

/// Zero-based column index to letters (0 -> "A", 26 -> "AA").
pub fn col_to_letter(col: u32) -> String {
    let mut result = String::new();
    let mut n = u64::from(col) + 1;
    while n > 0 {
        n -= 1;
        let offset = u8::try_from(n % 26).unwrap_or(0);
        result.insert(0, char::from(b'A' + offset));
        n /= 26;
    }
    result
}

/// Zero-based `(row, col)` to an A1 reference.
pub fn cell_name(row: u32, col: u32) -> String {
    format!("{}{}", col_to_letter(col), u64::from(row) + 1)
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("A1", Some((0, 0)); "origin")]
    #[test_case("B3", Some((1, 2)); "simple")]
    #[test_case("$AA$10", Some((26, 9)); "anchored double letter")]
    #[test_case("a2", Some((0, 1)); "lowercase")]
    #[test_case("12", None; "no column")]
    #[test_case("AB", None; "no row")]
    #[test_case("A1B", None; "letters after digits")]
    fn parses_refs(input: &str, expected: Option<(u32, u32)>) {
        assert_eq!(parse_cell_ref(input), expected);
    }

    #[test]
    fn parses_and_normalises_ranges() {
        assert_eq!(parse_cell_range("A1:B2"), Some((0, 0, 1, 1)));
        assert_eq!(parse_cell_range("C4:A1"), Some((0, 0, 3, 2)));
        assert_eq!(parse_cell_range("D7"), Some((6, 3, 6, 3)));
        assert_eq!(parse_cell_range("nonsense"), None);
    }

    #[test_case(0, "A")]
    #[test_case(25, "Z")]
    #[test_case(26, "AA")]
    #[test_case(701, "ZZ")]
    #[test_case(702, "AAA")]
    fn letters(col: u32, expected: &str) {
        assert_eq!(col_to_letter(col), expected);
    }

    #[test]
    fn names_round_trip_through_parser() {
        let name = cell_name(41, 27);
        assert_eq!(name, "AB42");
        assert_eq!(parse_cell_ref(&name), Some((27, 41)));
    }
}
