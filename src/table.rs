//! Delimited-text conversion between sheet exports and the upload wire
//! format. Parsing is deterministic and keeps cell text verbatim — no
//! numeric or date coercion, no locale-dependent behavior.

use crate::errors::ChartError;
use crate::model::TabularData;

/// Parse CSV-shaped export content into the canonical table.
///
/// Accepts RFC-4180-style input: comma delimiters, double-quote quoting with
/// `""` escapes, and CR/LF/CRLF row terminators. Ragged rows are preserved
/// as-is; the charting service tolerates them. Blank lines are skipped.
pub fn to_canonical_table(raw: &str) -> Result<TabularData, ChartError> {
    let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);

    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut cell = String::new();
    let mut in_quotes = false;
    let mut chars = raw.chars().peekable();

    while let Some(ch) = chars.next() {
        if in_quotes {
            match ch {
                '"' => {
                    if chars.peek() == Some(&'"') {
                        chars.next();
                        cell.push('"');
                    } else {
                        in_quotes = false;
                    }
                }
                _ => cell.push(ch),
            }
            continue;
        }

        match ch {
            '"' if cell.is_empty() => in_quotes = true,
            // A quote after unquoted content is kept literally; spreadsheet
            // exports never produce it but hand-edited files do.
            '"' => cell.push('"'),
            ',' => row.push(std::mem::take(&mut cell)),
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                finish_row(&mut rows, &mut row, &mut cell);
            }
            '\n' => finish_row(&mut rows, &mut row, &mut cell),
            _ => cell.push(ch),
        }
    }

    if in_quotes {
        return Err(ChartError::MalformedTabularContent(
            "unterminated quoted field".into(),
        ));
    }
    finish_row(&mut rows, &mut row, &mut cell);

    Ok(TabularData::new(rows))
}

fn finish_row(rows: &mut Vec<Vec<String>>, row: &mut Vec<String>, cell: &mut String) {
    if row.is_empty() && cell.is_empty() {
        return; // blank line
    }
    row.push(std::mem::take(cell));
    rows.push(std::mem::take(row));
}

/// Serialize the canonical table back to CSV for upload. Fields are quoted
/// only when they contain a delimiter, quote, or line break, so parsing then
/// serializing reproduces cell content exactly.
pub fn to_csv(table: &TabularData) -> String {
    let mut out = String::new();
    for row in &table.rows {
        let mut first = true;
        for cell in row {
            if !first {
                out.push(',');
            }
            first = false;
            write_field(&mut out, cell);
        }
        out.push('\n');
    }
    out
}

fn write_field(out: &mut String, cell: &str) {
    let needs_quoting = cell.contains([',', '"', '\n', '\r']);
    if !needs_quoting {
        out.push_str(cell);
        return;
    }
    out.push('"');
    for ch in cell.chars() {
        if ch == '"' {
            out.push('"');
        }
        out.push(ch);
    }
    out.push('"');
}
