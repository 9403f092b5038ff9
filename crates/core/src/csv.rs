//! Line-oriented CSV splitting.
//!
//! Handles double-quoted fields with embedded commas and `""` escapes. A
//! record is one physical line: quoted fields spanning lines are not joined.

/// Cells of one CSV line, each trimmed of surrounding whitespace.
pub fn split_record(line: &str) -> Vec<String> {
    let mut cells = Vec::new();
    let mut cell = String::new();
    let mut quoted = false;
    let mut chars = line.trim_end_matches(['\r', '\n']).chars().peekable();
    while let Some(c) = chars.next() {
        match (c, quoted) {
            ('"', true) if chars.peek() == Some(&'"') => {
                cell.push('"');
                chars.next();
            }
            ('"', true) => quoted = false,
            ('"', false) if cell.trim().is_empty() => {
                cell.clear();
                quoted = true;
            }
            (',', false) => cells.push(std::mem::take(&mut cell).trim().to_string()),
            _ => cell.push(c),
        }
    }
    cells.push(cell.trim().to_string());
    cells
}

/// First cell of a CSV line; empty for an empty line.
pub fn first_field(line: &str) -> String {
    split_record(line).into_iter().next().unwrap_or_default()
}
