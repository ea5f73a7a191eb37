//! CSV parsing into headers and rows.
//!
//! Handles quoted fields with embedded separators, doubled quotes and line
//! breaks. Blank lines are skipped; a line holding only `""` is a record
//! with one empty field.

use serde_json::{Value, json};

use crate::error::{ServiceError, ServiceResult};

/// Parse CSV text into records
pub fn parse_records(input: &str) -> ServiceResult<Vec<Vec<String>>> {
    let mut records = Vec::new();
    let mut record: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut quoted = false;
    let mut line = 1;
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                '\n' => {
                    line += 1;
                    field.push(c);
                }
                _ => field.push(c),
            }
            continue;
        }

        match c {
            '"' if field.is_empty() => {
                in_quotes = true;
                quoted = true;
            }
            ',' => record.push(std::mem::take(&mut field)),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' | '\r' => {
                line += 1;
                record.push(std::mem::take(&mut field));
                finish_record(&mut records, std::mem::take(&mut record), quoted);
                quoted = false;
            }
            _ => field.push(c),
        }
    }

    if in_quotes {
        return Err(ServiceError::validation(format!(
            "CSV has an unterminated quoted field near line {}",
            line
        )));
    }
    if !field.is_empty() || !record.is_empty() || quoted {
        record.push(field);
        finish_record(&mut records, record, quoted);
    }

    Ok(records)
}

fn finish_record(records: &mut Vec<Vec<String>>, record: Vec<String>, quoted: bool) {
    let blank = !quoted && record.len() == 1 && record[0].trim().is_empty();
    if !blank {
        records.push(record);
    }
}

/// Build the structured content for a CSV document: the first record is the header row
pub fn structure(text: &str) -> ServiceResult<Value> {
    let mut records = parse_records(text)?.into_iter();
    let headers = records
        .next()
        .ok_or_else(|| ServiceError::validation("CSV file has no header row"))?;
    let rows: Vec<Vec<String>> = records.collect();

    Ok(json!({
        "headers": headers,
        "row_count": rows.len(),
        "rows": rows,
    }))
}
