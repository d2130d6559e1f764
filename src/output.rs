//! Final artifact writers
//!
//! - JSON: one array of records, 4-space indented, non-ASCII kept as UTF-8
//! - CSV: fixed `category,regex` header, every field quoted

use crate::error::{OutputError, OutputResult};
use crate::jobs::regex_scrape::RegexRow;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Header of the scrape CSV
pub const CSV_HEADER: [&str; 2] = ["category", "regex"];

fn create(path: &Path) -> OutputResult<BufWriter<File>> {
    let file = File::create(path).map_err(|source| OutputError::Create {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(BufWriter::new(file))
}

/// Serialize records as an indented JSON array
pub fn write_json_to<W: Write, T: Serialize>(writer: W, records: &[T]) -> OutputResult<()> {
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(writer, formatter);
    records.serialize(&mut serializer)?;
    Ok(())
}

/// Write records to `path` as a JSON array, returning the file size
pub fn write_json_array<T: Serialize>(path: &Path, records: &[T]) -> OutputResult<u64> {
    let mut writer = create(path)?;
    write_json_to(&mut writer, records)?;
    writer.flush()?;
    Ok(std::fs::metadata(path)?.len())
}

/// Serialize rows as quoted CSV with the `category,regex` header
pub fn write_csv_to<W: Write>(writer: W, rows: &[RegexRow]) -> OutputResult<()> {
    // Header written by hand so it is present even without rows
    let mut csv_writer = csv::WriterBuilder::new()
        .has_headers(false)
        .quote_style(csv::QuoteStyle::Always)
        .from_writer(writer);

    csv_writer.write_record(CSV_HEADER)?;
    for row in rows {
        csv_writer.serialize(row)?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Write rows to `path` as CSV, returning the file size
pub fn write_regex_csv(path: &Path, rows: &[RegexRow]) -> OutputResult<u64> {
    let mut writer = create(path)?;
    write_csv_to(&mut writer, rows)?;
    writer.flush()?;
    Ok(std::fs::metadata(path)?.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_array_format() {
        let mut out = Vec::new();
        write_json_to(&mut out, &[json!({"provider": "Gist"})]).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "[\n    {\n        \"provider\": \"Gist\"\n    }\n]");
    }

    #[test]
    fn test_json_keeps_unicode() {
        let mut out = Vec::new();
        write_json_to(&mut out, &[json!("café")]).unwrap();
        assert!(String::from_utf8(out).unwrap().contains("café"));
    }

    #[test]
    fn test_empty_json_array() {
        let mut out = Vec::new();
        write_json_to::<_, serde_json::Value>(&mut out, &[]).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "[]");
    }

    #[test]
    fn test_csv_quotes_everything() {
        let rows = vec![
            RegexRow {
                category: "email".into(),
                regex: r#"^\w+@"x"$"#.into(),
            },
            RegexRow {
                category: "zip".into(),
                regex: r"\d{5}".into(),
            },
        ];

        let mut out = Vec::new();
        write_csv_to(&mut out, &rows).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<_> = text.lines().collect();

        assert_eq!(lines[0], r#""category","regex""#);
        assert_eq!(lines[1], r#""email","^\w+@""x""$""#);
        assert_eq!(lines[2], r#""zip","\d{5}""#);
    }

    #[test]
    fn test_csv_header_only_when_empty() {
        let mut out = Vec::new();
        write_csv_to(&mut out, &[]).unwrap();
        assert_eq!(String::from_utf8(out).unwrap().trim_end(), r#""category","regex""#);
    }
}
