//! JSON-lines filter
//!
//! Every input file holds one JSON object per line. Records whose `field`
//! equals the sentinel value are dropped; all others pass through as-is.

use crate::error::{TransformError, TransformResult};
use crate::pool::Transform;
use serde_json::Value;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Transform that drops records carrying a sentinel value
#[derive(Debug, Clone)]
pub struct JsonFilter {
    field: String,
    exclude_value: String,
}

impl JsonFilter {
    pub fn new(field: impl Into<String>, exclude_value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            exclude_value: exclude_value.into(),
        }
    }

    /// True unless the record's field is the sentinel string
    pub fn keeps(&self, record: &Value) -> bool {
        match record.get(&self.field) {
            Some(Value::String(s)) => s != &self.exclude_value,
            _ => true,
        }
    }
}

impl Transform<PathBuf> for JsonFilter {
    type Record = Value;

    fn apply(&self, path: &PathBuf) -> TransformResult<Vec<Value>> {
        let file = File::open(path).map_err(|source| TransformError::Read {
            path: path.clone(),
            source,
        })?;

        let mut kept = Vec::new();
        for (idx, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|source| match source.kind() {
                io::ErrorKind::InvalidData => TransformError::Encoding {
                    path: path.clone(),
                    reason: source.to_string(),
                },
                _ => TransformError::Read {
                    path: path.clone(),
                    source,
                },
            })?;

            if line.trim().is_empty() {
                continue;
            }

            let record: Value =
                serde_json::from_str(&line).map_err(|source| TransformError::Json {
                    path: path.clone(),
                    line: idx + 1,
                    source,
                })?;

            if self.keeps(&record) {
                kept.push(record);
            }
        }

        Ok(kept)
    }
}

/// List `*.json` files directly under `dir`, sorted by name
pub fn discover_inputs(dir: &Path, skip: impl Fn(&Path) -> bool) -> io::Result<Vec<PathBuf>> {
    let mut inputs = Vec::new();

    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_json = path.extension().is_some_and(|ext| ext == "json");
        if path.is_file() && is_json && !skip(&path) {
            inputs.push(path);
        }
    }

    inputs.sort();
    Ok(inputs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_keeps() {
        let filter = JsonFilter::new("provider", "GitHub");

        assert!(!filter.keeps(&json!({"provider": "GitHub", "ref": "a"})));
        assert!(filter.keeps(&json!({"provider": "GitLab", "ref": "b"})));
        assert!(filter.keeps(&json!({"ref": "c"})));
        assert!(filter.keeps(&json!({"provider": 7})));
    }

    #[test]
    fn test_apply_filters_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mybinder000.json");
        let mut file = File::create(&path).unwrap();
        writeln!(file, r#"{{"provider":"GitHub","spec":"a"}}"#).unwrap();
        writeln!(file, r#"{{"provider":"Gist","spec":"b"}}"#).unwrap();
        writeln!(file).unwrap();
        writeln!(file, r#"{{"provider":"Zenodo","spec":"c"}}"#).unwrap();
        drop(file);

        let records = JsonFilter::new("provider", "GitHub").apply(&path).unwrap();
        let specs: Vec<_> = records.iter().map(|r| r["spec"].as_str().unwrap()).collect();
        assert_eq!(specs, vec!["b", "c"]);
    }

    #[test]
    fn test_apply_keeps_key_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mybinder001.json");
        fs::write(&path, "{\"timestamp\":\"t\",\"provider\":\"Gist\",\"spec\":\"s\"}\n").unwrap();

        let records = JsonFilter::new("provider", "GitHub").apply(&path).unwrap();
        let mut out = Vec::new();
        crate::output::write_json_to(&mut out, &records).unwrap();
        let text = String::from_utf8(out).unwrap();

        let timestamp = text.find("\"timestamp\"").unwrap();
        let provider = text.find("\"provider\"").unwrap();
        let spec = text.find("\"spec\"").unwrap();
        assert!(timestamp < provider && provider < spec, "keys reordered: {}", text);
    }

    #[test]
    fn test_apply_reports_bad_line() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{\"provider\":\"Gist\"}\nnot json\n").unwrap();

        match JsonFilter::new("provider", "GitHub").apply(&path) {
            Err(TransformError::Json { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected JSON error, got {:?}", other),
        }
    }

    #[test]
    fn test_apply_missing_file() {
        let result = JsonFilter::new("provider", "GitHub").apply(&PathBuf::from("/nonexistent/x.json"));
        assert!(matches!(result, Err(TransformError::Read { .. })));
    }

    #[test]
    fn test_discover_inputs() {
        let dir = tempdir().unwrap();
        for name in ["b.json", "a.json", "notes.txt", "skip.json"] {
            fs::write(dir.path().join(name), "").unwrap();
        }
        fs::create_dir(dir.path().join("nested.json")).unwrap();

        let inputs = discover_inputs(dir.path(), |p| p.ends_with("skip.json")).unwrap();
        let names: Vec<_> = inputs
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, vec!["a.json", "b.json"]);
    }
}
