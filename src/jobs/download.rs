//! Page download for the scrape pipeline
//!
//! Reads a `category,url` table, assigns every URL a file
//! `<html_dir>/<category>/<NN>.html` (NN = index within its category) and
//! fetches the pages through the same worker pool used for scraping.
//! Only HTTP 200 responses are saved; anything else is a per-item failure.

use crate::error::{TransformError, TransformResult};
use crate::pool::{group_by_key, Transform, WorkItem};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Per-request timeout
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(1);

/// One row of the input URL table
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UrlRow {
    pub category: String,
    pub url: String,
}

/// A page to fetch and where to store it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    pub category: String,
    pub url: String,
    pub path: PathBuf,
}

impl WorkItem for DownloadTask {
    fn label(&self) -> String {
        self.url.clone()
    }
}

/// Read the `category,url` table; extra columns are ignored
pub fn read_url_table(path: &Path) -> TransformResult<Vec<UrlRow>> {
    let malformed = |reason: String| TransformError::Malformed {
        path: path.to_path_buf(),
        reason,
    };

    let mut reader = csv::Reader::from_path(path).map_err(|e| malformed(e.to_string()))?;
    let rows = reader
        .deserialize()
        .collect::<Result<Vec<UrlRow>, _>>()
        .map_err(|e| malformed(e.to_string()))?;

    if rows.is_empty() {
        return Err(malformed("no URLs listed".to_string()));
    }
    Ok(rows)
}

/// Assign each URL its destination file, grouped by category
pub fn plan_downloads(rows: Vec<UrlRow>, html_dir: &Path) -> Vec<DownloadTask> {
    group_by_key(rows, |row| row.category.clone())
        .into_iter()
        .flat_map(|(category, group)| {
            let dir = html_dir.join(&category);
            group.into_iter().enumerate().map(move |(i, row)| DownloadTask {
                category: row.category,
                url: row.url,
                path: dir.join(format!("{:02}.html", i)),
            })
        })
        .collect()
}

/// Transform that fetches a page and saves it, yielding the saved path
pub struct PageFetcher {
    client: reqwest::blocking::Client,
}

impl PageFetcher {
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()?;
        Ok(Self { client })
    }
}

impl Transform<DownloadTask> for PageFetcher {
    type Record = PathBuf;

    fn apply(&self, task: &DownloadTask) -> TransformResult<Vec<PathBuf>> {
        let fetch_error = |reason: String| TransformError::Fetch {
            url: task.url.clone(),
            reason,
        };

        let response = self
            .client
            .get(&task.url)
            .send()
            .map_err(|e| fetch_error(e.to_string()))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(fetch_error(format!("HTTP status {}", status)));
        }

        let body = response.bytes().map_err(|e| fetch_error(e.to_string()))?;

        let write_error = |source: std::io::Error| TransformError::Write {
            path: task.path.clone(),
            source,
        };
        if let Some(parent) = task.path.parent() {
            fs::create_dir_all(parent).map_err(write_error)?;
        }
        fs::write(&task.path, &body).map_err(write_error)?;

        debug!(url = %task.url, path = %task.path.display(), bytes = body.len(), "Page saved");
        Ok(vec![task.path.clone()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_read_url_table() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("urls.csv");
        fs::write(
            &path,
            "category,url,note\nemail,http://a.example/1,x\nzip,http://a.example/2,y\n",
        )
        .unwrap();

        let rows = read_url_table(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].category, "email");
        assert_eq!(rows[1].url, "http://a.example/2");
    }

    #[test]
    fn test_read_url_table_missing_column() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("urls.csv");
        fs::write(&path, "name,link\nemail,http://a.example/1\n").unwrap();

        assert!(matches!(
            read_url_table(&path),
            Err(TransformError::Malformed { .. })
        ));
    }

    #[test]
    fn test_plan_downloads_indexes_within_category() {
        let rows = vec![
            UrlRow {
                category: "zip".into(),
                url: "u1".into(),
            },
            UrlRow {
                category: "email".into(),
                url: "u2".into(),
            },
            UrlRow {
                category: "zip".into(),
                url: "u3".into(),
            },
        ];

        let tasks = plan_downloads(rows, Path::new("pages"));
        let planned: Vec<_> = tasks
            .iter()
            .map(|t| (t.url.as_str(), t.path.clone()))
            .collect();

        assert_eq!(
            planned,
            vec![
                ("u2", PathBuf::from("pages/email/00.html")),
                ("u1", PathBuf::from("pages/zip/00.html")),
                ("u3", PathBuf::from("pages/zip/01.html")),
            ]
        );
    }
}
