//! Local publish archive (`.postcraft/published.jsonl`).
//!
//! Each publication appends one line holding a flat row: form fields,
//! per-round columns and the final post. The 1-based line number is the row
//! reported back in the receipt.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::core::types::{PublishReceipt, Side};
use crate::io::services::{PublishRequest, PublishService};

/// One archived publication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveLine {
    pub row: u64,
    pub columns: Map<String, Value>,
}

pub struct ArchivePublisher {
    path: PathBuf,
}

impl ArchivePublisher {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl PublishService for ArchivePublisher {
    async fn publish(&self, request: &PublishRequest) -> Result<PublishReceipt> {
        let created_at = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        let columns = sheet_row(request, &created_at);
        let path = self.path.clone();
        let row = tokio::task::spawn_blocking(move || append_row(&path, columns))
            .await
            .context("archive writer task")??;
        info!(path = %self.path.display(), row, "publication archived");
        Ok(PublishReceipt {
            draft_row: None,
            published_row: Some(row),
        })
    }
}

/// Flatten a publish request into named columns.
///
/// Round columns are prefixed `R{n}_`; the request column only appears for
/// rounds that were refined.
pub fn sheet_row(request: &PublishRequest, created_at: &str) -> Map<String, Value> {
    let form = &request.form;
    let mut row = Map::new();
    row.insert("created_at".into(), created_at.into());
    row.insert(
        "date".into(),
        form.date
            .map(|date| date.format("%Y-%m-%d").to_string())
            .unwrap_or_default()
            .into(),
    );
    row.insert("url".into(), form.url.clone().into());
    row.insert("decided".into(), form.decided.clone().into());
    row.insert("anniversary".into(), form.anniversary.clone().into());
    row.insert("remarks".into(), form.remarks.clone().into());

    for entry in &request.history {
        let prefix = format!("R{}", entry.round());
        for side in [Side::A, Side::B] {
            let candidate = entry.candidate(side);
            let key = side.as_str().to_lowercase();
            row.insert(format!("{prefix}_{key}"), candidate.text.clone().into());
            row.insert(format!("{prefix}_{key}_chars"), candidate.length().into());
        }
        row.insert(
            format!("{prefix}_selected"),
            entry.selected().as_str().into(),
        );
        if !entry.refinement_request().is_empty() {
            row.insert(
                format!("{prefix}_request"),
                entry.refinement_request().into(),
            );
        }
    }

    let final_result = &request.final_result;
    row.insert("final_text".into(), final_result.text.clone().into());
    row.insert("final_chars".into(), final_result.length().into());
    row.insert(
        "length_check".into(),
        if final_result.is_valid { "✓" } else { "✗" }.into(),
    );
    row.insert("round_count".into(), request.history.len().into());
    row.insert(
        "match_count".into(),
        request.context.retrieval_matches.len().into(),
    );
    row.insert(
        "similar_count".into(),
        request.context.similar_posts.len().into(),
    );
    row
}

/// Append a row and return its 1-based position in the archive.
pub fn append_row(path: &Path, columns: Map<String, Value>) -> Result<u64> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create archive dir {}", parent.display()))?;
    }
    let row = count_rows(path)? + 1;
    let line = ArchiveLine { row, columns };
    let mut buf = serde_json::to_string(&line).context("serialize archive line")?;
    buf.push('\n');

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open archive {}", path.display()))?;
    file.write_all(buf.as_bytes())
        .with_context(|| format!("append to archive {}", path.display()))?;
    debug!(path = %path.display(), row, "archive row appended");
    Ok(row)
}

/// Read every archived line in order.
pub fn read_rows(path: &Path) -> Result<Vec<ArchiveLine>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let contents =
        fs::read_to_string(path).with_context(|| format!("read archive {}", path.display()))?;
    contents
        .lines()
        .filter(|line| !line.trim().is_empty())
        .enumerate()
        .map(|(idx, line)| {
            serde_json::from_str(line)
                .map_err(|err| anyhow!("parse {} line {}: {err}", path.display(), idx + 1))
        })
        .collect()
}

fn count_rows(path: &Path) -> Result<u64> {
    if !path.exists() {
        return Ok(0);
    }
    let contents =
        fs::read_to_string(path).with_context(|| format!("read archive {}", path.display()))?;
    Ok(contents.lines().filter(|line| !line.trim().is_empty()).count() as u64)
}
