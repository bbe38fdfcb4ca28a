//! Transcript export formats.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use murmur_core::TranscriptionResult;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExportFormat {
    #[default]
    Txt,
    Json,
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "txt" | "text" => Ok(Self::Txt),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown export format '{other}' (expected txt or json)")),
        }
    }
}

impl ExportFormat {
    /// Infer the format from an output path's extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| ext.parse().ok())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonSegment<'a> {
    start: f64,
    end: f64,
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonExport<'a> {
    text: &'a str,
    segments: Vec<JsonSegment<'a>>,
    exported_at: DateTime<Utc>,
}

/// `MM:SS`, or `--:--` for a non-finite timestamp.
pub fn format_timestamp(seconds: f64) -> String {
    if !seconds.is_finite() {
        return "--:--".into();
    }
    let whole = seconds.max(0.0).floor() as u64;
    format!("{:02}:{:02}", whole / 60, whole % 60)
}

/// One `MM:SS: text` line per segment; the bare text when there are none.
pub fn render_txt(result: &TranscriptionResult) -> String {
    if result.segments.is_empty() {
        return result.text.clone();
    }
    result
        .segments
        .iter()
        .map(|seg| format!("{}: {}", format_timestamp(seg.start()), seg.text))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_json(
    result: &TranscriptionResult,
    exported_at: DateTime<Utc>,
) -> serde_json::Result<String> {
    let export = JsonExport {
        text: &result.text,
        segments: result
            .segments
            .iter()
            .map(|seg| JsonSegment {
                start: seg.start(),
                end: seg.end(),
                text: &seg.text,
            })
            .collect(),
        exported_at,
    };
    serde_json::to_string_pretty(&export)
}

pub fn render(result: &TranscriptionResult, format: ExportFormat) -> anyhow::Result<String> {
    Ok(match format {
        ExportFormat::Txt => render_txt(result),
        ExportFormat::Json => render_json(result, Utc::now())?,
    })
}

pub fn write_export(
    path: &Path,
    result: &TranscriptionResult,
    format: ExportFormat,
) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, render(result, format)?)?;
    Ok(())
}
