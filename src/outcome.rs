//! Structured results returned by the dispatcher.
//!
//! [`OperationOutcome::message`] is the caller-facing text (the fixed
//! template for each operation). `details` carries the same facts in typed
//! form for callers that want them, serialized with camelCase keys.

use crate::catalog::{FlipDirection, OutputFormat, SizeSpec};
use crate::imaging::ImageInfo;
use crate::paths::FileStat;
use chrono::SecondsFormat;
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationOutcome {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<OutcomeDetails>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum OutcomeDetails {
    Info(ImageReport),
    Compression(CompressionReport),
    Batch(BatchReport),
}

/// Operations that write one file and report it with a fixed message.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Written {
    Resized,
    Converted(OutputFormat),
    Cropped,
    /// Angle as the caller gave it.
    Rotated(f64),
    Flipped(FlipDirection),
}

impl OperationOutcome {
    /// Success for the single-output operations, using their fixed message.
    pub fn written(written: Written, output: &Path) -> Self {
        let output = output.display();
        let message = match written {
            Written::Resized => format!("Image resized successfully. Saved to: {output}"),
            Written::Converted(format) => format!(
                "Image converted to {} format. Saved to: {output}",
                format.as_str()
            ),
            Written::Cropped => format!("Image cropped successfully. Saved to: {output}"),
            Written::Rotated(angle) => {
                format!("Image rotated {angle}° successfully. Saved to: {output}")
            }
            Written::Flipped(direction) => format!(
                "Image flipped {} successfully. Saved to: {output}",
                direction.as_str()
            ),
        };
        Self {
            success: true,
            message,
            details: None,
        }
    }

    pub fn compressed(output: &Path, report: CompressionReport) -> Self {
        Self {
            success: true,
            message: format!(
                "Image compressed successfully. Saved to: {}\nSize reduction: {:.1}% ({} → {} bytes)",
                output.display(),
                report.savings_percent,
                report.original_bytes,
                report.compressed_bytes
            ),
            details: Some(OutcomeDetails::Compression(report)),
        }
    }

    /// The message is the pretty-printed metadata document itself.
    pub fn inspected(report: ImageReport) -> Self {
        let message = serde_json::to_string_pretty(&report)
            .unwrap_or_else(|e| format!("unserializable image report: {e}"));
        Self {
            success: true,
            message,
            details: Some(OutcomeDetails::Info(report)),
        }
    }

    pub fn batch(report: BatchReport) -> Self {
        Self {
            success: report.is_complete(),
            message: report.summary(),
            details: Some(OutcomeDetails::Batch(report)),
        }
    }
}

/// Metadata document returned by `get_image_info`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageReport {
    pub format: String,
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    pub bit_depth: u8,
    pub color_space: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub density: Option<f64>,
    pub has_alpha: bool,
    pub file_size: u64,
    /// RFC 3339, UTC, millisecond precision.
    pub last_modified: String,
}

impl ImageReport {
    pub fn new(info: &ImageInfo, stat: &FileStat) -> Self {
        Self {
            format: info.format.name().to_string(),
            width: info.width,
            height: info.height,
            channels: info.channels,
            bit_depth: info.bit_depth,
            color_space: info.color_space.to_string(),
            density: info.density,
            has_alpha: info.has_alpha,
            file_size: stat.size,
            last_modified: stat.modified.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressionReport {
    pub original_bytes: u64,
    pub compressed_bytes: u64,
    /// Rounded to one decimal. Negative when the output grew.
    pub savings_percent: f64,
}

impl CompressionReport {
    pub fn new(original_bytes: u64, compressed_bytes: u64) -> Self {
        Self {
            original_bytes,
            compressed_bytes,
            savings_percent: savings_percent(original_bytes, compressed_bytes),
        }
    }
}

/// `(original - compressed) / original * 100`, to one decimal place.
///
/// An empty original reports zero savings rather than dividing by zero.
pub fn savings_percent(original: u64, compressed: u64) -> f64 {
    if original == 0 {
        return 0.0;
    }
    let percent = (original as f64 - compressed as f64) / original as f64 * 100.0;
    (percent * 10.0).round() / 10.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Ok,
    Failed,
    /// Not attempted because an earlier item failed under fail-fast.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItemReport {
    pub suffix: String,
    pub width: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    pub output: String,
    pub status: ItemStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BatchItemReport {
    pub fn new(spec: &SizeSpec, output: &Path, status: ItemStatus, error: Option<String>) -> Self {
        Self {
            suffix: spec.suffix.clone(),
            width: spec.width,
            height: spec.height,
            output: output.display().to_string(),
            status,
            error,
        }
    }
}

/// Per-item results of a batch, in request order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub items: Vec<BatchItemReport>,
}

impl BatchReport {
    pub fn new(items: Vec<BatchItemReport>) -> Self {
        let count = |status| items.iter().filter(|i| i.status == status).count();
        Self {
            total: items.len(),
            succeeded: count(ItemStatus::Ok),
            failed: count(ItemStatus::Failed),
            skipped: count(ItemStatus::Skipped),
            items,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.succeeded == self.total
    }

    fn summary(&self) -> String {
        let written = self
            .items
            .iter()
            .filter(|i| i.status == ItemStatus::Ok)
            .map(|i| i.output.as_str());

        if self.is_complete() {
            let mut lines = vec![format!(
                "Batch resize complete. Generated {} images:",
                self.total
            )];
            lines.extend(written.map(str::to_string));
            return lines.join("\n");
        }

        let mut lines = vec![format!(
            "Batch resize completed with errors. Generated {} of {} images:",
            self.succeeded, self.total
        )];
        lines.extend(written.map(str::to_string));
        for item in &self.items {
            match item.status {
                ItemStatus::Ok => {}
                ItemStatus::Failed => lines.push(format!(
                    "Failed: {} ({})",
                    item.output,
                    item.error.as_deref().unwrap_or("unknown error")
                )),
                ItemStatus::Skipped => lines.push(format!("Skipped: {}", item.output)),
            }
        }
        lines.join("\n")
    }
}
