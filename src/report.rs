//! JSON and console output for a finished extraction.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use chrono::Local;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{HighlightResult, Region, group_by_color};

/// File name used when no output path is given.
pub const DEFAULT_OUTPUT: &str = "highlights-extraction-results.json";

/// One highlight as it appears under its colour in the JSON report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub text: String,
    pub page: usize,
    pub region: Region,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub total_highlights: usize,
    pub extraction_date: String,
    pub extraction_method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dpi: Option<f32>,
    /// Lowercase colour name to highlights in collection order.
    pub highlights_by_color: BTreeMap<String, Vec<ReportEntry>>,
}

impl Report {
    /// Report stamped with the current local time.
    pub fn new(results: &[HighlightResult], method: &str, dpi: Option<f32>) -> Self {
        Self::with_date(results, method, dpi, Local::now().to_rfc3339())
    }

    pub fn with_date(
        results: &[HighlightResult],
        method: &str,
        dpi: Option<f32>,
        date: String,
    ) -> Self {
        let highlights_by_color = group_by_color(results)
            .into_iter()
            .map(|(color, group)| {
                let entries = group
                    .into_iter()
                    .map(|r| ReportEntry {
                        text: r.text.clone(),
                        page: r.page,
                        region: r.region,
                    })
                    .collect();
                (color.as_str().to_lowercase(), entries)
            })
            .collect();
        Self {
            total_highlights: results.len(),
            extraction_date: date,
            extraction_method: method.to_string(),
            dpi,
            highlights_by_color,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        fs::write(path, self.to_json()?)?;
        log::info!("report written to {}", path.display());
        Ok(())
    }
}

/// Human-readable summary: counts per colour, then numbered entries.
pub fn render_summary(results: &[HighlightResult], ocr_used: bool) -> String {
    let rule = "=".repeat(60);
    let mut out = String::new();
    let _ = writeln!(out, "{rule}\nHIGHLIGHT EXTRACTION RESULTS\n{rule}");

    if results.is_empty() {
        out.push_str("No highlights found matching the target colors (green, yellow, purple).\n");
        out.push_str("\nTroubleshooting tips:\n");
        let mut tips = vec![
            "Check that the PDF contains highlight annotations, not drawn shapes",
            "Verify the highlight colors are close to green, yellow or purple",
        ];
        if ocr_used {
            tips.insert(0, "Ensure Tesseract is installed and its language data is reachable");
        }
        for (i, tip) in tips.iter().enumerate() {
            let _ = writeln!(out, "{}. {tip}", i + 1);
        }
        return out;
    }

    let groups = group_by_color(results);
    let _ = writeln!(out, "SUMMARY:\nTotal highlights found: {}", results.len());
    for (color, group) in &groups {
        let _ = writeln!(out, "{color} highlights: {}", group.len());
    }

    out.push_str("\nDETAILED RESULTS:\n");
    for (color, group) in &groups {
        let _ = writeln!(out, "\n{color} HIGHLIGHTS:\n{}", "-".repeat(40));
        for (i, result) in group.iter().enumerate() {
            let _ = writeln!(out, "{}. Page {}", i + 1, result.page);
            let _ = writeln!(out, "   Text: \"{}\"", result.text);
            let _ = writeln!(out, "   Location: {}\n", result.region);
        }
    }
    out
}

pub fn print_summary(results: &[HighlightResult], ocr_used: bool) {
    print!("{}", render_summary(results, ocr_used));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ColorCategory;

    fn result(text: &str, color: ColorCategory, page: usize) -> HighlightResult {
        HighlightResult {
            text: text.into(),
            color,
            page,
            region: Region::new(10.0, 20.0, 30.0, 5.0),
        }
    }

    #[test]
    fn json_groups_by_lowercase_color() {
        let results = vec![
            result("one", ColorCategory::Yellow, 1),
            result("two", ColorCategory::Green, 1),
            result("three", ColorCategory::Yellow, 2),
        ];
        let report = Report::with_date(&results, "test", None, "today".into());
        let value: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(value["totalHighlights"], 3);
        assert_eq!(value["extractionMethod"], "test");
        assert!(value.get("dpi").is_none());
        let yellow = value["highlightsByColor"]["yellow"].as_array().unwrap();
        assert_eq!(yellow.len(), 2);
        assert_eq!(yellow[1]["text"], "three");
        assert_eq!(yellow[1]["page"], 2);
        assert_eq!(yellow[1]["region"]["width"], 30.0);
        assert!(value["highlightsByColor"].get("purple").is_none());
    }

    #[test]
    fn dpi_is_written_when_present() {
        let report = Report::with_date(&[], "ocr", Some(300.0), "today".into());
        let value: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(value["dpi"], 300.0);
        assert_eq!(value["totalHighlights"], 0);
    }

    #[test]
    fn saved_report_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_OUTPUT);
        let report = Report::new(&[result("x", ColorCategory::Purple, 3)], "m", None);
        report.save_json(&path).unwrap();
        let loaded: Report = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded, report);
    }

    #[test]
    fn summary_lists_counts_and_entries() {
        let summary = render_summary(&[result("Review", ColorCategory::Green, 1)], false);
        assert!(summary.contains("Total highlights found: 1"));
        assert!(summary.contains("GREEN highlights: 1"));
        assert!(summary.contains("1. Page 1\n   Text: \"Review\""));
        assert!(summary.contains("Location: [10.0,20.0,40.0,25.0]"));
    }

    #[test]
    fn empty_summary_gives_hints() {
        let plain = render_summary(&[], false);
        assert!(plain.contains("No highlights found"));
        assert!(!plain.contains("Tesseract"));
        assert!(render_summary(&[], true).contains("1. Ensure Tesseract"));
    }
}
