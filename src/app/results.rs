// Demo diagnosis table
// Results are keyed by the uploaded file's base name (slide1 .. slide20)

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::OnceLock;

use crate::logger;

static KNOWN_RESULTS: OnceLock<HashMap<String, DiagnosisResult>> = OnceLock::new();

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiagnosisResult {
    pub diagnosis: String,
    /// Percentage, 0-100
    pub confidence: u8,
    pub severity: String,
    pub explanation: String,
    pub recommendations: String,
    pub highlights: Vec<String>,
}

impl DiagnosisResult {
    /// Result returned for files that match no demo slide
    pub fn unknown() -> Self {
        Self {
            diagnosis: "No Diagnostic Data Available".to_string(),
            confidence: 0,
            severity: "Unknown".to_string(),
            explanation: "The uploaded slide does not match any known demo samples \
                          (slide1 to slide20, .png or .jpg)."
                .to_string(),
            recommendations: "Rename your file to match a demo slide (e.g., slide1.jpg) \
                              or upload a supported sample."
                .to_string(),
            highlights: Vec::new(),
        }
    }

    /// HTML report block shown by the upload page
    pub fn report_html(&self) -> String {
        let highlights = if self.highlights.is_empty() {
            "None".to_string()
        } else {
            self.highlights.join(", ")
        };

        format!(
            "\n<div class='result-section'>\n    <h3>AI Diagnosis Report</h3>\n    <pre>\n\
             Diagnosis: {}\n\
             Confidence: {}%\n\
             Severity: {}\n\
             Explanation: {}\n\
             Recommendations: {}\n\
             Highlights: {}\n    </pre>\n</div>\n",
            self.diagnosis,
            self.confidence,
            self.severity,
            self.explanation,
            self.recommendations,
            highlights,
        )
    }
}

fn known_results() -> &'static HashMap<String, DiagnosisResult> {
    KNOWN_RESULTS.get_or_init(|| {
        serde_json::from_str(include_str!("slides.json")).unwrap_or_else(|e| {
            logger::log_error(&format!("Embedded slide table is invalid: {e}"));
            HashMap::new()
        })
    })
}

/// Look up the demo result for a base filename
pub fn lookup(base_filename: &str) -> DiagnosisResult {
    known_results()
        .get(base_filename)
        .cloned()
        .unwrap_or_else(DiagnosisResult::unknown)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_has_all_slides() {
        let table = known_results();
        assert_eq!(table.len(), 20);
        for i in 1..=20 {
            assert!(table.contains_key(&format!("slide{i}")), "slide{i}");
        }
    }

    #[test]
    fn test_lookup_known_slide() {
        let result = lookup("slide1");
        assert_eq!(result.diagnosis, "Plasmodium Falciparum Detected");
        assert_eq!(result.confidence, 92);
        assert_eq!(result.highlights, vec!["Ring forms in red blood cells", "Gametocytes"]);
    }

    #[test]
    fn test_lookup_unknown_slide() {
        let result = lookup("slide21");
        assert_eq!(result, DiagnosisResult::unknown());
        assert_eq!(result.confidence, 0);
    }

    #[test]
    fn test_report_html() {
        let report = lookup("slide3").report_html();
        assert!(report.contains("<h3>AI Diagnosis Report</h3>"));
        assert!(report.contains("\nDiagnosis: No Malaria Detected\n"));
        assert!(report.contains("\nConfidence: 95%\n"));
        assert!(report.contains("\nHighlights: None\n"));

        let report = lookup("slide6").report_html();
        assert!(report.contains("\nHighlights: Ring forms, Trophozoites\n"));
    }
}
