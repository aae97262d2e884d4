// ✅ Data Quality Gate - Checks the published place list before it ships
//
// Per-place checks produce issues; ratios over the whole list decide whether
// the gate passes. Photos come from a later enrichment step, so a freshly
// reconciled list is expected to fail the photo ratio until that step runs.

use crate::model::CanonicalRecord;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

// ============================================================================
// ISSUES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    MissingAddress,
    NoPhoto,
    MissingWebsite,
}

impl IssueKind {
    pub const ALL: [IssueKind; 3] = [IssueKind::MissingAddress, IssueKind::NoPhoto, IssueKind::MissingWebsite];

    pub fn as_str(&self) -> &'static str {
        match self {
            IssueKind::MissingAddress => "missing_address",
            IssueKind::NoPhoto => "no_photo",
            IssueKind::MissingWebsite => "missing_website",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            IssueKind::MissingAddress | IssueKind::NoPhoto => Severity::Warning,
            IssueKind::MissingWebsite => Severity::Info,
        }
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Warning, // Counts toward a gated ratio
    Info,    // Reported only
}

/// One `id,issue` row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityIssue {
    pub id: String,
    pub issue: IssueKind,
}

// ============================================================================
// THRESHOLDS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityThresholds {
    /// Max share of places without an address
    pub max_missing_address_ratio: f64,

    /// Max share of places without photos
    pub max_no_photo_ratio: f64,
}

impl QualityThresholds {
    /// Ceiling for a gated issue kind; None for kinds that are only reported
    pub fn max_ratio(&self, kind: IssueKind) -> Option<f64> {
        match kind.severity() {
            Severity::Info => None,
            Severity::Warning => match kind {
                IssueKind::MissingAddress => Some(self.max_missing_address_ratio),
                IssueKind::NoPhoto => Some(self.max_no_photo_ratio),
                IssueKind::MissingWebsite => None,
            },
        }
    }
}

impl Default for QualityThresholds {
    fn default() -> Self {
        QualityThresholds {
            max_missing_address_ratio: 0.20,
            max_no_photo_ratio: 0.40,
        }
    }
}

// ============================================================================
// QUALITY REPORT
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityReport {
    pub total_places: usize,
    pub issues: Vec<QualityIssue>,
    pub missing_address_ratio: f64,
    pub no_photo_ratio: f64,
    pub missing_website_ratio: f64,
    pub passed: bool,
    /// Why the gate failed, empty when it passed
    pub failures: Vec<String>,
}

impl QualityReport {
    pub fn summary(&self) -> String {
        format!(
            "QA: {} places | missing_address={:.1}% | no_photo={:.1}% | missing_website={:.1}% | {}",
            self.total_places,
            self.missing_address_ratio * 100.0,
            self.no_photo_ratio * 100.0,
            self.missing_website_ratio * 100.0,
            if self.passed { "PASS" } else { "FAIL" }
        )
    }

    pub fn count(&self, kind: IssueKind) -> usize {
        self.issues.iter().filter(|i| i.issue == kind).count()
    }
}

// ============================================================================
// QUALITY GATE
// ============================================================================

pub struct QualityGate {
    thresholds: QualityThresholds,
}

impl QualityGate {
    pub fn new(thresholds: QualityThresholds) -> Self {
        QualityGate { thresholds }
    }

    pub fn check_place(&self, place: &CanonicalRecord) -> Vec<QualityIssue> {
        let mut issues = Vec::new();
        let mut flag = |issue| {
            issues.push(QualityIssue {
                id: place.id.clone(),
                issue,
            })
        };

        if !place.has_address() {
            flag(IssueKind::MissingAddress);
        }
        if place.photos.is_empty() {
            flag(IssueKind::NoPhoto);
        }
        if place.contacts.website.is_none() {
            flag(IssueKind::MissingWebsite);
        }

        issues
    }

    pub fn evaluate(&self, places: &[CanonicalRecord]) -> QualityReport {
        let issues: Vec<QualityIssue> = places.iter().flat_map(|p| self.check_place(p)).collect();

        let n = places.len();
        let ratio = |kind: IssueKind| {
            if n == 0 {
                0.0
            } else {
                issues.iter().filter(|i| i.issue == kind).count() as f64 / n as f64
            }
        };

        let missing_address_ratio = ratio(IssueKind::MissingAddress);
        let no_photo_ratio = ratio(IssueKind::NoPhoto);
        let missing_website_ratio = ratio(IssueKind::MissingWebsite);

        let mut failures = Vec::new();
        if n == 0 {
            failures.push("no places found".to_string());
        }
        for kind in IssueKind::ALL {
            let Some(max) = self.thresholds.max_ratio(kind) else {
                continue;
            };
            let actual = ratio(kind);
            if actual > max {
                failures.push(format!("{} {:.1}% exceeds {:.1}%", kind, actual * 100.0, max * 100.0));
            }
        }

        QualityReport {
            total_places: n,
            issues,
            missing_address_ratio,
            no_photo_ratio,
            missing_website_ratio,
            passed: failures.is_empty(),
            failures,
        }
    }
}

impl Default for QualityGate {
    fn default() -> Self {
        Self::new(QualityThresholds::default())
    }
}

/// Write `id,issue` rows (with header)
pub fn write_issues_csv(path: &Path, issues: &[QualityIssue]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let mut wtr = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create CSV file {}", path.display()))?;
    for issue in issues {
        wtr.serialize(issue).context("Failed to write issue row")?;
    }
    wtr.flush().context("Failed to flush CSV writer")?;
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
