//! Comparison report
//!
//! Collects exclusions and per-file outcomes for one run and renders them
//! as text or JSON.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::str::FromStr;

use ipadiff_core::{DiffRecord, ExclusionCategory, MismatchReason, Result, TreeDiff};
use serde::{Deserialize, Serialize};

use crate::compare::Verdict as FileVerdict;

/// Report output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown format: {}. Use 'text' or 'json'", s)),
        }
    }
}

/// Outcome of a file that did not compare equal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum FileOutcome {
    NotEqual {
        reason: MismatchReason,
        #[serde(skip_serializing_if = "Option::is_none")]
        first_difference: Option<u64>,
        /// Number of differing bytes, when a byte scan was made
        differing_bytes: usize,
        /// Leading entries of the difference record
        sample: DiffRecord,
    },
    /// Encrypted content that cannot be inspected
    Unverifiable,
    /// The file could not be classified or compared
    Failed { message: String },
}

impl FileOutcome {
    /// Outcome for a verdict, keeping at most `limit` difference entries
    ///
    /// Equal files have no outcome.
    pub fn from_verdict(verdict: FileVerdict, limit: usize) -> Option<Self> {
        match verdict {
            FileVerdict::Equal => None,
            FileVerdict::Unverifiable => Some(FileOutcome::Unverifiable),
            FileVerdict::Mismatch { reason, first_difference, diffs } => Some(FileOutcome::NotEqual {
                reason,
                first_difference,
                differing_bytes: diffs.len(),
                sample: diffs.truncated(limit),
            }),
        }
    }

    /// Whether this outcome makes the packages unequal
    pub fn is_failure(&self) -> bool {
        !matches!(self, FileOutcome::Unverifiable)
    }
}

/// Overall result of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Equal,
    /// Equal apart from files that could not be checked
    EqualWithExclusions,
    NotEqual,
}

/// Everything one comparison found out
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffReport {
    /// Display name of the left package
    pub left: String,
    /// Display name of the right package
    pub right: String,
    /// Excluded paths by reported category; empty categories are omitted
    pub excluded: BTreeMap<ExclusionCategory, BTreeSet<String>>,
    /// Number of files handed to a comparator
    pub compared: usize,
    /// Files that did not compare equal
    pub outcomes: BTreeMap<String, FileOutcome>,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    verdict: Verdict,
    #[serde(flatten)]
    report: &'a DiffReport,
}

impl DiffReport {
    pub fn new(left: impl Into<String>, right: impl Into<String>) -> Self {
        Self {
            left: left.into(),
            right: right.into(),
            ..Default::default()
        }
    }

    /// Record paths set aside under `category`
    pub fn exclude<I, S>(&mut self, category: ExclusionCategory, paths: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let paths: BTreeSet<String> = paths.into_iter().map(Into::into).collect();
        if !paths.is_empty() && category.is_reported() {
            self.excluded.entry(category).or_default().extend(paths);
        }
    }

    /// Record the verdict for one compared file
    pub fn record(&mut self, path: impl Into<String>, verdict: FileVerdict, limit: usize) {
        self.compared += 1;
        if let Some(outcome) = FileOutcome::from_verdict(verdict, limit) {
            self.outcomes.insert(path.into(), outcome);
        }
    }

    /// Record a file that could not be compared
    pub fn record_failure(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.compared += 1;
        self.outcomes.insert(path.into(), FileOutcome::Failed { message: message.into() });
    }

    pub fn verdict(&self) -> Verdict {
        if self.outcomes.values().any(FileOutcome::is_failure) {
            Verdict::NotEqual
        } else if self.excluded.is_empty() && self.outcomes.is_empty() {
            Verdict::Equal
        } else {
            Verdict::EqualWithExclusions
        }
    }

    pub fn is_equal(&self) -> bool {
        self.verdict() != Verdict::NotEqual
    }

    /// Files whose content differs
    pub fn differing(&self) -> impl Iterator<Item = (&str, &FileOutcome)> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| matches!(outcome, FileOutcome::NotEqual { .. }))
            .map(|(path, outcome)| (path.as_str(), outcome))
    }

    /// Files that could not be inspected because they are encrypted
    pub fn unverifiable(&self) -> impl Iterator<Item = &str> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| matches!(outcome, FileOutcome::Unverifiable))
            .map(|(path, _)| path.as_str())
    }

    /// Files that could not be compared, with the reason
    pub fn failed(&self) -> impl Iterator<Item = (&str, &str)> {
        self.outcomes.iter().filter_map(|(path, outcome)| match outcome {
            FileOutcome::Failed { message } => Some((path.as_str(), message.as_str())),
            _ => None,
        })
    }

    fn excluded_in(&self, category: ExclusionCategory) -> Option<&BTreeSet<String>> {
        self.excluded.get(&category).filter(|paths| !paths.is_empty())
    }

    /// Human readable report
    pub fn render_text(&self) -> String {
        let mut out = String::new();

        match self.verdict() {
            Verdict::Equal => {
                let _ = writeln!(out, "IPAs are equal");
            }
            Verdict::EqualWithExclusions => self.render_exclusions(&mut out),
            Verdict::NotEqual => self.render_differences(&mut out),
        }

        out
    }

    fn render_exclusions(&self, out: &mut String) {
        let _ = writeln!(out, "IPAs are equal, except for the files that can't currently be checked:");

        let encrypted: Vec<&str> = self.unverifiable().collect();
        if !encrypted.is_empty() {
            let _ = writeln!(out, "    Excluded files that couldn't be checked due to being encrypted:");
            for path in encrypted {
                let _ = writeln!(out, "        {}", path);
            }
        }

        let sections = [
            (
                ExclusionCategory::WatchBundle,
                "IPAs contain Watch directory with a Watch app which currently can't be checked.",
            ),
            (
                ExclusionCategory::PluginBundle,
                "IPAs contain PlugIns directory with app extensions. Extensions can't currently be checked.",
            ),
            (
                ExclusionCategory::CompiledAssetCatalog,
                "IPAs contain .car (Asset Catalog) files that are compiled by the App Store and can't currently be checked:",
            ),
            (
                ExclusionCategory::CompiledInterfaceResource,
                "IPAs contain .nib (compiled Interface Builder) files that are compiled by the App Store and can't currently be checked:",
            ),
        ];

        for (category, heading) in sections {
            if let Some(paths) = self.excluded_in(category) {
                let _ = writeln!(out, "    {}", heading);
                for path in paths {
                    let _ = writeln!(out, "        {}", path);
                }
            }
        }
    }

    fn render_differences(&self, out: &mut String) {
        let differing: Vec<_> = self.differing().collect();
        if !differing.is_empty() {
            let _ = writeln!(out, "Different files in {} and {}", self.left, self.right);
            for (path, outcome) in differing {
                match outcome {
                    FileOutcome::NotEqual { reason: MismatchReason::Content, first_difference: Some(offset), .. } => {
                        let _ = writeln!(out, "    {} (content differs at offset {:#x})", path, offset);
                    }
                    FileOutcome::NotEqual { reason, .. } => {
                        let _ = writeln!(out, "    {} ({} differs)", path, reason);
                    }
                    _ => {}
                }
            }
        }

        let failed: Vec<_> = self.failed().collect();
        if !failed.is_empty() {
            let _ = writeln!(out, "Files that couldn't be compared in {} and {}", self.left, self.right);
            for (path, message) in failed {
                let _ = writeln!(out, "    {}: {}", path, message);
            }
        }
    }

    /// Machine readable report, with the verdict alongside the data
    pub fn to_json(&self) -> Result<String> {
        let report = JsonReport { verdict: self.verdict(), report: self };
        serde_json::to_string_pretty(&report)
            .map_err(|e| ipadiff_core::Error::internal(format!("failed to serialize report: {}", e)))
    }

    pub fn render(&self, format: OutputFormat) -> Result<String> {
        match format {
            OutputFormat::Text => Ok(self.render_text()),
            OutputFormat::Json => self.to_json().map(|mut json| {
                json.push('\n');
                json
            }),
        }
    }
}

/// Human readable listing of a structural mismatch
pub fn render_structure_mismatch(diff: &TreeDiff) -> String {
    let mut out = String::new();

    if !diff.dirs_match() {
        let _ = writeln!(
            out,
            "Directory structure doesn't match in {} and {}",
            diff.left_label, diff.right_label
        );
        for (missing_from, dirs) in [
            (&diff.right_label, &diff.dirs_only_in_left),
            (&diff.left_label, &diff.dirs_only_in_right),
        ] {
            if dirs.is_empty() {
                continue;
            }
            let _ = writeln!(out, "Directories not present in {}", missing_from);
            for dir in dirs {
                let _ = writeln!(out, "    {}", dir);
            }
        }
    }

    if !diff.files_match() {
        let _ = writeln!(out, "IPAs are not equal");
        for (missing_from, files) in [
            (&diff.right_label, &diff.files_only_in_left),
            (&diff.left_label, &diff.files_only_in_right),
        ] {
            if files.is_empty() {
                continue;
            }
            let _ = writeln!(out, "  Files not present in {}:", missing_from);
            for file in files {
                let _ = writeln!(out, "      {}", file);
            }
        }
    }

    out
}

/// Structural mismatch as JSON
pub fn structure_mismatch_json(diff: &TreeDiff) -> Result<String> {
    #[derive(Serialize)]
    struct JsonMismatch<'a> {
        verdict: &'static str,
        #[serde(flatten)]
        diff: &'a TreeDiff,
    }

    serde_json::to_string_pretty(&JsonMismatch { verdict: "structure_mismatch", diff })
        .map_err(|e| ipadiff_core::Error::internal(format!("failed to serialize report: {}", e)))
}
