//! Diff orchestration
//!
//! Runs one comparison end to end:
//! 1. extract both packages and locate their application bundles
//! 2. scan both bundles and drop code-signing paths
//! 3. reconcile the trees; any one-sided path stops the run
//! 4. partition the common files into excluded categories and comparable files
//! 5. classify and compare the comparable files on a bounded worker pool
//! 6. aggregate the results into a [`DiffReport`]

use std::path::Path;
use std::sync::Arc;

use ipadiff_archive::{ArchiveExtractor, ZipExtractor};
use ipadiff_core::{Error, Result, ResultExt};
use ipadiff_tree::{ensure_identical, reconcile, PackageTree, PathSet, TreeView};
use rayon::prelude::*;
use tracing::{debug, debug_span, info, info_span, warn, Span};

use crate::classify::ContentClassifier;
use crate::compare::{ComparatorSet, FilePair, Verdict};
use crate::exclusion::{ExclusionRules, Partition, PathKind};
use crate::logging::timed;
use crate::options::DiffOptions;
use crate::report::DiffReport;
use crate::tools::Collaborators;

/// A bundle with code-signing paths removed
struct Bundle {
    tree: PackageTree,
    directories: PathSet,
    files: PathSet,
}

impl Bundle {
    fn view<'a>(&'a self, label: &'a str) -> TreeView<'a> {
        TreeView::new(label, &self.directories, &self.files)
    }
}

/// Compares application packages
pub struct DiffEngine {
    options: DiffOptions,
    extractor: Arc<dyn ArchiveExtractor>,
    collaborators: Collaborators,
    rules: ExclusionRules,
}

impl DiffEngine {
    pub fn new(
        options: DiffOptions,
        extractor: Arc<dyn ArchiveExtractor>,
        collaborators: Collaborators,
    ) -> Result<Self> {
        options.validate()?;
        let rules = ExclusionRules::from_options(&options);

        Ok(Self {
            options,
            extractor,
            collaborators,
            rules,
        })
    }

    /// Zip extraction and the collaborators named by `options`
    pub fn with_defaults(options: DiffOptions) -> Result<Self> {
        let collaborators = Collaborators::from_options(&options);
        Self::new(options, Arc::new(ZipExtractor::new()), collaborators)
    }

    pub fn options(&self) -> &DiffOptions {
        &self.options
    }

    pub fn rules(&self) -> &ExclusionRules {
        &self.rules
    }

    /// Compare two package files
    pub fn compare_archives(&self, left: &Path, right: &Path) -> Result<DiffReport> {
        let (left_package, right_package) = timed("extract", || {
            rayon::join(|| self.extractor.extract(left), || self.extractor.extract(right))
        });
        let left_package = left_package?;
        let right_package = right_package?;

        let payload = &self.options.payload_dir;
        let pattern = &self.options.bundle_pattern;
        let left_bundle = left_package
            .locate_bundle(payload, pattern)
            .with_context(|| format!("in {}", left.display()))?;
        let right_bundle = right_package
            .locate_bundle(payload, pattern)
            .with_context(|| format!("in {}", right.display()))?;

        // Packages stay alive (and on disk) until the comparison is done
        self.compare_roots(&left_bundle, &right_bundle, &display_name(left), &display_name(right))
    }

    /// Compare two application bundles already on disk
    pub fn compare_roots(
        &self,
        left_root: &Path,
        right_root: &Path,
        left_label: &str,
        right_label: &str,
    ) -> Result<DiffReport> {
        let span = info_span!("compare", left = %left_label, right = %right_label);
        let _guard = span.enter();

        let left = self.load(left_root)?;
        let right = self.load(right_root)?;

        ensure_identical(reconcile(&left.view(left_label), &right.view(right_label)))?;

        let partition = self.rules.partition(&left.files, PathKind::File);
        check_partition(&partition, &left.files)?;

        let mut report = DiffReport::new(left_label, right_label);
        for (category, paths) in &partition.excluded {
            report.exclude(*category, paths.iter().map(String::as_str));
        }

        info!(
            files = left.files.len(),
            excluded = partition.excluded_count(),
            compared = partition.kept.len(),
            "Trees match, comparing contents"
        );

        let results = self.compare_files(&span, &partition.kept, &left.tree, &right.tree)?;

        for (path, result) in results {
            match result {
                Ok(verdict) => report.record(path, verdict, self.options.report_diff_limit),
                Err(e) if e.is_fatal() => return Err(e.with_context(format!("comparing {}", path))),
                Err(e) => {
                    warn!(path = %path, error = %e, "Could not compare file");
                    report.record_failure(path, e.to_string());
                }
            }
        }

        info!(verdict = ?report.verdict(), differences = report.outcomes.len(), "Comparison finished");

        Ok(report)
    }

    fn load(&self, root: &Path) -> Result<Bundle> {
        let tree = PackageTree::scan(root)?;
        let directories = self.rules.strip_signing(&tree.directories, PathKind::Directory);
        let files = self.rules.strip_signing(&tree.files, PathKind::File);

        Ok(Bundle { tree, directories, files })
    }

    /// Classify and compare every path in `kept` on the worker pool
    fn compare_files(
        &self,
        parent: &Span,
        kept: &PathSet,
        left: &PackageTree,
        right: &PackageTree,
    ) -> Result<Vec<(String, Result<Verdict>)>> {
        let comparators = ComparatorSet::new(&self.options, &self.collaborators)?;
        let classifier = ContentClassifier::new(self.collaborators.detector.clone());

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.worker_count())
            .thread_name(|i| format!("ipadiff-worker-{}", i))
            .build()
            .map_err(|e| Error::internal(format!("failed to start worker pool: {}", e)))?;

        let paths: Vec<&String> = kept.iter().collect();

        let results: Vec<(String, Result<Verdict>)> = pool.install(|| {
            paths
                .par_iter()
                .map(|relative| {
                    let span = debug_span!(parent: parent, "file", path = %relative);
                    let _guard = span.enter();

                    let result = compare_one(&classifier, &comparators, left, right, relative);
                    ((*relative).clone(), result)
                })
                .collect()
        });

        Ok(results)
    }
}

fn compare_one(
    classifier: &ContentClassifier,
    comparators: &ComparatorSet,
    left: &PackageTree,
    right: &PackageTree,
    relative: &str,
) -> Result<Verdict> {
    let left_path = left.resolve(relative);
    let right_path = right.resolve(relative);

    let classification = classifier.classify(relative, &left_path)?;
    let pair = FilePair {
        relative,
        left: &left_path,
        right: &right_path,
        left_format: classification.format,
    };

    let verdict = comparators.get(classification.kind).compare(&pair)?;
    debug!(kind = %classification.kind, result = ?verdict.result(), "Compared file");

    Ok(verdict)
}

/// Every retained file is either compared or excluded, never both
fn check_partition(partition: &Partition, files: &PathSet) -> Result<()> {
    let retained = partition.retained();
    let disjoint = partition.kept.len() + partition.excluded_count() == retained.len();

    if !partition.removed.is_empty() || !disjoint || &retained != files {
        return Err(Error::internal(format!(
            "exclusion partition lost paths: {} kept + {} excluded for {} files",
            partition.kept.len(),
            partition.excluded_count(),
            files.len()
        )));
    }

    Ok(())
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
