//! Exclusion rules
//!
//! An ordered rule table decides, for every path of a bundle, whether it is
//! compared, removed outright (code signing), or set aside under a reported
//! category. Rules are tried in order and the first match wins, so a signing
//! artifact inside the watch bundle is removed rather than reported.

use std::collections::BTreeMap;

use ipadiff_core::ExclusionCategory;
use ipadiff_tree::path::{ancestors, any_component_has_extension, glob_match};
use ipadiff_tree::PathSet;

use crate::options::DiffOptions;

/// What a rule matches against
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathPattern {
    /// The path itself
    Exact(String),
    /// Glob over the whole path (`*` crosses `/`)
    Glob(String),
    /// The path or any of its ancestors matches the glob
    Subtree(String),
    /// Any component carries the extension
    Extension(String),
}

impl PathPattern {
    pub fn matches(&self, path: &str) -> bool {
        match self {
            PathPattern::Exact(exact) => path == exact,
            PathPattern::Glob(pattern) => glob_match(pattern, path),
            PathPattern::Subtree(pattern) => ancestors(path).any(|p| glob_match(pattern, p)),
            PathPattern::Extension(ext) => any_component_has_extension(path, ext),
        }
    }
}

/// Which kind of path a rule applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleScope {
    Directories,
    Files,
    All,
}

impl RuleScope {
    fn covers(&self, kind: PathKind) -> bool {
        match self {
            RuleScope::All => true,
            RuleScope::Directories => kind == PathKind::Directory,
            RuleScope::Files => kind == PathKind::File,
        }
    }
}

/// Kind of the paths being partitioned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    Directory,
    File,
}

/// One entry of the rule table
#[derive(Debug, Clone)]
pub struct ExclusionRule {
    pub category: ExclusionCategory,
    pub pattern: PathPattern,
    pub scope: RuleScope,
}

impl ExclusionRule {
    fn new(category: ExclusionCategory, pattern: PathPattern, scope: RuleScope) -> Self {
        Self { category, pattern, scope }
    }

    fn signing(pattern: PathPattern) -> Self {
        Self::new(ExclusionCategory::CodeSigning, pattern, RuleScope::All)
    }

    pub fn applies_to(&self, path: &str, kind: PathKind) -> bool {
        self.scope.covers(kind) && self.pattern.matches(path)
    }
}

/// Result of partitioning a path set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Partition {
    /// Paths that go on to comparison
    pub kept: PathSet,
    /// Code-signing paths, dropped without a report
    pub removed: PathSet,
    /// Paths set aside, by reported category
    pub excluded: BTreeMap<ExclusionCategory, PathSet>,
}

impl Partition {
    /// Every path still visible after signing removal
    pub fn retained(&self) -> PathSet {
        let mut all = self.kept.clone();
        for paths in self.excluded.values() {
            all.extend(paths.iter());
        }
        all
    }

    /// Number of excluded paths across all categories
    pub fn excluded_count(&self) -> usize {
        self.excluded.values().map(PathSet::len).sum()
    }
}

/// The ordered rule table
#[derive(Debug, Clone)]
pub struct ExclusionRules {
    rules: Vec<ExclusionRule>,
}

impl ExclusionRules {
    /// Build the table for the given options
    pub fn from_options(options: &DiffOptions) -> Self {
        use PathPattern::*;

        let watch = options.watch_dir.trim_matches('/');
        let plugins = options.plugins_dir.trim_matches('/');

        let mut rules = vec![
            // Signing artifacts, removed from both dimensions
            ExclusionRule::signing(Subtree("SC_Info".into())),
            ExclusionRule::signing(Subtree(format!("{}/*.appex/SC_Info", watch))),
            ExclusionRule::signing(Subtree(format!("{}/*.appex/SC_Info", plugins))),
            ExclusionRule::signing(Subtree("Frameworks/*.framework/SC_Info".into())),
            ExclusionRule::signing(Exact("embedded.mobileprovision".into())),
            ExclusionRule::signing(Glob("*/*.appex/embedded.mobileprovision".into())),
            ExclusionRule::signing(Glob(format!("{}/*.app/embedded.mobileprovision", watch))),
            ExclusionRule::signing(Exact("_CodeSignature/CodeResources".into())),
            ExclusionRule::signing(Glob(format!("{}/*.appex/_CodeSignature/CodeResources", plugins))),
            ExclusionRule::signing(Glob("Frameworks/*.framework/_CodeSignature/CodeResources".into())),
            // Marker left behind by decryption tools
            ExclusionRule::signing(Exact("CrackerXI".into())),
            // Reported categories, files only
            ExclusionRule::new(ExclusionCategory::WatchBundle, Subtree(watch.to_string()), RuleScope::Files),
        ];

        if options.exclude_plugins {
            rules.push(ExclusionRule::new(
                ExclusionCategory::PluginBundle,
                Subtree(plugins.to_string()),
                RuleScope::Files,
            ));
        }

        rules.push(ExclusionRule::new(
            ExclusionCategory::CompiledAssetCatalog,
            Extension("car".into()),
            RuleScope::Files,
        ));
        rules.push(ExclusionRule::new(
            ExclusionCategory::CompiledInterfaceResource,
            Extension("nib".into()),
            RuleScope::Files,
        ));

        Self { rules }
    }

    pub fn rules(&self) -> &[ExclusionRule] {
        &self.rules
    }

    /// First rule matching `path`, if any
    pub fn classify(&self, path: &str, kind: PathKind) -> Option<ExclusionCategory> {
        self.rules
            .iter()
            .find(|rule| rule.applies_to(path, kind))
            .map(|rule| rule.category)
    }

    /// Split `paths` into kept, removed and excluded sets
    pub fn partition(&self, paths: &PathSet, kind: PathKind) -> Partition {
        let mut partition = Partition::default();

        for path in paths {
            match self.classify(path, kind) {
                None => {
                    partition.kept.insert(path);
                }
                Some(ExclusionCategory::CodeSigning) => {
                    partition.removed.insert(path);
                }
                Some(category) => {
                    partition.excluded.entry(category).or_default().insert(path);
                }
            }
        }

        partition
    }

    /// Drop code-signing paths only
    pub fn strip_signing(&self, paths: &PathSet, kind: PathKind) -> PathSet {
        paths
            .iter()
            .filter(|path| self.classify(path, kind) != Some(ExclusionCategory::CodeSigning))
            .collect()
    }
}

impl Default for ExclusionRules {
    fn default() -> Self {
        Self::from_options(&DiffOptions::default())
    }
}
