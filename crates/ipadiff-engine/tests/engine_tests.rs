//! Tests for the diff engine
//!
//! These tests cover:
//! - Property lists differing only in volatile keys
//! - Native binaries differing at a single byte
//! - Watch bundle files never reaching classification
//! - Structural mismatches, signing artifacts and per-file failures
//! - Whole packages through zip extraction
//! - Byte comparator and exclusion properties

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use ipadiff_archive::{ZipExtractor, ZipWriter};
use ipadiff_core::{Error, ExclusionCategory, MismatchReason, Result};
use ipadiff_engine::tools::NativePlistNormalizer;
use ipadiff_engine::{
    BinaryFormat, Collaborators, DiffEngine, DiffOptions, FileOutcome, FormatDetector, Verdict,
};

/// Native code starts with `MACH`; `MACHENC` marks encrypted text;
/// files starting with `BROKEN` cannot be identified
#[derive(Default)]
struct RecordingDetector {
    seen: Mutex<Vec<PathBuf>>,
}

impl RecordingDetector {
    fn seen_names(&self) -> Vec<String> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect()
    }
}

impl FormatDetector for RecordingDetector {
    fn name(&self) -> &str {
        "recording"
    }

    fn detect(&self, path: &Path) -> Result<BinaryFormat> {
        self.seen.lock().unwrap().push(path.to_path_buf());

        let bytes = fs::read(path)?;
        if bytes.starts_with(b"BROKEN") {
            Err(Error::tool_failure("recording", "unrecognised header"))
        } else if bytes.starts_with(b"MACHENC") {
            Ok(BinaryFormat::native(true))
        } else if bytes.starts_with(b"MACH") {
            Ok(BinaryFormat::native(false))
        } else {
            Ok(BinaryFormat::OTHER)
        }
    }
}

fn plist(entries: &[(&str, &str)]) -> String {
    let body: String = entries
        .iter()
        .map(|(k, v)| format!("\t<key>{}</key>\n\t<string>{}</string>\n", k, v))
        .collect();
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<plist version=\"1.0\">\n<dict>\n{}</dict>\n</plist>\n",
        body
    )
}

fn write_tree(root: &Path, files: &[(&str, &[u8])]) {
    fs::create_dir_all(root).unwrap();
    for (path, contents) in files {
        let full = root.join(path);
        fs::create_dir_all(full.parent().unwrap()).unwrap();
        fs::write(full, contents).unwrap();
    }
}

fn engine_with(detector: Arc<RecordingDetector>, options: DiffOptions) -> DiffEngine {
    let collaborators = Collaborators::new(detector, Arc::new(NativePlistNormalizer));
    DiffEngine::new(options, Arc::new(ZipExtractor::new()), collaborators).unwrap()
}

struct Fixture {
    _dir: tempfile::TempDir,
    left: PathBuf,
    right: PathBuf,
}

impl Fixture {
    fn new(left: &[(&str, &[u8])], right: &[(&str, &[u8])]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let left_root = dir.path().join("left/App.app");
        let right_root = dir.path().join("right/App.app");
        write_tree(&left_root, left);
        write_tree(&right_root, right);

        Self { _dir: dir, left: left_root, right: right_root }
    }

    fn compare(&self, engine: &DiffEngine) -> Result<ipadiff_engine::DiffReport> {
        engine.compare_roots(&self.left, &self.right, "A.ipa", "B.ipa")
    }
}

mod scenario_tests {
    use super::*;

    #[test]
    fn test_plist_volatile_key_is_ignored() {
        let left = plist(&[("CFBundleIdentifier", "com.example.app"), ("CFBundleVersion", "41")]);
        let right = plist(&[("CFBundleIdentifier", "com.example.app"), ("CFBundleVersion", "42")]);
        let fixture = Fixture::new(
            &[("Info.plist", left.as_bytes())],
            &[("Info.plist", right.as_bytes())],
        );

        let report = fixture.compare(&engine_with(Arc::default(), DiffOptions::default())).unwrap();
        assert_eq!(report.verdict(), Verdict::Equal);
        assert_eq!(report.compared, 1);

        // Without the key in the volatile list the same pair differs
        let options = DiffOptions { volatile_plist_keys: vec![], ..Default::default() };
        let report = fixture.compare(&engine_with(Arc::default(), options)).unwrap();
        assert_eq!(report.verdict(), Verdict::NotEqual);
        assert!(matches!(
            report.outcomes["Info.plist"],
            FileOutcome::NotEqual { reason: MismatchReason::Content, .. }
        ));
    }

    #[test]
    fn test_binary_single_byte_difference() {
        let mut right = b"MACH-binary-payload-0123456789".to_vec();
        right[17] ^= 0xFF;
        let fixture = Fixture::new(
            &[("App", b"MACH-binary-payload-0123456789")],
            &[("App", &right)],
        );

        let options = DiffOptions { chunk_size: 8, ..Default::default() };
        let report = fixture.compare(&engine_with(Arc::default(), options)).unwrap();

        assert_eq!(report.verdict(), Verdict::NotEqual);
        match &report.outcomes["App"] {
            FileOutcome::NotEqual { reason, first_difference, differing_bytes, sample } => {
                assert_eq!(*reason, MismatchReason::Content);
                assert_eq!(*first_difference, Some(17));
                assert_eq!(*differing_bytes, 1);
                assert_eq!(sample.first().map(|d| d.offset), Some(17));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert!(report.render_text().contains("    App (content differs at offset 0x11)"));
    }

    #[test]
    fn test_watch_bundle_never_classified() {
        let fixture = Fixture::new(
            &[
                ("App", b"MACH-same"),
                ("Watch/W.app/W", b"MACH-left-watch"),
                ("Watch/W.app/Info.plist", b"not even a plist"),
            ],
            &[
                ("App", b"MACH-same"),
                ("Watch/W.app/W", b"MACH-right-watch-longer"),
                ("Watch/W.app/Info.plist", b"still not a plist"),
            ],
        );

        let detector = Arc::new(RecordingDetector::default());
        let report = fixture.compare(&engine_with(detector.clone(), DiffOptions::default())).unwrap();

        assert_eq!(report.verdict(), Verdict::EqualWithExclusions);
        assert_eq!(report.compared, 1);
        assert_eq!(report.excluded[&ExclusionCategory::WatchBundle].len(), 2);
        assert!(detector.seen_names().iter().all(|p| !p.contains("Watch")));
        assert!(report.render_text().contains("Watch directory with a Watch app"));
    }
}

mod pipeline_tests {
    use super::*;

    #[test]
    fn test_identical_bundles() {
        let files: &[(&str, &[u8])] = &[
            ("App", b"MACH-app"),
            ("Config.xcconfig", b"FOO = 1\n"),
            ("Base.lproj/Main.strings", b"\"a\" = \"b\";"),
        ];
        let fixture = Fixture::new(files, files);

        let report = fixture.compare(&engine_with(Arc::default(), DiffOptions::default())).unwrap();
        assert_eq!(report.verdict(), Verdict::Equal);
        assert_eq!(report.compared, 3);
        assert_eq!(report.render_text(), "IPAs are equal\n");
    }

    #[test]
    fn test_extra_file_is_structure_mismatch() {
        let fixture = Fixture::new(
            &[("App", b"MACH")],
            &[("App", b"MACH"), ("extra.txt", b"x")],
        );

        let detector = Arc::new(RecordingDetector::default());
        let err = fixture.compare(&engine_with(detector.clone(), DiffOptions::default())).unwrap_err();

        let diff = err.as_structure_mismatch().expect("structure mismatch");
        assert!(diff.files_only_in_right.contains("extra.txt"));
        assert!(diff.files_only_in_left.is_empty());
        assert_eq!(diff.left_label, "A.ipa");
        // Fail fast: nothing was classified
        assert!(detector.seen_names().is_empty());
    }

    #[test]
    fn test_extra_directory_is_structure_mismatch() {
        let fixture = Fixture::new(&[("App", b"MACH")], &[("App", b"MACH")]);
        fs::create_dir_all(fixture.left.join("Empty.bundle")).unwrap();

        let err = fixture.compare(&engine_with(Arc::default(), DiffOptions::default())).unwrap_err();
        let diff = err.as_structure_mismatch().expect("structure mismatch");
        assert!(diff.dirs_only_in_left.contains("Empty.bundle"));
    }

    #[test]
    fn test_signing_artifacts_ignored() {
        let fixture = Fixture::new(
            &[
                ("App", b"MACH"),
                ("_CodeSignature/CodeResources", b"left signature"),
                ("embedded.mobileprovision", b"left profile"),
                ("SC_Info/App.sinf", b"sinf"),
            ],
            &[
                ("App", b"MACH"),
                ("_CodeSignature/CodeResources", b"right signature, longer"),
            ],
        );

        let report = fixture.compare(&engine_with(Arc::default(), DiffOptions::default())).unwrap();
        assert_eq!(report.verdict(), Verdict::Equal);
        assert_eq!(report.compared, 1);
    }

    #[test]
    fn test_compiled_resources_reported() {
        let fixture = Fixture::new(
            &[("Assets.car", b"left"), ("Base.lproj/Main.nib", b"left"), ("App", b"MACH")],
            &[("Assets.car", b"right!"), ("Base.lproj/Main.nib", b"right!"), ("App", b"MACH")],
        );

        let report = fixture.compare(&engine_with(Arc::default(), DiffOptions::default())).unwrap();
        assert_eq!(report.verdict(), Verdict::EqualWithExclusions);

        let text = report.render_text();
        assert!(text.contains(".car (Asset Catalog)"));
        assert!(text.contains("        Assets.car\n"));
        assert!(text.contains("        Base.lproj/Main.nib\n"));
    }

    #[test]
    fn test_plugins_compared_unless_excluded() {
        let fixture = Fixture::new(
            &[("PlugIns/Share.appex/Share", b"MACH-left")],
            &[("PlugIns/Share.appex/Share", b"MACH-rght")],
        );

        let report = fixture.compare(&engine_with(Arc::default(), DiffOptions::default())).unwrap();
        assert_eq!(report.verdict(), Verdict::NotEqual);

        let options = DiffOptions { exclude_plugins: true, ..Default::default() };
        let report = fixture.compare(&engine_with(Arc::default(), options)).unwrap();
        assert_eq!(report.verdict(), Verdict::EqualWithExclusions);
        assert!(report.excluded.contains_key(&ExclusionCategory::PluginBundle));
    }

    #[test]
    fn test_encrypted_binary_is_advisory() {
        let fixture = Fixture::new(
            &[("App", b"MACHENC-aaaa")],
            &[("App", b"MACHENC-bbbbbbbb")],
        );

        let report = fixture.compare(&engine_with(Arc::default(), DiffOptions::default())).unwrap();
        assert_eq!(report.verdict(), Verdict::EqualWithExclusions);
        assert_eq!(report.unverifiable().collect::<Vec<_>>(), vec!["App"]);
        assert!(report.render_text().contains("due to being encrypted:\n        App\n"));
    }

    #[test]
    fn test_per_file_failure_does_not_stop_run() {
        let fixture = Fixture::new(
            &[("odd.bin", b"BROKEN"), ("data.bin", b"one")],
            &[("odd.bin", b"BROKEN"), ("data.bin", b"two")],
        );

        let report = fixture.compare(&engine_with(Arc::default(), DiffOptions::default())).unwrap();
        assert_eq!(report.verdict(), Verdict::NotEqual);
        assert_eq!(report.compared, 2);
        assert!(matches!(report.outcomes["odd.bin"], FileOutcome::Failed { .. }));
        assert!(matches!(report.outcomes["data.bin"], FileOutcome::NotEqual { .. }));
    }

    #[test]
    fn test_single_worker() {
        let files: &[(&str, &[u8])] = &[("a", b"1"), ("b", b"2"), ("c", b"3")];
        let fixture = Fixture::new(files, files);

        let options = DiffOptions { jobs: 1, ..Default::default() };
        let report = fixture.compare(&engine_with(Arc::default(), options)).unwrap();
        assert!(report.is_equal());
        assert_eq!(report.compared, 3);
    }

    #[test]
    fn test_missing_root_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine_with(Arc::default(), DiffOptions::default());

        let err = engine
            .compare_roots(&dir.path().join("nope"), dir.path(), "A", "B")
            .unwrap_err();
        assert!(err.is_not_found());
    }
}

mod archive_tests {
    use super::*;

    fn package(extra: Option<(&str, &[u8])>) -> ZipWriter {
        let writer = ZipWriter::new()
            .directory("Payload")
            .directory("Payload/App.app")
            .file("Payload/App.app/App", b"MACH-app")
            .file("Payload/App.app/PkgInfo", b"APPL????");
        match extra {
            Some((name, data)) => writer.file(name, data),
            None => writer,
        }
    }

    #[test]
    fn test_compare_archives() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.ipa");
        let b = dir.path().join("b.ipa");
        package(None).write_to(&a).unwrap();
        package(None).write_to(&b).unwrap();

        let engine = engine_with(Arc::default(), DiffOptions::default());
        let report = engine.compare_archives(&a, &b).unwrap();

        assert_eq!(report.verdict(), Verdict::Equal);
        assert_eq!(report.left, "a.ipa");
        assert_eq!(report.right, "b.ipa");
        assert_eq!(report.compared, 2);
    }

    #[test]
    fn test_second_bundle_is_setup_error() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.ipa");
        let b = dir.path().join("b.ipa");
        package(None).write_to(&a).unwrap();
        package(Some(("Payload/Other.app/Other", b"MACH"))).write_to(&b).unwrap();

        let engine = engine_with(Arc::default(), DiffOptions::default());
        let err = engine.compare_archives(&a, &b).unwrap_err();
        assert!(matches!(err.root_cause(), Error::BundleNotFound { .. }));
    }

    #[test]
    fn test_missing_archive() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.ipa");
        package(None).write_to(&a).unwrap();

        let engine = engine_with(Arc::default(), DiffOptions::default());
        let err = engine.compare_archives(&a, &dir.path().join("missing.ipa")).unwrap_err();
        assert!(err.is_not_found());
    }
}

mod proptest_tests {
    use std::io::Cursor;

    use ipadiff_core::ComparisonResult;
    use ipadiff_engine::{ByteComparator, ExclusionRules, PathKind};
    use ipadiff_tree::PathSet;
    use proptest::collection::{btree_set, vec};
    use proptest::prelude::*;

    fn compare(chunk: usize, a: &[u8], b: &[u8]) -> ipadiff_engine::ByteComparison {
        ByteComparator::new(chunk)
            .unwrap()
            .compare_readers(Cursor::new(a), a.len() as u64, Cursor::new(b), b.len() as u64)
            .unwrap()
    }

    fn bundle_paths() -> impl Strategy<Value = PathSet> {
        let component = prop_oneof![
            Just("Watch".to_string()),
            Just("PlugIns".to_string()),
            Just("SC_Info".to_string()),
            Just("_CodeSignature".to_string()),
            Just("Frameworks".to_string()),
            "[A-Za-z]{1,6}(\\.(car|nib|plist|appex|app|framework))?",
        ];
        btree_set(vec(component, 1..4).prop_map(|parts| parts.join("/")), 0..30)
            .prop_map(|paths| paths.iter().collect())
    }

    proptest! {
        #[test]
        fn test_equal_streams_are_equal(data in vec(any::<u8>(), 0..2048), chunk in 1usize..300) {
            let result = compare(chunk, &data, &data);
            prop_assert!(result.is_equal());
            prop_assert!(result.diffs.is_empty());
        }

        #[test]
        fn test_single_difference_offset(
            data in vec(any::<u8>(), 1..2048),
            index in any::<prop::sample::Index>(),
            chunk in 1usize..300,
        ) {
            let i = index.index(data.len());
            let mut other = data.clone();
            other[i] = other[i].wrapping_add(1);

            let result = compare(chunk, &data, &other);
            prop_assert_eq!(result.first_difference, Some(i as u64));
            prop_assert_eq!(result.diffs.len(), 1);
            let entry = result.diffs.first().copied().unwrap();
            prop_assert_eq!(entry.offset, i as u64);
            prop_assert_eq!(entry.left, data[i]);
            prop_assert_eq!(entry.right, other[i]);
        }

        #[test]
        fn test_size_difference_wins(
            a in vec(any::<u8>(), 0..512),
            b in vec(any::<u8>(), 0..512),
        ) {
            prop_assume!(a.len() != b.len());
            let result = compare(64, &a, &b);
            prop_assert_eq!(result.result, ComparisonResult::NotEqual(ipadiff_core::MismatchReason::Size));
            prop_assert!(result.diffs.is_empty());
        }

        #[test]
        fn test_exclusion_is_idempotent(paths in bundle_paths(), plugins in any::<bool>()) {
            let options = ipadiff_engine::DiffOptions { exclude_plugins: plugins, ..Default::default() };
            let rules = ExclusionRules::from_options(&options);

            let first = rules.partition(&paths, PathKind::File);
            let second = rules.partition(&first.kept, PathKind::File);

            prop_assert_eq!(&second.kept, &first.kept);
            prop_assert!(second.removed.is_empty());
            prop_assert!(second.excluded.is_empty());
        }

        #[test]
        fn test_partition_is_disjoint_and_complete(paths in bundle_paths()) {
            let rules = ExclusionRules::default();
            let partition = rules.partition(&paths, PathKind::File);

            let mut seen = PathSet::new();
            let groups = std::iter::once(&partition.kept)
                .chain(std::iter::once(&partition.removed))
                .chain(partition.excluded.values());
            for group in groups {
                for path in group {
                    prop_assert!(seen.insert(path), "{} is in two groups", path);
                }
            }
            prop_assert_eq!(seen, paths);
        }
    }
}
