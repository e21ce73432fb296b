//! Root-relative path utilities
//!
//! All paths handled by the engine are `/`-separated and relative to the
//! application bundle root, without a leading slash. The bundle root itself
//! is the empty string.

/// Normalize a relative path
/// - Converts backslashes to forward slashes
/// - Removes redundant separators and `.` components
/// - Resolves `..` components without escaping the root
/// - Strips any leading slash
pub fn normalize_relative(path: &str) -> String {
    let path = path.replace('\\', "/");

    let mut components = Vec::new();

    for component in path.trim().split('/') {
        match component {
            "" | "." => continue,
            ".." => {
                components.pop();
            }
            _ => components.push(component),
        }
    }

    components.join("/")
}

/// Get parent directory of a relative path (`None` for top-level entries)
pub fn parent_path(path: &str) -> Option<&str> {
    let path = path.trim_end_matches('/');
    path.rfind('/').map(|pos| &path[..pos])
}

/// Get filename from path
pub fn filename(path: &str) -> &str {
    let path = path.trim_end_matches('/');

    if let Some(pos) = path.rfind('/') {
        &path[pos + 1..]
    } else {
        path
    }
}

/// The path itself followed by each of its ancestors, nearest first
///
/// `"a/b/c"` yields `"a/b/c"`, `"a/b"`, `"a"`.
pub fn ancestors(path: &str) -> impl Iterator<Item = &str> {
    let mut next = Some(path.trim_end_matches('/')).filter(|p| !p.is_empty());

    std::iter::from_fn(move || {
        let current = next?;
        next = parent_path(current);
        Some(current)
    })
}

/// Check if path matches a glob pattern
/// Supports * (any chars, including separators) and ? (single char)
pub fn glob_match(pattern: &str, path: &str) -> bool {
    glob_match_impl(pattern.as_bytes(), path.as_bytes())
}

fn glob_match_impl(pattern: &[u8], text: &[u8]) -> bool {
    let mut p = 0;
    let mut t = 0;
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() {
            match pattern[p] {
                b'*' => {
                    star = Some((p, t));
                    p += 1;
                    continue;
                }
                b'?' => {
                    p += 1;
                    t += 1;
                    continue;
                }
                c if c == text[t] => {
                    p += 1;
                    t += 1;
                    continue;
                }
                _ => {}
            }
        }

        // Mismatch - let the last star swallow one more byte
        match star {
            Some((star_p, star_t)) => {
                p = star_p + 1;
                t = star_t + 1;
                star = Some((star_p, star_t + 1));
            }
            None => return false,
        }
    }

    while p < pattern.len() && pattern[p] == b'*' {
        p += 1;
    }

    p == pattern.len()
}

/// Get file extension from path
pub fn get_extension(path: &str) -> Option<&str> {
    let filename = filename(path);

    if let Some(pos) = filename.rfind('.') {
        if pos > 0 && pos < filename.len() - 1 {
            return Some(&filename[pos + 1..]);
        }
    }

    None
}

/// Exact extension check on the final component (`Info.PLIST` is not a plist)
pub fn has_extension(path: &str, ext: &str) -> bool {
    get_extension(path) == Some(ext.trim_start_matches('.'))
}

/// Extension check on any component
///
/// Compiled resources are often directories (`Main.storyboardc/View.nib/`),
/// so everything below such a directory carries its kind as well.
pub fn any_component_has_extension(path: &str, ext: &str) -> bool {
    ancestors(path).any(|p| has_extension(p, ext))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_relative() {
        assert_eq!(normalize_relative("foo/bar"), "foo/bar");
        assert_eq!(normalize_relative("/foo/bar"), "foo/bar");
        assert_eq!(normalize_relative("foo\\bar"), "foo/bar");
        assert_eq!(normalize_relative("foo//bar"), "foo/bar");
        assert_eq!(normalize_relative("./foo/./bar/"), "foo/bar");
        assert_eq!(normalize_relative("foo/baz/../bar"), "foo/bar");
        assert_eq!(normalize_relative("../../escape"), "escape");
        assert_eq!(normalize_relative(""), "");
    }

    #[test]
    fn test_parent_path() {
        assert_eq!(parent_path("PlugIns/Share.appex/Info.plist"), Some("PlugIns/Share.appex"));
        assert_eq!(parent_path("Info.plist"), None);
    }

    #[test]
    fn test_filename() {
        assert_eq!(filename("Base.lproj/Main.storyboardc/"), "Main.storyboardc");
        assert_eq!(filename("App"), "App");
    }

    #[test]
    fn test_ancestors() {
        let all: Vec<_> = ancestors("a/b/c").collect();
        assert_eq!(all, vec!["a/b/c", "a/b", "a"]);
        assert_eq!(ancestors("").count(), 0);
    }

    #[test]
    fn test_glob_match() {
        assert!(glob_match("*.app", "Runner.app"));
        assert!(glob_match("Watch/*.appex/SC_Info", "Watch/Ext.appex/SC_Info"));
        assert!(glob_match("*/*.appex/embedded.mobileprovision", "PlugIns/Share.appex/embedded.mobileprovision"));
        assert!(glob_match("file.???", "file.car"));
        assert!(!glob_match("*.app", "Runner.appex"));
        assert!(!glob_match("Watch/*.appex/SC_Info", "PlugIns/Ext.appex/SC_Info"));
    }

    #[test]
    fn test_get_extension() {
        assert_eq!(get_extension("Assets.car"), Some("car"));
        assert_eq!(get_extension("Info.PLIST"), Some("PLIST"));
        assert_eq!(get_extension("PkgInfo"), None);
        assert_eq!(get_extension(".hidden"), None);
    }

    #[test]
    fn test_has_extension_is_case_sensitive() {
        assert!(has_extension("Info.plist", "plist"));
        assert!(has_extension("Assets.car", ".car"));
        assert!(!has_extension("Info.PLIST", "plist"));
        assert!(!has_extension("X.CAR", "car"));
    }

    #[test]
    fn test_any_component_has_extension() {
        assert!(any_component_has_extension("Base.lproj/Main.storyboardc/View.nib/runtime.nib", "nib"));
        assert!(any_component_has_extension("Old.nib/objects-13.0+.nib", "nib"));
        assert!(!any_component_has_extension("Legacy.NIB/keyedobjects.bin", "nib"));
        assert!(!any_component_has_extension("Base.lproj/Main.storyboardc/Info.plist", "nib"));
    }
}
