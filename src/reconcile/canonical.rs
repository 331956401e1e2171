//! Target and candidate path canonicalization.

use std::sync::LazyLock;

use regex::Regex;

/// Digit runs in native library names.
static DIGITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9]+").expect("digit pattern is valid"));

/// `libfoo.so`, `libfoo.so.1`, `libfoo.so.1.2`
static SHARED_OBJECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.so(\.[0-9]+)*$").expect("shared object pattern is valid"));

const NATIVE_SUFFIXES: &[&str] = &[".dll", ".dylib", ".jnilib"];

/// Signature files a signed archive carries in `META-INF/`.
const SIGNATURE_SUFFIXES: &[&str] = &[".SF", ".RSA", ".DSA", ".EC"];

/// Canonical form of a path: compiled classes map to their source file and
/// native library names lose their version digits.
///
/// Only the last component changes.
pub fn canonicalize(path: &str) -> String {
    let (dir, name) = match path.rsplit_once('/') {
        Some((dir, name)) => (Some(dir), name),
        None => (None, path),
    };

    let name = canonical_name(name);
    match dir {
        Some(dir) => format!("{}/{}", dir, name),
        None => name,
    }
}

fn canonical_name(name: &str) -> String {
    if let Some(stem) = name.strip_suffix(".class") {
        let outer = stem.split('$').next().unwrap_or(stem);
        return format!("{}.java", outer);
    }

    if is_native_library(name) {
        let name = match name.strip_suffix(".jnilib") {
            Some(stem) => format!("{}.dylib", stem),
            None => name.to_string(),
        };
        return DIGITS.replace_all(&name, "#").into_owned();
    }

    name.to_string()
}

fn is_native_library(name: &str) -> bool {
    SHARED_OBJECT.is_match(name) || NATIVE_SUFFIXES.iter().any(|s| name.ends_with(s))
}

/// Files that never take part in reconciliation.
pub fn is_ignored(path: &str) -> bool {
    let mut components = path.split('/').rev();
    let name = components.next().unwrap_or_default();
    let parent = components.next();

    if name == ".api_description" {
        return true;
    }

    if parent == Some("META-INF") {
        if name == "eclipse.inf" || SIGNATURE_SUFFIXES.iter().any(|s| name.ends_with(s)) {
            return true;
        }
    }

    path.starts_with("META-INF/maven/") || path.contains("/META-INF/maven/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_files_map_to_source() {
        assert_eq!(canonicalize("org/x/Foo.class"), "org/x/Foo.java");
        assert_eq!(canonicalize("org/x/Foo$Inner.class"), "org/x/Foo.java");
        assert_eq!(canonicalize("org/x/Foo$1$2.class"), "org/x/Foo.java");
        assert_eq!(canonicalize("Top.class"), "Top.java");
    }

    #[test]
    fn test_native_libraries_lose_digits() {
        assert_eq!(
            canonicalize("os/linux/libswt-gtk-4956r10.so"),
            "os/linux/libswt-gtk-#r#.so"
        );
        assert_eq!(canonicalize("lib/libfoo.so.1.2"), "lib/libfoo.so.#.#");
        assert_eq!(canonicalize("swt-win32-4956.dll"), "swt-win#-#.dll");
        assert_eq!(canonicalize("libswt-cocoa-4.jnilib"), "libswt-cocoa-#.dylib");
    }

    #[test]
    fn test_other_files_unchanged() {
        assert_eq!(canonicalize("icons/v2/icon16.png"), "icons/v2/icon16.png");
        assert_eq!(canonicalize("plugin.xml"), "plugin.xml");
        assert_eq!(canonicalize("docs/so.txt"), "docs/so.txt");
    }

    #[test]
    fn test_ignored_files() {
        assert!(is_ignored("META-INF/ECLIPSE_.SF"));
        assert!(is_ignored("META-INF/ECLIPSE_.RSA"));
        assert!(is_ignored("META-INF/eclipse.inf"));
        assert!(is_ignored("META-INF/maven/org.x/x/pom.xml"));
        assert!(is_ignored("lib/a.jar/META-INF/maven/g/a/pom.properties"));
        assert!(is_ignored("lib/a.jar/META-INF/A.DSA"));
        assert!(is_ignored(".api_description"));

        assert!(!is_ignored("META-INF/MANIFEST.MF"));
        assert!(!is_ignored("docs/RELEASE.SF"));
        assert!(!is_ignored("plugin.xml"));
    }
}
