//! Allowed-application lists
//!
//! Stored as `*` (everything) or a comma-separated list of package
//! identifiers. Order and duplicates carry no meaning.

use std::collections::BTreeSet;
use std::fmt;

/// Marker string for "all applications"
pub const ALL_APPS: &str = "*";

/// Parsed application selection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppSelection {
    all: bool,
    apps: BTreeSet<String>,
}

impl AppSelection {
    pub fn all() -> Self {
        Self {
            all: true,
            apps: BTreeSet::new(),
        }
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_all(&self) -> bool {
        self.all
    }

    pub fn set_all(&mut self, all: bool) {
        self.all = all;
    }

    pub fn is_empty(&self) -> bool {
        !self.all && self.apps.is_empty()
    }

    /// Explicit entries, sorted. Kept even when `is_all` is set.
    pub fn apps(&self) -> impl Iterator<Item = &str> {
        self.apps.iter().map(String::as_str)
    }

    /// Add an entry; blank input is ignored and `*` selects everything
    pub fn insert(&mut self, app: &str) -> bool {
        match app.trim() {
            "" => false,
            ALL_APPS => !std::mem::replace(&mut self.all, true),
            app => self.apps.insert(app.to_string()),
        }
    }

    pub fn remove(&mut self, app: &str) -> bool {
        match app.trim() {
            ALL_APPS => std::mem::replace(&mut self.all, false),
            app => self.apps.remove(app),
        }
    }

    pub fn allows(&self, app: &str) -> bool {
        self.all || self.apps.contains(app.trim())
    }
}

impl fmt::Display for AppSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&build_apps_string(self))
    }
}

/// Parse a stored apps string. Entries are trimmed, deduplicated and
/// empty ones dropped. A `*` anywhere in the list selects everything.
pub fn parse_apps_string(value: &str) -> AppSelection {
    let mut selection = AppSelection::none();
    for app in value.split(',') {
        selection.insert(app);
    }
    selection
}

/// Inverse of [`parse_apps_string`]. The all marker wins over any
/// explicit entries.
pub fn build_apps_string(selection: &AppSelection) -> String {
    if selection.all {
        return ALL_APPS.to_string();
    }
    selection.apps().collect::<Vec<_>>().join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_star_is_all() {
        let selection = parse_apps_string("*");
        assert!(selection.is_all());
        assert!(selection.allows("com.example.anything"));

        assert!(parse_apps_string(" * ").is_all());
    }

    #[test]
    fn test_star_inside_list_selects_all() {
        for value in ["com.mail,*", " * ,com.b"] {
            let selection = parse_apps_string(value);
            assert!(selection.is_all(), "{value}");
            assert!(selection.allows("com.game"));
            assert_eq!(build_apps_string(&selection), "*");
        }
    }

    #[test]
    fn test_list_is_trimmed_and_deduplicated() {
        let selection = parse_apps_string("a,b, b,");
        assert!(!selection.is_all());
        assert_eq!(selection.apps().collect::<Vec<_>>(), vec!["a", "b"]);
        assert!(selection.allows("b"));
        assert!(!selection.allows("c"));
    }

    #[test]
    fn test_empty_string_selects_nothing() {
        let selection = parse_apps_string("");
        assert!(selection.is_empty());
        assert!(!selection.allows("a"));
        assert_eq!(build_apps_string(&selection), "");
    }

    #[test]
    fn test_all_marker_wins_on_build() {
        let mut selection = parse_apps_string("com.b,com.a");
        selection.set_all(true);
        assert_eq!(build_apps_string(&selection), "*");

        selection.set_all(false);
        assert_eq!(selection.to_string(), "com.a,com.b");
    }

    #[test]
    fn test_build_is_order_insensitive() {
        assert_eq!(
            build_apps_string(&parse_apps_string("z, a,m")),
            build_apps_string(&parse_apps_string("m,z,a,a"))
        );
    }

    #[test]
    fn test_insert_and_remove() {
        let mut selection = AppSelection::none();
        assert!(selection.insert(" com.mail "));
        assert!(!selection.insert("com.mail"));
        assert!(!selection.insert("  "));
        assert!(selection.remove("com.mail"));
        assert!(selection.is_empty());

        assert!(selection.insert(" * "));
        assert!(!selection.insert("*"));
        assert!(selection.is_all());
        assert!(selection.remove("*"));
        assert!(selection.is_empty());
    }
}
