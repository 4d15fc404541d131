use std::sync::LazyLock;

use regex::Regex;

static NON_ALPHANUMERIC_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("slug pattern should compile"));

/// Derives a URL-safe slug from a title
///
/// The title is lowercased, every run of characters outside `[a-z0-9]` becomes a single
/// `-`, and leading or trailing hyphens are trimmed.
pub fn derive_slug(title: &str) -> String {
    let lowercase = title.to_lowercase();
    NON_ALPHANUMERIC_RUN
        .replace_all(&lowercase, "-")
        .trim_matches('-')
        .to_owned()
}
