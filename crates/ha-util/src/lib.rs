//! Small helpers shared across the hub

pub mod location;
mod throttle;

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

pub use throttle::Throttle;

static RE_SLUGIFY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9_]+").expect("Failed to compile slug pattern"));

/// Lower-case, spaces to underscores, everything else outside `[a-z0-9_]`
/// dropped
pub fn slugify(text: &str) -> String {
    let text = text.to_lowercase().replace(' ', "_");
    RE_SLUGIFY.replace_all(&text, "").into_owned()
}

/// `preferred` if unused, else the first free `preferred_2`, `preferred_3`, ..
pub fn ensure_unique_string<'a>(
    preferred: &str,
    current: impl IntoIterator<Item = &'a str>,
) -> String {
    let current: HashSet<&str> = current.into_iter().collect();

    let mut candidate = preferred.to_string();
    let mut tries = 1;
    while current.contains(candidate.as_str()) {
        tries += 1;
        candidate = format!("{preferred}_{tries}");
    }
    candidate
}
