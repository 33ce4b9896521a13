//! Media asset resolver.
//!
//! Every image source gets a destination filename computed from the source
//! string alone, so names do not depend on traversal order and can be
//! assigned before (or in parallel with) fetching any bytes.

use std::collections::{BTreeMap, BTreeSet};

use sha2::{Digest, Sha256};

use crate::slug::normalize_slug;

const FALLBACK_STEM: &str = "image";
const MAX_EXTENSION_LEN: usize = 5;
const SHORT_HASH_BYTES: usize = 4;

/// An embedded image and the filename it is written under.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MediaReference {
    /// Location as written in the markdown body.
    pub source: String,
    pub resolved_name: String,
}

impl MediaReference {
    /// `true` for `http://` and `https://` sources.
    pub fn is_remote(&self) -> bool {
        let lower = self.source.to_ascii_lowercase();
        lower.starts_with("http://") || lower.starts_with("https://")
    }
}

/// Resolved names for every source of one document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaIndex {
    by_source: BTreeMap<String, MediaReference>,
}

impl MediaIndex {
    /// Assign a unique `resolved_name` to each distinct source.
    ///
    /// Sources sharing a candidate name all receive a short hash suffix, not
    /// only the later ones, which keeps the outcome independent of input order.
    pub fn resolve<'a>(sources: impl IntoIterator<Item = &'a str>) -> Self {
        let distinct: BTreeSet<&str> = sources.into_iter().collect();

        let mut by_candidate: BTreeMap<String, Vec<&str>> = BTreeMap::new();
        for source in &distinct {
            by_candidate
                .entry(candidate_name(source))
                .or_default()
                .push(*source);
        }

        let mut names: BTreeMap<&str, String> = BTreeMap::new();
        for (candidate, group) in &by_candidate {
            for source in group {
                let name = if group.len() == 1 {
                    candidate.clone()
                } else {
                    suffixed(candidate, &short_hash(source))
                };
                names.insert(*source, name);
            }
        }

        // A suffixed name can still shadow an unrelated candidate; widen the
        // hash for every source involved in such a clash.
        let mut usage: BTreeMap<&str, usize> = BTreeMap::new();
        for name in names.values() {
            *usage.entry(name.as_str()).or_default() += 1;
        }
        let clashing: Vec<&str> = names
            .iter()
            .filter(|(_, name)| usage.get(name.as_str()).copied().unwrap_or(0) > 1)
            .map(|(source, _)| *source)
            .collect();
        for source in clashing {
            let widened = suffixed(&candidate_name(source), &full_hash(source));
            names.insert(source, widened);
        }

        let by_source = names
            .into_iter()
            .map(|(source, resolved_name)| {
                (
                    source.to_string(),
                    MediaReference {
                        source: source.to_string(),
                        resolved_name,
                    },
                )
            })
            .collect();
        Self { by_source }
    }

    pub fn get(&self, source: &str) -> Option<&MediaReference> {
        self.by_source.get(source)
    }

    /// All references ordered by source.
    pub fn references(&self) -> impl Iterator<Item = &MediaReference> {
        self.by_source.values()
    }

    pub fn len(&self) -> usize {
        self.by_source.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_source.is_empty()
    }
}

/// `stem.ext` derived from the last path segment of the source.
fn candidate_name(source: &str) -> String {
    let path = source
        .split(['?', '#'])
        .next()
        .unwrap_or(source)
        .trim_end_matches('/');
    let file = path.rsplit('/').next().unwrap_or(path);

    let (stem, extension) = match file.rsplit_once('.') {
        Some((stem, ext))
            if !ext.is_empty()
                && ext.len() <= MAX_EXTENSION_LEN
                && ext.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            (stem, Some(ext.to_ascii_lowercase()))
        }
        _ => (file, None),
    };

    let mut stem = normalize_slug(stem);
    if stem.is_empty() {
        stem = FALLBACK_STEM.to_string();
    }
    match extension {
        Some(ext) => format!("{stem}.{ext}"),
        None => stem,
    }
}

fn suffixed(candidate: &str, suffix: &str) -> String {
    match candidate.rsplit_once('.') {
        Some((stem, ext)) => format!("{stem}-{suffix}.{ext}"),
        None => format!("{candidate}-{suffix}"),
    }
}

fn short_hash(input: &str) -> String {
    hex_digest(input, SHORT_HASH_BYTES)
}

fn full_hash(input: &str) -> String {
    hex_digest(input, usize::MAX)
}

fn hex_digest(input: &str, bytes: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest.iter().take(bytes) {
        use std::fmt::Write;
        let _ = write!(&mut hex, "{byte:02x}");
    }
    hex
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn name_of(index: &MediaIndex, source: &str) -> String {
        index.get(source).unwrap().resolved_name.clone()
    }

    #[test]
    fn candidate_uses_last_segment_and_lowercases_extension() {
        assert_eq!(
            candidate_name("https://zestedesavoir.com/media/galleries/1/Schéma Final.PNG?v=2"),
            "schema-final.png"
        );
        assert_eq!(candidate_name("images/diagram.svg"), "diagram.svg");
    }

    #[test]
    fn candidate_falls_back_for_unnamed_sources() {
        assert_eq!(candidate_name("https://cdn.example/images/"), "images");
        assert_eq!(candidate_name("/.png"), "image.png");
        assert_eq!(candidate_name("img/archive.tar-backup"), "archive-tar-backup");
    }

    #[test]
    fn unique_names_are_kept_verbatim() {
        let index = MediaIndex::resolve(["a/one.png", "b/two.png"]);
        assert_eq!(name_of(&index, "a/one.png"), "one.png");
        assert_eq!(name_of(&index, "b/two.png"), "two.png");
    }

    #[test]
    fn colliding_names_all_get_hash_suffixes() {
        let index = MediaIndex::resolve(["a/logo.png", "b/logo.png"]);
        let first = name_of(&index, "a/logo.png");
        let second = name_of(&index, "b/logo.png");
        assert_ne!(first, second);
        assert!(first.starts_with("logo-") && first.ends_with(".png"));
        assert_eq!(first.len(), "logo-".len() + 8 + ".png".len());
        assert_eq!(first, format!("logo-{}.png", short_hash("a/logo.png")));
    }

    #[test]
    fn resolution_ignores_input_order_and_duplicates() {
        let forward = MediaIndex::resolve(["a/logo.png", "b/logo.png", "c/x.gif", "a/logo.png"]);
        let backward = MediaIndex::resolve(["c/x.gif", "b/logo.png", "a/logo.png"]);
        assert_eq!(forward, backward);
        assert_eq!(forward.len(), 3);
    }

    #[test]
    fn remote_sources_are_detected() {
        let index = MediaIndex::resolve(["HTTPS://cdn.example/a.png", "local/b.png"]);
        assert!(index.get("HTTPS://cdn.example/a.png").unwrap().is_remote());
        assert!(!index.get("local/b.png").unwrap().is_remote());
    }
}
