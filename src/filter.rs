// src/filter.rs
//! Story eligibility rules and identity derivation.

use sha2::{Digest, Sha256};

use crate::feed::Item;
use crate::source::Source;

/// Decide whether `item` passes `source`'s rules.
pub fn matches(item: &Item, source: &Source) -> bool {
    // No usable timestamp: not eligible yet.
    let Some(published) = item.published else {
        return false;
    };

    if source.ignore_before.is_some_and(|cutoff| published < cutoff) {
        return false;
    }

    let title = item.title.to_lowercase();

    if includes_any(&title, &source.must_exclude) {
        return false;
    }

    if !source.must_include.is_empty() && !includes_any(&title, &source.must_include) {
        return false;
    }

    true
}

/// `keywords` are expected lower-case already (see [`crate::source::clean_keywords`]).
fn includes_any(lower_title: &str, keywords: &[String]) -> bool {
    keywords.iter().any(|k| lower_title.contains(k.as_str()))
}

/// Hex SHA-256 of `input`.
pub fn content_hash(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let mut out = String::with_capacity(digest.len() * 2);
    for b in digest.iter() {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Dedup key for `item`: the link alone, or raw timestamp + link for status-page sources.
pub fn identity(item: &Item, source: &Source) -> String {
    if source.status_page {
        content_hash(&format!("{}{}", item.published_raw, item.link))
    } else {
        content_hash(&item.link)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn src() -> Source {
        Source::new("https://example.test/feed")
            .ignore_before("2020-04-20T00:00:00Z".parse().unwrap())
            .must_include(["linux"])
            .must_exclude(["windows"])
    }

    #[test]
    fn item_without_timestamp_is_rejected() {
        let item = Item::new("new linux kernel", "https://x.test/1", "garbage");
        assert!(item.published.is_none());
        assert!(!matches(&item, &Source::new("u")));
    }

    #[test]
    fn cutoff_is_strictly_before() {
        let s = src();
        let before = Item::new("linux", "l", "2020-04-19T23:59:59Z");
        let exact = Item::new("linux", "l", "2020-04-20T00:00:00Z");
        let after = Item::new("new linux kernel", "l", "2020-04-20T00:00:01Z");
        assert!(!matches(&before, &s));
        assert!(matches(&exact, &s));
        assert!(matches(&after, &s));
    }

    #[test]
    fn exclude_wins_over_include() {
        let item = Item::new("Linux on Windows", "l", "2021-01-01T00:00:00Z");
        assert!(!matches(&item, &src()));
    }

    #[test]
    fn include_is_case_insensitive_and_required_when_set() {
        let s = src();
        let hit = Item::new("LINUX 6.0 released", "l", "2021-01-01T00:00:00Z");
        let miss = Item::new("BSD 14 released", "l", "2021-01-01T00:00:00Z");
        assert!(matches(&hit, &s));
        assert!(!matches(&miss, &s));
    }

    #[test]
    fn no_rules_accepts_any_dated_item() {
        let item = Item::new("anything", "l", "1999-01-01T00:00:00Z");
        assert!(matches(&item, &Source::new("u")));
    }

    #[test]
    fn identity_uses_link_unless_status_page() {
        let a = Item::new("t1", "https://s.test/1", "2020-04-20T00:00:00Z");
        let b = Item::new("t2", "https://s.test/1", "2020-04-21T00:00:00Z");

        let plain = Source::new("u");
        assert_eq!(identity(&a, &plain), identity(&b, &plain));

        let status = Source::new("u").status_page(true);
        assert_ne!(identity(&a, &status), identity(&b, &status));
    }

    #[test]
    fn identity_is_stable() {
        let item = Item::new("t", "https://s.test/1", "");
        assert_eq!(
            identity(&item, &Source::new("u")),
            content_hash("https://s.test/1")
        );
        assert_eq!(content_hash("abc").len(), 64);
        assert_eq!(
            content_hash("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
