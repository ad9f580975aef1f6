// src/feed/mod.rs
pub mod http;
pub mod parser;
pub mod timeparse;
pub mod types;

pub use http::HttpFetcher;
pub use parser::parse_feed;
pub use types::{Fetcher, Item};

use once_cell::sync::OnceCell;
use regex::Regex;

/// Normalize a story title: decode entities, strip tags, collapse whitespace.
pub fn normalize_title(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[a-z][^>]*>").expect("tag regex"));
    out = re_tags.replace_all(&out, "").to_string();

    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").expect("whitespace regex"));
    re_ws.replace_all(&out, " ").trim().to_string()
}
