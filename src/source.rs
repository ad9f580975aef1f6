// src/source.rs
use chrono::{DateTime, Utc};

/// A feed endpoint and the rules its stories must satisfy.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Source {
    pub url: String,
    /// Stories published strictly before this instant are ignored.
    pub ignore_before: Option<DateTime<Utc>>,
    /// Lower-cased; any match admits the story.
    pub must_include: Vec<String>,
    /// Lower-cased; any match rejects the story, even if an include keyword matched.
    pub must_exclude: Vec<String>,
    /// Feed reuses links and bumps timestamps; identity includes the raw timestamp.
    pub status_page: bool,
}

impl Source {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn ignore_before(mut self, cutoff: DateTime<Utc>) -> Self {
        self.ignore_before = Some(cutoff);
        self
    }

    pub fn must_include<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.must_include = clean_keywords(keywords);
        self
    }

    pub fn must_exclude<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.must_exclude = clean_keywords(keywords);
        self
    }

    pub fn status_page(mut self, on: bool) -> Self {
        self.status_page = on;
        self
    }
}

/// Trim, lower-case and drop empty keywords.
pub fn clean_keywords<I, S>(keywords: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    keywords
        .into_iter()
        .map(|k| k.as_ref().trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect()
}
