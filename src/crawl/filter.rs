// src/crawl/filter.rs
// =============================================================================
// Decides which discovered links may enter the crawl frontier.
//
// A link is admitted when:
// 1. it has the same origin (scheme + host + port) as the base URL
// 2. it passes the include/exclude patterns:
//    - any exclude match rejects it, before includes are looked at
//    - if include patterns exist, at least one must match
//
// Patterns are globs over the full URL: `*` matches any run of characters
// and `?` matches a single character. They are compiled to anchored regexes
// once, when the configuration is resolved.
// =============================================================================

use regex::Regex;
use url::Url;

use crate::error::ConfigError;

#[derive(Debug, Clone, Default)]
pub struct UrlFilter {
    include: Vec<Regex>,
    exclude: Vec<Regex>,
}

impl UrlFilter {
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self, ConfigError> {
        Ok(Self {
            include: compile_all(include)?,
            exclude: compile_all(exclude)?,
        })
    }

    pub fn allows(&self, url: &str) -> bool {
        if self.exclude.iter().any(|re| re.is_match(url)) {
            return false;
        }
        self.include.is_empty() || self.include.iter().any(|re| re.is_match(url))
    }
}

fn compile_all(patterns: &[String]) -> Result<Vec<Regex>, ConfigError> {
    patterns.iter().map(|p| glob_to_regex(p)).collect()
}

// "*/admin/*" -> ^.*/admin/.*$
pub fn glob_to_regex(pattern: &str) -> Result<Regex, ConfigError> {
    let mut source = String::with_capacity(pattern.len() + 8);
    source.push('^');
    for ch in pattern.chars() {
        match ch {
            '*' => source.push_str(".*"),
            '?' => source.push('.'),
            other => source.push_str(&regex::escape(&other.to_string())),
        }
    }
    source.push('$');

    Regex::new(&source).map_err(|source| ConfigError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}

pub fn same_origin(base: &Url, candidate: &Url) -> bool {
    base.origin() == candidate.origin()
}

// Parses a discovered link and strips its fragment, so "/a#x" and "/a#y" are
// the same page. Returns None for anything that isn't a valid http(s) URL.
pub fn normalize_link(link: &str) -> Option<Url> {
    let mut url = Url::parse(link.trim()).ok()?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }
    url.set_fragment(None);
    Some(url)
}
