//! Path pattern compilation.
//!
//! # Responsibilities
//! - Split a pattern on `/` and recognise `{name}` placeholder segments
//! - Escape literal segments and anchor the whole pattern
//! - Prepend the responder's normalised prefix
//! - Cache compiled matchers keyed by the final pattern text
//!
//! # Design Decisions
//! - A placeholder captures exactly one path segment (`[^/]+`)
//! - Captures are positional, names live beside the regex; placeholder names
//!   may start with a digit, which regex group names may not
//! - The cache is a concurrent map so compilation can run while other
//!   threads dispatch

use dashmap::DashMap;
use regex::Regex;

use crate::routing::registry::RegistrationError;

/// Capture expression for one placeholder segment.
const SEGMENT_CAPTURE: &str = "([^/]+)";

/// A compiled, anchored path pattern.
#[derive(Debug, Clone)]
pub struct PathPattern {
    /// Prefix plus pattern as declared, e.g. `/api/sum/{left}/{right}`.
    source: String,
    matcher: Regex,
    placeholders: Vec<String>,
}

impl PathPattern {
    /// Declared pattern text including the prefix.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The anchored regular expression the path is tested against.
    pub fn regex(&self) -> &str {
        self.matcher.as_str()
    }

    /// Placeholder names in order of appearance.
    pub fn placeholders(&self) -> &[String] {
        &self.placeholders
    }

    pub fn has_placeholder(&self, name: &str) -> bool {
        self.placeholders.iter().any(|p| p == name)
    }

    /// Match a path; on success returns the raw captured fragment for each
    /// placeholder, in placeholder order.
    pub fn captures<'p>(&self, path: &'p str) -> Option<Vec<&'p str>> {
        let caps = self.matcher.captures(path)?;
        Some(
            (1..=self.placeholders.len())
                .map(|i| caps.get(i).map_or("", |m| m.as_str()))
                .collect(),
        )
    }

    /// Captured fragment for a named placeholder, given the output of
    /// [`PathPattern::captures`].
    pub fn capture<'p>(&self, name: &str, captures: &[&'p str]) -> Option<&'p str> {
        let index = self.placeholders.iter().position(|p| p == name)?;
        captures.get(index).copied()
    }
}

/// Whether a path segment is a `{name}` placeholder.
pub fn is_placeholder(segment: &str) -> bool {
    segment.len() >= 3
        && segment.starts_with('{')
        && segment.ends_with('}')
        && segment[1..segment.len() - 1]
            .bytes()
            .all(|b| b.is_ascii_alphanumeric())
}

/// Normalise a responder prefix: no trailing slash, exactly one leading
/// slash, or empty for "no prefix".
pub fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

/// Compiles path patterns and caches the resulting matchers.
#[derive(Debug, Default)]
pub struct PatternCache {
    compiled: DashMap<String, Regex>,
}

impl PatternCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile `pattern` under `prefix`.
    ///
    /// Fails if a placeholder name repeats within the pattern.
    pub fn compile(&self, prefix: &str, pattern: &str) -> Result<PathPattern, RegistrationError> {
        let prefix = normalize_prefix(prefix);
        let mut placeholders: Vec<String> = Vec::new();
        let mut pieces = Vec::new();

        for segment in pattern.split('/') {
            if is_placeholder(segment) {
                let name = &segment[1..segment.len() - 1];
                if placeholders.iter().any(|p| p == name) {
                    return Err(RegistrationError::DuplicatePlaceholder {
                        name: name.to_string(),
                        pattern: pattern.to_string(),
                    });
                }
                placeholders.push(name.to_string());
                pieces.push(SEGMENT_CAPTURE.to_string());
            } else {
                pieces.push(regex::escape(segment));
            }
        }

        let anchored = format!("^{}{}$", regex::escape(&prefix), pieces.join("/"));
        let matcher = self.obtain(&anchored, pattern)?;

        Ok(PathPattern {
            source: format!("{prefix}{pattern}"),
            matcher,
            placeholders,
        })
    }

    /// Number of distinct compiled matchers.
    pub fn len(&self) -> usize {
        self.compiled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.compiled.is_empty()
    }

    fn obtain(&self, anchored: &str, pattern: &str) -> Result<Regex, RegistrationError> {
        if let Some(cached) = self.compiled.get(anchored) {
            return Ok(cached.clone());
        }

        let regex = Regex::new(anchored).map_err(|source| RegistrationError::Pattern {
            pattern: pattern.to_string(),
            source,
        })?;
        tracing::trace!(regex = %anchored, "Compiled path pattern");

        Ok(self
            .compiled
            .entry(anchored.to_string())
            .or_insert(regex)
            .clone())
    }
}
