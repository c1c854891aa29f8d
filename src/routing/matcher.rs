//! Path pattern matching.
//!
//! # Responsibilities
//! - Compile Ant-style path patterns once at startup
//! - Match request paths against them
//!
//! # Syntax
//! - `?` matches exactly one character
//! - `*` matches zero or more characters within a single path segment
//! - `**` matches zero or more whole path segments
//!
//! # Design Decisions
//! - Patterns and paths are split on `/`; empty segments are ignored
//! - A leading `/` must be present on both or on neither
//! - A trailing `/` is significant unless the pattern ends in `**`
//! - Matching is case-sensitive

/// A compiled path pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    raw: String,
    segments: Vec<String>,
}

impl PathPattern {
    pub fn new(pattern: impl Into<String>) -> Self {
        let raw = pattern.into();
        let mut segments: Vec<String> = raw
            .split('/')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        // `/**/**/` is the same as `/**/`
        segments.dedup_by(|a, b| *a == "**" && *b == "**");
        Self { raw, segments }
    }

    /// Returns true if `path` matches this pattern.
    pub fn matches(&self, path: &str) -> bool {
        if self.raw.starts_with('/') != path.starts_with('/') {
            return false;
        }

        let path_segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        SegmentMatcher::new(&self.segments, &path_segments, &self.raw, path).matches_from(0, 0)
    }
}

/// Segment-wise matcher, memoized on (pattern index, path index) so that
/// `**` backtracking stays polynomial in the path length.
struct SegmentMatcher<'a> {
    pattern: &'a [String],
    path: &'a [&'a str],
    raw_pattern: &'a str,
    raw_path: &'a str,
    memo: Vec<Option<bool>>,
}

impl<'a> SegmentMatcher<'a> {
    fn new(pattern: &'a [String], path: &'a [&'a str], raw_pattern: &'a str, raw_path: &'a str) -> Self {
        Self {
            pattern,
            path,
            raw_pattern,
            raw_path,
            memo: vec![None; (pattern.len() + 1) * (path.len() + 1)],
        }
    }

    fn matches_from(&mut self, p: usize, t: usize) -> bool {
        let key = p * (self.path.len() + 1) + t;
        if let Some(hit) = self.memo[key] {
            return hit;
        }

        let (pattern, path) = (self.pattern, self.path);
        let result = match pattern.get(p).map(String::as_str) {
            None => t == path.len() && self.raw_pattern.ends_with('/') == self.raw_path.ends_with('/'),
            Some("**") => {
                p + 1 == pattern.len() || (t..=path.len()).any(|skip| self.matches_from(p + 1, skip))
            }
            Some(segment) => match path.get(t) {
                Some(candidate) => match_segment(segment, candidate) && self.matches_from(p + 1, t + 1),
                // `/a/*` also matches `/a/`
                None => p + 1 == pattern.len() && segment == "*" && self.raw_path.ends_with('/'),
            },
        };

        self.memo[key] = Some(result);
        result
    }
}

/// Glob match of a single segment supporting `*` and `?`.
fn match_segment(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    let (mut p, mut t) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == text[t]) {
            p += 1;
            t += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            backtrack = Some((p, t));
            p += 1;
        } else if let Some((star, matched)) = backtrack {
            p = star + 1;
            t = matched + 1;
            backtrack = Some((star, matched + 1));
        } else {
            return false;
        }
    }

    pattern[p..].iter().all(|c| *c == '*')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(pattern: &str, path: &str) -> bool {
        PathPattern::new(pattern).matches(path)
    }

    #[test]
    fn test_literal_paths() {
        assert!(matches("/api/users", "/api/users"));
        assert!(!matches("/api/users", "/api/user"));
        assert!(!matches("/api/users", "/api/users/1"));
        assert!(!matches("/api", "api"));
    }

    #[test]
    fn test_single_character_wildcard() {
        assert!(matches("/v?/items", "/v1/items"));
        assert!(matches("/v?/items", "/v2/items"));
        assert!(!matches("/v?/items", "/v10/items"));
        assert!(!matches("/v?/items", "/v/items"));
    }

    #[test]
    fn test_single_level_wildcard() {
        assert!(matches("/static/*", "/static/app.js"));
        assert!(matches("/static/*.js", "/static/app.js"));
        assert!(!matches("/static/*.js", "/static/app.css"));
        assert!(!matches("/static/*", "/static/js/app.js"));
        assert!(matches("/static/*", "/static/"));
        assert!(matches("/*", "/"));
    }

    #[test]
    fn test_multi_level_wildcard() {
        assert!(matches("/**", "/"));
        assert!(matches("/**", "/a/b/c"));
        assert!(matches("/api/**", "/api"));
        assert!(matches("/api/**", "/api/v1/users/"));
        assert!(matches("/api/**/users", "/api/users"));
        assert!(matches("/api/**/users", "/api/v1/admin/users"));
        assert!(!matches("/api/**/users", "/api/v1/groups"));
        assert!(matches("/**/*.png", "/img/icons/logo.png"));
        assert!(!matches("/api/**", "/web/index.html"));
    }

    #[test]
    fn test_trailing_slash_is_significant() {
        assert!(matches("/docs/", "/docs/"));
        assert!(!matches("/docs", "/docs/"));
        assert!(!matches("/docs/", "/docs"));
    }

    #[test]
    fn test_repeated_multi_level_wildcards() {
        assert!(matches("/**/**/users", "/users"));
        assert!(matches("/a/**/b/**/c", "/a/x/b/y/z/c"));
        assert!(!matches("/a/**/b/**/c", "/a/x/c/y/b"));

        // Many `**` against a long non-matching path must still finish quickly.
        let pattern = "/**/a/**/a/**/a/**/a/**/a/**/a/**/b";
        let path = "/a".repeat(200);
        assert!(!matches(pattern, &path));
        assert!(matches(pattern, &format!("{path}/b")));
    }

    #[test]
    fn test_segment_glob() {
        assert!(match_segment("*", ""));
        assert!(match_segment("a*b*c", "aXXbYYc"));
        assert!(!match_segment("a*b*c", "aXXbYY"));
        assert!(match_segment("*.tar.gz", "release.tar.gz"));
        assert!(match_segment("??", "ab"));
        assert!(!match_segment("??", "abc"));
    }
}
