use regex::Regex;

/// PathPattern
///
/// An Ant-style path pattern compiled once into an anchored regular expression.
///
/// Supported syntax:
/// - `?` matches exactly one character within a segment.
/// - `*` matches zero or more characters within a segment.
/// - `**` as a whole segment matches zero or more segments. Inside a segment
///   (e.g. `swagger-ui**`) it behaves like `*`.
/// - `{name}` matches one non-empty segment (axum path parameter).
/// - `{*name}` matches one or more trailing segments (axum catch-all).
///
/// Everything else is matched literally.
#[derive(Debug, Clone)]
pub struct PathPattern {
    source: String,
    regex: Regex,
}

impl PathPattern {
    pub fn new(source: &str) -> Result<Self, regex::Error> {
        let regex = Regex::new(&translate(source))?;
        Ok(Self {
            source: source.to_string(),
            regex,
        })
    }

    /// The pattern as it was written at registration time.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn matches(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }
}

// Relative patterns are treated as rooted at `/`.
fn translate(pattern: &str) -> String {
    let relative = pattern.strip_prefix('/').unwrap_or(pattern);
    let mut out = String::from("^");

    if relative.is_empty() {
        out.push_str("/$");
        return out;
    }

    for segment in relative.split('/') {
        if segment == "**" {
            out.push_str("(?:/[^/]*)*");
        } else if is_catch_all(segment) {
            out.push_str("(?:/[^/]+)+");
        } else {
            out.push('/');
            push_segment(&mut out, segment);
        }
    }

    out.push('$');
    out
}

fn is_catch_all(segment: &str) -> bool {
    segment
        .strip_prefix("{*")
        .and_then(|rest| rest.strip_suffix('}'))
        .is_some_and(|name| !name.is_empty())
}

fn push_segment(out: &mut String, segment: &str) {
    let mut chars = segment.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '*' => {
                while chars.next_if_eq(&'*').is_some() {}
                out.push_str("[^/]*");
            }
            '?' => out.push_str("[^/]"),
            '{' => match chars.clone().position(|c| c == '}') {
                Some(end) if end > 0 => {
                    chars.nth(end);
                    out.push_str("[^/]+");
                }
                _ => out.push_str(&regex::escape("{")),
            },
            literal => {
                let mut buf = [0u8; 4];
                out.push_str(&regex::escape(literal.encode_utf8(&mut buf)));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(source: &str) -> PathPattern {
        PathPattern::new(source).unwrap()
    }

    #[test]
    fn literal_paths_match_exactly() {
        let p = pattern("/health");
        assert!(p.matches("/health"));
        assert!(!p.matches("/healthz"));
        assert!(!p.matches("/health/deep"));
        assert!(!p.matches("/api/health"));
    }

    #[test]
    fn root_pattern_only_matches_root() {
        let p = pattern("/");
        assert!(p.matches("/"));
        assert!(!p.matches("/health"));
    }

    #[test]
    fn single_star_stays_within_one_segment() {
        let p = pattern("/assets/*.js");
        assert!(p.matches("/assets/app.js"));
        assert!(p.matches("/assets/.js"));
        assert!(!p.matches("/assets/nested/app.js"));
        assert!(!p.matches("/assets/app.css"));
    }

    #[test]
    fn question_mark_matches_one_character() {
        let p = pattern("/items/?");
        assert!(p.matches("/items/1"));
        assert!(!p.matches("/items/12"));
        assert!(!p.matches("/items/"));
    }

    #[test]
    fn double_star_segment_spans_zero_or_more_segments() {
        let p = pattern("/a/**/b");
        assert!(p.matches("/a/b"));
        assert!(p.matches("/a/x/b"));
        assert!(p.matches("/a/x/y/z/b"));
        assert!(!p.matches("/a/x/c"));

        let tail = pattern("/static/**");
        assert!(tail.matches("/static"));
        assert!(tail.matches("/static/css/site.css"));
        assert!(!tail.matches("/staticfiles"));
    }

    #[test]
    fn documentation_globs_cover_swagger_assets() {
        let ui = pattern("/swagger-ui**/**");
        assert!(ui.matches("/swagger-ui"));
        assert!(ui.matches("/swagger-ui/"));
        assert!(ui.matches("/swagger-ui/index.html"));
        assert!(ui.matches("/swagger-ui/dist/swagger-ui.css"));
        assert!(ui.matches("/swagger-ui.html"));
        assert!(!ui.matches("/swagger"));
        assert!(!ui.matches("/api/swagger-ui"));

        let docs = pattern("/v3/api-docs**/**");
        assert!(docs.matches("/v3/api-docs"));
        assert!(docs.matches("/v3/api-docs/swagger-config"));
        assert!(!docs.matches("/v2/api-docs"));
    }

    #[test]
    fn axum_parameters_match_one_segment() {
        let p = pattern("/projects/{id}");
        assert!(p.matches("/projects/42"));
        assert!(!p.matches("/projects"));
        assert!(!p.matches("/projects/"));
        assert!(!p.matches("/projects/42/comments"));

        let nested = pattern("/projects/{id}/comments");
        assert!(nested.matches("/projects/7/comments"));
    }

    #[test]
    fn axum_catch_all_requires_a_remainder() {
        let p = pattern("/files/{*path}");
        assert!(p.matches("/files/a"));
        assert!(p.matches("/files/a/b/c.txt"));
        assert!(!p.matches("/files"));
    }

    #[test]
    fn regex_metacharacters_are_literal() {
        let p = pattern("/price/$5.(x)+[y]");
        assert!(p.matches("/price/$5.(x)+[y]"));
        assert!(!p.matches("/price/$5a(x)+[y]"));
    }

    #[test]
    fn unclosed_brace_is_literal() {
        let p = pattern("/odd/{name");
        assert!(p.matches("/odd/{name"));
        assert!(!p.matches("/odd/value"));
    }

    #[test]
    fn relative_patterns_are_rooted() {
        let p = pattern("health");
        assert!(p.matches("/health"));
        assert_eq!(p.as_str(), "health");
    }
}
