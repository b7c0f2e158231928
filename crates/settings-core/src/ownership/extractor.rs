//! Setting-name extraction from definition file contents.

use std::sync::LazyLock;

use regex::Regex;

/// Pulls a setting name out of the text of a definition file.
pub trait NameExtractor: Send + Sync {
    fn extract(&self, contents: &str) -> Option<String>;
}

// `name="..."` or `name='...'`; `display_name=` and friends do not match.
static NAME_ASSIGNMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\bname\s*=\s*(?:"([^"\n]+)"|'([^'\n]+)')"#).unwrap()
});

/// Default extractor: the first `name=` assignment with a quoted literal.
#[derive(Clone, Copy, Debug, Default)]
pub struct AssignmentExtractor;

impl NameExtractor for AssignmentExtractor {
    fn extract(&self, contents: &str) -> Option<String> {
        let caps = NAME_ASSIGNMENT_RE.captures(contents)?;
        caps.get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str().to_string())
    }
}

/// Extractor backed by an arbitrary closure, for alternate file formats.
pub struct FnExtractor<F>(pub F);

impl<F> NameExtractor for FnExtractor<F>
where
    F: Fn(&str) -> Option<String> + Send + Sync,
{
    fn extract(&self, contents: &str) -> Option<String> {
        (self.0)(contents)
    }
}
