//! Artifact splitting.
//!
//! Pulls inline `<script>` and (optionally) `<style>` blocks out of an
//! assembled document. The extraction is textual: tags must be well formed
//! and not nested.

use std::sync::LazyLock;

use regex::{Captures, Regex};

static SCRIPT_OR_STYLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?is)\s*<(?:script[^>]*>(?P<script>.*?)\s*</script\s?>|style[^>]*>(?P<style>.*?)\s*</style\s?>)\s*",
    )
    .unwrap()
});

static SCRIPT_ONLY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)\s*<script[^>]*>(?P<script>.*?)\s*</script\s?>\s*").unwrap()
});

/// A document split into its parts.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Split {
    /// Document with the extracted blocks replaced by newlines.
    pub markup: String,
    /// Concatenated style block contents, each followed by a newline.
    pub styles: String,
    /// Concatenated script block contents, each followed by a newline.
    pub scripts: String,
}

/// Split `document` into markup, styles and scripts.
///
/// A monolithic document is returned unchanged with empty pools. Otherwise
/// every script block is extracted, and style blocks too when
/// `extract_styles` is set. Block order is preserved within each pool.
pub fn split(document: &str, monolith: bool, extract_styles: bool) -> Split {
    if monolith {
        return Split {
            markup: document.to_owned(),
            ..Split::default()
        };
    }

    let pattern = if extract_styles {
        &*SCRIPT_OR_STYLE
    } else {
        &*SCRIPT_ONLY
    };

    let mut styles = String::new();
    let mut scripts = String::new();
    let markup = pattern
        .replace_all(document, |caps: &Captures<'_>| {
            if let Some(script) = caps.name("script") {
                append(&mut scripts, script.as_str());
            } else if let Some(style) = caps.name("style") {
                append(&mut styles, style.as_str());
            }
            "\n"
        })
        .into_owned();

    Split {
        markup,
        styles,
        scripts,
    }
}

fn append(pool: &mut String, content: &str) {
    if !content.is_empty() {
        pool.push_str(content);
        pool.push('\n');
    }
}
