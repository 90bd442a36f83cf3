//! Import directive adapters.
//!
//! An [`Adapter`] recognizes one textual directive shape (a `<script src>` tag,
//! an `/** @imports image */ 'x.png'` marker, an `import … from` line, …) and
//! knows how to turn the referenced module's resolved content into the text
//! that replaces the directive.

use std::sync::LazyLock;

use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use regex::Regex;

use crate::module::Content;

static HTML_SCRIPT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<script[^>]+src="([^">]*)"[^>]*>\s*</script>"#).unwrap());

static HTML_STYLESHEET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<link rel="stylesheet" type="text/css" href="([^"]*\.css)">"#).unwrap()
});

static HTML_IMPORTS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<imports src="([^"]*\.html)"></imports>"#).unwrap());

static SCRIPT_IMPORT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*import(?:.*\s*)*?.*from.*'(.*)'").unwrap());

static IMAGE_MARKER: LazyLock<Regex> = LazyLock::new(|| marker("image"));
static AUDIO_MARKER: LazyLock<Regex> = LazyLock::new(|| marker("audio"));
static HTML_MARKER: LazyLock<Regex> = LazyLock::new(|| marker("html"));
static CSS_MARKER: LazyLock<Regex> = LazyLock::new(|| marker("css"));
static JSON_MARKER: LazyLock<Regex> = LazyLock::new(|| marker("json"));
static TXT_MARKER: LazyLock<Regex> = LazyLock::new(|| marker("txt"));

static LEADING_EXPORT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*export\s*").unwrap());
static INNER_EXPORT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n\s*export\s*").unwrap());

/// Build the pattern for a `/** @imports <kind> */ '<path>'` marker.
fn marker(kind: &str) -> Regex {
    Regex::new(&format!(r"/\*\*\s*@imports {kind}\s*\*/ '([^']*)'")).unwrap()
}

/// A directive shape together with its converter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Adapter {
    /// `<script src="PATH"></script>` in markup.
    HtmlScript,
    /// `<link rel="stylesheet" type="text/css" href="PATH.css">` in markup.
    HtmlStylesheet,
    /// `<imports src="PATH.html"></imports>` in markup.
    HtmlImports,
    /// `import … from 'PATH'` in scripts.
    ScriptModule,
    /// `/** @imports html */ 'PATH'` in scripts.
    ScriptHtml,
    /// `/** @imports css */ 'PATH'` in scripts.
    ScriptCss,
    /// `/** @imports json */ 'PATH'` in scripts.
    ScriptJson,
    /// `/** @imports txt */ 'PATH'` in scripts.
    ScriptText,
    /// `/** @imports image */ 'PATH'` in scripts (quoted data URI).
    ScriptImage,
    /// `/** @imports image */ 'PATH'` in data files (bare data URI).
    DataImage,
    /// `/** @imports audio */ 'PATH'` in data files (bare data URI).
    DataAudio,
}

impl Adapter {
    /// Pattern whose first capture group is the referenced filename.
    pub fn pattern(self) -> &'static Regex {
        match self {
            Self::HtmlScript => &HTML_SCRIPT,
            Self::HtmlStylesheet => &HTML_STYLESHEET,
            Self::HtmlImports => &HTML_IMPORTS,
            Self::ScriptModule => &SCRIPT_IMPORT,
            Self::ScriptHtml => &HTML_MARKER,
            Self::ScriptCss => &CSS_MARKER,
            Self::ScriptJson => &JSON_MARKER,
            Self::ScriptText => &TXT_MARKER,
            Self::ScriptImage | Self::DataImage => &IMAGE_MARKER,
            Self::DataAudio => &AUDIO_MARKER,
        }
    }

    /// Produce the text spliced in place of the directive.
    pub fn convert(self, content: &Content) -> String {
        match self {
            Self::HtmlScript => format!("<script>\n{}\n</script>", content.as_text()),
            Self::HtmlStylesheet => format!("<style>\n{}\n</style>", content.as_text()),
            Self::HtmlImports => format!("\n{}\n", content.as_text()),
            Self::ScriptModule => strip_exports(&content.as_text()),
            Self::ScriptHtml => format!(
                "(()=>{{\n  const root = document.createElement('div')\n  root.innerHTML = {}\n  \
                 return root.children.length === 1 ?\n    root.children[0] : Array.from(root.children)\n}})()",
                json_string(&content.as_text())
            ),
            Self::ScriptCss => format!(
                "(()=>{{\n  const style = document.createElement('style')\n  style.innerHTML = {}\n  \
                 return style\n}})()",
                json_string(&content.as_text())
            ),
            Self::ScriptJson => content.as_text().into_owned(),
            Self::ScriptText => json_string(&content.as_text()),
            Self::ScriptImage => format!("'data:image/png;base64,{}'", base64(content)),
            Self::DataImage => format!("data:image/png;base64,{}", base64(content)),
            Self::DataAudio => format!("data:audio/mpeg;base64,{}", base64(content)),
        }
    }
}

fn base64(content: &Content) -> String {
    BASE64_STANDARD.encode(content.as_bytes())
}

fn json_string(text: &str) -> String {
    serde_json::Value::String(text.to_owned()).to_string()
}

/// Remove `export` keywords so concatenated modules share one top-level scope.
fn strip_exports(source: &str) -> String {
    let source = LEADING_EXPORT.replace(source, "\n");
    INNER_EXPORT.replace_all(&source, "\n\n").into_owned()
}

/// A located import directive inside a module's raw text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Directive {
    /// Byte offset of the first matched byte.
    pub start: usize,
    /// Byte length of the whole match.
    pub len: usize,
    /// Filename as written in the source.
    pub filename: String,
    /// Adapter that produced the match.
    pub adapter: Adapter,
}

impl Directive {
    /// Byte offset one past the end of the match.
    pub fn end(&self) -> usize {
        self.start + self.len
    }
}

/// Collect directives of every adapter, ordered by position.
///
/// Ties keep adapter registration order. A directive starting inside an
/// earlier one is dropped.
pub fn scan(source: &str, adapters: &[Adapter]) -> Vec<Directive> {
    let mut directives: Vec<Directive> = adapters
        .iter()
        .flat_map(|&adapter| {
            adapter
                .pattern()
                .captures_iter(source)
                .filter_map(move |caps| {
                    let whole = caps.get(0)?;
                    let filename = caps.get(1)?;
                    Some(Directive {
                        start: whole.start(),
                        len: whole.len(),
                        filename: filename.as_str().to_owned(),
                        adapter,
                    })
                })
        })
        .collect();

    directives.sort_by_key(|d| d.start);

    let mut end = 0;
    directives.retain(|d| {
        if d.start < end {
            tracing::debug!(filename = %d.filename, offset = d.start, "Skipping overlapping directive");
            return false;
        }
        end = d.end();
        true
    });

    directives
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn text(s: &str) -> Content {
        Content::Text(s.to_owned())
    }

    #[test]
    fn test_html_script_pattern() {
        let source = r#"<body><script type="module" src="./app.js"></script></body>"#;
        let found = scan(source, &[Adapter::HtmlScript]);

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].filename, "./app.js");
        assert_eq!(found[0].start, 6);
        assert_eq!(
            &source[found[0].start..found[0].end()],
            r#"<script type="module" src="./app.js"></script>"#
        );
    }

    #[test]
    fn test_stylesheet_requires_exact_attributes() {
        let exact = r#"<link rel="stylesheet" type="text/css" href="main.css">"#;
        let reordered = r#"<link href="main.css" rel="stylesheet">"#;

        assert_eq!(scan(exact, &[Adapter::HtmlStylesheet]).len(), 1);
        assert!(scan(reordered, &[Adapter::HtmlStylesheet]).is_empty());
    }

    #[test]
    fn test_imports_tag_only_matches_html() {
        let source = r#"<imports src="nav.html"></imports><imports src="nav.txt"></imports>"#;
        let found = scan(source, &[Adapter::HtmlImports]);

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].filename, "nav.html");
    }

    #[test]
    fn test_marker_patterns() {
        let source = "const a = /** @imports image */ 'a.png'\nconst t = /**  @imports txt  */ 'b.txt'";
        let found = scan(source, &[Adapter::ScriptText, Adapter::ScriptImage]);

        let names: Vec<_> = found.iter().map(|d| d.filename.as_str()).collect();
        assert_eq!(names, vec!["a.png", "b.txt"]);
        assert_eq!(found[0].adapter, Adapter::ScriptImage);
        assert_eq!(found[1].adapter, Adapter::ScriptText);
    }

    #[test]
    fn test_script_import_single_and_multi_line() {
        let source = "import { a } from './a.js'\nconst x = 1\nimport {\n  b,\n  c\n} from './b.js'\n";
        let found = scan(source, &[Adapter::ScriptModule]);

        let names: Vec<_> = found.iter().map(|d| d.filename.as_str()).collect();
        assert_eq!(names, vec!["./a.js", "./b.js"]);
    }

    #[test]
    fn test_scan_sorts_by_position_across_adapters() {
        let source = concat!(
            r#"<link rel="stylesheet" type="text/css" href="z.css">"#,
            r#"<script src="a.js"></script>"#,
            r#"<imports src="m.html"></imports>"#,
        );
        let found = scan(
            source,
            &[Adapter::HtmlScript, Adapter::HtmlImports, Adapter::HtmlStylesheet],
        );

        let names: Vec<_> = found.iter().map(|d| d.filename.as_str()).collect();
        assert_eq!(names, vec!["z.css", "a.js", "m.html"]);
    }

    #[test]
    fn test_scan_drops_overlapping_matches() {
        let source = "import x from '/** @imports txt */ 'y.txt''";
        let found = scan(source, &[Adapter::ScriptModule, Adapter::ScriptText]);

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].adapter, Adapter::ScriptModule);
    }

    #[test]
    fn test_convert_markup_wrappers() {
        assert_eq!(
            Adapter::HtmlScript.convert(&text("run()")),
            "<script>\nrun()\n</script>"
        );
        assert_eq!(
            Adapter::HtmlStylesheet.convert(&text("a{}")),
            "<style>\na{}\n</style>"
        );
        assert_eq!(Adapter::HtmlImports.convert(&text("<p/>")), "\n<p/>\n");
    }

    #[test]
    fn test_convert_data_uris() {
        let png = Content::Binary(vec![0x89]);
        assert_eq!(
            Adapter::ScriptImage.convert(&png),
            "'data:image/png;base64,iQ=='"
        );
        assert_eq!(
            Adapter::DataImage.convert(&png),
            "data:image/png;base64,iQ=="
        );
        assert_eq!(
            Adapter::DataAudio.convert(&Content::Binary(b"ID3".to_vec())),
            "data:audio/mpeg;base64,SUQz"
        );
    }

    #[test]
    fn test_convert_text_and_json() {
        assert_eq!(
            Adapter::ScriptText.convert(&text("say \"hi\"\n")),
            r#""say \"hi\"\n""#
        );
        assert_eq!(Adapter::ScriptJson.convert(&text(r#"{"a":1}"#)), r#"{"a":1}"#);
    }

    #[test]
    fn test_convert_html_and_css_embed_json_strings() {
        let html = Adapter::ScriptHtml.convert(&text("<b>x</b>"));
        assert!(html.contains(r#"root.innerHTML = "<b>x</b>""#));
        assert!(html.starts_with("(()=>{"));
        assert!(html.ends_with("})()"));

        let css = Adapter::ScriptCss.convert(&text("p{color:red}"));
        assert!(css.contains(r#"style.innerHTML = "p{color:red}""#));
    }

    #[test]
    fn test_strip_exports() {
        let source = "export const a = 1\nfunction f() {}\n  export default f\n";
        assert_eq!(
            Adapter::ScriptModule.convert(&text(source)),
            "\nconst a = 1\nfunction f() {}\n\ndefault f\n"
        );
    }
}
