//! Turns a page's HTML into the bounded digest the planner sees.
//!
//! Extraction is regex-driven and best effort. It never fails: markup it can't
//! make sense of just leaves the corresponding section empty.

use std::collections::HashMap;
use std::fmt::{self, Write as _};
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::Serialize;

use crate::types::{MAIN_CONTENT_MAX_CHARS, MAX_INTERACTIVE_ELEMENTS};

static COMMENT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());
static HIDDEN_BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?is)<(?:script|style|noscript|template)\b[^>]*>.*?</(?:script|style|noscript|template)\s*>",
    )
    .unwrap()
});
static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title\b[^>]*>(.*?)</title\s*>").unwrap());
static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<h([1-6])\b([^>]*)>(.*?)</h[1-6]\s*>").unwrap());
static LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<a\b([^>]*)>(.*?)</a\s*>").unwrap());
static BUTTON_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<button\b([^>]*)>(.*?)</button\s*>").unwrap());
static CONTROL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<(input|textarea|select)\b([^>]*)>").unwrap());
static FORM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<form\b([^>]*)>(.*?)</form\s*>").unwrap());
static ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([A-Za-z_:][-A-Za-z0-9_:.]*)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+)))?"#)
        .unwrap()
});
static TAG_TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<(/?)([A-Za-z][A-Za-z0-9-]*)\b([^>]*?)(/?)>").unwrap()
});
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").unwrap());
static ENTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(?:#([0-9]{1,7})|#[xX]([0-9A-Fa-f]{1,6})|(nbsp|lt|gt|quot|apos|amp));").unwrap()
});
static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static CONTAINER_RES: LazyLock<[Regex; 3]> = LazyLock::new(|| {
    [
        Regex::new(r"(?is)<main\b[^>]*>(.*)</main\s*>").unwrap(),
        Regex::new(r"(?is)<article\b[^>]*>(.*)</article\s*>").unwrap(),
        Regex::new(r"(?is)<body\b[^>]*>(.*)</body\s*>").unwrap(),
    ]
});

const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Heading {
    pub level: u8,
    pub text: String,
    pub selector: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Link,
    Button,
    Input,
    Textarea,
    Select,
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ElementKind::Link => "link",
            ElementKind::Button => "button",
            ElementKind::Input => "input",
            ElementKind::Textarea => "textarea",
            ElementKind::Select => "select",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InteractiveElement {
    pub kind: ElementKind,
    pub text: String,
    pub selector: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormField {
    pub name: String,
    pub field_type: String,
    pub selector: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Form {
    pub selector: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    pub fields: Vec<FormField>,
    /// Selector of the control that submits the form, if one was found.
    pub submit: Option<String>,
}

/// Structured digest of one page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageSnapshot {
    pub url: String,
    pub title: String,
    pub headings: Vec<Heading>,
    /// At most [`MAX_INTERACTIVE_ELEMENTS`] entries, in document order.
    pub interactive_elements: Vec<InteractiveElement>,
    /// How many interactive elements the page had before truncation.
    pub total_interactive: usize,
    pub forms: Vec<Form>,
    pub main_content: String,
}

impl PageSnapshot {
    /// The observation used before anything has been loaded.
    pub fn empty(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: String::new(),
            headings: Vec::new(),
            interactive_elements: Vec::new(),
            total_interactive: 0,
            forms: Vec::new(),
            main_content: String::new(),
        }
    }

    /// Renders the text block that goes into the planner prompt. Section
    /// headers are always present so the model sees the same layout each turn.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "URL: {}", self.url);
        let _ = writeln!(out, "Title: {}", self.title);

        out.push_str("Headings:\n");
        if self.headings.is_empty() {
            out.push_str("  (none)\n");
        }
        for h in &self.headings {
            let _ = writeln!(out, "  h{} \"{}\" ({})", h.level, h.text, h.selector);
        }

        if self.total_interactive > self.interactive_elements.len() {
            let _ = writeln!(
                out,
                "Interactive Elements (first {} of {}):",
                self.interactive_elements.len(),
                self.total_interactive
            );
        } else {
            out.push_str("Interactive Elements:\n");
        }
        if self.interactive_elements.is_empty() {
            out.push_str("  (none)\n");
        }
        for el in &self.interactive_elements {
            let _ = write!(out, "  [{}] \"{}\"", el.kind, el.text);
            if let Some(t) = &el.input_type {
                let _ = write!(out, " type={t}");
            }
            if let Some(href) = &el.href {
                let _ = write!(out, " href={href}");
            }
            let _ = writeln!(out, " selector={}", el.selector);
        }

        out.push_str("Forms:\n");
        if self.forms.is_empty() {
            out.push_str("  (none)\n");
        }
        for form in &self.forms {
            let _ = write!(out, "  form {}", form.selector);
            if let Some(action) = &form.action {
                let _ = write!(out, " action={action}");
            }
            out.push('\n');
            for field in &form.fields {
                let _ = writeln!(
                    out,
                    "    - {} ({}) selector={}",
                    field.name, field.field_type, field.selector
                );
            }
            match &form.submit {
                Some(s) => {
                    let _ = writeln!(out, "    submit: {s}");
                }
                None => out.push_str("    submit: (none)\n"),
            }
        }

        out.push_str("Main Content:\n");
        if self.main_content.is_empty() {
            out.push_str("  (none)\n");
        } else {
            let _ = writeln!(out, "  {}", self.main_content);
        }
        out
    }
}

/// Extracts a [`PageSnapshot`] from raw HTML. Same input, same output.
pub fn extract_page_state(html: &str, url: &str) -> PageSnapshot {
    let without_comments = COMMENT_RE.replace_all(html, "");
    let cleaned = HIDDEN_BLOCK_RE.replace_all(&without_comments, "");
    let doc: &str = &cleaned;

    let title = TITLE_RE
        .captures(doc)
        .map(|c| text_of(&c[1]))
        .unwrap_or_default();
    let paths = DomPaths::build(doc);

    let headings = HEADING_RE
        .captures_iter(doc)
        .map(|c| {
            let pos = c.get(0).map_or(0, |m| m.start());
            let tag = format!("h{}", &c[1]);
            let attrs = parse_attrs(&c[2]);
            Heading {
                level: c[1].parse().unwrap_or(1),
                text: text_of(&c[3]),
                selector: selector_for(&tag, &attrs, pos, &paths),
            }
        })
        .collect();

    let mut found: Vec<(usize, InteractiveElement)> = Vec::new();
    for c in LINK_RE.captures_iter(doc) {
        let pos = c.get(0).map_or(0, |m| m.start());
        let attrs = parse_attrs(&c[1]);
        let href = attrs.get("href").cloned();
        let text = non_empty(text_of(&c[2]))
            .or_else(|| attrs.get("aria-label").cloned())
            .or_else(|| attrs.get("title").cloned())
            .or_else(|| href.clone())
            .unwrap_or_default();
        found.push((
            pos,
            InteractiveElement {
                kind: ElementKind::Link,
                text,
                selector: selector_for("a", &attrs, pos, &paths),
                input_type: None,
                href,
            },
        ));
    }
    for c in BUTTON_RE.captures_iter(doc) {
        let pos = c.get(0).map_or(0, |m| m.start());
        let attrs = parse_attrs(&c[1]);
        let text = non_empty(text_of(&c[2]))
            .or_else(|| attrs.get("aria-label").cloned())
            .or_else(|| attrs.get("value").cloned())
            .unwrap_or_default();
        found.push((
            pos,
            InteractiveElement {
                kind: ElementKind::Button,
                text,
                selector: selector_for("button", &attrs, pos, &paths),
                input_type: attrs.get("type").cloned(),
                href: None,
            },
        ));
    }
    for control in controls(doc, &paths) {
        if control.input_type == "hidden" {
            continue;
        }
        let kind = match control.tag.as_str() {
            "textarea" => ElementKind::Textarea,
            "select" => ElementKind::Select,
            _ => ElementKind::Input,
        };
        found.push((
            control.pos,
            InteractiveElement {
                kind,
                text: control.label,
                selector: control.selector,
                input_type: (kind == ElementKind::Input).then_some(control.input_type),
                href: None,
            },
        ));
    }
    found.sort_by_key(|(pos, _)| *pos);
    let total_interactive = found.len();
    let interactive_elements = found
        .into_iter()
        .take(MAX_INTERACTIVE_ELEMENTS)
        .map(|(_, el)| el)
        .collect();

    let forms = extract_forms(doc, &paths);

    let container = CONTAINER_RES
        .iter()
        .find_map(|re| re.captures(doc).and_then(|c| c.get(1)))
        .map_or(doc, |m| m.as_str());
    let main_content = truncate_chars(&text_of(container), MAIN_CONTENT_MAX_CHARS);

    PageSnapshot {
        url: url.to_string(),
        title,
        headings,
        interactive_elements,
        total_interactive,
        forms,
        main_content,
    }
}

struct Control {
    pos: usize,
    tag: String,
    input_type: String,
    name: Option<String>,
    label: String,
    selector: String,
}

fn controls(doc: &str, paths: &DomPaths) -> Vec<Control> {
    CONTROL_RE
        .captures_iter(doc)
        .map(|c| {
            let pos = c.get(0).map_or(0, |m| m.start());
            let tag = c[1].to_ascii_lowercase();
            let attrs = parse_attrs(&c[2]);
            let input_type = if tag == "input" {
                attrs
                    .get("type")
                    .map(|t| t.to_ascii_lowercase())
                    .unwrap_or_else(|| "text".to_string())
            } else {
                tag.clone()
            };
            let label = ["placeholder", "aria-label", "value", "name"]
                .iter()
                .find_map(|key| attrs.get(*key).filter(|v| !v.is_empty()).cloned())
                .unwrap_or_default();
            Control {
                pos,
                selector: selector_for(&tag, &attrs, pos, paths),
                name: attrs.get("name").cloned(),
                tag,
                input_type,
                label,
            }
        })
        .collect()
}

fn extract_forms(doc: &str, paths: &DomPaths) -> Vec<Form> {
    let all_controls = controls(doc, paths);
    let buttons: Vec<(usize, String, String)> = BUTTON_RE
        .captures_iter(doc)
        .map(|c| {
            let pos = c.get(0).map_or(0, |m| m.start());
            let attrs = parse_attrs(&c[1]);
            let kind = attrs
                .get("type")
                .map(|t| t.to_ascii_lowercase())
                .unwrap_or_else(|| "submit".to_string());
            (pos, kind, selector_for("button", &attrs, pos, paths))
        })
        .collect();

    FORM_RE
        .captures_iter(doc)
        .filter_map(|c| {
            let whole = c.get(0)?;
            let range = whole.start()..whole.end();
            let attrs = parse_attrs(&c[1]);

            let fields = all_controls
                .iter()
                .filter(|ctl| range.contains(&ctl.pos))
                .filter(|ctl| {
                    !matches!(
                        ctl.input_type.as_str(),
                        "hidden" | "submit" | "button" | "reset" | "image"
                    )
                })
                .map(|ctl| FormField {
                    name: ctl.name.clone().unwrap_or_else(|| ctl.label.clone()),
                    field_type: ctl.input_type.clone(),
                    selector: ctl.selector.clone(),
                })
                .collect();

            let submit_button = buttons
                .iter()
                .find(|(pos, kind, _)| range.contains(pos) && kind == "submit")
                .map(|(pos, _, sel)| (*pos, sel.clone()));
            let submit_input = all_controls
                .iter()
                .find(|ctl| {
                    range.contains(&ctl.pos) && matches!(ctl.input_type.as_str(), "submit" | "image")
                })
                .map(|ctl| (ctl.pos, ctl.selector.clone()));
            let submit = match (submit_button, submit_input) {
                (Some(b), Some(i)) => Some(if b.0 < i.0 { b.1 } else { i.1 }),
                (b, i) => b.or(i).map(|(_, sel)| sel),
            };

            Some(Form {
                selector: selector_for("form", &attrs, whole.start(), paths),
                action: attrs.get("action").cloned(),
                fields,
                submit,
            })
        })
        .collect()
}

/// CSS paths for every opening tag, keyed by the byte offset of its `<`.
///
/// Paths are built from a tag-balancing walk, so they follow the real
/// nesting for well-formed markup. An ancestor with an id anchors the path.
struct DomPaths {
    paths: HashMap<usize, String>,
}

struct Frame {
    tag: String,
    segment: String,
    counts: HashMap<String, usize>,
}

impl DomPaths {
    fn build(doc: &str) -> Self {
        let mut paths = HashMap::new();
        let mut stack = vec![Frame {
            tag: String::new(),
            segment: String::new(),
            counts: HashMap::new(),
        }];

        for c in TAG_TOKEN_RE.captures_iter(doc) {
            let Some(whole) = c.get(0) else { continue };
            let tag = c[2].to_ascii_lowercase();

            if &c[1] == "/" {
                if let Some(i) = stack.iter().rposition(|f| f.tag == tag) {
                    if i > 0 {
                        stack.truncate(i);
                    }
                }
                continue;
            }

            let Some(parent) = stack.last_mut() else { break };
            let nth = parent.counts.entry(tag.clone()).or_insert(0);
            *nth += 1;
            let nth = *nth;

            let attrs = parse_attrs(&c[3]);
            let segment = match attrs.get("id").and_then(|id| css_id(id)) {
                Some(id) => id,
                None if matches!(tag.as_str(), "html" | "head" | "body") => tag.clone(),
                None => format!("{tag}:nth-of-type({nth})"),
            };

            let anchor = stack
                .iter()
                .rposition(|f| f.segment.starts_with('#'))
                .unwrap_or(1);
            let mut parts: Vec<&str> = stack
                .iter()
                .skip(anchor)
                .map(|f| f.segment.as_str())
                .filter(|s| !s.is_empty())
                .collect();
            if segment.starts_with('#') {
                parts.clear();
            }
            parts.push(&segment);
            paths.insert(whole.start(), parts.join(" > "));

            let self_closing = &c[4] == "/";
            if !self_closing && !VOID_TAGS.contains(&tag.as_str()) {
                stack.push(Frame {
                    tag,
                    segment,
                    counts: HashMap::new(),
                });
            }
        }

        Self { paths }
    }

    fn get(&self, pos: usize) -> Option<&str> {
        self.paths.get(&pos).map(String::as_str)
    }
}

fn selector_for(tag: &str, attrs: &HashMap<String, String>, pos: usize, paths: &DomPaths) -> String {
    if let Some(id) = attrs.get("id").and_then(|id| css_id(id)) {
        return id;
    }
    if matches!(tag, "input" | "textarea" | "select" | "button") {
        if let Some(name) = attrs.get("name").filter(|n| !n.is_empty()) {
            return format!("{tag}[name=\"{}\"]", name.replace('"', "\\\""));
        }
    }
    paths
        .get(pos)
        .map(str::to_string)
        .unwrap_or_else(|| tag.to_string())
}

fn css_id(id: &str) -> Option<String> {
    let mut chars = id.chars();
    let first = chars.next()?;
    let valid = (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    valid.then(|| format!("#{id}"))
}

fn parse_attrs(raw: &str) -> HashMap<String, String> {
    let mut attrs = HashMap::new();
    for c in ATTR_RE.captures_iter(raw) {
        let value = c
            .get(2)
            .or_else(|| c.get(3))
            .or_else(|| c.get(4))
            .map(|m| decode_entities(m.as_str()))
            .unwrap_or_default();
        attrs.entry(c[1].to_ascii_lowercase()).or_insert(value);
    }
    attrs
}

/// Visible text of an HTML fragment: tags dropped, entities decoded,
/// whitespace collapsed.
fn text_of(fragment: &str) -> String {
    let stripped = TAG_RE.replace_all(fragment, " ");
    let decoded = decode_entities(&stripped);
    WHITESPACE_RE.replace_all(&decoded, " ").trim().to_string()
}

fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    ENTITY_RE
        .replace_all(s, |c: &Captures| {
            let decoded = match (c.get(1), c.get(2), c.get(3)) {
                (Some(dec), _, _) => dec.as_str().parse().ok().and_then(char::from_u32),
                (None, Some(hex), _) => u32::from_str_radix(hex.as_str(), 16)
                    .ok()
                    .and_then(char::from_u32),
                (None, None, Some(name)) => match name.as_str() {
                    "nbsp" => Some(' '),
                    "lt" => Some('<'),
                    "gt" => Some('>'),
                    "quot" => Some('"'),
                    "apos" => Some('\''),
                    "amp" => Some('&'),
                    _ => None,
                },
                _ => None,
            };
            decoded.map(String::from).unwrap_or_default()
        })
        .into_owned()
}

fn non_empty(s: String) -> Option<String> {
    (!s.is_empty()).then_some(s)
}

fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &s[..cut]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<!DOCTYPE html>
<html><head><title>Example &amp; Co</title>
<script>var x = "<a href='nope'>hidden</a>";</script></head>
<body>
<h1 id="top">Example Domain</h1>
<div><h2>Details</h2><p>Some <b>bold</b> text.</p></div>
<!-- <button>ghost</button> -->
<a href="https://www.iana.org/domains/example">More information...</a>
<form id="search" action="/search" method="get">
  <input type="text" name="q" placeholder="Search">
  <input type="hidden" name="token" value="abc">
  <button type="submit">Go</button>
</form>
</body></html>"#;

    #[test]
    fn extracts_title_and_headings() {
        let snap = extract_page_state(PAGE, "https://example.com");
        assert_eq!(snap.url, "https://example.com");
        assert_eq!(snap.title, "Example & Co");
        assert_eq!(snap.headings.len(), 2);
        assert_eq!(snap.headings[0].level, 1);
        assert_eq!(snap.headings[0].text, "Example Domain");
        assert_eq!(snap.headings[0].selector, "#top");
        assert_eq!(snap.headings[1].level, 2);
        assert_eq!(
            snap.headings[1].selector,
            "html > body > div:nth-of-type(1) > h2:nth-of-type(1)"
        );
    }

    #[test]
    fn interactive_elements_follow_document_order() {
        let snap = extract_page_state(PAGE, "https://example.com");
        let kinds: Vec<ElementKind> = snap.interactive_elements.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![ElementKind::Link, ElementKind::Input, ElementKind::Button]
        );

        let link = &snap.interactive_elements[0];
        assert_eq!(link.text, "More information...");
        assert_eq!(
            link.href.as_deref(),
            Some("https://www.iana.org/domains/example")
        );
        assert_eq!(link.selector, "html > body > a:nth-of-type(1)");

        let input = &snap.interactive_elements[1];
        assert_eq!(input.selector, "input[name=\"q\"]");
        assert_eq!(input.text, "Search");
        assert_eq!(input.input_type.as_deref(), Some("text"));

        assert_eq!(
            snap.interactive_elements[2].selector,
            "#search > button:nth-of-type(1)"
        );
    }

    #[test]
    fn forms_list_fields_and_submit() {
        let snap = extract_page_state(PAGE, "https://example.com");
        assert_eq!(snap.forms.len(), 1);
        let form = &snap.forms[0];
        assert_eq!(form.selector, "#search");
        assert_eq!(form.action.as_deref(), Some("/search"));
        assert_eq!(form.fields.len(), 1);
        assert_eq!(form.fields[0].name, "q");
        assert_eq!(form.fields[0].field_type, "text");
        assert_eq!(
            form.submit.as_deref(),
            Some("#search > button:nth-of-type(1)")
        );
    }

    #[test]
    fn main_content_skips_scripts_and_comments() {
        let snap = extract_page_state(PAGE, "https://example.com");
        assert!(snap.main_content.contains("Some bold text."));
        assert!(!snap.main_content.contains("hidden"));
        assert!(!snap.main_content.contains("ghost"));
    }

    #[test]
    fn title_ignores_commented_and_scripted_markup() {
        let html = "<html><head><!-- <title>Old</title> -->\
            <script>document.write('<title>Injected</title>')</script>\
            <title>A real title</title></head><body></body></html>";
        let snap = extract_page_state(html, "https://example.com");
        assert_eq!(snap.title, "A real title");
    }

    #[test]
    fn entities_are_decoded_once() {
        assert_eq!(decode_entities("&#38;lt;"), "&lt;");
        assert_eq!(decode_entities("&amp;#60;"), "&#60;");
        assert_eq!(decode_entities("a&nbsp;&lt;b&gt; &#x41;&#66;"), "a <b> AB");
        assert_eq!(decode_entities("fish &chips"), "fish &chips");
    }

    #[test]
    fn truncates_interactive_elements_and_content() {
        let mut html = String::from("<body><main>");
        for i in 0..40 {
            html.push_str(&format!("<a href=\"/p{i}\">link {i}</a>"));
        }
        html.push_str(&"word ".repeat(500));
        html.push_str("</main></body>");

        let snap = extract_page_state(&html, "https://example.com");
        assert_eq!(snap.interactive_elements.len(), MAX_INTERACTIVE_ELEMENTS);
        assert_eq!(snap.total_interactive, 40);
        assert_eq!(snap.interactive_elements[0].text, "link 0");
        assert!(snap.main_content.chars().count() <= MAIN_CONTENT_MAX_CHARS + 3);
        assert!(snap.main_content.ends_with("..."));
        assert!(
            snap.render()
                .contains("Interactive Elements (first 15 of 40):")
        );
    }

    #[test]
    fn garbage_input_yields_empty_sections() {
        let snap = extract_page_state("<<<>>> <div <a href= </", "about:blank");
        assert!(snap.headings.is_empty());
        assert!(snap.forms.is_empty());
        assert_eq!(snap.title, "");

        let snap = extract_page_state("", "about:blank");
        assert_eq!(snap, PageSnapshot::empty("about:blank"));
    }

    #[test]
    fn extraction_is_deterministic() {
        let a = extract_page_state(PAGE, "https://example.com").render();
        let b = extract_page_state(PAGE, "https://example.com").render();
        assert_eq!(a, b);
    }

    #[test]
    fn render_has_every_section_header() {
        let text = PageSnapshot::empty("about:blank").render();
        for header in [
            "URL: about:blank",
            "Title:",
            "Headings:",
            "Interactive Elements:",
            "Forms:",
            "Main Content:",
        ] {
            assert!(text.contains(header), "missing {header}");
        }
    }
}
