//! Rule-based content extraction from fetched markup.
//!
//! [`extract`] pulls a fragment out of raw page content according to a
//! typed [`ExtractionRule`]. Extraction is a pure function and never fails:
//! malformed selectors, expressions, or markup all degrade to the whole
//! document as normalized text, so a bad rule can never abort a run.

use std::sync::OnceLock;

use regex::{Regex, RegexBuilder};
use scraper::{Html, Selector};
use sxd_document::dom::{ChildOfElement, Element};
use sxd_document::parser as xml_parser;
use sxd_xpath::nodeset::Node;
use sxd_xpath::{Context, Factory, Value};

use crate::rule::{CssExtract, ExtractionRule};

/// Extract content from raw markup according to a typed rule.
///
/// - `Css`: every matching node is serialized back to markup and normalized
///   with link tags preserved, then newline-joined. A `::text` suffix yields
///   normalized text instead; `::attr(<name>)` yields the raw attribute
///   value of each match.
/// - `XPath`: string results (attribute/text nodes) are normalized directly;
///   element results are re-serialized to markup first. Input that is not
///   well-formed XML is re-parsed leniently as HTML before evaluation.
/// - `Regex`: dot-all, multi-line match against the raw content; the first
///   capture group per match (or the full match when the pattern has no
///   groups), normalized and newline-joined.
/// - `Fallback`: the whole document as normalized text.
///
/// Always returns *some* string; failures degrade to the fallback text.
pub fn extract(raw: &str, rule: &ExtractionRule) -> String {
    match rule {
        ExtractionRule::Css { selector, target } => extract_css(raw, selector, target),
        ExtractionRule::XPath(expr) => extract_xpath(raw, expr),
        ExtractionRule::Regex(pattern) => extract_regex(raw, pattern),
        ExtractionRule::Fallback => whole_document_text(raw),
    }
}

/// Normalize text: decode HTML entities, strip all tags, collapse whitespace.
pub fn normalize_text(text: &str) -> String {
    let decoded = html_escape::decode_html_entities(text);
    let stripped = tag_re().replace_all(&decoded, "");
    collapse_whitespace(&stripped)
}

/// Normalize text while keeping `<a>` tags so links survive extraction.
pub fn normalize_preserve_links(text: &str) -> String {
    let decoded = html_escape::decode_html_entities(text);
    let stripped = tag_re().replace_all(&decoded, |caps: &regex::Captures<'_>| {
        let tag = &caps[0];
        if is_link_tag(tag) {
            tag.to_owned()
        } else {
            String::new()
        }
    });
    collapse_whitespace(&stripped)
}

fn extract_css(raw: &str, selector: &str, target: &CssExtract) -> String {
    let Ok(selector) = Selector::parse(selector) else {
        tracing::warn!(selector, "invalid CSS selector, falling back to whole-document text");
        return whole_document_text(raw);
    };
    let document = Html::parse_document(raw);
    let parts: Vec<String> = document
        .select(&selector)
        .filter_map(|el| match target {
            CssExtract::Markup => Some(normalize_preserve_links(&el.html())),
            CssExtract::Text => Some(normalize_text(&el.html())),
            // Attribute values are data, not markup, and pass through raw.
            CssExtract::Attr(attr) => el.value().attr(attr).map(str::to_owned),
        })
        .collect();
    parts.join("\n")
}

fn extract_xpath(raw: &str, expr: &str) -> String {
    // Real-world pages are rarely well-formed XML; route them through a
    // lenient HTML parse and re-serialize before giving up.
    let package = match xml_parser::parse(raw).or_else(|_| xml_parser::parse(&html_to_xml(raw))) {
        Ok(package) => package,
        Err(err) => {
            tracing::warn!(error = %err, "content could not be re-serialized as markup, falling back to normalized text");
            return normalize_text(raw);
        }
    };
    let document = package.as_document();

    let xpath = match Factory::new().build(expr) {
        Ok(Some(xpath)) => xpath,
        Ok(None) | Err(_) => {
            tracing::warn!(expr, "invalid XPath expression, falling back to whole-document text");
            return whole_document_text(raw);
        }
    };

    let context = Context::new();
    let value = match xpath.evaluate(&context, document.root()) {
        Ok(value) => value,
        Err(err) => {
            tracing::warn!(expr, error = %err, "XPath evaluation failed, falling back to whole-document text");
            return whole_document_text(raw);
        }
    };

    match value {
        Value::Nodeset(nodeset) => {
            let parts: Vec<String> = nodeset
                .document_order()
                .into_iter()
                .map(|node| match node {
                    Node::Element(el) => {
                        let markup = serialize_element(el);
                        if markup.contains("<a ") {
                            normalize_preserve_links(&markup)
                        } else {
                            normalize_text(&markup)
                        }
                    }
                    other => normalize_text(&other.string_value()),
                })
                .collect();
            parts.join("\n")
        }
        Value::String(s) => normalize_text(&s),
        Value::Number(n) => n.to_string(),
        Value::Boolean(b) => b.to_string(),
    }
}

fn extract_regex(raw: &str, pattern: &str) -> String {
    let re = match RegexBuilder::new(pattern)
        .dot_matches_new_line(true)
        .multi_line(true)
        .build()
    {
        Ok(re) => re,
        Err(err) => {
            tracing::warn!(pattern, error = %err, "invalid regex rule, falling back to normalized text");
            return normalize_text(raw);
        }
    };

    let parts: Vec<String> = re
        .captures_iter(raw)
        .filter_map(|caps| {
            caps.get(1)
                .or_else(|| caps.get(0))
                .map(|m| normalize_text(m.as_str()))
        })
        .collect();
    parts.join("\n")
}

/// The whole document as normalized text.
fn whole_document_text(raw: &str) -> String {
    let document = Html::parse_document(raw);
    let text: String = document.root_element().text().collect::<Vec<_>>().join(" ");
    if text.trim().is_empty() {
        normalize_text(raw)
    } else {
        normalize_text(&text)
    }
}

/// Re-serialize arbitrary markup into well-formed XML via a lenient HTML
/// parse, so XPath rules stay usable on non-XHTML pages. Void elements
/// self-close, text and attribute values are re-escaped, comments are
/// dropped.
pub(crate) fn html_to_xml(raw: &str) -> String {
    let document = Html::parse_document(raw);
    let mut out = String::new();
    write_xml_element(&mut out, document.root_element());
    out
}

fn write_xml_element(out: &mut String, el: scraper::ElementRef<'_>) {
    let name = el.value().name();
    out.push('<');
    out.push_str(name);
    for (attr, value) in el.value().attrs() {
        out.push(' ');
        out.push_str(attr);
        out.push_str("=\"");
        out.push_str(&html_escape::encode_double_quoted_attribute(value));
        out.push('"');
    }
    if el.children().next().is_none() {
        out.push_str("/>");
        return;
    }
    out.push('>');
    for child in el.children() {
        if let Some(child_el) = scraper::ElementRef::wrap(child) {
            write_xml_element(out, child_el);
        } else if let scraper::Node::Text(text) = child.value() {
            out.push_str(&html_escape::encode_text(&*text.text));
        }
    }
    out.push_str("</");
    out.push_str(name);
    out.push('>');
}

/// Serialize an element subtree back to markup. Comments and processing
/// instructions are dropped; element structure, attributes, and text survive.
fn serialize_element(el: Element<'_>) -> String {
    let mut out = String::new();
    write_element(&mut out, el);
    out
}

fn write_element(out: &mut String, el: Element<'_>) {
    let name = el.name().local_part().to_owned();
    out.push('<');
    out.push_str(&name);
    for attr in el.attributes() {
        out.push(' ');
        out.push_str(attr.name().local_part());
        out.push_str("=\"");
        out.push_str(attr.value());
        out.push('"');
    }
    out.push('>');
    for child in el.children() {
        match child {
            ChildOfElement::Element(e) => write_element(out, e),
            ChildOfElement::Text(t) => out.push_str(t.text()),
            _ => {}
        }
    }
    out.push_str("</");
    out.push_str(&name);
    out.push('>');
}

/// Whether a raw `<...>` token is an anchor tag. The element name must be
/// exactly `a`, so `<abbr>`, `<article>`, and their closing tags are
/// stripped like any other markup.
fn is_link_tag(tag: &str) -> bool {
    let lower = tag.to_lowercase();
    let after_name = lower
        .strip_prefix("</")
        .or_else(|| lower.strip_prefix('<'))
        .and_then(|rest| rest.strip_prefix('a'));
    match after_name.and_then(|rest| rest.chars().next()) {
        Some('>') | Some('/') => true,
        Some(c) => c.is_whitespace(),
        None => false,
    }
}

fn tag_re() -> &'static Regex {
    static TAG_RE: OnceLock<Regex> = OnceLock::new();
    TAG_RE.get_or_init(|| Regex::new("<[^>]+>").expect("static regex is valid"))
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_decodes_entities_and_strips_tags() {
        assert_eq!(
            normalize_text("<p>Tom &amp; Jerry</p>\n\n  <b>again</b>"),
            "Tom & Jerry again"
        );
    }

    #[test]
    fn normalize_preserves_link_tags() {
        let normalized =
            normalize_preserve_links("<div><a href=\"/x\">docs</a> and <b>bold</b></div>");
        assert_eq!(normalized, "<a href=\"/x\">docs</a> and bold");
    }

    #[test]
    fn elements_named_like_anchors_are_stripped() {
        assert_eq!(
            normalize_preserve_links("<article>release notes</article>"),
            "release notes"
        );
        assert_eq!(
            normalize_preserve_links("<aside><address>somewhere</address></aside>"),
            "somewhere"
        );
        let out = normalize_preserve_links(
            r#"<abbr title="HyperText Markup Language">HTML</abbr> guide <a href="/g">here</a>"#,
        );
        assert_eq!(out, r#"HTML guide <a href="/g">here</a>"#);
    }

    #[test]
    fn css_rule_drops_abbr_but_keeps_links() {
        let html = r#"<div class="item"><abbr title="x">HTML</abbr> guide <a href="/g">here</a></div>"#;
        let out = extract(html, &ExtractionRule::parse("css:div.item"));
        assert_eq!(out, r#"HTML guide <a href="/g">here</a>"#);
    }

    #[test]
    fn css_rule_joins_all_matches() {
        let html = "<ul><li>first</li><li>second</li></ul>";
        let out = extract(html, &ExtractionRule::parse("css:li"));
        assert_eq!(out, "first\nsecond");
    }

    #[test]
    fn css_rule_keeps_nested_links() {
        let html = "<div class=\"item\"><span>see</span> <a href=\"/dl\">download</a></div>";
        let out = extract(html, &ExtractionRule::parse("css:div.item"));
        assert!(out.contains("<a href=\"/dl\">download</a>"), "got: {out}");
    }

    #[test]
    fn css_attr_suffix_extracts_raw_attribute() {
        let html = r#"<h1 href="x">t</h1>"#;
        assert_eq!(extract(html, &ExtractionRule::parse("css:h1::attr(href)")), "x");
        assert_eq!(extract(html, &ExtractionRule::parse("css:h1")), "t");
    }

    #[test]
    fn css_text_suffix_strips_all_markup() {
        let html = r#"<div class="item">see <a href="/dl">download</a></div>"#;
        let out = extract(html, &ExtractionRule::parse("css:div.item::text"));
        assert_eq!(out, "see download");
    }

    #[test]
    fn css_rule_no_match_yields_empty_string() {
        let out = extract("<p>hello</p>", &ExtractionRule::parse("css:.missing"));
        assert_eq!(out, "");
    }

    #[test]
    fn invalid_css_selector_degrades_to_document_text() {
        let out = extract("<p>hello</p>", &ExtractionRule::parse("css:[[["));
        assert_eq!(out, "hello");
    }

    #[test]
    fn regex_rule_returns_first_capture_group() {
        let out = extract(
            "Version V1.2 released",
            &ExtractionRule::parse(r"regex:V(\d+\.\d+)"),
        );
        assert_eq!(out, "1.2");
    }

    #[test]
    fn regex_rule_without_group_returns_full_match() {
        let out = extract("build 42 and build 43", &ExtractionRule::parse(r"regex:build \d+"));
        assert_eq!(out, "build 42\nbuild 43");
    }

    #[test]
    fn regex_matches_across_lines() {
        let out = extract(
            "start\nalpha\nend",
            &ExtractionRule::parse("regex:start(.*)end"),
        );
        assert_eq!(out, "alpha");
    }

    #[test]
    fn invalid_regex_degrades_to_normalized_text() {
        let out = extract("<p>hello</p>", &ExtractionRule::parse("regex:("));
        assert_eq!(out, "hello");
    }

    #[test]
    fn fallback_rule_returns_whole_document_text() {
        let html = "<html><body><h1>Title</h1><p>Body text</p></body></html>";
        let out = extract(html, &ExtractionRule::Fallback);
        assert_eq!(out, "Title Body text");
    }

    #[test]
    fn xpath_rule_extracts_attribute_strings() {
        let html = r#"<html><body><a href="https://example.com/dl">get</a></body></html>"#;
        let out = extract(html, &ExtractionRule::parse("xpath://a/@href"));
        assert_eq!(out, "https://example.com/dl");
    }

    #[test]
    fn xpath_rule_serializes_elements() {
        let html = "<html><body><div><p>one</p><p>two</p></div></body></html>";
        let out = extract(html, &ExtractionRule::parse("xpath://p"));
        assert_eq!(out, "one\ntwo");
    }

    #[test]
    fn xpath_element_with_link_keeps_markup() {
        let html = r#"<html><body><li>see <a href="/g">guide</a></li></body></html>"#;
        let out = extract(html, &ExtractionRule::parse("xpath://li"));
        assert!(out.contains("<a href=\"/g\">guide</a>"), "got: {out}");
    }

    #[test]
    fn xpath_recovers_unclosed_tags() {
        let out = extract("<p>broken <b>page", &ExtractionRule::parse("xpath://p"));
        assert_eq!(out, "broken page");
    }

    #[test]
    fn xpath_works_on_sloppy_html() {
        // Implicitly closed <li> elements are valid HTML but not XML.
        let out = extract("<ul><li>one<li>two</ul>", &ExtractionRule::parse("xpath://li"));
        assert_eq!(out, "one\ntwo");
    }

    #[test]
    fn xpath_attribute_on_sloppy_html() {
        let html = r#"<div>get it <a href="/dl">here</a><br></div>"#;
        let out = extract(html, &ExtractionRule::parse("xpath://a/@href"));
        assert_eq!(out, "/dl");
    }

    #[test]
    fn extraction_never_panics_on_empty_input() {
        for rule in ["css:div", "xpath://div", r"regex:(\d+)", "anything"] {
            let out = extract("", &ExtractionRule::parse(rule));
            assert!(out.is_empty(), "rule {rule} produced {out:?}");
        }
    }
}
