//! Field resolution: building the name to value map the formatter consumes.
//!
//! Each field in a task's derived rule set is resolved independently against
//! either the previous or the current snapshot. A failing field becomes
//! `None` and is logged; its siblings are never affected. The returned map
//! may therefore contain nulls and callers must tolerate them.

use std::collections::BTreeMap;

use scraper::{Html, Selector};
use sxd_document::parser as xml_parser;
use sxd_xpath::{Context, Factory, Value};

use crate::extract::{html_to_xml, normalize_text};
use crate::rule::{is_previous_field, CssTarget, FieldRule, DEFAULT_TIMESTAMP_PATTERN};

/// Ordered field name → nullable value map produced per run.
pub type FieldMap = BTreeMap<String, Option<String>>;

/// Resolve a derived rule set against a previous/current snapshot pair.
///
/// Field names containing the previous-state marker (`old_`) read from
/// `previous`; all others read from `current`. Timestamp rules bypass
/// content lookup entirely.
pub fn resolve(rules: &BTreeMap<String, String>, previous: &str, current: &str) -> FieldMap {
    let mut fields = FieldMap::new();
    for (name, rule_str) in rules {
        let value = resolve_field(name, &FieldRule::parse(rule_str), previous, current);
        if value.is_none() {
            tracing::warn!(field = %name, rule = %rule_str, "field resolution yielded no value");
        }
        fields.insert(name.clone(), value);
    }
    let resolved = fields.values().filter(|v| v.is_some()).count();
    tracing::debug!(total = fields.len(), resolved, "field resolution complete");
    fields
}

fn resolve_field(name: &str, rule: &FieldRule, previous: &str, current: &str) -> Option<String> {
    if let FieldRule::Timestamp(pattern) = rule {
        return Some(format_timestamp(pattern));
    }

    let content = if is_previous_field(name) { previous } else { current };
    if content.is_empty() {
        tracing::warn!(field = %name, "source snapshot for field is empty");
        return None;
    }

    match rule {
        FieldRule::Css { selector, target } => resolve_css(selector, target, content),
        FieldRule::XPath(expr) => resolve_xpath(expr, content),
        FieldRule::Unknown(raw) => {
            tracing::warn!(field = %name, rule = %raw, "unknown field rule format");
            None
        }
        FieldRule::Timestamp(_) => unreachable!("timestamp handled above"),
    }
}

fn resolve_css(selector: &str, target: &CssTarget, content: &str) -> Option<String> {
    let parsed = Selector::parse(selector).ok()?;
    let document = Html::parse_document(content);
    let element = document.select(&parsed).next()?;

    match target {
        // Attribute values are returned verbatim; they are data, not markup.
        CssTarget::Attr(attr) => element.value().attr(attr).map(str::to_owned),
        CssTarget::Text => {
            let text: String = element.text().collect::<Vec<_>>().join(" ");
            non_empty(scrub_residual_markup(&text))
        }
    }
}

fn resolve_xpath(expr: &str, content: &str) -> Option<String> {
    let package = xml_parser::parse(content)
        .or_else(|_| xml_parser::parse(&html_to_xml(content)))
        .ok()?;
    let document = package.as_document();
    let xpath = Factory::new().build(expr).ok()??;
    let value = xpath.evaluate(&Context::new(), document.root()).ok()?;

    match value {
        Value::Nodeset(nodeset) => {
            let node = nodeset.document_order_first()?;
            non_empty(scrub_residual_markup(node.string_value().trim()))
        }
        Value::String(s) => non_empty(scrub_residual_markup(s.trim())),
        Value::Number(n) => Some(n.to_string()),
        Value::Boolean(b) => Some(b.to_string()),
    }
}

/// Defensive cleanup against imprecise rules: strip any residual tag-like or
/// entity-like substrings, then collapse whitespace.
fn scrub_residual_markup(text: &str) -> String {
    normalize_text(text)
}

fn format_timestamp(pattern: &str) -> String {
    use chrono::format::{Item, StrftimeItems};
    let items: Vec<Item<'_>> = StrftimeItems::new(pattern).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        tracing::warn!(pattern, "invalid timestamp pattern, using default");
        return chrono::Local::now()
            .format(DEFAULT_TIMESTAMP_PATTERN)
            .to_string();
    }
    chrono::Local::now().format_with_items(items.into_iter()).to_string()
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn css_default_target_extracts_text() {
        let fields = resolve(
            &rules(&[("version", "css:span.version")]),
            "",
            r#"<p>latest: <span class="version">2.4.1</span></p>"#,
        );
        assert_eq!(fields["version"].as_deref(), Some("2.4.1"));
    }

    #[test]
    fn css_attr_target_extracts_raw_attribute() {
        let fields = resolve(
            &rules(&[("link", "css:h1::attr(href)")]),
            "",
            r#"<h1 href="x">t</h1>"#,
        );
        assert_eq!(fields["link"].as_deref(), Some("x"));
    }

    #[test]
    fn css_same_rule_without_attr_extracts_text() {
        let fields = resolve(&rules(&[("title", "css:h1")]), "", r#"<h1 href="x">t</h1>"#);
        assert_eq!(fields["title"].as_deref(), Some("t"));
    }

    #[test]
    fn previous_marker_reads_old_snapshot() {
        let fields = resolve(
            &rules(&[
                ("old_version", "css:.v"),
                ("new_version", "css:.v"),
            ]),
            r#"<span class="v">1.0</span>"#,
            r#"<span class="v">2.0</span>"#,
        );
        assert_eq!(fields["old_version"].as_deref(), Some("1.0"));
        assert_eq!(fields["new_version"].as_deref(), Some("2.0"));
    }

    #[test]
    fn missing_node_nulls_only_that_field() {
        let fields = resolve(
            &rules(&[("present", "css:p"), ("absent", "css:.nope")]),
            "",
            "<p>here</p>",
        );
        assert_eq!(fields["present"].as_deref(), Some("here"));
        assert_eq!(fields["absent"], None);
    }

    #[test]
    fn invalid_selector_nulls_only_that_field() {
        let fields = resolve(
            &rules(&[("bad", "css:[[["), ("good", "css:p")]),
            "",
            "<p>here</p>",
        );
        assert_eq!(fields["bad"], None);
        assert_eq!(fields["good"].as_deref(), Some("here"));
    }

    #[test]
    fn unknown_rule_format_resolves_to_null() {
        let fields = resolve(&rules(&[("x", "jsonpath:$.v")]), "", "<p>here</p>");
        assert_eq!(fields["x"], None);
    }

    #[test]
    fn empty_snapshot_resolves_to_null() {
        let fields = resolve(&rules(&[("old_v", "css:p")]), "", "<p>new</p>");
        assert_eq!(fields["old_v"], None);
    }

    #[test]
    fn empty_match_resolves_to_null() {
        let fields = resolve(&rules(&[("blank", "css:span")]), "", "<span></span><p>x</p>");
        assert_eq!(fields["blank"], None);
    }

    #[test]
    fn xpath_string_result_trimmed() {
        let fields = resolve(
            &rules(&[("href", "xpath://a/@href")]),
            "",
            r#"<html><body><a href="https://example.com/a">x</a></body></html>"#,
        );
        assert_eq!(fields["href"].as_deref(), Some("https://example.com/a"));
    }

    #[test]
    fn xpath_field_resolves_on_sloppy_html() {
        // An unclosed <br> is valid HTML but not XML; resolution re-parses
        // leniently rather than nulling the field.
        let fields = resolve(
            &rules(&[("href", "xpath://a/@href")]),
            "",
            r#"<div>see <a href="/g">guide</a><br></div>"#,
        );
        assert_eq!(fields["href"].as_deref(), Some("/g"));
    }

    #[test]
    fn xpath_element_result_yields_text_content() {
        let fields = resolve(
            &rules(&[("note", "xpath://div")]),
            "",
            "<html><body><div> spaced <b>text</b> </div></body></html>",
        );
        assert_eq!(fields["note"].as_deref(), Some("spaced text"));
    }

    #[test]
    fn timestamp_rule_bypasses_content() {
        let fields = resolve(&rules(&[("checked_at", "now:%Y")]), "", "");
        let year = fields["checked_at"].as_deref().expect("timestamp resolves");
        assert_eq!(year.len(), 4);
        assert!(year.starts_with("20"));
    }

    #[test]
    fn invalid_timestamp_pattern_uses_default() {
        let fields = resolve(&rules(&[("t", "now:%Q%Q")]), "", "");
        let value = fields["t"].as_deref().expect("timestamp resolves");
        // Default pattern is YYYY-MM-DD HH:MM.
        assert_eq!(value.len(), 16);
    }

    #[test]
    fn residual_markup_scrubbed_from_text_values() {
        let fields = resolve(
            &rules(&[("v", "css:div")]),
            "",
            "<div>ver &lt;b&gt;2.0&lt;/b&gt; &amp; stable</div>",
        );
        assert_eq!(fields["v"].as_deref(), Some("ver 2.0 & stable"));
    }

    #[test]
    fn map_is_ordered_and_complete() {
        let fields = resolve(
            &rules(&[("b_field", "css:p"), ("a_field", "css:.gone")]),
            "",
            "<p>x</p>",
        );
        let names: Vec<&str> = fields.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["a_field", "b_field"]);
    }
}
