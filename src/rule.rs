//! Typed extraction rules, parsed once at task load time.
//!
//! Rule strings carry a type prefix (`css:`, `xpath:`, `regex:`, `now:`).
//! Parsing happens exactly once when a task definition is loaded; the
//! extraction and field-resolution paths dispatch on the resulting enum
//! rather than re-sniffing string prefixes on every run.

use std::fmt;

/// Prefix marking a field name as sourced from the previous snapshot.
pub const PREVIOUS_MARKER: &str = "old_";

/// Default timestamp pattern for `now:` rules with no explicit pattern.
pub const DEFAULT_TIMESTAMP_PATTERN: &str = "%Y-%m-%d %H:%M";

/// A whole-document extraction rule, applied to fetched page content.
///
/// Parsing never fails: a string without a recognized prefix becomes
/// [`ExtractionRule::Fallback`], which extracts the whole document as
/// normalized text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionRule {
    /// CSS selector with an optional `::text` / `::attr(<name>)` suffix.
    Css {
        /// Selector without the target suffix.
        selector: String,
        /// What each matching node yields.
        target: CssExtract,
    },
    /// XPath expression; may yield strings or elements.
    XPath(String),
    /// Regex with dot-all and multi-line semantics against raw content.
    Regex(String),
    /// Whole document as normalized text.
    Fallback,
}

impl ExtractionRule {
    /// Parse a rule string into a typed rule. Infallible by design.
    pub fn parse(rule: &str) -> Self {
        if let Some(raw) = rule.strip_prefix("css:") {
            let (selector, suffix) = split_css_suffix(raw.trim());
            let target = match suffix {
                CssSuffix::None => CssExtract::Markup,
                CssSuffix::Text => CssExtract::Text,
                CssSuffix::Attr(attr) => CssExtract::Attr(attr),
            };
            Self::Css { selector, target }
        } else if let Some(expr) = rule.strip_prefix("xpath:") {
            Self::XPath(expr.trim().to_owned())
        } else if let Some(pattern) = rule.strip_prefix("regex:") {
            Self::Regex(pattern.trim().to_owned())
        } else {
            tracing::warn!(rule, "unknown rule format, falling back to whole-document text");
            Self::Fallback
        }
    }
}

impl fmt::Display for ExtractionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Css { selector, target } => match target {
                CssExtract::Markup => write!(f, "css:{selector}"),
                CssExtract::Text => write!(f, "css:{selector}::text"),
                CssExtract::Attr(attr) => write!(f, "css:{selector}::attr({attr})"),
            },
            Self::XPath(e) => write!(f, "xpath:{e}"),
            Self::Regex(p) => write!(f, "regex:{p}"),
            Self::Fallback => f.write_str("fallback"),
        }
    }
}

/// What a whole-document CSS rule yields per matching node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CssExtract {
    /// Serialized markup, normalized with links preserved (the default).
    Markup,
    /// Normalized text content.
    Text,
    /// A named attribute's raw value.
    Attr(String),
}

enum CssSuffix {
    None,
    Text,
    Attr(String),
}

/// Split a css rule body into its selector and optional target suffix.
fn split_css_suffix(raw: &str) -> (String, CssSuffix) {
    if let Some(idx) = raw.find("::attr(") {
        let selector = raw[..idx].trim().to_owned();
        let rest = &raw[idx + "::attr(".len()..];
        let attr = rest.trim_end_matches(')').trim().to_owned();
        (selector, CssSuffix::Attr(attr))
    } else if let Some(selector) = raw.strip_suffix("::text") {
        (selector.trim().to_owned(), CssSuffix::Text)
    } else {
        (raw.to_owned(), CssSuffix::None)
    }
}

/// What a CSS field rule extracts from its first matching element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CssTarget {
    /// Element text content, normalized (the default).
    Text,
    /// The raw value of a named attribute, via `::attr(<name>)`.
    Attr(String),
}

/// A per-field extraction rule used by the field resolver.
///
/// Unlike [`ExtractionRule`], an unrecognized prefix is preserved as
/// [`FieldRule::Unknown`] so that resolution can null that field with a
/// warning while sibling fields proceed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldRule {
    /// CSS selector with an optional `::text` / `::attr(<name>)` suffix.
    Css {
        /// Selector without the target suffix.
        selector: String,
        /// What to pull out of the first match.
        target: CssTarget,
    },
    /// XPath expression; first result wins.
    XPath(String),
    /// Reserved form: the current timestamp formatted with a chrono pattern.
    /// Bypasses content lookup entirely.
    Timestamp(String),
    /// Unrecognized rule, kept verbatim for diagnostics.
    Unknown(String),
}

impl FieldRule {
    /// Parse a field rule string into a typed rule. Infallible by design.
    pub fn parse(rule: &str) -> Self {
        if let Some(raw) = rule.strip_prefix("css:") {
            let (selector, suffix) = split_css_suffix(raw.trim());
            let target = match suffix {
                // Per-field resolution yields text by default.
                CssSuffix::None | CssSuffix::Text => CssTarget::Text,
                CssSuffix::Attr(attr) => CssTarget::Attr(attr),
            };
            Self::Css { selector, target }
        } else if let Some(expr) = rule.strip_prefix("xpath:") {
            Self::XPath(expr.trim().to_owned())
        } else if let Some(pattern) = rule.strip_prefix("now:") {
            let pattern = pattern.trim();
            if pattern.is_empty() {
                Self::Timestamp(DEFAULT_TIMESTAMP_PATTERN.to_owned())
            } else {
                Self::Timestamp(pattern.to_owned())
            }
        } else {
            Self::Unknown(rule.to_owned())
        }
    }
}

/// Whether a field name resolves against the previous snapshot.
///
/// Matching is case-insensitive on the marker, so `Old_Version` and
/// `old_version` both read from the previous content.
pub fn is_previous_field(name: &str) -> bool {
    name.to_lowercase().contains(PREVIOUS_MARKER)
}
