//! Static validation scans for formatter source.
//!
//! These checks are textual and deliberately language-agnostic: they run
//! before compilation, so even source that would not parse is rejected the
//! same way. Two scans exist: a capability denylist and a heuristic for
//! hard-coded snapshot data.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::{MonitorError, Result};

/// Identifiers that indicate a capability the sandbox denies: filesystem,
/// process or network access, reflection, and dynamic code loading.
/// Matched on word boundaries anywhere in the source.
const DENIED_CAPABILITIES: &[&str] = &[
    "import",
    "eval",
    "exec",
    "system",
    "spawn",
    "shell",
    "socket",
    "connect",
    "listen",
    "read_file",
    "write_file",
    "open_file",
    "remove_file",
    "getenv",
    "set_env",
    "reflect",
];

/// Tunable thresholds for the hardcoded-literal heuristic.
///
/// The heuristic is pattern-based and necessarily imprecise; deployments
/// that legitimately embed version-like or URL-like literals can relax the
/// flags instead of patching the scan.
#[derive(Debug, Clone)]
pub struct HeuristicPolicy {
    /// Reject bare string-literal assignments that look like version numbers.
    pub flag_version_literals: bool,
    /// Reject bare string-literal assignments of absolute URLs.
    pub flag_url_literals: bool,
    /// Minimum dot-separated numeric components for a literal to count as a
    /// version number (`2` means `1.2` qualifies, `42` does not).
    pub min_version_components: usize,
}

impl Default for HeuristicPolicy {
    fn default() -> Self {
        Self {
            flag_version_literals: true,
            flag_url_literals: true,
            min_version_components: 2,
        }
    }
}

/// Reject source referencing any denied capability.
pub fn scan_capabilities(source: &str) -> Result<()> {
    for hit in capability_re().find_iter(source) {
        return Err(MonitorError::FormatterRejected(format!(
            "source references disallowed capability '{}'",
            hit.as_str()
        )));
    }
    Ok(())
}

/// Reject source that confidently hard-codes snapshot data.
///
/// Flags assignments of bare string literals that look like version numbers
/// or absolute URLs. That is data the formatter should be reading from the
/// field map each run, not baking in. Lines that reference `fields` or `meta`
/// are never flagged.
pub fn scan_hardcoded_literals(source: &str, policy: &HeuristicPolicy) -> Result<()> {
    if !policy.flag_version_literals && !policy.flag_url_literals {
        return Ok(());
    }

    let version_re = version_literal_re(policy.min_version_components);

    for line in source.lines() {
        if line.contains("fields") || line.contains("meta") {
            continue;
        }
        let Some(caps) = assignment_re().captures(line) else {
            continue;
        };
        let variable = &caps[1];
        let literal = &caps[2];

        if policy.flag_version_literals && version_re.is_match(literal) {
            return Err(MonitorError::FormatterRejected(format!(
                "'{variable}' is assigned the version-like literal \"{literal}\"; read it from the field map instead"
            )));
        }
        if policy.flag_url_literals
            && (literal.starts_with("http://") || literal.starts_with("https://"))
        {
            return Err(MonitorError::FormatterRejected(format!(
                "'{variable}' is assigned the URL literal \"{literal}\"; read it from the field map instead"
            )));
        }
    }
    Ok(())
}

fn capability_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let pattern = format!(r"\b(?:{})\b", DENIED_CAPABILITIES.join("|"));
        Regex::new(&pattern).expect("static regex is valid")
    })
}

fn assignment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"^\s*(?:let\s+|const\s+)?([A-Za-z_][A-Za-z0-9_]*)\s*\+?=\s*"([^"]*)""#)
            .expect("static regex is valid")
    })
}

fn version_literal_re(min_components: usize) -> Regex {
    let extra = min_components.saturating_sub(1).max(1);
    Regex::new(&format!(r"^[vV]?\d+(?:\.\d+){{{extra},}}$")).expect("generated regex is valid")
}
