//! Rhai-backed formatter execution under a restricted capability set.
//!
//! The embedded engine is configured with hard resource limits and no
//! registered filesystem, process, network, or module-loading API, so a
//! formatter script can reach only its two arguments and the built-in
//! arithmetic, string, and collection operations.

use std::sync::OnceLock;

use regex::Regex;
use rhai::{Dynamic, Engine, Scope, AST};

use crate::error::{MonitorError, Result};
use crate::fields::FieldMap;
use crate::task::TaskMeta;

use super::validate::{scan_capabilities, scan_hardcoded_literals, HeuristicPolicy};
use super::{FormatterBackend, ENTRY_POINT};

/// Upper bound on script operations per execution.
const MAX_OPERATIONS: u64 = 200_000;
/// Upper bound on nested call depth.
const MAX_CALL_LEVELS: usize = 32;
/// Upper bound on strings a script may build.
const MAX_STRING_SIZE: usize = 64 * 1024;

/// Formatter backend embedding a restricted [`rhai`] engine.
pub struct RhaiFormatter {
    engine: Engine,
    policy: HeuristicPolicy,
}

impl RhaiFormatter {
    /// Create a formatter with the default heuristic policy.
    pub fn new() -> Self {
        Self::with_policy(HeuristicPolicy::default())
    }

    /// Create a formatter with a custom hardcoded-literal policy.
    pub fn with_policy(policy: HeuristicPolicy) -> Self {
        let mut engine = Engine::new();
        engine.set_max_operations(MAX_OPERATIONS);
        engine.set_max_call_levels(MAX_CALL_LEVELS);
        engine.set_max_string_size(MAX_STRING_SIZE);
        engine.set_max_array_size(10_000);
        engine.set_max_map_size(10_000);
        engine.set_max_expr_depths(64, 64);
        // No module resolver or eval: scripts cannot load code at runtime.
        engine.disable_symbol("eval");
        engine.disable_symbol("import");
        Self { engine, policy }
    }

    /// Run all static checks and compile, without executing.
    fn compile_checked(&self, source: &str) -> Result<AST> {
        scan_capabilities(source)?;
        scan_hardcoded_literals(source, &self.policy)?;

        // Rhai silently lets a later definition shadow an earlier one, so
        // the exactly-once check runs on the source text. Word-bounded so a
        // helper sharing the name as a prefix does not count.
        let definitions = entry_point_def_re().find_iter(source).count();
        if definitions > 1 {
            return Err(MonitorError::FormatterRejected(format!(
                "source defines '{ENTRY_POINT}' more than once"
            )));
        }

        let ast = self
            .engine
            .compile(source)
            .map_err(|e| MonitorError::FormatterRejected(format!("parse error: {e}")))?;

        match ast.iter_functions().find(|f| f.name == ENTRY_POINT) {
            Some(f) if f.params.len() == 2 => {}
            Some(f) => {
                return Err(MonitorError::FormatterRejected(format!(
                    "entry point '{ENTRY_POINT}' takes {} parameters, expected 2 (fields, meta)",
                    f.params.len()
                )));
            }
            None => {
                return Err(MonitorError::FormatterRejected(format!(
                    "source does not define the entry point '{ENTRY_POINT}'"
                )));
            }
        }
        Ok(ast)
    }
}

fn entry_point_def_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(r"\bfn\s+{ENTRY_POINT}\b")).expect("static regex is valid")
    })
}

impl Default for RhaiFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl FormatterBackend for RhaiFormatter {
    fn validate(&self, source: &str) -> Result<()> {
        self.compile_checked(source).map(|_| ())
    }

    fn execute(&self, source: &str, fields: &FieldMap, meta: &TaskMeta) -> Result<String> {
        let ast = self.compile_checked(source)?;

        let mut scope = Scope::new();
        let result: Dynamic = self
            .engine
            .call_fn(
                &mut scope,
                &ast,
                ENTRY_POINT,
                (fields_to_map(fields), meta_to_map(meta)),
            )
            .map_err(|e| MonitorError::FormatterRuntime(e.to_string()))?;

        let type_name = result.type_name();
        result.into_string().map_err(|_| {
            MonitorError::FormatterRuntime(format!(
                "entry point returned {type_name}, expected a string"
            ))
        })
    }
}

/// Convert a field map into a script map; null fields become unit.
fn fields_to_map(fields: &FieldMap) -> rhai::Map {
    let mut map = rhai::Map::new();
    for (name, value) in fields {
        let dynamic = match value {
            Some(v) => Dynamic::from(v.clone()),
            None => Dynamic::UNIT,
        };
        map.insert(name.as_str().into(), dynamic);
    }
    map
}

fn meta_to_map(meta: &TaskMeta) -> rhai::Map {
    let mut map = rhai::Map::new();
    map.insert("name".into(), Dynamic::from(meta.name.clone()));
    map.insert("url".into(), Dynamic::from(meta.url.clone()));
    map.insert(
        "current_time".into(),
        Dynamic::from(meta.current_time.clone()),
    );
    map.insert(
        "current_date".into(),
        Dynamic::from(meta.current_date.clone()),
    );
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn meta() -> TaskMeta {
        TaskMeta {
            name: "release watch".into(),
            url: "https://example.com/releases".into(),
            current_time: "2026-08-24 10:00:00".into(),
            current_date: "2026-08-24".into(),
        }
    }

    fn fields(entries: &[(&str, Option<&str>)]) -> FieldMap {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.map(str::to_owned)))
            .collect::<BTreeMap<_, _>>()
    }

    #[test]
    fn valid_formatter_renders_text() {
        let formatter = RhaiFormatter::new();
        let source = r#"
fn format_notification(fields, meta) {
    let v = fields["new_version"];
    `${meta.name}: updated to ${v}`
}
"#;
        let out = formatter
            .execute(source, &fields(&[("new_version", Some("2.4.1"))]), &meta())
            .expect("execute");
        assert_eq!(out, "release watch: updated to 2.4.1");
    }

    #[test]
    fn formatter_sees_null_fields_as_unit() {
        let formatter = RhaiFormatter::new();
        let source = r#"
fn format_notification(fields, meta) {
    if fields["missing"] == () {
        "no value"
    } else {
        "has value"
    }
}
"#;
        let out = formatter
            .execute(source, &fields(&[("missing", None)]), &meta())
            .expect("execute");
        assert_eq!(out, "no value");
    }

    #[test]
    fn missing_entry_point_rejected_before_execution() {
        let formatter = RhaiFormatter::new();
        let err = formatter
            .validate("fn render(fields, meta) { \"x\" }")
            .unwrap_err();
        assert!(matches!(err, MonitorError::FormatterRejected(_)), "{err}");
        assert!(err.to_string().contains("format_notification"));
    }

    #[test]
    fn wrong_arity_rejected() {
        let formatter = RhaiFormatter::new();
        let err = formatter
            .validate("fn format_notification(fields) { \"x\" }")
            .unwrap_err();
        assert!(err.to_string().contains("expected 2"));
    }

    #[test]
    fn duplicate_entry_point_rejected() {
        let formatter = RhaiFormatter::new();
        let source = r#"
fn format_notification(a, b) { "one" }
fn format_notification(c, d) { "two" }
"#;
        // Rhai treats the second definition as an override; we reject the
        // ambiguity outright.
        let result = formatter.validate(source);
        assert!(result.is_err());
    }

    #[test]
    fn helper_sharing_the_entry_point_prefix_is_not_a_duplicate() {
        let formatter = RhaiFormatter::new();
        let source = r#"
fn format_notification_line(item) {
    `- ${item}`
}

fn format_notification(fields, meta) {
    format_notification_line(fields["new_version"])
}
"#;
        assert!(formatter.validate(source).is_ok());

        let out = formatter
            .execute(source, &fields(&[("new_version", Some("2.0"))]), &meta())
            .expect("execute");
        assert_eq!(out, "- 2.0");
    }

    #[test]
    fn disallowed_capability_rejected_before_execution() {
        let formatter = RhaiFormatter::new();
        let err = formatter
            .validate("fn format_notification(fields, meta) { eval(\"1+1\") }")
            .unwrap_err();
        assert!(matches!(err, MonitorError::FormatterRejected(_)), "{err}");
    }

    #[test]
    fn hardcoded_version_rejected() {
        let formatter = RhaiFormatter::new();
        let source = r#"
fn format_notification(fields, meta) {
    let version = "9.8.0";
    `new version ${version}`
}
"#;
        let err = formatter.validate(source).unwrap_err();
        assert!(matches!(err, MonitorError::FormatterRejected(_)), "{err}");
    }

    #[test]
    fn unparsable_source_rejected_not_executed() {
        let formatter = RhaiFormatter::new();
        let err = formatter
            .validate("fn format_notification(fields, meta) { ")
            .unwrap_err();
        assert!(matches!(err, MonitorError::FormatterRejected(_)), "{err}");
    }

    #[test]
    fn runtime_throw_is_a_runtime_failure() {
        let formatter = RhaiFormatter::new();
        let source = r#"
fn format_notification(fields, meta) {
    throw "boom";
}
"#;
        let err = formatter.execute(source, &FieldMap::new(), &meta()).unwrap_err();
        assert!(matches!(err, MonitorError::FormatterRuntime(_)), "{err}");
    }

    #[test]
    fn non_string_return_is_a_runtime_failure() {
        let formatter = RhaiFormatter::new();
        let source = "fn format_notification(fields, meta) { 42 }";
        let err = formatter.execute(source, &FieldMap::new(), &meta()).unwrap_err();
        assert!(matches!(err, MonitorError::FormatterRuntime(_)), "{err}");
        assert!(err.to_string().contains("expected a string"));
    }

    #[test]
    fn runaway_loop_hits_operation_limit() {
        let formatter = RhaiFormatter::new();
        let source = r#"
fn format_notification(fields, meta) {
    let n = 0;
    loop { n += 1; }
}
"#;
        let err = formatter.execute(source, &FieldMap::new(), &meta()).unwrap_err();
        assert!(matches!(err, MonitorError::FormatterRuntime(_)), "{err}");
    }

    #[test]
    fn string_and_collection_builtins_available() {
        let formatter = RhaiFormatter::new();
        let source = r#"
fn format_notification(fields, meta) {
    let items = fields["list"].split(",");
    let out = "";
    for item in items {
        item.trim();
        out += "- " + item + "\n";
    }
    out.trim();
    out
}
"#;
        let out = formatter
            .execute(source, &fields(&[("list", Some("a, b, c"))]), &meta())
            .expect("execute");
        assert_eq!(out, "- a\n- b\n- c");
    }
}
