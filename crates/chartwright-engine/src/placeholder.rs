//! `{{ ... }}` placeholders embedded in rule expressions and rendered templates

use once_cell::sync::Lazy;
use regex::Regex;

/// Matches `{{ .Values.a.b }}` and captures `a.b`
static VALUES_PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{\s*\.Values\.([^\s\}]+).*?\}\}").expect("valid values placeholder regex")
});

/// Matches a placeholder wrapped in single or double quotes
static QUOTED_PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"'(\{\{.*?\}\})'|"(\{\{.*?\}\})""#).expect("valid quoted placeholder regex")
});

/// Dotted value paths referenced by `{{ .Values.* }}` placeholders, left to right
pub fn value_paths(expression: &str) -> Vec<Vec<String>> {
    VALUES_PLACEHOLDER
        .captures_iter(expression)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().split('.').map(str::to_string).collect())
        .collect()
}

/// Strip quotes a YAML serializer put around placeholders
///
/// `namespace: '{{ .Release.Namespace }}'` becomes `namespace: {{ .Release.Namespace }}`.
/// Escapes of the removed quoting style are undone inside the placeholder.
pub fn unquote_placeholders(text: &str) -> String {
    QUOTED_PLACEHOLDER
        .replace_all(text, |caps: &regex::Captures<'_>| {
            if let Some(single) = caps.get(1) {
                single.as_str().replace("''", "'")
            } else if let Some(double) = caps.get(2) {
                double.as_str().replace("\\\"", "\"").replace("\\\\", "\\")
            } else {
                String::new()
            }
        })
        .into_owned()
}
