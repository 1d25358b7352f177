//! Parse and validate generation responses
//!
//! The generation collaborator replies with prose that should embed a JSON
//! object in a fenced block. Extraction is first-match-wins: a ```json
//! fence, then any fence whose body looks like an object, then the first
//! balanced brace span anywhere in the text. Structural problems become
//! field-qualified errors; the advisory checks (path safety, bracket
//! balance, indentation) only ever produce warnings - the source is
//! untrusted but not rejected outright.
//!
//! Nothing in here panics past the boundary: every input yields a
//! `ParsedResponse`, failed ones with `success == false` and populated
//! errors.

use super::{ArtifactBundle, FileMetadata, GeneratedFile};
use regex::Regex;
use serde_json::Value;
use std::path::{Component, Path};
use std::sync::OnceLock;
use tracing::debug;

/// Caller-toggled post-parse checks
#[derive(Debug, Clone, Copy)]
pub struct ParseOptions {
    /// Warn on absolute paths and parent-directory traversal
    pub check_paths: bool,
    /// Warn on unbalanced brackets / inconsistent indentation
    pub check_syntax: bool,
    pub extract_dependencies: bool,
    pub estimate_complexity: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            check_paths: true,
            check_syntax: true,
            extract_dependencies: true,
            estimate_complexity: true,
        }
    }
}

/// Outcome of parsing one generation response
#[derive(Debug, Clone)]
pub struct ParsedResponse {
    pub content: Option<ArtifactBundle>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub success: bool,
}

impl ParsedResponse {
    fn failure(errors: Vec<String>, warnings: Vec<String>) -> Self {
        Self {
            content: None,
            errors,
            warnings,
            success: false,
        }
    }
}

/// Languages whose syntax leans on balanced brackets
const BRACE_LANGUAGES: &[&str] = &[
    "rust", "c", "cpp", "c++", "csharp", "c#", "java", "javascript", "typescript", "go", "kotlin",
    "swift",
];

/// Languages where indentation is structural
const INDENT_LANGUAGES: &[&str] = &["python", "yaml", "haskell", "fsharp", "f#"];

/// Parse a raw generation reply into a validated artifact bundle
pub fn parse_response(raw: &str, target_language: &str, options: &ParseOptions) -> ParsedResponse {
    let Some(json_text) = extract_structured_text(raw) else {
        return ParsedResponse::failure(
            vec!["no structured data found in response".to_string()],
            Vec::new(),
        );
    };

    let value: Value = match serde_json::from_str(&json_text) {
        Ok(value) => value,
        Err(err) => {
            return ParsedResponse::failure(
                vec![format!("structured data is not valid JSON: {}", err)],
                Vec::new(),
            );
        }
    };

    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let files = validate_file_list(&value, "files", &mut errors);
    let tests = validate_file_list(&value, "tests", &mut errors);

    if files.is_empty() && tests.is_empty() && errors.is_empty() {
        errors.push("response must include at least one of 'files' or 'tests'".to_string());
    }

    if !errors.is_empty() {
        return ParsedResponse::failure(errors, warnings);
    }

    let mut bundle = ArtifactBundle {
        files,
        tests,
        documentation: string_field(&value, "documentation"),
        dependencies: string_list(&value, "dependencies"),
        build_instructions: string_field(&value, "build_instructions"),
        metadata: Default::default(),
    };

    for (label, list) in [("files", &mut bundle.files), ("tests", &mut bundle.tests)] {
        for (index, file) in list.iter_mut().enumerate() {
            finish_file(file, &format!("{}[{}]", label, index), target_language, options, &mut warnings);
        }
    }

    debug!(
        files = bundle.files.len(),
        tests = bundle.tests.len(),
        warnings = warnings.len(),
        "parsed generation response"
    );

    ParsedResponse {
        content: Some(bundle),
        errors,
        warnings,
        success: true,
    }
}

// ─── Extraction ─────────────────────────────────────────────────────────────

/// Pull the structured-data text out of the reply. First match wins:
/// tagged fence, generic object-shaped fence, bare balanced span.
fn extract_structured_text(raw: &str) -> Option<String> {
    if let Some(body) = tagged_fence(raw) {
        return Some(body);
    }
    if let Some(body) = object_shaped_fence(raw) {
        return Some(body);
    }
    balanced_span(raw).map(|s| s.to_string())
}

fn tagged_fence(raw: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"(?s)```json\s*\n(.*?)```").unwrap());
    re.captures(raw).map(|caps| caps[1].trim().to_string())
}

fn object_shaped_fence(raw: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"(?s)```[a-zA-Z0-9]*\s*\n(.*?)```").unwrap());
    for caps in re.captures_iter(raw) {
        let body = caps[1].trim();
        if body.starts_with('{') && body.ends_with('}') {
            return Some(body.to_string());
        }
    }
    None
}

/// First balanced `{...}` span in the text. Depth counting skips brace
/// characters inside double-quoted strings so JSON content with braces in
/// string values still terminates at the right spot.
fn balanced_span(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in raw[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&raw[start..start + offset + c.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

// ─── Structural validation ──────────────────────────────────────────────────

fn validate_file_list(value: &Value, label: &str, errors: &mut Vec<String>) -> Vec<GeneratedFile> {
    let Some(list) = value.get(label) else {
        return Vec::new();
    };
    let Some(array) = list.as_array() else {
        errors.push(format!("'{}' must be a list", label));
        return Vec::new();
    };

    let mut files = Vec::new();
    for (index, entry) in array.iter().enumerate() {
        if !entry.is_object() {
            errors.push(format!("{}[{}]: entry must be an object", label, index));
            continue;
        }
        let mut ok = true;
        for field in ["path", "content", "language", "type"] {
            let valid = entry
                .get(field)
                .and_then(|v| v.as_str())
                .map(|s| !s.trim().is_empty())
                .unwrap_or(false);
            if !valid {
                errors.push(format!(
                    "{}[{}]: {} is required and must be a non-empty string",
                    label, index, field
                ));
                ok = false;
            }
        }
        if !ok {
            continue;
        }
        match serde_json::from_value::<GeneratedFile>(entry.clone()) {
            Ok(file) => files.push(file),
            Err(err) => errors.push(format!("{}[{}]: {}", label, index, err)),
        }
    }
    files
}

fn string_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}

fn string_list(value: &Value, key: &str) -> Vec<String> {
    value
        .get(key)
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default()
}

// ─── Post-parse checks ──────────────────────────────────────────────────────

fn finish_file(
    file: &mut GeneratedFile,
    qualifier: &str,
    target_language: &str,
    options: &ParseOptions,
    warnings: &mut Vec<String>,
) {
    file.metadata = FileMetadata {
        bytes: file.content.len(),
        lines: file.content.lines().count(),
        complexity: options
            .estimate_complexity
            .then(|| estimate_complexity(&file.content)),
        dependencies: if options.extract_dependencies {
            extract_dependencies(&file.content)
        } else {
            Vec::new()
        },
    };

    if options.check_paths {
        if let Some(problem) = path_problem(&file.path) {
            warnings.push(format!("{}: {}", qualifier, problem));
        }
    }

    if options.check_syntax {
        let language = if file.language.is_empty() {
            target_language
        } else {
            &file.language
        };
        let lowered = language.to_lowercase();
        if BRACE_LANGUAGES.contains(&lowered.as_str()) && !brackets_balanced(&file.content) {
            warnings.push(format!(
                "{}: unbalanced brackets in generated {} code",
                qualifier, language
            ));
        }
        if INDENT_LANGUAGES.contains(&lowered.as_str()) && !indentation_consistent(&file.content) {
            warnings.push(format!(
                "{}: inconsistent indentation (mixed tabs and spaces)",
                qualifier
            ));
        }
    }
}

/// Relative paths only, no parent traversal. Enforced here rather than at
/// construction so a bad path degrades to a warning, not a crash.
fn path_problem(path: &str) -> Option<String> {
    let trimmed = path.trim();
    let parsed = Path::new(trimmed);
    if parsed.is_absolute() || trimmed.starts_with('/') || trimmed.starts_with('\\') {
        return Some(format!("absolute path is not allowed: {}", trimmed));
    }
    // Windows drive prefix
    if trimmed
        .chars()
        .next()
        .map(|c| c.is_ascii_alphabetic())
        .unwrap_or(false)
        && trimmed.get(1..2) == Some(":")
    {
        return Some(format!("absolute path is not allowed: {}", trimmed));
    }
    if parsed.components().any(|c| matches!(c, Component::ParentDir)) {
        return Some(format!("parent traversal is not allowed: {}", trimmed));
    }
    None
}

/// Naive balance check over (), {}, [] ignoring bracket characters inside
/// quoted strings. Advisory only: it both over- and under-reports on
/// exotic syntax, so it never gates a parse.
fn brackets_balanced(content: &str) -> bool {
    let mut round = 0i64;
    let mut curly = 0i64;
    let mut square = 0i64;
    let mut in_string: Option<char> = None;
    let mut escaped = false;

    for c in content.chars() {
        if escaped {
            escaped = false;
            continue;
        }
        if let Some(quote) = in_string {
            match c {
                '\\' => escaped = true,
                _ if c == quote => in_string = None,
                _ => {}
            }
            continue;
        }
        match c {
            '"' | '\'' => in_string = Some(c),
            '(' => round += 1,
            ')' => round -= 1,
            '{' => curly += 1,
            '}' => curly -= 1,
            '[' => square += 1,
            ']' => square -= 1,
            _ => {}
        }
        if round < 0 || curly < 0 || square < 0 {
            return false;
        }
    }
    round == 0 && curly == 0 && square == 0
}

/// Flag files that mix tab-indented and space-indented lines
fn indentation_consistent(content: &str) -> bool {
    let mut saw_tabs = false;
    let mut saw_spaces = false;
    for line in content.lines() {
        if line.starts_with('\t') {
            saw_tabs = true;
        } else if line.starts_with(' ') {
            saw_spaces = true;
        }
    }
    !(saw_tabs && saw_spaces)
}

fn import_res() -> &'static [Regex] {
    static RES: OnceLock<Vec<Regex>> = OnceLock::new();
    RES.get_or_init(|| {
        vec![
            // Rust: use serde::...;
            Regex::new(r"^\s*use\s+([A-Za-z_][A-Za-z0-9_]*)").unwrap(),
            // JS/TS: import x from 'pkg' / require('pkg')
            Regex::new(r#"(?:import\s+.*?from|require\s*\()\s*['"]([^'"]+)['"]"#).unwrap(),
            // Python: import pkg / from pkg import x
            Regex::new(r"^\s*(?:import|from)\s+([A-Za-z_][A-Za-z0-9_.]*)").unwrap(),
            // Go / C include
            Regex::new(r#"^\s*(?:import\s+|#include\s*[<"])"?([^\s<">]+)"#).unwrap(),
        ]
    })
}

/// Names that look like language machinery rather than real dependencies
const IMPORT_NOISE: &[&str] = &["crate", "self", "super", "std"];

/// Scan literal import-style lines into a deduplicated dependency list
pub(crate) fn extract_dependencies(content: &str) -> Vec<String> {
    let mut found = Vec::new();
    for line in content.lines() {
        for re in import_res() {
            if let Some(caps) = re.captures(line) {
                let name = caps[1].trim_matches('"').to_string();
                if name.is_empty() || IMPORT_NOISE.contains(&name.as_str()) {
                    continue;
                }
                if !found.contains(&name) {
                    found.push(name);
                }
                break;
            }
        }
    }
    found
}

/// Control-flow keyword occurrences plus one. A coarse shape indicator,
/// not a real complexity metric.
pub(crate) fn estimate_complexity(content: &str) -> usize {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"\b(if|else|for|while|match|switch|case|catch|loop)\b").unwrap()
    });
    re.find_iter(content).count() + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_JSON: &str = r#"{
        "files": [
            {"path": "src/lib.rs", "content": "pub fn add(a: i32, b: i32) -> i32 { a + b }", "language": "rust", "type": "source"}
        ],
        "tests": [
            {"path": "tests/add_test.rs", "content": "use mylib::add;\n#[test]\nfn adds() { assert_eq!(add(1, 2), 3); }", "language": "rust", "type": "test"}
        ],
        "documentation": "Adds an add function",
        "dependencies": [],
        "build_instructions": "cargo test"
    }"#;

    #[test]
    fn test_parse_tagged_fence() {
        let raw = format!("Here you go:\n\n```json\n{}\n```\n\nEnjoy!", VALID_JSON);
        let parsed = parse_response(&raw, "rust", &ParseOptions::default());
        assert!(parsed.success);
        let bundle = parsed.content.unwrap();
        assert_eq!(bundle.files.len(), 1);
        assert_eq!(bundle.tests.len(), 1);
    }

    #[test]
    fn test_parse_generic_fence() {
        let raw = format!("Result:\n```\n{}\n```", VALID_JSON);
        let parsed = parse_response(&raw, "rust", &ParseOptions::default());
        assert!(parsed.success);
    }

    #[test]
    fn test_parse_bare_json_span() {
        let raw = format!("No fences here, just {} trailing prose.", VALID_JSON);
        let parsed = parse_response(&raw, "rust", &ParseOptions::default());
        assert!(parsed.success);
    }

    #[test]
    fn test_tagged_fence_wins_over_generic() {
        let raw = format!(
            "```\n{{\"files\": []}}\n```\n```json\n{}\n```",
            VALID_JSON
        );
        let parsed = parse_response(&raw, "rust", &ParseOptions::default());
        assert!(parsed.success);
        assert_eq!(parsed.content.unwrap().files.len(), 1);
    }

    #[test]
    fn test_plain_prose_fails_with_single_error() {
        let parsed = parse_response(
            "I could not produce any code for this item, sorry.",
            "rust",
            &ParseOptions::default(),
        );
        assert!(!parsed.success);
        assert!(parsed.content.is_none());
        assert_eq!(parsed.errors.len(), 1);
        assert_eq!(parsed.errors[0], "no structured data found in response");
    }

    #[test]
    fn test_invalid_json_fails() {
        let parsed = parse_response(
            "```json\n{\"files\": [}\n```",
            "rust",
            &ParseOptions::default(),
        );
        assert!(!parsed.success);
        assert!(parsed.errors[0].contains("not valid JSON"));
    }

    #[test]
    fn test_missing_required_field_is_qualified_error() {
        let raw = r#"```json
{"files": [
    {"path": "a.rs", "content": "x", "language": "rust", "type": "source"},
    {"path": "b.rs", "content": "y", "language": "rust", "type": "source"},
    {"content": "z", "language": "rust", "type": "source"}
]}
```"#;
        let parsed = parse_response(raw, "rust", &ParseOptions::default());
        assert!(!parsed.success);
        assert!(parsed
            .errors
            .iter()
            .any(|e| e.starts_with("files[2]: path is required")));
    }

    #[test]
    fn test_requires_files_or_tests() {
        let parsed = parse_response(
            "```json\n{\"documentation\": \"nothing\"}\n```",
            "rust",
            &ParseOptions::default(),
        );
        assert!(!parsed.success);
        assert!(parsed.errors[0].contains("at least one of"));
    }

    #[test]
    fn test_tests_only_is_valid() {
        let raw = r##"```json
{"tests": [{"path": "t.rs", "content": "#[test] fn t() {}", "language": "rust", "type": "test"}]}
```"##;
        let parsed = parse_response(raw, "rust", &ParseOptions::default());
        assert!(parsed.success);
    }

    #[test]
    fn test_unsafe_paths_warn_but_do_not_fail() {
        let raw = r#"```json
{"files": [
    {"path": "/etc/passwd", "content": "x", "language": "rust", "type": "source"},
    {"path": "../outside.rs", "content": "y", "language": "rust", "type": "source"}
]}
```"#;
        let parsed = parse_response(raw, "rust", &ParseOptions::default());
        assert!(parsed.success);
        assert_eq!(parsed.warnings.len(), 2);
        assert!(parsed.warnings[0].contains("absolute path"));
        assert!(parsed.warnings[1].contains("parent traversal"));
    }

    #[test]
    fn test_path_checks_can_be_disabled() {
        let raw = r#"```json
{"files": [{"path": "/etc/passwd", "content": "x", "language": "rust", "type": "source"}]}
```"#;
        let options = ParseOptions {
            check_paths: false,
            ..Default::default()
        };
        let parsed = parse_response(raw, "rust", &options);
        assert!(parsed.success);
        assert!(parsed.warnings.is_empty());
    }

    #[test]
    fn test_syntax_checks_can_be_disabled() {
        let raw = "```json\n{\"files\": [\n{\"path\": \"a.rs\", \"content\": \"fn main() { if true {\", \"language\": \"rust\", \"type\": \"source\"},\n{\"path\": \"b.py\", \"content\": \"def f():\\n\\tx = 1\\n    y = 2\\n\", \"language\": \"python\", \"type\": \"source\"}\n]}\n```";
        let options = ParseOptions {
            check_syntax: false,
            ..Default::default()
        };
        let parsed = parse_response(raw, "rust", &options);
        assert!(parsed.success);
        assert!(parsed.warnings.is_empty());
    }

    #[test]
    fn test_metadata_checks_can_be_disabled() {
        let raw = format!("```json\n{}\n```", VALID_JSON);
        let options = ParseOptions {
            extract_dependencies: false,
            estimate_complexity: false,
            ..Default::default()
        };
        let parsed = parse_response(&raw, "rust", &options);
        let bundle = parsed.content.unwrap();
        assert!(bundle.files[0].metadata.complexity.is_none());
        assert!(bundle.tests[0].metadata.dependencies.is_empty());
        // Size metadata is unconditional
        assert!(bundle.files[0].metadata.bytes > 0);
    }

    #[test]
    fn test_unbalanced_brackets_warn() {
        let raw = r#"```json
{"files": [{"path": "a.rs", "content": "fn main() { if true {", "language": "rust", "type": "source"}]}
```"#;
        let parsed = parse_response(raw, "rust", &ParseOptions::default());
        assert!(parsed.success);
        assert!(parsed
            .warnings
            .iter()
            .any(|w| w.contains("unbalanced brackets")));
    }

    #[test]
    fn test_brackets_inside_strings_ignored() {
        assert!(brackets_balanced("let s = \"{ not a brace\"; fn f() {}"));
        assert!(!brackets_balanced("fn f() { }}"));
    }

    #[test]
    fn test_mixed_indentation_warns_for_python() {
        let raw = "```json\n{\"files\": [{\"path\": \"a.py\", \"content\": \"def f():\\n\\tx = 1\\n    y = 2\\n\", \"language\": \"python\", \"type\": \"source\"}]}\n```";
        let parsed = parse_response(raw, "python", &ParseOptions::default());
        assert!(parsed.success);
        assert!(parsed
            .warnings
            .iter()
            .any(|w| w.contains("inconsistent indentation")));
    }

    #[test]
    fn test_dependency_extraction() {
        let deps = extract_dependencies(
            "use serde::Serialize;\nuse std::fs;\nuse serde::Deserialize;\nuse regex::Regex;",
        );
        assert_eq!(deps, vec!["serde", "regex"]);
    }

    #[test]
    fn test_dependency_extraction_javascript() {
        let deps = extract_dependencies(
            "import React from 'react';\nconst fs = require('fs');",
        );
        assert_eq!(deps, vec!["react", "fs"]);
    }

    #[test]
    fn test_complexity_estimate() {
        assert_eq!(estimate_complexity("let x = 1;"), 1);
        assert_eq!(
            estimate_complexity("if a { } else { for x in y { } }"),
            4
        );
    }

    #[test]
    fn test_file_metadata_populated() {
        let raw = format!("```json\n{}\n```", VALID_JSON);
        let parsed = parse_response(&raw, "rust", &ParseOptions::default());
        let bundle = parsed.content.unwrap();
        assert!(bundle.files[0].metadata.bytes > 0);
        assert_eq!(bundle.files[0].metadata.lines, 1);
        assert!(bundle.files[0].metadata.complexity.is_some());
        assert_eq!(bundle.tests[0].metadata.dependencies, vec!["mylib"]);
    }

    #[test]
    fn test_balanced_span_respects_strings() {
        let raw = r#"prose {"a": "va}lue", "b": 2} more prose"#;
        assert_eq!(balanced_span(raw), Some(r#"{"a": "va}lue", "b": 2}"#));
    }
}
