//! `{{.Field}}` substitution for manifest strings.
//!
//! Supported references are `.Version`, `.OS`, `.Arch`, `.OSArch` and
//! `.OSArchData.<key>`. There are no pipelines or control structures.

use std::collections::BTreeMap;
use std::sync::LazyLock;
use regex::Regex;
use thiserror::Error;

/// Upper bound on re-templating passes before giving up.
pub const MAX_TEMPLATE_PASSES: usize = 16;

static ACTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([^{}]*?)\s*\}\}").expect("action pattern is valid"));

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template {input:?}: unclosed action at position {position}")]
    Unclosed { input: String, position: usize },

    #[error("template: bad action {action:?}, expected a field reference like .Version")]
    Syntax { action: String },

    #[error("template: can't evaluate field {field}")]
    UnknownField { field: String },

    #[error("template {input:?} did not settle after {passes} passes")]
    TooManyPasses { input: String, passes: usize },
}

/// Values available to a template.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Templater {
    pub version: String,
    pub os: String,
    pub arch: String,
    pub os_arch: String,
    pub os_arch_data: BTreeMap<String, String>,
}

impl Templater {
    /// Substitutes every action in `input` once.
    pub fn template(&self, input: &str) -> Result<String, TemplateError> {
        let mut output = String::with_capacity(input.len());
        let mut last = 0;

        for caps in ACTION_RE.captures_iter(input) {
            let (Some(whole), Some(action)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            push_literal(&mut output, input, last, whole.start())?;
            output.push_str(&self.lookup(action.as_str())?);
            last = whole.end();
        }
        push_literal(&mut output, input, last, input.len())?;

        Ok(output)
    }

    /// Templates `input` repeatedly until the output stops changing, so values
    /// that themselves contain actions get resolved too.
    pub fn resolve(&self, input: &str) -> Result<String, TemplateError> {
        let mut current = input.to_string();
        for _ in 0..MAX_TEMPLATE_PASSES {
            let next = self.template(&current)?;
            if next == current {
                return Ok(next);
            }
            current = next;
        }
        Err(TemplateError::TooManyPasses {
            input: input.to_string(),
            passes: MAX_TEMPLATE_PASSES,
        })
    }

    fn lookup(&self, action: &str) -> Result<String, TemplateError> {
        let Some(path) = action.strip_prefix('.') else {
            return Err(TemplateError::Syntax {
                action: action.to_string(),
            });
        };
        let value = match path {
            "Version" => Some(&self.version),
            "OS" => Some(&self.os),
            "Arch" => Some(&self.arch),
            "OSArch" => Some(&self.os_arch),
            _ => path
                .strip_prefix("OSArchData.")
                .and_then(|key| self.os_arch_data.get(key)),
        };
        value.cloned().ok_or_else(|| TemplateError::UnknownField {
            field: path.to_string(),
        })
    }
}

/// Copies literal text, rejecting a `{{` that never found its `}}`.
fn push_literal(
    output: &mut String,
    input: &str,
    start: usize,
    end: usize,
) -> Result<(), TemplateError> {
    let literal = &input[start..end];
    if let Some(offset) = literal.find("{{") {
        return Err(TemplateError::Unclosed {
            input: input.to_string(),
            position: start + offset,
        });
    }
    output.push_str(literal);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn templater() -> Templater {
        Templater {
            version: "1.7".to_string(),
            os: "linux".to_string(),
            arch: "amd64".to_string(),
            os_arch: "linux_amd64".to_string(),
            os_arch_data: BTreeMap::from([
                ("ext".to_string(), "linux64".to_string()),
                ("dir".to_string(), "jq-{{.Version}}".to_string()),
            ]),
        }
    }

    #[test]
    fn test_template_version() {
        assert_eq!(templater().resolve("{{.Version}}").unwrap(), "1.7");
    }

    #[test]
    fn test_template_unclosed_action() {
        let err = templater().resolve("{{.Version").unwrap_err();
        assert!(matches!(err, TemplateError::Unclosed { position: 0, .. }));
        assert!(err.to_string().contains("unclosed action"));
    }

    #[test]
    fn test_template_unknown_field() {
        let err = templater().resolve("{{.Vern}}").unwrap_err();
        assert!(err.to_string().contains("can't evaluate field Vern"));
    }

    #[test]
    fn test_template_missing_os_arch_key() {
        let err = templater().resolve("{{.OSArchData.sha256sum}}").unwrap_err();
        assert!(matches!(err, TemplateError::UnknownField { .. }));
    }

    #[test]
    fn test_template_bad_action() {
        let err = templater().resolve("{{ Version }}").unwrap_err();
        assert!(matches!(err, TemplateError::Syntax { .. }));
    }

    #[test]
    fn test_template_all_fields_with_spacing() {
        let out = templater()
            .resolve("https://x/{{ .OS }}/{{.Arch}}/{{.OSArch}}/jq-{{.OSArchData.ext}}")
            .unwrap();
        assert_eq!(out, "https://x/linux/amd64/linux_amd64/jq-linux64");
    }

    #[test]
    fn test_template_reaches_fixed_point() {
        let out = templater().resolve("{{.OSArchData.dir}}/jq").unwrap();
        assert_eq!(out, "jq-1.7/jq");
    }

    #[test]
    fn test_template_plain_text_untouched() {
        assert_eq!(templater().resolve("no actions }} here").unwrap(), "no actions }} here");
    }

    #[test]
    fn test_template_growing_cycle_is_capped() {
        let mut t = templater();
        t.os_arch_data
            .insert("loop".to_string(), "x{{.OSArchData.loop}}".to_string());
        let err = t.resolve("{{.OSArchData.loop}}").unwrap_err();
        assert!(matches!(err, TemplateError::TooManyPasses { passes: MAX_TEMPLATE_PASSES, .. }));
    }

    #[test]
    fn test_templaters_share_the_action_pattern() {
        let first = templater();
        let mut second = templater();
        second.version = "1.5".to_string();
        for _ in 0..3 {
            assert_eq!(first.template("jq-{{ .Version }}").unwrap(), "jq-1.7");
            assert_eq!(second.template("jq-{{.Version}}").unwrap(), "jq-1.5");
        }
        assert_eq!(ACTION_RE.captures_iter("{{.OS}}-{{ .Arch }}").count(), 2);
    }
}
