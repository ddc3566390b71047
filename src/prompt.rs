//! Layered prompt builder.
//!
//! Prompts are assembled from plain-text template fragments. Each fragment is
//! looked up by file name under the configured prompts directory
//! (`config/prompts/` by default); when the file is missing the built-in copy
//! compiled into the binary is used instead, so a bare install still works.
//!
//! Variable substitution uses `{{key}}` syntax and is applied once at
//! [`build()`](PromptBuilder::build) time, after all layers are joined.
//! Substitution is a single left-to-right pass: placeholders that appear
//! inside substituted values (e.g. a user typing `{{text}}`) are left alone.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

const SEPARATOR: &str = "\n\n";

pub const CLASSIFY_SYSTEM: &str = "classify_system.md";
pub const CLASSIFY: &str = "classify.md";
pub const RESPOND_SYSTEM: &str = "respond_system.md";
pub const RESPOND: &str = "respond.md";
pub const WRITE_SYSTEM: &str = "write_system.md";
pub const UPDATE_SYSTEM: &str = "update_system.md";
pub const UPDATE: &str = "update.md";
pub const TITLE: &str = "title.md";

/// Templates compiled into the binary.
fn builtin(name: &str) -> Option<&'static str> {
    match name {
        CLASSIFY_SYSTEM => Some(include_str!("../config/prompts/classify_system.md")),
        CLASSIFY => Some(include_str!("../config/prompts/classify.md")),
        RESPOND_SYSTEM => Some(include_str!("../config/prompts/respond_system.md")),
        RESPOND => Some(include_str!("../config/prompts/respond.md")),
        WRITE_SYSTEM => Some(include_str!("../config/prompts/write_system.md")),
        UPDATE_SYSTEM => Some(include_str!("../config/prompts/update_system.md")),
        UPDATE => Some(include_str!("../config/prompts/update.md")),
        TITLE => Some(include_str!("../config/prompts/title.md")),
        _ => None,
    }
}

/// Shared handle to the prompts directory.
#[derive(Debug, Clone)]
pub struct Prompts {
    dir: Option<PathBuf>,
}

impl Prompts {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: Some(dir.into()) }
    }

    /// Prompts that only ever use the built-in templates.
    pub fn builtin() -> Self {
        Self { dir: None }
    }

    /// Start a builder rooted at this directory.
    pub fn builder(&self) -> PromptBuilder {
        PromptBuilder { prompts_dir: self.dir.clone(), parts: Vec::new(), vars: HashMap::new() }
    }

    /// Convenience: a single template with variables applied.
    pub fn render<'a, I>(&self, name: &str, vars: I) -> String
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        self.builder().layer(name).with_vars(vars).build()
    }
}

/// Fluent builder that assembles a layered prompt from template files.
pub struct PromptBuilder {
    prompts_dir: Option<PathBuf>,
    parts: Vec<String>,
    vars: HashMap<String, String>,
}

impl PromptBuilder {
    /// Append a layer by loading `filename` from the prompts directory,
    /// falling back to the built-in template. Unknown names with no file on
    /// disk are skipped.
    pub fn layer(mut self, filename: &str) -> Self {
        let from_disk = self
            .prompts_dir
            .as_ref()
            .and_then(|dir| fs::read_to_string(dir.join(filename)).ok());
        let text = from_disk.or_else(|| builtin(filename).map(str::to_string));
        if text.is_none() {
            tracing::debug!("prompt: layer '{filename}' not found, skipped");
        }
        if let Some(text) = text {
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                self.parts.push(trimmed.to_string());
            }
        }
        self
    }

    /// Register `{{key}}` → `value` substitution pairs applied at build time.
    pub fn with_vars<'a, I>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        for (k, v) in vars {
            self.vars.insert(k.to_string(), v.to_string());
        }
        self
    }

    /// Assemble all layers, join with blank lines, and apply variable substitution.
    pub fn build(self) -> String {
        substitute(&self.parts.join(SEPARATOR), &self.vars)
    }
}

/// Replace every known `{{key}}` in `template`. Unknown placeholders are kept.
fn substitute(template: &str, vars: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let key = &after[..end];
                match vars.get(key) {
                    Some(value) => out.push_str(value),
                    None => {
                        out.push_str("{{");
                        out.push_str(key);
                        out.push_str("}}");
                    }
                }
                rest = &after[end + 2..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}
