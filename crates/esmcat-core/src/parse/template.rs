//! Template reversal: recover attribute bindings from a formatted name.
//!
//! A filename template is a string with `{name}` placeholders separated
//! by literal text, for example
//! `{variable_id}_{table_id}_{source_id}_{experiment_id}_{member_id}_{grid_label}_{time_range}.nc`.
//! [`FilenameTemplate::reverse`] finds the bindings that would have
//! produced a given name: placeholders become non-greedy captures, the
//! literal separators must match exactly, and the whole name must be
//! consumed.
//!
//! [`reverse_parse`] tries an ordered template list and takes the first
//! full match, which is how the shorter gridspec form (no time range)
//! is picked up after the full form fails.

use regex::Regex;
use snafu::prelude::*;

use crate::catalog::{AttrValue, AttributeSet};

/// Errors raised while compiling a filename template.
#[derive(Debug, Snafu)]
pub enum TemplateError {
    /// An opening brace was never closed (or a stray closing brace appeared).
    #[snafu(display("unbalanced braces in template '{template}'"))]
    UnbalancedBrace {
        /// The offending template.
        template: String,
    },

    /// A placeholder had no name, or a name that is not a valid
    /// attribute identifier.
    #[snafu(display("invalid placeholder name '{field}' in template '{template}'"))]
    BadFieldName {
        /// The offending template.
        template: String,
        /// The placeholder content.
        field: String,
    },

    /// Two placeholders met without a literal separator between them,
    /// which makes the reversal ambiguous.
    #[snafu(display("adjacent placeholders without separator in template '{template}'"))]
    AdjacentFields {
        /// The offending template.
        template: String,
    },

    /// The translated template failed to compile as a regex.
    #[snafu(display("template '{template}' did not compile: {source}"))]
    Compile {
        /// The offending template.
        template: String,
        /// Underlying regex error.
        source: regex::Error,
    },
}

/// A compiled filename template ready for reversal.
#[derive(Debug, Clone)]
pub struct FilenameTemplate {
    raw: String,
    fields: Vec<String>,
    re: Regex,
}

fn is_valid_field_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl FilenameTemplate {
    /// Compile a `{name}`-placeholder template.
    pub fn compile(template: &str) -> Result<Self, TemplateError> {
        let mut fields = Vec::new();
        let mut source = String::with_capacity(template.len() + 16);
        source.push('^');

        let mut rest = template;
        let mut last_was_field = false;
        while let Some(open) = rest.find(['{', '}']) {
            let (literal, tail) = rest.split_at(open);
            if !literal.is_empty() {
                source.push_str(&regex::escape(literal));
                last_was_field = false;
            }

            ensure!(
                tail.starts_with('{'),
                UnbalancedBraceSnafu { template }
            );
            let close = tail.find('}').context(UnbalancedBraceSnafu { template })?;
            let field = &tail[1..close];
            ensure!(
                is_valid_field_name(field),
                BadFieldNameSnafu {
                    template,
                    field: field.to_string(),
                }
            );
            ensure!(!last_was_field, AdjacentFieldsSnafu { template });

            source.push_str(&format!("(?P<{field}>.+?)"));
            fields.push(field.to_string());
            last_was_field = true;
            rest = &tail[close + 1..];
        }
        if !rest.is_empty() {
            source.push_str(&regex::escape(rest));
        }
        source.push('$');

        let re = Regex::new(&source).context(CompileSnafu { template })?;
        Ok(Self {
            raw: template.to_string(),
            fields,
            re,
        })
    }

    /// The template text as given.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The placeholder names in template order.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Attempt to reverse this template against `name`, returning the
    /// placeholder bindings on a full match.
    pub fn reverse(&self, name: &str) -> Option<AttributeSet> {
        let caps = self.re.captures(name)?;
        let mut attrs = AttributeSet::new();
        for field in &self.fields {
            let value = caps.name(field)?.as_str();
            attrs.insert(field.clone(), AttrValue::from(value));
        }
        Some(attrs)
    }
}

/// Try templates in order and return the first full match's bindings.
///
/// Returns an empty set when no template matches, after logging a
/// diagnostic naming the candidate and every template tried.
pub fn reverse_parse(name: &str, templates: &[FilenameTemplate]) -> AttributeSet {
    for template in templates {
        if let Some(attrs) = template.reverse(name) {
            return attrs;
        }
    }
    let tried: Vec<&str> = templates.iter().map(FilenameTemplate::raw).collect();
    log::warn!("failed to parse file: {name} using templates: {tried:?}");
    AttributeSet::new()
}
