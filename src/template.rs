//! `{variable}` substitution for command templates.
//!
//! # Syntax
//!
//! - `{name}` - Substitutes the value of variable `name`
//! - `{{` - Renders as literal `{`
//! - `}}` - Renders as literal `}`
//!
//! Undefined variables are an error rather than an empty substitution.

use crate::error::{MbError, Result};
use std::collections::HashMap;

/// Variables available to a template.
pub type Vars<'a> = HashMap<&'a str, String>;

/// Render a template string by substituting variables.
pub fn render(template: &str, vars: &Vars<'_>) -> Result<String> {
    let mut result = String::with_capacity(template.len());
    let mut chars = template.char_indices().peekable();

    while let Some((pos, ch)) = chars.next() {
        match ch {
            '{' if matches!(chars.peek(), Some((_, '{'))) => {
                chars.next();
                result.push('{');
            }
            '{' => {
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some((_, '}')) => break,
                        Some((_, c)) => name.push(c),
                        None => {
                            return Err(MbError::Config(format!(
                                "unmatched '{{' at position {} in template '{}'",
                                pos, template
                            )));
                        }
                    }
                }

                let name = name.trim();
                match vars.get(name) {
                    Some(value) => result.push_str(value),
                    None => {
                        return Err(MbError::Config(format!(
                            "undefined variable '{{{}}}' at position {} in template '{}'",
                            name, pos, template
                        )));
                    }
                }
            }
            '}' => {
                if matches!(chars.peek(), Some((_, '}'))) {
                    chars.next();
                }
                result.push('}');
            }
            _ => result.push(ch),
        }
    }

    Ok(result)
}

/// Split a command template into argv and render each word.
///
/// Splitting happens before substitution, so a value containing spaces or
/// quotes stays a single argument and is never interpreted by a shell.
pub fn render_command(template: &str, vars: &Vars<'_>) -> Result<Vec<String>> {
    let words = shell_words::split(template)
        .map_err(|e| MbError::Config(format!("invalid command template '{}': {}", template, e)))?;
    if words.is_empty() {
        return Err(MbError::Config("command template is empty".to_string()));
    }

    words.iter().map(|word| render(word, vars)).collect()
}
