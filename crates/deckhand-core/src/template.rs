//! Named-placeholder template rendering
//!
//! Templates use `{name}` placeholders. `{{` and `}}` stand for literal
//! braces, so shell brace expansion survives rendering as `{{a,b}}`.
//! Format specs and conversions (`{name:>8}`, `{name!r}`) are rejected.

use std::collections::{BTreeMap, HashMap};

use crate::{Error, Result};

/// Source of substitution values
pub trait Vars {
    /// Look up the value for a placeholder
    fn lookup(&self, key: &str) -> Option<&str>;
}

impl Vars for BTreeMap<String, String> {
    fn lookup(&self, key: &str) -> Option<&str> {
        self.get(key).map(String::as_str)
    }
}

impl Vars for HashMap<String, String> {
    fn lookup(&self, key: &str) -> Option<&str> {
        self.get(key).map(String::as_str)
    }
}

impl<V: Vars + ?Sized> Vars for &V {
    fn lookup(&self, key: &str) -> Option<&str> {
        (**self).lookup(key)
    }
}

/// Render `template`, substituting every placeholder from `vars`
pub fn render(template: &str, vars: &impl Vars) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.char_indices().peekable();

    while let Some((pos, c)) = chars.next() {
        match c {
            '{' => {
                if matches!(chars.peek(), Some((_, '{'))) {
                    chars.next();
                    out.push('{');
                    continue;
                }

                let mut key = String::new();
                let mut closed = false;
                for (_, k) in chars.by_ref() {
                    if k == '}' {
                        closed = true;
                        break;
                    }
                    key.push(k);
                }

                if !closed {
                    return Err(Error::template(
                        format!("Unclosed '{{' at offset {}", pos),
                        "Escape literal braces as '{{' and '}}'",
                    ));
                }
                out.push_str(substitute(&key, pos, vars)?);
            }
            '}' => {
                if matches!(chars.peek(), Some((_, '}'))) {
                    chars.next();
                    out.push('}');
                } else {
                    return Err(Error::template(
                        format!("Single '}}' at offset {}", pos),
                        "Escape literal braces as '{{' and '}}'",
                    ));
                }
            }
            _ => out.push(c),
        }
    }

    Ok(out)
}

/// Collect the placeholder names a template refers to, in order of appearance
pub fn placeholders(template: &str) -> Result<Vec<String>> {
    let mut names = Vec::new();
    let mut rest = template;

    while let Some(idx) = rest.find(['{', '}']) {
        let (c, tail) = (rest.as_bytes()[idx], &rest[idx + 1..]);
        if tail.as_bytes().first() == Some(&c) {
            rest = &tail[1..];
            continue;
        }
        if c == b'}' {
            return Err(Error::template(
                "Single '}' in template",
                "Escape literal braces as '{{' and '}}'",
            ));
        }
        let end = tail.find('}').ok_or_else(|| {
            Error::template(
                "Unclosed '{' in template",
                "Escape literal braces as '{{' and '}}'",
            )
        })?;
        let name = &tail[..end];
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
        rest = &tail[end + 1..];
    }

    Ok(names)
}

fn substitute<'v>(key: &str, pos: usize, vars: &'v impl Vars) -> Result<&'v str> {
    if key.is_empty() {
        return Err(Error::template(
            format!("Positional placeholder '{{}}' at offset {}", pos),
            "Use a named placeholder such as '{home}'",
        ));
    }
    if key.contains([':', '!', '{']) {
        return Err(Error::template(
            format!("Unsupported placeholder '{{{}}}' at offset {}", key, pos),
            "Only plain named placeholders are supported",
        ));
    }
    vars.lookup(key)
        .ok_or_else(|| Error::missing_substitution(key))
}
