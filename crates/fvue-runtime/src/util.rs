#![forbid(unsafe_code)]

//! Name casing and asset lookup helpers.

use fvue_core::{config, debug};
use indexmap::IndexMap;

/// `my-comp` → `myComp`.
#[must_use]
pub fn camelize(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut upper = false;
    for ch in s.chars() {
        if ch == '-' {
            upper = true;
            continue;
        }
        if upper {
            out.extend(ch.to_uppercase());
            upper = false;
        } else {
            out.push(ch);
        }
    }
    out
}

/// `myComp` → `my-comp`.
#[must_use]
pub fn hyphenate(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    for (i, ch) in s.chars().enumerate() {
        if ch.is_ascii_uppercase() {
            if i > 0 {
                out.push('-');
            }
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

#[must_use]
pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Keys starting with `$` or `_` are kept off the instance surface.
#[must_use]
pub fn is_reserved_key(key: &str) -> bool {
    key.starts_with('$') || key.starts_with('_')
}

const RESERVED_ATTRIBUTES: [&str; 5] = ["key", "ref", "slot", "slot-scope", "is"];

#[must_use]
pub fn is_reserved_attribute(name: &str) -> bool {
    RESERVED_ATTRIBUTES.contains(&name)
}

fn is_builtin_tag(name: &str) -> bool {
    matches!(name, "slot" | "component")
}

/// Warn about names that cannot be used to register a component.
pub fn validate_component_name(name: &str) {
    let mut chars = name.chars();
    let valid = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '-');
    if !valid {
        debug::warn(
            &format!(
                "Invalid component name: \"{name}\". Component names can only contain \
                 alphanumeric characters and the hyphen, and must start with a letter."
            ),
            None,
        );
    }
    if is_builtin_tag(name) || config::is_reserved_tag(name) {
        debug::warn(
            &format!("Do not use built-in or reserved HTML elements as component id: {name}"),
            None,
        );
    }
}

/// Look `id` up as written, camelized, then capitalized.
pub fn resolve_asset<'a, T>(assets: &'a IndexMap<String, T>, id: &str) -> Option<&'a T> {
    if let Some(found) = assets.get(id) {
        return Some(found);
    }
    let camel = camelize(id);
    if let Some(found) = assets.get(&camel) {
        return Some(found);
    }
    assets.get(&capitalize(&camel))
}
