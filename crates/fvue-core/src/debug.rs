#![forbid(unsafe_code)]

//! Warnings, tips and component naming.

use crate::config::{self, Warning};
use crate::error::ErrorScope;

/// Report a configuration or misuse warning.
///
/// Suppressed when [`Config::silent`](crate::Config::silent) is set.
pub fn warn(message: &str, scope: Option<&dyn ErrorScope>) {
    if config::is_silent() {
        return;
    }
    let trace = scope.map(generate_component_trace).unwrap_or_default();
    match config::warn_handler() {
        Some(handler) => handler(&Warning {
            message: message.to_string(),
            component: scope.map(|s| format_component_name(Some(s))),
            trace,
        }),
        None => tracing::warn!("[fvue warn]: {message}{trace}"),
    }
}

/// Low-priority hint, logged at info level.
pub fn tip(message: &str, scope: Option<&dyn ErrorScope>) {
    if config::is_silent() {
        return;
    }
    let trace = scope.map(generate_component_trace).unwrap_or_default();
    tracing::info!("[fvue tip]: {message}{trace}");
}

/// `<Name>`, `<Anonymous>` or `<Root>`.
#[must_use]
pub fn format_component_name(scope: Option<&dyn ErrorScope>) -> String {
    let Some(scope) = scope else {
        return "<Anonymous>".to_string();
    };
    if scope.is_root_scope() && scope.scope_name().is_none() {
        return "<Root>".to_string();
    }
    match scope.scope_name() {
        Some(name) => format!("<{}>", classify(&name)),
        None => "<Anonymous>".to_string(),
    }
}

/// `my-comp` and `my_comp` become `MyComp`.
fn classify(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = true;
    for ch in name.chars() {
        if ch == '-' || ch == '_' {
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

/// Multi-line "found in" trace walking from `scope` to the root.
#[must_use]
pub fn generate_component_trace(scope: &dyn ErrorScope) -> String {
    if scope.parent_scope().is_none() {
        return format!("\n\n(found in {})", format_component_name(Some(scope)));
    }
    let mut lines = vec![format_component_name(Some(scope))];
    let mut cur = scope.parent_scope();
    while let Some(s) = cur {
        lines.push(format_component_name(Some(&*s)));
        cur = s.parent_scope();
    }
    let body = lines
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let lead = if i == 0 {
                "---> ".to_string()
            } else {
                " ".repeat(5 + i * 2)
            };
            format!("{lead}{name}")
        })
        .collect::<Vec<_>>()
        .join("\n");
    format!("\n\nfound in\n\n{body}")
}
