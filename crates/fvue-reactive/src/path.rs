#![forbid(unsafe_code)]

//! Dot-delimited watch expressions (`"a.b.c"`).

use crate::value::Value;

/// A parsed, dot-delimited property path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path {
    segments: Vec<String>,
}

impl Path {
    /// Parse `expr`. Only word characters, `.` and `$` are accepted.
    #[must_use]
    pub fn parse(expr: &str) -> Option<Self> {
        if expr.chars().any(|c| !(c.is_alphanumeric() || c == '_' || c == '.' || c == '$')) {
            return None;
        }
        Some(Self {
            segments: expr.split('.').map(str::to_string).collect(),
        })
    }

    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Walk the path from `root`. Object segments are tracked reads; array
    /// segments must be indices and are untracked. Stops with `Undefined`
    /// at the first falsy intermediate value.
    #[must_use]
    pub fn resolve(&self, root: &Value) -> Value {
        self.resolve_from(root.clone(), &self.segments)
    }

    /// Resolve the first segment with `first` (e.g. an instance lookup) and
    /// the rest against the returned value.
    #[must_use]
    pub fn resolve_with(&self, first: impl FnOnce(&str) -> Value) -> Value {
        match self.segments.split_first() {
            Some((head, rest)) => self.resolve_from(first(head), rest),
            None => Value::Undefined,
        }
    }

    fn resolve_from(&self, mut cur: Value, segments: &[String]) -> Value {
        for seg in segments {
            if !cur.is_truthy() {
                return Value::Undefined;
            }
            cur = match &cur {
                Value::Object(obj) => obj.get(seg),
                Value::Array(arr) => match seg.parse::<usize>() {
                    Ok(i) => arr.get(i),
                    Err(_) if seg == "length" => Value::from(arr.len()),
                    Err(_) => Value::Undefined,
                },
                _ => Value::Undefined,
            };
        }
        cur
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_path_characters() {
        assert!(Path::parse("a.b").is_some());
        assert!(Path::parse("$data.x_1").is_some());
        assert!(Path::parse("a[0]").is_none());
        assert!(Path::parse("a + b").is_none());
    }

    #[test]
    fn resolves_nested() {
        let root = Value::object([(
            "a",
            Value::object([("list", Value::array([Value::from("x"), Value::from("y")]))]),
        )]);
        let path = Path::parse("a.list.1").unwrap();
        assert_eq!(path.resolve(&root).as_str(), Some("y"));
        assert_eq!(Path::parse("a.list.length").unwrap().resolve(&root).as_f64(), Some(2.0));
        assert!(Path::parse("a.missing.deeper").unwrap().resolve(&root).is_undefined());
    }
}
