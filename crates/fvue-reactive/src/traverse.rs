#![forbid(unsafe_code)]

//! Deep dependency collection for `deep` watchers.

use ahash::AHashSet;

use crate::value::Value;

/// Touch every reachable property of `value` so the active watcher
/// subscribes to all of them. Each container is visited once, keyed by
/// identity, so cyclic structures terminate whether or not they are
/// observed.
pub fn traverse(value: &Value) {
    let mut seen = AHashSet::new();
    walk(value, &mut seen);
}

fn walk(value: &Value, seen: &mut AHashSet<usize>) {
    match value {
        Value::Array(arr) => {
            if !arr.is_extensible() || !seen.insert(arr.addr()) {
                return;
            }
            for item in arr.to_vec() {
                walk(&item, seen);
            }
        }
        Value::Object(obj) => {
            if !obj.is_extensible() || !seen.insert(obj.addr()) {
                return;
            }
            for key in obj.keys() {
                walk(&obj.get(&key), seen);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Obj;

    #[test]
    fn unobserved_cycles_terminate() {
        let obj = Obj::new();
        obj.set("me", Value::Object(obj.clone()));
        obj.set("list", Value::array([Value::Object(obj.clone())]));
        assert!(obj.observer().is_none());

        traverse(&Value::Object(obj.clone()));

        obj.set("me", Value::Null);
        obj.set("list", Value::Null);
    }
}
