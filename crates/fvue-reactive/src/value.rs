#![forbid(unsafe_code)]

//! The dynamic data model.
//!
//! [`Value`] mirrors the shapes a component's state can take. Objects and
//! arrays are reference handles ([`Obj`], [`Arr`]): cloning a `Value`
//! clones the handle, never the contents, so two reads of the same field
//! yield identical containers.
//!
//! Tracking is explicit. [`Obj::get`] is the tracked read and [`Obj::set`]
//! the tracked write; both behave like plain map access until the object
//! has been passed through [`observe`](crate::observer::observe). Array
//! index reads are never tracked; the array's mutating methods (`push`,
//! `pop`, `shift`, `unshift`, `splice`, `sort`, `reverse`) notify once
//! observed.
//!
//! # Invariants
//!
//! 1. A container carries at most one [`Observer`].
//! 2. Field order is insertion order.
//! 3. Writes compare with [`same_value`]: strict equality except that NaN
//!    equals NaN.

use std::cell::{Cell, RefCell};
use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::dep::{self, Dep};
use crate::observer::{self, Observer};

/// A dynamically typed state value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Array(Arr),
    Object(Obj),
}

impl Value {
    #[must_use]
    pub fn string(s: impl AsRef<str>) -> Self {
        Self::String(Rc::from(s.as_ref()))
    }

    /// A fresh, unobserved object built from `(key, value)` pairs.
    #[must_use]
    pub fn object<K, I>(pairs: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Self::Object(Obj::from_pairs(pairs))
    }

    /// A fresh, unobserved array.
    #[must_use]
    pub fn array(items: impl IntoIterator<Item = Value>) -> Self {
        Self::Array(Arr::from_vec(items.into_iter().collect()))
    }

    #[must_use]
    pub fn is_nullish(&self) -> bool {
        matches!(self, Self::Undefined | Self::Null)
    }

    #[must_use]
    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    /// Objects and arrays.
    #[must_use]
    pub fn is_object(&self) -> bool {
        matches!(self, Self::Array(_) | Self::Object(_))
    }

    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Undefined | Self::Null => false,
            Self::Bool(b) => *b,
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::String(s) => !s.is_empty(),
            Self::Array(_) | Self::Object(_) => true,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_obj(&self) -> Option<&Obj> {
        match self {
            Self::Object(o) => Some(o),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_arr(&self) -> Option<&Arr> {
        match self {
            Self::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Name of the runtime type, as used in prop validation messages.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Undefined => "Undefined",
            Self::Null => "Null",
            Self::Bool(_) => "Boolean",
            Self::Number(_) => "Number",
            Self::String(_) => "String",
            Self::Array(_) => "Array",
            Self::Object(_) => "Object",
        }
    }

    /// The observer attached to this container, if any.
    #[must_use]
    pub fn observer(&self) -> Option<Rc<Observer>> {
        match self {
            Self::Array(a) => a.observer(),
            Self::Object(o) => o.observer(),
            _ => None,
        }
    }

    /// Text used when the value is interpolated into output: nullish values
    /// render empty, containers render as pretty JSON.
    #[must_use]
    pub fn to_display_string(&self) -> String {
        match self {
            Self::Undefined | Self::Null => String::new(),
            Self::Array(_) | Self::Object(_) => {
                serde_json::to_string_pretty(&self.to_json()).unwrap_or_default()
            }
            other => other.to_js_string(),
        }
    }

    /// String coercion of primitives (`String(value)`).
    #[must_use]
    pub fn to_js_string(&self) -> String {
        match self {
            Self::Undefined => "undefined".to_string(),
            Self::Null => "null".to_string(),
            Self::Bool(b) => b.to_string(),
            Self::Number(n) => format_number(*n),
            Self::String(s) => s.to_string(),
            Self::Array(a) => a
                .to_vec()
                .iter()
                .map(|v| if v.is_nullish() { String::new() } else { v.to_js_string() })
                .collect::<Vec<_>>()
                .join(","),
            Self::Object(_) => "[object Object]".to_string(),
        }
    }

    /// Untracked deep conversion to JSON. `Undefined` becomes `null`.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Undefined | Self::Null => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Number(n) => serde_json::Number::from_f64(*n)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Self::String(s) => serde_json::Value::String(s.to_string()),
            Self::Array(a) => serde_json::Value::Array(a.to_vec().iter().map(Value::to_json).collect()),
            Self::Object(o) => serde_json::Value::Object(
                o.entries_untracked()
                    .into_iter()
                    .map(|(k, v)| (k, v.to_json()))
                    .collect(),
            ),
        }
    }
}

fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        (if n > 0.0 { "Infinity" } else { "-Infinity" }).to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{n:.0}")
    } else {
        format!("{n}")
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => f.write_str("undefined"),
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => f.write_str(&format_number(*n)),
            Self::String(s) => write!(f, "{s:?}"),
            Self::Array(a) => f.debug_list().entries(a.to_vec()).finish(),
            Self::Object(o) => f.debug_map().entries(o.entries_untracked()).finish(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_display_string())
    }
}

/// Strict equality: primitives by value, containers by identity.
#[must_use]
pub fn strict_equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => x == y,
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Array(x), Value::Array(y)) => x.ptr_eq(y),
        (Value::Object(x), Value::Object(y)) => x.ptr_eq(y),
        _ => false,
    }
}

/// [`strict_equals`], except that NaN is the same as NaN.
#[must_use]
pub fn same_value(a: &Value, b: &Value) -> bool {
    if let (Value::Number(x), Value::Number(y)) = (a, b) {
        if x.is_nan() && y.is_nan() {
            return true;
        }
    }
    strict_equals(a, b)
}

/// Untracked deep structural equality.
#[must_use]
pub fn deep_equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Array(x), Value::Array(y)) => {
            let (x, y) = (x.to_vec(), y.to_vec());
            x.len() == y.len() && x.iter().zip(&y).all(|(l, r)| deep_equals(l, r))
        }
        (Value::Object(x), Value::Object(y)) => {
            let (x, y) = (x.entries_untracked(), y.entries_untracked());
            x.len() == y.len()
                && x.iter()
                    .all(|(k, v)| y.iter().any(|(k2, v2)| k == k2 && deep_equals(v, v2)))
        }
        _ => same_value(a, b),
    }
}

/// Structural equality under [`deep_equals`]: NaN equals NaN, containers
/// compare by contents.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        deep_equals(self, other)
    }
}

// ─── Conversions ────────────────────────────────────────────────────────

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Number(f64::from(v))
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Self::Number(f64::from(v))
    }
}

impl From<i64> for Value {
    #[allow(clippy::cast_precision_loss)]
    fn from(v: i64) -> Self {
        Self::Number(v as f64)
    }
}

impl From<usize> for Value {
    #[allow(clippy::cast_precision_loss)]
    fn from(v: usize) -> Self {
        Self::Number(v as f64)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::string(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(Rc::from(v))
    }
}

impl From<Obj> for Value {
    fn from(v: Obj) -> Self {
        Self::Object(v)
    }
}

impl From<Arr> for Value {
    fn from(v: Arr) -> Self {
        Self::Array(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Self::Array(Arr::from_vec(v))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => Self::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Self::from(s),
            serde_json::Value::Array(items) => {
                Self::Array(Arr::from_vec(items.into_iter().map(Value::from).collect()))
            }
            serde_json::Value::Object(map) => {
                Self::Object(Obj::from_pairs(map.into_iter().map(|(k, v)| (k, Value::from(v)))))
            }
        }
    }
}

// ─── Objects ────────────────────────────────────────────────────────────

/// Invoked before a tracked field accepts a new value.
pub type CustomSetter = Rc<dyn Fn()>;

#[derive(Clone)]
pub(crate) struct Field {
    pub(crate) value: Value,
    /// Present once the field has been made reactive.
    pub(crate) dep: Option<Dep>,
    pub(crate) shallow: bool,
    pub(crate) custom_setter: Option<CustomSetter>,
}

impl Field {
    fn plain(value: Value) -> Self {
        Self {
            value,
            dep: None,
            shallow: false,
            custom_setter: None,
        }
    }
}

struct ObjInner {
    fields: RefCell<IndexMap<String, Field>>,
    observer: RefCell<Option<Rc<Observer>>>,
    extensible: Cell<bool>,
}

/// Shared handle to a keyed container.
#[derive(Clone)]
pub struct Obj(Rc<ObjInner>);

impl Default for Obj {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Obj {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.entries_untracked()).finish()
    }
}

impl Obj {
    #[must_use]
    pub fn new() -> Self {
        Self(Rc::new(ObjInner {
            fields: RefCell::new(IndexMap::new()),
            observer: RefCell::new(None),
            extensible: Cell::new(true),
        }))
    }

    #[must_use]
    pub fn from_pairs<K, I>(pairs: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        let obj = Self::new();
        {
            let mut fields = obj.0.fields.borrow_mut();
            for (k, v) in pairs {
                fields.insert(k.into(), Field::plain(v));
            }
        }
        obj
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Identity of the shared container.
    pub(crate) fn addr(&self) -> usize {
        Rc::as_ptr(&self.0).cast::<()>() as usize
    }

    #[must_use]
    pub fn observer(&self) -> Option<Rc<Observer>> {
        self.0.observer.borrow().clone()
    }

    pub(crate) fn attach_observer(&self, ob: Rc<Observer>) {
        *self.0.observer.borrow_mut() = Some(ob);
    }

    #[must_use]
    pub fn is_extensible(&self) -> bool {
        self.0.extensible.get()
    }

    /// Stop the object from being observed or gaining keys.
    pub fn prevent_extensions(&self) {
        self.0.extensible.set(false);
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.fields.borrow().contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.fields.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys in insertion order. Untracked.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.0.fields.borrow().keys().cloned().collect()
    }

    #[must_use]
    pub fn entries_untracked(&self) -> Vec<(String, Value)> {
        self.0
            .fields
            .borrow()
            .iter()
            .map(|(k, f)| (k.clone(), f.value.clone()))
            .collect()
    }

    /// True when `key` exists and has been made reactive.
    #[must_use]
    pub fn is_reactive_key(&self, key: &str) -> bool {
        self.0
            .fields
            .borrow()
            .get(key)
            .is_some_and(|f| f.dep.is_some())
    }

    /// Read a field without recording a dependency.
    #[must_use]
    pub fn get_untracked(&self, key: &str) -> Value {
        self.0
            .fields
            .borrow()
            .get(key)
            .map(|f| f.value.clone())
            .unwrap_or_default()
    }

    /// Read a field. When a watcher is collecting and the field is
    /// reactive, the watcher subscribes to the field and, for container
    /// values, to the container's own observer (and, for arrays, to every
    /// nested observed element).
    #[must_use]
    pub fn get(&self, key: &str) -> Value {
        let (value, dep, shallow) = {
            let fields = self.0.fields.borrow();
            match fields.get(key) {
                Some(field) => (field.value.clone(), field.dep.clone(), field.shallow),
                None => return Value::Undefined,
            }
        };
        if let Some(dep) = dep {
            if dep::has_target() {
                dep.depend();
                if !shallow {
                    if let Some(child) = value.observer() {
                        child.dep().depend();
                        if let Value::Array(arr) = &value {
                            observer::depend_array(arr);
                        }
                    }
                }
            }
        }
        value
    }

    /// Assign a field.
    ///
    /// Reactive fields skip unchanged values, observe the new value and
    /// notify. Unknown keys are added as plain, untracked fields; use
    /// [`set`](crate::observer::set) to add a reactive key to an observed
    /// object.
    pub fn set(&self, key: &str, value: Value) {
        let existing = {
            let fields = self.0.fields.borrow();
            fields
                .get(key)
                .map(|f| (f.value.clone(), f.dep.clone(), f.shallow, f.custom_setter.clone()))
        };
        match existing {
            None => {
                if self.is_extensible() {
                    self.0.fields.borrow_mut().insert(key.to_string(), Field::plain(value));
                }
            }
            Some((_, None, _, _)) => {
                if let Some(field) = self.0.fields.borrow_mut().get_mut(key) {
                    field.value = value;
                }
            }
            Some((old, Some(dep), shallow, setter)) => {
                if same_value(&old, &value) {
                    return;
                }
                if let Some(setter) = setter {
                    setter();
                }
                if let Some(field) = self.0.fields.borrow_mut().get_mut(key) {
                    field.value = value.clone();
                }
                if !shallow {
                    observer::observe(&value, false);
                }
                dep.notify();
            }
        }
    }

    pub(crate) fn field_dep(&self, key: &str) -> Option<Dep> {
        self.0.fields.borrow().get(key).and_then(|f| f.dep.clone())
    }

    /// Install or replace a field. Used by the observer; does not notify.
    pub(crate) fn put_field(&self, key: &str, field: Field) {
        self.0.fields.borrow_mut().insert(key.to_string(), field);
    }

    pub(crate) fn remove_field(&self, key: &str) -> Option<Value> {
        self.0.fields.borrow_mut().shift_remove(key).map(|f| f.value)
    }
}

// ─── Arrays ─────────────────────────────────────────────────────────────

struct ArrInner {
    items: RefCell<Vec<Value>>,
    observer: RefCell<Option<Rc<Observer>>>,
    extensible: Cell<bool>,
}

/// Shared handle to a sequence.
#[derive(Clone)]
pub struct Arr(Rc<ArrInner>);

impl Default for Arr {
    fn default() -> Self {
        Self::from_vec(Vec::new())
    }
}

impl fmt::Debug for Arr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.to_vec()).finish()
    }
}

impl Arr {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_vec(items: Vec<Value>) -> Self {
        Self(Rc::new(ArrInner {
            items: RefCell::new(items),
            observer: RefCell::new(None),
            extensible: Cell::new(true),
        }))
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Identity of the shared container.
    pub(crate) fn addr(&self) -> usize {
        Rc::as_ptr(&self.0).cast::<()>() as usize
    }

    #[must_use]
    pub fn observer(&self) -> Option<Rc<Observer>> {
        self.0.observer.borrow().clone()
    }

    pub(crate) fn attach_observer(&self, ob: Rc<Observer>) {
        *self.0.observer.borrow_mut() = Some(ob);
    }

    #[must_use]
    pub fn is_extensible(&self) -> bool {
        self.0.extensible.get()
    }

    pub fn prevent_extensions(&self) {
        self.0.extensible.set(false);
    }

    /// Untracked length.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.items.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Untracked element read; `Undefined` when out of bounds.
    #[must_use]
    pub fn get(&self, index: usize) -> Value {
        self.0.items.borrow().get(index).cloned().unwrap_or_default()
    }

    /// Untracked snapshot of the elements.
    #[must_use]
    pub fn to_vec(&self) -> Vec<Value> {
        self.0.items.borrow().clone()
    }

    /// Direct index assignment. Not intercepted: observers are not
    /// notified. Use [`set`](crate::observer::set) for a tracked write.
    pub fn set_untracked(&self, index: usize, value: Value) {
        let mut items = self.0.items.borrow_mut();
        if index >= items.len() {
            items.resize(index + 1, Value::Undefined);
        }
        items[index] = value;
    }

    /// Append; returns the new length.
    pub fn push(&self, items: impl IntoIterator<Item = Value>) -> usize {
        let inserted: Vec<Value> = items.into_iter().collect();
        let len = {
            let mut vec = self.0.items.borrow_mut();
            vec.extend(inserted.iter().cloned());
            vec.len()
        };
        self.after_mutation(&inserted);
        len
    }

    /// Remove from the end.
    pub fn pop(&self) -> Value {
        let removed = self.0.items.borrow_mut().pop().unwrap_or_default();
        self.after_mutation(&[]);
        removed
    }

    /// Remove from the start.
    pub fn shift(&self) -> Value {
        let removed = {
            let mut vec = self.0.items.borrow_mut();
            if vec.is_empty() {
                Value::Undefined
            } else {
                vec.remove(0)
            }
        };
        self.after_mutation(&[]);
        removed
    }

    /// Prepend; returns the new length.
    pub fn unshift(&self, items: impl IntoIterator<Item = Value>) -> usize {
        let inserted: Vec<Value> = items.into_iter().collect();
        let len = {
            let mut vec = self.0.items.borrow_mut();
            drop(vec.splice(0..0, inserted.iter().cloned()));
            vec.len()
        };
        self.after_mutation(&inserted);
        len
    }

    /// Remove `delete_count` elements at `start` and insert `items` there.
    /// Out-of-range arguments are clamped. Returns the removed elements.
    pub fn splice(&self, start: usize, delete_count: usize, items: Vec<Value>) -> Vec<Value> {
        let removed = {
            let mut vec = self.0.items.borrow_mut();
            let start = start.min(vec.len());
            let end = start.saturating_add(delete_count).min(vec.len());
            vec.splice(start..end, items.iter().cloned()).collect()
        };
        self.after_mutation(&items);
        removed
    }

    /// Sort by string coercion, undefined last.
    pub fn sort(&self) {
        self.sort_by(|a, b| match (a.is_undefined(), b.is_undefined()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => a.to_js_string().cmp(&b.to_js_string()),
        });
    }

    /// Sort with `compare`. The comparator may read this array; it sees
    /// the contents from before the sort.
    pub fn sort_by(&self, compare: impl FnMut(&Value, &Value) -> Ordering) {
        let mut items = self.0.items.borrow().clone();
        items.sort_by(compare);
        *self.0.items.borrow_mut() = items;
        self.after_mutation(&[]);
    }

    pub fn reverse(&self) {
        self.0.items.borrow_mut().reverse();
        self.after_mutation(&[]);
    }

    fn after_mutation(&self, inserted: &[Value]) {
        let Some(ob) = self.observer() else {
            return;
        };
        observer::observe_items(inserted);
        ob.dep().notify();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_formatting() {
        assert_eq!(Value::from(1).to_display_string(), "1");
        assert_eq!(Value::from(1.5).to_display_string(), "1.5");
        assert_eq!(Value::from(-0.0).to_display_string(), "0");
        assert_eq!(Value::from(f64::NAN).to_display_string(), "NaN");
        assert_eq!(Value::from(f64::NEG_INFINITY).to_display_string(), "-Infinity");
        assert_eq!(Value::Null.to_display_string(), "");
    }

    #[test]
    fn nan_is_same_value_but_not_strict() {
        let nan = Value::from(f64::NAN);
        assert!(!strict_equals(&nan, &nan));
        assert!(same_value(&nan, &nan));
        assert!(same_value(&Value::from(0.0), &Value::from(-0.0)));
    }

    #[test]
    fn containers_compare_by_identity() {
        let a = Value::object([("x", Value::from(1))]);
        let b = Value::object([("x", Value::from(1))]);
        assert!(strict_equals(&a, &a.clone()));
        assert!(!strict_equals(&a, &b));
        assert!(deep_equals(&a, &b));
    }

    #[test]
    fn plain_set_adds_untracked_key() {
        let obj = Obj::new();
        obj.set("a", Value::from(1));
        assert!(obj.contains_key("a"));
        assert!(!obj.is_reactive_key("a"));
        obj.prevent_extensions();
        obj.set("b", Value::from(2));
        assert!(!obj.contains_key("b"));
    }

    #[test]
    fn splice_clamps() {
        let arr = Arr::from_vec(vec![1.into(), 2.into(), 3.into()]);
        let removed = arr.splice(1, 10, vec![Value::from(9)]);
        assert_eq!(removed.len(), 2);
        assert_eq!(Value::Array(arr.clone()).to_json(), serde_json::json!([1.0, 9.0]));
        assert!(arr.splice(99, 1, Vec::new()).is_empty());
    }

    #[test]
    fn array_methods() {
        let arr = Arr::new();
        assert_eq!(arr.push([Value::from("b"), Value::from("a")]), 2);
        assert_eq!(arr.unshift([Value::from("c")]), 3);
        arr.sort();
        assert_eq!(arr.to_vec().iter().map(Value::to_js_string).collect::<Vec<_>>(), ["a", "b", "c"]);
        arr.reverse();
        assert_eq!(arr.shift().to_js_string(), "c");
        assert_eq!(arr.pop().to_js_string(), "a");
        assert_eq!(arr.len(), 1);
        assert!(arr.pop().as_str().is_some());
        assert!(arr.pop().is_undefined());
    }

    #[test]
    fn sort_comparator_can_read_the_array() {
        let arr = Arr::from_vec(vec![3.into(), 1.into(), 2.into()]);
        let reader = arr.clone();
        arr.sort_by(|a, b| {
            assert_eq!(reader.len(), 3);
            a.as_f64().partial_cmp(&b.as_f64()).unwrap_or(Ordering::Equal)
        });
        assert_eq!(Value::Array(arr).to_json(), serde_json::json!([1.0, 2.0, 3.0]));
    }

    #[test]
    fn equality_is_structural() {
        assert_eq!(Value::from(1), Value::Number(1.0));
        assert_eq!(Value::Number(f64::NAN), Value::Number(f64::NAN));
        assert_ne!(Value::from(1), Value::from("1"));
        assert_ne!(Value::Undefined, Value::Null);
        let a = Value::object([("k", Value::array([1.into(), "x".into()]))]);
        let b = Value::object([("k", Value::array([1.into(), "x".into()]))]);
        assert_eq!(a, b);
        if let Some(obj) = b.as_obj() {
            obj.set("k", Value::Null);
        }
        assert_ne!(a, b);
    }

    #[test]
    fn json_conversion() {
        let v = Value::from(serde_json::json!({"a": [1, {"b": null}], "c": "x"}));
        assert_eq!(v.to_json(), serde_json::json!({"a": [1.0, {"b": null}], "c": "x"}));
        assert_eq!(Value::array([1.into(), Value::Null]).to_js_string(), "1,");
    }
}
