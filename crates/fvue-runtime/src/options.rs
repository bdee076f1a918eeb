#![forbid(unsafe_code)]

//! Component options: the declarative description of a component.
//!
//! Options are plain data plus shared closures, built with chained
//! `#[must_use]` setters:
//!
//! ```ignore
//! let counter = ComponentOptions::new()
//!     .name("counter")
//!     .data(|_| Ok(Value::object([("count", Value::from(0))])))
//!     .method("increment", |vm, _| {
//!         let next = vm.get("count").as_f64().unwrap_or(0.0) + 1.0;
//!         vm.set("count", Value::from(next));
//!         Ok(Value::Undefined)
//!     })
//!     .render(|h| Ok(h.text(format!("count: {}", h.get("count")))));
//! ```
//!
//! Closures receive the [`Instance`] they run against. They are stored as
//! `Rc` so merged options share them with their sources.

use std::fmt;
use std::rc::Rc;

use fvue_core::{BoxError, ErrorCapture};
use fvue_reactive::{Obj, Value};
use fvue_vdom::VNode;
use indexmap::IndexMap;

use crate::async_component::AsyncComponent;
use crate::definition::ComponentDef;
use crate::instance::Instance;
use crate::render::RenderContext;

pub type DataFn = Rc<dyn Fn(&Instance) -> Result<Value, BoxError>>;
pub type HookFn = Rc<dyn Fn(&Instance) -> Result<(), BoxError>>;
pub type MethodFn = Rc<dyn Fn(&Instance, &[Value]) -> Result<Value, BoxError>>;
pub type ComputedGetter = Rc<dyn Fn(&Instance) -> Result<Value, BoxError>>;
pub type ComputedSetter = Rc<dyn Fn(&Instance, Value) -> Result<(), BoxError>>;
pub type WatchCallback = Rc<dyn Fn(&Instance, &Value, &Value) -> Result<(), BoxError>>;
pub type RenderFn = Rc<dyn Fn(&RenderContext<'_>) -> Result<VNode, BoxError>>;
pub type ProvideFn = Rc<dyn Fn(&Instance) -> Result<Obj, BoxError>>;
pub type PropValidator = Rc<dyn Fn(&Value) -> bool>;
pub type DefaultFactory = Rc<dyn Fn(&Instance) -> Value>;

/// `(instance, error, info)`; return [`ErrorCapture::Stop`] to keep the
/// error from reaching further ancestors and the global handler.
pub type ErrorCapturedFn = Rc<dyn Fn(&Instance, &BoxError, &str) -> Result<ErrorCapture, BoxError>>;

// ─── Hooks ──────────────────────────────────────────────────────────────

/// Lifecycle hook names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hook {
    BeforeCreate,
    Created,
    BeforeMount,
    Mounted,
    BeforeUpdate,
    Updated,
    Activated,
    Deactivated,
    BeforeDestroy,
    Destroyed,
}

impl Hook {
    pub const ALL: [Hook; 10] = [
        Hook::BeforeCreate,
        Hook::Created,
        Hook::BeforeMount,
        Hook::Mounted,
        Hook::BeforeUpdate,
        Hook::Updated,
        Hook::Activated,
        Hook::Deactivated,
        Hook::BeforeDestroy,
        Hook::Destroyed,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Hook::BeforeCreate => "beforeCreate",
            Hook::Created => "created",
            Hook::BeforeMount => "beforeMount",
            Hook::Mounted => "mounted",
            Hook::BeforeUpdate => "beforeUpdate",
            Hook::Updated => "updated",
            Hook::Activated => "activated",
            Hook::Deactivated => "deactivated",
            Hook::BeforeDestroy => "beforeDestroy",
            Hook::Destroyed => "destroyed",
        }
    }
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ─── Props ──────────────────────────────────────────────────────────────

/// Accepted runtime type of a prop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropType {
    String,
    Number,
    Boolean,
    Array,
    Object,
}

impl PropType {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            PropType::String => "String",
            PropType::Number => "Number",
            PropType::Boolean => "Boolean",
            PropType::Array => "Array",
            PropType::Object => "Object",
        }
    }

    #[must_use]
    pub fn accepts(self, value: &Value) -> bool {
        matches!(
            (self, value),
            (PropType::String, Value::String(_))
                | (PropType::Number, Value::Number(_))
                | (PropType::Boolean, Value::Bool(_))
                | (PropType::Array, Value::Array(_))
                | (PropType::Object, Value::Object(_))
        )
    }
}

/// A default for a prop or an injection.
#[derive(Clone)]
pub enum DefaultValue {
    Value(Value),
    Factory(DefaultFactory),
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultValue::Value(v) => f.debug_tuple("Value").field(v).finish(),
            DefaultValue::Factory(_) => f.write_str("Factory"),
        }
    }
}

#[derive(Clone, Default)]
pub struct PropOptions {
    /// Empty accepts any type.
    pub types: Vec<PropType>,
    pub required: bool,
    pub default: Option<DefaultValue>,
    pub validator: Option<PropValidator>,
}

impl fmt::Debug for PropOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropOptions")
            .field("types", &self.types)
            .field("required", &self.required)
            .field("default", &self.default)
            .field("validator", &self.validator.is_some())
            .finish()
    }
}

impl PropOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn of(ty: PropType) -> Self {
        Self::new().ty(ty)
    }

    #[must_use]
    pub fn ty(mut self, ty: PropType) -> Self {
        self.types.push(ty);
        self
    }

    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    #[must_use]
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(DefaultValue::Value(value.into()));
        self
    }

    #[must_use]
    pub fn default_factory(mut self, factory: impl Fn(&Instance) -> Value + 'static) -> Self {
        self.default = Some(DefaultValue::Factory(Rc::new(factory)));
        self
    }

    #[must_use]
    pub fn validator(mut self, check: impl Fn(&Value) -> bool + 'static) -> Self {
        self.validator = Some(Rc::new(check));
        self
    }
}

// ─── Computed, watch, inject ────────────────────────────────────────────

#[derive(Clone)]
pub struct ComputedDef {
    pub get: ComputedGetter,
    pub set: Option<ComputedSetter>,
}

#[derive(Clone)]
pub enum WatchHandler {
    Callback(WatchCallback),
    /// Name of a method invoked with `[new, old]`.
    Method(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchOptions {
    pub deep: bool,
    pub immediate: bool,
    pub sync: bool,
}

impl WatchOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn deep(mut self) -> Self {
        self.deep = true;
        self
    }

    #[must_use]
    pub fn immediate(mut self) -> Self {
        self.immediate = true;
        self
    }

    #[must_use]
    pub fn sync(mut self) -> Self {
        self.sync = true;
        self
    }
}

#[derive(Clone)]
pub struct WatchDef {
    pub handler: WatchHandler,
    pub options: WatchOptions,
}

#[derive(Debug, Clone)]
pub struct InjectDef {
    /// Provided key to look up.
    pub from: String,
    pub default: Option<DefaultValue>,
}

// ─── Component registry entries ─────────────────────────────────────────

/// What a name in `components` resolves to.
#[derive(Clone)]
pub enum Component {
    Def(ComponentDef),
    Async(AsyncComponent),
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::Def(def) => fmt::Debug::fmt(def, f),
            Component::Async(factory) => fmt::Debug::fmt(factory, f),
        }
    }
}

impl From<ComponentDef> for Component {
    fn from(def: ComponentDef) -> Self {
        Component::Def(def)
    }
}

impl From<&ComponentDef> for Component {
    fn from(def: &ComponentDef) -> Self {
        Component::Def(def.clone())
    }
}

impl From<AsyncComponent> for Component {
    fn from(factory: AsyncComponent) -> Self {
        Component::Async(factory)
    }
}

// ─── ComponentOptions ───────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct ComponentOptions {
    pub name: Option<String>,
    pub data: Option<DataFn>,
    pub props: IndexMap<String, PropOptions>,
    /// Prop values for an instance created directly rather than from a
    /// parent's render.
    pub props_data: Option<Obj>,
    pub computed: IndexMap<String, ComputedDef>,
    pub methods: IndexMap<String, MethodFn>,
    pub watch: IndexMap<String, Vec<WatchDef>>,
    pub hooks: IndexMap<Hook, Vec<HookFn>>,
    pub error_captured: Vec<ErrorCapturedFn>,
    pub components: IndexMap<String, Component>,
    pub provide: Option<ProvideFn>,
    pub inject: IndexMap<String, InjectDef>,
    pub render: Option<RenderFn>,
    pub static_render_fns: Vec<RenderFn>,
    pub template: Option<String>,
    pub delimiters: Option<(String, String)>,
    /// Abstract components are skipped when locating a logical parent.
    pub abstract_: bool,
    pub extends: Option<Rc<ComponentOptions>>,
    pub mixins: Vec<Rc<ComponentOptions>>,
}

impl fmt::Debug for ComponentOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentOptions")
            .field("name", &self.name)
            .field("props", &self.props.keys().collect::<Vec<_>>())
            .field("computed", &self.computed.keys().collect::<Vec<_>>())
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .field("watch", &self.watch.keys().collect::<Vec<_>>())
            .field("hooks", &self.hooks.keys().collect::<Vec<_>>())
            .field("components", &self.components.keys().collect::<Vec<_>>())
            .field("render", &self.render.is_some())
            .field("template", &self.template)
            .field("abstract", &self.abstract_)
            .finish_non_exhaustive()
    }
}

impl ComponentOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Per-instance state factory. Must return an object.
    #[must_use]
    pub fn data(mut self, data: impl Fn(&Instance) -> Result<Value, BoxError> + 'static) -> Self {
        self.data = Some(Rc::new(data));
        self
    }

    #[must_use]
    pub fn prop(mut self, name: impl Into<String>, options: PropOptions) -> Self {
        self.props.insert(name.into(), options);
        self
    }

    #[must_use]
    pub fn props_data(mut self, values: Obj) -> Self {
        self.props_data = Some(values);
        self
    }

    #[must_use]
    pub fn computed(
        mut self,
        name: impl Into<String>,
        get: impl Fn(&Instance) -> Result<Value, BoxError> + 'static,
    ) -> Self {
        self.computed.insert(
            name.into(),
            ComputedDef {
                get: Rc::new(get),
                set: None,
            },
        );
        self
    }

    #[must_use]
    pub fn computed_with_setter(
        mut self,
        name: impl Into<String>,
        get: impl Fn(&Instance) -> Result<Value, BoxError> + 'static,
        set: impl Fn(&Instance, Value) -> Result<(), BoxError> + 'static,
    ) -> Self {
        self.computed.insert(
            name.into(),
            ComputedDef {
                get: Rc::new(get),
                set: Some(Rc::new(set)),
            },
        );
        self
    }

    #[must_use]
    pub fn method(
        mut self,
        name: impl Into<String>,
        method: impl Fn(&Instance, &[Value]) -> Result<Value, BoxError> + 'static,
    ) -> Self {
        self.methods.insert(name.into(), Rc::new(method));
        self
    }

    #[must_use]
    pub fn watch(
        self,
        expression: impl Into<String>,
        callback: impl Fn(&Instance, &Value, &Value) -> Result<(), BoxError> + 'static,
    ) -> Self {
        self.watch_with(
            expression,
            WatchHandler::Callback(Rc::new(callback)),
            WatchOptions::default(),
        )
    }

    #[must_use]
    pub fn watch_with(
        mut self,
        expression: impl Into<String>,
        handler: WatchHandler,
        options: WatchOptions,
    ) -> Self {
        self.watch
            .entry(expression.into())
            .or_default()
            .push(WatchDef { handler, options });
        self
    }

    #[must_use]
    pub fn hook(
        mut self,
        hook: Hook,
        handler: impl Fn(&Instance) -> Result<(), BoxError> + 'static,
    ) -> Self {
        self.hooks.entry(hook).or_default().push(Rc::new(handler));
        self
    }

    #[must_use]
    pub fn error_captured(
        mut self,
        handler: impl Fn(&Instance, &BoxError, &str) -> Result<ErrorCapture, BoxError> + 'static,
    ) -> Self {
        self.error_captured.push(Rc::new(handler));
        self
    }

    #[must_use]
    pub fn component(mut self, name: impl Into<String>, component: impl Into<Component>) -> Self {
        self.components.insert(name.into(), component.into());
        self
    }

    #[must_use]
    pub fn provide(mut self, provide: impl Fn(&Instance) -> Result<Obj, BoxError> + 'static) -> Self {
        self.provide = Some(Rc::new(provide));
        self
    }

    /// Inject the value provided under `key`.
    #[must_use]
    pub fn inject(self, key: impl Into<String>) -> Self {
        let key = key.into();
        self.inject_from(key.clone(), key, None)
    }

    #[must_use]
    pub fn inject_from(
        mut self,
        key: impl Into<String>,
        from: impl Into<String>,
        default: Option<DefaultValue>,
    ) -> Self {
        self.inject.insert(
            key.into(),
            InjectDef {
                from: from.into(),
                default,
            },
        );
        self
    }

    #[must_use]
    pub fn render(
        mut self,
        render: impl Fn(&RenderContext<'_>) -> Result<VNode, BoxError> + 'static,
    ) -> Self {
        self.render = Some(Rc::new(render));
        self
    }

    #[must_use]
    pub fn static_render_fn(
        mut self,
        render: impl Fn(&RenderContext<'_>) -> Result<VNode, BoxError> + 'static,
    ) -> Self {
        self.static_render_fns.push(Rc::new(render));
        self
    }

    #[must_use]
    pub fn template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    #[must_use]
    pub fn delimiters(mut self, open: impl Into<String>, close: impl Into<String>) -> Self {
        self.delimiters = Some((open.into(), close.into()));
        self
    }

    #[must_use]
    pub fn abstract_(mut self, value: bool) -> Self {
        self.abstract_ = value;
        self
    }

    #[must_use]
    pub fn extends(mut self, base: impl Into<Rc<ComponentOptions>>) -> Self {
        self.extends = Some(base.into());
        self
    }

    #[must_use]
    pub fn mixin(mut self, mixin: impl Into<Rc<ComponentOptions>>) -> Self {
        self.mixins.push(mixin.into());
        self
    }

    /// Handlers registered for `hook`, in merge order.
    #[must_use]
    pub fn hook_handlers(&self, hook: Hook) -> &[HookFn] {
        self.hooks.get(&hook).map_or(&[], Vec::as_slice)
    }
}
