#![forbid(unsafe_code)]

//! Components whose definition arrives later.
//!
//! An [`AsyncComponent`] wraps a factory that is called once, on first
//! render, with an [`AsyncResolver`]. Until the factory resolves, every
//! render of the component yields the loading component (when configured)
//! or an empty placeholder node. Each instance that rendered it while
//! pending is re-rendered when the factory settles.
//!
//! # Invariants
//!
//! 1. The factory runs at most once per `AsyncComponent`.
//! 2. `resolve` and `reject` each take effect at most once; a resolution
//!    made synchronously inside the factory is used by the same render
//!    without forcing another.
//! 3. Placeholders for the same pending component compare equal in the
//!    patcher, so re-renders before resolution keep the same host node.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use fvue_core::{BoxError, debug};
use fvue_vdom::{AsyncPlaceholder, VNode, VNodeData};

use crate::definition::ComponentDef;
use crate::global;
use crate::instance::{Instance, WeakInstance};
use crate::options::ComponentOptions;

pub type AsyncFactory = Rc<dyn Fn(AsyncResolver) -> Result<(), BoxError>>;

#[derive(Default)]
struct AsyncState {
    resolved: Option<ComponentDef>,
    failed: bool,
    loading: bool,
    /// Instances waiting on the factory; `None` until the factory ran.
    contexts: Option<Vec<WeakInstance>>,
}

pub(crate) struct AsyncInner {
    name: Option<String>,
    factory: AsyncFactory,
    loading_component: Option<ComponentDef>,
    error_component: Option<ComponentDef>,
    state: RefCell<AsyncState>,
}

impl AsyncInner {
    fn force_render(&self) {
        let contexts = self.state.borrow().contexts.clone().unwrap_or_default();
        for context in contexts {
            if let Some(vm) = context.upgrade() {
                vm.force_update();
            }
        }
    }
}

impl AsyncPlaceholder for AsyncInner {
    fn is_resolved(&self) -> bool {
        self.state.borrow().resolved.is_some()
    }

    fn has_failed(&self) -> bool {
        self.state.borrow().failed
    }
}

/// A lazily resolved component.
#[derive(Clone)]
pub struct AsyncComponent(Rc<AsyncInner>);

impl fmt::Debug for AsyncComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.0.state.borrow();
        f.debug_struct("AsyncComponent")
            .field("name", &self.0.name)
            .field("resolved", &state.resolved.as_ref().map(ComponentDef::cid))
            .field("failed", &state.failed)
            .finish_non_exhaustive()
    }
}

impl AsyncComponent {
    pub fn new(factory: impl Fn(AsyncResolver) -> Result<(), BoxError> + 'static) -> Self {
        Self::builder(factory).build()
    }

    pub fn builder(
        factory: impl Fn(AsyncResolver) -> Result<(), BoxError> + 'static,
    ) -> AsyncComponentBuilder {
        AsyncComponentBuilder {
            name: None,
            factory: Rc::new(factory),
            loading_component: None,
            error_component: None,
        }
    }

    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.0.is_resolved()
    }

    #[must_use]
    pub fn has_failed(&self) -> bool {
        self.0.has_failed()
    }

    #[must_use]
    pub fn resolved(&self) -> Option<ComponentDef> {
        self.0.state.borrow().resolved.clone()
    }

    pub(crate) fn placeholder(&self, data: Option<VNodeData>) -> VNode {
        let factory: Rc<dyn AsyncPlaceholder> = self.0.clone();
        VNode::async_placeholder(factory, data)
    }
}

pub struct AsyncComponentBuilder {
    name: Option<String>,
    factory: AsyncFactory,
    loading_component: Option<ComponentDef>,
    error_component: Option<ComponentDef>,
}

impl AsyncComponentBuilder {
    /// Name used in failure warnings.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Rendered while the factory is pending.
    #[must_use]
    pub fn loading(mut self, component: ComponentDef) -> Self {
        self.loading_component = Some(component);
        self
    }

    /// Rendered once the factory rejects.
    #[must_use]
    pub fn error(mut self, component: ComponentDef) -> Self {
        self.error_component = Some(component);
        self
    }

    #[must_use]
    pub fn build(self) -> AsyncComponent {
        AsyncComponent(Rc::new(AsyncInner {
            name: self.name,
            factory: self.factory,
            loading_component: self.loading_component,
            error_component: self.error_component,
            state: RefCell::new(AsyncState::default()),
        }))
    }
}

/// Settles an [`AsyncComponent`]. Cloneable; only the first `resolve` and
/// the first `reject` across clones have an effect.
#[derive(Clone)]
pub struct AsyncResolver {
    target: Weak<AsyncInner>,
    sync: Rc<Cell<bool>>,
    resolved: Rc<Cell<bool>>,
    rejected: Rc<Cell<bool>>,
}

impl fmt::Debug for AsyncResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncResolver")
            .field("resolved", &self.resolved.get())
            .field("rejected", &self.rejected.get())
            .finish_non_exhaustive()
    }
}

impl AsyncResolver {
    pub fn resolve(&self, def: ComponentDef) {
        if self.resolved.replace(true) {
            return;
        }
        let Some(inner) = self.target.upgrade() else {
            return;
        };
        inner.state.borrow_mut().resolved = Some(def);
        inner.state.borrow_mut().loading = false;
        tracing::debug!(name = inner.name.as_deref(), "async component resolved");
        if !self.sync.get() {
            inner.force_render();
        }
    }

    /// Resolve with plain options, extended from the global base.
    pub fn resolve_options(&self, options: ComponentOptions) {
        self.resolve(global::extend(options));
    }

    pub fn reject(&self, reason: impl fmt::Display) {
        if self.rejected.replace(true) {
            return;
        }
        let Some(inner) = self.target.upgrade() else {
            return;
        };
        debug::warn(
            &format!(
                "Failed to resolve async component: {}\nReason: {reason}",
                inner.name.as_deref().unwrap_or("anonymous")
            ),
            None,
        );
        if inner.error_component.is_some() {
            inner.state.borrow_mut().failed = true;
            inner.force_render();
        }
    }
}

/// The definition to render for `factory` now, or `None` for a placeholder.
/// Runs the factory on first call.
pub(crate) fn resolve_async_component(factory: &AsyncComponent, context: &Instance) -> Option<ComponentDef> {
    let inner = &factory.0;
    {
        let state = inner.state.borrow();
        if state.failed {
            if let Some(error) = &inner.error_component {
                return Some(error.clone());
            }
        }
        if let Some(resolved) = &state.resolved {
            return Some(resolved.clone());
        }
        if state.loading {
            if let Some(loading) = &inner.loading_component {
                return Some(loading.clone());
            }
        }
    }

    {
        let mut state = inner.state.borrow_mut();
        if let Some(contexts) = state.contexts.as_mut() {
            contexts.push(context.downgrade());
            return None;
        }
        state.contexts = Some(vec![context.downgrade()]);
    }

    let resolver = AsyncResolver {
        target: Rc::downgrade(inner),
        sync: Rc::new(Cell::new(true)),
        resolved: Rc::new(Cell::new(false)),
        rejected: Rc::new(Cell::new(false)),
    };
    let factory_fn = Rc::clone(&inner.factory);
    if let Err(err) = factory_fn(resolver.clone()) {
        resolver.reject(err);
    }
    {
        let mut state = inner.state.borrow_mut();
        if inner.loading_component.is_some() && state.resolved.is_none() && !state.failed {
            state.loading = true;
        }
    }
    resolver.sync.set(false);

    let state = inner.state.borrow();
    if state.loading {
        inner.loading_component.clone()
    } else {
        state.resolved.clone()
    }
}
