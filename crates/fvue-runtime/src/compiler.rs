#![forbid(unsafe_code)]

//! Boundary to an external template compiler.
//!
//! The runtime never parses templates. A compiler registered with
//! [`crate::global::set_compiler`] turns a template string into a render
//! function plus static-subtree render functions; results are cached per
//! `(delimiters, template)`.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use ahash::AHashMap;

use crate::options::RenderFn;

/// Options handed to [`TemplateCompiler::compile`].
#[derive(Clone)]
pub struct CompilerOptions {
    pub delimiters: Option<(String, String)>,
    pub preserve_whitespace: bool,
    pub is_reserved_tag: Rc<dyn Fn(&str) -> bool>,
}

impl fmt::Debug for CompilerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompilerOptions")
            .field("delimiters", &self.delimiters)
            .field("preserve_whitespace", &self.preserve_whitespace)
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
pub struct CompiledTemplate {
    pub render: RenderFn,
    pub static_render_fns: Vec<RenderFn>,
    pub errors: Vec<String>,
    pub tips: Vec<String>,
}

impl fmt::Debug for CompiledTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledTemplate")
            .field("static_render_fns", &self.static_render_fns.len())
            .field("errors", &self.errors)
            .field("tips", &self.tips)
            .finish_non_exhaustive()
    }
}

pub trait TemplateCompiler {
    fn compile(&self, template: &str, options: &CompilerOptions) -> CompiledTemplate;
}

type CacheKey = (Option<(String, String)>, String);

thread_local! {
    static CACHE: RefCell<AHashMap<CacheKey, Rc<CompiledTemplate>>> = RefCell::new(AHashMap::new());
}

/// Compile through `compiler`, reusing an earlier result for the same
/// template and delimiters.
pub fn compile_cached(
    compiler: &dyn TemplateCompiler,
    template: &str,
    options: &CompilerOptions,
) -> Rc<CompiledTemplate> {
    let key = (options.delimiters.clone(), template.to_string());
    if let Some(hit) = CACHE.with(|c| c.borrow().get(&key).cloned()) {
        return hit;
    }
    let compiled = Rc::new(compiler.compile(template, options));
    tracing::debug!(
        len = template.len(),
        errors = compiled.errors.len(),
        "template compiled"
    );
    CACHE.with(|c| c.borrow_mut().insert(key, Rc::clone(&compiled)));
    compiled
}

pub(crate) fn clear_cache() {
    CACHE.with(|c| c.borrow_mut().clear());
}

#[cfg(test)]
mod tests {
    use super::*;
    use fvue_vdom::VNode;
    use std::cell::Cell;

    struct Counting(Cell<u32>);

    impl TemplateCompiler for Counting {
        fn compile(&self, template: &str, _: &CompilerOptions) -> CompiledTemplate {
            self.0.set(self.0.get() + 1);
            let text = template.to_string();
            CompiledTemplate {
                render: Rc::new(move |_| Ok(VNode::text(&text))),
                static_render_fns: Vec::new(),
                errors: Vec::new(),
                tips: Vec::new(),
            }
        }
    }

    fn options(delimiters: Option<(&str, &str)>) -> CompilerOptions {
        CompilerOptions {
            delimiters: delimiters.map(|(a, b)| (a.to_string(), b.to_string())),
            preserve_whitespace: true,
            is_reserved_tag: Rc::new(|_| false),
        }
    }

    #[test]
    fn results_are_cached_per_template_and_delimiters() {
        clear_cache();
        let compiler = Counting(Cell::new(0));
        let a = compile_cached(&compiler, "<p>hi</p>", &options(None));
        let b = compile_cached(&compiler, "<p>hi</p>", &options(None));
        assert!(Rc::ptr_eq(&a, &b));
        assert_eq!(compiler.0.get(), 1);
        compile_cached(&compiler, "<p>hi</p>", &options(Some(("[[", "]]"))));
        assert_eq!(compiler.0.get(), 2);
        clear_cache();
    }
}
