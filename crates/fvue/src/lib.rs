#![forbid(unsafe_code)]

//! fvue public facade crate.
//!
//! Re-exports the workspace crates under short names and gathers the types
//! most programs need into [`prelude`].
//!
//! ```ignore
//! use fvue::prelude::*;
//!
//! let vm = global::new_instance(
//!     ComponentOptions::new()
//!         .data(|_| Ok(Value::object([("count", Value::from(0))])))
//!         .render(|ctx| Ok(ctx.h("p", None, vec![ctx.text(ctx.get("count").to_display_string())]))),
//! )?;
//! vm.mount(&patcher, Some(container))?;
//! vm.set("count", 1);
//! tick::run_until_idle();
//! ```

pub use fvue_core as core;
#[cfg(feature = "harness")]
pub use fvue_harness as harness;
pub use fvue_reactive as reactive;
#[cfg(feature = "runtime")]
pub use fvue_runtime as runtime;
pub use fvue_vdom as vdom;

pub mod prelude {
    pub use fvue_core::{BoxError, Config, ErrorCapture, config};
    pub use fvue_reactive::{Arr, Obj, Value, Watcher, tick};
    pub use fvue_vdom::{NodeId, NodeOps, Patcher, VNode, VNodeData};

    #[cfg(feature = "harness")]
    pub use fvue_harness::MemoryHost;
    #[cfg(feature = "runtime")]
    pub use fvue_runtime::{
        AsyncComponent, Component, ComponentDef, ComponentOptions, Hook, Instance, PropOptions,
        PropType, RenderContext, WatchOptions, global,
    };
}

#[cfg(all(test, feature = "runtime"))]
mod tests {
    use super::prelude::*;

    #[test]
    fn prelude_covers_a_root_instance() {
        let vm = global::new_instance(
            ComponentOptions::new().data(|_| Ok(Value::object([("n", Value::from(1))]))),
        )
        .unwrap();
        assert_eq!(vm.get("n"), Value::from(1));
        vm.set("n", 2);
        tick::run_until_idle();
        assert_eq!(vm.get("n"), Value::from(2));
    }
}
