//! A declarative immediate-mode reactive runtime.
//!
//! An application describes its UI (or any computation tree) as a single
//! *controller* function that the system re-runs once per event. The runtime
//! transparently attaches persistent state, cached results and event
//! delivery to each logical node the controller visits:
//!
//! * the **data graph** ([`graph`]) stores per-node state keyed by the
//!   control-flow path, with identity-keyed *named blocks* for collections
//!   that reorder, and garbage collection on refresh;
//! * **signals** ([`signal`]) are values-over-time with a stable *value
//!   identity* and statically-checked read/write capability directions;
//! * **actions** ([`action`]) are deferred effects with latched
//!   read-then-write semantics;
//! * **events** ([`routing`], [`system`]) re-run the controller for
//!   refreshes, broadcast events and targeted events, pruning traversal
//!   through a hierarchical region tree.
//!
//! ```
//! use arbor::System;
//! use arbor::action::{self, Action as _};
//! use arbor::{routing, signal};
//!
//! struct Click;
//!
//! let mut system = System::new(|ctx| {
//!     let count = signal::state(ctx, || 0_i32);
//!     routing::on_event::<Click, _>(ctx, |_ctx, _click| {
//!         action::increment(count.clone(), 1).perform(&mut || {}, ());
//!         Ok(())
//!     })?;
//!     Ok(())
//! });
//!
//! system.refresh();
//! system.dispatch_event(Click);
//! ```

pub mod action;
pub mod context;
pub mod control;
pub mod graph;
pub mod id;
pub mod routing;
pub mod signal;
pub mod system;
pub mod text;
pub mod timing;

/// The sentinel carried by an aborted traversal.
///
/// Not an error: targeted delivery aborts on purpose once the target has
/// been reached, and only the top-level dispatcher consumes it. Traversal
/// code propagates it with `?`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Abort;

/// The result type threaded through every traversal function.
pub type Flow<T = ()> = Result<T, Abort>;

pub use context::{ComponentError, Context};
pub use graph::DataGraph;
pub use id::{CapturedId, ValueId, null_id, pair_id, simple_id, unit_id};
pub use routing::{RoutableNodeId, make_routable, on_event, on_refresh, on_targeted_event};
pub use signal::{ReadSignal, Signal, ValidationError, WriteSignal};
pub use system::{ExternalInterface, System, SystemHandle};
pub use timing::{Millis, ticks_left_until};
