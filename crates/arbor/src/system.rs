//! The system: owns the data graph and the controller, and pumps events
//! through them.

use std::cell::RefCell;
use std::rc::Rc;

use crate::context::Context;
use crate::graph::{DataGraph, DataTraversal};
use crate::routing::{EventTraversal, RoutableNodeId};
use crate::timing::{Millis, Timing, steady_tick_count};
use crate::Flow;

/// Host hooks, both optional.
pub trait ExternalInterface {
    /// The system wants another refresh soon (an animation is running, or an
    /// async result arrived). Called at most once per batch.
    fn request_animation_refresh(&mut self) {}

    /// Monotonic milliseconds; free to wrap.
    fn tick_count(&self) -> Millis {
        steady_tick_count()
    }
}

struct SystemState {
    refresh_needed: bool,
    /// The external hook already fired for the current batch.
    external_notified: bool,
    in_traversal: bool,
    external: Option<Box<dyn ExternalInterface>>,
}

/// A cheap, clonable handle on the system, carried by the context.
#[derive(Clone)]
pub struct SystemHandle {
    state: Rc<RefCell<SystemState>>,
}

impl SystemHandle {
    /// Whether anything has asked for another refresh.
    pub fn refresh_needed(&self) -> bool {
        self.state.borrow().refresh_needed
    }

    /// Flag that another refresh is needed and notify the host, once per
    /// batch. Safe to call from inside a traversal; nested requests coalesce
    /// into the flag.
    pub fn request_animation_refresh(&self) {
        let mut state = self.state.borrow_mut();
        state.refresh_needed = true;
        if !state.external_notified {
            state.external_notified = true;
            if let Some(external) = state.external.as_mut() {
                external.request_animation_refresh();
            }
        }
    }

    fn tick_count(&self) -> Millis {
        let state = self.state.borrow();
        state
            .external
            .as_ref()
            .map_or_else(steady_tick_count, |external| external.tick_count())
    }
}

/// A declarative runtime: the data graph plus the controller traversing it.
pub struct System {
    graph: DataGraph,
    controller: Box<dyn FnMut(&mut Context) -> Flow>,
    handle: SystemHandle,
}

impl System {
    /// Build a system around `controller`, the function re-run once per
    /// event.
    ///
    /// The controller must be deterministic with respect to control flow:
    /// the same graph call sites in the same order on every pass, with
    /// anything conditional routed through the wrappers in
    /// [`crate::control`]. Side effects belong in actions and handlers.
    pub fn new(controller: impl FnMut(&mut Context) -> Flow + 'static) -> Self {
        Self {
            graph: DataGraph::new(),
            controller: Box::new(controller),
            handle: SystemHandle {
                state: Rc::new(RefCell::new(SystemState {
                    refresh_needed: false,
                    external_notified: false,
                    in_traversal: false,
                    external: None,
                })),
            },
        }
    }

    pub fn set_external(&mut self, external: Box<dyn ExternalInterface>) {
        self.handle.state.borrow_mut().external = Some(external);
    }

    pub fn handle(&self) -> SystemHandle {
        self.handle.clone()
    }

    pub fn refresh_needed(&self) -> bool {
        self.handle.refresh_needed()
    }

    /// Run a refresh pass: GC and cache clearing are enabled, and the
    /// holding list of any earlier aborted traversal is reclaimed.
    ///
    /// Called re-entrantly (from a handler), this coalesces into the
    /// refresh-needed flag instead of recursing.
    pub fn refresh(&mut self) {
        {
            let mut state = self.handle.state.borrow_mut();
            if state.in_traversal {
                state.refresh_needed = true;
                return;
            }
            state.refresh_needed = false;
            state.external_notified = false;
        }
        if self.route_event(EventTraversal::refresh()) {
            self.graph.reclaim_holding();
        }
    }

    /// Deliver an untargeted event to every region, then refresh. Returns
    /// the event back so handlers can answer through it.
    pub fn dispatch_event<E: 'static>(&mut self, event: E) -> E {
        let payload = Rc::new(RefCell::new(event));
        self.route_event(EventTraversal::user::<E>(payload.clone()));
        self.refresh();
        unwrap_payload(payload)
    }

    /// Deliver an event to the node registered under `target`, pruning every
    /// region not on the path, then refresh. Returns the event back.
    pub fn dispatch_targeted_event<E: 'static>(&mut self, event: E, target: &RoutableNodeId) -> E {
        let payload = Rc::new(RefCell::new(event));
        self.route_event(EventTraversal::targeted::<E>(payload.clone(), target.clone()));
        self.refresh();
        unwrap_payload(payload)
    }

    /// Run the controller under a fresh data traversal for `event`.
    /// Returns true if the traversal ran to completion (was not aborted).
    fn route_event(&mut self, event: EventTraversal) -> bool {
        let is_refresh = event.is_refresh();
        let data = DataTraversal::begin(&self.graph, is_refresh, is_refresh);
        let timing = Timing::new(self.handle.tick_count());
        let mut ctx = Context::new(self.handle.clone(), data, event, timing);

        let result = {
            let _guard = TraversalGuard(&self.handle);
            self.handle.state.borrow_mut().in_traversal = true;
            (self.controller)(&mut ctx)
        };
        if result.is_err() {
            log::trace!("traversal aborted");
        }
        ctx.into_data().finish(result.is_ok());
        result.is_ok()
    }
}

/// Clears the in-traversal flag even if the controller panics.
struct TraversalGuard<'a>(&'a SystemHandle);

impl Drop for TraversalGuard<'_> {
    fn drop(&mut self) {
        self.0.state.borrow_mut().in_traversal = false;
    }
}

fn unwrap_payload<E>(payload: Rc<RefCell<E>>) -> E {
    match Rc::try_unwrap(payload) {
        Ok(cell) => cell.into_inner(),
        Err(_) => panic!("event payload retained beyond its dispatch"),
    }
}
