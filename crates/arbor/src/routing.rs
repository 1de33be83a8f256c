//! Typed event dispatch and hierarchical routing.
//!
//! Every dispatch re-runs the controller. Untargeted events visit the whole
//! tree and handlers opt in by payload type; targeted events carry a routable
//! node identity, and the region tree lets the traversal prune every subtree
//! that is not on the path to the target.

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::rc::{Rc, Weak};

use smallvec::SmallVec;

use crate::context::Context;
use crate::id::ValueId;
use crate::{Abort, Flow};

/// How a traversal was triggered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventKind {
    /// The refresh pass: GC and cache clearing are enabled, observation
    /// side effects run.
    Refresh,
    /// A user-defined event, targeted or not.
    User,
}

/// A node in the per-traversal region tree. Region records persist in the
/// graph; their parent links are rebuilt on every traversal.
#[derive(Default)]
pub struct RoutingRegion {
    parent: RefCell<Option<Rc<RoutingRegion>>>,
}

/// A node identity packaged with the routing region that was active when the
/// node was observed. This is what targeted events aim at.
#[derive(Clone)]
pub struct RoutableNodeId {
    id: ValueId,
    region: Option<Weak<RoutingRegion>>,
}

impl RoutableNodeId {
    #[inline]
    pub fn id(&self) -> &ValueId {
        &self.id
    }
}

type RegionPath = SmallVec<[Rc<RoutingRegion>; 8]>;

/// State for one event dispatch.
pub struct EventTraversal {
    kind: EventKind,
    type_id: TypeId,
    payload: Option<Rc<RefCell<dyn Any>>>,
    target: Option<RoutableNodeId>,
    /// Root-first chain of regions leading to the target.
    path: RegionPath,
    /// How much of `path` has been consumed by region guards.
    path_pos: usize,
    active_region: Option<Rc<RoutingRegion>>,
}

/// Marker payload type for refresh passes.
struct RefreshEvent;

impl EventTraversal {
    pub(crate) fn refresh() -> Self {
        Self {
            kind: EventKind::Refresh,
            type_id: TypeId::of::<RefreshEvent>(),
            payload: None,
            target: None,
            path: RegionPath::new(),
            path_pos: 0,
            active_region: None,
        }
    }

    pub(crate) fn user<E: 'static>(payload: Rc<RefCell<E>>) -> Self {
        Self {
            kind: EventKind::User,
            type_id: TypeId::of::<E>(),
            payload: Some(payload as Rc<RefCell<dyn Any>>),
            target: None,
            path: RegionPath::new(),
            path_pos: 0,
            active_region: None,
        }
    }

    pub(crate) fn targeted<E: 'static>(payload: Rc<RefCell<E>>, target: RoutableNodeId) -> Self {
        // Walk the parent chain (left over from the previous traversal) to
        // build the root-first path the region guards will consume.
        let mut path = RegionPath::new();
        let mut cursor = target.region.as_ref().and_then(Weak::upgrade);
        while let Some(region) = cursor {
            cursor = region.parent.borrow().clone();
            path.push(region);
        }
        path.reverse();
        log::trace!("targeted dispatch: routing depth {}", path.len());

        Self {
            kind: EventKind::User,
            type_id: TypeId::of::<E>(),
            payload: Some(payload as Rc<RefCell<dyn Any>>),
            target: Some(target),
            path,
            path_pos: 0,
            active_region: None,
        }
    }

    #[inline]
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    #[inline]
    pub fn is_refresh(&self) -> bool {
        self.kind == EventKind::Refresh
    }

    #[inline]
    pub fn is_targeted(&self) -> bool {
        self.target.is_some()
    }

    fn target_id(&self) -> Option<&ValueId> {
        self.target.as_ref().map(RoutableNodeId::id)
    }

    fn payload_for<E: 'static>(&self) -> Option<Rc<RefCell<dyn Any>>> {
        (self.type_id == TypeId::of::<E>()).then(|| self.payload.clone()).flatten()
    }
}

/// Establish a routing region around `body`.
///
/// The body runs unless this dispatch is targeted somewhere outside the
/// region, in which case the whole subtree is pruned. The body gets its own
/// data block, so pruning skips its graph slots as a unit and the
/// surrounding slot sequence stays aligned.
pub fn routing_region(ctx: &mut Context, body: impl FnOnce(&mut Context) -> Flow) -> Flow {
    let (node, _) = ctx
        .data_mut()
        .get_data(|| Rc::new(RoutingRegion::default()));
    let region = node.borrow().clone();
    let block = ctx.data_mut().get_block();

    let event = ctx.event_mut();
    *region.parent.borrow_mut() = event.active_region.clone();

    let relevant = if event.is_targeted() {
        if event.path_pos < event.path.len() {
            // Relevant only if this region is the next step towards the
            // target; consuming the step prunes every sibling.
            if Rc::ptr_eq(&event.path[event.path_pos], &region) {
                event.path_pos += 1;
                true
            } else {
                false
            }
        } else {
            // Inside the target's own region.
            true
        }
    } else {
        true
    };

    if !relevant {
        return Ok(());
    }

    let saved = event.active_region.replace(region);
    let scope = ctx.data_mut().open_block(block);
    let result = body(ctx);
    ctx.data_mut().close_block(scope, result.is_err());
    ctx.event_mut().active_region = saved;
    result
}

/// Package `id` with the currently active routing region.
pub fn make_routable(ctx: &Context, id: &ValueId) -> RoutableNodeId {
    RoutableNodeId {
        id: id.clone(),
        region: ctx.event().active_region.as_ref().map(Rc::downgrade),
    }
}

/// Run `f` only during a refresh pass.
///
/// Handler bodies run for some event kinds and not others, so they must not
/// allocate graph slots of their own (no `state`, `apply`, block wrappers):
/// that would make the slot sequence depend on the event kind. Capture
/// signals outside and use them inside.
pub fn on_refresh(ctx: &mut Context, f: impl FnOnce(&mut Context) -> Flow) -> Flow {
    if ctx.event().is_refresh() {
        f(ctx)
    } else {
        Ok(())
    }
}

/// Run `f` with the event payload if this dispatch is an untargeted event of
/// type `E`.
///
/// Same rule as [`on_refresh`]: the body must not allocate graph slots.
pub fn on_event<E, F>(ctx: &mut Context, f: F) -> Flow
where
    E: 'static,
    F: FnOnce(&mut Context, &mut E) -> Flow,
{
    let payload = {
        let event = ctx.event();
        if event.kind() == EventKind::User && !event.is_targeted() {
            event.payload_for::<E>()
        } else {
            None
        }
    };
    match payload {
        Some(cell) => {
            let mut payload = cell.borrow_mut();
            let event = payload
                .downcast_mut::<E>()
                .unwrap_or_else(|| unreachable!("event payload stored under foreign type id"));
            f(ctx, event)
        }
        None => Ok(()),
    }
}

/// Run `f` with the event payload if this dispatch is a targeted event of
/// type `E` aimed at `node`, then abort the traversal: nothing after the
/// target needs to run.
pub fn on_targeted_event<E, F>(ctx: &mut Context, node: &RoutableNodeId, f: F) -> Flow
where
    E: 'static,
    F: FnOnce(&mut Context, &mut E) -> Flow,
{
    let payload = {
        let event = ctx.event();
        if event.kind() == EventKind::User && event.target_id() == Some(node.id()) {
            event.payload_for::<E>()
        } else {
            None
        }
    };
    match payload {
        Some(cell) => {
            {
                let mut payload = cell.borrow_mut();
                let event = payload
                    .downcast_mut::<E>()
                    .unwrap_or_else(|| unreachable!("event payload stored under foreign type id"));
                f(ctx, event)?;
            }
            Err(Abort)
        }
        None => Ok(()),
    }
}
