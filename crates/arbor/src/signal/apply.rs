//! Eager, graph-memoized function application, and its asynchronous twin.
//!
//! Both store their result in the data graph, keyed by the combined identity
//! of their arguments: the function only re-runs when an argument's identity
//! changes, and a panic inside the user function latches a failed state
//! instead of propagating.

use std::cell::Ref;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::{Rc, Weak};

use crate::context::Context;
use crate::graph::CacheNode;
use crate::id::{CapturedId, ValueId, pair_id, simple_id};
use crate::system::SystemHandle;

use super::{ReadSignal, Signal, SignalRef, next_uid};

// --- apply ---

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApplyStatus {
    /// No result: arguments are unavailable, or nothing has run yet.
    Unready,
    /// The latest computation succeeded.
    Ready,
    /// The latest computation panicked; latched until the arguments change.
    Failed,
}

struct ApplyData<T> {
    uid: u64,
    key: CapturedId,
    version: u64,
    status: ApplyStatus,
    value: Option<T>,
}

impl<T> ApplyData<T> {
    fn new() -> Self {
        Self {
            uid: next_uid(),
            key: CapturedId::default(),
            version: 0,
            status: ApplyStatus::Unready,
            value: None,
        }
    }
}

/// The read-only result of [`apply`]/[`apply2`], backed by graph storage.
pub struct ApplySignal<T: 'static> {
    cell: Rc<CacheNode<ApplyData<T>>>,
}

impl<T: 'static> ApplySignal<T> {
    pub fn status(&self) -> ApplyStatus {
        self.cell
            .borrow()
            .as_ref()
            .map_or(ApplyStatus::Unready, |data| data.status)
    }
}

impl<T: 'static> Signal for ApplySignal<T> {
    type Value = T;
}

impl<T: 'static> ReadSignal for ApplySignal<T> {
    fn has_value(&self) -> bool {
        self.cell
            .borrow()
            .as_ref()
            .is_some_and(|data| data.status == ApplyStatus::Ready && data.value.is_some())
    }

    fn value_id(&self) -> ValueId {
        match self.cell.borrow().as_ref() {
            Some(data) if data.status == ApplyStatus::Ready => simple_id((data.uid, data.version)),
            _ => ValueId::Null,
        }
    }

    fn try_read(&self) -> Option<SignalRef<'_, T>> {
        Ref::filter_map(self.cell.borrow(), |slot| {
            slot.as_ref().and_then(|data| data.value.as_ref())
        })
        .ok()
        .map(SignalRef::Cell)
    }
}

fn process_apply<T: 'static>(
    cell: &Rc<CacheNode<ApplyData<T>>>,
    args_ready: bool,
    args_id: ValueId,
    compute: impl FnOnce() -> T,
) {
    let mut slot = cell.borrow_mut();
    let data = slot.get_or_insert_with(ApplyData::new);

    if !args_ready {
        data.status = ApplyStatus::Unready;
        data.value = None;
        data.key.clear();
        return;
    }
    // Memoized, including a latched failure. A null key never matches, so
    // arguments without a usable identity recompute every pass.
    if data.status != ApplyStatus::Unready && data.key.is_captured() && data.key.matches(&args_id) {
        return;
    }

    data.key.capture(&args_id);
    data.version += 1;
    match catch_unwind(AssertUnwindSafe(compute)) {
        Ok(value) => {
            data.status = ApplyStatus::Ready;
            data.value = Some(value);
        }
        Err(_) => {
            log::warn!("apply computation panicked; latching the failed state");
            data.status = ApplyStatus::Failed;
            data.value = None;
        }
    }
}

/// Apply `f` over `a`, memoized in the data graph: `f` re-runs only when the
/// argument's identity changes. The result signal's identity is an internal
/// version counter that bumps on every recomputation.
pub fn apply<F, A, T>(ctx: &mut Context, f: F, a: A) -> ApplySignal<T>
where
    A: ReadSignal,
    F: FnOnce(&A::Value) -> T,
    T: 'static,
{
    let cell = ctx.data_mut().get_cached::<ApplyData<T>>();
    process_apply(&cell, a.has_value(), a.value_id(), || f(&a.read()));
    ApplySignal { cell }
}

/// Two-argument [`apply`].
pub fn apply2<F, A, B, T>(ctx: &mut Context, f: F, a: A, b: B) -> ApplySignal<T>
where
    A: ReadSignal,
    B: ReadSignal,
    F: FnOnce(&A::Value, &B::Value) -> T,
    T: 'static,
{
    let cell = ctx.data_mut().get_cached::<ApplyData<T>>();
    process_apply(
        &cell,
        a.has_value() && b.has_value(),
        pair_id(a.value_id(), b.value_id()),
        || f(&a.read(), &b.read()),
    );
    ApplySignal { cell }
}

// --- async ---

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AsyncStatus {
    /// Not launched: arguments unavailable, or they changed since last time.
    Unready,
    /// The launcher ran; awaiting its report.
    Launched,
    /// A result arrived.
    Complete,
    /// The launcher panicked; latched until the arguments change.
    Failed,
}

struct AsyncData<T> {
    uid: u64,
    key: CapturedId,
    version: u64,
    status: AsyncStatus,
    value: Option<T>,
}

/// The result channel handed to an [`async_apply`] launcher.
pub struct AsyncReporter<T: 'static> {
    cell: Weak<CacheNode<AsyncData<T>>>,
    version: u64,
    system: SystemHandle,
}

impl<T: 'static> AsyncReporter<T> {
    /// Deliver the result and request a refresh.
    ///
    /// Must be called on the thread running the system. Stale reports (the
    /// input changed since this launch) are discarded.
    pub fn report(self, value: T) {
        let Some(cell) = self.cell.upgrade() else {
            return;
        };
        {
            let mut slot = cell.borrow_mut();
            let Some(data) = slot.as_mut() else { return };
            if data.version != self.version || data.status != AsyncStatus::Launched {
                log::trace!("discarding stale async result");
                return;
            }
            data.status = AsyncStatus::Complete;
            data.value = Some(value);
        }
        self.system.request_animation_refresh();
    }
}

/// The read-only result of [`async_apply`], backed by graph storage.
pub struct AsyncSignal<T: 'static> {
    cell: Rc<CacheNode<AsyncData<T>>>,
}

impl<T: 'static> AsyncSignal<T> {
    pub fn status(&self) -> AsyncStatus {
        self.cell
            .borrow()
            .as_ref()
            .map_or(AsyncStatus::Unready, |data| data.status)
    }
}

impl<T: 'static> Signal for AsyncSignal<T> {
    type Value = T;
}

impl<T: 'static> ReadSignal for AsyncSignal<T> {
    fn has_value(&self) -> bool {
        self.cell
            .borrow()
            .as_ref()
            .is_some_and(|data| data.status == AsyncStatus::Complete && data.value.is_some())
    }

    fn value_id(&self) -> ValueId {
        match self.cell.borrow().as_ref() {
            Some(data) if data.status == AsyncStatus::Complete => {
                simple_id((data.uid, data.version))
            }
            _ => ValueId::Null,
        }
    }

    fn try_read(&self) -> Option<SignalRef<'_, T>> {
        Ref::filter_map(self.cell.borrow(), |slot| {
            slot.as_ref().and_then(|data| data.value.as_ref())
        })
        .ok()
        .map(SignalRef::Cell)
    }
}

/// Launch external work keyed by the argument's identity.
///
/// Status transitions: `Unready` → `Launched` (on a refresh, once the
/// argument is available) → `Complete` (when the reporter fires) or `Failed`
/// (the launcher panicked). An argument identity change resets to `Unready`
/// and bumps the version, so reports from a superseded launch are discarded.
pub fn async_apply<F, A, T>(ctx: &mut Context, launcher: F, a: A) -> AsyncSignal<T>
where
    A: ReadSignal,
    F: FnOnce(AsyncReporter<T>, &A::Value),
    T: 'static,
{
    let is_refresh = ctx.event().is_refresh();
    let system = ctx.system().clone();
    let cell = ctx.data_mut().get_cached::<AsyncData<T>>();

    let launch_version = {
        let mut slot = cell.borrow_mut();
        let data = slot.get_or_insert_with(|| AsyncData {
            uid: next_uid(),
            key: CapturedId::default(),
            version: 0,
            status: AsyncStatus::Unready,
            value: None,
        });

        let args_id = a.value_id();
        if data.status != AsyncStatus::Unready
            && !(data.key.is_captured() && data.key.matches(&args_id))
        {
            log::trace!("async input changed; discarding in-flight work");
            data.status = AsyncStatus::Unready;
            data.value = None;
            data.key.clear();
        }

        if is_refresh && data.status == AsyncStatus::Unready && a.has_value() {
            data.key.capture(&args_id);
            data.version += 1;
            data.status = AsyncStatus::Launched;
            Some(data.version)
        } else {
            None
        }
    };

    if let Some(version) = launch_version {
        let reporter = AsyncReporter {
            cell: Rc::downgrade(&cell),
            version,
            system,
        };
        let launch = AssertUnwindSafe(|| launcher(reporter, &a.read()));
        if catch_unwind(launch).is_err() {
            log::warn!("async launcher panicked; latching the failed state");
            if let Some(data) = cell.borrow_mut().as_mut() {
                data.status = AsyncStatus::Failed;
                data.value = None;
            }
        }
    }

    AsyncSignal { cell }
}
