//! Signals: values that change over time, with capability directions.
//!
//! A signal carries a payload and a stable *value identity*; the identity is
//! how the runtime decides whether anything downstream needs to recompute.
//! Direction is expressed through the trait system: [`ReadSignal`] and
//! [`WriteSignal`] are independent capabilities, and a duplex signal simply
//! implements both. Combinator impls narrow capabilities with `where`
//! clauses, so direction violations are compile errors rather than runtime
//! checks.
//!
//! Signals are scoped to a single traversal: they borrow their sources and
//! may be copied freely, but are not meant to be stored across passes (store
//! a [`crate::id::CapturedId`] or graph state instead).

mod apply;
mod combinators;
mod ops;

pub use apply::{
    ApplySignal, ApplyStatus, AsyncReporter, AsyncSignal, AsyncStatus, apply, apply2, async_apply,
};
pub use combinators::{
    And, Cast, Conditional, Fallback, FakeReadable, FakeWritable, HasValue, LazyApply1,
    LazyApply2, Mask, Or, Project, ReadyToWrite, SimplifyId, Subscript, add_fallback, and,
    conditional, fake_readability, fake_writability, has_value_signal, lazy_apply, lazy_apply2,
    mask, not, or, project, ready_to_write_signal, signal_cast, simplify_id, subscript,
};
pub use ops::{IntoReadSignal, Sig, sig, sig_eq, sig_ge, sig_gt, sig_le, sig_lt, sig_ne};

use std::cell::{Ref, RefCell};
use std::marker::PhantomData;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use once_cell::unsync::OnceCell;

use crate::context::Context;
use crate::graph::ValueNode;
use crate::id::{IdValue, ValueId, simple_id};

/// A write was rejected by the signal it was aimed at.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid input: {0}")]
    Invalid(String),
    #[error("value out of range")]
    OutOfRange,
}

/// Common base of all signals.
pub trait Signal {
    type Value: 'static;
}

/// A borrowed view of a signal's value.
pub enum SignalRef<'a, T> {
    Plain(&'a T),
    Cell(Ref<'a, T>),
}

impl<T> std::ops::Deref for SignalRef<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        match self {
            Self::Plain(value) => value,
            Self::Cell(value) => value,
        }
    }
}

impl<'a, T> SignalRef<'a, T> {
    /// Project the view onto a component of the value.
    pub fn map<U>(self, f: impl FnOnce(&T) -> &U) -> SignalRef<'a, U> {
        match self {
            Self::Plain(value) => SignalRef::Plain(f(value)),
            Self::Cell(value) => SignalRef::Cell(Ref::map(value, f)),
        }
    }
}

/// The read capability.
pub trait ReadSignal: Signal {
    fn has_value(&self) -> bool;

    /// The identity of the current value.
    ///
    /// Equal across two calls iff the value has not changed in between; a
    /// signal that doesn't know its value yet returns [`ValueId::Null`].
    fn value_id(&self) -> ValueId;

    fn try_read(&self) -> Option<SignalRef<'_, Self::Value>>;

    /// Read the value; only valid when [`Self::has_value`] is true.
    fn read(&self) -> SignalRef<'_, Self::Value> {
        match self.try_read() {
            Some(value) => value,
            None => panic!("signal read without a value available"),
        }
    }

    /// Clone the value out, if there is one.
    fn read_cloned(&self) -> Option<Self::Value>
    where
        Self::Value: Clone,
    {
        self.try_read().map(|value| (*value).clone())
    }
}

/// The write capability.
pub trait WriteSignal: Signal {
    fn ready_to_write(&self) -> bool;

    /// Write a value; only valid when [`Self::ready_to_write`] is true.
    ///
    /// A rejected write surfaces as [`ValidationError`]; the signal's value
    /// is unchanged in that case.
    fn write(&self, value: Self::Value) -> Result<(), ValidationError>;
}

// Signals compose by borrowing: a reference to a signal is a signal with
// the same capabilities, so combinators can hold `&s` instead of consuming.
impl<S: Signal> Signal for &S {
    type Value = S::Value;
}

impl<S: ReadSignal> ReadSignal for &S {
    fn has_value(&self) -> bool {
        (**self).has_value()
    }

    fn value_id(&self) -> ValueId {
        (**self).value_id()
    }

    fn try_read(&self) -> Option<SignalRef<'_, Self::Value>> {
        (**self).try_read()
    }
}

impl<S: WriteSignal> WriteSignal for &S {
    fn ready_to_write(&self) -> bool {
        (**self).ready_to_write()
    }

    fn write(&self, value: Self::Value) -> Result<(), ValidationError> {
        (**self).write(value)
    }
}

/// Process-wide counter for cells that need a stable identity of their own.
pub(crate) fn next_uid() -> u64 {
    static COUNTER: AtomicU64 = AtomicU64::new(1);
    COUNTER.fetch_add(1, Ordering::Relaxed)
}

// --- Basic signals ---

/// A signal with no value that is never ready to write.
pub struct Empty<T>(PhantomData<T>);

pub fn empty<T: 'static>() -> Empty<T> {
    Empty(PhantomData)
}

impl<T: 'static> Signal for Empty<T> {
    type Value = T;
}

impl<T: 'static> ReadSignal for Empty<T> {
    fn has_value(&self) -> bool {
        false
    }

    fn value_id(&self) -> ValueId {
        ValueId::Null
    }

    fn try_read(&self) -> Option<SignalRef<'_, T>> {
        None
    }
}

impl<T: 'static> WriteSignal for Empty<T> {
    fn ready_to_write(&self) -> bool {
        false
    }

    fn write(&self, _value: T) -> Result<(), ValidationError> {
        panic!("write to an empty signal");
    }
}

/// A read-only constant.
pub struct Val<T: IdValue> {
    value: T,
    id: OnceCell<ValueId>,
}

/// A read-only signal carrying `v`. Its identity is the value itself.
pub fn value<T: IdValue>(v: T) -> Val<T> {
    Val {
        value: v,
        id: OnceCell::new(),
    }
}

/// A read-only string literal signal.
pub fn text(s: &'static str) -> Val<&'static str> {
    value(s)
}

impl<T: IdValue> Signal for Val<T> {
    type Value = T;
}

impl<T: IdValue> ReadSignal for Val<T> {
    fn has_value(&self) -> bool {
        true
    }

    fn value_id(&self) -> ValueId {
        self.id
            .get_or_init(|| simple_id(self.value.clone()))
            .clone()
    }

    fn try_read(&self) -> Option<SignalRef<'_, T>> {
        Some(SignalRef::Plain(&self.value))
    }
}

/// A bidirectional view of an externally held cell.
pub struct Direct<'a, T> {
    cell: &'a RefCell<T>,
}

pub fn direct<T: IdValue>(cell: &RefCell<T>) -> Direct<'_, T> {
    Direct { cell }
}

impl<T: IdValue> Signal for Direct<'_, T> {
    type Value = T;
}

impl<T: IdValue> ReadSignal for Direct<'_, T> {
    fn has_value(&self) -> bool {
        true
    }

    fn value_id(&self) -> ValueId {
        simple_id(self.cell.borrow().clone())
    }

    fn try_read(&self) -> Option<SignalRef<'_, T>> {
        Some(SignalRef::Cell(self.cell.borrow()))
    }
}

impl<T: IdValue> WriteSignal for Direct<'_, T> {
    fn ready_to_write(&self) -> bool {
        true
    }

    fn write(&self, value: T) -> Result<(), ValidationError> {
        *self.cell.borrow_mut() = value;
        Ok(())
    }
}

/// A read-only signal computed by a closure, evaluated lazily (once per
/// signal lifetime). It cannot vouch for an identity, so it reports
/// [`ValueId::Null`] and downstream caches treat it as always-changed.
pub struct Getter<F, T> {
    f: F,
    cache: OnceCell<T>,
}

pub fn getter<F, T>(f: F) -> Getter<F, T>
where
    F: Fn() -> T,
    T: 'static,
{
    Getter {
        f,
        cache: OnceCell::new(),
    }
}

impl<F, T: 'static> Signal for Getter<F, T> {
    type Value = T;
}

impl<F, T> ReadSignal for Getter<F, T>
where
    F: Fn() -> T,
    T: 'static,
{
    fn has_value(&self) -> bool {
        true
    }

    fn value_id(&self) -> ValueId {
        ValueId::Null
    }

    fn try_read(&self) -> Option<SignalRef<'_, T>> {
        Some(SignalRef::Plain(self.cache.get_or_init(|| (self.f)())))
    }
}

/// A write-only signal backed by a closure, always ready.
pub struct Setter<F, T> {
    f: F,
    _marker: PhantomData<fn(T)>,
}

pub fn setter<F, T>(f: F) -> Setter<F, T>
where
    F: Fn(T),
    T: 'static,
{
    Setter {
        f,
        _marker: PhantomData,
    }
}

impl<F, T: 'static> Signal for Setter<F, T> {
    type Value = T;
}

impl<F, T> WriteSignal for Setter<F, T>
where
    F: Fn(T),
    T: 'static,
{
    fn ready_to_write(&self) -> bool {
        true
    }

    fn write(&self, value: T) -> Result<(), ValidationError> {
        (self.f)(value);
        Ok(())
    }
}

// --- Graph-backed state ---

struct StateData<T> {
    uid: u64,
    version: u64,
    value: T,
}

/// Persistent per-node state, stored in the data graph.
///
/// The identity is `(cell uid, version)`: it changes on every write and on
/// nothing else, so downstream caches invalidate exactly when the state
/// does.
pub struct StateSignal<T: 'static> {
    node: Rc<ValueNode<StateData<T>>>,
}

impl<T> Clone for StateSignal<T> {
    fn clone(&self) -> Self {
        Self {
            node: self.node.clone(),
        }
    }
}

/// Attach (or find) a state cell at the current graph position.
///
/// `init` runs only the first time this call site is reached.
pub fn state<T: 'static>(ctx: &mut Context, init: impl FnOnce() -> T) -> StateSignal<T> {
    let (node, _fresh) = ctx.data_mut().get_data(|| StateData {
        uid: next_uid(),
        version: 0,
        value: init(),
    });
    StateSignal { node }
}

impl<T: 'static> Signal for StateSignal<T> {
    type Value = T;
}

impl<T: 'static> ReadSignal for StateSignal<T> {
    fn has_value(&self) -> bool {
        true
    }

    fn value_id(&self) -> ValueId {
        let data = self.node.borrow();
        simple_id((data.uid, data.version))
    }

    fn try_read(&self) -> Option<SignalRef<'_, T>> {
        Some(SignalRef::Cell(Ref::map(
            self.node.borrow(),
            |data| &data.value,
        )))
    }
}

impl<T: 'static> WriteSignal for StateSignal<T> {
    fn ready_to_write(&self) -> bool {
        true
    }

    fn write(&self, value: T) -> Result<(), ValidationError> {
        let mut data = self.node.borrow_mut();
        data.value = value;
        data.version += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_signal_identity_tracks_the_value() {
        let a = value(3);
        let b = value(3);
        let c = value(4);
        assert!(a.has_value());
        assert_eq!(*a.read(), 3);
        assert_eq!(a.value_id(), b.value_id());
        assert_ne!(a.value_id(), c.value_id());
    }

    #[test]
    fn empty_signal_has_neither_capability_usable() {
        let s = empty::<i32>();
        assert!(!s.has_value());
        assert!(s.value_id().is_null());
        assert!(s.try_read().is_none());
        assert!(!s.ready_to_write());
    }

    #[test]
    fn direct_signal_views_the_cell() {
        let cell = RefCell::new(5);
        {
            let s = direct(&cell);
            let before = s.value_id();
            assert_eq!(*s.read(), 5);
            s.write(6).unwrap();
            assert_ne!(s.value_id(), before);
        }
        assert_eq!(cell.into_inner(), 6);
    }

    #[test]
    fn setter_forwards_writes() {
        use std::cell::Cell;
        let sink = Cell::new(0);
        let s = setter(|v: i32| sink.set(v));
        assert!(s.ready_to_write());
        s.write(8).unwrap();
        assert_eq!(sink.get(), 8);
    }

    #[test]
    fn getter_is_lazy_and_cached() {
        use std::cell::Cell;
        let runs = Cell::new(0);
        let s = getter(|| {
            runs.set(runs.get() + 1);
            42
        });
        assert_eq!(runs.get(), 0);
        assert_eq!(*s.read(), 42);
        assert_eq!(*s.read(), 42);
        assert_eq!(runs.get(), 1);
    }
}
