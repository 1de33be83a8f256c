//! Signal combinators.
//!
//! All of these are lazy, allocation-free and borrowing: they hold their
//! operands by value and compute on demand, caching at most one result for
//! the lifetime of the signal (one traversal).

use std::any::TypeId;
use std::marker::PhantomData;

use once_cell::unsync::OnceCell;

use crate::id::{IdValue, ValueId, pair_id, simple_id};

use super::{ReadSignal, Signal, SignalRef, ValidationError, WriteSignal};

// --- lazy application ---

/// Read-only application of `f` over one signal; see [`lazy_apply`].
pub struct LazyApply1<F, A, T> {
    f: F,
    a: A,
    cache: OnceCell<T>,
}

/// Apply `f` lazily over `a`. The identity is the argument's identity; the
/// result is computed on first read and cached for the signal's lifetime.
pub fn lazy_apply<F, A, T>(f: F, a: A) -> LazyApply1<F, A, T>
where
    A: ReadSignal,
    F: Fn(&A::Value) -> T,
    T: 'static,
{
    LazyApply1 {
        f,
        a,
        cache: OnceCell::new(),
    }
}

impl<F, A, T: 'static> Signal for LazyApply1<F, A, T> {
    type Value = T;
}

impl<F, A, T> ReadSignal for LazyApply1<F, A, T>
where
    A: ReadSignal,
    F: Fn(&A::Value) -> T,
    T: 'static,
{
    fn has_value(&self) -> bool {
        self.a.has_value()
    }

    fn value_id(&self) -> ValueId {
        self.a.value_id()
    }

    fn try_read(&self) -> Option<SignalRef<'_, T>> {
        if !self.a.has_value() {
            return None;
        }
        Some(SignalRef::Plain(
            self.cache.get_or_init(|| (self.f)(&self.a.read())),
        ))
    }
}

/// Read-only application of `f` over two signals; see [`lazy_apply2`].
pub struct LazyApply2<F, A, B, T> {
    f: F,
    a: A,
    b: B,
    cache: OnceCell<T>,
}

/// Apply `f` lazily over `a` and `b`. The identity is the structural
/// combination of the arguments' identities.
pub fn lazy_apply2<F, A, B, T>(f: F, a: A, b: B) -> LazyApply2<F, A, B, T>
where
    A: ReadSignal,
    B: ReadSignal,
    F: Fn(&A::Value, &B::Value) -> T,
    T: 'static,
{
    LazyApply2 {
        f,
        a,
        b,
        cache: OnceCell::new(),
    }
}

impl<F, A, B, T: 'static> Signal for LazyApply2<F, A, B, T> {
    type Value = T;
}

impl<F, A, B, T> ReadSignal for LazyApply2<F, A, B, T>
where
    A: ReadSignal,
    B: ReadSignal,
    F: Fn(&A::Value, &B::Value) -> T,
    T: 'static,
{
    fn has_value(&self) -> bool {
        self.a.has_value() && self.b.has_value()
    }

    fn value_id(&self) -> ValueId {
        pair_id(self.a.value_id(), self.b.value_id())
    }

    fn try_read(&self) -> Option<SignalRef<'_, T>> {
        if !self.has_value() {
            return None;
        }
        Some(SignalRef::Plain(
            self.cache
                .get_or_init(|| (self.f)(&self.a.read(), &self.b.read())),
        ))
    }
}

// --- conditional ---

/// Value and writes dispatched by a boolean condition; see [`conditional`].
pub struct Conditional<C, T, F> {
    condition: C,
    on_true: T,
    on_false: F,
}

/// `on_true` when the condition reads true, `on_false` when it reads false,
/// nothing while the condition is unavailable. The direction is the
/// intersection of the two arms' directions (enforced by the trait bounds).
pub fn conditional<C, T, F>(condition: C, on_true: T, on_false: F) -> Conditional<C, T, F>
where
    C: ReadSignal<Value = bool>,
    T: Signal,
    F: Signal<Value = T::Value>,
{
    Conditional {
        condition,
        on_true,
        on_false,
    }
}

impl<C: ReadSignal<Value = bool>, T, F> Conditional<C, T, F> {
    fn branch(&self) -> Option<bool> {
        self.condition.try_read().map(|taken| *taken)
    }
}

impl<C, T, F> Signal for Conditional<C, T, F>
where
    C: Signal,
    T: Signal,
    F: Signal<Value = T::Value>,
{
    type Value = T::Value;
}

impl<C, T, F> ReadSignal for Conditional<C, T, F>
where
    C: ReadSignal<Value = bool>,
    T: ReadSignal,
    F: ReadSignal<Value = T::Value>,
{
    fn has_value(&self) -> bool {
        match self.branch() {
            Some(true) => self.on_true.has_value(),
            Some(false) => self.on_false.has_value(),
            None => false,
        }
    }

    fn value_id(&self) -> ValueId {
        match self.branch() {
            Some(true) => pair_id(simple_id(true), self.on_true.value_id()),
            Some(false) => pair_id(simple_id(false), self.on_false.value_id()),
            None => ValueId::Null,
        }
    }

    fn try_read(&self) -> Option<SignalRef<'_, Self::Value>> {
        match self.branch()? {
            true => self.on_true.try_read(),
            false => self.on_false.try_read(),
        }
    }
}

impl<C, T, F> WriteSignal for Conditional<C, T, F>
where
    C: ReadSignal<Value = bool>,
    T: WriteSignal,
    F: WriteSignal<Value = T::Value>,
{
    fn ready_to_write(&self) -> bool {
        match self.branch() {
            Some(true) => self.on_true.ready_to_write(),
            Some(false) => self.on_false.ready_to_write(),
            None => false,
        }
    }

    fn write(&self, value: Self::Value) -> Result<(), ValidationError> {
        match self.branch() {
            Some(true) => self.on_true.write(value),
            Some(false) => self.on_false.write(value),
            None => panic!("write to a conditional whose condition is unavailable"),
        }
    }
}

// --- fallback ---

/// `primary` when it has a value, `fallback` otherwise; see [`add_fallback`].
pub struct Fallback<A, B> {
    primary: A,
    fallback: B,
}

/// Reads fall back to `fallback` when `primary` has no value; writes always
/// go to `primary`.
pub fn add_fallback<A, B>(primary: A, fallback: B) -> Fallback<A, B>
where
    A: Signal,
    B: Signal<Value = A::Value>,
{
    Fallback { primary, fallback }
}

impl<A, B> Signal for Fallback<A, B>
where
    A: Signal,
    B: Signal<Value = A::Value>,
{
    type Value = A::Value;
}

impl<A, B> ReadSignal for Fallback<A, B>
where
    A: ReadSignal,
    B: ReadSignal<Value = A::Value>,
{
    fn has_value(&self) -> bool {
        self.primary.has_value() || self.fallback.has_value()
    }

    fn value_id(&self) -> ValueId {
        // The source flag is part of the identity: switching sources is a
        // change even if the two ids happen to collide.
        if self.primary.has_value() {
            pair_id(simple_id(true), self.primary.value_id())
        } else if self.fallback.has_value() {
            pair_id(simple_id(false), self.fallback.value_id())
        } else {
            ValueId::Null
        }
    }

    fn try_read(&self) -> Option<SignalRef<'_, Self::Value>> {
        if self.primary.has_value() {
            self.primary.try_read()
        } else {
            self.fallback.try_read()
        }
    }
}

impl<A, B> WriteSignal for Fallback<A, B>
where
    A: WriteSignal,
    B: Signal<Value = A::Value>,
{
    fn ready_to_write(&self) -> bool {
        self.primary.ready_to_write()
    }

    fn write(&self, value: Self::Value) -> Result<(), ValidationError> {
        self.primary.write(value)
    }
}

// --- mask ---

/// `signal` while `condition` reads true, inert otherwise; see [`mask`].
pub struct Mask<S, C> {
    signal: S,
    condition: C,
}

/// Identical to `signal` when `condition` has the value true; otherwise the
/// result has no value and is not ready to write.
pub fn mask<S, C>(signal: S, condition: C) -> Mask<S, C>
where
    S: Signal,
    C: ReadSignal<Value = bool>,
{
    Mask { signal, condition }
}

impl<S, C: ReadSignal<Value = bool>> Mask<S, C> {
    fn active(&self) -> bool {
        self.condition.try_read().is_some_and(|active| *active)
    }
}

impl<S: Signal, C> Signal for Mask<S, C> {
    type Value = S::Value;
}

impl<S, C> ReadSignal for Mask<S, C>
where
    S: ReadSignal,
    C: ReadSignal<Value = bool>,
{
    fn has_value(&self) -> bool {
        self.active() && self.signal.has_value()
    }

    fn value_id(&self) -> ValueId {
        if self.active() {
            self.signal.value_id()
        } else {
            ValueId::Null
        }
    }

    fn try_read(&self) -> Option<SignalRef<'_, S::Value>> {
        if self.active() {
            self.signal.try_read()
        } else {
            None
        }
    }
}

impl<S, C> WriteSignal for Mask<S, C>
where
    S: WriteSignal,
    C: ReadSignal<Value = bool>,
{
    fn ready_to_write(&self) -> bool {
        self.active() && self.signal.ready_to_write()
    }

    fn write(&self, value: S::Value) -> Result<(), ValidationError> {
        if !self.active() {
            panic!("write to a masked signal");
        }
        self.signal.write(value)
    }
}

// --- observation signals ---

/// Boolean observation of another signal's value availability.
pub struct HasValue<S> {
    signal: S,
    cache: OnceCell<bool>,
}

/// A signal that always has a value: whether `signal` currently does.
pub fn has_value_signal<S: ReadSignal>(signal: S) -> HasValue<S> {
    HasValue {
        signal,
        cache: OnceCell::new(),
    }
}

impl<S> Signal for HasValue<S> {
    type Value = bool;
}

impl<S: ReadSignal> ReadSignal for HasValue<S> {
    fn has_value(&self) -> bool {
        true
    }

    fn value_id(&self) -> ValueId {
        simple_id(self.signal.has_value())
    }

    fn try_read(&self) -> Option<SignalRef<'_, bool>> {
        Some(SignalRef::Plain(
            self.cache.get_or_init(|| self.signal.has_value()),
        ))
    }
}

/// Boolean observation of another signal's write readiness.
pub struct ReadyToWrite<S> {
    signal: S,
    cache: OnceCell<bool>,
}

/// A signal that always has a value: whether `signal` is ready to write.
pub fn ready_to_write_signal<S: WriteSignal>(signal: S) -> ReadyToWrite<S> {
    ReadyToWrite {
        signal,
        cache: OnceCell::new(),
    }
}

impl<S> Signal for ReadyToWrite<S> {
    type Value = bool;
}

impl<S: WriteSignal> ReadSignal for ReadyToWrite<S> {
    fn has_value(&self) -> bool {
        true
    }

    fn value_id(&self) -> ValueId {
        simple_id(self.signal.ready_to_write())
    }

    fn try_read(&self) -> Option<SignalRef<'_, bool>> {
        Some(SignalRef::Plain(
            self.cache.get_or_init(|| self.signal.ready_to_write()),
        ))
    }
}

// --- conversion and type-level adapters ---

/// Static conversion with a lazily cached result; see [`signal_cast`].
pub struct Cast<S, U> {
    signal: S,
    cache: OnceCell<U>,
}

/// Convert `signal`'s value into `U` via `From`, preserving its identity.
pub fn signal_cast<U, S>(signal: S) -> Cast<S, U>
where
    S: ReadSignal,
    S::Value: Clone,
    U: From<S::Value> + 'static,
{
    Cast {
        signal,
        cache: OnceCell::new(),
    }
}

impl<S: Signal, U: 'static> Signal for Cast<S, U> {
    type Value = U;
}

impl<S, U> ReadSignal for Cast<S, U>
where
    S: ReadSignal,
    S::Value: Clone,
    U: From<S::Value> + 'static,
{
    fn has_value(&self) -> bool {
        self.signal.has_value()
    }

    fn value_id(&self) -> ValueId {
        self.signal.value_id()
    }

    fn try_read(&self) -> Option<SignalRef<'_, U>> {
        if !self.signal.has_value() {
            return None;
        }
        Some(SignalRef::Plain(
            self.cache
                .get_or_init(|| U::from((*self.signal.read()).clone())),
        ))
    }
}

/// Adds a read direction that never has a value; the write direction passes
/// through untouched. Useful to satisfy duplex bounds with a write-only
/// signal.
pub struct FakeReadable<S>(S);

pub fn fake_readability<S: Signal>(signal: S) -> FakeReadable<S> {
    FakeReadable(signal)
}

impl<S: Signal> Signal for FakeReadable<S> {
    type Value = S::Value;
}

impl<S: Signal> ReadSignal for FakeReadable<S> {
    fn has_value(&self) -> bool {
        false
    }

    fn value_id(&self) -> ValueId {
        ValueId::Null
    }

    fn try_read(&self) -> Option<SignalRef<'_, S::Value>> {
        None
    }
}

impl<S: WriteSignal> WriteSignal for FakeReadable<S> {
    fn ready_to_write(&self) -> bool {
        self.0.ready_to_write()
    }

    fn write(&self, value: S::Value) -> Result<(), ValidationError> {
        self.0.write(value)
    }
}

/// Adds a write direction that is never ready; the read direction passes
/// through untouched. The mirror of [`FakeReadable`].
pub struct FakeWritable<S>(S);

pub fn fake_writability<S: Signal>(signal: S) -> FakeWritable<S> {
    FakeWritable(signal)
}

impl<S: Signal> Signal for FakeWritable<S> {
    type Value = S::Value;
}

impl<S: ReadSignal> ReadSignal for FakeWritable<S> {
    fn has_value(&self) -> bool {
        self.0.has_value()
    }

    fn value_id(&self) -> ValueId {
        self.0.value_id()
    }

    fn try_read(&self) -> Option<SignalRef<'_, S::Value>> {
        self.0.try_read()
    }
}

impl<S: Signal> WriteSignal for FakeWritable<S> {
    fn ready_to_write(&self) -> bool {
        false
    }

    fn write(&self, _value: S::Value) -> Result<(), ValidationError> {
        panic!("write to a signal with faked writability");
    }
}

/// Replace a structural identity with the value itself; see [`simplify_id`].
pub struct SimplifyId<S>(S);

/// Use the value as its own identity. Worth it when the value is small and
/// the structural identity underneath is deep.
pub fn simplify_id<S>(signal: S) -> SimplifyId<S>
where
    S: ReadSignal,
    S::Value: IdValue,
{
    SimplifyId(signal)
}

impl<S: Signal> Signal for SimplifyId<S> {
    type Value = S::Value;
}

impl<S> ReadSignal for SimplifyId<S>
where
    S: ReadSignal,
    S::Value: IdValue,
{
    fn has_value(&self) -> bool {
        self.0.has_value()
    }

    fn value_id(&self) -> ValueId {
        match self.0.try_read() {
            Some(value) => simple_id((*value).clone()),
            None => ValueId::Null,
        }
    }

    fn try_read(&self) -> Option<SignalRef<'_, S::Value>> {
        self.0.try_read()
    }
}

impl<S: WriteSignal> WriteSignal for SimplifyId<S> {
    fn ready_to_write(&self) -> bool {
        self.0.ready_to_write()
    }

    fn write(&self, value: S::Value) -> Result<(), ValidationError> {
        self.0.write(value)
    }
}

// --- logic ---

/// Logical conjunction with value-availability short-circuit; see [`and`].
pub struct And<A, B> {
    a: A,
    b: B,
    cache: OnceCell<bool>,
}

/// True iff both operands are true. Has a value as soon as the result is
/// determined: both available, or either one available and false.
pub fn and<A, B>(a: A, b: B) -> And<A, B>
where
    A: ReadSignal<Value = bool>,
    B: ReadSignal<Value = bool>,
{
    And {
        a,
        b,
        cache: OnceCell::new(),
    }
}

impl<A, B> And<A, B>
where
    A: ReadSignal<Value = bool>,
    B: ReadSignal<Value = bool>,
{
    fn decided(&self) -> Option<bool> {
        let a = self.a.try_read().map(|v| *v);
        let b = self.b.try_read().map(|v| *v);
        match (a, b) {
            (Some(false), _) | (_, Some(false)) => Some(false),
            (Some(true), Some(true)) => Some(true),
            _ => None,
        }
    }
}

impl<A, B> Signal for And<A, B> {
    type Value = bool;
}

impl<A, B> ReadSignal for And<A, B>
where
    A: ReadSignal<Value = bool>,
    B: ReadSignal<Value = bool>,
{
    fn has_value(&self) -> bool {
        self.decided().is_some()
    }

    fn value_id(&self) -> ValueId {
        let a = self.a.try_read().map(|v| *v);
        let b = self.b.try_read().map(|v| *v);
        match (a, b) {
            // Identity follows the operand(s) that decided the result.
            (Some(false), _) => pair_id(simple_id(0_u8), self.a.value_id()),
            (_, Some(false)) => pair_id(simple_id(1_u8), self.b.value_id()),
            (Some(true), Some(true)) => pair_id(
                simple_id(2_u8),
                pair_id(self.a.value_id(), self.b.value_id()),
            ),
            _ => ValueId::Null,
        }
    }

    fn try_read(&self) -> Option<SignalRef<'_, bool>> {
        let decided = self.decided()?;
        Some(SignalRef::Plain(self.cache.get_or_init(|| decided)))
    }
}

/// Logical disjunction with value-availability short-circuit; see [`or`].
pub struct Or<A, B> {
    a: A,
    b: B,
    cache: OnceCell<bool>,
}

/// True iff either operand is true. Has a value as soon as the result is
/// determined: both available, or either one available and true.
pub fn or<A, B>(a: A, b: B) -> Or<A, B>
where
    A: ReadSignal<Value = bool>,
    B: ReadSignal<Value = bool>,
{
    Or {
        a,
        b,
        cache: OnceCell::new(),
    }
}

impl<A, B> Or<A, B>
where
    A: ReadSignal<Value = bool>,
    B: ReadSignal<Value = bool>,
{
    fn decided(&self) -> Option<bool> {
        let a = self.a.try_read().map(|v| *v);
        let b = self.b.try_read().map(|v| *v);
        match (a, b) {
            (Some(true), _) | (_, Some(true)) => Some(true),
            (Some(false), Some(false)) => Some(false),
            _ => None,
        }
    }
}

impl<A, B> Signal for Or<A, B> {
    type Value = bool;
}

impl<A, B> ReadSignal for Or<A, B>
where
    A: ReadSignal<Value = bool>,
    B: ReadSignal<Value = bool>,
{
    fn has_value(&self) -> bool {
        self.decided().is_some()
    }

    fn value_id(&self) -> ValueId {
        let a = self.a.try_read().map(|v| *v);
        let b = self.b.try_read().map(|v| *v);
        match (a, b) {
            (Some(true), _) => pair_id(simple_id(0_u8), self.a.value_id()),
            (_, Some(true)) => pair_id(simple_id(1_u8), self.b.value_id()),
            (Some(false), Some(false)) => pair_id(
                simple_id(2_u8),
                pair_id(self.a.value_id(), self.b.value_id()),
            ),
            _ => ValueId::Null,
        }
    }

    fn try_read(&self) -> Option<SignalRef<'_, bool>> {
        let decided = self.decided()?;
        Some(SignalRef::Plain(self.cache.get_or_init(|| decided)))
    }
}

/// Logical negation.
pub fn not<A>(a: A) -> LazyApply1<fn(&bool) -> bool, A, bool>
where
    A: ReadSignal<Value = bool>,
{
    let f: fn(&bool) -> bool = |v| !*v;
    lazy_apply(f, a)
}

// --- structural projection ---

/// Field projection through accessor closures; see [`project`].
pub struct Project<S, G, M, F> {
    signal: S,
    get: G,
    get_mut: M,
    _marker: PhantomData<fn() -> F>,
}

/// Project a signal onto one field of its value.
///
/// The write path is read-modify-write over the *current* container value:
/// the read-commit window spans one `write` call, and a container write
/// interleaved inside that window is lost (last write wins).
pub fn project<S, G, M, F>(signal: S, get: G, get_mut: M) -> Project<S, G, M, F>
where
    S: Signal,
    G: Fn(&S::Value) -> &F + 'static,
    M: Fn(&mut S::Value) -> &mut F,
    F: 'static,
{
    Project {
        signal,
        get,
        get_mut,
        _marker: PhantomData,
    }
}

impl<S: Signal, G, M, F: 'static> Signal for Project<S, G, M, F> {
    type Value = F;
}

impl<S, G, M, F> ReadSignal for Project<S, G, M, F>
where
    S: ReadSignal,
    G: Fn(&S::Value) -> &F + 'static,
    F: 'static,
{
    fn has_value(&self) -> bool {
        self.signal.has_value()
    }

    fn value_id(&self) -> ValueId {
        // The accessor's type distinguishes projections of the same source.
        pair_id(simple_id(TypeId::of::<G>()), self.signal.value_id())
    }

    fn try_read(&self) -> Option<SignalRef<'_, F>> {
        self.signal.try_read().map(|value| value.map(|v| (self.get)(v)))
    }
}

impl<S, G, M, F> WriteSignal for Project<S, G, M, F>
where
    S: ReadSignal + WriteSignal,
    S::Value: Clone,
    G: Fn(&S::Value) -> &F + 'static,
    M: Fn(&mut S::Value) -> &mut F,
    F: 'static,
{
    fn ready_to_write(&self) -> bool {
        self.signal.has_value() && self.signal.ready_to_write()
    }

    fn write(&self, value: F) -> Result<(), ValidationError> {
        let mut container = (*self.signal.read()).clone();
        *(self.get_mut)(&mut container) = value;
        self.signal.write(container)
    }
}

/// Element projection through `Index`/`IndexMut`; see [`subscript`].
pub struct Subscript<S, I> {
    signal: S,
    index: I,
}

/// Project a signal onto one element of its (indexable) value.
///
/// Same read-commit window as [`project`].
pub fn subscript<S, I>(signal: S, index: I) -> Subscript<S, I>
where
    S: Signal,
    S::Value: std::ops::Index<I>,
    I: Clone + IdValue,
{
    Subscript { signal, index }
}

impl<S, I> Signal for Subscript<S, I>
where
    S: Signal,
    S::Value: std::ops::Index<I>,
    <S::Value as std::ops::Index<I>>::Output: Sized + 'static,
    I: Clone,
{
    type Value = <S::Value as std::ops::Index<I>>::Output;
}

impl<S, I> ReadSignal for Subscript<S, I>
where
    S: ReadSignal,
    S::Value: std::ops::Index<I>,
    <S::Value as std::ops::Index<I>>::Output: Sized + 'static,
    I: Clone + IdValue,
{
    fn has_value(&self) -> bool {
        self.signal.has_value()
    }

    fn value_id(&self) -> ValueId {
        pair_id(simple_id(self.index.clone()), self.signal.value_id())
    }

    fn try_read(&self) -> Option<SignalRef<'_, Self::Value>> {
        self.signal
            .try_read()
            .map(|value| value.map(|v| &v[self.index.clone()]))
    }
}

impl<S, I> WriteSignal for Subscript<S, I>
where
    S: ReadSignal + WriteSignal,
    S::Value: std::ops::Index<I> + std::ops::IndexMut<I> + Clone,
    <S::Value as std::ops::Index<I>>::Output: Sized + 'static,
    I: Clone + IdValue,
{
    fn ready_to_write(&self) -> bool {
        self.signal.has_value() && self.signal.ready_to_write()
    }

    fn write(&self, value: Self::Value) -> Result<(), ValidationError> {
        let mut container = (*self.signal.read()).clone();
        container[self.index.clone()] = value;
        self.signal.write(container)
    }
}

#[cfg(test)]
mod tests {
    use super::super::{direct, empty, value};
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn fallback_prefers_the_primary() {
        let with_fallback = add_fallback(empty::<i32>(), value(7));
        assert!(with_fallback.has_value());
        assert_eq!(*with_fallback.read(), 7);

        let cell = RefCell::new(3);
        let primary = add_fallback(direct(&cell), value(7));
        assert_eq!(*primary.read(), 3);
    }

    #[test]
    fn fallback_identity_distinguishes_sources() {
        let cell = RefCell::new(7);
        let via_primary = add_fallback(direct(&cell), value(7));
        let via_fallback = add_fallback(empty::<i32>(), value(7));
        // Same payload, different source: still a change.
        assert_ne!(via_primary.value_id(), via_fallback.value_id());
    }

    #[test]
    fn mask_blocks_value_and_identity() {
        let masked = mask(value(5), value(false));
        assert!(!masked.has_value());
        assert!(masked.value_id().is_null());
        assert!(masked.try_read().is_none());

        let open = mask(value(5), value(true));
        assert!(open.has_value());
        assert_eq!(*open.read(), 5);
    }

    #[test]
    fn conditional_dispatches_on_the_condition() {
        let t = RefCell::new(1);
        let f = RefCell::new(2);
        let taken = conditional(value(true), direct(&t), direct(&f));
        assert_eq!(*taken.read(), 1);
        taken.write(10).unwrap();

        let untaken = conditional(value(false), direct(&t), direct(&f));
        assert_eq!(*untaken.read(), 2);

        let unknown = conditional(empty::<bool>(), direct(&t), direct(&f));
        assert!(!unknown.has_value());
        assert!(!unknown.ready_to_write());

        assert_eq!(*t.borrow(), 10);
    }

    #[test]
    fn logic_short_circuits_on_availability() {
        // Decidable from one side:
        assert_eq!(and(value(false), empty::<bool>()).read_cloned(), Some(false));
        assert_eq!(and(empty::<bool>(), value(false)).read_cloned(), Some(false));
        assert_eq!(or(value(true), empty::<bool>()).read_cloned(), Some(true));
        assert_eq!(or(empty::<bool>(), value(true)).read_cloned(), Some(true));

        // Not decidable:
        assert!(!and(value(true), empty::<bool>()).has_value());
        assert!(!or(value(false), empty::<bool>()).has_value());

        // Fully available:
        assert_eq!(and(value(true), value(true)).read_cloned(), Some(true));
        assert_eq!(or(value(false), value(false)).read_cloned(), Some(false));
        assert_eq!(not(value(true)).read_cloned(), Some(false));
    }

    #[test]
    fn projection_reads_and_writes_through() {
        #[derive(Clone, Debug, PartialEq, PartialOrd)]
        struct Point {
            x: i32,
            y: i32,
        }

        let cell = RefCell::new(Point { x: 1, y: 2 });
        {
            let x = project(direct(&cell), |p: &Point| &p.x, |p: &mut Point| &mut p.x);
            assert!(x.has_value());
            assert_eq!(*x.read(), 1);
            x.write(9).unwrap();
        }
        assert_eq!(*cell.borrow(), Point { x: 9, y: 2 });
    }

    #[test]
    fn projections_of_the_same_source_have_distinct_identities() {
        let cell = RefCell::new((1, 2));
        let first = project(direct(&cell), |p: &(i32, i32)| &p.0, |p: &mut (i32, i32)| &mut p.0);
        let second = project(direct(&cell), |p: &(i32, i32)| &p.1, |p: &mut (i32, i32)| &mut p.1);
        assert_ne!(first.value_id(), second.value_id());
    }

    #[test]
    fn subscript_reads_and_writes_elements() {
        let cell = RefCell::new(vec![10, 20, 30]);
        {
            let elem = subscript(direct(&cell), 1_usize);
            assert_eq!(*elem.read(), 20);
            assert_ne!(elem.value_id(), subscript(direct(&cell), 2_usize).value_id());
            elem.write(21).unwrap();
        }
        assert_eq!(*cell.borrow(), vec![10, 21, 30]);
    }

    #[test]
    fn cast_preserves_identity() {
        let small = value(5_i32);
        let id = small.value_id();
        let wide = signal_cast::<i64, _>(value(5_i32));
        assert_eq!(*wide.read(), 5_i64);
        assert_eq!(wide.value_id(), id);
    }

    #[test]
    fn fake_directions_stay_inert() {
        let cell = RefCell::new(1);
        let readable = fake_writability(direct(&cell));
        assert!(readable.has_value());
        assert!(!readable.ready_to_write());

        let writable = fake_readability(direct(&cell));
        assert!(!writable.has_value());
        assert!(writable.value_id().is_null());
        assert!(writable.ready_to_write());
        writable.write(2).unwrap();
        assert_eq!(*cell.borrow(), 2);
    }

    #[test]
    fn observation_signals_always_have_values() {
        let present = has_value_signal(value(1));
        assert!(present.has_value());
        assert_eq!(*present.read(), true);

        let absent = has_value_signal(empty::<i32>());
        assert_eq!(*absent.read(), false);
        assert_ne!(present.value_id(), absent.value_id());

        let ready = ready_to_write_signal(empty::<i32>());
        assert_eq!(*ready.read(), false);
    }

    #[test]
    fn simplify_id_uses_the_value_itself() {
        let cell = RefCell::new(4);
        let simplified = simplify_id(direct(&cell));
        assert_eq!(simplified.value_id(), value(4).value_id());
    }
}
