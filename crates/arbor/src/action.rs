//! Actions: deferred, readiness-gated effects with latched read-then-write
//! semantics.
//!
//! `perform` calls its intermediary exactly once, after the action's
//! upstream reads and before its writes. Because composition preserves that
//! ordering, every read in a composed action observes the pre-action world:
//! `seq(copy_to(x, y), copy_to(y, x))` really swaps.

use crate::signal::{ReadSignal, Signal, WriteSignal};

/// A deferred effect over an argument tuple.
pub trait Action<Args = ()> {
    /// Whether the action can fire right now.
    fn is_ready(&self) -> bool;

    /// Fire the action. `intermediary` runs exactly once, after this
    /// action's upstream reads and before its writes.
    fn perform(&self, intermediary: &mut dyn FnMut(), args: Args);
}

/// Write `source`'s value into `sink`; see [`copy_to`].
pub struct CopyTo<Dst, Src> {
    sink: Dst,
    source: Src,
}

/// The copy action: ready when the source has a value and the sink is ready
/// to write. Rejected writes are logged, not propagated.
pub fn copy_to<Dst, Src>(sink: Dst, source: Src) -> CopyTo<Dst, Src>
where
    Dst: WriteSignal,
    Src: ReadSignal<Value = Dst::Value>,
    Dst::Value: Clone,
{
    CopyTo { sink, source }
}

impl<Dst, Src> Action for CopyTo<Dst, Src>
where
    Dst: WriteSignal,
    Src: ReadSignal<Value = Dst::Value>,
    Dst::Value: Clone,
{
    fn is_ready(&self) -> bool {
        self.source.has_value() && self.sink.ready_to_write()
    }

    fn perform(&self, intermediary: &mut dyn FnMut(), _args: ()) {
        let value = (*self.source.read()).clone();
        intermediary();
        if let Err(err) = self.sink.write(value) {
            log::warn!("action write rejected: {err}");
        }
    }
}

/// Sequence two actions; see [`seq`].
pub struct Seq<A, B> {
    first: A,
    second: B,
}

/// Both actions fire as one: ready iff both are ready, and both writes land
/// after both reads, so the pair is atomic as seen from the signals.
pub fn seq<A: Action, B: Action>(first: A, second: B) -> Seq<A, B> {
    Seq { first, second }
}

impl<A: Action, B: Action> Action for Seq<A, B> {
    fn is_ready(&self) -> bool {
        self.first.is_ready() && self.second.is_ready()
    }

    fn perform(&self, intermediary: &mut dyn FnMut(), _args: ()) {
        // The second action's intermediary performs the first, which nests
        // the latch windows: reads of both happen before writes of either.
        self.second
            .perform(&mut || self.first.perform(intermediary, ()), ());
    }
}

/// Feed an action's leftmost argument from a signal; see [`bind`].
pub struct Bind<A, S> {
    action: A,
    signal: S,
}

/// Bind the leftmost argument of `action` to `signal`'s value. Ready iff the
/// action is ready and the signal has a value.
pub fn bind<A, S>(action: A, signal: S) -> Bind<A, S> {
    Bind { action, signal }
}

macro_rules! impl_bind {
    ($($rest:ident),*) => {
        impl<A, S, $($rest,)*> Action<($($rest,)*)> for Bind<A, S>
        where
            S: ReadSignal,
            S::Value: Clone,
            A: Action<(S::Value, $($rest,)*)>,
        {
            fn is_ready(&self) -> bool {
                self.action.is_ready() && self.signal.has_value()
            }

            #[allow(non_snake_case)]
            fn perform(&self, intermediary: &mut dyn FnMut(), ($($rest,)*): ($($rest,)*)) {
                let bound = (*self.signal.read()).clone();
                self.action.perform(intermediary, (bound, $($rest,)*));
            }
        }
    };
}

impl_bind!();
impl_bind!(B1);
impl_bind!(B1, B2);
impl_bind!(B1, B2, B3);

/// Flip a boolean signal; see [`toggle`].
pub struct Toggle<S> {
    flag: S,
}

pub fn toggle<S>(flag: S) -> Toggle<S>
where
    S: ReadSignal<Value = bool> + WriteSignal<Value = bool>,
{
    Toggle { flag }
}

impl<S> Action for Toggle<S>
where
    S: ReadSignal<Value = bool> + WriteSignal<Value = bool>,
{
    fn is_ready(&self) -> bool {
        self.flag.has_value() && self.flag.ready_to_write()
    }

    fn perform(&self, intermediary: &mut dyn FnMut(), _args: ()) {
        let flipped = !*self.flag.read();
        intermediary();
        if let Err(err) = self.flag.write(flipped) {
            log::warn!("action write rejected: {err}");
        }
    }
}

/// Append the argument to a vector-valued signal; see [`push_back`].
pub struct PushBack<S> {
    container: S,
}

pub fn push_back<S, T>(container: S) -> PushBack<S>
where
    S: ReadSignal<Value = Vec<T>> + WriteSignal<Value = Vec<T>>,
    T: Clone + 'static,
{
    PushBack { container }
}

impl<S, T> Action<(T,)> for PushBack<S>
where
    S: ReadSignal<Value = Vec<T>> + WriteSignal<Value = Vec<T>>,
    T: Clone + 'static,
{
    fn is_ready(&self) -> bool {
        self.container.has_value() && self.container.ready_to_write()
    }

    fn perform(&self, intermediary: &mut dyn FnMut(), (item,): (T,)) {
        let mut items = (*self.container.read()).clone();
        intermediary();
        items.push(item);
        if let Err(err) = self.container.write(items) {
            log::warn!("action write rejected: {err}");
        }
    }
}

/// Add `amount` to a signal; see [`increment`].
pub struct Increment<S: Signal> {
    target: S,
    amount: S::Value,
}

/// The compound assignment `target += amount` as an action.
pub fn increment<S>(target: S, amount: S::Value) -> Increment<S>
where
    S: ReadSignal + WriteSignal,
    S::Value: std::ops::Add<Output = S::Value> + Clone,
{
    Increment { target, amount }
}

impl<S> Action for Increment<S>
where
    S: ReadSignal + WriteSignal,
    S::Value: std::ops::Add<Output = S::Value> + Clone,
{
    fn is_ready(&self) -> bool {
        self.target.has_value() && self.target.ready_to_write()
    }

    fn perform(&self, intermediary: &mut dyn FnMut(), _args: ()) {
        let bumped = (*self.target.read()).clone() + self.amount.clone();
        intermediary();
        if let Err(err) = self.target.write(bumped) {
            log::warn!("action write rejected: {err}");
        }
    }
}

/// Subtract `amount` from a signal; see [`decrement`].
pub struct Decrement<S: Signal> {
    target: S,
    amount: S::Value,
}

/// The compound assignment `target -= amount` as an action.
pub fn decrement<S>(target: S, amount: S::Value) -> Decrement<S>
where
    S: ReadSignal + WriteSignal,
    S::Value: std::ops::Sub<Output = S::Value> + Clone,
{
    Decrement { target, amount }
}

impl<S> Action for Decrement<S>
where
    S: ReadSignal + WriteSignal,
    S::Value: std::ops::Sub<Output = S::Value> + Clone,
{
    fn is_ready(&self) -> bool {
        self.target.has_value() && self.target.ready_to_write()
    }

    fn perform(&self, intermediary: &mut dyn FnMut(), _args: ()) {
        let lowered = (*self.target.read()).clone() - self.amount.clone();
        intermediary();
        if let Err(err) = self.target.write(lowered) {
            log::warn!("action write rejected: {err}");
        }
    }
}

/// An action from a readiness predicate and an effect; see [`callback`].
pub struct Callback<R, F> {
    ready: R,
    body: F,
}

pub fn callback<R, F>(ready: R, body: F) -> Callback<R, F> {
    Callback { ready, body }
}

impl<R, F, Args> Action<Args> for Callback<R, F>
where
    R: Fn() -> bool,
    F: Fn(Args),
{
    fn is_ready(&self) -> bool {
        (self.ready)()
    }

    fn perform(&self, intermediary: &mut dyn FnMut(), args: Args) {
        intermediary();
        (self.body)(args);
    }
}

/// Operator-enabled action wrapper: `Act(action) << signal` binds the
/// leftmost argument, mirroring [`bind`].
pub struct Act<A>(pub A);

impl<A, Args> Action<Args> for Act<A>
where
    A: Action<Args>,
{
    fn is_ready(&self) -> bool {
        self.0.is_ready()
    }

    fn perform(&self, intermediary: &mut dyn FnMut(), args: Args) {
        self.0.perform(intermediary, args);
    }
}

impl<A, S: ReadSignal> std::ops::Shl<S> for Act<A> {
    type Output = Act<Bind<A, S>>;

    fn shl(self, signal: S) -> Self::Output {
        Act(bind(self.0, signal))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::{direct, empty, value};
    use std::cell::{Cell, RefCell};

    fn fire(action: &impl Action) {
        assert!(action.is_ready());
        let mut ran = 0;
        action.perform(&mut || ran += 1, ());
        assert_eq!(ran, 1, "intermediary must run exactly once");
    }

    #[test]
    fn copy_readiness_follows_both_sides() {
        let cell = RefCell::new(0);
        assert!(copy_to(direct(&cell), value(1)).is_ready());
        assert!(!copy_to(direct(&cell), empty::<i32>()).is_ready());

        fire(&copy_to(direct(&cell), value(9)));
        assert_eq!(*cell.borrow(), 9);
    }

    #[test]
    fn sequenced_copies_latch_their_reads() {
        let x = RefCell::new(1);
        let y = RefCell::new(2);
        // Both reads happen before either write: this is a swap, not a copy
        // chain.
        fire(&seq(
            copy_to(direct(&x), direct(&y)),
            copy_to(direct(&y), direct(&x)),
        ));
        assert_eq!(*x.borrow(), 2);
        assert_eq!(*y.borrow(), 1);
    }

    #[test]
    fn bind_consumes_the_leftmost_argument() {
        let seen = RefCell::new(Vec::new());
        let sink = callback(
            || true,
            |(a, b): (i32, i32)| seen.borrow_mut().push((a, b)),
        );

        let bound = bind(sink, value(10));
        assert!(bound.is_ready());
        bound.perform(&mut || {}, (20,));
        assert_eq!(*seen.borrow(), vec![(10, 20)]);

        let unbound = bind(
            callback(|| true, |(_,): (i32,)| {}),
            empty::<i32>(),
        );
        assert!(!unbound.is_ready());
    }

    #[test]
    fn toggle_flips() {
        let flag = RefCell::new(false);
        fire(&toggle(direct(&flag)));
        assert!(*flag.borrow());
        fire(&toggle(direct(&flag)));
        assert!(!*flag.borrow());
    }

    #[test]
    fn push_back_appends_the_argument() {
        let items = RefCell::new(vec![1, 2]);
        let push = push_back(direct(&items));
        assert!(push.is_ready());
        push.perform(&mut || {}, (3,));
        assert_eq!(*items.borrow(), vec![1, 2, 3]);
    }

    #[test]
    fn increment_and_decrement_adjust_in_place() {
        let n = RefCell::new(10);
        fire(&increment(direct(&n), 5));
        assert_eq!(*n.borrow(), 15);
        fire(&decrement(direct(&n), 3));
        assert_eq!(*n.borrow(), 12);
    }

    #[test]
    fn act_binding_sugar_matches_bind() {
        let seen = Cell::new(0);
        let action = Act(callback(|| true, |(v,): (i32,)| seen.set(v))) << value(33);
        assert!(action.is_ready());
        action.perform(&mut || {}, ());
        assert_eq!(seen.get(), 33);
    }
}
