//! Operator lifting: `Sig` wraps any signal so the std operators produce
//! lazily applied signals, with plain values on the right-hand side
//! auto-wrapped via [`value`].

use crate::id::ValueId;

use super::{
    LazyApply1, LazyApply2, ReadSignal, Signal, SignalRef, Val, ValidationError, WriteSignal,
    lazy_apply, lazy_apply2, value,
};

/// Operator-enabled signal wrapper. Delegates both capabilities.
#[derive(Clone)]
pub struct Sig<S>(pub S);

/// Wrap a signal for operator composition.
pub fn sig<S: Signal>(signal: S) -> Sig<S> {
    Sig(signal)
}

impl<S: Signal> Signal for Sig<S> {
    type Value = S::Value;
}

impl<S: ReadSignal> ReadSignal for Sig<S> {
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

impl<S: WriteSignal> WriteSignal for Sig<S> {
    fn ready_to_write(&self) -> bool {
        self.0.ready_to_write()
    }

    fn write(&self, value: S::Value) -> Result<(), ValidationError> {
        self.0.write(value)
    }
}

/// Anything usable as a read-signal operand: a signal, or a plain value that
/// gets wrapped in [`value`].
pub trait IntoReadSignal {
    type Value: 'static;
    type Signal: ReadSignal<Value = Self::Value>;

    fn into_read_signal(self) -> Self::Signal;
}

impl<S: ReadSignal> IntoReadSignal for Sig<S> {
    type Value = S::Value;
    type Signal = S;

    fn into_read_signal(self) -> S {
        self.0
    }
}

macro_rules! impl_into_read_signal {
    ($($t:ty),* $(,)?) => {$(
        impl IntoReadSignal for $t {
            type Value = $t;
            type Signal = Val<$t>;

            fn into_read_signal(self) -> Val<$t> {
                value(self)
            }
        }
    )*};
}

impl_into_read_signal!(
    i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64, bool, char, String,
    &'static str,
);

macro_rules! impl_binary_operator {
    ($op:ident, $method:ident) => {
        impl<S, R> std::ops::$op<R> for Sig<S>
        where
            S: ReadSignal,
            R: IntoReadSignal,
            S::Value: Clone + std::ops::$op<R::Value>,
            <S::Value as std::ops::$op<R::Value>>::Output: 'static,
            R::Value: Clone,
        {
            type Output = Sig<
                LazyApply2<
                    fn(&S::Value, &R::Value) -> <S::Value as std::ops::$op<R::Value>>::Output,
                    S,
                    R::Signal,
                    <S::Value as std::ops::$op<R::Value>>::Output,
                >,
            >;

            fn $method(self, rhs: R) -> Self::Output {
                let f: fn(&S::Value, &R::Value) -> _ =
                    |a, b| std::ops::$op::$method(a.clone(), b.clone());
                Sig(lazy_apply2(f, self.0, rhs.into_read_signal()))
            }
        }
    };
}

impl_binary_operator!(Add, add);
impl_binary_operator!(Sub, sub);
impl_binary_operator!(Mul, mul);
impl_binary_operator!(Div, div);
impl_binary_operator!(Rem, rem);
impl_binary_operator!(Shl, shl);
impl_binary_operator!(Shr, shr);
impl_binary_operator!(BitAnd, bitand);
impl_binary_operator!(BitOr, bitor);
impl_binary_operator!(BitXor, bitxor);

macro_rules! impl_unary_operator {
    ($op:ident, $method:ident) => {
        impl<S> std::ops::$op for Sig<S>
        where
            S: ReadSignal,
            S::Value: Clone + std::ops::$op,
            <S::Value as std::ops::$op>::Output: 'static,
        {
            type Output = Sig<
                LazyApply1<
                    fn(&S::Value) -> <S::Value as std::ops::$op>::Output,
                    S,
                    <S::Value as std::ops::$op>::Output,
                >,
            >;

            fn $method(self) -> Self::Output {
                let f: fn(&S::Value) -> _ = |a| std::ops::$op::$method(a.clone());
                Sig(lazy_apply(f, self.0))
            }
        }
    };
}

impl_unary_operator!(Neg, neg);
impl_unary_operator!(Not, not);

macro_rules! impl_comparison {
    ($name:ident, $trait:ident, $method:ident, $doc:literal) => {
        #[doc = $doc]
        ///
        /// Either side may be a plain value; it is wrapped via [`value`].
        pub fn $name<A, B>(
            a: A,
            b: B,
        ) -> Sig<LazyApply2<fn(&A::Value, &B::Value) -> bool, A::Signal, B::Signal, bool>>
        where
            A: IntoReadSignal,
            B: IntoReadSignal,
            A::Value: $trait<B::Value>,
        {
            let f: fn(&A::Value, &B::Value) -> bool = |x, y| x.$method(y);
            Sig(lazy_apply2(f, a.into_read_signal(), b.into_read_signal()))
        }
    };
}

impl_comparison!(sig_eq, PartialEq, eq, "Elementwise `==` over signals.");
impl_comparison!(sig_ne, PartialEq, ne, "Elementwise `!=` over signals.");
impl_comparison!(sig_lt, PartialOrd, lt, "Elementwise `<` over signals.");
impl_comparison!(sig_le, PartialOrd, le, "Elementwise `<=` over signals.");
impl_comparison!(sig_gt, PartialOrd, gt, "Elementwise `>` over signals.");
impl_comparison!(sig_ge, PartialOrd, ge, "Elementwise `>=` over signals.");

#[cfg(test)]
mod tests {
    use super::super::empty;
    use super::*;

    #[test]
    fn arithmetic_lifts_elementwise() {
        let sum = sig(value(2)) + sig(value(3));
        assert_eq!(sum.read_cloned(), Some(5));

        let product = sig(value(4)) * 10;
        assert_eq!(product.read_cloned(), Some(40));

        let negated = -sig(value(7));
        assert_eq!(negated.read_cloned(), Some(-7));

        let shifted = sig(value(1_u32)) << 4_u32;
        assert_eq!(shifted.read_cloned(), Some(16));

        let masked = sig(value(0b1100_u8)) & 0b1010_u8;
        assert_eq!(masked.read_cloned(), Some(0b1000));
    }

    #[test]
    fn operators_propagate_missing_values() {
        let sum = sig(empty::<i32>()) + 3;
        assert!(!sum.has_value());
        assert!(sum.value_id().is_null());
        assert!(sum.try_read().is_none());
    }

    #[test]
    fn operator_identity_is_structural() {
        let a = sig(value(2)) + 3;
        let b = sig(value(2)) + 3;
        let c = sig(value(2)) + 4;
        assert_eq!(a.value_id(), b.value_id());
        assert_ne!(a.value_id(), c.value_id());
    }

    #[test]
    fn comparisons_accept_plain_operands() {
        assert_eq!(sig_eq(sig(value(3)), 3).read_cloned(), Some(true));
        assert_eq!(sig_ne(sig(value(3)), 4).read_cloned(), Some(true));
        assert_eq!(sig_lt(sig(value(3)), 4).read_cloned(), Some(true));
        assert_eq!(
            sig_ge(sig(value(3)), sig(value(4))).read_cloned(),
            Some(false)
        );
        assert_eq!(sig_le(3, sig(value(3))).read_cloned(), Some(true));
        assert_eq!(sig_gt(sig(value("b")), "a").read_cloned(), Some(true));
    }
}
