//! Text conversion for scalar-valued signals.
//!
//! Writers reject malformed input with a [`ValidationError`] instead of
//! clamping or panicking; integral parsing reports out-of-range input as its
//! own kind so a host can tell "not a number" from "too big".

use std::rc::Rc;

use crate::context::Context;
use crate::graph::KeyedNode;
use crate::id::ValueId;
use crate::signal::{ReadSignal, Signal, SignalRef, ValidationError, WriteSignal};

/// Render a value as user-facing text.
pub trait ToText {
    fn to_text(&self) -> String;
}

/// Parse a value from user-facing text.
pub trait FromText: Sized {
    fn from_text(text: &str) -> Result<Self, ValidationError>;
}

macro_rules! impl_integer_text {
    ($($t:ty),* $(,)?) => {$(
        impl ToText for $t {
            fn to_text(&self) -> String {
                self.to_string()
            }
        }

        impl FromText for $t {
            fn from_text(text: &str) -> Result<Self, ValidationError> {
                use std::num::IntErrorKind;
                text.trim().parse::<$t>().map_err(|err| match err.kind() {
                    IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => {
                        ValidationError::OutOfRange
                    }
                    _ => ValidationError::Invalid(text.to_owned()),
                })
            }
        }
    )*};
}

impl_integer_text!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

macro_rules! impl_float_text {
    ($($t:ty),* $(,)?) => {$(
        impl ToText for $t {
            fn to_text(&self) -> String {
                self.to_string()
            }
        }

        impl FromText for $t {
            fn from_text(text: &str) -> Result<Self, ValidationError> {
                text.trim()
                    .parse::<$t>()
                    .map_err(|_| ValidationError::Invalid(text.to_owned()))
            }
        }
    )*};
}

impl_float_text!(f32, f64);

impl ToText for bool {
    fn to_text(&self) -> String {
        self.to_string()
    }
}

impl FromText for bool {
    fn from_text(text: &str) -> Result<Self, ValidationError> {
        match text.trim() {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(ValidationError::Invalid(other.to_owned())),
        }
    }
}

impl ToText for String {
    fn to_text(&self) -> String {
        self.clone()
    }
}

impl FromText for String {
    fn from_text(text: &str) -> Result<Self, ValidationError> {
        Ok(text.to_owned())
    }
}

/// A duplex text view of a scalar signal; see [`as_text`].
pub struct TextSignal<S> {
    signal: S,
    rendered: Rc<KeyedNode<String>>,
}

/// View `signal` as text. Reads render through [`ToText`], memoized in the
/// graph keyed by the signal's identity; writes parse through [`FromText`]
/// and reject bad input with a [`ValidationError`].
pub fn as_text<S>(ctx: &mut Context, signal: S) -> TextSignal<S>
where
    S: ReadSignal,
    S::Value: ToText,
{
    let rendered = ctx.data_mut().get_keyed::<String>();
    let id = signal.value_id();
    let stale = rendered.get_ref(&id).is_none();
    if stale && let Some(value) = signal.try_read() {
        rendered.store(&id, value.to_text());
    }
    TextSignal { signal, rendered }
}

impl<S: Signal> Signal for TextSignal<S> {
    type Value = String;
}

impl<S> ReadSignal for TextSignal<S>
where
    S: ReadSignal,
    S::Value: ToText,
{
    // The rendered cache is keyed by the source's identity, so a source
    // without a usable identity has no text value either.
    fn has_value(&self) -> bool {
        self.rendered.get_ref(&self.signal.value_id()).is_some()
    }

    fn value_id(&self) -> ValueId {
        self.signal.value_id()
    }

    fn try_read(&self) -> Option<SignalRef<'_, String>> {
        self.rendered
            .get_ref(&self.signal.value_id())
            .map(SignalRef::Cell)
    }
}

impl<S> WriteSignal for TextSignal<S>
where
    S: ReadSignal + WriteSignal,
    S::Value: ToText + FromText,
{
    fn ready_to_write(&self) -> bool {
        self.signal.ready_to_write()
    }

    fn write(&self, text: String) -> Result<(), ValidationError> {
        let parsed = S::Value::from_text(&text)?;
        self.signal.write(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_parse_and_render() {
        assert_eq!(42_i32.to_text(), "42");
        assert_eq!(i32::from_text(" 42 "), Ok(42));
        assert_eq!(
            i32::from_text("forty-two"),
            Err(ValidationError::Invalid("forty-two".to_owned()))
        );
    }

    #[test]
    fn out_of_range_integers_are_their_own_error() {
        assert_eq!(u8::from_text("256"), Err(ValidationError::OutOfRange));
        assert_eq!(i8::from_text("-129"), Err(ValidationError::OutOfRange));
        assert_eq!(u8::from_text("255"), Ok(255));
    }

    #[test]
    fn floats_and_bools_round_trip() {
        assert_eq!(f64::from_text("2.5"), Ok(2.5));
        assert!(f32::from_text("2.5.1").is_err());
        assert_eq!(bool::from_text("true"), Ok(true));
        assert!(bool::from_text("yes").is_err());
    }
}
