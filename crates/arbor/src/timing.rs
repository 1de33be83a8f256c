//! Monotonic time, as a wrapping millisecond counter.

use crate::context::Context;

/// Monotonic milliseconds. Free to wrap; distances are computed signed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Millis(pub u32);

impl Millis {
    /// Signed wrapping distance from `self` to `end`.
    #[inline]
    pub fn ticks_until(self, end: Self) -> i32 {
        end.0.wrapping_sub(self.0) as i32
    }
}

impl std::ops::Add<u32> for Millis {
    type Output = Self;

    #[inline]
    fn add(self, rhs: u32) -> Self {
        Self(self.0.wrapping_add(rhs))
    }
}

thread_local! {
    static EPOCH: web_time::Instant = web_time::Instant::now();
}

/// The default clock: milliseconds since an arbitrary process-local epoch.
pub(crate) fn steady_tick_count() -> Millis {
    EPOCH.with(|epoch| Millis(epoch.elapsed().as_millis() as u32))
}

/// The timing component of a traversal: the tick counter, sampled once per
/// pass so every observer within a traversal sees the same time.
pub struct Timing {
    tick: Millis,
}

impl Timing {
    pub(crate) fn new(tick: Millis) -> Self {
        Self { tick }
    }

    #[inline]
    pub fn tick(&self) -> Millis {
        self.tick
    }
}

/// The non-negative number of ticks from now until `end`, requesting another
/// refresh so the countdown keeps being observed.
pub fn ticks_left_until(ctx: &Context, end: Millis) -> u32 {
    ctx.system().request_animation_refresh();
    ctx.timing().tick().ticks_until(end).max(0) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrapping_deltas_stay_signed() {
        let near_wrap = Millis(u32::MAX - 10);
        assert_eq!(near_wrap.ticks_until(Millis(4)), 15);
        assert_eq!(Millis(4).ticks_until(near_wrap), -15);
        assert_eq!(Millis(100).ticks_until(Millis(100)), 0);
        assert_eq!(near_wrap + 15, Millis(4));
    }
}
