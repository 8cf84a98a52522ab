//! State values held by a reactor.
//!
//! A reactor works over any type implementing [`State`]: it needs an
//! independent snapshot of the live value and a structural comparison between
//! two values. `serde_json::Value` implements both through the clone and
//! equality engines in this module, so untyped JSON state works out of the
//! box; typed states usually implement `same_as` with `==`.

mod clone;
mod equality;
mod merge;

pub use clone::{deep_clone, is_scalar};
pub use equality::is_equal;
pub use merge::Merge;

use serde_json::Value;

/// A value a reactor can own, snapshot and compare.
pub trait State: Clone + 'static {
    /// An independent copy of `self`; mutating either side never affects the other.
    fn snapshot(&self) -> Self {
        self.clone()
    }

    /// Structural equality, used for history compression.
    fn same_as(&self, other: &Self) -> bool;
}

impl State for Value {
    fn snapshot(&self) -> Self {
        deep_clone(self)
    }

    fn same_as(&self, other: &Self) -> bool {
        is_equal(self, other)
    }
}

macro_rules! impl_state_for_scalar {
    ($($ty:ty),* $(,)?) => {
        $(
            impl State for $ty {
                fn same_as(&self, other: &Self) -> bool {
                    self == other
                }
            }
        )*
    };
}

impl_state_for_scalar!(bool, i32, i64, u32, u64, usize, f64, String);
