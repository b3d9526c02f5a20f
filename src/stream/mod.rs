//! Stream combinators for curve subscriptions

mod throttle;

pub use throttle::{Throttle, ThrottleExt};
