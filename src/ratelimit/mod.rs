//! Rate limiting logic and state management.

mod counter;
mod invoker;
mod limiter;

pub use counter::{Admission, TimeWindow, WindowCounter, WindowPolicy};
pub use invoker::LimitedInvoker;
pub use limiter::{ShutdownOutcome, WindowedLimiter};
