//! Reply handling
//!
//! This module binds forms to state identifiers and routes incoming replies
//! to the form awaiting them.

pub mod dispatch;
pub mod router;

pub use dispatch::{Continuation, ContinuationRegistry, Dispatch};
pub use router::{ReplyRouter, RouteOutcome};
