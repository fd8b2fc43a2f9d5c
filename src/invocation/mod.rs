//! Invocation routing: `@agent-<name>` and `/<name>` references to documents.

mod router;
mod token;

pub use router::{DEFAULT_ARGUMENTS_PHRASE, InvocationRequest, InvocationResult, InvocationRouter};
pub use token::ReferenceToken;
