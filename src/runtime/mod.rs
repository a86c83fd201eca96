mod broker;
mod context;
mod gate;
mod join;
mod progress;
mod stream;

pub use context::{Context, DEFAULT_WAIT_TIMEOUT};
pub use gate::StepGate;

#[cfg(test)]
pub(crate) use context::tests::create_test_context;
