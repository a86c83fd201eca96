mod queue;
mod signal;
mod vars;

pub use queue::Queue;
pub use signal::Signal;
pub use vars::Vars;
