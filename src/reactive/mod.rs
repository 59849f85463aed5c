pub mod effect;
pub mod owner;
pub mod runtime;
pub mod signal;

pub use effect::{create_effect, Effect};
pub use owner::{current_owner, dispose_owner, on_cleanup, with_owner, OwnerId};
pub use runtime::batch;
pub use signal::{create_signal, ReadSignal, Signal};
