//! Typed publish/subscribe event bus (§4.8).

mod bus;
mod types;

pub use bus::{EventBus, Subscription};
pub use types::Event;
