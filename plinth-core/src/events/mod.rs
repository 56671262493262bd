//! Event dispatch for plinth
//!
//! - [`EventBus`]: routes events to the handler list of their declared type
//! - [`HandlerList`]: per-type listeners, bucketed by priority and baked
//!   into a flat dispatch order after each change

mod bus;
mod handler_list;

pub use crate::error::EventBusError;
pub use bus::{EventBus, ListenerTiming};
pub use handler_list::HandlerList;
