pub mod controller;
pub mod event;
pub mod lifecycle;

#[cfg(test)]
mod tests;

pub use controller::ChatController;
pub use event::{ChatEvent, Completion};
pub use lifecycle::{Phase, RequestTracker, Ticket};
