pub mod compose;
pub mod dom;
pub mod events;
pub mod network;
pub mod script;
