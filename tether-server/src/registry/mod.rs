mod connection;
mod names;
mod room;

pub use connection::*;
pub use names::*;
pub use room::*;
