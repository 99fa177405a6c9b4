mod error;
mod registry;
mod relay;

pub use error::RelayError;
pub use registry::{ConnectionRegistry, NameDirectory, RoleAssignment, RoomRegistry};
pub use relay::{ws_handler, RelayService};
