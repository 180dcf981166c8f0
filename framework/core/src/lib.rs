mod shutdown;

pub mod prelude {
    pub use crate::shutdown::{CancelledError, ShutdownHandle, ShutdownListener};
}
