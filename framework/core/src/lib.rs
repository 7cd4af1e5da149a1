mod error;
mod shutdown;

pub mod prelude {
    pub use crate::error::{PerfError, PerfResult};
    pub use crate::shutdown::{RunAbortedError, ShutdownHandle, ShutdownListener};
}
