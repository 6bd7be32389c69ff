//! Capture and verify sessions: the pipelines the UI layer drives.

mod capture;
mod common;
mod sources;
mod verify;

pub use capture::CaptureSession;
pub use common::{blocking, cancellable, run_on_current_thread, with_timeout};
pub use sources::{AssetSource, FileSource, MediaSource, UploadedFile};
pub use verify::VerifySession;
