pub mod batch;
pub mod download_coordinator;
pub mod saver;

pub use batch::Notification;
pub use download_coordinator::{BatchEvent, DownloadCoordinator};
pub use saver::{ConflictAction, DiskSaver};
