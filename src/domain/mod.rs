pub mod course_name;
pub mod error;
pub mod model;

pub use course_name::CourseName;
pub use error::AppError;
pub use model::{
    group_by_section, CoursePage, DownloadJob, DownloadPhase, DownloadRequest, DownloadResponse,
    FileEntry, JobId, JobStatus, SaveEvent, SaveRequest, SaveState, Section, DEFAULT_SECTION,
};
