use std::fmt;

use serde::{Deserialize, Serialize};

/// Section title used when a file arrives without one.
pub const DEFAULT_SECTION: &str = "General";

fn default_section() -> String {
    DEFAULT_SECTION.to_string()
}

/// One downloadable resource link harvested from a course page.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FileEntry {
    pub url: String,
    pub filename: String,
    #[serde(default = "default_section")]
    pub section: String,
}

impl FileEntry {
    pub fn new(url: impl Into<String>, filename: impl Into<String>, section: impl Into<String>) -> Self {
        let section = section.into();
        Self {
            url: url.into(),
            filename: filename.into(),
            section: if section.trim().is_empty() {
                default_section()
            } else {
                section
            },
        }
    }
}

/// Files sharing a heading on the course page, in page order.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Section {
    pub title: String,
    pub files: Vec<FileEntry>,
}

/// Group entries by their `section`, ordered by first appearance.
pub fn group_by_section(files: &[FileEntry]) -> Vec<Section> {
    let mut sections: Vec<Section> = Vec::new();
    for file in files {
        match sections.iter_mut().find(|s| s.title == file.section) {
            Some(section) => section.files.push(file.clone()),
            None => sections.push(Section {
                title: file.section.clone(),
                files: vec![file.clone()],
            }),
        }
    }
    sections
}

/// Result of scraping one course page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoursePage {
    pub course_name: String,
    pub sections: Vec<Section>,
}

impl CoursePage {
    pub fn file_count(&self) -> usize {
        self.sections.iter().map(|s| s.files.len()).sum()
    }
}

/// Opaque identifier handed out by a save target for an accepted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Ask a save target to store `url` at `destination`, a `/`-separated path
/// relative to the download root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveRequest {
    pub url: String,
    pub destination: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveState {
    InProgress,
    Complete,
    Error(String),
}

impl SaveState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SaveState::InProgress)
    }
}

/// State change reported by a save target for a job it accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveEvent {
    pub job_id: JobId,
    pub state: SaveState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Succeeded,
    Failed,
}

/// One file of a batch together with every path it may be written to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadJob {
    pub file: FileEntry,
    pub primary_path: String,
    pub fallback_paths: Vec<String>,
    pub status: JobStatus,
}

impl DownloadJob {
    /// Primary path followed by the fallbacks, in the order they are tried.
    pub fn candidate_paths(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.primary_path.as_str()).chain(self.fallback_paths.iter().map(String::as_str))
    }
}

/// Message sent from the selection UI to start a batch.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadRequest {
    pub files: Vec<FileEntry>,
    #[serde(default)]
    pub course_name: Option<String>,
}

/// Reply to a [`DownloadRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum DownloadResponse {
    #[serde(rename_all = "camelCase")]
    Started {
        success: bool,
        folder_name: String,
        total_files: usize,
    },
    Rejected {
        success: bool,
        error: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadPhase {
    Idle,
    Loading,
    Ready,
    AwaitingFolder,
    Downloading,
    Completed,
    Failed,
}
