use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum AppError {
    #[error("No files selected")]
    NothingSelected,

    #[error("Invalid file URL for {filename}: {url}")]
    InvalidFileUrl { filename: String, url: String },
}
