use std::path::PathBuf;
use std::sync::Arc;

use futures::StreamExt;
use iced::Task;

use crate::api::{ApiConfig, LearnWebClient};
use crate::application::{BatchEvent, ConflictAction, DiskSaver, DownloadCoordinator, Notification};
use crate::domain::{CoursePage, DownloadPhase, DownloadRequest, DownloadResponse};
use crate::ui::{DownloadMessage, DownloadView};

pub struct DownloadApp {
    view: DownloadView,
    client: LearnWebClient,
}

impl Default for DownloadApp {
    fn default() -> Self {
        Self::new(ApiConfig::from_env())
    }
}

impl DownloadApp {
    pub fn new(config: ApiConfig) -> Self {
        let mut view = DownloadView::default();
        view.page_url = config.base_url.clone();

        Self {
            view,
            client: LearnWebClient::new(config),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Message {
    UiMessage(DownloadMessage),
    PageLoaded(Result<CoursePage, String>),
    /// Download root picked by the user, `None` if the dialog was cancelled
    FolderSelected(Option<PathBuf>),
    Batch(BatchEvent),
    /// Outcome of showing the desktop notification
    Notified(Result<(), String>),
}

fn start_batch(app: &mut DownloadApp, root: PathBuf) -> Task<Message> {
    let conflict = if app.client.config().overwrite_existing {
        ConflictAction::Overwrite
    } else {
        ConflictAction::Uniquify
    };
    let saver = DiskSaver::new(app.client.clone(), root).with_conflict_action(conflict);
    let coordinator = DownloadCoordinator::new(Arc::new(saver));

    let request = DownloadRequest {
        files: app.view.selected_files(),
        course_name: Some(app.view.course_name.clone()),
    };
    app.view.phase = DownloadPhase::Downloading;
    app.view.status_message = format!("Starting {} downloads...", request.files.len());

    // The stream issues the save requests on the tokio executor.
    Task::stream(coordinator.download_batch_stream(request).map(Message::Batch))
}

fn desktop_notification(notification: &Notification) -> notify_rust::Notification {
    let mut desktop = notify_rust::Notification::new();
    desktop
        .appname("LearnWeb Downloader")
        .summary(&notification.title)
        .body(&notification.message);
    desktop
}

/// Raise a system notification; the D-Bus / OS call blocks, so it runs off the UI loop.
fn show_notification(notification: Notification) -> Task<Message> {
    Task::perform(
        async move {
            tokio::task::spawn_blocking(move || {
                desktop_notification(&notification)
                    .show()
                    .map(|_| ())
                    .map_err(|e| e.to_string())
            })
            .await
            .unwrap_or_else(|e| Err(e.to_string()))
        },
        Message::Notified,
    )
}

pub fn update(app: &mut DownloadApp, message: Message) -> Task<Message> {
    match message {
        Message::UiMessage(ui_msg) => {
            app.view.update(ui_msg.clone());

            match ui_msg {
                DownloadMessage::LoadPressed => {
                    let url = app.view.page_url.trim().to_string();
                    if !url.is_empty() && app.view.phase != DownloadPhase::Loading {
                        let client = app.client.clone();

                        app.view.phase = DownloadPhase::Loading;
                        app.view.status_message = format!("Loading {url}");

                        return Task::perform(
                            async move { client.fetch_course_page(&url).await.map_err(|e| e.to_string()) },
                            Message::PageLoaded,
                        );
                    }
                }
                DownloadMessage::DownloadPressed => {
                    if app.view.selected_files().is_empty() || app.view.phase == DownloadPhase::Downloading {
                        return Task::none();
                    }

                    let configured = app.client.config().download_dir.clone();
                    if let Some(root) = configured {
                        return start_batch(app, root);
                    }

                    app.view.phase = DownloadPhase::AwaitingFolder;
                    app.view.status_message = "Please select a download folder...".to_string();
                    return Task::perform(
                        async {
                            rfd::AsyncFileDialog::new()
                                .set_title("Download folder")
                                .pick_folder()
                                .await
                                .map(|handle| handle.path().to_path_buf())
                        },
                        Message::FolderSelected,
                    );
                }
                _ => {}
            }
        }
        Message::PageLoaded(result) => match result {
            Ok(page) => app.view.set_page(page),
            Err(e) => {
                tracing::warn!("failed to load course page: {e}");
                app.view.phase = DownloadPhase::Failed;
                app.view.status_message = format!("Failed to load page: {e}");
            }
        },
        Message::FolderSelected(Some(root)) => return start_batch(app, root),
        Message::FolderSelected(None) => {
            app.view.phase = DownloadPhase::Ready;
            app.view.status_message = "Download cancelled".to_string();
        }
        Message::Batch(event) => match event {
            BatchEvent::Responded(DownloadResponse::Started {
                folder_name,
                total_files,
                ..
            }) => {
                app.view.status_message = format!("Downloading {total_files} files to {folder_name}");
            }
            BatchEvent::Responded(DownloadResponse::Rejected { error, .. }) => {
                app.view.phase = DownloadPhase::Failed;
                app.view.status_message = format!("Download failed: {error}");
            }
            BatchEvent::Progress { completed, total } => {
                app.view.status_message = format!("Downloaded {completed} / {total}");
            }
            BatchEvent::Completed(done) => {
                let notification = done.notification();
                app.view.phase = DownloadPhase::Completed;
                app.view.status_message = format!("{}: {}", notification.title, notification.message);
                return show_notification(notification);
            }
        },
        Message::Notified(Ok(())) => {}
        Message::Notified(Err(e)) => {
            tracing::warn!("could not show desktop notification: {e}");
        }
    }
    Task::none()
}

pub fn view(app: &DownloadApp) -> iced::Element<'_, Message> {
    app.view.view().map(Message::UiMessage)
}
