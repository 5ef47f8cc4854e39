use iced::{
    widget::{button, checkbox, column, row, scrollable, text, text_input, Column, Space},
    Element, Length,
};

use crate::domain::{CoursePage, DownloadPhase, FileEntry, Section};

pub const EMPTY_STATE: &str = "No files found on this page";
const EMPTY_HINT: &str = "Navigate to a LearnWeb course page to see and download available files";

/// One scraped section and which of its files are ticked.
#[derive(Debug, Clone)]
pub struct SectionView {
    pub section: Section,
    pub selected: Vec<bool>,
}

impl SectionView {
    fn new(section: Section) -> Self {
        let selected = vec![false; section.files.len()];
        Self { section, selected }
    }

    pub fn all_selected(&self) -> bool {
        self.selected.iter().all(|s| *s)
    }

    pub fn any_selected(&self) -> bool {
        self.selected.iter().any(|s| *s)
    }

    /// Section title, with a `(k/n)` count while only some files are ticked.
    pub fn label(&self) -> String {
        if self.any_selected() && !self.all_selected() {
            let ticked = self.selected.iter().filter(|s| **s).count();
            format!("{} ({ticked}/{})", self.section.title, self.selected.len())
        } else {
            self.section.title.clone()
        }
    }
}

/// Main view state
pub struct DownloadView {
    pub page_url: String,
    pub course_name: String,
    pub sections: Vec<SectionView>,
    pub status_message: String,
    pub phase: DownloadPhase,
}

impl Default for DownloadView {
    fn default() -> Self {
        Self {
            page_url: String::new(),
            course_name: String::new(),
            sections: Vec::new(),
            status_message: "Enter a course page URL to list its files".to_string(),
            phase: DownloadPhase::Idle,
        }
    }
}

#[derive(Debug, Clone)]
pub enum DownloadMessage {
    PageUrlChanged(String),
    LoadPressed,
    SectionToggled(usize, bool),
    FileToggled(usize, usize, bool),
    SelectAllPressed,
    DownloadPressed,
}

impl DownloadView {
    pub fn update(&mut self, message: DownloadMessage) {
        match message {
            DownloadMessage::PageUrlChanged(url) => {
                self.page_url = url;
            }
            DownloadMessage::SectionToggled(index, checked) => {
                if let Some(section) = self.sections.get_mut(index) {
                    section.selected.iter_mut().for_each(|s| *s = checked);
                }
            }
            DownloadMessage::FileToggled(section, file, checked) => {
                if let Some(slot) = self
                    .sections
                    .get_mut(section)
                    .and_then(|s| s.selected.get_mut(file))
                {
                    *slot = checked;
                }
            }
            DownloadMessage::SelectAllPressed => {
                let all = self.sections.iter().all(SectionView::all_selected);
                for section in &mut self.sections {
                    section.selected.iter_mut().for_each(|s| *s = !all);
                }
            }
            DownloadMessage::LoadPressed | DownloadMessage::DownloadPressed => {
                // Will be handled by the app
            }
        }
    }

    /// Replace the listing with a freshly scraped page; nothing is ticked.
    pub fn set_page(&mut self, page: CoursePage) {
        self.course_name = page.course_name;
        self.sections = page.sections.into_iter().map(SectionView::new).collect();
        self.phase = DownloadPhase::Ready;
        self.status_message = if self.sections.is_empty() {
            EMPTY_STATE.to_string()
        } else {
            format!("Found files in {} sections", self.sections.len())
        };
    }

    /// Ticked files in page order.
    pub fn selected_files(&self) -> Vec<FileEntry> {
        self.sections
            .iter()
            .flat_map(|s| {
                s.section
                    .files
                    .iter()
                    .zip(&s.selected)
                    .filter(|(_, selected)| **selected)
                    .map(|(file, _)| file.clone())
            })
            .collect()
    }

    /// (selected, total)
    pub fn counts(&self) -> (usize, usize) {
        self.sections.iter().fold((0, 0), |(selected, total), s| {
            (
                selected + s.selected.iter().filter(|x| **x).count(),
                total + s.selected.len(),
            )
        })
    }

    fn can_download(&self) -> bool {
        self.counts().0 > 0
            && !matches!(
                self.phase,
                DownloadPhase::Loading | DownloadPhase::AwaitingFolder | DownloadPhase::Downloading
            )
    }

    fn file_list(&self) -> Element<'_, DownloadMessage> {
        if self.sections.is_empty() {
            return column![text(EMPTY_STATE).size(16), text(EMPTY_HINT).size(12)]
                .spacing(6)
                .into();
        }

        let mut list = Column::new().spacing(12);
        for (si, view) in self.sections.iter().enumerate() {
            let mut files = Column::new().spacing(4).padding([0, 24]);
            for (fi, file) in view.section.files.iter().enumerate() {
                files = files.push(
                    checkbox(view.selected[fi])
                        .label(file.filename.as_str())
                        .on_toggle(move |checked| DownloadMessage::FileToggled(si, fi, checked)),
                );
            }

            list = list.push(
                column![
                    checkbox(view.all_selected())
                        .label(view.label())
                        .on_toggle(move |checked| DownloadMessage::SectionToggled(si, checked)),
                    files,
                ]
                .spacing(6),
            );
        }

        scrollable(list).height(Length::Fill).into()
    }

    pub fn view(&self) -> Element<'_, DownloadMessage> {
        let (selected, total) = self.counts();
        let loading = self.phase == DownloadPhase::Loading;

        column![
            text("LearnWeb Downloader").size(32),
            Space::new().height(Length::Fixed(10.0)),
            text("Course page:").size(16),
            row![
                text_input("https://.../course/view.php?id=...", &self.page_url)
                    .on_input(DownloadMessage::PageUrlChanged)
                    .on_submit(DownloadMessage::LoadPressed)
                    .padding(10),
                button("Load")
                    .on_press_maybe((!loading).then_some(DownloadMessage::LoadPressed))
                    .padding([10, 20]),
            ]
            .spacing(10),
            text(&self.course_name).size(18),
            row![
                button("Select all").on_press(DownloadMessage::SelectAllPressed),
                text(format!("{selected} / {total} selected")).size(14),
            ]
            .spacing(10),
            self.file_list(),
            text(&self.status_message).size(14),
            button("Download")
                .on_press_maybe(self.can_download().then_some(DownloadMessage::DownloadPressed))
                .padding([10, 20]),
        ]
        .padding(20)
        .spacing(10)
        .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> CoursePage {
        let file = |name: &str, section: &str| {
            FileEntry::new(format!("https://lms.example/{name}"), format!("{name}.pdf"), section)
        };
        CoursePage {
            course_name: "Algo".into(),
            sections: vec![
                Section {
                    title: "Week 1".into(),
                    files: vec![file("a", "Week 1"), file("b", "Week 1")],
                },
                Section {
                    title: "Week 2".into(),
                    files: vec![file("c", "Week 2")],
                },
            ],
        }
    }

    #[test]
    fn test_set_page_starts_unselected() {
        let mut view = DownloadView::default();
        view.set_page(page());
        assert_eq!(view.counts(), (0, 3));
        assert_eq!(view.phase, DownloadPhase::Ready);
        assert!(!view.can_download());
    }

    #[test]
    fn test_empty_page_shows_empty_state() {
        let mut view = DownloadView::default();
        view.set_page(CoursePage::default());
        assert_eq!(view.status_message, EMPTY_STATE);
    }

    #[test]
    fn test_section_and_file_toggles() {
        let mut view = DownloadView::default();
        view.set_page(page());

        view.update(DownloadMessage::SectionToggled(0, true));
        assert!(view.sections[0].all_selected());
        view.update(DownloadMessage::FileToggled(0, 1, false));
        assert!(view.sections[0].any_selected() && !view.sections[0].all_selected());
        assert_eq!(view.sections[0].label(), "Week 1 (1/2)");
        assert_eq!(view.sections[1].label(), "Week 2");
        view.update(DownloadMessage::FileToggled(1, 0, true));

        let names: Vec<_> = view.selected_files().into_iter().map(|f| f.filename).collect();
        assert_eq!(names, ["a.pdf", "c.pdf"]);
        assert!(view.can_download());

        // out of range indices are ignored
        view.update(DownloadMessage::FileToggled(5, 0, true));
        view.update(DownloadMessage::SectionToggled(9, true));
        assert_eq!(view.counts(), (2, 3));
    }

    #[test]
    fn test_select_all_toggles() {
        let mut view = DownloadView::default();
        view.set_page(page());

        view.update(DownloadMessage::FileToggled(0, 0, true));
        view.update(DownloadMessage::SelectAllPressed);
        assert_eq!(view.counts(), (3, 3));
        view.update(DownloadMessage::SelectAllPressed);
        assert_eq!(view.counts(), (0, 3));
    }

    #[test]
    fn test_no_download_while_busy() {
        let mut view = DownloadView::default();
        view.set_page(page());
        view.update(DownloadMessage::SelectAllPressed);
        view.phase = DownloadPhase::Downloading;
        assert!(!view.can_download());
    }
}
