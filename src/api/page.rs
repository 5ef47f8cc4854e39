//! Course page scraping.
//!
//! Works on the HTML of a fully loaded course page and never fails: if the
//! markup does not look like a LearnWeb course page the result simply has no
//! sections.

use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::domain::{CourseName, CoursePage, FileEntry, Section, DEFAULT_SECTION};
use crate::utils::sanitize_name;

const SECTION_HEADER: &str = ".course-section-header";
const SECTION_TITLE: &str = "h3 a";
const RESOURCE_LINK: &str = r#"a[href*="mod/resource/view.php?id="]"#;
const BREADCRUMB_ITEM: &str = ".breadcrumb li";
const PAGE_TITLE: &str = "h1.page-title";

struct Selectors {
    header: Selector,
    title: Selector,
    resource: Selector,
    breadcrumb: Selector,
    page_title: Selector,
}

impl Selectors {
    fn new() -> Option<Self> {
        Some(Self {
            header: Selector::parse(SECTION_HEADER).ok()?,
            title: Selector::parse(SECTION_TITLE).ok()?,
            resource: Selector::parse(RESOURCE_LINK).ok()?,
            breadcrumb: Selector::parse(BREADCRUMB_ITEM).ok()?,
            page_title: Selector::parse(PAGE_TITLE).ok()?,
        })
    }
}

/// Scrape sections and the course folder name from a course page.
///
/// `base` is the page URL; relative links are resolved against it and
/// dropped when there is none.
pub fn parse_course_page(html: &str, base: Option<&Url>) -> CoursePage {
    let Some(sel) = Selectors::new() else {
        return CoursePage::default();
    };
    let document = Html::parse_document(html);

    CoursePage {
        course_name: course_folder_name(&document, &sel),
        sections: scrape_sections(&document, &sel, base),
    }
}

fn scrape_sections(document: &Html, sel: &Selectors, base: Option<&Url>) -> Vec<Section> {
    let mut sections = Vec::new();

    for header in document.select(&sel.header) {
        let Some(title_el) = header.select(&sel.title).next() else {
            continue;
        };
        let title = Some(element_text(title_el))
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| DEFAULT_SECTION.to_string());

        let Some(container) = header.next_siblings().find_map(ElementRef::wrap) else {
            continue;
        };

        let files: Vec<FileEntry> = container
            .select(&sel.resource)
            .filter_map(|link| {
                let href = link.value().attr("href")?;
                let url = resolve(href, base)?;
                let text = element_text(link);
                if text.is_empty() {
                    return None;
                }
                Some(FileEntry::new(url, guess_filename(&text), title.clone()))
            })
            .collect();

        if !files.is_empty() {
            tracing::debug!(section = %title, files = files.len(), "scraped section");
            sections.push(Section { title, files });
        }
    }

    sections
}

fn course_folder_name(document: &Html, sel: &Selectors) -> String {
    let breadcrumbs: Vec<String> = document.select(&sel.breadcrumb).map(element_text).collect();

    if let Some(name) = CourseName::try_extract(&breadcrumbs) {
        return name.folder_name();
    }

    match document
        .select(&sel.page_title)
        .next()
        .map(element_text)
        .filter(|t| !t.is_empty())
    {
        Some(title) => sanitize_name(Some(&title)),
        None => CourseName::default().folder_name(),
    }
}

/// Link text plus `.pdf`, unless the text already carries an extension.
pub fn guess_filename(text: &str) -> String {
    if text.contains('.') {
        text.to_string()
    } else {
        format!("{text}.pdf")
    }
}

fn resolve(href: &str, base: Option<&Url>) -> Option<String> {
    let url = match base {
        Some(base) => base.join(href).ok()?,
        None => Url::parse(href).ok()?,
    };
    Some(url.to_string())
}

/// Visible text of an element with whitespace runs collapsed.
fn element_text(el: ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}
