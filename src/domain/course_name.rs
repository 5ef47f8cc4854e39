//! Course name and semester heuristics over a course page's breadcrumb trail.
//!
//! LearnWeb breadcrumbs run root-to-leaf as site / year / semester / course,
//! so the semester text sits at index 2 and the course title at index 3. Pages
//! with a different trail depth simply get the default name; this is a best
//! effort parse, not a validated one.

use std::fmt;

use regex::Regex;

use crate::utils::sanitize_name;

pub const DEFAULT_COURSE_NAME: &str = "LearnWebCourse";

const SEMESTER_INDEX: usize = 2;
const COURSE_INDEX: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseName {
    pub title: String,
    pub semester_tag: Option<String>,
}

impl Default for CourseName {
    fn default() -> Self {
        Self {
            title: DEFAULT_COURSE_NAME.to_string(),
            semester_tag: None,
        }
    }
}

impl CourseName {
    /// Derive the course name from breadcrumb texts. `None` when the trail is
    /// too short or the course entry is blank; callers fall back to
    /// `CourseName::default()` ([`DEFAULT_COURSE_NAME`]).
    pub fn try_extract<S: AsRef<str>>(breadcrumbs: &[S]) -> Option<Self> {
        let raw_title = breadcrumbs.get(COURSE_INDEX)?.as_ref().trim();
        if raw_title.is_empty() {
            return None;
        }

        let title = strip_numeric_suffix(raw_title);
        let semester_tag = breadcrumbs
            .get(SEMESTER_INDEX)
            .and_then(|text| semester_tag(text.as_ref()));

        Some(Self {
            title,
            semester_tag,
        })
    }

    /// Course title with the semester tag appended, if there is one.
    pub fn display_name(&self) -> String {
        self.to_string()
    }

    /// Display name made safe for use as the top-level download folder.
    pub fn folder_name(&self) -> String {
        sanitize_name(Some(&self.display_name()))
    }
}

impl fmt::Display for CourseName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.semester_tag {
            Some(tag) => write!(f, "{} - {}", self.title, tag),
            None => f.write_str(&self.title),
        }
    }
}

/// Drop trailing course numbers such as `-2024` or `_07`.
fn strip_numeric_suffix(raw: &str) -> String {
    let stripped = match Regex::new(r"[-_]?\d+_?\d*$") {
        Ok(re) => re.replace(raw, "").trim().to_string(),
        Err(_) => raw.to_string(),
    };

    if stripped.is_empty() {
        raw.to_string()
    } else {
        stripped
    }
}

/// `SoSe 2024` becomes `SOSE 24`; `WiSe 2023/2024`, `WiSe 23` and
/// `WiSe 2023` all become `WISE 23/24`.
fn semester_tag(text: &str) -> Option<String> {
    let re = Regex::new(r"(?i)(?:^|[^a-z])(wise|sose)\s*(\d{4}|\d{2})").ok()?;
    let caps = re.captures(text)?;

    let year: u32 = caps[2].parse().ok()?;
    let first = year % 100;

    if caps[1].eq_ignore_ascii_case("sose") {
        Some(format!("SOSE {first:02}"))
    } else {
        let second = (first + 1) % 100;
        Some(format!("WISE {first:02}/{second:02}"))
    }
}
