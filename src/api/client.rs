use futures::StreamExt;
use regex::Regex;
use reqwest::header::{CONTENT_TYPE, COOKIE};
use reqwest::{Client, RequestBuilder, Response};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use url::Url;

use super::models::ApiConfig;
use super::page::parse_course_page;
use crate::domain::CoursePage;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Server answered {status} for {url}")]
    Status { status: u16, url: String },

    #[error("No file link found on resource page {0}")]
    NoFileLink(String),

    #[error("Failed to write file: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ApiError>;

#[derive(Clone)]
pub struct LearnWebClient {
    config: ApiConfig,
    http: Client,
}

impl LearnWebClient {
    pub fn new(config: ApiConfig) -> Self {
        let http = Client::builder()
            .user_agent(config.user_agent.as_str())
            .build()
            .unwrap_or_default();
        Self { config, http }
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    fn get(&self, url: &str) -> RequestBuilder {
        let request = self.http.get(url);
        match &self.config.session_cookie {
            Some(session) => request.header(COOKIE, format!("MoodleSession={session}")),
            None => request,
        }
    }

    async fn send(&self, url: &str) -> Result<Response> {
        let response = self.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response)
    }

    /// Fetch a course page and scrape its sections.
    pub async fn fetch_course_page(&self, page_url: &str) -> Result<CoursePage> {
        let parsed = Url::parse(page_url.trim()).map_err(|e| ApiError::InvalidUrl(format!("{page_url}: {e}")))?;

        let response = self.send(parsed.as_str()).await?;
        // Redirects (e.g. to a login page) change the base for relative links.
        let final_url = response.url().clone();
        let html = response.text().await?;

        let page = parse_course_page(&html, Some(&final_url));
        tracing::info!(
            url = %final_url,
            course = %page.course_name,
            sections = page.sections.len(),
            files = page.file_count(),
            "fetched course page"
        );
        Ok(page)
    }

    /// Pulls the first `pluginfile.php` link out of a resource page.
    fn extract_file_link(&self, html: &str) -> Option<String> {
        let re = Regex::new(r#"https?://[^"'\s<>]+/pluginfile\.php/[^"'\s<>]+"#).ok()?;
        re.find(html).map(|m| m.as_str().replace("&amp;", "&"))
    }

    /// Resource links usually redirect to the file itself; some resources are
    /// configured to show an HTML page embedding it instead, which is followed once.
    async fn open_resource(&self, url: &str) -> Result<Response> {
        let response = self.send(url).await?;

        let is_html = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("text/html"));
        if !is_html {
            return Ok(response);
        }

        let html = response.text().await?;
        let file_url = self
            .extract_file_link(&html)
            .ok_or_else(|| ApiError::NoFileLink(url.to_string()))?;
        tracing::debug!(resource = url, file = %file_url, "following embedded file link");
        self.send(&file_url).await
    }

    /// Stream `download_url` into `file`; returns the number of bytes written.
    pub async fn download_to_file(&self, download_url: &str, mut file: tokio::fs::File) -> Result<u64> {
        let response = self.open_resource(download_url).await?;
        if let Some(expected) = response.content_length() {
            tracing::debug!(url = download_url, expected, "receiving file");
        }
        let mut stream = response.bytes_stream();

        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.sync_all().await?;

        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn client(session: Option<&str>) -> LearnWebClient {
        LearnWebClient::new(ApiConfig {
            session_cookie: session.map(str::to_string),
            ..ApiConfig::default()
        })
    }

    #[test]
    fn test_extract_file_link() {
        let html = r#"<div class="resourceworkaround">Click
            <a href="https://lms.example/pluginfile.php/42/mod_resource/content/1/Slides.pdf?forcedownload=1&amp;x=2">Slides.pdf</a></div>"#;
        assert_eq!(
            client(None).extract_file_link(html).as_deref(),
            Some("https://lms.example/pluginfile.php/42/mod_resource/content/1/Slides.pdf?forcedownload=1&x=2")
        );
        assert_eq!(client(None).extract_file_link("<p>nothing</p>"), None);
    }

    #[tokio::test]
    async fn test_fetch_course_page_sends_session() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/course/view.php")
            .match_header("cookie", "MoodleSession=s3cret")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body(
                r#"<h1 class="page-title">Compilers</h1>
                <div class="course-section-header"><h3><a>Week 1</a></h3></div>
                <div><a href="/mod/resource/view.php?id=5">Lexing</a></div>"#,
            )
            .create_async()
            .await;

        let page = client(Some("s3cret"))
            .fetch_course_page(&format!("{}/course/view.php", server.url()))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(page.course_name, "Compilers");
        assert_eq!(page.sections.len(), 1);
        assert_eq!(
            page.sections[0].files[0].url,
            format!("{}/mod/resource/view.php?id=5", server.url())
        );
    }

    #[tokio::test]
    async fn test_fetch_course_page_reports_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/course/view.php")
            .with_status(403)
            .create_async()
            .await;

        let err = client(None)
            .fetch_course_page(&format!("{}/course/view.php", server.url()))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Status { status: 403, .. }));
    }

    #[tokio::test]
    async fn test_fetch_course_page_rejects_bad_url() {
        let err = client(None).fetch_course_page("not a url").await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidUrl(_)));
    }

    #[tokio::test]
    async fn test_download_to_file_direct() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/mod/resource/view.php")
            .match_query(Matcher::UrlEncoded("id".into(), "5".into()))
            .with_status(200)
            .with_header("content-type", "application/pdf")
            .with_body("%PDF-1.4 body")
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.pdf");
        let file = tokio::fs::File::create(&path).await.unwrap();

        let written = client(None)
            .download_to_file(&format!("{}/mod/resource/view.php?id=5", server.url()), file)
            .await
            .unwrap();

        assert_eq!(written, 13);
        assert_eq!(std::fs::read(&path).unwrap(), b"%PDF-1.4 body");
    }

    #[tokio::test]
    async fn test_download_follows_embedded_file_link() {
        let mut server = mockito::Server::new_async().await;
        let file_url = format!("{}/pluginfile.php/9/mod_resource/content/1/a.pdf", server.url());
        server
            .mock("GET", "/mod/resource/view.php")
            .match_query(Matcher::UrlEncoded("id".into(), "6".into()))
            .with_status(200)
            .with_header("content-type", "text/html; charset=utf-8")
            .with_body(format!(r#"<object data="{file_url}"></object>"#))
            .create_async()
            .await;
        server
            .mock("GET", "/pluginfile.php/9/mod_resource/content/1/a.pdf")
            .with_status(200)
            .with_header("content-type", "application/pdf")
            .with_body("pdf")
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.pdf");
        let file = tokio::fs::File::create(&path).await.unwrap();

        client(None)
            .download_to_file(&format!("{}/mod/resource/view.php?id=6", server.url()), file)
            .await
            .unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"pdf");
    }

    #[tokio::test]
    async fn test_download_html_without_file_link_fails() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/login/index.php")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body("<form>login</form>")
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let file = tokio::fs::File::create(dir.path().join("x.pdf")).await.unwrap();
        let err = client(None)
            .download_to_file(&format!("{}/login/index.php", server.url()), file)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NoFileLink(_)));
    }
}
