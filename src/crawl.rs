//! Recursive URL loading.
//!
//! Breadth-first from each starting URL. Depth 1 is the starting page
//! alone; depth 2 adds the pages it links to, and so on. Links are read
//! from `href` attributes, resolved against the page URL, stripped of
//! fragments, and followed only when they stay under the starting URL
//! (same scheme, host, and path prefix). Each URL is fetched at most
//! once per crawl and at most `max_pages` pages are fetched in total.
//!
//! HTML responses are converted to Markdown-flavored text with `htmd`;
//! anything else is kept verbatim. A transport failure on a starting
//! URL is returned as an error. Everything else that goes wrong on a
//! single page (non-success status, transport failure on a linked page,
//! undecodable body) is logged and the page is skipped.

use anyhow::{Context, Result};
use regex::Regex;
use std::collections::{HashSet, VecDeque};
use std::time::Duration;
use url::Url;

use content_rag_core::models::{Document, SOURCE_KEY};

use crate::config::CrawlConfig;

pub struct Crawler {
    client: reqwest::Client,
    max_pages: usize,
    href: Regex,
}

impl Crawler {
    pub fn new(config: &CrawlConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self {
            client,
            max_pages: config.max_pages.max(1),
            href: Regex::new(r#"(?i)href\s*=\s*["']([^"']+)["']"#)?,
        })
    }

    /// Crawl every URL in `urls` to `max_depth`, in order.
    pub async fn crawl_all(&self, urls: &[String], max_depth: usize) -> Result<Vec<Document>> {
        let mut documents = Vec::new();
        for url in urls {
            documents.extend(self.crawl(url, max_depth).await?);
        }
        Ok(documents)
    }

    /// Crawl from one starting URL.
    pub async fn crawl(&self, start: &str, max_depth: usize) -> Result<Vec<Document>> {
        let mut root = Url::parse(start).with_context(|| format!("Invalid URL: {}", start))?;
        root.set_fragment(None);
        let prefix = root.as_str().to_string();

        let mut visited: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<(Url, usize)> = VecDeque::new();
        let mut documents = Vec::new();
        visited.insert(prefix.clone());
        queue.push_back((root, 1));

        // Every queued URL is in `visited`, so capping `visited` caps fetches.
        while let Some((url, depth)) = queue.pop_front() {
            let is_root = depth == 1;
            let page = match self.fetch(&url).await {
                Ok(page) => page,
                Err(e) if is_root => return Err(e),
                Err(e) => {
                    let error = format!("{:#}", e);
                    tracing::warn!(url = %url, %error, "skipping page");
                    continue;
                }
            };
            let Some(page) = page else { continue };

            if depth < max_depth && page.is_html {
                for link in self.links(&url, &page.body, &prefix) {
                    if visited.len() >= self.max_pages {
                        break;
                    }
                    if visited.insert(link.as_str().to_string()) {
                        queue.push_back((link, depth + 1));
                    }
                }
            }

            let text = if page.is_html {
                match htmd::convert(&page.body) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!(url = %url, error = %e, "HTML conversion failed, skipping page");
                        continue;
                    }
                }
            } else {
                page.body
            };
            documents.push(Document::new(text).with_metadata(SOURCE_KEY, url.as_str()));
        }

        tracing::info!(url = start, pages = documents.len(), "crawl finished");
        Ok(documents)
    }

    /// `Ok(None)` for a non-success status, which is logged and skipped.
    async fn fetch(&self, url: &Url) -> Result<Option<Page>> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("Failed to fetch {}", url))?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(url = %url, %status, "non-success response, skipping page");
            return Ok(None);
        }

        let is_html = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.to_ascii_lowercase().contains("html"))
            .unwrap_or(false);
        let body = response
            .text()
            .await
            .with_context(|| format!("Failed to read body of {}", url))?;
        Ok(Some(Page { body, is_html }))
    }

    /// Followable links of a page, in document order, deduplicated.
    fn links(&self, base: &Url, html: &str, prefix: &str) -> Vec<Url> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for cap in self.href.captures_iter(html) {
            let Ok(mut link) = base.join(cap[1].trim()) else {
                continue;
            };
            link.set_fragment(None);
            if !matches!(link.scheme(), "http" | "https") {
                continue;
            }
            if !link.as_str().starts_with(prefix) {
                continue;
            }
            if seen.insert(link.as_str().to_string()) {
                out.push(link);
            }
        }
        out
    }
}

struct Page {
    body: String,
    is_html: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, response::Html, routing::get, Router};

    fn crawler(max_pages: usize) -> Crawler {
        Crawler::new(&CrawlConfig {
            max_pages,
            ..CrawlConfig::default()
        })
        .unwrap()
    }

    async fn serve() -> String {
        let app = Router::new()
            .route(
                "/docs/",
                get(|| async {
                    Html(
                        r#"<h1>Index</h1>
                        <a href="a.html">A</a>
                        <a href="/docs/b.html#section">B</a>
                        <a href="/docs/missing.html">gone</a>
                        <a href="/elsewhere.html">outside</a>
                        <a href="mailto:x@example.com">mail</a>"#,
                    )
                }),
            )
            .route(
                "/docs/a.html",
                get(|| async { Html(r#"<p>Page A</p><a href="deep.html">deeper</a>"#) }),
            )
            .route("/docs/b.html", get(|| async { Html("<p>Page B</p>") }))
            .route("/docs/deep.html", get(|| async { Html("<p>Deep</p>") }))
            .route("/docs/plain.txt", get(|| async { "plain *text*" }))
            .route(
                "/docs/missing.html",
                get(|| async { (StatusCode::NOT_FOUND, "nope") }),
            )
            .route("/elsewhere.html", get(|| async { Html("<p>Outside</p>") }));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn sources(docs: &[Document]) -> Vec<String> {
        docs.iter().map(|d| d.metadata[SOURCE_KEY].clone()).collect()
    }

    #[test]
    fn test_links_resolution_and_prefix() {
        let c = crawler(100);
        let base = Url::parse("http://h/docs/").unwrap();
        let links = c.links(
            &base,
            r##"<a href="x.html#top">x</a><a HREF='/docs/y'>y</a><a href="x.html">dup</a>
               <a href="/other">o</a><a href="https://h/docs/z">scheme</a><a href="#frag">f</a>"##,
            "http://h/docs/",
        );
        let links: Vec<&str> = links.iter().map(|u| u.as_str()).collect();
        assert_eq!(
            links,
            vec!["http://h/docs/x.html", "http://h/docs/y", "http://h/docs/"]
        );
    }

    #[tokio::test]
    async fn test_depth_one_fetches_only_start_page() {
        let base = serve().await;
        let docs = crawler(100)
            .crawl(&format!("{}/docs/", base), 1)
            .await
            .unwrap();
        assert_eq!(sources(&docs), vec![format!("{}/docs/", base)]);
        assert!(docs[0].text.contains("Index"));
        assert!(!docs[0].text.contains("<h1>"));
    }

    #[tokio::test]
    async fn test_depth_two_follows_links_under_prefix() {
        let base = serve().await;
        let docs = crawler(100)
            .crawl(&format!("{}/docs/", base), 2)
            .await
            .unwrap();
        assert_eq!(
            sources(&docs),
            vec![
                format!("{}/docs/", base),
                format!("{}/docs/a.html", base),
                format!("{}/docs/b.html", base),
            ]
        );
    }

    #[tokio::test]
    async fn test_depth_three_reaches_nested_pages() {
        let base = serve().await;
        let docs = crawler(100)
            .crawl(&format!("{}/docs/", base), 3)
            .await
            .unwrap();
        assert!(sources(&docs).contains(&format!("{}/docs/deep.html", base)));
        assert_eq!(docs.len(), 4);
    }

    #[tokio::test]
    async fn test_max_pages_caps_crawl() {
        let base = serve().await;
        let docs = crawler(2)
            .crawl(&format!("{}/docs/", base), 3)
            .await
            .unwrap();
        assert_eq!(docs.len(), 2);
    }

    #[tokio::test]
    async fn test_non_html_kept_verbatim() {
        let base = serve().await;
        let docs = crawler(100)
            .crawl(&format!("{}/docs/plain.txt", base), 2)
            .await
            .unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].text, "plain *text*");
    }

    #[tokio::test]
    async fn test_non_success_start_page_is_skipped() {
        let base = serve().await;
        let docs = crawler(100)
            .crawl(&format!("{}/docs/missing.html", base), 1)
            .await
            .unwrap();
        assert!(docs.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_start_page_fails() {
        let err = crawler(100)
            .crawl("http://127.0.0.1:1/", 1)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Failed to fetch"));
    }

    #[tokio::test]
    async fn test_invalid_url_fails() {
        assert!(crawler(100).crawl("not a url", 1).await.is_err());
    }
}
