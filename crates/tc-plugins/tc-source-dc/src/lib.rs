//! # tc-source-dc
//!
//! `SourceClient` and `PageProber` over the DCInside mobile site.
//! Every request carries a mobile browser `User-Agent`; the site answers
//! bot-looking clients with block pages.

pub mod parse;

use anyhow::Context;
use async_trait::async_trait;
use std::time::Duration;
use tc_core::models::SourceDocument;
use tc_core::traits::{PageProber, SourceClient};

/// Listing pages walked at most per discovery.
const MAX_LISTING_PAGES: u32 = 5;

pub struct DcSource {
    client: reqwest::Client,
    mobile_host: String,
}

impl DcSource {
    pub fn new(mobile_host: impl Into<String>, user_agent: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .context("building HTTP client")?;

        Ok(Self {
            client,
            mobile_host: mobile_host.into(),
        })
    }

    pub fn board_url(&self, board_id: &str) -> String {
        format!("https://{}/board/{}", self.mobile_host, board_id)
    }

    /// Public page of a post: `https://<mobile-host>/board/{board_id}/{id}`.
    pub fn post_url(&self, board_id: &str, id: i64) -> String {
        format!("{}/{}", self.board_url(board_id), id)
    }

    async fn get_text(&self, url: &str) -> anyhow::Result<(u16, String)> {
        let response = self
            .client
            .get(url)
            .header("Accept", "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8")
            .send()
            .await
            .with_context(|| format!("GET {}", url))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .with_context(|| format!("reading body of {}", url))?;
        Ok((status, body))
    }
}

#[async_trait]
impl SourceClient for DcSource {
    async fn list_recent(&self, board_id: &str, count: usize) -> anyhow::Result<Vec<i64>> {
        let mut ids: Vec<i64> = Vec::with_capacity(count);

        for page in 1..=MAX_LISTING_PAGES {
            if ids.len() >= count {
                break;
            }
            let url = format!("{}?page={}", self.board_url(board_id), page);
            let (status, body) = self.get_text(&url).await?;
            if !(200..300).contains(&status) {
                anyhow::bail!("board listing {} answered {}", url, status);
            }

            let found = parse::parse_listing(&body, board_id);
            if found.is_empty() {
                break;
            }
            for id in found {
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
        }

        ids.truncate(count);
        log::debug!("board {} listing yielded {:?}", board_id, ids);
        Ok(ids)
    }

    async fn fetch_document(&self, board_id: &str, id: i64) -> anyhow::Result<Option<SourceDocument>> {
        let url = self.post_url(board_id, id);
        let (status, body) = self.get_text(&url).await?;
        match status {
            403 | 404 => return Ok(None),
            s if !(200..300).contains(&s) => anyhow::bail!("post page {} answered {}", url, s),
            _ => {}
        }
        Ok(parse::parse_document(&body, id)?)
    }
}

#[async_trait]
impl PageProber for DcSource {
    async fn probe(&self, board_id: &str, id: i64) -> anyhow::Result<u16> {
        let url = self.post_url(board_id, id);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("GET {}", url))?;
        Ok(response.status().as_u16())
    }
}
