//! HTML extraction for the mobile board pages.
//!
//! Kept free of I/O so it can be exercised against saved pages.

use chrono::NaiveDateTime;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tc_core::models::SourceDocument;
use thiserror::Error;

static LISTING_LINK: Lazy<Selector> = Lazy::new(|| selector("ul.gall-detail-lst a.lt[href]"));
static TITLE: Lazy<Selector> = Lazy::new(|| selector(".gallview-tit-box .tit"));
static INFO_ITEM: Lazy<Selector> = Lazy::new(|| selector(".gallview-tit-box .ginfo2 li"));
static GALLOG_LINK: Lazy<Selector> =
    Lazy::new(|| selector(".gallview-tit-box .ginfo2 a[href*=\"/gallog/\"]"));
static BODY: Lazy<Selector> = Lazy::new(|| selector(".thum-txtin"));
static BODY_IMAGE: Lazy<Selector> = Lazy::new(|| selector(".thum-txtin img"));

const TIME_FORMATS: &[&str] = &["%Y.%m.%d %H:%M:%S", "%Y.%m.%d %H:%M"];

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("Invalid CSS selector")
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("post {0} has no readable publication time")]
    MissingTime(i64),
}

/// Post ids linked from a board listing page, in page order, without
/// duplicates. Links to other boards are ignored.
pub fn parse_listing(html: &str, board_id: &str) -> Vec<i64> {
    let document = Html::parse_document(html);
    let mut ids = Vec::new();

    for link in document.select(&LISTING_LINK) {
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        if let Some(id) = post_id_from_href(href, board_id) {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
    }

    ids
}

/// Extracts `{id}` from `.../board/{board_id}/{id}?query`.
fn post_id_from_href(href: &str, board_id: &str) -> Option<i64> {
    let path = href.split(['?', '#']).next()?;
    let mut segments = path.trim_end_matches('/').rsplit('/');
    let id = segments.next()?.parse().ok()?;
    (segments.next()? == board_id).then_some(id)
}

/// Reads a post page. `Ok(None)` when the page carries no post (the source
/// answers removed posts with an alert page rather than an error status).
pub fn parse_document(html: &str, id: i64) -> Result<Option<SourceDocument>, ParseError> {
    let document = Html::parse_document(html);

    let Some(title) = document.select(&TITLE).next().map(squashed_text) else {
        return Ok(None);
    };

    let info: Vec<String> = document.select(&INFO_ITEM).map(squashed_text).collect();
    let author = info.first().cloned().unwrap_or_default();
    let time = info
        .iter()
        .find_map(|item| parse_time(item))
        .ok_or(ParseError::MissingTime(id))?;

    let author_id = document
        .select(&GALLOG_LINK)
        .next()
        .and_then(|a| a.value().attr("href"))
        .and_then(|href| href.split(['?', '#']).next())
        .and_then(|path| path.trim_end_matches('/').rsplit('/').next())
        .filter(|segment| !segment.is_empty() && *segment != "gallog")
        .map(str::to_string);

    let contents = document
        .select(&BODY)
        .next()
        .map(body_text)
        .unwrap_or_default();

    let images = document
        .select(&BODY_IMAGE)
        .filter_map(|img| {
            let value = img.value();
            value
                .attr("data-original")
                .or_else(|| value.attr("src"))
                .map(str::trim)
                .filter(|src| !src.is_empty())
                .map(str::to_string)
        })
        .collect();

    Ok(Some(SourceDocument {
        id,
        title,
        author,
        author_id,
        time,
        contents,
        images,
    }))
}

fn parse_time(text: &str) -> Option<NaiveDateTime> {
    TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text.trim(), format).ok())
}

/// Element text with runs of whitespace collapsed.
fn squashed_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Body text, one non-empty line per text node.
fn body_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
