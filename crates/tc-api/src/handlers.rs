//! # tc-api Handlers
//!
//! This module coordinates the flow between HTTP requests and the archive
//! queries. Response shapes match what the bundled web front end expects.

use actix_web::{web, HttpResponse, Responder};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tc_core::error::AppError;
use tc_core::models::{Post, PostSummary, TIME_FORMAT};
use tc_services::ArchiveQueries;

/// State shared across all Actix-web workers.
pub struct AppState {
    pub queries: ArchiveQueries,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct PostQuery {
    pub id: i64,
}

#[derive(Debug, Serialize)]
pub struct DeletedPostBody {
    pub id: i64,
    pub title: String,
    pub author: String,
    pub author_id: Option<String>,
    pub time: String,
}

impl From<PostSummary> for DeletedPostBody {
    fn from(summary: PostSummary) -> Self {
        Self {
            id: summary.id,
            title: summary.title,
            author: summary.author,
            author_id: summary.author_id,
            time: summary.time.format(TIME_FORMAT).to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FullPostBody {
    pub id: i64,
    pub title: String,
    pub author: String,
    pub author_id: Option<String>,
    pub time: String,
    pub contents: String,
    /// `[{"image1": url}, {"image2": url}, ...]`
    pub images: Vec<serde_json::Value>,
    pub isdeleted: u8,
    pub isblinded: u8,
}

impl From<Post> for FullPostBody {
    fn from(post: Post) -> Self {
        let images = post
            .images
            .into_iter()
            .enumerate()
            .map(|(i, url)| json!({ format!("image{}", i + 1): url }))
            .collect();
        Self {
            id: post.id,
            title: post.title,
            author: post.author,
            author_id: post.author_id,
            time: post.time.format(TIME_FORMAT).to_string(),
            contents: post.contents,
            images,
            isdeleted: post.is_deleted as u8,
            isblinded: post.is_blinded as u8,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DatabaseCheckBody {
    pub total_posts: i64,
    pub deleted_posts: i64,
    pub latest_posts: Vec<i64>,
}

fn error_response(e: AppError) -> HttpResponse {
    match e {
        AppError::NotFound(kind, _) => {
            HttpResponse::NotFound().json(json!({ "detail": format!("{} not found", kind) }))
        }
        AppError::ValidationError(msg) => HttpResponse::BadRequest().json(json!({ "detail": msg })),
        other => {
            log::error!("request failed: {}", other);
            HttpResponse::InternalServerError().json(json!({ "detail": "Internal server error" }))
        }
    }
}

/// `GET /api/deleted?page=N`: twenty deleted posts per page, newest first.
pub async fn deleted_posts(data: web::Data<AppState>, query: web::Query<PageQuery>) -> impl Responder {
    let page = query.page.unwrap_or(1);
    log::debug!("listing deleted posts, page {}", page);

    match data.queries.deleted_posts(page).await {
        Ok(posts) => {
            let body: Vec<DeletedPostBody> = posts.into_iter().map(Into::into).collect();
            HttpResponse::Ok().json(body)
        }
        Err(e) => error_response(e),
    }
}

/// `GET /api/post?id=N`
pub async fn get_post(data: web::Data<AppState>, query: web::Query<PostQuery>) -> impl Responder {
    match data.queries.get_post(query.id).await {
        Ok(post) => HttpResponse::Ok().json(FullPostBody::from(post)),
        Err(e) => error_response(e),
    }
}

/// `GET /api/database_check`
pub async fn database_check(data: web::Data<AppState>) -> impl Responder {
    match data.queries.diagnostics().await {
        Ok(d) => HttpResponse::Ok().json(DatabaseCheckBody {
            total_posts: d.total_posts,
            deleted_posts: d.deleted_posts,
            latest_posts: d.recent_ids,
        }),
        Err(e) => error_response(e),
    }
}

const ROOT_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <meta http-equiv="refresh" content="3;url=/app">
    <title>Redirecting...</title>
    <style>
        body, html { height: 100%; margin: 0; display: flex; justify-content: center;
                     align-items: center; background-color: #f0f4f8; font-family: Arial, sans-serif; }
        p { color: #777; font-size: 14px; margin: 0; }
    </style>
</head>
<body>
    <p>Redirecting to main page...</p>
</body>
</html>
"#;

/// `GET /`: sends browsers on to the front end under `/app`.
pub async fn index() -> impl Responder {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(ROOT_HTML)
}
