//! Content-type driven body parsing
//!
//! `RequestCtx::payload()` dispatches on the declared content type:
//! url-encoded forms become a string map, multipart forms become a map
//! of bytes or file uploads, JSON becomes a decoded value. Anything else
//! yields [`Payload::None`].

use super::RequestCtx;
use crate::errors::ParseError;
use axum::body::{Body, Bytes};
use axum::extract::{FromRequest, Multipart};
use axum::http::{header, Method, Request};
use std::collections::HashMap;

/// A parsed request body
#[derive(Debug)]
pub enum Payload {
    /// `application/x-www-form-urlencoded`
    Form(HashMap<String, String>),
    /// `multipart/form-data`, keyed by field name
    Multipart(HashMap<String, PartValue>),
    /// `application/json`
    Json(serde_json::Value),
    /// Unknown or absent content type
    None,
}

/// One field of a multipart body
#[derive(Debug)]
pub enum PartValue {
    /// A plain field
    Bytes(Bytes),
    /// A field carrying an uploaded file
    File(FileUpload),
}

/// An uploaded file from a multipart body
#[derive(Debug)]
pub struct FileUpload {
    /// Client-supplied file name
    pub name: String,
    /// Declared media type, `application/octet-stream` when absent
    pub mime_type: String,
    /// `Content-Transfer-Encoding` of the part, when present
    pub transfer_encoding: Option<String>,
    /// File contents
    pub bytes: Bytes,
}

pub(super) async fn parse(req: &RequestCtx) -> Result<Payload, ParseError> {
    if req.is_form() {
        let text = req.body_text()?;
        let fields: HashMap<String, String> = serde_urlencoded::from_str(text)?;
        return Ok(Payload::Form(fields));
    }
    if req.is_multipart() {
        return parse_multipart(req).await.map(Payload::Multipart);
    }
    if req.is_json() {
        return Ok(Payload::Json(req.json()?));
    }
    Ok(Payload::None)
}

/// Feed the buffered body back through axum's multipart extractor; the
/// boundary lives in the original `Content-Type` header.
async fn parse_multipart(req: &RequestCtx) -> Result<HashMap<String, PartValue>, ParseError> {
    let content_type = req
        .header_str(header::CONTENT_TYPE.as_str())
        .ok_or_else(|| ParseError::multipart("missing content type"))?;

    let request = Request::builder()
        .method(Method::POST)
        .uri("/")
        .header(header::CONTENT_TYPE, content_type)
        .body(Body::from(req.body_bytes().clone()))
        .map_err(|e| ParseError::multipart(e.to_string()))?;

    let mut multipart = Multipart::from_request(request, &())
        .await
        .map_err(|e| ParseError::multipart(e.to_string()))?;

    let mut parts = HashMap::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ParseError::multipart(e.to_string()))?
    {
        let field_name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let mime_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let transfer_encoding = field
            .headers()
            .get("content-transfer-encoding")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ParseError::multipart(e.to_string()))?;

        let value = match file_name {
            Some(name) => PartValue::File(FileUpload {
                name,
                mime_type,
                transfer_encoding,
                bytes,
            }),
            None => PartValue::Bytes(bytes),
        };
        parts.insert(field_name, value);
    }
    Ok(parts)
}
