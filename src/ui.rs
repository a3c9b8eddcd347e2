// Output layer: everything the user sees on stdout.
// - `render` prints the status line and the response body.
// - `render_request_summary` is the `--verbose` view of the outgoing
//   request with credentials masked. It never alters the request itself.

use crate::api::{MultipartPayload, ResponseBody, UploadResult, AUDIO_FIELD, KEY_FIELD};
use indexmap::IndexMap;
use reqwest::header::{HeaderName, HeaderValue, AUTHORIZATION};
use serde::Serialize;
use std::io::{self, Write};

/// Replaces credential values in diagnostic output.
pub const REDACTED: &str = "***";

/// Print `HTTP <status>` followed by the body. JSON keeps the key order it
/// arrived with and is indented; text is printed as received.
pub fn render(out: &mut dyn Write, result: &UploadResult) -> io::Result<()> {
    writeln!(out, "HTTP {}", result.status_code)?;
    match &result.body {
        ResponseBody::Json(value) => writeln!(out, "{}", serde_json::to_string_pretty(value)?),
        ResponseBody::Text(text) => writeln!(out, "{text}"),
    }
}

#[derive(Serialize)]
struct FileSummary<'a> {
    filename: &'a str,
    content_type: &'a str,
}

fn masked_header(name: &HeaderName, value: &HeaderValue) -> String {
    if !value.is_sensitive() {
        return value.to_str().unwrap_or("<binary>").to_string();
    }
    if *name == AUTHORIZATION {
        format!("Bearer {REDACTED}")
    } else {
        REDACTED.to_string()
    }
}

pub fn render_request_summary(
    out: &mut dyn Write,
    url: &str,
    payload: &MultipartPayload,
) -> io::Result<()> {
    let headers: IndexMap<&str, String> = payload
        .headers
        .iter()
        .map(|(name, value)| (name.as_str(), masked_header(name, value)))
        .collect();

    let data: IndexMap<&str, &str> = payload
        .form_fields
        .iter()
        .map(|(key, value)| {
            let shown = if key == KEY_FIELD { REDACTED } else { value.as_str() };
            (key.as_str(), shown)
        })
        .collect();

    let file = IndexMap::from([(
        AUDIO_FIELD,
        FileSummary {
            filename: &payload.file.file_name,
            content_type: &payload.file.mime,
        },
    )]);

    writeln!(out, "POST {url}")?;
    writeln!(out, "headers: {}", serde_json::to_string(&headers)?)?;
    writeln!(out, "data: {}", serde_json::to_string(&data)?)?;
    writeln!(out, "file: {}", serde_json::to_string(&file)?)?;
    Ok(())
}
