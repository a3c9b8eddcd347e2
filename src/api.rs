// Upload client module: turns a validated `UploadRequest` into a multipart
// POST against the call-upload endpoint and interprets what comes back.
// Everything here is blocking and performs at most one request per call.

use crate::error::{UploadError, EXIT_SERVER_FAILURE, EXIT_SUCCESS};
use indexmap::IndexMap;
use reqwest::blocking::{multipart, Client};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the multipart part carrying the audio file.
pub const AUDIO_FIELD: &str = "audio";
/// Form field that repeats the token for servers reading it from the body.
pub const KEY_FIELD: &str = "key";
pub const TALKGROUP_FIELD: &str = "talkgroup";
pub const START_TIME_FIELD: &str = "start_time";
pub const DATE_TIME_FIELD: &str = "dateTime";
pub const API_KEY_HEADER: &str = "x-api-key";
/// Content type sent when the file extension maps to nothing known.
pub const DEFAULT_MIME: &str = "application/octet-stream";

/// Everything needed for one upload, already validated.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub url: String,
    pub audio_path: PathBuf,
    pub token: String,
    pub include_form_key: bool,
    /// Insertion-ordered; a later write to the same key replaces the value
    /// but keeps the original position.
    pub form_fields: IndexMap<String, String>,
    pub timeout: Duration,
}

/// Description of the file part. The file itself is only opened when the
/// request is sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    pub path: PathBuf,
    pub file_name: String,
    pub mime: String,
}

impl FilePart {
    /// Fails for paths without a final file name segment (`..`, `/`).
    pub fn for_path(path: &Path) -> Result<Self, UploadError> {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| UploadError::NotAFile(path.to_path_buf()))?;
        Ok(FilePart {
            path: path.to_path_buf(),
            file_name,
            mime: guess_mime(path),
        })
    }

    /// Open the file and wrap it in a streaming part. The returned part owns
    /// the handle, so it is closed once the request body is dropped.
    fn open_part(&self) -> Result<multipart::Part, UploadError> {
        let unreadable = |source| UploadError::AudioUnreadable {
            path: self.path.clone(),
            source,
        };
        let file = File::open(&self.path).map_err(unreadable)?;
        let len = file.metadata().map_err(unreadable)?.len();
        let part = multipart::Part::reader_with_length(file, len)
            .file_name(self.file_name.clone())
            .mime_str(&self.mime)?;
        Ok(part)
    }
}

/// Request headers, text fields and file part, ready to send.
#[derive(Debug, Clone)]
pub struct MultipartPayload {
    pub headers: HeaderMap,
    pub form_fields: IndexMap<String, String>,
    pub file: FilePart,
}

/// Conventional MIME type for the file name, falling back to
/// `application/octet-stream`. Content is never sniffed.
pub fn guess_mime(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_raw()
        .unwrap_or(DEFAULT_MIME)
        .to_string()
}

/// Build the headers and parts for `req`.
///
/// The token is always presented twice, as `Authorization: Bearer` and as
/// `X-API-Key`; the `key` form field is already part of `req.form_fields`
/// when `include_form_key` is set.
pub fn build_multipart_payload(req: &UploadRequest) -> Result<MultipartPayload, UploadError> {
    let mut bearer = HeaderValue::from_str(&format!("Bearer {}", req.token))
        .map_err(|_| UploadError::InvalidToken)?;
    bearer.set_sensitive(true);
    let mut api_key = HeaderValue::from_str(&req.token).map_err(|_| UploadError::InvalidToken)?;
    api_key.set_sensitive(true);

    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, bearer);
    headers.insert(HeaderName::from_static(API_KEY_HEADER), api_key);

    Ok(MultipartPayload {
        headers,
        form_fields: req.form_fields.clone(),
        file: FilePart::for_path(&req.audio_path)?,
    })
}

/// Status, content type and body of a completed exchange. A non-2xx status
/// is still a result, only the exit code differs.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadResult {
    pub status_code: u16,
    /// Lower-cased `content-type` header, empty when absent.
    pub content_type: String,
    pub body: ResponseBody,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Json(serde_json::Value),
    Text(String),
}

impl UploadResult {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    pub fn exit_code(&self) -> u8 {
        if self.is_success() {
            EXIT_SUCCESS
        } else {
            EXIT_SERVER_FAILURE
        }
    }
}

/// Decide how to present a response body. JSON is only attempted when the
/// content type says so, and a body that fails to parse is kept as text.
pub fn interpret_response(status_code: u16, content_type: &str, body: String) -> UploadResult {
    let content_type = content_type.to_ascii_lowercase();
    let body = if content_type.contains("application/json") {
        match serde_json::from_str(&body) {
            // A literal `null` carries nothing to pretty-print.
            Ok(serde_json::Value::Null) => ResponseBody::Text(body),
            Ok(value) => ResponseBody::Json(value),
            Err(err) => {
                tracing::debug!(%err, "response claims JSON but does not parse; keeping raw text");
                ResponseBody::Text(body)
            }
        }
    } else {
        ResponseBody::Text(body)
    };
    UploadResult {
        status_code,
        content_type,
        body,
    }
}

/// Blocking HTTP client whose timeout bounds the whole exchange: connect,
/// body upload and reading the response.
pub struct Uploader {
    client: Client,
}

impl Uploader {
    pub fn new(timeout: Duration) -> Result<Self, UploadError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Uploader { client })
    }

    /// POST `payload` to `url` once. Network failures of any kind become
    /// `UploadError::Transport`; nothing is retried.
    pub fn send(&self, url: &str, payload: MultipartPayload) -> Result<UploadResult, UploadError> {
        let MultipartPayload {
            headers,
            form_fields,
            file,
        } = payload;

        let mut form = multipart::Form::new();
        for (name, value) in form_fields {
            form = form.text(name, value);
        }
        form = form.part(AUDIO_FIELD, file.open_part()?);

        tracing::debug!(url, file = %file.path.display(), "sending upload");
        // `form` owns the open file; it is consumed here and dropped by the
        // time `send` returns, whatever the outcome.
        let res = self.client.post(url).headers(headers).multipart(form).send()?;

        let status = res.status().as_u16();
        let content_type = res
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("")
            .to_string();
        let text = res.text()?;
        tracing::debug!(status, %content_type, bytes = text.len(), "response received");

        Ok(interpret_response(status, &content_type, text))
    }
}
