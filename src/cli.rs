// Command-line surface and the straight-line driver for one upload.
// - `UploadArgs` is the clap definition; the token may come from the
//   `ICAD_API_KEY` environment variable, captured once at parse time.
// - `validate_inputs` checks local input and assembles the form fields.
// - `upload` runs validate -> build -> (verbose summary) -> send -> render.

use crate::api::{
    build_multipart_payload, UploadRequest, UploadResult, Uploader, DATE_TIME_FIELD, KEY_FIELD,
    START_TIME_FIELD, TALKGROUP_FIELD,
};
use crate::error::UploadError;
use crate::ui;
use anyhow::{bail, Context};
use clap::Parser;
use indexmap::IndexMap;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Environment variable consulted when `--token` is not given.
pub const TOKEN_ENV: &str = "ICAD_API_KEY";

/// Upload a call recording plus metadata to /api/call-upload.
#[derive(Debug, Clone, Parser)]
#[command(name = "call-upload", version, about)]
pub struct UploadArgs {
    /// Full endpoint URL, e.g. http://localhost:9911/api/call-upload
    #[arg(long)]
    pub url: String,

    /// Path to audio file (mp3/wav/etc)
    #[arg(long)]
    pub audio: PathBuf,

    /// API token/key
    #[arg(long, env = TOKEN_ENV, hide_env_values = true)]
    pub token: Option<String>,

    /// Do NOT include form field key=<token>
    #[arg(long)]
    pub no_form_key: bool,

    /// Talkgroup (string or int)
    #[arg(long)]
    pub talkgroup: Option<String>,

    /// Epoch seconds (int/float). If omitted, will use now()
    #[arg(long)]
    pub start_time: Option<String>,

    /// ISO-8601 UTC timestamp (e.g. 2025-12-18T20:15:10Z)
    #[arg(long)]
    pub date_time: Option<String>,

    /// HTTP timeout seconds
    #[arg(long, default_value = "120.0", value_parser = parse_timeout)]
    pub timeout: Duration,

    /// Extra form field KEY=VALUE (repeatable)
    #[arg(long = "field", value_name = "KEY=VALUE", value_parser = parse_field)]
    pub fields: Vec<(String, String)>,

    /// Print request/response details
    #[arg(long)]
    pub verbose: bool,
}

/// Parse `KEY=VALUE`, splitting at the first `=`. The key is trimmed and
/// must not be empty; the value is kept as given.
pub fn parse_field(raw: &str) -> anyhow::Result<(String, String)> {
    let Some((key, value)) = raw.split_once('=') else {
        bail!("Expected KEY=VALUE");
    };
    let key = key.trim();
    if key.is_empty() {
        bail!("KEY cannot be empty");
    }
    Ok((key.to_string(), value.to_string()))
}

/// Positive float seconds that fit in a `Duration`.
fn parse_timeout(raw: &str) -> anyhow::Result<Duration> {
    let secs: f64 = raw
        .trim()
        .parse()
        .with_context(|| format!("invalid number of seconds: {raw}"))?;
    if !secs.is_finite() || secs <= 0.0 {
        bail!("timeout must be a positive number of seconds");
    }
    Duration::try_from_secs_f64(secs).with_context(|| format!("timeout out of range: {raw}"))
}

/// Seconds since the Unix epoch with a fractional part.
fn epoch_seconds() -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    format!("{:.6}", now.as_secs_f64())
}

/// Assemble the form fields in merge order: talkgroup, timestamp, extra
/// fields, then `key`. Later writes win but keep the first position.
fn build_form_fields(args: &UploadArgs, token: &str, now: String) -> IndexMap<String, String> {
    let mut fields = IndexMap::new();

    if let Some(talkgroup) = &args.talkgroup {
        fields.insert(TALKGROUP_FIELD.to_string(), talkgroup.clone());
    }

    // Server precedence: start_time, then dateTime, then now().
    match (&args.start_time, &args.date_time) {
        (Some(start), _) => fields.insert(START_TIME_FIELD.to_string(), start.clone()),
        (None, Some(date_time)) => fields.insert(DATE_TIME_FIELD.to_string(), date_time.clone()),
        (None, None) => fields.insert(START_TIME_FIELD.to_string(), now),
    };

    for (key, value) in &args.fields {
        fields.insert(key.clone(), value.clone());
    }

    if !args.no_form_key {
        fields.insert(KEY_FIELD.to_string(), token.to_string());
    }

    fields
}

/// Check local input and produce the request. Nothing touches the network.
pub fn validate_inputs(args: &UploadArgs) -> Result<UploadRequest, UploadError> {
    let metadata = match fs::metadata(&args.audio) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Err(UploadError::FileNotFound(args.audio.clone()));
        }
        Err(source) => {
            return Err(UploadError::AudioUnreadable {
                path: args.audio.clone(),
                source,
            });
        }
    };
    if !metadata.is_file() {
        return Err(UploadError::NotAFile(args.audio.clone()));
    }

    let token = args.token.as_deref().unwrap_or("").trim();
    if token.is_empty() {
        return Err(UploadError::MissingToken);
    }

    Ok(UploadRequest {
        url: args.url.clone(),
        audio_path: args.audio.clone(),
        token: token.to_string(),
        include_form_key: !args.no_form_key,
        form_fields: build_form_fields(args, token, epoch_seconds()),
        timeout: args.timeout,
    })
}

/// Run one upload, writing the verbose summary (if asked) and the response
/// to `out`. Errors are returned for the caller to report.
pub fn upload(args: &UploadArgs, out: &mut dyn Write) -> Result<UploadResult, UploadError> {
    let request = validate_inputs(args)?;
    tracing::debug!(
        url = %request.url,
        audio = %request.audio_path.display(),
        fields = request.form_fields.len(),
        include_form_key = request.include_form_key,
        "validated upload request"
    );

    let payload = build_multipart_payload(&request)?;
    if args.verbose {
        if let Err(err) = ui::render_request_summary(out, &request.url, &payload) {
            tracing::warn!(%err, "could not write request summary");
        }
    }

    let uploader = Uploader::new(request.timeout)?;
    let result = uploader.send(&request.url, payload)?;

    if let Err(err) = ui::render(out, &result) {
        tracing::warn!(%err, "could not write response");
    }
    Ok(result)
}
