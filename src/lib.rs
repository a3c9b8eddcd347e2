// Library root
// -----------
// This crate exposes the pieces of the call-upload client as a library so
// the binary (`main.rs`) stays a thin wrapper and the logic can be tested
// without spawning a process.
//
// Module responsibilities:
// - `cli`: clap argument definition, input validation and the driver that
//   sequences a single upload.
// - `api`: multipart request construction, the blocking HTTP exchange and
//   interpretation of the response.
// - `ui`: what gets printed: the response and the masked verbose summary.
// - `error`: the error taxonomy and the exit codes it maps to.
pub mod api;
pub mod cli;
pub mod error;
pub mod ui;
