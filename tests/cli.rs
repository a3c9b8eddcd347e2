use assert_cmd::Command;
use predicates::prelude::*;
use std::net::TcpListener;
use tempfile::TempDir;
use tokio::runtime::Runtime;
use wiremock::matchers::{header, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn bin() -> Command {
    let mut cmd = Command::cargo_bin("call-upload").unwrap();
    cmd.env_remove("ICAD_API_KEY").env_remove("RUST_LOG");
    cmd
}

fn audio_in(dir: &TempDir) -> String {
    let path = dir.path().join("clip.mp3");
    std::fs::write(&path, b"ID3fake").unwrap();
    path.to_string_lossy().into_owned()
}

fn mock_server(rt: &Runtime, body: ResponseTemplate) -> MockServer {
    let server = rt.block_on(MockServer::start());
    rt.block_on(
        Mock::given(method("POST"))
            .and(header("x-api-key", "env-token"))
            .respond_with(body)
            .expect(1)
            .mount(&server),
    );
    server
}

#[test]
fn missing_audio_exits_two() {
    bin()
        .args(["--url", "http://127.0.0.1:9/x", "--audio", "/no/such/clip.mp3", "--token", "t"])
        .assert()
        .code(2)
        .stdout("")
        .stderr(predicate::str::contains("ERROR: audio file not found: /no/such/clip.mp3"));
}

#[test]
fn missing_token_exits_two() {
    let dir = TempDir::new().unwrap();
    let audio = audio_in(&dir);
    bin()
        .args(["--url", "http://127.0.0.1:9/x", "--audio", audio.as_str()])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("missing --token"));
}

#[test]
fn malformed_field_is_a_usage_error() {
    let dir = TempDir::new().unwrap();
    let audio = audio_in(&dir);
    bin()
        .args(["--url", "http://127.0.0.1:9/x", "--audio", audio.as_str(), "--token", "t"])
        .args(["--field", "no-equals-sign"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("KEY=VALUE"));
}

#[test]
fn connection_failure_exits_three() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let dir = TempDir::new().unwrap();
    let audio = audio_in(&dir);
    let url = format!("http://127.0.0.1:{port}/api/call-upload");
    bin()
        .args(["--url", url.as_str(), "--audio", audio.as_str(), "--token", "t"])
        .args(["--timeout", "5"])
        .assert()
        .code(3)
        .stdout("")
        .stderr(predicate::str::contains("ERROR: request failed"));
}

#[test]
fn token_from_environment_and_json_success() {
    let rt = Runtime::new().unwrap();
    let server = mock_server(
        &rt,
        ResponseTemplate::new(201).set_body_json(serde_json::json!({"id": 42})),
    );
    let dir = TempDir::new().unwrap();
    let audio = audio_in(&dir);
    let url = format!("{}/api/call-upload", server.uri());

    bin()
        .env("ICAD_API_KEY", "  env-token  ")
        .args(["--url", url.as_str(), "--audio", audio.as_str()])
        .assert()
        .success()
        .stdout("HTTP 201\n{\n  \"id\": 42\n}\n");

    rt.block_on(server.verify());
}

#[test]
fn server_failure_exits_one() {
    let rt = Runtime::new().unwrap();
    let server = mock_server(&rt, ResponseTemplate::new(500).set_body_string("boom"));
    let dir = TempDir::new().unwrap();
    let audio = audio_in(&dir);
    let url = format!("{}/api/call-upload", server.uri());

    bin()
        .args(["--url", url.as_str(), "--audio", audio.as_str(), "--token", "env-token"])
        .assert()
        .code(1)
        .stdout("HTTP 500\nboom\n");
}

#[test]
fn verbose_summary_masks_the_token() {
    let rt = Runtime::new().unwrap();
    let server = mock_server(&rt, ResponseTemplate::new(200).set_body_string("ok"));
    let dir = TempDir::new().unwrap();
    let audio = audio_in(&dir);
    let url = format!("{}/api/call-upload", server.uri());

    bin()
        .args(["--url", url.as_str(), "--audio", audio.as_str(), "--token", "env-token"])
        .args(["--talkgroup", "1234", "--verbose"])
        .assert()
        .success()
        .stdout(
            predicate::str::starts_with(format!("POST {url}\n"))
                .and(predicate::str::contains(r#""authorization":"Bearer ***""#))
                .and(predicate::str::contains(r#""key":"***""#))
                .and(predicate::str::contains(r#""talkgroup":"1234""#))
                .and(predicate::str::contains("HTTP 200\nok\n"))
                .and(predicate::str::contains("env-token").not()),
        );
}
