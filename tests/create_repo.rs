// End-to-end exercises of the executor over the real reqwest transport,
// against a local mock server.

use std::collections::BTreeMap;
use std::time::Duration;

use mkrepo::api::{
    DiagnosticsSink, Executor, HttpResponse, OutboundRequest, ReqwestTransport,
};
use mkrepo::error::ExecError;
use mkrepo::keychain::{Credential, CredentialError, CredentialStore};

struct StaticStore;

impl CredentialStore for StaticStore {
    fn lookup(&self, _hostname: &str) -> Result<Credential, CredentialError> {
        Ok(Credential {
            username: "tlee".into(),
            password: "hunter2".into(),
        })
    }
}

struct NullSink;

impl DiagnosticsSink for NullSink {
    fn record_request(&mut self, _: &OutboundRequest) {}
    fn record_response(&mut self, _: &HttpResponse) {}
}

fn executor() -> Executor<ReqwestTransport, StaticStore, NullSink> {
    Executor::new(ReqwestTransport::new().unwrap(), StaticStore, NullSink)
        .with_timeout(Duration::from_secs(5))
}

fn fields() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("name".to_string(), "gorepo".to_string()),
        ("is_private".to_string(), "true".to_string()),
    ])
}

#[test]
fn create_follows_redirect_to_success() {
    let mut server = mockito::Server::new();
    let first = server
        .mock("POST", "/1.0/repositories")
        .match_header("content-type", "application/x-www-form-urlencoded")
        .match_header("authorization", "Basic dGxlZTpodW50ZXIy")
        .match_body("is_private=true&name=gorepo")
        .with_status(302)
        .with_header("location", "/1.0/repositories/gorepo")
        .expect(1)
        .create();
    let second = server
        .mock("POST", "/1.0/repositories/gorepo")
        .match_header("authorization", "Basic dGxlZTpodW50ZXIy")
        .match_body("is_private=true&name=gorepo")
        .with_status(200)
        .with_body("{\"slug\": \"gorepo\"}")
        .expect(1)
        .create();

    let url = format!("{}/1.0/repositories", server.url());
    let response = executor()
        .exec("POST", &url, "bitbucket.org", &fields())
        .unwrap();

    assert_eq!(response.status.as_u16(), 200);
    assert!(response.body.contains("gorepo"));
    first.assert();
    second.assert();
}

#[test]
fn hard_failure_is_returned_without_retries() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("POST", "/1.0/repositories")
        .with_status(400)
        .with_body("name already taken")
        .expect(1)
        .create();

    let url = format!("{}/1.0/repositories", server.url());
    let response = executor()
        .exec("POST", &url, "bitbucket.org", &fields())
        .unwrap();

    assert_eq!(response.status.as_u16(), 400);
    assert_eq!(response.body, "name already taken");
    mock.assert();
}

#[test]
fn endless_challenges_exhaust_the_hop_budget() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("POST", "/1.0/repositories")
        .with_status(401)
        // First send plus five retries.
        .expect(6)
        .create();

    let url = format!("{}/1.0/repositories", server.url());
    let response = executor()
        .exec("POST", &url, "bitbucket.org", &fields())
        .unwrap();

    assert_eq!(response.status.as_u16(), 401);
    mock.assert();
}

#[test]
fn connection_failure_is_a_transport_error() {
    // Nothing listens here; the connect fails fast.
    let err = executor()
        .exec(
            "POST",
            "http://127.0.0.1:1/1.0/repositories",
            "bitbucket.org",
            &fields(),
        )
        .unwrap_err();

    assert!(matches!(err, ExecError::Transport(_)));
    assert_eq!(err.exit_code(), 2);
}
