// Operator-facing output: the success table, the per-hop request/response
// dumps, and the interactive login flow using `dialoguer`.

use std::collections::BTreeMap;
use std::io::{self, Write};

use anyhow::{Context, Result};
use dialoguer::{Input, Password};

use crate::api::{DiagnosticsSink, HttpResponse, OutboundRequest};
use crate::keychain::{Credential, FileStore};

/// Print the submitted field set as an aligned `key: value` table. The map
/// iterates in key order, so the output is stable across runs.
pub fn print_form_values(fields: &BTreeMap<String, String>) {
    for (key, value) in fields {
        println!("{:<16} {}", format!("{key}:"), value);
    }
}

/// Dumps every attempted request/response pair in a human-readable form.
///
/// Sensitive header values (the basic-auth token) are shown redacted so
/// credentials never land in a terminal scrollback or a pasted bug report.
pub struct WriterSink<W: Write> {
    out: W,
}

impl WriterSink<io::Stderr> {
    pub fn stderr() -> Self {
        Self { out: io::stderr() }
    }
}

impl<W: Write> WriterSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write> DiagnosticsSink for WriterSink<W> {
    // Writes are best-effort; a broken pipe here must not abort the
    // exchange itself.
    fn record_request(&mut self, request: &OutboundRequest) {
        let _ = writeln!(self.out, "> {} {}", request.method, request.url);
        let _ = writeln!(self.out, "> host: {}", request.host);
        for (name, value) in &request.headers {
            let shown = if value.is_sensitive() {
                "<redacted>"
            } else {
                value.to_str().unwrap_or("<binary>")
            };
            let _ = writeln!(self.out, "> {name}: {shown}");
        }
        let _ = writeln!(
            self.out,
            "> body ({} bytes): {}",
            request.body.len(),
            request.body
        );
        let _ = writeln!(self.out);
    }

    fn record_response(&mut self, response: &HttpResponse) {
        let _ = writeln!(self.out, "< {}", response.status);
        for (name, value) in &response.headers {
            let _ = writeln!(
                self.out,
                "< {name}: {}",
                value.to_str().unwrap_or("<binary>")
            );
        }
        let _ = writeln!(
            self.out,
            "< body ({} bytes): {}",
            response.body.len(),
            response.body
        );
        let _ = writeln!(self.out);
    }
}

/// Prompt for a username and password and store them for `hostname`.
/// `Password` keeps the input hidden while typing.
pub fn login(store: &FileStore, hostname: &str) -> Result<()> {
    let username: String = Input::new().with_prompt("Username").interact_text()?;
    let password: String = Password::new().with_prompt("Password").interact()?;
    store
        .save(hostname, Credential { username, password })
        .with_context(|| format!("Failed to store credentials for {hostname}"))?;
    println!(
        "Stored credentials for {} in {}",
        hostname,
        store.path().display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::api::build_request;
    use crate::keychain::{CredentialError, CredentialStore};

    struct OneStore;

    impl CredentialStore for OneStore {
        fn lookup(&self, _hostname: &str) -> Result<Credential, CredentialError> {
            Ok(Credential {
                username: "tlee".into(),
                password: "hunter2".into(),
            })
        }
    }

    #[test]
    fn request_dump_redacts_the_auth_token() {
        let request = build_request(
            "POST",
            "https://api.bitbucket.org/1.0/repositories",
            "bitbucket.org",
            &BTreeMap::from([("name".to_string(), "gorepo".to_string())]),
            &OneStore,
            Some(Duration::from_secs(5)),
        )
        .unwrap();

        let mut sink = WriterSink::new(Vec::new());
        sink.record_request(&request);
        let dump = String::from_utf8(sink.out).unwrap();

        assert!(dump.contains("POST https://api.bitbucket.org/1.0/repositories"));
        assert!(dump.contains("authorization: <redacted>"));
        assert!(!dump.contains("hunter2"));
        assert!(!dump.contains("dGxlZTpodW50ZXIy"));
        assert!(dump.contains("name=gorepo"));
    }

    #[test]
    fn response_dump_shows_status_headers_and_body() {
        use reqwest::header::{HeaderMap, HeaderValue, LOCATION};
        use reqwest::StatusCode;

        let mut headers = HeaderMap::new();
        headers.insert(LOCATION, HeaderValue::from_static("/elsewhere"));
        let response = HttpResponse {
            status: StatusCode::FOUND,
            headers,
            body: "moved".to_string(),
        };

        let mut sink = WriterSink::new(Vec::new());
        sink.record_response(&response);
        let dump = String::from_utf8(sink.out).unwrap();

        assert!(dump.contains("< 302 Found"));
        assert!(dump.contains("location: /elsewhere"));
        assert!(dump.contains("body (5 bytes): moved"));
    }
}
