// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Functionality for reaching the security-group registry.

use async_trait::async_trait;
use sgroups_common::api::external::Error;
use sgroups_common::api::external::InternalContext;
use sgroups_common::api::internal::sync::SyncAck;
use sgroups_common::api::internal::sync::SyncRequest;
use slog::debug;
use slog::o;
use slog::warn;
use slog::Logger;
use std::fmt::Display;

/// The registry's synchronization RPC
///
/// Implementations apply an upsert as a set-replacement for every (transport,
/// from, to) key present in the request, and a delete as removal of the rules
/// stored under those keys.  Serializing concurrent requests for the same key
/// is also up to the implementation.
#[async_trait]
pub trait SyncClient: Send + Sync {
    async fn sync(&self, request: &SyncRequest) -> Result<SyncAck, Error>;
}

pub fn default_reqwest_client_builder() -> reqwest::ClientBuilder {
    let dur = std::time::Duration::from_secs(60);
    reqwest::ClientBuilder::new().connect_timeout(dur).timeout(dur)
}

/// [`SyncClient`] that posts JSON-encoded requests to `{baseurl}/v1/sync`
#[derive(Clone, Debug)]
pub struct HttpSyncClient {
    baseurl: String,
    client: reqwest::Client,
    log: Logger,
}

impl HttpSyncClient {
    pub fn new(baseurl: &str, log: &Logger) -> Result<HttpSyncClient, Error> {
        let client = default_reqwest_client_builder().build().map_err(|e| {
            Error::internal_error(&format!("failed to build HTTP client: {e}"))
        })?;
        Ok(HttpSyncClient::new_with_client(baseurl, client, log))
    }

    pub fn new_with_client(
        baseurl: &str,
        client: reqwest::Client,
        log: &Logger,
    ) -> HttpSyncClient {
        let baseurl = baseurl.trim_end_matches('/').to_string();
        let log = log.new(o!("registry" => baseurl.clone()));
        HttpSyncClient { baseurl, client, log }
    }

    pub fn baseurl(&self) -> &str {
        &self.baseurl
    }
}

#[async_trait]
impl SyncClient for HttpSyncClient {
    async fn sync(&self, request: &SyncRequest) -> Result<SyncAck, Error> {
        let url = format!("{}/v1/sync", self.baseurl);
        self.post_sync(&url, request)
            .await
            .with_internal_context(|| format!("{} via {}", request.op, url))
    }
}

impl HttpSyncClient {
    async fn post_sync(
        &self,
        url: &str,
        request: &SyncRequest,
    ) -> Result<SyncAck, Error> {
        debug!(self.log, "client request";
            "method" => "POST",
            "uri" => url,
            "op" => %request.op,
            "rules" => request.rules.len(),
        );

        let response =
            self.client.post(url).json(request).send().await.map_err(|e| {
                // Encoding the request or reaching the registry failed
                // before any response came back.
                Error::internal_error(&format!("CommunicationError: {}", e))
            })?;

        let status = response.status();
        debug!(self.log, "client response"; "status" => %status);
        if status.is_success() {
            return Ok(SyncAck::default());
        }

        let message = failure_message(status, response.text().await, &self.log);
        Err(error_from_status(status, message))
    }
}

/// Picks the message reported for a failed response: its body, or the
/// status's canonical reason if the body is empty or could not be read.
fn failure_message<E: Display>(
    status: http::StatusCode,
    body: Result<String, E>,
    log: &Logger,
) -> String {
    let body = match body {
        Ok(body) => body,
        Err(e) => {
            warn!(log, "failed to read registry response body";
                "status" => %status,
                "error" => %e,
            );
            String::new()
        }
    };
    if body.is_empty() {
        status.canonical_reason().unwrap_or("unknown status").to_string()
    } else {
        body
    }
}

/// Translates a failed response from the registry into an [`Error`].
fn error_from_status(status: http::StatusCode, message: String) -> Error {
    match status {
        http::StatusCode::UNAUTHORIZED => {
            Error::Unauthenticated { internal_message: message }
        }
        http::StatusCode::FORBIDDEN => Error::Forbidden,
        http::StatusCode::SERVICE_UNAVAILABLE => Error::unavail(&message),
        status if status.is_client_error() => Error::invalid_request(&message),
        status => Error::internal_error(&format!(
            "unexpected response status {}: {}",
            status.as_u16(),
            message
        )),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use httptest::matchers::eq;
    use httptest::matchers::json_decoded;
    use httptest::matchers::request;
    use httptest::responders::status_code;
    use httptest::Expectation;
    use sgroups_common::api::external::PortRange;
    use sgroups_common::api::external::Transport;
    use sgroups_common::api::internal::sync::Rule;
    use sgroups_common::api::internal::sync::SyncOp;

    fn test_log() -> Logger {
        Logger::root(slog::Discard, o!())
    }

    fn upsert_request() -> SyncRequest {
        SyncRequest {
            op: SyncOp::Upsert,
            rules: vec![Rule {
                transport: Transport::Tcp,
                sg_from: "sg-a".to_string(),
                sg_to: "sg-b".to_string(),
                ports_from: vec![PortRange::single(80)],
                ports_to: vec![PortRange::new(1000, 2000).unwrap()],
            }],
        }
    }

    #[tokio::test]
    async fn test_sync_posts_request() {
        let server = httptest::Server::run();
        server.expect(
            Expectation::matching(httptest::all_of![
                request::method_path("POST", "/v1/sync"),
                request::body(json_decoded(eq(serde_json::json!({
                    "op": "upsert",
                    "rules": [{
                        "transport": "TCP",
                        "sg_from": "sg-a",
                        "sg_to": "sg-b",
                        "ports_from": [{ "start": 80, "end": 80 }],
                        "ports_to": [{ "start": 1000, "end": 2000 }],
                    }],
                })))),
            ])
            .respond_with(status_code(200)),
        );

        // A trailing slash on the base URL is not doubled.
        let baseurl = format!("http://{}/", server.addr());
        let client = HttpSyncClient::new(&baseurl, &test_log()).unwrap();
        assert_eq!(client.baseurl(), format!("http://{}", server.addr()));
        assert_eq!(
            client.sync(&upsert_request()).await.unwrap(),
            SyncAck::default()
        );
    }

    #[tokio::test]
    async fn test_sync_error_statuses() {
        let cases = [
            (
                503,
                "registry is restarting",
                Error::unavail("registry is restarting"),
            ),
            (
                401,
                "token expired",
                Error::Unauthenticated {
                    internal_message: "token expired".to_string(),
                },
            ),
            (403, "", Error::Forbidden),
            (
                400,
                "unknown security group: sg-b",
                Error::invalid_request("unknown security group: sg-b"),
            ),
            (404, "", Error::invalid_request("Not Found")),
            (
                500,
                "database is locked",
                Error::internal_error(
                    "unexpected response status 500: database is locked",
                ),
            ),
        ];

        for (status, body, expected) in cases {
            let server = httptest::Server::run();
            server.expect(
                Expectation::matching(request::method_path("POST", "/v1/sync"))
                    .respond_with(status_code(status).body(body)),
            );
            let baseurl = format!("http://{}", server.addr());
            let client = HttpSyncClient::new(&baseurl, &test_log()).unwrap();

            let error = client.sync(&upsert_request()).await.unwrap_err();
            let context = format!("upsert via {baseurl}/v1/sync");
            assert_eq!(
                error,
                expected.internal_context(context),
                "status {status}"
            );
        }
    }

    #[tokio::test]
    async fn test_sync_communication_error() {
        // Grab a free port, then close it so that nothing is listening.
        let addr = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap()
        };
        let client = HttpSyncClient::new(&format!("http://{addr}"), &test_log())
            .unwrap();

        match client.sync(&upsert_request()).await.unwrap_err() {
            Error::InternalError { internal_message } => {
                let prefix = format!(
                    "upsert via http://{addr}/v1/sync: CommunicationError: "
                );
                assert!(
                    internal_message.starts_with(&prefix),
                    "{internal_message}"
                );
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_sync_error_context() {
        let server = httptest::Server::run();
        server.expect(
            Expectation::matching(request::method_path("POST", "/v1/sync"))
                .respond_with(
                    status_code(503).body("registry is restarting"),
                ),
        );
        let baseurl = format!("http://{}", server.addr());
        let client = HttpSyncClient::new(&baseurl, &test_log()).unwrap();

        let error = client.sync(&upsert_request()).await.unwrap_err();
        assert!(error.retryable());
        assert_eq!(
            error.to_string(),
            format!(
                "Service Unavailable: upsert via {baseurl}/v1/sync: \
                 registry is restarting"
            )
        );
    }

    #[test]
    fn test_failure_message() {
        let log = test_log();
        let status = http::StatusCode::BAD_GATEWAY;
        assert_eq!(
            failure_message(status, Ok::<_, String>("no route".into()), &log),
            "no route"
        );
        assert_eq!(
            failure_message(status, Ok::<_, String>(String::new()), &log),
            "Bad Gateway"
        );
        assert_eq!(
            failure_message(status, Err("connection reset"), &log),
            "Bad Gateway"
        );
    }
}
