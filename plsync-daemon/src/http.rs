//! Remote Puller over the control point's HTTP pull endpoint.
//!
//! ```text
//! GET <scheme://host>/v1/datakit/pull?<site query>&pipelines=true&ts=<scripts_since>&relation_ts=<relation_since>
//! ```
//!
//! The site query carries the workspace token, so full URLs are never logged.

use std::io::Read;
use std::time::Duration;

use serde::Deserialize;

use plsync_core::{
    DefaultScripts, RelationByCategory, RemoteSnapshot, ScriptsByCategory, NO_RELATION_UPDATE,
};
use plsync_sync::{Puller, SyncError};

use crate::error::DaemonError;

pub const PULL_ENDPOINT: &str = "/v1/datakit/pull";
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

const USER_AGENT: &str = concat!("plsync/", env!("CARGO_PKG_VERSION"));

/// A configured site URL split into the endpoint base and its query string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteUrl {
    base: String,
    query: String,
}

impl SiteUrl {
    /// Accepts `scheme://host[:port][/path][?query]`; any path is dropped.
    pub fn parse(raw: &str) -> Result<Self, DaemonError> {
        let raw = raw.trim();
        let invalid = || DaemonError::InvalidSiteUrl(raw.to_string());

        let (scheme, rest) = raw.split_once("://").ok_or_else(invalid)?;
        if scheme.is_empty() {
            return Err(invalid());
        }
        let (location, query) = rest.split_once('?').unwrap_or((rest, ""));
        let host = location.split('/').next().unwrap_or_default();
        if host.is_empty() {
            return Err(invalid());
        }

        Ok(Self {
            base: format!("{scheme}://{host}"),
            query: query.trim_matches('&').to_string(),
        })
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn pull_url(&self, scripts_since: i64, relation_since: i64) -> String {
        let mut url = format!("{}{PULL_ENDPOINT}?", self.base);
        if !self.query.is_empty() {
            url.push_str(&self.query);
            url.push('&');
        }
        url.push_str(&format!(
            "pipelines=true&ts={scripts_since}&relation_ts={relation_since}"
        ));
        url
    }
}

#[derive(Debug, Deserialize)]
struct PullResponse {
    #[serde(default)]
    content: Option<ScriptsByCategory>,
    #[serde(default)]
    relation: Option<RelationByCategory>,
    #[serde(default)]
    default: Option<DefaultScripts>,
    #[serde(default)]
    updatetime: i64,
    #[serde(default = "no_relation_update")]
    relation_update_at: i64,
}

fn no_relation_update() -> i64 {
    NO_RELATION_UPDATE
}

impl From<PullResponse> for RemoteSnapshot {
    fn from(resp: PullResponse) -> Self {
        RemoteSnapshot {
            scripts_by_category: resp.content.unwrap_or_default(),
            relation_by_category: resp.relation.unwrap_or_default(),
            default_script_by_category: resp.default,
            scripts_updated_at: resp.updatetime,
            relation_updated_at: resp.relation_update_at,
        }
    }
}

pub(crate) fn decode_response(body: &str) -> Result<RemoteSnapshot, SyncError> {
    let resp: PullResponse = serde_json::from_str(body)
        .map_err(|e| SyncError::Pull(format!("failed to parse pull response: {e}")))?;
    Ok(resp.into())
}

/// [`Puller`] backed by a blocking `ureq` agent.
#[derive(Clone)]
pub struct HttpPuller {
    site: SiteUrl,
    agent: ureq::Agent,
}

impl HttpPuller {
    pub fn new(site_url: &str) -> Result<Self, DaemonError> {
        Self::with_timeout(site_url, HTTP_TIMEOUT)
    }

    pub fn with_timeout(site_url: &str, timeout: Duration) -> Result<Self, DaemonError> {
        let site = SiteUrl::parse(site_url)?;
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Ok(Self { site, agent })
    }

    pub fn site(&self) -> &SiteUrl {
        &self.site
    }
}

impl Puller for HttpPuller {
    fn pull(&self, scripts_since: i64, relation_since: i64) -> Result<RemoteSnapshot, SyncError> {
        let url = self.site.pull_url(scripts_since, relation_since);
        let resp = self
            .agent
            .get(&url)
            .set("User-Agent", USER_AGENT)
            .call()
            .map_err(|err| match err {
                ureq::Error::Status(code, _) => SyncError::Pull(format!(
                    "{}{PULL_ENDPOINT} answered HTTP {code}",
                    self.site.base
                )),
                ureq::Error::Transport(transport) => SyncError::Pull(format!(
                    "{}{PULL_ENDPOINT} unreachable: {}",
                    self.site.base,
                    transport.kind()
                )),
            })?;

        if resp.status() != 200 {
            return Err(SyncError::Pull(format!(
                "{}{PULL_ENDPOINT} answered HTTP {}",
                self.site.base,
                resp.status()
            )));
        }

        let mut body = String::new();
        resp.into_reader()
            .read_to_string(&mut body)
            .map_err(|e| SyncError::Pull(format!("failed to read pull response: {e}")))?;
        decode_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::net::TcpListener;
    use std::thread::JoinHandle;

    #[test]
    fn site_url_keeps_query_and_drops_path() {
        let site = SiteUrl::parse("https://openway.example.com/some/path?token=tkn_123").unwrap();
        assert_eq!(site.base(), "https://openway.example.com");
        assert_eq!(
            site.pull_url(0, -1),
            "https://openway.example.com/v1/datakit/pull?token=tkn_123&pipelines=true&ts=0&relation_ts=-1"
        );
    }

    #[test]
    fn site_url_without_query() {
        let site = SiteUrl::parse("http://127.0.0.1:9528").unwrap();
        assert_eq!(
            site.pull_url(1_644_318_398, 7),
            "http://127.0.0.1:9528/v1/datakit/pull?pipelines=true&ts=1644318398&relation_ts=7"
        );
    }

    #[test]
    fn site_url_rejects_garbage() {
        for raw in ["", "openway.example.com", "://host", "http://", "http://?token=x"] {
            assert!(
                matches!(SiteUrl::parse(raw), Err(DaemonError::InvalidSiteUrl(_))),
                "{raw:?} should be rejected"
            );
        }
    }

    #[test]
    fn response_decodes_every_field() {
        let snapshot = decode_response(
            r#"{
                "content": {"logging": {"nginx.p": "grok(_, \"%{NGINX}\")"}},
                "relation": {"logging": {"nginx-access": "nginx.p"}},
                "default": {"logging": "nginx.p"},
                "updatetime": 1644318398,
                "relation_update_at": 1644318400
            }"#,
        )
        .unwrap();
        assert_eq!(snapshot.scripts_updated_at, 1_644_318_398);
        assert_eq!(snapshot.relation_updated_at, 1_644_318_400);
        assert_eq!(snapshot.scripts_by_category["logging"]["nginx.p"], "grok(_, \"%{NGINX}\")");
        assert_eq!(snapshot.relation_by_category["logging"]["nginx-access"], "nginx.p");
        assert_eq!(
            snapshot.default_script_by_category.unwrap()["logging"],
            "nginx.p"
        );
    }

    #[test]
    fn response_fills_missing_fields() {
        let snapshot = decode_response(r#"{"updatetime": 0, "content": null}"#).unwrap();
        assert!(snapshot.scripts_by_category.is_empty());
        assert!(snapshot.relation_by_category.is_empty());
        assert_eq!(snapshot.default_script_by_category, None);
        assert_eq!(snapshot.relation_updated_at, NO_RELATION_UPDATE);
    }

    #[test]
    fn malformed_response_is_pull_error() {
        assert!(matches!(decode_response("<html>"), Err(SyncError::Pull(_))));
    }

    /// Serve one canned response on a loopback port; yields the request line.
    fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");
        let handle = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().expect("accept");
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = stream.read(&mut buf).expect("read");
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).expect("write");
            let request = String::from_utf8_lossy(&request).into_owned();
            request.lines().next().unwrap_or_default().to_string()
        });
        (format!("http://{addr}?token=tkn_abc"), handle)
    }

    #[test]
    fn pull_sends_both_timestamps_and_decodes_body() {
        let (site, server) = serve_once("200 OK", r#"{"updatetime": 42, "relation_update_at": 43}"#);
        let puller = HttpPuller::new(&site).unwrap();

        let snapshot = puller.pull(5, -1).unwrap();
        assert_eq!(snapshot.scripts_updated_at, 42);
        assert_eq!(snapshot.relation_updated_at, 43);

        let request_line = server.join().expect("server thread");
        assert_eq!(
            request_line,
            "GET /v1/datakit/pull?token=tkn_abc&pipelines=true&ts=5&relation_ts=-1 HTTP/1.1"
        );
    }

    #[test]
    fn non_success_status_is_pull_error() {
        let (site, server) = serve_once("500 Internal Server Error", "{}");
        let puller = HttpPuller::new(&site).unwrap();

        let err = puller.pull(0, -1).unwrap_err();
        assert!(matches!(&err, SyncError::Pull(msg) if msg.contains("500")), "got {err}");
        let _ = server.join();
    }
}
