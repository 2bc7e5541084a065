use std::fmt;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::header::HeaderMap;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::{CommitOutcome, FileCommit, RemoteFile, RemoteRepository, RemoteUser, RepoTarget, RepositorySummary};
use crate::error::{Error, Result};
use crate::util::{compact_text, is_http_url, unix_timestamp_now};

pub const DEFAULT_API_BASE_URL: &str = "https://api.github.com";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const USER_AGENT: &str = concat!("solsync/", env!("CARGO_PKG_VERSION"));
const API_VERSION: &str = "2022-11-28";
const REPOS_PER_PAGE: usize = 100;
const MAX_REPO_PAGES: u32 = 10;

/// GitHub REST client scoped to one target repository.
#[derive(Clone)]
pub struct GitHubClient {
    api_base_url: String,
    token: String,
    target: RepoTarget,
    timeout: Duration,
    client: Client,
}

impl fmt::Debug for GitHubClient {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("GitHubClient")
            .field("api_base_url", &self.api_base_url)
            .field("token", &"[REDACTED]")
            .field("target", &self.target)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl GitHubClient {
    pub fn new(
        api_base_url: impl AsRef<str>,
        token: impl Into<String>,
        target: RepoTarget,
    ) -> Result<Self> {
        let api_base_url = api_base_url.as_ref().trim().trim_end_matches('/').to_string();
        if !is_http_url(&api_base_url) {
            return Err(Error::InvalidInput(
                "API base URL must include http:// or https://".to_string(),
            ));
        }
        let token = token.into().trim().to_string();
        if token.is_empty() {
            return Err(Error::AuthExpired);
        }

        Ok(Self {
            api_base_url,
            token,
            target,
            timeout: DEFAULT_REQUEST_TIMEOUT,
            client: Client::builder().user_agent(USER_AGENT).build()?,
        })
    }

    /// Abort requests that take longer than `timeout`.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub const fn target(&self) -> &RepoTarget {
        &self.target
    }

    /// The account the token belongs to. Fails with `AuthExpired` when the
    /// token is no longer valid.
    pub async fn current_user(&self) -> Result<RemoteUser> {
        let url = format!("{}/user", self.api_base_url);
        self.send_json(self.request(Method::GET, &url)).await
    }

    fn contents_url(&self, path: &str) -> String {
        let encoded_path = path
            .split('/')
            .map(urlencoding::encode)
            .collect::<Vec<_>>()
            .join("/");
        format!(
            "{}/repos/{}/{}/contents/{}",
            self.api_base_url,
            urlencoding::encode(&self.target.owner),
            urlencoding::encode(&self.target.repo),
            encoded_path
        )
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION)
    }

    /// Send `request` and read the whole body, aborting on timeout.
    async fn send(&self, request: RequestBuilder) -> Result<(StatusCode, HeaderMap, String)> {
        let exchange = async {
            let response = request.send().await?;
            let status = response.status();
            let headers = response.headers().clone();
            let body = response.text().await?;
            Ok::<_, Error>((status, headers, body))
        };

        match tokio::time::timeout(self.timeout, exchange).await {
            Ok(result) => result,
            Err(_) => Err(Error::RequestTimeout(self.timeout)),
        }
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let (status, headers, body) = self.send(request).await?;
        if !status.is_success() {
            return Err(classify_response(status, &headers, &body));
        }
        Ok(serde_json::from_str(&body)?)
    }
}

impl RemoteRepository for GitHubClient {
    async fn get_file(&self, path: &str) -> Result<Option<RemoteFile>> {
        let url = self.contents_url(path);
        let request = self
            .request(Method::GET, &url)
            .query(&[("ref", self.target.branch.as_str())]);

        let (status, headers, body) = self.send(request).await?;
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(classify_response(status, &headers, &body));
        }

        let payload: ContentsResponse = serde_json::from_str(&body)?;
        let content = match payload.encoding.as_deref() {
            Some("base64") => payload.content.as_deref().and_then(decode_content),
            _ => payload.content,
        };
        Ok(Some(RemoteFile {
            path: payload.path,
            sha: payload.sha,
            content,
        }))
    }

    async fn put_file(&self, commit: &FileCommit) -> Result<CommitOutcome> {
        let url = self.contents_url(&commit.path);
        let payload = PutContentsRequest {
            message: &commit.message,
            content: STANDARD.encode(commit.content.as_bytes()),
            branch: &self.target.branch,
            sha: commit.sha.as_deref(),
        };

        let (status, headers, body) = self
            .send(self.request(Method::PUT, &url).json(&payload))
            .await?;
        if !status.is_success() {
            return Err(classify_response(status, &headers, &body));
        }

        let response: PutContentsResponse = serde_json::from_str(&body)?;
        tracing::debug!(path = %commit.path, %status, "Remote file written");
        Ok(CommitOutcome {
            path: commit.path.clone(),
            content_sha: response.content.map(|content| content.sha),
            commit_sha: response.commit.map(|commit| commit.sha),
            created: status == StatusCode::CREATED,
        })
    }

    async fn list_repositories(&self) -> Result<Vec<RepositorySummary>> {
        let url = format!("{}/user/repos", self.api_base_url);
        let per_page = REPOS_PER_PAGE.to_string();
        let mut repositories = Vec::new();

        for page in 1..=MAX_REPO_PAGES {
            let page = page.to_string();
            let request = self.request(Method::GET, &url).query(&[
                ("per_page", per_page.as_str()),
                ("sort", "updated"),
                ("page", page.as_str()),
            ]);
            let batch: Vec<RepositorySummary> = self.send_json(request).await?;
            let done = batch.len() < REPOS_PER_PAGE;
            repositories.extend(batch);
            if done {
                break;
            }
        }

        Ok(repositories)
    }
}

/// Map a failed response onto the error taxonomy.
pub fn classify_response(status: StatusCode, headers: &HeaderMap, body: &str) -> Error {
    classify_at(status, headers, body, unix_timestamp_now())
}

fn classify_at(status: StatusCode, headers: &HeaderMap, body: &str, now: i64) -> Error {
    let message = parse_api_error(status, body);
    let exhausted = header_str(headers, "x-ratelimit-remaining") == Some("0");
    let has_retry_after = headers.contains_key("retry-after");

    match status {
        StatusCode::UNAUTHORIZED => Error::AuthExpired,
        StatusCode::TOO_MANY_REQUESTS => Error::RateLimited {
            retry_after: rate_limit_hint(headers, now),
        },
        StatusCode::FORBIDDEN if exhausted || has_retry_after => Error::RateLimited {
            retry_after: rate_limit_hint(headers, now),
        },
        StatusCode::FORBIDDEN => Error::PermissionDenied(message),
        StatusCode::NOT_FOUND => Error::RemoteNotFound(message),
        _ => Error::Remote {
            status: status.as_u16(),
            message,
        },
    }
}

/// Server wait hint: `retry-after` seconds, else time until
/// `x-ratelimit-reset`.
fn rate_limit_hint(headers: &HeaderMap, now: i64) -> Option<Duration> {
    if let Some(seconds) = header_str(headers, "retry-after").and_then(|value| value.parse().ok()) {
        return Some(Duration::from_secs(seconds));
    }
    let reset: i64 = header_str(headers, "x-ratelimit-reset")?.parse().ok()?;
    Some(Duration::from_secs(
        u64::try_from(reset.saturating_sub(now)).unwrap_or(0),
    ))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
}

fn decode_content(encoded: &str) -> Option<String> {
    let compact: String = encoded.chars().filter(|ch| !ch.is_whitespace()).collect();
    let bytes = STANDARD.decode(compact).ok()?;
    String::from_utf8(bytes).ok()
}

#[derive(Debug, Deserialize)]
struct GitHubErrorResponse {
    message: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<GitHubErrorResponse>(body) {
        if let Some(message) = payload.message {
            return format!("{} ({})", compact_text(&message), status.as_u16());
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", compact_text(trimmed), status.as_u16())
    }
}

#[derive(Debug, Deserialize)]
struct ContentsResponse {
    path: String,
    sha: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    encoding: Option<String>,
}

#[derive(Debug, Serialize)]
struct PutContentsRequest<'a> {
    message: &'a str,
    content: String,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct PutContentsResponse {
    #[serde(default)]
    content: Option<ShaRef>,
    #[serde(default)]
    commit: Option<ShaRef>,
}

#[derive(Debug, Deserialize)]
struct ShaRef {
    sha: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use pretty_assertions::assert_eq;
    use reqwest::header::HeaderValue;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const FILE_PATH: &str = "/repos/octo/solutions/contents/Array/Easy/0001-two-sum.py";

    fn client(server: &MockServer) -> GitHubClient {
        GitHubClient::new(
            server.uri(),
            "test-token",
            RepoTarget::new("octo", "solutions", "main"),
        )
        .unwrap()
    }

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn classify_status_codes() {
        let none = HeaderMap::new();
        assert_eq!(
            classify_at(StatusCode::UNAUTHORIZED, &none, "", 0).kind(),
            ErrorKind::AuthExpired
        );
        assert_eq!(
            classify_at(StatusCode::FORBIDDEN, &none, r#"{"message":"Resource not accessible"}"#, 0)
                .kind(),
            ErrorKind::PermissionDenied
        );
        assert_eq!(
            classify_at(StatusCode::NOT_FOUND, &none, "", 0).kind(),
            ErrorKind::RemoteNotFound
        );
        let server = classify_at(StatusCode::BAD_GATEWAY, &none, "", 0);
        assert!(server.is_transient());
        let invalid = classify_at(StatusCode::UNPROCESSABLE_ENTITY, &none, "", 0);
        assert!(invalid.is_terminal());
    }

    #[test]
    fn classify_rate_limits_with_hints() {
        let primary = headers(&[("x-ratelimit-remaining", "0"), ("x-ratelimit-reset", "1090")]);
        let error = classify_at(StatusCode::FORBIDDEN, &primary, "", 1000);
        assert_eq!(error.retry_after(), Some(Duration::from_secs(90)));

        let secondary = headers(&[("retry-after", "30")]);
        let error = classify_at(StatusCode::FORBIDDEN, &secondary, "", 1000);
        assert_eq!(error.retry_after(), Some(Duration::from_secs(30)));

        let error = classify_at(StatusCode::TOO_MANY_REQUESTS, &HeaderMap::new(), "", 0);
        assert_eq!(error.kind(), ErrorKind::RateLimited);
        assert_eq!(error.retry_after(), None);

        let past_reset = headers(&[("x-ratelimit-remaining", "0"), ("x-ratelimit-reset", "10")]);
        let error = classify_at(StatusCode::FORBIDDEN, &past_reset, "", 1000);
        assert_eq!(error.retry_after(), Some(Duration::ZERO));
    }

    #[test]
    fn parse_api_error_prefers_message_field() {
        assert_eq!(
            parse_api_error(StatusCode::FORBIDDEN, r#"{"message":"Bad credentials"}"#),
            "Bad credentials (403)"
        );
        assert_eq!(parse_api_error(StatusCode::BAD_GATEWAY, ""), "HTTP 502");
    }

    #[test]
    fn debug_redacts_token() {
        let client = GitHubClient::new(
            DEFAULT_API_BASE_URL,
            "ghp_secret",
            RepoTarget::new("octo", "solutions", "main"),
        )
        .unwrap();
        let rendered = format!("{client:?}");
        assert!(!rendered.contains("ghp_secret"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn new_rejects_bad_configuration() {
        let target = RepoTarget::new("octo", "solutions", "main");
        assert!(GitHubClient::new("api.github.com", "t", target.clone()).is_err());
        assert_eq!(
            GitHubClient::new(DEFAULT_API_BASE_URL, "  ", target)
                .unwrap_err()
                .kind(),
            ErrorKind::AuthExpired
        );
    }

    #[tokio::test]
    async fn get_file_decodes_content() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(FILE_PATH))
            .and(query_param("ref", "main"))
            .and(header("authorization", "Bearer test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "path": "Array/Easy/0001-two-sum.py",
                "sha": "abc123",
                "encoding": "base64",
                "content": "cHJpbnQo\nJ2hpJyk=\n",
            })))
            .mount(&server)
            .await;

        let file = client(&server)
            .get_file("Array/Easy/0001-two-sum.py")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(file.sha, "abc123");
        assert_eq!(file.content.as_deref(), Some("print('hi')"));
    }

    #[tokio::test]
    async fn get_missing_file_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(FILE_PATH))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "Not Found"})))
            .mount(&server)
            .await;

        let file = client(&server)
            .get_file("Array/Easy/0001-two-sum.py")
            .await
            .unwrap();
        assert_eq!(file, None);
    }

    #[tokio::test]
    async fn put_file_sends_encoded_content_and_sha() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path(FILE_PATH))
            .and(body_partial_json(json!({
                "message": "Add two-sum",
                "content": STANDARD.encode("print('hi')"),
                "branch": "main",
                "sha": "old-sha",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": {"sha": "new-sha", "path": "Array/Easy/0001-two-sum.py"},
                "commit": {"sha": "commit-sha"},
            })))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = client(&server)
            .put_file(&FileCommit {
                path: "Array/Easy/0001-two-sum.py".to_string(),
                content: "print('hi')".to_string(),
                message: "Add two-sum".to_string(),
                sha: Some("old-sha".to_string()),
            })
            .await
            .unwrap();

        assert_eq!(
            outcome,
            CommitOutcome {
                path: "Array/Easy/0001-two-sum.py".to_string(),
                content_sha: Some("new-sha".to_string()),
                commit_sha: Some("commit-sha".to_string()),
                created: false,
            }
        );
    }

    #[tokio::test]
    async fn put_file_maps_auth_failure() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "Bad credentials"})))
            .mount(&server)
            .await;

        let error = client(&server)
            .put_file(&FileCommit {
                path: "a.py".to_string(),
                content: "x".to_string(),
                message: "m".to_string(),
                sha: None,
            })
            .await
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::AuthExpired);
    }

    #[tokio::test]
    async fn slow_response_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_millis(500))
                    .set_body_json(json!({"login": "octo", "id": 1})),
            )
            .mount(&server)
            .await;

        let error = client(&server)
            .with_timeout(Duration::from_millis(50))
            .current_user()
            .await
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::RequestTimeout);
        assert!(error.is_transient());
    }

    #[tokio::test]
    async fn current_user_and_repositories() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/user"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"login": "octo", "id": 7})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/user/repos"))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"full_name": "octo/solutions", "private": true, "default_branch": "main"},
                {"full_name": "octo/dotfiles"},
            ])))
            .mount(&server)
            .await;

        let client = client(&server);
        let user = client.current_user().await.unwrap();
        assert_eq!(user.login, "octo");
        assert_eq!(user.id, 7);

        let repositories = client.list_repositories().await.unwrap();
        assert_eq!(repositories.len(), 2);
        assert_eq!(repositories[0].full_name, "octo/solutions");
        assert!(repositories[0].private);
        assert!(!repositories[1].private);
    }
}
