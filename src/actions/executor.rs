//! GitHub issues API client for label and comment actions.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tracing::debug;

use super::{ActionError, ActionKind, ActionRequest};
use crate::config::AppConfig;
use crate::rules::text::UNKNOWN;

const USER_AGENT: &str = concat!("triage/", env!("CARGO_PKG_VERSION"));
const ACCEPT: &str = "application/vnd.github+json";
const API_VERSION: &str = "2022-11-28";
const MAX_ERROR_DETAIL_CHARS: usize = 200;

static REPOSITORY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_.-]+/[A-Za-z0-9_.-]+$").expect("repository pattern is valid")
});

/// Performs a single remote action. Implementations make at most one call.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    async fn execute(&self, request: &ActionRequest) -> Result<(), ActionError>;
}

/// Connection settings for [`GitHubActionExecutor`].
#[derive(Clone)]
pub struct GitHubExecutorConfig {
    pub api_base: String,
    pub token: Option<String>,
    pub request_timeout: Duration,
}

impl std::fmt::Debug for GitHubExecutorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubExecutorConfig")
            .field("api_base", &self.api_base)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl From<&AppConfig> for GitHubExecutorConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            api_base: config.github_api_base.clone(),
            token: config.github_token.clone(),
            request_timeout: Duration::from_millis(config.github_request_timeout_ms),
        }
    }
}

/// Applies labels and posts comments through the GitHub REST API.
#[derive(Debug, Clone)]
pub struct GitHubActionExecutor {
    client: reqwest::Client,
    config: GitHubExecutorConfig,
}

impl GitHubActionExecutor {
    pub fn new(config: GitHubExecutorConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    /// `POST /repos/{repo}/issues/{number}/labels` with `{"labels": [label]}`.
    pub async fn apply_label(
        &self,
        repository: &str,
        number: i64,
        label: &str,
    ) -> Result<(), ActionError> {
        let request = ActionRequest::new(
            repository,
            number,
            ActionKind::Label {
                label: label.to_string(),
            },
        );
        self.execute(&request).await
    }

    /// `POST /repos/{repo}/issues/{number}/comments` with `{"body": text}`.
    pub async fn add_comment(
        &self,
        repository: &str,
        number: i64,
        text: &str,
    ) -> Result<(), ActionError> {
        let request = ActionRequest::new(
            repository,
            number,
            ActionKind::Comment {
                body: text.to_string(),
            },
        );
        self.execute(&request).await
    }

    /// Checks every precondition that does not need the network.
    pub fn validate(&self, request: &ActionRequest) -> Result<(), ActionError> {
        let token_present = self
            .config
            .token
            .as_deref()
            .is_some_and(|token| !token.trim().is_empty());
        if !token_present {
            return Err(ActionError::Misconfigured(
                "GitHub API token is not configured".to_string(),
            ));
        }

        validate_request(request)
    }

    fn endpoint(&self, request: &ActionRequest) -> String {
        let segment = match request.kind {
            ActionKind::Label { .. } => "labels",
            ActionKind::Comment { .. } => "comments",
        };
        format!(
            "{}/repos/{}/issues/{}/{}",
            self.config.api_base.trim_end_matches('/'),
            request.repository,
            request.number,
            segment
        )
    }
}

/// Validates the request body fields: repository, number and text.
pub fn validate_request(request: &ActionRequest) -> Result<(), ActionError> {
    let repository = request.repository.trim();
    if repository.is_empty() || repository.eq_ignore_ascii_case(UNKNOWN) {
        return Err(ActionError::Validation(
            "repository is missing".to_string(),
        ));
    }
    if !REPOSITORY_PATTERN.is_match(repository)
        || repository.split('/').any(|part| part == "." || part == "..")
    {
        return Err(ActionError::Validation(format!(
            "repository '{repository}' is not of the form owner/name"
        )));
    }
    if request.number <= 0 {
        return Err(ActionError::Validation(format!(
            "issue number must be positive, got {}",
            request.number
        )));
    }
    if request.kind.text().trim().is_empty() {
        return Err(ActionError::Validation(format!(
            "{} text is empty",
            request.kind.as_str()
        )));
    }
    Ok(())
}

fn truncate_detail(body: &str) -> String {
    if body.chars().count() > MAX_ERROR_DETAIL_CHARS {
        let truncated: String = body.chars().take(MAX_ERROR_DETAIL_CHARS).collect();
        format!("{truncated}...")
    } else {
        body.to_string()
    }
}

#[async_trait]
impl ActionExecutor for GitHubActionExecutor {
    async fn execute(&self, request: &ActionRequest) -> Result<(), ActionError> {
        self.validate(request)?;

        let token = self.config.token.as_deref().unwrap_or_default().trim();
        let url = self.endpoint(request);

        debug!(
            repository = %request.repository,
            number = request.number,
            action_kind = request.kind.as_str(),
            "Calling GitHub issues API"
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .header("Accept", ACCEPT)
            .header("User-Agent", USER_AGENT)
            .header("X-GitHub-Api-Version", API_VERSION)
            .timeout(self.config.request_timeout)
            .json(&request.kind.request_body())
            .send()
            .await
            .map_err(|err| {
                let detail = if err.is_timeout() {
                    format!("request timed out after {:?}", self.config.request_timeout)
                } else {
                    err.to_string()
                };
                ActionError::remote(err.status().map(|s| s.as_u16()), detail)
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(ActionError::remote(
            Some(status.as_u16()),
            truncate_detail(&body),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn executor(base: &str, token: Option<&str>) -> GitHubActionExecutor {
        GitHubActionExecutor::new(GitHubExecutorConfig {
            api_base: base.to_string(),
            token: token.map(str::to_string),
            request_timeout: Duration::from_millis(500),
        })
    }

    #[tokio::test]
    async fn test_apply_label_posts_labels_with_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/repos/octo/widgets/issues/7/labels"))
            .and(header("authorization", "Bearer ghp_test"))
            .and(body_json(json!({"labels": ["priority-high"]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"name": "priority-high"}])))
            .expect(1)
            .mount(&server)
            .await;

        executor(&server.uri(), Some("ghp_test"))
            .apply_label("octo/widgets", 7, "priority-high")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_add_comment_posts_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/repos/octo/widgets/issues/7/comments"))
            .and(body_json(json!({"body": "Thanks, triaging."})))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        executor(&server.uri(), Some("ghp_test"))
            .add_comment("octo/widgets", 7, "Thanks, triaging.")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_non_success_status_is_remote_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(404).set_body_string("Not Found"))
            .mount(&server)
            .await;

        let err = executor(&server.uri(), Some("ghp_test"))
            .apply_label("octo/widgets", 7, "bug")
            .await
            .unwrap_err();

        assert_eq!(
            err,
            ActionError::Remote {
                status: Some(404),
                detail: "Not Found".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_slow_response_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let err = executor(&server.uri(), Some("ghp_test"))
            .apply_label("octo/widgets", 7, "bug")
            .await
            .unwrap_err();

        assert!(matches!(err, ActionError::Remote { status: None, .. }));
    }

    #[tokio::test]
    async fn test_preconditions_fail_without_network_call() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let no_token = executor(&server.uri(), Some("  "));
        assert!(matches!(
            no_token.apply_label("octo/widgets", 7, "bug").await,
            Err(ActionError::Misconfigured(_))
        ));

        let exec = executor(&server.uri(), Some("ghp_test"));
        for (repo, number, text) in [
            ("", 7, "bug"),
            ("unknown", 7, "bug"),
            ("UNKNOWN", 7, "bug"),
            ("not-a-repo", 7, "bug"),
            ("octo/../etc", 7, "bug"),
            ("octo/widgets", 0, "bug"),
            ("octo/widgets", -3, "bug"),
            ("octo/widgets", 7, "   "),
        ] {
            let result = exec.apply_label(repo, number, text).await;
            assert!(
                matches!(result, Err(ActionError::Validation(_))),
                "expected validation error for ({repo:?}, {number}, {text:?})"
            );
        }

        assert!(matches!(
            exec.add_comment("octo/widgets", 7, "").await,
            Err(ActionError::Validation(_))
        ));
    }

    #[test]
    fn test_error_detail_is_truncated() {
        let long = "x".repeat(500);
        let detail = truncate_detail(&long);
        assert_eq!(detail.chars().count(), MAX_ERROR_DETAIL_CHARS + 3);
    }
}
