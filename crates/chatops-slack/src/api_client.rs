//! Slack Web API client used to impersonate the test user.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::helpers::{
    backoff_delay, clip_error_body, is_retryable_status, is_retryable_transport_error,
    retry_after_secs, RETRY_ATTEMPT_HEADER,
};
use crate::SlackError;

pub const DEFAULT_SLACK_API_BASE: &str = "https://slack.com/api";

const USERS_LIST_PAGE_LIMIT: u32 = 200;

#[derive(Debug, Clone, Deserialize)]
struct SlackAuthTestResponse {
    ok: bool,
    user_id: Option<String>,
    user: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct SlackUsersListResponse {
    ok: bool,
    #[serde(default)]
    members: Vec<SlackUser>,
    #[serde(default)]
    response_metadata: Option<SlackResponseMetadata>,
    error: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct SlackResponseMetadata {
    #[serde(default)]
    next_cursor: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct SlackChatMessageResponse {
    ok: bool,
    ts: Option<String>,
    channel: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct SlackRtmConnectResponse {
    ok: bool,
    url: Option<String>,
    #[serde(rename = "self")]
    self_identity: Option<SlackRtmSelf>,
    error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct SlackRtmSelf {
    id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
/// Workspace member as returned by `users.list`.
pub struct SlackUser {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub real_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthIdentity {
    pub user_id: String,
    pub user: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostedMessage {
    pub channel: String,
    pub ts: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtmSession {
    pub url: String,
    pub self_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
/// `chat.postMessage` payload for a message authored by the token's user.
pub struct PostMessage {
    pub channel: String,
    pub text: String,
    pub as_user: bool,
    pub link_names: bool,
}

impl PostMessage {
    pub fn as_user(channel: &str, text: &str) -> Self {
        Self {
            channel: channel.to_string(),
            text: text.to_string(),
            as_user: true,
            link_names: false,
        }
    }

    pub fn with_link_names(mut self, link_names: bool) -> Self {
        self.link_names = link_names;
        self
    }
}

#[derive(Clone)]
pub struct SlackApiClient {
    http: reqwest::Client,
    api_base: String,
    token: String,
    retry_max_attempts: usize,
    retry_base_delay_ms: u64,
}

impl SlackApiClient {
    pub fn new(
        api_base: &str,
        token: &str,
        request_timeout_ms: u64,
        retry_max_attempts: usize,
        retry_base_delay_ms: u64,
    ) -> Result<Self, SlackError> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static("chatops-e2e"),
        );
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/json"),
        );
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(request_timeout_ms.max(1)))
            .build()?;

        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.trim().to_string(),
            retry_max_attempts: retry_max_attempts.max(1),
            retry_base_delay_ms: retry_base_delay_ms.max(1),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{method}", self.api_base)
    }

    pub async fn auth_test(&self) -> Result<AuthIdentity, SlackError> {
        let method = "auth.test";
        let response: SlackAuthTestResponse = self
            .request_json(method, || {
                self.http
                    .post(self.method_url(method))
                    .bearer_auth(&self.token)
            })
            .await?;
        if !response.ok {
            return Err(api_error(method, response.error));
        }

        let user_id = response
            .user_id
            .filter(|value| !value.trim().is_empty())
            .ok_or(SlackError::MissingField {
                method: method.to_string(),
                field: "user_id",
            })?;
        Ok(AuthIdentity {
            user_id,
            user: response.user,
        })
    }

    /// Lists every workspace member, following cursor pagination.
    pub async fn list_users(&self) -> Result<Vec<SlackUser>, SlackError> {
        let method = "users.list";
        let mut members = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let mut query = vec![("limit", USERS_LIST_PAGE_LIMIT.to_string())];
            if let Some(cursor) = cursor.as_ref() {
                query.push(("cursor", cursor.clone()));
            }
            let response: SlackUsersListResponse = self
                .request_json(method, || {
                    self.http
                        .get(self.method_url(method))
                        .bearer_auth(&self.token)
                        .query(&query)
                })
                .await?;
            if !response.ok {
                return Err(api_error(method, response.error));
            }
            members.extend(response.members);

            cursor = response
                .response_metadata
                .and_then(|metadata| metadata.next_cursor)
                .filter(|value| !value.trim().is_empty());
            if cursor.is_none() {
                return Ok(members);
            }
            tracing::debug!(fetched = members.len(), "users.list has more pages");
        }
    }

    /// Returns the id of the first member whose `real_name` equals `real_name`.
    pub async fn find_user_id_by_real_name(&self, real_name: &str) -> Result<String, SlackError> {
        let members = self.list_users().await?;
        members
            .into_iter()
            .find(|member| member.real_name.as_deref() == Some(real_name))
            .map(|member| member.id)
            .ok_or_else(|| SlackError::UserNotFound(real_name.to_string()))
    }

    pub async fn post_message(&self, message: &PostMessage) -> Result<PostedMessage, SlackError> {
        let method = "chat.postMessage";
        let response: SlackChatMessageResponse = self
            .request_json(method, || {
                self.http
                    .post(self.method_url(method))
                    .bearer_auth(&self.token)
                    .json(message)
            })
            .await?;
        if !response.ok {
            return Err(api_error(method, response.error));
        }

        Ok(PostedMessage {
            channel: response
                .channel
                .unwrap_or_else(|| message.channel.clone()),
            ts: response.ts.ok_or(SlackError::MissingField {
                method: method.to_string(),
                field: "ts",
            })?,
        })
    }

    pub async fn rtm_connect(&self) -> Result<RtmSession, SlackError> {
        let method = "rtm.connect";
        let response: SlackRtmConnectResponse = self
            .request_json(method, || {
                self.http
                    .post(self.method_url(method))
                    .bearer_auth(&self.token)
            })
            .await?;
        if !response.ok {
            return Err(api_error(method, response.error));
        }

        let url = response
            .url
            .filter(|value| !value.trim().is_empty())
            .ok_or(SlackError::MissingField {
                method: method.to_string(),
                field: "url",
            })?;
        Ok(RtmSession {
            url,
            self_id: response.self_identity.map(|identity| identity.id),
        })
    }

    async fn request_json<T, F>(&self, method: &str, mut builder: F) -> Result<T, SlackError>
    where
        T: DeserializeOwned,
        F: FnMut() -> reqwest::RequestBuilder,
    {
        let mut attempt = 0_usize;
        loop {
            attempt = attempt.saturating_add(1);
            let response = builder()
                .header(RETRY_ATTEMPT_HEADER, attempt.saturating_sub(1).to_string())
                .send()
                .await;
            match response {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let body = response.bytes().await?;
                        return Ok(serde_json::from_slice::<T>(&body)?);
                    }

                    let retry_after = retry_after_secs(response.headers());
                    let body = response.text().await.unwrap_or_default();
                    if attempt < self.retry_max_attempts && is_retryable_status(status) {
                        tracing::warn!(
                            method,
                            status = status.as_u16(),
                            attempt,
                            "retrying slack api call"
                        );
                        tokio::time::sleep(backoff_delay(
                            self.retry_base_delay_ms,
                            attempt,
                            retry_after,
                        ))
                        .await;
                        continue;
                    }

                    return Err(SlackError::HttpStatus {
                        method: method.to_string(),
                        status: status.as_u16(),
                        body: clip_error_body(&body),
                    });
                }
                Err(error) => {
                    if attempt < self.retry_max_attempts && is_retryable_transport_error(&error) {
                        tracing::warn!(method, attempt, %error, "retrying slack api call");
                        tokio::time::sleep(backoff_delay(self.retry_base_delay_ms, attempt, None))
                            .await;
                        continue;
                    }
                    return Err(SlackError::Http(error));
                }
            }
        }
    }
}

fn api_error(method: &str, error: Option<String>) -> SlackError {
    SlackError::Api {
        method: method.to_string(),
        error: error.unwrap_or_else(|| "unknown error".to_string()),
    }
}
