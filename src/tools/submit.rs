use crate::core::antibot;
use crate::types::SubmissionPayload;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// Characters of the response body kept when a submission is refused.
const BODY_SNIPPET_CHARS: usize = 500;

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("submission request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("form rejected the submission with HTTP {status}: {body_snippet}")]
    Rejected {
        status: StatusCode,
        body_snippet: String,
    },

    #[error("payload has no submission target")]
    MissingAction,
}

/// POST the pairs form-encoded to the payload's action URL.
///
/// Pair order is kept and repeated keys are sent as repeated fields.
pub async fn submit_payload(
    client: &Client,
    payload: &SubmissionPayload,
    referer: Option<&str>,
    timeout: Duration,
) -> Result<StatusCode, SubmitError> {
    if payload.action.trim().is_empty() {
        return Err(SubmitError::MissingAction);
    }

    let mut request = client
        .post(&payload.action)
        .header("User-Agent", antibot::get_random_user_agent())
        .form(&payload.pairs)
        .timeout(timeout);
    if let Some(referer) = referer {
        request = request.header("Referer", referer);
    }

    info!(
        "Submitting {} pairs to {}",
        payload.pairs.len(),
        payload.action
    );
    let response = request.send().await?;
    let status = response.status();
    if status.is_success() {
        info!("Form accepted the submission (HTTP {})", status);
        return Ok(status);
    }

    let body = response.text().await.unwrap_or_default();
    let body_snippet: String = body.chars().take(BODY_SNIPPET_CHARS).collect();
    warn!("Submission rejected with HTTP {}", status);
    Err(SubmitError::Rejected {
        status,
        body_snippet,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string, header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn payload(action: String) -> SubmissionPayload {
        SubmissionPayload {
            action,
            pairs: vec![
                ("fbzx".into(), "-42".into()),
                ("entry.1".into(), "A".into()),
                ("entry.1".into(), "B & C".into()),
            ],
        }
    }

    #[tokio::test]
    async fn posts_ordered_repeated_pairs() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/forms/d/e/x/formResponse"))
            .and(header("Referer", "https://example.com/viewform"))
            .and(header_exists("User-Agent"))
            .and(body_string("fbzx=-42&entry.1=A&entry.1=B+%26+C"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let status = submit_payload(
            &Client::new(),
            &payload(format!("{}/forms/d/e/x/formResponse", server.uri())),
            Some("https://example.com/viewform"),
            Duration::from_secs(5),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn rejection_carries_truncated_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("x".repeat(2000)))
            .mount(&server)
            .await;

        let err = submit_payload(
            &Client::new(),
            &payload(format!("{}/formResponse", server.uri())),
            None,
            Duration::from_secs(5),
        )
        .await
        .unwrap_err();
        match err {
            SubmitError::Rejected {
                status,
                body_snippet,
            } => {
                assert_eq!(status, StatusCode::BAD_REQUEST);
                assert_eq!(body_snippet.len(), BODY_SNIPPET_CHARS);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn empty_action_is_refused_locally() {
        let err = submit_payload(
            &Client::new(),
            &payload(String::new()),
            None,
            Duration::from_secs(1),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, SubmitError::MissingAction));
    }
}
