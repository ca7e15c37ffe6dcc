use mockito::Matcher;
use serde_json::json;

use topicflow_core::{OnboardError, PullRequestDraft, PullRequestHost};
use topicflow_hosting::{GitHubConfig, GitHubPrHost};

fn draft() -> PullRequestDraft {
    PullRequestDraft {
        repo: "org/helm-apps".to_string(),
        head: "add-snowflake-sink-customer-action-v1-20261018t101500".to_string(),
        base: "master".to_string(),
        title: "Add Kafka topic: customer.action.v1".to_string(),
        body: "## Kafka Topic Configuration".to_string(),
    }
}

#[tokio::test]
async fn open_pr_posts_draft_and_returns_html_url() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/repos/org/helm-apps/pulls")
        .match_header("authorization", "Bearer ghp_test")
        .match_header("accept", "application/vnd.github+json")
        .match_body(Matcher::Json(json!({
            "title": "Add Kafka topic: customer.action.v1",
            "head": "add-snowflake-sink-customer-action-v1-20261018t101500",
            "base": "master",
            "body": "## Kafka Topic Configuration"
        })))
        .with_status(201)
        .with_header("content-type", "application/json")
        .with_body(r#"{"number": 42, "html_url": "https://github.com/org/helm-apps/pull/42"}"#)
        .create_async()
        .await;

    let host = GitHubPrHost::new(GitHubConfig::new("ghp_test").with_api_base(server.url())).unwrap();
    let url = host.open_pr(&draft()).await.unwrap();

    assert_eq!(url, "https://github.com/org/helm-apps/pull/42");
    mock.assert_async().await;
}

#[tokio::test]
async fn validation_failure_is_pull_request_error() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/repos/org/helm-apps/pulls")
        .with_status(422)
        .with_body(r#"{"message": "Validation Failed", "errors": [{"message": "A pull request already exists"}]}"#)
        .create_async()
        .await;

    let host = GitHubPrHost::new(GitHubConfig::new("ghp_test").with_api_base(server.url())).unwrap();
    let err = host.open_pr(&draft()).await.unwrap_err();

    match err {
        OnboardError::PullRequest { repo, reason } => {
            assert_eq!(repo, "org/helm-apps");
            assert!(reason.contains("422"));
            assert!(reason.contains("already exists"));
            assert!(!reason.contains("ghp_test"));
        }
        other => panic!("expected pull request error, got {other:?}"),
    }
}

#[tokio::test]
async fn malformed_response_is_reported() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/repos/org/helm-apps/pulls")
        .with_status(201)
        .with_body("not json")
        .create_async()
        .await;

    let host = GitHubPrHost::new(GitHubConfig::new("ghp_test").with_api_base(server.url())).unwrap();
    let err = host.open_pr(&draft()).await.unwrap_err();
    assert!(err.to_string().contains("unexpected response"));
}
