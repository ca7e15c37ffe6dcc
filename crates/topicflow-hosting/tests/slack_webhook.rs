use chrono::Utc;
use mockito::Matcher;
use serde_json::json;
use uuid::Uuid;

use topicflow_core::{
    DagTrigger, Notifier, OnboardError, RunResult, SinkType, StepOutcome, TopicConfig, ValueType,
};
use topicflow_hosting::{SlackConfig, SlackWebhookNotifier};

fn realtime_run() -> (RunResult, TopicConfig) {
    let topic = TopicConfig::new("customer.action.v1", ValueType::Json, SinkType::Realtime).unwrap();
    let mut run = RunResult::new(Uuid::new_v4(), &topic, Utc::now());
    run.outcomes = vec![
        StepOutcome::success("helm-apps", "Helm", "https://github.com/org/helm-apps/pull/42"),
        StepOutcome::success("data-airflow", "Airflow", "https://github.com/org/data-airflow/pull/7"),
    ];
    run.manual_trigger_unlocked = true;
    (run, topic)
}

#[tokio::test]
async fn notify_posts_rendered_payload() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/services/T000/B000/XXXX")
        .match_header("content-type", "application/json")
        .match_body(Matcher::AllOf(vec![
            Matcher::PartialJson(json!({
                "text": "PRs created for topic: customer.action.v1"
            })),
            Matcher::Regex("dags/stream_loader/trigger".to_string()),
        ]))
        .with_status(200)
        .with_body("ok")
        .create_async()
        .await;

    let notifier = SlackWebhookNotifier::new(SlackConfig::new(format!(
        "{}/services/T000/B000/XXXX",
        server.url()
    )))
    .unwrap()
    .with_trigger(Some(DagTrigger::new("https://airflow.example.com", "stream_loader")));

    let (run, topic) = realtime_run();
    notifier.notify(&run, &topic).await.unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn non_2xx_is_delivery_error_with_status() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/hook")
        .with_status(404)
        .with_body("no_service")
        .create_async()
        .await;

    let notifier = SlackWebhookNotifier::new(SlackConfig::new(format!("{}/hook", server.url()))).unwrap();
    let (run, topic) = realtime_run();
    let err = notifier.notify(&run, &topic).await.unwrap_err();

    match err {
        OnboardError::Delivery { status, reason } => {
            assert_eq!(status, Some(404));
            assert!(reason.contains("no_service"));
        }
        other => panic!("expected delivery error, got {other:?}"),
    }
}

#[tokio::test]
async fn unreachable_webhook_is_delivery_error_without_url() {
    // Port 9 (discard) on localhost is not listening in test environments.
    let notifier = SlackWebhookNotifier::new(SlackConfig::new("http://127.0.0.1:9/secret-hook")).unwrap();
    let (run, topic) = realtime_run();
    let err = notifier.notify(&run, &topic).await.unwrap_err();

    match err {
        OnboardError::Delivery { status, reason } => {
            assert_eq!(status, None);
            assert!(!reason.contains("secret-hook"));
        }
        other => panic!("expected delivery error, got {other:?}"),
    }
}
