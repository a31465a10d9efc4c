mod common;

use common::client;
use copilot_usage_exporter::collector::{CollectError, Collector};
use copilot_usage_exporter::http::ApiError;
use copilot_usage_exporter::metrics::{Publisher, REQUEST_AMOUNT};
use copilot_usage_exporter::worker::Worker;
use httpmock::{Method::GET, MockServer};
use std::sync::Arc;
use std::time::Duration;

const SEATS_PATH: &str = "/enterprises/acme/copilot/billing/seats";
const USAGE_PATH: &str = "/enterprises/acme/settings/billing/premium_request/usage";

fn seats_page(first: usize, count: usize) -> serde_json::Value {
    let seats: Vec<_> = (first..first + count)
        .map(|i| serde_json::json!({"assignee": {"login": format!("user{i}")}}))
        .collect();
    serde_json::json!({"total_seats": 237, "seats": seats})
}

fn usage_for(user: &str, requests: f64) -> serde_json::Value {
    serde_json::json!({
        "enterprise": "acme",
        "user": user,
        "usageItems": [{
            "product": "Copilot",
            "sku": "copilot_premium_request",
            "model": "Claude Sonnet 4",
            "unitType": "requests",
            "pricePerUnit": 0.04,
            "grossQuantity": requests,
            "grossAmount": requests * 0.04,
            "discountQuantity": requests,
            "discountAmount": requests * 0.04,
            "netQuantity": 0.0,
            "netAmount": 0.0
        }]
    })
}

#[tokio::test]
async fn seat_listing_stops_at_short_page() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    let mut pages = Vec::new();
    for (page, first, count) in [(1, 0, 100), (2, 100, 100), (3, 200, 37)] {
        let body = seats_page(first, count);
        pages.push(
            server
                .mock_async(move |when, then| {
                    when.method(GET)
                        .path(SEATS_PATH)
                        .query_param("per_page", "100")
                        .query_param("page", page.to_string().as_str());
                    then.status(200).json_body(body);
                })
                .await,
        );
    }
    let (client, _timer) = client(&server.base_url());
    let collector = Collector::new(client);

    let logins = collector.list_seats("acme").await?;
    assert_eq!(logins.len(), 237);
    assert_eq!(logins.first().map(String::as_str), Some("user0"));
    assert_eq!(logins.last().map(String::as_str), Some("user236"));
    for m in &pages {
        m.assert_hits_async(1).await;
    }
    Ok(())
}

#[tokio::test]
async fn empty_first_page_ends_listing() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    let m = server
        .mock_async(|when, then| {
            when.method(GET).path(SEATS_PATH);
            then.status(200)
                .json_body(serde_json::json!({"total_seats": 0, "seats": []}));
        })
        .await;
    let (client, _timer) = client(&server.base_url());

    let logins = Collector::new(client).list_seats("acme").await?;
    assert!(logins.is_empty());
    m.assert_hits_async(1).await;
    Ok(())
}

#[tokio::test]
async fn seats_without_assignee_are_skipped() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(SEATS_PATH);
            then.status(200).json_body(serde_json::json!({
                "total_seats": 2,
                "seats": [{"assignee": {"login": "alice"}}, {"assignee": null}]
            }));
        })
        .await;
    let (client, _timer) = client(&server.base_url());

    let logins = Collector::new(client).list_seats("acme").await?;
    assert_eq!(logins, vec!["alice".to_string()]);
    Ok(())
}

#[tokio::test]
async fn seat_page_failure_names_the_page() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(SEATS_PATH).query_param("page", "1");
            then.status(200).json_body(seats_page(0, 100));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(SEATS_PATH).query_param("page", "2");
            then.status(401);
        })
        .await;
    let (client, _timer) = client(&server.base_url());

    let err = Collector::new(client).list_seats("acme").await.unwrap_err();
    match &err {
        CollectError::SeatsPage { page, source } => {
            assert_eq!(*page, 2);
            assert!(matches!(source, ApiError::UnexpectedStatus { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().starts_with("listing copilot seats page 2: "));
    Ok(())
}

#[tokio::test]
async fn failed_user_is_left_out_of_snapshot() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(SEATS_PATH);
            then.status(200).json_body(serde_json::json!({
                "total_seats": 3,
                "seats": [
                    {"assignee": {"login": "alice"}},
                    {"assignee": {"login": "bob"}},
                    {"assignee": {"login": "carol"}}
                ]
            }));
        })
        .await;
    for (user, requests) in [("alice", 10.0), ("carol", 3.0)] {
        let body = usage_for(user, requests);
        server
            .mock_async(move |when, then| {
                when.method(GET).path(USAGE_PATH).query_param("user", user);
                then.status(200).json_body(body);
            })
            .await;
    }
    let bob = server
        .mock_async(|when, then| {
            when.method(GET).path(USAGE_PATH).query_param("user", "bob");
            then.status(404);
        })
        .await;
    let (client, _timer) = client(&server.base_url());
    let collector = Collector::new(client);

    let err = collector.get_user_usage("acme", "bob").await.unwrap_err();
    assert!(err.to_string().starts_with("getting premium usage for user \"bob\": "));

    let snapshot = collector.collect("acme").await?;
    assert_eq!(snapshot.seat_holders, 3);
    assert_eq!(snapshot.skipped_users, vec!["bob".to_string()]);
    let users: Vec<&str> = snapshot
        .observations
        .iter()
        .map(|o| o.labels.user.as_str())
        .collect();
    assert_eq!(users, vec!["alice", "carol"]);
    let alice = &snapshot.observations[0];
    assert_eq!(alice.labels.sku, "copilot_premium_request");
    assert_eq!(alice.labels.model, "Claude Sonnet 4");
    assert_eq!(alice.labels.enterprise, "acme");
    assert_eq!(alice.gross_quantity, 10.0);
    // One probe above plus one during collection; never retried.
    bob.assert_hits_async(2).await;
    Ok(())
}

#[tokio::test]
async fn failed_cycle_keeps_previous_snapshot() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    let mut seats = server
        .mock_async(|when, then| {
            when.method(GET).path(SEATS_PATH);
            then.status(200).json_body(serde_json::json!({
                "total_seats": 1,
                "seats": [{"assignee": {"login": "alice"}}]
            }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(USAGE_PATH).query_param("user", "alice");
            then.status(200).json_body(usage_for("alice", 4.0));
        })
        .await;
    let (client, _timer) = client(&server.base_url());
    let publisher = Arc::new(Publisher::new());
    let worker = Worker::new(
        Collector::new(client),
        publisher.clone(),
        "acme",
        Duration::from_secs(3600),
    );

    let report = worker.run_cycle().await?;
    assert_eq!(report.seat_holders, 1);
    assert_eq!(report.observations, 1);
    assert_eq!(report.skipped_users, 0);
    let published = publisher.render()?;
    assert!(published.contains(REQUEST_AMOUNT));
    assert!(published.contains("user=\"alice\""));

    seats.delete_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(SEATS_PATH);
            then.status(500);
        })
        .await;

    assert!(worker.run_cycle().await.is_err());
    assert_eq!(publisher.render()?, published);
    assert_eq!(publisher.summary().observations, 1);
    Ok(())
}
