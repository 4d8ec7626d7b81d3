//! Integration test: start the gateway on a free port and drive the full
//! hand-off flow over HTTP — batch ingest, conversation dedup, close,
//! recreate. The server task is left running when the test ends.

use lib::config::Config;
use lib::gateway;
use serde_json::json;
use std::time::Duration;

fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind free port");
    listener.local_addr().expect("local_addr").port()
}

const ACCOUNT: &str = "/org/freedesktop/Telepathy/Account/ring/tel/account0";
const TARGET_ID_KEY: &str = "org.freedesktop.Telepathy.Channel.TargetID";

fn batch_json(channels: Vec<serde_json::Value>) -> serde_json::Value {
    json!({
        "account": ACCOUNT,
        "connection": "/connection/ring/tel/conn0",
        "channels": channels,
    })
}

fn channel_json(path: &str, target_id: Option<&str>) -> serde_json::Value {
    match target_id {
        Some(t) => json!({
            "objectPath": path,
            "immutableProperties": { TARGET_ID_KEY: t },
        }),
        None => json!({ "objectPath": path, "immutableProperties": {} }),
    }
}

async fn wait_until_up(client: &reqwest::Client, base: &str) {
    for _ in 0..100 {
        if let Ok(resp) = client.get(format!("{}/", base)).send().await {
            if resp.status().is_success() {
                return;
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("gateway did not come up at {}", base);
}

async fn conversations(
    client: &reqwest::Client,
    base: &str,
) -> Vec<serde_json::Value> {
    client
        .get(format!("{}/conversations", base))
        .send()
        .await
        .expect("GET /conversations")
        .json()
        .await
        .expect("parse conversations JSON")
}

#[tokio::test]
async fn batches_dedup_close_and_recreate() {
    let port = free_port();
    let mut config = Config::default();
    config.gateway.port = port;
    config.gateway.bind = "127.0.0.1".to_string();

    tokio::spawn(async move {
        let _ = gateway::run_gateway(config).await;
    });

    let base = format!("http://127.0.0.1:{}", port);
    let client = reqwest::Client::new();
    wait_until_up(&client, &base).await;

    // Health reports the registered handler name.
    let health: serde_json::Value = client
        .get(format!("{}/", base))
        .send()
        .await
        .expect("GET /")
        .json()
        .await
        .expect("parse health JSON");
    assert_eq!(
        health.get("handler").and_then(|v| v.as_str()),
        Some("org.nemomobile.Parley")
    );

    // One target-less channel and one valid channel: the batch is accepted
    // whole, only the valid channel lands in a conversation.
    let resp = client
        .post(format!("{}/batches", base))
        .json(&batch_json(vec![
            channel_json("/channel/0", None),
            channel_json("/channel/1", Some("+358401234567")),
        ]))
        .send()
        .await
        .expect("POST /batches");
    assert!(resp.status().is_success());
    let accepted: serde_json::Value = resp.json().await.expect("parse batch response");
    assert_eq!(accepted.get("channels").and_then(|v| v.as_u64()), Some(2));

    let list = conversations(&client, &base).await;
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].get("channels").and_then(|v| v.as_u64()), Some(1));
    assert_eq!(
        list[0].get("remoteUid").and_then(|v| v.as_str()),
        Some("+358401234567")
    );
    let first_id = list[0]
        .get("id")
        .and_then(|v| v.as_str())
        .expect("conversation id")
        .to_string();

    // A differently formatted number for the same line joins the existing
    // conversation instead of creating a second one.
    let resp = client
        .post(format!("{}/batches", base))
        .json(&batch_json(vec![channel_json(
            "/channel/2",
            Some("040 123 4567"),
        )]))
        .send()
        .await
        .expect("POST /batches");
    assert!(resp.status().is_success());

    let list = conversations(&client, &base).await;
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].get("channels").and_then(|v| v.as_u64()), Some(2));

    // Closing an unknown conversation is a 404 and touches nothing.
    let resp = client
        .delete(format!(
            "{}/conversations/00000000-0000-0000-0000-000000000000",
            base
        ))
        .send()
        .await
        .expect("DELETE unknown conversation");
    assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);
    assert_eq!(conversations(&client, &base).await.len(), 1);

    // Close the real one; the registry entry goes away once the close
    // notification is drained.
    let resp = client
        .delete(format!("{}/conversations/{}", base, first_id))
        .send()
        .await
        .expect("DELETE conversation");
    assert_eq!(resp.status(), reqwest::StatusCode::NO_CONTENT);
    let mut emptied = false;
    for _ in 0..100 {
        if conversations(&client, &base).await.is_empty() {
            emptied = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(emptied, "closed conversation was not removed");

    // The same number now resolves to a fresh conversation.
    let resp = client
        .post(format!("{}/batches", base))
        .json(&batch_json(vec![channel_json(
            "/channel/3",
            Some("+358401234567"),
        )]))
        .send()
        .await
        .expect("POST /batches");
    assert!(resp.status().is_success());

    let list = conversations(&client, &base).await;
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].get("channels").and_then(|v| v.as_u64()), Some(1));
    assert_ne!(
        list[0].get("id").and_then(|v| v.as_str()),
        Some(first_id.as_str())
    );
}
