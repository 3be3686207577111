mod common;

use std::net::SocketAddr;

use serde_json::{json, Value};

async fn setup_room(addr: SocketAddr) -> String {
    let room: Value = reqwest::Client::new()
        .post(format!("http://{addr}/api/v1/rooms"))
        .header("Authorization", common::bearer("usr_alice"))
        .json(&json!({ "kind": "chat", "name": "Study Hall", "visibility": "public" }))
        .send()
        .await
        .expect("create room")
        .json()
        .await
        .expect("parse room");
    room["id"].as_str().unwrap().to_string()
}

async fn post_message(
    addr: SocketAddr,
    user_id: &str,
    room_id: &str,
    body: &str,
) -> reqwest::Response {
    reqwest::Client::new()
        .post(format!("http://{addr}/api/v1/rooms/{room_id}/messages"))
        .header("Authorization", common::bearer(user_id))
        .json(&json!({ "body": body }))
        .send()
        .await
        .expect("post message")
}

#[tokio::test]
async fn posted_message_round_trips_through_history() {
    let (addr, directory) = common::start_server().await;
    directory.insert("usr_alice", "Alice");
    let room_id = setup_room(addr).await;

    let resp = post_message(addr, "usr_alice", &room_id, "hello room").await;
    assert_eq!(resp.status(), 201);
    let posted: Value = resp.json().await.unwrap();
    assert_eq!(posted["senderName"], "Alice");
    assert_eq!(posted["system"], false);

    let history: Vec<Value> = reqwest::Client::new()
        .get(format!("http://{addr}/api/v1/rooms/{room_id}/messages"))
        .header("Authorization", common::bearer("usr_alice"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    // The fetched record equals the one returned at append time.
    let fetched = history
        .iter()
        .find(|m| m["id"] == posted["id"])
        .expect("message in history");
    assert_eq!(fetched, &posted);
}

#[tokio::test]
async fn non_members_cannot_post() {
    let (addr, _) = common::start_server().await;
    let room_id = setup_room(addr).await;

    let resp = post_message(addr, "usr_stranger", &room_id, "let me in").await;
    assert_eq!(resp.status(), 403);
}

#[tokio::test]
async fn empty_message_body_is_rejected() {
    let (addr, _) = common::start_server().await;
    let room_id = setup_room(addr).await;

    let resp = post_message(addr, "usr_alice", &room_id, "   ").await;
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn posting_to_unknown_room_is_not_found() {
    let (addr, _) = common::start_server().await;
    let resp = post_message(addr, "usr_alice", "room_missing", "hi").await;
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn history_is_ascending_and_respects_limit() {
    let (addr, _) = common::start_server().await;
    let room_id = setup_room(addr).await;

    for body in ["one", "two", "three"] {
        post_message(addr, "usr_alice", &room_id, body).await;
    }

    let client = reqwest::Client::new();
    let history: Vec<Value> = client
        .get(format!("http://{addr}/api/v1/rooms/{room_id}/messages"))
        .header("Authorization", common::bearer("usr_alice"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    // Room-created notice first, then the three posts in order.
    let bodies: Vec<&str> = history.iter().filter_map(|m| m["body"].as_str()).collect();
    assert_eq!(bodies.last(), Some(&"three"));
    let ids: Vec<i64> = history.iter().filter_map(|m| m["id"].as_i64()).collect();
    let mut sorted = ids.clone();
    sorted.sort();
    assert_eq!(ids, sorted);

    let tail: Vec<Value> = client
        .get(format!(
            "http://{addr}/api/v1/rooms/{room_id}/messages?limit=2"
        ))
        .header("Authorization", common::bearer("usr_alice"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let bodies: Vec<&str> = tail.iter().filter_map(|m| m["body"].as_str()).collect();
    assert_eq!(bodies, vec!["two", "three"]);
}

#[tokio::test]
async fn private_history_requires_membership() {
    let (addr, _) = common::start_server().await;

    let room: Value = reqwest::Client::new()
        .post(format!("http://{addr}/api/v1/rooms"))
        .header("Authorization", common::bearer("usr_alice"))
        .json(&json!({ "kind": "chat", "name": "Secret", "visibility": "private" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let room_id = room["id"].as_str().unwrap();

    let resp = reqwest::Client::new()
        .get(format!("http://{addr}/api/v1/rooms/{room_id}/messages"))
        .header("Authorization", common::bearer("usr_stranger"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);
}
