mod common;

use std::net::SocketAddr;
use std::sync::Arc;

use common::ScriptedProvider;
use lawqa_backend::core::config::AppPaths;
use lawqa_backend::server;
use lawqa_backend::state::AppState;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::net::TcpListener;

async fn spawn_app(provider: ScriptedProvider) -> (SocketAddr, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let paths = Arc::new(AppPaths::with_data_dir(
        dir.path().to_path_buf(),
        dir.path().join("data"),
    ));
    let state = AppState::with_provider(paths, Arc::new(provider))
        .await
        .unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, server::router(state)).await.unwrap();
    });
    (addr, dir)
}

#[tokio::test]
async fn chat_streams_text_and_saves_the_turn() {
    let provider = ScriptedProvider::new()
        .keyword("试用期多久", "试用期")
        .answer("试用期不得超过六个月。")
        .summary("最长六个月。");
    let (addr, _dir) = spawn_app(provider).await;
    let client = reqwest::Client::new();
    let base = format!("http://{addr}");

    let report: Value = client
        .post(format!("{base}/api/index/chunks"))
        .json(&json!([
            {"content": "试用期最长不得超过六个月。", "metadata": {"law_name": "劳动合同法", "article_number": "第十九条"}},
            {"content": "   ", "metadata": {}}
        ]))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(report["report"]["inserted"], 1);

    let response = client
        .post(format!("{base}/api/chat/admin"))
        .json(&json!({"query": "试用期多久"}))
        .send()
        .await
        .unwrap();
    assert!(response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("text/plain"));
    let body = response.text().await.unwrap();

    assert!(body.starts_with("检索结果:[[],["));
    assert!(body.contains("试用期不得超过六个月。\n总结agent:\n最长六个月。"));

    let latest: Value = client
        .get(format!("{base}/api/history/admin/latest"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(latest["turn"]["user_query"], "试用期多久");
    assert_eq!(latest["turn"]["final_agent_response"], "最长六个月。");

    let users: Value = client
        .get(format!("{base}/api/history/users"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(users["usernames"], json!(["admin"]));
}

#[tokio::test]
async fn missing_history_is_not_found() {
    let (addr, _dir) = spawn_app(ScriptedProvider::new()).await;
    let response = reqwest::get(format!("http://{addr}/api/history/nobody/latest"))
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn failed_turn_ends_with_fallback_and_is_not_saved() {
    let provider = ScriptedProvider::new().keyword("试用期", "试用期");
    provider.set_unavailable(true);
    let (addr, _dir) = spawn_app(provider).await;
    let client = reqwest::Client::new();
    let base = format!("http://{addr}");

    let body = client
        .post(format!("{base}/api/chat/admin"))
        .json(&json!({"query": "试用期多久"}))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(body.contains("[错误]"));

    let status = client
        .get(format!("{base}/api/history/admin/latest"))
        .send()
        .await
        .unwrap()
        .status();
    assert_eq!(status, reqwest::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn empty_query_is_rejected() {
    let (addr, _dir) = spawn_app(ScriptedProvider::new()).await;
    let response = reqwest::Client::new()
        .post(format!("http://{addr}/api/chat/admin"))
        .json(&json!({"query": "  "}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn index_search_returns_buckets() {
    let (addr, _dir) = spawn_app(ScriptedProvider::new()).await;
    let client = reqwest::Client::new();
    let base = format!("http://{addr}");

    client
        .post(format!("{base}/api/index/chunks"))
        .json(&json!([
            {"page_content": "民法典是新中国第一部以法典命名的法律。", "metadata": {"law_name": "民法典"}},
            {"page_content": "本法自公布之日起施行，民法典另有规定的除外。", "metadata": {"law_name": "劳动合同法"}},
            {"page_content": "与婚姻无关的条文。", "metadata": {"law_name": "民法典"}}
        ]))
        .send()
        .await
        .unwrap();

    let found: Value = client
        .post(format!("{base}/api/index/search"))
        .json(&json!({"keyword": "民法典"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(found["title_matches"].as_array().unwrap().len(), 1);
    assert_eq!(found["body_matches"].as_array().unwrap().len(), 1);
    assert_eq!(
        found["body_matches"][0]["metadata"]["law_name"],
        "劳动合同法"
    );
}
