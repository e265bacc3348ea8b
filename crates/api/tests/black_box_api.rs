use reqwest::StatusCode;
use serde_json::{json, Value};

use tree_infra::config::{AppConfig, StoreBackend};

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        tree_observability::init_for_tests();

        // Same router as prod (in-memory store), bound to an ephemeral port.
        let config = AppConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            store: StoreBackend::InMemory,
            fixture_child_containers: 3,
        };
        let app = tree_api::app::build_app(&config)
            .await
            .expect("failed to build app");
        let listener = tokio::net::TcpListener::bind(config.bind_addr)
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn get_json(client: &reqwest::Client, url: String) -> (StatusCode, Value) {
    let res = client.get(url).send().await.unwrap();
    let status = res.status();
    (status, res.json().await.unwrap_or(Value::Null))
}

fn chain(doc: &Value) -> Vec<String> {
    doc["history"][0]["parentContainerIds"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn health_is_ok() {
    let srv = TestServer::spawn().await;
    let res = reqwest::get(srv.url("/health")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn fixture_is_loaded_at_startup() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let (status, doc) = get_json(&client, srv.url("/containers/2")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(doc["_id"], "2");
    assert_eq!(chain(&doc), vec!["mixed-contents", "root-container"]);

    let (_, items) = get_json(&client, srv.url("/containers/mixed-contents/inventory-items")).await;
    assert_eq!(items.as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn update_documents_moves_items_under_production_lot() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let (_, before) = get_json(&client, srv.url("/containers/production-lot/inventory-items")).await;
    assert!(before.as_array().unwrap().is_empty());

    let res = client.post(srv.url("/update-documents")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let report: Value = res.json().await.unwrap();
    assert_eq!(report["source_id"], "mixed-contents");
    assert_eq!(report["destination_id"], "production-lot");
    assert_eq!(report["apply"]["containers"]["prepended"], 4);
    assert_eq!(report["apply"]["items"]["prepended"], 3);
    assert_eq!(report["apply"]["phases"].as_array().unwrap().last().unwrap(), "session_ended");

    let (_, items) = get_json(&client, srv.url("/containers/production-lot/inventory-items")).await;
    let items = items.as_array().unwrap();
    assert_eq!(items.len(), 3);
    for item in items {
        let c = chain(item);
        assert_eq!(&c[1..], ["mixed-contents", "production-lot", "root-container"]);
        assert_eq!(item["history"].as_array().unwrap().len(), 2);
    }

    let (_, mixed) = get_json(&client, srv.url("/containers/mixed-contents")).await;
    assert_eq!(chain(&mixed), vec!["production-lot", "root-container"]);
}

#[tokio::test]
async fn rerunning_update_documents_is_a_no_op() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    for _ in 0..2 {
        let res = client.post(srv.url("/update-documents")).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    let (_, doc) = get_json(&client, srv.url("/containers/1")).await;
    assert_eq!(doc["history"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn reset_database_restores_the_fixture() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    client.post(srv.url("/update-documents")).send().await.unwrap();

    let res = client.post(srv.url("/reset-database")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let summary: Value = res.json().await.unwrap();
    assert_eq!(summary, json!({ "containers": 6, "inventory_items": 3 }));

    let (_, items) = get_json(&client, srv.url("/containers/production-lot/inventory-items")).await;
    assert!(items.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn general_move_and_error_mapping() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .post(srv.url("/containers/3/move"))
        .json(&json!({ "destination_id": "production-lot" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let (_, doc) = get_json(&client, srv.url("/containers/3")).await;
    assert_eq!(chain(&doc), vec!["production-lot", "root-container"]);

    // Under its own descendant.
    let res = client
        .post(srv.url("/containers/mixed-contents/move"))
        .json(&json!({ "destination_id": "1" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "precondition_violation");

    let res = client
        .post(srv.url("/containers/nope/move"))
        .json(&json!({ "destination_id": "production-lot" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = client
        .post(srv.url("/containers/1/move"))
        .json(&json!({ "destination_id": "  " }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let (status, body) = get_json(&client, srv.url("/containers/nope")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}
