use std::path::Path;

use reqwest::StatusCode;
use serde_json::{Value, json};

use workbench_core::WorkbenchConfig;

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
    root: tempfile::TempDir,
}

impl TestServer {
    async fn spawn() -> Self {
        workbench_observability::tracing::init_for_tests();
        let root = tempfile::tempdir().expect("tempdir");
        let config = WorkbenchConfig {
            root: root.path().to_path_buf(),
            ..WorkbenchConfig::default()
        };

        // Same router as prod, bound to an ephemeral port.
        let app = workbench_api::app::build_app(config).await;
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}/api", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle, root }
    }

    fn root(&self) -> &Path {
        self.root.path()
    }

    async fn get(&self, path: &str) -> (StatusCode, Value) {
        let res = reqwest::Client::new()
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await
            .unwrap();
        let status = res.status();
        (status, res.json().await.unwrap())
    }

    async fn post(&self, path: &str, body: Value) -> (StatusCode, Value) {
        let res = reqwest::Client::new()
            .post(format!("{}{}", self.base_url, path))
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = res.status();
        (status, res.json().await.unwrap())
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn codes(report: &Value) -> Vec<String> {
    report["errors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["error_code"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn health_reports_offline() {
    let srv = TestServer::spawn().await;
    let (status, body) = srv.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok", "offline": true}));
}

#[tokio::test]
async fn bootstrap_prepares_layout() {
    let srv = TestServer::spawn().await;
    assert!(srv.root().join("registry/guardrails").is_dir());
    assert!(srv.root().join("artifacts/datasets/wordnet_synth_1337.jsonl").is_file());

    let (_, body) = srv.get("/datasets").await;
    let ids: Vec<&str> = body["datasets"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|d| d["id"].as_str())
        .collect();
    assert!(ids.contains(&"wordnet_synth_1337"), "{ids:?}");
}

#[tokio::test]
async fn runtime_start_waits_for_readiness() {
    let srv = TestServer::spawn().await;

    let (_, report) = srv.get("/readiness").await;
    assert_eq!(report["status"], "blocked");
    assert!(codes(&report).contains(&"wordnet_root_missing".to_string()));

    let (status, body) = srv.post("/runtime/start", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "workspace_not_ready");
    assert!(!body["errors"].as_array().unwrap().is_empty());

    std::fs::create_dir_all(srv.root().join("WordNet-3.0")).unwrap();
    let (_, report) = srv.get("/readiness").await;
    assert_eq!(report["status"], "ready", "{report}");

    let (status, body) = srv.post("/runtime/start", json!({"mode": "chat"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Runtime start requested");
    assert_eq!(body["payload"]["mode"], "chat");

    let (status, body) = srv.post("/runtime/stop", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
}

#[tokio::test]
async fn workspace_round_trip_and_validation() {
    let srv = TestServer::spawn().await;

    let (status, body) = srv
        .post("/workspace", json!({"name": "demo", "selected_modules": ["chat-core"], "seed": "42"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["workspace"]["seed"], 42);

    let (_, ws) = srv.get("/workspace").await;
    assert_eq!(ws["name"], "demo");
    assert_eq!(ws["selected_modules"], json!(["chat-core"]));

    let (status, body) = srv.post("/workspace", json!({"selected_modules": "chat-core"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "invalid_payload");

    let (_, mappings) = srv.get("/workspace/mappings").await;
    assert_eq!(mappings, json!({"module_map": {}, "capability_map": {}}));
}

#[tokio::test]
async fn chat_post_never_echoes() {
    let srv = TestServer::spawn().await;
    let (status, body) = srv.post("/runtime/post", json!({"text": "apple", "seed": 7})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["received"]["text"], "apple");
    let raw = body["answer"]["raw"].as_str().unwrap();
    assert_ne!(raw.trim().to_lowercase(), "apple");
    assert_eq!(body["guardrails"]["max_tokens"], 256);

    let (_, body) = srv.post("/runtime/post", json!({"seed": 7})).await;
    assert!(body["answer"].is_null());
}

#[tokio::test]
async fn guardrails_update_merges_known_keys() {
    let srv = TestServer::spawn().await;
    let (status, body) = srv
        .post("/guardrails", json!({"max_tokens": 64, "unknown": true}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["guardrails"]["max_tokens"], 64);
    assert!(body["guardrails"].get("unknown").is_none());

    let (_, cfg) = srv.get("/guardrails").await;
    assert_eq!(cfg["max_tokens"], 64);
    assert_eq!(cfg["content_filters"], json!(["hate", "violence"]));
}

#[tokio::test]
async fn train_job_registers_model_and_is_listed() {
    let srv = TestServer::spawn().await;

    let (status, body) = srv.post("/train", json!({"module_id": "chat-core", "seed": 1337})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true, "{body}");
    assert_eq!(body["job"]["status"], "finished");
    assert_eq!(body["job"]["result"]["model_id"], "chat_retrieval_1337");

    let (_, models) = srv.get("/registry/models").await;
    assert!(
        models["models"]
            .as_array()
            .unwrap()
            .iter()
            .any(|m| m["id"] == "chat_retrieval_1337")
    );

    let (_, body) = srv.post("/jobs/train", json!({"module_id": "nope"})).await;
    assert_eq!(body["ok"], false);
    assert_eq!(body["job"]["status"], "failed");

    let (_, jobs) = srv.get("/jobs").await;
    assert_eq!(jobs["jobs"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn training_variants_and_tools_run_as_jobs() {
    let srv = TestServer::spawn().await;

    let (status, body) = srv.post("/train/rl", json!({"seed": 11})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true, "{body}");
    assert_eq!(body["job"]["type"], "train_rl");
    assert!(srv.root().join("artifacts/rl/ppo_11/run.json").is_file());

    let (_, body) = srv.post("/train/sft", json!({"seed": 1337, "steps": 1})).await;
    assert_eq!(body["ok"], true, "{body}");
    assert_eq!(body["job"]["result"]["run_dir"], "artifacts/chat/sft_1337");

    let (_, body) = srv.post("/tools/make_bubbles", json!({})).await;
    assert_eq!(body["ok"], true, "{body}");
    assert_eq!(body["job"]["result"]["bubbles"], "artifacts/bubble/bubbles_wordnet_synth_1337.json");

    let (_, body) = srv.post("/train/gan", json!({})).await;
    assert_eq!(body["ok"], false);
    assert_eq!(body["job"]["error"], "unknown job type: train_gan");
}

#[tokio::test]
async fn path_like_job_type_is_rejected_without_writing() {
    let srv = TestServer::spawn().await;
    let (status, body) = srv.post("/jobs/..%2F..%2Fpwned", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "invalid_job_type");

    let escaped = std::fs::read_dir(srv.root())
        .unwrap()
        .filter_map(|e| e.ok())
        .any(|e| e.file_name().to_string_lossy().starts_with("pwned"));
    assert!(!escaped);
    let (_, jobs) = srv.get("/jobs").await;
    assert!(jobs["jobs"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn missing_metrics_file_is_404() {
    let srv = TestServer::spawn().await;
    let (status, body) = srv.get("/metrics/by_id/nothing.json").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error_code"], "metrics_not_found");

    let (_, body) = srv.get("/metrics/latest?capability=chat").await;
    assert_eq!(body["metrics"], json!({}));
}
