use anyhow::{bail, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use fieldvoice_backend::{
    domain::{
        batch::{BatchHandler, BatchHandlerApi},
        record::Record,
    },
    infrastructure::{
        http::build_router,
        owner::OwnerContext,
        repositories::{GeminiTtsRepositoryFactory, JsonRecordStore, ProfileRepository},
    },
};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use test_context::AsyncTestContext;
use tokio::net::TcpListener;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub mod api_client;

use api_client::TestClient;

pub const PRIMARY_MODEL: &str = "primary-tts";
pub const FALLBACK_MODEL: &str = "fallback-tts";
pub const PROFILE_NAME: &str = "main";

const BATCH_TIMEOUT: Duration = Duration::from_secs(20);

pub struct TestContext {
    pub client: TestClient,
    pub gemini: MockServer,
    pub config_path: PathBuf,
    pub records_path: PathBuf,
    pub media_dir: PathBuf,
    batch_handler: Arc<BatchHandler>,
    _dir: TempDir,
}

impl AsyncTestContext for TestContext {
    fn setup() -> impl std::future::Future<Output = Self> + Send {
        async {
            let dir = tempfile::tempdir().expect("Failed to create temp dir");
            let config_path = dir.path().join("config.json");
            let records_path = dir.path().join("records.json");
            let media_dir = dir.path().join("media");

            std::fs::write(&config_path, serde_json::to_vec_pretty(&profile_document()).unwrap())
                .expect("Failed to write profile config");
            std::fs::write(&records_path, serde_json::to_vec_pretty(&seed_records()).unwrap())
                .expect("Failed to write records");

            let gemini = MockServer::start().await;

            let store = JsonRecordStore::open(&records_path, &media_dir)
                .expect("Failed to open record store");
            let owner = OwnerContext::spawn(Box::new(store)).expect("Failed to spawn owner");
            let profiles = Arc::new(ProfileRepository::new(&config_path));
            let tts_factory = Arc::new(
                GeminiTtsRepositoryFactory::new(gemini.uri(), Duration::from_secs(5))
                    .expect("Failed to build Gemini client"),
            );
            let batch_handler = Arc::new(BatchHandler::new(profiles, tts_factory, owner));

            let app = build_router(batch_handler.clone() as Arc<dyn BatchHandlerApi>);

            // Start server
            let listener = TcpListener::bind("127.0.0.1:0")
                .await
                .expect("Failed to bind listener");
            let addr = listener.local_addr().expect("Failed to get local addr");
            let base_url = format!("http://{}", addr);

            tokio::spawn(async move {
                axum::serve(listener, app).await.unwrap();
            });

            // Wait for server to be ready
            tokio::time::sleep(Duration::from_millis(50)).await;

            Self {
                client: TestClient::new(&base_url),
                gemini,
                config_path,
                records_path,
                media_dir,
                batch_handler,
                _dir: dir,
            }
        }
    }

    fn teardown(self) -> impl std::future::Future<Output = ()> + Send {
        async move {
            self.batch_handler.shutdown().await;
        }
    }
}

impl TestContext {
    /// Answer every request for `model` with `response`
    pub async fn mock_model(&self, model: &str, response: ResponseTemplate) {
        Mock::given(method("POST"))
            .and(path(format!("/models/{model}:streamGenerateContent")))
            .respond_with(response)
            .mount(&self.gemini)
            .await;
    }

    pub async fn gemini_requests(&self) -> usize {
        self.gemini
            .received_requests()
            .await
            .map(|requests| requests.len())
            .unwrap_or_default()
    }

    pub fn write_config(&self, document: &Value) -> Result<()> {
        std::fs::write(&self.config_path, serde_json::to_vec_pretty(document)?)?;
        Ok(())
    }

    pub fn read_config(&self) -> Result<Value> {
        Ok(serde_json::from_slice(&std::fs::read(&self.config_path)?)?)
    }

    /// Records as currently persisted on disk
    pub fn read_records(&self) -> Result<BTreeMap<i64, Record>> {
        let records: Vec<Record> = serde_json::from_slice(&std::fs::read(&self.records_path)?)?;
        Ok(records.into_iter().map(|r| (r.id, r)).collect())
    }

    pub fn record(&self, id: i64) -> Result<Record> {
        match self.read_records()?.remove(&id) {
            Some(record) => Ok(record),
            None => bail!("record {id} not found on disk"),
        }
    }

    /// Value of the `Audio` field as persisted
    pub fn audio_field(&self, id: i64) -> Result<String> {
        Ok(self
            .record(id)?
            .fields
            .get("Audio")
            .cloned()
            .unwrap_or_default())
    }

    pub fn media_files(&self) -> Result<Vec<String>> {
        let mut names = std::fs::read_dir(&self.media_dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect::<Vec<_>>();
        names.sort();
        Ok(names)
    }

    /// Start a batch and return its id
    pub async fn start_batch(&self, record_ids: &[i64]) -> Result<String> {
        let response = self
            .client
            .post("/api/batches", &json!({ "record_ids": record_ids }))
            .await?;
        if response.status != hyper::StatusCode::ACCEPTED {
            bail!("batch not accepted: {} {:?}", response.status, response.body);
        }
        let batch_id = response
            .body
            .as_ref()
            .and_then(|b| b.get("batch_id"))
            .and_then(|v| v.as_str())
            .map(str::to_string);
        match batch_id {
            Some(id) => Ok(id),
            None => bail!("missing batch_id in {:?}", response.body),
        }
    }

    /// Poll the current batch until it reports `completed`
    pub async fn wait_for_batch(&self) -> Result<Value> {
        let started = Instant::now();
        loop {
            let response = self.client.get("/api/batches/current").await?;
            if let Some(body) = response.body {
                if body.get("state").and_then(|v| v.as_str()) == Some("completed") {
                    return Ok(body);
                }
            }
            if started.elapsed() > BATCH_TIMEOUT {
                bail!("batch did not complete within {:?}", BATCH_TIMEOUT);
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
}

/// Log messages of a finished status body
pub fn log_messages(status: &Value) -> Vec<String> {
    status
        .get("logs")
        .and_then(|v| v.as_array())
        .map(|lines| {
            lines
                .iter()
                .filter_map(|line| line.get("message").and_then(|m| m.as_str()))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

pub fn counter(status: &Value, name: &str) -> u64 {
    status.get(name).and_then(|v| v.as_u64()).unwrap_or_default()
}

/// A streamed Gemini answer with one PCM chunk and token usage
pub fn audio_response(pcm: &[u8]) -> ResponseTemplate {
    sse(&[
        json!({
            "candidates": [{"content": {"parts": [{"inlineData": {
                "mimeType": "audio/L16;codec=pcm;rate=24000",
                "data": STANDARD.encode(pcm)
            }}]}}]
        }),
        json!({
            "usageMetadata": {"promptTokenCount": 7, "candidatesTokenCount": 70}
        }),
    ])
}

pub fn rate_limited_response() -> ResponseTemplate {
    ResponseTemplate::new(429).set_body_json(json!({
        "error": {
            "code": 429,
            "message": "Quota exceeded for metric: generate_requests_per_minute, limit: 10",
            "status": "RESOURCE_EXHAUSTED"
        }
    }))
}

pub fn server_error_response() -> ResponseTemplate {
    ResponseTemplate::new(500).set_body_json(json!({
        "error": {"code": 500, "message": "Internal error encountered.", "status": "INTERNAL"}
    }))
}

fn sse(events: &[Value]) -> ResponseTemplate {
    let body: String = events.iter().map(|e| format!("data: {e}\r\n\r\n")).collect();
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/event-stream")
        .set_body_string(body)
}

pub fn profile_settings() -> Value {
    json!({
        "api_key": "test-key",
        "primary_model": PRIMARY_MODEL,
        "fallback_model": FALLBACK_MODEL,
        "enable_fallback": true,
        "voice": "Kore",
        "field_mappings": [
            {"record_type": "Basic", "source_field": "Front", "target_field": "Audio"}
        ],
        "retry_attempts": 1,
        "retry_delay": 0.0,
        "success_tag": "tts_done",
        "usage_stats": {"requests": 2, "input_tokens": 10, "output_tokens": 100}
    })
}

pub fn profile_document() -> Value {
    json!({
        "current_profile": PROFILE_NAME,
        "profiles": {
            PROFILE_NAME: profile_settings(),
            "spare": {"api_key": "spare-key"}
        }
    })
}

/// 1-2: convertible, 3: already voiced, 4: markup only, 5: unmapped type
fn seed_records() -> Vec<Record> {
    let record = |id: i64, record_type: &str, fields: &[(&str, &str)]| Record {
        id,
        record_type: record_type.to_string(),
        fields: fields
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        tags: Vec::new(),
    };

    vec![
        record(1, "Basic", &[("Front", "Hello <b>world</b>"), ("Audio", "")]),
        record(2, "Basic", &[("Front", "Second card"), ("Audio", "")]),
        record(3, "Basic", &[("Front", "Third"), ("Audio", "[sound:old.wav]")]),
        record(4, "Basic", &[("Front", "<br>"), ("Audio", "")]),
        record(5, "Cloze", &[("Text", "Not mapped")]),
    ]
}
