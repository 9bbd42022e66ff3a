#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};

use query_engine_metadata::metadata::{
    ColumnInfo, ForeignKey, Nullable, PortableType, SchemaDescription, TableInfo,
};
use query_engine_translation::translation::{ChatMessage, LanguageModel, ModelError, ModelSettings};

/// A two-table slice of the banking database.
pub fn small_schema() -> SchemaDescription {
    SchemaDescription::new(vec![
        TableInfo {
            schema_name: "public".to_string(),
            table_name: "accounts".to_string(),
            columns: vec![
                ColumnInfo {
                    nullable: Nullable::NonNullable,
                    is_primary_key: true,
                    ..ColumnInfo::new("accountid", PortableType::Text)
                },
                ColumnInfo {
                    foreign_key: Some(ForeignKey {
                        table: "customers".to_string(),
                        column: "customerid".to_string(),
                    }),
                    ..ColumnInfo::new("customerid", PortableType::Text)
                },
                ColumnInfo::new("balance", PortableType::Decimal),
                ColumnInfo::new("opendate", PortableType::Timestamp),
            ],
        },
        TableInfo {
            schema_name: "public".to_string(),
            table_name: "customers".to_string(),
            columns: vec![
                ColumnInfo {
                    nullable: Nullable::NonNullable,
                    is_primary_key: true,
                    ..ColumnInfo::new("customerid", PortableType::Text)
                },
                ColumnInfo::new("firstname", PortableType::Text),
                ColumnInfo::new("lastname", PortableType::Text),
                ColumnInfo::new("active", PortableType::Boolean),
            ],
        },
    ])
}

/// A model that replays canned answers and records every conversation it was sent.
#[derive(Default)]
pub struct ScriptedModel {
    answers: Mutex<VecDeque<Result<String, ModelError>>>,
    calls: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedModel {
    pub fn new(answers: Vec<Result<String, ModelError>>) -> Arc<Self> {
        Arc::new(ScriptedModel {
            answers: Mutex::new(answers.into()),
            calls: Mutex::default(),
        })
    }

    pub fn calls(&self) -> Vec<Vec<ChatMessage>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ModelError> {
        self.calls.lock().unwrap().push(messages.to_vec());
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .expect("the scripted model ran out of answers")
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Requests received by the fake chat-completions endpoint.
#[derive(Debug, Clone)]
pub struct ReceivedRequest {
    pub authorization: Option<String>,
    pub body: serde_json::Value,
}

#[derive(Default)]
pub struct FakeEndpoint {
    responses: Mutex<VecDeque<(StatusCode, String)>>,
    delay: Duration,
    requests: Mutex<Vec<ReceivedRequest>>,
}

impl FakeEndpoint {
    pub fn requests(&self) -> Vec<ReceivedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

/// A chat-completions body whose single choice says `content`.
pub fn completion(content: &str) -> String {
    serde_json::json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "choices": [
            {"index": 0, "message": {"role": "assistant", "content": content}, "finish_reason": "stop"}
        ]
    })
    .to_string()
}

async fn chat_completions(
    State(endpoint): State<Arc<FakeEndpoint>>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> impl IntoResponse {
    tokio::time::sleep(endpoint.delay).await;

    endpoint.requests.lock().unwrap().push(ReceivedRequest {
        authorization: headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string),
        body,
    });

    // the last response repeats forever
    let (status, body) = {
        let mut responses = endpoint.responses.lock().unwrap();
        if responses.len() > 1 {
            responses.pop_front().unwrap()
        } else {
            responses.front().cloned().unwrap()
        }
    };
    (status, [(header::CONTENT_TYPE, "application/json")], body)
}

/// Serve a fake chat-completions endpoint on an ephemeral port and return its URL.
pub async fn fake_endpoint(
    responses: Vec<(StatusCode, String)>,
    delay: Duration,
) -> (String, Arc<FakeEndpoint>) {
    let endpoint = Arc::new(FakeEndpoint {
        responses: Mutex::new(responses.into()),
        delay,
        requests: Mutex::default(),
    });
    let router = Router::new()
        .route("/v1/chat/completions", post(chat_completions))
        .with_state(endpoint.clone());

    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::Server::from_tcp(listener)
            .unwrap()
            .serve(router.into_make_service())
            .await
            .unwrap();
    });

    (format!("http://{address}/v1/chat/completions"), endpoint)
}

pub fn settings(api_url: String) -> ModelSettings {
    ModelSettings {
        api_url,
        api_key: "test-key".to_string(),
        model: "grok-3-beta".to_string(),
        timeout: Duration::from_secs(5),
        max_tokens: 512,
        temperature: 0.2,
        max_retries: 0,
        retry_backoff: Duration::from_millis(10),
    }
}
