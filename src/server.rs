//! HTTP API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `POST` | `/content` | Save `{owner, text, category?}`, replacing the scope |
//! | `POST` | `/content/documents` | Save `{owner, documents, category?}` |
//! | `GET`  | `/content?owner=&category=` | Stored chunks of a scope |
//! | `DELETE` | `/content?owner=&category=` | Delete a scope |
//! | `POST` | `/search` | `{query, owner, category?, limit?}` |
//! | `POST` | `/ask` | `{question, owner, category?}` |
//! | `POST` | `/wechat` | WeChat XML in, WeChat XML out |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "invalid input: owner must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `bad_envelope` (400),
//! `store_error` (500), `generation_error` (502), `internal` (500).
//!
//! `/wechat` answers from the `[messaging]` scope. A retrieval or
//! generation failure still produces a `200` reply envelope carrying
//! the fixed system-error text.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use content_rag_core::models::{ContentUnit, Document};
use content_rag_core::RagError;

use crate::client::RagClient;

/// Starts the HTTP server on `[server] bind` and runs until the process
/// is terminated.
pub async fn run_server(client: RagClient) -> anyhow::Result<()> {
    let bind_addr = client.config().server.bind.clone();
    if client.config().messaging.owner.is_none() {
        tracing::warn!("[messaging] owner not set; POST /wechat will reject requests");
    }

    let app = router(Arc::new(client));

    tracing::info!("listening on http://{}", bind_addr);
    println!("Server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Routes and middleware, without binding a socket.
pub fn router(client: Arc<RagClient>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route(
            "/content",
            post(handle_save_content)
                .get(handle_get_content)
                .delete(handle_delete_content),
        )
        .route("/content/documents", post(handle_save_documents))
        .route("/search", post(handle_search))
        .route("/ask", post(handle_ask))
        .route("/wechat", post(handle_wechat))
        .layer(cors)
        .with_state(client)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Error type that converts into an Axum HTTP response.
#[derive(Debug)]
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

impl From<RagError> for AppError {
    fn from(err: RagError) -> Self {
        let status = match &err {
            RagError::InvalidInput(_) | RagError::Envelope(_) => StatusCode::BAD_REQUEST,
            RagError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            RagError::Generation(_) => StatusCode::BAD_GATEWAY,
        };
        if status.is_server_error() {
            tracing::error!(error = %err, "request failed");
        }
        AppError {
            status,
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<RagError>() {
            Ok(rag) => rag.into(),
            Err(other) => {
                let message = format!("{:#}", other);
                tracing::error!(error = %message, "request failed");
                internal(message)
            }
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ /content ============

#[derive(Deserialize)]
struct SaveContentRequest {
    owner: String,
    text: String,
    #[serde(default)]
    category: Option<String>,
}

async fn handle_save_content(
    State(client): State<Arc<RagClient>>,
    Json(req): Json<SaveContentRequest>,
) -> Result<(StatusCode, Json<ContentUnit>), AppError> {
    let unit = client
        .save_content(&req.owner, &req.text, req.category.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(unit)))
}

#[derive(Deserialize)]
struct SaveDocumentsRequest {
    owner: String,
    documents: Vec<Document>,
    #[serde(default)]
    category: Option<String>,
}

#[derive(Serialize)]
struct SaveDocumentsResponse {
    documents: usize,
    unit: Option<ContentUnit>,
}

async fn handle_save_documents(
    State(client): State<Arc<RagClient>>,
    Json(req): Json<SaveDocumentsRequest>,
) -> Result<Json<SaveDocumentsResponse>, AppError> {
    let report = client
        .save_documents(&req.owner, req.documents, req.category.as_deref())
        .await?;
    Ok(Json(SaveDocumentsResponse {
        documents: report.documents,
        unit: report.unit,
    }))
}

#[derive(Deserialize)]
struct ScopeQuery {
    owner: String,
    #[serde(default)]
    category: Option<String>,
}

#[derive(Serialize)]
struct GetContentResponse {
    units: Vec<ContentUnit>,
}

async fn handle_get_content(
    State(client): State<Arc<RagClient>>,
    Query(scope): Query<ScopeQuery>,
) -> Result<Json<GetContentResponse>, AppError> {
    let units = client
        .get_content(&scope.owner, scope.category.as_deref())
        .await?;
    Ok(Json(GetContentResponse { units }))
}

#[derive(Serialize)]
struct DeleteContentResponse {
    deleted: usize,
}

async fn handle_delete_content(
    State(client): State<Arc<RagClient>>,
    Query(scope): Query<ScopeQuery>,
) -> Result<Json<DeleteContentResponse>, AppError> {
    let deleted = client
        .delete_content(&scope.owner, scope.category.as_deref())
        .await?;
    Ok(Json(DeleteContentResponse { deleted }))
}

// ============ POST /search ============

#[derive(Deserialize)]
struct SearchRequest {
    query: String,
    owner: String,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    limit: Option<usize>,
}

#[derive(Serialize)]
struct SearchResponse {
    results: Vec<Document>,
}

async fn handle_search(
    State(client): State<Arc<RagClient>>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, AppError> {
    if req.query.trim().is_empty() {
        return Err(bad_request("query must not be empty"));
    }
    let results = client
        .search(&req.query, &req.owner, req.category.as_deref(), req.limit)
        .await?;
    Ok(Json(SearchResponse { results }))
}

// ============ POST /ask ============

#[derive(Deserialize)]
struct AskRequest {
    question: String,
    owner: String,
    #[serde(default)]
    category: Option<String>,
}

#[derive(Serialize)]
struct AskResponse {
    answer: String,
}

async fn handle_ask(
    State(client): State<Arc<RagClient>>,
    Json(req): Json<AskRequest>,
) -> Result<Json<AskResponse>, AppError> {
    let answer = client
        .ask(&req.question, &req.owner, req.category.as_deref())
        .await?;
    Ok(Json(AskResponse { answer }))
}

// ============ POST /wechat ============

async fn handle_wechat(
    State(client): State<Arc<RagClient>>,
    body: String,
) -> Result<Response, AppError> {
    let messaging = &client.config().messaging;
    let owner = messaging
        .owner
        .as_deref()
        .ok_or_else(|| bad_request("messaging is not configured: set [messaging] owner"))?;

    let reply = client
        .respond_wechat_xml(&body, owner, messaging.category.as_deref())
        .await?;
    Ok(([(header::CONTENT_TYPE, "application/xml")], reply).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::llm::{DisabledModel, LanguageModel};
    use axum::body::Body;
    use axum::http::Request;
    use content_rag_core::embedding::HashingEmbedder;
    use content_rag_core::messaging::{SYSTEM_ERROR_REPLY, TEXT_ONLY_REPLY};
    use tempfile::TempDir;
    use tower::ServiceExt;

    async fn app(tmp: &TempDir, model: Arc<dyn LanguageModel>, messaging: bool) -> Router {
        let mut config = Config::minimal(tmp.path().join("server.sqlite"));
        if messaging {
            config.messaging.owner = Some("bot".to_string());
        }
        let client = RagClient::open_with(&config, Arc::new(HashingEmbedder::default()), model)
            .await
            .unwrap();
        router(Arc::new(client))
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, String) {
        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    fn json_req(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn empty_req(method: &str, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let tmp = TempDir::new().unwrap();
        let app = app(&tmp, Arc::new(DisabledModel), false).await;
        let (status, body) = send(&app, empty_req("GET", "/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("\"ok\""));
    }

    #[tokio::test]
    async fn test_content_crud_flow() {
        let tmp = TempDir::new().unwrap();
        let app = app(&tmp, Arc::new(DisabledModel), false).await;

        let (status, body) = send(
            &app,
            json_req(
                "POST",
                "/content",
                serde_json::json!({ "owner": "u", "text": "hello world", "category": "notes" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        let unit: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(unit["owner"], "u");
        assert_eq!(unit["category"], "notes");

        let (status, body) = send(&app, empty_req("GET", "/content?owner=u&category=notes")).await;
        assert_eq!(status, StatusCode::OK);
        let got: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(got["units"][0]["text"], "hello world");

        let (_, body) = send(&app, empty_req("GET", "/content?owner=u&category=")).await;
        let got: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(got["units"].as_array().unwrap().len(), 0);

        let (status, body) = send(
            &app,
            json_req(
                "POST",
                "/search",
                serde_json::json!({ "query": "hello", "owner": "u" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("hello world"));

        let (status, body) = send(&app, empty_req("DELETE", "/content?owner=u")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("\"deleted\":1"));
    }

    #[tokio::test]
    async fn test_save_documents_empty_is_noop() {
        let tmp = TempDir::new().unwrap();
        let app = app(&tmp, Arc::new(DisabledModel), false).await;
        let (status, body) = send(
            &app,
            json_req(
                "POST",
                "/content/documents",
                serde_json::json!({ "owner": "u", "documents": [] }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("\"unit\":null"));
    }

    #[tokio::test]
    async fn test_error_contract() {
        let tmp = TempDir::new().unwrap();
        let app = app(&tmp, Arc::new(DisabledModel), false).await;

        let (status, body) = send(
            &app,
            json_req("POST", "/content", serde_json::json!({ "owner": "u", "text": "" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let err: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(err["error"]["code"], "bad_request");

        let (status, body) = send(
            &app,
            json_req(
                "POST",
                "/ask",
                serde_json::json!({ "question": "why?", "owner": "u" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        let err: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(err["error"]["code"], "generation_error");
    }

    #[tokio::test]
    async fn test_wechat_requires_messaging_owner() {
        let tmp = TempDir::new().unwrap();
        let app = app(&tmp, Arc::new(DisabledModel), false).await;
        let (status, _) = send(
            &app,
            Request::builder()
                .method("POST")
                .uri("/wechat")
                .body(Body::from("<xml></xml>"))
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_wechat_replies() {
        let tmp = TempDir::new().unwrap();
        let app = app(&tmp, Arc::new(DisabledModel), true).await;

        let text = "<xml><ToUserName>bot</ToUserName><FromUserName>alice</FromUserName>\
                    <MsgType>text</MsgType><Content>hi</Content></xml>";
        let (status, body) = send(
            &app,
            Request::builder()
                .method("POST")
                .uri("/wechat")
                .body(Body::from(text))
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains(SYSTEM_ERROR_REPLY));

        let voice = "<xml><ToUserName>bot</ToUserName><FromUserName>alice</FromUserName>\
                     <MsgType>voice</MsgType></xml>";
        let (_, body) = send(
            &app,
            Request::builder()
                .method("POST")
                .uri("/wechat")
                .body(Body::from(voice))
                .unwrap(),
        )
        .await;
        assert!(body.contains(TEXT_ONLY_REPLY));

        let (status, body) = send(
            &app,
            Request::builder()
                .method("POST")
                .uri("/wechat")
                .body(Body::from("garbage"))
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("bad_envelope"));
    }
}
