//! HTTP layer exposing the conversation core to the web client.
//!
//! Handlers only translate between HTTP and the core types. All state is
//! constructed once at startup and shared through [`AppState`]; the shared
//! `ChatSession`, `ProfileStore`, and synthesizer sit behind async mutexes
//! so at most one mutation is in flight per instance.
//!
//! ## Endpoints
//!
//! - `GET  /health` — liveness probe
//! - `POST /process-audio` — raw audio body → transcription
//! - `POST /chat` — user text → assembled assistant reply
//! - `GET  /profiles` — id/name enumeration in load order
//! - `GET  /profiles/{id}/prompt` — rendered or cached prompt
//! - `PUT  /profiles/{id}/prompt` — overwrite the cached prompt
//! - `GET  /profiles/by-name/{name}/prompt` — prompt via unique name
//! - `POST /prompt/activate` — install a profile's prompt as the session
//!   system prompt
//! - `POST /synthesize` — text → WAV bytes
//! - `GET  /voices?gender=&locale=` — voice short-names
//! - `PUT  /voice` — select the synthesis voice
//! - `POST /wake-check` — transcription text → wake phrase hit

use axum::Router;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post, put};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::chat::ChatSession;
use crate::config::ServerConfig;
use crate::error::{CarelineError, Result};
use crate::profile::{ProfileStore, ProfileSummary};
use crate::stt::SpeechToText;
use crate::tts::TextToSpeech;
use crate::wake::WakePhraseMatcher;

/// Shared state for axum handlers, constructed once in `main`.
pub struct AppState {
    /// Profile records and prompt cache.
    pub profiles: Mutex<ProfileStore>,
    /// The conversation session.
    pub session: Mutex<ChatSession>,
    /// Speech recognition capability.
    pub recognizer: Box<dyn SpeechToText>,
    /// Speech synthesis capability (mutable: voice selection).
    pub synthesizer: Mutex<Box<dyn TextToSpeech>>,
    /// Wake phrase matcher.
    pub wake: WakePhraseMatcher,
}

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/process-audio", post(handle_process_audio))
        .route("/chat", post(handle_chat))
        .route("/profiles", get(handle_list_profiles))
        .route(
            "/profiles/{id}/prompt",
            get(handle_get_prompt).put(handle_put_prompt),
        )
        .route(
            "/profiles/by-name/{name}/prompt",
            get(handle_get_prompt_by_name),
        )
        .route("/prompt/activate", post(handle_activate_prompt))
        .route("/synthesize", post(handle_synthesize))
        .route("/voices", get(handle_list_voices))
        .route("/voice", put(handle_set_voice))
        .route("/wake-check", post(handle_wake_check))
        .with_state(state)
}

/// Bind and serve until the process is stopped.
pub async fn serve(state: Arc<AppState>, config: &ServerConfig) -> Result<()> {
    let app = router(state);
    let bind_addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| CarelineError::Config(format!("bind {bind_addr} failed: {e}")))?;

    let addr = listener.local_addr()?;
    info!("listening on http://{addr}");

    axum::serve(listener, app).await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Error translation
// ---------------------------------------------------------------------------

/// JSON error body returned for every failure.
#[derive(Debug, Serialize, Deserialize)]
struct ErrorBody {
    error: String,
}

/// An HTTP-mapped failure. Core errors convert via [`From`]; request-shape
/// problems are built directly with [`ApiError::bad_request`].
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<CarelineError> for ApiError {
    fn from(err: CarelineError) -> Self {
        Self {
            status: status_for(&err),
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                error: self.message,
            }),
        )
            .into_response()
    }
}

/// Map a core error kind to a response status.
fn status_for(err: &CarelineError) -> StatusCode {
    match err {
        CarelineError::NotFound(_) => StatusCode::NOT_FOUND,
        CarelineError::DuplicateId(_) | CarelineError::AmbiguousName { .. } => {
            StatusCode::CONFLICT
        }
        CarelineError::Render(_) => StatusCode::UNPROCESSABLE_ENTITY,
        CarelineError::Generation(_) | CarelineError::Stt(_) | CarelineError::Tts(_) => {
            StatusCode::BAD_GATEWAY
        }
        CarelineError::Config(_) | CarelineError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

// ---------------------------------------------------------------------------
// Request/response bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct HealthBody {
    #[serde(rename = "type")]
    kind: &'static str,
    value: &'static str,
}

#[derive(Debug, Serialize)]
struct TranscriptionBody {
    transcription: String,
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    text: String,
}

#[derive(Debug, Serialize)]
struct ChatReply {
    reply: String,
}

#[derive(Debug, Serialize)]
struct PromptBody {
    profile_id: String,
    text: String,
}

#[derive(Debug, Deserialize)]
struct PromptUpdate {
    text: String,
}

#[derive(Debug, Deserialize)]
struct ActivateRequest {
    profile_id: String,
}

#[derive(Debug, Deserialize)]
struct SynthesizeRequest {
    text: String,
}

#[derive(Debug, Deserialize)]
struct VoiceQuery {
    gender: Option<String>,
    locale: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VoiceSelection {
    name: String,
}

#[derive(Debug, Deserialize)]
struct WakeCheckRequest {
    text: String,
}

#[derive(Debug, Serialize)]
struct WakeCheckBody {
    detected: bool,
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// `GET /health` — liveness probe.
async fn handle_health() -> Json<HealthBody> {
    Json(HealthBody {
        kind: "status",
        value: "ok",
    })
}

/// `POST /process-audio` — transcribe one uploaded utterance.
async fn handle_process_audio(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<TranscriptionBody>> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if !content_type.starts_with("audio/") {
        return Err(ApiError::bad_request("invalid file type"));
    }

    let request_id = Uuid::new_v4();
    debug!(%request_id, bytes = body.len(), "processing audio upload");

    let transcription = state.recognizer.transcribe(&body).await?;
    info!(%request_id, %transcription, "transcribed");
    Ok(Json(TranscriptionBody { transcription }))
}

/// `POST /chat` — one conversational exchange.
async fn handle_chat(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> ApiResult<Json<ChatReply>> {
    let reply = state.session.lock().await.send(&request.text).await?;
    Ok(Json(ChatReply { reply }))
}

/// `GET /profiles` — enumerate id/name pairs.
async fn handle_list_profiles(
    State(state): State<Arc<AppState>>,
) -> Json<Vec<ProfileSummary>> {
    Json(state.profiles.lock().await.ids_and_names())
}

/// `GET /profiles/{id}/prompt` — rendered or cached prompt text.
async fn handle_get_prompt(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<PromptBody>> {
    let text = state.profiles.lock().await.prompt_by_id(&id)?;
    Ok(Json(PromptBody {
        profile_id: id,
        text,
    }))
}

/// `PUT /profiles/{id}/prompt` — overwrite the cached prompt.
async fn handle_put_prompt(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(update): Json<PromptUpdate>,
) -> ApiResult<StatusCode> {
    state
        .profiles
        .lock()
        .await
        .update_prompt_cache(&id, update.text)?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /profiles/by-name/{name}/prompt` — prompt via unique display name.
async fn handle_get_prompt_by_name(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<Json<PromptBody>> {
    let mut profiles = state.profiles.lock().await;
    let id = {
        let ids = profiles.ids_for_name(&name)?;
        if ids.len() > 1 {
            return Err(CarelineError::AmbiguousName {
                name,
                count: ids.len(),
            }
            .into());
        }
        ids.first().cloned()
    };
    let Some(id) = id else {
        return Err(CarelineError::NotFound(name).into());
    };
    let text = profiles.prompt_by_id(&id)?;
    Ok(Json(PromptBody {
        profile_id: id,
        text,
    }))
}

/// `POST /prompt/activate` — make a profile's prompt the session's system
/// prompt. This is the handoff from prompt management to conversation.
async fn handle_activate_prompt(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ActivateRequest>,
) -> ApiResult<StatusCode> {
    let prompt = state
        .profiles
        .lock()
        .await
        .prompt_by_id(&request.profile_id)?;
    state.session.lock().await.set_system_prompt(prompt);
    info!(profile_id = %request.profile_id, "system prompt activated");
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /synthesize` — synthesize reply text to audio.
async fn handle_synthesize(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SynthesizeRequest>,
) -> ApiResult<Response> {
    let audio = state
        .synthesizer
        .lock()
        .await
        .synthesize(&request.text)
        .await?;
    Ok(([(header::CONTENT_TYPE, "audio/wav")], audio).into_response())
}

/// `GET /voices` — list voice short-names, optionally filtered.
async fn handle_list_voices(
    State(state): State<Arc<AppState>>,
    Query(query): Query<VoiceQuery>,
) -> ApiResult<Json<Vec<String>>> {
    let voices = state
        .synthesizer
        .lock()
        .await
        .list_voices(query.gender.as_deref(), query.locale.as_deref())
        .await?;
    Ok(Json(voices))
}

/// `PUT /voice` — select the synthesis voice.
async fn handle_set_voice(
    State(state): State<Arc<AppState>>,
    Json(selection): Json<VoiceSelection>,
) -> StatusCode {
    state.synthesizer.lock().await.set_voice(&selection.name);
    StatusCode::NO_CONTENT
}

/// `POST /wake-check` — run the wake phrase matcher over a transcription.
async fn handle_wake_check(
    State(state): State<Arc<AppState>>,
    Json(request): Json<WakeCheckRequest>,
) -> Json<WakeCheckBody> {
    Json(WakeCheckBody {
        detected: state.wake.matches(&request.text),
    })
}
