//! HTTP API server: axum router and request handlers.
//!
//! The server runs on the tokio async runtime while the show runs on a
//! plain `std::thread`. Everything that changes the floor goes through a
//! [`ShowCommand`] on a `std::sync::mpsc` channel. Live requests skip the
//! control loop's command queue and go straight to the [`LiveFeedHandle`].
//!
//! ## Rust concepts
//! - `async fn` and `.await` for non-blocking I/O
//! - axum extractors: `State`, `Json`
//! - `Arc` for sharing state across async tasks
//! - Serde `Deserialize` for parsing JSON request bodies
//! - `tower-http` middleware for CORS and request tracing

use crate::catalog::Catalog;
use crate::error::FloorError;
use crate::input::{Button, InputEvent};
use crate::live::{LiveFeedHandle, MentionOutcome, MentionRouter};
use crate::playlist::PlaybackState;
use crate::show::{ShowCommand, ShowStatus, lock_status};
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post};
use serde::{Deserialize, Serialize};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

// ── App State ────────────────────────────────────────────────────────

/// Shared application state, passed to every handler via axum's `State` extractor.
///
/// Rust concept: CLONE for Arc
/// axum clones the state for each request handler, so everything inside
/// must be cheap to clone. The catalog and the feed handle are both
/// `Arc`-backed underneath.
#[derive(Clone)]
pub struct AppState {
    /// Channel to send commands to the show thread
    pub command_tx: Sender<ShowCommand>,
    /// Shared show status (show thread writes, handlers read)
    pub status: Arc<Mutex<ShowStatus>>,
    /// Effects the floor can build
    pub catalog: Catalog,
    /// Sender side of the live playlist, when live requests are enabled
    pub live: Option<LiveFeedHandle>,
    /// Keyword matcher for mentions; present whenever `live` is
    pub mentions: Option<MentionRouter>,
}

// ── OpenAPI Documentation ────────────────────────────────────────────

#[derive(OpenApi)]
#[openapi(
    paths(
        get_status,
        get_effects,
        post_select_effect,
        post_select_playlist,
        post_input,
        post_brightness,
        post_request,
        post_mention,
    ),
    components(schemas(
        ShowStatus,
        PlaybackState,
        InputEvent,
        Button,
        SelectEffectRequest,
        SelectPlaylistRequest,
        BrightnessRequest,
        LiveRequest,
        MentionRequest,
        MentionReply,
    )),
    tags(
        (name = "show", description = "Effect and playlist selection"),
        (name = "live", description = "Live requests from the audience"),
        (name = "system", description = "System status endpoints"),
    ),
    info(
        title = "LED Dance Floor API",
        version = env!("CARGO_PKG_VERSION"),
        description = "HTTP API for driving an interactive LED dance floor"
    )
)]
pub struct ApiDoc;

// ── Request/Response types ───────────────────────────────────────────

#[derive(Deserialize, utoipa::ToSchema)]
pub struct SelectEffectRequest {
    /// Effect name. Use GET /api/v1/effects to list them.
    #[schema(example = "Rainbow")]
    name: String,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct SelectPlaylistRequest {
    /// Playlist index; 0 is the all-effects playlist
    #[schema(example = 1)]
    index: usize,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct BrightnessRequest {
    /// Brightness level (0-100)
    #[schema(example = 75, minimum = 0, maximum = 100)]
    value: u8,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct LiveRequest {
    #[schema(example = "DiscoFloor")]
    effect: String,
    /// Who asked; shown in the acknowledgement
    #[schema(example = "dancer42")]
    requested_by: String,
    /// Seconds to run for
    #[schema(example = 6, default = 6)]
    duration: Option<i64>,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct MentionRequest {
    #[schema(example = "dancer42")]
    author: String,
    #[schema(example = "@LED_Dance_Floor show me a rainbow please")]
    text: String,
}

#[derive(Debug, PartialEq, Serialize, utoipa::ToSchema)]
pub struct MentionReply {
    /// Text to send back to the author, absent for our own messages
    reply: Option<String>,
    /// Effect queued, if any
    effect: Option<String>,
}

// ── Router ───────────────────────────────────────────────────────────

/// Build the axum router with all API endpoints.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(
            SwaggerUi::new("/docs")
                .url("/api-docs/openapi.json", ApiDoc::openapi())
                .config(utoipa_swagger_ui::Config::new(["/api-docs/openapi.json"]).validator_url("none")),
        )
        .route("/api/v1/status", get(get_status))
        .route("/api/v1/effects", get(get_effects))
        .route("/api/v1/select/effect", post(post_select_effect))
        .route("/api/v1/select/playlist", post(post_select_playlist))
        .route("/api/v1/input", post(post_input))
        .route("/api/v1/brightness", post(post_brightness))
        .route("/api/v1/requests", post(post_request))
        .route("/api/v1/mentions", post(post_mention))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn send_command(state: &AppState, command: ShowCommand) -> Result<(), (StatusCode, String)> {
    state.command_tx.send(command).map_err(|_| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Show thread gone".to_string(),
        )
    })
}

/// Map a live-feed failure onto a response.
fn feed_error(err: FloorError) -> (StatusCode, String) {
    match err {
        FloorError::UnknownEffect(name) => {
            (StatusCode::NOT_FOUND, format!("Unknown effect: {name}"))
        }
        FloorError::FeedClosed => (
            StatusCode::SERVICE_UNAVAILABLE,
            "Live feed is closed".to_string(),
        ),
        other => (StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
    }
}

fn live_disabled() -> (StatusCode, String) {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        "Live requests are disabled".to_string(),
    )
}

// ── Handlers ─────────────────────────────────────────────────────────

/// GET /api/v1/status: return the current show state
#[utoipa::path(
    get,
    path = "/api/v1/status",
    tag = "system",
    responses(
        (status = 200, description = "Current show status", body = ShowStatus)
    )
)]
async fn get_status(State(state): State<AppState>) -> Json<ShowStatus> {
    let status = lock_status(&state.status).clone();
    Json(status)
}

/// GET /api/v1/effects: list effect names
#[utoipa::path(
    get,
    path = "/api/v1/effects",
    tag = "show",
    responses(
        (status = 200, description = "Effect names, sorted", body = Vec<String>)
    )
)]
async fn get_effects(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.catalog.names())
}

/// POST /api/v1/select/effect: run one effect indefinitely
#[utoipa::path(
    post,
    path = "/api/v1/select/effect",
    tag = "show",
    request_body = SelectEffectRequest,
    responses(
        (status = 200, description = "Effect selected"),
        (status = 404, description = "Effect not found")
    )
)]
async fn post_select_effect(
    State(state): State<AppState>,
    Json(req): Json<SelectEffectRequest>,
) -> Result<StatusCode, (StatusCode, String)> {
    if !state.catalog.contains(&req.name) {
        return Err((
            StatusCode::NOT_FOUND,
            format!("Unknown effect: {}", req.name),
        ));
    }

    send_command(&state, ShowCommand::SelectEffect(req.name))?;
    Ok(StatusCode::OK)
}

/// POST /api/v1/select/playlist: start a playlist from the top
#[utoipa::path(
    post,
    path = "/api/v1/select/playlist",
    tag = "show",
    request_body = SelectPlaylistRequest,
    responses(
        (status = 200, description = "Playlist selection queued"),
    )
)]
async fn post_select_playlist(
    State(state): State<AppState>,
    Json(req): Json<SelectPlaylistRequest>,
) -> Result<StatusCode, (StatusCode, String)> {
    send_command(&state, ShowCommand::SelectPlaylist(req.index))?;
    Ok(StatusCode::OK)
}

/// POST /api/v1/input: inject a controller event
#[utoipa::path(
    post,
    path = "/api/v1/input",
    tag = "show",
    request_body = InputEvent,
    responses(
        (status = 200, description = "Event queued"),
    )
)]
async fn post_input(
    State(state): State<AppState>,
    Json(event): Json<InputEvent>,
) -> Result<StatusCode, (StatusCode, String)> {
    send_command(&state, ShowCommand::Input(event))?;
    Ok(StatusCode::OK)
}

/// POST /api/v1/brightness: set output brightness (0-100)
#[utoipa::path(
    post,
    path = "/api/v1/brightness",
    tag = "show",
    request_body = BrightnessRequest,
    responses(
        (status = 200, description = "Brightness updated"),
        (status = 400, description = "Value above 100")
    )
)]
async fn post_brightness(
    State(state): State<AppState>,
    Json(req): Json<BrightnessRequest>,
) -> Result<StatusCode, (StatusCode, String)> {
    if req.value > 100 {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("Brightness must be 0-100, got {}", req.value),
        ));
    }

    send_command(&state, ShowCommand::SetBrightness(req.value))?;
    Ok(StatusCode::OK)
}

/// POST /api/v1/requests: queue an effect on the live playlist
#[utoipa::path(
    post,
    path = "/api/v1/requests",
    tag = "live",
    request_body = LiveRequest,
    responses(
        (status = 202, description = "Request queued"),
        (status = 404, description = "Effect not found"),
        (status = 503, description = "Live requests are disabled")
    )
)]
async fn post_request(
    State(state): State<AppState>,
    Json(req): Json<LiveRequest>,
) -> Result<StatusCode, (StatusCode, String)> {
    let live = state.live.as_ref().ok_or_else(live_disabled)?;
    live.add_entry(&req.effect, &req.requested_by, req.duration)
        .map_err(feed_error)?;
    Ok(StatusCode::ACCEPTED)
}

/// POST /api/v1/mentions: turn a free-text mention into a live request
#[utoipa::path(
    post,
    path = "/api/v1/mentions",
    tag = "live",
    request_body = MentionRequest,
    responses(
        (status = 200, description = "Reply for the author", body = MentionReply),
        (status = 503, description = "Live requests are disabled")
    )
)]
async fn post_mention(
    State(state): State<AppState>,
    Json(req): Json<MentionRequest>,
) -> Result<Json<MentionReply>, (StatusCode, String)> {
    let (Some(live), Some(router)) = (state.live.as_ref(), state.mentions.as_ref()) else {
        return Err(live_disabled());
    };

    let reply = match router.route(&req.author, &req.text) {
        MentionOutcome::Ignored => MentionReply {
            reply: None,
            effect: None,
        },
        MentionOutcome::Unrecognised { reply } => {
            tracing::info!("Nothing recognised in mention from {}", req.author);
            MentionReply {
                reply: Some(reply),
                effect: None,
            }
        }
        MentionOutcome::Requested { effect, reply, .. } => {
            live.add_entry(&effect, &req.author, None)
                .map_err(feed_error)?;
            MentionReply {
                reply: Some(reply),
                effect: Some(effect),
            }
        }
    };

    Ok(Json(reply))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FloorSize;
    use crate::effects::builtin_catalog;
    use crate::live::{LiveFeed, LogAcknowledger};
    use crate::playlist::Playlist;
    use pretty_assertions::assert_eq;
    use std::sync::mpsc::{self, Receiver};

    struct Harness {
        state: AppState,
        commands: Receiver<ShowCommand>,
        // Holds the inbox open; dropping it closes the feed.
        live_playlist: Option<Playlist>,
    }

    fn harness(live: bool) -> Harness {
        let catalog = builtin_catalog();
        let (tx, rx) = mpsc::channel();
        let (live_playlist, handle) = if live {
            let feed = LiveFeed::new(
                catalog.clone(),
                "DiscoFloor",
                FloorSize::new(4, 6),
                Box::new(LogAcknowledger),
            )
            .unwrap();
            let (playlist, handle) = feed.into_parts();
            (Some(playlist), Some(handle))
        } else {
            (None, None)
        };

        Harness {
            state: AppState {
                command_tx: tx,
                status: Arc::new(Mutex::new(ShowStatus::new())),
                catalog,
                mentions: handle.as_ref().map(|_| MentionRouter::new("LED_Dance_Floor")),
                live: handle,
            },
            commands: rx,
            live_playlist,
        }
    }

    fn queued(playlist: &mut Playlist) -> Vec<String> {
        playlist.get_current(0);
        playlist.entries().iter().map(|e| e.name().to_string()).collect()
    }

    #[tokio::test]
    async fn status_reports_snapshot() {
        let h = harness(false);
        lock_status(&h.state.status).announce("hello");

        let Json(status) = get_status(State(h.state.clone())).await;
        assert_eq!(status.announcements, vec!["hello".to_string()]);
        assert_eq!(status.version, env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn effects_lists_catalog_names() {
        let h = harness(false);
        let Json(names) = get_effects(State(h.state.clone())).await;
        assert_eq!(names, vec!["DiscoFloor", "Rainbow", "SolidColour"]);
    }

    #[tokio::test]
    async fn select_effect_forwards_known_names() {
        let h = harness(false);
        let req = SelectEffectRequest {
            name: "Rainbow".to_string(),
        };
        let code = post_select_effect(State(h.state.clone()), Json(req)).await.unwrap();

        assert_eq!(code, StatusCode::OK);
        assert!(matches!(
            h.commands.try_recv(),
            Ok(ShowCommand::SelectEffect(name)) if name == "Rainbow"
        ));
    }

    #[tokio::test]
    async fn select_effect_rejects_unknown_names() {
        let h = harness(false);
        let req = SelectEffectRequest {
            name: "Strobe".to_string(),
        };
        let (code, _) = post_select_effect(State(h.state.clone()), Json(req))
            .await
            .unwrap_err();

        assert_eq!(code, StatusCode::NOT_FOUND);
        assert!(h.commands.try_recv().is_err());
    }

    #[tokio::test]
    async fn input_is_forwarded() {
        let h = harness(false);
        let event = InputEvent::button_down(0, Button::Select);
        post_input(State(h.state.clone()), Json(event)).await.unwrap();

        assert!(matches!(
            h.commands.try_recv(),
            Ok(ShowCommand::Input(e)) if e == event
        ));
    }

    #[tokio::test]
    async fn brightness_above_hundred_is_rejected() {
        let h = harness(false);
        let (code, _) = post_brightness(State(h.state.clone()), Json(BrightnessRequest { value: 101 }))
            .await
            .unwrap_err();
        assert_eq!(code, StatusCode::BAD_REQUEST);

        post_brightness(State(h.state.clone()), Json(BrightnessRequest { value: 40 }))
            .await
            .unwrap();
        assert!(matches!(h.commands.try_recv(), Ok(ShowCommand::SetBrightness(40))));
    }

    #[tokio::test]
    async fn closed_show_thread_is_a_server_error() {
        let h = harness(false);
        drop(h.commands);
        let (code, _) = post_select_playlist(State(h.state.clone()), Json(SelectPlaylistRequest { index: 1 }))
            .await
            .unwrap_err();
        assert_eq!(code, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn requests_need_the_live_feed() {
        let h = harness(false);
        let req = LiveRequest {
            effect: "Rainbow".to_string(),
            requested_by: "dancer".to_string(),
            duration: None,
        };
        let (code, _) = post_request(State(h.state.clone()), Json(req)).await.unwrap_err();
        assert_eq!(code, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn request_lands_on_live_playlist() {
        let mut h = harness(true);
        let req = LiveRequest {
            effect: "Rainbow".to_string(),
            requested_by: "dancer".to_string(),
            duration: Some(3),
        };
        let code = post_request(State(h.state.clone()), Json(req)).await.unwrap();
        assert_eq!(code, StatusCode::ACCEPTED);

        let playlist = h.live_playlist.as_mut().unwrap();
        assert_eq!(queued(playlist), vec!["DiscoFloor", "Rainbow"]);
        assert_eq!(playlist.entry(1).unwrap().duration_ms(), 3000);
    }

    #[tokio::test]
    async fn request_for_unknown_effect_is_not_found() {
        let mut h = harness(true);
        let req = LiveRequest {
            effect: "Strobe".to_string(),
            requested_by: "dancer".to_string(),
            duration: None,
        };
        let (code, _) = post_request(State(h.state.clone()), Json(req)).await.unwrap_err();

        assert_eq!(code, StatusCode::NOT_FOUND);
        assert_eq!(queued(h.live_playlist.as_mut().unwrap()), vec!["DiscoFloor"]);
    }

    #[tokio::test]
    async fn request_after_feed_closed_is_unavailable() {
        let mut h = harness(true);
        h.live_playlist.take();
        let req = LiveRequest {
            effect: "Rainbow".to_string(),
            requested_by: "dancer".to_string(),
            duration: None,
        };
        let (code, _) = post_request(State(h.state.clone()), Json(req)).await.unwrap_err();
        assert_eq!(code, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn mention_queues_matching_effect() {
        let mut h = harness(true);
        let req = MentionRequest {
            author: "dancer".to_string(),
            text: "@LED_Dance_Floor RAINBOW time".to_string(),
        };
        let Json(reply) = post_mention(State(h.state.clone()), Json(req)).await.unwrap();

        assert_eq!(
            reply,
            MentionReply {
                reply: Some(
                    "@dancer - Thank you for your interest, I'll be sure to pass on your request for rainbow"
                        .to_string()
                ),
                effect: Some("Rainbow".to_string()),
            }
        );
        assert_eq!(queued(h.live_playlist.as_mut().unwrap()), vec!["DiscoFloor", "Rainbow"]);
    }

    #[tokio::test]
    async fn own_mentions_get_no_reply() {
        let mut h = harness(true);
        let req = MentionRequest {
            author: "@led_dance_floor".to_string(),
            text: "disco".to_string(),
        };
        let Json(reply) = post_mention(State(h.state.clone()), Json(req)).await.unwrap();

        assert_eq!(reply, MentionReply { reply: None, effect: None });
        assert_eq!(queued(h.live_playlist.as_mut().unwrap()), vec!["DiscoFloor"]);
    }

    #[tokio::test]
    async fn unrecognised_mention_gets_apology() {
        let h = harness(true);
        let req = MentionRequest {
            author: "dancer".to_string(),
            text: "do a backflip".to_string(),
        };
        let Json(reply) = post_mention(State(h.state.clone()), Json(req)).await.unwrap();

        assert_eq!(reply.effect, None);
        assert_eq!(
            reply.reply.as_deref(),
            Some("@dancer - Sorry, I can't work out what you wanted to display")
        );
    }

    #[tokio::test]
    async fn mentions_need_the_live_feed() {
        let h = harness(false);
        let req = MentionRequest {
            author: "dancer".to_string(),
            text: "disco".to_string(),
        };
        let (code, _) = post_mention(State(h.state.clone()), Json(req)).await.unwrap_err();
        assert_eq!(code, StatusCode::SERVICE_UNAVAILABLE);
    }
}
