//! Single binary server: tournament API via REST, live matches via WebSocket.
//! Run with: cargo run --bin web
//! Listens on 0.0.0.0:8080 by default. Override with env: HOST, PORT.
//! STATIC_DIR, when set, is served under /static. Engine tuning is read from the
//! environment as well (see `EngineConfig::from_env`).

use actix_files::Files;
use actix_session::{storage::CookieSessionStore, Session, SessionMiddleware};
use actix_web::{
    cookie::Key as CookieKey,
    get, post, put,
    web::{self, Data, Json, Path},
    App, HttpRequest, HttpResponse, HttpServer, Responder,
};
use actix_ws::Message;
use match_arena::{
    export, transport, EngineConfig, EngineError, ErrorKind, Hub, MatchId, Outcome, PlayerId,
    Profile, TournamentConfig, TournamentId,
};
use serde::Deserialize;
use std::time::Duration;
use uuid::Uuid;

type AppState = Data<Hub>;

/// Finished tournaments older than this are dropped from memory.
const RETENTION: Duration = Duration::from_secs(12 * 3600);

const PROFILE_KEY: &str = "profile";

#[derive(serde::Serialize)]
struct HealthResponse {
    ok: bool,
    service: &'static str,
}

#[derive(Deserialize)]
struct IdentifyBody {
    username: String,
    #[serde(default)]
    id: Option<PlayerId>,
}

#[derive(Deserialize, Default)]
struct StartBody {
    #[serde(default)]
    force: bool,
}

#[derive(Deserialize, Default)]
struct AbortBody {
    #[serde(default = "default_abort_reason")]
    reason: String,
}

fn default_abort_reason() -> String {
    "aborted by operator".to_string()
}

#[derive(Deserialize)]
struct ReadyBody {
    ready: bool,
}

#[derive(Deserialize)]
struct ResultBody {
    outcome: Outcome,
}

/// Path segment: tournament id (e.g. /api/tournaments/{id})
#[derive(Deserialize)]
struct TournamentPath {
    id: TournamentId,
}

/// Path segments: tournament id and player id (e.g. /api/tournaments/{id}/players/{player_id})
#[derive(Deserialize)]
struct TournamentPlayerPath {
    id: TournamentId,
    player_id: PlayerId,
}

#[derive(Deserialize)]
struct TournamentMatchPath {
    id: TournamentId,
    match_id: MatchId,
}

fn error_response(err: &EngineError) -> HttpResponse {
    let body = serde_json::json!({ "error": err.to_string(), "code": err.kind() });
    match err.kind() {
        ErrorKind::NotFound => HttpResponse::NotFound().json(body),
        ErrorKind::Unauthorized => HttpResponse::Forbidden().json(body),
        ErrorKind::InvalidState => HttpResponse::Conflict().json(body),
        ErrorKind::Malformed => HttpResponse::BadRequest().json(body),
        ErrorKind::Internal => HttpResponse::InternalServerError().json(body),
    }
}

fn no_tournament() -> HttpResponse {
    HttpResponse::NotFound().json(serde_json::json!({ "error": "No tournament" }))
}

/// Reply with the latest snapshot after a successful command.
fn snapshot_or_error(
    state: &AppState,
    id: TournamentId,
    result: Result<(), EngineError>,
) -> HttpResponse {
    match result {
        Ok(()) => match state.tournament(id) {
            Some(t) => HttpResponse::Ok().json(t),
            None => no_tournament(),
        },
        Err(e) => error_response(&e),
    }
}

fn current_profile(session: &Session) -> Option<Profile> {
    match session.get::<Profile>(PROFILE_KEY) {
        Ok(profile) => profile,
        Err(err) => {
            log::warn!("Unreadable session cookie: {err}");
            None
        }
    }
}

#[get("/api/health")]
async fn api_health() -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        ok: true,
        service: "match-arena",
    })
}

/// Avoid 404 in browser tab: favicon not required for app logic.
#[get("/favicon.ico")]
async fn favicon() -> HttpResponse {
    HttpResponse::NoContent().finish()
}

/// Remember who is acting for this browser. Stands in for a real profile lookup.
#[post("/api/identify")]
async fn api_identify(session: Session, body: Json<IdentifyBody>) -> HttpResponse {
    let username = body.username.trim();
    if username.is_empty() {
        return HttpResponse::BadRequest().json(serde_json::json!({ "error": "Username required" }));
    }
    let profile = Profile::new(body.id.unwrap_or_else(Uuid::new_v4), username);
    match session.insert(PROFILE_KEY, &profile) {
        Ok(()) => HttpResponse::Ok().json(profile),
        Err(e) => HttpResponse::InternalServerError()
            .json(serde_json::json!({ "error": e.to_string() })),
    }
}

/// Create a tournament from its participants (returns it with id and the opening bracket).
#[post("/api/tournaments")]
async fn api_create_tournament(state: AppState, body: Json<TournamentConfig>) -> HttpResponse {
    match state.create_tournament(body.into_inner()) {
        Ok(t) => HttpResponse::Ok().json(t),
        Err(e) => error_response(&e),
    }
}

#[get("/api/tournaments/{id}")]
async fn api_get_tournament(state: AppState, path: Path<TournamentPath>) -> HttpResponse {
    match state.tournament(path.id) {
        Some(t) => HttpResponse::Ok().json(t),
        None => no_tournament(),
    }
}

/// Start the tournament (Pending -> Ongoing); `force` skips the readiness check.
#[post("/api/tournaments/{id}/start")]
async fn api_start_tournament(
    state: AppState,
    path: Path<TournamentPath>,
    body: Option<Json<StartBody>>,
) -> HttpResponse {
    let force = body.map(|b| b.force).unwrap_or_default();
    let result = state.start_tournament(path.id, force).await;
    snapshot_or_error(&state, path.id, result)
}

#[post("/api/tournaments/{id}/abort")]
async fn api_abort_tournament(
    state: AppState,
    path: Path<TournamentPath>,
    body: Option<Json<AbortBody>>,
) -> HttpResponse {
    let reason = body
        .map(|b| b.into_inner().reason)
        .unwrap_or_else(default_abort_reason);
    let result = state.abort_tournament(path.id, reason).await;
    snapshot_or_error(&state, path.id, result)
}

#[put("/api/tournaments/{id}/players/{player_id}/ready")]
async fn api_set_ready(
    state: AppState,
    path: Path<TournamentPlayerPath>,
    body: Json<ReadyBody>,
) -> HttpResponse {
    let result = state.set_ready(path.id, path.player_id, body.ready).await;
    snapshot_or_error(&state, path.id, result)
}

/// Operator-reported result of a running match.
#[put("/api/tournaments/{id}/matches/{match_id}/result")]
async fn api_report_result(
    state: AppState,
    path: Path<TournamentMatchPath>,
    body: Json<ResultBody>,
) -> HttpResponse {
    let result = state.report_result(path.id, path.match_id, body.outcome).await;
    snapshot_or_error(&state, path.id, result)
}

#[get("/api/tournaments/{id}/standings")]
async fn api_standings(state: AppState, path: Path<TournamentPath>) -> HttpResponse {
    match state.standings(path.id) {
        Some(rows) => HttpResponse::Ok().json(rows),
        None => no_tournament(),
    }
}

#[get("/api/tournaments/{id}/standings.csv")]
async fn api_standings_csv(state: AppState, path: Path<TournamentPath>) -> HttpResponse {
    let Some(rows) = state.standings(path.id) else {
        return no_tournament();
    };
    match export::standings_csv(&rows) {
        Ok(body) => HttpResponse::Ok()
            .content_type("text/csv; charset=utf-8")
            .body(body),
        Err(e) => HttpResponse::InternalServerError()
            .json(serde_json::json!({ "error": e.to_string() })),
    }
}

/// Duplex channel for the identified profile: ClientMessage JSON in, ServerMessage JSON out.
#[get("/ws")]
async fn ws(
    req: HttpRequest,
    body: web::Payload,
    state: AppState,
    session: Session,
) -> Result<HttpResponse, actix_web::Error> {
    let Some(profile) = current_profile(&session) else {
        return Ok(HttpResponse::Unauthorized()
            .json(serde_json::json!({ "error": "Identify first" })));
    };
    let (response, mut ws_session, mut stream) = actix_ws::handle(&req, body)?;
    let (mut connection, mut outbound) = state.connect(profile);

    let mut writer = ws_session.clone();
    actix_web::rt::spawn(async move {
        while let Some(message) = outbound.recv().await {
            let text = match transport::encode(&message) {
                Ok(text) => text,
                Err(err) => {
                    log::error!("Could not encode outbound message: {err}");
                    continue;
                }
            };
            if writer.text(text).await.is_err() {
                break;
            }
        }
    });

    actix_web::rt::spawn(async move {
        while let Some(frame) = stream.recv().await {
            match frame {
                Ok(Message::Text(text)) => connection.handle_text(&text).await,
                Ok(Message::Ping(bytes)) => {
                    if ws_session.pong(&bytes).await.is_err() {
                        break;
                    }
                }
                Ok(Message::Close(reason)) => {
                    let _ = ws_session.close(reason).await;
                    return;
                }
                Ok(_) => {}
                Err(err) => {
                    log::warn!(
                        "WebSocket protocol error from {}: {err}",
                        connection.profile().username
                    );
                    break;
                }
            }
        }
        let _ = ws_session.close(None).await;
    });

    Ok(response)
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let host = std::env::var("HOST").unwrap_or_else(|_| default_host());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or_else(default_port);
    let static_dir = std::env::var("STATIC_DIR").ok();
    let bind = (host.as_str(), port);
    log::info!("Starting server at http://{}:{}", bind.0, bind.1);

    let config = EngineConfig::from_env();
    log::info!(
        "Engine: tick {:?}, grace {:?}, join timeout {:?}, {} point(s) to win",
        config.tick_interval(),
        config.grace_period,
        config.join_timeout,
        config.simulation.points_to_win
    );
    let state = Data::new(Hub::new(config));
    let cookie_key = CookieKey::generate();

    // Background task: every 30 minutes, drop tournaments that finished 12+ hours ago
    let state_cleanup = state.clone();
    actix_web::rt::spawn(async move {
        let mut interval = actix_web::rt::time::interval(Duration::from_secs(30 * 60));
        loop {
            interval.tick().await;
            let removed = state_cleanup.prune_finished(RETENTION);
            if removed > 0 {
                log::info!("Cleaned up {} finished tournament(s) (older than 12h)", removed);
            }
        }
    });

    HttpServer::new(move || {
        let static_dir = static_dir.clone();
        App::new()
            .app_data(state.clone())
            .wrap(
                SessionMiddleware::builder(CookieSessionStore::default(), cookie_key.clone())
                    .cookie_secure(false)
                    .build(),
            )
            .service(api_health)
            .service(favicon)
            .service(api_identify)
            .service(api_create_tournament)
            .service(api_get_tournament)
            .service(api_start_tournament)
            .service(api_abort_tournament)
            .service(api_set_ready)
            .service(api_report_result)
            .service(api_standings_csv)
            .service(api_standings)
            .service(ws)
            .configure(move |cfg| {
                if let Some(dir) = static_dir {
                    cfg.service(Files::new("/static", dir).index_file("index.html"));
                }
            })
    })
    .bind(bind)?
    .run()
    .await
}
