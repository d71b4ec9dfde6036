use std::sync::{Arc, Mutex};

use axum::{
    extract::{DefaultBodyLimit, FromRequest, Multipart, Path, Query, Request, State},
    http::{header, Method},
    routing::{get, post},
    Form, Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use shivalik_shared::{PostId, UserId};
use shivalik_store::{
    Comment, Database, FeedPost, LikeToggle, NewUser, PublicProfile, StoreError, UserDetail,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::credentials::CredentialHasher;
use crate::error::ServerError;
use crate::media_store::MediaStore;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Database>>,
    pub media: Arc<MediaStore>,
    pub credentials: Arc<dyn CredentialHasher>,
    pub config: Arc<ServerConfig>,
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    let api = Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/users", get(list_users))
        .route("/users/search", get(search_users))
        .route("/users/:id", get(user_detail))
        .route("/users/:id/friends", get(list_friends))
        .route("/users/:id/send-request", post(send_request))
        .route("/users/:id/accept-request", post(accept_request))
        .route("/users/:id/cancel-request", post(cancel_request))
        .route("/users/:id/upload-pic", post(upload_pic))
        .route("/posts", get(feed).post(create_post))
        .route("/posts/user/:id", get(author_feed))
        .route("/posts/:id/like", post(toggle_like))
        .route("/posts/:id/comment", post(add_comment));

    Router::new()
        .route("/health", get(health_check))
        .route("/media/:id", get(media_download))
        .nest("/api", api)
        .layer(DefaultBodyLimit::max(state.config.max_upload_size))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run `f` against the database on the blocking pool.
async fn with_db<T, F>(state: &AppState, f: F) -> Result<T, ServerError>
where
    F: FnOnce(&mut Database) -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    let db = state.db.clone();
    tokio::task::spawn_blocking(move || {
        let mut guard = db
            .lock()
            .map_err(|_| ServerError::Internal("database mutex poisoned".into()))?;
        f(&mut guard).map_err(ServerError::from)
    })
    .await
    .map_err(|e| ServerError::Internal(format!("blocking task failed: {e}")))?
}

fn parse_user_id(field: &str, raw: Option<&str>) -> Result<UserId, ServerError> {
    let raw = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ServerError::BadRequest(format!("{field} is required")))?;
    UserId::parse(raw).map_err(|_| ServerError::BadRequest(format!("Invalid {field}")))
}

fn parse_post_id(raw: &str) -> Result<PostId, ServerError> {
    PostId::parse(raw.trim()).map_err(|_| ServerError::BadRequest("Invalid post id".into()))
}

fn message(text: &str) -> Json<Value> {
    Json(json!({ "message": text }))
}

// ─── Health & media ───

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn media_download(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Vec<u8>, ServerError> {
    let id = Uuid::parse_str(id.trim()).map_err(|_| ServerError::NotFound("Media"))?;
    state.media.get(id).await
}

// ─── Auth ───

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignupRequest {
    #[serde(default)]
    name: String,
    #[serde(default)]
    class_section: String,
    #[serde(default)]
    password: String,
    image: Option<String>,
}

impl SignupRequest {
    /// Accepts JSON, urlencoded forms and multipart forms with text fields.
    async fn extract(request: Request) -> Result<Self, ServerError> {
        let content_type = request
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_ascii_lowercase();

        if content_type.starts_with("multipart/form-data") {
            let mut multipart = Multipart::from_request(request, &())
                .await
                .map_err(|e| ServerError::BadRequest(format!("Multipart error: {e}")))?;
            let mut req = SignupRequest::default();
            while let Some(field) = multipart
                .next_field()
                .await
                .map_err(|e| ServerError::BadRequest(format!("Multipart error: {e}")))?
            {
                let name = field.name().unwrap_or("").to_string();
                let value = field
                    .text()
                    .await
                    .map_err(|e| ServerError::BadRequest(format!("Failed to read field: {e}")))?;
                match name.as_str() {
                    "name" => req.name = value,
                    "classSection" => req.class_section = value,
                    "password" => req.password = value,
                    "image" => req.image = Some(value),
                    _ => {}
                }
            }
            Ok(req)
        } else if content_type.starts_with("application/x-www-form-urlencoded") {
            let Form(req) = Form::<SignupRequest>::from_request(request, &())
                .await
                .map_err(|e| ServerError::BadRequest(e.body_text()))?;
            Ok(req)
        } else {
            let Json(req) = Json::<SignupRequest>::from_request(request, &())
                .await
                .map_err(|e| ServerError::BadRequest(e.body_text()))?;
            Ok(req)
        }
    }
}

/// Run a credential operation on the blocking pool; argon2 is CPU-bound.
async fn with_credentials<T, F>(state: &AppState, f: F) -> Result<T, ServerError>
where
    F: FnOnce(&dyn CredentialHasher) -> Result<T, ServerError> + Send + 'static,
    T: Send + 'static,
{
    let hasher = state.credentials.clone();
    tokio::task::spawn_blocking(move || f(hasher.as_ref()))
        .await
        .map_err(|e| ServerError::Internal(format!("blocking task failed: {e}")))?
}

async fn signup(
    State(state): State<AppState>,
    request: Request,
) -> Result<Json<Value>, ServerError> {
    let req = SignupRequest::extract(request).await?;
    if req.password.trim().is_empty() {
        return Err(ServerError::BadRequest("password is required".into()));
    }
    let password = req.password.clone();
    let credential = with_credentials(&state, move |h| h.hash(&password)).await?;

    let created = with_db(&state, move |db| {
        db.create_user(NewUser {
            name: &req.name,
            class_section: &req.class_section,
            password: &credential,
            profile_pic: req.image.as_deref(),
        })
    })
    .await?;

    info!(user = %created.id.short(), "signup");
    Ok(message("Signup successful"))
}

#[derive(Deserialize)]
struct LoginRequest {
    #[serde(default)]
    name: String,
    #[serde(default)]
    password: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    message: &'static str,
    user_id: UserId,
}

async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ServerError> {
    let name = req.name.clone();
    let user = with_db(&state, move |db| db.find_user_by_name(&name))
        .await
        .map_err(|e| match e {
            ServerError::Store(StoreError::NotFound(_)) => {
                ServerError::BadRequest("User not found".into())
            }
            other => other,
        })?;

    let stored = user.password.clone();
    let matches = with_credentials(&state, move |h| Ok(h.verify(&req.password, &stored))).await?;
    if !matches {
        return Err(ServerError::BadRequest("Incorrect password".into()));
    }

    Ok(Json(LoginResponse {
        message: "Login successful",
        user_id: user.id,
    }))
}

// ─── Users ───

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchQuery {
    name: Option<String>,
    class_section: Option<String>,
}

async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<PublicProfile>>, ServerError> {
    Ok(Json(with_db(&state, |db| db.list_users()).await?))
}

async fn search_users(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<PublicProfile>>, ServerError> {
    let results = with_db(&state, move |db| {
        db.search_users(query.name.as_deref(), query.class_section.as_deref())
    })
    .await?;
    Ok(Json(results))
}

async fn user_detail(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<UserDetail>, ServerError> {
    let id = parse_user_id("user id", Some(&id))?;
    Ok(Json(with_db(&state, move |db| db.user_detail(id)).await?))
}

async fn list_friends(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<PublicProfile>>, ServerError> {
    let id = parse_user_id("user id", Some(&id))?;
    Ok(Json(with_db(&state, move |db| db.list_friends(id)).await?))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendRequestBody {
    sender_id: Option<String>,
}

async fn send_request(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<SendRequestBody>,
) -> Result<Json<Value>, ServerError> {
    let receiver = parse_user_id("user id", Some(&id))?;
    let sender = parse_user_id("senderId", body.sender_id.as_deref())?;
    with_db(&state, move |db| db.send_request(sender, receiver)).await?;
    Ok(message("Friend request sent!"))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AcceptRequestBody {
    receiver_id: Option<String>,
}

async fn accept_request(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<AcceptRequestBody>,
) -> Result<Json<Value>, ServerError> {
    let sender = parse_user_id("user id", Some(&id))?;
    let receiver = parse_user_id("receiverId", body.receiver_id.as_deref())?;
    with_db(&state, move |db| db.accept_request(sender, receiver)).await?;
    Ok(message("Friend request accepted!"))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserIdBody {
    user_id: Option<String>,
}

async fn cancel_request(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<UserIdBody>,
) -> Result<Json<Value>, ServerError> {
    let other = parse_user_id("user id", Some(&id))?;
    let requester = parse_user_id("userId", body.user_id.as_deref())?;
    with_db(&state, move |db| db.cancel_request(requester, other)).await?;
    Ok(message("Friend request removed."))
}

async fn upload_pic(
    State(state): State<AppState>,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<Value>, ServerError> {
    let id = parse_user_id("user id", Some(&id))?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Multipart error: {e}")))?
    {
        if field.name() != Some("image") {
            continue;
        }
        let data = field
            .bytes()
            .await
            .map_err(|e| ServerError::BadRequest(format!("Failed to read field: {e}")))?;

        let media_id = state.media.store(&data).await?;
        let uri = state.media.uri_for(media_id);
        let user = match with_db(&state, move |db| db.update_profile_pic(id, &uri)).await {
            Ok(user) => user,
            Err(e) => {
                // Nothing references the file yet.
                if let Err(cleanup) = state.media.remove(media_id).await {
                    warn!(media = %media_id, error = %cleanup, "failed to remove orphaned upload");
                }
                return Err(e);
            }
        };

        info!(user = %id.short(), size = data.len(), "profile picture uploaded");
        return Ok(Json(json!({
            "message": "Profile picture uploaded successfully!",
            "profilePic": user.profile_pic,
        })));
    }

    Err(ServerError::BadRequest(
        "Missing 'image' field in multipart form".to_string(),
    ))
}

// ─── Posts ───

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatePostRequest {
    author_id: Option<String>,
    #[serde(default)]
    content: String,
}

async fn create_post(
    State(state): State<AppState>,
    Json(req): Json<CreatePostRequest>,
) -> Result<Json<Value>, ServerError> {
    let author = parse_user_id("authorId", req.author_id.as_deref())?;
    with_db(&state, move |db| db.create_post(author, &req.content)).await?;
    Ok(message("Post created successfully"))
}

async fn feed(State(state): State<AppState>) -> Result<Json<Vec<FeedPost>>, ServerError> {
    let feed = with_db(&state, |db| db.feed()).await?;
    Ok(Json(feed.into_posts()))
}

async fn author_feed(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<FeedPost>>, ServerError> {
    let author = parse_user_id("user id", Some(&id))?;
    let feed = with_db(&state, move |db| db.author_feed(author)).await?;
    Ok(Json(feed.into_posts()))
}

async fn toggle_like(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<UserIdBody>,
) -> Result<Json<LikeToggle>, ServerError> {
    let post = parse_post_id(&id)?;
    let user = parse_user_id("userId", body.user_id.as_deref())?;
    Ok(Json(with_db(&state, move |db| db.toggle_like(post, user)).await?))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommentRequest {
    user_id: Option<String>,
    #[serde(default)]
    text: String,
}

async fn add_comment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<CommentRequest>,
) -> Result<Json<Vec<Comment>>, ServerError> {
    let post = parse_post_id(&id)?;
    let user = parse_user_id("userId", req.user_id.as_deref())?;
    let comments = with_db(&state, move |db| db.add_comment(post, user, &req.text)).await?;
    Ok(Json(comments))
}

pub async fn serve(
    state: AppState,
    addr: std::net::SocketAddr,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
