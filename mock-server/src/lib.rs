//! Mock API server used by the client integration tests.
//!
//! A small token-authenticated notes service: `POST /login` trades
//! credentials for a bearer token, the `/notes` routes require it, and
//! `GET /plain` answers with a non-JSON body so clients can exercise their
//! decode-failure path. Error responses carry a JSON `{"error": ...}` body.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

/// The only password `POST /login` accepts.
pub const PASSWORD: &str = "opensesame";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Note {
    pub id: Uuid,
    pub title: String,
    pub body: String,
}

#[derive(Deserialize)]
pub struct CreateNote {
    pub title: String,
    #[serde(default)]
    pub body: String,
}

#[derive(Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Default)]
pub struct ApiState {
    tokens: HashSet<String>,
    notes: HashMap<Uuid, Note>,
}

pub type Db = Arc<RwLock<ApiState>>;

pub fn app() -> Router {
    let db = Db::default();
    Router::new()
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/notes", get(list_notes).post(create_note))
        .route("/notes/{id}", get(get_note).delete(delete_note))
        .route("/plain", get(plain))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

type ApiFailure = (StatusCode, Json<Value>);

fn unauthorized() -> ApiFailure {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"error": "not authenticated"})),
    )
}

fn not_found() -> ApiFailure {
    (StatusCode::NOT_FOUND, Json(json!({"error": "not found"})))
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::to_string)
}

async fn authorize(db: &Db, headers: &HeaderMap) -> Result<(), ApiFailure> {
    let Some(token) = bearer_token(headers) else {
        return Err(unauthorized());
    };
    if db.read().await.tokens.contains(&token) {
        Ok(())
    } else {
        Err(unauthorized())
    }
}

async fn login(
    State(db): State<Db>,
    Json(creds): Json<Credentials>,
) -> Result<Json<Value>, ApiFailure> {
    if creds.username.is_empty() || creds.password != PASSWORD {
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "invalid credentials"})),
        ));
    }
    let token = Uuid::new_v4().to_string();
    db.write().await.tokens.insert(token.clone());
    Ok(Json(json!({"token": token})))
}

async fn logout(State(db): State<Db>, headers: HeaderMap) -> Result<StatusCode, ApiFailure> {
    let Some(token) = bearer_token(&headers) else {
        return Err(unauthorized());
    };
    if db.write().await.tokens.remove(&token) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(unauthorized())
    }
}

async fn list_notes(
    State(db): State<Db>,
    headers: HeaderMap,
) -> Result<Json<Vec<Note>>, ApiFailure> {
    authorize(&db, &headers).await?;
    let state = db.read().await;
    Ok(Json(state.notes.values().cloned().collect()))
}

async fn create_note(
    State(db): State<Db>,
    headers: HeaderMap,
    Json(input): Json<CreateNote>,
) -> Result<(StatusCode, Json<Note>), ApiFailure> {
    authorize(&db, &headers).await?;
    let note = Note {
        id: Uuid::new_v4(),
        title: input.title,
        body: input.body,
    };
    db.write().await.notes.insert(note.id, note.clone());
    Ok((StatusCode::CREATED, Json(note)))
}

async fn get_note(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<Note>, ApiFailure> {
    authorize(&db, &headers).await?;
    let state = db.read().await;
    state.notes.get(&id).cloned().map(Json).ok_or_else(not_found)
}

async fn delete_note(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiFailure> {
    authorize(&db, &headers).await?;
    db.write()
        .await
        .notes
        .remove(&id)
        .map(|_| StatusCode::NO_CONTENT)
        .ok_or_else(not_found)
}

async fn plain() -> &'static str {
    "not json"
}
