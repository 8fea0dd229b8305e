//! In-process stand-in for the hosted backend
//!
//! Serves the subset of the REST and auth APIs the client uses, backed
//! by in-memory JSON tables:
//! - `select` with `*`, columns and embedded resources
//! - `eq` filters, `order`, `limit`
//! - single-object responses, `Prefer: return=...`
//! - the `likes (user_id, video_id)` unique constraint
//! - row-level security on `videos` inserts
//! - the counter functions
//! - rotating refresh tokens and configurable session lifetime
//! - forced insert failures per table

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::DateTime;
use clipfeed::backend::{BackendClient, KeyValueStorage, MemoryStorage};
use clipfeed::config::BackendConfig;
use serde_json::{Map, Value, json};
use tokio::net::TcpListener;

pub const ANON_KEY: &str = "test-anon-key";

const OBJECT_MEDIA_TYPE: &str = "application/vnd.pgrst.object+json";
const EPOCH_2024: i64 = 1_704_067_200;

struct Account {
    id: String,
    email: String,
    password: String,
}

#[derive(Default)]
struct Db {
    tables: HashMap<String, Vec<Value>>,
    accounts: Vec<Account>,
    access_tokens: HashMap<String, String>,
    refresh_tokens: HashMap<String, String>,
    session_lifetime: Option<i64>,
    failing_inserts: HashMap<String, String>,
    sequence: i64,
    requests: Vec<String>,
}

type Shared = Arc<Mutex<Db>>;

/// Handle to a running fake backend
#[derive(Clone)]
pub struct FakeBackend {
    pub url: String,
    db: Shared,
}

impl FakeBackend {
    pub async fn start() -> Self {
        let db: Shared = Arc::new(Mutex::new(Db::default()));

        let app = Router::new()
            .route("/auth/v1/token", post(auth_token))
            .route("/auth/v1/signup", post(auth_signup))
            .route("/auth/v1/logout", post(auth_logout))
            .route("/auth/v1/user", get(auth_user))
            .route("/rest/v1/rpc/:function", post(rpc))
            .route(
                "/rest/v1/:table",
                get(rest_select).post(rest_insert).patch(rest_update),
            )
            .with_state(db.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url: format!("http://{addr}"),
            db,
        }
    }

    pub fn config(&self) -> BackendConfig {
        BackendConfig {
            url: self.url.clone(),
            anon_key: ANON_KEY.to_string(),
            timeout_seconds: 5,
        }
    }

    /// A fresh client with in-memory session storage
    pub fn client(&self) -> Arc<BackendClient> {
        self.client_with_storage(Arc::new(MemoryStorage::new()))
    }

    pub fn client_with_storage(&self, storage: Arc<dyn KeyValueStorage>) -> Arc<BackendClient> {
        Arc::new(BackendClient::new(&self.config(), storage).unwrap())
    }

    /// Create an auth account and its profile row; returns the user id
    pub fn create_user(&self, email: &str, password: &str, username: &str) -> String {
        let mut db = self.lock();
        let id = db.create_account(email, password);
        db.insert_row(
            "users",
            json!({
                "id": id,
                "username": username,
                "email": email,
                "display_name": username,
                "photo_url": format!("https://img.example.com/{username}.png"),
            }),
        )
        .unwrap();
        id
    }

    /// Create an auth account without a profile row
    pub fn create_account(&self, email: &str, password: &str) -> String {
        self.lock().create_account(email, password)
    }

    /// Valid access token for `user_id`
    pub fn token_for(&self, user_id: &str) -> String {
        let session = self.lock().issue_session(user_id);
        session["access_token"].as_str().unwrap().to_string()
    }

    /// Insert a row directly, applying column defaults
    pub fn seed(&self, table: &str, row: Value) -> Value {
        self.lock().insert_row(table, row).unwrap()
    }

    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.lock().tables.get(table).cloned().unwrap_or_default()
    }

    pub fn row(&self, table: &str, id: &str) -> Value {
        self.rows(table)
            .into_iter()
            .find(|row| row["id"] == id)
            .unwrap_or_else(|| panic!("no {table} row with id {id}"))
    }

    /// Requests served so far, as `METHOD /path`
    pub fn requests(&self) -> Vec<String> {
        self.lock().requests.clone()
    }

    /// Invalidate every issued access token
    pub fn revoke_access_tokens(&self) {
        self.lock().access_tokens.clear();
    }

    /// Invalidate every issued refresh token
    pub fn revoke_refresh_tokens(&self) {
        self.lock().refresh_tokens.clear();
    }

    /// Lifetime in seconds of sessions issued from now on (default 3600)
    pub fn set_session_lifetime(&self, seconds: i64) {
        self.lock().session_lifetime = Some(seconds);
    }

    /// Make every insert into `table` fail with a database error
    pub fn fail_inserts(&self, table: &str, message: &str) {
        self.lock()
            .failing_inserts
            .insert(table.to_string(), message.to_string());
    }

    /// Number of `grant_type=refresh_token` exchanges served
    pub fn refresh_count(&self) -> usize {
        self.lock()
            .requests
            .iter()
            .filter(|request| request.as_str() == "POST /auth/v1/token?grant_type=refresh_token")
            .count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Db> {
        self.db.lock().unwrap()
    }
}

impl Db {
    fn next(&mut self) -> i64 {
        self.sequence += 1;
        self.sequence
    }

    fn timestamp(&mut self) -> String {
        let seconds = EPOCH_2024 + self.next();
        DateTime::from_timestamp(seconds, 0).unwrap().to_rfc3339()
    }

    fn create_account(&mut self, email: &str, password: &str) -> String {
        let id = format!("user-{}", self.next());
        self.accounts.push(Account {
            id: id.clone(),
            email: email.to_string(),
            password: password.to_string(),
        });
        id
    }

    fn auth_user(&self, user_id: &str) -> Value {
        let email = self
            .accounts
            .iter()
            .find(|account| account.id == user_id)
            .map(|account| account.email.clone());
        json!({ "id": user_id, "email": email, "aud": "authenticated" })
    }

    fn issue_session(&mut self, user_id: &str) -> Value {
        let n = self.next();
        let lifetime = self.session_lifetime.unwrap_or(3600);
        let access_token = format!("access-{n}");
        let refresh_token = format!("refresh-{n}");
        self.access_tokens
            .insert(access_token.clone(), user_id.to_string());
        self.refresh_tokens
            .insert(refresh_token.clone(), user_id.to_string());

        json!({
            "access_token": access_token,
            "refresh_token": refresh_token,
            "token_type": "bearer",
            "expires_in": lifetime,
            "expires_at": chrono::Utc::now().timestamp() + lifetime,
            "user": self.auth_user(user_id),
        })
    }

    fn caller(&self, headers: &HeaderMap) -> Option<String> {
        let token = bearer(headers)?;
        self.access_tokens.get(&token).cloned()
    }

    fn insert_row(&mut self, table: &str, row: Value) -> Result<Value, Response> {
        let Value::Object(mut row) = row else {
            return Err(pg_error(StatusCode::BAD_REQUEST, "PGRST102", "Row must be an object"));
        };

        if !row.contains_key("id") {
            let id = format!("{}-{}", table.trim_end_matches('s'), self.next());
            row.insert("id".to_string(), json!(id));
        }
        if !row.contains_key("created_at") {
            let now = self.timestamp();
            row.insert("created_at".to_string(), json!(now));
        }
        for (column, default) in column_defaults(table) {
            row.entry(column.to_string()).or_insert(default);
        }

        if table == "likes" {
            let duplicate = self.tables.get("likes").into_iter().flatten().any(|like| {
                like.get("user_id") == row.get("user_id") && like.get("video_id") == row.get("video_id")
            });
            if duplicate {
                return Err(pg_error(
                    StatusCode::CONFLICT,
                    "23505",
                    "duplicate key value violates unique constraint \"likes_user_id_video_id_key\"",
                ));
            }
        }

        let row = Value::Object(row);
        self.tables
            .entry(table.to_string())
            .or_default()
            .push(row.clone());
        Ok(row)
    }

    fn project(&self, row: &Value, fields: &[Field]) -> Value {
        let mut out = Map::new();
        for field in fields {
            match field {
                Field::All => {
                    if let Value::Object(columns) = row {
                        out.extend(columns.clone());
                    }
                }
                Field::Column(column) => {
                    out.insert(column.clone(), row.get(column).cloned().unwrap_or(Value::Null));
                }
                Field::Embed {
                    name,
                    table,
                    hint,
                    columns,
                } => {
                    let value = self.embed(row, table, hint.as_deref(), columns);
                    out.insert(name.clone(), value);
                }
            }
        }
        Value::Object(out)
    }

    fn embed(
        &self,
        row: &Value,
        embedded: &str,
        hint: Option<&str>,
        columns: &[Field],
    ) -> Value {
        let rows = self.tables.get(embedded).cloned().unwrap_or_default();

        if embedded == "chat_participants" {
            let children = rows
                .iter()
                .filter(|child| child["chat_id"] == row["id"])
                .map(|child| self.project(child, columns))
                .collect();
            return Value::Array(children);
        }

        let foreign_key = match (embedded, hint) {
            ("users", Some(hint)) if hint.contains("from_user_id") => "from_user_id",
            ("users", _) => "user_id",
            ("chats", _) => "chat_id",
            _ => return Value::Null,
        };

        rows.iter()
            .find(|parent| parent["id"] == row[foreign_key])
            .map(|parent| self.project(parent, columns))
            .unwrap_or(Value::Null)
    }
}

fn column_defaults(table: &str) -> Vec<(&'static str, Value)> {
    match table {
        "users" => vec![
            ("bio", Value::Null),
            ("photo_url", Value::Null),
            ("followers", json!(0)),
            ("following", json!(0)),
        ],
        "videos" => vec![
            ("description", Value::Null),
            ("hashtags", json!([])),
            ("likes", json!(0)),
            ("comments_count", json!(0)),
            ("shares", json!(0)),
            ("source", Value::Null),
            ("source_url", Value::Null),
        ],
        "comments" => vec![("likes", json!(0))],
        "messages" => vec![("read", json!(false))],
        "chats" => vec![("last_message", Value::Null), ("last_message_time", Value::Null)],
        "chat_participants" => vec![("unread_count", json!(0))],
        "notifications" => vec![("read", json!(false)), ("content_id", Value::Null)],
        _ => Vec::new(),
    }
}

// =============================================================================
// select parsing
// =============================================================================

enum Field {
    All,
    Column(String),
    Embed {
        name: String,
        table: String,
        hint: Option<String>,
        columns: Vec<Field>,
    },
}

fn parse_select(select: &str) -> Vec<Field> {
    split_top_level(select)
        .into_iter()
        .filter(|item| !item.is_empty())
        .map(parse_field)
        .collect()
}

fn split_top_level(select: &str) -> Vec<&str> {
    let mut items = Vec::new();
    let mut depth = 0;
    let mut start = 0;
    for (i, c) in select.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            ',' if depth == 0 => {
                items.push(&select[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    items.push(&select[start..]);
    items
}

fn parse_field(item: &str) -> Field {
    let Some(open) = item.find('(') else {
        return if item == "*" {
            Field::All
        } else {
            Field::Column(item.to_string())
        };
    };

    let head = &item[..open];
    let inner = &item[open + 1..item.len() - 1];
    let (alias, rest) = match head.split_once(':') {
        Some((alias, rest)) => (Some(alias), rest),
        None => (None, head),
    };
    let (table, hint) = match rest.split_once('!') {
        Some((table, hint)) => (table, Some(hint.to_string())),
        None => (rest, None),
    };

    Field::Embed {
        name: alias.unwrap_or(table).to_string(),
        table: table.to_string(),
        hint,
        columns: parse_select(inner),
    }
}

// =============================================================================
// filters
// =============================================================================

struct Params {
    select: Vec<Field>,
    filters: Vec<(String, String)>,
    order: Option<(String, bool)>,
    limit: Option<usize>,
}

impl Params {
    fn parse(pairs: Vec<(String, String)>) -> Self {
        let mut params = Params {
            select: vec![Field::All],
            filters: Vec::new(),
            order: None,
            limit: None,
        };
        for (key, value) in pairs {
            match key.as_str() {
                "select" => params.select = parse_select(&value),
                "order" => {
                    let (column, direction) = value.split_once('.').unwrap_or((&value, "asc"));
                    params.order = Some((column.to_string(), direction == "asc"));
                }
                "limit" => params.limit = value.parse().ok(),
                _ => {
                    if let Some(expected) = value.strip_prefix("eq.") {
                        params.filters.push((key, expected.to_string()));
                    }
                }
            }
        }
        params
    }

    fn matches(&self, row: &Value) -> bool {
        self.filters
            .iter()
            .all(|(column, expected)| text(&row[column.as_str()]) == *expected)
    }
}

fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// =============================================================================
// handlers
// =============================================================================

async fn auth_token(
    State(db): State<Shared>,
    Query(query): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> Response {
    let mut db = db.lock().unwrap();
    let grant_type = query.get("grant_type").cloned().unwrap_or_default();
    db.requests
        .push(format!("POST /auth/v1/token?grant_type={grant_type}"));

    match grant_type.as_str() {
        "password" => {
            let email = body["email"].as_str().unwrap_or_default();
            let password = body["password"].as_str().unwrap_or_default();
            let user_id = db
                .accounts
                .iter()
                .find(|account| account.email == email && account.password == password)
                .map(|account| account.id.clone());
            match user_id {
                Some(user_id) => Json(db.issue_session(&user_id)).into_response(),
                None => auth_error(
                    StatusCode::BAD_REQUEST,
                    "invalid_grant",
                    "Invalid login credentials",
                ),
            }
        }
        "refresh_token" => {
            let token = body["refresh_token"].as_str().unwrap_or_default();
            match db.refresh_tokens.remove(token) {
                Some(user_id) => Json(db.issue_session(&user_id)).into_response(),
                None => auth_error(
                    StatusCode::BAD_REQUEST,
                    "invalid_grant",
                    "Invalid Refresh Token: Refresh Token Not Found",
                ),
            }
        }
        _ => auth_error(StatusCode::BAD_REQUEST, "unsupported_grant_type", "Unsupported grant type"),
    }
}

async fn auth_signup(State(db): State<Shared>, Json(body): Json<Value>) -> Response {
    let mut db = db.lock().unwrap();
    db.requests.push("POST /auth/v1/signup".to_string());

    let email = body["email"].as_str().unwrap_or_default().to_string();
    let password = body["password"].as_str().unwrap_or_default().to_string();

    if db.accounts.iter().any(|account| account.email == email) {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({
                "code": 422,
                "error_code": "user_already_exists",
                "msg": "User already registered"
            })),
        )
            .into_response();
    }

    let user_id = db.create_account(&email, &password);
    Json(db.issue_session(&user_id)).into_response()
}

async fn auth_logout(State(db): State<Shared>, headers: HeaderMap) -> Response {
    let mut db = db.lock().unwrap();
    db.requests.push("POST /auth/v1/logout".to_string());

    if let Some(token) = bearer(&headers) {
        db.access_tokens.remove(&token);
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn auth_user(State(db): State<Shared>, headers: HeaderMap) -> Response {
    let mut db = db.lock().unwrap();
    db.requests.push("GET /auth/v1/user".to_string());

    match db.caller(&headers) {
        Some(user_id) => Json(db.auth_user(&user_id)).into_response(),
        None => (
            StatusCode::UNAUTHORIZED,
            Json(json!({
                "code": 401,
                "error_code": "bad_jwt",
                "msg": "invalid JWT: unable to parse or verify signature"
            })),
        )
            .into_response(),
    }
}

async fn rpc(
    State(db): State<Shared>,
    Path(function): Path<String>,
    headers: HeaderMap,
    Json(args): Json<Value>,
) -> Response {
    if let Err(response) = require_api_key(&headers) {
        return response;
    }
    let mut db = db.lock().unwrap();
    db.requests.push(format!("POST /rest/v1/rpc/{function}"));

    let column = match function.as_str() {
        "increment_video_likes" => "likes",
        "increment_video_comments" => "comments_count",
        _ => {
            return pg_error(
                StatusCode::NOT_FOUND,
                "PGRST202",
                "Could not find the function in the schema cache",
            );
        }
    };

    let video_id = args["video_id"].clone();
    if let Some(video) = db
        .tables
        .get_mut("videos")
        .and_then(|videos| videos.iter_mut().find(|video| video["id"] == video_id))
    {
        let current = video[column].as_i64().unwrap_or(0);
        video[column] = json!(current + 1);
    }

    StatusCode::NO_CONTENT.into_response()
}

async fn rest_select(
    State(db): State<Shared>,
    Path(table): Path<String>,
    Query(pairs): Query<Vec<(String, String)>>,
    headers: HeaderMap,
) -> Response {
    if let Err(response) = require_api_key(&headers) {
        return response;
    }
    let mut db = db.lock().unwrap();
    db.requests.push(format!("GET /rest/v1/{table}"));

    let params = Params::parse(pairs);
    let mut rows: Vec<Value> = db
        .tables
        .get(&table)
        .into_iter()
        .flatten()
        .filter(|row| params.matches(row))
        .cloned()
        .collect();

    if let Some((column, ascending)) = &params.order {
        rows.sort_by(|a, b| text(&a[column.as_str()]).cmp(&text(&b[column.as_str()])));
        if !ascending {
            rows.reverse();
        }
    }
    if let Some(limit) = params.limit {
        rows.truncate(limit);
    }

    let projected = rows
        .iter()
        .map(|row| db.project(row, &params.select))
        .collect();
    respond(StatusCode::OK, projected, &headers)
}

async fn rest_insert(
    State(db): State<Shared>,
    Path(table): Path<String>,
    Query(pairs): Query<Vec<(String, String)>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if let Err(response) = require_api_key(&headers) {
        return response;
    }
    let mut db = db.lock().unwrap();
    db.requests.push(format!("POST /rest/v1/{table}"));

    let rows = match body {
        Value::Array(rows) => rows,
        row => vec![row],
    };

    if let Some(message) = db.failing_inserts.get(&table) {
        return pg_error(StatusCode::BAD_REQUEST, "23514", message);
    }

    if table == "videos" {
        let caller = db.caller(&headers);
        let allowed = rows
            .iter()
            .all(|row| caller.as_deref().is_some_and(|id| row["user_id"] == id));
        if !allowed {
            return pg_error(
                StatusCode::FORBIDDEN,
                "42501",
                "new row violates row-level security policy for table \"videos\"",
            );
        }
    }

    let mut inserted = Vec::new();
    for row in rows {
        match db.insert_row(&table, row) {
            Ok(row) => inserted.push(row),
            Err(response) => return response,
        }
    }

    let params = Params::parse(pairs);
    let projected = inserted
        .iter()
        .map(|row| db.project(row, &params.select))
        .collect();
    write_response(StatusCode::CREATED, projected, &headers)
}

async fn rest_update(
    State(db): State<Shared>,
    Path(table): Path<String>,
    Query(pairs): Query<Vec<(String, String)>>,
    headers: HeaderMap,
    Json(patch): Json<Value>,
) -> Response {
    if let Err(response) = require_api_key(&headers) {
        return response;
    }
    let mut db = db.lock().unwrap();
    db.requests.push(format!("PATCH /rest/v1/{table}"));

    let params = Params::parse(pairs);
    let Value::Object(patch) = patch else {
        return pg_error(StatusCode::BAD_REQUEST, "PGRST102", "Patch must be an object");
    };

    let mut updated = Vec::new();
    for row in db.tables.entry(table.clone()).or_default().iter_mut() {
        if !params.matches(row) {
            continue;
        }
        if let Value::Object(columns) = row {
            for (column, value) in &patch {
                columns.insert(column.clone(), value.clone());
            }
        }
        updated.push(row.clone());
    }

    let projected = updated
        .iter()
        .map(|row| db.project(row, &params.select))
        .collect();
    write_response(StatusCode::OK, projected, &headers)
}

// =============================================================================
// responses
// =============================================================================

fn respond(status: StatusCode, rows: Vec<Value>, headers: &HeaderMap) -> Response {
    let wants_object = headers
        .get(header::ACCEPT)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|accept| accept.contains(OBJECT_MEDIA_TYPE));

    if !wants_object {
        return (status, Json(Value::Array(rows))).into_response();
    }

    match <[Value; 1]>::try_from(rows) {
        Ok([row]) => (status, Json(row)).into_response(),
        Err(rows) => (
            StatusCode::NOT_ACCEPTABLE,
            Json(json!({
                "code": "PGRST116",
                "details": format!("The result contains {} rows", rows.len()),
                "hint": null,
                "message": "JSON object requested, multiple (or no) rows returned"
            })),
        )
            .into_response(),
    }
}

fn write_response(status: StatusCode, rows: Vec<Value>, headers: &HeaderMap) -> Response {
    let representation = headers
        .get("prefer")
        .and_then(|value| value.to_str().ok())
        .is_some_and(|prefer| prefer.contains("return=representation"));

    if representation {
        respond(status, rows, headers)
    } else {
        StatusCode::NO_CONTENT.into_response()
    }
}

fn require_api_key(headers: &HeaderMap) -> Result<(), Response> {
    match headers.get("apikey").and_then(|value| value.to_str().ok()) {
        Some(ANON_KEY) => Ok(()),
        _ => Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "Invalid API key" })),
        )
            .into_response()),
    }
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::to_string)
}

fn pg_error(status: StatusCode, code: &str, message: &str) -> Response {
    (
        status,
        Json(json!({
            "code": code,
            "details": null,
            "hint": null,
            "message": message
        })),
    )
        .into_response()
}

fn auth_error(status: StatusCode, error: &str, description: &str) -> Response {
    (
        status,
        Json(json!({ "error": error, "error_description": description })),
    )
        .into_response()
}
