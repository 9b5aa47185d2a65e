//! REST API: router construction and request handlers.
//!
//! Handlers stay thin: authenticate, run the gate checks, call into the
//! workflow modules, shape the response.  Every mutating POST flows through
//! the idempotency middleware before any of this runs.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, Method, StatusCode},
    middleware,
    routing::{get, post, put},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use microcourses_store::{
    Certificate, Course, CourseStatus, Database, Enrollment, Role, StoreError, User,
};

use crate::auth::{self, AuthUser};
use crate::certificate;
use crate::config::ServerConfig;
use crate::courses::{self, CourseUpdate, LessonInput};
use crate::enrollment;
use crate::error::ApiError;
use crate::idempotency::{idempotency_middleware, IdempotencyCache};
use crate::rate_limit::{rate_limit_middleware, RateLimiter};

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Database>>,
    pub idempotency: IdempotencyCache,
    pub rate_limiter: RateLimiter,
    pub config: Arc<ServerConfig>,
}

pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);

    let api = Router::new()
        .route("/health", get(health_check))
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/me", get(me))
        .route("/courses", get(list_courses).post(create_course))
        .route("/courses/:id", get(get_course).put(update_course))
        .route("/courses/:id/lessons", post(add_lesson))
        .route("/creator/courses", get(creator_courses))
        .route("/enroll/:course_id", post(enroll))
        .route("/progress", get(list_progress))
        .route("/progress/:lesson_id", put(update_progress))
        .route("/certificate/:course_id", post(issue_certificate))
        .route("/certificates", get(list_certificates))
        .route("/admin/courses", get(admin_courses))
        .route("/admin/courses/:id/status", put(admin_set_status))
        .route("/admin/creator-applications", get(creator_applications))
        .route("/admin/creator-applications/:id", put(approve_creator));

    Router::new()
        .nest("/api", api)
        .layer(middleware::from_fn_with_state(
            state.idempotency.clone(),
            idempotency_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            state.rate_limiter.clone(),
            rate_limit_middleware,
        ))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(config: &ServerConfig) -> tower_http::cors::CorsLayer {
    use tower_http::cors::{Any, CorsLayer};

    let methods = [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::DELETE,
        Method::OPTIONS,
    ];

    if config.allowed_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any)
    } else {
        let origins: Vec<axum::http::HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers(Any)
    }
}

// ---------------------------------------------------------------------------
// Response shapes
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
struct DataResponse<T> {
    success: bool,
    data: T,
}

impl<T> DataResponse<T> {
    fn new(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

#[derive(Serialize)]
struct ListResponse<T> {
    success: bool,
    data: Vec<T>,
    pagination: Pagination,
}

impl<T> ListResponse<T> {
    fn new(data: Vec<T>, pagination: Pagination) -> Self {
        Self {
            success: true,
            data,
            pagination,
        }
    }
}

#[derive(Serialize)]
struct Pagination {
    page: i64,
    limit: i64,
    total: i64,
    pages: i64,
}

impl Pagination {
    fn new(page: i64, limit: i64, total: i64) -> Self {
        Self {
            page,
            limit,
            total,
            pages: (total + limit - 1) / limit,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UserView {
    id: Uuid,
    email: String,
    role: Role,
    approved_creator: bool,
}

impl From<&AuthUser> for UserView {
    fn from(user: &AuthUser) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            role: user.role,
            approved_creator: user.approved_creator,
        }
    }
}

impl From<User> for UserView {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            role: user.role,
            approved_creator: user.approved_creator,
        }
    }
}

#[derive(Serialize)]
struct AuthResponse {
    success: bool,
    token: String,
    user: UserView,
}

// ---------------------------------------------------------------------------
// Request shapes
// ---------------------------------------------------------------------------

#[derive(Deserialize, Default)]
struct RegisterRequest {
    email: Option<String>,
    password: Option<String>,
    role: Option<String>,
}

#[derive(Deserialize, Default)]
struct LoginRequest {
    email: Option<String>,
    password: Option<String>,
}

#[derive(Deserialize, Default)]
struct CreateCourseRequest {
    title: Option<String>,
    description: Option<String>,
}

#[derive(Deserialize, Default)]
struct CourseUpdateRequest {
    title: Option<String>,
    description: Option<String>,
    status: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct LessonRequest {
    title: Option<String>,
    content: Option<String>,
    video_url: Option<String>,
    duration: Option<i64>,
    transcript: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ProgressRequest {
    course_id: Option<String>,
}

#[derive(Deserialize, Default)]
struct StatusRequest {
    status: Option<String>,
}

#[derive(Deserialize, Default)]
struct PageQuery {
    page: Option<i64>,
    limit: Option<i64>,
    search: Option<String>,
    status: Option<String>,
}

fn page_params(query: &PageQuery) -> (i64, i64, i64) {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(10).clamp(1, 100);
    (page, limit, (page - 1) * limit)
}

fn parse_id(value: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(value).map_err(|_| ApiError::validation("INVALID_ID", "Invalid ID format"))
}

fn fetch_course(db: &Database, id: Uuid) -> Result<Course, ApiError> {
    match db.get_course(id) {
        Ok(course) => Ok(course),
        Err(StoreError::NotFound) => Err(ApiError::NotFound("Course")),
        Err(e) => Err(e.into()),
    }
}

// ---------------------------------------------------------------------------
// Meta
// ---------------------------------------------------------------------------

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

async fn register(
    State(state): State<AppState>,
    body: Option<Json<RegisterRequest>>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    let req = body.map(|Json(req)| req).unwrap_or_default();

    let (email, password) = match (
        req.email.filter(|e| !e.is_empty()),
        req.password.filter(|p| !p.is_empty()),
    ) {
        (Some(email), Some(password)) => (email, password),
        _ => return Err(ApiError::missing_fields("Please provide email and password")),
    };

    if password.chars().count() < 6 {
        return Err(ApiError::validation_field(
            "INVALID_PASSWORD",
            "Password must be at least 6 characters",
            "password",
        ));
    }

    // Self-registration only hands out learner and (unapproved) creator.
    let role = if req.role.as_deref() == Some("creator") {
        Role::Creator
    } else {
        Role::Learner
    };

    let db = state.db.lock().await;
    let user = User {
        id: Uuid::new_v4(),
        email,
        password_hash: auth::hash_password(&password),
        role,
        approved_creator: false,
        created_at: Utc::now(),
    };
    db.create_user(&user)?;

    let session = auth::issue_session(&db, user.id, state.config.session_ttl_days)?;
    info!(user = %user.email, role = user.role.as_str(), "user registered");

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            success: true,
            token: session.token,
            user: user.into(),
        }),
    ))
}

async fn login(
    State(state): State<AppState>,
    body: Option<Json<LoginRequest>>,
) -> Result<Json<AuthResponse>, ApiError> {
    let req = body.map(|Json(req)| req).unwrap_or_default();

    let (email, password) = match (
        req.email.filter(|e| !e.is_empty()),
        req.password.filter(|p| !p.is_empty()),
    ) {
        (Some(email), Some(password)) => (email, password),
        _ => return Err(ApiError::missing_fields("Please provide email and password")),
    };

    let db = state.db.lock().await;
    let user = db
        .find_user_by_email(&email)?
        .ok_or_else(ApiError::invalid_credentials)?;

    if !auth::verify_password(&user.password_hash, &password) {
        return Err(ApiError::invalid_credentials());
    }

    let session = auth::issue_session(&db, user.id, state.config.session_ttl_days)?;

    Ok(Json(AuthResponse {
        success: true,
        token: session.token,
        user: user.into(),
    }))
}

async fn me(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<DataResponse<UserView>>, ApiError> {
    let db = state.db.lock().await;
    let user = auth::authenticate(&db, &headers)?;
    Ok(Json(DataResponse::new(UserView::from(&user))))
}

// ---------------------------------------------------------------------------
// Courses
// ---------------------------------------------------------------------------

async fn list_courses(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<ListResponse<Course>>, ApiError> {
    let (page, limit, offset) = page_params(&query);
    let search = query.search.as_deref().filter(|s| !s.is_empty());

    let db = state.db.lock().await;
    let total = db.count_published_courses(search)?;
    let data = db.list_published_courses(search, limit, offset)?;

    Ok(Json(ListResponse::new(data, Pagination::new(page, limit, total))))
}

async fn get_course(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DataResponse<Course>>, ApiError> {
    let id = parse_id(&id)?;
    let db = state.db.lock().await;
    let course = fetch_course(&db, id)?;
    Ok(Json(DataResponse::new(course)))
}

async fn create_course(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Option<Json<CreateCourseRequest>>,
) -> Result<(StatusCode, Json<DataResponse<Course>>), ApiError> {
    let req = body.map(|Json(req)| req).unwrap_or_default();

    let db = state.db.lock().await;
    let user = auth::authenticate(&db, &headers)?;
    auth::authorize(&user, &[Role::Creator, Role::Admin])?;
    auth::require_approved_creator(&user)?;

    let (title, description) = match (
        req.title.filter(|t| !t.is_empty()),
        req.description.filter(|d| !d.is_empty()),
    ) {
        (Some(title), Some(description)) => (title, description),
        _ => {
            return Err(ApiError::missing_fields(
                "Please provide title and description",
            ))
        }
    };

    let course = courses::create_course(&db, user.id, title, description)?;
    info!(course = %course.id, creator = %user.id, "course created");

    Ok((StatusCode::CREATED, Json(DataResponse::new(course))))
}

async fn update_course(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    body: Option<Json<CourseUpdateRequest>>,
) -> Result<Json<DataResponse<Course>>, ApiError> {
    let id = parse_id(&id)?;
    let req = body.map(|Json(req)| req).unwrap_or_default();

    let db = state.db.lock().await;
    let user = auth::authenticate(&db, &headers)?;
    auth::authorize(&user, &[Role::Creator, Role::Admin])?;

    let course = courses::update_course(
        &db,
        &user,
        id,
        CourseUpdate {
            title: req.title,
            description: req.description,
            status: req.status,
        },
    )?;
    Ok(Json(DataResponse::new(course)))
}

async fn add_lesson(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    body: Option<Json<LessonRequest>>,
) -> Result<(StatusCode, Json<DataResponse<Course>>), ApiError> {
    let id = parse_id(&id)?;
    let req = body.map(|Json(req)| req).unwrap_or_default();

    let db = state.db.lock().await;
    let user = auth::authenticate(&db, &headers)?;
    auth::authorize(&user, &[Role::Creator, Role::Admin])?;
    auth::require_approved_creator(&user)?;

    let course = courses::add_lesson(
        &db,
        &user,
        id,
        LessonInput {
            title: req.title,
            content: req.content,
            video_url: req.video_url,
            duration: req.duration,
            transcript: req.transcript,
        },
    )?;
    Ok((StatusCode::CREATED, Json(DataResponse::new(course))))
}

async fn creator_courses(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<PageQuery>,
) -> Result<Json<ListResponse<Course>>, ApiError> {
    let (page, limit, offset) = page_params(&query);

    let db = state.db.lock().await;
    let user = auth::authenticate(&db, &headers)?;
    auth::authorize(&user, &[Role::Creator, Role::Admin])?;

    let total = db.count_courses_by_creator(user.id)?;
    let data = db.list_courses_by_creator(user.id, limit, offset)?;

    Ok(Json(ListResponse::new(data, Pagination::new(page, limit, total))))
}

// ---------------------------------------------------------------------------
// Enrollment & progress
// ---------------------------------------------------------------------------

async fn enroll(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(course_id): Path<String>,
) -> Result<(StatusCode, Json<DataResponse<Enrollment>>), ApiError> {
    let course_id = parse_id(&course_id)?;

    let db = state.db.lock().await;
    let user = auth::authenticate(&db, &headers)?;
    auth::authorize(&user, &[Role::Learner])?;

    let enrollment = enrollment::enroll(&db, user.id, course_id)?;
    info!(user = %user.id, course = %course_id, "learner enrolled");

    Ok((StatusCode::CREATED, Json(DataResponse::new(enrollment))))
}

async fn update_progress(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(lesson_id): Path<String>,
    body: Option<Json<ProgressRequest>>,
) -> Result<Json<DataResponse<Enrollment>>, ApiError> {
    let lesson_id = parse_id(&lesson_id)?;
    let req = body.map(|Json(req)| req).unwrap_or_default();

    let course_id = req
        .course_id
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::missing_fields("Please provide courseId"))?;
    let course_id = parse_id(&course_id)?;

    let db = state.db.lock().await;
    let user = auth::authenticate(&db, &headers)?;
    auth::authorize(&user, &[Role::Learner])?;

    let enrollment = enrollment::complete_lesson(&db, user.id, course_id, lesson_id)?;
    Ok(Json(DataResponse::new(enrollment)))
}

async fn list_progress(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<PageQuery>,
) -> Result<Json<ListResponse<Enrollment>>, ApiError> {
    let (page, limit, offset) = page_params(&query);

    let db = state.db.lock().await;
    let user = auth::authenticate(&db, &headers)?;
    auth::authorize(&user, &[Role::Learner])?;

    let total = db.count_enrollments_for_user(user.id)?;
    let data = db.list_enrollments_for_user(user.id, limit, offset)?;

    Ok(Json(ListResponse::new(data, Pagination::new(page, limit, total))))
}

// ---------------------------------------------------------------------------
// Certificates
// ---------------------------------------------------------------------------

async fn issue_certificate(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(course_id): Path<String>,
) -> Result<(StatusCode, Json<DataResponse<Certificate>>), ApiError> {
    let course_id = parse_id(&course_id)?;

    let db = state.db.lock().await;
    let user = auth::authenticate(&db, &headers)?;
    auth::authorize(&user, &[Role::Learner])?;

    let certificate = certificate::issue_certificate(&db, user.id, course_id)?;
    info!(user = %user.id, course = %course_id, "certificate issued");

    Ok((StatusCode::CREATED, Json(DataResponse::new(certificate))))
}

async fn list_certificates(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<PageQuery>,
) -> Result<Json<ListResponse<Certificate>>, ApiError> {
    let (page, limit, offset) = page_params(&query);

    let db = state.db.lock().await;
    let user = auth::authenticate(&db, &headers)?;
    auth::authorize(&user, &[Role::Learner])?;

    let total = db.count_certificates_for_user(user.id)?;
    let data = db.list_certificates_for_user(user.id, limit, offset)?;

    Ok(Json(ListResponse::new(data, Pagination::new(page, limit, total))))
}

// ---------------------------------------------------------------------------
// Admin
// ---------------------------------------------------------------------------

async fn admin_courses(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<PageQuery>,
) -> Result<Json<ListResponse<Course>>, ApiError> {
    let (page, limit, offset) = page_params(&query);

    let db = state.db.lock().await;
    let user = auth::authenticate(&db, &headers)?;
    auth::authorize(&user, &[Role::Admin])?;

    let status_filter = match query.status.as_deref().unwrap_or("pending") {
        "all" => None,
        value => match CourseStatus::parse(value) {
            Some(status) => Some(status),
            // An unknown status matches nothing.
            None => {
                return Ok(Json(ListResponse::new(
                    Vec::new(),
                    Pagination::new(page, limit, 0),
                )))
            }
        },
    };

    let total = db.count_courses_by_status(status_filter)?;
    let data = db.list_courses_by_status(status_filter, limit, offset)?;

    Ok(Json(ListResponse::new(data, Pagination::new(page, limit, total))))
}

async fn admin_set_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    body: Option<Json<StatusRequest>>,
) -> Result<Json<DataResponse<Course>>, ApiError> {
    let id = parse_id(&id)?;
    let req = body.map(|Json(req)| req).unwrap_or_default();

    let db = state.db.lock().await;
    let user = auth::authenticate(&db, &headers)?;
    auth::authorize(&user, &[Role::Admin])?;

    let course = courses::set_course_status(&db, id, req.status.as_deref())?;
    info!(course = %course.id, status = course.status.as_str(), "course status set");

    Ok(Json(DataResponse::new(course)))
}

async fn creator_applications(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<PageQuery>,
) -> Result<Json<ListResponse<UserView>>, ApiError> {
    let (page, limit, offset) = page_params(&query);

    let db = state.db.lock().await;
    let user = auth::authenticate(&db, &headers)?;
    auth::authorize(&user, &[Role::Admin])?;

    let total = db.count_creator_applications()?;
    let data = db
        .list_creator_applications(limit, offset)?
        .into_iter()
        .map(UserView::from)
        .collect();

    Ok(Json(ListResponse::new(data, Pagination::new(page, limit, total))))
}

async fn approve_creator(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<DataResponse<UserView>>, ApiError> {
    let id = parse_id(&id)?;

    let db = state.db.lock().await;
    let admin = auth::authenticate(&db, &headers)?;
    auth::authorize(&admin, &[Role::Admin])?;

    let user = match db.get_user(id) {
        Ok(user) => user,
        Err(StoreError::NotFound) => return Err(ApiError::NotFound("User")),
        Err(e) => return Err(e.into()),
    };

    if user.role != Role::Creator {
        return Err(ApiError::validation("INVALID_ROLE", "User is not a creator"));
    }

    let approved = db.approve_creator(user.id)?;
    info!(user = %approved.id, "creator approved");

    Ok(Json(DataResponse::new(approved.into())))
}

// ---------------------------------------------------------------------------
// Server entry
// ---------------------------------------------------------------------------

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}
