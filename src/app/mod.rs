//! Built-in diagnosis application
//!
//! Answers requests routed to the manifest's Python entrypoint. The
//! application routes on the original request path:
//! - `GET /` index page
//! - `POST /login`, `POST /logout`
//! - `POST /upload` slide upload and demo diagnosis
//! - `GET /history`, `GET|POST /settings`

mod multipart;
mod results;
mod session;

pub use results::{lookup, DiagnosisResult};
pub use session::{default_settings, HistoryEntry, Session, SessionStore};

use base64::Engine;
use hyper::body::Bytes;
use hyper::header::{HeaderMap, HeaderValue, CONTENT_TYPE, SET_COOKIE};
use hyper::{Method, StatusCode};
use serde_json::json;

use crate::config::AppState;
use crate::http::{self, mime, HttpResponse};
use crate::logger;

const ALLOWED_EXTENSIONS: [&str; 4] = [".png", ".jpg", ".jpeg", ".html"];

/// Request as seen by the application, body already collected
#[derive(Debug, Clone)]
pub struct AppRequest {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Application entry point
pub async fn handle(req: AppRequest, state: &AppState) -> HttpResponse {
    let method = &req.method;
    match req.path.as_str() {
        "/" => match *method {
            Method::GET | Method::HEAD => index(&req, state).await,
            _ => http::build_405_response("GET, HEAD"),
        },
        "/login" if *method == Method::POST => login(&req, state).await,
        "/logout" if *method == Method::POST => logout(&req, state).await,
        "/upload" if *method == Method::POST => upload(&req, state).await,
        "/history" if *method == Method::GET => history(&req, state).await,
        "/settings" if *method == Method::GET || *method == Method::POST => {
            settings(&req, state).await
        }
        "/login" | "/logout" | "/upload" => http::build_405_response("POST"),
        "/history" => http::build_405_response("GET"),
        "/settings" => http::build_405_response("GET, POST"),
        _ => http::build_404_response(),
    }
}

/// Id of the caller's logged-in session
async fn logged_in_session(req: &AppRequest, state: &AppState) -> Option<String> {
    let id = session::read_cookie(&req.headers, &state.config.app.session_cookie)?;
    let session = state.sessions.get(id).await?;
    session.logged_in.then(|| id.to_string())
}

async fn index(req: &AppRequest, state: &AppState) -> HttpResponse {
    let show_login = logged_in_session(req, state).await.is_none();
    logger::log_app(&format!("Rendering index page, show_login: {show_login}"));

    let html = include_str!("index.html").replace("{{show_login}}", &show_login.to_string());
    http::build_html_response(html, req.method == Method::HEAD)
}

async fn login(req: &AppRequest, state: &AppState) -> HttpResponse {
    let mut username = None;
    let mut password = None;
    for (key, value) in form_fields(req) {
        match key.as_str() {
            "username" => username = Some(value),
            "password" => password = Some(value),
            _ => {}
        }
    }

    let app = &state.config.app;
    if username.as_deref() != Some(app.username.as_str())
        || password.as_deref() != Some(app.password.as_str())
    {
        logger::log_app_warning("Login failed: incorrect credentials");
        return http::build_json_response(
            StatusCode::UNAUTHORIZED,
            &json!({ "success": false, "error": "Invalid username or password" }),
        );
    }

    // Reuse the cookie's id so the client keeps one session
    let cookie = &app.session_cookie;
    let existing = match session::read_cookie(&req.headers, cookie) {
        Some(id) => state.sessions.get(id).await.map(|_| id.to_string()),
        None => None,
    };
    let id = if let Some(id) = existing {
        state.sessions.insert(&id, Session::logged_in()).await;
        id
    } else {
        state.sessions.create(Session::logged_in()).await
    };
    logger::log_app("Login successful");

    let mut response = http::build_json_response(StatusCode::OK, &json!({ "success": true }));
    set_cookie(&mut response, &session::session_cookie(cookie, &id));
    response
}

async fn logout(req: &AppRequest, state: &AppState) -> HttpResponse {
    let cookie = &state.config.app.session_cookie;
    if let Some(id) = session::read_cookie(&req.headers, cookie) {
        state.sessions.remove(id).await;
    }
    logger::log_app("User logged out");

    let mut response = http::build_redirect_response("/", StatusCode::FOUND);
    set_cookie(&mut response, &session::expired_cookie(cookie));
    response
}

async fn upload(req: &AppRequest, state: &AppState) -> HttpResponse {
    let Some(id) = logged_in_session(req, state).await else {
        logger::log_app_warning("Unauthorized upload attempt");
        return http::build_json_error(StatusCode::UNAUTHORIZED, "Please log in to upload images.");
    };

    logger::log_app("Received upload request");
    let Some(file) = image_part(req) else {
        logger::log_app_warning("No file uploaded");
        return http::build_json_error(StatusCode::BAD_REQUEST, "No file uploaded.");
    };
    let filename = file.filename.clone().unwrap_or_default();
    logger::log_app(&format!("Uploaded file: {filename}"));

    let (base_filename, ext) = split_extension(&filename);
    if !ALLOWED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()) {
        logger::log_app_warning(&format!("Invalid file format: {ext}"));
        return http::build_json_error(
            StatusCode::BAD_REQUEST,
            "Invalid file format. Please upload a .png or .jpg file.",
        );
    }

    let result = lookup(base_filename);
    let image_data = base64::engine::general_purpose::STANDARD.encode(&file.data);
    let mime_type = file
        .content_type
        .clone()
        .unwrap_or_else(|| mime::content_type_for(std::path::Path::new(&filename)).to_string());

    let response = json!({
        "result": result.report_html(),
        "image_data": image_data,
        "mime_type": mime_type,
        "confidence": result.confidence,
        "highlights": result.highlights,
    });

    let entry = HistoryEntry {
        filename,
        result,
        image_data,
        mime_type,
        timestamp: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
    };
    if state
        .sessions
        .update(&id, |s| s.results_history.push(entry))
        .await
        .is_none()
    {
        logger::log_app_warning("Session ended before history was saved");
    }

    http::build_json_response(StatusCode::OK, &response)
}

async fn history(req: &AppRequest, state: &AppState) -> HttpResponse {
    let session = match logged_in_session(req, state).await {
        Some(id) => state.sessions.get(&id).await,
        None => None,
    };
    let Some(session) = session else {
        logger::log_app_warning("Unauthorized history access");
        return http::build_json_error(StatusCode::UNAUTHORIZED, "Please log in to view history.");
    };

    http::build_json_response(
        StatusCode::OK,
        &json!({ "history": session.results_history }),
    )
}

async fn settings(req: &AppRequest, state: &AppState) -> HttpResponse {
    let Some(id) = logged_in_session(req, state).await else {
        logger::log_app_warning("Unauthorized settings access");
        return http::build_json_error(
            StatusCode::UNAUTHORIZED,
            "Please log in to update settings.",
        );
    };

    if req.method == Method::POST {
        let settings = match serde_json::from_slice::<serde_json::Value>(&req.body) {
            Ok(value) if value.is_object() => value,
            _ => {
                return http::build_json_error(
                    StatusCode::BAD_REQUEST,
                    "Settings must be a JSON object.",
                )
            }
        };
        state.sessions.update(&id, |s| s.settings = settings).await;
        logger::log_app("Settings updated");
        return http::build_json_response(StatusCode::OK, &json!({ "success": true }));
    }

    let settings = state
        .sessions
        .get(&id)
        .await
        .map_or_else(default_settings, |s| s.settings);
    http::build_json_response(StatusCode::OK, &json!({ "settings": settings }))
}

/// Text fields of a urlencoded or multipart form body
fn form_fields(req: &AppRequest) -> Vec<(String, String)> {
    let content_type = req
        .headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    match multipart::boundary(content_type) {
        Ok(boundary) => match multipart::parse(&req.body, &boundary) {
            Ok(parts) => parts
                .into_iter()
                .filter(|p| p.filename.is_none())
                .map(|p| (p.name, String::from_utf8_lossy(&p.data).into_owned()))
                .collect(),
            Err(e) => {
                logger::log_app_warning(&format!("Unreadable form body: {e}"));
                Vec::new()
            }
        },
        Err(_) => form_urlencoded::parse(&req.body).into_owned().collect(),
    }
}

/// The uploaded `image` file part, if the request carries one
fn image_part(req: &AppRequest) -> Option<multipart::Part> {
    let content_type = req.headers.get(CONTENT_TYPE)?.to_str().ok()?;
    let boundary = multipart::boundary(content_type).ok()?;
    let parts = match multipart::parse(&req.body, &boundary) {
        Ok(parts) => parts,
        Err(e) => {
            logger::log_app_warning(&format!("Unreadable upload body: {e}"));
            return None;
        }
    };
    parts
        .into_iter()
        .find(|p| p.name == "image" && p.filename.is_some())
}

/// Split `name.ext` into (`name`, `.ext`); dotfiles have no extension
fn split_extension(filename: &str) -> (&str, &str) {
    match filename.rfind('.') {
        Some(idx) if filename[..idx].chars().any(|c| c != '.') => filename.split_at(idx),
        _ => (filename, ""),
    }
}

fn set_cookie(response: &mut HttpResponse, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(value) => {
            response.headers_mut().append(SET_COOKIE, value);
        }
        Err(e) => logger::log_error(&format!("Invalid cookie header: {e}")),
    }
}
