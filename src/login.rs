use crate::app::AppState;
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use axum::{
    Form,
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{File, create_dir_all};
use std::io::{Read, Write};
use std::path::Path;
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime};
use uuid::Uuid;

/// A registered account: a unique email plus the Argon2 hash of its
/// password. Created at signup, read at login, never mutated.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Account {
    pub email: String,
    pub password_hash: String,
}

/// Login and signup form payload.
#[derive(Debug, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// An authenticated session.
#[derive(Debug, Clone)]
pub struct Session {
    /// Email of the authenticated account.
    pub email: String,
    /// Time when the session expires.
    pub expires_at: SystemTime,
}

lazy_static! {
    static ref SESSIONS: RwLock<HashMap<String, Session>> = RwLock::new(HashMap::new());
}

const USERS_FILE: &str = "database/users.json";
const DATABASE_DIR: &str = "database";
const SESSION_DURATION: u64 = 24 * 60 * 60; // 24 hours in seconds

/// Create the database directory and accounts file if they don't exist.
/// Called once before the server starts accepting requests.
pub fn init_database() -> std::io::Result<()> {
    if !Path::new(DATABASE_DIR).exists() {
        create_dir_all(DATABASE_DIR)?;
    }

    let users_path = Path::new(USERS_FILE);
    if !users_path.exists() {
        let mut file = File::create(users_path)?;
        file.write_all(b"{}")?;
    }

    Ok(())
}

/// Read every registered account, keyed by email.
pub fn get_accounts() -> Result<HashMap<String, Account>, String> {
    read_accounts_from(Path::new(USERS_FILE))
}

fn read_accounts_from(path: &Path) -> Result<HashMap<String, Account>, String> {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(_) => return Err("Failed to open accounts file".to_string()),
    };

    let mut contents = String::new();
    if file.read_to_string(&mut contents).is_err() {
        return Err("Failed to read accounts file".to_string());
    }

    match serde_json::from_str(&contents) {
        Ok(accounts) => Ok(accounts),
        Err(_) => Err("Failed to parse accounts data".to_string()),
    }
}

fn write_accounts_to(path: &Path, accounts: &HashMap<String, Account>) -> Result<(), String> {
    let json = match serde_json::to_string_pretty(accounts) {
        Ok(json) => json,
        Err(_) => return Err("Failed to serialize accounts data".to_string()),
    };

    let mut file = match File::create(path) {
        Ok(file) => file,
        Err(_) => return Err("Failed to create accounts file".to_string()),
    };

    if file.write_all(json.as_bytes()).is_err() {
        return Err("Failed to write accounts data".to_string());
    }

    Ok(())
}

/// Create a new account. Fails with a user-visible message when a field is
/// empty or the email is already registered; stored state is unchanged on
/// failure.
pub fn register_account(email: &str, password: &str) -> Result<(), String> {
    register_account_at(Path::new(USERS_FILE), email, password)
}

fn register_account_at(path: &Path, email: &str, password: &str) -> Result<(), String> {
    if email.is_empty() || password.is_empty() {
        return Err("Email and password cannot be empty".to_string());
    }

    let mut accounts = read_accounts_from(path)?;
    if accounts.contains_key(email) {
        return Err("User already exists.".to_string());
    }

    let password_hash = hash_password(password)?;
    accounts.insert(
        email.to_string(),
        Account {
            email: email.to_string(),
            password_hash,
        },
    );
    write_accounts_to(path, &accounts)
}

/// Check a login attempt. Unknown email and wrong password are
/// indistinguishable to the caller.
pub fn verify_account(email: &str, password: &str) -> Result<bool, String> {
    verify_account_at(Path::new(USERS_FILE), email, password)
}

fn verify_account_at(path: &Path, email: &str, password: &str) -> Result<bool, String> {
    let accounts = read_accounts_from(path)?;

    if let Some(account) = accounts.get(email) {
        verify_password(password, &account.password_hash)
    } else {
        Ok(false)
    }
}

fn hash_password(password: &str) -> Result<String, String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    match argon2.hash_password(password.as_bytes(), &salt) {
        Ok(hash) => Ok(hash.to_string()),
        Err(_) => Err("Password hashing failed".to_string()),
    }
}

fn verify_password(password: &str, hash: &str) -> Result<bool, String> {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(hash) => hash,
        Err(_) => return Err("Invalid password hash format".to_string()),
    };

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(_) => Ok(true),
        Err(_) => Ok(false), // Password didn't match
    }
}

/// Create and store a session for an authenticated account, returning the
/// session id.
pub fn create_session(email: &str) -> String {
    let session_id = Uuid::new_v4().to_string();
    let expires_at = SystemTime::now() + Duration::from_secs(SESSION_DURATION);

    let session = Session {
        email: email.to_string(),
        expires_at,
    };

    let mut sessions = SESSIONS.write().unwrap();
    sessions.insert(session_id.clone(), session);

    session_id
}

/// The account email for a session id, if the session exists and has not
/// expired.
pub fn validate_session(session_id: &str) -> Option<String> {
    let sessions = SESSIONS.read().unwrap();

    if let Some(session) = sessions.get(session_id) {
        if session.expires_at > SystemTime::now() {
            return Some(session.email.clone());
        }
    }

    None
}

/// Remove a session from the store.
pub fn destroy_session(session_id: &str) {
    let mut sessions = SESSIONS.write().unwrap();
    sessions.remove(session_id);
}

/// The (session id, email) pair for the request's cookie, if any.
pub fn current_session(jar: &CookieJar) -> Option<(String, String)> {
    let cookie = jar.get("session")?;
    let email = validate_session(cookie.value())?;
    Some((cookie.value().to_string(), email))
}

// Web handlers below.

pub async fn serve_login_page() -> Html<&'static str> {
    Html(include_str!("./static/login.html"))
}

pub async fn serve_signup_page() -> Html<&'static str> {
    Html(include_str!("./static/signup.html"))
}

/// Process a login form: on success set the session cookie and redirect to
/// the analysis page, otherwise flash "Invalid credentials".
#[axum::debug_handler]
pub async fn handle_login(jar: CookieJar, Form(credentials): Form<Credentials>) -> Response {
    match verify_account(&credentials.email, &credentials.password) {
        Ok(true) => {
            let session_id = create_session(&credentials.email);
            let cookie = Cookie::new("session", session_id);
            (jar.add(cookie), Redirect::to("/")).into_response()
        }
        Ok(false) => Redirect::to("/login?error=Invalid+credentials").into_response(),
        Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Authentication error").into_response(),
    }
}

/// Process a signup form: duplicate accounts and empty fields flash a
/// message back to the signup page; success redirects to login.
pub async fn handle_signup(Form(credentials): Form<Credentials>) -> Redirect {
    match register_account(&credentials.email, &credentials.password) {
        Ok(_) => Redirect::to("/login?message=Signup+successful!+Please+log+in."),
        Err(e) => {
            let encoded = urlencoding::encode(&e).into_owned();
            Redirect::to(&format!("/signup?error={}", encoded))
        }
    }
}

/// Clear the session and its stored table, then return to the login page.
pub async fn handle_logout(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> (CookieJar, Redirect) {
    if let Some(cookie) = jar.get("session") {
        state.drop_table(cookie.value());
        destroy_session(cookie.value());
    }

    let cookie = Cookie::new("session", "");
    (jar.add(cookie), Redirect::to("/login"))
}

/// Middleware guarding the analysis routes: requests without a valid
/// session are redirected to the login page.
pub async fn require_auth(
    jar: CookieJar,
    mut request: axum::extract::Request,
    next: axum::middleware::Next,
) -> Response {
    if let Some(session_cookie) = jar.get("session") {
        if let Some(email) = validate_session(session_cookie.value()) {
            request.extensions_mut().insert(email);
            return next.run(request).await;
        }
    }

    Redirect::to("/login").into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn password_hash_round_trip() {
        let hash = hash_password("hunter2").unwrap();
        assert!(verify_password("hunter2", &hash).unwrap());
        assert!(!verify_password("hunter3", &hash).unwrap());
    }

    #[test]
    fn hashes_are_salted() {
        let a = hash_password("same").unwrap();
        let b = hash_password("same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn signup_then_login_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("users.json");
        std::fs::write(&path, "{}").unwrap();

        register_account_at(&path, "a@example.com", "pw").unwrap();
        assert!(verify_account_at(&path, "a@example.com", "pw").unwrap());
        assert!(!verify_account_at(&path, "a@example.com", "wrong").unwrap());
        assert!(!verify_account_at(&path, "b@example.com", "pw").unwrap());
    }

    #[test]
    fn duplicate_signup_is_rejected_and_state_unchanged() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("users.json");
        std::fs::write(&path, "{}").unwrap();

        register_account_at(&path, "a@example.com", "pw").unwrap();
        let before = std::fs::read_to_string(&path).unwrap();
        let err = register_account_at(&path, "a@example.com", "other").unwrap_err();
        assert_eq!(err, "User already exists.");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
    }

    #[test]
    fn empty_fields_are_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("users.json");
        std::fs::write(&path, "{}").unwrap();
        assert!(register_account_at(&path, "", "pw").is_err());
        assert!(register_account_at(&path, "a@example.com", "").is_err());
    }

    #[test]
    fn sessions_validate_until_destroyed() {
        let id = create_session("a@example.com");
        assert_eq!(validate_session(&id), Some("a@example.com".to_string()));
        destroy_session(&id);
        assert_eq!(validate_session(&id), None);
        assert_eq!(validate_session("not-a-session"), None);
    }
}
