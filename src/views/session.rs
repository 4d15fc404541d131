//! Admin sign-in and the session guard of the admin panel
//!
//! The access token handed out by the auth service is kept in an HTTP only cookie.
//! Guarded pages check it against the auth service on every request, so an expired
//! or revoked token sends the user back to the login page.

use std::collections::HashMap;

use axum::Extension;
use axum::Form;
use axum::extract::Request;
use axum::extract::State;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::response::Redirect;
use axum::response::Response;
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::Cookie;
use axum_extra::extract::cookie::SameSite;
use backend_client::User;
use maud::Markup;
use maud::html;
use serde::Deserialize;
use serde_json::Value;
use serde_json::json;

use super::AppState;
use super::layout;
use crate::error::CasebookError;
use crate::error::InternalError;
use crate::error::Result;

pub const SESSION_COOKIE: &str = "casebook_session";
pub const LOGIN_PATH: &str = "/admin/login";
const COOKIE_PATH: &str = "/admin";

/// The signed-in administrator, available to every guarded handler
#[derive(Debug, Clone)]
pub struct AdminSession {
    pub user: User,
    pub access_token: String,
}

impl AdminSession {
    pub fn email(&self) -> Option<&str> {
        self.user.email.as_deref()
    }
}

pub type AdminSessionExt = Extension<AdminSession>;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("{message}")]
    SignInRejected { message: String },
}

impl CasebookError for SessionError {
    fn get_status(&self) -> StatusCode {
        StatusCode::UNAUTHORIZED
    }

    fn get_type(&self) -> &str {
        "casebook:session:SignInRejected"
    }

    fn context(&self) -> HashMap<String, Value> {
        HashMap::from([("reason".to_owned(), json!(self.to_string()))])
    }
}

fn session_cookie(access_token: String, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, access_token))
        .path(COOKIE_PATH)
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .build()
}

fn removal_cookie() -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE).path(COOKIE_PATH).build()
}

/// Lets the request through only with a valid session, redirects to the login page otherwise
pub(in crate::views) async fn session_guard(
    State(AppState { backend, .. }): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Result<Response> {
    let Some(access_token) = jar.get(SESSION_COOKIE).map(|c| c.value().to_owned()) else {
        return Ok(Redirect::to(LOGIN_PATH).into_response());
    };
    let Some(user) = backend.get_user(&access_token).await? else {
        tracing::info!("session expired, redirecting to the login page");
        return Ok((jar.remove(removal_cookie()), Redirect::to(LOGIN_PATH)).into_response());
    };
    req.extensions_mut()
        .insert(AdminSession { user, access_token });
    Ok(next.run(req).await)
}

#[derive(Debug, Default, Deserialize)]
pub(in crate::views) struct LoginForm {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

fn login_page(email: &str, error: Option<&str>) -> Markup {
    layout::admin_page(
        "Sign in",
        None,
        html! {
            section.login {
                h1 { "Admin sign in" }
                @if let Some(error) = error {
                    (layout::inline_error(error))
                }
                form method="post" action=(LOGIN_PATH) data-guarded {
                    label for="email" { "Email" }
                    input #email type="email" name="email" value=(email) required autocomplete="username";
                    label for="password" { "Password" }
                    input #password type="password" name="password" required autocomplete="current-password";
                    button type="submit" { "Sign in" }
                }
            }
            (layout::GUARDED_FORM_SCRIPT)
        },
    )
}

pub(in crate::views) async fn login_form() -> Markup {
    login_page("", None)
}

pub(in crate::views) async fn login(
    State(AppState { backend, config, .. }): State<AppState>,
    jar: CookieJar,
    Form(LoginForm { email, password }): Form<LoginForm>,
) -> Response {
    let email = email.trim().to_owned();
    match backend.sign_in_with_password(&email, &password).await {
        Ok(session) => {
            tracing::info!(user_id = %session.user.id, "administrator signed in");
            let cookie = session_cookie(session.access_token, config.secure_cookies);
            (jar.add(cookie), Redirect::to("/admin")).into_response()
        }
        Err(err) => {
            let error = match err {
                backend_client::Error::Api {
                    status, message, ..
                } if status.is_client_error() => {
                    InternalError::from(SessionError::SignInRejected { message })
                }
                err => InternalError::from(err),
            };
            error.log();
            (error.status, login_page(&email, Some(&error.message))).into_response()
        }
    }
}

pub(in crate::views) async fn logout(
    State(AppState { backend, .. }): State<AppState>,
    Extension(session): AdminSessionExt,
    jar: CookieJar,
) -> Response {
    if let Err(err) = backend.sign_out(&session.access_token).await {
        tracing::warn!(error = %err, "sign out failed at the auth service, clearing the session anyway");
    }
    (jar.remove(removal_cookie()), Redirect::to(LOGIN_PATH)).into_response()
}
