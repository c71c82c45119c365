use axum::{
    extract::{Form, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::{info, warn};

use warbler_db::DbError;
use warbler_types::forms::{LoginForm, SignupForm};
use warbler_types::session::FlashCategory;

use crate::pages::{self, PageContext};
use crate::session::Session;
use crate::state::{AppState, run_db};

/// Showing the signup form logs out whoever is logged in.
pub async fn signup_form(mut session: Session) -> Response {
    if session.curr_user().is_some() {
        session.logout();
    }
    let ctx = PageContext::new(&mut session, None);
    let page = pages::signup_form(&ctx, "", "", "", &[]);
    (session, page).into_response()
}

pub async fn signup(
    State(state): State<AppState>,
    mut session: Session,
    Form(form): Form<SignupForm>,
) -> Result<Response, StatusCode> {
    session.verify_csrf(state.config.csrf_enabled, form.csrf_token.as_deref())?;
    if session.curr_user().is_some() {
        session.logout();
    }

    let errors = form.errors();
    if !errors.is_empty() {
        let ctx = PageContext::new(&mut session, None);
        let page = pages::signup_form(&ctx, &form.username, &form.email, &form.image_url, &errors);
        return Ok((session, page).into_response());
    }

    let username = form.username.trim().to_string();
    let email = form.email.trim().to_string();
    let password = form.password.clone();
    let image_url = form.image_url.trim().to_string();

    let created = run_db(&state, move |db| {
        match db.signup(&username, &email, &password, Some(image_url.as_str())) {
            Ok(user) => Ok(Some(user)),
            Err(DbError::Integrity(reason)) => {
                warn!(username = %username, %reason, "Signup rejected");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    })
    .await?;

    let Some(user) = created else {
        session.flash(FlashCategory::Danger, "Username already taken");
        let ctx = PageContext::new(&mut session, None);
        let page = pages::signup_form(&ctx, &form.username, &form.email, &form.image_url, &[]);
        return Ok((session, page).into_response());
    };

    info!(user_id = user.id, username = %user.username, "User signed up");
    session.login(user.id);
    Ok((session, pages::redirect("/")).into_response())
}

pub async fn login_form(mut session: Session) -> Response {
    let ctx = PageContext::new(&mut session, None);
    let page = pages::login_form(&ctx, "", &[]);
    (session, page).into_response()
}

pub async fn login(
    State(state): State<AppState>,
    mut session: Session,
    Form(form): Form<LoginForm>,
) -> Result<Response, StatusCode> {
    session.verify_csrf(state.config.csrf_enabled, form.csrf_token.as_deref())?;

    let errors = form.errors();
    if !errors.is_empty() {
        let ctx = PageContext::new(&mut session, None);
        let page = pages::login_form(&ctx, &form.username, &errors);
        return Ok((session, page).into_response());
    }

    let username = form.username.trim().to_string();
    let password = form.password.clone();
    let user = run_db(&state, move |db| db.authenticate(&username, &password)).await?;

    match user {
        Some(user) => {
            info!(user_id = user.id, "User logged in");
            session.login(user.id);
            session.flash(FlashCategory::Success, format!("Hello, {}!", user.username));
            Ok((session, pages::redirect("/")).into_response())
        }
        None => {
            session.flash(FlashCategory::Danger, "Invalid credentials.");
            let ctx = PageContext::new(&mut session, None);
            let page = pages::login_form(&ctx, &form.username, &[]);
            Ok((session, page).into_response())
        }
    }
}

pub async fn logout(mut session: Session) -> Response {
    if let Some(user_id) = session.logout() {
        info!(user_id, "User logged out");
    }
    session.flash(FlashCategory::Success, "You have successfully logged out.");
    (session, pages::redirect("/login")).into_response()
}
