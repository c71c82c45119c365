use std::collections::HashSet;

use axum::{
    Extension,
    extract::{Form, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::{info, warn};

use warbler_types::forms::{CsrfForm, MessageForm};
use warbler_types::session::FlashCategory;

use crate::FEED_LIMIT;
use crate::extract::Id;
use crate::pages::{self, PageContext};
use crate::session::{CurrentUser, Session, current_user};
use crate::state::{AppState, run_db};

/// Feed of the user's and their followees' messages, or the landing page.
pub async fn homepage(
    State(state): State<AppState>,
    mut session: Session,
) -> Result<Response, StatusCode> {
    let Some(me) = current_user(&state, &session).await? else {
        let ctx = PageContext::new(&mut session, None);
        let page = pages::home_anon(&ctx);
        return Ok((session, page).into_response());
    };

    let my_id = me.id;
    let (feed, stats, liked) = run_db(&state, move |db| {
        Ok((
            db.home_feed(my_id, FEED_LIMIT)?,
            db.user_stats(my_id)?,
            db.liked_message_ids(my_id)?,
        ))
    })
    .await?;

    let liked: HashSet<i64> = liked.into_iter().collect();
    let ctx = PageContext::new(&mut session, Some(me.clone()));
    let page = pages::home(&ctx, &me, stats, &feed, &liked);
    Ok((session, page).into_response())
}

pub async fn new_message_form(
    mut session: Session,
    Extension(CurrentUser(me)): Extension<CurrentUser>,
) -> Response {
    let ctx = PageContext::new(&mut session, Some(me));
    let page = pages::new_message_form(&ctx, "", &[]);
    (session, page).into_response()
}

pub async fn create_message(
    State(state): State<AppState>,
    mut session: Session,
    Extension(CurrentUser(me)): Extension<CurrentUser>,
    Form(form): Form<MessageForm>,
) -> Result<Response, StatusCode> {
    session.verify_csrf(state.config.csrf_enabled, form.csrf_token.as_deref())?;

    let errors = form.errors();
    if !errors.is_empty() {
        let ctx = PageContext::new(&mut session, Some(me));
        let page = pages::new_message_form(&ctx, &form.text, &errors);
        return Ok((session, page).into_response());
    }

    let my_id = me.id;
    let text = form.text.trim().to_string();
    let message = run_db(&state, move |db| db.create_message(my_id, &text)).await?;
    info!(user_id = me.id, message_id = message.id, "Message posted");

    Ok((session, pages::redirect(&format!("/users/{}", me.id))).into_response())
}

pub async fn show_message(
    State(state): State<AppState>,
    mut session: Session,
    Id(message_id): Id,
) -> Result<Response, StatusCode> {
    let me = current_user(&state, &session).await?;
    let my_id = me.as_ref().map(|u| u.id);

    let (row, liked) = run_db(&state, move |db| {
        let row = db.get_message(message_id)?;
        let liked = match my_id {
            Some(id) => db.liked_message_ids(id)?.contains(&message_id),
            None => false,
        };
        Ok((row, liked))
    })
    .await?;
    let row = row.ok_or(StatusCode::NOT_FOUND)?;

    let ctx = PageContext::new(&mut session, me);
    let page = pages::show_message(&ctx, &row, liked);
    Ok((session, page).into_response())
}

/// Only the author may delete a message.
pub async fn delete_message(
    State(state): State<AppState>,
    mut session: Session,
    Extension(CurrentUser(me)): Extension<CurrentUser>,
    Id(message_id): Id,
    Form(form): Form<CsrfForm>,
) -> Result<Response, StatusCode> {
    session.verify_csrf(state.config.csrf_enabled, form.csrf_token.as_deref())?;

    let row = run_db(&state, move |db| db.get_message(message_id))
        .await?
        .ok_or(StatusCode::NOT_FOUND)?;

    if row.message.user_id != me.id {
        warn!(user_id = me.id, message_id, "Refused to delete another user's message");
        session.flash(FlashCategory::Danger, "Access unauthorized.");
        return Ok((session, pages::redirect("/")).into_response());
    }

    run_db(&state, move |db| db.delete_message(message_id)).await?;
    info!(user_id = me.id, message_id, "Message deleted");

    Ok((session, pages::redirect(&format!("/users/{}", me.id))).into_response())
}
