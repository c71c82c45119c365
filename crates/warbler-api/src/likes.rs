use axum::{
    Extension,
    extract::{Form, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::{debug, warn};

use warbler_types::forms::CsrfForm;

use crate::extract::Id;
use crate::pages;
use crate::session::{CurrentUser, Session};
use crate::state::{AppState, run_db};

/// Like a message, or unlike it if already liked. Users can't like their own.
pub async fn toggle_like(
    State(state): State<AppState>,
    session: Session,
    Extension(CurrentUser(me)): Extension<CurrentUser>,
    Id(message_id): Id,
    Form(form): Form<CsrfForm>,
) -> Result<Response, StatusCode> {
    session.verify_csrf(state.config.csrf_enabled, form.csrf_token.as_deref())?;

    let row = run_db(&state, move |db| db.get_message(message_id))
        .await?
        .ok_or(StatusCode::NOT_FOUND)?;

    if row.message.user_id == me.id {
        warn!(user_id = me.id, message_id, "Refused like on own message");
        return Err(StatusCode::FORBIDDEN);
    }

    let my_id = me.id;
    let added = run_db(&state, move |db| db.toggle_like(my_id, message_id)).await?;
    debug!(user_id = me.id, message_id, added, "Toggled like");

    Ok((session, pages::redirect("/")).into_response())
}
