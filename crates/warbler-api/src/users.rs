use std::collections::HashSet;

use axum::{
    Extension,
    extract::{Form, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::{info, warn};

use warbler_db::DbError;
use warbler_db::models::{ProfileUpdate, UserRow, UserStats};
use warbler_types::forms::{CsrfForm, ProfileForm, SearchQuery};
use warbler_types::session::FlashCategory;

use crate::FEED_LIMIT;
use crate::extract::Id;
use crate::pages::{self, PageContext, Profile};
use crate::session::{CurrentUser, Session, current_user};
use crate::state::{AppState, run_db};

struct ProfileData {
    user: UserRow,
    stats: UserStats,
    followed_by_me: bool,
}

impl ProfileData {
    fn view(&self) -> Profile<'_> {
        Profile {
            user: &self.user,
            stats: self.stats,
            followed_by_me: self.followed_by_me,
        }
    }
}

/// 404 when the user doesn't exist.
async fn load_profile(
    state: &AppState,
    user_id: i64,
    viewer: Option<UserRow>,
) -> Result<ProfileData, StatusCode> {
    run_db(state, move |db| {
        let Some(user) = db.get_user(user_id)? else {
            return Ok(None);
        };
        let stats = db.user_stats(user.id)?;
        let followed_by_me = match &viewer {
            Some(viewer) if viewer.id != user.id => db.is_following(viewer, &user)?,
            _ => false,
        };
        Ok(Some(ProfileData {
            user,
            stats,
            followed_by_me,
        }))
    })
    .await?
    .ok_or(StatusCode::NOT_FOUND)
}

pub async fn list_users(
    State(state): State<AppState>,
    mut session: Session,
    Query(query): Query<SearchQuery>,
) -> Result<Response, StatusCode> {
    let me = current_user(&state, &session).await?;
    let my_id = me.as_ref().map(|u| u.id);
    let q = query.q.clone();

    let (users, my_following) = run_db(&state, move |db| {
        let users = db.search_users(q.as_deref())?;
        let my_following = match my_id {
            Some(id) => db.following_ids(id)?,
            None => Vec::new(),
        };
        Ok((users, my_following))
    })
    .await?;

    let my_following: HashSet<i64> = my_following.into_iter().collect();
    let ctx = PageContext::new(&mut session, me);
    let page = pages::users_index(&ctx, &users, &my_following, query.q.as_deref());
    Ok((session, page).into_response())
}

pub async fn show_user(
    State(state): State<AppState>,
    mut session: Session,
    Id(user_id): Id,
) -> Result<Response, StatusCode> {
    let me = current_user(&state, &session).await?;
    let profile = load_profile(&state, user_id, me.clone()).await?;
    let my_id = me.as_ref().map(|u| u.id);

    let (messages, liked) = run_db(&state, move |db| {
        let messages = db.messages_for_user(user_id, FEED_LIMIT)?;
        let liked = match my_id {
            Some(id) => db.liked_message_ids(id)?,
            None => Vec::new(),
        };
        Ok((messages, liked))
    })
    .await?;

    let liked: HashSet<i64> = liked.into_iter().collect();
    let ctx = PageContext::new(&mut session, me);
    let page = pages::user_detail(&ctx, &profile.view(), &messages, &liked);
    Ok((session, page).into_response())
}

#[derive(Clone, Copy)]
enum FollowDirection {
    Following,
    Followers,
}

async fn follow_page(
    state: AppState,
    mut session: Session,
    me: UserRow,
    user_id: i64,
    direction: FollowDirection,
) -> Result<Response, StatusCode> {
    let profile = load_profile(&state, user_id, Some(me.clone())).await?;
    let my_id = me.id;

    let (users, my_following) = run_db(&state, move |db| {
        let users = match direction {
            FollowDirection::Following => db.following(user_id)?,
            FollowDirection::Followers => db.followers(user_id)?,
        };
        Ok((users, db.following_ids(my_id)?))
    })
    .await?;

    let heading = match direction {
        FollowDirection::Following => "Following",
        FollowDirection::Followers => "Followers",
    };
    let my_following: HashSet<i64> = my_following.into_iter().collect();
    let ctx = PageContext::new(&mut session, Some(me));
    let page = pages::follow_list(&ctx, &profile.view(), heading, &users, &my_following);
    Ok((session, page).into_response())
}

pub async fn show_following(
    State(state): State<AppState>,
    session: Session,
    Extension(CurrentUser(me)): Extension<CurrentUser>,
    Id(user_id): Id,
) -> Result<Response, StatusCode> {
    follow_page(state, session, me, user_id, FollowDirection::Following).await
}

pub async fn show_followers(
    State(state): State<AppState>,
    session: Session,
    Extension(CurrentUser(me)): Extension<CurrentUser>,
    Id(user_id): Id,
) -> Result<Response, StatusCode> {
    follow_page(state, session, me, user_id, FollowDirection::Followers).await
}

pub async fn show_likes(
    State(state): State<AppState>,
    mut session: Session,
    Extension(CurrentUser(me)): Extension<CurrentUser>,
    Id(user_id): Id,
) -> Result<Response, StatusCode> {
    let profile = load_profile(&state, user_id, Some(me.clone())).await?;
    let my_id = me.id;

    let (messages, liked) = run_db(&state, move |db| {
        Ok((db.liked_messages(user_id)?, db.liked_message_ids(my_id)?))
    })
    .await?;

    let liked: HashSet<i64> = liked.into_iter().collect();
    let ctx = PageContext::new(&mut session, Some(me));
    let page = pages::likes(&ctx, &profile.view(), &messages, &liked);
    Ok((session, page).into_response())
}

pub async fn follow(
    State(state): State<AppState>,
    mut session: Session,
    Extension(CurrentUser(me)): Extension<CurrentUser>,
    Id(follow_id): Id,
    Form(form): Form<CsrfForm>,
) -> Result<Response, StatusCode> {
    session.verify_csrf(state.config.csrf_enabled, form.csrf_token.as_deref())?;

    if follow_id == me.id {
        session.flash(FlashCategory::Warning, "You can't follow yourself.");
        return Ok((session, pages::redirect(&format!("/users/{}", me.id))).into_response());
    }

    let my_id = me.id;
    let found = run_db(&state, move |db| {
        if db.get_user(follow_id)?.is_none() {
            return Ok(false);
        }
        db.add_follow(my_id, follow_id)?;
        Ok(true)
    })
    .await?;
    if !found {
        return Err(StatusCode::NOT_FOUND);
    }

    info!(user_id = me.id, follow_id, "Followed user");
    Ok((session, pages::redirect(&format!("/users/{}/following", me.id))).into_response())
}

pub async fn stop_following(
    State(state): State<AppState>,
    session: Session,
    Extension(CurrentUser(me)): Extension<CurrentUser>,
    Id(follow_id): Id,
    Form(form): Form<CsrfForm>,
) -> Result<Response, StatusCode> {
    session.verify_csrf(state.config.csrf_enabled, form.csrf_token.as_deref())?;

    let my_id = me.id;
    let removed = run_db(&state, move |db| db.remove_follow(my_id, follow_id)).await?;
    if removed {
        info!(user_id = me.id, follow_id, "Unfollowed user");
    }

    Ok((session, pages::redirect(&format!("/users/{}/following", me.id))).into_response())
}

pub async fn profile_form(
    mut session: Session,
    Extension(CurrentUser(me)): Extension<CurrentUser>,
) -> Response {
    let ctx = PageContext::new(&mut session, Some(me.clone()));
    let page = pages::edit_profile_form(&ctx, &me, &[]);
    (session, page).into_response()
}

/// Requires the current password; a wrong one sends the user home.
pub async fn update_profile(
    State(state): State<AppState>,
    mut session: Session,
    Extension(CurrentUser(me)): Extension<CurrentUser>,
    Form(form): Form<ProfileForm>,
) -> Result<Response, StatusCode> {
    session.verify_csrf(state.config.csrf_enabled, form.csrf_token.as_deref())?;

    let errors = form.errors();
    if !errors.is_empty() {
        let ctx = PageContext::new(&mut session, Some(me.clone()));
        let page = pages::edit_profile_form(&ctx, &me, &errors);
        return Ok((session, page).into_response());
    }

    let username = me.username.clone();
    let password = form.password.clone();
    let authed = run_db(&state, move |db| db.authenticate(&username, &password)).await?;
    if authed.is_none() {
        warn!(user_id = me.id, "Profile update with wrong password");
        session.flash(FlashCategory::Danger, "Wrong password, please try again.");
        return Ok((session, pages::redirect("/")).into_response());
    }

    let update = ProfileUpdate {
        username: form.username.trim().to_string(),
        email: form.email.trim().to_string(),
        image_url: Some(form.image_url.clone()),
        header_image_url: Some(form.header_image_url.clone()),
        bio: Some(form.bio.clone()),
        location: Some(form.location.clone()),
    };
    let my_id = me.id;
    let updated = run_db(&state, move |db| match db.update_user(my_id, &update) {
        Ok(user) => Ok(Some(user)),
        Err(DbError::Integrity(_)) => Ok(None),
        Err(e) => Err(e),
    })
    .await?;

    match updated {
        Some(user) => {
            info!(user_id = user.id, "Profile updated");
            Ok((session, pages::redirect(&format!("/users/{}", user.id))).into_response())
        }
        None => {
            session.flash(FlashCategory::Danger, "Username or email already taken");
            let ctx = PageContext::new(&mut session, Some(me.clone()));
            let page = pages::edit_profile_form(&ctx, &me, &[]);
            Ok((session, page).into_response())
        }
    }
}

pub async fn delete_user(
    State(state): State<AppState>,
    mut session: Session,
    Extension(CurrentUser(me)): Extension<CurrentUser>,
    Form(form): Form<CsrfForm>,
) -> Result<Response, StatusCode> {
    session.verify_csrf(state.config.csrf_enabled, form.csrf_token.as_deref())?;

    session.logout();
    let my_id = me.id;
    run_db(&state, move |db| db.delete_user(my_id)).await?;
    info!(user_id = me.id, "User deleted");

    Ok((session, pages::redirect("/signup")).into_response())
}
