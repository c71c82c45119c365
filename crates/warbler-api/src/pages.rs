//! Server-rendered HTML pages.

use std::collections::HashSet;
use std::fmt::Write;

use axum::{
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
};

use warbler_db::models::{TimelineRow, UserRow, UserStats};
use warbler_types::session::Flash;

use crate::session::Session;

/// Per-request data every page needs: who is logged in, pending flashes and
/// the CSRF token for forms.
pub struct PageContext {
    pub current_user: Option<UserRow>,
    pub flashes: Vec<Flash>,
    pub csrf_token: String,
}

impl PageContext {
    /// Drains the session's flashes.
    pub fn new(session: &mut Session, current_user: Option<UserRow>) -> Self {
        Self {
            current_user,
            flashes: session.take_flashes(),
            csrf_token: session.csrf_token(),
        }
    }

    fn current_user_id(&self) -> Option<i64> {
        self.current_user.as_ref().map(|u| u.id)
    }

    fn csrf_input(&self) -> String {
        format!(
            r#"<input type="hidden" name="csrf_token" value="{}">"#,
            escape(&self.csrf_token)
        )
    }
}

/// Profile data shared by the user detail, follows and likes pages.
pub struct Profile<'a> {
    pub user: &'a UserRow,
    pub stats: UserStats,
    pub followed_by_me: bool,
}

/// A 302 with the small HTML body browsers show if they don't follow it.
pub fn redirect(location: &str) -> Response {
    let target = escape(location);
    let body = format!(
        "<!doctype html>\n<html lang=en>\n<title>Redirecting...</title>\n\
         <h1>Redirecting...</h1>\n\
         <p>You should be redirected automatically to the target URL: \
         <a href=\"{target}\">{target}</a>. If not, click the link.\n"
    );
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())], Html(body)).into_response()
}

pub fn not_found() -> Response {
    let body = r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="UTF-8"><title>Warbler: not found</title>
<link rel="stylesheet" href="/static/stylesheets/style.css"></head>
<body class="not-found">
<div class="container">
  <h1>404</h1>
  <p>The page you requested does not exist. <a href="/">Go home</a>.</p>
</div>
</body>
</html>
"#;
    (StatusCode::NOT_FOUND, Html(body)).into_response()
}

pub fn home_anon(ctx: &PageContext) -> Html<String> {
    let body = r#"<div class="home-hero">
  <h1>What's Happening?</h1>
  <h4>New to Warbler?</h4>
  <a href="/signup" class="btn btn-primary">Sign up now</a>
</div>"#;
    layout(ctx, "Warbler", "", body)
}

pub fn home(ctx: &PageContext, me: &UserRow, stats: UserStats, feed: &[TimelineRow], liked: &HashSet<i64>) -> Html<String> {
    let mut body = String::new();
    let _ = write!(
        body,
        r#"<div class="row">
  <aside class="col-md-4 col-lg-3 col-sm-12" id="home-aside">
    <div class="card user-card">
      <a href="/users/{id}" class="card-link">
        <img src="{image}" alt="Image for {username}" class="card-image">
        <p>@{username}</p>
      </a>
      <ul class="user-stats nav nav-pills">
        <li class="stat"><p class="small">Messages</p><h4><a href="/users/{id}">{messages}</a></h4></li>
        <li class="stat"><p class="small">Following</p><h4><a href="/users/{id}/following">{following}</a></h4></li>
        <li class="stat"><p class="small">Followers</p><h4><a href="/users/{id}/followers">{followers}</a></h4></li>
      </ul>
    </div>
  </aside>
  <div class="col-lg-6 col-md-8 col-sm-12">
"#,
        id = me.id,
        image = escape(&me.image_url),
        username = escape(&me.username),
        messages = stats.messages,
        following = stats.following,
        followers = stats.followers,
    );
    body.push_str(&message_list(ctx, feed, liked));
    body.push_str("  </div>\n</div>");

    layout(ctx, "Warbler", "", &body)
}

pub fn user_detail(ctx: &PageContext, profile: &Profile<'_>, messages: &[TimelineRow], liked: &HashSet<i64>) -> Html<String> {
    let user = profile.user;
    let mut body = profile_header(ctx, profile);
    body.push_str(r#"<div class="col-lg-6 col-md-8 col-sm-12">"#);
    body.push('\n');
    body.push_str(&message_list(ctx, messages, liked));
    body.push_str("</div>\n");

    layout(ctx, &format!("Warbler: @{}", user.username), "", &body)
}

/// Followers or following list for `profile.user`.
pub fn follow_list(
    ctx: &PageContext,
    profile: &Profile<'_>,
    heading: &str,
    users: &[UserRow],
    my_following: &HashSet<i64>,
) -> Html<String> {
    let mut body = profile_header(ctx, profile);
    let _ = write!(
        body,
        "<div class=\"col-sm-9\">\n<h2 class=\"follow-heading\">{}</h2>\n",
        escape(heading)
    );
    body.push_str(&user_cards(ctx, users, my_following));
    body.push_str("</div>\n");

    layout(
        ctx,
        &format!("Warbler: @{} {}", profile.user.username, heading.to_lowercase()),
        "",
        &body,
    )
}

pub fn likes(ctx: &PageContext, profile: &Profile<'_>, messages: &[TimelineRow], liked: &HashSet<i64>) -> Html<String> {
    let mut body = profile_header(ctx, profile);
    body.push_str("<div class=\"col-lg-6 col-md-8 col-sm-12\">\n<h2>Likes</h2>\n");
    body.push_str(&message_list(ctx, messages, liked));
    body.push_str("</div>\n");

    layout(ctx, &format!("Warbler: @{} likes", profile.user.username), "", &body)
}

pub fn users_index(ctx: &PageContext, users: &[UserRow], my_following: &HashSet<i64>, q: Option<&str>) -> Html<String> {
    let mut body = String::new();
    if users.is_empty() {
        body.push_str("<h3>Sorry, no users found</h3>\n");
    } else {
        body.push_str(&user_cards(ctx, users, my_following));
    }
    layout(ctx, "Warbler: users", q.unwrap_or(""), &body)
}

pub fn signup_form(ctx: &PageContext, username: &str, email: &str, image_url: &str, errors: &[&str]) -> Html<String> {
    let body = format!(
        r#"<div class="row justify-content-md-center">
  <div class="col-md-7 col-lg-5">
    <h2 class="join-message">Join Warbler today.</h2>
    {errors}
    <form method="POST" id="user_form" action="/signup">
      {csrf}
      <input class="form-control" name="username" placeholder="Username" value="{username}">
      <input class="form-control" name="email" type="email" placeholder="E-mail" value="{email}">
      <input class="form-control" name="password" type="password" placeholder="Password">
      <input class="form-control" name="image_url" placeholder="(Optional) Image URL" value="{image_url}">
      <button class="btn btn-primary btn-lg btn-block">Sign me up!</button>
    </form>
  </div>
</div>"#,
        errors = form_errors(errors),
        csrf = ctx.csrf_input(),
        username = escape(username),
        email = escape(email),
        image_url = escape(image_url),
    );
    layout(ctx, "Warbler: sign up", "", &body)
}

pub fn login_form(ctx: &PageContext, username: &str, errors: &[&str]) -> Html<String> {
    let body = format!(
        r#"<div class="row justify-content-md-center">
  <div class="col-md-7 col-lg-5">
    <h2 class="join-message">Welcome back.</h2>
    {errors}
    <form method="POST" id="user_form" action="/login">
      {csrf}
      <input class="form-control" name="username" placeholder="Username" value="{username}">
      <input class="form-control" name="password" type="password" placeholder="Password">
      <button class="btn btn-primary btn-block btn-lg">Log in</button>
    </form>
  </div>
</div>"#,
        errors = form_errors(errors),
        csrf = ctx.csrf_input(),
        username = escape(username),
    );
    layout(ctx, "Warbler: log in", "", &body)
}

pub fn new_message_form(ctx: &PageContext, text: &str, errors: &[&str]) -> Html<String> {
    let body = format!(
        r#"<div class="row justify-content-md-center">
  <div class="col-md-7 col-lg-5">
    {errors}
    <form method="POST" action="/messages/new">
      {csrf}
      <textarea class="form-control" name="text" rows="3" maxlength="140" placeholder="What's happening?">{text}</textarea>
      <button class="btn btn-outline-success btn-block">Add my message!</button>
    </form>
  </div>
</div>"#,
        errors = form_errors(errors),
        csrf = ctx.csrf_input(),
        text = escape(text),
    );
    layout(ctx, "Warbler: new message", "", &body)
}

pub fn edit_profile_form(ctx: &PageContext, user: &UserRow, errors: &[&str]) -> Html<String> {
    let body = format!(
        r#"<div class="row justify-content-md-center">
  <div class="col-md-7 col-lg-5">
    <h2 class="join-message">Edit Your Profile.</h2>
    {errors}
    <form method="POST" id="user_form" action="/users/profile">
      {csrf}
      <input class="form-control" name="username" placeholder="Username" value="{username}">
      <input class="form-control" name="email" type="email" placeholder="E-mail" value="{email}">
      <input class="form-control" name="image_url" placeholder="(Optional) Image URL" value="{image_url}">
      <input class="form-control" name="header_image_url" placeholder="(Optional) Header Image URL" value="{header_image_url}">
      <textarea class="form-control" name="bio" placeholder="(Optional) Tell us about yourself">{bio}</textarea>
      <input class="form-control" name="location" placeholder="(Optional) Location" value="{location}">
      <p>To confirm changes, enter your password:</p>
      <input class="form-control" name="password" type="password" placeholder="Password">
      <div class="edit-btn-area">
        <button class="btn btn-success">Edit this user!</button>
        <a href="/users/{id}" class="btn btn-outline-secondary">Cancel</a>
      </div>
    </form>
  </div>
</div>"#,
        errors = form_errors(errors),
        csrf = ctx.csrf_input(),
        username = escape(&user.username),
        email = escape(&user.email),
        image_url = escape(&user.image_url),
        header_image_url = escape(&user.header_image_url),
        bio = escape(user.bio.as_deref().unwrap_or("")),
        location = escape(user.location.as_deref().unwrap_or("")),
        id = user.id,
    );
    layout(ctx, "Warbler: edit profile", "", &body)
}

pub fn show_message(ctx: &PageContext, row: &TimelineRow, liked: bool) -> Html<String> {
    let msg = &row.message;
    let mut actions = String::new();
    match ctx.current_user_id() {
        Some(me) if me == msg.user_id => {
            let _ = write!(
                actions,
                r#"<form method="POST" action="/messages/{id}/delete">{csrf}<button class="btn btn-outline-danger">Delete</button></form>"#,
                id = msg.id,
                csrf = ctx.csrf_input(),
            );
        }
        Some(_) => actions.push_str(&like_button(ctx, msg.id, liked)),
        None => {}
    }

    let body = format!(
        r#"<div class="bg"></div>
<div class="row justify-content-center">
  <div class="col-md-6">
    <ul class="list-group no-hover" id="messages">
      <li class="list-group-item">
        <a href="/users/{user_id}"><img src="{image}" alt="" class="timeline-image"></a>
        <div class="message-area">
          <div class="message-heading">
            <a href="/users/{user_id}">@{username}</a>
            {actions}
          </div>
          <p class="single-message">{text}</p>
          <span class="text-muted">{date}</span>
        </div>
      </li>
    </ul>
  </div>
</div>"#,
        user_id = msg.user_id,
        image = escape(&row.author_image_url),
        username = escape(&row.author_username),
        text = escape(&msg.text),
        date = msg.timestamp.format("%d %B %Y"),
    );
    layout(ctx, "Warbler: message", "", &body)
}

fn profile_header(ctx: &PageContext, profile: &Profile<'_>) -> String {
    let user = profile.user;
    let stats = profile.stats;

    let action = match ctx.current_user_id() {
        Some(me) if me == user.id => format!(
            r#"<a href="/users/profile" class="btn btn-outline-secondary">Edit Profile</a>
          <form method="POST" action="/users/delete" class="form-inline">{csrf}<button class="btn btn-outline-danger ml-2">Delete Profile</button></form>"#,
            csrf = ctx.csrf_input(),
        ),
        Some(_) => follow_button(ctx, user.id, profile.followed_by_me),
        None => String::new(),
    };

    format!(
        r#"<div id="warbler-hero" class="full-width"><img src="{header}" alt="" class="hero-image"></div>
<img src="{image}" alt="Image for {username}" id="profile-avatar">
<div class="row full-width">
  <div class="container">
    <div class="row justify-content-end">
      <div class="col-9">
        <ul class="user-stats nav nav-pills">
          <li class="stat"><p class="small">Messages</p><h4><a href="/users/{id}">{messages}</a></h4></li>
          <li class="stat"><p class="small">Following</p><h4><a href="/users/{id}/following">{following}</a></h4></li>
          <li class="stat"><p class="small">Followers</p><h4><a href="/users/{id}/followers">{followers}</a></h4></li>
          <li class="stat"><p class="small">Likes</p><h4><a href="/users/{id}/likes">{likes}</a></h4></li>
          <div class="ml-auto">
          {action}
          </div>
        </ul>
      </div>
    </div>
  </div>
</div>
<div class="row">
  <div class="col-sm-3">
    <h4 id="sidebar-username">@{username}</h4>
    <p class="user-bio">{bio}</p>
    <p class="user-location"><span class="fa fa-map-marker"></span>{location}</p>
  </div>
"#,
        header = escape(&user.header_image_url),
        image = escape(&user.image_url),
        username = escape(&user.username),
        id = user.id,
        messages = stats.messages,
        following = stats.following,
        followers = stats.followers,
        likes = stats.likes,
        action = action,
        bio = escape(user.bio.as_deref().unwrap_or("")),
        location = escape(user.location.as_deref().unwrap_or("")),
    )
}

fn message_list(ctx: &PageContext, rows: &[TimelineRow], liked: &HashSet<i64>) -> String {
    let mut out = String::from("<ul class=\"list-group\" id=\"messages\">\n");
    for row in rows {
        let msg = &row.message;
        let like = match ctx.current_user_id() {
            Some(me) if me != msg.user_id => like_button(ctx, msg.id, liked.contains(&msg.id)),
            _ => String::new(),
        };
        let _ = write!(
            out,
            r#"  <li class="list-group-item">
    <a href="/messages/{id}" class="message-link"></a>
    <a href="/users/{user_id}"><img src="{image}" alt="" class="timeline-image"></a>
    <div class="message-area">
      <a href="/users/{user_id}">@{username}</a>
      <span class="text-muted">{date}</span>
      <p>{text}</p>
    </div>
    {like}
  </li>
"#,
            id = msg.id,
            user_id = msg.user_id,
            image = escape(&row.author_image_url),
            username = escape(&row.author_username),
            date = msg.timestamp.format("%d %B %Y"),
            text = escape(&msg.text),
        );
    }
    out.push_str("</ul>\n");
    out
}

fn user_cards(ctx: &PageContext, users: &[UserRow], my_following: &HashSet<i64>) -> String {
    let mut out = String::from("<div class=\"row\">\n");
    for user in users {
        let button = match ctx.current_user_id() {
            Some(me) if me != user.id => follow_button(ctx, user.id, my_following.contains(&user.id)),
            _ => String::new(),
        };
        let _ = write!(
            out,
            r#"  <div class="col-lg-4 col-md-6 col-12">
    <div class="card user-card">
      <div class="card-inner">
        <div class="image-wrapper"><img src="{header}" alt="" class="card-hero"></div>
        <div class="card-contents">
          <a href="/users/{id}" class="card-link">
            <img src="{image}" alt="Image for {username}" class="card-image">
            <p>@{username}</p>
          </a>
          {button}
        </div>
        <p class="card-bio">{bio}</p>
      </div>
    </div>
  </div>
"#,
            header = escape(&user.header_image_url),
            id = user.id,
            image = escape(&user.image_url),
            username = escape(&user.username),
            bio = escape(user.bio.as_deref().unwrap_or("")),
        );
    }
    out.push_str("</div>\n");
    out
}

fn follow_button(ctx: &PageContext, user_id: i64, following: bool) -> String {
    if following {
        format!(
            r#"<form method="POST" action="/users/stop-following/{user_id}">{csrf}<button class="btn btn-primary btn-sm">Unfollow</button></form>"#,
            csrf = ctx.csrf_input(),
        )
    } else {
        format!(
            r#"<form method="POST" action="/users/follow/{user_id}">{csrf}<button class="btn btn-outline-primary btn-sm">Follow</button></form>"#,
            csrf = ctx.csrf_input(),
        )
    }
}

fn like_button(ctx: &PageContext, message_id: i64, liked: bool) -> String {
    let class = if liked { "btn-primary" } else { "btn-secondary" };
    format!(
        r#"<form method="POST" action="/users/add_like/{message_id}" class="messages-like">{csrf}<button class="btn btn-sm {class}"><i class="fa fa-thumbs-up"></i></button></form>"#,
        csrf = ctx.csrf_input(),
    )
}

fn form_errors(errors: &[&str]) -> String {
    errors
        .iter()
        .map(|e| format!(r#"<span class="text-danger">{}</span>"#, escape(e)))
        .collect::<Vec<_>>()
        .join("\n    ")
}

fn layout(ctx: &PageContext, title: &str, search: &str, content: &str) -> Html<String> {
    let nav = match &ctx.current_user {
        Some(user) => format!(
            r#"<li><a href="/users/{id}"><img src="{image}" alt="{username}"></a></li>
        <li><a href="/messages/new">New Message</a></li>
        <li><a href="/logout">Log out</a></li>"#,
            id = user.id,
            image = escape(&user.image_url),
            username = escape(&user.username),
        ),
        None => r#"<li><a href="/signup">Sign up</a></li>
        <li><a href="/login">Log in</a></li>"#
            .to_string(),
    };

    let mut flashes = String::new();
    for flash in &ctx.flashes {
        let _ = write!(
            flashes,
            "  <div class=\"alert alert-{}\">{}</div>\n",
            flash.category.as_str(),
            escape(&flash.message)
        );
    }

    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <title>{title}</title>
  <link rel="stylesheet" href="/static/stylesheets/style.css">
  <link rel="shortcut icon" href="/static/favicon.ico">
</head>
<body class="{body_class}">
<nav class="navbar navbar-expand">
  <div class="container-fluid">
    <div class="navbar-header">
      <a href="/" class="navbar-brand"><span>Warbler</span></a>
    </div>
    <ul class="nav navbar-nav navbar-right">
      <li>
        <form class="navbar-form navbar-right" action="/users">
          <input name="q" class="form-control" placeholder="Search Warbler" id="search" value="{search}">
          <button class="btn btn-default"><span class="fa fa-search"></span></button>
        </form>
      </li>
        {nav}
    </ul>
  </div>
</nav>
<div class="container">
{flashes}{content}
</div>
</body>
</html>
"#,
        title = escape(title),
        body_class = if ctx.current_user.is_some() { "stream" } else { "onboarding" },
        search = escape(search),
    ))
}

pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_markup() {
        assert_eq!(
            escape(r#"<b>"Tom" & 'Jerry'</b>"#),
            "&lt;b&gt;&quot;Tom&quot; &amp; &#39;Jerry&#39;&lt;/b&gt;"
        );
    }

    #[test]
    fn redirect_is_a_302_with_a_link() {
        let res = redirect("/login");
        assert_eq!(res.status(), StatusCode::FOUND);
        assert_eq!(res.headers()[header::LOCATION], "/login");
    }

    #[test]
    fn header_image_stays_inside_its_attribute() {
        let user = UserRow {
            id: 1,
            email: "test@test.com".into(),
            username: "testuser".into(),
            image_url: "/static/images/default-pic.svg".into(),
            header_image_url: "x'); background: url('https://evil.example/".into(),
            bio: None,
            location: None,
            password: String::new(),
        };
        let ctx = PageContext {
            current_user: None,
            flashes: Vec::new(),
            csrf_token: String::new(),
        };
        let profile = Profile {
            user: &user,
            stats: UserStats::default(),
            followed_by_me: false,
        };

        let html = profile_header(&ctx, &profile);
        assert!(!html.contains("style="));
        assert!(html.contains(
            r#"<img src="x&#39;); background: url(&#39;https://evil.example/" alt="" class="hero-image">"#
        ));
    }
}
