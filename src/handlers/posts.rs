// Post handlers
// Listings, post detail, create/edit and comments

use axum::{
    extract::{multipart::MultipartError, Multipart, Path, Query, State},
    http::{StatusCode, Uri},
    response::{Html, IntoResponse, Response},
    Form,
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::{debug, info};

use super::{found, list_page, parse_id, post_path, profile_path};
use crate::access::{edit_decision, following_flag, EditDecision};
use crate::auth::{CurrentUser, RequireUser};
use crate::cache::PageCache;
use crate::csrf::{csrf_token, verify_csrf};
use crate::error::AppError;
use crate::models::{
    Comment, CommentForm, CommentOutcome, FormErrors, Group, Post, PostDraft, PostForm, UploadedImage, User,
};
use crate::pagination::PageQuery;
use crate::state::SharedState;
use crate::store::{PostScope, Store};
use crate::templates::{
    render, GroupListTemplate, IndexTemplate, Nav, PostDetailTemplate, PostFormTemplate, ProfileTemplate,
};

const REJECTED_COMMENT_KEY: &str = "rejected_comment";

/// A comment that failed validation, kept in the session until the post page shows it.
#[derive(Debug, Serialize, Deserialize)]
struct RejectedComment {
    post_id: i64,
    text: String,
    errors: FormErrors,
}

/// Home page with every post
/// GET /
/// The rendered page is cached per URL and viewer for the configured TTL.
pub async fn index(
    State(state): State<SharedState>,
    CurrentUser(viewer): CurrentUser,
    uri: Uri,
    Query(query): Query<PageQuery>,
) -> Result<Html<String>, AppError> {
    let path_and_query = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    let key = PageCache::index_key(path_and_query, viewer.as_ref().map(|u| u.id));

    if let Some(body) = state.cache.get(&key) {
        debug!("Serving {} from the page cache", key);
        return Ok(Html(body));
    }

    let page = list_page(&state, PostScope::All, query.page.as_deref()).await?;
    let Html(body) = render(&IndexTemplate {
        nav: Nav::for_viewer(viewer.as_ref()),
        page,
    })?;

    state.cache.set(key, body.clone());
    Ok(Html(body))
}

/// Posts of one group
/// GET /group/:slug/
pub async fn group_posts(
    State(state): State<SharedState>,
    CurrentUser(viewer): CurrentUser,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Html<String>, AppError> {
    let group = state
        .store
        .group_by_slug(&slug)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Group '{}'", slug)))?;

    let page = list_page(&state, PostScope::Group(group.id), query.page.as_deref()).await?;

    render(&GroupListTemplate {
        nav: Nav::for_viewer(viewer.as_ref()),
        group,
        page,
    })
}

/// Author profile
/// GET /profile/:username/
pub async fn profile(
    State(state): State<SharedState>,
    CurrentUser(viewer): CurrentUser,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Html<String>, AppError> {
    let author = state
        .store
        .user_by_username(&username)
        .await?
        .ok_or_else(|| AppError::not_found(format!("User '{}'", username)))?;

    let page = list_page(&state, PostScope::Author(author.id), query.page.as_deref()).await?;
    let following = following_flag(state.store.as_ref(), viewer.as_ref(), &author).await?;
    let is_self = viewer.as_ref().is_some_and(|v| v.id == author.id);

    render(&ProfileTemplate {
        nav: Nav::for_viewer(viewer.as_ref()),
        posts_count: page.total,
        author,
        page,
        following,
        is_self,
    })
}

/// Single post with its comments
/// GET /posts/:post_id/
pub async fn post_detail(
    State(state): State<SharedState>,
    CurrentUser(viewer): CurrentUser,
    session: Session,
    Path(raw_id): Path<String>,
) -> Result<Html<String>, AppError> {
    let post = load_post(state.store.as_ref(), &raw_id).await?;
    let posts_count = state.store.count_posts(PostScope::Author(post.author_id)).await?;
    let comments = state.store.comments_for_post(post.id).await?;

    let (comment_text, comment_errors) = match take_rejected_comment(&session, post.id).await? {
        Some(rejected) => (rejected.text, rejected.errors.for_field("text")),
        None => (String::new(), Vec::new()),
    };

    let csrf_token = match viewer {
        Some(_) => csrf_token(&session).await?,
        None => String::new(),
    };
    let can_edit = viewer
        .as_ref()
        .is_some_and(|v| edit_decision(v, &post) == EditDecision::Allowed);

    render(&PostDetailTemplate {
        nav: Nav::for_viewer(viewer.as_ref()),
        post,
        posts_count,
        comments,
        can_edit,
        comment_text,
        comment_errors,
        csrf_token,
    })
}

/// Empty post form
/// GET /create/
pub async fn post_create_page(
    State(state): State<SharedState>,
    RequireUser(user): RequireUser,
    session: Session,
) -> Result<Html<String>, AppError> {
    let groups = state.store.list_groups().await?;
    let token = csrf_token(&session).await?;

    render(&form_template(&user, groups, &PostForm::default(), None, token))
}

/// Publish a new post
/// POST /create/
/// Redirects to the author's profile; invalid input re-renders the form with 200.
pub async fn post_create(
    State(state): State<SharedState>,
    RequireUser(user): RequireUser,
    session: Session,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let form = read_post_form(multipart).await?;
    verify_csrf(&session, &form.csrf_token).await?;

    let groups = state.store.list_groups().await?;
    let valid = match form.validate(&groups) {
        Ok(valid) => valid,
        Err(errors) => {
            info!("Rejected new post from {}: invalid {:?}", user.username, errors.fields().collect::<Vec<_>>());
            let token = csrf_token(&session).await?;
            let template = form_template(&user, groups, &form, None, token).with_errors(&errors);
            return Ok(render(&template)?.into_response());
        }
    };

    let image = match form.image {
        Some(ref image) => Some(state.media.save_post_image(image).await?),
        None => None,
    };

    let draft = PostDraft {
        text: valid.text,
        group_id: valid.group_id,
        image: image.clone(),
    };

    let post = match state.store.create_post(user.id, draft).await {
        Ok(post) => post,
        Err(e) => {
            if let Some(ref stored) = image {
                state.media.discard(stored).await;
            }
            return Err(e);
        }
    };

    info!("Created post {} by {}", post.id, user.username);
    Ok(found(&profile_path(&user.username)))
}

/// Pre-filled edit form; other users are sent to the post page
/// GET /posts/:post_id/edit/
pub async fn post_edit_page(
    State(state): State<SharedState>,
    RequireUser(user): RequireUser,
    session: Session,
    Path(raw_id): Path<String>,
) -> Result<Response, AppError> {
    let post = load_post(state.store.as_ref(), &raw_id).await?;

    if let EditDecision::NotAuthor = edit_decision(&user, &post) {
        info!("{} may not edit post {}, redirecting to it", user.username, post.id);
        return Ok(found(&post_path(post.id)));
    }

    let groups = state.store.list_groups().await?;
    let token = csrf_token(&session).await?;
    let template = form_template(&user, groups, &PostForm::from_post(&post), Some(&post), token);

    Ok(render(&template)?.into_response())
}

/// Save changes to a post
/// POST /posts/:post_id/edit/
/// Without a new upload the stored image is kept.
pub async fn post_edit(
    State(state): State<SharedState>,
    RequireUser(user): RequireUser,
    session: Session,
    Path(raw_id): Path<String>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let post = load_post(state.store.as_ref(), &raw_id).await?;

    if let EditDecision::NotAuthor = edit_decision(&user, &post) {
        info!("{} may not edit post {}, redirecting to it", user.username, post.id);
        return Ok(found(&post_path(post.id)));
    }

    let form = read_post_form(multipart).await?;
    verify_csrf(&session, &form.csrf_token).await?;

    let groups = state.store.list_groups().await?;
    let valid = match form.validate(&groups) {
        Ok(valid) => valid,
        Err(errors) => {
            info!("Rejected edit of post {}: invalid {:?}", post.id, errors.fields().collect::<Vec<_>>());
            let token = csrf_token(&session).await?;
            let template = form_template(&user, groups, &form, Some(&post), token).with_errors(&errors);
            return Ok(render(&template)?.into_response());
        }
    };

    let new_image = match form.image {
        Some(ref image) => Some(state.media.save_post_image(image).await?),
        None => None,
    };

    let draft = PostDraft {
        text: valid.text,
        group_id: valid.group_id,
        image: new_image.clone().or_else(|| post.image.clone()),
    };

    if let Err(e) = state.store.update_post(post.id, draft).await {
        if let Some(ref stored) = new_image {
            state.media.discard(stored).await;
        }
        return Err(e);
    }

    info!("Post {} edited by {}", post.id, user.username);
    Ok(found(&post_path(post.id)))
}

/// Add a comment
/// POST /posts/:post_id/comment/
/// Always lands back on the post; rejected text and its errors are shown there once.
pub async fn add_comment(
    State(state): State<SharedState>,
    RequireUser(user): RequireUser,
    session: Session,
    Path(raw_id): Path<String>,
    Form(form): Form<CommentForm>,
) -> Result<Response, AppError> {
    let post = load_post(state.store.as_ref(), &raw_id).await?;
    verify_csrf(&session, &form.csrf_token).await?;

    match submit_comment(state.store.as_ref(), &post, &user, &form).await? {
        CommentOutcome::Created(comment) => {
            info!("Comment {} added to post {} by {}", comment.id, post.id, user.username);
        }
        CommentOutcome::Rejected(errors) => {
            info!("Comment on post {} by {} rejected", post.id, user.username);
            let rejected = RejectedComment {
                post_id: post.id,
                text: form.text,
                errors,
            };
            session.insert(REJECTED_COMMENT_KEY, rejected).await?;
        }
    }

    Ok(found(&post_path(post.id)))
}

/// GET /posts/:post_id/comment/
/// Nothing to submit; signed-in users are sent back to the post.
pub async fn add_comment_page(
    State(state): State<SharedState>,
    RequireUser(_user): RequireUser,
    Path(raw_id): Path<String>,
) -> Result<Response, AppError> {
    let post = load_post(state.store.as_ref(), &raw_id).await?;
    Ok(found(&post_path(post.id)))
}

/// Validates the comment and stores it when it passes.
pub async fn submit_comment(
    store: &dyn Store,
    post: &Post,
    author: &User,
    form: &CommentForm,
) -> Result<CommentOutcome, AppError> {
    match form.validate() {
        Ok(text) => {
            let comment: Comment = store.create_comment(post.id, author.id, &text).await?;
            Ok(CommentOutcome::Created(comment))
        }
        Err(errors) => Ok(CommentOutcome::Rejected(errors)),
    }
}

async fn load_post(store: &dyn Store, raw_id: &str) -> Result<Post, AppError> {
    let post_id = parse_id(raw_id)?;
    store
        .post_by_id(post_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Post {}", post_id)))
}

async fn take_rejected_comment(session: &Session, post_id: i64) -> Result<Option<RejectedComment>, AppError> {
    match session.get::<RejectedComment>(REJECTED_COMMENT_KEY).await? {
        Some(rejected) if rejected.post_id == post_id => {
            session.remove::<RejectedComment>(REJECTED_COMMENT_KEY).await?;
            Ok(Some(rejected))
        }
        _ => Ok(None),
    }
}

/// Reads the multipart body field by field. An empty file input means "no new image".
/// A body over the upload limit becomes an image error instead of a failed request.
async fn read_post_form(multipart: Multipart) -> Result<PostForm, AppError> {
    let mut form = PostForm::default();

    match read_post_fields(multipart, &mut form).await {
        Ok(()) => {}
        Err(e) if e.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            info!("Post form exceeded the upload limit: {}", e.body_text());
            form.image = None;
            form.image_too_large = true;
        }
        Err(e) => return Err(e.into()),
    }

    Ok(form)
}

async fn read_post_fields(mut multipart: Multipart, form: &mut PostForm) -> Result<(), MultipartError> {
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();

        match name.as_str() {
            "text" => form.text = field.text().await?,
            "group" => form.group = field.text().await?,
            "csrf_token" => form.csrf_token = field.text().await?,
            "image" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().unwrap_or_default().to_string();
                let data = field.bytes().await?;

                if !file_name.is_empty() && !data.is_empty() {
                    form.image = Some(UploadedImage {
                        file_name,
                        content_type,
                        data,
                    });
                }
            }
            other => debug!("Ignoring unexpected form field '{}'", other),
        }
    }

    Ok(())
}

fn form_template(
    user: &User,
    groups: Vec<Group>,
    form: &PostForm,
    post: Option<&Post>,
    csrf_token: String,
) -> PostFormTemplate {
    PostFormTemplate {
        nav: Nav::for_viewer(Some(user)),
        is_edit: post.is_some(),
        post_id: post.map(|p| p.id).unwrap_or_default(),
        text: form.text.clone(),
        selected_group: form.selected_group().unwrap_or_default(),
        groups,
        current_image: post.and_then(|p| p.image.clone()).unwrap_or_default(),
        text_errors: Vec::new(),
        group_errors: Vec::new(),
        image_errors: Vec::new(),
        csrf_token,
    }
}
