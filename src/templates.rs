//! Askama page templates

use askama::Template;
use axum::response::Html;

use crate::error::AppError;
use crate::models::{Comment, FormErrors, Group, Post, User};
use crate::pagination::Page;

/// Navigation bar state shared by every page.
#[derive(Debug, Clone, Default)]
pub struct Nav {
    pub authenticated: bool,
    pub username: String,
}

impl Nav {
    pub fn for_viewer(viewer: Option<&User>) -> Self {
        match viewer {
            Some(user) => Nav {
                authenticated: true,
                username: user.username.clone(),
            },
            None => Nav::default(),
        }
    }
}

pub fn render<T: Template>(template: &T) -> Result<Html<String>, AppError> {
    Ok(Html(template.render()?))
}

/// Home page: every post, newest first
#[derive(Template)]
#[template(path = "posts/index.html")]
pub struct IndexTemplate {
    pub nav: Nav,
    pub page: Page<Post>,
}

#[derive(Template)]
#[template(path = "posts/group_list.html")]
pub struct GroupListTemplate {
    pub nav: Nav,
    pub group: Group,
    pub page: Page<Post>,
}

/// Author profile with the follow button state
#[derive(Template)]
#[template(path = "posts/profile.html")]
pub struct ProfileTemplate {
    pub nav: Nav,
    pub author: User,
    pub page: Page<Post>,
    pub posts_count: usize,
    pub following: bool,
    pub is_self: bool,
}

#[derive(Template)]
#[template(path = "posts/post_detail.html")]
pub struct PostDetailTemplate {
    pub nav: Nav,
    pub post: Post,
    pub posts_count: usize,
    pub comments: Vec<Comment>,
    pub can_edit: bool,
    pub comment_text: String,
    pub comment_errors: Vec<String>,
    pub csrf_token: String,
}

/// Create and edit share one form
#[derive(Template)]
#[template(path = "posts/create_post.html")]
pub struct PostFormTemplate {
    pub nav: Nav,
    pub is_edit: bool,
    pub post_id: i64,
    pub text: String,
    pub selected_group: i64,
    pub groups: Vec<Group>,
    pub current_image: String,
    pub text_errors: Vec<String>,
    pub group_errors: Vec<String>,
    pub image_errors: Vec<String>,
    pub csrf_token: String,
}

impl PostFormTemplate {
    pub fn with_errors(mut self, errors: &FormErrors) -> Self {
        self.text_errors = errors.for_field("text");
        self.group_errors = errors.for_field("group");
        self.image_errors = errors.for_field("image");
        self
    }

    pub fn action(&self) -> String {
        if self.is_edit {
            format!("/posts/{}/edit/", self.post_id)
        } else {
            "/create/".to_string()
        }
    }
}

#[derive(Template)]
#[template(path = "posts/follow.html")]
pub struct FollowTemplate {
    pub nav: Nav,
    pub page: Page<Post>,
}

#[derive(Template)]
#[template(path = "users/login.html")]
pub struct LoginTemplate {
    pub nav: Nav,
    pub username: String,
    pub next: String,
    pub error: String,
    pub csrf_token: String,
}

#[derive(Template)]
#[template(path = "users/signup.html")]
pub struct SignupTemplate {
    pub nav: Nav,
    pub username: String,
    pub email: String,
    pub username_errors: Vec<String>,
    pub email_errors: Vec<String>,
    pub password_errors: Vec<String>,
    pub password_confirm_errors: Vec<String>,
    pub csrf_token: String,
}

impl SignupTemplate {
    pub fn with_errors(mut self, errors: &FormErrors) -> Self {
        self.username_errors = errors.for_field("username");
        self.email_errors = errors.for_field("email");
        self.password_errors = errors.for_field("password");
        self.password_confirm_errors = errors.for_field("password_confirm");
        self
    }
}

#[derive(Template)]
#[template(path = "about/author.html")]
pub struct AboutAuthorTemplate {
    pub nav: Nav,
}

#[derive(Template)]
#[template(path = "about/tech.html")]
pub struct AboutTechTemplate {
    pub nav: Nav,
}

#[derive(Template)]
#[template(path = "core/404.html")]
pub struct NotFoundTemplate {
    pub nav: Nav,
    pub path: String,
}

#[derive(Template)]
#[template(path = "core/500.html")]
pub struct ServerErrorTemplate {
    pub nav: Nav,
    pub path: String,
}

#[derive(Template)]
#[template(path = "core/403csrf.html")]
pub struct CsrfFailureTemplate {
    pub nav: Nav,
}
