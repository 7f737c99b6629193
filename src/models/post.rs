use axum::body::Bytes;
use chrono::{DateTime, Utc};

use super::forms::{FormErrors, REQUIRED};
use super::group::{Group, GroupRef};

/// A post as every page reads it: joined with its author's username and its group.
#[derive(Debug, Clone, PartialEq)]
pub struct Post {
    pub id: i64,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub author_id: i64,
    pub author_username: String,
    pub group: Option<GroupRef>,
    /// Path relative to the media root, e.g. `posts/small.gif`.
    pub image: Option<String>,
}

/// Column values written on create and edit.
#[derive(Debug, Clone, PartialEq)]
pub struct PostDraft {
    pub text: String,
    pub group_id: Option<i64>,
    pub image: Option<String>,
}

/// An image file received with a post form, before it is written to media storage.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub file_name: String,
    pub content_type: String,
    pub data: Bytes,
}

/// Raw create/edit submission as read from the multipart body.
#[derive(Debug, Default)]
pub struct PostForm {
    pub text: String,
    pub group: String,
    pub image: Option<UploadedImage>,
    /// The body hit the upload limit while the image was being read.
    pub image_too_large: bool,
    pub csrf_token: String,
}

/// Cleaned post form values.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidPost {
    pub text: String,
    pub group_id: Option<i64>,
}

pub const INVALID_CHOICE: &str = "Select a valid choice. That choice is not one of the available choices.";
pub const INVALID_IMAGE: &str = "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";
pub const IMAGE_TOO_LARGE: &str = "The uploaded image is too large.";

const IMAGE_EXTENSIONS: &[&str] = &["gif", "png", "jpg", "jpeg", "webp", "bmp"];

impl Post {
    pub fn has_group(&self) -> bool {
        self.group.is_some()
    }

    pub fn group_slug(&self) -> &str {
        self.group.as_ref().map(|g| g.slug.as_str()).unwrap_or_default()
    }

    pub fn group_title(&self) -> &str {
        self.group.as_ref().map(|g| g.title.as_str()).unwrap_or_default()
    }

    pub fn group_id(&self) -> Option<i64> {
        self.group.as_ref().map(|g| g.id)
    }

    pub fn has_image(&self) -> bool {
        self.image.is_some()
    }

    pub fn image_url(&self) -> String {
        self.image
            .as_deref()
            .map(|path| format!("/media/{}", path))
            .unwrap_or_default()
    }

    pub fn created_label(&self) -> String {
        self.created_at.format("%d %B %Y").to_string()
    }
}

impl PostForm {
    /// Pre-filled form for editing an existing post.
    pub fn from_post(post: &Post) -> Self {
        PostForm {
            text: post.text.clone(),
            group: post.group_id().map(|id| id.to_string()).unwrap_or_default(),
            image: None,
            image_too_large: false,
            csrf_token: String::new(),
        }
    }

    /// Group id currently selected in the form, if it parses.
    pub fn selected_group(&self) -> Option<i64> {
        self.group.trim().parse().ok()
    }

    /// Checks text, group choice and image against the available groups.
    pub fn validate(&self, groups: &[Group]) -> Result<ValidPost, FormErrors> {
        let mut errors = FormErrors::new();

        if self.text.trim().is_empty() {
            errors.add("text", REQUIRED);
        }

        let group_id = match self.group.trim() {
            "" => None,
            raw => match raw.parse::<i64>() {
                Ok(id) if groups.iter().any(|g| g.id == id) => Some(id),
                _ => {
                    errors.add("group", INVALID_CHOICE);
                    None
                }
            },
        };

        if self.image_too_large {
            errors.add("image", IMAGE_TOO_LARGE);
        } else if let Some(ref image) = self.image {
            if let Err(message) = image.validate() {
                errors.add("image", message);
            }
        }

        errors.into_result(ValidPost {
            text: self.text.clone(),
            group_id,
        })
    }
}

impl UploadedImage {
    pub fn extension(&self) -> Option<String> {
        self.file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
    }

    /// Accepts only files whose extension, declared type and leading bytes all agree on an image.
    pub fn validate(&self) -> Result<(), &'static str> {
        match self.extension() {
            Some(ext) if IMAGE_EXTENSIONS.contains(&ext.as_str()) => {}
            _ => return Err("File extension is not allowed. Allowed extensions are: gif, png, jpg, jpeg, webp, bmp."),
        }

        if !self.content_type.starts_with("image/") {
            return Err(INVALID_IMAGE);
        }

        if !looks_like_image(&self.data) {
            return Err(INVALID_IMAGE);
        }

        Ok(())
    }
}

fn looks_like_image(data: &[u8]) -> bool {
    data.starts_with(b"GIF87a")
        || data.starts_with(b"GIF89a")
        || data.starts_with(b"\x89PNG\r\n\x1a\n")
        || data.starts_with(&[0xFF, 0xD8, 0xFF])
        || (data.len() >= 12 && &data[..4] == b"RIFF" && &data[8..12] == b"WEBP")
        || data.starts_with(b"BM")
}
