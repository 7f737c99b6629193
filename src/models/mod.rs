// Models module

pub mod comment;
pub mod follow;
pub mod forms;
pub mod group;
pub mod post;
pub mod user;

// Re-export commonly used types
pub use comment::{Comment, CommentForm, CommentOutcome};
pub use follow::Follow;
pub use forms::FormErrors;
pub use group::{Group, GroupRef, NewGroup};
pub use post::{Post, PostDraft, PostForm, UploadedImage};
pub use user::{LoginForm, NewUser, SignupForm, User};
