// Static pages

use axum::response::Html;

use crate::auth::CurrentUser;
use crate::error::AppError;
use crate::templates::{render, AboutAuthorTemplate, AboutTechTemplate, Nav};

/// GET /about/author/
pub async fn about_author(CurrentUser(viewer): CurrentUser) -> Result<Html<String>, AppError> {
    render(&AboutAuthorTemplate {
        nav: Nav::for_viewer(viewer.as_ref()),
    })
}

/// GET /about/tech/
pub async fn about_tech(CurrentUser(viewer): CurrentUser) -> Result<Html<String>, AppError> {
    render(&AboutTechTemplate {
        nav: Nav::for_viewer(viewer.as_ref()),
    })
}
