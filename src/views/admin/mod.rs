mod form;

use std::collections::HashMap;

use axum::Extension;
use axum::Form;
use axum::extract::Path;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Redirect;
use axum::response::Response;
use backend_client::Privilege;
use maud::Markup;
use maud::html;
use serde::Deserialize;
use serde_json::Value;
use serde_json::json;
use uuid::Uuid;

pub(in crate::views) use form::create;
pub(in crate::views) use form::edit_form;
pub(in crate::views) use form::new_form;
pub(in crate::views) use form::update;

use super::AppState;
use super::layout;
use super::session::AdminSessionExt;
use super::submission::GuardedAction;
use super::submission::SubmissionError;
use crate::error::CasebookError;
use crate::error::InternalError;
use crate::error::Result;
use crate::models::CaseStudy;
use crate::models::form::new_submission_token;

/// Number of tags listed on the dashboard before collapsing the rest
const LISTED_TAGS: usize = 2;

#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error("Case study '{id}' could not be found")]
    CaseStudyNotFound { id: Uuid },
}

impl CasebookError for AdminError {
    fn get_status(&self) -> StatusCode {
        match self {
            AdminError::CaseStudyNotFound { .. } => StatusCode::NOT_FOUND,
        }
    }

    fn get_type(&self) -> &str {
        match self {
            AdminError::CaseStudyNotFound { .. } => "casebook:admin:CaseStudyNotFound",
        }
    }

    fn context(&self) -> HashMap<String, Value> {
        match self {
            AdminError::CaseStudyNotFound { id } => {
                HashMap::from([("id".to_owned(), json!(id.to_string()))])
            }
        }
    }
}

fn dashboard_row(case_study: &CaseStudy) -> Markup {
    let hidden_tags = case_study.tags.len().saturating_sub(LISTED_TAGS);
    html! {
        tr {
            td.thumbnail {
                @if let Some(thumbnail) = &case_study.thumbnail {
                    img src=(thumbnail) alt="" width="48" height="48";
                }
            }
            td {
                p.title {
                    (case_study.title)
                    @if case_study.featured {
                        " " span.badge { "Featured" }
                    }
                }
                p.description { (case_study.description) }
            }
            td {
                @for tag in case_study.tags.iter().take(LISTED_TAGS) {
                    span.tag { (tag) }
                }
                @if hidden_tags > 0 {
                    span.tag.more { "+" (hidden_tags) }
                }
            }
            td { (layout::format_date(case_study.date)) }
            td.actions {
                a href={ "/case-studies/" (case_study.slug) } target="_blank" { "View" }
                a href={ "/admin/case-studies/" (case_study.id) "/edit" } { "Edit" }
                a.danger href={ "/admin/case-studies/" (case_study.id) "/delete" } { "Delete" }
            }
        }
    }
}

/// The dashboard: every case study, last created first
pub(in crate::views) async fn list(
    State(AppState { backend, .. }): State<AppState>,
    Extension(session): AdminSessionExt,
) -> Markup {
    let content = match CaseStudy::list_by_creation(&backend, Privilege::Service).await {
        Ok(case_studies) if case_studies.is_empty() => html! {
            div.empty-state {
                h2 { "No case studies yet" }
                p { "Get started by creating your first case study" }
                a.button.primary href="/admin/case-studies/new" { "Create case study" }
            }
        },
        Ok(case_studies) => html! {
            table.case-studies {
                thead {
                    tr {
                        th {}
                        th { "Case study" }
                        th { "Tags" }
                        th { "Date" }
                        th { "Actions" }
                    }
                }
                tbody {
                    @for case_study in &case_studies {
                        (dashboard_row(case_study))
                    }
                }
            }
        },
        Err(err) => {
            let error = InternalError::from(err);
            error.log();
            layout::inline_error(&format!("Error loading case studies: {}", error.message))
        }
    };
    layout::admin_page(
        "Dashboard",
        session.email(),
        html! {
            div.dashboard-header {
                h1 { "Case Studies" }
                a.button.primary href="/admin/case-studies/new" { "New case study" }
            }
            (content)
        },
    )
}

fn delete_page(
    id: Uuid,
    title: &str,
    submission_token: &str,
    email: Option<&str>,
    error: Option<&str>,
) -> Markup {
    layout::admin_page(
        "Delete case study",
        email,
        html! {
            section.confirm {
                h1 { "Delete case study" }
                p { "Are you sure you want to delete \"" (title) "\"?" }
                p { "This cannot be undone." }
                @if let Some(error) = error {
                    (layout::inline_error(error))
                }
                form method="post" action={ "/admin/case-studies/" (id) "/delete" } data-guarded {
                    input type="hidden" name="submission_token" value=(submission_token);
                    input type="hidden" name="title" value=(title);
                    a.button.secondary href="/admin" { "Cancel" }
                    button.danger type="submit" { "Delete" }
                }
            }
            (layout::GUARDED_FORM_SCRIPT)
        },
    )
}

pub(in crate::views) async fn delete_confirmation(
    State(AppState { backend, .. }): State<AppState>,
    Extension(session): AdminSessionExt,
    Path(id): Path<Uuid>,
) -> Result<Markup> {
    let case_study = CaseStudy::retrieve(&backend, Privilege::Service, id)
        .await?
        .ok_or(AdminError::CaseStudyNotFound { id })?;
    Ok(delete_page(
        id,
        &case_study.title,
        &new_submission_token(),
        session.email(),
        None,
    ))
}

#[derive(Debug, Deserialize)]
pub(in crate::views) struct DeleteForm {
    #[serde(default)]
    submission_token: String,
    #[serde(default)]
    title: String,
}

pub(in crate::views) async fn delete(
    State(AppState {
        backend,
        submissions,
        ..
    }): State<AppState>,
    Extension(session): AdminSessionExt,
    Path(id): Path<Uuid>,
    Form(DeleteForm {
        submission_token,
        title,
    }): Form<DeleteForm>,
) -> Result<Response> {
    let claim = match submissions.claim(&submission_token, GuardedAction::Delete) {
        Ok(claim) => claim,
        Err(SubmissionError::AlreadyConsumed { .. }) => {
            return Ok(Redirect::to("/admin").into_response());
        }
        Err(err) => return Err(err.into()),
    };
    match CaseStudy::delete_static(&backend, Privilege::Service, id).await {
        Ok(()) => {
            claim.consume();
            tracing::info!(%id, "case study deleted");
            Ok(Redirect::to("/admin").into_response())
        }
        Err(err) => {
            drop(claim);
            let error = InternalError::from(err);
            error.log();
            let message = format!("Error deleting case study: {}", error.message);
            let page = delete_page(
                id,
                &title,
                &submission_token,
                session.email(),
                Some(&message),
            );
            Ok((error.status, page).into_response())
        }
    }
}
