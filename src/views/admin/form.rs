//! The case study editor of the admin panel
//!
//! Creating and editing share one multipart form. The button used to submit it picks
//! the action: save the case study, upload a thumbnail, or clear the thumbnail. Every
//! action other than saving re-renders the editor with the form exactly as submitted.

use std::collections::HashMap;

use axum::Extension;
use axum::extract::Multipart;
use axum::extract::Path;
use axum::extract::State;
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Redirect;
use axum::response::Response;
use backend_client::BackendClient;
use backend_client::Privilege;
use chrono::Utc;
use maud::Markup;
use maud::PreEscaped;
use maud::html;
use serde_json::Value;
use serde_json::json;
use uuid::Uuid;

use super::AdminError;
use crate::error::CasebookError;
use crate::error::Result;
use crate::models::AuthorDirectory;
use crate::models::CaseStudy;
use crate::models::CaseStudyForm;
use crate::models::FormMode;
use crate::models::thumbnail;
use crate::views::AppState;
use crate::views::layout;
use crate::views::session::AdminSession;
use crate::views::session::AdminSessionExt;
use crate::views::submission::GuardedAction;
use crate::views::submission::SubmissionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::EnumString, strum::Display)]
#[strum(serialize_all = "snake_case")]
enum FormAction {
    Save,
    Upload,
    ClearThumbnail,
}

#[derive(Debug)]
struct UploadedFile {
    file_name: String,
    content_type: Option<String>,
    content: Vec<u8>,
}

#[derive(Debug)]
struct Submission {
    form: CaseStudyForm,
    action: FormAction,
    file: Option<UploadedFile>,
}

#[derive(Debug, thiserror::Error)]
pub enum EditorError {
    #[error("Invalid multipart content")]
    Multipart(#[from] MultipartError),
    #[error("Missing multipart field name, cannot process request")]
    MissingFieldName,
    #[error("Unrecognized multipart field '{field_name}'")]
    UnrecognizedField { field_name: String },
    #[error("Unknown form action '{action}'")]
    UnknownAction { action: String },
    #[error("Select an image to upload")]
    MissingThumbnailFile,
    #[error("'{content_type}' is not an image type")]
    NotAnImage { content_type: String },
}

impl CasebookError for EditorError {
    fn get_status(&self) -> StatusCode {
        match self {
            EditorError::Multipart(err) => err.status(),
            EditorError::MissingFieldName
            | EditorError::UnrecognizedField { .. }
            | EditorError::UnknownAction { .. } => StatusCode::BAD_REQUEST,
            EditorError::MissingThumbnailFile | EditorError::NotAnImage { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
        }
    }

    fn get_type(&self) -> &str {
        match self {
            EditorError::Multipart(_) => "casebook:editor:Multipart",
            EditorError::MissingFieldName => "casebook:editor:MissingFieldName",
            EditorError::UnrecognizedField { .. } => "casebook:editor:UnrecognizedField",
            EditorError::UnknownAction { .. } => "casebook:editor:UnknownAction",
            EditorError::MissingThumbnailFile => "casebook:editor:MissingThumbnailFile",
            EditorError::NotAnImage { .. } => "casebook:editor:NotAnImage",
        }
    }

    fn context(&self) -> HashMap<String, Value> {
        match self {
            EditorError::UnrecognizedField { field_name } => {
                HashMap::from([("field_name".to_owned(), json!(field_name))])
            }
            EditorError::UnknownAction { action } => {
                HashMap::from([("action".to_owned(), json!(action))])
            }
            EditorError::NotAnImage { content_type } => {
                HashMap::from([("content_type".to_owned(), json!(content_type))])
            }
            _ => Default::default(),
        }
    }
}

async fn parse_submission(mut multipart: Multipart) -> Result<Submission, EditorError> {
    let mut form = CaseStudyForm::default();
    let mut action = FormAction::Save;
    let mut file = None;
    while let Some(field) = multipart.next_field().await? {
        let field_name = field
            .name()
            .ok_or(EditorError::MissingFieldName)?
            .to_owned();
        if field_name == "thumbnail_file" {
            let file_name = field.file_name().unwrap_or_default().to_owned();
            let content_type = field.content_type().map(str::to_owned);
            let content = field.bytes().await?.to_vec();
            // An untouched file input still sends an empty part
            if !file_name.is_empty() || !content.is_empty() {
                file = Some(UploadedFile {
                    file_name,
                    content_type,
                    content,
                });
            }
            continue;
        }
        let value = field.text().await?;
        match field_name.as_str() {
            "slug" => form.slug = value,
            "title" => form.title = value,
            "previous_title" => form.previous_title = value,
            "description" => form.description = value,
            "date" => form.date = value,
            "tags" => form.tags = value,
            "featured" => form.featured = matches!(value.as_str(), "on" | "true"),
            "read_time" => form.read_time = value,
            "author" => form.author = value,
            "thumbnail" => form.thumbnail = value,
            "content" => form.content = value,
            "submission_token" => form.submission_token = value,
            "action" => {
                action = value
                    .parse()
                    .map_err(|_| EditorError::UnknownAction { action: value })?;
            }
            _ => return Err(EditorError::UnrecognizedField { field_name }),
        }
    }
    Ok(Submission { form, action, file })
}

/// Where an error is shown in the editor
#[derive(Debug, Default)]
enum Feedback {
    #[default]
    None,
    Save(String),
    Upload(String),
}

fn form_action(mode: FormMode) -> String {
    match mode {
        FormMode::Create => "/admin/case-studies/new".to_owned(),
        FormMode::Edit(id) => format!("/admin/case-studies/{id}/edit"),
    }
}

/// Keeps the slug in sync with the title while creating
const SLUG_SCRIPT: PreEscaped<&str> = PreEscaped(
    r#"<script>
const editor = document.querySelector("form[data-mode=create]");
if (editor) {
  const { title, slug, previous_title: previous } = editor.elements;
  const derive = (text) => text.toLowerCase().replace(/[^a-z0-9]+/g, "-").replace(/^-+|-+$/g, "");
  title.addEventListener("input", () => {
    slug.value = derive(title.value);
    previous.value = title.value;
  });
}
</script>"#,
);

fn editor_page(
    mode: FormMode,
    form: &CaseStudyForm,
    authors: &AuthorDirectory,
    email: Option<&str>,
    feedback: &Feedback,
) -> Markup {
    let (title, submit_label, data_mode) = match mode {
        FormMode::Create => ("New case study", "Create case study", "create"),
        FormMode::Edit(_) => ("Edit case study", "Save changes", "edit"),
    };
    layout::admin_page(
        title,
        email,
        html! {
            section.editor {
                a.back href="/admin" { "Back to dashboard" }
                h1 { (title) }
                form method="post" action=(form_action(mode)) enctype="multipart/form-data"
                    data-guarded data-mode=(data_mode) {
                    // Implicit submission (Enter in a text field) saves
                    button type="submit" name="action" value="save" hidden tabindex="-1" {}
                    input type="hidden" name="submission_token" value=(form.submission_token);
                    input type="hidden" name="previous_title" value=(form.previous_title);

                    label for="title" { "Title" }
                    input #title type="text" name="title" value=(form.title) required;
                    label for="slug" { "Slug" }
                    input #slug type="text" name="slug" value=(form.slug) required
                        pattern="[a-z0-9]+(-[a-z0-9]+)*";
                    label for="description" { "Description" }
                    textarea #description name="description" rows="3" required { (form.description) }

                    div.row {
                        div {
                            label for="date" { "Date" }
                            input #date type="date" name="date" value=(form.date) required;
                        }
                        div {
                            label for="read_time" { "Read time" }
                            input #read_time type="text" name="read_time" value=(form.read_time)
                                placeholder="5 min read";
                        }
                        div {
                            label for="author" { "Author" }
                            input #author type="text" name="author" value=(form.author) list="authors";
                            datalist #authors {
                                @for key in authors.keys() {
                                    option value=(key) {}
                                }
                            }
                        }
                    }
                    label for="tags" { "Tags (comma separated)" }
                    input #tags type="text" name="tags" value=(form.tags)
                        placeholder="AI Automation, Voice AI";
                    label.checkbox {
                        input type="checkbox" name="featured" checked[form.featured];
                        " Featured"
                    }

                    fieldset.thumbnail {
                        legend { "Thumbnail" }
                        @if !form.thumbnail.is_empty() {
                            img.preview src=(form.thumbnail) alt="Thumbnail preview";
                        }
                        label for="thumbnail" { "Image URL" }
                        input #thumbnail type="url" name="thumbnail" value=(form.thumbnail);
                        label for="thumbnail_file" { "Or upload an image" }
                        input #thumbnail_file type="file" name="thumbnail_file" accept="image/*";
                        button type="submit" name="action" value="upload" formnovalidate { "Upload image" }
                        @if !form.thumbnail.is_empty() {
                            button type="submit" name="action" value="clear_thumbnail" formnovalidate {
                                "Remove thumbnail"
                            }
                        }
                        @if let Feedback::Upload(message) = feedback {
                            (layout::inline_error(message))
                        }
                    }

                    label for="content" { "Content (markdown)" }
                    textarea #content name="content" rows="24" { (form.content) }

                    div.actions {
                        @if let Feedback::Save(message) = feedback {
                            (layout::inline_error(message))
                        }
                        a.button.secondary href="/admin" { "Cancel" }
                        button.primary type="submit" name="action" value="save" { (submit_label) }
                    }
                }
            }
            (layout::GUARDED_FORM_SCRIPT)
            (SLUG_SCRIPT)
        },
    )
}

fn editor_response(
    status: StatusCode,
    state: &AppState,
    session: &AdminSession,
    mode: FormMode,
    form: &CaseStudyForm,
    feedback: Feedback,
) -> Response {
    let page = editor_page(mode, form, &state.authors, session.email(), &feedback);
    (status, page).into_response()
}

pub(in crate::views) async fn new_form(
    State(AppState { authors, .. }): State<AppState>,
    Extension(session): AdminSessionExt,
) -> Markup {
    let form = CaseStudyForm::blank(Utc::now().date_naive());
    editor_page(
        FormMode::Create,
        &form,
        &authors,
        session.email(),
        &Feedback::None,
    )
}

pub(in crate::views) async fn edit_form(
    State(AppState {
        backend, authors, ..
    }): State<AppState>,
    Extension(session): AdminSessionExt,
    Path(id): Path<Uuid>,
) -> Result<Markup> {
    let case_study = CaseStudy::retrieve(&backend, Privilege::Service, id)
        .await?
        .ok_or(AdminError::CaseStudyNotFound { id })?;
    let form = CaseStudyForm::from_case_study(&case_study);
    Ok(editor_page(
        FormMode::Edit(id),
        &form,
        &authors,
        session.email(),
        &Feedback::None,
    ))
}

pub(in crate::views) async fn create(
    State(state): State<AppState>,
    Extension(session): AdminSessionExt,
    multipart: Multipart,
) -> Result<Response> {
    submit(&state, &session, FormMode::Create, multipart).await
}

pub(in crate::views) async fn update(
    State(state): State<AppState>,
    Extension(session): AdminSessionExt,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> Result<Response> {
    submit(&state, &session, FormMode::Edit(id), multipart).await
}

async fn save(backend: &BackendClient, mode: FormMode, form: &CaseStudyForm) -> Result<CaseStudy> {
    let payload = form.payload()?;
    let case_study = match mode {
        FormMode::Create => payload.create(backend, Privilege::Service).await?,
        FormMode::Edit(id) => payload
            .update(backend, Privilege::Service, id)
            .await?
            .ok_or(AdminError::CaseStudyNotFound { id })?,
    };
    Ok(case_study)
}

/// Uploads the image and returns its public URL
async fn upload_thumbnail(backend: &BackendClient, file: Option<UploadedFile>) -> Result<String> {
    let UploadedFile {
        file_name,
        content_type,
        content,
    } = file
        .filter(|file| !file.content.is_empty())
        .ok_or(EditorError::MissingThumbnailFile)?;
    let content_type = content_type.unwrap_or_default();
    let is_image = content_type
        .parse::<mime::Mime>()
        .is_ok_and(|mime| mime.type_() == mime::IMAGE);
    if !is_image {
        return Err(EditorError::NotAnImage { content_type }.into());
    }
    let key = thumbnail::object_key(&file_name, Utc::now().timestamp_millis(), &mut rand::rng());
    backend
        .upload(thumbnail::BUCKET, &key, &content_type, content)
        .await?;
    let url = backend.public_url(thumbnail::BUCKET, &key)?;
    tracing::info!(%key, "thumbnail uploaded");
    Ok(url.to_string())
}

async fn submit(
    state: &AppState,
    session: &AdminSession,
    mode: FormMode,
    multipart: Multipart,
) -> Result<Response> {
    let Submission {
        mut form,
        action,
        file,
    } = parse_submission(multipart).await?;
    form.refresh_slug(mode);
    let respond = |status, form: &CaseStudyForm, feedback| {
        editor_response(status, state, session, mode, form, feedback)
    };

    match action {
        FormAction::ClearThumbnail => {
            form.thumbnail.clear();
            Ok(respond(StatusCode::OK, &form, Feedback::None))
        }
        FormAction::Upload => {
            let _claim = state
                .submissions
                .claim(&form.submission_token, GuardedAction::Upload)?;
            match upload_thumbnail(&state.backend, file).await {
                Ok(url) => {
                    form.thumbnail = url;
                    Ok(respond(StatusCode::OK, &form, Feedback::None))
                }
                Err(error) => {
                    error.log();
                    let message = format!("Error uploading image: {}", error.message);
                    Ok(respond(error.status, &form, Feedback::Upload(message)))
                }
            }
        }
        FormAction::Save => {
            let claim = match state
                .submissions
                .claim(&form.submission_token, GuardedAction::Save)
            {
                Ok(claim) => claim,
                Err(SubmissionError::AlreadyConsumed { .. }) => {
                    return Ok(Redirect::to("/admin").into_response());
                }
                Err(err) => return Err(err.into()),
            };
            match save(&state.backend, mode, &form).await {
                Ok(case_study) => {
                    claim.consume();
                    tracing::info!(id = %case_study.id, slug = %case_study.slug, "case study saved");
                    Ok(Redirect::to("/admin").into_response())
                }
                Err(error) if error.status == StatusCode::NOT_FOUND => Err(error),
                Err(error) => {
                    error.log();
                    let message = format!("Error saving case study: {}", error.message);
                    Ok(respond(error.status, &form, Feedback::Save(message)))
                }
            }
        }
    }
}
