use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::Path;
use axum::extract::State;
use axum::http::StatusCode;
use backend_client::Privilege;
use maud::Markup;
use maud::PreEscaped;
use maud::html;
use serde_json::Value;
use serde_json::json;

use super::AppState;
use super::freshness::FreshnessKey;
use super::layout;
use super::layout::OpenGraphType;
use super::layout::PageMeta;
use crate::error::CasebookError;
use crate::error::Result;
use crate::markdown;
use crate::markdown::TocEntry;
use crate::models::Author;
use crate::models::CaseStudy;
use crate::relevance::RELATED_WINDOW;
use crate::relevance::rank_related;

const HERO_HEADLINE: &str = "RapidXAI Case Studies & Client Success Stories";
const HERO_TAGLINE: &str = "Proven Success Stories & Measurable Results";
const HERO_INDUSTRIES: &str =
    "Industries Transformed: Real Estate, Education, Digital Marketing, Enterprise SaaS";

/// Figures shown under the home page headline, as (value, label)
const HERO_STATS: [(&str, &str); 3] = [
    ("$25,000+", "Successful Implementations"),
    ("$500,000+", "Annual Client Savings"),
    ("100%", "Project Completion Rate"),
];

#[derive(Debug, thiserror::Error)]
pub enum PublicError {
    #[error("No case study found at '{slug}'")]
    CaseStudyNotFound { slug: String },
}

impl CasebookError for PublicError {
    fn get_status(&self) -> StatusCode {
        StatusCode::NOT_FOUND
    }

    fn get_type(&self) -> &str {
        "casebook:public:CaseStudyNotFound"
    }

    fn context(&self) -> HashMap<String, Value> {
        match self {
            PublicError::CaseStudyNotFound { slug } => {
                HashMap::from([("slug".to_owned(), json!(slug))])
            }
        }
    }
}

fn tag_list(tags: &[String]) -> Markup {
    html! {
        @if !tags.is_empty() {
            ul.tags {
                @for tag in tags {
                    li.tag { (tag) }
                }
            }
        }
    }
}

fn case_study_card(case_study: &CaseStudy) -> Markup {
    html! {
        article.card {
            a href={ "/case-studies/" (case_study.slug) } {
                @if let Some(thumbnail) = &case_study.thumbnail {
                    img.thumbnail src=(thumbnail) alt=(case_study.title) loading="lazy";
                }
                @if case_study.featured {
                    span.badge { "Featured" }
                }
                h2 { (case_study.title) }
                p.description { (case_study.description) }
            }
            (tag_list(&case_study.tags))
            p.meta {
                time datetime=(case_study.date) { (layout::format_date(case_study.date)) }
                @if let Some(read_time) = &case_study.read_time {
                    " · " (read_time)
                }
            }
        }
    }
}

/// The home page: every case study, most recent first
///
/// A store failure is reported inside the page, which is still served.
pub(in crate::views) async fn list(
    State(AppState {
        backend,
        freshness,
        config,
        ..
    }): State<AppState>,
) -> Markup {
    let case_studies = freshness
        .get_or_fetch(FreshnessKey::List, || {
            CaseStudy::list_by_date(&backend, Privilege::Anonymous)
        })
        .await;
    let content = match case_studies {
        Ok(case_studies) if case_studies.is_empty() => html! {
            div.empty-state {
                h2 { "No case studies yet" }
                p { "Check back soon for our success stories" }
            }
        },
        Ok(case_studies) => html! {
            div.grid {
                @for case_study in case_studies.iter() {
                    (case_study_card(case_study))
                }
            }
        },
        Err(err) => {
            tracing::error!(error = %err, "failed to load the case studies");
            layout::inline_error("Error loading case studies. Please try again later.")
        }
    };
    layout::page(
        &config.site,
        &PageMeta::website("/"),
        html! {
            section.hero {
                h1 { (HERO_HEADLINE) }
                p.tagline { (HERO_TAGLINE) }
                p.industries { (HERO_INDUSTRIES) }
                dl.stats {
                    @for (value, label) in HERO_STATS {
                        div.stat {
                            dt { (label) }
                            dd { (value) }
                        }
                    }
                }
            }
            section.stories {
                h2 { "Flagship Success Stories:" }
                (content)
            }
        },
    )
}

fn table_of_contents(toc: &[TocEntry]) -> Markup {
    html! {
        @if !toc.is_empty() {
            nav.toc aria-label="Table of contents" {
                h2 { "On this page" }
                ul {
                    @for entry in toc {
                        li class={ "toc-level-" (entry.level) } {
                            a href={ "#" (entry.id) } { (entry.text) }
                        }
                    }
                }
            }
        }
    }
}

fn author_card(author: &Author) -> Markup {
    html! {
        aside.author {
            img.avatar src=(author.avatar) alt=(author.name);
            div {
                p.author-name { (author.name) }
                p.author-position { (author.position) }
            }
        }
    }
}

fn related_section(related: &[CaseStudy]) -> Markup {
    html! {
        @if !related.is_empty() {
            section.related {
                h2 { "More case studies" }
                div.grid {
                    @for case_study in related {
                        (case_study_card(case_study))
                    }
                }
            }
        }
    }
}

/// Related case studies, or nothing if they cannot be fetched
async fn related(state: &AppState, current: &CaseStudy) -> Vec<CaseStudy> {
    let candidates = state
        .freshness
        .get_or_fetch(FreshnessKey::Related(current.slug.clone()), || {
            CaseStudy::list_recent_excluding(
                &state.backend,
                Privilege::Anonymous,
                &current.slug,
                RELATED_WINDOW,
            )
        })
        .await;
    match candidates {
        Ok(candidates) => rank_related(
            &current.slug,
            &current.tags,
            Arc::unwrap_or_clone(candidates),
        ),
        Err(err) => {
            tracing::warn!(error = %err, slug = %current.slug, "failed to load related case studies");
            Vec::new()
        }
    }
}

pub(in crate::views) async fn detail(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Markup> {
    let found = state
        .freshness
        .get_or_fetch(FreshnessKey::Detail(slug.clone()), || async {
            let case_study =
                CaseStudy::retrieve_by_slug(&state.backend, Privilege::Anonymous, &slug).await?;
            Ok::<_, backend_client::Error>(case_study.into_iter().collect())
        })
        .await?;
    let Some(case_study) = found.first() else {
        return Err(PublicError::CaseStudyNotFound { slug }.into());
    };

    let rendered = markdown::render(&case_study.content);
    let author = case_study
        .author
        .as_deref()
        .and_then(|key| state.authors.get(key));
    let related = related(&state, case_study).await;
    let path = format!("/case-studies/{}", case_study.slug);
    let meta = PageMeta {
        title: Some(&case_study.title),
        description: Some(&case_study.description),
        path: &path,
        image: case_study.thumbnail.as_deref(),
        kind: OpenGraphType::Article,
        keywords: &case_study.tags,
    };

    Ok(layout::page(
        &state.config.site,
        &meta,
        html! {
            article.case-study {
                a.back href="/" { "Back to all case studies" }
                header {
                    (tag_list(&case_study.tags))
                    h1 { (case_study.title) }
                    p.description { (case_study.description) }
                    p.meta {
                        time datetime=(case_study.date) { (layout::format_date(case_study.date)) }
                        @if let Some(read_time) = &case_study.read_time {
                            " · " (read_time)
                        }
                    }
                    @if let Some(author) = author {
                        (author_card(author))
                    }
                }
                @if let Some(thumbnail) = &case_study.thumbnail {
                    img.hero-image src=(thumbnail) alt=(case_study.title);
                }
                div.layout {
                    (table_of_contents(&rendered.toc))
                    div.content { (PreEscaped(rendered.html)) }
                }
            }
            (related_section(&related))
        },
    ))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use backend_client::mocking::MockingBackend;
    use backend_client::mocking::Operation;
    use pretty_assertions::assert_eq;

    use crate::models::CaseStudy;
    use crate::models::case_study::TABLE;
    use crate::models::case_study::fixtures::case_study;
    use crate::views::test_app::TestAppBuilder;

    fn with_rows(rows: Vec<CaseStudy>) -> MockingBackend {
        MockingBackend::new().with_rows(TABLE, rows)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn list_is_ordered_by_date() {
        let backend = with_rows(vec![
            case_study("older", "2023-01-01", &[]),
            case_study("newest", "2024-06-01", &[]),
            case_study("middle", "2023-06-01", &[]),
        ]);
        let app = TestAppBuilder::new().backend(backend).build();
        let body = app.fetch(app.get("/")).await.assert_status(StatusCode::OK).text();
        let newest = body.find("/case-studies/newest").unwrap();
        let middle = body.find("/case-studies/middle").unwrap();
        let older = body.find("/case-studies/older").unwrap();
        assert!(newest < middle && middle < older);
        assert!(body.contains("June 1, 2024"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn home_page_opens_with_the_hero() {
        let app = TestAppBuilder::default_app();
        let body = app.fetch(app.get("/")).await.assert_status(StatusCode::OK).text();
        assert!(body.contains("<h1>RapidXAI Case Studies &amp; Client Success Stories</h1>"));
        assert!(body.contains("<dd>$500,000+</dd>"));
        assert!(body.contains("<dt>Project Completion Rate</dt>"));
        assert!(body.find("</section>") < body.find("Flagship Success Stories:"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn empty_list_shows_the_empty_state() {
        let app = TestAppBuilder::default_app();
        let body = app.fetch(app.get("/")).await.assert_status(StatusCode::OK).text();
        assert!(body.contains("No case studies yet"));
        assert!(body.contains("Check back soon for our success stories"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn store_failure_keeps_the_list_page_up() {
        let app = TestAppBuilder::default_app();
        app.backend()
            .fail(Operation::Select, StatusCode::SERVICE_UNAVAILABLE, "store down");
        let body = app.fetch(app.get("/")).await.assert_status(StatusCode::OK).text();
        assert!(body.contains("Error loading case studies. Please try again later."));
        assert!(!body.contains("No case studies yet"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn public_reads_use_the_anonymous_key() {
        let app = TestAppBuilder::new()
            .backend(with_rows(vec![case_study("acme", "2024-01-01", &["ai"])]))
            .build();
        app.fetch(app.get("/")).await.assert_status(StatusCode::OK);
        app.fetch(app.get("/case-studies/acme"))
            .await
            .assert_status(StatusCode::OK);
        let calls = app.backend().calls();
        assert!(!calls.is_empty());
        assert!(
            calls
                .iter()
                .all(|call| call.privilege == Some(backend_client::Privilege::Anonymous))
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn detail_renders_the_case_study() {
        let mut acme = case_study("acme", "2024-01-01", &["AI", "Voice"]);
        acme.author = Some("rapidxai".to_owned());
        acme.read_time = Some("5 min read".to_owned());
        acme.content = "## The Challenge\n\nSlow calls.\n\n### Pain Points:\n\n- cost".to_owned();
        let app = TestAppBuilder::new().backend(with_rows(vec![acme])).build();
        let body = app
            .fetch(app.get("/case-studies/acme"))
            .await
            .assert_status(StatusCode::OK)
            .text();
        assert!(body.contains("<h1>Title of acme</h1>"));
        assert!(body.contains(r#"<h2 id="the-challenge">The Challenge</h2>"#));
        assert!(body.contains(r##"<a href="#pain-points">Pain Points:</a>"##));
        assert!(body.contains("RapidXAI Team"));
        assert!(body.contains("5 min read"));
        assert!(body.contains("<title>Title of acme | RapidXAI Case Studies</title>"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn unknown_author_keys_render_no_author_card() {
        let mut acme = case_study("acme", "2024-01-01", &[]);
        acme.author = Some("ghost".to_owned());
        let app = TestAppBuilder::new().backend(with_rows(vec![acme])).build();
        let body = app
            .fetch(app.get("/case-studies/acme"))
            .await
            .assert_status(StatusCode::OK)
            .text();
        assert!(!body.contains(r#"class="author""#));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn unknown_slug_is_not_found() {
        let app = TestAppBuilder::default_app();
        let body = app
            .fetch(app.get("/case-studies/missing"))
            .await
            .assert_status(StatusCode::NOT_FOUND)
            .text();
        assert!(body.contains("Page not found"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn store_failure_on_detail_is_a_bad_gateway() {
        let app = TestAppBuilder::default_app();
        app.backend()
            .fail(Operation::Select, StatusCode::SERVICE_UNAVAILABLE, "store down");
        app.fetch(app.get("/case-studies/acme"))
            .await
            .assert_status(StatusCode::BAD_GATEWAY);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn related_section_is_ranked_by_shared_tags() {
        let app = TestAppBuilder::new()
            .backend(with_rows(vec![
                case_study("current", "2024-01-01", &["ai", "voice"]),
                case_study("recent-unrelated", "2024-06-01", &["crm"]),
                case_study("old-related", "2020-01-01", &["ai", "voice"]),
                case_study("partial", "2022-01-01", &["ai"]),
                case_study("another", "2023-01-01", &["saas"]),
            ]))
            .build();
        let body = app
            .fetch(app.get("/case-studies/current"))
            .await
            .assert_status(StatusCode::OK)
            .text();
        let section = &body[body.find("More case studies").unwrap()..];
        let positions: Vec<_> = ["old-related", "partial", "recent-unrelated"]
            .iter()
            .map(|slug| section.find(&format!("/case-studies/{slug}\"")).unwrap())
            .collect();
        assert!(positions.windows(2).all(|pair| pair[0] < pair[1]));
        assert!(!section.contains("/case-studies/another\""));
        assert!(!section.contains("/case-studies/current\""));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn related_section_is_omitted_when_empty() {
        let app = TestAppBuilder::new()
            .backend(with_rows(vec![case_study("lonely", "2024-01-01", &["ai"])]))
            .build();
        let body = app
            .fetch(app.get("/case-studies/lonely"))
            .await
            .assert_status(StatusCode::OK)
            .text();
        assert!(!body.contains("More case studies"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn public_pages_are_revalidated_after_the_window() {
        let app = TestAppBuilder::new()
            .backend(with_rows(vec![case_study("acme", "2024-01-01", &[])]))
            .revalidate(std::time::Duration::from_secs(60))
            .build();
        app.fetch(app.get("/")).await.assert_status(StatusCode::OK);
        app.fetch(app.get("/")).await.assert_status(StatusCode::OK);
        assert_eq!(app.backend().count(Operation::Select), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn unknown_slugs_are_looked_up_every_time() {
        let app = TestAppBuilder::new()
            .revalidate(std::time::Duration::from_secs(60))
            .build();
        for _ in 0..2 {
            app.fetch(app.get("/case-studies/missing"))
                .await
                .assert_status(StatusCode::NOT_FOUND);
        }
        assert_eq!(app.backend().count(Operation::Select), 2);
    }
}
