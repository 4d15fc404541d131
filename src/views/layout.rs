//! Page skeletons shared by every HTML response

use axum::http::StatusCode;
use chrono::NaiveDate;
use maud::DOCTYPE;
use maud::Markup;
use maud::PreEscaped;
use maud::html;
use url::Url;

pub const SITE_NAME: &str = "RapidXAI Case Studies";
pub const SITE_URL: &str = "https://rapidxai.com";
pub const SITE_DESCRIPTION: &str = "Proven Success Stories & Measurable Results. AI automation solutions transforming Real Estate, Education, Digital Marketing, and Enterprise SaaS.";
pub const SITE_KEYWORDS: &[&str] = &[
    "AI Automation",
    "RapidXAI",
    "Case Studies",
    "Client Success Stories",
    "Voice AI",
    "Cold Calling Automation",
    "Real Estate Automation",
    "AI Agents",
    "Business Automation",
    "ROI-Driven Solutions",
    "Enterprise SaaS",
    "Digital Marketing Automation",
];
const TWITTER_CREATOR: &str = "@rapidxai";

/// Identity of the site, used for page titles and social metadata
#[derive(Debug, Clone, PartialEq)]
pub struct SiteConfig {
    pub name: String,
    pub url: Url,
    pub description: String,
    pub keywords: Vec<String>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            name: SITE_NAME.to_owned(),
            url: Url::parse(SITE_URL).expect("default site URL should be valid"),
            description: SITE_DESCRIPTION.to_owned(),
            keywords: SITE_KEYWORDS.iter().map(|k| (*k).to_owned()).collect(),
        }
    }
}

impl SiteConfig {
    /// Absolute URL of `path` on the public site
    pub fn absolute(&self, path: &str) -> String {
        self.url
            .join(path)
            .map(|url| url.to_string())
            .unwrap_or_else(|_| format!("{}{path}", self.url.as_str().trim_end_matches('/')))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum OpenGraphType {
    Website,
    Article,
}

/// Metadata of one public page
#[derive(Debug, Clone)]
pub struct PageMeta<'a> {
    /// `None` for the home page, which uses the site name alone
    pub title: Option<&'a str>,
    pub description: Option<&'a str>,
    pub path: &'a str,
    pub image: Option<&'a str>,
    pub kind: OpenGraphType,
    pub keywords: &'a [String],
}

impl<'a> PageMeta<'a> {
    pub fn website(path: &'a str) -> Self {
        Self {
            title: None,
            description: None,
            path,
            image: None,
            kind: OpenGraphType::Website,
            keywords: &[],
        }
    }
}

pub fn format_date(date: NaiveDate) -> String {
    date.format("%B %-d, %Y").to_string()
}

fn head(title: &str, extra: Markup) -> Markup {
    html! {
        head {
            meta charset="utf-8";
            meta name="viewport" content="width=device-width, initial-scale=1";
            title { (title) }
            (extra)
        }
    }
}

/// A public page, with the search engine and social metadata of `meta`
pub fn page(site: &SiteConfig, meta: &PageMeta<'_>, body: Markup) -> Markup {
    let title = match meta.title {
        Some(title) => format!("{title} | {}", site.name),
        None => site.name.clone(),
    };
    let description = meta.description.unwrap_or(&site.description);
    let keywords = site
        .keywords
        .iter()
        .chain(meta.keywords)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    let url = site.absolute(meta.path);
    let metadata = html! {
        meta name="description" content=(description);
        meta name="keywords" content=(keywords);
        link rel="canonical" href=(url);
        meta property="og:type" content=(meta.kind);
        meta property="og:locale" content="en_US";
        meta property="og:site_name" content=(site.name);
        meta property="og:title" content=(title);
        meta property="og:description" content=(description);
        meta property="og:url" content=(url);
        @if let Some(image) = meta.image {
            meta property="og:image" content=(image);
        }
        meta name="twitter:card" content="summary_large_image";
        meta name="twitter:creator" content=(TWITTER_CREATOR);
        meta name="twitter:title" content=(title);
        meta name="twitter:description" content=(description);
        @if let Some(image) = meta.image {
            meta name="twitter:image" content=(image);
        }
    };
    html! {
        (DOCTYPE)
        html lang="en" {
            (head(&title, metadata))
            body {
                header.site-header {
                    a.brand href="/" { (site.name) }
                }
                main { (body) }
                footer.site-footer {
                    p { "© " (site.name) }
                }
            }
        }
    }
}

/// A page of the admin panel. `email` is the signed-in user, if any.
pub fn admin_page(title: &str, email: Option<&str>, body: Markup) -> Markup {
    let robots = html! { meta name="robots" content="noindex, nofollow"; };
    html! {
        (DOCTYPE)
        html lang="en" {
            (head(&format!("{title} | Admin"), robots))
            body.admin {
                header.admin-header {
                    a.brand href="/admin" { "Case Studies Admin" }
                    @if let Some(email) = email {
                        nav {
                            span.user-email { (email) }
                            a href="/" target="_blank" { "View site" }
                            form method="post" action="/admin/logout" {
                                button type="submit" { "Sign out" }
                            }
                        }
                    }
                }
                main { (body) }
            }
        }
    }
}

pub fn error_page(status: StatusCode, message: &str) -> Markup {
    let heading = match status {
        StatusCode::NOT_FOUND => "Page not found",
        status if status.is_client_error() => "Request failed",
        _ => "Something went wrong",
    };
    let robots = html! { meta name="robots" content="noindex"; };
    html! {
        (DOCTYPE)
        html lang="en" {
            (head(heading, robots))
            body {
                main.error {
                    p.status { (status.as_u16()) }
                    h1 { (heading) }
                    p { (message) }
                    a href="/" { "Back to case studies" }
                }
            }
        }
    }
}

/// Inline message shown next to the control that failed
pub fn inline_error(message: &str) -> Markup {
    html! {
        div.inline-error role="alert" { (message) }
    }
}

/// Disables the submit buttons of `form[data-guarded]` once submitted
///
/// The clicked button is disabled too, so its `action` is forwarded through a hidden
/// input.
pub const GUARDED_FORM_SCRIPT: PreEscaped<&str> = PreEscaped(
    r#"<script>
document.querySelectorAll("form[data-guarded]").forEach((form) => {
  form.addEventListener("submit", (event) => {
    if (form.dataset.submitting) { event.preventDefault(); return; }
    form.dataset.submitting = "1";
    const submitter = event.submitter;
    if (submitter && submitter.name) {
      const hidden = document.createElement("input");
      hidden.type = "hidden";
      hidden.name = submitter.name;
      hidden.value = submitter.value;
      form.appendChild(hidden);
    }
    form.querySelectorAll("button").forEach((button) => { button.disabled = true; });
  });
});
</script>"#,
);

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn home_page_metadata() {
        let site = SiteConfig::default();
        let html = page(&site, &PageMeta::website("/"), html! { p { "hi" } }).into_string();
        assert!(html.contains("<title>RapidXAI Case Studies</title>"));
        assert!(html.contains(r#"<meta property="og:type" content="website">"#));
        assert!(html.contains(r#"<meta property="og:locale" content="en_US">"#));
        assert!(html.contains(r#"<meta name="twitter:card" content="summary_large_image">"#));
        assert!(html.contains(r#"<meta name="twitter:creator" content="@rapidxai">"#));
        assert!(html.contains(r#"<link rel="canonical" href="https://rapidxai.com/">"#));
        assert!(html.contains("Voice AI, Cold Calling Automation"));
    }

    #[test]
    fn article_metadata_is_escaped() {
        let site = SiteConfig::default();
        let keywords = vec!["AI".to_owned()];
        let meta = PageMeta {
            title: Some("Acme <3 \"AI\""),
            description: Some("Tripled ROI"),
            path: "/case-studies/acme",
            image: Some("https://cdn.example.com/a.png"),
            kind: OpenGraphType::Article,
            keywords: &keywords,
        };
        let html = page(&site, &meta, html! {}).into_string();
        assert!(html.contains("<title>Acme &lt;3 &quot;AI&quot; | RapidXAI Case Studies</title>"));
        assert!(html.contains(r#"<meta property="og:type" content="article">"#));
        assert!(html.contains(r#"content="https://rapidxai.com/case-studies/acme""#));
        assert!(html.contains(r#"<meta name="twitter:image" content="https://cdn.example.com/a.png">"#));
        assert!(html.contains("Digital Marketing Automation, AI\""));
    }

    #[test]
    fn dates_are_spelled_out() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        assert_eq!(format_date(date), "June 1, 2024");
    }

    #[test]
    fn admin_navigation_shows_the_user() {
        let html = admin_page("Dashboard", Some("admin@rapidxai.com"), html! {}).into_string();
        assert!(html.contains("admin@rapidxai.com"));
        assert!(html.contains(r#"action="/admin/logout""#));
        let html = admin_page("Sign in", None, html! {}).into_string();
        assert!(!html.contains("/admin/logout"));
    }
}
