//! Markdown rendering of case study content
//!
//! On top of plain GitHub flavored markdown rendering:
//!
//! - `h1` to `h3` headings get an `id` so they can be linked to with a fragment
//! - links to `http(s)` targets open in a new tab
//! - tables are wrapped in a horizontally scrollable container
//! - raw HTML is escaped

use std::collections::HashMap;
use std::sync::LazyLock;

use pulldown_cmark::CowStr;
use pulldown_cmark::Event;
use pulldown_cmark::HeadingLevel;
use pulldown_cmark::Options;
use pulldown_cmark::Parser;
use pulldown_cmark::Tag;
use pulldown_cmark::TagEnd;
use pulldown_cmark_escape::escape_href;
use pulldown_cmark_escape::escape_html;
use regex::Regex;

static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern should compile"));
static NON_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_-]").expect("non word pattern should compile"));

/// A heading listed in the table of contents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocEntry {
    pub level: u8,
    pub text: String,
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMarkdown {
    pub html: String,
    /// `h2` and `h3` headings, in document order
    pub toc: Vec<TocEntry>,
}

/// Anchor of a heading: lowercase, whitespace runs replaced by `-`, anything but ASCII
/// word characters and `-` removed
pub fn heading_id(text: &str) -> String {
    let lowercase = text.to_lowercase();
    let hyphenated = WHITESPACE_RUN.replace_all(&lowercase, "-");
    NON_WORD.replace_all(&hyphenated, "").into_owned()
}

fn options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_FOOTNOTES
}

/// Opening tag of a link to another site
fn external_link(dest_url: &str, title: &str) -> Result<String, std::fmt::Error> {
    let mut html = String::from("<a href=\"");
    escape_href(&mut html, dest_url)?;
    html.push('"');
    if !title.is_empty() {
        html.push_str(" title=\"");
        escape_html(&mut html, title)?;
        html.push('"');
    }
    html.push_str(" target=\"_blank\" rel=\"noopener noreferrer\">");
    Ok(html)
}

fn level_number(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

/// Text content of the heading opened at `events[start]`
fn heading_text(events: &[Event<'_>], start: usize) -> String {
    let mut text = String::new();
    for event in &events[start + 1..] {
        match event {
            Event::End(TagEnd::Heading(_)) => break,
            Event::Text(t) | Event::Code(t) => text.push_str(t),
            Event::SoftBreak | Event::HardBreak => text.push(' '),
            _ => (),
        }
    }
    text
}

pub fn render(content: &str) -> RenderedMarkdown {
    let mut events: Vec<Event<'_>> = Parser::new_ext(content, options()).collect();

    // Headings get their anchor before rendering, once their whole text is known
    let mut toc = Vec::new();
    let mut seen_ids: HashMap<String, usize> = HashMap::new();
    for index in 0..events.len() {
        let Event::Start(Tag::Heading { level, .. }) = &events[index] else {
            continue;
        };
        let level = level_number(*level);
        if level > 3 {
            continue;
        }
        let text = heading_text(&events, index);
        let base = heading_id(&text);
        let occurrences = seen_ids.entry(base.clone()).or_default();
        let id = match *occurrences {
            0 => base,
            n => format!("{base}-{n}"),
        };
        *occurrences += 1;
        if level >= 2 {
            toc.push(TocEntry {
                level,
                text: text.trim().to_owned(),
                id: id.clone(),
            });
        }
        if let Event::Start(Tag::Heading { id: anchor, .. }) = &mut events[index] {
            *anchor = (!id.is_empty()).then(|| CowStr::from(id));
        }
    }

    let events = events.into_iter().flat_map(|event| match event {
        Event::Start(Tag::Link {
            link_type,
            dest_url,
            title,
            id,
        }) if dest_url.starts_with("http") => match external_link(&dest_url, &title) {
            Ok(link) => vec![Event::InlineHtml(CowStr::from(link))],
            Err(_) => vec![Event::Start(Tag::Link {
                link_type,
                dest_url,
                title,
                id,
            })],
        },
        Event::Start(Tag::Table(alignments)) => vec![
            Event::Html(CowStr::Borrowed("<div class=\"table-wrapper\">")),
            Event::Start(Tag::Table(alignments)),
        ],
        Event::End(TagEnd::Table) => vec![
            Event::End(TagEnd::Table),
            Event::Html(CowStr::Borrowed("</div>\n")),
        ],
        Event::Html(raw) | Event::InlineHtml(raw) => vec![Event::Text(raw)],
        event => vec![event],
    });

    let mut html = String::with_capacity(content.len() * 3 / 2);
    pulldown_cmark::html::push_html(&mut html, events);
    RenderedMarkdown { html, toc }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("The Challenge", "the-challenge")]
    #[case("Pain Points:", "pain-points")]
    #[case("Results  &  ROI (2024)", "results--roi-2024")]
    #[case("Café", "caf")]
    #[case("snake_case stays", "snake_case-stays")]
    fn heading_ids(#[case] text: &str, #[case] expected: &str) {
        assert_eq!(heading_id(text), expected);
    }

    #[test]
    fn headings_are_anchored_and_listed() {
        let rendered = render("# Title\n\n## The Challenge\n\ntext\n\n### Pain Points:\n\n#### Deep\n");
        assert!(rendered.html.contains(r#"<h1 id="title">Title</h1>"#));
        assert!(rendered.html.contains(r#"<h2 id="the-challenge">The Challenge</h2>"#));
        assert!(rendered.html.contains(r#"<h3 id="pain-points">Pain Points:</h3>"#));
        assert!(rendered.html.contains("<h4>Deep</h4>"));
        assert_eq!(
            rendered.toc,
            vec![
                TocEntry {
                    level: 2,
                    text: "The Challenge".to_owned(),
                    id: "the-challenge".to_owned()
                },
                TocEntry {
                    level: 3,
                    text: "Pain Points:".to_owned(),
                    id: "pain-points".to_owned()
                },
            ]
        );
    }

    #[test]
    fn duplicate_headings_get_distinct_anchors() {
        let rendered = render("## Results\n\n## Results\n");
        let ids: Vec<_> = rendered.toc.iter().map(|entry| entry.id.as_str()).collect();
        assert_eq!(ids, ["results", "results-1"]);
    }

    #[test]
    fn formatted_heading_text_is_used_for_the_anchor() {
        let rendered = render("## The `fast` **path**\n");
        assert_eq!(rendered.toc[0].id, "the-fast-path");
        assert!(rendered.html.contains(r#"<h2 id="the-fast-path">"#));
    }

    #[test]
    fn external_links_open_in_a_new_tab() {
        let rendered = render("[site](https://example.com/?a=1&b=2) and [local](/case-studies/x)");
        assert!(rendered.html.contains(
            r#"<a href="https://example.com/?a=1&amp;b=2" target="_blank" rel="noopener noreferrer">site</a>"#
        ));
        assert!(rendered.html.contains(r#"<a href="/case-studies/x">local</a>"#));
    }

    #[test]
    fn external_link_attributes_are_escaped() {
        let rendered = render(r#"[site](<https://example.com/a b> "say \"hi\"")"#);
        assert!(
            rendered.html.contains(
                r#"<a href="https://example.com/a%20b" title="say &quot;hi&quot;" target="_blank""#
            ),
            "{}",
            rendered.html
        );
    }

    #[test]
    fn tables_are_wrapped() {
        let rendered = render("| Metric | Result |\n|---|---|\n| Cost | Low |\n");
        let wrapper = rendered.html.find(r#"<div class="table-wrapper">"#);
        let table = rendered.html.find("<table>");
        assert!(wrapper.is_some() && wrapper < table, "{}", rendered.html);
        let closing = rendered.html.find("</div>");
        assert!(closing > rendered.html.find("</table>"), "{}", rendered.html);
    }

    #[test]
    fn raw_html_is_escaped() {
        let rendered = render("<script>alert(1)</script>\n\nHello <b>world</b>");
        assert!(!rendered.html.contains("<script>"));
        assert!(rendered.html.contains("&lt;script&gt;"));
        assert!(!rendered.html.contains("<b>"));
    }

    #[test]
    fn default_template_renders() {
        let rendered = render(crate::models::form::DEFAULT_CONTENT);
        let ids: Vec<_> = rendered.toc.iter().map(|entry| entry.id.as_str()).collect();
        assert_eq!(
            ids,
            [
                "client-information",
                "the-challenge",
                "pain-points",
                "the-solution",
                "key-features-implemented",
                "measurable-results",
                "technical-excellence",
            ]
        );
    }
}
