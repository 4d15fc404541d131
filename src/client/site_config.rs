use clap::Args;
use url::Url;

use crate::views::layout;
use crate::views::layout::SITE_DESCRIPTION;
use crate::views::layout::SITE_KEYWORDS;
use crate::views::layout::SITE_NAME;
use crate::views::layout::SITE_URL;

/// Identity of the public site, used in page titles and social metadata
#[derive(Args, Debug, Clone)]
pub struct SiteConfig {
    #[arg(long, env = "CASEBOOK_SITE_NAME", default_value = SITE_NAME)]
    site_name: String,
    /// Public URL of the site, canonical links are built from it
    #[arg(long, env = "CASEBOOK_SITE_URL", default_value = SITE_URL)]
    site_url: Url,
    #[arg(long, env = "CASEBOOK_SITE_DESCRIPTION", default_value = SITE_DESCRIPTION)]
    site_description: String,
    #[arg(
        long,
        env = "CASEBOOK_SITE_KEYWORDS",
        value_delimiter = ',',
        default_values_t = SITE_KEYWORDS.iter().map(|keyword| keyword.to_string())
    )]
    site_keywords: Vec<String>,
}

impl From<SiteConfig> for layout::SiteConfig {
    fn from(
        SiteConfig {
            site_name,
            site_url,
            site_description,
            site_keywords,
        }: SiteConfig,
    ) -> Self {
        Self {
            name: site_name,
            url: site_url,
            description: site_description,
            keywords: site_keywords
                .into_iter()
                .map(|keyword| keyword.trim().to_owned())
                .filter(|keyword| !keyword.is_empty())
                .collect(),
        }
    }
}
