use backend_client::BackendClient;
use backend_client::Direction;
use backend_client::Privilege;
use backend_client::Query;
use chrono::DateTime;
use chrono::NaiveDate;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

use super::Tags;

pub const TABLE: &str = "case_studies";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseStudy {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub tags: Tags,
    #[serde(default)]
    pub featured: bool,
    pub read_time: Option<String>,
    pub author: Option<String>,
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The columns written by the admin panel
///
/// Store-managed columns (`id`, `created_at`, `updated_at`) are never sent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaseStudyPayload {
    pub slug: String,
    pub title: String,
    pub description: String,
    pub date: NaiveDate,
    pub tags: Tags,
    pub featured: bool,
    pub read_time: Option<String>,
    pub author: Option<String>,
    pub thumbnail: Option<String>,
    pub content: String,
}

type Result<T> = std::result::Result<T, backend_client::Error>;

impl CaseStudy {
    /// Every case study, most recent `date` first
    pub async fn list_by_date(backend: &BackendClient, privilege: Privilege) -> Result<Vec<Self>> {
        let query = Query::new().order("date", Direction::Desc);
        backend.select(privilege, TABLE, &query).await
    }

    /// Every case study, last created first
    pub async fn list_by_creation(
        backend: &BackendClient,
        privilege: Privilege,
    ) -> Result<Vec<Self>> {
        let query = Query::new().order("created_at", Direction::Desc);
        backend.select(privilege, TABLE, &query).await
    }

    /// The `limit` most recent case studies, the one at `slug` excluded
    pub async fn list_recent_excluding(
        backend: &BackendClient,
        privilege: Privilege,
        slug: &str,
        limit: usize,
    ) -> Result<Vec<Self>> {
        let query = Query::new()
            .neq("slug", slug)
            .order("date", Direction::Desc)
            .limit(limit);
        backend.select(privilege, TABLE, &query).await
    }

    pub async fn retrieve_by_slug(
        backend: &BackendClient,
        privilege: Privilege,
        slug: &str,
    ) -> Result<Option<Self>> {
        let query = Query::new().eq("slug", slug).limit(1);
        let rows: Vec<Self> = backend.select(privilege, TABLE, &query).await?;
        Ok(rows.into_iter().next())
    }

    pub async fn retrieve(
        backend: &BackendClient,
        privilege: Privilege,
        id: Uuid,
    ) -> Result<Option<Self>> {
        let query = Query::new().eq("id", id).limit(1);
        let rows: Vec<Self> = backend.select(privilege, TABLE, &query).await?;
        Ok(rows.into_iter().next())
    }

    pub async fn delete_static(backend: &BackendClient, privilege: Privilege, id: Uuid) -> Result<()> {
        let query = Query::new().eq("id", id);
        backend.delete(privilege, TABLE, &query).await
    }
}

impl CaseStudyPayload {
    pub async fn create(&self, backend: &BackendClient, privilege: Privilege) -> Result<CaseStudy> {
        backend.insert(privilege, TABLE, self).await
    }

    /// Returns `None` if no case study has this id
    pub async fn update(
        &self,
        backend: &BackendClient,
        privilege: Privilege,
        id: Uuid,
    ) -> Result<Option<CaseStudy>> {
        let query = Query::new().eq("id", id);
        let rows: Vec<CaseStudy> = backend.update(privilege, TABLE, &query, self).await?;
        Ok(rows.into_iter().next())
    }
}
