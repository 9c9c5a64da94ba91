use crate::traits::ArticleStore;
use crate::types::{
    DailyDigest, EnrichedArticle, Language, PipelineError, RawArticle, Result, Sentiment,
    StoredArticle,
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use tracing::{debug, info};

/// PostgreSQL-backed store. URL and digest-date uniqueness are enforced by
/// table constraints.
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let db = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        info!("Connected to PostgreSQL");
        Ok(Self { db })
    }

    pub fn from_pool(db: PgPool) -> Self {
        Self { db }
    }

    /// Create the tables if they do not exist yet.
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS articles (
                id BIGSERIAL PRIMARY KEY,
                title TEXT NOT NULL,
                original_url TEXT NOT NULL UNIQUE,
                source_name TEXT NOT NULL,
                language TEXT NOT NULL,
                published_at TIMESTAMPTZ NOT NULL,
                raw_content TEXT NOT NULL,
                description TEXT,
                category TEXT NOT NULL,
                summary TEXT NOT NULL,
                reading_time_minutes INTEGER NOT NULL,
                tags TEXT NOT NULL,
                sentiment TEXT NOT NULL,
                is_archived BOOLEAN NOT NULL DEFAULT false,
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.db)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS daily_digests (
                id BIGSERIAL PRIMARY KEY,
                date DATE NOT NULL UNIQUE,
                overall_summary TEXT NOT NULL,
                top_categories TEXT NOT NULL,
                total_articles INTEGER NOT NULL,
                created_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.db)
        .await?;

        debug!("Schema ready");
        Ok(())
    }

    fn row_to_stored(row: &PgRow) -> Result<StoredArticle> {
        let language: String = row.try_get("language")?;
        let sentiment: String = row.try_get("sentiment")?;
        let tags: String = row.try_get("tags")?;
        let reading_time: i32 = row.try_get("reading_time_minutes")?;

        Ok(StoredArticle {
            id: row.try_get("id")?,
            article: EnrichedArticle {
                raw: RawArticle {
                    title: row.try_get("title")?,
                    original_url: row.try_get("original_url")?,
                    source_name: row.try_get("source_name")?,
                    language: parse_language(&language)?,
                    published_at: row.try_get::<DateTime<Utc>, _>("published_at")?,
                    raw_content: row.try_get("raw_content")?,
                    category: row.try_get("category")?,
                    description: row.try_get("description")?,
                },
                summary: row.try_get("summary")?,
                reading_time_minutes: u32::try_from(reading_time).unwrap_or(1),
                tags: serde_json::from_str(&tags)?,
                sentiment: Sentiment::parse(&sentiment).ok_or_else(|| {
                    PipelineError::Persistence(format!("unknown sentiment in row: {}", sentiment))
                })?,
            },
            is_archived: row.try_get("is_archived")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

fn parse_language(value: &str) -> Result<Language> {
    match value {
        "zh" => Ok(Language::Zh),
        "en" => Ok(Language::En),
        other => Err(PipelineError::Persistence(format!("unknown language in row: {}", other))),
    }
}

#[async_trait]
impl ArticleStore for PgStore {
    async fn exists_by_url(&self, url: &str) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM articles WHERE original_url = $1")
            .bind(url)
            .fetch_optional(&self.db)
            .await?;
        Ok(row.is_some())
    }

    async fn insert_article(&self, article: &EnrichedArticle) -> Result<StoredArticle> {
        let now = Utc::now();
        let raw = &article.raw;
        let reading_time = i32::try_from(article.reading_time_minutes).unwrap_or(i32::MAX);

        let row = sqlx::query(
            r#"
            INSERT INTO articles (title, original_url, source_name, language, published_at,
                raw_content, description, category, summary, reading_time_minutes, tags,
                sentiment, is_archived, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, false, $13, $14)
            ON CONFLICT (original_url) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(&raw.title)
        .bind(&raw.original_url)
        .bind(&raw.source_name)
        .bind(raw.language.as_str())
        .bind(raw.published_at)
        .bind(&raw.raw_content)
        .bind(&raw.description)
        .bind(&raw.category)
        .bind(&article.summary)
        .bind(reading_time)
        .bind(serde_json::to_string(&article.tags)?)
        .bind(article.sentiment.as_str())
        .bind(now)
        .bind(now)
        .fetch_optional(&self.db)
        .await?;

        match row {
            Some(row) => {
                let stored = Self::row_to_stored(&row)?;
                debug!("Stored article {} as #{}", raw.original_url, stored.id);
                Ok(stored)
            }
            None => Err(PipelineError::PersistenceConflict {
                url: raw.original_url.clone(),
            }),
        }
    }

    async fn insert_digest_if_absent(&self, digest: &DailyDigest) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO daily_digests (date, overall_summary, top_categories, total_articles, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (date) DO NOTHING
            "#,
        )
        .bind(digest.date)
        .bind(&digest.overall_summary)
        .bind(serde_json::to_string(&digest.top_categories)?)
        .bind(i32::try_from(digest.total_articles).unwrap_or(i32::MAX))
        .bind(Utc::now())
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn digest_for(&self, date: NaiveDate) -> Result<Option<DailyDigest>> {
        let row = sqlx::query(
            "SELECT date, overall_summary, top_categories, total_articles FROM daily_digests WHERE date = $1",
        )
        .bind(date)
        .fetch_optional(&self.db)
        .await?;

        match row {
            Some(row) => {
                let categories: String = row.try_get("top_categories")?;
                let total: i32 = row.try_get("total_articles")?;
                Ok(Some(DailyDigest {
                    date: row.try_get("date")?,
                    overall_summary: row.try_get("overall_summary")?,
                    top_categories: serde_json::from_str(&categories)?,
                    total_articles: usize::try_from(total).unwrap_or(0),
                }))
            }
            None => Ok(None),
        }
    }

    async fn count_articles(&self) -> Result<usize> {
        let count: i64 = sqlx::query("SELECT COUNT(*) FROM articles")
            .fetch_one(&self.db)
            .await?
            .try_get(0)?;
        Ok(usize::try_from(count).unwrap_or(0))
    }
}
