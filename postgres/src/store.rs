//! [`CourseStore`] over a `PostgreSQL` connection pool.

use crate::config::PostgresConfig;
use crate::error::{PostgresError, map_db_error};
use crate::rows::{
    FromPgRow, certificate_columns, language_columns, language_progress_columns, lesson_columns,
    lesson_progress_columns, section_columns, section_progress_columns, series_columns,
    series_progress_columns,
};
use chrono::{DateTime, Utc};
use kiwiscript_core::certificate::{Certificate, NewCertificate};
use kiwiscript_core::content::{
    Aggregates, Language, Lesson, LessonArticle, LessonVideo, NewLanguage, NewLesson,
    NewSection, NewSeries, Section, Series, Sibling, SiblingScope,
};
use kiwiscript_core::progress::{
    CompletionDelta, LanguageProgress, LessonProgress, NewLessonProgress, NewSectionProgress,
    NewSeriesProgress, SectionProgress, SeriesProgress,
};
use kiwiscript_core::store::{CourseStore, CourseTransaction};
use kiwiscript_core::{
    CertificateId, CourseError, LessonId, ProgressId, Result, SectionId, SeriesId, UserId,
};
use sqlx::postgres::{PgArguments, PgPool, PgPoolOptions};
use sqlx::query::Query;
use sqlx::{Postgres, Transaction};
use std::fmt;

/// `PostgreSQL`-backed course store.
///
/// Cloning shares the pool.
///
/// # Example
///
/// ```no_run
/// use kiwiscript_postgres::{PostgresConfig, PostgresCourseStore};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = PostgresCourseStore::connect(&PostgresConfig::new("postgres://localhost/kiwi")).await?;
/// store.migrate().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct PostgresCourseStore {
    pool: PgPool,
}

impl PostgresCourseStore {
    /// Open a connection pool.
    ///
    /// # Errors
    ///
    /// Returns [`PostgresError::Connect`] if the database cannot be reached.
    pub async fn connect(config: &PostgresConfig) -> std::result::Result<Self, PostgresError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(Some(config.idle_timeout))
            .connect(&config.url)
            .await
            .map_err(PostgresError::Connect)?;
        tracing::info!(
            max_connections = config.max_connections,
            "Connected to PostgreSQL"
        );
        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply the bundled migrations.
    ///
    /// # Errors
    ///
    /// Returns [`PostgresError::Migrate`] if a migration fails.
    pub async fn migrate(&self) -> std::result::Result<(), PostgresError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        tracing::info!("Migrations applied");
        Ok(())
    }
}

impl CourseStore for PostgresCourseStore {
    type Transaction = PostgresTransaction;

    async fn begin(&self) -> Result<PostgresTransaction> {
        let tx = self.pool.begin().await.map_err(map_db_error)?;
        Ok(PostgresTransaction { tx })
    }
}

/// One database transaction.
///
/// Dropping it without [`CourseTransaction::commit`] rolls back when the connection
/// returns to the pool.
pub struct PostgresTransaction {
    tx: Transaction<'static, Postgres>,
}

impl fmt::Debug for PostgresTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresTransaction").finish_non_exhaustive()
    }
}

type PgQuery<'q> = Query<'q, Postgres, PgArguments>;

impl PostgresTransaction {
    async fn fetch_optional<T: FromPgRow>(&mut self, query: PgQuery<'_>) -> Result<Option<T>> {
        let row = query
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_db_error)?;
        row.as_ref().map(T::from_row).transpose().map_err(map_db_error)
    }

    /// A missing row is `NotFound`.
    async fn fetch_one<T: FromPgRow>(&mut self, query: PgQuery<'_>) -> Result<T> {
        let row = query.fetch_one(&mut *self.tx).await.map_err(map_db_error)?;
        T::from_row(&row).map_err(map_db_error)
    }

    async fn fetch_all<T: FromPgRow>(&mut self, query: PgQuery<'_>) -> Result<Vec<T>> {
        let rows = query.fetch_all(&mut *self.tx).await.map_err(map_db_error)?;
        rows.iter()
            .map(T::from_row)
            .collect::<std::result::Result<_, _>>()
            .map_err(map_db_error)
    }

    /// Insert that resolves its unique conflict with `ON CONFLICT DO NOTHING`, so the
    /// transaction stays usable when the row already exists.
    async fn insert_unless_exists<T: FromPgRow>(
        &mut self,
        query: PgQuery<'_>,
        conflict: &'static str,
    ) -> Result<T> {
        let row = self.fetch_optional(query).await?;
        row.ok_or_else(|| {
            metrics::counter!("postgres_insert_conflicts_total").increment(1);
            CourseError::conflict(conflict)
        })
    }

    async fn execute(&mut self, query: PgQuery<'_>) -> Result<u64> {
        let done = query.execute(&mut *self.tx).await.map_err(map_db_error)?;
        Ok(done.rows_affected())
    }

    /// Execute a statement that must touch at least one row.
    async fn execute_existing(&mut self, query: PgQuery<'_>) -> Result<()> {
        match self.execute(query).await? {
            0 => Err(CourseError::NotFound),
            _ => Ok(()),
        }
    }

    async fn count(&mut self, sql: &'static str, id: i32) -> Result<i64> {
        sqlx::query_scalar::<_, i64>(sql)
            .bind(id)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(map_db_error)
    }
}

/// Narrow a row count to the `i32` positions use.
fn position_count(count: i64) -> Result<i32> {
    i32::try_from(count).map_err(|_| CourseError::Unknown(format!("too many siblings: {count}")))
}

impl CourseTransaction for PostgresTransaction {
    async fn commit(self) -> Result<()> {
        self.tx.commit().await.map_err(map_db_error)
    }

    async fn rollback(self) -> Result<()> {
        self.tx.rollback().await.map_err(map_db_error)
    }

    // ═══════════════════════════════════════════════════════════
    // Languages and Series
    // ═══════════════════════════════════════════════════════════

    async fn find_language(&mut self, slug: &str) -> Result<Option<Language>> {
        self.fetch_optional(
            sqlx::query(concat!(
                "SELECT ",
                language_columns!(),
                " FROM languages WHERE slug = $1"
            ))
            .bind(slug),
        )
        .await
    }

    async fn create_language(&mut self, language: NewLanguage) -> Result<Language> {
        self.fetch_one(
            sqlx::query(concat!(
                "INSERT INTO languages (slug, name, author_id) VALUES ($1, $2, $3) RETURNING ",
                language_columns!()
            ))
            .bind(language.slug)
            .bind(language.name)
            .bind(language.author_id.as_i32()),
        )
        .await
    }

    async fn find_series(
        &mut self,
        language_slug: &str,
        series_slug: &str,
    ) -> Result<Option<Series>> {
        self.fetch_optional(
            sqlx::query(concat!(
                "SELECT ",
                series_columns!(),
                " FROM series WHERE language_slug = $1 AND slug = $2"
            ))
            .bind(language_slug)
            .bind(series_slug),
        )
        .await
    }

    async fn lock_series(&mut self, id: SeriesId) -> Result<Option<Series>> {
        self.fetch_optional(
            sqlx::query(concat!(
                "SELECT ",
                series_columns!(),
                " FROM series WHERE id = $1 FOR UPDATE"
            ))
            .bind(id.as_i32()),
        )
        .await
    }

    async fn share_series(&mut self, id: SeriesId) -> Result<Option<Series>> {
        self.fetch_optional(
            sqlx::query(concat!(
                "SELECT ",
                series_columns!(),
                " FROM series WHERE id = $1 FOR SHARE"
            ))
            .bind(id.as_i32()),
        )
        .await
    }

    async fn list_series_ids(&mut self) -> Result<Vec<SeriesId>> {
        let ids = sqlx::query_scalar::<_, i32>("SELECT id FROM series ORDER BY id")
            .fetch_all(&mut *self.tx)
            .await
            .map_err(map_db_error)?;
        Ok(ids.into_iter().map(SeriesId::new).collect())
    }

    async fn create_series(&mut self, series: NewSeries) -> Result<Series> {
        self.fetch_one(
            sqlx::query(concat!(
                "INSERT INTO series (language_slug, slug, title, description, author_id) \
                 VALUES ($1, $2, $3, $4, $5) RETURNING ",
                series_columns!()
            ))
            .bind(series.language_slug)
            .bind(series.slug)
            .bind(series.title)
            .bind(series.description)
            .bind(series.author_id.as_i32()),
        )
        .await
    }

    async fn set_series_published(&mut self, id: SeriesId, published: bool) -> Result<Series> {
        self.fetch_one(
            sqlx::query(concat!(
                "UPDATE series SET is_published = $2 WHERE id = $1 RETURNING ",
                series_columns!()
            ))
            .bind(id.as_i32())
            .bind(published),
        )
        .await
    }

    async fn apply_series_aggregates(&mut self, id: SeriesId, delta: Aggregates) -> Result<Series> {
        self.fetch_one(
            sqlx::query(concat!(
                "UPDATE series SET sections_count = sections_count + $2, \
                 lessons_count = lessons_count + $3, \
                 read_time_seconds = read_time_seconds + $4, \
                 watch_time_seconds = watch_time_seconds + $5 \
                 WHERE id = $1 RETURNING ",
                series_columns!()
            ))
            .bind(id.as_i32())
            .bind(delta.sections)
            .bind(delta.lessons)
            .bind(delta.read_time_seconds)
            .bind(delta.watch_time_seconds),
        )
        .await
    }

    async fn set_series_aggregates(
        &mut self,
        id: SeriesId,
        aggregates: Aggregates,
    ) -> Result<Series> {
        self.fetch_one(
            sqlx::query(concat!(
                "UPDATE series SET sections_count = $2, lessons_count = $3, \
                 read_time_seconds = $4, watch_time_seconds = $5 \
                 WHERE id = $1 RETURNING ",
                series_columns!()
            ))
            .bind(id.as_i32())
            .bind(aggregates.sections)
            .bind(aggregates.lessons)
            .bind(aggregates.read_time_seconds)
            .bind(aggregates.watch_time_seconds),
        )
        .await
    }

    // ═══════════════════════════════════════════════════════════
    // Sections
    // ═══════════════════════════════════════════════════════════

    async fn find_section(
        &mut self,
        series_id: SeriesId,
        id: SectionId,
    ) -> Result<Option<Section>> {
        self.fetch_optional(
            sqlx::query(concat!(
                "SELECT ",
                section_columns!(),
                " FROM series_sections WHERE id = $1 AND series_id = $2"
            ))
            .bind(id.as_i32())
            .bind(series_id.as_i32()),
        )
        .await
    }

    async fn lock_section(&mut self, id: SectionId) -> Result<Option<Section>> {
        self.fetch_optional(
            sqlx::query(concat!(
                "SELECT ",
                section_columns!(),
                " FROM series_sections WHERE id = $1 FOR UPDATE"
            ))
            .bind(id.as_i32()),
        )
        .await
    }

    async fn share_section(&mut self, id: SectionId) -> Result<Option<Section>> {
        self.fetch_optional(
            sqlx::query(concat!(
                "SELECT ",
                section_columns!(),
                " FROM series_sections WHERE id = $1 FOR SHARE"
            ))
            .bind(id.as_i32()),
        )
        .await
    }

    async fn list_sections(&mut self, series_id: SeriesId) -> Result<Vec<Section>> {
        self.fetch_all(
            sqlx::query(concat!(
                "SELECT ",
                section_columns!(),
                " FROM series_sections WHERE series_id = $1 ORDER BY position, id"
            ))
            .bind(series_id.as_i32()),
        )
        .await
    }

    async fn count_sections(&mut self, series_id: SeriesId) -> Result<i32> {
        let count = self
            .count(
                "SELECT COUNT(*) FROM series_sections WHERE series_id = $1",
                series_id.as_i32(),
            )
            .await?;
        position_count(count)
    }

    async fn create_section(&mut self, section: NewSection) -> Result<Section> {
        self.fetch_one(
            sqlx::query(concat!(
                "INSERT INTO series_sections (series_id, title, description, position) \
                 VALUES ($1, $2, $3, $4) RETURNING ",
                section_columns!()
            ))
            .bind(section.series_id.as_i32())
            .bind(section.title)
            .bind(section.description)
            .bind(section.position),
        )
        .await
    }

    async fn update_section_details(
        &mut self,
        id: SectionId,
        title: &str,
        description: &str,
    ) -> Result<Section> {
        self.fetch_one(
            sqlx::query(concat!(
                "UPDATE series_sections SET title = $2, description = $3 WHERE id = $1 RETURNING ",
                section_columns!()
            ))
            .bind(id.as_i32())
            .bind(title)
            .bind(description),
        )
        .await
    }

    async fn set_section_published(&mut self, id: SectionId, published: bool) -> Result<Section> {
        self.fetch_one(
            sqlx::query(concat!(
                "UPDATE series_sections SET is_published = $2 WHERE id = $1 RETURNING ",
                section_columns!()
            ))
            .bind(id.as_i32())
            .bind(published),
        )
        .await
    }

    async fn apply_section_aggregates(
        &mut self,
        id: SectionId,
        delta: Aggregates,
    ) -> Result<Section> {
        self.fetch_one(
            sqlx::query(concat!(
                "UPDATE series_sections SET lessons_count = lessons_count + $2, \
                 read_time_seconds = read_time_seconds + $3, \
                 watch_time_seconds = watch_time_seconds + $4 \
                 WHERE id = $1 RETURNING ",
                section_columns!()
            ))
            .bind(id.as_i32())
            .bind(delta.lessons)
            .bind(delta.read_time_seconds)
            .bind(delta.watch_time_seconds),
        )
        .await
    }

    async fn set_section_aggregates(
        &mut self,
        id: SectionId,
        aggregates: Aggregates,
    ) -> Result<Section> {
        self.fetch_one(
            sqlx::query(concat!(
                "UPDATE series_sections SET lessons_count = $2, read_time_seconds = $3, \
                 watch_time_seconds = $4 WHERE id = $1 RETURNING ",
                section_columns!()
            ))
            .bind(id.as_i32())
            .bind(aggregates.lessons)
            .bind(aggregates.read_time_seconds)
            .bind(aggregates.watch_time_seconds),
        )
        .await
    }

    async fn delete_section(&mut self, id: SectionId) -> Result<()> {
        self.execute_existing(
            sqlx::query("DELETE FROM series_sections WHERE id = $1").bind(id.as_i32()),
        )
        .await
    }

    // ═══════════════════════════════════════════════════════════
    // Lessons
    // ═══════════════════════════════════════════════════════════

    async fn find_lesson(&mut self, section_id: SectionId, id: LessonId) -> Result<Option<Lesson>> {
        self.fetch_optional(
            sqlx::query(concat!(
                "SELECT ",
                lesson_columns!(),
                " FROM lessons WHERE id = $1 AND section_id = $2"
            ))
            .bind(id.as_i32())
            .bind(section_id.as_i32()),
        )
        .await
    }

    async fn lock_lesson(&mut self, id: LessonId) -> Result<Option<Lesson>> {
        self.fetch_optional(
            sqlx::query(concat!(
                "SELECT ",
                lesson_columns!(),
                " FROM lessons WHERE id = $1 FOR UPDATE"
            ))
            .bind(id.as_i32()),
        )
        .await
    }

    async fn share_lesson(&mut self, id: LessonId) -> Result<Option<Lesson>> {
        self.fetch_optional(
            sqlx::query(concat!(
                "SELECT ",
                lesson_columns!(),
                " FROM lessons WHERE id = $1 FOR SHARE"
            ))
            .bind(id.as_i32()),
        )
        .await
    }

    async fn list_lessons(&mut self, section_id: SectionId) -> Result<Vec<Lesson>> {
        self.fetch_all(
            sqlx::query(concat!(
                "SELECT ",
                lesson_columns!(),
                " FROM lessons WHERE section_id = $1 ORDER BY position, id"
            ))
            .bind(section_id.as_i32()),
        )
        .await
    }

    async fn count_lessons(&mut self, section_id: SectionId) -> Result<i32> {
        let count = self
            .count(
                "SELECT COUNT(*) FROM lessons WHERE section_id = $1",
                section_id.as_i32(),
            )
            .await?;
        position_count(count)
    }

    async fn create_lesson(&mut self, lesson: NewLesson) -> Result<Lesson> {
        self.fetch_one(
            sqlx::query(concat!(
                "INSERT INTO lessons (section_id, series_id, title, position) \
                 VALUES ($1, $2, $3, $4) RETURNING ",
                lesson_columns!()
            ))
            .bind(lesson.section_id.as_i32())
            .bind(lesson.series_id.as_i32())
            .bind(lesson.title)
            .bind(lesson.position),
        )
        .await
    }

    async fn update_lesson_title(&mut self, id: LessonId, title: &str) -> Result<Lesson> {
        self.fetch_one(
            sqlx::query(concat!(
                "UPDATE lessons SET title = $2 WHERE id = $1 RETURNING ",
                lesson_columns!()
            ))
            .bind(id.as_i32())
            .bind(title),
        )
        .await
    }

    async fn set_lesson_published(&mut self, id: LessonId, published: bool) -> Result<Lesson> {
        self.fetch_one(
            sqlx::query(concat!(
                "UPDATE lessons SET is_published = $2 WHERE id = $1 RETURNING ",
                lesson_columns!()
            ))
            .bind(id.as_i32())
            .bind(published),
        )
        .await
    }

    async fn add_lesson_times(
        &mut self,
        id: LessonId,
        read_delta: i32,
        watch_delta: i32,
    ) -> Result<Lesson> {
        self.fetch_one(
            sqlx::query(concat!(
                "UPDATE lessons SET read_time_seconds = read_time_seconds + $2, \
                 watch_time_seconds = watch_time_seconds + $3 WHERE id = $1 RETURNING ",
                lesson_columns!()
            ))
            .bind(id.as_i32())
            .bind(read_delta)
            .bind(watch_delta),
        )
        .await
    }

    async fn delete_lesson(&mut self, id: LessonId) -> Result<()> {
        self.execute_existing(sqlx::query("DELETE FROM lessons WHERE id = $1").bind(id.as_i32()))
            .await
    }

    // ═══════════════════════════════════════════════════════════
    // Positions
    // ═══════════════════════════════════════════════════════════

    async fn shift_positions(
        &mut self,
        scope: SiblingScope,
        from: i32,
        to: i32,
        delta: i32,
    ) -> Result<u64> {
        let (sql, parent) = match scope {
            SiblingScope::Series(id) => (
                "UPDATE series_sections SET position = position + $4 \
                 WHERE series_id = $1 AND position BETWEEN $2 AND $3",
                id.as_i32(),
            ),
            SiblingScope::Section(id) => (
                "UPDATE lessons SET position = position + $4 \
                 WHERE section_id = $1 AND position BETWEEN $2 AND $3",
                id.as_i32(),
            ),
        };
        self.execute(sqlx::query(sql).bind(parent).bind(from).bind(to).bind(delta))
            .await
    }

    async fn set_position(&mut self, sibling: Sibling, position: i32) -> Result<()> {
        let (sql, id) = match sibling {
            Sibling::Section(id) => (
                "UPDATE series_sections SET position = $2 WHERE id = $1",
                id.as_i32(),
            ),
            Sibling::Lesson(id) => ("UPDATE lessons SET position = $2 WHERE id = $1", id.as_i32()),
        };
        self.execute_existing(sqlx::query(sql).bind(id).bind(position))
            .await
    }

    // ═══════════════════════════════════════════════════════════
    // Lesson content
    // ═══════════════════════════════════════════════════════════

    async fn find_article(&mut self, lesson_id: LessonId) -> Result<Option<LessonArticle>> {
        self.fetch_optional(
            sqlx::query(
                "SELECT lesson_id, content, read_time_seconds FROM lesson_articles \
                 WHERE lesson_id = $1",
            )
            .bind(lesson_id.as_i32()),
        )
        .await
    }

    async fn save_article(&mut self, article: LessonArticle, replace: bool) -> Result<LessonArticle> {
        let query = if replace {
            sqlx::query(
                "INSERT INTO lesson_articles (lesson_id, content, read_time_seconds) \
                 VALUES ($1, $2, $3) \
                 ON CONFLICT (lesson_id) DO UPDATE \
                 SET content = EXCLUDED.content, read_time_seconds = EXCLUDED.read_time_seconds \
                 RETURNING lesson_id, content, read_time_seconds",
            )
        } else {
            sqlx::query(
                "INSERT INTO lesson_articles (lesson_id, content, read_time_seconds) \
                 VALUES ($1, $2, $3) ON CONFLICT (lesson_id) DO NOTHING \
                 RETURNING lesson_id, content, read_time_seconds",
            )
        };
        self.insert_unless_exists(
            query
                .bind(article.lesson_id.as_i32())
                .bind(article.content)
                .bind(article.read_time_seconds),
            "Lesson already has an article",
        )
        .await
    }

    async fn delete_article(&mut self, lesson_id: LessonId) -> Result<()> {
        self.execute_existing(
            sqlx::query("DELETE FROM lesson_articles WHERE lesson_id = $1")
                .bind(lesson_id.as_i32()),
        )
        .await
    }

    async fn find_video(&mut self, lesson_id: LessonId) -> Result<Option<LessonVideo>> {
        self.fetch_optional(
            sqlx::query(
                "SELECT lesson_id, url, watch_time_seconds FROM lesson_videos WHERE lesson_id = $1",
            )
            .bind(lesson_id.as_i32()),
        )
        .await
    }

    async fn save_video(&mut self, video: LessonVideo, replace: bool) -> Result<LessonVideo> {
        let query = if replace {
            sqlx::query(
                "INSERT INTO lesson_videos (lesson_id, url, watch_time_seconds) \
                 VALUES ($1, $2, $3) \
                 ON CONFLICT (lesson_id) DO UPDATE \
                 SET url = EXCLUDED.url, watch_time_seconds = EXCLUDED.watch_time_seconds \
                 RETURNING lesson_id, url, watch_time_seconds",
            )
        } else {
            sqlx::query(
                "INSERT INTO lesson_videos (lesson_id, url, watch_time_seconds) \
                 VALUES ($1, $2, $3) ON CONFLICT (lesson_id) DO NOTHING \
                 RETURNING lesson_id, url, watch_time_seconds",
            )
        };
        self.insert_unless_exists(
            query
                .bind(video.lesson_id.as_i32())
                .bind(video.url)
                .bind(video.watch_time_seconds),
            "Lesson already has a video",
        )
        .await
    }

    async fn delete_video(&mut self, lesson_id: LessonId) -> Result<()> {
        self.execute_existing(
            sqlx::query("DELETE FROM lesson_videos WHERE lesson_id = $1").bind(lesson_id.as_i32()),
        )
        .await
    }

    // ═══════════════════════════════════════════════════════════
    // Language progress
    // ═══════════════════════════════════════════════════════════

    async fn find_language_progress(
        &mut self,
        user_id: UserId,
        language_slug: &str,
    ) -> Result<Option<LanguageProgress>> {
        self.fetch_optional(
            sqlx::query(concat!(
                "SELECT ",
                language_progress_columns!(),
                " FROM language_progress WHERE user_id = $1 AND language_slug = $2"
            ))
            .bind(user_id.as_i32())
            .bind(language_slug),
        )
        .await
    }

    async fn lock_language_progress(&mut self, id: ProgressId) -> Result<Option<LanguageProgress>> {
        self.fetch_optional(
            sqlx::query(concat!(
                "SELECT ",
                language_progress_columns!(),
                " FROM language_progress WHERE id = $1 FOR UPDATE"
            ))
            .bind(id.as_i32()),
        )
        .await
    }

    async fn create_language_progress(
        &mut self,
        user_id: UserId,
        language_slug: &str,
        now: DateTime<Utc>,
    ) -> Result<LanguageProgress> {
        self.insert_unless_exists(
            sqlx::query(concat!(
                "INSERT INTO language_progress (user_id, language_slug, viewed_at) \
                 VALUES ($1, $2, $3) ON CONFLICT (user_id, language_slug) DO NOTHING RETURNING ",
                language_progress_columns!()
            ))
            .bind(user_id.as_i32())
            .bind(language_slug)
            .bind(now),
            "Language progress already exists",
        )
        .await
    }

    async fn touch_language_progress(
        &mut self,
        id: ProgressId,
        now: DateTime<Utc>,
    ) -> Result<LanguageProgress> {
        self.fetch_one(
            sqlx::query(concat!(
                "UPDATE language_progress SET viewed_at = $2 WHERE id = $1 RETURNING ",
                language_progress_columns!()
            ))
            .bind(id.as_i32())
            .bind(now),
        )
        .await
    }

    async fn add_language_completed_series(
        &mut self,
        id: ProgressId,
        delta: i32,
    ) -> Result<LanguageProgress> {
        self.fetch_one(
            sqlx::query(concat!(
                "UPDATE language_progress SET completed_series = completed_series + $2 \
                 WHERE id = $1 RETURNING ",
                language_progress_columns!()
            ))
            .bind(id.as_i32())
            .bind(delta),
        )
        .await
    }

    async fn delete_language_progress(&mut self, id: ProgressId) -> Result<()> {
        self.execute_existing(
            sqlx::query("DELETE FROM language_progress WHERE id = $1").bind(id.as_i32()),
        )
        .await
    }

    // ═══════════════════════════════════════════════════════════
    // Series progress
    // ═══════════════════════════════════════════════════════════

    async fn find_series_progress(
        &mut self,
        user_id: UserId,
        series_id: SeriesId,
    ) -> Result<Option<SeriesProgress>> {
        self.fetch_optional(
            sqlx::query(concat!(
                "SELECT ",
                series_progress_columns!(),
                " FROM series_progress WHERE user_id = $1 AND series_id = $2"
            ))
            .bind(user_id.as_i32())
            .bind(series_id.as_i32()),
        )
        .await
    }

    async fn lock_series_progress(&mut self, id: ProgressId) -> Result<Option<SeriesProgress>> {
        self.fetch_optional(
            sqlx::query(concat!(
                "SELECT ",
                series_progress_columns!(),
                " FROM series_progress WHERE id = $1 FOR UPDATE"
            ))
            .bind(id.as_i32()),
        )
        .await
    }

    async fn count_series_progress(&mut self, series_id: SeriesId) -> Result<i64> {
        self.count(
            "SELECT COUNT(*) FROM series_progress WHERE series_id = $1",
            series_id.as_i32(),
        )
        .await
    }

    async fn create_series_progress(
        &mut self,
        progress: NewSeriesProgress,
        now: DateTime<Utc>,
    ) -> Result<SeriesProgress> {
        self.insert_unless_exists(
            sqlx::query(concat!(
                "INSERT INTO series_progress \
                 (user_id, series_id, language_slug, series_slug, language_progress_id, viewed_at) \
                 VALUES ($1, $2, $3, $4, $5, $6) \
                 ON CONFLICT (user_id, series_id) DO NOTHING RETURNING ",
                series_progress_columns!()
            ))
            .bind(progress.user_id.as_i32())
            .bind(progress.series_id.as_i32())
            .bind(progress.language_slug)
            .bind(progress.series_slug)
            .bind(progress.language_progress_id.as_i32())
            .bind(now),
            "Series progress already exists",
        )
        .await
    }

    async fn touch_series_progress(
        &mut self,
        id: ProgressId,
        now: DateTime<Utc>,
    ) -> Result<SeriesProgress> {
        self.fetch_one(
            sqlx::query(concat!(
                "UPDATE series_progress SET viewed_at = $2 WHERE id = $1 RETURNING ",
                series_progress_columns!()
            ))
            .bind(id.as_i32())
            .bind(now),
        )
        .await
    }

    async fn increment_series_progress(
        &mut self,
        id: ProgressId,
        delta: CompletionDelta,
        now: DateTime<Utc>,
    ) -> Result<SeriesProgress> {
        // `x BETWEEN 1 AND n`: the Series has published Sections and all n are complete.
        self.fetch_one(
            sqlx::query(concat!(
                "UPDATE series_progress SET \
                 completed_sections = completed_sections + $2, \
                 completed_lessons = completed_lessons + $3, \
                 completed_at = CASE \
                     WHEN $2 > 0 AND completed_at IS NULL \
                          AND (SELECT s.sections_count FROM series s \
                               WHERE s.id = series_progress.series_id) \
                              BETWEEN 1 AND completed_sections + $2 \
                     THEN $4 ELSE completed_at END \
                 WHERE id = $1 RETURNING ",
                series_progress_columns!()
            ))
            .bind(id.as_i32())
            .bind(delta.sections)
            .bind(delta.lessons)
            .bind(now),
        )
        .await
    }

    async fn decrement_series_progress(
        &mut self,
        id: ProgressId,
        delta: CompletionDelta,
    ) -> Result<SeriesProgress> {
        self.fetch_one(
            sqlx::query(concat!(
                "UPDATE series_progress SET \
                 completed_sections = completed_sections - $2, \
                 completed_lessons = completed_lessons - $3, \
                 completed_at = CASE WHEN $2 > 0 THEN NULL ELSE completed_at END \
                 WHERE id = $1 RETURNING ",
                series_progress_columns!()
            ))
            .bind(id.as_i32())
            .bind(delta.sections)
            .bind(delta.lessons),
        )
        .await
    }

    async fn delete_series_progress(&mut self, id: ProgressId) -> Result<()> {
        self.execute_existing(
            sqlx::query("DELETE FROM series_progress WHERE id = $1").bind(id.as_i32()),
        )
        .await
    }

    // ═══════════════════════════════════════════════════════════
    // Section progress
    // ═══════════════════════════════════════════════════════════

    async fn find_section_progress(
        &mut self,
        user_id: UserId,
        section_id: SectionId,
    ) -> Result<Option<SectionProgress>> {
        self.fetch_optional(
            sqlx::query(concat!(
                "SELECT ",
                section_progress_columns!(),
                " FROM section_progress WHERE user_id = $1 AND section_id = $2"
            ))
            .bind(user_id.as_i32())
            .bind(section_id.as_i32()),
        )
        .await
    }

    async fn lock_section_progress(&mut self, id: ProgressId) -> Result<Option<SectionProgress>> {
        self.fetch_optional(
            sqlx::query(concat!(
                "SELECT ",
                section_progress_columns!(),
                " FROM section_progress WHERE id = $1 FOR UPDATE"
            ))
            .bind(id.as_i32()),
        )
        .await
    }

    async fn count_section_progress(&mut self, section_id: SectionId) -> Result<i64> {
        self.count(
            "SELECT COUNT(*) FROM section_progress WHERE section_id = $1",
            section_id.as_i32(),
        )
        .await
    }

    async fn create_section_progress(
        &mut self,
        progress: NewSectionProgress,
        now: DateTime<Utc>,
    ) -> Result<SectionProgress> {
        self.insert_unless_exists(
            sqlx::query(concat!(
                "INSERT INTO section_progress \
                 (user_id, section_id, series_id, series_progress_id, viewed_at) \
                 VALUES ($1, $2, $3, $4, $5) \
                 ON CONFLICT (user_id, section_id) DO NOTHING RETURNING ",
                section_progress_columns!()
            ))
            .bind(progress.user_id.as_i32())
            .bind(progress.section_id.as_i32())
            .bind(progress.series_id.as_i32())
            .bind(progress.series_progress_id.as_i32())
            .bind(now),
            "Section progress already exists",
        )
        .await
    }

    async fn touch_section_progress(
        &mut self,
        id: ProgressId,
        now: DateTime<Utc>,
    ) -> Result<SectionProgress> {
        self.fetch_one(
            sqlx::query(concat!(
                "UPDATE section_progress SET viewed_at = $2 WHERE id = $1 RETURNING ",
                section_progress_columns!()
            ))
            .bind(id.as_i32())
            .bind(now),
        )
        .await
    }

    async fn increment_section_progress(
        &mut self,
        id: ProgressId,
        now: DateTime<Utc>,
    ) -> Result<SectionProgress> {
        self.fetch_one(
            sqlx::query(concat!(
                "UPDATE section_progress SET \
                 completed_lessons = completed_lessons + 1, \
                 completed_at = CASE \
                     WHEN completed_at IS NULL \
                          AND (SELECT s.lessons_count FROM series_sections s \
                               WHERE s.id = section_progress.section_id) \
                              BETWEEN 1 AND completed_lessons + 1 \
                     THEN $2 ELSE completed_at END \
                 WHERE id = $1 RETURNING ",
                section_progress_columns!()
            ))
            .bind(id.as_i32())
            .bind(now),
        )
        .await
    }

    async fn decrement_section_progress(&mut self, id: ProgressId) -> Result<SectionProgress> {
        self.fetch_one(
            sqlx::query(concat!(
                "UPDATE section_progress SET completed_lessons = completed_lessons - 1, \
                 completed_at = NULL WHERE id = $1 RETURNING ",
                section_progress_columns!()
            ))
            .bind(id.as_i32()),
        )
        .await
    }

    async fn delete_section_progress(&mut self, id: ProgressId) -> Result<()> {
        self.execute_existing(
            sqlx::query("DELETE FROM section_progress WHERE id = $1").bind(id.as_i32()),
        )
        .await
    }

    // ═══════════════════════════════════════════════════════════
    // Lesson progress
    // ═══════════════════════════════════════════════════════════

    async fn find_lesson_progress(
        &mut self,
        user_id: UserId,
        lesson_id: LessonId,
    ) -> Result<Option<LessonProgress>> {
        self.fetch_optional(
            sqlx::query(concat!(
                "SELECT ",
                lesson_progress_columns!(),
                " FROM lesson_progress WHERE user_id = $1 AND lesson_id = $2"
            ))
            .bind(user_id.as_i32())
            .bind(lesson_id.as_i32()),
        )
        .await
    }

    async fn lock_lesson_progress(&mut self, id: ProgressId) -> Result<Option<LessonProgress>> {
        self.fetch_optional(
            sqlx::query(concat!(
                "SELECT ",
                lesson_progress_columns!(),
                " FROM lesson_progress WHERE id = $1 FOR UPDATE"
            ))
            .bind(id.as_i32()),
        )
        .await
    }

    async fn count_lesson_progress(&mut self, lesson_id: LessonId) -> Result<i64> {
        self.count(
            "SELECT COUNT(*) FROM lesson_progress WHERE lesson_id = $1",
            lesson_id.as_i32(),
        )
        .await
    }

    async fn create_lesson_progress(
        &mut self,
        progress: NewLessonProgress,
        now: DateTime<Utc>,
    ) -> Result<LessonProgress> {
        self.insert_unless_exists(
            sqlx::query(concat!(
                "INSERT INTO lesson_progress \
                 (user_id, lesson_id, section_id, section_progress_id, series_progress_id, viewed_at) \
                 VALUES ($1, $2, $3, $4, $5, $6) \
                 ON CONFLICT (user_id, lesson_id) DO NOTHING RETURNING ",
                lesson_progress_columns!()
            ))
            .bind(progress.user_id.as_i32())
            .bind(progress.lesson_id.as_i32())
            .bind(progress.section_id.as_i32())
            .bind(progress.section_progress_id.as_i32())
            .bind(progress.series_progress_id.as_i32())
            .bind(now),
            "Lesson progress already exists",
        )
        .await
    }

    async fn touch_lesson_progress(
        &mut self,
        id: ProgressId,
        now: DateTime<Utc>,
    ) -> Result<LessonProgress> {
        self.fetch_one(
            sqlx::query(concat!(
                "UPDATE lesson_progress SET viewed_at = $2 WHERE id = $1 RETURNING ",
                lesson_progress_columns!()
            ))
            .bind(id.as_i32())
            .bind(now),
        )
        .await
    }

    async fn complete_lesson_progress(
        &mut self,
        id: ProgressId,
        now: DateTime<Utc>,
    ) -> Result<LessonProgress> {
        self.fetch_one(
            sqlx::query(concat!(
                "UPDATE lesson_progress SET completed_at = $2 WHERE id = $1 RETURNING ",
                lesson_progress_columns!()
            ))
            .bind(id.as_i32())
            .bind(now),
        )
        .await
    }

    async fn delete_lesson_progress(&mut self, id: ProgressId) -> Result<()> {
        self.execute_existing(
            sqlx::query("DELETE FROM lesson_progress WHERE id = $1").bind(id.as_i32()),
        )
        .await
    }

    // ═══════════════════════════════════════════════════════════
    // Certificates
    // ═══════════════════════════════════════════════════════════

    async fn find_certificate_for(
        &mut self,
        user_id: UserId,
        series_id: SeriesId,
    ) -> Result<Option<Certificate>> {
        self.fetch_optional(
            sqlx::query(concat!(
                "SELECT ",
                certificate_columns!(),
                " FROM certificates WHERE user_id = $1 AND series_id = $2"
            ))
            .bind(user_id.as_i32())
            .bind(series_id.as_i32()),
        )
        .await
    }

    async fn find_certificate(&mut self, id: CertificateId) -> Result<Option<Certificate>> {
        self.fetch_optional(
            sqlx::query(concat!(
                "SELECT ",
                certificate_columns!(),
                " FROM certificates WHERE id = $1"
            ))
            .bind(*id.as_uuid()),
        )
        .await
    }

    async fn create_certificate(&mut self, certificate: NewCertificate) -> Result<Certificate> {
        self.insert_unless_exists(
            sqlx::query(concat!(
                "INSERT INTO certificates \
                 (id, user_id, series_id, language_slug, series_slug, series_title, lessons, \
                  read_time_seconds, watch_time_seconds, completed_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
                 ON CONFLICT (user_id, series_id) DO NOTHING RETURNING ",
                certificate_columns!()
            ))
            .bind(*certificate.id.as_uuid())
            .bind(certificate.user_id.as_i32())
            .bind(certificate.series_id.as_i32())
            .bind(certificate.language_slug)
            .bind(certificate.series_slug)
            .bind(certificate.series_title)
            .bind(certificate.lessons)
            .bind(certificate.read_time_seconds)
            .bind(certificate.watch_time_seconds)
            .bind(certificate.completed_at),
            "Series already has a certificate",
        )
        .await
    }

    async fn list_certificates(
        &mut self,
        user_id: UserId,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Certificate>> {
        self.fetch_all(
            sqlx::query(concat!(
                "SELECT ",
                certificate_columns!(),
                " FROM certificates WHERE user_id = $1 \
                 ORDER BY completed_at DESC, created_at DESC OFFSET $2 LIMIT $3"
            ))
            .bind(user_id.as_i32())
            .bind(offset)
            .bind(limit),
        )
        .await
    }

    async fn count_certificates(&mut self, user_id: UserId) -> Result<i64> {
        self.count(
            "SELECT COUNT(*) FROM certificates WHERE user_id = $1",
            user_id.as_i32(),
        )
        .await
    }
}
