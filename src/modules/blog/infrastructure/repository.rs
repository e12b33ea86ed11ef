/// Diesel-based implementation of BlogRepository
///
/// Images live in a JSONB array; appends and removals are single conditional
/// UPDATE statements so concurrent upload jobs never overwrite each other.
use crate::modules::blog::domain::{
    AppendOutcome, Blog, BlogChanges, BlogCriteria, BlogImage, BlogQuery, BlogRepository,
    BlogView, FilterField, NewBlog, SortField, SortOrder,
};
use crate::modules::blog::infrastructure::models::{BlogChangeset, BlogModel, NewBlogModel};
use crate::schema::blogs;
use crate::shared::application::Page;
use crate::shared::errors::{AppError, AppResult};
use crate::shared::infrastructure::database::Database;
use crate::shared::utils::logger::TimedOperation;
use crate::log_debug;
use async_trait::async_trait;
use chrono::Utc;
use diesel::dsl::AsExprOf;
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::sql_types::Text;
use std::sync::Arc;
use tokio::task;
use uuid::Uuid;

const BLOG_COLUMNS: &str =
    "id, title, description, category, subcategory, more_details, images, created_at, updated_at";

diesel::infix_operator!(MatchesInsensitive, " ~* ");

/// PostgreSQL case-insensitive regular expression match
fn matches_insensitive<C>(column: C, pattern: &str) -> MatchesInsensitive<C, AsExprOf<String, Text>>
where
    C: Expression<SqlType = Text>,
{
    MatchesInsensitive::new(column, pattern.to_string().into_sql::<Text>())
}

fn filtered(criteria: &BlogCriteria) -> blogs::BoxedQuery<'static, Pg> {
    let mut query = blogs::table.into_boxed();

    if let Some(pattern) = criteria.search() {
        query = query.filter(
            matches_insensitive(blogs::title, pattern)
                .or(matches_insensitive(blogs::description, pattern)),
        );
    }

    for (field, value) in criteria.filters() {
        let value = value.clone();
        query = match field {
            FilterField::Title => query.filter(blogs::title.eq(value)),
            FilterField::Description => query.filter(blogs::description.eq(value)),
            FilterField::Category => query.filter(blogs::category.eq(value)),
            FilterField::Subcategory => query.filter(blogs::subcategory.eq(value)),
            FilterField::MoreDetails => query.filter(blogs::more_details.eq(value)),
        };
    }

    query
}

pub struct PgBlogRepository {
    db: Arc<Database>,
}

impl PgBlogRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl BlogRepository for PgBlogRepository {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Blog>> {
        let db = Arc::clone(&self.db);

        let model = task::spawn_blocking(move || -> AppResult<Option<BlogModel>> {
            let mut conn = db.get_connection()?;
            blogs::table
                .find(id)
                .select(BlogModel::as_select())
                .first(&mut conn)
                .optional()
                .map_err(|e| AppError::DatabaseError(format!("Failed to get blog by id: {}", e)))
        })
        .await??;

        model.map(BlogModel::into_blog).transpose()
    }

    async fn create(&self, draft: NewBlog) -> AppResult<Blog> {
        let db = Arc::clone(&self.db);
        let new_blog = NewBlogModel::from_draft(draft, Utc::now());

        let model = task::spawn_blocking(move || -> AppResult<BlogModel> {
            let mut conn = db.get_connection()?;
            diesel::insert_into(blogs::table)
                .values(&new_blog)
                .returning(BlogModel::as_returning())
                .get_result(&mut conn)
                .map_err(|e| AppError::DatabaseError(format!("Failed to create blog: {}", e)))
        })
        .await??;

        log_debug!("Created blog {}", model.id);
        model.into_blog()
    }

    async fn update(&self, id: Uuid, changes: &BlogChanges) -> AppResult<Option<Blog>> {
        let db = Arc::clone(&self.db);
        let changeset = BlogChangeset::from_changes(changes, Utc::now());

        let model = task::spawn_blocking(move || -> AppResult<Option<BlogModel>> {
            let mut conn = db.get_connection()?;
            diesel::update(blogs::table.find(id))
                .set(&changeset)
                .returning(BlogModel::as_returning())
                .get_result(&mut conn)
                .optional()
                .map_err(|e| AppError::DatabaseError(format!("Failed to update blog: {}", e)))
        })
        .await??;

        model.map(BlogModel::into_blog).transpose()
    }

    async fn delete(&self, id: Uuid) -> AppResult<Option<Blog>> {
        let db = Arc::clone(&self.db);

        let model = task::spawn_blocking(move || -> AppResult<Option<BlogModel>> {
            let mut conn = db.get_connection()?;
            diesel::delete(blogs::table.find(id))
                .returning(BlogModel::as_returning())
                .get_result(&mut conn)
                .optional()
                .map_err(|e| AppError::DatabaseError(format!("Failed to delete blog: {}", e)))
        })
        .await??;

        model.map(BlogModel::into_blog).transpose()
    }

    async fn paginate(&self, query: &BlogQuery) -> AppResult<Page<BlogView>> {
        let db = Arc::clone(&self.db);
        let query = query.clone();
        let timer = TimedOperation::new("blogs_paginate");

        let (models, total, query) =
            task::spawn_blocking(move || -> AppResult<(Vec<BlogModel>, i64, BlogQuery)> {
                let mut conn = db.get_connection()?;

                let total: i64 = filtered(&query.criteria)
                    .count()
                    .get_result(&mut conn)
                    .map_err(|e| AppError::DatabaseError(format!("Failed to count blogs: {}", e)))?;

                let rows = filtered(&query.criteria);
                let rows = match (query.sort_field, query.sort_order) {
                    (SortField::Title, SortOrder::Asc) => {
                        rows.order((blogs::title.asc(), blogs::id.asc()))
                    }
                    (SortField::Title, SortOrder::Desc) => {
                        rows.order((blogs::title.desc(), blogs::id.asc()))
                    }
                    (SortField::CreatedAt, SortOrder::Asc) => {
                        rows.order((blogs::created_at.asc(), blogs::id.asc()))
                    }
                    (SortField::CreatedAt, SortOrder::Desc) => {
                        rows.order((blogs::created_at.desc(), blogs::id.asc()))
                    }
                };

                let models = rows
                    .offset(query.skip)
                    .limit(query.per_page)
                    .select(BlogModel::as_select())
                    .load(&mut conn)
                    .map_err(|e| AppError::DatabaseError(format!("Failed to list blogs: {}", e)))?;

                Ok((models, total, query))
            })
            .await??;

        let data = models
            .into_iter()
            .map(|model| model.into_blog()?.project(&query.projection))
            .collect::<AppResult<Vec<_>>>()?;

        timer.finish_with_info(&format!("{} of {} rows", data.len(), total));
        Ok(Page::new(data, total.max(0) as u64, query.per_page))
    }

    async fn append_image(&self, id: Uuid, path: &str) -> AppResult<AppendOutcome> {
        let db = Arc::clone(&self.db);
        let image = BlogImage::new(path);
        let appended = image.clone();

        task::spawn_blocking(move || -> AppResult<AppendOutcome> {
            let mut conn = db.get_connection()?;

            // Containment check keeps a retried upload from storing the same reference twice
            let updated = diesel::sql_query(
                "UPDATE blogs
                 SET images = images || jsonb_build_array(
                         jsonb_build_object('id', $2::text, 'path', $3::text)),
                     updated_at = NOW()
                 WHERE id = $1
                   AND NOT images @> jsonb_build_array(jsonb_build_object('path', $3::text))",
            )
            .bind::<diesel::sql_types::Uuid, _>(id)
            .bind::<Text, _>(image.id.to_string())
            .bind::<Text, _>(image.path.clone())
            .execute(&mut conn)
            .map_err(|e| AppError::DatabaseError(format!("Failed to append image: {}", e)))?;

            if updated > 0 {
                return Ok(AppendOutcome::Appended(appended));
            }

            let exists: bool = diesel::select(diesel::dsl::exists(blogs::table.find(id)))
                .get_result(&mut conn)
                .map_err(|e| AppError::DatabaseError(format!("Failed to check blog: {}", e)))?;

            Ok(if exists {
                AppendOutcome::AlreadyPresent
            } else {
                AppendOutcome::BlogMissing
            })
        })
        .await?
    }

    async fn remove_image(&self, id: Uuid, image_id: Uuid) -> AppResult<Option<Blog>> {
        let db = Arc::clone(&self.db);

        let model = task::spawn_blocking(move || -> AppResult<Option<BlogModel>> {
            let mut conn = db.get_connection()?;
            diesel::sql_query(format!(
                "UPDATE blogs
                 SET images = COALESCE(
                         (SELECT jsonb_agg(image ORDER BY position)
                          FROM jsonb_array_elements(images) WITH ORDINALITY AS elements(image, position)
                          WHERE image->>'id' <> $2),
                         '[]'::jsonb),
                     updated_at = NOW()
                 WHERE id = $1
                 RETURNING {}",
                BLOG_COLUMNS
            ))
            .bind::<diesel::sql_types::Uuid, _>(id)
            .bind::<Text, _>(image_id.to_string())
            .get_result(&mut conn)
            .optional()
            .map_err(|e| AppError::DatabaseError(format!("Failed to remove image: {}", e)))
        })
        .await??;

        model.map(BlogModel::into_blog).transpose()
    }

    async fn find_similar(&self, blog: &Blog, limit: i64) -> AppResult<Vec<Blog>> {
        let db = Arc::clone(&self.db);
        let id = blog.id;
        let category = blog.category.to_string();

        let models = task::spawn_blocking(move || -> AppResult<Vec<BlogModel>> {
            let mut conn = db.get_connection()?;
            blogs::table
                .filter(blogs::category.eq(category))
                .filter(blogs::id.ne(id))
                .order(blogs::created_at.desc())
                .limit(limit)
                .select(BlogModel::as_select())
                .load(&mut conn)
                .map_err(|e| AppError::DatabaseError(format!("Failed to load similar blogs: {}", e)))
        })
        .await??;

        models.into_iter().map(BlogModel::into_blog).collect()
    }
}
