use super::entities::{Blog, BlogChanges, BlogImage, BlogView, NewBlog};
use super::value_objects::{FilterField, Projection, SortField, SortOrder};
use crate::shared::application::Page;
use crate::shared::errors::{AppError, AppResult};
use async_trait::async_trait;
use uuid::Uuid;

/// Filters of a listing: case-insensitive search over title and description plus
/// equality on selected attributes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlogCriteria {
    search: Option<String>,
    filters: Vec<(FilterField, String)>,
}

impl BlogCriteria {
    /// `search` is a regular expression; an invalid one is a validation error
    pub fn new(search: Option<&str>, filters: Vec<(FilterField, String)>) -> AppResult<Self> {
        let search = match search.map(str::trim).filter(|value| !value.is_empty()) {
            Some(pattern) => {
                regex::RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| {
                        AppError::ValidationError(format!("Invalid search expression: {}", e))
                    })?;
                Some(pattern.to_string())
            }
            None => None,
        };
        Ok(Self { search, filters })
    }

    pub fn search(&self) -> Option<&str> {
        self.search.as_deref()
    }

    pub fn filters(&self) -> &[(FilterField, String)] {
        &self.filters
    }

    /// Compiled matcher for repositories that filter in process
    pub fn matcher(&self) -> AppResult<BlogMatcher<'_>> {
        let search = match &self.search {
            Some(pattern) => Some(
                regex::RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| {
                        AppError::ValidationError(format!("Invalid search expression: {}", e))
                    })?,
            ),
            None => None,
        };
        Ok(BlogMatcher {
            search,
            filters: &self.filters,
        })
    }
}

pub struct BlogMatcher<'a> {
    search: Option<regex::Regex>,
    filters: &'a [(FilterField, String)],
}

impl BlogMatcher<'_> {
    pub fn matches(&self, blog: &Blog) -> bool {
        let search_ok = self.search.as_ref().map_or(true, |regex| {
            regex.is_match(&blog.title) || regex.is_match(&blog.description)
        });

        search_ok
            && self.filters.iter().all(|(field, value)| match field {
                FilterField::Title => blog.title == *value,
                FilterField::Description => blog.description == *value,
                FilterField::Category => blog.category.as_str() == value,
                FilterField::Subcategory => blog
                    .subcategory
                    .map_or(false, |subcategory| subcategory.as_str() == value),
                FilterField::MoreDetails => blog.more_details == *value,
            })
    }
}

/// Everything `paginate` needs, already validated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlogQuery {
    pub criteria: BlogCriteria,
    pub skip: i64,
    pub per_page: i64,
    pub sort_field: SortField,
    pub sort_order: SortOrder,
    pub projection: Projection,
}

/// Outcome of the conditional image append
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppendOutcome {
    Appended(BlogImage),
    /// The reference was already stored by an earlier attempt
    AlreadyPresent,
    /// The blog was deleted in the meantime
    BlogMissing,
}

#[async_trait]
pub trait BlogRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Blog>>;
    async fn create(&self, draft: NewBlog) -> AppResult<Blog>;
    /// Returns None when the blog does not exist
    async fn update(&self, id: Uuid, changes: &BlogChanges) -> AppResult<Option<Blog>>;
    /// Returns the deleted blog so its images can be cleaned up
    async fn delete(&self, id: Uuid) -> AppResult<Option<Blog>>;
    async fn paginate(&self, query: &BlogQuery) -> AppResult<Page<BlogView>>;

    /// Atomically append `path` to the images unless it is already there
    async fn append_image(&self, id: Uuid, path: &str) -> AppResult<AppendOutcome>;
    /// Returns the updated blog, or None when the blog does not exist
    async fn remove_image(&self, id: Uuid, image_id: Uuid) -> AppResult<Option<Blog>>;
    /// Other blogs of the same category, newest first
    async fn find_similar(&self, blog: &Blog, limit: i64) -> AppResult<Vec<Blog>>;
}
