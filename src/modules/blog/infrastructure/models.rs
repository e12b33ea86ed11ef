/// Diesel models for the blogs table
use crate::modules::blog::domain::{Blog, BlogChanges, BlogImage, NewBlog};
use crate::schema::blogs;
use crate::shared::errors::AppResult;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value as JsonValue;
use uuid::Uuid;

#[derive(Insertable, Debug)]
#[diesel(table_name = blogs)]
pub struct NewBlogModel {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub category: String,
    pub subcategory: Option<String>,
    pub more_details: String,
    pub images: JsonValue,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NewBlogModel {
    pub fn from_draft(draft: NewBlog, now: DateTime<Utc>) -> Self {
        let blog = Blog::new(draft, now);
        Self {
            id: blog.id,
            title: blog.title,
            description: blog.description,
            category: blog.category.to_string(),
            subcategory: blog.subcategory.map(|s| s.to_string()),
            more_details: blog.more_details,
            images: JsonValue::Array(Vec::new()),
            created_at: blog.created_at,
            updated_at: blog.updated_at,
        }
    }
}

#[derive(AsChangeset, Debug)]
#[diesel(table_name = blogs)]
pub struct BlogChangeset {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub subcategory: Option<Option<String>>,
    pub more_details: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl BlogChangeset {
    pub fn from_changes(changes: &BlogChanges, now: DateTime<Utc>) -> Self {
        Self {
            title: changes.title.as_ref().map(|title| title.trim().to_string()),
            description: changes.description.clone(),
            category: changes.category.map(|c| c.to_string()),
            subcategory: changes.subcategory.map(|s| s.map(|s| s.to_string())),
            more_details: changes.more_details.clone(),
            updated_at: now,
        }
    }
}

#[derive(Queryable, Selectable, QueryableByName, Debug, Clone)]
#[diesel(table_name = blogs)]
pub struct BlogModel {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub category: String,
    pub subcategory: Option<String>,
    pub more_details: String,
    pub images: JsonValue,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BlogModel {
    pub fn into_blog(self) -> AppResult<Blog> {
        let images: Vec<BlogImage> = serde_json::from_value(self.images)?;
        Ok(Blog {
            id: self.id,
            title: self.title,
            description: self.description,
            category: self.category.parse()?,
            subcategory: self.subcategory.map(|s| s.parse()).transpose()?,
            more_details: self.more_details,
            images,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
