use super::value_objects::{Category, Projection, Subcategory};
use crate::shared::errors::{AppError, AppResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const TITLE_MAX_CHARS: usize = 120;
pub const TEXT_MAX_CHARS: usize = 10_000;

/// Projected blog as returned by listings
pub type BlogView = serde_json::Map<String, serde_json::Value>;

/// Reference to an uploaded image, in upload completion order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlogImage {
    pub id: Uuid,
    pub path: String,
}

impl BlogImage {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            path: path.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blog {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub subcategory: Option<Subcategory>,
    pub more_details: String,
    pub images: Vec<BlogImage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Blog {
    pub fn new(draft: NewBlog, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: draft.title.trim().to_string(),
            description: draft.description,
            category: draft.category,
            subcategory: draft.subcategory,
            more_details: draft.more_details,
            images: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn image(&self, image_id: Uuid) -> Option<&BlogImage> {
        self.images.iter().find(|image| image.id == image_id)
    }

    pub fn has_image_path(&self, path: &str) -> bool {
        self.images.iter().any(|image| image.path == path)
    }

    /// Serialize the blog keeping `id` plus the projected attributes
    pub fn project(&self, projection: &Projection) -> AppResult<BlogView> {
        let serde_json::Value::Object(mut map) = serde_json::to_value(self)? else {
            return Err(AppError::SerializationError(
                "Blog did not serialize to an object".to_string(),
            ));
        };

        if projection.is_all() {
            return Ok(map);
        }

        let keep: Vec<&str> = projection.fields().iter().map(|field| field.key()).collect();
        map.retain(|key, _| key == "id" || keep.contains(&key.as_str()));
        Ok(map)
    }
}

/// Validated payload for creating a blog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBlog {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub category: Category,
    #[serde(default)]
    pub subcategory: Option<Subcategory>,
    #[serde(default)]
    pub more_details: String,
}

impl NewBlog {
    pub fn new(title: impl Into<String>, category: Category) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            category,
            subcategory: None,
            more_details: String::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_subcategory(mut self, subcategory: Subcategory) -> Self {
        self.subcategory = Some(subcategory);
        self
    }

    pub fn with_more_details(mut self, more_details: impl Into<String>) -> Self {
        self.more_details = more_details.into();
        self
    }

    pub fn validate(&self) -> AppResult<()> {
        validate_title(&self.title)?;
        validate_text("description", &self.description)?;
        validate_text("moreDetails", &self.more_details)
    }
}

/// Partial update of the text attributes of a blog
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<Category>,
    /// `Some(None)` clears the subcategory
    #[serde(default, with = "double_option")]
    pub subcategory: Option<Option<Subcategory>>,
    pub more_details: Option<String>,
}

impl BlogChanges {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.category.is_none()
            && self.subcategory.is_none()
            && self.more_details.is_none()
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.is_empty() {
            return Err(AppError::ValidationError(
                "At least one field must be updated".to_string(),
            ));
        }
        if let Some(title) = &self.title {
            validate_title(title)?;
        }
        if let Some(description) = &self.description {
            validate_text("description", description)?;
        }
        if let Some(more_details) = &self.more_details {
            validate_text("moreDetails", more_details)?;
        }
        Ok(())
    }

    pub fn apply_to(&self, blog: &mut Blog, now: DateTime<Utc>) {
        if let Some(title) = &self.title {
            blog.title = title.trim().to_string();
        }
        if let Some(description) = &self.description {
            blog.description = description.clone();
        }
        if let Some(category) = self.category {
            blog.category = category;
        }
        if let Some(subcategory) = self.subcategory {
            blog.subcategory = subcategory;
        }
        if let Some(more_details) = &self.more_details {
            blog.more_details = more_details.clone();
        }
        blog.updated_at = now;
    }
}

fn validate_title(title: &str) -> AppResult<()> {
    let length = title.trim().chars().count();
    if length == 0 {
        return Err(AppError::ValidationError("Title is required".to_string()));
    }
    if length > TITLE_MAX_CHARS {
        return Err(AppError::ValidationError(format!(
            "Title must be at most {} characters",
            TITLE_MAX_CHARS
        )));
    }
    Ok(())
}

fn validate_text(field: &str, value: &str) -> AppResult<()> {
    if value.chars().count() > TEXT_MAX_CHARS {
        return Err(AppError::ValidationError(format!(
            "{} must be at most {} characters",
            field, TEXT_MAX_CHARS
        )));
    }
    Ok(())
}

/// Distinguishes an absent key from an explicit `null`
mod double_option {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<T, S>(value: &Option<Option<T>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: Serialize,
        S: Serializer,
    {
        match value {
            Some(inner) => inner.serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Some)
    }
}
