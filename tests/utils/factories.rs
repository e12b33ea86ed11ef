/// Test data factories using builder pattern
///
/// Provides convenient methods to create test data with sensible defaults
use blog_media_lib::modules::blog::domain::{Category, NewBlog, Subcategory};
use blog_media_lib::modules::media::StagedFile;
use std::path::PathBuf;
use uuid::Uuid;

pub struct BlogFactory {
    title: String,
    description: Option<String>,
    category: Category,
    subcategory: Option<Subcategory>,
    more_details: Option<String>,
}

impl Default for BlogFactory {
    fn default() -> Self {
        Self {
            title: format!("Test Blog {}", &Uuid::new_v4().simple().to_string()[..8]),
            description: None,
            category: Category::News,
            subcategory: None,
            more_details: None,
        }
    }
}

impl BlogFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.title = title.to_string();
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = category;
        self
    }

    pub fn with_subcategory(mut self, subcategory: Subcategory) -> Self {
        self.subcategory = Some(subcategory);
        self
    }

    pub fn build(self) -> NewBlog {
        let mut draft = NewBlog::new(self.title, self.category);
        if let Some(description) = self.description {
            draft = draft.with_description(description);
        }
        if let Some(subcategory) = self.subcategory {
            draft = draft.with_subcategory(subcategory);
        }
        if let Some(more_details) = self.more_details {
            draft = draft.with_more_details(more_details);
        }
        draft
    }
}

/// Temporary staging directory, removed on drop
pub struct StagingDir {
    path: PathBuf,
}

impl StagingDir {
    pub fn new() -> Self {
        let path = std::env::temp_dir().join(format!("blog-media-test-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&path).expect("Failed to create staging dir");
        Self { path }
    }

    /// Write `bytes` under `name` and hand it over as a staged upload
    pub fn stage(&self, name: &str, bytes: &[u8]) -> StagedFile {
        let path = self.path.join(name);
        std::fs::write(&path, bytes).expect("Failed to write staged file");
        StagedFile::new(path, name)
    }

    pub fn stage_many(&self, prefix: &str, count: usize) -> Vec<StagedFile> {
        (0..count)
            .map(|i| self.stage(&format!("{}-{}.jpg", prefix, i), format!("{}{}", prefix, i).as_bytes()))
            .collect()
    }
}

impl Drop for StagingDir {
    fn drop(&mut self) {
        std::fs::remove_dir_all(&self.path).ok();
    }
}
