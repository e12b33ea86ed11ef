use crate::shared::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Blog category, stored with its display value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "Noticias")]
    News,
    #[serde(rename = "Consejos y Guías")]
    TipsAndGuides,
    #[serde(rename = "Técnicos")]
    Technical,
    #[serde(rename = "Estilo de vida")]
    Lifestyle,
    #[serde(rename = "Comunidad")]
    Community,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::News,
        Category::TipsAndGuides,
        Category::Technical,
        Category::Lifestyle,
        Category::Community,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::News => "Noticias",
            Category::TipsAndGuides => "Consejos y Guías",
            Category::Technical => "Técnicos",
            Category::Lifestyle => "Estilo de vida",
            Category::Community => "Comunidad",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Category {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|category| category.as_str() == s.trim())
            .ok_or_else(|| AppError::ValidationError(format!("Unknown blog category: {}", s)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Subcategory {
    #[serde(rename = "Marcas")]
    Brands,
    #[serde(rename = "Mantenimiento")]
    Maintenance,
    #[serde(rename = "Conducción")]
    Riding,
    #[serde(rename = "Viajes")]
    Travel,
    #[serde(rename = "Motor")]
    Engine,
    #[serde(rename = "Suspensión")]
    Suspension,
    #[serde(rename = "Frenos")]
    Brakes,
    #[serde(rename = "Moda")]
    Fashion,
    #[serde(rename = "Música")]
    Music,
    #[serde(rename = "Pelicular")]
    Movies,
    #[serde(rename = "Eventos")]
    Events,
    #[serde(rename = "Regiones")]
    Regions,
    #[serde(rename = "Rutas")]
    Routes,
    #[serde(rename = "Carreras")]
    Races,
    #[serde(rename = "Reseñas")]
    Reviews,
}

impl Subcategory {
    pub const ALL: [Subcategory; 15] = [
        Subcategory::Brands,
        Subcategory::Maintenance,
        Subcategory::Riding,
        Subcategory::Travel,
        Subcategory::Engine,
        Subcategory::Suspension,
        Subcategory::Brakes,
        Subcategory::Fashion,
        Subcategory::Music,
        Subcategory::Movies,
        Subcategory::Events,
        Subcategory::Regions,
        Subcategory::Routes,
        Subcategory::Races,
        Subcategory::Reviews,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Subcategory::Brands => "Marcas",
            Subcategory::Maintenance => "Mantenimiento",
            Subcategory::Riding => "Conducción",
            Subcategory::Travel => "Viajes",
            Subcategory::Engine => "Motor",
            Subcategory::Suspension => "Suspensión",
            Subcategory::Brakes => "Frenos",
            Subcategory::Fashion => "Moda",
            Subcategory::Music => "Música",
            Subcategory::Movies => "Pelicular",
            Subcategory::Events => "Eventos",
            Subcategory::Regions => "Regiones",
            Subcategory::Routes => "Rutas",
            Subcategory::Races => "Carreras",
            Subcategory::Reviews => "Reseñas",
        }
    }
}

impl std::fmt::Display for Subcategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Subcategory {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Subcategory::ALL
            .into_iter()
            .find(|subcategory| subcategory.as_str() == s.trim())
            .ok_or_else(|| AppError::ValidationError(format!("Unknown blog subcategory: {}", s)))
    }
}

/// Sortable columns of the blog listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    #[default]
    Title,
    CreatedAt,
}

impl SortField {
    /// Only `title` and `createdAt` are sortable
    pub fn parse(raw: Option<&str>) -> AppResult<Self> {
        match raw.map(str::trim) {
            None | Some("") => Ok(SortField::default()),
            Some("title") => Ok(SortField::Title),
            Some("createdAt") | Some("created_at") => Ok(SortField::CreatedAt),
            Some(other) => Err(AppError::ValidationError(format!(
                "Invalid sort field '{}'. Allowed fields are: title, createdAt",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    /// Accepts `asc`/`1` and `desc`/`-1`; descending when absent
    pub fn parse(raw: Option<&str>) -> AppResult<Self> {
        match raw.map(|value| value.trim().to_lowercase()).as_deref() {
            None | Some("") => Ok(SortOrder::default()),
            Some("asc") | Some("1") => Ok(SortOrder::Asc),
            Some("desc") | Some("-1") => Ok(SortOrder::Desc),
            Some(other) => Err(AppError::ValidationError(format!(
                "Invalid sort order '{}'. Use asc, desc, 1 or -1",
                other
            ))),
        }
    }
}

/// Blog attributes that can be used for equality filters
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterField {
    Title,
    Description,
    Category,
    Subcategory,
    MoreDetails,
}

impl FilterField {
    pub fn parse(raw: &str) -> AppResult<Self> {
        match raw.trim() {
            "title" => Ok(FilterField::Title),
            "description" => Ok(FilterField::Description),
            "category" => Ok(FilterField::Category),
            "subcategory" => Ok(FilterField::Subcategory),
            "moreDetails" | "more_details" => Ok(FilterField::MoreDetails),
            other => Err(AppError::ValidationError(format!(
                "Field '{}' cannot be used as a filter",
                other
            ))),
        }
    }
}

/// Attributes a listing may be restricted to; `id` is always returned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlogField {
    Title,
    Description,
    Category,
    Subcategory,
    MoreDetails,
    Images,
    CreatedAt,
    UpdatedAt,
}

impl BlogField {
    /// Key of the attribute in the serialized blog
    pub fn key(&self) -> &'static str {
        match self {
            BlogField::Title => "title",
            BlogField::Description => "description",
            BlogField::Category => "category",
            BlogField::Subcategory => "subcategory",
            BlogField::MoreDetails => "moreDetails",
            BlogField::Images => "images",
            BlogField::CreatedAt => "createdAt",
            BlogField::UpdatedAt => "updatedAt",
        }
    }

    fn from_key(raw: &str) -> Option<Self> {
        match raw {
            "title" => Some(BlogField::Title),
            "description" => Some(BlogField::Description),
            "category" => Some(BlogField::Category),
            "subcategory" => Some(BlogField::Subcategory),
            "moreDetails" | "more_details" => Some(BlogField::MoreDetails),
            "images" => Some(BlogField::Images),
            "createdAt" | "created_at" => Some(BlogField::CreatedAt),
            "updatedAt" | "updated_at" => Some(BlogField::UpdatedAt),
            _ => None,
        }
    }
}

/// Field projection parsed from a comma separated list
///
/// Unknown names are ignored; an empty projection returns every attribute.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Projection {
    fields: Vec<BlogField>,
}

impl Projection {
    pub fn parse(raw: Option<&str>) -> Self {
        let mut fields = Vec::new();
        for name in raw.unwrap_or_default().split(',').map(str::trim) {
            if let Some(field) = BlogField::from_key(name) {
                if !fields.contains(&field) {
                    fields.push(field);
                }
            }
        }
        Self { fields }
    }

    pub fn all() -> Self {
        Self::default()
    }

    pub fn is_all(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> &[BlogField] {
        &self.fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_uses_stored_values() {
        assert_eq!("Noticias".parse::<Category>().unwrap(), Category::News);
        assert_eq!(
            serde_json::to_value(Category::TipsAndGuides).unwrap(),
            serde_json::json!("Consejos y Guías")
        );
        assert!("News".parse::<Category>().is_err());
    }

    #[test]
    fn subcategory_round_trips_through_display() {
        for subcategory in Subcategory::ALL {
            assert_eq!(
                subcategory.to_string().parse::<Subcategory>().unwrap(),
                subcategory
            );
        }
    }

    #[test]
    fn sort_field_rejects_unknown_columns() {
        assert_eq!(SortField::parse(None).unwrap(), SortField::Title);
        assert_eq!(
            SortField::parse(Some("createdAt")).unwrap(),
            SortField::CreatedAt
        );
        let err = SortField::parse(Some("price")).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn sort_order_accepts_numeric_forms() {
        assert_eq!(SortOrder::parse(None).unwrap(), SortOrder::Desc);
        assert_eq!(SortOrder::parse(Some("1")).unwrap(), SortOrder::Asc);
        assert_eq!(SortOrder::parse(Some("-1")).unwrap(), SortOrder::Desc);
        assert_eq!(SortOrder::parse(Some("ASC")).unwrap(), SortOrder::Asc);
        assert!(SortOrder::parse(Some("sideways")).is_err());
    }

    #[test]
    fn projection_ignores_unknown_and_duplicate_names() {
        let projection = Projection::parse(Some("title, price,title,createdAt"));
        assert_eq!(
            projection.fields(),
            &[BlogField::Title, BlogField::CreatedAt]
        );
        assert!(Projection::parse(None).is_all());
    }
}
