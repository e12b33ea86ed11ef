use crate::modules::blog::domain::{
    BlogCriteria, BlogQuery, FilterField, Projection, SortField, SortOrder,
};
use crate::shared::application::PaginationParams;
use crate::shared::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Raw listing parameters as received from the caller
///
/// `page` and `perPage` stay strings so that absent or non-numeric values can
/// fall back to the defaults instead of failing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogListQuery {
    pub page: Option<String>,
    pub per_page: Option<String>,
    /// Comma separated attribute names
    pub fields: Option<String>,
    pub sort_by: Option<String>,
    pub order: Option<String>,
    /// Regular expression matched against title and description
    pub search: Option<String>,
    /// JSON object of attribute/value equality filters
    pub filter: Option<String>,
}

impl BlogListQuery {
    pub fn with_page(mut self, page: &str, per_page: &str) -> Self {
        self.page = Some(page.to_string());
        self.per_page = Some(per_page.to_string());
        self
    }

    pub fn with_search(mut self, search: &str) -> Self {
        self.search = Some(search.to_string());
        self
    }

    pub fn with_sort(mut self, sort_by: &str, order: &str) -> Self {
        self.sort_by = Some(sort_by.to_string());
        self.order = Some(order.to_string());
        self
    }

    pub fn with_filter(mut self, filter: &str) -> Self {
        self.filter = Some(filter.to_string());
        self
    }

    pub fn with_fields(mut self, fields: &str) -> Self {
        self.fields = Some(fields.to_string());
        self
    }

    /// Validate every parameter; nothing is queried when this fails
    pub fn to_query(&self) -> AppResult<ValidatedListQuery> {
        let pagination = PaginationParams::from_raw(self.page.as_deref(), self.per_page.as_deref());
        let sort_field = SortField::parse(self.sort_by.as_deref())?;
        let sort_order = SortOrder::parse(self.order.as_deref())?;
        let filters = parse_filter(self.filter.as_deref())?;
        let criteria = BlogCriteria::new(self.search.as_deref(), filters)?;

        Ok(ValidatedListQuery {
            pagination,
            query: BlogQuery {
                criteria,
                skip: pagination.skip()?,
                per_page: pagination.limit(),
                sort_field,
                sort_order,
                projection: Projection::parse(self.fields.as_deref()),
            },
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedListQuery {
    pub pagination: PaginationParams,
    pub query: BlogQuery,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ListCacheKey<'a> {
    page: u32,
    per_page: u32,
    sort_by: SortField,
    order: SortOrder,
    search: Option<&'a str>,
    filter: &'a [(FilterField, String)],
    fields: Vec<&'static str>,
}

impl ValidatedListQuery {
    /// Deterministic key suffix: equivalent raw queries share one cache entry
    pub fn cache_suffix(&self) -> AppResult<String> {
        let key = ListCacheKey {
            page: self.pagination.page,
            per_page: self.pagination.per_page,
            sort_by: self.query.sort_field,
            order: self.query.sort_order,
            search: self.query.criteria.search(),
            filter: self.query.criteria.filters(),
            fields: self
                .query
                .projection
                .fields()
                .iter()
                .map(|field| field.key())
                .collect(),
        };
        Ok(serde_json::to_string(&key)?)
    }
}

/// Parse the JSON filter object; only string equality on known attributes is allowed
fn parse_filter(raw: Option<&str>) -> AppResult<Vec<(FilterField, String)>> {
    let Some(raw) = raw.map(str::trim).filter(|value| !value.is_empty()) else {
        return Ok(Vec::new());
    };

    let object: serde_json::Map<String, serde_json::Value> = serde_json::from_str(raw)
        .map_err(|e| AppError::ValidationError(format!("Filter must be a JSON object: {}", e)))?;

    let mut filters = object
        .into_iter()
        .map(|(key, value)| {
            let field = FilterField::parse(&key)?;
            match value {
                serde_json::Value::String(value) => Ok((field, value)),
                other => Err(AppError::ValidationError(format!(
                    "Filter value for '{}' must be a string, got {}",
                    key, other
                ))),
            }
        })
        .collect::<AppResult<Vec<_>>>()?;

    filters.sort();
    filters.dedup_by(|a, b| a.0 == b.0);
    Ok(filters)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_to_an_empty_query() {
        let validated = BlogListQuery::default().to_query().unwrap();

        assert_eq!(validated.query.skip, 0);
        assert_eq!(validated.query.per_page, 7);
        assert_eq!(validated.query.sort_field, SortField::Title);
        assert_eq!(validated.query.sort_order, SortOrder::Desc);
    }

    #[test]
    fn huge_page_values_do_not_overflow() {
        let validated = BlogListQuery::default()
            .with_page("4294967295", "4294967295")
            .to_query()
            .unwrap();

        assert_eq!(validated.query.per_page, 100);
        assert!(validated.query.skip > 0);
        assert_eq!(validated.pagination.per_page, 100);
    }

    #[test]
    fn unknown_sort_field_fails_validation() {
        let err = BlogListQuery::default()
            .with_sort("price", "1")
            .to_query()
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn filter_must_use_known_string_fields() {
        let ok = BlogListQuery::default()
            .with_filter(r#"{"category": "Noticias"}"#)
            .to_query()
            .unwrap();
        assert_eq!(
            ok.query.criteria.filters(),
            &[(FilterField::Category, "Noticias".to_string())]
        );

        for bad in [r#"{"price": "1"}"#, r#"{"title": {"$ne": "x"}}"#, "not json", "[]"] {
            assert!(BlogListQuery::default().with_filter(bad).to_query().is_err(), "{}", bad);
        }
    }

    #[test]
    fn equivalent_queries_share_a_cache_key() {
        let a = BlogListQuery::default()
            .with_page("abc", "7")
            .with_filter(r#"{"title":"A","category":"Noticias"}"#)
            .to_query()
            .unwrap();
        let b = BlogListQuery::default()
            .with_filter(r#"{"category":"Noticias","title":"A"}"#)
            .to_query()
            .unwrap();

        assert_eq!(a.cache_suffix().unwrap(), b.cache_suffix().unwrap());
    }

    #[test]
    fn different_pages_do_not_share_a_cache_key() {
        let first = BlogListQuery::default().to_query().unwrap();
        let second = BlogListQuery::default()
            .with_page("2", "7")
            .to_query()
            .unwrap();

        assert_ne!(first.cache_suffix().unwrap(), second.cache_suffix().unwrap());
    }
}
