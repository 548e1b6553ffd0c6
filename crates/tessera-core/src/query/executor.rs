//! Query executor for list, count and lookup requests.
//!
//! The executor runs against a store snapshot: it filters the live records of
//! one entity, sorts them and cuts the requested page.

use super::filter::{FilterEvaluator, FilterSpec};
use super::sort::{sort_records, NullsOrder, SortDirection, SortKey};
use crate::catalog::{EntityDef, FieldType, ScalarType};
use crate::error::Error;
use crate::storage::{Record, StoreConfig, StoreState};
use serde::Serialize;

/// A list request: filter, sort and page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    pub filter: FilterSpec,
    pub sort: Vec<SortKey>,
    /// Null placement; the store default applies when unset.
    pub nulls: Option<NullsOrder>,
    pub offset: usize,
    /// Page size; the store default applies when unset.
    pub limit: Option<usize>,
}

impl ListQuery {
    /// Create a query returning the first default page of all live records.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter(mut self, filter: FilterSpec) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_sort(mut self, key: SortKey) -> Self {
        self.sort.push(key);
        self
    }

    pub fn with_nulls(mut self, nulls: NullsOrder) -> Self {
        self.nulls = Some(nulls);
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Parse textual parameters (`limit`, `offset`, `sort`, `order`, `nulls`,
    /// `q` and field conditions).
    ///
    /// `order=desc` makes every sort key descending.
    pub fn from_params<K, V>(params: impl IntoIterator<Item = (K, V)>) -> Result<Self, Error>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let params: Vec<(K, V)> = params.into_iter().collect();
        let mut query = ListQuery::new().with_filter(FilterSpec::from_params(
            params.iter().map(|(k, v)| (k.as_ref(), v.as_ref())),
        )?);

        let mut descending = false;
        for (key, value) in &params {
            let value = value.as_ref().trim();
            match key.as_ref().trim() {
                "limit" => query.limit = Some(parse_count("limit", value)?),
                "offset" => query.offset = parse_count("offset", value)?,
                "nulls" => query.nulls = Some(value.parse()?),
                "sort" => query.sort = SortKey::parse_list(value),
                "order" => match value.to_ascii_lowercase().as_str() {
                    "asc" | "" => descending = false,
                    "desc" => descending = true,
                    other => {
                        return Err(Error::InvalidQuery(format!(
                            "order must be asc or desc, got {:?}",
                            other
                        )))
                    }
                },
                _ => {}
            }
        }

        if descending {
            for key in &mut query.sort {
                key.direction = SortDirection::Desc;
            }
        }

        Ok(query)
    }
}

fn parse_count(name: &str, value: &str) -> Result<usize, Error> {
    value
        .parse::<usize>()
        .map_err(|_| Error::InvalidQuery(format!("{} must be a non-negative integer", name)))
}

/// A page of records plus the filtered total.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    pub records: Vec<Record>,
    /// Matching records before pagination.
    pub total: usize,
}

/// One autocomplete entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LookupItem {
    pub id: String,
    pub label: String,
}

/// Query executor over a store snapshot.
pub struct QueryExecutor<'a> {
    state: &'a StoreState,
    config: &'a StoreConfig,
}

impl<'a> QueryExecutor<'a> {
    /// Create a new executor.
    pub fn new(state: &'a StoreState, config: &'a StoreConfig) -> Self {
        Self { state, config }
    }

    fn filtered(&self, entity: &EntityDef, filter: &FilterSpec) -> Vec<&'a Record> {
        let fqn = entity.fqn();
        self.state
            .live_records(&fqn)
            .filter(|r| FilterEvaluator::matches(filter, entity, r))
            .collect()
    }

    /// Filter, sort and paginate the live records of `entity`.
    pub fn list(&self, entity: &EntityDef, query: &ListQuery) -> QueryResult {
        let mut matched = self.filtered(entity, &query.filter);
        let total = matched.len();

        let nulls = query.nulls.unwrap_or(self.config.default_nulls);
        sort_records(&mut matched, &query.sort, nulls);

        let limit = self.config.page_limit(query.limit);
        let records = matched
            .into_iter()
            .skip(query.offset)
            .take(limit)
            .cloned()
            .collect();

        QueryResult { records, total }
    }

    /// Count the live records of `entity` matching `filter`.
    pub fn count(&self, entity: &EntityDef, filter: &FilterSpec) -> usize {
        let fqn = entity.fqn();
        self.state
            .live_records(&fqn)
            .filter(|r| FilterEvaluator::matches(filter, entity, r))
            .count()
    }

    /// Autocomplete: `(id, label)` pairs whose label contains `q`.
    ///
    /// The label comes from `field`, or the entity's display field when unset.
    pub fn lookup(
        &self,
        entity: &EntityDef,
        field: Option<&str>,
        q: &str,
        limit: Option<usize>,
    ) -> Vec<LookupItem> {
        let fqn = entity.fqn();
        let field = field.unwrap_or_else(|| display_field(entity));
        let needle = q.trim().to_lowercase();
        let limit = self.config.lookup_size(limit);

        self.state
            .live_records(&fqn)
            .filter_map(|r| {
                let label = r
                    .field_value(field)
                    .filter(|v| !v.is_null())
                    .map(|v| v.to_key())
                    .unwrap_or_default();
                (needle.is_empty() || label.to_lowercase().contains(&needle)).then(|| {
                    LookupItem {
                        id: r.id.clone(),
                        label,
                    }
                })
            })
            .take(limit)
            .collect()
    }
}

/// Field shown when a record is referenced: a well-known name, else the first
/// string field, else the id.
pub fn display_field(entity: &EntityDef) -> &str {
    for candidate in ["name", "title", "email", "code"] {
        if let Some(field) = entity.get_field(candidate) {
            return &field.name;
        }
    }
    entity
        .fields
        .iter()
        .find(|f| f.field_type == FieldType::Scalar(ScalarType::String))
        .map(|f| f.name.as_str())
        .unwrap_or("id")
}
