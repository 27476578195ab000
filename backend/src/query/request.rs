//! Normalised filter requests
//!
//! A [`FilterRequest`] is built fresh from the [`ParamBag`] of every read
//! call. It does not know about any entity type: allow-lists are checked by
//! the strategies when the request is applied to a query.

use std::collections::BTreeMap;

use super::params::{ParamBag, ParamMap, ParamValue};

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    /// Parse `asc` / `desc` (case-insensitive)
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "asc" => Some(SortDirection::Asc),
            "desc" => Some(SortDirection::Desc),
            _ => None,
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// One `(column, direction)` sort pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortDirective {
    pub column: String,
    pub direction: SortDirection,
}

/// Requested page size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSize {
    /// A caller-supplied size, validated against the limits at paging time
    Count(i64),
    /// `page_size=all`: every matching row on one page
    All,
}

/// A comma-separated field allow-list for one entity type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSelection(Vec<String>);

impl FieldSelection {
    /// Parse `id, name,,email`. Blank input means "no selection".
    pub fn parse(raw: &str) -> Option<Self> {
        let fields: Vec<String> = raw
            .split(',')
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(String::from)
            .collect();
        (!fields.is_empty()).then_some(Self(fields))
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.iter().any(|f| f == field)
    }

    pub fn fields(&self) -> &[String] {
        &self.0
    }
}

/// Keys consumed by [`FilterRequest::from_params`]; anything else is an extra.
const RESERVED_KEYS: &[&str] = &[
    "search",
    "column_filters",
    "relations_array_filters",
    "relations",
    "relations_count",
    "relation_params",
    "sort_by",
    "sort_dir",
    "sort_by_relation_count",
    "sort_dir_relation_count",
    "page",
    "page_size",
    "fields",
    "intent",
];

/// The normalised request for one query (or one eager-loaded relation).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterRequest {
    /// Free-text search term, trimmed and non-empty
    pub search: Option<String>,
    /// `column_filters[<col>]` values
    pub column_filters: BTreeMap<String, ParamValue>,
    /// `relations_array_filters[<name>][]` values
    pub relation_array_filters: BTreeMap<String, ParamValue>,
    /// Relations to eager-load, each with its own nested request
    pub relations: BTreeMap<String, FilterRequest>,
    /// Relations whose row counts are requested
    pub relation_counts: Vec<String>,
    /// Sort directives in request order
    pub sort: Vec<SortDirective>,
    /// Order by the count of this relation before other directives
    pub sort_by_relation_count: Option<(String, SortDirection)>,
    /// 1-based page number as sent
    pub page: Option<i64>,
    pub page_size: Option<PageSize>,
    /// Own field selection, overriding `<type>_resource` at this level
    pub fields: Option<FieldSelection>,
    /// `<type>_resource` selections keyed by snake_case type name
    pub resource_fields: BTreeMap<String, FieldSelection>,
    /// Named use-case scope, e.g. `user.index.students`
    pub intent: Option<String>,
    /// Every unrecognised top-level parameter
    pub extras: BTreeMap<String, ParamValue>,
}

impl FilterRequest {
    /// Normalise a parameter bag
    pub fn from_params(params: &ParamBag) -> Self {
        let mut request = FilterRequest {
            search: params.get_str("search").map(String::from),
            intent: params.get_str("intent").map(String::from),
            fields: params.get("fields").and_then(field_selection),
            page: params.get_str("page").map(parse_page),
            page_size: params.get_str("page_size").map(parse_page_size),
            relation_counts: params
                .get("relations_count")
                .map(ParamValue::comma_list)
                .unwrap_or_default(),
            sort: parse_sort(params.get("sort_by"), params.get_str("sort_dir")),
            ..Default::default()
        };

        if let Some(relation) = params.get_str("sort_by_relation_count") {
            let direction = params
                .get_str("sort_dir_relation_count")
                .and_then(SortDirection::parse)
                .unwrap_or_default();
            request.sort_by_relation_count = Some((relation.to_string(), direction));
        }

        if let Some(filters) = params.get("column_filters").and_then(ParamValue::as_map) {
            request.column_filters = non_blank(filters);
        }
        if let Some(filters) = params
            .get("relations_array_filters")
            .and_then(ParamValue::as_map)
        {
            request.relation_array_filters = non_blank(filters);
        }

        if let Some(relations) = params.get("relations") {
            for path in relations.comma_list() {
                request.add_relation_path(&path);
            }
        }
        if let Some(nested) = params.get("relation_params").and_then(ParamValue::as_map) {
            request.merge_relation_params(nested);
        }

        for (key, value) in params.iter() {
            if RESERVED_KEYS.contains(&key.as_str()) {
                continue;
            }
            if let Some(type_name) = key.strip_suffix("_resource") {
                if let Some(selection) = field_selection(value) {
                    request.resource_fields.insert(type_name.to_string(), selection);
                }
                continue;
            }
            request.extras.insert(key.clone(), value.clone());
        }

        request
    }

    /// Register `a.b.c` as a chain of nested relation requests
    fn add_relation_path(&mut self, path: &str) {
        let mut segments = path.split('.').map(str::trim).filter(|s| !s.is_empty());
        let Some(first) = segments.next() else {
            return;
        };
        let mut current = self.relations.entry(first.to_string()).or_default();
        for segment in segments {
            current = current.relations.entry(segment.to_string()).or_default();
        }
    }

    /// Merge `relation_params[<rel>][...]` into already-requested relations.
    ///
    /// Parameters for relations that were not requested are dropped.
    fn merge_relation_params(&mut self, nested: &ParamMap) {
        for (name, value) in nested {
            let Some(map) = value.as_map() else {
                continue;
            };
            let Some(existing) = self.relations.get_mut(name) else {
                tracing::debug!(relation = %name, "relation_params for a relation that was not requested");
                continue;
            };
            let mut parsed = FilterRequest::from_params(&ParamBag::from_map(map.clone()));
            // Dot-path children requested at the top level still load
            for (child, child_request) in std::mem::take(&mut existing.relations) {
                parsed.relations.entry(child).or_insert(child_request);
            }
            *existing = parsed;
        }
    }

    /// Raw value of a column filter, from `column_filters[col]` or a bare `col`
    pub fn column_filter(&self, column: &str) -> Option<&ParamValue> {
        self.column_filters
            .get(column)
            .or_else(|| self.extras.get(column))
            .filter(|v| !v.is_blank())
    }

    /// Raw value of a relation-array filter, from
    /// `relations_array_filters[name]` or a bare `name`
    pub fn relation_array_filter(&self, name: &str) -> Option<&ParamValue> {
        self.relation_array_filters
            .get(name)
            .or_else(|| self.extras.get(name))
            .filter(|v| !v.is_blank())
    }

    /// A scalar extra parameter such as `school_id`
    pub fn extra(&self, key: &str) -> Option<&str> {
        self.extras
            .get(key)
            .and_then(ParamValue::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

fn non_blank(map: &ParamMap) -> BTreeMap<String, ParamValue> {
    map.iter()
        .filter(|(_, v)| !v.is_blank())
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

fn field_selection(value: &ParamValue) -> Option<FieldSelection> {
    FieldSelection::parse(&value.comma_list().join(","))
}

fn parse_page(raw: &str) -> i64 {
    raw.parse::<i64>().ok().filter(|p| *p >= 1).unwrap_or(1)
}

fn parse_page_size(raw: &str) -> PageSize {
    if raw.eq_ignore_ascii_case("all") {
        PageSize::All
    } else {
        // Validated against the configured limits when paging
        PageSize::Count(raw.parse::<i64>().unwrap_or(0))
    }
}

/// Parse `sort_by=name,asc,created_at,desc` or `sort_by=name&sort_dir=asc`.
///
/// A column not followed by a direction uses `sort_dir` (default `desc`).
fn parse_sort(sort_by: Option<&ParamValue>, sort_dir: Option<&str>) -> Vec<SortDirective> {
    let Some(sort_by) = sort_by else {
        return Vec::new();
    };
    let fallback = sort_dir.and_then(SortDirection::parse).unwrap_or_default();

    let tokens = sort_by.comma_list();
    let mut directives = Vec::new();
    let mut iter = tokens.iter().peekable();
    while let Some(column) = iter.next() {
        if SortDirection::parse(column).is_some() {
            // A stray direction with no column
            continue;
        }
        let direction = match iter.peek().and_then(|t| SortDirection::parse(t)) {
            Some(direction) => {
                iter.next();
                direction
            }
            None => fallback,
        };
        directives.push(SortDirective {
            column: column.clone(),
            direction,
        });
    }
    directives
}

/// Identity and roles of the caller, passed explicitly into every query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub user_id: Option<i64>,
    pub roles: Vec<String>,
}

impl RequestContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn new(user_id: i64, roles: Vec<String>) -> Self {
        Self {
            user_id: Some(user_id),
            roles,
        }
    }

    /// Whether `role` is the caller's only role
    pub fn has_only_role(&self, role: &str) -> bool {
        !self.roles.is_empty() && self.roles.iter().all(|r| r == role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    fn request(query: &str) -> FilterRequest {
        FilterRequest::from_params(&ParamBag::from_query(query))
    }

    #[test]
    fn test_sort_pairs() {
        let req = request("sort_by=name,asc,created_at,desc");
        assert_eq!(
            req.sort,
            vec![
                SortDirective { column: "name".into(), direction: SortDirection::Asc },
                SortDirective { column: "created_at".into(), direction: SortDirection::Desc },
            ]
        );
    }

    #[test]
    fn test_sort_with_separate_direction() {
        let req = request("sort_by=name&sort_dir=asc");
        assert_eq!(req.sort.len(), 1);
        assert_eq!(req.sort[0].direction, SortDirection::Asc);

        let req = request("sort_by=name");
        assert_eq!(req.sort[0].direction, SortDirection::Desc);
    }

    #[test]
    fn test_pagination_params() {
        assert_eq!(request("page=0").page, Some(1));
        assert_eq!(request("page=abc").page, Some(1));
        assert_eq!(request("page=3").page, Some(3));
        assert_matches!(request("page_size=all").page_size, Some(PageSize::All));
        assert_matches!(request("page_size=25").page_size, Some(PageSize::Count(25)));
        assert_eq!(request("").page_size, None);
    }

    #[test]
    fn test_dotted_relations_nest() {
        let req = request("relations=classroom.school,teacher");
        assert!(req.relations.contains_key("teacher"));
        let classroom = &req.relations["classroom"];
        assert!(classroom.relations.contains_key("school"));
    }

    #[test]
    fn test_relation_params_merge() {
        let req = request(
            "relations=classroom.school\
             &relation_params[classroom][fields]=id,name\
             &relation_params[classroom][column_filters][active]=1\
             &relation_params[teacher][fields]=id",
        );
        let classroom = &req.relations["classroom"];
        assert!(classroom.fields.as_ref().unwrap().contains("name"));
        assert!(classroom.column_filter("active").is_some());
        assert!(classroom.relations.contains_key("school"));
        assert!(!req.relations.contains_key("teacher"));
    }

    #[test]
    fn test_resource_fields_and_extras() {
        let req = request("course_resource=id,name&school_id=4&intent=user.index.students");
        assert_eq!(req.resource_fields["course"].fields(), ["id", "name"]);
        assert_eq!(req.extra("school_id"), Some("4"));
        assert_eq!(req.intent.as_deref(), Some("user.index.students"));
        assert!(!req.extras.contains_key("course_resource"));
    }

    #[test]
    fn test_bare_column_filter_falls_back_to_extras() {
        let req = request("active=1&column_filters[id][]=2");
        assert_eq!(req.column_filter("active").unwrap().scalars(), vec!["1"]);
        assert_eq!(req.column_filter("id").unwrap().scalars(), vec!["2"]);
        assert!(req.column_filter("name").is_none());
    }

    #[test]
    fn test_field_selection_parse() {
        assert_eq!(FieldSelection::parse(" , "), None);
        let selection = FieldSelection::parse("id, name").unwrap();
        assert!(selection.contains("name"));
        assert!(!selection.contains("email"));
    }

    #[test]
    fn test_request_context_roles() {
        let student = RequestContext::new(3, vec!["student".into()]);
        assert!(student.has_only_role("student"));
        let teacher = RequestContext::new(2, vec!["student".into(), "teacher".into()]);
        assert!(!teacher.has_only_role("student"));
        assert!(!RequestContext::anonymous().has_only_role("student"));
    }
}
