//! # List Query Builder
//!
//! Structured filter/sort/page state for list endpoints and its canonical
//! query-string encoding. Each list endpoint is described by a
//! [`ListResource`]; [`ListQuery`] keeps the page offset honest by resetting
//! it to 1 whenever anything that changes *what* is being asked for changes.

use std::collections::BTreeSet;
use std::fmt;

use chrono::NaiveDate;
use serde::de::DeserializeOwned;

/// Page size used when nothing else is configured.
pub const DEFAULT_PER_PAGE: u32 = 20;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// A status filter value. The "all" sentinel is modelled as `None` on the
/// query, so implementors only list real statuses.
pub trait StatusFilter: Copy + PartialEq + Eq + fmt::Debug + Send + Sync + 'static {
    fn wire_value(&self) -> &'static str;
    fn from_wire(value: &str) -> Option<Self>;

    /// Parse user input where `all` (or blank) means "no filter".
    fn parse_filter(value: &str) -> Result<Option<Self>, String> {
        let value = value.trim();
        if value.is_empty() || value.eq_ignore_ascii_case("all") {
            return Ok(None);
        }
        Self::from_wire(&value.to_ascii_lowercase())
            .map(Some)
            .ok_or_else(|| format!("unknown status '{value}'"))
    }
}

/// A sortable column, with distinct UI-facing and wire names.
pub trait SortKey: Copy + Default + PartialEq + Eq + fmt::Debug + Send + Sync + 'static {
    const ALL: &'static [Self];

    fn ui_name(&self) -> &'static str;
    fn wire_name(&self) -> &'static str;

    fn from_ui_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|f| f.ui_name() == name)
    }

    fn from_wire_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|f| f.wire_name() == name)
    }

    /// Accept either spelling; handy for command-line input.
    fn parse(name: &str) -> Option<Self> {
        Self::from_ui_name(name).or_else(|| Self::from_wire_name(name))
    }
}

/// Resource-specific query context (e.g. calendar view and day for
/// appointments). Encoded after the shared parameters.
pub trait QueryScope: Clone + Default + PartialEq + fmt::Debug + Send + Sync + 'static {
    fn append_pairs(&self, pairs: &mut Vec<(String, String)>);
    fn from_pairs(pairs: &[(String, String)]) -> Self;
}

impl QueryScope for () {
    fn append_pairs(&self, _pairs: &mut Vec<(String, String)>) {}

    fn from_pairs(_pairs: &[(String, String)]) -> Self {}
}

/// Describes one paginated list endpoint.
pub trait ListResource: fmt::Debug + Clone + PartialEq + Send + Sync + 'static {
    type Item: DeserializeOwned + Clone + fmt::Debug + Send + Sync + 'static;
    type Status: StatusFilter;
    type SortField: SortKey;
    type Scope: QueryScope;

    /// Short name used in logs and metrics.
    const NAME: &'static str;
    /// Endpoint path relative to the API base URL.
    const PATH: &'static str;
    /// JSON key holding the page's rows.
    const ITEMS_KEY: &'static str;
    const DATE_FROM_KEY: &'static str;
    const DATE_TO_KEY: &'static str;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "asc" => Some(SortDirection::Asc),
            "desc" => Some(SortDirection::Desc),
            _ => None,
        }
    }
}

/// Inclusive date bounds; either side may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        Self { from, to }
    }

    pub fn is_empty(&self) -> bool {
        self.from.is_none() && self.to.is_none()
    }
}

/// Filter, sort and page state for one list screen.
#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery<R: ListResource> {
    page: u32,
    per_page: u32,
    text: Option<String>,
    tags: BTreeSet<String>,
    status: Option<R::Status>,
    date_range: DateRange,
    sort_field: R::SortField,
    sort_direction: SortDirection,
    scope: R::Scope,
}

impl<R: ListResource> Default for ListQuery<R> {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_PER_PAGE,
            text: None,
            tags: BTreeSet::new(),
            status: None,
            date_range: DateRange::default(),
            sort_field: R::SortField::default(),
            sort_direction: SortDirection::default(),
            scope: R::Scope::default(),
        }
    }
}

impl<R: ListResource> ListQuery<R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn per_page(&self) -> u32 {
        self.per_page
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    pub fn status(&self) -> Option<R::Status> {
        self.status
    }

    pub fn date_range(&self) -> DateRange {
        self.date_range
    }

    pub fn sort_field(&self) -> R::SortField {
        self.sort_field
    }

    pub fn sort_direction(&self) -> SortDirection {
        self.sort_direction
    }

    pub fn scope(&self) -> &R::Scope {
        &self.scope
    }

    /// Move to an explicit page without touching filters.
    pub fn set_page(&mut self, page: u32) {
        self.page = page.max(1);
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.set_page(page);
        self
    }

    /// Copy of this query pointing at the following page.
    pub fn next_page(&self) -> Self {
        self.clone().with_page(self.page.saturating_add(1))
    }

    pub fn set_per_page(&mut self, per_page: u32) {
        self.per_page = per_page.max(1);
        self.page = 1;
    }

    pub fn with_per_page(mut self, per_page: u32) -> Self {
        self.set_per_page(per_page);
        self
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        let text = text.into();
        self.text = if text.trim().is_empty() { None } else { Some(text) };
        self.page = 1;
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.set_text(text);
        self
    }

    pub fn set_tags<I, S>(&mut self, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags
            .into_iter()
            .map(Into::into)
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        self.page = 1;
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set_tags(tags);
        self
    }

    pub fn add_tag(&mut self, tag: impl Into<String>) {
        let tag = tag.into().trim().to_string();
        if !tag.is_empty() {
            self.tags.insert(tag);
        }
        self.page = 1;
    }

    pub fn remove_tag(&mut self, tag: &str) {
        self.tags.remove(tag.trim());
        self.page = 1;
    }

    /// `None` selects every status.
    pub fn set_status(&mut self, status: Option<R::Status>) {
        self.status = status;
        self.page = 1;
    }

    pub fn with_status(mut self, status: Option<R::Status>) -> Self {
        self.set_status(status);
        self
    }

    pub fn set_date_range(&mut self, range: DateRange) {
        self.date_range = range;
        self.page = 1;
    }

    pub fn with_date_range(mut self, range: DateRange) -> Self {
        self.set_date_range(range);
        self
    }

    pub fn set_sort(&mut self, field: R::SortField, direction: SortDirection) {
        self.sort_field = field;
        self.sort_direction = direction;
        self.page = 1;
    }

    pub fn with_sort(mut self, field: R::SortField, direction: SortDirection) -> Self {
        self.set_sort(field, direction);
        self
    }

    pub fn set_scope(&mut self, scope: R::Scope) {
        self.scope = scope;
        self.page = 1;
    }

    pub fn with_scope(mut self, scope: R::Scope) -> Self {
        self.set_scope(scope);
        self
    }

    /// True when `other` asks for the same rows, ignoring the page offset.
    pub fn same_filters(&self, other: &Self) -> bool {
        self.clone().with_page(1) == other.clone().with_page(1)
    }

    /// Canonical key/value pairs for a GET request.
    ///
    /// Unset values (blank text, no status, no tags, open date bounds) are
    /// omitted; tags repeat the `tags` key once per value.
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![
            ("page".to_string(), self.page.to_string()),
            ("per_page".to_string(), self.per_page.to_string()),
        ];

        if let Some(text) = self.text.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            pairs.push(("q".to_string(), text.to_string()));
        }
        for tag in &self.tags {
            pairs.push(("tags".to_string(), tag.clone()));
        }
        if let Some(status) = self.status {
            pairs.push(("status".to_string(), status.wire_value().to_string()));
        }
        pairs.push(("sort".to_string(), self.sort_field.wire_name().to_string()));
        pairs.push(("order".to_string(), self.sort_direction.as_str().to_string()));
        if let Some(from) = self.date_range.from {
            pairs.push((R::DATE_FROM_KEY.to_string(), from.format(DATE_FORMAT).to_string()));
        }
        if let Some(to) = self.date_range.to {
            pairs.push((R::DATE_TO_KEY.to_string(), to.format(DATE_FORMAT).to_string()));
        }
        self.scope.append_pairs(&mut pairs);
        pairs
    }

    /// Rebuild a query from request parameters. Unknown keys and unparsable
    /// values are ignored, so anything [`to_query_pairs`](Self::to_query_pairs)
    /// produced comes back unchanged.
    pub fn from_query_pairs(pairs: &[(String, String)]) -> Self {
        let mut query = Self::default();
        for (key, value) in pairs {
            match key.as_str() {
                "page" => {
                    if let Ok(page) = value.parse::<u32>() {
                        query.page = page.max(1);
                    }
                }
                "per_page" => {
                    if let Ok(per_page) = value.parse::<u32>() {
                        query.per_page = per_page.max(1);
                    }
                }
                "q" if !value.trim().is_empty() => query.text = Some(value.clone()),
                "tags" if !value.trim().is_empty() => {
                    query.tags.insert(value.trim().to_string());
                }
                "status" => query.status = R::Status::from_wire(value),
                "sort" => {
                    if let Some(field) = R::SortField::from_wire_name(value) {
                        query.sort_field = field;
                    }
                }
                "order" => {
                    if let Some(direction) = SortDirection::parse(value) {
                        query.sort_direction = direction;
                    }
                }
                k if k == R::DATE_FROM_KEY => query.date_range.from = parse_date(value),
                k if k == R::DATE_TO_KEY => query.date_range.to = parse_date(value),
                _ => {}
            }
        }
        query.scope = R::Scope::from_pairs(pairs);
        query
    }
}

pub(crate) fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).ok()
}

pub(crate) fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}
