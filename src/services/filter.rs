//! Listing filter engine.
//!
//! Query parameters are resolved through [`PARAMETERS`], a fixed table from parameter
//! name to predicate builder. Each [`Predicate`] can be evaluated against a listing in
//! memory or rendered into a Postgres `WHERE` clause, so both storage backends share
//! one definition of every filter.

use crate::error::{Error, Result};
use crate::models::choices::{
    ApplicationType, Category, Commitment, DocumentType, EducationLevel, FundingType, Location,
    TargetGroup, UnknownChoice, WorkMode,
};
use crate::models::listing::Listing;
use crate::utils::time::parse_date_param;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use sqlx::{Postgres, QueryBuilder};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::str::FromStr;

pub const CLOSING_SOON_DAYS: i64 = 7;
pub const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flag {
    Paid,
    Verified,
    Active,
    Featured,
    Rolling,
}

impl Flag {
    fn column(&self) -> &'static str {
        match self {
            Flag::Paid => "is_paid",
            Flag::Verified => "is_verified",
            Flag::Active => "is_active",
            Flag::Featured => "is_featured",
            Flag::Rolling => "is_rolling",
        }
    }

    fn read(&self, listing: &Listing) -> bool {
        match self {
            Flag::Paid => listing.is_paid,
            Flag::Verified => listing.is_verified,
            Flag::Active => listing.is_active,
            Flag::Featured => listing.is_featured,
            Flag::Rolling => listing.is_rolling,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Category(Category),
    Location(Location),
    WorkMode(WorkMode),
    Commitment(Commitment),
    TargetGroup(TargetGroup),
    EducationLevel(EducationLevel),
    FundingType(FundingType),
    ApplicationType(ApplicationType),
    Flag(Flag, bool),
    StipendAtLeast(Decimal),
    StipendAtMost(Decimal),
    DeadlineFrom(DateTime<Utc>),
    DeadlineUntil(DateTime<Utc>),
    ClosingSoon,
    Upcoming,
    CategoryIn(Vec<Category>),
    WorkModeIn(Vec<WorkMode>),
    Document(DocumentType),
    CityContains(String),
    Search(String),
}

type ParamBuilder = fn(&str) -> Result<Option<Predicate>>;

/// Supported query parameters. Names outside this table are ignored.
pub static PARAMETERS: &[(&str, ParamBuilder)] = &[
    ("category", |v| Ok(Some(Predicate::Category(choice("category", v)?)))),
    ("location", |v| Ok(Some(Predicate::Location(choice("location", v)?)))),
    ("work_mode", |v| Ok(Some(Predicate::WorkMode(choice("work_mode", v)?)))),
    ("commitment", |v| Ok(Some(Predicate::Commitment(choice("commitment", v)?)))),
    ("target_group", |v| Ok(Some(Predicate::TargetGroup(choice("target_group", v)?)))),
    ("education_level", |v| {
        Ok(Some(Predicate::EducationLevel(choice("education_level", v)?)))
    }),
    ("funding_type", |v| Ok(Some(Predicate::FundingType(choice("funding_type", v)?)))),
    ("application_type", |v| {
        Ok(Some(Predicate::ApplicationType(choice("application_type", v)?)))
    }),
    ("is_paid", |v| Ok(Some(Predicate::Flag(Flag::Paid, boolean("is_paid", v)?)))),
    ("is_verified", |v| Ok(Some(Predicate::Flag(Flag::Verified, boolean("is_verified", v)?)))),
    ("is_active", |v| Ok(Some(Predicate::Flag(Flag::Active, boolean("is_active", v)?)))),
    ("is_featured", |v| Ok(Some(Predicate::Flag(Flag::Featured, boolean("is_featured", v)?)))),
    ("is_rolling", |v| Ok(Some(Predicate::Flag(Flag::Rolling, boolean("is_rolling", v)?)))),
    ("stipend_min", |v| Ok(Some(Predicate::StipendAtLeast(decimal("stipend_min", v)?)))),
    ("stipend_max", |v| Ok(Some(Predicate::StipendAtMost(decimal("stipend_max", v)?)))),
    ("deadline_after", |v| Ok(Some(Predicate::DeadlineFrom(date("deadline_after", v)?)))),
    ("deadline_before", |v| Ok(Some(Predicate::DeadlineUntil(date("deadline_before", v)?)))),
    ("closing_soon", |v| {
        Ok(boolean("closing_soon", v)?.then_some(Predicate::ClosingSoon))
    }),
    ("upcoming", |v| Ok(boolean("upcoming", v)?.then_some(Predicate::Upcoming))),
    ("categories", |v| Ok(choice_list(v).map(Predicate::CategoryIn))),
    ("work_modes", |v| Ok(choice_list(v).map(Predicate::WorkModeIn))),
    ("work_type", |v| Ok(choice_list(v).map(Predicate::WorkModeIn))),
    ("docs", |v| Ok(Some(Predicate::Document(choice("docs", v)?)))),
    ("city", |v| Ok(Some(Predicate::CityContains(v.to_string())))),
    ("search", |v| Ok(Some(Predicate::Search(v.to_string())))),
];

fn choice<T>(field: &str, raw: &str) -> Result<T>
where
    T: FromStr<Err = UnknownChoice>,
{
    raw.parse::<T>()
        .map_err(|e| Error::invalid_field(field, format!("unknown value `{}`", e.value)))
}

/// Comma list; empty or unknown tokens are dropped. `None` when nothing valid remains.
fn choice_list<T>(raw: &str) -> Option<Vec<T>>
where
    T: FromStr<Err = UnknownChoice> + PartialEq,
{
    let mut values: Vec<T> = Vec::new();
    for token in raw.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        if let Ok(value) = token.parse::<T>() {
            if !values.contains(&value) {
                values.push(value);
            }
        }
    }
    (!values.is_empty()).then_some(values)
}

pub fn boolean(field: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        other => Err(Error::invalid_field(
            field,
            format!("expected a boolean, got `{}`", other),
        )),
    }
}

fn decimal(field: &str, raw: &str) -> Result<Decimal> {
    raw.trim()
        .parse::<Decimal>()
        .map_err(|_| Error::invalid_field(field, format!("expected a number, got `{}`", raw)))
}

fn date(field: &str, raw: &str) -> Result<DateTime<Utc>> {
    parse_date_param(raw).map_err(|_| {
        Error::invalid_field(
            field,
            format!("expected RFC 3339 or YYYY-MM-DD, got `{}`", raw),
        )
    })
}

fn contains_ci(haystack: Option<&str>, needle: &str) -> bool {
    haystack
        .map(|h| h.to_lowercase().contains(&needle.to_lowercase()))
        .unwrap_or(false)
}

/// `%needle%` with LIKE metacharacters escaped (Postgres' default escape is `\`).
fn like_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

impl Predicate {
    pub fn matches(&self, listing: &Listing, now: DateTime<Utc>) -> bool {
        match self {
            Predicate::Category(c) => listing.category == *c,
            Predicate::Location(l) => listing.location == Some(*l),
            Predicate::WorkMode(m) => listing.work_mode == Some(*m),
            Predicate::Commitment(c) => listing.commitment == Some(*c),
            Predicate::TargetGroup(g) => listing.target_group == Some(*g),
            Predicate::EducationLevel(e) => listing.education_level == Some(*e),
            Predicate::FundingType(f) => listing.funding_type == Some(*f),
            Predicate::ApplicationType(a) => listing.application_type == *a,
            Predicate::Flag(flag, expected) => flag.read(listing) == *expected,
            Predicate::StipendAtLeast(min) => listing.stipend_min.is_some_and(|s| s >= *min),
            Predicate::StipendAtMost(max) => listing.stipend_max.is_some_and(|s| s <= *max),
            Predicate::DeadlineFrom(from) => listing.deadline.is_some_and(|d| d >= *from),
            Predicate::DeadlineUntil(until) => listing.deadline.is_some_and(|d| d <= *until),
            Predicate::ClosingSoon => listing
                .deadline
                .is_some_and(|d| d >= now && d <= now + Duration::days(CLOSING_SOON_DAYS)),
            Predicate::Upcoming => listing.deadline.is_some_and(|d| d >= now),
            Predicate::CategoryIn(set) => set.contains(&listing.category),
            Predicate::WorkModeIn(set) => listing.work_mode.is_some_and(|m| set.contains(&m)),
            Predicate::Document(doc) => listing.required_documents.contains(doc),
            Predicate::CityContains(needle) => contains_ci(listing.city.as_deref(), needle),
            Predicate::Search(needle) => {
                contains_ci(Some(&listing.title), needle)
                    || contains_ci(Some(&listing.organization_name), needle)
                    || contains_ci(listing.city.as_deref(), needle)
                    || contains_ci(Some(&listing.description), needle)
            }
        }
    }

    /// Appends ` AND <condition>` to a query whose `WHERE` clause is already open.
    pub fn push_sql(&self, qb: &mut QueryBuilder<'_, Postgres>, now: DateTime<Utc>) {
        match self {
            Predicate::Category(c) => {
                qb.push(" AND category = ").push_bind(c.as_str());
            }
            Predicate::Location(l) => {
                qb.push(" AND location = ").push_bind(l.as_str());
            }
            Predicate::WorkMode(m) => {
                qb.push(" AND work_mode = ").push_bind(m.as_str());
            }
            Predicate::Commitment(c) => {
                qb.push(" AND commitment = ").push_bind(c.as_str());
            }
            Predicate::TargetGroup(g) => {
                qb.push(" AND target_group = ").push_bind(g.as_str());
            }
            Predicate::EducationLevel(e) => {
                qb.push(" AND education_level = ").push_bind(e.as_str());
            }
            Predicate::FundingType(f) => {
                qb.push(" AND funding_type = ").push_bind(f.as_str());
            }
            Predicate::ApplicationType(a) => {
                qb.push(" AND application_type = ").push_bind(a.as_str());
            }
            Predicate::Flag(flag, expected) => {
                qb.push(" AND ")
                    .push(flag.column())
                    .push(" = ")
                    .push_bind(*expected);
            }
            Predicate::StipendAtLeast(min) => {
                qb.push(" AND stipend_min >= ").push_bind(*min);
            }
            Predicate::StipendAtMost(max) => {
                qb.push(" AND stipend_max <= ").push_bind(*max);
            }
            Predicate::DeadlineFrom(from) => {
                qb.push(" AND deadline >= ").push_bind(*from);
            }
            Predicate::DeadlineUntil(until) => {
                qb.push(" AND deadline <= ").push_bind(*until);
            }
            Predicate::ClosingSoon => {
                qb.push(" AND deadline >= ")
                    .push_bind(now)
                    .push(" AND deadline <= ")
                    .push_bind(now + Duration::days(CLOSING_SOON_DAYS));
            }
            Predicate::Upcoming => {
                qb.push(" AND deadline >= ").push_bind(now);
            }
            Predicate::CategoryIn(set) => {
                let values: Vec<String> = set.iter().map(|c| c.as_str().to_string()).collect();
                qb.push(" AND category = ANY(").push_bind(values).push(")");
            }
            Predicate::WorkModeIn(set) => {
                let values: Vec<String> = set.iter().map(|m| m.as_str().to_string()).collect();
                qb.push(" AND work_mode = ANY(").push_bind(values).push(")");
            }
            Predicate::Document(doc) => {
                qb.push(" AND ")
                    .push_bind(doc.as_str())
                    .push(" = ANY(required_documents)");
            }
            Predicate::CityContains(needle) => {
                qb.push(" AND city ILIKE ").push_bind(like_pattern(needle));
            }
            Predicate::Search(needle) => {
                let pattern = like_pattern(needle);
                qb.push(" AND (title ILIKE ")
                    .push_bind(pattern.clone())
                    .push(" OR organization_name ILIKE ")
                    .push_bind(pattern.clone())
                    .push(" OR city ILIKE ")
                    .push_bind(pattern.clone())
                    .push(" OR description ILIKE ")
                    .push_bind(pattern)
                    .push(")");
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    CreatedAt,
    Deadline,
    Title,
    StipendMin,
    StipendMax,
}

impl SortField {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "created_at" => Some(SortField::CreatedAt),
            "deadline" => Some(SortField::Deadline),
            "title" => Some(SortField::Title),
            "stipend_min" => Some(SortField::StipendMin),
            "stipend_max" => Some(SortField::StipendMax),
            _ => None,
        }
    }

    fn column(&self) -> &'static str {
        match self {
            SortField::CreatedAt => "created_at",
            SortField::Deadline => "deadline",
            SortField::Title => "title",
            SortField::StipendMin => "stipend_min",
            SortField::StipendMax => "stipend_max",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub field: SortField,
    pub descending: bool,
}

pub fn default_ordering() -> Vec<SortKey> {
    vec![
        SortKey {
            field: SortField::Deadline,
            descending: false,
        },
        SortKey {
            field: SortField::CreatedAt,
            descending: true,
        },
    ]
}

/// Comma list of allowed fields with an optional `-` prefix; anything else is dropped.
pub fn parse_ordering(raw: &str) -> Vec<SortKey> {
    let keys: Vec<SortKey> = raw
        .split(',')
        .map(str::trim)
        .filter_map(|token| {
            let (descending, name) = match token.strip_prefix('-') {
                Some(rest) => (true, rest),
                None => (false, token),
            };
            SortField::parse(name).map(|field| SortKey { field, descending })
        })
        .collect();
    if keys.is_empty() {
        default_ordering()
    } else {
        keys
    }
}

/// Nulls sort last regardless of direction.
fn compare_nullable<T: Ord>(a: Option<T>, b: Option<T>, descending: bool) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) if descending => b.cmp(&a),
        (Some(a), Some(b)) => a.cmp(&b),
    }
}

pub fn compare_by(keys: &[SortKey], a: &Listing, b: &Listing) -> Ordering {
    for key in keys {
        let ord = match key.field {
            SortField::CreatedAt => {
                compare_nullable(Some(a.created_at), Some(b.created_at), key.descending)
            }
            SortField::Deadline => compare_nullable(a.deadline, b.deadline, key.descending),
            SortField::Title => {
                compare_nullable(Some(&a.title), Some(&b.title), key.descending)
            }
            SortField::StipendMin => {
                compare_nullable(a.stipend_min, b.stipend_min, key.descending)
            }
            SortField::StipendMax => {
                compare_nullable(a.stipend_max, b.stipend_max, key.descending)
            }
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    b.id.cmp(&a.id)
}

pub fn push_order_by(qb: &mut QueryBuilder<'_, Postgres>, keys: &[SortKey]) {
    qb.push(" ORDER BY ");
    for key in keys {
        qb.push(key.field.column()).push(if key.descending {
            " DESC NULLS LAST, "
        } else {
            " ASC NULLS LAST, "
        });
    }
    qb.push("id DESC");
}

#[derive(Debug, Clone)]
pub struct ListingQuery {
    pub predicates: Vec<Predicate>,
    pub ordering: Vec<SortKey>,
    pub page: i64,
    pub page_size: i64,
}

impl ListingQuery {
    pub fn new(default_page_size: i64) -> Self {
        Self {
            predicates: Vec::new(),
            ordering: default_ordering(),
            page: 1,
            page_size: default_page_size.clamp(1, MAX_PAGE_SIZE),
        }
    }

    /// Resolves raw query parameters. Unknown names and empty values are ignored.
    pub fn from_params(params: &HashMap<String, String>, default_page_size: i64) -> Result<Self> {
        let mut query = Self::new(default_page_size);
        let value = |name: &str| {
            params
                .get(name)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
        };

        for &(name, build) in PARAMETERS {
            if let Some(raw) = value(name) {
                if let Some(predicate) = build(raw)? {
                    query.predicates.push(predicate);
                }
            }
        }

        if let Some(raw) = value("ordering") {
            query.ordering = parse_ordering(raw);
        }
        if let Some(raw) = value("page") {
            query.page = match raw.parse::<i64>() {
                Ok(page) if page >= 1 => page,
                _ => return Err(Error::invalid_field("page", "must be a positive integer")),
            };
        }
        if let Some(raw) = value("page_size") {
            let size = raw
                .parse::<i64>()
                .map_err(|_| Error::invalid_field("page_size", "must be an integer"))?;
            query.page_size = size.clamp(1, MAX_PAGE_SIZE);
        }
        Ok(query)
    }

    /// Active listings satisfying every predicate.
    pub fn matches(&self, listing: &Listing, now: DateTime<Utc>) -> bool {
        listing.is_active && self.predicates.iter().all(|p| p.matches(listing, now))
    }

    pub fn compare(&self, a: &Listing, b: &Listing) -> Ordering {
        compare_by(&self.ordering, a, b)
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.page_size)
    }

    pub fn push_conditions(&self, qb: &mut QueryBuilder<'_, Postgres>, now: DateTime<Utc>) {
        qb.push(" WHERE is_active = TRUE");
        for predicate in &self.predicates {
            predicate.push_sql(qb, now);
        }
    }
}

#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
}

impl<T> Page<T> {
    pub fn total_pages(&self) -> i64 {
        if self.total == 0 {
            0
        } else {
            (self.total + self.page_size - 1) / self.page_size
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            page_size: self.page_size,
        }
    }
}

/// In-memory evaluation: filter, sort, slice.
pub fn apply<'a, I>(query: &ListingQuery, listings: I, now: DateTime<Utc>) -> Page<Listing>
where
    I: IntoIterator<Item = &'a Listing>,
{
    let mut matched: Vec<&Listing> = listings
        .into_iter()
        .filter(|l| query.matches(l, now))
        .collect();
    matched.sort_by(|a, b| query.compare(a, b));
    let total = matched.len() as i64;
    let items = matched
        .into_iter()
        .skip(query.offset() as usize)
        .take(query.page_size as usize)
        .cloned()
        .collect();
    Page {
        items,
        total,
        page: query.page,
        page_size: query.page_size,
    }
}
