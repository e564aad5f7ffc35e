//! Listing parameters: parse the untyped request bag once into typed filters, counts, sort and paging.

use crate::error::AppError;
use crate::flavor::Flavor;
use crate::query::{CountComparator, SortDirection};
use serde_json::{Map, Value};

/// Relation segments allowed in one dotted filter key.
pub const MAX_RELATION_DEPTH: usize = 4;
pub const DEFAULT_PAGE_SIZE: u64 = 10;
const MAX_SEARCH_LEN: usize = 255;

/// One dotted-path segment with its prefix modifiers (`or:`, `not:`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Segment {
    pub name: String,
    pub negated: bool,
    pub disjoin: bool,
}

impl Segment {
    /// Strips `or:` and `not:` prefixes, in any order.
    pub fn parse(raw: &str) -> Self {
        let mut rest = raw;
        let mut negated = false;
        let mut disjoin = false;
        loop {
            if let Some(r) = rest.strip_prefix("or:") {
                disjoin = true;
                rest = r;
            } else if let Some(r) = rest.strip_prefix("not:") {
                negated = true;
                rest = r;
            } else {
                break;
            }
        }
        Segment {
            name: rest.to_string(),
            negated,
            disjoin,
        }
    }
}

/// `relation.nested.column` split into the relations to traverse and the final column.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FilterKey {
    pub relations: Vec<Segment>,
    pub column: Segment,
}

impl FilterKey {
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let mut parts: Vec<Segment> = raw.split('.').map(Segment::parse).collect();
        if parts.iter().any(|s| s.name.is_empty()) {
            return Err(AppError::Validation(format!("malformed filter key '{}'", raw)));
        }
        // Checked by the split above: at least one element.
        let column = parts.pop().unwrap_or_else(|| Segment::parse(raw));
        if parts.len() > MAX_RELATION_DEPTH {
            return Err(AppError::Validation(format!(
                "filter key '{}' traverses more than {} relations",
                raw, MAX_RELATION_DEPTH
            )));
        }
        Ok(FilterKey {
            relations: parts,
            column,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum FilterValue {
    Scalar(Value),
    List(Vec<Value>),
    Range { from: Option<String>, to: Option<String> },
}

impl FilterValue {
    fn parse(key: &str, value: &Value) -> Result<Self, AppError> {
        match value {
            Value::Object(obj) if obj.contains_key("from") || obj.contains_key("to") => Ok(FilterValue::Range {
                from: date_bound(key, obj.get("from"))?,
                to: date_bound(key, obj.get("to"))?,
            }),
            Value::Object(_) => Err(AppError::Validation(format!(
                "filter '{}' must be a scalar, a list, or a {{from, to}} range",
                key
            ))),
            Value::Array(items) => {
                if items.iter().any(|v| v.is_array() || v.is_object()) {
                    return Err(AppError::Validation(format!("filter '{}' list must hold scalars", key)));
                }
                Ok(FilterValue::List(items.clone()))
            }
            scalar => Ok(FilterValue::Scalar(scalar.clone())),
        }
    }
}

fn date_bound(key: &str, value: Option<&Value>) -> Result<Option<String>, AppError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(AppError::Validation(format!("date bound of '{}' must be a string", key))),
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum FilterEntry {
    Condition { key: FilterKey, value: FilterValue },
    /// Entries of a reserved `or` mapping; each one is OR-joined inside the group.
    OrGroup(Vec<FilterEntry>),
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct FilterTree {
    /// Root `from`/`to`, applied to the resource's timestamp column.
    pub from: Option<String>,
    pub to: Option<String>,
    /// `status = "trashed"`: only soft-deleted rows.
    pub trashed: bool,
    pub entries: Vec<FilterEntry>,
}

impl FilterTree {
    pub fn parse(value: &Value) -> Result<Self, AppError> {
        let obj = match value {
            Value::Null => return Ok(FilterTree::default()),
            Value::Object(obj) => obj,
            _ => return Err(AppError::Validation("filters must be an object".into())),
        };
        let mut tree = FilterTree {
            from: date_bound("from", obj.get("from"))?,
            to: date_bound("to", obj.get("to"))?,
            trashed: obj.get("status").and_then(Value::as_str) == Some("trashed"),
            entries: Vec::new(),
        };
        for (key, value) in obj {
            match key.as_str() {
                "from" | "to" => continue,
                "status" if tree.trashed => continue,
                _ => {}
            }
            tree.entries.push(parse_entry(key, value, false)?);
        }
        Ok(tree)
    }

    pub fn is_empty(&self) -> bool {
        self.from.is_none() && self.to.is_none() && !self.trashed && self.entries.is_empty()
    }
}

fn parse_entry(key: &str, value: &Value, in_group: bool) -> Result<FilterEntry, AppError> {
    let is_range = matches!(value, Value::Object(o) if o.contains_key("from") || o.contains_key("to"));
    if key == "or" && value.is_object() && !is_range {
        if in_group {
            return Err(AppError::Validation("nested 'or' groups are not supported".into()));
        }
        let mut entries = Vec::new();
        if let Value::Object(group) = value {
            for (k, v) in group {
                entries.push(parse_entry(k, v, true)?);
            }
        }
        return Ok(FilterEntry::OrGroup(entries));
    }
    Ok(FilterEntry::Condition {
        key: FilterKey::parse(key)?,
        value: FilterValue::parse(key, value)?,
    })
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CountConstraint {
    pub relation: String,
    pub comparator: CountComparator,
    pub count: i64,
    /// `or:relation` with a bare integer: disjoin with the previous count constraint.
    pub disjoin: bool,
}

impl CountConstraint {
    fn parse(key: &str, value: &Value) -> Result<Self, AppError> {
        let (relation, or_prefixed) = match key.strip_prefix("or:") {
            Some(r) => (r.to_string(), true),
            None => (key.to_string(), false),
        };
        if let Value::Object(obj) = value {
            // min, then max, then exact; the object form never disjoins.
            let (comparator, raw) = [
                ("min", CountComparator::Gte),
                ("max", CountComparator::Lte),
                ("exact", CountComparator::Eq),
            ]
            .into_iter()
            .find_map(|(k, cmp)| obj.get(k).filter(|v| !v.is_null()).map(|v| (cmp, v)))
            .ok_or_else(|| {
                AppError::Validation(format!("count '{}' needs one of min, max or exact", key))
            })?;
            return Ok(CountConstraint {
                relation,
                comparator,
                count: count_value(key, raw)?,
                disjoin: false,
            });
        }
        Ok(CountConstraint {
            relation,
            comparator: CountComparator::Gte,
            count: count_value(key, value)?,
            disjoin: or_prefixed,
        })
    }
}

fn count_value(key: &str, value: &Value) -> Result<i64, AppError> {
    let n = match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    n.filter(|n| *n >= 0)
        .ok_or_else(|| AppError::Validation(format!("count '{}' must be a non-negative integer", key)))
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sort {
    pub key: String,
    pub direction: SortDirection,
}

/// One listing request, validated.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParamBag {
    pub search: Option<String>,
    pub page: Option<u64>,
    /// Page size under the web flavor.
    pub limit: Option<u64>,
    /// Page size under the api flavor.
    pub per_page: Option<u64>,
    pub sort: Option<Sort>,
    pub filters: FilterTree,
    pub counts: Vec<CountConstraint>,
}

impl ParamBag {
    pub fn from_value(value: &Value) -> Result<Self, AppError> {
        let obj = match value {
            Value::Null => return Ok(ParamBag::default()),
            Value::Object(obj) => obj,
            _ => return Err(AppError::Validation("parameters must be an object".into())),
        };

        let search = match obj.get("search") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if s.chars().count() > MAX_SEARCH_LEN => {
                return Err(AppError::Validation(format!(
                    "search must be at most {} characters",
                    MAX_SEARCH_LEN
                )))
            }
            Some(Value::String(s)) => Some(s.clone()).filter(|s| !s.is_empty()),
            Some(_) => return Err(AppError::Validation("search must be a string".into())),
        };

        let counts = match obj.get("counts") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Object(c)) => c
                .iter()
                .map(|(k, v)| CountConstraint::parse(k, v))
                .collect::<Result<Vec<_>, _>>()?,
            Some(_) => return Err(AppError::Validation("counts must be an object".into())),
        };

        Ok(ParamBag {
            search,
            page: positive(obj, "page")?,
            limit: positive(obj, "limit")?,
            per_page: positive(obj, "per_page")?,
            sort: parse_sort(obj)?,
            filters: FilterTree::parse(obj.get("filters").unwrap_or(&Value::Null))?,
            counts,
        })
    }

    /// Page size per flavor (`per_page` for api, `limit` for web), default 10.
    pub fn page_size(&self, flavor: Flavor) -> u64 {
        match flavor {
            Flavor::Api => self.per_page,
            Flavor::Web => self.limit,
        }
        .unwrap_or(DEFAULT_PAGE_SIZE)
    }

    pub fn page_number(&self) -> u64 {
        self.page.unwrap_or(1)
    }
}

fn positive(obj: &Map<String, Value>, key: &str) -> Result<Option<u64>, AppError> {
    let n = match obj.get(key) {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) if s.is_empty() => return Ok(None),
        Some(Value::String(s)) => s.trim().parse::<u64>().ok(),
        Some(_) => None,
    };
    match n {
        Some(n) if n >= 1 => Ok(Some(n)),
        _ => Err(AppError::Validation(format!("{} must be an integer of at least 1", key))),
    }
}

fn parse_direction(raw: Option<&Value>) -> Result<SortDirection, AppError> {
    match raw {
        None | Some(Value::Null) => Ok(SortDirection::Desc),
        Some(Value::String(s)) if s.eq_ignore_ascii_case("asc") => Ok(SortDirection::Asc),
        Some(Value::String(s)) if s.eq_ignore_ascii_case("desc") => Ok(SortDirection::Desc),
        Some(_) => Err(AppError::Validation("sort direction must be asc or desc".into())),
    }
}

fn parse_sort(obj: &Map<String, Value>) -> Result<Option<Sort>, AppError> {
    match obj.get("sort") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(key)) if key.is_empty() => Ok(None),
        Some(Value::String(key)) => Ok(Some(Sort {
            key: key.clone(),
            direction: parse_direction(obj.get("order"))?,
        })),
        Some(Value::Object(s)) => match s.get("key") {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(key)) => Ok(Some(Sort {
                key: key.clone(),
                direction: parse_direction(s.get("value"))?,
            })),
            Some(_) => Err(AppError::Validation("sort key must be a string".into())),
        },
        Some(_) => Err(AppError::Validation("sort must be an object {key, value}".into())),
    }
}

/// Build a nested JSON bag from decoded query pairs in bracket notation
/// (`filters[author.country]=US`, `filters[not:category][]=1`, `sort[key]=name`).
/// A top-level `filters`, `counts` or `sort` whose value starts with `{` is read as JSON.
pub fn from_query_pairs(pairs: &[(String, String)]) -> Result<Value, AppError> {
    let mut root = Map::new();
    for (raw_key, raw_value) in pairs {
        let (head, path) = split_brackets(raw_key)?;
        let value = if path.is_empty()
            && matches!(head, "filters" | "counts" | "sort")
            && raw_value.trim_start().starts_with('{')
        {
            serde_json::from_str(raw_value)
                .map_err(|e| AppError::Validation(format!("{} is not valid JSON: {}", head, e)))?
        } else {
            Value::String(raw_value.clone())
        };
        insert_path(&mut root, head, &path, value)?;
    }
    Ok(Value::Object(root))
}

fn split_brackets(key: &str) -> Result<(&str, Vec<&str>), AppError> {
    let Some(open) = key.find('[') else {
        return Ok((key, Vec::new()));
    };
    let head = &key[..open];
    let mut path = Vec::new();
    let mut rest = &key[open..];
    while !rest.is_empty() {
        let inner = rest
            .strip_prefix('[')
            .and_then(|r| r.find(']').map(|close| (&r[..close], &r[close + 1..])));
        match inner {
            Some((segment, tail)) => {
                path.push(segment);
                rest = tail;
            }
            None => return Err(AppError::Validation(format!("malformed parameter key '{}'", key))),
        }
    }
    Ok((head, path))
}

fn insert_path(map: &mut Map<String, Value>, key: &str, path: &[&str], value: Value) -> Result<(), AppError> {
    let Some((next, rest)) = path.split_first() else {
        map.insert(key.to_string(), value);
        return Ok(());
    };
    if next.is_empty() {
        // key[] appends; anything deeper than a flat list is not supported.
        if !rest.is_empty() {
            return Err(AppError::Validation(format!("unsupported nesting under '{}[]'", key)));
        }
        let slot = map.entry(key.to_string()).or_insert_with(|| Value::Array(Vec::new()));
        match slot {
            Value::Array(items) => items.push(value),
            _ => return Err(AppError::Validation(format!("'{}' mixes list and scalar values", key))),
        }
        return Ok(());
    }
    let slot = map.entry(key.to_string()).or_insert_with(|| Value::Object(Map::new()));
    match slot {
        Value::Object(child) => insert_path(child, next, rest, value),
        _ => Err(AppError::Validation(format!("'{}' mixes object and scalar values", key))),
    }
}
