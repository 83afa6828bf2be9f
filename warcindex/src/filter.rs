//! Selecting index entries by the values of their fields.
//!
//! A filter is written as `[!][=|~]field:value`:
//!
//!  * `mct:html` matches entries whose `mct` contains `html`
//!  * `=type:response` matches entries whose `type` is exactly `response`
//!  * `~uri:^https://` matches entries whose `uri` matches the regular expression `^https://`
//!  * a leading `!` inverts any of the above
//!
//! Field names are those of [`CdxEntry::FIELDS`]. A field that is absent from an entry never
//! matches, so a negated filter on it always does.
use std::fmt;

use regex::Regex;
use thiserror::Error;

use crate::entry::CdxEntry;

#[derive(Debug, Error)]
pub enum FilterParseError {
    #[error("filter expression is empty")]
    Empty,
    #[error("filter {0:?} has no ':' between field name and value")]
    MissingSeparator(String),
    #[error("filter {0:?} has no field name")]
    EmptyField(String),
    #[error("filter {expr:?} has an invalid regular expression: {source}")]
    Regex {
        expr: String,
        #[source]
        source: regex::Error,
    },
}

#[derive(Debug, Clone)]
enum Operator {
    Contains(String),
    Exact(String),
    Regex(Regex),
}

/// A predicate on one field of an entry.
#[derive(Debug, Clone)]
pub struct Filter {
    field: String,
    op: Operator,
    negated: bool,
}

impl Filter {
    pub fn parse(expr: &str) -> Result<Filter, FilterParseError> {
        let (negated, rest) = match expr.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, expr),
        };
        if rest.is_empty() {
            return Err(FilterParseError::Empty);
        }

        let (kind, rest) = if let Some(rest) = rest.strip_prefix('=') {
            ('=', rest)
        } else if let Some(rest) = rest.strip_prefix('~') {
            ('~', rest)
        } else {
            (':', rest)
        };

        let (field, value) = rest
            .split_once(':')
            .ok_or_else(|| FilterParseError::MissingSeparator(expr.to_owned()))?;
        if field.is_empty() {
            return Err(FilterParseError::EmptyField(expr.to_owned()));
        }
        let op = match kind {
            '=' => Operator::Exact(value.to_owned()),
            '~' => Operator::Regex(Regex::new(value).map_err(|source| {
                FilterParseError::Regex {
                    expr: expr.to_owned(),
                    source,
                }
            })?),
            _ => Operator::Contains(value.to_owned()),
        };

        Ok(Filter {
            field: field.to_owned(),
            op,
            negated,
        })
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn is_negated(&self) -> bool {
        self.negated
    }

    /// Determine whether `entry` passes this filter.
    pub fn matches(&self, entry: &CdxEntry) -> bool {
        let hit = match entry.field(&self.field) {
            None => false,
            Some(value) => match self.op {
                Operator::Contains(ref needle) => value.contains(needle.as_str()),
                Operator::Exact(ref expected) => value == expected.as_str(),
                Operator::Regex(ref re) => re.is_match(&value),
            },
        };
        hit != self.negated
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negated {
            f.write_str("!")?;
        }
        match self.op {
            Operator::Contains(ref v) => write!(f, "{}:{}", self.field, v),
            Operator::Exact(ref v) => write!(f, "={}:{}", self.field, v),
            Operator::Regex(ref re) => write!(f, "~{}:{}", self.field, re.as_str()),
        }
    }
}

/// The conjunction of any number of filters.
///
/// An empty set accepts every entry.
#[derive(Debug, Clone, Default)]
pub struct FilterSet(Vec<Filter>);

impl FilterSet {
    pub fn parse<I, S>(exprs: I) -> Result<FilterSet, FilterParseError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let filters = exprs
            .into_iter()
            .map(|expr| Filter::parse(expr.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        for filter in &filters {
            if !CdxEntry::FIELDS.iter().any(|(name, _)| *name == filter.field) {
                warn!(
                    "Filter {} names unknown field {:?} and will treat it as absent",
                    filter, filter.field
                );
            }
        }
        Ok(FilterSet(filters))
    }

    /// Determine whether `entry` passes every filter in the set.
    pub fn eval(&self, entry: &CdxEntry) -> bool {
        self.0.iter().all(|filter| filter.matches(entry))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn filters(&self) -> &[Filter] {
        &self.0
    }
}

impl From<Vec<Filter>> for FilterSet {
    fn from(filters: Vec<Filter>) -> Self {
        FilterSet(filters)
    }
}
