//! Comparison functions, sort directions, and the numeric value rules shared
//! by cell validation and the row-query compiler.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A typed cell comparison attached to a filter.
///
/// Ordering comparisons (`GreaterThan` and friends) compare numerically on
/// `NUMBER` columns and lexicographically (case-insensitive) on `TEXT`
/// columns. `IsEmpty`/`IsNotEmpty` test for the absence or presence of a
/// value and carry no comparison value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComparisonFunction {
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
    GreaterThanOrEqual,
    LessThanOrEqual,
    Contains,
    NotContains,
    IsEmpty,
    IsNotEmpty,
}

impl ComparisonFunction {
    pub const ALL: [ComparisonFunction; 10] = [
        ComparisonFunction::Equals,
        ComparisonFunction::NotEquals,
        ComparisonFunction::GreaterThan,
        ComparisonFunction::LessThan,
        ComparisonFunction::GreaterThanOrEqual,
        ComparisonFunction::LessThanOrEqual,
        ComparisonFunction::Contains,
        ComparisonFunction::NotContains,
        ComparisonFunction::IsEmpty,
        ComparisonFunction::IsNotEmpty,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ComparisonFunction::Equals => "EQUALS",
            ComparisonFunction::NotEquals => "NOT_EQUALS",
            ComparisonFunction::GreaterThan => "GREATER_THAN",
            ComparisonFunction::LessThan => "LESS_THAN",
            ComparisonFunction::GreaterThanOrEqual => "GREATER_THAN_OR_EQUAL",
            ComparisonFunction::LessThanOrEqual => "LESS_THAN_OR_EQUAL",
            ComparisonFunction::Contains => "CONTAINS",
            ComparisonFunction::NotContains => "NOT_CONTAINS",
            ComparisonFunction::IsEmpty => "IS_EMPTY",
            ComparisonFunction::IsNotEmpty => "IS_NOT_EMPTY",
        }
    }

    /// Whether the function needs a comparison value to evaluate.
    /// `IsEmpty` and `IsNotEmpty` are the only value-less functions.
    pub fn requires_value(self) -> bool {
        !matches!(
            self,
            ComparisonFunction::IsEmpty | ComparisonFunction::IsNotEmpty
        )
    }

    /// The four ordering comparisons, which cast `NUMBER` cells numerically.
    pub fn is_ordering(self) -> bool {
        matches!(
            self,
            ComparisonFunction::GreaterThan
                | ComparisonFunction::LessThan
                | ComparisonFunction::GreaterThanOrEqual
                | ComparisonFunction::LessThanOrEqual
        )
    }
}

impl fmt::Display for ComparisonFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown comparison function: {0}")]
pub struct UnknownComparisonFunction(pub String);

impl FromStr for ComparisonFunction {
    type Err = UnknownComparisonFunction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "EQUALS" => Ok(ComparisonFunction::Equals),
            "NOT_EQUALS" => Ok(ComparisonFunction::NotEquals),
            "GREATER_THAN" => Ok(ComparisonFunction::GreaterThan),
            "LESS_THAN" => Ok(ComparisonFunction::LessThan),
            "GREATER_THAN_OR_EQUAL" => Ok(ComparisonFunction::GreaterThanOrEqual),
            "LESS_THAN_OR_EQUAL" => Ok(ComparisonFunction::LessThanOrEqual),
            "CONTAINS" => Ok(ComparisonFunction::Contains),
            "NOT_CONTAINS" => Ok(ComparisonFunction::NotContains),
            "IS_EMPTY" => Ok(ComparisonFunction::IsEmpty),
            "IS_NOT_EMPTY" => Ok(ComparisonFunction::IsNotEmpty),
            other => Err(UnknownComparisonFunction(other.to_string())),
        }
    }
}

/// Direction of a sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }

    pub fn reversed(self) -> SortDirection {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown sort direction: {0}")]
pub struct UnknownSortDirection(pub String);

impl FromStr for SortDirection {
    type Err = UnknownSortDirection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ASC" => Ok(SortDirection::Asc),
            "DESC" => Ok(SortDirection::Desc),
            other => Err(UnknownSortDirection(other.to_string())),
        }
    }
}

/// How multiple filters combine into one row predicate.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterJoin {
    /// At least one filter must match (logical OR).
    #[default]
    Any,
    /// All filters must match (logical AND).
    All,
}

/// Error for a value that cannot be stored in a `NUMBER` column.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("not a numeric value: {0:?}")]
pub struct NumberParseError(pub String);

/// Canonicalizes a value written to a `NUMBER` column.
///
/// The value is trimmed and round-tripped through `f64` so equivalent
/// spellings share a single stored rendering (`"007"` becomes `"7"`,
/// `"3.50"` becomes `"3.5"`). An empty or whitespace-only input
/// canonicalizes to the empty string, never to `"0"`. Non-finite values are
/// rejected along with everything else `f64` cannot parse.
pub fn canonicalize_number(value: &str) -> Result<String, NumberParseError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(String::new());
    }
    let parsed: f64 = trimmed
        .parse()
        .map_err(|_| NumberParseError(value.to_string()))?;
    if !parsed.is_finite() {
        return Err(NumberParseError(value.to_string()));
    }
    // Fold negative zero so "0" and "-0" share one rendering.
    let parsed = if parsed == 0.0 { 0.0 } else { parsed };
    Ok(parsed.to_string())
}

/// True when `value` is storable in a `NUMBER` column: empty, or a finite
/// `f64`. Used by the column type-change guard, which inspects values that
/// were written while the column was still `TEXT`.
pub fn is_number_value(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.is_empty() || trimmed.parse::<f64>().map_or(false, f64::is_finite)
}
