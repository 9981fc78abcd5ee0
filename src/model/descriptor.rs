//! Query descriptors
//!
//! Inert descriptions of filtering, sorting and grouping. They are only
//! interpreted by the clause builder, which drops anything it cannot honor.

use serde_json::Value;

/// Restrict a read to rows whose `property` matches `value`.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterDescriptor {
    pub property: String,
    pub value: Value,
    /// Match the whole text instead of a substring
    pub exact_match: bool,
    pub case_sensitive: bool,
    /// Comparison operator used verbatim instead of `LIKE`/`=`
    pub operator: Option<String>,
}

impl FilterDescriptor {
    /// Substring, case-insensitive filter
    pub fn new(property: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            property: property.into(),
            value: value.into(),
            exact_match: false,
            case_sensitive: false,
            operator: None,
        }
    }

    pub fn exact(mut self) -> Self {
        self.exact_match = true;
        self
    }

    pub fn case_sensitive(mut self) -> Self {
        self.case_sensitive = true;
        self
    }

    pub fn with_operator(mut self, operator: impl Into<String>) -> Self {
        self.operator = Some(operator.into());
        self
    }
}

/// Sort direction accepted by the clause builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    /// Parse a direction. Only the exact strings `ASC` and `DESC` are accepted.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ASC" => Some(SortDirection::Asc),
            "DESC" => Some(SortDirection::Desc),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// Order a read by `property`.
#[derive(Debug, Clone, PartialEq)]
pub struct SorterDescriptor {
    pub property: String,
    /// Raw direction; anything but `ASC`/`DESC` makes the sorter inert
    pub direction: String,
    /// Nested-data root; sorters with a root are not supported by SQL
    pub root: Option<String>,
}

impl SorterDescriptor {
    pub fn new(property: impl Into<String>, direction: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            direction: direction.into(),
            root: None,
        }
    }

    pub fn asc(property: impl Into<String>) -> Self {
        Self::new(property, SortDirection::Asc.as_str())
    }

    pub fn desc(property: impl Into<String>) -> Self {
        Self::new(property, SortDirection::Desc.as_str())
    }

    pub fn with_root(mut self, root: impl Into<String>) -> Self {
        self.root = Some(root.into());
        self
    }
}

/// Group a read by `property`.
#[derive(Debug, Clone, PartialEq)]
pub struct GrouperDescriptor {
    pub property: String,
    pub root: Option<String>,
}

impl GrouperDescriptor {
    pub fn new(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            root: None,
        }
    }

    pub fn with_root(mut self, root: impl Into<String>) -> Self {
        self.root = Some(root.into());
        self
    }
}

impl From<&str> for GrouperDescriptor {
    fn from(property: &str) -> Self {
        Self::new(property)
    }
}
