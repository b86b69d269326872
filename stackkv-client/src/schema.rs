//! # Index Schema and Query Arguments
//!
//! Purpose: Describe RediSearch field declarations, hash field values and
//! search options, and encode them as command arguments.
//!
//! ## Usage Notes
//!
//! - Field order is preserved; the server sees fields exactly as declared.
//! - A text weight of exactly `1.0` is the server default and is not sent.
//! - Encoders return owned argument lists so they can be checked without a
//!   server round trip.

use std::fmt;

/// Type of an indexed field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    /// Full-text field with an optional relevance weight.
    Text { weight: Option<f64> },
    /// Exact-match tag field with an optional separator (server default `,`).
    Tag { separator: Option<char> },
    /// Numeric range field.
    Numeric,
}

/// One field declaration of an index schema.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaField {
    name: String,
    kind: FieldKind,
    sortable: bool,
}

impl SchemaField {
    pub fn text(name: impl Into<String>) -> Self {
        Self::with_kind(name, FieldKind::Text { weight: None })
    }

    pub fn tag(name: impl Into<String>) -> Self {
        Self::with_kind(name, FieldKind::Tag { separator: None })
    }

    pub fn numeric(name: impl Into<String>) -> Self {
        Self::with_kind(name, FieldKind::Numeric)
    }

    fn with_kind(name: impl Into<String>, kind: FieldKind) -> Self {
        SchemaField {
            name: name.into(),
            kind,
            sortable: false,
        }
    }

    /// Sets the relevance weight. Ignored for non-text fields.
    pub fn weight(mut self, weight: f64) -> Self {
        if let FieldKind::Text { weight: slot } = &mut self.kind {
            *slot = Some(weight);
        }
        self
    }

    /// Sets the tag separator. Ignored for non-tag fields.
    pub fn separator(mut self, separator: char) -> Self {
        if let FieldKind::Tag { separator: slot } = &mut self.kind {
            *slot = Some(separator);
        }
        self
    }

    pub fn sortable(mut self) -> Self {
        self.sortable = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    /// Appends this field's `SCHEMA` arguments.
    pub fn write_args(&self, out: &mut Vec<String>) {
        out.push(self.name.clone());
        match &self.kind {
            FieldKind::Text { weight } => {
                out.push("TEXT".into());
                if let Some(weight) = weight.filter(|w| *w != 1.0) {
                    out.push("WEIGHT".into());
                    out.push(format_number(weight));
                }
            }
            FieldKind::Tag { separator } => {
                out.push("TAG".into());
                if let Some(separator) = separator {
                    out.push("SEPARATOR".into());
                    out.push(separator.to_string());
                }
            }
            FieldKind::Numeric => out.push("NUMERIC".into()),
        }
        if self.sortable {
            out.push("SORTABLE".into());
        }
    }
}

/// Arguments following `FT.CREATE`: the index is restricted to hash records
/// whose key starts with `prefix`.
pub fn create_index_args(name: &str, prefix: &str, schema: &[SchemaField]) -> Vec<String> {
    let mut args = vec![
        name.to_string(),
        "ON".into(),
        "HASH".into(),
        "PREFIX".into(),
        "1".into(),
        prefix.to_string(),
        "SCHEMA".into(),
    ];
    for field in schema {
        field.write_args(&mut args);
    }
    args
}

/// Value stored in a hash record field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    Number(f64),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(text) => f.write_str(text),
            FieldValue::Integer(number) => write!(f, "{number}"),
            FieldValue::Number(number) => f.write_str(&format_number(*number)),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Number(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

/// Options for a full-text query.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    text: String,
    with_scores: bool,
    offset: usize,
    limit: usize,
}

impl SearchQuery {
    /// Default page size used by the server.
    pub const DEFAULT_LIMIT: usize = 10;

    pub fn new(text: impl Into<String>) -> Self {
        SearchQuery {
            text: text.into(),
            with_scores: false,
            offset: 0,
            limit: Self::DEFAULT_LIMIT,
        }
    }

    /// Requests relevance scores with each hit.
    pub fn with_scores(mut self) -> Self {
        self.with_scores = true;
        self
    }

    pub fn paging(mut self, offset: usize, limit: usize) -> Self {
        self.offset = offset;
        self.limit = limit;
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn scores_requested(&self) -> bool {
        self.with_scores
    }

    /// Arguments following `FT.SEARCH`.
    pub fn to_args(&self, index: &str) -> Vec<String> {
        let mut args = vec![index.to_string(), self.text.clone()];
        if self.with_scores {
            args.push("WITHSCORES".into());
        }
        args.push("LIMIT".into());
        args.push(self.offset.to_string());
        args.push(self.limit.to_string());
        args
    }
}

// Whole numbers keep a trailing `.0` so the server still reads them as floats.
fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_args_restrict_to_hash_prefix() {
        let schema = [
            SchemaField::text("title").weight(5.0),
            SchemaField::text("content"),
            SchemaField::tag("tags"),
            SchemaField::numeric("doc_score"),
        ];
        let args = create_index_args("blog-idx", "blog:", &schema);
        assert_eq!(
            args,
            vec![
                "blog-idx", "ON", "HASH", "PREFIX", "1", "blog:", "SCHEMA", "title", "TEXT",
                "WEIGHT", "5.0", "content", "TEXT", "tags", "TAG", "doc_score", "NUMERIC",
            ]
        );
    }

    #[test]
    fn default_weight_is_not_sent() {
        let mut args = Vec::new();
        SchemaField::text("body").weight(1.0).write_args(&mut args);
        assert_eq!(args, vec!["body", "TEXT"]);
    }

    #[test]
    fn options_apply_only_to_matching_kinds() {
        let field = SchemaField::numeric("price").weight(3.0).separator('|');
        assert_eq!(field.kind(), &FieldKind::Numeric);

        let mut args = Vec::new();
        SchemaField::tag("tags").separator('|').sortable().write_args(&mut args);
        assert_eq!(args, vec!["tags", "TAG", "SEPARATOR", "|", "SORTABLE"]);
    }

    #[test]
    fn query_args_include_scores_and_paging() {
        let args = SearchQuery::new("Redis").with_scores().to_args("blog-idx");
        assert_eq!(args, vec!["blog-idx", "Redis", "WITHSCORES", "LIMIT", "0", "10"]);

        let args = SearchQuery::new("@tags:{redis}").paging(20, 5).to_args("blog-idx");
        assert_eq!(args, vec!["blog-idx", "@tags:{redis}", "LIMIT", "20", "5"]);
    }

    #[test]
    fn field_values_render_for_the_wire() {
        assert_eq!(FieldValue::from("Redis").to_string(), "Redis");
        assert_eq!(FieldValue::from(0.8).to_string(), "0.8");
        assert_eq!(FieldValue::from(5.0).to_string(), "5.0");
    }

    #[test]
    fn integer_field_values_keep_integer_form() {
        assert_eq!(FieldValue::from(3_i64), FieldValue::Integer(3));
        assert_eq!(FieldValue::from(3_i64).to_string(), "3");
        assert_eq!(FieldValue::from(-42_i64).to_string(), "-42");
    }
}
