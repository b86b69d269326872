//! # Reply Decoding
//!
//! Purpose: Turn the loosely-typed replies of `INFO`, `MODULE LIST` and
//! `FT.SEARCH` into small owned structs.
//!
//! ## Design Principles
//! 1. **State-Free Decoding**: every decoder is a pure function of one reply.
//! 2. **Fail Fast**: a reply with the wrong shape is rejected, never guessed at.
//! 3. **Binary-Tolerant**: bulk strings are decoded lossily as UTF-8.

use std::collections::BTreeMap;

use redis::Value;
use serde::Serialize;

use crate::error::{StoreError, StoreResult};

/// `INFO` fields keyed by name, section headers dropped.
pub type ServerInfo = BTreeMap<String, String>;

/// One entry of `MODULE LIST`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleInfo {
    pub name: String,
    pub version: String,
}

/// Decoded `FT.SEARCH` reply.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct SearchResults {
    /// Total number of matches, which may exceed `docs.len()` when paged.
    pub total: u64,
    pub docs: Vec<SearchDocument>,
}

/// One matched hash record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchDocument {
    /// Key of the matched record.
    pub id: String,
    /// Relevance score, present when the query asked for scores.
    pub score: Option<f64>,
    /// Field/value pairs in reply order.
    pub fields: Vec<(String, String)>,
}

impl SearchDocument {
    /// Returns the value of a returned field.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Parses the text body of an `INFO` reply.
pub fn parse_info(raw: &str) -> ServerInfo {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once(':'))
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

/// Decodes a `MODULE LIST` reply.
///
/// RESP2 servers send each module as a flat `[k, v, k, v, ...]` array; RESP3
/// servers send a map. Both are accepted.
pub fn parse_module_list(value: &Value) -> StoreResult<Vec<ModuleInfo>> {
    const COMMAND: &str = "MODULE LIST";

    let entries = match value {
        Value::Array(entries) | Value::Set(entries) => entries,
        Value::Nil => return Ok(Vec::new()),
        _ => return Err(StoreError::UnexpectedResponse { command: COMMAND }),
    };

    entries
        .iter()
        .map(|entry| -> StoreResult<ModuleInfo> {
            let pairs = pairs(entry).ok_or(StoreError::UnexpectedResponse { command: COMMAND })?;
            let mut name = None;
            let mut version = None;
            for (key, value) in pairs {
                match text(key).as_deref() {
                    Some("name") => name = text(value),
                    Some("ver") => version = text(value),
                    _ => {}
                }
            }
            Ok(ModuleInfo {
                name: name.ok_or(StoreError::UnexpectedResponse { command: COMMAND })?,
                version: version.unwrap_or_else(|| "unknown".to_string()),
            })
        })
        .collect()
}

/// Decodes an `FT.SEARCH` reply.
///
/// Layout: `[total, id, (score)?, [field, value, ...], id, ...]`. `with_scores`
/// must match the flag the query was sent with.
pub fn parse_search(value: &Value, with_scores: bool) -> StoreResult<SearchResults> {
    const COMMAND: &str = "FT.SEARCH";
    let unexpected = || StoreError::UnexpectedResponse { command: COMMAND };

    let items = match value {
        Value::Array(items) => items,
        _ => return Err(unexpected()),
    };

    let mut iter = items.iter();
    let total = match iter.next() {
        Some(Value::Int(total)) if *total >= 0 => *total as u64,
        _ => return Err(unexpected()),
    };

    let mut docs = Vec::new();
    while let Some(id) = iter.next() {
        let id = text(id).ok_or_else(unexpected)?;
        let score = if with_scores {
            let raw = iter.next().ok_or_else(unexpected)?;
            Some(number(raw).ok_or_else(unexpected)?)
        } else {
            None
        };
        let fields = match iter.next() {
            Some(Value::Nil) | None => Vec::new(),
            Some(raw) => pairs(raw)
                .ok_or_else(unexpected)?
                .into_iter()
                .map(|(key, value)| Some((text(key)?, text(value)?)))
                .collect::<Option<Vec<_>>>()
                .ok_or_else(unexpected)?,
        };
        docs.push(SearchDocument { id, score, fields });
    }

    Ok(SearchResults { total, docs })
}

/// True for a `+OK` status reply.
pub fn is_ok(value: &Value) -> bool {
    match value {
        Value::Okay => true,
        Value::SimpleString(status) => status.eq_ignore_ascii_case("OK"),
        _ => false,
    }
}

fn pairs(value: &Value) -> Option<Vec<(&Value, &Value)>> {
    match value {
        Value::Array(items) if items.len() % 2 == 0 => Some(
            items
                .chunks_exact(2)
                .map(|pair| (&pair[0], &pair[1]))
                .collect(),
        ),
        Value::Map(entries) => Some(entries.iter().map(|(k, v)| (k, v)).collect()),
        _ => None,
    }
}

fn text(value: &Value) -> Option<String> {
    match value {
        Value::BulkString(data) => Some(String::from_utf8_lossy(data).into_owned()),
        Value::SimpleString(text) => Some(text.clone()),
        Value::Int(number) => Some(number.to_string()),
        Value::Double(number) => Some(number.to_string()),
        Value::Okay => Some("OK".to_string()),
        _ => None,
    }
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Double(number) => Some(*number),
        Value::Int(number) => Some(*number as f64),
        _ => text(value)?.trim().parse().ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bulk(text: &str) -> Value {
        Value::BulkString(text.as_bytes().to_vec())
    }

    #[test]
    fn info_skips_sections_and_blank_lines() {
        let raw = "# Server\r\nredis_version:7.2.4\r\nredis_mode:standalone\r\n\r\n# Clients\r\nconnected_clients:3\r\n";
        let info = parse_info(raw);
        assert_eq!(info.get("redis_version").map(String::as_str), Some("7.2.4"));
        assert_eq!(info.get("connected_clients").map(String::as_str), Some("3"));
        assert_eq!(info.len(), 3);
    }

    #[test]
    fn info_keeps_colons_inside_values() {
        let info = parse_info("executable:/opt/redis:stack/bin/redis-server\n");
        assert_eq!(
            info.get("executable").map(String::as_str),
            Some("/opt/redis:stack/bin/redis-server")
        );
    }

    #[test]
    fn module_list_resp2_layout() {
        let reply = Value::Array(vec![
            Value::Array(vec![
                bulk("name"),
                bulk("search"),
                bulk("ver"),
                Value::Int(20811),
                bulk("path"),
                bulk("/opt/redis-stack/lib/redisearch.so"),
                bulk("args"),
                Value::Array(vec![]),
            ]),
            Value::Array(vec![bulk("name"), bulk("ReJSON"), bulk("ver"), Value::Int(20606)]),
        ]);
        let modules = parse_module_list(&reply).unwrap();
        assert_eq!(
            modules,
            vec![
                ModuleInfo {
                    name: "search".into(),
                    version: "20811".into()
                },
                ModuleInfo {
                    name: "ReJSON".into(),
                    version: "20606".into()
                },
            ]
        );
    }

    #[test]
    fn module_list_resp3_map_layout() {
        let reply = Value::Array(vec![Value::Map(vec![
            (bulk("name"), bulk("timeseries")),
            (bulk("ver"), Value::Int(11011)),
        ])]);
        let modules = parse_module_list(&reply).unwrap();
        assert_eq!(modules[0].name, "timeseries");
        assert_eq!(modules[0].version, "11011");
    }

    #[test]
    fn module_list_rejects_nameless_entry() {
        let reply = Value::Array(vec![Value::Array(vec![bulk("ver"), Value::Int(1)])]);
        assert!(matches!(
            parse_module_list(&reply),
            Err(StoreError::UnexpectedResponse { command: "MODULE LIST" })
        ));
    }

    #[test]
    fn search_with_scores() {
        let reply = Value::Array(vec![
            Value::Int(2),
            bulk("blog:1"),
            bulk("1.5"),
            Value::Array(vec![bulk("title"), bulk("Redis Tutorial"), bulk("doc_score"), bulk("0.9")]),
            bulk("blog:2"),
            bulk("0.75"),
            Value::Array(vec![bulk("title"), bulk("Python Guide")]),
        ]);
        let results = parse_search(&reply, true).unwrap();
        assert_eq!(results.total, 2);
        assert_eq!(results.docs.len(), 2);
        assert_eq!(results.docs[0].id, "blog:1");
        assert_eq!(results.docs[0].score, Some(1.5));
        assert_eq!(results.docs[0].field("title"), Some("Redis Tutorial"));
        assert_eq!(results.docs[0].field("doc_score"), Some("0.9"));
        assert_eq!(results.docs[1].score, Some(0.75));
        assert_eq!(results.docs[1].field("missing"), None);
    }

    #[test]
    fn search_without_scores() {
        let reply = Value::Array(vec![
            Value::Int(1),
            bulk("blog:3"),
            Value::Array(vec![bulk("title"), bulk("Database Design")]),
        ]);
        let results = parse_search(&reply, false).unwrap();
        assert_eq!(results.total, 1);
        assert_eq!(results.docs[0].score, None);
        assert_eq!(results.docs[0].field("title"), Some("Database Design"));
    }

    #[test]
    fn search_total_can_exceed_page() {
        let reply = Value::Array(vec![Value::Int(42)]);
        let results = parse_search(&reply, true).unwrap();
        assert_eq!(results.total, 42);
        assert!(results.docs.is_empty());
    }

    #[test]
    fn search_rejects_truncated_reply() {
        let reply = Value::Array(vec![Value::Int(1), bulk("blog:1")]);
        assert!(parse_search(&reply, true).is_err());
        assert!(parse_search(&Value::Okay, false).is_err());
    }

    #[test]
    fn ok_status_forms() {
        assert!(is_ok(&Value::Okay));
        assert!(is_ok(&Value::SimpleString("OK".into())));
        assert!(!is_ok(&Value::Nil));
        assert!(!is_ok(&Value::Int(1)));
    }
}
