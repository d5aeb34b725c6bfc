//! Rendering of [`QueryRequest`]s as Weaviate GraphQL `Get` queries, and
//! decoding of the responses.

use std::fmt::Write as _;

use serde_json::Value;

use crate::error::{Result, WeaviateError};
use crate::service::{ADDITIONAL_KEY, QueryRequest, ResultRecord, SearchMode};

/// Filter keys whose string values are GraphQL enum literals, not strings.
const ENUM_KEYS: &[&str] = &["operator"];

/// Render a request as a GraphQL document.
///
/// ```rust
/// use adk_weaviate::graphql::render_query;
/// use adk_weaviate::{QueryRequest, SearchMode};
///
/// let request = QueryRequest {
///     index: "Docs".into(),
///     properties: vec!["text".into()],
///     search: SearchMode::NearVector(vec![1.0, 0.5]),
///     limit: 2,
///     filter: None,
///     tenant: None,
///     additional: vec!["distance".into()],
/// };
/// assert_eq!(
///     render_query(&request),
///     "{ Get { Docs(nearVector: {vector: [1, 0.5]}, limit: 2) \
///      { text _additional { distance } } } }"
/// );
/// ```
pub fn render_query(request: &QueryRequest) -> String {
    let mut args = Vec::new();
    match &request.search {
        SearchMode::NearVector(vector) => {
            args.push(format!("nearVector: {{vector: {}}}", render_vector(vector)));
        }
        SearchMode::NearText(text) => {
            args.push(format!("nearText: {{concepts: [{}]}}", render_string(text)));
        }
        SearchMode::Hybrid(hybrid) => {
            let mut fields = vec![format!("query: {}", render_string(&hybrid.query))];
            if let Some(alpha) = hybrid.alpha {
                fields.push(format!("alpha: {alpha}"));
            }
            if let Some(vector) = &hybrid.vector {
                fields.push(format!("vector: {}", render_vector(vector)));
            }
            if !hybrid.properties.is_empty() {
                let properties: Vec<String> =
                    hybrid.properties.iter().map(|p| render_string(p)).collect();
                fields.push(format!("properties: [{}]", properties.join(", ")));
            }
            if let Some(fusion_type) = hybrid.fusion_type {
                fields.push(format!("fusionType: {}", fusion_type.as_str()));
            }
            args.push(format!("hybrid: {{{}}}", fields.join(", ")));
        }
    }
    args.push(format!("limit: {}", request.limit));
    if let Some(filter) = &request.filter {
        args.push(format!("where: {}", render_value(filter, None)));
    }
    if let Some(tenant) = &request.tenant {
        args.push(format!("tenant: {}", render_string(tenant)));
    }

    let mut selection = request.properties.join(" ");
    if !request.additional.is_empty() {
        let _ = write!(selection, " {ADDITIONAL_KEY} {{ {} }}", request.additional.join(" "));
    }

    format!("{{ Get {{ {}({}) {{ {} }} }} }}", request.index, args.join(", "), selection)
}

/// Extract the hits for `index` from a GraphQL response body.
///
/// # Errors
///
/// Returns [`WeaviateError::ServiceError`] if the body carries `errors` or
/// lacks `data.Get.<index>`.
pub fn parse_get_response(index: &str, body: Value) -> Result<Vec<ResultRecord>> {
    if let Some(errors) = body.get("errors").filter(|e| !e.is_null()) {
        return Err(WeaviateError::service("query", errors.to_string()));
    }
    let hits = body
        .get("data")
        .and_then(|d| d.get("Get"))
        .and_then(|g| g.get(index))
        .ok_or_else(|| {
            WeaviateError::service("query", format!("response has no data.Get.{index}: {body}"))
        })?;
    match hits {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Object(record) => Ok(record.clone()),
                other => Err(WeaviateError::service("query", format!("unexpected hit: {other}"))),
            })
            .collect(),
        other => Err(WeaviateError::service("query", format!("unexpected hits: {other}"))),
    }
}

fn render_vector(vector: &[f32]) -> String {
    let parts: Vec<String> = vector.iter().map(f32::to_string).collect();
    format!("[{}]", parts.join(", "))
}

fn render_string(s: &str) -> String {
    // JSON string escaping is valid GraphQL string escaping.
    Value::String(s.to_string()).to_string()
}

/// Render JSON as a GraphQL input value. `key` is the field holding `value`.
fn render_value(value: &Value, key: Option<&str>) -> String {
    match value {
        Value::Object(map) => {
            let fields: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("{k}: {}", render_value(v, Some(k))))
                .collect();
            format!("{{{}}}", fields.join(", "))
        }
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(|v| render_value(v, None)).collect();
            format!("[{}]", items.join(", "))
        }
        Value::String(s) if key.is_some_and(|k| ENUM_KEYS.contains(&k)) && is_enum_literal(s) => {
            s.clone()
        }
        other => other.to_string(),
    }
}

fn is_enum_literal(s: &str) -> bool {
    let mut chars = s.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
