use std::fmt;

use serde_json::Value;

use crate::types::HttpMethod;

/// Canonical identity of an outbound call: `METHOD|URL|sorted-query|body`.
///
/// Two calls with equal keys are considered interchangeable and may share a
/// single round trip.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey(String);

impl RequestKey {
    pub fn build<K, V>(
        method: HttpMethod,
        url: &str,
        body: Option<&Value>,
        query: Option<&[(K, V)]>,
    ) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let query = query.map(canonical_query).unwrap_or_default();
        let body = body.map(canonical_body).unwrap_or_default();
        RequestKey(format!("{}|{}|{}|{}", method.as_str(), url, query, body))
    }

    /// Key for the single post-refresh retry of this call. Retries never
    /// attach to a call that may still carry the expired token.
    pub fn retry(&self) -> Self {
        RequestKey(format!("{}|retry", self.0))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Percent-encoded `k=v` pairs sorted by key, then value, joined with `&`.
pub fn canonical_query<K, V>(pairs: &[(K, V)]) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut encoded: Vec<(String, String)> = pairs
        .iter()
        .map(|(k, v)| {
            (
                urlencoding::encode(k.as_ref()).into_owned(),
                urlencoding::encode(v.as_ref()).into_owned(),
            )
        })
        .collect();
    encoded.sort();
    encoded
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

/// Compact JSON with object entries sorted by key at every depth, whatever
/// ordering the map type keeps.
pub fn canonical_body(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(item, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}
