use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use url::Url;

/// Owner name to reach fraction, decoded from the `owner_reach` column.
///
/// Entries keep the order in which the decoder yields them (sorted by owner
/// name), so anything built on top is deterministic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OwnerReach {
    entries: Vec<(String, f64)>,
}

impl OwnerReach {
    /// Decode the encoded mapping. Never fails: text that is not a JSON
    /// object gives an empty value, and entries whose value is not a number
    /// are skipped.
    pub fn parse(text: &str) -> Self {
        let map = match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(map)) => map,
            Ok(other) => {
                debug!(kind = json_kind(&other), "owner_reach is not an object");
                return Self::default();
            }
            Err(err) => {
                debug!(error = %err, "owner_reach is not valid JSON");
                return Self::default();
            }
        };

        let entries = map
            .into_iter()
            .filter_map(|(owner, value)| match value.as_f64() {
                Some(fraction) if fraction.is_finite() => Some((owner, fraction)),
                _ => {
                    debug!(%owner, "skipping owner_reach entry without a numeric value");
                    None
                }
            })
            .collect();

        Self { entries }
    }

    pub fn from_field(text: Option<&str>) -> Self {
        text.map(Self::parse).unwrap_or_default()
    }

    pub fn entries(&self) -> &[(String, f64)] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub feed: String,
    #[serde(default, alias = "link")]
    pub url: Option<String>,
}

impl Article {
    /// The article URL when it is safe to hyperlink (absolute http or https).
    pub fn href(&self) -> Option<&str> {
        let raw = self.url.as_deref()?.trim();
        let parsed = Url::parse(raw).ok()?;
        matches!(parsed.scheme(), "http" | "https").then_some(raw)
    }
}

/// Articles decoded from the `articles` column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArticleList {
    articles: Vec<Article>,
}

impl ArticleList {
    pub fn parse(text: &str) -> Self {
        match serde_json::from_str::<Vec<Article>>(text) {
            Ok(articles) => Self { articles },
            Err(err) => {
                debug!(error = %err, "articles field could not be decoded");
                Self::default()
            }
        }
    }

    pub fn from_field(text: Option<&str>) -> Self {
        text.map(Self::parse).unwrap_or_default()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Article> {
        self.articles.iter()
    }

    pub fn len(&self) -> usize {
        self.articles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.articles.is_empty()
    }
}

impl<'a> IntoIterator for &'a ArticleList {
    type Item = &'a Article;
    type IntoIter = std::slice::Iter<'a, Article>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
