//! Model naming and listing.
//!
//! | Item | Description |
//! |------|-------------|
//! | [`AliasResolver`] | Display alias ↔ canonical id maps |
//! | [`AliasTarget`] | Scalar id or set of interchangeable ids |
//! | [`ModelEntry`] | One row of a model listing |

pub mod alias;

pub use alias::{AliasResolver, AliasTable, AliasTarget};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// What a listed model generates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    #[default]
    Chat,
    Image,
}

impl ModelKind {
    fn from_raw(entry: &Value) -> Self {
        let declared = entry
            .get("type")
            .or_else(|| entry.get("model_type"))
            .and_then(Value::as_str);
        match declared {
            Some(t) if t.eq_ignore_ascii_case("image") => ModelKind::Image,
            Some(_) => ModelKind::Chat,
            None => {
                let image = entry
                    .get("image")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                if image {
                    ModelKind::Image
                } else {
                    ModelKind::Chat
                }
            }
        }
    }
}

/// One listed model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelEntry {
    /// Display id shown to users.
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ModelKind,
    /// Provider canonical id.
    pub model: String,
}

/// Extract listing rows from a provider body.
///
/// Accepts `{"data": [...]}` (OpenAI style), `{"models": [...]}` (Gemini style) or a bare
/// array. Rows without any id are skipped. A row without a display id gets one from
/// `display_for(canonical)`.
pub fn parse_model_listing(
    body: &Value,
    display_for: impl Fn(&str) -> String,
) -> Vec<ModelEntry> {
    let rows = body
        .get("data")
        .or_else(|| body.get("models"))
        .unwrap_or(body)
        .as_array()
        .map(Vec::as_slice)
        .unwrap_or(&[]);

    rows.iter()
        .filter_map(|row| {
            let canonical = row
                .get("id")
                .or_else(|| row.get("name"))
                .or_else(|| row.get("model"))
                .and_then(Value::as_str);
            let Some(canonical) = canonical else {
                debug!(row = %row, "skipping model entry without id");
                return None;
            };

            let id = row
                .get("display_id")
                .or_else(|| row.get("alias"))
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| display_for(canonical));

            Some(ModelEntry {
                id,
                kind: ModelKind::from_raw(row),
                model: canonical.to_string(),
            })
        })
        .collect()
}
