//! Structured scene description extracted from a generated clip.
//!
//! The frontend feeds this back as global context for the next shot, so
//! characters and setting stay consistent across a storyboard.

use serde::{Deserialize, Serialize};

/// Asks the analysis model for a JSON scene description of a clip.
pub const SCENE_CONTEXT_PROMPT: &str = r#"Extract structured scene information from this video.
Return ONLY JSON in exactly this shape:
{
  "entities": [
    { "id": "id-1", "description": "...", "appearance": "..." }
  ],
  "environment": "...",
  "style": "..."
}"#;

/// A character or object that recurs across shots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneEntity {
    pub id: String,
    pub description: String,
    pub appearance: String,
}

/// Entities, setting and visual style of a clip.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneContext {
    pub entities: Vec<SceneEntity>,
    pub environment: String,
    pub style: String,
}

/// Parse a model reply into a [`SceneContext`].
///
/// Tolerates a surrounding Markdown code fence.
pub fn parse_scene_context(reply: &str) -> Result<SceneContext, serde_json::Error> {
    serde_json::from_str(strip_code_fence(reply))
}

fn strip_code_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(body) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the language tag line, e.g. ```json
    let body = body.split_once('\n').map_or("", |(_, rest)| rest);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_json() {
        let scene = parse_scene_context(
            r#"{"entities":[{"id":"id-1","description":"a fox","appearance":"orange"}],
                "environment":"snowy forest","style":"watercolor"}"#,
        )
        .unwrap();
        assert_eq!(scene.entities.len(), 1);
        assert_eq!(scene.entities[0].description, "a fox");
        assert_eq!(scene.environment, "snowy forest");
        assert_eq!(scene.style, "watercolor");
    }

    #[test]
    fn test_parse_fenced_json() {
        let scene = parse_scene_context("```json\n{\"environment\": \"desert\"}\n```\n").unwrap();
        assert_eq!(scene.environment, "desert");
        assert!(scene.entities.is_empty());
    }

    #[test]
    fn test_parse_rejects_prose() {
        assert!(parse_scene_context("The video shows a fox in the snow.").is_err());
    }

    #[test]
    fn test_serializes_original_shape() {
        let json = serde_json::to_value(SceneContext::default()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"entities": [], "environment": "", "style": ""})
        );
    }
}
