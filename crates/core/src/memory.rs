//! Memory bank: the durable structured belief state.
//!
//! The bank holds the bot's own persona, what it knows about each user,
//! the current conversation context, and two rolling narrative summaries.
//! The schema is closed: unknown keys are rejected at every nesting level.
//!
//! Persistence is abstracted behind [`DocumentBackend`], a get-by-key /
//! put-by-key store for a single opaque JSON document.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::MemoryError;

/// What the bot believes about itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BotIdentity {
    #[serde(default)]
    pub personality_traits: Vec<String>,
    #[serde(default)]
    pub beliefs: Vec<String>,
    #[serde(default)]
    pub background_facts: Vec<String>,
    #[serde(default)]
    pub preferences: Vec<String>,
    #[serde(default)]
    pub mood_notes: Vec<String>,
}

impl BotIdentity {
    fn is_empty(&self) -> bool {
        self.personality_traits.is_empty()
            && self.beliefs.is_empty()
            && self.background_facts.is_empty()
            && self.preferences.is_empty()
            && self.mood_notes.is_empty()
    }
}

/// What the bot knows about one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserMemory {
    /// Platform user ID (duplicated from the map key)
    pub user_id: String,
    pub current_username: String,
    #[serde(default)]
    pub preferred_name: Option<String>,
    #[serde(default)]
    pub previous_usernames: Vec<String>,
    #[serde(default)]
    pub possibly_aka: Option<String>,
    #[serde(default)]
    pub facts: Vec<String>,
    #[serde(default)]
    pub preferences: Vec<String>,
    #[serde(default)]
    pub projects: Vec<String>,
    #[serde(default)]
    pub personality_notes: Vec<String>,
}

impl UserMemory {
    pub fn new(user_id: impl Into<String>, current_username: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            current_username: current_username.into(),
            preferred_name: None,
            previous_usernames: Vec::new(),
            possibly_aka: None,
            facts: Vec::new(),
            preferences: Vec::new(),
            projects: Vec::new(),
            personality_notes: Vec::new(),
        }
    }

    /// Name to address this user by.
    pub fn display_name(&self) -> &str {
        self.preferred_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(&self.current_username)
    }
}

/// Transient context, overwritten wholesale every synthesis cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConversationContext {
    #[serde(default)]
    pub current_topic: String,
    #[serde(default)]
    pub ongoing_jokes: Vec<String>,
    #[serde(default)]
    pub emotional_tone: String,
}

/// The root persisted entity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MemoryBank {
    #[serde(default)]
    pub bot_identity: BotIdentity,
    #[serde(default)]
    pub users: BTreeMap<String, UserMemory>,
    #[serde(default)]
    pub conversation_context: ConversationContext,
    #[serde(default)]
    pub recent_summary: String,
    #[serde(default)]
    pub historical_context: String,
}

impl MemoryBank {
    /// Parse and validate a persisted document.
    pub fn from_json(document: &str) -> Result<Self, MemoryError> {
        serde_json::from_str(document).map_err(|e| MemoryError::Schema(e.to_string()))
    }

    /// Validate an already-parsed JSON value.
    pub fn from_value(value: Value) -> Result<Self, MemoryError> {
        serde_json::from_value(value).map_err(|e| MemoryError::Schema(e.to_string()))
    }

    /// Serialize as the indented document written to storage.
    pub fn to_json_pretty(&self) -> Result<String, MemoryError> {
        serde_json::to_string_pretty(self).map_err(|e| MemoryError::Storage(e.to_string()))
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Closed JSON Schema of the bank, suitable for strict structured output.
    ///
    /// Every property is listed as required and `additionalProperties` is
    /// false on every object; optional fields are `anyOf [T, null]`.
    pub fn json_schema() -> Value {
        let strings = json!({ "type": "array", "items": { "type": "string" } });
        let nullable = json!({ "anyOf": [{ "type": "string" }, { "type": "null" }] });

        let bot_identity = closed_object(&[
            ("personality_traits", strings.clone()),
            ("beliefs", strings.clone()),
            ("background_facts", strings.clone()),
            ("preferences", strings.clone()),
            ("mood_notes", strings.clone()),
        ]);

        let user = closed_object(&[
            ("user_id", json!({ "type": "string" })),
            ("current_username", json!({ "type": "string" })),
            ("preferred_name", nullable.clone()),
            ("previous_usernames", strings.clone()),
            ("possibly_aka", nullable),
            ("facts", strings.clone()),
            ("preferences", strings.clone()),
            ("projects", strings.clone()),
            ("personality_notes", strings.clone()),
        ]);

        let context = closed_object(&[
            ("current_topic", json!({ "type": "string" })),
            ("ongoing_jokes", strings),
            ("emotional_tone", json!({ "type": "string" })),
        ]);

        closed_object(&[
            ("bot_identity", bot_identity),
            (
                "users",
                json!({ "type": "object", "additionalProperties": user }),
            ),
            ("conversation_context", context),
            ("recent_summary", json!({ "type": "string" })),
            ("historical_context", json!({ "type": "string" })),
        ])
    }

    /// Natural-language rendering injected into the system prompt.
    ///
    /// Each section is omitted when empty; an empty bank renders as "".
    pub fn render(&self) -> String {
        let mut parts: Vec<String> = Vec::new();

        let me = &self.bot_identity;
        if !me.is_empty() {
            parts.push("About yourself:".into());
            push_list(&mut parts, "- Traits", &me.personality_traits);
            push_list(&mut parts, "- Background", &me.background_facts);
            push_list(&mut parts, "- Beliefs/opinions", &me.beliefs);
            push_list(&mut parts, "- Preferences", &me.preferences);
            push_list(&mut parts, "- Mood", &me.mood_notes);
        }

        if !self.users.is_empty() {
            section(&mut parts, "People you know:".into());
            for user in self.users.values() {
                let facts = if user.facts.is_empty() {
                    "no specific facts yet".to_string()
                } else {
                    user.facts.join(", ")
                };
                parts.push(format!(
                    "- {} (@{}): {}",
                    user.display_name(),
                    user.current_username,
                    facts
                ));
            }
        }

        let ctx = &self.conversation_context;
        let mut context_started = false;
        if !ctx.current_topic.is_empty() {
            section(&mut parts, format!("Current topic: {}", ctx.current_topic));
            context_started = true;
        }
        if !ctx.ongoing_jokes.is_empty() {
            let line = format!("Ongoing jokes: {}", ctx.ongoing_jokes.join(", "));
            if context_started {
                parts.push(line);
            } else {
                section(&mut parts, line);
                context_started = true;
            }
        }
        if !ctx.emotional_tone.is_empty() {
            let line = format!("Tone: {}", ctx.emotional_tone);
            if context_started {
                parts.push(line);
            } else {
                section(&mut parts, line);
            }
        }

        if !self.recent_summary.is_empty() {
            section(&mut parts, format!("Recent context: {}", self.recent_summary));
            if !self.historical_context.is_empty() {
                parts.push(format!("Long-term context: {}", self.historical_context));
            }
        } else if !self.historical_context.is_empty() {
            section(
                &mut parts,
                format!("Long-term context: {}", self.historical_context),
            );
        }

        parts.join("\n")
    }
}

/// Starts a new block, separated from the previous one by a blank line.
fn section(parts: &mut Vec<String>, header: String) {
    if parts.is_empty() {
        parts.push(header);
    } else {
        parts.push(format!("\n{header}"));
    }
}

fn push_list(parts: &mut Vec<String>, label: &str, items: &[String]) {
    if !items.is_empty() {
        parts.push(format!("{label}: {}", items.join(", ")));
    }
}

fn closed_object(properties: &[(&str, Value)]) -> Value {
    let props: serde_json::Map<String, Value> = properties
        .iter()
        .map(|(name, schema)| ((*name).to_string(), schema.clone()))
        .collect();
    let required: Vec<&str> = properties.iter().map(|(name, _)| *name).collect();
    json!({
        "type": "object",
        "properties": props,
        "required": required,
        "additionalProperties": false,
    })
}

/// A durable store for a single opaque JSON document, addressed by key.
///
/// Implementations: local file, in-memory (for testing), PostgreSQL row.
#[async_trait]
pub trait DocumentBackend: Send + Sync {
    /// The backend name (e.g., "file", "postgres", "memory").
    fn name(&self) -> &str;

    /// Remote reads for prompting degrade to an empty bank on error.
    fn is_remote(&self) -> bool {
        false
    }

    /// Fetch the document stored under `key`, if any.
    async fn get(&self, key: &str) -> std::result::Result<Option<String>, MemoryError>;

    /// Replace (or create) the document stored under `key`.
    async fn put(&self, key: &str, document: &str) -> std::result::Result<(), MemoryError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ana() -> MemoryBank {
        let mut bank = MemoryBank::default();
        let mut user = UserMemory::new("42", "ana");
        user.facts.push("likes tea".into());
        bank.users.insert("42".into(), user);
        bank
    }

    #[test]
    fn empty_bank_renders_empty_string() {
        assert_eq!(MemoryBank::default().render(), "");
        assert!(MemoryBank::default().is_empty());
    }

    #[test]
    fn user_facts_are_rendered() {
        let text = ana().render();
        assert_eq!(text, "People you know:\n- ana (@ana): likes tea");
    }

    #[test]
    fn preferred_name_takes_precedence() {
        let mut bank = ana();
        let user = bank.users.get_mut("42").unwrap();
        user.preferred_name = Some("Ana B.".into());
        user.facts.clear();
        assert_eq!(
            bank.render(),
            "People you know:\n- Ana B. (@ana): no specific facts yet"
        );
    }

    #[test]
    fn sections_are_separated_by_blank_lines() {
        let mut bank = ana();
        bank.bot_identity.personality_traits = vec!["curious".into(), "dry".into()];
        bank.conversation_context.current_topic = "rust".into();
        bank.conversation_context.ongoing_jokes = vec!["the borrow checker".into()];
        bank.recent_summary = "talked about lifetimes".into();
        bank.historical_context = "met last year".into();

        let expected = "About yourself:\n\
            - Traits: curious, dry\n\
            \n\
            People you know:\n\
            - ana (@ana): likes tea\n\
            \n\
            Current topic: rust\n\
            Ongoing jokes: the borrow checker\n\
            \n\
            Recent context: talked about lifetimes\n\
            Long-term context: met last year";
        assert_eq!(bank.render(), expected);
    }

    #[test]
    fn mood_and_tone_reach_the_prompt() {
        let mut bank = MemoryBank::default();
        bank.bot_identity.mood_notes = vec!["cheerful".into()];
        bank.conversation_context.emotional_tone = "playful".into();
        assert_eq!(bank.render(), "About yourself:\n- Mood: cheerful\n\nTone: playful");
    }

    #[test]
    fn unknown_fields_are_rejected_at_every_level() {
        let top = r#"{"recent_summary": "", "secret": 1}"#;
        assert!(matches!(MemoryBank::from_json(top), Err(MemoryError::Schema(_))));

        let nested = r#"{"bot_identity": {"beliefs": [], "favorite_color": "red"}}"#;
        assert!(matches!(
            MemoryBank::from_json(nested),
            Err(MemoryError::Schema(_))
        ));

        let user = r#"{"users": {"1": {"user_id": "1", "current_username": "a", "age": 3}}}"#;
        let err = MemoryBank::from_json(user).unwrap_err();
        assert!(err.to_string().contains("age"));
    }

    #[test]
    fn missing_fields_take_defaults() {
        let bank = MemoryBank::from_json("{}").unwrap();
        assert!(bank.is_empty());
    }

    #[test]
    fn json_round_trip_is_stable() {
        let bank = ana();
        let first = bank.to_json_pretty().unwrap();
        let second = MemoryBank::from_json(&first)
            .unwrap()
            .to_json_pretty()
            .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn schema_is_closed_and_fully_required() {
        let schema = MemoryBank::json_schema();
        assert_eq!(schema["additionalProperties"], json!(false));
        assert_eq!(schema["required"].as_array().unwrap().len(), 5);

        let user = &schema["properties"]["users"]["additionalProperties"];
        assert_eq!(user["additionalProperties"], json!(false));
        assert_eq!(user["required"].as_array().unwrap().len(), 9);
        assert_eq!(
            user["properties"]["preferred_name"]["anyOf"][1]["type"],
            "null"
        );
    }
}
