//! Chunk translation through a completion model.
//!
//! Segments go out as a JSON array of XML-V1 strings and come back as a JSON
//! array. Any prose the model wraps around the array is ignored; a reply of
//! the wrong length is handed on as is and the chunk flow rejects it.

use super::chunked::{ChunkRequest, ChunkTranslator};
use crate::error::ProviderError;
use crate::provider::ProviderCapability;
use async_trait::async_trait;
use serde_json::json;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a professional translator. \
Translate each string of the JSON array in the user message. \
Keep every <xN>, </xN> and <xN/> marker exactly as written. \
Reply with a JSON array of translated strings, one per input string, in the same order.";

#[async_trait]
pub trait CompletionClient: Send + Sync + 'static {
    async fn complete(&self, system: &str, user: &str) -> Result<String, ProviderError>;
}

pub struct LlmTranslator<C> {
    client: C,
    system_prompt: String,
}

impl<C: CompletionClient> LlmTranslator<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }
}

/// User message for one chunk.
pub fn frame_request(request: &ChunkRequest) -> String {
    let strings: Vec<&str> = request.segments.iter().map(|seg| seg.xml.as_str()).collect();
    let notes: Vec<Option<&str>> = request.segments.iter().map(|seg| seg.notes.as_deref()).collect();
    let mut message = json!({
        "sourceLang": request.source_lang,
        "targetLang": request.target_lang,
        "strings": strings,
    });
    if notes.iter().any(Option::is_some) {
        message["notes"] = json!(notes);
    }
    if let Some(instructions) = &request.instructions {
        message["instructions"] = json!(instructions);
    }
    message.to_string()
}

/// The JSON array between the first `[` and the last `]` of `reply`.
pub fn parse_reply(reply: &str) -> Result<Vec<String>, ProviderError> {
    let (Some(start), Some(end)) = (reply.find('['), reply.rfind(']')) else {
        return Err(ProviderError::Malformed("no JSON array in completion".to_string()));
    };
    if end < start {
        return Err(ProviderError::Malformed("no JSON array in completion".to_string()));
    }
    serde_json::from_str(&reply[start..=end])
        .map_err(|err| ProviderError::Malformed(format!("completion array: {err}")))
}

#[async_trait]
impl<C: CompletionClient> ChunkTranslator for LlmTranslator<C> {
    fn capability(&self) -> ProviderCapability {
        ProviderCapability::Llm
    }

    async fn translate_chunk(&self, request: &ChunkRequest) -> Result<Vec<String>, ProviderError> {
        let user = frame_request(request);
        let reply = self.client.complete(&self.system_prompt, &user).await?;
        parse_reply(&reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::chunked::ChunkSegment;
    use std::sync::Mutex;

    struct Canned {
        reply: String,
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CompletionClient for Canned {
        async fn complete(&self, _system: &str, user: &str) -> Result<String, ProviderError> {
            self.seen
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .push(user.to_string());
            Ok(self.reply.clone())
        }
    }

    fn request() -> ChunkRequest {
        ChunkRequest {
            source_lang: "en".into(),
            target_lang: "it".into(),
            segments: vec![
                ChunkSegment {
                    guid: "g1".into(),
                    xml: "Hello <x1/>".into(),
                    notes: None,
                },
                ChunkSegment {
                    guid: "g2".into(),
                    xml: "Bye".into(),
                    notes: Some("farewell".into()),
                },
            ],
            instructions: None,
        }
    }

    #[test]
    fn framing_carries_strings_and_notes() {
        let framed: serde_json::Value = serde_json::from_str(&frame_request(&request())).expect("json");
        assert_eq!(framed["strings"], json!(["Hello <x1/>", "Bye"]));
        assert_eq!(framed["notes"], json!([null, "farewell"]));
        assert!(framed.get("instructions").is_none());
    }

    #[test]
    fn reply_parsing_ignores_surrounding_prose() {
        let parsed = parse_reply("Sure! [\"Ciao <x1/>\", \"Addio\"] Hope this helps.").expect("parse");
        assert_eq!(parsed, vec!["Ciao <x1/>", "Addio"]);
        assert!(matches!(parse_reply("no array"), Err(ProviderError::Malformed(_))));
        assert!(matches!(parse_reply("] backwards ["), Err(ProviderError::Malformed(_))));
        assert!(matches!(parse_reply("[1, 2]"), Err(ProviderError::Malformed(_))));
    }

    #[tokio::test]
    async fn translator_round_trips_through_client() {
        let translator = LlmTranslator::new(Canned {
            reply: "[\"Ciao <x1/>\",\"Addio\"]".into(),
            seen: Mutex::new(Vec::new()),
        });
        assert_eq!(translator.capability(), ProviderCapability::Llm);
        let out = translator.translate_chunk(&request()).await.expect("translate");
        assert_eq!(out.len(), 2);
        assert_eq!(
            translator
                .client
                .seen
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .len(),
            1
        );
    }
}
