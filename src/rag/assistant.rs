//! Retrieval-augmented React code generation.

use std::sync::Arc;

use tracing::{debug, warn};

use super::llm::{CompletionRequest, LlmProvider};
use super::prompt::{self, IMAGE_ANALYSIS_PROMPT, NO_CONTEXT};
use super::retriever::SnippetRetriever;
use crate::error::LlmError;

/// Snippets pulled into each code-generation prompt.
pub const CONTEXT_SNIPPETS: usize = 2;

/// Generates React code and describes UI mockups.
pub struct ReactAssistant {
    retriever: Option<Arc<SnippetRetriever>>,
    code_llm: Arc<dyn LlmProvider>,
    vision_llm: Arc<dyn LlmProvider>,
}

impl ReactAssistant {
    /// Builds an assistant; without a retriever every prompt uses the no-context placeholder.
    pub fn new(
        retriever: Option<Arc<SnippetRetriever>>,
        code_llm: Arc<dyn LlmProvider>,
        vision_llm: Arc<dyn LlmProvider>,
    ) -> Self {
        Self {
            retriever,
            code_llm,
            vision_llm,
        }
    }

    /// Generates code for `user_input`, optionally enriched with a mockup description.
    pub fn generate_code(
        &self,
        user_input: &str,
        image_description: Option<&str>,
    ) -> Result<String, LlmError> {
        let combined = prompt::combine_input(user_input, image_description);
        let context = self.context_for(&combined);
        let rendered = prompt::build_prompt(&combined, &context);
        self.code_llm.complete(&CompletionRequest::text(&rendered))
    }

    /// Describes a base64-encoded JPEG mockup for code generation.
    pub fn analyze_image(&self, base64_image: &str) -> Result<String, LlmError> {
        let data_url = format!("data:image/jpeg;base64,{base64_image}");
        self.vision_llm
            .complete(&CompletionRequest::with_image(IMAGE_ANALYSIS_PROMPT, &data_url))
    }

    fn context_for(&self, query: &str) -> String {
        let Some(retriever) = &self.retriever else {
            return NO_CONTEXT.to_string();
        };
        match retriever.relevant(query, CONTEXT_SNIPPETS) {
            Ok(snippets) => {
                let context = prompt::render_context(&snippets);
                debug!(chars = context.chars().count(), "retrieved context");
                context
            }
            Err(err) => {
                warn!(error = %err, "retrieval failed, continuing without context");
                NO_CONTEXT.to_string()
            }
        }
    }
}
