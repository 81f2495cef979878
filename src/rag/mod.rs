//! Retrieval-augmented generation: retrieval, prompting and LLM calls.

pub mod assistant;
pub mod llm;
pub mod prompt;
pub mod retriever;

pub use assistant::ReactAssistant;
pub use llm::{CompletionRequest, LlmProvider, OpenAiChat};
pub use retriever::{RetrievedSnippet, SnippetRetriever};
