use std::sync::{Arc, Mutex};

use pretty_assertions::assert_eq;
use react_rag::chat::{BOILERPLATE_REPLY, FALLBACK_COMPONENT};
use react_rag::rag::CompletionRequest;
use react_rag::store::{ChatMessage, ChatRole, StoredMessage};
use react_rag::{
    ChatError, ChatService, DocumentStore, DocumentStoreError, Embedder, EmbeddingError,
    ImageFetchError, ImageFetcher, IngestLimits, LlmError, LlmProvider, MemoryDocumentStore,
    NewChatRequest, ReactAssistant, Snippet, VectorIndex, VectorIndexError, VectorMatch,
    VectorRecord,
};

/// LLM double that records prompts and answers with a fixed reply or error.
struct ScriptedLlm {
    reply: Option<&'static str>,
    requests: Mutex<Vec<(String, Option<String>)>>,
}

impl ScriptedLlm {
    fn answering(reply: &'static str) -> Arc<Self> {
        Arc::new(Self {
            reply: Some(reply),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            reply: None,
            requests: Mutex::new(Vec::new()),
        })
    }

    fn prompts(&self) -> Vec<(String, Option<String>)> {
        self.requests.lock().unwrap().clone()
    }
}

impl LlmProvider for ScriptedLlm {
    fn complete(&self, request: &CompletionRequest<'_>) -> Result<String, LlmError> {
        self.requests.lock().unwrap().push((
            request.prompt.to_string(),
            request.image_url.map(str::to_string),
        ));
        self.reply.map(str::to_string).ok_or(LlmError::Status {
            status: 500,
            body: "upstream exploded".into(),
        })
    }
}

struct StaticImages {
    bytes: Option<Vec<u8>>,
}

impl ImageFetcher for StaticImages {
    fn fetch(&self, _url: &str) -> Result<Vec<u8>, ImageFetchError> {
        self.bytes.clone().ok_or(ImageFetchError::Status(404))
    }
}

struct ConstantEmbedder;

impl Embedder for ConstantEmbedder {
    fn model_name(&self) -> &str {
        "constant"
    }

    fn embed_batch(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(inputs.iter().map(|_| vec![1.0, 0.0]).collect())
    }
}

#[derive(Default)]
struct CapturingIndex {
    upserts: Mutex<Vec<VectorRecord>>,
}

impl VectorIndex for CapturingIndex {
    fn upsert(&self, records: &[VectorRecord]) -> Result<(), VectorIndexError> {
        self.upserts.lock().unwrap().extend_from_slice(records);
        Ok(())
    }

    fn query(
        &self,
        _vector: &[f32],
        _top_k: usize,
        _include_metadata: bool,
    ) -> Result<Vec<VectorMatch>, VectorIndexError> {
        Ok(Vec::new())
    }
}

/// Store whose message inserts always fail.
struct ReadOnlyStore;

impl DocumentStore for ReadOnlyStore {
    fn insert_snippet(&self, _snippet: &Snippet) -> Result<String, DocumentStoreError> {
        Err(DocumentStoreError::Insert("read-only".into()))
    }

    fn insert_message(&self, _message: &ChatMessage) -> Result<String, DocumentStoreError> {
        Err(DocumentStoreError::Insert("read-only".into()))
    }

    fn session_messages(&self, _session_id: &str) -> Result<Vec<StoredMessage>, DocumentStoreError> {
        Ok(Vec::new())
    }

    fn delete_session(&self, _session_id: &str) -> Result<u64, DocumentStoreError> {
        Ok(0)
    }
}

struct Harness {
    store: Arc<MemoryDocumentStore>,
    code: Arc<ScriptedLlm>,
    vision: Arc<ScriptedLlm>,
    index: Arc<CapturingIndex>,
    service: ChatService,
}

fn harness(code: Arc<ScriptedLlm>, vision: Arc<ScriptedLlm>, image: Option<Vec<u8>>) -> Harness {
    let store = Arc::new(MemoryDocumentStore::new());
    let index = Arc::new(CapturingIndex::default());
    let assistant = Arc::new(ReactAssistant::new(None, code.clone(), vision.clone()));
    let service = ChatService::new(
        store.clone(),
        assistant,
        Arc::new(StaticImages { bytes: image }),
        Arc::new(ConstantEmbedder),
        index.clone(),
        IngestLimits::default(),
    );
    Harness {
        store,
        code,
        vision,
        index,
        service,
    }
}

fn text_request(message: &str, session_id: Option<&str>) -> NewChatRequest {
    NewChatRequest {
        message: Some(message.to_string()),
        session_id: session_id.map(str::to_string),
        image_url: None,
    }
}

#[test]
fn empty_request_is_rejected_before_persisting() {
    let h = harness(ScriptedLlm::answering("x"), ScriptedLlm::answering("y"), None);
    let err = h
        .service
        .new_chat(NewChatRequest::default())
        .expect_err("empty request");
    assert!(matches!(err, ChatError::EmptyRequest));
    assert_eq!(err.to_string(), "No message or image provided");
    assert_eq!(h.store.message_count(), 0);
}

#[test]
fn text_request_generates_and_persists_both_turns() {
    let h = harness(
        ScriptedLlm::answering("export default Navbar;"),
        ScriptedLlm::answering("unused"),
        None,
    );
    let reply = h
        .service
        .new_chat(text_request("Build a navbar", None))
        .unwrap();

    assert_eq!(reply.message, "export default Navbar;");
    assert_eq!(reply.role, ChatRole::Assistant);
    assert_eq!(reply.session_id.len(), 36);

    let history = h.service.session_messages(&reply.session_id).unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].message.role, ChatRole::User);
    assert_eq!(history[0].message.message, "Build a navbar");
    assert_eq!(history[0].message.has_image, Some(false));
    assert_eq!(history[1].id, reply.id);
    assert_eq!(history[1].message.references_image, None);

    let prompts = h.code.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].0.contains("No context available"));
    assert!(prompts[0].0.ends_with("User request: Build a navbar"));
    assert!(h.vision.prompts().is_empty());
}

#[test]
fn existing_session_id_is_reused() {
    let h = harness(ScriptedLlm::answering("ok"), ScriptedLlm::answering("y"), None);
    h.service
        .new_chat(text_request("first", Some("session-1")))
        .unwrap();
    let reply = h
        .service
        .new_chat(text_request("second", Some("session-1")))
        .unwrap();
    assert_eq!(reply.session_id, "session-1");
    assert_eq!(h.service.session_messages("session-1").unwrap().len(), 4);
}

#[test]
fn boilerplate_request_skips_generation() {
    let h = harness(ScriptedLlm::answering("code"), ScriptedLlm::answering("y"), None);
    let reply = h
        .service
        .new_chat(text_request("I need a Next.js starter template", None))
        .unwrap();
    assert_eq!(reply.message, BOILERPLATE_REPLY);
    assert!(h.code.prompts().is_empty());
}

#[test]
fn generation_failure_falls_back_to_button() {
    let h = harness(ScriptedLlm::failing(), ScriptedLlm::answering("y"), None);
    let reply = h
        .service
        .new_chat(text_request("Build a pricing table", None))
        .unwrap();
    assert_eq!(reply.message, FALLBACK_COMPONENT);
    assert_eq!(h.store.message_count(), 2);
}

#[test]
fn image_description_enriches_prompt() {
    let h = harness(
        ScriptedLlm::answering("export default Hero;"),
        ScriptedLlm::answering("A hero section with a centered headline"),
        Some(b"jpeg".to_vec()),
    );
    let reply = h
        .service
        .new_chat(NewChatRequest {
            message: Some("Match this design".into()),
            session_id: Some("s".into()),
            image_url: Some("https://img.example.com/hero.jpg".into()),
        })
        .unwrap();

    let vision = h.vision.prompts();
    assert_eq!(vision.len(), 1);
    assert_eq!(vision[0].1.as_deref(), Some("data:image/jpeg;base64,anBlZw=="));

    let code = h.code.prompts();
    assert!(code[0].0.ends_with(
        "User request: Match this design\n\nUI Analysis: A hero section with a centered headline"
    ));

    let history = h.service.session_messages("s").unwrap();
    assert_eq!(history[0].message.has_image, Some(true));
    assert_eq!(
        history[0].message.image_url.as_deref(),
        Some("https://img.example.com/hero.jpg")
    );
    assert_eq!(
        history[1].message.references_image.as_deref(),
        Some("https://img.example.com/hero.jpg")
    );
    assert_eq!(reply.message, "export default Hero;");
}

#[test]
fn image_only_request_uses_description_as_prompt() {
    let h = harness(
        ScriptedLlm::answering("code"),
        ScriptedLlm::answering("Two cards side by side"),
        Some(vec![0xff, 0xd8]),
    );
    h.service
        .new_chat(NewChatRequest {
            message: None,
            session_id: None,
            image_url: Some("https://img.example.com/cards.jpg".into()),
        })
        .unwrap();
    assert!(h.code.prompts()[0]
        .0
        .ends_with("User request: Generate React code for this UI: Two cards side by side"));
}

#[test]
fn failed_image_download_falls_back_to_default_prompt() {
    let h = harness(
        ScriptedLlm::answering("code"),
        ScriptedLlm::answering("never used"),
        None,
    );
    let reply = h
        .service
        .new_chat(NewChatRequest {
            message: None,
            session_id: None,
            image_url: Some("https://img.example.com/missing.jpg".into()),
        })
        .unwrap();
    assert!(h.vision.prompts().is_empty());
    assert!(h.code.prompts()[0]
        .0
        .ends_with("User request: Generate a React component"));
    assert_eq!(reply.message, "code");
}

#[test]
fn failed_image_analysis_is_ignored() {
    let h = harness(
        ScriptedLlm::answering("code"),
        ScriptedLlm::failing(),
        Some(vec![1, 2, 3]),
    );
    h.service
        .new_chat(NewChatRequest {
            message: Some("Make a form".into()),
            session_id: None,
            image_url: Some("https://img.example.com/form.jpg".into()),
        })
        .unwrap();
    let prompt = &h.code.prompts()[0].0;
    assert!(prompt.ends_with("User request: Make a form"));
    assert!(!prompt.contains("UI Analysis"));
}

#[test]
fn user_message_save_failure_is_reported() {
    let code = ScriptedLlm::answering("code");
    let assistant = Arc::new(ReactAssistant::new(
        None,
        code.clone(),
        ScriptedLlm::answering("y"),
    ));
    let service = ChatService::new(
        Arc::new(ReadOnlyStore),
        assistant,
        Arc::new(StaticImages { bytes: None }),
        Arc::new(ConstantEmbedder),
        Arc::new(CapturingIndex::default()),
        IngestLimits::default(),
    );
    let err = service
        .new_chat(text_request("Build a card", None))
        .expect_err("save fails");
    assert!(matches!(err, ChatError::SaveUserMessage(_)));
    assert!(err.to_string().starts_with("Failed to save user message"));
    assert!(code.prompts().is_empty());
}

#[test]
fn delete_session_clears_history() {
    let h = harness(ScriptedLlm::answering("ok"), ScriptedLlm::answering("y"), None);
    h.service.new_chat(text_request("one", Some("gone"))).unwrap();
    h.service.new_chat(text_request("two", Some("kept"))).unwrap();

    assert_eq!(h.service.delete_session("gone").unwrap(), 2);
    assert!(h.service.session_messages("gone").unwrap().is_empty());
    assert_eq!(h.service.session_messages("kept").unwrap().len(), 2);
}

#[test]
fn manual_snippet_is_stored_and_indexed() {
    let h = harness(ScriptedLlm::answering("ok"), ScriptedLlm::answering("y"), None);
    let id = h
        .service
        .add_snippet(
            "const Badge = () => <span>new</span>;",
            vec!["react".into(), "badge".into()],
        )
        .unwrap();

    let stored = h.store.snippets();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].0, id);
    assert_eq!(stored[0].1.source_dataset, "manual");

    let upserts = h.index.upserts.lock().unwrap();
    assert_eq!(upserts.len(), 1);
    assert_eq!(upserts[0].id, id);
    assert_eq!(upserts[0].metadata.tags, "react,badge");
    assert_eq!(upserts[0].metadata.text, "const Badge = () => <span>new</span>;");
}

#[test]
fn manual_snippet_store_failure_propagates() {
    let assistant = Arc::new(ReactAssistant::new(
        None,
        ScriptedLlm::answering("x"),
        ScriptedLlm::answering("y"),
    ));
    let index = Arc::new(CapturingIndex::default());
    let service = ChatService::new(
        Arc::new(ReadOnlyStore),
        assistant,
        Arc::new(StaticImages { bytes: None }),
        Arc::new(ConstantEmbedder),
        index.clone(),
        IngestLimits::default(),
    );
    let err = service
        .add_snippet("const A = 1;", Vec::new())
        .expect_err("store fails");
    assert!(matches!(err, ChatError::SnippetStore(_)));
    assert!(index.upserts.lock().unwrap().is_empty());
}
