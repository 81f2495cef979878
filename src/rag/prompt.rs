//! Prompt templates for code generation and mockup analysis.

use super::retriever::RetrievedSnippet;

/// Context placeholder used when retrieval is unavailable.
pub const NO_CONTEXT: &str = "No context available";

/// Instruction sent with every mockup image.
pub const IMAGE_ANALYSIS_PROMPT: &str = "Analyze this UI mockup image and provide a detailed description for generating React code. Include layout, components, styling, colors, positioning, and component hierarchy. Be specific about the visual elements and their functionality.";

const CODE_PREAMBLE: &str = "You are a senior React developer assistant. Generate high-quality React code based on user requests and UI mockups.

When creating React components:
- Use functional components with modern React hooks
- Include proper TypeScript interfaces when applicable
- Use Tailwind CSS for styling when possible
- Implement realistic functionality and event handlers
- Follow React best practices and patterns
- Make components responsive and accessible

Always provide complete, working code that can be copy-pasted and used immediately.

Here are some related React code examples for reference:
";

/// Joins retrieved snippet texts with a blank line.
pub fn render_context(snippets: &[RetrievedSnippet]) -> String {
    snippets
        .iter()
        .map(|snippet| snippet.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Fills the code-generation template.
pub fn build_prompt(question: &str, context: &str) -> String {
    format!("{CODE_PREAMBLE}{context}\n\nUser request: {question}")
}

/// Appends a mockup description to the user's request.
pub fn combine_input(user_input: &str, image_description: Option<&str>) -> String {
    match image_description {
        Some(description) => format!("{user_input}\n\nUI Analysis: {description}"),
        None => user_input.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snippet(text: &str) -> RetrievedSnippet {
        RetrievedSnippet {
            id: "x".into(),
            text: text.into(),
            tags: String::new(),
            score: 1.0,
        }
    }

    #[test]
    fn prompt_embeds_context_and_question() {
        let context = render_context(&[snippet("first"), snippet("second")]);
        assert_eq!(context, "first\n\nsecond");
        let prompt = build_prompt("Build a navbar", &context);
        assert!(prompt.starts_with("You are a senior React developer assistant."));
        assert!(prompt.contains("for reference:\nfirst\n\nsecond\n\nUser request: Build a navbar"));
        assert!(prompt.ends_with("Build a navbar"));
    }

    #[test]
    fn description_is_appended_when_present() {
        assert_eq!(combine_input("Make it", None), "Make it");
        assert_eq!(
            combine_input("Make it", Some("two columns")),
            "Make it\n\nUI Analysis: two columns"
        );
    }
}
