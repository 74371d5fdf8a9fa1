//! Prompt templates for both model roles.
//!
//! Centralising every prompt here keeps the retry and streaming code free of
//! prompt engineering, and lets unit tests inspect rendered prompts without
//! a live model.

/// Instruction sent with the rasterised page image to the parsing-role model.
pub const TEXT_EXTRACTION_PROMPT: &str = "\
You are a page transcription and OCR expert. You will be presented with an image of a PDF page. \
Your task is to transcribe the text on the page PERFECTLY. \
The transcription must be in the text's original language, do not translate. \
Ignore any image or structured content like tables.
Here is the image of a page:
";

/// Persona and hard constraints for the expert-role model.
pub const EXPERT_SYSTEM_PROMPT: &str = "\
You are a multilingual college professor, known for great expertise in many subjects and a helpful teaching style. \
You will be given text extracted from a page of a PDF the user is currently reading. \
Your task is to answer the user's questions on the page clearly and thoroughly, with a pedagogical approach. \
Feel free to use simple examples if you have to explain complex concepts. \
It is imperative that you always answer the question in the same language as the extracted text. \
IMPORTANT: Do not use any introductory phrases like \"Hello\", \"Here is an explanation of the page\" or \"Explanation of the page\", directly answer the user's question.\
";

/// Render the human turn of the explanation chain.
///
/// The history block is omitted entirely when there is no prior
/// conversation, so a fresh conversation and a follow-up share one template.
pub fn expert_human_prompt(parsed_page: &str, prompt: &str, conversation_history: &str) -> String {
    let mut rendered = String::new();
    if !conversation_history.is_empty() {
        rendered.push_str("Here is the conversation so far:\n");
        rendered.push_str(conversation_history);
        rendered.push('\n');
    }
    rendered.push_str("Here is the extracted text from the PDF page: ");
    rendered.push_str(parsed_page);
    rendered.push_str("\n\nHere is the user's question: ");
    rendered.push_str(prompt);
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn human_prompt_contains_page_and_question() {
        let rendered = expert_human_prompt("page text", "what is this?", "");
        assert!(rendered.contains("page text"));
        assert!(rendered.contains("what is this?"));
        assert!(!rendered.contains("conversation so far"));
    }

    #[test]
    fn human_prompt_includes_history_when_present() {
        let rendered = expert_human_prompt("p", "q", "User: a\n\nAgent: b\n\n");
        assert!(rendered.contains("conversation so far"));
        assert!(rendered.contains("User: a"));
    }
}
