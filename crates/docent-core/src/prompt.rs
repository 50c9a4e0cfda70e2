//! Prompt assembly for grounded question answering.

use std::fmt::Write;

use docent_index::RetrievedContext;

/// Rendered in place of passages when retrieval found nothing.
pub const NO_CONTEXT_MARKER: &str = "(no relevant context found in the documents)";

const SYSTEM_DIRECTIVE: &str = "You are a technical assistant for question-answering tasks. \
Search the documents and summarize. Answer only from the context provided. \
If you don't know the answer, just say that you don't know; never make one up. \
Use ten sentences maximum and keep the answer concise.";

/// Build the generation prompt for `question` over `context`.
///
/// Passages appear in context order, each tagged with its source and page.
#[must_use]
pub fn build_prompt(question: &str, context: &RetrievedContext) -> String {
    let mut prompt = String::with_capacity(
        SYSTEM_DIRECTIVE.len()
            + question.len()
            + context.chunks.iter().map(|c| c.content.len() + 64).sum::<usize>()
            + 64,
    );

    let _ = write!(
        prompt,
        "<s>[INST] {SYSTEM_DIRECTIVE} [/INST]</s>\n[INST]\nQuestion: {question}\nContext:\n"
    );

    if context.is_empty() {
        prompt.push_str(NO_CONTEXT_MARKER);
        prompt.push('\n');
    } else {
        for (i, chunk) in context.chunks.iter().enumerate() {
            let _ = writeln!(
                prompt,
                "[{}] source: {} (page {})\n{}\n",
                i + 1,
                chunk.metadata.source,
                chunk.metadata.page,
                chunk.content
            );
        }
    }

    prompt.push_str("Answer:\n[/INST]");
    prompt
}
