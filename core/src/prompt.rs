//! Deterministic prompt assembly.

use std::fmt::Write;

use crate::orchestrator::RetrievedChunk;

const INSTRUCTIONS: &str = "You are answering questions about a person's resume.\n\
Given the context information and not prior knowledge, answer the question.\n\
If the answer cannot be found in the context, say that you don't know.";

/// Build the completion prompt from chunks ordered best first.
pub fn build_prompt(question: &str, chunks: &[RetrievedChunk]) -> String {
    let mut prompt = String::with_capacity(
        INSTRUCTIONS.len() + question.len() + chunks.iter().map(|c| c.text.len() + 32).sum::<usize>(),
    );
    prompt.push_str(INSTRUCTIONS);
    prompt.push_str("\n\nContext:\n");
    for chunk in chunks {
        // Writing to a String cannot fail.
        let _ = writeln!(prompt, "[chunk {}]\n{}\n", chunk.id, chunk.text.trim());
    }
    prompt.push_str("Question: ");
    prompt.push_str(question.trim());
    prompt.push_str("\nAnswer:");
    prompt
}
