use crate::models::RetrievedChunk;

/// Exact answer the model is instructed to give when the context does not
/// contain the answer.
pub const NOT_FOUND_SENTINEL: &str = "I cannot find that information in the document.";

/// Canned reply returned in place of an answer when a backing service fails.
pub const DEGRADED_ANSWER: &str =
    "Sorry, I encountered an error while processing your message. Please try again.";

pub(crate) const CONTEXT_HEADER: &str = "Context:";
pub(crate) const QUESTION_HEADER: &str = "Question:";
pub(crate) const PASSAGE_SEPARATOR: &str = "\n\n---\n\n";

pub fn build_context(chunks: &[RetrievedChunk]) -> String {
    chunks
        .iter()
        .map(|chunk| chunk.content.trim())
        .filter(|content| !content.is_empty())
        .collect::<Vec<_>>()
        .join(PASSAGE_SEPARATOR)
}

pub fn build_prompt(question: &str, chunks: &[RetrievedChunk]) -> String {
    format!(
        "You are a helpful assistant answering questions about a single PDF document.\n\
         Answer the question using only the context below. Be concise and quote \
         figures exactly as they appear.\n\
         If the context does not contain the answer, reply exactly with: \
         \"{NOT_FOUND_SENTINEL}\"\n\n\
         {CONTEXT_HEADER}\n{}\n\n\
         {QUESTION_HEADER} {}\n\
         Answer:",
        build_context(chunks),
        question.trim()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChunkMetadata;
    use chrono::Utc;

    fn retrieved(content: &str) -> RetrievedChunk {
        RetrievedChunk {
            chunk_id: "c".to_string(),
            content: content.to_string(),
            score: 0.9,
            metadata: ChunkMetadata {
                document_id: "doc".to_string(),
                blob_id: "blob".to_string(),
                chunk_index: 0,
                source_file_name: "a.pdf".to_string(),
                upload_date: Utc::now(),
            },
        }
    }

    #[test]
    fn prompt_contains_context_question_and_sentinel() {
        let prompt = build_prompt(
            "  What is the total? ",
            &[retrieved("Total due: $42"), retrieved("Paid by card")],
        );
        assert!(prompt.contains("Total due: $42\n\n---\n\nPaid by card"));
        assert!(prompt.contains("Question: What is the total?\n"));
        assert!(prompt.contains(NOT_FOUND_SENTINEL));
    }

    #[test]
    fn blank_chunks_are_left_out_of_the_context() {
        assert_eq!(
            build_context(&[retrieved("  "), retrieved(" one "), retrieved("two")]),
            "one\n\n---\n\ntwo"
        );
    }
}
