/// Passages retrieved per question by default
pub const DEFAULT_PROMPT_K: usize = 3;

/// Build the question-answering prompt handed to a completion service.
pub fn render_qa_prompt(question: &str, passages: &[String]) -> String {
    let documents = passages
        .iter()
        .enumerate()
        .map(|(i, passage)| format!("[{}] {}", i + 1, passage.trim()))
        .collect::<Vec<_>>()
        .join("\n\n");
    format!(
        "Answer the following question based on these documents:\n\n{documents}\n\nQuestion: {}",
        question.trim()
    )
}
