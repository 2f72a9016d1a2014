//! Prompt construction.
//!
//! Turns the caller's free-text request into the model-specific prompt that is
//! sent for generation. Pure string templating; no I/O.

use serde::{Deserialize, Serialize};

const FEW_SHOT_HEADER: &str = "Task: Translate natural language to SQL.\n\n\
Input: Show me users from London\n\
SQL: SELECT * FROM users WHERE city = 'London'\n\n\
Input: Count the number of products with price over 50\n\
SQL: SELECT COUNT(*) FROM products WHERE price > 50\n\n";

const INSTRUCTION: &str = "You are a SQL expert. Translate the request into a single SQL query. \
Reply with SQL only.";

/// Prompt format expected by a model family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptStyle {
    /// Few-shot completion template for instruction-tuned seq2seq models.
    FewShot,
    /// `[INST] ... [/INST]` wrapper for chat-tuned decoder models.
    InstructionTags,
    /// Task prefix understood by T5 models fine-tuned on text-to-SQL.
    TaskPrefix,
}

/// Build the provider prompt for `input`.
///
/// Empty input is returned unchanged; callers reject it before this point.
pub fn build_prompt(style: PromptStyle, input: &str) -> String {
    if input.is_empty() {
        return String::new();
    }

    match style {
        PromptStyle::FewShot => format!("{FEW_SHOT_HEADER}Input: {input}\nSQL: "),
        PromptStyle::InstructionTags => {
            format!("<s>[INST] {INSTRUCTION}\n\nRequest: {input} [/INST]")
        }
        PromptStyle::TaskPrefix => format!("translate English to SQL: {input}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STYLES: [PromptStyle; 3] = [
        PromptStyle::FewShot,
        PromptStyle::InstructionTags,
        PromptStyle::TaskPrefix,
    ];

    #[test]
    fn test_every_style_contains_input() {
        let inputs = [
            "show all orders from last week",
            "a",
            "  padded  ",
            "names with 'quotes' and {braces}",
            "multi\nline",
        ];
        for style in STYLES {
            for input in inputs {
                let prompt = build_prompt(style, input);
                assert!(prompt.contains(input), "{style:?} dropped {input:?}");
            }
        }
    }

    #[test]
    fn test_empty_input_unchanged() {
        for style in STYLES {
            assert_eq!(build_prompt(style, ""), "");
        }
    }

    #[test]
    fn test_few_shot_layout() {
        let prompt = build_prompt(PromptStyle::FewShot, "list customers");
        assert!(prompt.starts_with("Task: Translate natural language to SQL.\n\n"));
        assert!(prompt.contains("SQL: SELECT * FROM users WHERE city = 'London'\n"));
        assert!(prompt.ends_with("Input: list customers\nSQL: "));
    }

    #[test]
    fn test_instruction_tags_wrap_input() {
        let prompt = build_prompt(PromptStyle::InstructionTags, "count users");
        assert!(prompt.starts_with("<s>[INST] "));
        assert!(prompt.ends_with("Request: count users [/INST]"));
    }

    #[test]
    fn test_deterministic() {
        let a = build_prompt(PromptStyle::FewShot, "top 5 products");
        let b = build_prompt(PromptStyle::FewShot, "top 5 products");
        assert_eq!(a, b);
    }
}
