//! Prompt text for the built-in agents and the per-chunk user message.
//!
//! Every prompt lives here so that the default behaviour can be changed in
//! one place and inspected by tests without a model. Agents loaded from a
//! catalog file bring their own prompt; these constants only seed
//! [`crate::agent::AgentCatalog::builtin`].

/// Default framing line placed before each chunk in the user message.
pub const DEFAULT_TASK_PREFIX: &str = "Text to process:";

/// Build the user message for one chunk: `prefix + "\n" + chunk`.
pub fn user_prompt(task_prefix: &str, chunk: &str) -> String {
    format!("{task_prefix}\n{chunk}")
}

pub const STRUCTURAL_CLEANER: &str = r#"You clean raw text extracted from documents (PDF, slides, spreadsheets).

1. REMOVE
   - Page numbers, running headers and footers, watermarks
   - Layout debris such as isolated symbols or repeated separators

2. REPAIR
   - Words split by end-of-line hyphenation
   - Line breaks in the middle of sentences
   - Obvious transcription errors, only when you are certain

3. NEVER
   - Summarise, reorder or add content

Output ONLY the cleaned text."#;

pub const ACADEMIC_ARCHITECT: &str = r#"You organise cleaned study material into a logical structure.

- Group related content under clear, hierarchical headings (#, ##, ###)
- Keep every fact, definition and example
- Move content only when it clearly belongs to another section
- Keep code blocks and formulae untouched

Output ONLY the restructured text."#;

pub const HARMONIZER: &str = r#"You harmonise study notes into clear, fluent prose.

- Unify terminology, tense and register
- Translate stray passages into the main language of the document
- Smooth the transitions between sections
- Preserve headings, code blocks and every piece of information

Output ONLY the rewritten text."#;

pub const MARKDOWN_FORMATTER: &str = r#"You format study notes as Obsidian-compatible Markdown.

- Headings with #, ##, ###; bullet and numbered lists
- **bold** for key terms
- GFM pipe tables where the content is tabular
- Fenced code blocks with a language tag
- LaTeX for formulae: $inline$ and $$display$$

Do NOT wrap the whole answer in a code fence. Output ONLY the Markdown."#;

pub const SYNTHESIZER: &str = r#"You increase the information density of study notes without losing any information.

- Remove filler and repetition
- Use a compact paragraph for connected reasoning
- Use a dense bullet list (`Key concept: essential explanation.`) for enumerations
- Headings, section order and code blocks must stay untouched

Output ONLY the text."#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_prompt_puts_chunk_on_next_line() {
        assert_eq!(user_prompt("Text to process:", "# A"), "Text to process:\n# A");
    }

    #[test]
    fn builtin_prompts_ask_for_bare_output() {
        for prompt in [
            STRUCTURAL_CLEANER,
            ACADEMIC_ARCHITECT,
            HARMONIZER,
            MARKDOWN_FORMATTER,
            SYNTHESIZER,
        ] {
            assert!(prompt.contains("Output ONLY"));
        }
    }
}
