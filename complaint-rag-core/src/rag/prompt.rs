//! Prompt assembly.
//!
//! A prompt is rendered from a fixed template with exactly one `{context}` and
//! one `{question}` placeholder. Substitution is a single pass over the
//! template, so placeholder-like text inside fragments or the question is
//! copied verbatim and never expanded.

use super::types::Prompt;
use crate::config::PromptConfig;
use thiserror::Error;
use tracing::warn;

pub const CONTEXT_PLACEHOLDER: &str = "{context}";
pub const QUESTION_PLACEHOLDER: &str = "{question}";

/// Separator placed between fragment texts in the context block.
pub const FRAGMENT_SEPARATOR: &str = "\n\n";

/// Reply the template instructs the model to give when the context is insufficient.
pub const DEFAULT_FALLBACK_ANSWER: &str = "I don't have enough information to answer that.";

pub const DEFAULT_TEMPLATE: &str = "
You are a financial analyst assistant at CrediTrust Financial. Your task is to \n\
answer questions about customer complaints based only on the provided excerpts.

Use the following context to answer the question. If the context doesn't \n\
contain the answer, reply: \"I don't have enough information to answer that.\"

Context:
{context}

Question:
{question}

Answer:
";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("placeholder {0} is missing")]
    Missing(&'static str),

    #[error("placeholder {0} appears more than once")]
    Repeated(&'static str),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PromptError {
    #[error("question is empty")]
    EmptyQuestion,

    #[error("prompt needs {length} characters, limit is {max}")]
    TooLarge { length: usize, max: usize },
}

/// A validated prompt template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    template: String,
    context_at: usize,
    question_at: usize,
    fixed_chars: usize,
}

impl PromptTemplate {
    /// Validates that each placeholder occurs exactly once.
    pub fn parse(template: &str) -> Result<Self, TemplateError> {
        let context_at = find_once(template, CONTEXT_PLACEHOLDER)?;
        let question_at = find_once(template, QUESTION_PLACEHOLDER)?;
        let fixed_chars = template.chars().count()
            - CONTEXT_PLACEHOLDER.chars().count()
            - QUESTION_PLACEHOLDER.chars().count();

        Ok(Self {
            template: template.to_string(),
            context_at,
            question_at,
            fixed_chars,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.template
    }

    fn render(&self, context: &str, question: &str) -> String {
        let mut slots = [
            (self.context_at, CONTEXT_PLACEHOLDER, context),
            (self.question_at, QUESTION_PLACEHOLDER, question),
        ];
        slots.sort_by_key(|(at, _, _)| *at);

        let mut out = String::with_capacity(self.template.len() + context.len() + question.len());
        let mut cursor = 0;
        for (at, placeholder, value) in slots {
            out.push_str(&self.template[cursor..at]);
            out.push_str(value);
            cursor = at + placeholder.len();
        }
        out.push_str(&self.template[cursor..]);
        out
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self::parse(DEFAULT_TEMPLATE).unwrap_or_else(|e| unreachable!("default template: {}", e))
    }
}

fn find_once(template: &str, placeholder: &'static str) -> Result<usize, TemplateError> {
    let mut matches = template.match_indices(placeholder);
    let (first, _) = matches.next().ok_or(TemplateError::Missing(placeholder))?;
    if matches.next().is_some() {
        return Err(TemplateError::Repeated(placeholder));
    }
    Ok(first)
}

/// Deterministically assembles a bounded prompt from ranked fragments.
///
/// Fragments are expected in relevance order. When the rendered prompt would
/// exceed the character limit, whole fragments are dropped from the end of the
/// list until it fits; fragment text is never cut.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    template: PromptTemplate,
    max_prompt_chars: usize,
    truncate: bool,
}

impl PromptBuilder {
    pub fn new(template: PromptTemplate) -> Self {
        Self {
            template,
            max_prompt_chars: usize::MAX,
            truncate: true,
        }
    }

    pub fn from_config(config: &PromptConfig) -> Result<Self, TemplateError> {
        Ok(Self::new(PromptTemplate::parse(&config.template)?)
            .with_max_chars(config.max_prompt_chars)
            .with_truncation(config.truncate))
    }

    pub fn with_max_chars(mut self, max_prompt_chars: usize) -> Self {
        self.max_prompt_chars = max_prompt_chars;
        self
    }

    pub fn with_truncation(mut self, truncate: bool) -> Self {
        self.truncate = truncate;
        self
    }

    /// Renders the prompt for `question` over `fragments`.
    ///
    /// # Errors
    ///
    /// - [`PromptError::EmptyQuestion`] if the question is blank
    /// - [`PromptError::TooLarge`] if the bound cannot be met, either because
    ///   truncation is disabled or because the template and question alone are
    ///   already too long
    pub fn build<S: AsRef<str>>(
        &self,
        fragments: &[S],
        question: &str,
    ) -> Result<Prompt, PromptError> {
        if question.trim().is_empty() {
            return Err(PromptError::EmptyQuestion);
        }

        let base = self.template.fixed_chars + question.chars().count();
        let separator = FRAGMENT_SEPARATOR.chars().count();
        let lengths: Vec<usize> = fragments.iter().map(|f| f.as_ref().chars().count()).collect();

        let rendered_len = |included: usize| -> usize {
            let context: usize = lengths[..included].iter().sum();
            base + context + separator * included.saturating_sub(1)
        };

        let mut included = fragments.len();
        while rendered_len(included) > self.max_prompt_chars {
            if !self.truncate || included == 0 {
                return Err(PromptError::TooLarge {
                    length: rendered_len(included),
                    max: self.max_prompt_chars,
                });
            }
            included -= 1;
        }

        let truncated = included < fragments.len();
        if truncated {
            warn!(
                kept = included,
                dropped = fragments.len() - included,
                max_chars = self.max_prompt_chars,
                "Prompt truncated to fit the size limit"
            );
        }

        let context = fragments[..included]
            .iter()
            .map(AsRef::as_ref)
            .collect::<Vec<&str>>()
            .join(FRAGMENT_SEPARATOR);

        Ok(Prompt::new(self.template.render(&context, question), included, truncated))
    }
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new(PromptTemplate::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAGMENTS: [&str; 3] = [
        "I was charged twice for the same purchase on my credit card.",
        "The bank refused to reverse the duplicate charge.",
        "Customer service never called me back.",
    ];

    #[test]
    fn test_default_template_keeps_line_endings() {
        assert!(DEFAULT_TEMPLATE.contains("Your task is to \nanswer questions"));
        assert!(DEFAULT_TEMPLATE.contains("If the context doesn't \ncontain the answer"));
        assert!(DEFAULT_TEMPLATE.starts_with("\nYou are"));
        assert!(DEFAULT_TEMPLATE.ends_with("Answer:\n"));
    }

    #[test]
    fn test_template_validation() {
        assert!(PromptTemplate::parse(DEFAULT_TEMPLATE).is_ok());
        assert_eq!(
            PromptTemplate::parse("{question}").unwrap_err(),
            TemplateError::Missing(CONTEXT_PLACEHOLDER)
        );
        assert_eq!(
            PromptTemplate::parse("{context} {question} {context}").unwrap_err(),
            TemplateError::Repeated(CONTEXT_PLACEHOLDER)
        );
    }

    #[test]
    fn test_build_contains_question_and_fragments_in_order() {
        let builder = PromptBuilder::default();
        let question = "Why was I charged twice?";
        let prompt = builder.build(&FRAGMENTS, question).unwrap();
        let text = prompt.as_str();

        assert_eq!(text.matches(question).count(), 1);
        assert!(!prompt.is_truncated());
        assert_eq!(prompt.included_fragments(), 3);

        let positions: Vec<usize> = FRAGMENTS.iter().map(|f| text.find(f).unwrap()).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert!(text.contains(&FRAGMENTS.join(FRAGMENT_SEPARATOR)));
    }

    #[test]
    fn test_build_empty_fragments_renders_empty_context() {
        let builder = PromptBuilder::default();
        let prompt = builder.build::<&str>(&[], "What happened with account X?").unwrap();

        assert!(prompt.as_str().contains("Context:\n\n\nQuestion:\nWhat happened with account X?"));
        assert_eq!(prompt.included_fragments(), 0);
        assert!(!prompt.is_truncated());
    }

    #[test]
    fn test_build_is_idempotent() {
        let builder = PromptBuilder::default();
        let a = builder.build(&FRAGMENTS, "question").unwrap();
        let b = builder.build(&FRAGMENTS, "question").unwrap();
        assert_eq!(a.as_str().as_bytes(), b.as_str().as_bytes());
    }

    #[test]
    fn test_placeholders_in_input_are_not_expanded() {
        let template = PromptTemplate::parse("C[{context}] Q[{question}]").unwrap();
        let builder = PromptBuilder::new(template);
        let prompt = builder.build(&["see {question}"], "what about {context}?").unwrap();
        assert_eq!(prompt.as_str(), "C[see {question}] Q[what about {context}?]");
    }

    #[test]
    fn test_question_before_context_template() {
        let template = PromptTemplate::parse("Q: {question}\nC: {context}").unwrap();
        let builder = PromptBuilder::new(template);
        let prompt = builder.build(&["a", "b"], "why?").unwrap();
        assert_eq!(prompt.as_str(), "Q: why?\nC: a\n\nb");
    }

    #[test]
    fn test_truncation_drops_lowest_relevance_whole_fragments() {
        let template = PromptTemplate::parse("{context}|{question}").unwrap();
        // "aaaa\n\nbbbb|q" is 12 characters; adding "\n\ncccc" would make 18.
        let builder = PromptBuilder::new(template).with_max_chars(12);
        let prompt = builder.build(&["aaaa", "bbbb", "cccc"], "q").unwrap();

        assert_eq!(prompt.as_str(), "aaaa\n\nbbbb|q");
        assert!(prompt.is_truncated());
        assert_eq!(prompt.included_fragments(), 2);
    }

    #[test]
    fn test_too_large_without_truncation() {
        let template = PromptTemplate::parse("{context}|{question}").unwrap();
        let builder = PromptBuilder::new(template).with_max_chars(5).with_truncation(false);
        let result = builder.build(&["aaaa"], "q");
        assert_eq!(result.unwrap_err(), PromptError::TooLarge { length: 6, max: 5 });
    }

    #[test]
    fn test_too_large_even_without_fragments() {
        let template = PromptTemplate::parse("{context}|{question}").unwrap();
        let builder = PromptBuilder::new(template).with_max_chars(3);
        let result = builder.build(&["aaaa"], "long question");
        assert!(matches!(result, Err(PromptError::TooLarge { .. })));
    }

    #[test]
    fn test_blank_question_rejected() {
        let builder = PromptBuilder::default();
        assert_eq!(builder.build(&FRAGMENTS, "  ").unwrap_err(), PromptError::EmptyQuestion);
    }

    #[test]
    fn test_length_counts_characters_not_bytes() {
        let template = PromptTemplate::parse("{context}{question}").unwrap();
        let builder = PromptBuilder::new(template).with_max_chars(4);
        let prompt = builder.build(&["éé"], "üü").unwrap();
        assert_eq!(prompt.as_str().chars().count(), 4);
        assert!(!prompt.is_truncated());
    }
}
