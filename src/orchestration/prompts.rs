//! Prompt assembly for section generation, merging and chaining.

use crate::constants::delimiters::merge_result_header;
use crate::models::{Codex, SectionTemplate};

/// Per-section generation inputs
#[derive(Debug, Clone)]
pub struct SectionPromptInput<'a> {
    pub subject: &'a str,
    pub input_context: &'a str,
    pub prerequisite_content: Option<&'a str>,
}

pub fn system_prompt(codex: &Codex) -> String {
    let definition = &codex.definition;
    if definition.system_prompt.trim().is_empty() {
        format!(
            "You are writing the \"{}\" codex. Produce well-structured prose.",
            codex.name
        )
    } else {
        definition.system_prompt.clone()
    }
}

pub fn section_prompt(
    codex: &Codex,
    template: &SectionTemplate,
    section_index: usize,
    input: &SectionPromptInput<'_>,
) -> String {
    let bounds = codex.definition.word_count;
    let mut prompt = format!(
        "Subject: {}\n\nWrite section {} of {} of the \"{}\" codex: \"{}\".\nLength: {} to {} words.",
        input.subject,
        section_index + 1,
        codex.definition.section_templates.len(),
        codex.name,
        template.name,
        bounds.min,
        bounds.max,
    );

    if !template.instruction.trim().is_empty() {
        prompt.push_str("\n\n");
        prompt.push_str(&template.instruction);
    }
    if !input.input_context.trim().is_empty() {
        prompt.push_str("\n\nInput:\n");
        prompt.push_str(input.input_context);
    }
    if let Some(content) = input.prerequisite_content.filter(|c| !c.trim().is_empty()) {
        prompt.push_str("\n\nReference material:\n");
        prompt.push_str(content);
    }
    prompt
}

/// Merge instruction followed by each surviving generation under its header
pub fn merge_prompt<'a, I>(merge_instruction: &str, results: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str, &'a str)>,
{
    let mut prompt = merge_instruction.to_string();
    for (provider, model, content) in results {
        prompt.push_str("\n\n");
        prompt.push_str(&merge_result_header(provider, model));
        prompt.push('\n');
        prompt.push_str(content);
    }
    prompt
}

/// Chain step input, optionally prefixed by the step's instruction
pub fn chain_step_prompt(instruction: Option<&str>, input: &str) -> String {
    match instruction.filter(|i| !i.trim().is_empty()) {
        Some(instruction) => format!("{instruction}\n\n{input}"),
        None => input.to_string(),
    }
}
