//! Prompt construction with attempt-driven instruction escalation.

use crate::config::RunConfig;

/// Builds the prompt for one attempt.
///
/// The instruction intensity escalates with the attempt number on its own,
/// independent of any feedback block appended from earlier failures: the
/// first attempt asks politely, later attempts demand bare JSON.
#[must_use]
pub fn build_prompt(config: &RunConfig, attempt: u32, feedback: Option<&str>) -> String {
    let mut prompt = String::new();

    if let Some(context) = config.context() {
        prompt.push_str("Context:\n");
        prompt.push_str(context);
        prompt.push_str("\n\n");
    }

    prompt.push_str("Extract structured data from the input below.");
    if let Some(lens) = config.lens() {
        prompt.push_str(" Focus on: ");
        prompt.push_str(lens);
        prompt.push('.');
    }
    prompt.push_str("\n\n");

    if let Some(schema) = config.schema().describe() {
        prompt.push_str("Output schema (JSON Schema):\n");
        prompt.push_str(
            &serde_json::to_string_pretty(&schema).unwrap_or_else(|_| schema.to_string()),
        );
        prompt.push_str("\n\n");
    }

    prompt.push_str("Input:\n");
    let input = config.input();
    prompt.push_str(&serde_json::to_string_pretty(input).unwrap_or_else(|_| input.to_string()));
    prompt.push_str("\n\n");

    if let Some(example) = config.example() {
        prompt.push_str("Example output:\n");
        prompt.push_str(
            &serde_json::to_string_pretty(example).unwrap_or_else(|_| example.to_string()),
        );
        prompt.push_str("\n\n");
    }

    prompt.push_str(intensity_instruction(attempt));
    prompt.push('\n');

    if let Some(feedback) = feedback {
        prompt.push('\n');
        prompt.push_str(feedback);
    }

    prompt
}

/// Output instruction for the given attempt number, escalating in intensity.
#[must_use]
pub const fn intensity_instruction(attempt: u32) -> &'static str {
    match attempt {
        0 | 1 => "Respond with a JSON object that conforms to the schema.",
        2 => "Respond with ONLY a JSON object that conforms to the schema. No prose.",
        _ => {
            "Your ENTIRE response must be a single JSON object conforming to the schema. \
             It must start with '{' and end with '}'. Nothing else."
        }
    }
}
