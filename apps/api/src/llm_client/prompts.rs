// Shared prompt constants used by the LLM client itself.
// Interview prompts live in interview/prompts.rs.

/// Prompt used to check that a Google key can actually generate content.
pub const KEY_VERIFICATION_PROMPT: &str = "Generate one test question";

/// Instruction appended to free-text prompts so replies come back unadorned.
pub const PLAIN_TEXT_INSTRUCTION: &str = "Return ONLY the requested text. \
    Do NOT add quotes, numbering, speaker labels, markdown, or explanations.";
