// All LLM prompt constants for the Interview module.
// Reuses cross-cutting fragments from llm_client::prompts.

/// Question generation prompt. Replace `{job_description}` before sending.
pub const QUESTIONS_PROMPT_TEMPLATE: &str = r#"Generate 8 technical interview questions based on this job description.
Return ONLY a JSON array of question strings using this exact format:
["First question?", "Second question?", ...]
Do not include any explanations or formatting.
Job description: {job_description}"#;

/// Appended to the question prompt for Google, which drifts from the array format more often.
pub const GOOGLE_JSON_REMINDER: &str =
    "\nRemember to return ONLY the JSON array without any additional text.";

/// Greeting prompt. Replace `{job_description}` and `{plain_text_instruction}`.
pub const GREETING_PROMPT_TEMPLATE: &str = r#"You are a friendly, professional interviewer opening a job interview.
Write a short greeting (one or two sentences) that welcomes the candidate and names the role described below.
{plain_text_instruction}
Job description: {job_description}"#;

/// Follow-up prompt. Replace `{job_description}`, `{planned_topics}`, `{history}`
/// and `{plain_text_instruction}`.
pub const FOLLOW_UP_PROMPT_TEMPLATE: &str = r#"You are conducting a technical job interview.
Job description: {job_description}

Topics you planned to cover:
{planned_topics}

Most recent conversation:
{history}

Ask the next interview question. Build on the candidate's last answer when it reveals something worth probing; otherwise move on to an uncovered topic. Ask exactly one question.
{plain_text_instruction}"#;
