// Shared prompt fragments.
// Each module that talks to the model keeps its own prompts.rs next to it;
// only cross-cutting instructions live here.

/// Appended to every prompt whose output is read aloud to the candidate.
pub const SPOKEN_OUTPUT_INSTRUCTION: &str = "Your reply will be converted to speech. \
    Respond in plain sentences only. Do NOT use markdown, bullet points, asterisks or \
    emojis.";
