pub(crate) const AI_NAME: &str = "CineMatch AI";
pub(crate) const OWNER_NAME: &str = "the CineMatch team";

/// Longest message the composer will submit, matching the chat form limit.
pub(crate) const MAX_MESSAGE_CHARS: usize = 2000;

pub(crate) fn welcome_message() -> String {
    format!("Hello! I'm {AI_NAME}, a personalized movie assistant created by {OWNER_NAME}.")
}

/// Canned starter prompts; Tab cycles them into the composer without sending.
pub(crate) const QUICK_PROMPTS: &[(&str, &str)] = &[
    (
        "light comedy",
        "Recommend a light, funny comedy to watch after a long day.",
    ),
    (
        "tense thriller",
        "Suggest a gripping, edge-of-the-seat thriller with great suspense.",
    ),
    (
        "emotional drama",
        "Give me a heartfelt drama that focuses on strong characters.",
    ),
    (
        "feel-good family movie",
        "Recommend a warm, family-friendly movie for a cozy evening.",
    ),
];
