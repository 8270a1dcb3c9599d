//! Prompt refinement: rewrites a casual request as a detailed edit prompt.

/// Builds the instruction that asks the text model to refine `input`.
pub fn refinement_instruction(input: &str) -> String {
    format!(
        "You are an expert prompt engineer for image-to-image character editing. \
Rewrite the following casual request as a single high-fidelity prompt for an \
image-editing model. Describe the facial expression precisely, keep anatomy \
(hands, fingers, proportions) accurate, and require the background to stay fully \
transparent. Reply with the prompt only, without quotes or commentary.\n\n\
Request: {}",
        input.trim()
    )
}

/// Normalizes the model's reply before it replaces the prompt.
pub fn clean_refinement(reply: &str) -> String {
    reply.trim().to_string()
}
