//! Image synthesis instruction.

/// Builds the three-part edit instruction for the image model.
pub fn synthesis_instruction(modification: &str) -> String {
    format!(
        "Edit the character in the provided image.\n\
1. Preserve the character's identity, face, clothing, hairstyle and overall pose unless \
the modification below says otherwise.\n\
2. Preserve the fully transparent background. Do not add scenery, shadows or a backdrop.\n\
3. Apply this modification: {}",
        modification.trim()
    )
}
