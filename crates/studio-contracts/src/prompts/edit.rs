pub fn build_edit_prompt(user_instruction: &str) -> String {
    let instruction = user_instruction.trim();
    let instruction = if instruction.is_empty() {
        "Make a subtle improvement to the image."
    } else {
        instruction
    };
    format!(
        "Edit the supplied image.\n\
         Highest priority: preserve the facial identity of every person exactly. \
         Face shape, eyes, nose, mouth, skin tone and age must not change.\n\
         Requested edit: {instruction}\n\
         Change only what the edit requires and leave everything else untouched.\n\
         If the edit conflicts with identity preservation, keep the identity and apply the edit as far as possible.\n\
         Keep the original framing and aspect ratio. No frames, borders or watermarks.\n"
    )
}
