use crate::memory::Attribute;

/// Isolation instruction used to turn a full image into a reference for one
/// attribute slot.
pub fn extraction_prompt(attribute: Attribute) -> &'static str {
    match attribute {
        Attribute::Face => {
            "Extract only the face of the main person in this image. Produce a tight, front-facing head-and-shoulders crop on a plain neutral grey backdrop. Keep the identity, features, skin tone and hair exactly as in the source. No accessories added, no text, no borders."
        }
        Attribute::Dress => {
            "Extract only the outfit worn by the main person in this image. Show the complete garments as a flat-lay product photo on a plain white background with no person, no mannequin and no other objects. Keep colours, fabric, patterns and details exactly as in the source."
        }
        Attribute::Background => {
            "Recreate only the background of this image as an empty plate. Remove every person and foreground subject and fill the space naturally so the background looks untouched. Keep the composition, colours and lighting exactly as in the source."
        }
        Attribute::Environment => {
            "Recreate the environment of this image as a wide establishing shot with no people in it. Keep the location, architecture or landscape features, time of day, weather and lighting exactly as in the source."
        }
    }
}
