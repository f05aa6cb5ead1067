//! Prompt identity and generation-instruction builders.
//!
//! Everything here is pure string work: normalization and fingerprinting give
//! a story premise a stable identity, and the instruction builders assemble
//! the text sent to the generation providers each cycle.

use sha2::{Digest, Sha256};

/// Trim and collapse internal whitespace runs to single spaces.
pub fn normalize(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Deterministic content identity: hex SHA-256 of the normalized prompt.
///
/// This is a content hash, not a MAC; equal normalized prompts always map to
/// the same fingerprint regardless of who submits them.
pub fn fingerprint(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize(input).as_bytes());
    hex::encode(hasher.finalize())
}

/// Heuristic short title from a premise, used when the title model is
/// unavailable. First few words, capitalized, capped at 80 characters.
pub fn derive_title(premise: &str) -> String {
    let cleaned = normalize(premise);
    let mut title = cleaned
        .split(' ')
        .take(8)
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ");
    title.truncate(80);
    let trimmed = title.trim_end_matches([' ', ',', '.', ';', ':']);
    if trimmed.is_empty() {
        "Untitled Comic".to_string()
    } else {
        trimmed.to_string()
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// System prompt for the content-policy judgment.
pub const JUDGE_SYSTEM: &str = "You validate if a short story prompt can be illustrated as a \
daily, family-friendly comic. Reject illegal, explicit, hateful, or private data requests. \
Respond with JSON only: {\"is_valid\": boolean, \"reason\": string or null}.";

/// Build the user instruction for the content-policy judgment.
pub fn judge_instruction(premise: &str) -> String {
    format!("Prompt: {premise}\nDecide if it can be illustrated daily as a never-ending story arc.")
}

/// System prompt for title generation.
pub const TITLE_SYSTEM: &str = "You create a very short, catchy, family-friendly comic strip \
title in 3-8 words. Do not include quotes or punctuation at the ends. Respond with JSON only: \
{\"title\": string}.";

/// Build the user instruction for title generation.
pub fn title_instruction(premise: &str) -> String {
    format!("Prompt: {premise}\nReturn JSON with {{\"title\"}} only.")
}

/// Build the instruction that produces the next 4-panel direction.
///
/// When a previous direction exists it is appended as continuity context and
/// the model is told to preserve characters, setting, and style; otherwise
/// the model is told to establish them freshly.
pub fn direction_instruction(premise: &str, previous_direction: Option<&str>) -> String {
    let guidance = if previous_direction.is_some() {
        "Continue the ongoing story. Keep continuity of characters, props, setting, and visual \
design from the previous episode. Preserve character outfits, hairstyles, proportions, and \
recurring props. Build a small progression today without introducing style changes."
    } else {
        "Start the story with an opening 4-panel mini beat. Establish the main characters \
quickly and clearly with distinctive, memorable visual traits that can be kept consistent in \
future episodes."
    };

    let mut lines = vec![
        "You write a concise 4-panel plan for a daily, family-friendly comic strip.".to_string(),
        "Return exactly 4 short numbered lines. For each panel, provide: VISUAL (brief \
action/beat) and DIALOG (one short quote to place in a speech bubble)."
            .to_string(),
        "Use this format strictly:".to_string(),
        "1) Panel 1 - VISUAL: <brief description>. DIALOG: \"<short line>\"".to_string(),
        "2) Panel 2 - VISUAL: <brief description>. DIALOG: \"<short line>\"".to_string(),
        "3) Panel 3 - VISUAL: <brief description>. DIALOG: \"<short line>\"".to_string(),
        "4) Panel 4 - VISUAL: <brief description>. DIALOG: \"<short line>\"".to_string(),
        "Constraints: keep dialog family-friendly, 3-10 words per panel, natural speech, no \
narration, no sound effects, no emojis."
            .to_string(),
        guidance.to_string(),
        format!("Series premise: {premise}"),
    ];
    if let Some(previous) = previous_direction {
        lines.push(format!("Previous episode directions: {previous}"));
    }
    lines.join("\n")
}

/// Compose the render instruction for the image provider from the series
/// premise and the freshly generated panel direction.
///
/// Encodes the fixed 2x2 panel grid, style-continuity language, and the
/// verbatim-dialog lettering constraint. Pure string assembly.
pub fn render_instruction(premise: &str, direction: &str) -> String {
    [
        "Create a single square image that is a classic 4-panel comic (2x2 grid).",
        "Maintain consistent characters, environment, props, and art style across all panels.",
        "If a reference image from a previous episode is provided, strictly replicate its \
visual style and character designs:",
        "- Match line weight, color palette, inking, and rendering style.",
        "- Keep the same character faces, hairstyles, proportions, outfits, and iconic details.",
        "- Keep recurring props and backgrounds consistent unless the story changes them \
explicitly.",
        "Do not redesign characters or shift the art style between episodes unless explicitly \
instructed.",
        "Readable facial expressions, clear poses, and family-friendly tone.",
        "High contrast line art, flat colors, comic inking, no watermark, professional look.",
        "Layout: equal-sized panels with thin gutters; ensure text/visuals fit each panel.",
        "Include clear speech bubbles with the exact dialog lines provided for each panel.",
        "Render legible lettering inside bubbles; do not paraphrase or invent text.",
        "Place bubbles to avoid covering key faces/hands; use standard comic tails toward the \
speaking character.",
        &format!("Series premise: {premise}"),
        "Describe and render these panels faithfully. Each panel includes a short DIALOG line \
to render in a speech bubble:",
        direction,
    ]
    .join("\n")
}

/// Text part sent alongside a reference image so the model treats it as the
/// visual-continuity source rather than subject matter.
pub const REFERENCE_IMAGE_NOTE: &str = "Reference image attached: replicate its visual style \
and keep characters consistent (faces, hairstyles, proportions, outfits, colors). Do not \
redesign or change art style.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_collapses_whitespace() {
        assert_eq!(normalize("  a  banana\t detective \n"), "a banana detective");
        assert_eq!(normalize("already clean"), "already clean");
        assert_eq!(normalize("   "), "");
    }

    #[test]
    fn test_fingerprint_ignores_whitespace_runs() {
        let a = fingerprint("A banana detective solving a mystery in space");
        let b = fingerprint("  A  banana   detective solving a mystery in space ");
        let c = fingerprint("A banana\tdetective\nsolving a mystery in space");
        assert_eq!(a, b);
        assert_eq!(a, c);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_fingerprint_differs_on_content() {
        assert_ne!(fingerprint("a banana"), fingerprint("a plantain"));
    }

    #[test]
    fn test_derive_title() {
        let title = derive_title("a banana detective solving a mystery in space, daily");
        assert_eq!(title, "A Banana Detective Solving A Mystery In Space");
        assert!(title.len() <= 80);
    }

    #[test]
    fn test_derive_title_empty() {
        assert_eq!(derive_title("   "), "Untitled Comic");
    }

    #[test]
    fn test_direction_instruction_first_episode() {
        let instruction = direction_instruction("a banana detective", None);
        assert!(instruction.contains("Establish the main characters"));
        assert!(instruction.contains("Series premise: a banana detective"));
        assert!(!instruction.contains("Previous episode directions"));
    }

    #[test]
    fn test_direction_instruction_carries_continuity() {
        let instruction =
            direction_instruction("a banana detective", Some("1) Panel 1 - VISUAL: peel"));
        assert!(instruction.contains("Keep continuity of characters"));
        assert!(instruction.contains("Previous episode directions: 1) Panel 1 - VISUAL: peel"));
    }

    #[test]
    fn test_render_instruction_composition() {
        let instruction = render_instruction("a banana detective", "1) Panel 1 ...");
        assert!(instruction.contains("4-panel comic (2x2 grid)"));
        assert!(instruction.contains("do not paraphrase or invent text"));
        assert!(instruction.contains("Series premise: a banana detective"));
        assert!(instruction.ends_with("1) Panel 1 ..."));
    }
}
