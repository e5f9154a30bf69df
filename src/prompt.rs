//! Instruction composition and completion normalization.
//!
//! Both functions are pure so the text sent to a backend can be tested without one.

use crate::constants::INSTRUCTION_PREAMBLE;

/// Wraps the user's request in the fixed instruction template.
///
/// The request is embedded verbatim between double quotes and is followed by a
/// trailing `Formula:` cue for the backend to complete.
pub fn compose_instruction(user_request: &str) -> String {
    format!("{INSTRUCTION_PREAMBLE}\nUser request: \"{user_request}\"\nFormula:")
}

/// Trims surrounding whitespace from a backend completion.
///
/// Returns `None` when nothing usable is left.
pub fn normalize_completion(completion: &str) -> Option<String> {
    let formula = completion.trim();
    if formula.is_empty() {
        None
    } else {
        Some(formula.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instruction_embeds_request_verbatim() {
        let request = "  average of B2:B20, ignoring \"N/A\" ";
        let instruction = compose_instruction(request);
        assert!(instruction.contains(&format!("User request: \"{request}\"")));
        assert!(instruction.starts_with("You are an expert in Microsoft Excel formulas."));
        assert!(instruction.ends_with("Formula:"));
    }

    #[test]
    fn instruction_forbids_prose_and_quotes() {
        let instruction = compose_instruction("anything");
        assert!(instruction.contains("provide only the Excel formula"));
        assert!(instruction.contains("Do not explain it"));
        assert!(instruction.contains("do not wrap it in quotes"));
    }

    #[test]
    fn instruction_is_deterministic() {
        assert_eq!(
            compose_instruction("count blanks in C"),
            compose_instruction("count blanks in C")
        );
        assert_ne!(compose_instruction("a"), compose_instruction("b"));
    }

    #[test]
    fn normalization_trims_whitespace() {
        assert_eq!(
            normalize_completion("  =SUM(A1:A10)  ").as_deref(),
            Some("=SUM(A1:A10)")
        );
        assert_eq!(
            normalize_completion("\n=VLOOKUP(A2,Sheet2!A:B,2,FALSE)\n").as_deref(),
            Some("=VLOOKUP(A2,Sheet2!A:B,2,FALSE)")
        );
    }

    #[test]
    fn normalization_is_idempotent() {
        let once = normalize_completion("  =SUM(A1:A10)  ").unwrap();
        assert_eq!(normalize_completion(&once).as_deref(), Some(once.as_str()));
    }

    #[test]
    fn normalization_leaves_quotes_alone() {
        assert_eq!(
            normalize_completion(" \"=A1+B1\" ").as_deref(),
            Some("\"=A1+B1\"")
        );
    }

    #[test]
    fn blank_completion_is_unusable() {
        assert_eq!(normalize_completion(""), None);
        assert_eq!(normalize_completion(" \n\t "), None);
    }
}
