//! Linear prompt assembly for completion-style models.

use crate::messages::{ConversationTurn, Role};

const HUMAN_TAG: &str = "Human: ";
const ASSISTANT_TAG: &str = "Assistant: ";
/// Completion cue the model continues from.
const CUE: &str = "\nAssistant:";

/// Build the prompt: one tagged line per prior turn, then the message and cue.
///
/// No length capping happens here; the backend owns its token budget.
pub fn assemble(message: &str, context: &[ConversationTurn]) -> String {
    let mut prompt = String::new();

    for turn in context {
        let tag = match turn.role {
            Role::User => HUMAN_TAG,
            Role::Assistant => ASSISTANT_TAG,
        };
        prompt.push_str(tag);
        prompt.push_str(&turn.content);
        prompt.push('\n');
    }

    prompt.push_str(HUMAN_TAG);
    prompt.push_str(message);
    prompt.push_str(CUE);
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_context_is_two_lines() {
        let prompt = assemble("hello", &[]);
        assert_eq!(prompt, "Human: hello\nAssistant:");
        assert_eq!(prompt.lines().count(), 2);
    }

    #[test]
    fn prior_turns_in_order() {
        let context = vec![
            ConversationTurn::user("Hi"),
            ConversationTurn::assistant("Hello!"),
        ];
        assert_eq!(
            assemble("How are you?", &context),
            "Human: Hi\nAssistant: Hello!\nHuman: How are you?\nAssistant:"
        );
    }

    #[test]
    fn one_line_per_turn_then_single_cue() {
        let context = vec![
            ConversationTurn::user("a"),
            ConversationTurn::user("b"),
            ConversationTurn::assistant("c"),
            ConversationTurn::user("d"),
        ];
        let prompt = assemble("final", &context);
        let lines: Vec<&str> = prompt.lines().collect();

        assert_eq!(lines.len(), context.len() + 2);
        assert_eq!(&lines[..4], &["Human: a", "Human: b", "Assistant: c", "Human: d"]);
        assert_eq!(lines[4], "Human: final");
        assert_eq!(lines[5], "Assistant:");
        assert!(prompt.ends_with("\nAssistant:"));
        assert_eq!(prompt.matches("Human: final").count(), 1);
    }

    #[test]
    fn assembly_is_idempotent() {
        let context = vec![ConversationTurn::user("x"), ConversationTurn::assistant("y")];
        assert_eq!(assemble("z", &context), assemble("z", &context));
    }

    #[test]
    fn lenient_role_becomes_human_line() {
        let turn: ConversationTurn =
            serde_json::from_str(r#"{"role":"narrator","content":"once upon"}"#).unwrap();
        assert_eq!(assemble("go on", &[turn]), "Human: once upon\nHuman: go on\nAssistant:");
    }
}
