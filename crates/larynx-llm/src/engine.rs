use larynx_core::GenerationOptions;

/// Raw output of one completion call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
    /// Engine-reported completion token count.
    pub completion_tokens: u32,
}

/// A loaded local inference engine.
///
/// Calls are synchronous and may take seconds; callers run them on a
/// blocking worker. Implementations must tolerate concurrent `complete`
/// calls, serializing internally if they need to.
pub trait InferenceEngine: Send + Sync {
    fn complete(&self, prompt: &str, options: &GenerationOptions) -> Result<Completion, String>;
}

/// Byte offset of the earliest stop sequence in `text`, if any.
pub fn stop_index(text: &str, stops: &[String]) -> Option<usize> {
    stops
        .iter()
        .filter(|s| !s.is_empty())
        .filter_map(|s| text.find(s.as_str()))
        .min()
}

/// Cut `text` at the earliest stop sequence.
pub fn truncate_at_stop<'a>(text: &'a str, stops: &[String]) -> &'a str {
    match stop_index(text, stops) {
        Some(idx) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dialogue_stops() -> Vec<String> {
        GenerationOptions::default().stop_sequences
    }

    #[test]
    fn no_stop_keeps_text() {
        assert_eq!(truncate_at_stop(" fine, thanks", &dialogue_stops()), " fine, thanks");
    }

    #[test]
    fn cuts_fabricated_next_turn() {
        let text = " I'm fine.\nHuman: and you?\nAssistant: great";
        assert_eq!(truncate_at_stop(text, &dialogue_stops()), " I'm fine.\n");
    }

    #[test]
    fn earliest_stop_wins() {
        let text = "abc</s>def Assistant: ghi";
        assert_eq!(truncate_at_stop(text, &dialogue_stops()), "abc");
        assert_eq!(stop_index("Assistant: x Human:", &dialogue_stops()), Some(0));
    }

    #[test]
    fn empty_stop_sequences_are_ignored() {
        assert_eq!(truncate_at_stop("hello", &[String::new()]), "hello");
    }
}
