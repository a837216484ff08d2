//! Keyword-matched canned replies for when no model is available.
//!
//! Categories are scanned in declaration order and the first one with any
//! keyword contained in the lowercased message wins. Keywords are plain
//! substrings with no word-boundary check, so "rust" also matches inside
//! "trust". Keywords are chosen so that none contains a keyword of an
//! earlier category; otherwise the later one could never win.

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::debug;

use larynx_core::{Generation, GenerationError, GenerationOptions, InputKind, ResponseStrategy};

pub const RULES_MODEL_IDENTIFIER: &str = "larynx-rules-v1";

/// One topic in the knowledge table.
#[derive(Debug)]
pub struct Category {
    pub name: &'static str,
    /// Lowercase keywords.
    pub patterns: &'static [&'static str],
    pub responses: &'static [&'static str],
}

/// Built-in table, in match priority order.
pub static KNOWLEDGE: &[Category] = &[
    Category {
        name: "greetings",
        patterns: &["hello", "hi there", "hiya", "hey there", "greetings", "good morning", "good afternoon", "good evening", "howdy"],
        responses: &[
            "Hello! How can I help you today?",
            "Hi there! What would you like to talk about?",
            "Hey! I'm here and ready to help. What's on your mind?",
        ],
    },
    Category {
        name: "science",
        patterns: &["science", "physics", "chemistry", "biology", "atom", "molecule", "experiment", "gravity"],
        responses: &[
            "Science is all about asking questions and testing ideas. Physics, chemistry and biology each explain a different layer of how the world works.",
            "Great science question! Most scientific understanding comes from careful observation, a testable hypothesis and repeatable experiments.",
            "That touches on some fascinating science. The core principles are well studied, and I'm happy to walk through the basics with you.",
        ],
    },
    Category {
        name: "technology",
        patterns: &["technology", "computer", "quantum", "artificial intelligence", "machine learning", "robot", "internet", "software"],
        responses: &[
            "Technology moves fast. Computers, networks and machine learning keep reshaping how we work and communicate.",
            "That's an interesting technology topic. Most modern systems build on decades of work in hardware, software and networking.",
            "Tech questions are fun! Whether it's AI, quantum computing or the internet, the fundamentals are worth understanding first.",
        ],
    },
    Category {
        name: "programming",
        patterns: &["code", "coding", "programming", "rust", "python", "javascript", "function", "compile", "debug"],
        responses: &[
            "Programming is problem solving with precise instructions. Start with a small working example, then grow it step by step.",
            "For coding questions it helps to break the problem down, write a test for the behavior you want, and iterate.",
            "Good question about programming! Reading error messages carefully and checking assumptions solves most bugs.",
        ],
    },
    Category {
        name: "mathematics",
        patterns: &["math", "equation", "algebra", "calculus", "geometry", "statistics", "probability"],
        responses: &[
            "Mathematics rewards patience. Writing down what you know and what you want to find is usually the best first step.",
            "Math builds on a few core ideas. Once the definitions are clear, most problems become much more approachable.",
            "That's a nice math topic. Working through a concrete example often makes the abstract rule click.",
        ],
    },
    Category {
        name: "history",
        patterns: &["history", "historical", "ancient", "century", "empire", "civilization"],
        responses: &[
            "History helps explain the present. Events rarely have a single cause, so it's worth looking at several perspectives.",
            "Historical questions are fascinating. Primary sources and the context of the era are key to understanding what happened.",
            "That's an interesting piece of history. Many civilizations left records that historians still debate today.",
        ],
    },
    Category {
        name: "help",
        patterns: &["help", "assist", "support", "how do i", "can you"],
        responses: &[
            "I'm happy to help! Could you tell me a bit more about what you need?",
            "Sure, I can try to assist. What exactly are you working on?",
            "Let's figure it out together. Share some details and I'll do my best.",
        ],
    },
    Category {
        name: "gratitude",
        patterns: &["thank", "thanks", "appreciate"],
        responses: &[
            "You're welcome! Let me know if there's anything else.",
            "Glad I could help!",
            "Anytime! Feel free to ask if more questions come up.",
        ],
    },
    Category {
        name: "farewell",
        patterns: &["bye", "goodbye", "see you", "farewell"],
        responses: &[
            "Goodbye! Have a great day.",
            "See you later! Take care.",
            "Bye for now! Come back anytime.",
        ],
    },
];

/// Templates for unmatched messages; `{message}` is replaced with the
/// caller's original text.
pub static FALLBACK_TEMPLATES: &[&str] = &[
    "I understand you're asking about \"{message}\". I'm running in a lightweight mode right now, but I'd be glad to help if you can share more details.",
    "Thanks for your message: \"{message}\". Could you tell me a little more about what you'd like to know?",
    "You said: \"{message}\". That's an interesting point. What aspect would you like to explore?",
];

/// Strategy that classifies the raw message against a static table.
pub struct RuleBasedBackend {
    categories: &'static [Category],
    rng: Mutex<StdRng>,
}

impl RuleBasedBackend {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    pub fn with_rng(rng: StdRng) -> Self {
        Self::with_table(KNOWLEDGE, rng)
    }

    pub fn with_table(categories: &'static [Category], rng: StdRng) -> Self {
        Self {
            categories,
            rng: Mutex::new(rng),
        }
    }

    /// First category, in declaration order, with a keyword in `message`.
    pub fn classify(&self, message: &str) -> Option<&'static Category> {
        let normalized = message.to_lowercase();
        self.categories
            .iter()
            .find(|c| c.patterns.iter().any(|p| normalized.contains(p)))
    }

    /// Produce a reply. Total: never fails, never empty.
    pub fn respond(&self, message: &str) -> Generation {
        let category = self.classify(message);
        let mut rng = self.rng.lock();

        let content = category
            .and_then(|c| c.responses.choose(&mut *rng))
            .map(|reply| reply.to_string())
            .unwrap_or_else(|| {
                let template = FALLBACK_TEMPLATES
                    .choose(&mut *rng)
                    .copied()
                    .unwrap_or("You said: \"{message}\".");
                template.replace("{message}", message)
            });
        drop(rng);

        debug!(category = category.map(|c| c.name), "rule-based reply selected");

        Generation {
            tokens_used: content.split_whitespace().count() as u32,
            content,
        }
    }
}

impl Default for RuleBasedBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResponseStrategy for RuleBasedBackend {
    fn name(&self) -> &str {
        "rules"
    }

    fn model_identifier(&self) -> &str {
        RULES_MODEL_IDENTIFIER
    }

    fn input_kind(&self) -> InputKind {
        InputKind::RawMessage
    }

    async fn generate(
        &self,
        input: &str,
        _options: &GenerationOptions,
    ) -> Result<Generation, GenerationError> {
        Ok(self.respond(input))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn category_of(reply: &str) -> Option<&'static str> {
        KNOWLEDGE
            .iter()
            .find(|c| c.responses.contains(&reply))
            .map(|c| c.name)
    }

    #[test]
    fn hello_is_greeting() {
        let backend = RuleBasedBackend::seeded(7);
        let generation = backend.respond("hello");
        assert_eq!(category_of(&generation.content), Some("greetings"));
        assert_eq!(
            generation.tokens_used as usize,
            generation.content.split_whitespace().count()
        );
    }

    #[test]
    fn quantum_physics_is_science_every_time() {
        let backend = RuleBasedBackend::new();
        for _ in 0..50 {
            let generation = backend.respond("what is quantum physics");
            assert_eq!(category_of(&generation.content), Some("science"));
        }
    }

    #[test]
    fn earlier_category_wins() {
        static TABLE: &[Category] = &[
            Category {
                name: "first",
                patterns: &["alpha"],
                responses: &["from first"],
            },
            Category {
                name: "second",
                patterns: &["alpha", "beta"],
                responses: &["from second"],
            },
        ];
        let backend = RuleBasedBackend::with_table(TABLE, StdRng::seed_from_u64(1));
        assert_eq!(backend.respond("beta and alpha").content, "from first");
        assert_eq!(backend.respond("only beta").content, "from second");
    }

    #[test]
    fn matching_is_case_insensitive() {
        let backend = RuleBasedBackend::seeded(3);
        assert_eq!(backend.classify("Tell me about CHEMISTRY").map(|c| c.name), Some("science"));
    }

    #[test]
    fn unmatched_echoes_original_message() {
        let backend = RuleBasedBackend::seeded(11);
        let generation = backend.respond("Zzz QQQ");
        assert!(backend.classify("Zzz QQQ").is_none());
        assert!(generation.content.contains("\"Zzz QQQ\""), "got: {}", generation.content);
    }

    #[test]
    fn total_over_odd_inputs() {
        let backend = RuleBasedBackend::seeded(5);
        let long = "lorem ipsum ".repeat(10_000);
        for input in ["", "   ", "日本語のテキスト", "🦀🦀🦀", long.as_str()] {
            let generation = backend.respond(input);
            assert!(!generation.content.is_empty());
            assert_eq!(
                generation.tokens_used as usize,
                generation.content.split_whitespace().count()
            );
        }
    }

    #[test]
    fn seeded_backends_agree() {
        let a = RuleBasedBackend::seeded(42);
        let b = RuleBasedBackend::seeded(42);
        for msg in ["hello", "physics", "nothing known here zz"] {
            assert_eq!(a.respond(msg), b.respond(msg));
        }
    }

    #[test]
    fn replies_vary_within_category() {
        let backend = RuleBasedBackend::seeded(9);
        let replies: std::collections::HashSet<String> =
            (0..100).map(|_| backend.respond("hello").content).collect();
        assert!(replies.len() > 1);
    }

    #[test]
    fn short_keyword_matches_inside_words() {
        // "rust" inside "trust"; no word-boundary guard.
        let backend = RuleBasedBackend::seeded(2);
        assert_eq!(backend.classify("I trust you").map(|c| c.name), Some("programming"));
    }

    #[test]
    fn every_keyword_reaches_its_category() {
        let backend = RuleBasedBackend::seeded(2);
        for category in KNOWLEDGE {
            for pattern in category.patterns {
                assert_eq!(
                    backend.classify(pattern).map(|c| c.name),
                    Some(category.name),
                    "keyword {pattern:?} is shadowed"
                );
            }
        }
    }

    #[test]
    fn history_and_machine_learning_are_reachable() {
        let backend = RuleBasedBackend::seeded(2);
        assert_eq!(backend.classify("tell me some history").map(|c| c.name), Some("history"));
        assert_eq!(
            backend.classify("what is machine learning").map(|c| c.name),
            Some("technology")
        );
        assert_eq!(backend.classify("is this thing on").map(|c| c.name), None);
    }

    #[test]
    fn every_category_has_replies() {
        for category in KNOWLEDGE {
            assert!(!category.responses.is_empty(), "{} has no replies", category.name);
            assert!(category
                .patterns
                .iter()
                .all(|p| *p == p.to_lowercase()));
        }
    }

    #[tokio::test]
    async fn strategy_ignores_options() {
        let backend = RuleBasedBackend::seeded(1);
        let options = GenerationOptions {
            max_tokens: 1,
            temperature: 2.0,
            ..Default::default()
        };
        let generation = backend.generate("hello", &options).await.unwrap();
        assert!(generation.tokens_used > 1);
        assert_eq!(backend.input_kind(), InputKind::RawMessage);
        assert_eq!(backend.model_identifier(), RULES_MODEL_IDENTIFIER);
    }
}
