//! Rule sets that constrain how an agent phrases its replies.

use std::fmt::Write as _;

use crate::reply::Schema;

/// A named, ordered list of natural-language rules attached to an agent.
///
/// Rule sets are immutable once constructed.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RuleSet {
    name: String,
    rules: Vec<String>,
}

impl RuleSet {
    /// Creates a rule set from its name and rules.
    pub fn new<N, I, R>(name: N, rules: I) -> Self
    where
        N: Into<String>,
        I: IntoIterator<Item = R>,
        R: Into<String>,
    {
        Self {
            name: name.into(),
            rules: rules.into_iter().map(Into::into).collect(),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn rules(&self) -> &[String] {
        &self.rules
    }

    /// Renders the rule set as a block of system instructions.
    pub fn to_instructions(&self) -> String {
        let mut out = format!(
            "Rule set \"{}\". Always follow these rules:",
            self.name
        );
        for (idx, rule) in self.rules.iter().enumerate() {
            // Writing to a `String` never fails.
            let _ = write!(out, "\n{}. {rule}", idx + 1);
        }
        out
    }
}

const NO_FENCES: &str = "Never wrap your response with ```";
const DONE_CHATTING: &str = "If it sounds like the person is done chatting, \
    set 'continue_chatting' to false, otherwise it is true";

impl Schema {
    /// Returns the canonical rule set asking the model to answer in this
    /// schema.
    pub fn ruleset(self) -> RuleSet {
        match self {
            Schema::Chat => RuleSet::new(
                "json_ruleset",
                [
                    "Respond in plain text only with valid JSON objects that \
                     have the following keys: response, continue_chatting.",
                    NO_FENCES,
                    "The 'response' value should be a string that can be \
                     safely converted to markdown format. Use '\\n' for new \
                     lines.",
                    DONE_CHATTING,
                ],
            ),
            Schema::ScoredChat => RuleSet::new(
                "scored_ruleset",
                [
                    "Respond in plain text only with valid JSON objects that \
                     have the following keys: response, continue_chatting, \
                     score, distribution.",
                    NO_FENCES,
                    "The 'response' value should be a string that can be \
                     safely converted to markdown format. Use '\\n' for new \
                     lines.",
                    "'score' is initially 50. Use the user's desired budget \
                     to decide a score between 50 and 100.",
                    "'distribution' should be a float between 0.33 and 0.67.",
                    DONE_CHATTING,
                ],
            ),
            Schema::Question => RuleSet::new(
                "question_ruleset",
                [
                    "Respond in plain text only with valid JSON objects that \
                     have the following keys: question, continue_chatting.",
                    NO_FENCES,
                    "The 'question' value should be a string that can be \
                     safely converted to markdown format. Use '\\n' for new \
                     lines.",
                    DONE_CHATTING,
                ],
            ),
            Schema::Summary => RuleSet::new(
                "reader_ruleset",
                [
                    "Respond in plain text only with valid JSON objects that \
                     have the following keys: summary, continue_chatting.",
                    NO_FENCES,
                    "The 'summary' value should be a string that can be \
                     safely converted to markdown format. Use '\\n' for new \
                     lines.",
                    DONE_CHATTING,
                ],
            ),
        }
    }
}
