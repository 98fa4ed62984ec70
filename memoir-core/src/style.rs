//! Writer-chosen style knobs for questions and narrative.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    #[default]
    Warm,
    Calm,
    Plain,
    Lively,
}

impl Tone {
    pub fn description(self) -> &'static str {
        match self {
            Tone::Warm => "warm and affectionate, like a letter to family",
            Tone::Calm => "calm and reflective, unhurried",
            Tone::Plain => "plain and direct, no flourishes",
            Tone::Lively => "lively and vivid, with everyday humor where the facts allow",
        }
    }
}

/// How much the model may infer beyond what was said.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strictness {
    Strict,
    #[default]
    Moderate,
    Flexible,
}

impl Strictness {
    /// Constraint for fact extraction.
    pub fn extraction_rule(self) -> &'static str {
        match self {
            Strictness::Strict => "Zero inference: record only what the writer literally said. Do not resolve vague references, do not infer dates, motives or feelings.",
            Strictness::Moderate => "Record what the writer said. You may resolve obvious references (\"that year\" to the year just mentioned) but add nothing else.",
            Strictness::Flexible => "Record what the writer said. You may state feelings the writer clearly implied, marked as the writer's impression, but never invent events, people, places or dates.",
        }
    }

    /// Constraint for question generation.
    pub fn question_rule(self) -> &'static str {
        match self {
            Strictness::Strict => "Never assume any fact that is not in the fact sheet or the conversation. Ask, do not presume.",
            Strictness::Moderate => "Do not presume facts; you may build on what was clearly said.",
            Strictness::Flexible => "You may gently build on what was implied, but never state an unconfirmed fact as true.",
        }
    }

    /// Constraint for the literary rewrite.
    pub fn rewrite_rule(self) -> &'static str {
        match self {
            Strictness::Strict => "Use only the listed facts. Add no detail, no sensory description and no feeling that is not listed.",
            Strictness::Moderate => "Use only the listed facts. Connecting phrases are fine; new details are not.",
            Strictness::Flexible => "Stay with the listed facts. Light connective description is allowed, but no new people, places, dates or events.",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Concreteness {
    High,
    #[default]
    Medium,
    Low,
}

impl Concreteness {
    pub fn guidance(self) -> &'static str {
        match self {
            Concreteness::High => "Favor concrete scenes: names, places, objects and actions over summary.",
            Concreteness::Medium => "Balance concrete scenes with short reflective passages.",
            Concreteness::Low => "Favor reflection and meaning over scene detail.",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LengthPreference {
    Short,
    #[default]
    Medium,
    Long,
}

impl LengthPreference {
    /// Hard ceiling on narrative characters.
    pub fn char_ceiling(self) -> usize {
        match self {
            LengthPreference::Short => 500,
            LengthPreference::Medium => 800,
            LengthPreference::Long => 1200,
        }
    }

    /// Token budget for one narrative request.
    pub fn max_tokens(self) -> usize {
        match self {
            LengthPreference::Short => 400,
            LengthPreference::Medium => 600,
            LengthPreference::Long => 900,
        }
    }
}

/// A writer's style settings. Global per writer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleProfile {
    pub tone: Tone,
    pub strictness: Strictness,
    pub concreteness: Concreteness,
    pub length: LengthPreference,
    /// Free-text tone that replaces the preset when set.
    pub tone_override: Option<String>,
}

impl StyleProfile {
    pub fn with_tone(mut self, tone: Tone) -> Self {
        self.tone = tone;
        self
    }

    pub fn with_strictness(mut self, strictness: Strictness) -> Self {
        self.strictness = strictness;
        self
    }

    pub fn with_concreteness(mut self, concreteness: Concreteness) -> Self {
        self.concreteness = concreteness;
        self
    }

    pub fn with_length(mut self, length: LengthPreference) -> Self {
        self.length = length;
        self
    }

    pub fn with_tone_override(mut self, tone: impl Into<String>) -> Self {
        self.tone_override = Some(tone.into());
        self
    }

    pub fn tone_description(&self) -> &str {
        self.tone_override
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| self.tone.description())
    }

    /// Bullet list of rewrite rules.
    pub fn rewrite_rules(&self) -> String {
        format!(
            "- Tone: {}\n- Fidelity: {}\n- Detail: {}\n- Length: at most {} characters\n",
            self.tone_description(),
            self.strictness.rewrite_rule(),
            self.concreteness.guidance(),
            self.length.char_ceiling(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_ceilings() {
        assert_eq!(LengthPreference::Short.char_ceiling(), 500);
        assert_eq!(LengthPreference::Medium.char_ceiling(), 800);
        assert_eq!(LengthPreference::Long.char_ceiling(), 1200);
    }

    #[test]
    fn test_tone_override_wins() {
        let style = StyleProfile::default().with_tone_override("like grandma telling it at dinner");
        assert_eq!(style.tone_description(), "like grandma telling it at dinner");

        let blank = StyleProfile::default().with_tone_override("  ");
        assert_eq!(blank.tone_description(), Tone::Warm.description());
    }

    #[test]
    fn test_rewrite_rules_mention_ceiling() {
        let style = StyleProfile::default().with_length(LengthPreference::Short);
        assert!(style.rewrite_rules().contains("500 characters"));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let style: StyleProfile = serde_json::from_str(r#"{"strictness": "strict"}"#).unwrap();
        assert_eq!(style.strictness, Strictness::Strict);
        assert_eq!(style.length, LengthPreference::Medium);
    }
}
