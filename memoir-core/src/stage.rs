//! The seven life stages that segment an interview.

use crate::author::AuthorContext;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A fixed period of life, in chronological order.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum LifeStage {
    #[default]
    Childhood,
    Adolescence,
    Youth,
    Adulthood,
    MiddleAge,
    Present,
    FutureWishes,
}

impl LifeStage {
    /// All stages in interview order.
    pub const ALL: [LifeStage; 7] = [
        LifeStage::Childhood,
        LifeStage::Adolescence,
        LifeStage::Youth,
        LifeStage::Adulthood,
        LifeStage::MiddleAge,
        LifeStage::Present,
        LifeStage::FutureWishes,
    ];

    /// Zero-based position in the cycle.
    pub fn index(self) -> usize {
        match self {
            LifeStage::Childhood => 0,
            LifeStage::Adolescence => 1,
            LifeStage::Youth => 2,
            LifeStage::Adulthood => 3,
            LifeStage::MiddleAge => 4,
            LifeStage::Present => 5,
            LifeStage::FutureWishes => 6,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// The following stage; the final stage wraps back to childhood.
    pub fn next(self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    pub fn is_last(self) -> bool {
        self == LifeStage::FutureWishes
    }

    /// Display label.
    pub fn label(self) -> &'static str {
        match self {
            LifeStage::Childhood => "Childhood",
            LifeStage::Adolescence => "Adolescence",
            LifeStage::Youth => "Youth",
            LifeStage::Adulthood => "Adulthood",
            LifeStage::MiddleAge => "Middle age",
            LifeStage::Present => "The present",
            LifeStage::FutureWishes => "Future wishes",
        }
    }

    /// Storage key.
    pub fn as_str(self) -> &'static str {
        match self {
            LifeStage::Childhood => "childhood",
            LifeStage::Adolescence => "adolescence",
            LifeStage::Youth => "youth",
            LifeStage::Adulthood => "adulthood",
            LifeStage::MiddleAge => "middle_age",
            LifeStage::Present => "present",
            LifeStage::FutureWishes => "future_wishes",
        }
    }

    /// Parse a storage key or a display label.
    pub fn parse(s: &str) -> Option<Self> {
        let key = s.trim().to_lowercase().replace([' ', '-'], "_");
        Self::ALL
            .into_iter()
            .find(|stage| stage.as_str() == key || stage.label().to_lowercase().replace(' ', "_") == key)
    }

    /// Rough span of life the stage covers, used to orient the model.
    pub fn span_hint(self) -> &'static str {
        match self {
            LifeStage::Childhood => "birth to about age 12: family, home, early school, play",
            LifeStage::Adolescence => "about 12 to 18: school years, friends, first independence",
            LifeStage::Youth => "about 18 to 30: study, first work, leaving home, early love",
            LifeStage::Adulthood => "about 30 to 45: career, partnership, raising a family",
            LifeStage::MiddleAge => "about 45 to 65: responsibility, change, caring for others",
            LifeStage::Present => "life as it is today: daily rhythm, people, what matters now",
            LifeStage::FutureWishes => "hopes, unfinished plans, and what should be passed on",
        }
    }

    /// Opening question for the stage.
    pub fn kickoff_question(self, author: &AuthorContext) -> String {
        let template = match self {
            LifeStage::Childhood => "Where did {whose} childhood unfold, and what do you picture first when you think of that home?",
            LifeStage::Adolescence => "What was school like during {whose} teenage years, and who was at the center of that world?",
            LifeStage::Youth => "What was the first big decision of {whose} young adult years, and how was it made?",
            LifeStage::Adulthood => "What work filled {whose} adult years, and how did it begin?",
            LifeStage::MiddleAge => "What changed most in {whose} life during middle age?",
            LifeStage::Present => "What does an ordinary day look like in {whose} life now?",
            LifeStage::FutureWishes => "What hope for the years ahead matters most in {whose} life?",
        };
        author.render(template)
    }

    /// Question used whenever generation fails for the stage.
    pub fn fallback_question(self, author: &AuthorContext) -> String {
        let template = match self {
            LifeStage::Childhood => "Which person from {whose} childhood comes to mind first, and what were they usually doing?",
            LifeStage::Adolescence => "What is one moment from {whose} teenage years that still feels vivid?",
            LifeStage::Youth => "Where did {whose} early twenties take place, and what did an ordinary day look like?",
            LifeStage::Adulthood => "Who shared {whose} home during the adult years, and what was that household like?",
            LifeStage::MiddleAge => "What responsibility weighed most on {whose} shoulders in middle age?",
            LifeStage::Present => "Who is closest in {whose} life these days, and what do they do together?",
            LifeStage::FutureWishes => "What would {whose} wish be for the people who come after?",
        };
        author.render(template)
    }
}

impl fmt::Display for LifeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
