//! Rule-based lifecycle classification.
//!
//! Rules are kept in precedence order (offer, rejection, interview, received)
//! and evaluated top-down; the first stage with a matching pattern wins.

use regex::{Regex, RegexBuilder};
use tracing::debug;

use super::domain::LifecycleStage;

const DEFAULT_RULES: &[(LifecycleStage, &[&str])] = &[
    (
        LifecycleStage::Offer,
        &[
            r"pleased\s+to\s+(?:offer|extend)",
            r"job\s+offer",
            r"offer\s+of\s+employment",
            r"congratulations",
            r"we\s+would\s+like\s+to\s+offer\s+you",
        ],
    ),
    (
        LifecycleStage::Rejection,
        &[
            r"unfortunately",
            r"we\s+regret\s+to\s+inform",
            r"after\s+careful\s+consideration",
            r"we\s+have\s+decided\s+to\s+move\s+forward\s+with\s+other",
            r"not\s+selected\s+for\s+(?:this\s+)?position",
            r"we\s+will\s+not\s+be\s+moving\s+forward",
            r"position\s+has\s+been\s+filled",
        ],
    ),
    (
        LifecycleStage::Interview,
        &[
            r"interview(?:s|ing)?",
            r"schedule\s+(?:a\s+)?(?:call|meeting)",
            r"next\s+(?:steps?|rounds?)",
            r"would\s+like\s+to\s+(?:speak|talk)\s+with\s+you",
            r"phone\s+(?:screen|call)",
            r"video\s+(?:call|interview)",
        ],
    ),
    (
        LifecycleStage::Received,
        &[
            r"thank\s+you\s+for\s+(?:your\s+)?(?:interest|applying)",
            r"thanks\s+for\s+applying",
            r"application\s+(?:has\s+been\s+)?received",
            r"we\s+have\s+received\s+your\s+application",
            r"your\s+application\s+for",
            r"application\s+confirmation",
        ],
    ),
];

#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    #[error("invalid pattern '{pattern}' for stage {stage}: {source}")]
    InvalidPattern {
        stage: LifecycleStage,
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("{0} is the fallback stage and cannot carry patterns")]
    FallbackStage(LifecycleStage),
}

#[derive(Debug, Clone)]
struct StagePattern {
    source: String,
    regex: Regex,
}

#[derive(Debug, Clone)]
struct StageRule {
    stage: LifecycleStage,
    patterns: Vec<StagePattern>,
}

#[derive(Debug, Clone)]
pub struct PatternMatcher {
    rules: Vec<StageRule>,
}

impl PatternMatcher {
    /// Matcher without any rules; every text classifies as `unknown`.
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Matcher seeded with the built-in job-application phrases.
    pub fn standard() -> Self {
        let mut matcher = Self::empty();
        for (stage, patterns) in DEFAULT_RULES {
            for pattern in *patterns {
                matcher
                    .add_pattern(*stage, pattern)
                    .expect("built-in classification patterns compile");
            }
        }
        matcher
    }

    pub fn with_pattern(
        mut self,
        stage: LifecycleStage,
        pattern: &str,
    ) -> Result<Self, ClassifierError> {
        self.add_pattern(stage, pattern)?;
        Ok(self)
    }

    /// Registers one more pattern for `stage`.
    ///
    /// Patterns are matched case-insensitively and must sit on word
    /// boundaries, so they should start and end with a word character.
    pub fn add_pattern(
        &mut self,
        stage: LifecycleStage,
        pattern: &str,
    ) -> Result<(), ClassifierError> {
        if !stage.is_known() {
            return Err(ClassifierError::FallbackStage(stage));
        }

        let regex = compile(pattern).map_err(|source| ClassifierError::InvalidPattern {
            stage,
            pattern: pattern.to_string(),
            source,
        })?;
        let compiled = StagePattern {
            source: pattern.to_string(),
            regex,
        };

        match self.rules.iter_mut().find(|rule| rule.stage == stage) {
            Some(rule) => rule.patterns.push(compiled),
            None => {
                let index = self
                    .rules
                    .iter()
                    .position(|rule| rule.stage.precedence() < stage.precedence())
                    .unwrap_or(self.rules.len());
                self.rules.insert(
                    index,
                    StageRule {
                        stage,
                        patterns: vec![compiled],
                    },
                );
            }
        }

        debug!(%stage, pattern, "registered classification pattern");
        Ok(())
    }

    pub fn classify(&self, text: &str) -> LifecycleStage {
        for rule in &self.rules {
            if let Some(pattern) = rule
                .patterns
                .iter()
                .find(|pattern| pattern.regex.is_match(text))
            {
                debug!(stage = %rule.stage, pattern = %pattern.source, "email classified");
                return rule.stage;
            }
        }

        debug!("no classification pattern matched");
        LifecycleStage::Unknown
    }

    pub fn classify_email(&self, subject: &str, body: &str) -> LifecycleStage {
        self.classify(&format!("{subject} {body}"))
    }

    /// Stages that currently carry at least one rule, in evaluation order.
    pub fn categories(&self) -> Vec<LifecycleStage> {
        self.rules.iter().map(|rule| rule.stage).collect()
    }

    pub fn patterns_for(&self, stage: LifecycleStage) -> Vec<&str> {
        self.rules
            .iter()
            .filter(|rule| rule.stage == stage)
            .flat_map(|rule| rule.patterns.iter().map(|pattern| pattern.source.as_str()))
            .collect()
    }
}

impl Default for PatternMatcher {
    fn default() -> Self {
        Self::standard()
    }
}

fn compile(pattern: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(&format!(r"\b(?:{pattern})\b"))
        .case_insensitive(true)
        .build()
}
