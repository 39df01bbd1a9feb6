use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

/// A reminder ready for delivery by the external notifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reminder {
    pub title: String,
    pub subtitle: String,
    pub body: String,
}

const DEFAULT_SUGGESTIONS: &[&str] = &[
    "You've been sitting for a while — stand up and stretch for three minutes.",
    "Do a quick cat stretch to loosen your spine and shoulders.",
    "Walk over and grab a glass of water; your body and brain both need it.",
    "Look at something 20 meters away for 20 seconds to rest your eyes.",
];

/// Reminder message pool. Picks avoid repeating the previous suggestion when
/// more than one candidate exists.
pub struct ReminderPool {
    suggestions: Vec<String>,
    last_suggestion: Option<String>,
}

impl ReminderPool {
    pub fn new() -> Self {
        Self::with_suggestions(DEFAULT_SUGGESTIONS.iter().map(|s| s.to_string()).collect())
    }

    pub fn with_suggestions(suggestions: Vec<String>) -> Self {
        Self {
            suggestions,
            last_suggestion: None,
        }
    }

    pub fn pick(&mut self) -> Reminder {
        let body = self.pick_suggestion();
        self.last_suggestion = Some(body.clone());
        Reminder {
            title: "Time to move".to_string(),
            subtitle: "Prolonged sitting".to_string(),
            body,
        }
    }

    fn pick_suggestion(&self) -> String {
        if self.suggestions.is_empty() {
            return "You've been sitting for a while — take a short break.".to_string();
        }
        if self.suggestions.len() == 1 {
            return self.suggestions[0].clone();
        }

        let candidates: Vec<&String> = self
            .suggestions
            .iter()
            .filter(|s| Some(s.as_str()) != self.last_suggestion.as_deref())
            .collect();
        let pool = if candidates.is_empty() {
            self.suggestions.iter().collect()
        } else {
            candidates
        };
        (*pool.choose(&mut rand::thread_rng()).unwrap()).clone()
    }
}

impl Default for ReminderPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_repeats_the_previous_suggestion() {
        let mut pool = ReminderPool::with_suggestions(vec!["a".into(), "b".into(), "c".into()]);
        let mut previous = pool.pick().body;
        for _ in 0..50 {
            let next = pool.pick().body;
            assert_ne!(next, previous);
            previous = next;
        }
    }

    #[test]
    fn single_suggestion_is_allowed_to_repeat() {
        let mut pool = ReminderPool::with_suggestions(vec!["only".into()]);
        assert_eq!(pool.pick().body, "only");
        assert_eq!(pool.pick().body, "only");
    }

    #[test]
    fn empty_pool_falls_back_to_a_default() {
        let mut pool = ReminderPool::with_suggestions(Vec::new());
        assert!(!pool.pick().body.is_empty());
    }
}
