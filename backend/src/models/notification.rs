//! Push notification payloads.

use serde::Serialize;
use std::collections::BTreeMap;

/// Title, body and string data map delivered to a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub data: BTreeMap<String, String>,
}

impl Notification {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            data: BTreeMap::new(),
        }
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Reminder pushed once a session crosses the reminder interval.
    pub fn workout_reminder(session_type: &str, interval_minutes: i64) -> Self {
        Self::new(
            "Time to move",
            format!(
                "You have been {} for {} minutes. Take a short workout break.",
                session_type, interval_minutes
            ),
        )
        .with_data("kind", "reminder")
        .with_data("session_type", session_type)
    }

    /// Greeting pushed when a user opens the conversation.
    pub fn greeting(display_name: &str, email: &str) -> Self {
        Self::new(
            format!("Hello {}", display_name),
            format!("Your email: {}", email),
        )
        .with_data("kind", "greeting")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn greeting_uses_profile_fields() {
        let n = Notification::greeting("Ada", "ada@example.com");
        assert_eq!(n.title, "Hello Ada");
        assert_eq!(n.body, "Your email: ada@example.com");
        assert_eq!(n.data.get("kind").map(String::as_str), Some("greeting"));
    }

    #[test]
    fn reminder_mentions_session_type() {
        let n = Notification::workout_reminder("standing", 25);
        assert!(n.body.contains("standing"));
        assert!(n.body.contains("25 minutes"));
        assert_eq!(n.data.get("session_type").map(String::as_str), Some("standing"));
    }
}
