use serde::{Deserialize, Serialize};

/// Fixed taxonomy for training/session descriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Topic {
    Onboarding,
    Booking,
    Billing,
    Reporting,
    Integration,
    Support,
    General,
}

impl Topic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::Onboarding => "Onboarding",
            Topic::Booking => "Booking",
            Topic::Billing => "Billing",
            Topic::Reporting => "Reporting",
            Topic::Integration => "Integration",
            Topic::Support => "Support",
            Topic::General => "General",
        }
    }

    /// Reverse of `as_str`, for values read back from the store. Unknown
    /// labels fold into the default topic.
    pub fn from_label(label: &str) -> Topic {
        match label {
            "Onboarding" => Topic::Onboarding,
            "Booking" => Topic::Booking,
            "Billing" => Topic::Billing,
            "Reporting" => Topic::Reporting,
            "Integration" => Topic::Integration,
            "Support" => Topic::Support,
            _ => Topic::General,
        }
    }
}

/// Ordered keyword-to-topic rules. First match wins, so classification is
/// deterministic and auditable; order is part of the configuration.
#[derive(Debug, Clone)]
pub struct ClassifierRules {
    rules: Vec<(Vec<&'static str>, Topic)>,
}

impl ClassifierRules {
    pub fn with_rules(rules: Vec<(Vec<&'static str>, Topic)>) -> Self {
        ClassifierRules { rules }
    }

    pub fn classify(&self, text: &str) -> Topic {
        let haystack = text.to_lowercase();
        for (keywords, topic) in &self.rules {
            if keywords.iter().any(|k| haystack.contains(k)) {
                return *topic;
            }
        }
        Topic::General
    }
}

impl Default for ClassifierRules {
    fn default() -> Self {
        ClassifierRules::with_rules(vec![
            (
                vec!["onboarding", "avvio", "primo accesso", "attivazione"],
                Topic::Onboarding,
            ),
            (
                vec!["prenotazion", "booking", "tavol", "coperti"],
                Topic::Booking,
            ),
            (
                vec!["fattur", "billing", "pagament", "abbonament"],
                Topic::Billing,
            ),
            (
                vec!["report", "kpi", "statistic", "analisi"],
                Topic::Reporting,
            ),
            (
                vec!["integrazion", "api", "webhook", "gestionale"],
                Topic::Integration,
            ),
            (
                vec!["assistenza", "support", "problema", "errore"],
                Topic::Support,
            ),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_map_to_their_topic() {
        let rules = ClassifierRules::default();
        assert_eq!(rules.classify("Sessione su prenotazioni sala"), Topic::Booking);
        assert_eq!(rules.classify("Setup fatturazione elettronica"), Topic::Billing);
        assert_eq!(rules.classify("Report KPI mensili"), Topic::Reporting);
    }

    #[test]
    fn unmatched_text_defaults_to_general() {
        let rules = ClassifierRules::default();
        assert_eq!(rules.classify("giornata in sede"), Topic::General);
        assert_eq!(rules.classify(""), Topic::General);
    }

    #[test]
    fn earlier_rule_wins_on_overlap() {
        let rules = ClassifierRules::default();
        // Matches both Booking ("prenotazion") and Billing ("fattur");
        // Booking is declared first.
        assert_eq!(
            rules.classify("prenotazioni e fatturazione"),
            Topic::Booking
        );
    }

    #[test]
    fn unknown_labels_fold_into_general() {
        assert_eq!(Topic::from_label("Reporting"), Topic::Reporting);
        assert_eq!(Topic::from_label("whatever"), Topic::General);
    }
}
