//! Participant roster formatting.

/// A conversation member as reported by the platform.
#[derive(Debug, Clone)]
pub struct Participant {
    pub name: String,
    pub automated: bool,
    pub status: String,
}

/// Format human participants as `- name (status: status)` lines, keeping source order.
pub fn format_roster<I>(participants: I) -> Vec<String>
where
    I: IntoIterator<Item = Participant>,
{
    participants
        .into_iter()
        .filter(|p| !p.automated)
        .map(|p| format!("- {} (status: {})", p.name, p.status))
        .collect()
}
