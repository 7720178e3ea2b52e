//! Item status and the legal transition table.

use serde::{Deserialize, Serialize};

/// Processing status of an item.
///
/// The happy path runs top to bottom; `Failed` and `Skipped` sit beside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemStatus {
    Pending,
    Downloading,
    Downloaded,
    Transcribing,
    Transcribed,
    Summarizing,
    Completed,
    Failed,
    Skipped,
}

impl ItemStatus {
    /// All statuses, in pipeline order followed by the side states.
    pub const ALL: [ItemStatus; 9] = [
        ItemStatus::Pending,
        ItemStatus::Downloading,
        ItemStatus::Downloaded,
        ItemStatus::Transcribing,
        ItemStatus::Transcribed,
        ItemStatus::Summarizing,
        ItemStatus::Completed,
        ItemStatus::Failed,
        ItemStatus::Skipped,
    ];

    /// The persisted label.
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Pending => "PENDING",
            ItemStatus::Downloading => "DOWNLOADING",
            ItemStatus::Downloaded => "DOWNLOADED",
            ItemStatus::Transcribing => "TRANSCRIBING",
            ItemStatus::Transcribed => "TRANSCRIBED",
            ItemStatus::Summarizing => "SUMMARIZING",
            ItemStatus::Completed => "COMPLETED",
            ItemStatus::Failed => "FAILED",
            ItemStatus::Skipped => "SKIPPED",
        }
    }

    /// Whether `process` may pick this item up.
    pub fn is_admissible(&self) -> bool {
        matches!(self, ItemStatus::Pending | ItemStatus::Failed)
    }

    /// Whether no further processing transition is legal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ItemStatus::Completed | ItemStatus::Skipped)
    }

    /// Whether a stage is underway (a crash here leaves the item stranded).
    pub fn is_in_progress(&self) -> bool {
        matches!(
            self,
            ItemStatus::Downloading
                | ItemStatus::Downloaded
                | ItemStatus::Transcribing
                | ItemStatus::Transcribed
                | ItemStatus::Summarizing
        )
    }

    /// Check a transition against the table.
    ///
    /// Claims out of `Pending`/`Failed` go to `Downloading`, or straight to
    /// `Summarizing` when a transcript already exists. `Failed -> Pending`
    /// is the reprocess reset and the only backward move.
    pub fn can_transition_to(&self, next: ItemStatus) -> bool {
        use ItemStatus::*;

        match (*self, next) {
            (Pending, Downloading | Summarizing | Skipped) => true,
            (Failed, Downloading | Summarizing | Pending) => true,
            (Downloading, Downloaded) => true,
            (Downloaded, Transcribing) => true,
            (Transcribing, Transcribed) => true,
            (Transcribed, Summarizing) => true,
            (Summarizing, Completed) => true,
            (from, Failed) => from.is_in_progress(),
            _ => false,
        }
    }
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ItemStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        ItemStatus::ALL
            .iter()
            .copied()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unknown item status: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ItemStatus::*;

    #[test]
    fn test_terminal_states_have_no_exits() {
        for terminal in [Completed, Skipped] {
            for next in ItemStatus::ALL {
                assert!(
                    !terminal.can_transition_to(next),
                    "{} -> {} must be illegal",
                    terminal,
                    next
                );
            }
        }
    }

    #[test]
    fn test_happy_path_is_legal() {
        let path = [
            Pending,
            Downloading,
            Downloaded,
            Transcribing,
            Transcribed,
            Summarizing,
            Completed,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_skip_only_from_pending() {
        for from in ItemStatus::ALL {
            assert_eq!(from.can_transition_to(Skipped), from == Pending, "{}", from);
        }
    }

    #[test]
    fn test_failed_reachable_only_from_in_progress() {
        for from in ItemStatus::ALL {
            assert_eq!(from.can_transition_to(Failed), from.is_in_progress(), "{}", from);
        }
    }

    #[test]
    fn test_no_backward_moves_except_reset() {
        assert!(Failed.can_transition_to(Pending));
        assert!(!Downloaded.can_transition_to(Downloading));
        assert!(!Transcribed.can_transition_to(Transcribing));
        assert!(!Summarizing.can_transition_to(Pending));
        assert!(!Pending.can_transition_to(Pending));
    }

    #[test]
    fn test_admissible_statuses() {
        let admissible: Vec<_> = ItemStatus::ALL.iter().filter(|s| s.is_admissible()).collect();
        assert_eq!(admissible, vec![&Pending, &Failed]);
    }

    #[test]
    fn test_label_round_trip() {
        assert_eq!("transcribed".parse::<ItemStatus>(), Ok(Transcribed));
        assert_eq!(Summarizing.to_string(), "SUMMARIZING");
        assert!("bogus".parse::<ItemStatus>().is_err());
        assert_eq!(serde_json::to_string(&Completed).unwrap(), "\"COMPLETED\"");
    }
}
