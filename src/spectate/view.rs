use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Betting round of a hold'em hand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Street {
    Preflop,
    Flop,
    Turn,
    River,
    Showdown,
}

/// One seat as shown to spectators
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatView {
    pub seat: u8,
    pub player_id: Uuid,
    pub name: String,
    pub chips: i64,
    pub bet: i64,
    pub folded: bool,
    /// Hole cards as short codes (e.g. "As", "Td"), `None` when hidden
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hole_cards: Option<[String; 2]>,
}

/// Serializable projection of a table recorded for delayed viewing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableView {
    pub hand_number: u64,
    pub street: Street,
    pub board: Vec<String>,
    pub pot: i64,
    pub dealer_seat: u8,
    pub seats: Vec<SeatView>,
}

impl TableView {
    /// Copy of the view with every hole card hidden
    pub fn redacted(&self) -> Self {
        let mut view = self.clone();
        for seat in &mut view.seats {
            seat.hole_cards = None;
        }
        view
    }

    /// View as it may be shown under a room's hole-card setting
    pub fn for_spectators(&self, show_hole_cards: bool) -> Self {
        if show_hole_cards {
            self.clone()
        } else {
            self.redacted()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TableView {
        TableView {
            hand_number: 12,
            street: Street::Flop,
            board: vec!["Ah".to_string(), "7c".to_string(), "2d".to_string()],
            pot: 300,
            dealer_seat: 0,
            seats: vec![
                SeatView {
                    seat: 0,
                    player_id: Uuid::new_v4(),
                    name: "alice".to_string(),
                    chips: 900,
                    bet: 0,
                    folded: false,
                    hole_cards: Some(["As".to_string(), "Kd".to_string()]),
                },
                SeatView {
                    seat: 1,
                    player_id: Uuid::new_v4(),
                    name: "bob".to_string(),
                    chips: 800,
                    bet: 0,
                    folded: true,
                    hole_cards: Some(["9s".to_string(), "9h".to_string()]),
                },
            ],
        }
    }

    #[test]
    fn test_redacted_hides_hole_cards() {
        let view = sample().redacted();
        assert!(view.seats.iter().all(|s| s.hole_cards.is_none()));
        assert_eq!(view.board.len(), 3);
        assert_eq!(view.pot, 300);
    }

    #[test]
    fn test_for_spectators() {
        let view = sample();
        assert_eq!(view.for_spectators(true), view);
        assert!(view.for_spectators(false).seats[0].hole_cards.is_none());
    }

    #[test]
    fn test_redacted_json_omits_hole_cards() {
        let json = serde_json::to_string(&sample().redacted()).unwrap();
        assert!(!json.contains("hole_cards"));
        assert!(json.contains("\"street\":\"flop\""));

        let back: TableView = serde_json::from_str(&json).unwrap();
        assert!(back.seats[1].hole_cards.is_none());
    }
}
