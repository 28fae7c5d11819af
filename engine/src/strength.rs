//! Opponent strength expressed as an Elo rating.

use crate::{EngineCommand, GoParams};

/// Engine playing strength.
///
/// Stockfish only honours `UCI_Elo` from 1320 upwards; weaker settings are
/// approximated with `Skill Level` and shallow searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Strength {
    elo: u16,
}

impl Strength {
    pub const MIN_ELO: u16 = 400;
    pub const MAX_ELO: u16 = 2800;
    pub const UCI_ELO_FLOOR: u16 = 1320;

    pub fn from_elo(elo: u16) -> Self {
        Self {
            elo: elo.clamp(Self::MIN_ELO, Self::MAX_ELO),
        }
    }

    pub fn elo(&self) -> u16 {
        self.elo
    }

    /// `Skill Level` used below the `UCI_Elo` floor, 0..=5.
    pub fn skill_level(&self) -> u8 {
        if self.elo >= Self::UCI_ELO_FLOOR {
            return 20;
        }
        let span = (Self::UCI_ELO_FLOOR - Self::MIN_ELO) as u32;
        ((self.elo - Self::MIN_ELO) as u32 * 5 / span) as u8
    }

    /// `setoption` commands that apply this strength.
    pub fn options(&self) -> Vec<EngineCommand> {
        let option = |name: &str, value: String| EngineCommand::SetOption {
            name: name.to_string(),
            value: Some(value),
        };

        if self.elo >= Self::UCI_ELO_FLOOR {
            vec![
                option("Skill Level", "20".to_string()),
                option("UCI_LimitStrength", "true".to_string()),
                option("UCI_Elo", self.elo.to_string()),
            ]
        } else {
            vec![
                option("UCI_LimitStrength", "false".to_string()),
                option("Skill Level", self.skill_level().to_string()),
            ]
        }
    }

    /// Search bound for a move played at this strength.
    pub fn go_params(&self) -> GoParams {
        match self.elo {
            0..=799 => GoParams::depth(4),
            800..=1199 => GoParams::depth(8),
            1200..=1799 => GoParams::movetime(500),
            1800..=2399 => GoParams::movetime(1000),
            _ => GoParams::movetime(2000),
        }
    }
}

impl Default for Strength {
    fn default() -> Self {
        Self::from_elo(1200)
    }
}
