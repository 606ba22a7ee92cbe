use std::fmt;

/// One of the three independent scheduling lanes a relay pumps per frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Phase {
    /// Runs before the host's main update.
    Early,
    /// Runs at the host's fixed simulation rate.
    Fixed,
    /// Runs after the host's main update.
    Late,
}

impl Phase {
    pub const ALL: [Phase; 3] = [Phase::Early, Phase::Fixed, Phase::Late];

    /// Position of the phase in [`Phase::ALL`].
    pub fn index(self) -> usize {
        match self {
            Phase::Early => 0,
            Phase::Fixed => 1,
            Phase::Late => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Phase::Early => "early",
            Phase::Fixed => "fixed",
            Phase::Late => "late",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
