use serde::Serialize;
use strum::{Display, EnumString};

pub const BUS_URGENCY_LOW: u8 = 0;
pub const BUS_URGENCY_CRITICAL: u8 = 2;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, EnumString, Display)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive, serialize_all = "lowercase")]
pub enum Urgency {
    Low,
    #[default]
    Normal,
    Critical,
}

impl Urgency {
    /// Raw value of the `urgency` hint on the bus.
    pub fn as_byte(self) -> u8 {
        match self {
            Urgency::Low => BUS_URGENCY_LOW,
            Urgency::Normal => 1,
            Urgency::Critical => BUS_URGENCY_CRITICAL,
        }
    }
}

/// Maps the bus `urgency` hint onto a display tier. Anything that is not
/// explicitly low or critical is treated as normal.
pub fn classify(urgency: Option<u8>) -> Urgency {
    match urgency {
        Some(BUS_URGENCY_LOW) => Urgency::Low,
        Some(BUS_URGENCY_CRITICAL) => Urgency::Critical,
        _ => Urgency::Normal,
    }
}
