use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, Display)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive, serialize_all = "lowercase")]
pub enum FeedFormat {
    /// One JSON document per line on stdout.
    Json,
    /// Keep the popup state internal; only IPC `list` exposes it.
    None,
}
