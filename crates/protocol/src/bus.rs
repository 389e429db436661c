use serde::{Deserialize, Serialize};

use crate::work_item::TtsWorkItem;

/// Envelope published to the cross-instance bus topic (`BUS_TOPIC`) whenever
/// the event pipeline decides an item should be spoken (§4.2, §6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusEnvelope {
    pub channel: String,
    pub item: TtsWorkItem,
    pub source_revision: String,
    pub timestamp_ms: u64,
}
