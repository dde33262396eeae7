use crate::types::Reading;

/// A system that claims to be cooling while the room warms up has most likely
/// failed to start its compressor.
pub fn restart_needed(previous: Reading, current: Reading) -> bool {
    previous.is_cooling && current.is_cooling && current.temperature_f > previous.temperature_f
}
