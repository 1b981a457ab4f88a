/// Epoch milliseconds type used for every replicated deadline.
pub type EpochMs = u64;

/// Current wall-clock time as Unix epoch milliseconds.
pub fn epoch_millis() -> EpochMs {
    let dur = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    dur.as_millis() as EpochMs
}

/// True once `now` has reached `deadline`. A zero deadline counts as "never set"
/// and is always considered passed.
pub fn deadline_passed(deadline: EpochMs, now: EpochMs) -> bool {
    now >= deadline
}
