//! Small helpers shared across crates

/// Current wall-clock time as milliseconds since the Unix epoch.
///
/// Creation timestamps and sync bookkeeping all use this one clock so
/// orderings stay comparable.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_millis_is_recent() {
        let now = now_millis();
        // Sometime after 2024-01-01 and before 2100
        assert!(now > 1_704_067_200_000);
        assert!(now < 4_102_444_800_000);
    }
}
