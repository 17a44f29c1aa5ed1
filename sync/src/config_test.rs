use super::*;

#[test]
fn defaults_match_reference_timings() {
    let config = SyncConfig::default();
    assert_eq!(config.debounce, Duration::from_millis(300));
    assert_eq!(config.echo_guard, Duration::from_millis(300));
    assert_eq!(config.persist_interval, Duration::from_millis(1_000_000));
    assert_eq!(config.reconnect_attempts, 5);
    assert_eq!(config.reconnect_delay, Duration::from_secs(2));
    assert_eq!(config.connect_timeout, Duration::from_secs(10));
}

#[test]
fn env_parse_falls_back_when_unset() {
    assert_eq!(env_parse("SYNC_TEST_SURELY_UNSET_KEY", 42_u64), 42);
}

#[test]
fn env_parse_reads_and_rejects_garbage() {
    // SAFETY: keys are unique to this test, so no other thread reads them.
    unsafe {
        std::env::set_var("SYNC_TEST_PARSE_OK", "17");
        std::env::set_var("SYNC_TEST_PARSE_BAD", "seventeen");
    }
    assert_eq!(env_parse("SYNC_TEST_PARSE_OK", 1_u32), 17);
    assert_eq!(env_parse("SYNC_TEST_PARSE_BAD", 1_u32), 1);
}
