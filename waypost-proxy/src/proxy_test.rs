use std::time::Duration;

use crate::proxy::accept_backoff;

#[test]
fn accept_backoff_doubles_from_ten_milliseconds() {
    assert_eq!(accept_backoff(1), Duration::from_millis(10));
    assert_eq!(accept_backoff(2), Duration::from_millis(20));
    assert_eq!(accept_backoff(4), Duration::from_millis(80));
}

#[test]
fn accept_backoff_is_capped_at_one_second() {
    assert_eq!(accept_backoff(8), Duration::from_secs(1));
    assert_eq!(accept_backoff(u32::MAX), Duration::from_secs(1));
}
