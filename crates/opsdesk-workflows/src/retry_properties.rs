//! Property-based tests for retry backoff

#[cfg(test)]
mod tests {
    use crate::retry::RetryPolicy;
    use proptest::prelude::*;
    use std::time::Duration;

    fn policy_strategy() -> impl Strategy<Value = RetryPolicy> {
        (1u32..10, 1u64..5_000, 5_000u64..120_000).prop_map(|(attempts, base, max)| {
            RetryPolicy::new(attempts, base).with_max_delay(Duration::from_millis(max))
        })
    }

    proptest! {
        #[test]
        fn prop_backoff_grows_and_is_capped(policy in policy_strategy(), attempt in 1u32..64) {
            let current = policy.backoff_delay(attempt);
            let next = policy.backoff_delay(attempt + 1);

            prop_assert!(next >= current);
            prop_assert!(current.as_millis() as u64 <= policy.max_delay_ms);
            prop_assert!(current.as_millis() as u64 >= policy.base_delay_ms.min(policy.max_delay_ms));
        }

        #[test]
        fn prop_attempts_are_bounded(policy in policy_strategy()) {
            let mut attempts = 1;
            while policy.can_retry(attempts) {
                attempts += 1;
            }
            prop_assert_eq!(attempts, policy.max_attempts);
        }
    }
}
