//! Queue-option resolution against the broker defaults.
//!
//! `min_length` keeps an explicit zero (the queue clamps its backing
//! capacity, not the caller); only a negative value falls back to the
//! default. The remaining options treat any non-positive value as "use the
//! default".

use crate::config::{BrokerDefaults, QueueConfig};

pub(crate) fn resolve_options(options: &QueueConfig, defaults: &BrokerDefaults) -> QueueConfig {
    QueueConfig {
        min_length: if options.min_length >= 0 {
            options.min_length
        } else {
            defaults.min_len
        },
        max_length: if options.max_length > 0 {
            options.max_length
        } else {
            defaults.max_len
        },
        max_size_bytes: if options.max_size_bytes > 0 {
            options.max_size_bytes
        } else {
            defaults.max_size_bytes
        },
        ttl: if options.ttl > 0 {
            options.ttl
        } else {
            defaults.ttl_seconds
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> BrokerDefaults {
        BrokerDefaults {
            min_len: 100,
            max_len: 1000,
            max_size_bytes: 4096,
            ttl_seconds: 60,
        }
    }

    #[test]
    fn test_positive_values_pass_through() {
        let resolved = resolve_options(
            &QueueConfig {
                min_length: 5,
                max_length: 50,
                max_size_bytes: 512,
                ttl: 7,
            },
            &defaults(),
        );
        assert_eq!(resolved.min_length, 5);
        assert_eq!(resolved.max_length, 50);
        assert_eq!(resolved.max_size_bytes, 512);
        assert_eq!(resolved.ttl, 7);
    }

    #[test]
    fn test_non_positive_values_fall_back() {
        let resolved = resolve_options(
            &QueueConfig {
                min_length: -1,
                max_length: 0,
                max_size_bytes: -3,
                ttl: 0,
            },
            &defaults(),
        );
        assert_eq!(resolved.min_length, 100);
        assert_eq!(resolved.max_length, 1000);
        assert_eq!(resolved.max_size_bytes, 4096);
        assert_eq!(resolved.ttl, 60);
    }

    #[test]
    fn test_zero_min_length_is_kept() {
        let resolved = resolve_options(
            &QueueConfig {
                min_length: 0,
                ..QueueConfig::default()
            },
            &defaults(),
        );
        assert_eq!(resolved.min_length, 0);
    }
}
