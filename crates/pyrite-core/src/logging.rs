//! Logging setup and the soft-failure macro

/// Initialize the global tracing subscriber.
///
/// Respects `RUST_LOG` when set, otherwise falls back to the given filter.
pub fn init(default_filter: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .init();
}

/// Log a recognized-but-unwired feature once per call site and continue.
///
/// This is the soft failure tier: the operation becomes a no-op for the
/// unsupported feature only, and rendering continues with degraded fidelity.
#[macro_export]
macro_rules! soft_unimplemented {
    ($($arg:tt)*) => {{
        static ONCE: std::sync::Once = std::sync::Once::new();
        ONCE.call_once(|| {
            tracing::warn!(
                "unimplemented at {}:{}: {}",
                file!(),
                line!(),
                format_args!($($arg)*)
            );
        });
    }};
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_soft_unimplemented_is_a_noop() {
        // Must be callable repeatedly without panicking or returning a value.
        for _ in 0..3 {
            soft_unimplemented!("feature {}", 42);
        }
    }
}
