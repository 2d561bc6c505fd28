//! Request-scoped tunable knobs. The core has no on-disk or
//! environment configuration — it is a library, not a CLI — but the
//! one ambient "config" surface a request-execution library needs is
//! a small, `Copy`, `Default`-able struct threaded through
//! construction.

/// Tunables for one [`crate::ExecutionRuntime`] (or, more precisely,
/// its [`crate::rpc::bridge::RpcBridge`]).
#[derive(Debug, Clone, Copy)]
pub struct ExecutorConfig {
    /// How many (object-type, field-name) RPC groups the bridge may
    /// run concurrently within a single batch call. Each group gets
    /// its own worker; this bounds how many run at once.
    pub max_group_concurrency: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        ExecutorConfig {
            max_group_concurrency: 8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_allows_some_concurrency() {
        assert!(ExecutorConfig::default().max_group_concurrency > 1);
    }
}
