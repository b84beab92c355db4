use std::time::Duration;

/// K = the default maximum number of peers per bucket.
pub const DEFAULT_BUCKET_SIZE: usize = 16;

/// Default number of neighbours returned per discovery query.
pub const DEFAULT_ALPHA: usize = 3;

/// Default time to wait for a pong before an eviction candidate is
/// considered dead.
pub const DEFAULT_PONG_TIMEOUT: Duration = Duration::from_secs(5);

/// Default time after which an outstanding find-node request is forgotten.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Default idle time after which a bucket gets a refresh lookup.
pub const DEFAULT_IDLE_REFRESH: Duration = Duration::from_secs(3);

#[derive(Debug, Clone)]
/// Peer table configuration.
pub struct Config {
    /// Maximum number of peers held per bucket (`k`).
    ///
    /// Defaults to [DEFAULT_BUCKET_SIZE].
    pub bucket_size: usize,
    /// Number of neighbours returned per discovery query (`alpha`),
    /// bounding the fan-out of find-node lookups.
    ///
    /// Defaults to [DEFAULT_ALPHA].
    pub alpha: usize,
    /// How long an eviction candidate has to answer its liveness ping
    /// before it is dropped and replaced.
    ///
    /// Defaults to [DEFAULT_PONG_TIMEOUT].
    pub pong_timeout: Duration,
    /// How long the table remembers a find-node request it asked the host
    /// to issue.
    ///
    /// Defaults to [DEFAULT_REQUEST_TIMEOUT].
    pub request_timeout: Duration,
    /// How long a bucket may go without traffic before [crate::PeerKeeper]'s
    /// sync step emits a refresh lookup for a random id in its range.
    ///
    /// The default is aggressive and suits small or fast-changing networks;
    /// hosts with stable peer sets will want a much longer interval.
    ///
    /// Defaults to [DEFAULT_IDLE_REFRESH].
    pub idle_refresh: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bucket_size: DEFAULT_BUCKET_SIZE,
            alpha: DEFAULT_ALPHA,
            pong_timeout: DEFAULT_PONG_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            idle_refresh: DEFAULT_IDLE_REFRESH,
        }
    }
}
