//! Distance-keyed table of known peers, with split-on-demand buckets and
//! liveness-probe bookkeeping.

mod config;
mod kbucket;

use std::collections::HashMap;
use std::fmt::{self, Debug, Formatter};
use std::mem;
use std::time::Instant;

use rand::Rng;
use tracing::{debug, error, warn};

use crate::common::{Id, PeerInfo};

pub use config::{
    Config, DEFAULT_ALPHA, DEFAULT_BUCKET_SIZE, DEFAULT_IDLE_REFRESH, DEFAULT_PONG_TIMEOUT,
    DEFAULT_REQUEST_TIMEOUT,
};
pub use kbucket::KBucket;

/// An eviction candidate that was pinged, together with the peer waiting to
/// take its slot if the ping times out.
#[derive(Debug, Clone)]
struct PendingPong {
    replacement: PeerInfo,
    requested_at: Instant,
}

/// Keeps information about peers in a network.
///
/// The table partitions the whole identifier space into contiguous
/// [KBucket]s, splitting the bucket that contains its own id whenever that
/// bucket overflows, so knowledge stays densest close to home.
///
/// All operations are synchronous and run to completion; the owning event
/// loop is expected to call [PeerKeeper::sync] once per tick, dispatch the
/// find-node requests it returns, ping every candidate returned by
/// [PeerKeeper::add_peer], and drain [PeerKeeper::take_sessions_to_close].
pub struct PeerKeeper {
    id: Id,
    config: Config,
    /// Sorted by range start; ranges tile the key space with no gaps.
    buckets: Vec<KBucket>,
    pending_pongs: HashMap<Id, PendingPong>,
    pending_find_requests: HashMap<Id, Instant>,
    sessions_to_close: Vec<PeerInfo>,
}

impl PeerKeeper {
    /// Create a new peer table centered on this node's own id.
    pub fn new(id: Id) -> Self {
        Self::with_config(id, Config::default())
    }

    pub fn with_config(id: Id, config: Config) -> Self {
        PeerKeeper {
            id,
            buckets: vec![KBucket::new(Id::MIN, Id::MAX, config.bucket_size)],
            config,
            pending_pongs: HashMap::new(),
            pending_find_requests: HashMap::new(),
            sessions_to_close: Vec::new(),
        }
    }

    // === Getters ===

    /// Returns the [Id] of this node, where the distance is measured from.
    pub fn id(&self) -> &Id {
        &self.id
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Return the number of peers in the table.
    pub fn size(&self) -> usize {
        self.buckets.iter().map(|bucket| bucket.len()).sum()
    }

    /// Returns `true` if no bucket holds any peer.
    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(|bucket| bucket.is_empty())
    }

    // === Public Methods ===

    /// Try to add information about a new peer.
    ///
    /// If its bucket has room (or the peer was already known) the peer is
    /// stored and `None` is returned. If the bucket is full and covers this
    /// node's own id, the bucket is split and the insert retried. Otherwise
    /// the bucket's least recently seen peer is returned as a candidate for
    /// replacement: the caller must ping it and report a reply through
    /// [PeerKeeper::pong_received]; on timeout the next [PeerKeeper::sync]
    /// evicts it and admits the new peer in its place.
    pub fn add_peer(&mut self, peer: PeerInfo) -> Option<PeerInfo> {
        self.add_peer_at(peer, Instant::now())
    }

    fn add_peer_at(&mut self, peer: PeerInfo, now: Instant) -> Option<PeerInfo> {
        if peer.id == self.id {
            warn!("refusing to add own id to the peer table");
            return None;
        }

        loop {
            let index = self.bucket_index(&peer.id)?;

            let candidate = match self.buckets[index].add_peer(peer.clone()) {
                Some(candidate) => candidate,
                None => return None,
            };

            if self.buckets[index].contains_id(&self.id) {
                // Our own neighbourhood is allowed to grow finer instead of
                // evicting; retry against the split table.
                self.split_bucket(index);
                continue;
            }

            debug!(
                candidate = %candidate.id,
                "bucket full, probing oldest peer before eviction"
            );
            self.pending_pongs.insert(
                candidate.id,
                PendingPong {
                    replacement: peer,
                    requested_at: now,
                },
            );

            return Some(candidate);
        }
    }

    /// React to a pong from the peer with the given id.
    ///
    /// The candidate proved alive, so it keeps its slot and the queued
    /// replacement is discarded.
    pub fn pong_received(&mut self, id: &Id) {
        if self.pending_pongs.remove(id).is_some() {
            debug!(peer = %id, "pong received, keeping peer");
        }
    }

    /// Mark the bucket whose range contains `id` as active now.
    pub fn set_last_message_time(&mut self, id: &Id) {
        if let Some(index) = self.bucket_index(id) {
            self.buckets[index].touch();
        }
    }

    /// Return a random known peer, if any.
    ///
    /// Sampling picks a bucket uniformly and then a peer within it, so peers
    /// in sparse buckets are favored; callers that need uniformity over
    /// peers should not rely on this.
    pub fn get_random_known_peer(&self) -> Option<&PeerInfo> {
        let mut rng = rand::thread_rng();

        let bucket = &self.buckets[rng.gen_range(0..self.buckets.len())];
        if bucket.is_empty() {
            return None;
        }

        bucket.get(rng.gen_range(0..bucket.len()))
    }

    /// The nearest known neighbours of `target`, at most `alpha` of them.
    pub fn neighbours(&self, target: &Id) -> Vec<PeerInfo> {
        self.neighbours_up_to(target, self.config.alpha)
    }

    /// Like [PeerKeeper::neighbours] with an explicit result bound.
    ///
    /// Buckets are ranked by the distance of their range midpoint to the
    /// target, which only approximates per-peer distance; collecting twice
    /// the requested count before the final sort compensates for that.
    pub fn neighbours_up_to(&self, target: &Id, alpha: usize) -> Vec<PeerInfo> {
        let mut ranked: Vec<&KBucket> = self.buckets.iter().collect();
        ranked.sort_by_key(|bucket| bucket.distance_to_midpoint(target));

        let mut candidates: Vec<PeerInfo> = Vec::with_capacity(2 * alpha);
        'collect: for bucket in ranked {
            for peer in bucket.peers_by_distance(target) {
                if peer.id == *target {
                    continue;
                }
                candidates.push(peer);
                if candidates.len() >= 2 * alpha {
                    break 'collect;
                }
            }
        }

        candidates.sort_by_key(|peer| peer.id.xor(target));
        candidates.truncate(alpha);
        candidates
    }

    /// XOR distance between this node and the given id.
    pub fn distance(&self, id: &Id) -> Id {
        self.id.xor(id)
    }

    /// Sync the table's bookkeeping against the clock.
    ///
    /// Expires unanswered liveness probes (evicting their candidates and
    /// admitting the queued replacements), forgets timed-out find-node
    /// requests, and picks a random lookup target for every bucket that has
    /// gone idle. Returns those targets mapped to their nearest known
    /// neighbours; the caller dispatches a find-node request for each and
    /// feeds discovered peers back into [PeerKeeper::add_peer].
    pub fn sync(&mut self) -> HashMap<Id, Vec<PeerInfo>> {
        self.sync_at(Instant::now())
    }

    // The three phases run in this order on purpose: expiring pongs re-adds
    // replacement peers, which touches buckets before idleness is judged.
    fn sync_at(&mut self, now: Instant) -> HashMap<Id, Vec<PeerInfo>> {
        self.expire_pending_pongs(now);
        self.expire_find_requests(now);
        self.refresh_idle_buckets(now)
    }

    /// Hand over the peers whose sessions the host must tear down.
    ///
    /// Evicted-and-unresponsive peers accumulate here; drain after every
    /// call to [PeerKeeper::sync].
    pub fn take_sessions_to_close(&mut self) -> Vec<PeerInfo> {
        mem::take(&mut self.sessions_to_close)
    }

    /// Drop everything known and start over with a new own id.
    ///
    /// For hosts whose identity can change at runtime; queued probes and
    /// teardowns are discarded along with the buckets.
    pub fn restart(&mut self, id: Id) {
        self.id = id;
        self.buckets = vec![KBucket::new(Id::MIN, Id::MAX, self.config.bucket_size)];
        self.pending_pongs.clear();
        self.pending_find_requests.clear();
        self.sessions_to_close.clear();
    }

    // === Private Methods ===

    /// Index of the bucket whose range contains `id`.
    ///
    /// Exactly one bucket must match; anything else means the partition is
    /// corrupted and neighbour queries can no longer be trusted.
    fn bucket_index(&self, id: &Id) -> Option<usize> {
        let index = self.buckets.iter().position(|bucket| bucket.contains_id(id));

        debug_assert!(index.is_some(), "bucket ranges no longer tile the key space");
        if index.is_none() {
            error!(id = %id, "no bucket covers this id");
        }

        index
    }

    fn split_bucket(&mut self, index: usize) {
        debug!(bucket = ?self.buckets[index], "splitting bucket");

        let (lower, upper) = self.buckets[index].split();
        self.buckets[index] = lower;
        self.buckets.insert(index + 1, upper);
    }

    fn expire_pending_pongs(&mut self, now: Instant) {
        let expired: Vec<Id> = self
            .pending_pongs
            .iter()
            .filter(|(_, pending)| {
                now.duration_since(pending.requested_at) > self.config.pong_timeout
            })
            .map(|(id, _)| *id)
            .collect();

        for id in expired {
            let pending = match self.pending_pongs.remove(&id) {
                Some(pending) => pending,
                None => continue,
            };

            if let Some(index) = self.bucket_index(&id) {
                if let Some(evicted) = self.buckets[index].remove_peer(&id) {
                    debug!(peer = %evicted.id, "pong timed out, evicting peer");
                    self.sessions_to_close.push(evicted);
                }
            }

            // May itself displace another candidate and queue a new probe.
            self.add_peer_at(pending.replacement, now);
        }
    }

    fn expire_find_requests(&mut self, now: Instant) {
        let timeout = self.config.request_timeout;
        self.pending_find_requests
            .retain(|_, issued| now.duration_since(*issued) <= timeout);
    }

    fn refresh_idle_buckets(&mut self, now: Instant) -> HashMap<Id, Vec<PeerInfo>> {
        let mut peers_to_find = HashMap::new();

        for index in 0..self.buckets.len() {
            let idle_for = now.duration_since(self.buckets[index].last_updated());
            if idle_for <= self.config.idle_refresh {
                continue;
            }

            let target = self.buckets[index].random_id();
            self.pending_find_requests.insert(target, now);
            let neighbours = self.neighbours(&target);
            self.buckets[index].touch_at(now);

            peers_to_find.insert(target, neighbours);
        }

        peers_to_find
    }

    #[cfg(test)]
    fn contains(&self, id: &Id) -> bool {
        self.buckets
            .iter()
            .any(|bucket| bucket.iter().any(|peer| peer.id == *id))
    }
}

impl Debug for PeerKeeper {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "PeerKeeper({:.8})", self.id.to_string())?;
        for bucket in &self.buckets {
            writeln!(f, "  {:?}", bucket)?;
        }
        Ok(())
    }
}
