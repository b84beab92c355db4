//! K-bucket holding peers for one contiguous slice of the identifier space.

use std::collections::VecDeque;
use std::fmt::{self, Debug, Formatter};
use std::time::Instant;

use crate::common::{Id, PeerInfo};

/// Kbuckets are similar to LRU caches that check and evict unresponsive
/// peers, without dropping any responsive peers in the process.
///
/// Each bucket owns the inclusive id range `[start, end]`; sibling buckets in
/// a table tile the whole key space without overlap.
#[derive(Clone)]
pub struct KBucket {
    start: Id,
    end: Id,
    capacity: usize,
    /// Peers in the k-bucket, least recently seen first.
    peers: VecDeque<PeerInfo>,
    last_updated: Instant,
}

impl KBucket {
    /// Create an empty bucket owning the inclusive range `[start, end]`.
    pub fn new(start: Id, end: Id, capacity: usize) -> Self {
        KBucket {
            start,
            end,
            capacity,
            peers: VecDeque::with_capacity(capacity),
            last_updated: Instant::now(),
        }
    }

    // === Getters ===

    pub fn start(&self) -> &Id {
        &self.start
    }

    pub fn end(&self) -> &Id {
        &self.end
    }

    pub fn last_updated(&self) -> Instant {
        self.last_updated
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PeerInfo> {
        self.peers.iter()
    }

    pub fn get(&self, index: usize) -> Option<&PeerInfo> {
        self.peers.get(index)
    }

    // === Public Methods ===

    /// Returns `true` if `id` falls within this bucket's range.
    pub fn contains_id(&self, id: &Id) -> bool {
        self.start <= *id && *id <= self.end
    }

    /// Try to append a peer to this bucket.
    ///
    /// A peer that is already present is moved to the most recently seen end
    /// instead. If the bucket is full the least recently seen peer is
    /// returned as a candidate for replacement and the bucket is left
    /// untouched; only a successful touch refreshes `last_updated`.
    pub fn add_peer(&mut self, peer: PeerInfo) -> Option<PeerInfo> {
        if let Some(index) = self.peers.iter().position(|p| p.id == peer.id) {
            self.peers.remove(index);
            self.peers.push_back(peer);
        } else if self.peers.len() < self.capacity {
            self.peers.push_back(peer);
        } else {
            return self.peers.front().cloned();
        }

        self.last_updated = Instant::now();
        None
    }

    /// Remove and return the peer with the given id, if present.
    pub fn remove_peer(&mut self, id: &Id) -> Option<PeerInfo> {
        let index = self.peers.iter().position(|p| p.id == *id)?;
        self.peers.remove(index)
    }

    /// Split this bucket at the midpoint of its range.
    ///
    /// Existing peers are redistributed by comparing their id to the
    /// midpoint, preserving relative order within each half. The bucket
    /// itself is left untouched; the caller replaces it with the two halves.
    pub fn split(&self) -> (KBucket, KBucket) {
        let midpoint = self.start.midpoint(&self.end);

        let mut lower = KBucket::new(self.start, midpoint, self.capacity);
        let mut upper = KBucket::new(midpoint.incremented(), self.end, self.capacity);

        for peer in &self.peers {
            if peer.id <= midpoint {
                lower.peers.push_back(peer.clone());
            } else {
                upper.peers.push_back(peer.clone());
            }
        }

        (lower, upper)
    }

    /// All peers in this bucket, sorted ascending by XOR distance to `target`.
    pub fn peers_by_distance(&self, target: &Id) -> Vec<PeerInfo> {
        let mut peers: Vec<PeerInfo> = self.peers.iter().cloned().collect();
        peers.sort_by_key(|peer| peer.id.xor(target));
        peers
    }

    /// Distance from the midpoint of this bucket's range to `target`.
    ///
    /// Ranks whole buckets by relevance to a target without inspecting
    /// individual peers.
    pub fn distance_to_midpoint(&self, target: &Id) -> Id {
        self.start.midpoint(&self.end).xor(target)
    }

    /// A uniformly random id within this bucket's range.
    ///
    /// Bucket ranges are produced by repeated halving of the full key space,
    /// so `start ^ end` is always a contiguous low-bit mask.
    pub fn random_id(&self) -> Id {
        let mask = self.start.xor(&self.end);

        let random = Id::random();
        let mut bytes = *self.start.as_bytes();
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte |= random.as_bytes()[i] & mask.as_bytes()[i];
        }

        Id(bytes)
    }

    /// Mark this bucket as active now.
    pub fn touch(&mut self) {
        self.touch_at(Instant::now());
    }

    pub(crate) fn touch_at(&mut self, now: Instant) {
        self.last_updated = now;
    }
}

impl Debug for KBucket {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "KBucket({:.8}..{:.8}, {} peers)",
            self.start.to_string(),
            self.end.to_string(),
            self.peers.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use super::*;
    use crate::common::ID_SIZE;

    fn id_with_head(head: &[u8]) -> Id {
        let mut bytes = [0u8; ID_SIZE];
        bytes[..head.len()].copy_from_slice(head);
        Id(bytes)
    }

    fn peer(head: &[u8]) -> PeerInfo {
        PeerInfo::new(id_with_head(head), SocketAddr::from(([127, 0, 0, 1], 0)))
    }

    fn full_range_bucket(capacity: usize) -> KBucket {
        KBucket::new(Id::MIN, Id::MAX, capacity)
    }

    #[test]
    fn appends_until_capacity() {
        let mut bucket = full_range_bucket(2);

        assert!(bucket.add_peer(peer(&[1])).is_none());
        assert!(bucket.add_peer(peer(&[2])).is_none());
        assert_eq!(bucket.len(), 2);
    }

    #[test]
    fn full_bucket_returns_oldest_and_stays_unchanged() {
        let mut bucket = full_range_bucket(2);
        bucket.add_peer(peer(&[1]));
        bucket.add_peer(peer(&[2]));

        let candidate = bucket.add_peer(peer(&[3]));

        assert_eq!(candidate, Some(peer(&[1])));
        assert_eq!(bucket.len(), 2);
        assert_eq!(bucket.get(0), Some(&peer(&[1])));
        assert_eq!(bucket.get(1), Some(&peer(&[2])));
    }

    #[test]
    fn duplicate_moves_to_most_recently_seen_end() {
        let mut bucket = full_range_bucket(2);
        bucket.add_peer(peer(&[1]));
        bucket.add_peer(peer(&[2]));

        assert!(bucket.add_peer(peer(&[1])).is_none());

        assert_eq!(bucket.len(), 2);
        assert_eq!(bucket.get(0), Some(&peer(&[2])));
        assert_eq!(bucket.get(1), Some(&peer(&[1])));
    }

    #[test]
    fn remove_peer_returns_the_peer() {
        let mut bucket = full_range_bucket(4);
        bucket.add_peer(peer(&[1]));

        assert_eq!(bucket.remove_peer(&id_with_head(&[1])), Some(peer(&[1])));
        assert_eq!(bucket.remove_peer(&id_with_head(&[1])), None);
        assert!(bucket.is_empty());
    }

    #[test]
    fn split_partitions_range_and_peers() {
        let mut bucket = full_range_bucket(4);
        bucket.add_peer(peer(&[0x00, 1]));
        bucket.add_peer(peer(&[0xc0]));
        bucket.add_peer(peer(&[0x40]));
        bucket.add_peer(peer(&[0x80]));

        let (lower, upper) = bucket.split();

        assert_eq!(*lower.start(), Id::MIN);
        assert_eq!(*upper.end(), Id::MAX);
        assert_eq!(lower.end().incremented(), *upper.start());

        // order within each half is preserved
        let lower_ids: Vec<_> = lower.iter().map(|p| p.id).collect();
        let upper_ids: Vec<_> = upper.iter().map(|p| p.id).collect();
        assert_eq!(lower_ids, vec![id_with_head(&[0x00, 1]), id_with_head(&[0x40])]);
        assert_eq!(upper_ids, vec![id_with_head(&[0xc0]), id_with_head(&[0x80])]);

        assert_eq!(lower.len() + upper.len(), 4);
    }

    #[test]
    fn peers_by_distance_sorts_by_xor() {
        let mut bucket = full_range_bucket(8);
        for head in [[0x10u8], [0x02], [0x01], [0x08]] {
            bucket.add_peer(peer(&head));
        }

        let target = id_with_head(&[0x03]);
        let distances: Vec<_> = bucket
            .peers_by_distance(&target)
            .iter()
            .map(|p| p.id.xor(&target))
            .collect();

        let mut sorted = distances.clone();
        sorted.sort();
        assert_eq!(distances, sorted);

        // closest first: 0x02 ^ 0x03 == 0x01
        assert_eq!(
            bucket.peers_by_distance(&target)[0].id,
            id_with_head(&[0x02])
        );
    }

    #[test]
    fn random_id_stays_in_range() {
        let (lower, upper) = full_range_bucket(4).split();

        for _ in 0..32 {
            let id = lower.random_id();
            assert!(lower.contains_id(&id));

            let id = upper.random_id();
            assert!(upper.contains_id(&id));
        }
    }

    #[test]
    fn contains_id_is_inclusive() {
        let (lower, upper) = full_range_bucket(4).split();

        assert!(lower.contains_id(&Id::MIN));
        assert!(lower.contains_id(lower.end()));
        assert!(!lower.contains_id(upper.start()));
        assert!(upper.contains_id(&Id::MAX));
    }
}
