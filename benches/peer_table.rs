//! Micro-benchmarks for PeerKeeper operations: add_peer, neighbours, and
//! sync at varying table sizes. Reports nanoseconds-per-operation.
//!
//! Catches regressions in the hot-path data structure that underlies every
//! peer-seen event and maintenance tick.
//!
//! Run: `cargo bench --bench peer_table`

use peerkeeper::{Id, PeerInfo, PeerKeeper};
use std::time::Instant;

fn main() {
    println!("peer_table\n");

    bench_add_peer();
    bench_neighbours();
    bench_sync();
}

fn bench_add_peer() {
    println!("add_peer");

    // Pre-generate random peers outside the timed section
    let peers: Vec<_> = (0..1000).map(|_| PeerInfo::random()).collect();

    let mut keeper = PeerKeeper::new(Id::random());
    let start = Instant::now();
    for peer in peers.iter().cloned() {
        keeper.add_peer(peer);
    }
    let per_op = start.elapsed().as_nanos() / peers.len() as u128;
    println!(
        "1000 random peers: {per_op}ns/op (final size: {})",
        keeper.size()
    );
}

fn bench_neighbours() {
    println!("\nneighbours");

    for table_size in [100usize, 1000] {
        let mut keeper = PeerKeeper::new(Id::random());
        for _ in 0..table_size {
            keeper.add_peer(PeerInfo::random());
        }

        let targets: Vec<_> = (0..1000).map(|_| Id::random()).collect();

        let start = Instant::now();
        for target in &targets {
            let _ = keeper.neighbours(target);
        }
        let per_op = start.elapsed().as_nanos() / targets.len() as u128;
        println!("{table_size} peers in table: {per_op}ns/op");
    }
}

fn bench_sync() {
    println!("\nsync");

    let mut keeper = PeerKeeper::new(Id::random());
    for _ in 0..1000 {
        keeper.add_peer(PeerInfo::random());
    }

    let rounds = 100u128;
    let start = Instant::now();
    for _ in 0..rounds {
        let _ = keeper.sync();
        let _ = keeper.take_sessions_to_close();
    }
    let per_op = start.elapsed().as_nanos() / rounds;
    println!("1000 peers in table: {per_op}ns/op");
}
