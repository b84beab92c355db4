#![doc = include_str!("../README.md")]

mod common;
mod error;
mod keeper;

pub use crate::common::{Id, PeerInfo, ID_SIZE, KEY_BITS};
pub use crate::error::Error;
pub use crate::keeper::{
    Config, KBucket, PeerKeeper, DEFAULT_ALPHA, DEFAULT_BUCKET_SIZE, DEFAULT_IDLE_REFRESH,
    DEFAULT_PONG_TIMEOUT, DEFAULT_REQUEST_TIMEOUT,
};
