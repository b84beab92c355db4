//! Main Crate Error

#[derive(thiserror::Error, Debug)]
/// Peerkeeper crate error enum.
pub enum Error {
    /// Indicates that an id was built from the wrong number of bytes.
    #[error("Invalid Id size, expected {expected} bytes, got {0}", expected = crate::common::ID_SIZE)]
    InvalidIdSize(usize),

    /// Indicates that a hex-encoded id has the wrong length.
    #[error("Invalid Id encoding, expected {expected} characters, got {0}", expected = crate::common::ID_SIZE * 2)]
    InvalidIdEncoding(usize),

    #[error("Invalid hex character in Id: {0:?}")]
    InvalidHexCharacter(char),
}

pub type Result<T> = std::result::Result<T, Error>;
