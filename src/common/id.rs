//! Peer identifier in the flat network namespace, and its XOR-metric arithmetic.
use std::convert::TryInto;
use std::fmt::{self, Debug, Display, Formatter};
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

/// The size of peer ids in bytes.
pub const ID_SIZE: usize = 64;
/// The size of peer ids in bits.
pub const KEY_BITS: usize = ID_SIZE * 8;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
/// Peer id or a lookup target.
///
/// Ids are fixed-width unsigned big-endian integers. Two ids are close in
/// proportion to the numeric value of their bitwise XOR, so the derived
/// lexicographic ordering doubles as the numeric ordering of distances.
pub struct Id(pub [u8; ID_SIZE]);

impl Id {
    /// The smallest id, bounding the identifier space from below.
    pub const MIN: Id = Id([0; ID_SIZE]);
    /// The largest id, bounding the identifier space from above.
    pub const MAX: Id = Id([0xff; ID_SIZE]);

    pub fn random() -> Id {
        let mut rng = rand::thread_rng();
        let mut bytes = [0u8; ID_SIZE];
        rng.fill(&mut bytes[..]);

        Id(bytes)
    }

    /// Create a new Id from some bytes. Returns Err if `bytes` is not of length
    /// [ID_SIZE].
    pub fn from_bytes<T: AsRef<[u8]>>(bytes: T) -> Result<Id> {
        let bytes = bytes.as_ref();
        let bytes: [u8; ID_SIZE] = bytes
            .try_into()
            .map_err(|_| Error::InvalidIdSize(bytes.len()))?;

        Ok(Id(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; ID_SIZE] {
        &self.0
    }

    // === Public Methods ===

    /// XOR distance between this id and `other`, as an id-width integer.
    ///
    /// Distance to self is [Id::MIN]. Distances compare through the derived
    /// ordering.
    pub fn xor(&self, other: &Id) -> Id {
        let mut out = [0u8; ID_SIZE];
        for (i, byte) in out.iter_mut().enumerate() {
            *byte = self.0[i] ^ other.0[i];
        }

        Id(out)
    }

    /// The floor of `(self + other) / 2` in unsigned arithmetic.
    ///
    /// The intermediate sum is one bit wider than an id, so the add's carry
    /// is fed back in as the top bit of the shifted result.
    pub fn midpoint(&self, other: &Id) -> Id {
        let mut sum = [0u8; ID_SIZE];
        let mut carry = 0u16;

        for i in (0..ID_SIZE).rev() {
            let s = u16::from(self.0[i]) + u16::from(other.0[i]) + carry;
            sum[i] = s as u8;
            carry = s >> 8;
        }

        let mut out = [0u8; ID_SIZE];
        let mut high_bit = carry as u8;
        for i in 0..ID_SIZE {
            out[i] = (sum[i] >> 1) | (high_bit << 7);
            high_bit = sum[i] & 1;
        }

        Id(out)
    }

    /// This id plus one. Wraps to [Id::MIN] at the top of the key space.
    pub fn incremented(&self) -> Id {
        let mut out = self.0;
        for byte in out.iter_mut().rev() {
            let (sum, overflow) = byte.overflowing_add(1);
            *byte = sum;
            if !overflow {
                break;
            }
        }

        Id(out)
    }
}

impl FromStr for Id {
    type Err = Error;

    /// Parse an id from its external hexadecimal form.
    fn from_str(s: &str) -> Result<Id> {
        let chars = s.as_bytes();
        if chars.len() != ID_SIZE * 2 {
            return Err(Error::InvalidIdEncoding(chars.len()));
        }

        let mut bytes = [0u8; ID_SIZE];
        for (i, byte) in bytes.iter_mut().enumerate() {
            let high = hex_value(chars[i * 2])?;
            let low = hex_value(chars[i * 2 + 1])?;
            *byte = (high << 4) | low;
        }

        Ok(Id(bytes))
    }
}

fn hex_value(c: u8) -> Result<u8> {
    match c {
        b'0'..=b'9' => Ok(c - b'0'),
        b'a'..=b'f' => Ok(c - b'a' + 10),
        b'A'..=b'F' => Ok(c - b'A' + 10),
        _ => Err(Error::InvalidHexCharacter(c as char)),
    }
}

impl Display for Id {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl Debug for Id {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Id({})", self)
    }
}

impl Serialize for Id {
    /// Ids travel as hex strings outside the process.
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Id {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Id, D::Error> {
        let string = String::deserialize(deserializer)?;
        string.parse().map_err(serde::de::Error::custom)
    }
}
