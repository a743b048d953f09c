//! Wall-clock timestamps with an order-preserving 12-byte encoding.
//!
//! The encoding is the seconds field (signed, 64 bits) followed by the nanosecond fraction
//! (32 bits), both big-endian. The sign bit of the seconds field is flipped so pre-epoch
//! times sort below post-epoch ones when compared as unsigned bytes.
use std::{
    fmt::Display,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use super::{ByteCodec, DecodeError};

const NANOS_PER_SEC: u32 = 1_000_000_000;
const SIGN_BIT: u64 = 1 << 63;

/// A point in time as seconds plus a nanosecond fraction since the Unix epoch.
///
/// `nanos` is always below one second, so the derived ordering is chronological.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp {
    secs: i64,
    nanos: u32,
}

impl Timestamp {
    /// Width of the encoded form: 8 bytes of seconds, 4 bytes of nanoseconds.
    pub const ENCODED_LEN: usize = 12;

    pub const UNIX_EPOCH: Timestamp = Timestamp { secs: 0, nanos: 0 };

    /// Builds a timestamp, carrying whole seconds out of `nanos`. `None` on overflow.
    pub fn new(secs: i64, nanos: u32) -> Option<Self> {
        let carry = i64::from(nanos / NANOS_PER_SEC);
        Some(Self {
            secs: secs.checked_add(carry)?,
            nanos: nanos % NANOS_PER_SEC,
        })
    }

    pub fn now() -> Self {
        Self::from(SystemTime::now())
    }

    pub fn secs(&self) -> i64 {
        self.secs
    }

    pub fn nanos(&self) -> u32 {
        self.nanos
    }

    pub fn checked_add(&self, dur: Duration) -> Option<Self> {
        let secs = i64::try_from(dur.as_secs()).ok()?;
        let nanos = self.nanos + dur.subsec_nanos();
        Self::new(self.secs.checked_add(secs)?, nanos)
    }

    /// Time elapsed from `earlier` to `self`, or `None` if `earlier` is later.
    pub fn duration_since(&self, earlier: Timestamp) -> Option<Duration> {
        if *self < earlier {
            return None;
        }
        let mut secs = i128::from(self.secs) - i128::from(earlier.secs);
        let nanos = if self.nanos >= earlier.nanos {
            self.nanos - earlier.nanos
        } else {
            secs -= 1;
            self.nanos + NANOS_PER_SEC - earlier.nanos
        };
        Some(Duration::new(u64::try_from(secs).ok()?, nanos))
    }

    pub fn to_system_time(&self) -> Option<SystemTime> {
        let whole = if self.secs >= 0 {
            UNIX_EPOCH.checked_add(Duration::new(self.secs as u64, 0))?
        } else {
            UNIX_EPOCH.checked_sub(Duration::new(self.secs.unsigned_abs(), 0))?
        };
        whole.checked_add(Duration::new(0, self.nanos))
    }

    /// Order-preserving fixed-width encoding.
    pub fn encode(&self) -> [u8; Self::ENCODED_LEN] {
        let mut out = [0u8; Self::ENCODED_LEN];
        out[..8].copy_from_slice(&((self.secs as u64) ^ SIGN_BIT).to_be_bytes());
        out[8..].copy_from_slice(&self.nanos.to_be_bytes());
        out
    }

    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        if buf.len() != Self::ENCODED_LEN {
            return Err(DecodeError::InvalidLength {
                expected: Self::ENCODED_LEN,
                got: buf.len(),
            });
        }
        let mut secs = [0u8; 8];
        let mut nanos = [0u8; 4];
        secs.copy_from_slice(&buf[..8]);
        nanos.copy_from_slice(&buf[8..]);
        let nanos = u32::from_be_bytes(nanos);
        if nanos >= NANOS_PER_SEC {
            return Err(DecodeError::NanosOutOfRange(nanos));
        }
        Ok(Self {
            secs: (u64::from_be_bytes(secs) ^ SIGN_BIT) as i64,
            nanos,
        })
    }
}

/// Times further from the epoch than `i64::MAX` seconds saturate at that many seconds, keeping
/// their sub-second part.
impl From<SystemTime> for Timestamp {
    fn from(time: SystemTime) -> Self {
        match time.duration_since(UNIX_EPOCH) {
            Ok(dur) => Self {
                secs: i64::try_from(dur.as_secs()).unwrap_or(i64::MAX),
                nanos: dur.subsec_nanos(),
            },
            Err(before) => {
                let dur = before.duration();
                let secs = i64::try_from(dur.as_secs()).unwrap_or(i64::MAX);
                match dur.subsec_nanos() {
                    0 => Self {
                        secs: -secs,
                        nanos: 0,
                    },
                    frac => Self {
                        secs: -secs - 1,
                        nanos: NANOS_PER_SEC - frac,
                    },
                }
            }
        }
    }
}

impl Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:09}", self.secs, self.nanos)
    }
}

impl ByteCodec for Timestamp {
    fn encode_bytes(&self) -> Vec<u8> {
        self.encode().to_vec()
    }

    fn decode_bytes(buf: &[u8]) -> Result<Self, DecodeError> {
        Self::decode(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ts(secs: i64, nanos: u32) -> Timestamp {
        Timestamp::new(secs, nanos).unwrap()
    }

    #[test]
    fn test_encoded_layout() {
        let encoded = ts(1, 2).encode();
        assert_eq!(encoded.len(), 12);
        assert_eq!(&encoded[..8], &[0x80, 0, 0, 0, 0, 0, 0, 1]);
        assert_eq!(&encoded[8..], &[0, 0, 0, 2]);
    }

    #[test]
    fn test_negative_seconds_sort_before_epoch() {
        let before = ts(-1, 999_999_999).encode();
        let epoch = Timestamp::UNIX_EPOCH.encode();
        let after = ts(0, 1).encode();
        assert!(before < epoch);
        assert!(epoch < after);
    }

    #[test]
    fn test_decode_rejects_wrong_width() {
        assert_eq!(
            Timestamp::decode(&[0u8; 11]),
            Err(DecodeError::InvalidLength {
                expected: 12,
                got: 11
            })
        );
        assert!(Timestamp::decode(&[0u8; 13]).is_err());
    }

    #[test]
    fn test_decode_rejects_out_of_range_nanos() {
        let mut encoded = ts(5, 0).encode();
        encoded[8..].copy_from_slice(&NANOS_PER_SEC.to_be_bytes());
        assert_eq!(
            Timestamp::decode(&encoded),
            Err(DecodeError::NanosOutOfRange(NANOS_PER_SEC))
        );
    }

    #[test]
    fn test_new_carries_nanos() {
        assert_eq!(ts(1, 2_500_000_000), ts(3, 500_000_000));
        assert_eq!(Timestamp::new(i64::MAX, NANOS_PER_SEC), None);
    }

    #[test]
    fn test_checked_add_and_duration_since() {
        let start = ts(10, 900_000_000);
        let later = start.checked_add(Duration::from_millis(200)).unwrap();
        assert_eq!(later, ts(11, 100_000_000));
        assert_eq!(
            later.duration_since(start),
            Some(Duration::from_millis(200))
        );
        assert_eq!(start.duration_since(later), None);
        assert_eq!(ts(i64::MAX, 0).checked_add(Duration::from_secs(1)), None);
    }

    #[test]
    fn test_system_time_conversion_before_epoch() {
        let before = UNIX_EPOCH - Duration::from_millis(1500);
        let stamp = Timestamp::from(before);
        assert_eq!(stamp, ts(-2, 500_000_000));
        assert_eq!(stamp.to_system_time(), Some(before));
    }

    #[test]
    fn test_system_time_conversion_at_the_edges() {
        let far = Duration::new(i64::MAX as u64, 999_999_999);
        if let Some(late) = UNIX_EPOCH.checked_add(far) {
            assert_eq!(Timestamp::from(late), ts(i64::MAX, 999_999_999));
        }
        if let Some(early) = UNIX_EPOCH.checked_sub(Duration::from_secs(i64::MAX as u64)) {
            assert_eq!(Timestamp::from(early), ts(-i64::MAX, 0));
        }
    }

    proptest! {
        #[test]
        fn test_byte_order_matches_time_order(
            a_secs in any::<i64>(),
            a_nanos in 0..NANOS_PER_SEC,
            b_secs in any::<i64>(),
            b_nanos in 0..NANOS_PER_SEC,
        ) {
            let a = ts(a_secs, a_nanos);
            let b = ts(b_secs, b_nanos);
            prop_assert_eq!(a.cmp(&b), a.encode().cmp(&b.encode()));
            prop_assert_eq!(Timestamp::decode(&a.encode()), Ok(a));
        }
    }
}
