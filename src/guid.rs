//! GUIDs, as GPT stores them.
//!
//! GPT stores GUIDs mixed-endian: the first three fields little endian,
//! the last eight bytes as-is. See Appendix A of the UEFI specification.
use crate::gpt::error::{Error, Result};
use core::{fmt, str::FromStr};
use log::debug;
use once_cell::sync::Lazy;
use rand::{rngs::StdRng, RngCore, SeedableRng};
#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};
use std::{
    sync::Mutex,
    time::{SystemTime, UNIX_EPOCH},
};
use uuid::{Builder, Uuid};

/// Length of the canonical text form, `XXXXXXXX-XXXX-XXXX-XXXX-XXXXXXXXXXXX`.
pub const GUID_STR_LEN: usize = 36;

/// Hex digits in each dash separated group.
const GROUPS: [usize; 5] = [8, 4, 4, 4, 12];

/// Random source for [`Guid::random`], seeded once per process.
static PROCESS_RNG: Lazy<Mutex<StdRng>> = Lazy::new(|| {
    let seed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default();
    debug!("Seeding GUID generator with {:#x}", seed);
    Mutex::new(StdRng::seed_from_u64(seed))
});

/// Run `f` with the process-wide GUID random source.
///
/// The source is seeded from the wall clock the first time this is called,
/// and never again.
pub fn with_process_rng<T>(f: impl FnOnce(&mut StdRng) -> T) -> T {
    // A panic while holding the lock can't leave a StdRng half updated.
    let mut rng = match PROCESS_RNG.lock() {
        Ok(rng) => rng,
        Err(poisoned) => poisoned.into_inner(),
    };
    f(&mut rng)
}

/// A generator seeded from the process-wide source.
///
/// The process-wide source is only locked while the seed is drawn.
pub fn fork_process_rng() -> StdRng {
    let mut seed = <StdRng as SeedableRng>::Seed::default();
    with_process_rng(|rng| rng.fill_bytes(&mut seed));
    StdRng::from_seed(seed)
}

/// A 128-bit GUID.
///
/// The all-zero GUID means "unset".
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate", transparent)
)]
#[repr(transparent)]
pub struct Guid(Uuid);

impl Guid {
    /// The all-zero GUID.
    pub const ZERO: Guid = Guid(Uuid::nil());

    /// Create a `Guid` from its fields.
    pub const fn from_fields(d1: u32, d2: u16, d3: u16, d4: [u8; 8]) -> Self {
        Guid(Uuid::from_fields(d1, d2, d3, &d4))
    }

    /// The fields of this `Guid`.
    pub fn as_fields(&self) -> (u32, u16, u16, [u8; 8]) {
        let (d1, d2, d3, d4) = self.0.as_fields();
        (d1, d2, d3, *d4)
    }

    /// Decode a `Guid` from its on-disk form.
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Guid(Uuid::from_bytes_le(bytes))
    }

    /// Encode this `Guid` to its on-disk form.
    pub fn to_bytes(&self) -> [u8; 16] {
        self.0.to_bytes_le()
    }

    /// Whether this is the all-zero GUID.
    pub fn is_zero(&self) -> bool {
        self.0.is_nil()
    }

    /// A random version 4 GUID from `rng`.
    pub fn random_from<R: RngCore + ?Sized>(rng: &mut R) -> Self {
        let mut bytes = [0; 16];
        rng.fill_bytes(&mut bytes);
        // Sets version 4 and the `10` variant
        Guid(Builder::from_random_bytes(bytes).into_uuid())
    }

    /// A random version 4 GUID from the process-wide source.
    pub fn random() -> Self {
        with_process_rng(|rng| Self::random_from(rng))
    }

    /// The underlying [`Uuid`].
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

/// Canonical upper-case text form.
impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:X}", self.0.hyphenated())
    }
}

impl fmt::Debug for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Guid({})", self)
    }
}

/// Parse the canonical text form only.
///
/// Hex digits may be either case. Braces, URNs and the un-hyphenated
/// form are all rejected.
impl FromStr for Guid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidGuid(s.into());
        if s.len() != GUID_STR_LEN {
            return Err(invalid());
        }
        let mut groups = s.split('-');
        for len in GROUPS.iter() {
            let group = groups.next().ok_or_else(invalid)?;
            if group.len() != *len || !group.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(invalid());
            }
        }
        if groups.next().is_some() {
            return Err(invalid());
        }
        Uuid::parse_str(s).map(Guid).map_err(|_| invalid())
    }
}

impl From<Uuid> for Guid {
    fn from(uuid: Uuid) -> Self {
        Guid(uuid)
    }
}

impl From<Guid> for Uuid {
    fn from(guid: Guid) -> Self {
        guid.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::Result;
    use pretty_assertions::assert_eq;

    const EFI_SYSTEM: &str = "C12A7328-F81F-11D2-BA4B-00A0C93EC93B";

    #[test]
    fn text_roundtrip() -> Result {
        let guid: Guid = EFI_SYSTEM.parse()?;
        assert_eq!(guid.to_string(), EFI_SYSTEM);
        assert_eq!(
            guid.as_fields(),
            (
                0xC12A_7328,
                0xF81F,
                0x11D2,
                [0xBA, 0x4B, 0x00, 0xA0, 0xC9, 0x3E, 0xC9, 0x3B]
            )
        );
        // Lower case input, upper case output
        let lower: Guid = EFI_SYSTEM.to_lowercase().parse()?;
        assert_eq!(lower, guid);
        assert_eq!(lower.to_string().len(), GUID_STR_LEN);
        Ok(())
    }

    #[test]
    fn rejects_loose_text() {
        for bad in &[
            "",
            "C12A7328F81F11D2BA4B00A0C93EC93B",
            "{C12A7328-F81F-11D2-BA4B-00A0C93EC93B}",
            "urn:uuid:C12A7328-F81F-11D2-BA4B-00A0C93EC93B",
            "C12A7328-F81F-11D2-BA4B00A0-C93EC93B",
            "C12A732-8F81F-11D2-BA4B-00A0C93EC93B",
            "C12A7328-F81F-11D2-BA4B-00A0C93EC93G",
            "C12A7328-F81F-11D2-BA4B-00A0C93EC93B0",
            "C12A7328+F81F-11D2-BA4B-00A0C93EC93B",
        ] {
            let err = bad.parse::<Guid>().unwrap_err();
            assert!(matches!(err, Error::InvalidGuid(_)), "{} parsed", bad);
        }
    }

    #[test]
    fn binary_is_mixed_endian() -> Result {
        let guid: Guid = EFI_SYSTEM.parse()?;
        let bytes = guid.to_bytes();
        assert_eq!(
            bytes,
            [
                0x28, 0x73, 0x2A, 0xC1, 0x1F, 0xF8, 0xD2, 0x11, //
                0xBA, 0x4B, 0x00, 0xA0, 0xC9, 0x3E, 0xC9, 0x3B,
            ]
        );
        assert_eq!(Guid::from_bytes(bytes), guid);
        Ok(())
    }

    #[test]
    fn zero() {
        assert!(Guid::ZERO.is_zero());
        assert!(Guid::default().is_zero());
        assert_eq!(Guid::ZERO.to_bytes(), [0; 16]);
        assert!(!Guid::from_fields(0, 0, 0, [0, 0, 0, 0, 0, 0, 0, 1]).is_zero());
    }

    #[test]
    fn random_version_and_variant() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..64 {
            let guid = Guid::random_from(&mut rng);
            assert!(!guid.is_zero());
            let (_, _, d3, d4) = guid.as_fields();
            assert_eq!(d3 >> 12, 4, "version");
            assert_eq!(d4[0] >> 6, 0b10, "variant");
        }
    }

    #[test]
    fn random_from_is_deterministic() {
        let a = Guid::random_from(&mut StdRng::seed_from_u64(7));
        let b = Guid::random_from(&mut StdRng::seed_from_u64(7));
        assert_eq!(a, b);
    }

    #[test]
    fn process_random_is_unique() {
        let a = Guid::random();
        let b = Guid::random();
        assert_ne!(a, b);
        assert!(!a.is_zero());
        assert_eq!(a.as_uuid().get_version_num(), 4);
    }

    #[test]
    fn forked_generators_differ() {
        let a = Guid::random_from(&mut fork_process_rng());
        let b = Guid::random_from(&mut fork_process_rng());
        assert_ne!(a, b);
    }
}
