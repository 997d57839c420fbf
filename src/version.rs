//! Version byte: identifies the console platform a container was ripped from.
//!
//! The set of known platforms is open.  A byte this build does not recognise
//! is carried as [`Version::Unknown`] and round-trips unchanged; it is never
//! a decode error.

use serde::Serialize;
use std::fmt;

// ── Known version bytes ───────────────────────────────────────────────────────

pub const VERSION_PLAYSTATION:   u8 = 0x01;
pub const VERSION_PLAYSTATION_2: u8 = 0x02;
pub const VERSION_SATURN:        u8 = 0x11;
pub const VERSION_DREAMCAST:     u8 = 0x12;
pub const VERSION_GENESIS:       u8 = 0x13;
pub const VERSION_NINTENDO_64:   u8 = 0x21;
pub const VERSION_GBA:           u8 = 0x22;
pub const VERSION_SNES:          u8 = 0x23;
pub const VERSION_QSOUND:        u8 = 0x41;

// ── Version enum ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "u8")]
pub enum Version {
    Playstation,
    Playstation2,
    Saturn,
    Dreamcast,
    Genesis,
    Nintendo64,
    GameBoyAdvance,
    SuperNes,
    QSound,
    /// Any byte outside the known set, preserved verbatim.
    Unknown(u8),
}

impl Version {
    /// The raw byte as stored at offset 3 of the file.
    #[inline]
    pub fn as_u8(self) -> u8 {
        match self {
            Version::Playstation    => VERSION_PLAYSTATION,
            Version::Playstation2   => VERSION_PLAYSTATION_2,
            Version::Saturn         => VERSION_SATURN,
            Version::Dreamcast      => VERSION_DREAMCAST,
            Version::Genesis        => VERSION_GENESIS,
            Version::Nintendo64     => VERSION_NINTENDO_64,
            Version::GameBoyAdvance => VERSION_GBA,
            Version::SuperNes       => VERSION_SNES,
            Version::QSound         => VERSION_QSOUND,
            Version::Unknown(b)     => b,
        }
    }

    pub fn is_known(self) -> bool {
        !matches!(self, Version::Unknown(_))
    }

    /// Platform name, or `None` for an unrecognised byte.
    pub fn name(self) -> Option<&'static str> {
        match self {
            Version::Playstation    => Some("Playstation"),
            Version::Playstation2   => Some("Playstation 2"),
            Version::Saturn         => Some("Saturn"),
            Version::Dreamcast      => Some("Dreamcast"),
            Version::Genesis        => Some("Sega Genesis"),
            Version::Nintendo64     => Some("Nintendo 64"),
            Version::GameBoyAdvance => Some("GameBoy Advance"),
            Version::SuperNes       => Some("Super NES"),
            Version::QSound         => Some("Capcom QSound"),
            Version::Unknown(_)     => None,
        }
    }

    /// Conventional file-family abbreviation (diagnostics only).
    pub fn family(self) -> Option<&'static str> {
        match self {
            Version::Playstation    => Some("PSF1"),
            Version::Playstation2   => Some("PSF2"),
            Version::Saturn         => Some("SSF"),
            Version::Dreamcast      => Some("DSF"),
            Version::Nintendo64     => Some("USF"),
            Version::GameBoyAdvance => Some("GSF"),
            Version::SuperNes       => Some("SNSF"),
            Version::QSound         => Some("QSF"),
            Version::Genesis | Version::Unknown(_) => None,
        }
    }
}

impl From<u8> for Version {
    fn from(b: u8) -> Self {
        match b {
            VERSION_PLAYSTATION   => Version::Playstation,
            VERSION_PLAYSTATION_2 => Version::Playstation2,
            VERSION_SATURN        => Version::Saturn,
            VERSION_DREAMCAST     => Version::Dreamcast,
            VERSION_GENESIS       => Version::Genesis,
            VERSION_NINTENDO_64   => Version::Nintendo64,
            VERSION_GBA           => Version::GameBoyAdvance,
            VERSION_SNES          => Version::SuperNes,
            VERSION_QSOUND        => Version::QSound,
            other                 => Version::Unknown(other),
        }
    }
}

impl From<Version> for u8 {
    fn from(v: Version) -> u8 {
        v.as_u8()
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.name(), self.family()) {
            (Some(name), Some(family)) => write!(f, "{name} ({family})"),
            (Some(name), None)         => f.write_str(name),
            (None, _)                  => f.write_str("unknown"),
        }
    }
}
