//! Host integrations a sandboxed instance may have enabled.
//!
//! The sandbox tool reports these either as a bitset integer or as a map of
//! booleans depending on its version. Both decode into [`Enablements`].

use std::collections::BTreeMap;
use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Set of enabled host integrations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Enablements(u8);

impl Enablements {
    /// No integrations.
    pub const NONE: Self = Self(0);
    /// Wayland socket via security-context-v1.
    pub const WAYLAND: Self = Self(1);
    /// X11 socket and ChangeHosts entry.
    pub const X11: Self = Self(1 << 1);
    /// Per-instance D-Bus proxy.
    pub const DBUS: Self = Self(1 << 2);
    /// PulseAudio socket and cookie.
    pub const PULSE: Self = Self(1 << 3);

    const ALL: [(Self, &'static str); 4] = [
        (Self::WAYLAND, "wayland"),
        (Self::X11, "x11"),
        (Self::DBUS, "dbus"),
        (Self::PULSE, "pulseaudio"),
    ];
    const KNOWN_BITS: u8 = 0b1111;

    /// Stands in for integrations the map form names but this crate does not know.
    ///
    /// Never requested, so any record carrying it fails strict comparison.
    pub const UNRECOGNIZED: Self = Self(1 << 7);

    /// Creates a set from the tool's bitset representation.
    ///
    /// Unknown bits are kept so that a mismatch against them is still reported.
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    /// Returns the bitset representation.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Returns true if every integration in `other` is enabled.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns true if nothing is enabled.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns the enabled integration names in bit order.
    pub fn names(self) -> impl Iterator<Item = &'static str> {
        Self::ALL
            .into_iter()
            .filter(move |(flag, _)| self.contains(*flag))
            .map(|(_, name)| name)
    }
}

impl BitOr for Enablements {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for Enablements {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for Enablements {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("(no enablements)");
        }
        let names: Vec<_> = self.names().collect();
        if names.is_empty() {
            return write!(f, "e{:x}", self.0);
        }
        f.write_str(&names.join(", "))?;
        let unknown = self.0 & !Self::KNOWN_BITS;
        if unknown != 0 {
            write!(f, ", e{unknown:x}")?;
        }
        Ok(())
    }
}

impl FromStr for Enablements {
    type Err = String;

    /// Parses a comma-separated list such as `wayland,pulse`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut set = Self::NONE;
        for name in s.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            set |= match name {
                "wayland" => Self::WAYLAND,
                "x11" => Self::X11,
                "dbus" => Self::DBUS,
                "pulse" | "pulseaudio" => Self::PULSE,
                other => return Err(format!("unknown enablement {other:?}")),
            };
        }
        Ok(set)
    }
}

/// Map representation used by newer tool versions.
#[derive(Debug, Default, Serialize, Deserialize)]
struct EnablementFlags {
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    wayland: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    x11: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    dbus: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pulse: bool,
    #[serde(flatten, skip_serializing)]
    other: BTreeMap<String, bool>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum EnablementsRepr {
    Bits(u8),
    Flags(EnablementFlags),
}

impl<'de> Deserialize<'de> for Enablements {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match EnablementsRepr::deserialize(deserializer)? {
            EnablementsRepr::Bits(bits) => Self::from_bits(bits),
            EnablementsRepr::Flags(flags) => {
                let mut set = Self::NONE;
                for (on, flag) in [
                    (flags.wayland, Self::WAYLAND),
                    (flags.x11, Self::X11),
                    (flags.dbus, Self::DBUS),
                    (flags.pulse, Self::PULSE),
                ] {
                    if on {
                        set |= flag;
                    }
                }
                if flags.other.values().any(|on| *on) {
                    set |= Self::UNRECOGNIZED;
                }
                set
            }
        })
    }
}

impl Serialize for Enablements {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        EnablementFlags {
            wayland: self.contains(Self::WAYLAND),
            x11: self.contains(Self::X11),
            dbus: self.contains(Self::DBUS),
            pulse: self.contains(Self::PULSE),
            other: BTreeMap::new(),
        }
        .serialize(serializer)
    }
}
