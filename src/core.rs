//! Core identifier types shared by all topology records

use crate::error::{Result, TtiError};
use crate::iec61375::{LABEL_LEN, UUID_LEN};
use bitfield::bitfield;

/// Consist UUID, the join key between directories and the consist info cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CstUuid(pub [u8; UUID_LEN]);

impl CstUuid {
    /// The all-zero UUID, never assigned to a real consist
    pub const NIL: CstUuid = CstUuid([0; UUID_LEN]);

    /// Create a UUID from raw bytes
    pub fn new(bytes: [u8; UUID_LEN]) -> Self {
        CstUuid(bytes)
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8; UUID_LEN] {
        &self.0
    }

    /// Check if this is the all-zero UUID
    pub fn is_nil(&self) -> bool {
        self.0 == [0; UUID_LEN]
    }
}

impl std::fmt::Display for CstUuid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, b) in self.0.iter().enumerate() {
            if matches!(i, 4 | 6 | 8 | 10) {
                write!(f, "-")?;
            }
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

/// Fixed-size, NUL padded network label (consist, vehicle, function ids)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Label(pub [u8; LABEL_LEN]);

impl Label {
    /// Create a label from a string, validating it fits into 16 bytes
    pub fn new(text: &str) -> Result<Self> {
        let bytes = text.as_bytes();
        if bytes.len() > LABEL_LEN {
            return Err(TtiError::param(format!(
                "Label '{}' longer than {} bytes",
                text, LABEL_LEN
            )));
        }
        let mut raw = [0u8; LABEL_LEN];
        raw[..bytes.len()].copy_from_slice(bytes);
        Ok(Label(raw))
    }

    /// Bytes up to the first NUL
    pub fn as_bytes(&self) -> &[u8] {
        let end = self.0.iter().position(|&b| b == 0).unwrap_or(LABEL_LEN);
        &self.0[..end]
    }

    /// Label text, invalid UTF-8 replaced
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(self.as_bytes()).into_owned()
    }

    /// Check if the label is empty
    pub fn is_empty(&self) -> bool {
        self.0[0] == 0
    }

    /// ASCII case-insensitive comparison against a caller supplied label
    pub fn matches(&self, other: &str) -> bool {
        let other = other.as_bytes();
        let other = &other[..other.len().min(LABEL_LEN)];
        self.as_bytes().eq_ignore_ascii_case(other)
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_string_lossy())
    }
}

/// Two-byte version/release pair heading most records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Version {
    /// Version number
    pub ver: u8,
    /// Release number
    pub rel: u8,
}

impl Version {
    /// Create a new version
    pub fn new(ver: u8, rel: u8) -> Self {
        Version { ver, rel }
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.ver, self.rel)
    }
}

bitfield! {
    /// Raw orientation byte as carried by consists and vehicles
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct OrientByte(u8);
    impl Debug;
    /// '00'B not known, '01'B same, '10'B inverse
    pub u8, direction, set_direction: 1, 0;
}

/// Orientation relative to the operational train direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Orientation {
    /// Orientation not known (corrected vehicle)
    NotKnown,
    /// Same as operational train direction
    Same,
    /// Inverse to operational train direction
    Inverse,
}

impl From<u8> for Orientation {
    fn from(raw: u8) -> Self {
        match OrientByte(raw).direction() {
            0b01 => Orientation::Same,
            0b10 => Orientation::Inverse,
            _ => Orientation::NotKnown,
        }
    }
}

impl From<Orientation> for u8 {
    fn from(orient: Orientation) -> Self {
        let mut raw = OrientByte(0);
        raw.set_direction(match orient {
            Orientation::NotKnown => 0b00,
            Orientation::Same => 0b01,
            Orientation::Inverse => 0b10,
        });
        raw.0
    }
}

/// The two process-wide topology counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TopoCountKind {
    /// ETB-wide topology
    Etb,
    /// Operational train topology
    OpTrain,
}

impl std::fmt::Display for TopoCountKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TopoCountKind::Etb => write!(f, "ETB"),
            TopoCountKind::OpTrain => write!(f, "OpTrn"),
        }
    }
}
