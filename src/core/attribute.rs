//! # Attribute Types
//!
//! Value types carried by the attribute codec and the `Attribute` union used
//! for fields that may hold any attribute kind.
//!
//! Time-like values have millisecond resolution on this wire profile:
//! - [`Time`] and [`FineTime`] count milliseconds since the epoch
//! - [`Duration`] holds fractional seconds and may be negative

use std::fmt;

use bytes::Bytes;

/// Opaque binary value. A blob may exist without a value, which the sink
/// encodes with the `-1` size sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Blob(Option<Bytes>);

impl Blob {
    pub fn new(value: impl Into<Bytes>) -> Self {
        Blob(Some(value.into()))
    }

    /// A blob object that carries no value.
    pub fn null_value() -> Self {
        Blob(None)
    }

    pub fn value(&self) -> Option<&[u8]> {
        self.0.as_deref()
    }

    pub fn is_null_value(&self) -> bool {
        self.0.is_none()
    }

    pub fn into_bytes(self) -> Option<Bytes> {
        self.0
    }
}

impl From<Vec<u8>> for Blob {
    fn from(value: Vec<u8>) -> Self {
        Blob::new(value)
    }
}

impl From<Bytes> for Blob {
    fn from(value: Bytes) -> Self {
        Blob::new(value)
    }
}

impl From<Option<Vec<u8>>> for Blob {
    fn from(value: Option<Vec<u8>>) -> Self {
        Blob(value.map(Bytes::from))
    }
}

/// Absolute time, milliseconds since the epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Time(i64);

impl Time {
    pub fn from_millis(millis: i64) -> Self {
        Time(millis)
    }

    pub fn as_millis(self) -> i64 {
        self.0
    }
}

/// High-precision absolute time. Carried at millisecond resolution on SPP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct FineTime(i64);

impl FineTime {
    pub fn from_millis(millis: i64) -> Self {
        FineTime(millis)
    }

    pub fn as_millis(self) -> i64 {
        self.0
    }
}

/// Signed relative time in fractional seconds.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct Duration(f64);

impl Duration {
    pub fn from_secs_f64(secs: f64) -> Self {
        Duration(secs)
    }

    pub fn from_millis(millis: i64) -> Self {
        Duration(millis as f64 / 1000.0)
    }

    pub fn as_secs_f64(self) -> f64 {
        self.0
    }

    /// Whole milliseconds, rounded to nearest and saturating at the `i64` range.
    pub fn as_millis(self) -> i64 {
        (self.0 * 1000.0).round() as i64
    }
}

macro_rules! string_attribute {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                $name(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_string(self) -> String {
                self.0
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                $name(value.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                $name(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_attribute!(
    /// Short name, such as an area or operation name.
    Identifier
);
string_attribute!(
    /// Service or provider address.
    Uri
);

/// Attribute kinds with their MAL short-form numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum AttributeKind {
    Blob = 1,
    Boolean = 2,
    Duration = 3,
    Float = 4,
    Double = 5,
    Identifier = 6,
    Octet = 7,
    UOctet = 8,
    Short = 9,
    UShort = 10,
    Integer = 11,
    UInteger = 12,
    Long = 13,
    ULong = 14,
    String = 15,
    Time = 16,
    FineTime = 17,
    Uri = 18,
}

impl AttributeKind {
    pub const ALL: [AttributeKind; 18] = [
        AttributeKind::Blob,
        AttributeKind::Boolean,
        AttributeKind::Duration,
        AttributeKind::Float,
        AttributeKind::Double,
        AttributeKind::Identifier,
        AttributeKind::Octet,
        AttributeKind::UOctet,
        AttributeKind::Short,
        AttributeKind::UShort,
        AttributeKind::Integer,
        AttributeKind::UInteger,
        AttributeKind::Long,
        AttributeKind::ULong,
        AttributeKind::String,
        AttributeKind::Time,
        AttributeKind::FineTime,
        AttributeKind::Uri,
    ];

    pub fn short_form(self) -> u8 {
        self as u8
    }

    pub fn from_short_form(value: i16) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| i16::from(kind.short_form()) == value)
    }

    pub fn name(self) -> &'static str {
        match self {
            AttributeKind::Blob => "Blob",
            AttributeKind::Boolean => "Boolean",
            AttributeKind::Duration => "Duration",
            AttributeKind::Float => "Float",
            AttributeKind::Double => "Double",
            AttributeKind::Identifier => "Identifier",
            AttributeKind::Octet => "Octet",
            AttributeKind::UOctet => "UOctet",
            AttributeKind::Short => "Short",
            AttributeKind::UShort => "UShort",
            AttributeKind::Integer => "Integer",
            AttributeKind::UInteger => "UInteger",
            AttributeKind::Long => "Long",
            AttributeKind::ULong => "ULong",
            AttributeKind::String => "String",
            AttributeKind::Time => "Time",
            AttributeKind::FineTime => "FineTime",
            AttributeKind::Uri => "URI",
        }
    }
}

/// A value of any attribute kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Attribute {
    Blob(Blob),
    Boolean(bool),
    Duration(Duration),
    Float(f32),
    Double(f64),
    Identifier(Identifier),
    Octet(i8),
    UOctet(u8),
    Short(i16),
    UShort(u16),
    Integer(i32),
    UInteger(u32),
    Long(i64),
    ULong(u64),
    String(String),
    Time(Time),
    FineTime(FineTime),
    Uri(Uri),
}

impl Attribute {
    pub fn kind(&self) -> AttributeKind {
        match self {
            Attribute::Blob(_) => AttributeKind::Blob,
            Attribute::Boolean(_) => AttributeKind::Boolean,
            Attribute::Duration(_) => AttributeKind::Duration,
            Attribute::Float(_) => AttributeKind::Float,
            Attribute::Double(_) => AttributeKind::Double,
            Attribute::Identifier(_) => AttributeKind::Identifier,
            Attribute::Octet(_) => AttributeKind::Octet,
            Attribute::UOctet(_) => AttributeKind::UOctet,
            Attribute::Short(_) => AttributeKind::Short,
            Attribute::UShort(_) => AttributeKind::UShort,
            Attribute::Integer(_) => AttributeKind::Integer,
            Attribute::UInteger(_) => AttributeKind::UInteger,
            Attribute::Long(_) => AttributeKind::Long,
            Attribute::ULong(_) => AttributeKind::ULong,
            Attribute::String(_) => AttributeKind::String,
            Attribute::Time(_) => AttributeKind::Time,
            Attribute::FineTime(_) => AttributeKind::FineTime,
            Attribute::Uri(_) => AttributeKind::Uri,
        }
    }
}
