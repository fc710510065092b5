use crate::db::DatabaseError;

/// Macro to generate enum with as_str + std::str::FromStr pattern.
///
/// Serde goes through the same string table, so the wire format and the
/// stored column value are always identical.
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                raw.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

str_enum!(BloodType {
    Unspecified => "",
    APositive => "A+",
    ANegative => "A-",
    BPositive => "B+",
    BNegative => "B-",
    AbPositive => "AB+",
    AbNegative => "AB-",
    OPositive => "O+",
    ONegative => "O-",
});

impl Default for BloodType {
    fn default() -> Self {
        Self::Unspecified
    }
}

// Stored for clients; scheduling always uses `reminder_days`.
str_enum!(Recurrence {
    Once => "once",
    Daily => "daily",
    Weekly => "weekly",
});

impl Default for Recurrence {
    fn default() -> Self {
        Self::Once
    }
}

str_enum!(DeliveryStatus {
    Delivered => "delivered",
    Simulated => "simulated",
    Failed => "failed",
});
