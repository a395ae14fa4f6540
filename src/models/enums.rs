use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
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
    };
}

str_enum!(FrequencyType {
    Daily => "daily",
    AlternateDay => "alternate_day",
    SpecificDays => "specific_days",
});

str_enum!(NotificationChannel {
    Reminder => "medicine_reminder_channel",
    Refill => "medicine_refill_channel",
});

impl NotificationChannel {
    /// User-visible channel name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Reminder => "Medicine Reminders",
            Self::Refill => "Medicine Refill Reminders",
        }
    }
}
