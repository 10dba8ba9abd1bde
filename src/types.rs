/// Shared domain vocabulary: the enumerated column values and body helpers
/// used by every entity service.
use serde::{Deserialize, Deserializer, Serialize};

macro_rules! string_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [&'static str] = &[$($text),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

string_enum!(CaseType {
    AcademicSupport => "ACADEMIC_SUPPORT",
    Sel => "SEL",
    Distinctions => "DISTINCTIONS",
    ConflictResolution => "CONFLICT_RESOLUTION",
    Bullying => "BULLYING",
    ChildProtection => "CHILD_PROTECTION",
    Urgent => "URGENT",
});

string_enum!(
    /// OPEN is the only state a case is created in.
    CaseStatus {
        Open => "OPEN",
        OnHold => "ON_HOLD",
        Closed => "CLOSED",
        ReferredOut => "REFERRED_OUT",
    }
);

impl CaseStatus {
    /// Statuses that count as an active caseload.
    pub const ACTIVE: &'static [&'static str] = &["OPEN", "ON_HOLD"];
}

string_enum!(ReferralSource {
    KidTalk => "KID_TALK",
    BehaviorForm => "BEHAVIOR_FORM",
    SelfReferral => "SELF",
    Parent => "PARENT",
    Admin => "ADMIN",
});

string_enum!(InterventionType {
    Academic => "ACADEMIC",
    Sel => "SEL",
    Distinctions => "DISTINCTIONS",
});

string_enum!(MeetingStatus {
    Scheduled => "SCHEDULED",
    Completed => "COMPLETED",
    Cancelled => "CANCELLED",
    Rescheduled => "RESCHEDULED",
});

impl MeetingStatus {
    /// Meetings still expected to happen.
    pub const UPCOMING: &'static [&'static str] = &["SCHEDULED", "RESCHEDULED"];
}

/// Support intensity, 1 (universal) to 3 (intensive).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Tier(u8);

impl Tier {
    pub const ALL: [Tier; 3] = [Tier(1), Tier(2), Tier(3)];

    pub fn get(&self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for Tier {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            1..=3 => Ok(Tier(value as u8)),
            other => Err(format!("tier must be between 1 and 3, got {}", other)),
        }
    }
}

impl From<Tier> for i64 {
    fn from(tier: Tier) -> i64 {
        i64::from(tier.0)
    }
}

/// `null`, absent and `""` all read as `None`; anything else must parse.
///
/// Form posts send empty strings for untouched optional inputs.
pub fn blank_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => s.parse().map(Some).map_err(serde::de::Error::custom),
    }
}
