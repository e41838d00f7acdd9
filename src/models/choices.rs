use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} `{value}`")]
pub struct UnknownChoice {
    pub kind: &'static str,
    pub value: String,
}

/// Declares a string-backed choice enum stored as TEXT and exchanged as snake_case JSON.
macro_rules! choice_enum {
    ($(#[$meta:meta])* $name:ident, $kind:literal { $($variant:ident => $value:literal : $label:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $value)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $value),+
                }
            }

            pub fn label(&self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = UnknownChoice;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($value => Ok($name::$variant),)+
                    other => Err(UnknownChoice {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl TryFrom<String> for $name {
            type Error = UnknownChoice;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

choice_enum!(Category, "category" {
    Job => "job" : "Job",
    Scholarship => "scholarship" : "Scholarship",
    Internship => "internship" : "Internship",
    Fellowship => "fellowship" : "Fellowship",
    Training => "training" : "Training",
});

choice_enum!(Location, "location" {
    Kenya => "kenya" : "Kenya",
    Uganda => "uganda" : "Uganda",
    Tanzania => "tanzania" : "Tanzania",
    Rwanda => "rwanda" : "Rwanda",
    Remote => "remote" : "Remote",
    Multiple => "multiple" : "Multiple Locations",
});

choice_enum!(WorkMode, "work mode" {
    Remote => "remote" : "Remote",
    Hybrid => "hybrid" : "Hybrid",
    Onsite => "onsite" : "On-site",
});

choice_enum!(Commitment, "commitment" {
    FullTime => "full_time" : "Full-time",
    PartTime => "part_time" : "Part-time",
    ShortTerm => "short_term" : "Short-term",
    LongTerm => "long_term" : "Long-term",
});

choice_enum!(TargetGroup, "target group" {
    Refugees => "refugees" : "Refugees",
    Youth => "youth" : "Youth",
    Women => "women" : "Women",
    PersonsWithDisabilities => "persons_with_disabilities" : "Persons with Disabilities",
    General => "general" : "General Public",
});

choice_enum!(EducationLevel, "education level" {
    HighSchool => "high_school" : "High School",
    Diploma => "diploma" : "Diploma",
    Undergraduate => "undergraduate" : "Undergraduate",
    Postgraduate => "postgraduate" : "Postgraduate",
    Any => "any" : "Any Level",
});

choice_enum!(FundingType, "funding type" {
    Fully => "fully" : "Fully Funded",
    Partially => "partially" : "Partially Funded",
    Unfunded => "none" : "Not Funded",
});

choice_enum!(DocumentType, "document type" {
    AlienCard => "alien_card" : "Alien Card",
    Ctd => "ctd" : "CTD (Convention Travel Document)",
    Passport => "passport" : "Passport",
    WaitingSlip => "waiting_slip" : "Waiting Slip",
    NationalId => "national_id" : "National ID",
    WorkPermit => "work_permit" : "Work Permit",
    BirthCertificate => "birth_certificate" : "Birth Certificate",
    AnyId => "any_id" : "Any Valid ID",
    NotSpecified => "not_specified" : "Not Specified",
});

choice_enum!(
    /// How applicants reach the organization.
    ApplicationType, "application type" {
    Link => "link" : "Apply on Official Site",
    Email => "email" : "Compose Application Email",
    Pdf => "pdf" : "View Brochure",
});

choice_enum!(ClickType, "click type" {
    Apply => "apply" : "Apply Button",
    ViewBrochure => "view_brochure" : "View Brochure",
    ComposeEmail => "compose_email" : "Compose Email",
    ViewDetails => "view_details" : "View Details",
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parsing_is_case_and_whitespace_insensitive() {
        assert_eq!(" Scholarship ".parse::<Category>().unwrap(), Category::Scholarship);
        assert_eq!("FULL_TIME".parse::<Commitment>().unwrap(), Commitment::FullTime);
    }

    #[test]
    fn unknown_values_name_their_kind() {
        let err = "freelance".parse::<Category>().unwrap_err();
        assert_eq!(err.kind, "category");
        assert_eq!(err.value, "freelance");
    }

    #[test]
    fn serde_uses_stored_values() {
        assert_eq!(
            serde_json::to_string(&FundingType::Unfunded).unwrap(),
            "\"none\""
        );
        let parsed: ClickType = serde_json::from_str("\"view_brochure\"").unwrap();
        assert_eq!(parsed, ClickType::ViewBrochure);
    }

    #[test]
    fn as_str_round_trips_every_variant() {
        for category in Category::ALL {
            assert_eq!(category.as_str().parse::<Category>().unwrap(), *category);
        }
        for doc in DocumentType::ALL {
            assert_eq!(doc.to_string().parse::<DocumentType>().unwrap(), *doc);
        }
    }
}
