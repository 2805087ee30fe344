use chrono_tz::Tz;

/// Named UTC offsets offered to users, each pinned to a representative
/// IANA zone so that reminder arithmetic stays DST-correct.
pub const OFFSET_ZONES: &[(&str, Tz)] = &[
    ("UTC-12", Tz::Etc__GMTPlus12),
    ("UTC-11", Tz::Pacific__Samoa),
    ("UTC-10", Tz::Pacific__Honolulu),
    ("UTC-9", Tz::America__Anchorage),
    ("UTC-8", Tz::America__Los_Angeles),
    ("UTC-7", Tz::America__Denver),
    ("UTC-6", Tz::America__Chicago),
    ("UTC-5", Tz::America__New_York),
    ("UTC-4", Tz::America__Halifax),
    ("UTC-3", Tz::America__Argentina__Buenos_Aires),
    ("UTC-2", Tz::Atlantic__Azores),
    ("UTC-1", Tz::Atlantic__Cape_Verde),
    ("UTC+0", Tz::Europe__London),
    ("UTC+1", Tz::Europe__Paris),
    ("UTC+2", Tz::Europe__Bucharest),
    ("UTC+3", Tz::Europe__Moscow),
    ("UTC+4", Tz::Asia__Baku),
    ("UTC+5", Tz::Asia__Karachi),
    ("UTC+6", Tz::Asia__Dhaka),
    ("UTC+7", Tz::Asia__Bangkok),
    ("UTC+8", Tz::Asia__Singapore),
    ("UTC+9", Tz::Asia__Tokyo),
    ("UTC+10", Tz::Australia__Sydney),
    ("UTC+11", Tz::Pacific__Guadalcanal),
    ("UTC+12", Tz::Pacific__Fiji),
    ("UTC+13", Tz::Pacific__Tongatapu),
    ("UTC+14", Tz::Pacific__Kiritimati),
];

pub const DEFAULT_OFFSET_NAME: &str = "UTC+0";

pub fn find_zone(offset_name: &str) -> Option<Tz> {
    OFFSET_ZONES
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(offset_name))
        .map(|(_, tz)| *tz)
}

pub fn offset_names() -> impl Iterator<Item = &'static str> {
    OFFSET_ZONES.iter().map(|(name, _)| *name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_offered_offset_resolves_to_a_zone() {
        for name in offset_names() {
            assert!(find_zone(name).is_some(), "No zone for {name}");
        }
    }

    #[test]
    fn lookup_is_case_insensitive() {
        assert_eq!(find_zone("utc+3"), Some(Tz::Europe__Moscow));
    }

    #[test]
    fn unknown_offset_is_rejected() {
        assert_eq!(find_zone("UTC+15"), None);
        assert_eq!(find_zone("Europe/Moscow"), None);
    }
}
