use std::collections::HashMap;

use chrono::{DateTime, Datelike, Local, NaiveDate, Timelike, Weekday};

use crate::config::{ConfigError, PolicyConfig};
use crate::db::models::Role;

/// Odd/even classification of a date's ISO week number, used by the
/// alternating-week access rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeekParity {
    Odd,
    Even,
}

impl WeekParity {
    pub fn of(date: NaiveDate) -> Self {
        if date.iso_week().week() % 2 == 0 {
            WeekParity::Even
        } else {
            WeekParity::Odd
        }
    }

    pub fn parse(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "odd" => Some(WeekParity::Odd),
            "even" => Some(WeekParity::Even),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Permitted,
    Denied(String),
}

impl Decision {
    pub fn is_permitted(&self) -> bool {
        matches!(self, Decision::Permitted)
    }
}

#[derive(Debug, Clone)]
struct RoleRule {
    weekdays: Vec<Weekday>,
    alternating: Vec<(Weekday, WeekParity)>,
}

/// Stateless access-window evaluation over the configured policy tables.
#[derive(Debug, Clone)]
pub struct AccessPolicy {
    unlock_hour: u32,
    rules: HashMap<Role, RoleRule>,
}

impl AccessPolicy {
    pub fn from_config(config: &PolicyConfig) -> Result<Self, ConfigError> {
        let mut rules = HashMap::new();
        for (role_name, rule) in &config.roles {
            let role = Role::parse(role_name).ok_or_else(|| {
                ConfigError::InvalidConfig(format!("unknown role in policy table: {role_name}"))
            })?;

            let mut weekdays = Vec::new();
            for token in &rule.weekdays {
                let weekday = token.parse::<Weekday>().map_err(|_| {
                    ConfigError::InvalidConfig(format!("unknown weekday: {token}"))
                })?;
                weekdays.push(weekday);
            }

            let mut alternating = Vec::new();
            for entry in &rule.alternating {
                let weekday = entry.weekday.parse::<Weekday>().map_err(|_| {
                    ConfigError::InvalidConfig(format!("unknown weekday: {}", entry.weekday))
                })?;
                let parity = WeekParity::parse(&entry.parity).ok_or_else(|| {
                    ConfigError::InvalidConfig(format!(
                        "week parity must be \"odd\" or \"even\", got: {}",
                        entry.parity
                    ))
                })?;
                alternating.push((weekday, parity));
            }

            rules.insert(role, RoleRule { weekdays, alternating });
        }

        Ok(Self {
            unlock_hour: config.unlock_hour,
            rules,
        })
    }

    /// Whether `role` may hold a booking on `date`, evaluated at wall-clock
    /// `now`. Admins always pass. Weekends never open, not even after the
    /// unlock hour; for weekdays the unlock hour lifts the role tables.
    pub fn booking_permitted(&self, role: Role, date: NaiveDate, now: DateTime<Local>) -> Decision {
        if role == Role::Admin {
            return Decision::Permitted;
        }

        let weekday = date.weekday();
        if matches!(weekday, Weekday::Sat | Weekday::Sun) {
            return Decision::Denied("weekends are not bookable".to_string());
        }

        if let Some(rule) = self.rules.get(&role) {
            if rule.weekdays.contains(&weekday) {
                return Decision::Permitted;
            }
            let parity = WeekParity::of(date);
            if rule
                .alternating
                .iter()
                .any(|(day, day_parity)| *day == weekday && *day_parity == parity)
            {
                return Decision::Permitted;
            }
        }

        if now.hour() >= self.unlock_hour {
            return Decision::Permitted;
        }

        Decision::Denied(format!(
            "role {} may not book on {} before {:02}:00",
            role.as_str(),
            weekday,
            self.unlock_hour
        ))
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use test_case::test_case;

    use super::*;

    fn policy() -> AccessPolicy {
        AccessPolicy::from_config(&PolicyConfig::default()).expect("default policy")
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("test date")
    }

    fn clock(hour: u32) -> DateTime<Local> {
        Local
            .with_ymd_and_hms(2025, 1, 13, hour, 0, 0)
            .unwrap()
    }

    #[test]
    fn iso_week_parity_alternates() {
        // 2025-01-15 falls in ISO week 3, 2025-01-22 in week 4.
        assert_eq!(WeekParity::of(date("2025-01-15")), WeekParity::Odd);
        assert_eq!(WeekParity::of(date("2025-01-22")), WeekParity::Even);
    }

    #[test_case("2025-01-15", false ; "odd week wednesday is closed")]
    #[test_case("2025-01-22", true ; "even week wednesday is open")]
    fn spp_wednesday_follows_week_parity(day: &str, expected: bool) {
        let decision = policy().booking_permitted(Role::Spp, date(day), clock(6));
        assert_eq!(decision.is_permitted(), expected);
    }

    #[test_case("2025-01-15", true ; "odd week wednesday is open")]
    #[test_case("2025-01-22", false ; "even week wednesday is closed")]
    fn gst_wednesday_uses_opposite_parity(day: &str, expected: bool) {
        let decision = policy().booking_permitted(Role::Gst, date(day), clock(6));
        assert_eq!(decision.is_permitted(), expected);
    }

    #[test]
    fn spp_listed_weekdays_are_always_open() {
        // Monday sits in the plain weekday table, no parity involved.
        let decision = policy().booking_permitted(Role::Spp, date("2025-01-13"), clock(6));
        assert!(decision.is_permitted());
    }

    #[test]
    fn unlock_hour_lifts_weekday_restrictions() {
        let day = date("2025-01-15"); // odd-week Wednesday, closed to SPP
        assert!(!policy()
            .booking_permitted(Role::Spp, day, clock(6))
            .is_permitted());
        assert!(policy()
            .booking_permitted(Role::Spp, day, clock(7))
            .is_permitted());
    }

    #[test_case(6 ; "before unlock")]
    #[test_case(9 ; "after unlock")]
    fn weekends_stay_closed(hour: u32) {
        let saturday = date("2025-01-18");
        let decision = policy().booking_permitted(Role::User, saturday, clock(hour));
        assert!(!decision.is_permitted());
    }

    #[test]
    fn admin_bypasses_all_tables() {
        let saturday = date("2025-01-18");
        let decision = policy().booking_permitted(Role::Admin, saturday, clock(3));
        assert!(decision.is_permitted());
    }

    #[test]
    fn role_without_rule_relies_on_unlock_hour() {
        let config = PolicyConfig {
            unlock_hour: 7,
            roles: Default::default(),
        };
        let policy = AccessPolicy::from_config(&config).expect("empty policy");

        let monday = date("2025-01-13");
        assert!(!policy
            .booking_permitted(Role::User, monday, clock(6))
            .is_permitted());
        assert!(policy
            .booking_permitted(Role::User, monday, clock(8))
            .is_permitted());
    }

    #[test]
    fn unknown_role_in_table_is_rejected() {
        let mut config = PolicyConfig::default();
        config.roles.insert(
            "supervisor".to_string(),
            crate::config::RoleRuleConfig {
                weekdays: vec!["Mon".to_string()],
                alternating: Vec::new(),
            },
        );
        assert!(AccessPolicy::from_config(&config).is_err());
    }
}
