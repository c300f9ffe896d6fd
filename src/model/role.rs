use strum_macros::{AsRefStr, EnumString};

#[derive(Debug, Copy, Clone, Eq, PartialEq, EnumString, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    Admin = 1,
    Teacher = 2,
    Student = 3,
}

impl Role {
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(Role::Admin),
            2 => Some(Role::Teacher),
            3 => Some(Role::Student),
            _ => None,
        }
    }

    pub fn id(self) -> u8 {
        self as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn ids_round_trip() {
        for role in [Role::Admin, Role::Teacher, Role::Student] {
            assert_eq!(Role::from_id(role.id()), Some(role));
        }
        assert_eq!(Role::from_id(0), None);
        assert_eq!(Role::from_id(4), None);
    }

    #[test]
    fn parses_lowercase_names() {
        assert_eq!(Role::from_str("teacher"), Ok(Role::Teacher));
        assert_eq!(Role::Student.as_ref(), "student");
        assert!(Role::from_str("canteen").is_err());
    }
}
