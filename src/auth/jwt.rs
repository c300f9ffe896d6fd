use crate::{model::role::Role, models::Claims};
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::Error};
use uuid::Uuid;

fn now() -> usize {
    Utc::now().timestamp().max(0) as usize
}

pub fn generate_access_token(
    user_id: u64,
    email: &str,
    name: &str,
    role: Role,
    secret: &str,
    ttl: usize,
) -> Result<String, Error> {
    let claims = Claims {
        user_id,
        sub: email.to_string(),
        name: name.to_string(),
        role: role.id(),
        exp: now() + ttl,
        jti: Uuid::new_v4().to_string(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, String> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trip() {
        let token = generate_access_token(12, "asha@ace.edu", "Asha Verma", Role::Student, "k", 60).unwrap();
        let claims = verify_token(&token, "k").unwrap();

        assert_eq!(claims.user_id, 12);
        assert_eq!(claims.sub, "asha@ace.edu");
        assert_eq!(claims.name, "Asha Verma");
        assert_eq!(Role::from_id(claims.role), Some(Role::Student));
        assert!(!claims.jti.is_empty());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = generate_access_token(1, "t@ace.edu", "T", Role::Teacher, "right", 60).unwrap();
        assert!(verify_token(&token, "wrong").is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let claims = Claims {
            user_id: 1,
            sub: "t@ace.edu".to_string(),
            name: "T".to_string(),
            role: Role::Teacher.id(),
            exp: now() - 3600,
            jti: "old".to_string(),
        };
        let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(b"k")).unwrap();
        assert!(verify_token(&token, "k").is_err());
    }
}
