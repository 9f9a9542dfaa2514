use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};

use crate::{
    auth::{
        dto::{AuthResponse, LoginRequest, RegisterRequest},
        jwt::JwtKeys,
        password::{hash_password_blocking, verify_password_blocking},
    },
    error::ApiError,
    store::{NewUser, UserStore},
};

pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_PASSWORD_LEN: usize = 128;
pub const MAX_NAME_LEN: usize = 100;

pub fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex =
            Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email regex compiles");
    }
    EMAIL_RE.is_match(email)
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Normalizes the request in place and rejects malformed input.
pub fn validate_registration(req: &mut RegisterRequest) -> Result<(), ApiError> {
    req.name = req.name.trim().to_string();
    req.email = normalize_email(&req.email);

    if req.name.is_empty() {
        return Err(ApiError::BadRequest("Name is required".into()));
    }
    if req.name.chars().count() > MAX_NAME_LEN {
        return Err(ApiError::BadRequest("Name too long".into()));
    }
    if !is_valid_email(&req.email) {
        return Err(ApiError::BadRequest("Invalid email".into()));
    }
    let len = req.password.chars().count();
    if len < MIN_PASSWORD_LEN {
        return Err(ApiError::BadRequest("Password too short".into()));
    }
    if len > MAX_PASSWORD_LEN {
        return Err(ApiError::BadRequest("Password too long".into()));
    }
    Ok(())
}

pub async fn register(
    store: &dyn UserStore,
    keys: &JwtKeys,
    mut req: RegisterRequest,
) -> Result<AuthResponse, ApiError> {
    if let Err(e) = validate_registration(&mut req) {
        warn!(email = %req.email, error = %e, "registration rejected");
        return Err(e);
    }

    if store.find_by_email(&req.email).await?.is_some() {
        warn!(email = %req.email, "email already registered");
        return Err(ApiError::Conflict("Email already registered".into()));
    }

    let password_hash = hash_password_blocking(req.password)
        .await
        .map_err(ApiError::internal)?;

    // A concurrent registration can still win the race; the store reports it as Duplicate.
    let user = store
        .create(NewUser {
            name: req.name,
            email: req.email,
            password_hash,
        })
        .await?;

    let token = keys.sign(user.id).map_err(ApiError::internal)?;
    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok(AuthResponse {
        token,
        user: user.into(),
    })
}

pub async fn login(
    store: &dyn UserStore,
    keys: &JwtKeys,
    req: LoginRequest,
) -> Result<AuthResponse, ApiError> {
    let email = normalize_email(&req.email);
    if !is_valid_email(&email) {
        warn!(email = %email, "invalid email");
        return Err(ApiError::BadRequest("Invalid email".into()));
    }

    // Registration never accepts longer passwords; skip the Argon2 work.
    if req.password.chars().count() > MAX_PASSWORD_LEN {
        warn!(email = %email, "login password over length limit");
        return Err(invalid_credentials());
    }

    let user = store.find_by_email(&email).await?;
    let hash = user.as_ref().map(|u| u.password_hash.clone());
    let ok = verify_password_blocking(req.password, hash)
        .await
        .map_err(ApiError::internal)?;

    let user = match user {
        Some(u) if ok => u,
        Some(u) => {
            warn!(user_id = %u.id, "login invalid password");
            return Err(invalid_credentials());
        }
        None => {
            warn!(email = %email, "login unknown email");
            return Err(invalid_credentials());
        }
    };

    let token = keys.sign(user.id).map_err(ApiError::internal)?;
    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok(AuthResponse {
        token,
        user: user.into(),
    })
}

fn invalid_credentials() -> ApiError {
    ApiError::Unauthorized("Invalid credentials".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::AppConfig, store::MemoryUserStore};

    fn keys() -> JwtKeys {
        JwtKeys::from_config(&AppConfig::for_tests().jwt)
    }

    fn register_req(name: &str, email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            name: name.into(),
            email: email.into(),
            password: password.into(),
        }
    }

    #[test]
    fn email_pattern() {
        assert!(is_valid_email("a@b.co"));
        assert!(is_valid_email("first.last+tag@example.org"));
        assert!(!is_valid_email("no-at-sign.com"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("a b@example.com"));
        assert!(!is_valid_email(""));
    }

    #[test]
    fn validation_normalizes_and_rejects() {
        let mut req = register_req("  Ada  ", "  Ada@Example.COM ", "longenough");
        validate_registration(&mut req).expect("valid");
        assert_eq!(req.name, "Ada");
        assert_eq!(req.email, "ada@example.com");

        let mut req = register_req("   ", "ada@example.com", "longenough");
        assert!(matches!(validate_registration(&mut req), Err(ApiError::BadRequest(_))));

        let mut req = register_req("Ada", "ada@example.com", "short");
        assert!(matches!(validate_registration(&mut req), Err(ApiError::BadRequest(_))));

        let mut req = register_req("Ada", "ada@example.com", &"x".repeat(MAX_PASSWORD_LEN + 1));
        assert!(matches!(validate_registration(&mut req), Err(ApiError::BadRequest(_))));

        let mut req = register_req(&"x".repeat(MAX_NAME_LEN + 1), "ada@example.com", "longenough");
        let err = validate_registration(&mut req).unwrap_err();
        assert_eq!(err.to_string(), "Name too long");

        let mut req = register_req(&"x".repeat(MAX_NAME_LEN), "ada@example.com", "longenough");
        assert!(validate_registration(&mut req).is_ok());
    }

    #[tokio::test]
    async fn login_rejects_malformed_email() {
        let store = MemoryUserStore::new();
        let err = login(
            &store,
            &keys(),
            LoginRequest {
                email: "nope".into(),
                password: "password123".into(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(ref m) if m == "Invalid email"));
    }

    #[tokio::test]
    async fn oversized_login_password_is_plain_invalid_credentials() {
        let store = MemoryUserStore::new();
        let keys = keys();
        register(&store, &keys, register_req("Ada", "ada@example.com", "password123"))
            .await
            .unwrap();

        let err = login(
            &store,
            &keys,
            LoginRequest {
                email: "ada@example.com".into(),
                password: "x".repeat(MAX_PASSWORD_LEN + 1),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(ref m) if m == "Invalid credentials"));
    }

    #[tokio::test]
    async fn register_then_login_with_mixed_case_email() {
        let store = MemoryUserStore::new();
        let keys = keys();

        let reg = register(&store, &keys, register_req("Ada", "Ada@Example.com", "password123"))
            .await
            .expect("register");
        assert_eq!(reg.user.email, "ada@example.com");
        assert_eq!(keys.verify(&reg.token).unwrap().sub, reg.user.id);

        let login_res = login(
            &store,
            &keys,
            LoginRequest {
                email: " ADA@example.com".into(),
                password: "password123".into(),
            },
        )
        .await
        .expect("login");
        assert_eq!(login_res.user.id, reg.user.id);
    }

    #[tokio::test]
    async fn unknown_user_and_wrong_password_look_the_same() {
        let store = MemoryUserStore::new();
        let keys = keys();
        register(&store, &keys, register_req("Ada", "ada@example.com", "password123"))
            .await
            .unwrap();

        let wrong = login(
            &store,
            &keys,
            LoginRequest {
                email: "ada@example.com".into(),
                password: "nope-nope".into(),
            },
        )
        .await
        .unwrap_err();
        let unknown = login(
            &store,
            &keys,
            LoginRequest {
                email: "bob@example.com".into(),
                password: "password123".into(),
            },
        )
        .await
        .unwrap_err();

        assert_eq!(wrong.to_string(), unknown.to_string());
        assert!(matches!(wrong, ApiError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn duplicate_registration_conflicts() {
        let store = MemoryUserStore::new();
        let keys = keys();
        register(&store, &keys, register_req("Ada", "ada@example.com", "password123"))
            .await
            .unwrap();
        let err = register(&store, &keys, register_req("Ada2", "ADA@example.com", "password456"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
    }
}
