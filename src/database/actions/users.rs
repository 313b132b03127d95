use std::sync::OnceLock;

use regex::Regex;
use sqlx::{Pool, Postgres};

use crate::{
    constants::{MAX_LEN_EMAIL, MAX_LEN_NAME},
    error::{Error, QueryError},
    schema::{Id, User, UserProfile},
};

use super::subscriptions::is_subscribed;

/* alphanumerics with single _ . - separators, never leading */
fn username_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9]+([_.-]?[a-zA-Z0-9])*$").expect("username pattern is valid")
    })
}

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is valid"))
}

/* caps are in characters, matching the column widths */
fn validate_name_length(field: &'static str, value: &str) -> Result<(), Error> {
    if value.chars().count() > MAX_LEN_NAME {
        return Err(Error::validation(field, "Invalid length"));
    }
    Ok(())
}

pub fn validate_username(username: &str) -> Result<(), Error> {
    if username.is_empty() || username.chars().count() > MAX_LEN_NAME {
        return Err(Error::validation("username", "Invalid length"));
    }
    if !username_pattern().is_match(username) {
        return Err(Error::validation(
            "username",
            "Only numbers, latin letters, underscore, dash, dot. Marks should not be at beginning.",
        ));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), Error> {
    if email.is_empty() || email.chars().count() > MAX_LEN_EMAIL {
        return Err(Error::validation("email", "Invalid length"));
    }
    if !email_pattern().is_match(email) {
        return Err(Error::validation("email", "Invalid email address"));
    }
    Ok(())
}

pub async fn register_user(
    username: &str,
    email: &str,
    first_name: &str,
    last_name: &str,
    pool: &Pool<Postgres>,
) -> Result<Id, Error> {
    validate_username(username)?;
    validate_email(email)?;
    validate_name_length("first_name", first_name)?;
    validate_name_length("last_name", last_name)?;

    let id: Option<(Id,)> = sqlx::query_as(
        "
        INSERT INTO users (username, email, first_name, last_name)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT DO NOTHING RETURNING id;
    ",
    )
    .bind(username)
    .bind(email)
    .bind(first_name)
    .bind(last_name)
    .fetch_optional(&*pool)
    .await
    .map_err(QueryError::from)?;

    match id {
        Some(id) => Ok(id.0),
        None => Err(Error::Conflict(
            "Username or email is already taken".to_string(),
        )),
    }
}

pub async fn get_user(pool: &Pool<Postgres>, username: &str) -> Result<Option<User>, Error> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE username = $1")
        .bind(username)
        .fetch_optional(&*pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

pub async fn get_user_by_id(pool: &Pool<Postgres>, user_id: Id) -> Result<Option<User>, Error> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(&*pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

/// Resolves a user together with the follow flag relative to `viewer`.
/// An anonymous viewer never counts as subscribed.
pub async fn get_profile(
    pool: &Pool<Postgres>,
    user_id: Id,
    viewer: Option<Id>,
) -> Result<Option<UserProfile>, Error> {
    let user = get_user_by_id(pool, user_id).await?;

    match user {
        Some(user) => {
            let subscribed = match viewer {
                Some(viewer) => is_subscribed(viewer, user.id, pool).await?,
                None => false,
            };
            Ok(Some(UserProfile {
                user,
                is_subscribed: subscribed,
            }))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_and_separated_usernames() {
        for name in ["anna", "anna2000", "anna_k", "a.b-c", "A1_2.3-4"] {
            assert!(validate_username(name).is_ok(), "{name}");
        }
    }

    #[test]
    fn rejects_leading_and_doubled_marks() {
        for name in ["", "_anna", ".anna", "-anna", "anna__k", "anna.", "анна", "anna k"] {
            assert!(validate_username(name).is_err(), "{name}");
        }
    }

    #[test]
    fn rejects_overlong_username() {
        let name = "a".repeat(MAX_LEN_NAME + 1);
        assert!(validate_username(&name).is_err());
    }

    #[test]
    fn length_caps_count_characters_not_bytes() {
        assert!(validate_username(&"a".repeat(MAX_LEN_NAME)).is_ok());
        assert!(validate_name_length("first_name", &"Ё".repeat(MAX_LEN_NAME)).is_ok());
        assert!(validate_name_length("first_name", &"Ё".repeat(MAX_LEN_NAME + 1)).is_err());
    }

    #[test]
    fn validates_emails() {
        assert!(validate_email("anna@example.com").is_ok());
        assert!(validate_email("not-an-email").is_err());
        assert!(validate_email("a@b").is_err());
        assert!(validate_email("").is_err());
    }
}
