use sqlx::{Pool, Postgres};

use crate::{
    error::{Error, QueryError},
    schema::{Id, SubscriptionEntry, User},
};

use super::recipes::{count_author_recipes, list_author_recipes};

/// Follows `author`. The unique index on (user_id, author_id) is the
/// authoritative duplicate guard; `rows_affected` only surfaces it.
pub async fn subscribe(user_id: Id, author_id: Id, pool: &Pool<Postgres>) -> Result<(), Error> {
    if user_id == author_id {
        return Err(Error::Conflict("No way to subscribe to yourself".to_string()));
    }

    let result = sqlx::query(
        "INSERT INTO subscriptions (user_id, author_id) VALUES ($1, $2) ON CONFLICT DO NOTHING;",
    )
    .bind(user_id)
    .bind(author_id)
    .execute(pool)
    .await
    .map_err(QueryError::from)?;

    if result.rows_affected() <= 0 {
        return Err(Error::Conflict("Already subscribed".to_string()));
    }

    Ok(())
}

pub async fn unsubscribe(user_id: Id, author_id: Id, pool: &Pool<Postgres>) -> Result<(), Error> {
    let result = sqlx::query("DELETE FROM subscriptions WHERE user_id = $1 AND author_id = $2")
        .bind(user_id)
        .bind(author_id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    if result.rows_affected() <= 0 {
        return Err(Error::NotFound("Not subscribed to this author".to_string()));
    }

    Ok(())
}

pub async fn is_subscribed(
    user_id: Id,
    author_id: Id,
    pool: &Pool<Postgres>,
) -> Result<bool, Error> {
    let result: Option<(Id,)> = sqlx::query_as(
        "
        SELECT author_id FROM subscriptions WHERE user_id = $1 AND author_id = $2
    ",
    )
    .bind(user_id)
    .bind(author_id)
    .fetch_optional(&*pool)
    .await
    .map_err(QueryError::from)?;

    Ok(result.is_some())
}

/// Followed authors with their recipes, most recent first. `recipes_limit`
/// truncates each author's recipe list; `recipes_count` always reflects the
/// author's full catalog.
pub async fn list_subscriptions(
    user_id: Id,
    recipes_limit: Option<i64>,
    pool: &Pool<Postgres>,
) -> Result<Vec<SubscriptionEntry>, Error> {
    let authors: Vec<User> = sqlx::query_as(
        "
        SELECT u.*
        FROM subscriptions s
        INNER JOIN users u ON u.id = s.author_id
        WHERE s.user_id = $1
        ORDER BY u.username
    ",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    let mut entries = Vec::with_capacity(authors.len());
    for author in authors {
        let recipes = list_author_recipes(author.id, recipes_limit, pool).await?;
        let recipes_count = count_author_recipes(author.id, pool).await?;
        entries.push(SubscriptionEntry {
            author,
            is_subscribed: true,
            recipes,
            recipes_count,
        });
    }

    Ok(entries)
}
