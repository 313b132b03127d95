use sqlx::{Pool, Postgres};

use crate::{
    error::{Error, QueryError},
    schema::Id,
};

/// The two (user, recipe) edges share one shape: a unique pair, cascade
/// deleted with either side. Only the table differs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RelationKind {
    Favorite,
    ShoppingCart,
}

impl RelationKind {
    fn table(self) -> &'static str {
        match self {
            RelationKind::Favorite => "favorites",
            RelationKind::ShoppingCart => "shopping_cart",
        }
    }

    fn description(self) -> &'static str {
        match self {
            RelationKind::Favorite => "favorites",
            RelationKind::ShoppingCart => "shopping cart",
        }
    }
}

/// Adds the edge. The unique index is the authoritative duplicate guard;
/// a concurrent insert of the same pair loses on `rows_affected`.
pub async fn add_relation(
    kind: RelationKind,
    user_id: Id,
    recipe_id: Id,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    let result = sqlx::query(&format!(
        "INSERT INTO {} (user_id, recipe_id) VALUES ($1, $2) ON CONFLICT DO NOTHING;",
        kind.table()
    ))
    .bind(user_id)
    .bind(recipe_id)
    .execute(pool)
    .await
    .map_err(QueryError::from)?;

    if result.rows_affected() <= 0 {
        return Err(Error::Conflict(format!(
            "Recipe is already in {}",
            kind.description()
        )));
    }

    Ok(())
}

pub async fn remove_relation(
    kind: RelationKind,
    user_id: Id,
    recipe_id: Id,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    let result = sqlx::query(&format!(
        "DELETE FROM {} WHERE user_id = $1 AND recipe_id = $2",
        kind.table()
    ))
    .bind(user_id)
    .bind(recipe_id)
    .execute(pool)
    .await
    .map_err(QueryError::from)?;

    if result.rows_affected() <= 0 {
        return Err(Error::NotFound(format!(
            "Recipe is not in {}",
            kind.description()
        )));
    }

    Ok(())
}

pub async fn has_relation(
    kind: RelationKind,
    user_id: Id,
    recipe_id: Id,
    pool: &Pool<Postgres>,
) -> Result<bool, Error> {
    let result: Option<(Id,)> = sqlx::query_as(&format!(
        "SELECT recipe_id FROM {} WHERE user_id = $1 AND recipe_id = $2",
        kind.table()
    ))
    .bind(user_id)
    .bind(recipe_id)
    .fetch_optional(&*pool)
    .await
    .map_err(QueryError::from)?;

    Ok(result.is_some())
}
