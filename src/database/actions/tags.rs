use sqlx::{Pool, Postgres};

use crate::{
    constants::MAX_HEX,
    error::{Error, QueryError},
    schema::{Id, Tag},
};

/* #RGB or #RRGGBB, nothing in between */
fn validate_color(color: &str) -> Result<(), Error> {
    let hex = match color.strip_prefix('#') {
        Some(hex) => hex,
        None => return Err(Error::validation("color", "Invalid HEX color")),
    };
    if color.len() > MAX_HEX
        || (hex.len() != 3 && hex.len() != 6)
        || !hex.chars().all(|c| c.is_ascii_hexdigit())
    {
        return Err(Error::validation("color", "Invalid HEX color"));
    }
    Ok(())
}

pub async fn create_tag(
    name: &str,
    slug: &str,
    color: &str,
    pool: &Pool<Postgres>,
) -> Result<Id, Error> {
    validate_color(color)?;

    let id: Option<(Id,)> = sqlx::query_as(
        "INSERT INTO tags (name, slug, color) VALUES ($1, $2, $3) ON CONFLICT DO NOTHING RETURNING id",
    )
    .bind(name)
    .bind(slug)
    .bind(color)
    .fetch_optional(pool)
    .await
    .map_err(QueryError::from)?;

    match id {
        Some(id) => Ok(id.0),
        None => Err(Error::Conflict(
            "Tag name, slug and color must be unique".to_string(),
        )),
    }
}

/// Idempotent insert used by the reference-data loader. The boolean reports
/// whether a new row was created. A tag that collides on one unique column
/// while differing on another is a conflict, not a match.
pub async fn get_or_create_tag(
    name: &str,
    slug: &str,
    color: &str,
    pool: &Pool<Postgres>,
) -> Result<(Id, bool), Error> {
    validate_color(color)?;

    let id: Option<(Id,)> = sqlx::query_as(
        "INSERT INTO tags (name, slug, color) VALUES ($1, $2, $3) ON CONFLICT DO NOTHING RETURNING id",
    )
    .bind(name)
    .bind(slug)
    .bind(color)
    .fetch_optional(pool)
    .await
    .map_err(QueryError::from)?;

    if let Some(id) = id {
        return Ok((id.0, true));
    }

    let existing: Option<(Id,)> =
        sqlx::query_as("SELECT id FROM tags WHERE name = $1 AND slug = $2 AND color = $3")
            .bind(name)
            .bind(slug)
            .bind(color)
            .fetch_optional(pool)
            .await
            .map_err(QueryError::from)?;

    match existing {
        Some(id) => Ok((id.0, false)),
        None => Err(Error::Conflict(format!(
            "Tag '{name}' conflicts with existing reference data"
        ))),
    }
}

pub async fn get_tag(id: Id, pool: &Pool<Postgres>) -> Result<Option<Tag>, Error> {
    let tag: Option<Tag> = sqlx::query_as("SELECT * FROM tags WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(tag)
}

pub async fn find_tag(slug: &str, pool: &Pool<Postgres>) -> Result<Option<Id>, Error> {
    let row: Option<(Id,)> = sqlx::query_as("SELECT id FROM tags WHERE slug = $1")
        .bind(slug)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row.map(|tag| tag.0))
}

pub async fn list_tags(pool: &Pool<Postgres>) -> Result<Vec<Tag>, Error> {
    let list: Vec<Tag> = sqlx::query_as("SELECT * FROM tags ORDER BY name")
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(list)
}

pub async fn list_recipe_tags(pool: &Pool<Postgres>, recipe_id: Id) -> Result<Vec<Tag>, Error> {
    let list: Vec<Tag> = sqlx::query_as(
        "
        SELECT t.*
        FROM recipe_tags rt
        INNER JOIN tags t ON t.id = rt.tag_id
        WHERE rt.recipe_id = $1
        ORDER BY t.name
    ",
    )
    .bind(recipe_id)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(list)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_hex_colors() {
        assert!(validate_color("#E26C2D").is_ok());
        assert!(validate_color("#fff").is_ok());
    }

    #[test]
    fn rejects_malformed_colors() {
        for color in ["", "#", "E26C2D", "#E26C2DA", "#GGGGGG", "red"] {
            assert!(validate_color(color).is_err(), "{color}");
        }
    }

    #[test]
    fn rejects_intermediate_hex_lengths() {
        for color in ["#A", "#AB", "#ABCD", "#ABCDE"] {
            assert!(validate_color(color).is_err(), "{color}");
        }
    }
}
