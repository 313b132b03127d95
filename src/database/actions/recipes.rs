use std::collections::HashSet;

use sqlx::{Pool, Postgres, QueryBuilder, Transaction};

use crate::{
    constants::{MAX_AMOUNT, MAX_LEN_TITLE, MIN_AMOUNT},
    error::{Error, QueryError},
    schema::{Id, Recipe, RecipeDetail, RecipeIngredient, RecipePayload, RecipeShort},
};

use super::{
    relations::{has_relation, RelationKind},
    tags::list_recipe_tags,
    users::get_profile,
};

/// Checks a write payload before anything touches the database. Image first,
/// then tag set, ingredient set, numeric bounds, name.
pub fn validate_payload(payload: &RecipePayload) -> Result<(), Error> {
    if payload.image.is_empty() {
        return Err(Error::validation("image", "Must be image"));
    }

    if payload.tags.is_empty() {
        return Err(Error::validation("tags", "Must be tags"));
    }
    let unique_tags: HashSet<Id> = payload.tags.iter().copied().collect();
    if unique_tags.len() != payload.tags.len() {
        return Err(Error::validation("tags", "Tags should not be repeated"));
    }

    if payload.ingredients.is_empty() {
        return Err(Error::validation("ingredients", "Must be ingredients"));
    }
    let unique_ingredients: HashSet<Id> = payload.ingredients.iter().map(|i| i.id).collect();
    if unique_ingredients.len() != payload.ingredients.len() {
        return Err(Error::validation(
            "ingredients",
            "Ingredients should not be repeated",
        ));
    }

    if payload.cooking_time < MIN_AMOUNT || payload.cooking_time > MAX_AMOUNT {
        return Err(Error::validation(
            "cooking_time",
            format!("At least {MIN_AMOUNT}, no more than {MAX_AMOUNT}"),
        ));
    }
    for ingredient in &payload.ingredients {
        if ingredient.amount < MIN_AMOUNT || ingredient.amount > MAX_AMOUNT {
            return Err(Error::validation(
                "amount",
                format!("At least {MIN_AMOUNT}, no more than {MAX_AMOUNT}"),
            ));
        }
    }

    if payload.name.is_empty() || payload.name.chars().count() > MAX_LEN_TITLE {
        return Err(Error::validation("name", "Invalid length"));
    }

    Ok(())
}

/// Unknown ids in the payload are the caller's mistake, not a database fault.
/// Checked inside the write transaction so the sets cannot shrink between the
/// check and the inserts.
async fn check_references(
    tr: &mut Transaction<'_, Postgres>,
    payload: &RecipePayload,
) -> Result<(), Error> {
    let tags: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tags WHERE id = ANY($1)")
        .bind(&payload.tags)
        .fetch_one(&mut **tr)
        .await
        .map_err(QueryError::from)?;
    if tags.0 != payload.tags.len() as i64 {
        return Err(Error::validation("tags", "Unknown tag"));
    }

    let ingredient_ids: Vec<Id> = payload.ingredients.iter().map(|i| i.id).collect();
    let ingredients: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM ingredients WHERE id = ANY($1)")
        .bind(&ingredient_ids)
        .fetch_one(&mut **tr)
        .await
        .map_err(QueryError::from)?;
    if ingredients.0 != payload.ingredients.len() as i64 {
        return Err(Error::validation("ingredients", "Unknown ingredient"));
    }

    Ok(())
}

/// The tag-link and amount rows a recipe ends up with after a write. Derived
/// from the payload alone: an update keeps nothing the payload does not list.
fn association_rows(recipe_id: Id, payload: &RecipePayload) -> (Vec<(Id, Id)>, Vec<(Id, Id, i32)>) {
    let tags = payload
        .tags
        .iter()
        .map(|&tag_id| (recipe_id, tag_id))
        .collect();
    let ingredients = payload
        .ingredients
        .iter()
        .map(|ingredient| (recipe_id, ingredient.id, ingredient.amount))
        .collect();

    (tags, ingredients)
}

async fn clear_associations(
    tr: &mut Transaction<'_, Postgres>,
    recipe_id: Id,
) -> Result<(), Error> {
    sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = $1")
        .bind(recipe_id)
        .execute(&mut **tr)
        .await
        .map_err(QueryError::from)?;

    sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = $1")
        .bind(recipe_id)
        .execute(&mut **tr)
        .await
        .map_err(QueryError::from)?;

    Ok(())
}

async fn insert_associations(
    tr: &mut Transaction<'_, Postgres>,
    recipe_id: Id,
    payload: &RecipePayload,
) -> Result<(), Error> {
    let (tag_rows, ingredient_rows) = association_rows(recipe_id, payload);

    let mut tag_query: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO recipe_tags (recipe_id, tag_id) ");
    tag_query.push_values(tag_rows, |mut b, (recipe_id, tag_id)| {
        b.push_bind(recipe_id).push_bind(tag_id);
    });
    tag_query
        .build()
        .execute(&mut **tr)
        .await
        .map_err(QueryError::from)?;

    let mut ingredient_query: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount) ");
    ingredient_query.push_values(ingredient_rows, |mut b, (recipe_id, ingredient_id, amount)| {
        b.push_bind(recipe_id)
            .push_bind(ingredient_id)
            .push_bind(amount);
    });
    ingredient_query
        .build()
        .execute(&mut **tr)
        .await
        .map_err(QueryError::from)?;

    Ok(())
}

/// Creates the recipe row, its tag links and its amount rows as one
/// transaction; any failure leaves no partial recipe behind.
pub async fn create_recipe(
    author_id: Id,
    payload: &RecipePayload,
    pool: &Pool<Postgres>,
) -> Result<Id, Error> {
    validate_payload(payload)?;

    let mut tr = pool
        .begin()
        .await
        .map_err(|_| QueryError::new("Could not start transaction".to_owned()))?;

    check_references(&mut tr, payload).await?;

    let id: (Id,) = sqlx::query_as(
        "
        INSERT INTO recipes (author_id, name, text, image, cooking_time)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
    ",
    )
    .bind(author_id)
    .bind(&payload.name)
    .bind(&payload.text)
    .bind(&payload.image)
    .bind(payload.cooking_time)
    .fetch_one(&mut *tr)
    .await
    .map_err(QueryError::from)?;

    insert_associations(&mut tr, id.0, payload).await?;

    tr.commit()
        .await
        .map_err(|_| QueryError::new("Could not commit transaction".to_owned()))?;

    Ok(id.0)
}

/// Updates the scalar columns and replaces the tag and ingredient sets
/// wholesale from the payload. `pub_date` is never touched.
pub async fn update_recipe(
    id: Id,
    payload: &RecipePayload,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    validate_payload(payload)?;

    let mut tr = pool
        .begin()
        .await
        .map_err(|_| QueryError::new("Could not start transaction".to_owned()))?;

    check_references(&mut tr, payload).await?;

    let result = sqlx::query(
        "UPDATE recipes SET name = $1, text = $2, image = $3, cooking_time = $4 WHERE id = $5",
    )
    .bind(&payload.name)
    .bind(&payload.text)
    .bind(&payload.image)
    .bind(payload.cooking_time)
    .bind(id)
    .execute(&mut *tr)
    .await
    .map_err(QueryError::from)?;

    if result.rows_affected() <= 0 {
        return Err(Error::NotFound("No recipe exists with specified id".to_string()));
    }

    clear_associations(&mut tr, id).await?;
    insert_associations(&mut tr, id, payload).await?;

    tr.commit()
        .await
        .map_err(|_| QueryError::new("Could not commit transaction".to_owned()))?;

    Ok(())
}

pub async fn delete_recipe(id: Id, pool: &Pool<Postgres>) -> Result<(), Error> {
    let result = sqlx::query("DELETE FROM recipes WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    if result.rows_affected() <= 0 {
        return Err(Error::NotFound("No recipe exists with specified id".to_string()));
    }

    Ok(())
}

pub async fn get_recipe(id: Id, pool: &Pool<Postgres>) -> Result<Option<Recipe>, Error> {
    let row: Option<Recipe> = sqlx::query_as("SELECT * FROM recipes WHERE id = $1")
        .bind(id)
        .fetch_optional(&*pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

pub async fn list_recipe_ingredients(
    pool: &Pool<Postgres>,
    recipe_id: Id,
) -> Result<Vec<RecipeIngredient>, Error> {
    let rows: Vec<RecipeIngredient> = sqlx::query_as(
        "
        SELECT i.id AS id, i.name AS name, i.measurement_unit AS measurement_unit, ri.amount AS amount
        FROM recipe_ingredients ri
        INNER JOIN ingredients i ON i.id = ri.ingredient_id
        WHERE ri.recipe_id = $1
    ",
    )
    .bind(recipe_id)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(rows)
}

/// Full recipe view with author, tags, amounts and the two flags computed
/// relative to `viewer`.
pub async fn get_recipe_detail(
    id: Id,
    viewer: Option<Id>,
    pool: &Pool<Postgres>,
) -> Result<RecipeDetail, Error> {
    let recipe = get_recipe(id, pool)
        .await?
        .ok_or_else(|| Error::NotFound("No recipe exists with specified id".to_string()))?;

    let author = get_profile(pool, recipe.author_id, viewer)
        .await?
        .ok_or_else(|| Error::NotFound("Recipe author no longer exists".to_string()))?;

    let tags = list_recipe_tags(pool, recipe.id).await?;
    let ingredients = list_recipe_ingredients(pool, recipe.id).await?;

    let (is_favorited, is_in_shopping_cart) = match viewer {
        Some(viewer) => (
            has_relation(RelationKind::Favorite, viewer, recipe.id, pool).await?,
            has_relation(RelationKind::ShoppingCart, viewer, recipe.id, pool).await?,
        ),
        None => (false, false),
    };

    Ok(RecipeDetail {
        id: recipe.id,
        name: recipe.name,
        text: recipe.text,
        image: recipe.image,
        cooking_time: recipe.cooking_time,
        pub_date: recipe.pub_date,
        author,
        tags,
        ingredients,
        is_favorited,
        is_in_shopping_cart,
    })
}

pub async fn list_author_recipes(
    author_id: Id,
    limit: Option<i64>,
    pool: &Pool<Postgres>,
) -> Result<Vec<RecipeShort>, Error> {
    let rows: Vec<RecipeShort> = match limit {
        Some(limit) => sqlx::query_as(
            "
            SELECT id, name, image, cooking_time FROM recipes
            WHERE author_id = $1 ORDER BY pub_date DESC LIMIT $2
        ",
        )
        .bind(author_id)
        .bind(limit)
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?,
        None => sqlx::query_as(
            "
            SELECT id, name, image, cooking_time FROM recipes
            WHERE author_id = $1 ORDER BY pub_date DESC
        ",
        )
        .bind(author_id)
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?,
    };

    Ok(rows)
}

pub async fn count_author_recipes(author_id: Id, pool: &Pool<Postgres>) -> Result<i64, Error> {
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM recipes WHERE author_id = $1")
        .bind(author_id)
        .fetch_one(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(count.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::IngredientAmount;

    fn payload() -> RecipePayload {
        RecipePayload {
            name: "Окрошка".to_string(),
            text: "Нарезать и залить квасом.".to_string(),
            image: "data:image/png;base64,AAAA".to_string(),
            cooking_time: 20,
            tags: vec![1, 2],
            ingredients: vec![
                IngredientAmount { id: 1, amount: 300 },
                IngredientAmount { id: 2, amount: 150 },
            ],
        }
    }

    #[test]
    fn accepts_a_well_formed_payload() {
        assert!(validate_payload(&payload()).is_ok());
    }

    #[test]
    fn rejects_missing_image() {
        let mut p = payload();
        p.image.clear();
        match validate_payload(&p) {
            Err(Error::Validation { field, .. }) => assert_eq!(field, "image"),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn rejects_empty_and_repeated_tags() {
        let mut p = payload();
        p.tags.clear();
        assert!(validate_payload(&p).is_err());

        let mut p = payload();
        p.tags = vec![1, 1];
        match validate_payload(&p) {
            Err(Error::Validation { field, .. }) => assert_eq!(field, "tags"),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn rejects_empty_and_repeated_ingredients() {
        let mut p = payload();
        p.ingredients.clear();
        assert!(validate_payload(&p).is_err());

        let mut p = payload();
        p.ingredients = vec![
            IngredientAmount { id: 1, amount: 10 },
            IngredientAmount { id: 1, amount: 20 },
        ];
        match validate_payload(&p) {
            Err(Error::Validation { field, .. }) => assert_eq!(field, "ingredients"),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn rejects_out_of_range_cooking_time() {
        let mut p = payload();
        p.cooking_time = 0;
        assert!(validate_payload(&p).is_err());
        p.cooking_time = MAX_AMOUNT + 1;
        assert!(validate_payload(&p).is_err());
        p.cooking_time = MAX_AMOUNT;
        assert!(validate_payload(&p).is_ok());
    }

    #[test]
    fn rejects_out_of_range_amounts() {
        let mut p = payload();
        p.ingredients[0].amount = 0;
        match validate_payload(&p) {
            Err(Error::Validation { field, .. }) => assert_eq!(field, "amount"),
            other => panic!("expected validation error, got {other:?}"),
        }
        p.ingredients[0].amount = MAX_AMOUNT + 1;
        assert!(validate_payload(&p).is_err());
    }

    #[test]
    fn rejects_empty_name() {
        let mut p = payload();
        p.name.clear();
        match validate_payload(&p) {
            Err(Error::Validation { field, .. }) => assert_eq!(field, "name"),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn multibyte_names_fit_the_title_cap() {
        let mut p = payload();
        p.name = "Щ".repeat(MAX_LEN_TITLE);
        assert!(validate_payload(&p).is_ok());
        p.name = "Щ".repeat(MAX_LEN_TITLE + 1);
        assert!(validate_payload(&p).is_err());
    }

    #[test]
    fn replacement_rows_come_from_the_payload_alone() {
        let mut p = payload();
        p.tags = vec![2, 3];
        p.ingredients = vec![
            IngredientAmount { id: 2, amount: 100 },
            IngredientAmount { id: 4, amount: 50 },
        ];

        let (tags, ingredients) = association_rows(7, &p);
        assert_eq!(tags, vec![(7, 2), (7, 3)]);
        assert_eq!(ingredients, vec![(7, 2, 100), (7, 4, 50)]);
        /* ingredient 1 from the original payload leaves no row behind */
        assert!(!ingredients.iter().any(|&(_, id, _)| id == 1));
    }

    #[test]
    fn image_is_checked_before_tags() {
        let mut p = payload();
        p.image.clear();
        p.tags.clear();
        match validate_payload(&p) {
            Err(Error::Validation { field, .. }) => assert_eq!(field, "image"),
            other => panic!("expected validation error, got {other:?}"),
        }
    }
}
