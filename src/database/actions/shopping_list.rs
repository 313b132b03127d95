use std::collections::BTreeMap;

use sqlx::{Pool, Postgres};

use crate::{
    constants::{SHOPPING_LIST_COLUMNS, SHOPPING_LIST_HEADER},
    error::{Error, QueryError},
    schema::{Id, ShoppingListItem, ShoppingListRow},
};

/// Every (ingredient, amount) row behind the user's queued recipes, one row
/// per ingredient per recipe. Grouping happens in [`aggregate_shopping_list`].
pub async fn fetch_shopping_list(
    user_id: Id,
    pool: &Pool<Postgres>,
) -> Result<Vec<ShoppingListRow>, Error> {
    let rows: Vec<ShoppingListRow> = sqlx::query_as(
        "
        SELECT i.name AS name, i.measurement_unit AS measurement_unit, ri.amount AS amount
        FROM shopping_cart sc
        INNER JOIN recipe_ingredients ri ON ri.recipe_id = sc.recipe_id
        INNER JOIN ingredients i ON i.id = ri.ingredient_id
        WHERE sc.user_id = $1
    ",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(rows)
}

/// Groups by (name, unit) and sums amounts, sorted by ingredient name. Sums
/// are i64 on purpose: per-row amounts are capped, their total is not.
pub fn aggregate_shopping_list(rows: Vec<ShoppingListRow>) -> Vec<ShoppingListItem> {
    let mut totals: BTreeMap<(String, String), i64> = BTreeMap::new();
    for row in rows {
        *totals
            .entry((row.name, row.measurement_unit))
            .or_insert(0) += i64::from(row.amount);
    }

    totals
        .into_iter()
        .map(|((name, measurement_unit), total_amount)| ShoppingListItem {
            name,
            measurement_unit,
            total_amount,
        })
        .collect()
}

/// Plain-text report: two fixed header lines, then `name - unit - total` per
/// group. An empty cart renders the header alone.
pub fn render_shopping_list(items: &[ShoppingListItem]) -> String {
    let mut text = String::new();
    text.push_str(SHOPPING_LIST_HEADER);
    text.push('\n');
    text.push_str(SHOPPING_LIST_COLUMNS);
    text.push('\n');
    for item in items {
        text.push_str(&format!(
            "{} - {} - {}\n",
            item.name, item.measurement_unit, item.total_amount
        ));
    }

    text
}

/// The downloadable `shopping_cart.txt` body for a user.
pub async fn generate_shopping_list(user_id: Id, pool: &Pool<Postgres>) -> Result<String, Error> {
    let rows = fetch_shopping_list(user_id, pool).await?;
    let items = aggregate_shopping_list(rows);

    Ok(render_shopping_list(&items))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(name: &str, unit: &str, amount: i32) -> ShoppingListRow {
        ShoppingListRow {
            name: name.to_string(),
            measurement_unit: unit.to_string(),
            amount,
        }
    }

    #[test]
    fn sums_the_same_ingredient_across_recipes() {
        let items = aggregate_shopping_list(vec![row("Salt", "g", 5), row("Salt", "g", 10)]);
        assert_eq!(
            items,
            vec![ShoppingListItem {
                name: "Salt".to_string(),
                measurement_unit: "g".to_string(),
                total_amount: 15,
            }]
        );

        let text = render_shopping_list(&items);
        assert_eq!(text.matches("Salt").count(), 1);
        assert!(text.contains("Salt - g - 15\n"));
    }

    #[test]
    fn keeps_same_name_different_unit_apart() {
        let items = aggregate_shopping_list(vec![row("Milk", "ml", 200), row("Milk", "g", 50)]);
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn sorts_by_ingredient_name() {
        let items = aggregate_shopping_list(vec![
            row("Sugar", "g", 30),
            row("Flour", "g", 500),
            row("Milk", "ml", 200),
        ]);
        let names: Vec<&str> = items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["Flour", "Milk", "Sugar"]);
    }

    #[test]
    fn total_may_exceed_the_per_row_cap() {
        let items = aggregate_shopping_list(vec![row("Rice", "g", 30000), row("Rice", "g", 30000)]);
        assert_eq!(items[0].total_amount, 60000);
    }

    #[test]
    fn empty_cart_renders_header_only() {
        let text = render_shopping_list(&[]);
        assert_eq!(
            text,
            "Список покупок\nИнгредиент - Единица измерения - Количество\n"
        );
    }

    #[test]
    fn report_lines_follow_the_header() {
        let items = aggregate_shopping_list(vec![row("Мука", "г", 500)]);
        let text = render_shopping_list(&items);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Список покупок");
        assert_eq!(lines[1], "Ингредиент - Единица измерения - Количество");
        assert_eq!(lines[2], "Мука - г - 500");
    }
}
