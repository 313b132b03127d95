use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use sqlx::{Pool, Postgres};

use crate::actions::{ingredients::get_or_create_ingredient, tags::get_or_create_tag};
use crate::error::Error;

#[derive(Debug, Deserialize)]
struct IngredientSeed {
    name: String,
    measurement_unit: String,
}

#[derive(Debug, Deserialize)]
struct TagSeed {
    name: String,
    color: String,
    slug: String,
}

fn read_seed_file<T>(path: &Path) -> Result<Vec<T>, Error>
where
    T: DeserializeOwned,
{
    let raw = fs::read_to_string(path).map_err(|e| Error::Load {
        path: path.display().to_string(),
        source: e,
    })?;

    serde_json::from_str(&raw).map_err(|e| Error::Parse {
        path: path.display().to_string(),
        source: e,
    })
}

/// Loads the ingredients reference file, get-or-create per element so the
/// command can be re-run. Returns the number of rows actually created.
pub async fn load_ingredients(path: &Path, pool: &Pool<Postgres>) -> Result<u64, Error> {
    log::info!("Upload data to Ingredients is starting");

    let seeds: Vec<IngredientSeed> = read_seed_file(path)?;
    let mut created = 0;
    for seed in &seeds {
        let (_, new) = get_or_create_ingredient(&seed.name, &seed.measurement_unit, pool).await?;
        if new {
            created += 1;
        }
    }

    log::info!(
        "Upload data to Ingredients is complete ({created} of {} created)",
        seeds.len()
    );

    Ok(created)
}

/// Same as [`load_ingredients`], for the tags reference file.
pub async fn load_tags(path: &Path, pool: &Pool<Postgres>) -> Result<u64, Error> {
    log::info!("Upload data to Tags is starting");

    let seeds: Vec<TagSeed> = read_seed_file(path)?;
    let mut created = 0;
    for seed in &seeds {
        let (_, new) = get_or_create_tag(&seed.name, &seed.slug, &seed.color, pool).await?;
        if new {
            created += 1;
        }
    }

    log::info!(
        "Upload data to Tags is complete ({created} of {} created)",
        seeds.len()
    );

    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_a_load_error() {
        let result: Result<Vec<IngredientSeed>, Error> =
            read_seed_file(Path::new("/nonexistent/ingredients.json"));
        match result {
            Err(Error::Load { path, .. }) => assert!(path.ends_with("ingredients.json")),
            other => panic!("expected load error, got {other:?}"),
        }
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let dir = std::env::temp_dir();
        let path = dir.join("foodgram_sdk_broken_tags.json");
        fs::write(&path, "{not json").unwrap();

        let result: Result<Vec<TagSeed>, Error> = read_seed_file(&path);
        assert!(matches!(result, Err(Error::Parse { .. })));

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn parses_reference_arrays() {
        let dir = std::env::temp_dir();
        let path = dir.join("foodgram_sdk_tags.json");
        fs::write(
            &path,
            r##"[{"name": "Завтрак", "color": "#E26C2D", "slug": "breakfast"}]"##,
        )
        .unwrap();

        let seeds: Vec<TagSeed> = read_seed_file(&path).unwrap();
        assert_eq!(seeds.len(), 1);
        assert_eq!(seeds[0].slug, "breakfast");

        fs::remove_file(&path).unwrap();
    }
}
