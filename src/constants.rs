/// Lower bound shared by ingredient amounts and cooking time (minutes).
pub const MIN_AMOUNT: i32 = 1;
/// Upper bound shared by ingredient amounts and cooking time (minutes).
pub const MAX_AMOUNT: i32 = 32767;

pub const MAX_LEN_NAME: usize = 150;
pub const MAX_LEN_EMAIL: usize = 254;
pub const MAX_LEN_TITLE: usize = 200;
/* #RRGGBB */
pub const MAX_HEX: usize = 7;

pub const SHOPPING_LIST_HEADER: &str = "Список покупок";
pub const SHOPPING_LIST_COLUMNS: &str = "Ингредиент - Единица измерения - Количество";
pub const SHOPPING_LIST_FILENAME: &str = "shopping_cart.txt";
