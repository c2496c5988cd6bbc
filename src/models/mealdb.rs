use serde::Deserialize;

/// Response shape shared by the search-by-name and browse-by-letter
/// endpoints. The API answers `{"meals": null}` rather than an empty list
/// when nothing matches.
#[derive(Debug, Deserialize)]
pub struct MealSearchResponse {
    pub meals: Option<Vec<Meal>>,
}

#[derive(Debug, Deserialize)]
pub struct Meal {
    #[serde(rename = "strMeal")]
    pub name: Option<String>,
    #[serde(rename = "strMealThumb")]
    pub thumb: Option<String>,
}
