use std::collections::HashSet;
use std::time::Duration;

use lazy_static::lazy_static;
use log::{debug, info};
use regex::Regex;
use reqwest::Client;
use serde::Serialize;

use crate::models::mealdb::MealSearchResponse;

// Cooking-method and connective words that make poor search terms.
const STOP_WORDS: &[&str] = &[
    "with", "and", "the", "style", "grilled", "fried", "baked", "roasted", "spicy", "creamy",
    "stuffed", "smoked", "crispy", "stir", "tossed", "glazed", "marinated", "sauteed",
];

// Letters with a rich result set in the category index.
const FALLBACK_LETTERS: &str = "bcdfgprs";

lazy_static! {
    static ref TOKEN_BOUNDARY: Regex = Regex::new(r"[\s,\-]+").unwrap();
    static ref STOP_WORD_SET: HashSet<&'static str> = STOP_WORDS.iter().copied().collect();
}

/// How a resolved image URL was produced, from most to least specific.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "term", rename_all = "lowercase")]
pub enum ImageSource {
    /// A title or ingredient keyword matched the search API.
    Keyword(String),
    /// Deterministic pick from the category letter index.
    Category(char),
    /// Synthetic placeholder parameterized by batch position.
    Placeholder,
}

/// An image URL for a recipe, plus the strategy that produced it.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedImage {
    pub url: String,
    pub source: ImageSource,
}

/// Resolves free-text recipe titles to concrete image URLs.
///
/// Candidate keywords from the title and ingredient list are tried against
/// the search API in order; when none match, a category letter chosen
/// deterministically from the recipe's batch position is browsed; when even
/// that fails, a synthetic placeholder URL is returned. Resolution is total:
/// lookup errors are swallowed and only advance the chain.
pub struct ImageResolver {
    client: Client,
    base_url: String,
}

impl ImageResolver {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Resolves one recipe to an image URL. `fallback_index` is the recipe's
    /// position in its batch; it only influences which fallback category and
    /// placeholder are picked, keeping those picks deterministic.
    pub async fn resolve(
        &self,
        title: &str,
        ingredients: &str,
        fallback_index: usize,
    ) -> ResolvedImage {
        for keyword in candidate_keywords(title, ingredients) {
            match self.search_by_name(&keyword).await {
                Ok(Some(url)) => {
                    info!("resolved '{}' via keyword '{}'", title, keyword);
                    return ResolvedImage {
                        url,
                        source: ImageSource::Keyword(keyword),
                    };
                }
                Ok(None) => debug!("no match for keyword '{}'", keyword),
                Err(err) => debug!("search for keyword '{}' failed: {}", keyword, err),
            }
        }

        let letters: Vec<char> = FALLBACK_LETTERS.chars().collect();
        let letter = letters[fallback_index % letters.len()];
        match self.browse_by_letter(letter).await {
            Ok(thumbs) if !thumbs.is_empty() => {
                let url = thumbs[fallback_index % thumbs.len()].clone();
                info!("resolved '{}' via category letter '{}'", title, letter);
                return ResolvedImage {
                    url,
                    source: ImageSource::Category(letter),
                };
            }
            Ok(_) => debug!("category letter '{}' returned no results", letter),
            Err(err) => debug!("category browse for '{}' failed: {}", letter, err),
        }

        ResolvedImage {
            url: format!("https://picsum.photos/seed/food{}/800/600", fallback_index),
            source: ImageSource::Placeholder,
        }
    }

    /// Resolves a whole generated batch concurrently, assigning each recipe
    /// its position as the fallback index. Output order matches input order.
    pub async fn resolve_many(&self, recipes: &[(&str, &str)]) -> Vec<ResolvedImage> {
        futures::future::join_all(
            recipes
                .iter()
                .enumerate()
                .map(|(index, (title, ingredients))| self.resolve(title, ingredients, index)),
        )
        .await
    }

    async fn search_by_name(&self, keyword: &str) -> Result<Option<String>, reqwest::Error> {
        let url = format!("{}/search.php", self.base_url);
        let response: MealSearchResponse = self
            .client
            .get(&url)
            .query(&[("s", keyword)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let first = response.meals.unwrap_or_default().into_iter().next();
        if let Some(meal) = &first {
            debug!("keyword '{}' matched meal {:?}", keyword, meal.name);
        }
        Ok(first.and_then(|meal| meal.thumb))
    }

    async fn browse_by_letter(&self, letter: char) -> Result<Vec<String>, reqwest::Error> {
        let url = format!("{}/search.php", self.base_url);
        let response: MealSearchResponse = self
            .client
            .get(&url)
            .query(&[("f", letter.to_string())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(response
            .meals
            .unwrap_or_default()
            .into_iter()
            .filter_map(|meal| meal.thumb)
            .collect())
    }
}

/// Derives the ordered list of search keywords for a recipe.
///
/// Title words survive when longer than three letters after stripping
/// non-alphabetic characters and not in the stop-word set; the first
/// comma-separated ingredient is appended when longer than two characters
/// and not already among the candidates.
pub fn candidate_keywords(title: &str, ingredients: &str) -> Vec<String> {
    let mut keywords: Vec<String> = TOKEN_BOUNDARY
        .split(title)
        .map(|token| {
            token
                .chars()
                .filter(char::is_ascii_alphabetic)
                .collect::<String>()
        })
        .filter(|word| word.len() > 3 && !STOP_WORD_SET.contains(word.to_lowercase().as_str()))
        .collect();

    let main_ingredient = ingredients.split(',').next().unwrap_or("").trim();
    if main_ingredient.len() > 2 && !keywords.iter().any(|keyword| keyword == main_ingredient) {
        keywords.push(main_ingredient.to_string());
    }
    keywords
}
