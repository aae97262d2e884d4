// 🏷️ Category Rules - Rules as Data
// Keyword inference for uncategorized places, and provider tag → category maps.

use crate::model::Category;
use serde::{Deserialize, Serialize};

// ============================================================================
// KEYWORD INFERENCE
// ============================================================================

/// A set of name substrings that imply a category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryRule {
    pub keywords: Vec<String>,
    pub category: Category,
}

impl CategoryRule {
    pub fn new(keywords: &[&str], category: Category) -> Self {
        CategoryRule {
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            category,
        }
    }

    /// `normalized_name` must already be passed through `normalize_name`
    pub fn matches(&self, normalized_name: &str) -> bool {
        self.keywords.iter().any(|k| normalized_name.contains(k.as_str()))
    }
}

/// Ordered rule table, first match wins
#[derive(Debug, Clone)]
pub struct CategoryInference {
    rules: Vec<CategoryRule>,
}

impl CategoryInference {
    pub fn new() -> Self {
        CategoryInference {
            rules: vec![
                CategoryRule::new(&["hotel", "resort"], Category::Hotel),
                CategoryRule::new(&["mall", "centre", "center"], Category::Mall),
                CategoryRule::new(
                    &["restaurant", "cafe", "diner", "grill", "bistro"],
                    Category::Restaurant,
                ),
            ],
        }
    }

    pub fn from_rules(rules: Vec<CategoryRule>) -> Self {
        CategoryInference { rules }
    }

    pub fn infer(&self, normalized_name: &str) -> Option<Category> {
        self.rules
            .iter()
            .find(|rule| rule.matches(normalized_name))
            .map(|rule| rule.category)
    }
}

impl Default for CategoryInference {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// PROVIDER TAG MAPS
// ============================================================================

/// One provider tag (e.g. `amenity=restaurant`, `other_hotels`, `13065`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagRule {
    pub tag: String,
    pub category: Category,
}

/// Caller-supplied provider taxonomy → category map.
/// Rules are checked in order; the first rule whose tag the record carries wins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TagCategoryMap {
    rules: Vec<TagRule>,
}

impl TagCategoryMap {
    pub fn new(rules: Vec<TagRule>) -> Self {
        TagCategoryMap { rules }
    }

    pub fn from_pairs(pairs: &[(&str, Category)]) -> Self {
        TagCategoryMap {
            rules: pairs
                .iter()
                .map(|(tag, category)| TagRule {
                    tag: tag.to_string(),
                    category: *category,
                })
                .collect(),
        }
    }

    /// OpenStreetMap `key=value` tags
    pub fn osm_default() -> Self {
        Self::from_pairs(&[
            ("tourism=hotel", Category::Hotel),
            ("shop=mall", Category::Mall),
            ("amenity=restaurant", Category::Restaurant),
        ])
    }

    /// OpenTripMap `kinds`
    pub fn opentripmap_default() -> Self {
        Self::from_pairs(&[
            ("other_hotels", Category::Hotel),
            ("hotels", Category::Hotel),
            ("malls", Category::Mall),
            ("restaurants", Category::Restaurant),
        ])
    }

    /// Foursquare v3 category ids
    pub fn foursquare_default() -> Self {
        Self::from_pairs(&[
            ("19014", Category::Hotel),
            ("17069", Category::Mall),
            ("13065", Category::Restaurant),
        ])
    }

    pub fn lookup<'a, I>(&self, tags: I) -> Option<Category>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let tags: Vec<&str> = tags.into_iter().map(str::trim).collect();
        self.rules
            .iter()
            .find(|rule| tags.iter().any(|t| *t == rule.tag))
            .map(|rule| rule.category)
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

// ============================================================================
// TESTS
// ============================================================================
