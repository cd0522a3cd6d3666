use std::collections::BTreeSet;

/// User-facing topic taxonomy, aligned with the three market data kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Doviz,
    Altin,
    Borsa,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Doviz, Category::Altin, Category::Borsa];

    pub fn parse(token: &str) -> Result<Category, String> {
        match token.trim().to_lowercase().as_str() {
            "doviz" => Ok(Category::Doviz),
            "altin" => Ok(Category::Altin),
            "borsa" => Ok(Category::Borsa),
            other => Err(format!("{} is not a valid category", other)),
        }
    }

    /// Human-readable Turkish label used in rendered emails.
    pub fn display_name(&self) -> &'static str {
        match self {
            Category::Doviz => "Döviz",
            Category::Altin => "Altın",
            Category::Borsa => "Borsa",
        }
    }
}

impl AsRef<str> for Category {
    fn as_ref(&self) -> &str {
        match self {
            Category::Doviz => "doviz",
            Category::Altin => "altin",
            Category::Borsa => "borsa",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_ref())
    }
}

/// Non-empty, deduplicated set of subscription categories.
///
/// Persisted as a flat comma-separated token string, so parsing must be
/// order-independent and collapse duplicates.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct CategorySet(BTreeSet<Category>);

impl CategorySet {
    pub fn parse(tokens: &str) -> Result<CategorySet, String> {
        let categories = tokens
            .split(',')
            .filter(|token| !token.trim().is_empty())
            .map(Category::parse)
            .collect::<Result<BTreeSet<_>, _>>()?;

        Self::from_set(categories)
    }

    pub fn from_slice(categories: &[Category]) -> Result<CategorySet, String> {
        Self::from_set(categories.iter().copied().collect())
    }

    fn from_set(categories: BTreeSet<Category>) -> Result<CategorySet, String> {
        if categories.is_empty() {
            return Err(String::from("at least one category is required"));
        }

        Ok(CategorySet(categories))
    }

    pub fn to_token_string(&self) -> String {
        self.0
            .iter()
            .map(|category| category.as_ref())
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn iter(&self) -> impl Iterator<Item = Category> + '_ {
        self.0.iter().copied()
    }

    pub fn contains(&self, category: Category) -> bool {
        self.0.contains(&category)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

#[cfg(test)]
mod tests {
    use super::{Category, CategorySet};
    use claim::{assert_err, assert_ok};

    #[test]
    fn known_category_tokens_are_accepted() {
        assert_eq!(Category::parse("doviz").unwrap(), Category::Doviz);
        assert_eq!(Category::parse(" ALTIN ").unwrap(), Category::Altin);
        assert_eq!(Category::parse("borsa").unwrap(), Category::Borsa);
    }

    #[test]
    fn unknown_category_token_is_rejected() {
        assert_err!(Category::parse("kripto"));
    }

    #[test]
    fn empty_token_string_is_rejected() {
        assert_err!(CategorySet::parse(""));
        assert_err!(CategorySet::parse(" , ,"));
    }

    #[test]
    fn token_round_trip_is_order_independent_and_collapses_duplicates() {
        let set = CategorySet::parse("borsa,doviz,borsa,altin").unwrap();
        let reparsed = CategorySet::parse(&set.to_token_string()).unwrap();

        assert_eq!(set, reparsed);
        assert_eq!(set.len(), 3);
        assert_eq!(set.to_token_string(), "doviz,altin,borsa");
    }

    #[test]
    fn single_category_set_is_valid() {
        let set = assert_ok!(CategorySet::parse("altin"));

        assert!(set.contains(Category::Altin));
        assert!(!set.contains(Category::Borsa));
    }
}
