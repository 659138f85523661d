use serde::{Deserialize, Serialize};

use crate::CatalogError;

/// Pseudo-category the storefront uses to mean "no category filter".
pub const ALL_CATEGORIES: &str = "All";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: i32,
    pub name: String,
    pub icon: Option<String>,
    pub product_count: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewCategory {
    pub name: String,
    pub icon: Option<String>,
}

impl NewCategory {
    pub fn validate(&self) -> Result<(), CatalogError> {
        validate_name(&self.name)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategoryPatch {
    pub name: Option<String>,
    pub icon: Option<String>,
}

impl CategoryPatch {
    pub fn apply(&self, category: &mut Category) -> Result<(), CatalogError> {
        if let Some(name) = &self.name {
            validate_name(name)?;
            category.name = name.trim().to_string();
        }
        if let Some(icon) = &self.icon {
            category.icon = Some(icon.clone());
        }
        Ok(())
    }
}

impl Category {
    /// A category can only go away once nothing points at it.
    pub fn ensure_deletable(&self) -> Result<(), CatalogError> {
        if self.product_count > 0 {
            return Err(CatalogError::Conflict(format!(
                "Category {} still has {} products",
                self.name, self.product_count
            )));
        }
        Ok(())
    }
}

fn validate_name(name: &str) -> Result<(), CatalogError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(CatalogError::Validation("name should not be empty".into()));
    }
    if name.eq_ignore_ascii_case(ALL_CATEGORIES) {
        return Err(CatalogError::Validation(format!("\"{}\" is a reserved category name", ALL_CATEGORIES)));
    }
    Ok(())
}
