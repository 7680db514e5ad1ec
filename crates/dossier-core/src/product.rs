//! # Products
//!
//! A product is a line item within a case. Its [`ProductType`] selects the
//! document checklist; the `has_brand_license` flag toggles the conditional
//! brand-license requirement for food products.
//!
//! Descriptive attributes are free-form and only checked for presence.

use serde::{Deserialize, Serialize};

use crate::error::DossierError;
use crate::identity::ProductId;

/// Product category. Selects which document checklist applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductType {
    /// Food products: sanitary, analysis and labelling documents.
    Food,
    /// Industrial products: conformity certificate only.
    Industrial,
}

impl ProductType {
    /// Wire name of the product type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Food => "FOOD",
            Self::Industrial => "INDUSTRIAL",
        }
    }
}

impl std::fmt::Display for ProductType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProductType {
    type Err = DossierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FOOD" => Ok(Self::Food),
            "INDUSTRIAL" => Ok(Self::Industrial),
            other => Err(DossierError::Validation(format!(
                "unknown product type \"{other}\" (expected FOOD or INDUSTRIAL)"
            ))),
        }
    }
}

/// A product line item owned by exactly one case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    /// Assigned by the engine at creation time.
    pub id: ProductId,
    /// Product category.
    #[serde(rename = "type")]
    pub product_type: ProductType,
    /// Commercial product name.
    pub name: String,
    /// Country of origin.
    pub origin_country: String,
    /// Customs tariff (HS) code.
    pub tariff_code: String,
    /// Declared annual quantity, free-form (e.g. "1200 t").
    pub quantity: String,
    /// Brand under which the product is sold.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand_name: Option<String>,
    /// Free-form product category label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Whether the product is sold under a licensed brand.
    #[serde(default)]
    pub has_brand_license: bool,
}

/// Product attributes supplied by the exporter at creation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    /// Product category.
    #[serde(rename = "type")]
    pub product_type: ProductType,
    /// Commercial product name.
    pub name: String,
    /// Country of origin.
    pub origin_country: String,
    /// Customs tariff (HS) code.
    pub tariff_code: String,
    /// Declared quantity.
    pub quantity: String,
    /// Brand under which the product is sold.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand_name: Option<String>,
    /// Free-form product category label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Whether the product is sold under a licensed brand.
    #[serde(default)]
    pub has_brand_license: bool,
}

impl NewProduct {
    /// Check that every required descriptive attribute is present.
    pub fn validate(&self) -> Result<(), DossierError> {
        require_present("name", &self.name)?;
        require_present("originCountry", &self.origin_country)?;
        require_present("tariffCode", &self.tariff_code)?;
        require_present("quantity", &self.quantity)?;
        Ok(())
    }

    /// Materialise the product under a fresh identifier.
    pub fn into_product(self) -> Product {
        Product {
            id: ProductId::new(),
            product_type: self.product_type,
            name: self.name.trim().to_string(),
            origin_country: self.origin_country.trim().to_string(),
            tariff_code: self.tariff_code.trim().to_string(),
            quantity: self.quantity.trim().to_string(),
            brand_name: self.brand_name,
            category: self.category,
            has_brand_license: self.has_brand_license,
        }
    }
}

/// Partial update of a draft product. The product type is immutable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPatch {
    /// New product name.
    #[serde(default)]
    pub name: Option<String>,
    /// New country of origin.
    #[serde(default)]
    pub origin_country: Option<String>,
    /// New tariff code.
    #[serde(default)]
    pub tariff_code: Option<String>,
    /// New declared quantity.
    #[serde(default)]
    pub quantity: Option<String>,
    /// New brand name.
    #[serde(default)]
    pub brand_name: Option<String>,
    /// New category label.
    #[serde(default)]
    pub category: Option<String>,
    /// New brand-license flag.
    #[serde(default)]
    pub has_brand_license: Option<bool>,
}

impl ProductPatch {
    /// Apply the patch to `product`, validating presence of every
    /// replaced required attribute. Leaves `product` untouched on error.
    pub fn apply(&self, product: &mut Product) -> Result<(), DossierError> {
        for (field, value) in [
            ("name", &self.name),
            ("originCountry", &self.origin_country),
            ("tariffCode", &self.tariff_code),
            ("quantity", &self.quantity),
        ] {
            if let Some(v) = value {
                require_present(field, v)?;
            }
        }

        if let Some(v) = &self.name {
            product.name = v.trim().to_string();
        }
        if let Some(v) = &self.origin_country {
            product.origin_country = v.trim().to_string();
        }
        if let Some(v) = &self.tariff_code {
            product.tariff_code = v.trim().to_string();
        }
        if let Some(v) = &self.quantity {
            product.quantity = v.trim().to_string();
        }
        if let Some(v) = &self.brand_name {
            product.brand_name = Some(v.clone());
        }
        if let Some(v) = &self.category {
            product.category = Some(v.clone());
        }
        if let Some(v) = self.has_brand_license {
            product.has_brand_license = v;
        }
        Ok(())
    }
}

fn require_present(field: &str, value: &str) -> Result<(), DossierError> {
    if value.trim().is_empty() {
        return Err(DossierError::Validation(format!("{field} must not be empty")));
    }
    Ok(())
}
