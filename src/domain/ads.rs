//! Advertisement payload rules and the fixed-point price type.

use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use super::error::DomainError;

pub const CAPTION_MIN_CHARS: usize = 3;
pub const CAPTION_MAX_CHARS: usize = 128;
pub const DESCRIPTION_MAX_CHARS: usize = 1024;

/// Price in minor currency units (hundredths). Never negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Price(i64);

impl Price {
    pub const ZERO: Price = Price(0);

    pub fn new(minor_units: i64) -> Result<Self, DomainError> {
        if minor_units < 0 {
            return Err(DomainError::validation("price", "must not be negative"));
        }
        Ok(Self(minor_units))
    }

    pub fn minor_units(self) -> i64 {
        self.0
    }
}

impl TryFrom<i64> for Price {
    type Error = DomainError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Price> for i64 {
    fn from(price: Price) -> Self {
        price.0
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

/// Validated input for a new advertisement. The owner comes from the verified caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdDraft {
    pub owner_id: Uuid,
    pub caption: String,
    pub description: String,
    pub image_url: Option<String>,
    pub price: Price,
}

impl AdDraft {
    pub fn new(
        owner_id: Uuid,
        caption: String,
        description: String,
        image_url: Option<String>,
        price: i64,
    ) -> Result<Self, DomainError> {
        validate_caption(&caption)?;
        validate_description(&description)?;
        let image_url = normalize_image_url(image_url)?;
        let price = Price::new(price)?;

        Ok(Self {
            owner_id,
            caption,
            description,
            image_url,
            price,
        })
    }
}

/// Partial update; `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdChanges {
    pub caption: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub price: Option<Price>,
}

impl AdChanges {
    pub fn new(
        caption: Option<String>,
        description: Option<String>,
        image_url: Option<String>,
        price: Option<i64>,
    ) -> Result<Self, DomainError> {
        if let Some(caption) = caption.as_deref() {
            validate_caption(caption)?;
        }
        if let Some(description) = description.as_deref() {
            validate_description(description)?;
        }
        let image_url = normalize_image_url(image_url)?;
        let price = price.map(Price::new).transpose()?;

        Ok(Self {
            caption,
            description,
            image_url,
            price,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.caption.is_none()
            && self.description.is_none()
            && self.image_url.is_none()
            && self.price.is_none()
    }
}

fn validate_caption(caption: &str) -> Result<(), DomainError> {
    let length = caption.trim().chars().count();
    if length < CAPTION_MIN_CHARS {
        return Err(DomainError::validation(
            "caption",
            format!("must be at least {CAPTION_MIN_CHARS} characters"),
        ));
    }
    if caption.chars().count() > CAPTION_MAX_CHARS {
        return Err(DomainError::validation(
            "caption",
            format!("must be at most {CAPTION_MAX_CHARS} characters"),
        ));
    }
    Ok(())
}

fn validate_description(description: &str) -> Result<(), DomainError> {
    if description.trim().is_empty() {
        return Err(DomainError::validation("description", "is required"));
    }
    if description.chars().count() > DESCRIPTION_MAX_CHARS {
        return Err(DomainError::validation(
            "description",
            format!("must be at most {DESCRIPTION_MAX_CHARS} characters"),
        ));
    }
    Ok(())
}

fn normalize_image_url(image_url: Option<String>) -> Result<Option<String>, DomainError> {
    let Some(raw) = image_url else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let parsed = Url::parse(trimmed)
        .map_err(|err| DomainError::validation("image_url", format!("is not a valid URL: {err}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(DomainError::validation(
            "image_url",
            "must use the http or https scheme",
        ));
    }

    Ok(Some(trimmed.to_string()))
}
