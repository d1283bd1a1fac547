use serde::{Deserialize, Serialize};

pub const OPTIONS_VERSION: u16 = 1;
pub const MIN_IMAGE_RESOLUTION_SCALE: u8 = 1;
pub const MAX_IMAGE_RESOLUTION_SCALE: u8 = 4;

pub const IMAGE_RESOLUTION_SCALE_KEY: &str = "image_resolution_scale";
pub const EXTRACT_TABLES_AS_IMAGES_KEY: &str = "extract_tables_as_images";

/// Recognized conversion options, carried verbatim in every task message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConversionOptions {
    pub version: u16,
    pub image_resolution_scale: u8,
    pub extract_tables_as_images: bool,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            version: OPTIONS_VERSION,
            image_resolution_scale: MAX_IMAGE_RESOLUTION_SCALE,
            extract_tables_as_images: false,
        }
    }
}

impl ConversionOptions {
    /// Builds options from raw key/value pairs, rejecting unknown keys.
    pub fn from_pairs<K, V, I>(pairs: I) -> Result<Self, OptionsError>
    where
        K: AsRef<str>,
        V: AsRef<str>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut options = Self::default();

        for (key, value) in pairs {
            let (key, value) = (key.as_ref(), value.as_ref().trim());
            match key {
                IMAGE_RESOLUTION_SCALE_KEY => {
                    options.image_resolution_scale =
                        value.parse().map_err(|_| OptionsError::InvalidValue {
                            option: key.to_string(),
                            value: value.to_string(),
                        })?;
                }
                EXTRACT_TABLES_AS_IMAGES_KEY => {
                    options.extract_tables_as_images =
                        parse_bool(value).ok_or_else(|| OptionsError::InvalidValue {
                            option: key.to_string(),
                            value: value.to_string(),
                        })?;
                }
                other => return Err(OptionsError::UnknownOption(other.to_string())),
            }
        }

        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<(), OptionsError> {
        if self.version != OPTIONS_VERSION {
            return Err(OptionsError::UnsupportedVersion(self.version));
        }
        if !(MIN_IMAGE_RESOLUTION_SCALE..=MAX_IMAGE_RESOLUTION_SCALE)
            .contains(&self.image_resolution_scale)
        {
            return Err(OptionsError::ScaleOutOfRange(self.image_resolution_scale));
        }
        Ok(())
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OptionsError {
    #[error("unknown option: {0}")]
    UnknownOption(String),
    #[error("invalid value for {option}: {value}")]
    InvalidValue { option: String, value: String },
    #[error("image_resolution_scale must be between 1 and 4, got {0}")]
    ScaleOutOfRange(u8),
    #[error("unsupported options version: {0}")]
    UnsupportedVersion(u16),
}
