//! Converters from a cached string to a caller's type.

use std::fmt;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;

/// Turns a cached or freshly fetched string into a `T`.
///
/// Errors and panics are caught by the engine and delivered as `None`.
pub trait Converter<T>: Send + Sync {
    fn convert(&self, raw: &str) -> anyhow::Result<T>;
}

impl<T, F> Converter<T> for F
where
    F: Fn(&str) -> anyhow::Result<T> + Send + Sync,
{
    fn convert(&self, raw: &str) -> anyhow::Result<T> {
        self(raw)
    }
}

/// Decodes values that were stored as JSON, e.g. through `put_json`.
pub struct JsonConverter<T> {
    _target: PhantomData<fn() -> T>,
}

impl<T> JsonConverter<T> {
    pub fn new() -> Self {
        Self {
            _target: PhantomData,
        }
    }
}

impl<T> Default for JsonConverter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for JsonConverter<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for JsonConverter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("JsonConverter")
    }
}

impl<T: DeserializeOwned> Converter<T> for JsonConverter<T> {
    fn convert(&self, raw: &str) -> anyhow::Result<T> {
        Ok(serde_json::from_str(raw)?)
    }
}
