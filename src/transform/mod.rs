//! Pluggable format transformer pipeline converting between raw binary
//! vectors and wire formats (SPEC_FULL §4.4).

mod columnar;
mod json;

use crate::error::Result;

pub use columnar::ColumnarTransformer;
pub use json::JsonTransformer;

/// A named encode/decode pair for a wire format.
pub trait Transformer: Send + Sync {
    /// Registry lookup key, e.g. `"json"`.
    fn name(&self) -> &str;
    /// Wire format produced, e.g. `"json"` or `"parquet"`.
    fn format_name(&self) -> &str;
    fn transform(&self, bytes: &[u8]) -> Result<Vec<u8>>;
    fn inverse(&self, bytes: &[u8]) -> Result<Vec<u8>>;
}

/// Lookup by name or format_name returns the first registered match.
pub struct TransformerRegistry {
    transformers: Vec<Box<dyn Transformer>>,
}

impl TransformerRegistry {
    pub fn new() -> Self {
        Self {
            transformers: Vec::new(),
        }
    }

    /// Registry with the built-ins (`json`, `parquet`) registered. Safe to
    /// call more than once; each call returns a fresh, independent registry,
    /// so repeated init is always idempotent.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(JsonTransformer));
        registry.register(Box::new(ColumnarTransformer));
        registry
    }

    pub fn register(&mut self, transformer: Box<dyn Transformer>) {
        self.transformers.push(transformer);
    }

    pub fn by_name(&self, name: &str) -> Option<&dyn Transformer> {
        self.transformers
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    pub fn by_format(&self, format_name: &str) -> Option<&dyn Transformer> {
        self.transformers
            .iter()
            .find(|t| t.format_name() == format_name)
            .map(|t| t.as_ref())
    }

    pub fn names(&self) -> Vec<&str> {
        self.transformers.iter().map(|t| t.name()).collect()
    }

    pub fn formats(&self) -> Vec<&str> {
        self.transformers.iter().map(|t| t.format_name()).collect()
    }
}

impl Default for TransformerRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
