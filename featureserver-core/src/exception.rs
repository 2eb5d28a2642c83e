//! Error details in the shape exception reports expose.

/// Fields of one entry in an exception report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExceptionDetails {
    /// Machine-readable exception code, e.g. `InvalidParameterValue`.
    pub code: String,
    /// Component that raised the error.
    pub locator: String,
    /// Data source the error concerns.
    pub layer: String,
    /// Human-readable message.
    pub message: String,
    /// Upstream diagnostic, such as the store's error text.
    pub dump: String,
}
