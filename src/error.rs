//! Structured error types for xlsxt.

/// All errors that can occur while loading, rendering, or exporting a template.
#[derive(Debug, thiserror::Error)]
pub enum XlsxtError {
    /// An operation needed a workbook but none has been loaded or rendered.
    #[error("Not load template xlsx file")]
    TemplateNotLoaded,

    /// The result workbook rejected a sheet (duplicate or invalid name).
    #[error("Sheet creation failed: {0}")]
    SheetCreation(String),

    /// A cell's template expression could not be parsed or evaluated.
    #[error("Template expression in sheet '{sheet}' at {cell}: {source}")]
    TemplateExpression {
        sheet: String,
        cell: String,
        #[source]
        source: minijinja::Error,
    },

    /// A font file required for PDF export is missing or unreadable.
    #[error("Font resolution failed: {0}")]
    FontResolution(String),

    /// The PDF backend failed to assemble the document.
    #[error("PDF export: {0}")]
    Pdf(String),

    /// XML parsing error from quick-xml.
    #[error("XML parsing: {0}")]
    Xml(#[from] quick_xml::Error),

    /// ZIP archive error.
    #[error("ZIP archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// General parse error.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The bound data could not be converted into a shape.
    #[error("Data binding: {0}")]
    Data(String),

    /// Invalid export configuration.
    #[error("Configuration: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, XlsxtError>;

impl From<serde_json::Error> for XlsxtError {
    fn from(e: serde_json::Error) -> Self {
        Self::Data(e.to_string())
    }
}

impl From<toml::de::Error> for XlsxtError {
    fn from(e: toml::de::Error) -> Self {
        Self::Config(e.to_string())
    }
}

impl From<printpdf::Error> for XlsxtError {
    fn from(e: printpdf::Error) -> Self {
        Self::Pdf(e.to_string())
    }
}
