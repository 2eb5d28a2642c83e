//! Test doubles shared by the workspace's unit and behaviour tests.

use crate::{action::ExternalFilter, config::DataSourceConfig};

/// An [`ExternalFilter`] returning fixed SQL.
///
/// `{table}` in either template is replaced with the qualified table name of
/// the data source rendering the filter.
#[derive(Debug, Clone, Default)]
pub struct StaticFilter {
    /// Statement template used by write actions.
    pub statement: String,
    /// `WHERE` fragment template used by selects.
    pub fragment: String,
    /// Attribute names the filter claims to reference.
    pub attributes: Vec<String>,
}

impl StaticFilter {
    /// A filter rendering `fragment` for selects.
    pub fn where_fragment(fragment: impl Into<String>) -> Self {
        Self {
            fragment: fragment.into(),
            ..Self::default()
        }
    }

    /// A filter producing `statement` for writes.
    pub fn write_statement(statement: impl Into<String>) -> Self {
        Self {
            statement: statement.into(),
            ..Self::default()
        }
    }

    /// Declare the referenced attributes.
    #[must_use]
    pub fn with_attributes<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes = attributes.into_iter().map(Into::into).collect();
        self
    }
}

impl ExternalFilter for StaticFilter {
    fn statement(&self, config: &DataSourceConfig) -> String {
        self.statement.replace("{table}", &config.qualified_table())
    }

    fn render(&self, config: &DataSourceConfig) -> String {
        self.fragment.replace("{table}", &config.qualified_table())
    }

    fn attributes(&self) -> Vec<String> {
        self.attributes.clone()
    }
}
