//! Query Builder SELECT operations

use super::builder::QueryBuilder;
use super::types::SelectItem;

impl QueryBuilder {
    /// Replace the SELECT list; accepts `*` or comma-separated columns
    pub fn select(mut self, fields: &str) -> Self {
        self.select_items.clear();
        self.push_fields(fields);
        self
    }

    /// Append columns to the SELECT list
    pub fn add_select<S: AsRef<str>>(mut self, columns: &[S]) -> Self {
        for column in columns {
            self.push_fields(column.as_ref());
        }
        self
    }

    /// Select the separator-joined text of `columns` under `alias`
    pub fn select_concat<S: AsRef<str>>(mut self, columns: &[S], separator: &str, alias: &str) -> Self {
        self.select_items.push(SelectItem::Concat {
            columns: columns.iter().map(|c| c.as_ref().to_string()).collect(),
            separator: separator.to_string(),
            alias: alias.to_string(),
        });
        self
    }

    /// Add custom SELECT expression
    pub fn select_raw(mut self, expression: &str) -> Self {
        self.select_items.push(SelectItem::Raw(expression.to_string()));
        self
    }

    /// Set the FROM table
    pub fn from(mut self, table: &str) -> Self {
        self.from_table = Some(table.to_string());
        self
    }

    fn push_fields(&mut self, fields: &str) {
        self.select_items.extend(
            fields
                .split(',')
                .map(str::trim)
                .filter(|f| !f.is_empty())
                .map(|f| SelectItem::Column(f.to_string())),
        );
    }
}
