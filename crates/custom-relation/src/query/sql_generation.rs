//! Query Builder SQL generation

use serde_json::Value;

use super::builder::QueryBuilder;
use super::types::*;

impl QueryBuilder {
    /// Generate PostgreSQL with `$n` placeholders and the matching parameters
    pub fn to_sql_with_params(&self) -> (String, Vec<Value>) {
        let mut sql = String::from("SELECT ");
        let mut params = Vec::new();

        if self.select_items.is_empty() {
            sql.push('*');
        } else {
            let items: Vec<String> = self.select_items.iter().map(SelectItem::to_sql).collect();
            sql.push_str(&items.join(", "));
        }

        if let Some(table) = &self.from_table {
            sql.push_str(" FROM ");
            sql.push_str(table);
        }

        self.build_where_clause(&mut sql, &mut params);
        self.build_order_limit_clause(&mut sql);

        (sql, params)
    }

    /// Generate SQL only, discarding parameters
    pub fn to_sql(&self) -> String {
        self.to_sql_with_params().0
    }

    fn build_where_clause(&self, sql: &mut String, params: &mut Vec<Value>) {
        if self.where_clauses.is_empty() {
            return;
        }

        sql.push_str(" WHERE ");
        for (i, clause) in self.where_clauses.iter().enumerate() {
            if i > 0 {
                sql.push_str(" AND ");
            }

            let condition = match clause {
                WhereClause::Raw(raw) => {
                    sql.push('(');
                    sql.push_str(raw);
                    sql.push(')');
                    continue;
                }
                WhereClause::Condition(condition) => condition,
            };

            match condition.operator {
                QueryOperator::In | QueryOperator::NotIn if condition.values.is_empty() => {
                    // An empty list matches nothing (IN) or everything (NOT IN)
                    if condition.operator == QueryOperator::In {
                        sql.push_str("1 = 0");
                    } else {
                        sql.push_str("1 = 1");
                    }
                }
                QueryOperator::In | QueryOperator::NotIn => {
                    sql.push_str(&condition.operand.to_sql());
                    sql.push(' ');
                    sql.push_str(&condition.operator.to_string());
                    sql.push_str(" (");
                    for (j, value) in condition.values.iter().enumerate() {
                        if j > 0 {
                            sql.push_str(", ");
                        }
                        params.push(value.clone());
                        sql.push_str(&format!("${}", params.len()));
                    }
                    sql.push(')');
                }
                QueryOperator::IsNull | QueryOperator::IsNotNull => {
                    sql.push_str(&condition.operand.to_sql());
                    sql.push(' ');
                    sql.push_str(&condition.operator.to_string());
                }
                _ => {
                    sql.push_str(&condition.operand.to_sql());
                    sql.push(' ');
                    sql.push_str(&condition.operator.to_string());
                    if let Some(value) = &condition.value {
                        params.push(value.clone());
                        sql.push_str(&format!(" ${}", params.len()));
                    }
                }
            }
        }
    }

    fn build_order_limit_clause(&self, sql: &mut String) {
        if !self.order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            let order: Vec<String> = self
                .order_by
                .iter()
                .map(|(column, direction)| format!("{} {}", column, direction))
                .collect();
            sql.push_str(&order.join(", "));
        }

        if let Some(limit) = self.limit_count {
            sql.push_str(&format!(" LIMIT {}", limit));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_basic_select() {
        let (sql, params) = QueryBuilder::table("posts").to_sql_with_params();
        assert_eq!(sql, "SELECT * FROM posts");
        assert!(params.is_empty());
    }

    #[test]
    fn test_relation_query_with_synthetic_key() {
        let query = QueryBuilder::table("posts")
            .add_select(&["posts.*"])
            .select_concat(&["user_id", "tenant"], ",", "__custom_relation_key")
            .where_eq("published", true)
            .where_concat_in(&["user_id", "tenant"], ",", vec!["1,x".to_string(), "2,y".to_string()])
            .order_by_desc("created_at")
            .limit(50);

        let (sql, params) = query.to_sql_with_params();
        assert_eq!(
            sql,
            "SELECT posts.*, CONCAT_WS(',', user_id, tenant) AS __custom_relation_key FROM posts \
             WHERE published = $1 AND CONCAT_WS(',', user_id, tenant) IN ($2, $3) \
             ORDER BY created_at DESC LIMIT 50"
        );
        assert_eq!(params, vec![json!(true), json!("1,x"), json!("2,y")]);
    }

    #[test]
    fn test_empty_in_list_matches_nothing() {
        let sql = QueryBuilder::table("posts")
            .where_in::<i64>("user_id", vec![])
            .where_raw("deleted_at IS NULL")
            .to_sql();
        assert_eq!(sql, "SELECT * FROM posts WHERE 1 = 0 AND (deleted_at IS NULL)");
    }

    #[test]
    fn test_scopes_apply_once_in_order() {
        let query = QueryBuilder::table("posts")
            .with_scope("published", |q| q.where_eq("published", true))
            .with_scope("recent", |q| q.order_by_desc("id"))
            .with_scope("limited", |q| q.limit(5))
            .without_scope("limited");

        assert_eq!(query.pending_scopes(), vec!["published", "recent"]);

        let applied = query.apply_scopes();
        assert!(applied.pending_scopes().is_empty());
        assert_eq!(
            applied.to_sql(),
            "SELECT * FROM posts WHERE published = $1 ORDER BY id DESC"
        );
    }

    #[test]
    fn test_select_replaces_and_add_select_appends() {
        let query = QueryBuilder::table("posts")
            .select("id, title")
            .add_select(&["user_id"]);
        assert!(query.has_select());
        assert_eq!(query.to_sql(), "SELECT id, title, user_id FROM posts");
    }
}
