use std::cmp::Ordering;

use serde_json::{Map, Value};

/// A document as delivered by the store: its id plus an untyped field map.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub data: Map<String, Value>,
}

impl Document {
    pub fn new(id: impl Into<String>, data: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.data.get(name)
    }
}

/// Field filter of a query.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// `field == value`
    Eq { field: String, value: Value },
    /// `field` is an array containing `value`
    ArrayContains { field: String, value: Value },
}

impl Filter {
    pub fn equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Eq {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn array_contains(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::ArrayContains {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Filter::Eq { field, value } => doc.field(field) == Some(value),
            Filter::ArrayContains { field, value } => match doc.field(field) {
                Some(Value::Array(items)) => items.contains(value),
                _ => false,
            },
        }
    }
}

/// Query over one collection: optional filter, optional ascending order.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub collection: String,
    pub filter: Option<Filter>,
    pub order_by: Option<String>,
}

impl Query {
    pub fn collection(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            filter: None,
            order_by: None,
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn order_by(mut self, field: impl Into<String>) -> Self {
        self.order_by = Some(field.into());
        self
    }

    /// Apply filter and ordering to the documents of `self.collection`.
    pub fn evaluate(&self, documents: Vec<Document>) -> Vec<Document> {
        let mut selected: Vec<Document> = documents
            .into_iter()
            .filter(|doc| self.filter.as_ref().is_none_or(|f| f.matches(doc)))
            .collect();

        match &self.order_by {
            Some(field) => selected.sort_by(|a, b| {
                compare_values(a.field(field), b.field(field)).then_with(|| a.id.cmp(&b.id))
            }),
            None => selected.sort_by(|a, b| a.id.cmp(&b.id)),
        }
        selected
    }
}

/// Missing values sort first, then numbers, then strings.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(value: Option<&Value>) -> u8 {
        match value {
            None | Some(Value::Null) => 0,
            Some(Value::Number(_)) => 1,
            Some(Value::String(_)) => 2,
            Some(_) => 3,
        }
    }

    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or_default();
            let y = y.as_f64().unwrap_or_default();
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(id: &str, value: Value) -> Document {
        match value {
            Value::Object(map) => Document::new(id, map),
            _ => panic!("test document must be an object"),
        }
    }

    #[test]
    fn eq_filter_matches_exact_value() {
        let filter = Filter::equals("studentId", "u1");
        assert!(filter.matches(&doc("a", json!({"studentId": "u1"}))));
        assert!(!filter.matches(&doc("b", json!({"studentId": "u2"}))));
        assert!(!filter.matches(&doc("c", json!({}))));
    }

    #[test]
    fn array_contains_requires_array_field() {
        let filter = Filter::array_contains("participants", "u1");
        assert!(filter.matches(&doc("a", json!({"participants": ["u0", "u1"]}))));
        assert!(!filter.matches(&doc("b", json!({"participants": "u1"}))));
    }

    #[test]
    fn order_by_puts_missing_values_first() {
        let query = Query::collection("m").order_by("timestamp");
        let result = query.evaluate(vec![
            doc("late", json!({"timestamp": 300})),
            doc("none", json!({})),
            doc("early", json!({"timestamp": 100})),
        ]);
        let ids: Vec<_> = result.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["none", "early", "late"]);
    }
}
