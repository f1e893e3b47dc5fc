use crate::Value;

/// Sort direction for an ordered query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// A single predicate on a document field.
#[derive(Debug, Clone)]
pub enum Condition {
    /// The field equals the value exactly.
    Eq(String, Value),
    /// The field is ordered greater than or equal to the value.
    Gte(String, Value),
    /// The field is ordered less than or equal to the value.
    Lte(String, Value),
}

impl Condition {
    pub fn field(&self) -> &str {
        match self {
            Condition::Eq(field, _) | Condition::Gte(field, _) | Condition::Lte(field, _) => field,
        }
    }
}

/// A query composed against a single collection.
#[derive(Debug, Clone, Default)]
pub struct Query {
    pub conditions: Vec<Condition>,
    pub order_by: Option<(String, Direction)>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter_eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.conditions
            .push(Condition::Eq(field.to_string(), value.into()));
        self
    }

    pub fn filter_gte(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.conditions
            .push(Condition::Gte(field.to_string(), value.into()));
        self
    }

    pub fn filter_lte(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.conditions
            .push(Condition::Lte(field.to_string(), value.into()));
        self
    }

    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        self.order_by = Some((field.to_string(), direction));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether this query pairs a field condition with an ordering on a
    /// different field. Stores may need a composite index to serve these.
    pub fn is_compound(&self) -> bool {
        let Some((order_field, _)) = &self.order_by else {
            return false;
        };

        self.conditions.iter().any(|c| c.field() != order_field)
    }
}

/// A single field mutation applied by an update.
#[derive(Debug, Clone)]
pub enum FieldOp {
    /// Overwrite the field with the value.
    Set(String, Value),
    /// Add the value to an array field unless it is already present.
    ArrayAdd(String, Value),
    /// Remove every occurrence of the value from an array field.
    ArrayRemove(String, Value),
    /// Add the amount to an integer field, treating an absent field as zero.
    Increment(String, i64),
}
