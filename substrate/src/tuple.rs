use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::error::{DbError, Result};
use crate::field::{Field, FieldType};
use crate::RecordId;

/// One item of a schema: a type plus an optional column name.
#[derive(Debug, Clone)]
pub struct TdItem {
    pub field_type: FieldType,
    pub name: Option<String>,
}

impl std::fmt::Display for TdItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{}({})", self.field_type, name),
            None => write!(f, "{}(null)", self.field_type),
        }
    }
}

/// An ordered schema describing one tuple shape.
///
/// Equality and hashing consider only the types, in order; column names are
/// labels and never affect schema identity.
#[derive(Debug, Clone)]
pub struct TupleDesc {
    items: Vec<TdItem>,
}

impl TupleDesc {
    /// Builds a schema from `(type, name)` pairs. A schema always has at
    /// least one field.
    pub fn named<N: Into<String>>(fields: Vec<(FieldType, N)>) -> Self {
        let items = fields
            .into_iter()
            .map(|(field_type, name)| TdItem {
                field_type,
                name: Some(name.into()),
            })
            .collect::<Vec<_>>();
        assert!(!items.is_empty(), "a tuple schema needs at least one field");
        Self { items }
    }

    /// Builds an anonymous schema from types alone.
    pub fn from_types(types: Vec<FieldType>) -> Self {
        let items = types
            .into_iter()
            .map(|field_type| TdItem {
                field_type,
                name: None,
            })
            .collect::<Vec<_>>();
        assert!(!items.is_empty(), "a tuple schema needs at least one field");
        Self { items }
    }

    pub fn num_fields(&self) -> usize {
        self.items.len()
    }

    pub fn field_type(&self, i: usize) -> FieldType {
        self.items[i].field_type
    }

    pub fn field_name(&self, i: usize) -> Option<&str> {
        self.items[i].name.as_deref()
    }

    pub fn items(&self) -> &[TdItem] {
        &self.items
    }

    /// Index of the named field.
    pub fn index_of(&self, name: &str) -> Result<usize> {
        self.items
            .iter()
            .position(|item| item.name.as_deref() == Some(name))
            .ok_or_else(|| DbError::NoSuchElement(format!("field named '{}'", name)))
    }

    /// Number of bytes a tuple with this schema occupies in a page slot.
    pub fn byte_len(&self) -> usize {
        self.items.iter().map(|item| item.field_type.byte_len()).sum()
    }

    /// Concatenates two schemas, `left` first.
    pub fn merge(left: &TupleDesc, right: &TupleDesc) -> TupleDesc {
        let mut items = left.items.clone();
        items.extend(right.items.iter().cloned());
        TupleDesc { items }
    }

    /// The same schema with every column name prefixed by `alias.`.
    pub fn with_prefix(&self, alias: &str) -> TupleDesc {
        let items = self
            .items
            .iter()
            .map(|item| TdItem {
                field_type: item.field_type,
                name: Some(format!(
                    "{}.{}",
                    alias,
                    item.name.as_deref().unwrap_or("null")
                )),
            })
            .collect();
        TupleDesc { items }
    }
}

impl PartialEq for TupleDesc {
    fn eq(&self, other: &Self) -> bool {
        self.items.len() == other.items.len()
            && self
                .items
                .iter()
                .zip(other.items.iter())
                .all(|(a, b)| a.field_type == b.field_type)
    }
}

impl Eq for TupleDesc {}

impl Hash for TupleDesc {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for item in &self.items {
            item.field_type.hash(state);
        }
    }
}

impl std::fmt::Display for TupleDesc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self.items.iter().map(|item| item.to_string()).collect();
        write!(f, "{}", parts.join(", "))
    }
}

/// A row: a schema reference, one field per schema item, and the slot the
/// row occupies on disk once it has been stored.
#[derive(Debug, Clone, PartialEq)]
pub struct Tuple {
    desc: Arc<TupleDesc>,
    fields: Vec<Field>,
    record_id: Option<RecordId>,
}

impl Tuple {
    /// Builds a tuple, checking the fields against the schema.
    pub fn new(desc: Arc<TupleDesc>, fields: Vec<Field>) -> Result<Self> {
        if fields.len() != desc.num_fields() {
            return Err(DbError::SchemaMismatch(format!(
                "expected {} fields, got {}",
                desc.num_fields(),
                fields.len()
            )));
        }
        for (i, field) in fields.iter().enumerate() {
            if field.field_type() != desc.field_type(i) {
                return Err(DbError::SchemaMismatch(format!(
                    "field {} should be {}, got {}",
                    i,
                    desc.field_type(i),
                    field.field_type()
                )));
            }
        }
        Ok(Self {
            desc,
            fields,
            record_id: None,
        })
    }

    pub fn desc(&self) -> &Arc<TupleDesc> {
        &self.desc
    }

    pub fn field(&self, i: usize) -> &Field {
        &self.fields[i]
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Replaces field `i`. The new value must match the schema type.
    pub fn set_field(&mut self, i: usize, value: Field) -> Result<()> {
        if value.field_type() != self.desc.field_type(i) {
            return Err(DbError::SchemaMismatch(format!(
                "field {} should be {}, got {}",
                i,
                self.desc.field_type(i),
                value.field_type()
            )));
        }
        self.fields[i] = value;
        Ok(())
    }

    pub fn record_id(&self) -> Option<RecordId> {
        self.record_id
    }

    pub fn set_record_id(&mut self, rid: Option<RecordId>) {
        self.record_id = rid;
    }

    /// Appends the serialized form of every field, in schema order.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        for field in &self.fields {
            field.write_to(out);
        }
    }

    /// Concatenates two tuples under a merged schema.
    pub fn merge(desc: Arc<TupleDesc>, left: &Tuple, right: &Tuple) -> Result<Tuple> {
        let mut fields = left.fields.clone();
        fields.extend(right.fields.iter().cloned());
        Tuple::new(desc, fields)
    }
}

impl std::fmt::Display for Tuple {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self.fields.iter().map(|field| field.to_string()).collect();
        write!(f, "{}", parts.join("\t"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_ints() -> Arc<TupleDesc> {
        Arc::new(TupleDesc::named(vec![
            (FieldType::Int, "a"),
            (FieldType::Int, "b"),
        ]))
    }

    #[test]
    fn equality_ignores_names() {
        let named = TupleDesc::named(vec![(FieldType::Int, "x"), (FieldType::Text, "y")]);
        let anon = TupleDesc::from_types(vec![FieldType::Int, FieldType::Text]);
        assert_eq!(named, anon);

        let other = TupleDesc::from_types(vec![FieldType::Text, FieldType::Int]);
        assert_ne!(named, other);
    }

    #[test]
    fn byte_len_sums_field_widths() {
        let desc = TupleDesc::from_types(vec![FieldType::Int, FieldType::Text, FieldType::Int]);
        assert_eq!(
            desc.byte_len(),
            FieldType::Int.byte_len() * 2 + FieldType::Text.byte_len()
        );
    }

    #[test]
    fn merge_preserves_order() {
        let left = TupleDesc::named(vec![(FieldType::Int, "a")]);
        let right = TupleDesc::named(vec![(FieldType::Text, "b"), (FieldType::Int, "c")]);
        let merged = TupleDesc::merge(&left, &right);
        assert_eq!(merged.num_fields(), 3);
        assert_eq!(merged.field_name(0), Some("a"));
        assert_eq!(merged.field_name(1), Some("b"));
        assert_eq!(merged.field_type(2), FieldType::Int);
    }

    #[test]
    fn index_of_missing_name_errors() {
        let desc = two_ints();
        assert_eq!(desc.index_of("b").unwrap(), 1);
        assert!(matches!(
            desc.index_of("nope"),
            Err(DbError::NoSuchElement(_))
        ));
    }

    #[test]
    fn tuple_rejects_wrong_arity_and_type() {
        let desc = two_ints();
        assert!(matches!(
            Tuple::new(desc.clone(), vec![Field::Int(1)]),
            Err(DbError::SchemaMismatch(_))
        ));
        assert!(matches!(
            Tuple::new(desc, vec![Field::Int(1), Field::Text("x".into())]),
            Err(DbError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn set_field_checks_type() {
        let desc = two_ints();
        let mut t = Tuple::new(desc, vec![Field::Int(1), Field::Int(2)]).unwrap();
        t.set_field(1, Field::Int(9)).unwrap();
        assert_eq!(t.field(1), &Field::Int(9));
        assert!(t.set_field(0, Field::Text("no".into())).is_err());
    }
}
