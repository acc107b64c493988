//! Entity trait and the schema derived from it.

use std::collections::BTreeMap;

use sable_core::{OrmError, Result, Row, Value};

use super::column::{ColumnDescriptor, ColumnKind};

/// Upgrade statements keyed by `"<from>_<to>"`.
pub type UpgradeScripts = BTreeMap<String, Vec<String>>;

/// A unique constraint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UniqueKey {
    /// One column, rendered inline.
    Single(String),
    /// Several columns, rendered as a trailing table constraint.
    Composite(Vec<String>),
}

/// A record type persisted in one table.
///
/// Implementors list their columns explicitly; everything else has a default.
pub trait Entity: Sized {
    /// Non-key columns in table order.
    fn columns() -> Vec<ColumnDescriptor>;

    /// Primary key column. Defaults to an auto-increment `id`.
    fn primary_key() -> ColumnDescriptor {
        ColumnDescriptor::int("id", 0).auto_increment()
    }

    /// Unique constraints.
    fn unique_keys() -> Vec<UniqueKey> {
        Vec::new()
    }

    /// Columns covered by a full-text index.
    fn full_text_keys() -> Vec<String> {
        Vec::new()
    }

    /// Declared schema version, starting at 1.
    fn schema_version() -> u32 {
        1
    }

    /// Upgrade statements between versions.
    fn upgrade_scripts() -> UpgradeScripts {
        UpgradeScripts::new()
    }

    /// Hydrate a record from a result row.
    fn from_row(row: &Row) -> Result<Self>;

    /// Column values to persist, primary key excluded when auto-generated.
    fn to_record(&self) -> Vec<(String, Value)>;
}

/// The table layout derived from an [`Entity`].
#[derive(Clone, Debug)]
pub struct EntitySchema {
    columns: Vec<ColumnDescriptor>,
    unique: Vec<UniqueKey>,
    full_text: Vec<String>,
    version: u32,
    upgrades: UpgradeScripts,
}

impl EntitySchema {
    /// Derive the schema of `E`.
    pub fn of<E: Entity>() -> Result<Self> {
        Self::new(
            E::primary_key(),
            E::columns(),
            E::unique_keys(),
            E::full_text_keys(),
            E::schema_version(),
            E::upgrade_scripts(),
        )
    }

    /// Build a schema. The primary key goes first; a column repeating its
    /// name is dropped.
    pub fn new(
        primary_key: ColumnDescriptor,
        columns: Vec<ColumnDescriptor>,
        unique: Vec<UniqueKey>,
        full_text: Vec<String>,
        version: u32,
        upgrades: UpgradeScripts,
    ) -> Result<Self> {
        if version == 0 {
            return Err(OrmError::field("schema_version", "versions start at 1"));
        }
        let pk_name = primary_key.name().to_string();
        let mut all = vec![primary_key];
        all.extend(columns.into_iter().filter(|c| c.name() != pk_name));

        if all.iter().filter(|c| c.is_auto_increment()).count() > 1 {
            return Err(OrmError::field(pk_name, "at most one auto-increment column is allowed"));
        }
        let known = |name: &str| all.iter().any(|c| c.name() == name);
        for key in &unique {
            let names = match key {
                UniqueKey::Single(n) => std::slice::from_ref(n),
                UniqueKey::Composite(ns) => ns.as_slice(),
            };
            if let Some(missing) = names.iter().find(|n| !known(n)) {
                return Err(OrmError::field(missing.clone(), "unique key names an unknown column"));
            }
        }
        if let Some(missing) = full_text.iter().find(|n| !known(n)) {
            return Err(OrmError::field(missing.clone(), "full-text key names an unknown column"));
        }

        Ok(Self {
            columns: all,
            unique,
            full_text,
            version,
            upgrades,
        })
    }

    /// Every column, primary key first.
    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name() == name)
    }

    /// The primary key column.
    pub fn primary_key(&self) -> &ColumnDescriptor {
        &self.columns[0]
    }

    /// Unique constraints.
    pub fn unique(&self) -> &[UniqueKey] {
        &self.unique
    }

    /// Whether `name` carries a single-column unique constraint.
    pub fn is_unique(&self, name: &str) -> bool {
        self.unique
            .iter()
            .any(|k| matches!(k, UniqueKey::Single(n) if n == name))
    }

    /// Composite unique groups.
    pub fn composite_unique(&self) -> impl Iterator<Item = &[String]> {
        self.unique.iter().filter_map(|k| match k {
            UniqueKey::Composite(ns) => Some(ns.as_slice()),
            UniqueKey::Single(_) => None,
        })
    }

    /// Full-text indexed columns.
    pub fn full_text_keys(&self) -> &[String] {
        &self.full_text
    }

    /// Declared schema version.
    pub fn schema_version(&self) -> u32 {
        self.version
    }

    /// The script list declared for exactly `from_to`.
    pub fn upgrade_sql(&self, from: u32, to: u32) -> Option<&[String]> {
        self.upgrades
            .get(&format!("{from}_{to}"))
            .map(Vec::as_slice)
    }

    /// Resolve the ordered statements taking the table from `from` to `to`.
    ///
    /// A direct `"from_to"` list wins; otherwise every consecutive pair must
    /// be declared. Returns the first missing key on failure.
    pub fn upgrade_path(&self, from: u32, to: u32) -> std::result::Result<Vec<String>, String> {
        if let Some(direct) = self.upgrade_sql(from, to) {
            return Ok(direct.to_vec());
        }
        let mut statements = Vec::new();
        for v in from..to {
            match self.upgrade_sql(v, v + 1) {
                Some(step) => statements.extend_from_slice(step),
                None => return Err(format!("{v}_{}", v + 1)),
            }
        }
        Ok(statements)
    }

    /// Whether any column stores structured values.
    pub fn has_serialized(&self) -> bool {
        self.columns.iter().any(|c| c.kind() == ColumnKind::Serialized)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    struct Account;

    impl Entity for Account {
        fn columns() -> Vec<ColumnDescriptor> {
            vec![
                ColumnDescriptor::text("email", Some("")),
                ColumnDescriptor::text("org", None),
                ColumnDescriptor::text("handle", None),
            ]
        }

        fn unique_keys() -> Vec<UniqueKey> {
            vec![
                UniqueKey::Single("email".into()),
                UniqueKey::Composite(vec!["org".into(), "handle".into()]),
            ]
        }

        fn schema_version() -> u32 {
            3
        }

        fn upgrade_scripts() -> UpgradeScripts {
            UpgradeScripts::from([
                ("1_2".to_string(), vec!["A".to_string()]),
                ("2_3".to_string(), vec!["B".to_string(), "C".to_string()]),
            ])
        }

        fn from_row(_row: &Row) -> Result<Self> {
            Ok(Self)
        }

        fn to_record(&self) -> Vec<(String, Value)> {
            Vec::new()
        }
    }

    #[test]
    fn primary_key_defaults_to_auto_id() {
        let schema = EntitySchema::of::<Account>().unwrap();
        let pk = schema.primary_key();
        assert_eq!(pk.name(), "id");
        assert!(pk.is_auto_increment());
        assert_eq!(schema.columns()[0].name(), "id");
        assert_eq!(schema.columns().len(), 4);
    }

    #[test]
    fn unique_lookups() {
        let schema = EntitySchema::of::<Account>().unwrap();
        assert!(schema.is_unique("email"));
        assert!(!schema.is_unique("org"));
        let groups: Vec<_> = schema.composite_unique().collect();
        assert_eq!(groups, vec![&["org".to_string(), "handle".to_string()][..]]);
    }

    #[test]
    fn stepwise_upgrade_path() {
        let schema = EntitySchema::of::<Account>().unwrap();
        assert_eq!(schema.upgrade_path(1, 3).unwrap(), vec!["A", "B", "C"]);
        assert_eq!(schema.upgrade_path(2, 3).unwrap(), vec!["B", "C"]);
        assert_eq!(schema.upgrade_path(3, 4).unwrap_err(), "3_4");
    }

    #[test]
    fn direct_upgrade_path_wins() {
        let mut upgrades = Account::upgrade_scripts();
        let _ = upgrades.insert("1_3".into(), vec!["DIRECT".into()]);
        let schema = EntitySchema::new(
            Account::primary_key(),
            Account::columns(),
            Vec::new(),
            Vec::new(),
            3,
            upgrades,
        )
        .unwrap();
        assert_eq!(schema.upgrade_path(1, 3).unwrap(), vec!["DIRECT"]);
    }

    #[test]
    fn rejects_second_auto_increment() {
        let result = EntitySchema::new(
            ColumnDescriptor::int("id", 0).auto_increment(),
            vec![ColumnDescriptor::int("seq", 0).auto_increment()],
            Vec::new(),
            Vec::new(),
            1,
            UpgradeScripts::new(),
        );
        assert_matches!(result, Err(OrmError::Field { .. }));
    }

    #[test]
    fn rejects_version_zero() {
        let result = EntitySchema::new(
            Account::primary_key(),
            Vec::new(),
            Vec::new(),
            Vec::new(),
            0,
            UpgradeScripts::new(),
        );
        assert_matches!(result, Err(OrmError::Field { field, .. }) if field == "schema_version");
    }

    #[test]
    fn rejects_unknown_unique_column() {
        let result = EntitySchema::new(
            Account::primary_key(),
            Vec::new(),
            vec![UniqueKey::Single("ghost".into())],
            Vec::new(),
            1,
            UpgradeScripts::new(),
        );
        assert_matches!(result, Err(OrmError::Field { field, .. }) if field == "ghost");
    }
}
