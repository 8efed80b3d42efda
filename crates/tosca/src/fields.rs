use crate::catalog::{Catalog, Site};
use crate::entity::{path_field, path_index, path_key, EntityId, FileId, Kind, Meta};
use std::collections::{BTreeMap, BTreeSet};

/// A reader function: consumes generic data at a context and produces a
/// typed entity. Readers never fail; malformed input is reported and the
/// entity is returned partially populated.
pub type Reader = fn(&ReadCtx<'_>, &ir::Value) -> EntityId;

/// Reading context: the catalog, the owning file, and the path of the
/// value currently being consumed. Cheap to fork for child values.
#[derive(Clone)]
pub struct ReadCtx<'a> {
    pub catalog: &'a Catalog,
    pub file: FileId,
    pub name: String,
    pub path: String,
}

impl<'a> ReadCtx<'a> {
    pub fn root(catalog: &'a Catalog, file: FileId) -> Self {
        Self {
            catalog,
            file,
            name: String::new(),
            path: String::new(),
        }
    }

    /// Fork into a named field of the current value.
    pub fn field(&self, field: &str) -> ReadCtx<'a> {
        ReadCtx {
            catalog: self.catalog,
            file: self.file,
            name: field.to_string(),
            path: path_field(&self.path, field),
        }
    }

    /// Fork into a keyed child (map entry) of the current value.
    pub fn child_key(&self, key: &str) -> ReadCtx<'a> {
        ReadCtx {
            catalog: self.catalog,
            file: self.file,
            name: key.to_string(),
            path: path_key(&self.path, key),
        }
    }

    /// Fork into an indexed child (list entry) of the current value.
    pub fn child_index(&self, index: usize) -> ReadCtx<'a> {
        ReadCtx {
            catalog: self.catalog,
            file: self.file,
            name: self.name.clone(),
            path: path_index(&self.path, index),
        }
    }

    pub fn meta(&self) -> Meta {
        Meta {
            name: self.name.clone(),
            path: self.path.clone(),
            file: self.file,
            locator: None,
        }
    }

    pub fn site(&self) -> Site {
        self.catalog.site_of(&self.meta())
    }

    pub fn alloc(&self, kind: Kind) -> EntityId {
        self.catalog.alloc(self.meta(), kind)
    }

    pub fn report(&self, code: &'static str, message: String) {
        self.catalog.report(&self.site(), code, message);
    }

    pub fn report_wrong_type(&self, expected: &str, actual: &ir::Value) {
        self.report(
            "WrongType",
            format!("wrong type: expected {expected}, got {}", actual.type_name()),
        );
    }
}

/// Declarative-style field consumption over a map value: every read marks
/// its key consumed, and `finish` reports whatever was never consumed as
/// unsupported. This is the explicit-code form of the original's
/// tag-driven reader machinery.
pub struct FieldReader<'a, 'c> {
    ctx: &'c ReadCtx<'a>,
    map: Option<&'c ir::Map>,
    consumed: BTreeSet<String>,
}

impl<'a, 'c> FieldReader<'a, 'c> {
    /// Expect `data` to be a map; a wrong shape is reported once and all
    /// subsequent reads return nothing.
    pub fn new(ctx: &'c ReadCtx<'a>, data: &'c ir::Value) -> Self {
        let map = match data {
            ir::Value::Map(map) => Some(map),
            other => {
                if !other.is_null() {
                    ctx.report_wrong_type("map", other);
                }
                None
            }
        };
        Self {
            ctx,
            map,
            consumed: BTreeSet::new(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.map.is_some()
    }

    fn take(&mut self, key: &str) -> Option<&'c ir::Value> {
        let value = self.map?.get(&ir::Value::from(key))?;
        self.consumed.insert(key.to_string());
        Some(value)
    }

    pub fn raw(&mut self, key: &str) -> Option<ir::Value> {
        self.take(key).cloned()
    }

    pub fn string(&mut self, key: &str) -> Option<String> {
        let value = self.take(key)?;
        match value.as_str() {
            Some(s) => Some(s.to_string()),
            None => {
                self.ctx.field(key).report_wrong_type("string", value);
                None
            }
        }
    }

    pub fn required_string(&mut self, key: &str) -> Option<String> {
        match self.string(key) {
            Some(value) => Some(value),
            None => {
                if self.is_valid() && !self.consumed.contains(key) {
                    self.ctx.field(key).report(
                        "FieldMissing",
                        format!("required field missing: {key:?}"),
                    );
                }
                None
            }
        }
    }

    pub fn boolean(&mut self, key: &str) -> Option<bool> {
        let value = self.take(key)?;
        match value.as_bool() {
            Some(b) => Some(b),
            None => {
                self.ctx.field(key).report_wrong_type("boolean", value);
                None
            }
        }
    }

    pub fn integer(&mut self, key: &str) -> Option<i64> {
        let value = self.take(key)?;
        match value.as_integer() {
            Some(i) => Some(i),
            None => {
                self.ctx.field(key).report_wrong_type("integer", value);
                None
            }
        }
    }

    pub fn string_list(&mut self, key: &str) -> Option<Vec<String>> {
        let value = self.take(key)?;
        let ctx = self.ctx.field(key);
        match value.as_list() {
            Some(list) => Some(
                list.iter()
                    .enumerate()
                    .filter_map(|(index, entry)| match entry.as_str() {
                        Some(s) => Some(s.to_string()),
                        None => {
                            ctx.child_index(index).report_wrong_type("string", entry);
                            None
                        }
                    })
                    .collect(),
            ),
            None => {
                ctx.report_wrong_type("list of string", value);
                None
            }
        }
    }

    /// A map of string to string; scalar values stringify, complex values
    /// are reported.
    pub fn string_map(&mut self, key: &str) -> Option<BTreeMap<String, String>> {
        let value = self.take(key)?;
        let ctx = self.ctx.field(key);
        match value.as_map() {
            Some(map) => Some(
                map.iter()
                    .filter_map(|(entry_key, entry_value)| match entry_value {
                        ir::Value::List(_) | ir::Value::Map(_) => {
                            ctx.child_key(&entry_key.key_string())
                                .report_wrong_type("string", entry_value);
                            None
                        }
                        scalar => Some((entry_key.key_string(), scalar.key_string())),
                    })
                    .collect(),
            ),
            None => {
                ctx.report_wrong_type("map of string", value);
                None
            }
        }
    }

    /// Read a single child entity.
    pub fn entity(&mut self, key: &str, read: Reader) -> Option<EntityId> {
        let value = self.take(key)?.clone();
        let ctx = self.ctx.field(key);
        Some(read(&ctx, &value))
    }

    /// Read a map of named child entities.
    pub fn entity_map(&mut self, key: &str, read: Reader) -> BTreeMap<String, EntityId> {
        let Some(value) = self.take(key) else {
            return BTreeMap::new();
        };
        let value = value.clone();
        let ctx = self.ctx.field(key);
        match value.as_map() {
            Some(map) => map
                .iter()
                .map(|(entry_key, entry_value)| {
                    let name = entry_key.key_string();
                    let child = ctx.child_key(&name);
                    (name, read(&child, entry_value))
                })
                .collect(),
            None => {
                ctx.report_wrong_type("map", &value);
                BTreeMap::new()
            }
        }
    }

    /// Read a plain list of child entities.
    pub fn entity_list(&mut self, key: &str, read: Reader) -> Vec<EntityId> {
        let Some(value) = self.take(key) else {
            return Vec::new();
        };
        let value = value.clone();
        let ctx = self.ctx.field(key);
        match value.as_list() {
            Some(list) => list
                .iter()
                .enumerate()
                .map(|(index, entry)| read(&ctx.child_index(index), entry))
                .collect(),
            None => {
                ctx.report_wrong_type("list", &value);
                Vec::new()
            }
        }
    }

    /// Read a list of single-entry maps (`- name: {...}`), the sequenced
    /// named form used by requirements and policies.
    pub fn keyed_entity_list(&mut self, key: &str, read: Reader) -> Vec<EntityId> {
        let Some(value) = self.take(key) else {
            return Vec::new();
        };
        let value = value.clone();
        let ctx = self.ctx.field(key);
        match value.as_list() {
            Some(list) => list
                .iter()
                .enumerate()
                .filter_map(|(index, entry)| {
                    let entry_ctx = ctx.child_index(index);
                    match entry.as_map() {
                        Some(map) if map.len() == 1 => {
                            let (entry_key, entry_value) =
                                map.iter().next().expect("len was checked");
                            let name = entry_key.key_string();
                            Some(read(&entry_ctx.child_key(&name), entry_value))
                        }
                        Some(_) => {
                            entry_ctx.report_wrong_type("single-entry map", entry);
                            None
                        }
                        None => {
                            entry_ctx.report_wrong_type("map", entry);
                            None
                        }
                    }
                })
                .collect(),
            None => {
                ctx.report_wrong_type("list", &value);
                Vec::new()
            }
        }
    }

    /// Accept and discard a key, e.g. for quirk-driven ignores.
    pub fn ignore(&mut self, key: &str) {
        self.take(key);
    }

    /// Report every key that no read consumed.
    pub fn finish(self) {
        let Some(map) = self.map else {
            return;
        };
        for key in map.keys() {
            let key = key.key_string();
            if !self.consumed.contains(&key) {
                self.ctx.child_key(&key).report(
                    "UnsupportedField",
                    format!("unsupported field: {key:?}"),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, File};
    use crate::quirks::Quirks;
    use std::sync::Arc;

    fn test_catalog() -> (Catalog, FileId) {
        let catalog = Catalog::new(Arc::new(resources::UrlContext::new()), Quirks::default());
        let file = catalog.add_file(File::new(
            url::Url::parse("internal:/test.yaml").unwrap(),
        ));
        (catalog, file)
    }

    fn yaml(text: &str) -> ir::Value {
        let (value, _) = ir::decode(text.as_bytes(), ir::Format::Yaml).unwrap();
        value
    }

    #[test]
    fn unconsumed_keys_are_unsupported() {
        let (catalog, file) = test_catalog();
        let ctx = ReadCtx::root(&catalog, file);
        let data = yaml("known: x\nbogus: y\n");

        let mut fields = FieldReader::new(&ctx, &data);
        assert_eq!(fields.string("known"), Some("x".to_string()));
        fields.finish();

        assert_eq!(catalog.problems.count("UnsupportedField"), 1);
    }

    #[test]
    fn missing_required_fields_are_reported() {
        let (catalog, file) = test_catalog();
        let ctx = ReadCtx::root(&catalog, file);
        let data = yaml("{}");

        let mut fields = FieldReader::new(&ctx, &data);
        assert_eq!(fields.required_string("type"), None);
        fields.finish();

        assert_eq!(catalog.problems.count("FieldMissing"), 1);
    }

    #[test]
    fn wrong_shapes_report_and_recover() {
        let (catalog, file) = test_catalog();
        let ctx = ReadCtx::root(&catalog, file);
        let data = yaml("name: [not, a, string]\n");

        let mut fields = FieldReader::new(&ctx, &data);
        assert_eq!(fields.string("name"), None);
        fields.finish();

        assert_eq!(catalog.problems.count("WrongType"), 1);
        // The key still counts as consumed.
        assert_eq!(catalog.problems.count("UnsupportedField"), 0);
    }
}
