//! The liqi schema document.
//!
//! The game ships its protocol definition as a protobufjs-style JSON tree
//! (`res/proto/liqi.json`): nested namespaces holding messages (`fields`),
//! enums (`values`) and services (`methods`). [`Schema::from_json`] flattens
//! that tree into lookup tables keyed by fully-qualified name, resolving
//! every field's type reference once up front so the hot decode path is a
//! couple of hash lookups.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Deserialize;

use crate::ProtocolError;

/// A protobuf scalar type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scalar {
    Double,
    Float,
    Int32,
    Int64,
    Uint32,
    Uint64,
    Sint32,
    Sint64,
    Fixed32,
    Fixed64,
    Sfixed32,
    Sfixed64,
    Bool,
    String,
    Bytes,
}

impl Scalar {
    fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "double" => Self::Double,
            "float" => Self::Float,
            "int32" => Self::Int32,
            "int64" => Self::Int64,
            "uint32" => Self::Uint32,
            "uint64" => Self::Uint64,
            "sint32" => Self::Sint32,
            "sint64" => Self::Sint64,
            "fixed32" => Self::Fixed32,
            "fixed64" => Self::Fixed64,
            "sfixed32" => Self::Sfixed32,
            "sfixed64" => Self::Sfixed64,
            "bool" => Self::Bool,
            "string" => Self::String,
            "bytes" => Self::Bytes,
            _ => return None,
        })
    }

    /// Whether repeated fields of this type use packed encoding.
    pub fn is_packable(self) -> bool {
        !matches!(self, Self::String | Self::Bytes)
    }
}

/// What a field holds, with message and enum names fully qualified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    Scalar(Scalar),
    Enum(String),
    Message(String),
}

impl FieldKind {
    pub(crate) fn is_packable(&self) -> bool {
        match self {
            Self::Scalar(s) => s.is_packable(),
            Self::Enum(_) => true,
            Self::Message(_) => false,
        }
    }
}

/// One field of a message.
#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    pub number: u32,
    pub kind: FieldKind,
    pub repeated: bool,
    /// Key type for `map<K, V>` fields; `kind` is then the value type.
    pub map_key: Option<Scalar>,
}

/// A message definition.
#[derive(Debug, Clone)]
pub struct MessageType {
    name: String,
    /// Sorted by field number so encoding is deterministic.
    fields: Vec<Field>,
    by_number: HashMap<u32, usize>,
}

impl MessageType {
    /// Fully-qualified name, e.g. `.lq.ResLogin`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field_by_number(&self, number: u32) -> Option<&Field> {
        self.by_number.get(&number).map(|&i| &self.fields[i])
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// An enum definition (name → number).
#[derive(Debug, Clone)]
pub struct EnumType {
    values: HashMap<String, i32>,
}

impl EnumType {
    pub fn value(&self, name: &str) -> Option<i32> {
        self.values.get(name).copied()
    }
}

/// A service method's request and response types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Method {
    pub request_type: String,
    pub response_type: String,
}

/// A parsed, fully-resolved liqi schema.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    messages: HashMap<String, MessageType>,
    enums: HashMap<String, EnumType>,
    /// Keyed by `.lq.Lobby.heatbeat`.
    methods: HashMap<String, Method>,
    /// Short type name → full name, for self-describing record wrappers.
    records: HashMap<String, String>,
}

// ---------------------------------------------------------------------------
// Raw document shape
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct RawNode {
    #[serde(default)]
    fields: Option<BTreeMap<String, RawField>>,
    #[serde(default)]
    values: Option<BTreeMap<String, i64>>,
    #[serde(default)]
    methods: Option<BTreeMap<String, RawMethod>>,
    #[serde(default)]
    nested: Option<BTreeMap<String, RawNode>>,
}

#[derive(Deserialize)]
struct RawField {
    #[serde(rename = "type")]
    ty: String,
    id: u32,
    #[serde(default)]
    rule: Option<String>,
    #[serde(default, rename = "keyType")]
    key_type: Option<String>,
}

#[derive(Deserialize)]
struct RawMethod {
    #[serde(rename = "requestType")]
    request_type: String,
    #[serde(rename = "responseType")]
    response_type: String,
}

/// Collected but not yet resolved definitions.
#[derive(Default)]
struct Collector<'a> {
    messages: Vec<(String, &'a BTreeMap<String, RawField>)>,
    enums: Vec<(String, &'a BTreeMap<String, i64>)>,
    services: Vec<(String, &'a BTreeMap<String, RawMethod>)>,
}

impl<'a> Collector<'a> {
    fn walk(&mut self, prefix: &str, node: &'a RawNode) {
        if let Some(fields) = &node.fields {
            self.messages.push((prefix.to_string(), fields));
        }
        if let Some(values) = &node.values {
            self.enums.push((prefix.to_string(), values));
        }
        if let Some(methods) = &node.methods {
            self.services.push((prefix.to_string(), methods));
        }
        if let Some(nested) = &node.nested {
            for (name, child) in nested {
                self.walk(&format!("{prefix}.{name}"), child);
            }
        }
    }
}

impl Schema {
    /// Parses a liqi JSON schema document.
    ///
    /// # Errors
    /// [`ProtocolError::Schema`] if the JSON is not a schema tree or a type
    /// reference cannot be resolved.
    pub fn from_json(text: &str) -> Result<Self, ProtocolError> {
        let root: RawNode = serde_json::from_str(text)
            .map_err(|e| ProtocolError::Schema(e.to_string()))?;
        Self::from_raw(&root)
    }

    /// Builds a schema from an already-parsed JSON document.
    pub fn from_value(value: serde_json::Value) -> Result<Self, ProtocolError> {
        let root: RawNode = serde_json::from_value(value)
            .map_err(|e| ProtocolError::Schema(e.to_string()))?;
        Self::from_raw(&root)
    }

    fn from_raw(root: &RawNode) -> Result<Self, ProtocolError> {
        let mut collector = Collector::default();
        collector.walk("", root);

        let message_names: HashSet<&str> =
            collector.messages.iter().map(|(n, _)| n.as_str()).collect();
        let enum_names: HashSet<&str> =
            collector.enums.iter().map(|(n, _)| n.as_str()).collect();
        let resolver = Resolver {
            messages: &message_names,
            enums: &enum_names,
        };

        let mut schema = Schema::default();

        for (name, values) in &collector.enums {
            let values = values
                .iter()
                .map(|(k, &v)| (k.clone(), v as i32))
                .collect();
            schema.enums.insert(name.clone(), EnumType { values });
        }

        for (name, raw_fields) in &collector.messages {
            let mut fields = Vec::with_capacity(raw_fields.len());
            for (field_name, raw) in raw_fields.iter() {
                let kind = resolver.kind(&raw.ty, name)?;
                let map_key = match &raw.key_type {
                    Some(k) => Some(Scalar::parse(k).ok_or_else(|| {
                        ProtocolError::Schema(format!(
                            "map key type {k} in {name}.{field_name}"
                        ))
                    })?),
                    None => None,
                };
                fields.push(Field {
                    name: field_name.clone(),
                    number: raw.id,
                    kind,
                    repeated: raw.rule.as_deref() == Some("repeated"),
                    map_key,
                });
            }
            fields.sort_by_key(|f| f.number);
            let by_number =
                fields.iter().enumerate().map(|(i, f)| (f.number, i)).collect();
            schema.messages.insert(
                name.clone(),
                MessageType {
                    name: name.clone(),
                    fields,
                    by_number,
                },
            );

            // `.lq.RecordNewRound` is addressable as `RecordNewRound`.
            let parts: Vec<&str> = name.split('.').collect();
            if parts.len() == 3 {
                schema.records.insert(parts[2].to_string(), name.clone());
            }
        }

        for (service, methods) in &collector.services {
            for (method, raw) in methods.iter() {
                let request_type = resolver.message(&raw.request_type, service)?;
                let response_type =
                    resolver.message(&raw.response_type, service)?;
                schema.methods.insert(
                    format!("{service}.{method}"),
                    Method {
                        request_type,
                        response_type,
                    },
                );
            }
        }

        tracing::debug!(
            messages = schema.messages.len(),
            enums = schema.enums.len(),
            methods = schema.methods.len(),
            "schema loaded"
        );
        Ok(schema)
    }

    /// Looks up a message by fully-qualified name.
    pub fn message(&self, name: &str) -> Result<&MessageType, ProtocolError> {
        self.messages
            .get(name)
            .ok_or_else(|| ProtocolError::UnknownType(name.to_string()))
    }

    /// Looks up an enum by fully-qualified name.
    pub fn enum_type(&self, name: &str) -> Option<&EnumType> {
        self.enums.get(name)
    }

    /// Looks up a service method (`.lq.Lobby.heatbeat`).
    pub fn method(&self, name: &str) -> Result<&Method, ProtocolError> {
        self.methods
            .get(name)
            .ok_or_else(|| ProtocolError::UnknownMethod(name.to_string()))
    }

    /// Looks up a record type by its short name (`RecordDealTile`).
    pub fn record_type(&self, short: &str) -> Result<&MessageType, ProtocolError> {
        let full = self
            .records
            .get(short)
            .ok_or_else(|| ProtocolError::UnknownType(short.to_string()))?;
        self.message(full)
    }
}

/// Resolves type references using protobuf scoping rules: innermost scope
/// first, walking outwards to the root.
struct Resolver<'a> {
    messages: &'a HashSet<&'a str>,
    enums: &'a HashSet<&'a str>,
}

impl Resolver<'_> {
    fn kind(&self, ty: &str, scope: &str) -> Result<FieldKind, ProtocolError> {
        if let Some(s) = Scalar::parse(ty) {
            return Ok(FieldKind::Scalar(s));
        }
        for candidate in candidates(ty, scope) {
            if self.messages.contains(candidate.as_str()) {
                return Ok(FieldKind::Message(candidate));
            }
            if self.enums.contains(candidate.as_str()) {
                return Ok(FieldKind::Enum(candidate));
            }
        }
        Err(ProtocolError::Schema(format!(
            "unresolved type {ty} referenced from {scope}"
        )))
    }

    fn message(&self, ty: &str, scope: &str) -> Result<String, ProtocolError> {
        match self.kind(ty, scope)? {
            FieldKind::Message(name) => Ok(name),
            _ => Err(ProtocolError::Schema(format!(
                "{ty} referenced from {scope} is not a message"
            ))),
        }
    }
}

fn candidates(ty: &str, scope: &str) -> Vec<String> {
    if let Some(stripped) = ty.strip_prefix('.') {
        return vec![format!(".{stripped}")];
    }
    let mut out = Vec::new();
    let mut prefix = scope;
    loop {
        out.push(format!("{prefix}.{ty}"));
        match prefix.rfind('.') {
            Some(i) => prefix = &prefix[..i],
            None => break,
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"{
      "nested": { "lq": { "nested": {
        "Lobby": { "methods": {
          "heatbeat": { "requestType": "ReqHeatBeat", "responseType": "ResCommon" }
        } },
        "ReqHeatBeat": { "fields": { "no_operation_counter": { "type": "uint32", "id": 1 } } },
        "Error": { "fields": { "code": { "type": "uint32", "id": 1 } } },
        "ResCommon": { "fields": { "error": { "type": "Error", "id": 1 } } },
        "GamePlayState": { "values": { "AUTH": 0, "PLAY": 1 } },
        "RecordGame": {
          "fields": {
            "accounts": { "rule": "repeated", "type": "AccountInfo", "id": 11 },
            "uuid": { "type": "string", "id": 1 },
            "state": { "type": "GamePlayState", "id": 2 }
          },
          "nested": { "AccountInfo": { "fields": { "seat": { "type": "uint32", "id": 2 } } } }
        }
      } } }
    }"#;

    #[test]
    fn test_from_json_resolves_methods() {
        let schema = Schema::from_json(DOC).unwrap();
        let m = schema.method(".lq.Lobby.heatbeat").unwrap();
        assert_eq!(m.request_type, ".lq.ReqHeatBeat");
        assert_eq!(m.response_type, ".lq.ResCommon");
    }

    #[test]
    fn test_nested_type_resolves_innermost_scope_first() {
        let schema = Schema::from_json(DOC).unwrap();
        let game = schema.message(".lq.RecordGame").unwrap();
        let accounts = game.field("accounts").unwrap();
        assert!(accounts.repeated);
        assert_eq!(
            accounts.kind,
            FieldKind::Message(".lq.RecordGame.AccountInfo".into())
        );
        assert_eq!(
            game.field("state").unwrap().kind,
            FieldKind::Enum(".lq.GamePlayState".into())
        );
    }

    #[test]
    fn test_fields_sorted_by_number() {
        let schema = Schema::from_json(DOC).unwrap();
        let numbers: Vec<u32> = schema
            .message(".lq.RecordGame")
            .unwrap()
            .fields()
            .iter()
            .map(|f| f.number)
            .collect();
        assert_eq!(numbers, vec![1, 2, 11]);
    }

    #[test]
    fn test_unknown_lookups_are_schema_lookup_errors() {
        let schema = Schema::from_json(DOC).unwrap();
        assert!(schema.method(".lq.Lobby.nope").unwrap_err().is_schema_lookup());
        assert!(schema.message(".lq.Nope").unwrap_err().is_schema_lookup());
    }

    #[test]
    fn test_record_type_by_short_name() {
        let schema = Schema::from_json(DOC).unwrap();
        assert_eq!(schema.record_type("ResCommon").unwrap().name(), ".lq.ResCommon");
        assert!(schema.record_type("AccountInfo").is_err());
    }

    #[test]
    fn test_unresolved_reference_rejected() {
        let doc = r#"{"nested":{"lq":{"nested":{
            "A":{"fields":{"b":{"type":"Missing","id":1}}}}}}}"#;
        assert!(matches!(
            Schema::from_json(doc),
            Err(ProtocolError::Schema(_))
        ));
    }

    #[test]
    fn test_enum_values() {
        let schema = Schema::from_json(DOC).unwrap();
        let e = schema.enum_type(".lq.GamePlayState").unwrap();
        assert_eq!(e.value("PLAY"), Some(1));
    }
}
