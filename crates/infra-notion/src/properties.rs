// Notion property mapping for contact pages

use chrono::NaiveDate;
use contactsync_core::domain::{
    Cadence, CandidateRecord, ContactFields, ExistingRecord, FieldChange, FieldSet,
};
use contactsync_core::port::StoreError;
use serde_json::{json, Map, Value};

// Database property names
pub const NAME: &str = "Name";
pub const LINKEDIN_URL: &str = "LinkedIn URL";
pub const EMAIL: &str = "Email";
pub const PHONE: &str = "Phone";
pub const COMPANY: &str = "Company";
pub const POSITION: &str = "Position";
pub const INDUSTRY: &str = "Industry";
pub const FIELD_OF_WORK: &str = "Field of Work";
pub const CONNECTED_ON: &str = "Connected On";
pub const LAST_CONTACTED: &str = "Last Contacted";
pub const CONTACT_SCHEDULE: &str = "Contact Schedule";
pub const OVERDUE: &str = "Overdue";

fn title(text: &str) -> Value {
    json!({ "title": [{ "text": { "content": text } }] })
}

fn rich_text(text: &str) -> Value {
    json!({ "rich_text": [{ "text": { "content": text } }] })
}

// Empty select/email/phone/url values are rejected by Notion, null clears them
fn select(name: &str) -> Value {
    if name.trim().is_empty() {
        json!({ "select": null })
    } else {
        json!({ "select": { "name": name } })
    }
}

fn nullable(kind: &str, text: &str) -> Value {
    let value = if text.trim().is_empty() {
        Value::Null
    } else {
        Value::String(text.to_string())
    };
    let mut property = Map::new();
    property.insert(kind.to_string(), value);
    Value::Object(property)
}

fn date(day: NaiveDate) -> Value {
    json!({ "date": { "start": day.format("%Y-%m-%d").to_string() } })
}

/// Property name and payload for one field change
pub fn encode_change(change: &FieldChange) -> (&'static str, Value) {
    match change {
        FieldChange::Name(v) => (NAME, title(v)),
        FieldChange::Email(v) => (EMAIL, nullable("email", v)),
        FieldChange::Phone(v) => (PHONE, nullable("phone_number", v)),
        FieldChange::Company(v) => (COMPANY, rich_text(v)),
        FieldChange::Position(v) => (POSITION, rich_text(v)),
        FieldChange::Industry(v) => (INDUSTRY, rich_text(v)),
        FieldChange::FieldOfWork(v) => (FIELD_OF_WORK, select(v)),
        FieldChange::ConnectedOn(d) => (CONNECTED_ON, date(*d)),
        FieldChange::LastContacted(d) => (LAST_CONTACTED, date(*d)),
        FieldChange::Cadence(c) => (CONTACT_SCHEDULE, select(c.as_str())),
        FieldChange::Overdue(b) => (OVERDUE, json!({ "checkbox": b })),
    }
}

/// `properties` object of a page update; only the changed fields are sent
pub fn encode_update(changes: &FieldSet) -> Value {
    let properties: Map<String, Value> = changes
        .iter()
        .map(|change| {
            let (name, value) = encode_change(change);
            (name.to_string(), value)
        })
        .collect();
    Value::Object(properties)
}

/// `properties` object of a new page.
///
/// Blank optional fields are left out. A missing cadence gets
/// `default_cadence`, and new pages start not overdue.
pub fn encode_create(candidate: &CandidateRecord, default_cadence: &Cadence) -> Value {
    let fields = &candidate.fields;
    let mut properties = Map::new();
    properties.insert(NAME.to_string(), title(fields.name.trim()));

    let key = candidate.match_key.trim();
    if !key.is_empty() {
        properties.insert(LINKEDIN_URL.to_string(), json!({ "url": key }));
    }

    let optional: [(&str, fn(String) -> FieldChange); 6] = [
        (fields.email.as_str(), FieldChange::Email),
        (fields.phone.as_str(), FieldChange::Phone),
        (fields.company.as_str(), FieldChange::Company),
        (fields.position.as_str(), FieldChange::Position),
        (fields.industry.as_str(), FieldChange::Industry),
        (fields.field_of_work.as_str(), FieldChange::FieldOfWork),
    ];
    for (value, make) in optional {
        let value = value.trim();
        if !value.is_empty() {
            let (name, payload) = encode_change(&make(value.to_string()));
            properties.insert(name.to_string(), payload);
        }
    }

    if let Some(day) = fields.connected_on {
        properties.insert(CONNECTED_ON.to_string(), date(day));
    }
    if let Some(day) = fields.last_contacted {
        properties.insert(LAST_CONTACTED.to_string(), date(day));
    }
    let cadence = fields.cadence.as_ref().unwrap_or(default_cadence);
    properties.insert(CONTACT_SCHEDULE.to_string(), select(cadence.as_str()));
    properties.insert(OVERDUE.to_string(), json!({ "checkbox": false }));

    Value::Object(properties)
}

/// Concatenated plain text of a title or rich_text property
fn read_text(properties: &Value, name: &str, kind: &str) -> String {
    properties
        .get(name)
        .and_then(|p| p.get(kind))
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| {
                    part.get("plain_text")
                        .or_else(|| part.get("text").and_then(|t| t.get("content")))
                        .and_then(Value::as_str)
                })
                .collect::<String>()
        })
        .unwrap_or_default()
}

fn read_scalar(properties: &Value, name: &str, kind: &str) -> String {
    properties
        .get(name)
        .and_then(|p| p.get(kind))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn read_select(properties: &Value, name: &str) -> String {
    properties
        .get(name)
        .and_then(|p| p.get("select"))
        .and_then(|s| s.get("name"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Accepts plain dates and datetimes (`2024-03-15T10:00:00.000Z`)
fn read_date(properties: &Value, name: &str) -> Option<NaiveDate> {
    let start = properties
        .get(name)?
        .get("date")?
        .get("start")?
        .as_str()?;
    let day = start.get(..10)?;
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

/// Stored record from a page object. Pages without an id are ignored.
pub fn decode_page(page: &Value) -> Option<ExistingRecord> {
    let id = page.get("id")?.as_str()?.to_string();
    let empty = Value::Null;
    let properties = page.get("properties").unwrap_or(&empty);

    let fields = ContactFields {
        name: read_text(properties, NAME, "title"),
        email: read_scalar(properties, EMAIL, "email"),
        phone: read_scalar(properties, PHONE, "phone_number"),
        company: read_text(properties, COMPANY, "rich_text"),
        position: read_text(properties, POSITION, "rich_text"),
        industry: read_text(properties, INDUSTRY, "rich_text"),
        field_of_work: read_select(properties, FIELD_OF_WORK),
        connected_on: read_date(properties, CONNECTED_ON),
        last_contacted: read_date(properties, LAST_CONTACTED),
        cadence: Cadence::parse(&read_select(properties, CONTACT_SCHEDULE)),
    };
    let overdue = properties
        .get(OVERDUE)
        .and_then(|p| p.get("checkbox"))
        .and_then(Value::as_bool)
        .unwrap_or(false);

    Some(ExistingRecord {
        id,
        match_key: read_scalar(properties, LINKEDIN_URL, "url"),
        fields,
        overdue,
    })
}

/// A database property the sync reads or writes, with its Notion type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertySpec {
    pub name: &'static str,
    pub kind: &'static str,
}

/// Contact database layout, in creation order
pub const SCHEMA: [PropertySpec; 12] = [
    PropertySpec { name: NAME, kind: "title" },
    PropertySpec { name: LINKEDIN_URL, kind: "url" },
    PropertySpec { name: EMAIL, kind: "email" },
    PropertySpec { name: PHONE, kind: "phone_number" },
    PropertySpec { name: COMPANY, kind: "rich_text" },
    PropertySpec { name: POSITION, kind: "rich_text" },
    PropertySpec { name: INDUSTRY, kind: "rich_text" },
    PropertySpec { name: FIELD_OF_WORK, kind: "select" },
    PropertySpec { name: CONNECTED_ON, kind: "date" },
    PropertySpec { name: LAST_CONTACTED, kind: "date" },
    PropertySpec { name: CONTACT_SCHEDULE, kind: "select" },
    PropertySpec { name: OVERDUE, kind: "checkbox" },
];

impl PropertySpec {
    /// Payload that creates this property on a database
    pub fn definition(&self) -> Value {
        let config = if self.name == CONTACT_SCHEDULE {
            json!({
                "options": [
                    { "name": Cadence::Weekly.as_str(), "color": "blue" },
                    { "name": Cadence::Monthly.as_str(), "color": "green" },
                    { "name": Cadence::Quarterly.as_str(), "color": "yellow" },
                    { "name": Cadence::Yearly.as_str(), "color": "red" },
                ]
            })
        } else {
            json!({})
        };
        let mut property = Map::new();
        property.insert(self.kind.to_string(), config);
        Value::Object(property)
    }
}

/// Database update that brings an existing layout up to `SCHEMA`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaPatch {
    /// `properties` object of `PATCH /v1/databases/{id}`
    pub properties: Map<String, Value>,
    /// Names of the properties the patch adds
    pub added: Vec<String>,
}

impl SchemaPatch {
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

/// Diff the `properties` object of a database against `SCHEMA`.
///
/// A database has exactly one title property; when it is not called `Name`
/// it is renamed rather than added. A property that exists with another type
/// is a schema error: converting it could destroy user data.
pub fn schema_patch(existing: &Value) -> Result<SchemaPatch, StoreError> {
    let kind_of = |name: &str| {
        existing
            .get(name)
            .and_then(|p| p.get("type"))
            .and_then(Value::as_str)
    };
    let mut patch = SchemaPatch::default();

    for column in SCHEMA {
        match kind_of(column.name) {
            Some(kind) if kind == column.kind => continue,
            Some(kind) => {
                return Err(StoreError::Schema(format!(
                    "Property '{}' is {} but must be {}",
                    column.name, kind, column.kind
                )))
            }
            None => {}
        }

        let renamed_title = (column.kind == "title")
            .then(|| {
                existing.as_object().and_then(|props| {
                    props
                        .iter()
                        .find(|(_, p)| p.get("type").and_then(Value::as_str) == Some("title"))
                        .map(|(name, _)| name.clone())
                })
            })
            .flatten();
        match renamed_title {
            Some(old) => patch.properties.insert(old, json!({ "name": column.name })),
            None => patch
                .properties
                .insert(column.name.to_string(), column.definition()),
        };
        patch.added.push(column.name.to_string());
    }

    Ok(patch)
}
