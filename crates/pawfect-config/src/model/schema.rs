//! Subsystem schemas
//!
//! A schema names the fields a subsystem expects, how each is validated,
//! which environment variable backs it and which fields are secrets. The
//! sensitive flag here is the only thing that decides what gets sealed for a
//! built-in subsystem.

use std::collections::BTreeMap;

use serde_json::{Value, json};

use pawfect_persistence::Category;

/// How a field is validated and parsed from the environment
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    /// Free text
    Text,
    /// TCP port, 1..=65535
    Port,
    Boolean,
    /// Integer within an inclusive range
    Integer { min: i64, max: i64 },
    Email,
    Url,
    /// Array of email addresses; comma separated in the environment
    EmailList,
}

impl FieldKind {
    /// Default used when a field spec does not name one
    pub fn zero_value(&self) -> Value {
        match self {
            FieldKind::Text | FieldKind::Email | FieldKind::Url => json!(""),
            FieldKind::Port | FieldKind::Integer { .. } => Value::Null,
            FieldKind::Boolean => json!(false),
            FieldKind::EmailList => json!([]),
        }
    }
}

/// One field of a subsystem schema
#[derive(Debug, Clone)]
pub struct FieldSpec {
    /// Dotted path inside the record data
    pub path: String,
    pub kind: FieldKind,
    /// Environment variable consulted when nothing is persisted
    pub env_var: Option<String>,
    /// Hard-coded default used when neither source has a value
    pub default: Value,
    /// Sealed at rest, masked for display
    pub sensitive: bool,
    /// Must not be blank when present
    pub required: bool,
}

impl FieldSpec {
    pub fn new(path: impl Into<String>, kind: FieldKind) -> Self {
        let default = kind.zero_value();
        Self {
            path: path.into(),
            kind,
            env_var: None,
            default,
            sensitive: false,
            required: false,
        }
    }

    pub fn env(mut self, name: impl Into<String>) -> Self {
        self.env_var = Some(name.into());
        self
    }

    pub fn default_value(mut self, value: Value) -> Self {
        self.default = value;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// Schema of a single configuration subsystem, keyed like its record
#[derive(Debug, Clone)]
pub struct SubsystemSchema {
    pub key: String,
    pub category: Category,
    pub fields: Vec<FieldSpec>,
}

impl SubsystemSchema {
    pub fn new(key: impl Into<String>, category: Category) -> Self {
        Self {
            key: key.into(),
            category,
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, spec: FieldSpec) -> Self {
        self.fields.push(spec);
        self
    }

    pub fn field_spec(&self, path: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.path == path)
    }

    pub fn sensitive_paths(&self) -> Vec<String> {
        self.fields
            .iter()
            .filter(|f| f.sensitive)
            .map(|f| f.path.clone())
            .collect()
    }
}

/// Registry of known subsystem schemas
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: BTreeMap<String, SubsystemSchema>,
}

impl SchemaRegistry {
    /// Registry without any schema
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry with every built-in PawfectMatch integration
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        for schema in builtin_schemas() {
            registry.register(schema);
        }
        registry
    }

    /// Add or replace a schema
    pub fn register(&mut self, schema: SubsystemSchema) {
        self.schemas.insert(schema.key.clone(), schema);
    }

    pub fn with(mut self, schema: SubsystemSchema) -> Self {
        self.register(schema);
        self
    }

    pub fn get(&self, key: &str) -> Option<&SubsystemSchema> {
        self.schemas.get(key)
    }

    /// Registered keys, ascending
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(String::as_str)
    }
}

fn builtin_schemas() -> Vec<SubsystemSchema> {
    vec![
        SubsystemSchema::new("analytics", Category::Analytics)
            .field(
                FieldSpec::new("emailService.host", FieldKind::Text)
                    .env("EMAIL_HOST")
                    .default_value(json!("smtp.gmail.com"))
                    .required(),
            )
            .field(
                FieldSpec::new("emailService.port", FieldKind::Port)
                    .env("EMAIL_PORT")
                    .default_value(json!(587)),
            )
            .field(FieldSpec::new("emailService.secure", FieldKind::Boolean).env("EMAIL_SECURE"))
            .field(FieldSpec::new("emailService.user", FieldKind::Text).env("EMAIL_USER"))
            .field(
                FieldSpec::new("emailService.password", FieldKind::Text)
                    .env("EMAIL_PASS")
                    .sensitive(),
            )
            .field(
                FieldSpec::new("emailService.from", FieldKind::Email)
                    .env("EMAIL_FROM")
                    .default_value(json!("noreply@pawfectmatch.com")),
            )
            .field(
                FieldSpec::new("reportRecipients", FieldKind::EmailList)
                    .env("ANALYTICS_REPORT_RECIPIENTS"),
            )
            .field(
                FieldSpec::new(
                    "alertThresholds.errorRatePercent",
                    FieldKind::Integer { min: 0, max: 100 },
                )
                .default_value(json!(5)),
            )
            .field(
                FieldSpec::new(
                    "alertThresholds.responseTimeMs",
                    FieldKind::Integer { min: 1, max: 600_000 },
                )
                .default_value(json!(2000)),
            ),
        SubsystemSchema::new("stripe", Category::Payment)
            .field(
                FieldSpec::new("secretKey", FieldKind::Text)
                    .env("STRIPE_SECRET_KEY")
                    .sensitive(),
            )
            .field(FieldSpec::new("publishableKey", FieldKind::Text).env("STRIPE_PUBLISHABLE_KEY"))
            .field(
                FieldSpec::new("webhookSecret", FieldKind::Text)
                    .env("STRIPE_WEBHOOK_SECRET")
                    .sensitive(),
            ),
        SubsystemSchema::new("maps", Category::Maps)
            .field(
                FieldSpec::new("apiKey", FieldKind::Text)
                    .env("GOOGLE_MAPS_API_KEY")
                    .sensitive(),
            )
            .field(
                FieldSpec::new("provider", FieldKind::Text)
                    .env("MAPS_PROVIDER")
                    .default_value(json!("google")),
            ),
        SubsystemSchema::new("storage", Category::Storage)
            .field(FieldSpec::new("cloudName", FieldKind::Text).env("CLOUDINARY_CLOUD_NAME"))
            .field(FieldSpec::new("apiKey", FieldKind::Text).env("CLOUDINARY_API_KEY"))
            .field(
                FieldSpec::new("apiSecret", FieldKind::Text)
                    .env("CLOUDINARY_API_SECRET")
                    .sensitive(),
            ),
        SubsystemSchema::new("sms", Category::Sms)
            .field(FieldSpec::new("accountSid", FieldKind::Text).env("TWILIO_ACCOUNT_SID"))
            .field(
                FieldSpec::new("authToken", FieldKind::Text)
                    .env("TWILIO_AUTH_TOKEN")
                    .sensitive(),
            )
            .field(FieldSpec::new("fromNumber", FieldKind::Text).env("TWILIO_PHONE_NUMBER")),
        SubsystemSchema::new("ai", Category::Ai)
            .field(
                FieldSpec::new("apiKey", FieldKind::Text)
                    .env("OPENAI_API_KEY")
                    .sensitive(),
            )
            .field(
                FieldSpec::new("model", FieldKind::Text)
                    .env("OPENAI_MODEL")
                    .default_value(json!("gpt-4o-mini")),
            )
            .field(
                FieldSpec::new("baseUrl", FieldKind::Url)
                    .env("OPENAI_BASE_URL")
                    .default_value(json!("https://api.openai.com/v1")),
            ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_keys() {
        let registry = SchemaRegistry::builtin();
        let keys: Vec<&str> = registry.keys().collect();
        assert_eq!(keys, vec!["ai", "analytics", "maps", "sms", "storage", "stripe"]);
    }

    #[test]
    fn test_analytics_email_fields() {
        let registry = SchemaRegistry::builtin();
        let analytics = registry.get("analytics").unwrap();
        assert_eq!(analytics.category, Category::Analytics);
        assert_eq!(analytics.sensitive_paths(), vec!["emailService.password"]);

        let host = analytics.field_spec("emailService.host").unwrap();
        assert_eq!(host.env_var.as_deref(), Some("EMAIL_HOST"));
        assert_eq!(host.default, json!("smtp.gmail.com"));

        let port = analytics.field_spec("emailService.port").unwrap();
        assert_eq!(port.kind, FieldKind::Port);
        assert_eq!(port.default, json!(587));

        let secure = analytics.field_spec("emailService.secure").unwrap();
        assert_eq!(secure.default, json!(false));

        let from = analytics.field_spec("emailService.from").unwrap();
        assert_eq!(from.default, json!("noreply@pawfectmatch.com"));
    }

    #[test]
    fn test_stripe_secrets() {
        let registry = SchemaRegistry::builtin();
        let mut paths = registry.get("stripe").unwrap().sensitive_paths();
        paths.sort();
        assert_eq!(paths, vec!["secretKey", "webhookSecret"]);
    }

    #[test]
    fn test_register_custom_schema() {
        let registry = SchemaRegistry::empty().with(
            SubsystemSchema::new("push", Category::Other)
                .field(FieldSpec::new("serverKey", FieldKind::Text).sensitive()),
        );
        assert!(registry.get("analytics").is_none());
        assert_eq!(
            registry.get("push").unwrap().sensitive_paths(),
            vec!["serverKey"]
        );
    }
}
