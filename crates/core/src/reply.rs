//! Schema-validated parsing of structured model replies.
//!
//! The model is asked to answer with a bare JSON object whose keys are
//! fixed by a [`Schema`]. Nothing guarantees that it does, so every reply
//! goes through [`parse`], which either produces a fully typed
//! [`StructuredReply`] or fails with a [`MalformedReplyError`] naming what
//! is wrong. There is no best-effort recovery.

use std::fmt::{self, Display};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// The set of keys a reply must carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Schema {
    /// `response`, `continue_chatting`
    Chat,
    /// `response`, `continue_chatting`, `score`, `distribution`
    ScoredChat,
    /// `question`, `continue_chatting`
    Question,
    /// `summary`, `continue_chatting`
    Summary,
}

/// A key declared by a schema.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub ty: FieldType,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldType {
    String,
    Bool,
    Number,
}

impl FieldType {
    fn matches(self, value: &Value) -> bool {
        match self {
            FieldType::String => value.is_string(),
            FieldType::Bool => value.is_boolean(),
            FieldType::Number => value.is_number(),
        }
    }
}

impl Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::String => write!(f, "string"),
            FieldType::Bool => write!(f, "boolean"),
            FieldType::Number => write!(f, "number"),
        }
    }
}

const fn field(name: &'static str, ty: FieldType) -> Field {
    Field { name, ty }
}

const CHAT_FIELDS: &[Field] = &[
    field("response", FieldType::String),
    field("continue_chatting", FieldType::Bool),
];
const SCORED_CHAT_FIELDS: &[Field] = &[
    field("response", FieldType::String),
    field("continue_chatting", FieldType::Bool),
    field("score", FieldType::Number),
    field("distribution", FieldType::Number),
];
const QUESTION_FIELDS: &[Field] = &[
    field("question", FieldType::String),
    field("continue_chatting", FieldType::Bool),
];
const SUMMARY_FIELDS: &[Field] = &[
    field("summary", FieldType::String),
    field("continue_chatting", FieldType::Bool),
];

impl Schema {
    /// Returns the declared keys, in the order they are validated.
    #[inline]
    pub fn fields(self) -> &'static [Field] {
        match self {
            Schema::Chat => CHAT_FIELDS,
            Schema::ScoredChat => SCORED_CHAT_FIELDS,
            Schema::Question => QUESTION_FIELDS,
            Schema::Summary => SUMMARY_FIELDS,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChatReply {
    pub response: String,
    pub continue_chatting: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScoredChatReply {
    pub response: String,
    pub continue_chatting: bool,
    /// Expected to lie in `[50, 100]`; not enforced.
    pub score: f64,
    /// Expected to lie in `[0.33, 0.67]`; not enforced.
    pub distribution: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QuestionReply {
    pub question: String,
    pub continue_chatting: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SummaryReply {
    pub summary: String,
    pub continue_chatting: bool,
}

/// A parsed reply, tagged by the schema it was validated against.
#[derive(Clone, Debug, PartialEq)]
pub enum StructuredReply {
    Chat(ChatReply),
    ScoredChat(ScoredChatReply),
    Question(QuestionReply),
    Summary(SummaryReply),
}

impl StructuredReply {
    #[inline]
    pub fn schema(&self) -> Schema {
        match self {
            StructuredReply::Chat(_) => Schema::Chat,
            StructuredReply::ScoredChat(_) => Schema::ScoredChat,
            StructuredReply::Question(_) => Schema::Question,
            StructuredReply::Summary(_) => Schema::Summary,
        }
    }

    /// Returns the field meant to be shown to the user.
    #[inline]
    pub fn text(&self) -> &str {
        match self {
            StructuredReply::Chat(r) => &r.response,
            StructuredReply::ScoredChat(r) => &r.response,
            StructuredReply::Question(r) => &r.question,
            StructuredReply::Summary(r) => &r.summary,
        }
    }

    /// Returns the control fields that decide how the conversation goes on.
    pub fn signal(&self) -> ContinuationSignal {
        match self {
            StructuredReply::Chat(r) => {
                ContinuationSignal::new(r.continue_chatting)
            }
            StructuredReply::ScoredChat(r) => ContinuationSignal {
                continue_chatting: r.continue_chatting,
                score: Some(r.score),
                distribution: Some(r.distribution),
            },
            StructuredReply::Question(r) => {
                ContinuationSignal::new(r.continue_chatting)
            }
            StructuredReply::Summary(r) => {
                ContinuationSignal::new(r.continue_chatting)
            }
        }
    }
}

/// The decision carried by a reply about whether the conversation goes on.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ContinuationSignal {
    pub continue_chatting: bool,
    pub score: Option<f64>,
    pub distribution: Option<f64>,
}

impl ContinuationSignal {
    #[inline]
    pub fn new(continue_chatting: bool) -> Self {
        Self {
            continue_chatting,
            score: None,
            distribution: None,
        }
    }
}

/// Why a reply was rejected.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MalformedReason {
    InvalidJson(String),
    NotAnObject,
    MissingKey(&'static str),
    InvalidType {
        key: &'static str,
        expected: FieldType,
    },
    UnexpectedKey(String),
}

impl Display for MalformedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MalformedReason::InvalidJson(err) => {
                write!(f, "invalid JSON: {err}")
            }
            MalformedReason::NotAnObject => write!(f, "not a JSON object"),
            MalformedReason::MissingKey(key) => {
                write!(f, "missing key `{key}`")
            }
            MalformedReason::InvalidType { key, expected } => {
                write!(f, "key `{key}` is not a {expected}")
            }
            MalformedReason::UnexpectedKey(key) => {
                write!(f, "unexpected key `{key}`")
            }
        }
    }
}

/// The model output does not match the expected schema.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("malformed model reply ({reason})")]
pub struct MalformedReplyError {
    raw: String,
    reason: MalformedReason,
}

impl MalformedReplyError {
    fn new(raw: &str, reason: MalformedReason) -> Self {
        Self {
            raw: raw.to_owned(),
            reason,
        }
    }

    /// Returns the model output as received.
    #[inline]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    #[inline]
    pub fn reason(&self) -> &MalformedReason {
        &self.reason
    }

    /// Returns the missing, mistyped or unexpected key, if the failure is
    /// about a specific key.
    pub fn key(&self) -> Option<&str> {
        match &self.reason {
            MalformedReason::MissingKey(key) => Some(key),
            MalformedReason::InvalidType { key, .. } => Some(key),
            MalformedReason::UnexpectedKey(key) => Some(key),
            MalformedReason::InvalidJson(_) | MalformedReason::NotAnObject => {
                None
            }
        }
    }
}

/// Parses a raw model output against `schema`.
pub fn parse(
    raw: &str,
    schema: Schema,
) -> Result<StructuredReply, MalformedReplyError> {
    let value = serde_json::from_str::<Value>(raw).map_err(|err| {
        MalformedReplyError::new(
            raw,
            MalformedReason::InvalidJson(err.to_string()),
        )
    })?;
    let Value::Object(map) = value else {
        return Err(MalformedReplyError::new(
            raw,
            MalformedReason::NotAnObject,
        ));
    };
    validate(raw, &map, schema.fields())?;

    let value = Value::Object(map);
    let reply = match schema {
        Schema::Chat => StructuredReply::Chat(decode(raw, value)?),
        Schema::ScoredChat => {
            StructuredReply::ScoredChat(decode(raw, value)?)
        }
        Schema::Question => StructuredReply::Question(decode(raw, value)?),
        Schema::Summary => StructuredReply::Summary(decode(raw, value)?),
    };
    Ok(reply)
}

fn validate(
    raw: &str,
    map: &Map<String, Value>,
    fields: &[Field],
) -> Result<(), MalformedReplyError> {
    for field in fields {
        let Some(value) = map.get(field.name) else {
            return Err(MalformedReplyError::new(
                raw,
                MalformedReason::MissingKey(field.name),
            ));
        };
        if !field.ty.matches(value) {
            return Err(MalformedReplyError::new(
                raw,
                MalformedReason::InvalidType {
                    key: field.name,
                    expected: field.ty,
                },
            ));
        }
    }
    if let Some(extra) = map
        .keys()
        .find(|key| !fields.iter().any(|field| field.name == key.as_str()))
    {
        return Err(MalformedReplyError::new(
            raw,
            MalformedReason::UnexpectedKey(extra.clone()),
        ));
    }
    Ok(())
}

fn decode<T: DeserializeOwned>(
    raw: &str,
    value: Value,
) -> Result<T, MalformedReplyError> {
    serde_json::from_value(value).map_err(|err| {
        MalformedReplyError::new(
            raw,
            MalformedReason::InvalidJson(err.to_string()),
        )
    })
}
