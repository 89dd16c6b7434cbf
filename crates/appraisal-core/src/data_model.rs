//! Data Model: Record, CardItem, Stakeholders, ReviewVerdict
use crate::error::RecordError;
use serde::de::Error as _;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_yaml::{Mapping, Value};

pub const GOALS_KEY: &str = "Goal(s)";
pub const ATTRIBUTES_KEY: &str = "Attribute(s)";
pub const FEED_FORWARD_KEY: &str = "FeedForward";
pub const STAKEHOLDERS_KEY: &str = "stakeholders";

/// Semantic class of a record, derived from its single top-level key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordKind {
    Goals,
    Attributes,
    FeedForward,
    Other(String),
}

impl RecordKind {
    pub fn from_key(key: &str) -> Self {
        match key {
            GOALS_KEY => Self::Goals,
            ATTRIBUTES_KEY => Self::Attributes,
            FEED_FORWARD_KEY => Self::FeedForward,
            other => Self::Other(other.to_string()),
        }
    }

    /// Goal and attribute tabs are the ones that receive comments.
    pub fn is_appraisal_tab(&self) -> bool {
        matches!(self, Self::Goals | Self::Attributes)
    }
}

/// A mapping with exactly one top-level key.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    key: String,
    value: Value,
}

impl Record {
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }

    pub fn with_cards(key: impl Into<String>, cards: &[CardItem]) -> Result<Self, RecordError> {
        let key = key.into();
        let value = serde_yaml::to_value(cards).map_err(|e| RecordError::NotCards {
            key: key.clone(),
            reason: e.to_string(),
        })?;
        Ok(Self { key, value })
    }

    pub fn from_mapping(mapping: Mapping) -> Result<Self, RecordError> {
        if mapping.len() != 1 {
            return Err(RecordError::KeyCount(mapping.len()));
        }
        let Some((key, value)) = mapping.into_iter().next() else {
            return Err(RecordError::KeyCount(0));
        };
        match key {
            Value::String(key) => Ok(Self { key, value }),
            _ => Err(RecordError::NonStringKey),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn kind(&self) -> RecordKind {
        RecordKind::from_key(&self.key)
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    /// Card items under the key. A `null` value is an empty tab.
    pub fn cards(&self) -> Result<Vec<CardItem>, RecordError> {
        if self.value.is_null() {
            return Ok(Vec::new());
        }
        serde_yaml::from_value(self.value.clone()).map_err(|e| RecordError::NotCards {
            key: self.key.clone(),
            reason: e.to_string(),
        })
    }

    pub fn set_cards(&mut self, cards: &[CardItem]) -> Result<(), RecordError> {
        self.value = Self::with_cards(self.key.clone(), cards)?.value;
        Ok(())
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.key, &self.value)?;
        map.end()
    }
}

impl<'de> Deserialize<'de> for Record {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mapping = Mapping::deserialize(deserializer)?;
        Record::from_mapping(mapping).map_err(D::Error::custom)
    }
}

/// One goal or attribute card under appraisal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardItem {
    #[serde(rename = "cardNo", default, skip_serializing_if = "Option::is_none")]
    pub card_no: Option<u32>,
    #[serde(rename = "cardHeading")]
    pub card_heading: String,
    #[serde(rename = "cardText", default)]
    pub card_text: String,
    #[serde(rename = "previousmessages", default)]
    pub previous_messages: Vec<Message>,
    #[serde(rename = "cardattributes", default)]
    pub card_attributes: Mapping,
    /// Fields the scraper adds that this crate does not interpret.
    #[serde(flatten)]
    pub extra: Mapping,
    #[serde(rename = "cardComment", default, skip_serializing_if = "Option::is_none")]
    pub card_comment: Option<CardComment>,
}

impl CardItem {
    pub fn new(heading: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            card_no: None,
            card_heading: heading.into(),
            card_text: text.into(),
            previous_messages: Vec::new(),
            card_attributes: Mapping::new(),
            extra: Mapping::new(),
            card_comment: None,
        }
    }

    /// Latest turn that actually carries an author or a body.
    pub fn latest_turn(&self) -> Option<&Message> {
        self.previous_messages
            .iter()
            .rev()
            .find(|message| !message.is_placeholder())
    }
}

/// One turn of the conversation already on the card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "messageBy")]
    pub message_by: Option<String>,
    #[serde(rename = "messageBody")]
    pub message_body: Option<String>,
}

impl Message {
    pub fn new(by: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            message_by: Some(by.into()),
            message_body: Some(body.into()),
        }
    }

    /// The scraper writes `{messageBy: null, messageBody: null}` for cards
    /// without any conversation.
    pub fn is_placeholder(&self) -> bool {
        let blank = |field: &Option<String>| field.as_deref().map_or(true, |s| s.trim().is_empty());
        blank(&self.message_by) && blank(&self.message_body)
    }
}

/// Drafted comment attached to a card by the generation stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardComment {
    pub comment: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stakeholder {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Role", default)]
    pub role: String,
    #[serde(rename = "EmpID", default)]
    pub emp_id: String,
}

/// Stakeholder list from the `users_dict` file. The associate comes first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Stakeholders(pub Vec<Stakeholder>);

impl Stakeholders {
    pub fn from_record(record: &Record) -> Result<Self, RecordError> {
        serde_yaml::from_value(record.value().clone()).map_err(|e| RecordError::NotCards {
            key: record.key().to_string(),
            reason: e.to_string(),
        })
    }

    pub fn associate(&self) -> Option<&Stakeholder> {
        self.0.first()
    }
}

/// Advisory outcome of reviewing one drafted comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewVerdict {
    pub tab: String,
    #[serde(rename = "cardNo", default, skip_serializing_if = "Option::is_none")]
    pub card_no: Option<u32>,
    #[serde(rename = "cardHeading")]
    pub card_heading: String,
    pub original_comment: String,
    /// The associate already had the last word on this card.
    pub must_be_empty: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<ReviewSuggestion>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewSuggestion {
    pub comment_changed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason_for_change: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_comment: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const GOALS_YAML: &str = r#"
Goal(s):
- cardNo: 0
  cardHeading: Delivery
  cardText: Ship X by Q3
  previousmessages:
  - messageBy: null
    messageBody: null
  cardattributes:
    Weightage: '40'
    Status: In Progress
"#;

    #[test]
    fn test_record_kind_from_key() {
        assert_eq!(RecordKind::from_key("Goal(s)"), RecordKind::Goals);
        assert_eq!(RecordKind::from_key("Attribute(s)"), RecordKind::Attributes);
        assert_eq!(RecordKind::from_key("FeedForward"), RecordKind::FeedForward);
        assert_eq!(
            RecordKind::from_key("settings"),
            RecordKind::Other("settings".to_string())
        );
        assert!(RecordKind::Goals.is_appraisal_tab());
        assert!(!RecordKind::FeedForward.is_appraisal_tab());
    }

    #[test]
    fn test_record_parses_cards() {
        let record: Record = serde_yaml::from_str(GOALS_YAML).unwrap();
        assert_eq!(record.kind(), RecordKind::Goals);

        let cards = record.cards().unwrap();
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].card_no, Some(0));
        assert_eq!(cards[0].card_heading, "Delivery");
        assert!(cards[0].previous_messages[0].is_placeholder());
        assert!(cards[0].latest_turn().is_none());
        assert!(cards[0].card_comment.is_none());
    }

    #[test]
    fn test_card_attributes_keep_order() {
        let record: Record = serde_yaml::from_str(GOALS_YAML).unwrap();
        let cards = record.cards().unwrap();
        let keys: Vec<&str> = cards[0]
            .card_attributes
            .keys()
            .filter_map(|k| k.as_str())
            .collect();
        assert_eq!(keys, vec!["Weightage", "Status"]);
    }

    #[test]
    fn test_record_rejects_multiple_keys() {
        let err = serde_yaml::from_str::<Record>("a: 1\nb: 2\n").unwrap_err();
        assert!(err.to_string().contains("exactly one top-level key"));
    }

    #[test]
    fn test_card_comment_serialized_last() {
        let mut card = CardItem::new("Delivery", "Ship X by Q3");
        card.card_comment = Some(CardComment {
            comment: "Shipped X on time".to_string(),
            reason: Some("met deadline".to_string()),
        });
        let yaml = serde_yaml::to_string(&card).unwrap();
        let heading = yaml.find("cardHeading").unwrap();
        let comment = yaml.find("cardComment").unwrap();
        assert!(heading < comment);
        assert!(!yaml.contains("cardNo"));
    }

    #[test]
    fn test_unknown_card_fields_survive() {
        let yaml = "cardHeading: Quality\ncardText: Zero defects\ncardOwner: team-a\n";
        let card: CardItem = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            card.extra.get("cardOwner").and_then(|v| v.as_str()),
            Some("team-a")
        );
        let back = serde_yaml::to_string(&card).unwrap();
        assert!(back.contains("cardOwner: team-a"));
    }

    #[test]
    fn test_latest_turn_skips_placeholders() {
        let mut card = CardItem::new("Delivery", "Ship X by Q3");
        card.previous_messages = vec![
            Message::new("Jane Doe", "Shipped the first milestone"),
            Message {
                message_by: None,
                message_body: None,
            },
        ];
        assert_eq!(
            card.latest_turn().and_then(|m| m.message_by.as_deref()),
            Some("Jane Doe")
        );
    }

    #[test]
    fn test_stakeholders_associate_first() {
        let record: Record = serde_yaml::from_str(
            "stakeholders:\n- Name: Jane Doe\n  Role: Associate\n  EmpID: '101'\n- Name: Sam Roe\n  Role: Supervisor\n  EmpID: '7'\n",
        )
        .unwrap();
        let stakeholders = Stakeholders::from_record(&record).unwrap();
        assert_eq!(stakeholders.associate().unwrap().name, "Jane Doe");
        assert_eq!(stakeholders.0.len(), 2);
    }
}
