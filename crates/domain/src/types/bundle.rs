//! Lane items, bundles and the client-to-server wire format.
//!
//! A lane buffer holds [`LaneItem`]s. Bundle assembly turns one or more items
//! into a [`Bundle`], which is sent as a [`WireBundle`]:
//! `{ "<priority>": "<ciphertext>" }` or, with encryption bypassed,
//! `{ "<priority>": [event, ...] }`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::event::Event;
use super::lane::PriorityLane;
use crate::errors::Result;
use crate::impl_domain_status_conversions;

/// Whether a body is still plaintext or already sealed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextType {
    Plain,
    Cipher,
}

impl_domain_status_conversions!(TextType {
    Plain => "plain",
    Cipher => "cipher",
});

/// Payload of a lane item or bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BundleBody {
    /// One sealed string holding a JSON array of events.
    Cipher(String),
    /// Events not yet sealed.
    Plain(Vec<Event>),
}

impl BundleBody {
    pub fn text_type(&self) -> TextType {
        match self {
            Self::Cipher(_) => TextType::Cipher,
            Self::Plain(_) => TextType::Plain,
        }
    }

    /// Number of events carried. A sealed body counts as one unit.
    pub fn event_count(&self) -> usize {
        match self {
            Self::Cipher(_) => 1,
            Self::Plain(events) => events.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Cipher(text) => text.is_empty(),
            Self::Plain(events) => events.is_empty(),
        }
    }
}

/// One entry in a client lane buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaneItem {
    pub body: BundleBody,
    #[serde(default)]
    pub retry_count: u32,
}

impl LaneItem {
    /// A freshly collected event.
    pub fn fresh(event: Event) -> Self {
        Self { body: BundleBody::Plain(vec![event]), retry_count: 0 }
    }

    /// Data a producer already sealed itself.
    pub fn sealed(ciphertext: impl Into<String>) -> Self {
        Self { body: BundleBody::Cipher(ciphertext.into()), retry_count: 0 }
    }

    /// Items that must travel as their own bundle: sealed bodies, retries, and
    /// previously assembled multi-event bodies.
    pub fn is_standalone(&self) -> bool {
        self.retry_count > 0
            || match &self.body {
                BundleBody::Cipher(_) => true,
                BundleBody::Plain(events) => events.len() > 1,
            }
    }
}

/// A batch of items from one lane sent in a single transport call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bundle {
    pub lane: PriorityLane,
    pub body: BundleBody,
    #[serde(default)]
    pub retry_count: u32,
}

impl Bundle {
    pub fn new(lane: PriorityLane, body: BundleBody) -> Self {
        Self { lane, body, retry_count: 0 }
    }

    /// Bundle built from a single standalone lane item.
    pub fn from_item(lane: PriorityLane, item: LaneItem) -> Self {
        Self { lane, body: item.body, retry_count: item.retry_count }
    }

    /// Convert back into a lane item, keeping the retry count.
    pub fn into_item(self) -> LaneItem {
        LaneItem { body: self.body, retry_count: self.retry_count }
    }

    pub fn text_type(&self) -> TextType {
        self.body.text_type()
    }

    pub fn to_wire(&self) -> WireBundle {
        WireBundle::single(self.lane, self.body.clone())
    }
}

/// Request body of one transport call, keyed by lane priority number.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WireBundle(pub BTreeMap<String, BundleBody>);

impl WireBundle {
    pub fn single(lane: PriorityLane, body: BundleBody) -> Self {
        let mut map = BTreeMap::new();
        map.insert(lane.wire_key(), body);
        Self(map)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Lane sections in priority order. Fails on any key that is not a known
    /// lane number.
    pub fn sections(&self) -> Result<Vec<(PriorityLane, &BundleBody)>> {
        let mut sections = self
            .0
            .iter()
            .map(|(key, body)| PriorityLane::from_wire_key(key).map(|lane| (lane, body)))
            .collect::<Result<Vec<_>>>()?;
        sections.sort_by_key(|(lane, _)| *lane);
        Ok(sections)
    }
}
