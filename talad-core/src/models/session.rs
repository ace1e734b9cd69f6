//! One trading day's commentary document.
//!
//! A `SessionRecord` always carries exactly four slots — morning open/close,
//! afternoon open/close — any of which may be empty. Slot presence is
//! independent; a document holding only morning data is a normal state while
//! the trading day is in progress.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Morning or afternoon trading session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionHalf {
    Morning,
    Afternoon,
}

/// The four session slots of a trading day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotName {
    MorningOpen,
    MorningClose,
    AfternoonOpen,
    AfternoonClose,
}

impl SlotName {
    pub const ALL: [SlotName; 4] = [
        SlotName::MorningOpen,
        SlotName::MorningClose,
        SlotName::AfternoonOpen,
        SlotName::AfternoonClose,
    ];

    pub fn half(&self) -> SessionHalf {
        match self {
            SlotName::MorningOpen | SlotName::MorningClose => SessionHalf::Morning,
            SlotName::AfternoonOpen | SlotName::AfternoonClose => SessionHalf::Afternoon,
        }
    }

    /// Open slots carry highlights and an "Analysis" narrative; close slots
    /// carry a "Summary" narrative and no highlights.
    pub fn is_open(&self) -> bool {
        matches!(self, SlotName::MorningOpen | SlotName::AfternoonOpen)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SlotName::MorningOpen => "morning_open",
            SlotName::MorningClose => "morning_close",
            SlotName::AfternoonOpen => "afternoon_open",
            SlotName::AfternoonClose => "afternoon_close",
        }
    }
}

impl fmt::Display for SlotName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SlotName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "morning_open" => Ok(SlotName::MorningOpen),
            "morning_close" => Ok(SlotName::MorningClose),
            "afternoon_open" => Ok(SlotName::AfternoonOpen),
            "afternoon_close" => Ok(SlotName::AfternoonClose),
            other => Err(format!("unknown session slot: {}", other)),
        }
    }
}

/// One session slot: the index level, the signed change from the prior
/// reference point, the compact sector-highlights string (open slots only),
/// and the narrative fragment for display.
///
/// `index`/`change` are unset until the slot's data has been submitted.
/// The sign of `change` is significant and round-trips through the markdown
/// codec (`+16.49` vs `-7.69`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionSlot {
    pub index: Option<f64>,
    pub change: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highlights: Option<String>,
    #[serde(default)]
    pub narrative: String,
}

impl SessionSlot {
    pub fn is_empty(&self) -> bool {
        self.index.is_none()
            && self.change.is_none()
            && self.highlights.is_none()
            && self.narrative.is_empty()
    }
}

/// A partial update for one slot, as submitted by the admin client.
/// Numeric fields are always caller-supplied, never fabricated.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotUpdate {
    pub index: f64,
    pub change: f64,
    pub highlights: Option<String>,
    pub narrative: Option<String>,
}

/// One trading day's document: four slots keyed by date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub date: NaiveDate,
    pub morning_open: SessionSlot,
    pub morning_close: SessionSlot,
    pub afternoon_open: SessionSlot,
    pub afternoon_close: SessionSlot,
}

impl SessionRecord {
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            morning_open: SessionSlot::default(),
            morning_close: SessionSlot::default(),
            afternoon_open: SessionSlot::default(),
            afternoon_close: SessionSlot::default(),
        }
    }

    pub fn slot(&self, name: SlotName) -> &SessionSlot {
        match name {
            SlotName::MorningOpen => &self.morning_open,
            SlotName::MorningClose => &self.morning_close,
            SlotName::AfternoonOpen => &self.afternoon_open,
            SlotName::AfternoonClose => &self.afternoon_close,
        }
    }

    pub fn slot_mut(&mut self, name: SlotName) -> &mut SessionSlot {
        match name {
            SlotName::MorningOpen => &mut self.morning_open,
            SlotName::MorningClose => &mut self.morning_close,
            SlotName::AfternoonOpen => &mut self.afternoon_open,
            SlotName::AfternoonClose => &mut self.afternoon_close,
        }
    }

    /// Merge an update into one slot, leaving the other three untouched.
    /// Highlights and narrative are only overwritten when supplied.
    pub fn apply(&mut self, name: SlotName, update: &SlotUpdate) {
        let slot = self.slot_mut(name);
        slot.index = Some(update.index);
        slot.change = Some(update.change);
        if let Some(h) = &update.highlights {
            slot.highlights = Some(h.clone());
        }
        if let Some(n) = &update.narrative {
            slot.narrative = n.clone();
        }
    }

    pub fn slots_filled(&self) -> i16 {
        SlotName::ALL
            .iter()
            .filter(|name| self.slot(**name).index.is_some())
            .count() as i16
    }

    pub fn is_empty(&self) -> bool {
        SlotName::ALL.iter().all(|name| self.slot(*name).is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 11).unwrap()
    }

    #[test]
    fn empty_record_has_four_empty_slots() {
        let record = SessionRecord::empty(date());
        assert!(record.is_empty());
        assert_eq!(record.slots_filled(), 0);
        for name in SlotName::ALL {
            assert!(record.slot(name).is_empty());
        }
    }

    #[test]
    fn apply_touches_only_the_named_slot() {
        let mut record = SessionRecord::empty(date());
        record.apply(
            SlotName::MorningOpen,
            &SlotUpdate {
                index: 1302.75,
                change: 16.49,
                highlights: Some("*BANK +68 ENERG +61*".to_string()),
                narrative: None,
            },
        );

        assert_eq!(record.morning_open.index, Some(1302.75));
        assert_eq!(record.morning_open.change, Some(16.49));
        assert!(record.morning_close.is_empty());
        assert!(record.afternoon_open.is_empty());
        assert!(record.afternoon_close.is_empty());
        assert_eq!(record.slots_filled(), 1);
    }

    #[test]
    fn apply_keeps_existing_narrative_when_update_has_none() {
        let mut record = SessionRecord::empty(date());
        record.morning_open.narrative = "Earlier analysis.".to_string();
        record.apply(
            SlotName::MorningOpen,
            &SlotUpdate {
                index: 1290.0,
                change: -5.2,
                highlights: None,
                narrative: None,
            },
        );
        assert_eq!(record.morning_open.narrative, "Earlier analysis.");
    }

    #[test]
    fn slot_name_round_trips_through_str() {
        for name in SlotName::ALL {
            assert_eq!(name.as_str().parse::<SlotName>().unwrap(), name);
        }
        assert!("midday_open".parse::<SlotName>().is_err());
    }
}
