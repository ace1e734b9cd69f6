//! Session-aware markdown codec.
//!
//! One markdown file holds one trading day. Two heading dialects exist in the
//! archive: the legacy `### Open Set` / `### Close Set` headings and the
//! current `### Market Opening Data` / `### Market Closing Data` headings,
//! both nested under `## Morning Session` / `## Afternoon Session`. The
//! parser recognizes headings through a rule table evaluated per section, so
//! mixed-dialect documents parse deterministically and a third dialect is an
//! additive table entry.
//!
//! `render` always emits the current dialect for new documents. `merge_slot`
//! edits an existing document in place: only the targeted slot's numeric line
//! (and narrative, when supplied) is replaced, and every unrelated byte of
//! the document survives, including legacy headings and AI-authored prose.

use chrono::NaiveDate;
use regex::Regex;

use crate::error::TaladError;
use crate::models::{SessionHalf, SessionRecord, SessionSlot, SlotName, SlotUpdate};

const HIGHLIGHTS_LABEL: &str = "Highlights:";
const DATA_LABEL: &str = "SET Index";

/// Heading rule table: section heading text to section kind. Both dialects
/// live in the same table; the parser never needs to know which dialect the
/// rest of the document uses.
const SECTION_RULES: &[(&str, SectionKind)] = &[
    // legacy dialect
    ("Open Set", SectionKind::OpenData),
    ("Close Set", SectionKind::CloseData),
    // current dialect
    ("Market Opening Data", SectionKind::OpenData),
    ("Market Closing Data", SectionKind::CloseData),
    // narrative headings shared by both dialects
    ("Open Analysis", SectionKind::OpenNarrative),
    ("Close Summary", SectionKind::CloseNarrative),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SectionKind {
    OpenData,
    OpenNarrative,
    CloseData,
    CloseNarrative,
}

impl SectionKind {
    fn is_data(&self) -> bool {
        matches!(self, SectionKind::OpenData | SectionKind::CloseData)
    }

    fn slot_for(&self, half: SessionHalf) -> SlotName {
        let open = matches!(self, SectionKind::OpenData | SectionKind::OpenNarrative);
        match (half, open) {
            (SessionHalf::Morning, true) => SlotName::MorningOpen,
            (SessionHalf::Morning, false) => SlotName::MorningClose,
            (SessionHalf::Afternoon, true) => SlotName::AfternoonOpen,
            (SessionHalf::Afternoon, false) => SlotName::AfternoonClose,
        }
    }
}

fn section_rule(heading: &str) -> Option<SectionKind> {
    SECTION_RULES
        .iter()
        .find(|(text, _)| *text == heading)
        .map(|(_, kind)| *kind)
}

fn half_for_heading(heading: &str) -> Option<SessionHalf> {
    match heading {
        "Morning Session" => Some(SessionHalf::Morning),
        "Afternoon Session" => Some(SessionHalf::Afternoon),
        _ => None,
    }
}

fn half_title(half: SessionHalf) -> &'static str {
    match half {
        SessionHalf::Morning => "Morning Session",
        SessionHalf::Afternoon => "Afternoon Session",
    }
}

fn data_heading(slot: SlotName) -> &'static str {
    if slot.is_open() {
        "### Market Opening Data"
    } else {
        "### Market Closing Data"
    }
}

fn narrative_heading(slot: SlotName) -> &'static str {
    if slot.is_open() {
        "### Open Analysis"
    } else {
        "### Close Summary"
    }
}

// ============================================================================
// Document layout
// ============================================================================

#[derive(Debug, Clone)]
struct SectionSpan {
    kind: SectionKind,
    body_start: usize,
    body_end: usize,
}

#[derive(Debug, Clone)]
struct HalfSpan {
    half: SessionHalf,
    heading_line: usize,
    end: usize,
    sections: Vec<SectionSpan>,
}

#[derive(Debug, Clone, Copy)]
enum HeadingEvent {
    Half(SessionHalf),
    Section(SectionKind),
    /// An `##` heading that is not a session heading ends the current
    /// session's scope.
    UnknownH2,
    /// Any other heading (`#`, `####`, unknown `###`) only terminates the
    /// current section body.
    Other,
}

/// Single pass over the document computing session-half spans and the
/// section spans inside them. Content before the first recognized heading
/// and under unknown headings belongs to no section.
fn layout<S: AsRef<str>>(lines: &[S]) -> Vec<HalfSpan> {
    let mut events: Vec<(usize, HeadingEvent)> = Vec::new();
    for (line_no, raw) in lines.iter().enumerate() {
        let trimmed = raw.as_ref().trim_start();
        if !trimmed.starts_with('#') {
            continue;
        }
        let event = if let Some(rest) = trimmed.strip_prefix("### ") {
            match section_rule(rest.trim()) {
                Some(kind) => HeadingEvent::Section(kind),
                None => HeadingEvent::Other,
            }
        } else if let Some(rest) = trimmed.strip_prefix("## ") {
            match half_for_heading(rest.trim()) {
                Some(half) => HeadingEvent::Half(half),
                None => HeadingEvent::UnknownH2,
            }
        } else {
            HeadingEvent::Other
        };
        events.push((line_no, event));
    }

    let mut halves: Vec<HalfSpan> = Vec::new();
    for (pos, (line_no, event)) in events.iter().enumerate() {
        if let HeadingEvent::Half(half) = event {
            let end = events[pos + 1..]
                .iter()
                .find(|(_, e)| matches!(e, HeadingEvent::Half(_) | HeadingEvent::UnknownH2))
                .map(|(n, _)| *n)
                .unwrap_or(lines.len());
            halves.push(HalfSpan {
                half: *half,
                heading_line: *line_no,
                end,
                sections: Vec::new(),
            });
        }
    }

    for (pos, (line_no, event)) in events.iter().enumerate() {
        if let HeadingEvent::Section(kind) = event {
            let owner = halves
                .iter_mut()
                .find(|h| h.heading_line < *line_no && *line_no < h.end);
            if let Some(half) = owner {
                let next_heading = events[pos + 1..]
                    .iter()
                    .map(|(n, _)| *n)
                    .next()
                    .unwrap_or(lines.len());
                half.sections.push(SectionSpan {
                    kind: *kind,
                    body_start: line_no + 1,
                    body_end: next_heading.min(half.end),
                });
            }
        }
    }

    halves
}

// ============================================================================
// Codec
// ============================================================================

pub struct MarkdownCodec {
    /// `<label>: <number> (<signed-number>)` with optional sign and optional
    /// fraction on both numbers. Deliberately permissive: no precision bound,
    /// and trailing text after the closing parenthesis is left alone.
    data_line: Regex,
}

impl Default for MarkdownCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkdownCodec {
    pub fn new() -> Self {
        Self {
            data_line: Regex::new(r"^([^:\n]*):\s*([+-]?\d+(?:\.\d+)?)\s*\(([+-]?\d+(?:\.\d+)?)\)")
                .expect("data line regex"),
        }
    }

    // ------------------------------------------------------------------------
    // Parse
    // ------------------------------------------------------------------------

    /// Parse a day's markdown into a `SessionRecord`.
    ///
    /// A section whose numeric line is missing or unparsable leaves its slot's
    /// numeric fields unset instead of failing the document; partial
    /// documents are the normal state while a trading day is in progress.
    /// Only a document with no recognized session heading at all is a
    /// `Parse` error, which callers degrade to an empty record so brand-new
    /// articles can still be created.
    pub fn parse(&self, date: NaiveDate, text: &str) -> Result<SessionRecord, TaladError> {
        let lines: Vec<&str> = text.lines().collect();
        let halves = layout(&lines);

        if halves.is_empty() {
            if text.trim().is_empty() {
                return Ok(SessionRecord::empty(date));
            }
            return Err(TaladError::Parse(format!(
                "no recognized session headings in document for {}",
                date
            )));
        }

        let mut record = SessionRecord::empty(date);
        for half in &halves {
            for section in &half.sections {
                let slot_name = section.kind.slot_for(half.half);
                let slot = record.slot_mut(slot_name);
                let body = &lines[section.body_start..section.body_end.min(lines.len())];
                if section.kind.is_data() {
                    self.parse_data_section(slot, slot_name, body);
                } else {
                    for line in body {
                        push_narrative_line(slot, line);
                    }
                }
            }
        }

        for name in SlotName::ALL {
            let slot = record.slot_mut(name);
            slot.narrative = slot.narrative.trim_end().to_string();
        }

        Ok(record)
    }

    fn parse_data_section(&self, slot: &mut SessionSlot, name: SlotName, body: &[&str]) {
        for line in body {
            if let Some(caps) = self.data_line.captures(line) {
                if slot.index.is_none() {
                    // Both captures already matched [+-]?\d+(\.\d+)?, so
                    // f64 parsing cannot fail here.
                    slot.index = caps[2].parse::<f64>().ok();
                    slot.change = caps[3].parse::<f64>().ok();
                }
            } else if let Some(rest) = line.trim_start().strip_prefix(HIGHLIGHTS_LABEL) {
                if name.is_open() {
                    slot.highlights = Some(rest.trim().to_string());
                } else if !line.trim().is_empty() {
                    push_narrative_line(slot, line);
                }
            } else if !line.trim().is_empty() {
                // Stray prose inside a data section still belongs to the
                // slot's narrative fragment.
                push_narrative_line(slot, line);
            }
        }
    }

    // ------------------------------------------------------------------------
    // Render
    // ------------------------------------------------------------------------

    /// Render a record as a fresh current-dialect document. Deterministic;
    /// sessions and sections appear only for slots that carry content.
    pub fn render(&self, record: &SessionRecord) -> String {
        let mut out = String::new();
        out.push_str(&format!("# SET Market Report: {}\n", record.date));

        for half in [SessionHalf::Morning, SessionHalf::Afternoon] {
            let (open_name, close_name) = match half {
                SessionHalf::Morning => (SlotName::MorningOpen, SlotName::MorningClose),
                SessionHalf::Afternoon => (SlotName::AfternoonOpen, SlotName::AfternoonClose),
            };
            let open = record.slot(open_name);
            let close = record.slot(close_name);
            if open.is_empty() && close.is_empty() {
                continue;
            }

            out.push('\n');
            out.push_str(&format!("## {}\n", half_title(half)));
            self.render_data_section(&mut out, open_name, open);
            self.render_narrative_section(&mut out, open_name, open);
            self.render_data_section(&mut out, close_name, close);
            self.render_narrative_section(&mut out, close_name, close);
        }

        out
    }

    fn render_data_section(&self, out: &mut String, name: SlotName, slot: &SessionSlot) {
        let has_numbers = slot.index.is_some() && slot.change.is_some();
        let has_highlights = name.is_open() && slot.highlights.is_some();
        if !has_numbers && !has_highlights {
            return;
        }

        out.push('\n');
        out.push_str(data_heading(name));
        out.push_str("\n\n");
        if let (Some(index), Some(change)) = (slot.index, slot.change) {
            out.push_str(&format_data_line(DATA_LABEL, index, change));
            out.push('\n');
        }
        if has_highlights {
            if let Some(highlights) = &slot.highlights {
                out.push_str(&format!("{} {}\n", HIGHLIGHTS_LABEL, highlights));
            }
        }
    }

    fn render_narrative_section(&self, out: &mut String, name: SlotName, slot: &SessionSlot) {
        if slot.narrative.is_empty() {
            return;
        }
        out.push('\n');
        out.push_str(narrative_heading(name));
        out.push_str("\n\n");
        out.push_str(&slot.narrative);
        out.push('\n');
    }

    // ------------------------------------------------------------------------
    // Merge
    // ------------------------------------------------------------------------

    /// Merge a slot update into the existing document text.
    ///
    /// Operates on the raw text, not a re-render: only the targeted slot's
    /// numeric line, highlights line, and (when supplied) narrative body are
    /// spliced; every other byte survives, which is what lets concurrent
    /// sibling-slot updates coexist and keeps legacy-dialect documents in
    /// their original dialect. Sections the document lacks are appended in
    /// the current dialect.
    pub fn merge_slot(
        &self,
        existing: &str,
        date: NaiveDate,
        slot: SlotName,
        update: &SlotUpdate,
    ) -> String {
        if existing.trim().is_empty() {
            let mut record = SessionRecord::empty(date);
            record.apply(slot, update);
            return self.render(&record);
        }

        let had_final_newline = existing.ends_with('\n');
        let mut lines: Vec<String> = existing.lines().map(|l| l.to_string()).collect();

        self.ensure_half(&mut lines, slot.half());
        self.merge_data(&mut lines, slot, update);
        if slot.is_open() {
            if let Some(highlights) = &update.highlights {
                self.merge_highlights(&mut lines, slot, highlights);
            }
        }
        if let Some(narrative) = &update.narrative {
            self.merge_narrative(&mut lines, slot, narrative);
        }

        let mut out = lines.join("\n");
        if had_final_newline {
            out.push('\n');
        }
        out
    }

    fn ensure_half(&self, lines: &mut Vec<String>, half: SessionHalf) {
        if layout(lines).iter().any(|h| h.half == half) {
            return;
        }
        if !lines.last().map_or(true, |l| l.trim().is_empty()) {
            lines.push(String::new());
        }
        lines.push(format!("## {}", half_title(half)));
    }

    fn merge_data(&self, lines: &mut Vec<String>, slot: SlotName, update: &SlotUpdate) {
        let data_kind = if slot.is_open() {
            SectionKind::OpenData
        } else {
            SectionKind::CloseData
        };

        let section = self.find_section(lines, slot.half(), data_kind);
        match section {
            Some(section) => {
                let numeric = (section.body_start..section.body_end)
                    .find(|&i| self.data_line.is_match(&lines[i]));
                match numeric {
                    Some(i) => {
                        // Keep the document's own label so a legacy document
                        // stays in its dialect.
                        let label = self
                            .data_line
                            .captures(&lines[i])
                            .map(|c| c[1].to_string())
                            .unwrap_or_else(|| DATA_LABEL.to_string());
                        lines[i] = format_data_line(&label, update.index, update.change);
                    }
                    None => {
                        let at = (section.body_start..section.body_end)
                            .find(|&i| !lines[i].trim().is_empty())
                            .unwrap_or(section.body_end);
                        lines.insert(at, format_data_line(DATA_LABEL, update.index, update.change));
                    }
                }
            }
            None => {
                let mut body = vec![format_data_line(DATA_LABEL, update.index, update.change)];
                if slot.is_open() {
                    if let Some(highlights) = &update.highlights {
                        body.push(format!("{} {}", HIGHLIGHTS_LABEL, highlights));
                    }
                }
                self.append_section(lines, slot.half(), data_heading(slot), body);
            }
        }
    }

    fn merge_highlights(&self, lines: &mut Vec<String>, slot: SlotName, highlights: &str) {
        let section = match self.find_section(lines, slot.half(), SectionKind::OpenData) {
            Some(s) => s,
            // merge_data ran first, so the open data section exists
            None => return,
        };
        let replacement = format!("{} {}", HIGHLIGHTS_LABEL, highlights);
        let existing = (section.body_start..section.body_end)
            .find(|&i| lines[i].trim_start().starts_with(HIGHLIGHTS_LABEL));
        match existing {
            Some(i) => lines[i] = replacement,
            None => {
                let after_numeric = (section.body_start..section.body_end)
                    .find(|&i| self.data_line.is_match(&lines[i]))
                    .map(|i| i + 1)
                    .unwrap_or(section.body_end);
                lines.insert(after_numeric, replacement);
            }
        }
    }

    fn merge_narrative(&self, lines: &mut Vec<String>, slot: SlotName, narrative: &str) {
        let narr_kind = if slot.is_open() {
            SectionKind::OpenNarrative
        } else {
            SectionKind::CloseNarrative
        };

        match self.find_section(lines, slot.half(), narr_kind) {
            Some(section) => {
                let mut body: Vec<String> = vec![String::new()];
                body.extend(narrative.lines().map(|l| l.to_string()));
                if section.body_end < lines.len() {
                    body.push(String::new());
                }
                lines.splice(section.body_start..section.body_end, body);
            }
            None => {
                let body = narrative.lines().map(|l| l.to_string()).collect();
                self.append_section(lines, slot.half(), narrative_heading(slot), body);
            }
        }
    }

    fn find_section(
        &self,
        lines: &[String],
        half: SessionHalf,
        kind: SectionKind,
    ) -> Option<SectionSpan> {
        layout(lines)
            .iter()
            .find(|h| h.half == half)
            .and_then(|h| h.sections.iter().find(|s| s.kind == kind).cloned())
    }

    fn append_section(
        &self,
        lines: &mut Vec<String>,
        half: SessionHalf,
        heading: &str,
        body: Vec<String>,
    ) {
        let at = layout(lines)
            .iter()
            .find(|h| h.half == half)
            .map(|h| h.end)
            .unwrap_or(lines.len());

        let mut block = Vec::new();
        if at > 0 && !lines[at - 1].trim().is_empty() {
            block.push(String::new());
        }
        block.push(heading.to_string());
        block.push(String::new());
        block.extend(body);
        if at < lines.len() {
            block.push(String::new());
        }
        lines.splice(at..at, block);
    }
}

fn format_data_line(label: &str, index: f64, change: f64) -> String {
    format!("{}: {} ({:+})", label, index, change)
}

fn push_narrative_line(slot: &mut SessionSlot, line: &str) {
    if slot.narrative.is_empty() {
        if !line.trim().is_empty() {
            slot.narrative.push_str(line);
        }
    } else {
        slot.narrative.push('\n');
        slot.narrative.push_str(line);
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> MarkdownCodec {
        MarkdownCodec::new()
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 11).unwrap()
    }

    const DIALECT_B_DOC: &str = "\
# SET Market Report: 2024-03-11

## Morning Session

### Market Opening Data

SET Index: 1302.75 (+16.49)
Highlights: *BANK +68 ENERG +61 AGRI +64*

### Open Analysis

Banks led the early advance on strong quarterly previews.

### Market Closing Data

SET Index: 1280.38 (-7.69)

### Close Summary

Profit taking erased the opening gains before the lunch break.
";

    const DIALECT_A_DOC: &str = "\
# SET Market Report: 2024-03-11

## Morning Session

### Open Set

SET: 1302.75 (+16.49)
Highlights: *BANK +68 ENERG +61 AGRI +64*

### Open Analysis

Banks led the early advance on strong quarterly previews.

### Close Set

SET: 1280.38 (-7.69)

### Close Summary

Profit taking erased the opening gains before the lunch break.
";

    #[test]
    fn parses_current_dialect() {
        let record = codec().parse(date(), DIALECT_B_DOC).unwrap();
        assert_eq!(record.morning_open.index, Some(1302.75));
        assert_eq!(record.morning_open.change, Some(16.49));
        assert_eq!(
            record.morning_open.highlights.as_deref(),
            Some("*BANK +68 ENERG +61 AGRI +64*")
        );
        assert_eq!(
            record.morning_open.narrative,
            "Banks led the early advance on strong quarterly previews."
        );
        assert_eq!(record.morning_close.index, Some(1280.38));
        assert_eq!(record.morning_close.change, Some(-7.69));
        assert!(record.morning_close.highlights.is_none());
        assert!(record.afternoon_open.is_empty());
        assert!(record.afternoon_close.is_empty());
    }

    #[test]
    fn both_dialects_parse_to_equivalent_records() {
        let a = codec().parse(date(), DIALECT_A_DOC).unwrap();
        let b = codec().parse(date(), DIALECT_B_DOC).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn mixed_dialect_document_parses_per_section() {
        let text = "\
## Morning Session

### Open Set

SET: 1302.75 (+16.49)

### Market Closing Data

SET Index: 1280.38 (-7.69)
";
        let record = codec().parse(date(), text).unwrap();
        assert_eq!(record.morning_open.index, Some(1302.75));
        assert_eq!(record.morning_close.index, Some(1280.38));
    }

    #[test]
    fn signed_change_round_trips_through_extraction() {
        let text = "\
## Morning Session

### Market Opening Data

SET Index: 1302.75 (+16.49)

## Afternoon Session

### Market Opening Data

SET Index: 1280.38 (-7.69)
";
        let record = codec().parse(date(), text).unwrap();
        assert_eq!(record.morning_open.index, Some(1302.75));
        assert_eq!(record.morning_open.change, Some(16.49));
        assert_eq!(record.afternoon_open.index, Some(1280.38));
        assert_eq!(record.afternoon_open.change, Some(-7.69));
    }

    #[test]
    fn trailing_text_after_parenthesis_is_ignored() {
        let text = "\
## Morning Session

### Market Opening Data

SET Index: 1302.75 (+16.49) points at the bell
";
        let record = codec().parse(date(), text).unwrap();
        assert_eq!(record.morning_open.index, Some(1302.75));
        assert_eq!(record.morning_open.change, Some(16.49));
    }

    #[test]
    fn partial_document_leaves_other_slots_empty() {
        let text = "\
## Morning Session

### Market Opening Data

SET Index: 1295.5 (+3.25)
";
        let record = codec().parse(date(), text).unwrap();
        assert_eq!(record.morning_open.index, Some(1295.5));
        assert!(record.morning_close.is_empty());
        assert!(record.afternoon_open.is_empty());
        assert!(record.afternoon_close.is_empty());
    }

    #[test]
    fn unparsable_numeric_line_leaves_slot_numbers_unset() {
        let text = "\
## Morning Session

### Market Opening Data

SET Index: pending
";
        let record = codec().parse(date(), text).unwrap();
        assert!(record.morning_open.index.is_none());
        assert!(record.morning_open.change.is_none());
    }

    #[test]
    fn unrecognized_structure_is_a_parse_error() {
        let err = codec()
            .parse(date(), "just a plain note, no session headings\n")
            .unwrap_err();
        assert!(matches!(err, TaladError::Parse(_)));
    }

    #[test]
    fn empty_text_parses_to_empty_record() {
        let record = codec().parse(date(), "").unwrap();
        assert!(record.is_empty());
    }

    #[test]
    fn render_parse_round_trip() {
        let mut record = SessionRecord::empty(date());
        record.morning_open = SessionSlot {
            index: Some(1302.75),
            change: Some(16.49),
            highlights: Some("*BANK +68 ENERG +61*".to_string()),
            narrative: "Banks led the early advance.".to_string(),
        };
        record.morning_close = SessionSlot {
            index: Some(1280.38),
            change: Some(-7.69),
            highlights: None,
            narrative: "Gains faded before the lunch break.".to_string(),
        };
        record.afternoon_open = SessionSlot {
            index: Some(1283.1),
            change: Some(2.72),
            highlights: Some("*ICT -12 PROP +5*".to_string()),
            narrative: String::new(),
        };

        let rendered = codec().render(&record);
        let reparsed = codec().parse(date(), &rendered).unwrap();
        assert_eq!(reparsed, record);
    }

    #[test]
    fn round_trip_preserves_multi_paragraph_narrative() {
        let mut record = SessionRecord::empty(date());
        record.afternoon_close = SessionSlot {
            index: Some(1291.0),
            change: Some(8.62),
            highlights: None,
            narrative: "The index closed firmly higher.\n\nTurnover was thin ahead of the holiday."
                .to_string(),
        };
        let rendered = codec().render(&record);
        let reparsed = codec().parse(date(), &rendered).unwrap();
        assert_eq!(reparsed, record);
    }

    #[test]
    fn merge_into_empty_text_creates_current_dialect_document() {
        let update = SlotUpdate {
            index: 1302.75,
            change: 16.49,
            highlights: Some("*BANK +68*".to_string()),
            narrative: Some("Strong open.".to_string()),
        };
        let merged = codec().merge_slot("", date(), SlotName::MorningOpen, &update);
        assert!(merged.contains("### Market Opening Data"));
        assert!(merged.contains("SET Index: 1302.75 (+16.49)"));

        let record = codec().parse(date(), &merged).unwrap();
        assert_eq!(record.morning_open.index, Some(1302.75));
        assert_eq!(record.morning_open.narrative, "Strong open.");
    }

    #[test]
    fn merge_preserves_unrelated_sections_byte_for_byte() {
        // Base document has both halves filled.
        let mut record = codec().parse(date(), DIALECT_B_DOC).unwrap();
        record.afternoon_open = SessionSlot {
            index: Some(1283.1),
            change: Some(2.72),
            highlights: Some("*PROP +5*".to_string()),
            narrative: "Property names firmed after the auction news.".to_string(),
        };
        record.afternoon_close = SessionSlot {
            index: Some(1291.0),
            change: Some(7.9),
            highlights: None,
            narrative: "A late push carried the index to the session high.".to_string(),
        };
        let base = codec().render(&record);
        let afternoon = &base[base.find("## Afternoon Session").unwrap()..];
        let update = SlotUpdate {
            index: 1279.0,
            change: -1.38,
            highlights: None,
            narrative: Some("Morning gains were fully surrendered.".to_string()),
        };
        let merged = codec().merge_slot(&base, date(), SlotName::MorningClose, &update);

        assert!(merged.contains(afternoon), "afternoon region must survive byte-for-byte");
        assert!(merged.contains("SET Index: 1279 (-1.38)"));
        assert!(merged.contains("Morning gains were fully surrendered."));
        // morning open untouched
        assert!(merged.contains("SET Index: 1302.75 (+16.49)"));
        assert!(merged.contains("Banks led the early advance on strong quarterly previews."));
    }

    #[test]
    fn merge_keeps_legacy_dialect_and_label() {
        let update = SlotUpdate {
            index: 1310.0,
            change: 7.25,
            highlights: None,
            narrative: None,
        };
        let merged = codec().merge_slot(DIALECT_A_DOC, date(), SlotName::MorningOpen, &update);
        assert!(merged.contains("### Open Set"), "legacy heading must survive");
        assert!(merged.contains("SET: 1310 (+7.25)"), "legacy label must survive");
        assert!(!merged.contains("### Market Opening Data"));

        let record = codec().parse(date(), &merged).unwrap();
        assert_eq!(record.morning_open.index, Some(1310.0));
        // untouched fields survive
        assert_eq!(
            record.morning_open.highlights.as_deref(),
            Some("*BANK +68 ENERG +61 AGRI +64*")
        );
    }

    #[test]
    fn merge_without_narrative_keeps_existing_narrative() {
        let update = SlotUpdate {
            index: 1300.0,
            change: 13.74,
            highlights: None,
            narrative: None,
        };
        let merged = codec().merge_slot(DIALECT_B_DOC, date(), SlotName::MorningOpen, &update);
        assert!(merged.contains("Banks led the early advance on strong quarterly previews."));
        let record = codec().parse(date(), &merged).unwrap();
        assert_eq!(record.morning_open.index, Some(1300.0));
    }

    #[test]
    fn merge_appends_missing_session_half() {
        let update = SlotUpdate {
            index: 1283.1,
            change: 2.72,
            highlights: Some("*PROP +5*".to_string()),
            narrative: Some("Property names firmed.".to_string()),
        };
        let merged = codec().merge_slot(DIALECT_B_DOC, date(), SlotName::AfternoonOpen, &update);
        let record = codec().parse(date(), &merged).unwrap();
        assert_eq!(record.afternoon_open.index, Some(1283.1));
        assert_eq!(record.afternoon_open.narrative, "Property names firmed.");
        // morning untouched
        assert_eq!(record.morning_open.index, Some(1302.75));
    }

    #[test]
    fn merge_replaces_narrative_body_only_for_target_slot() {
        let update = SlotUpdate {
            index: 1302.75,
            change: 16.49,
            highlights: None,
            narrative: Some("Refreshed analysis after the AI call returned.".to_string()),
        };
        let merged = codec().merge_slot(DIALECT_B_DOC, date(), SlotName::MorningOpen, &update);
        assert!(merged.contains("Refreshed analysis after the AI call returned."));
        assert!(!merged.contains("Banks led the early advance on strong quarterly previews."));
        // close summary untouched
        assert!(merged.contains("Profit taking erased the opening gains before the lunch break."));
    }
}
