use serde::{Deserialize, Serialize};
use std::fmt;

/// Serializable engine error carried through the IPC error envelope.
#[derive(Debug, Clone, Serialize)]
pub struct ScheduleError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ScheduleError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            details: None,
        }
    }
}

impl fmt::Display for ScheduleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ScheduleError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Day {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
    Sun,
}

impl Day {
    /// Canonicalize a free-form day label ("Monday", "mon", "MON") by its
    /// case-insensitive 3-letter prefix. Anything else is `unrecognized_day`.
    pub fn parse(raw: &str) -> Result<Day, ScheduleError> {
        let t = raw.trim();
        let prefix: String = t.chars().take(3).flat_map(|c| c.to_lowercase()).collect();
        if prefix.chars().count() < 3 {
            return Err(ScheduleError::new(
                "unrecognized_day",
                format!("unrecognized day label: {:?}", raw),
            ));
        }
        let day = match prefix.as_str() {
            "mon" => Day::Mon,
            "tue" => Day::Tue,
            "wed" => Day::Wed,
            "thu" => Day::Thu,
            "fri" => Day::Fri,
            "sat" => Day::Sat,
            "sun" => Day::Sun,
            _ => {
                return Err(ScheduleError::new(
                    "unrecognized_day",
                    format!("unrecognized day label: {:?}", raw),
                ))
            }
        };
        Ok(day)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Day::Mon => "Mon",
            Day::Tue => "Tue",
            Day::Wed => "Wed",
            Day::Thu => "Thu",
            Day::Fri => "Fri",
            Day::Sat => "Sat",
            Day::Sun => "Sun",
        }
    }
}

/// Parse a wall-clock "HH:MM" string into minutes since midnight.
pub fn parse_time(raw: &str) -> Result<u16, ScheduleError> {
    let bad = || ScheduleError::new("malformed_slot", format!("bad time value: {:?}", raw));
    let (h, m) = raw.trim().split_once(':').ok_or_else(bad)?;
    let h: u16 = h.parse().map_err(|_| bad())?;
    let m: u16 = m.parse().map_err(|_| bad())?;
    if h > 23 || m > 59 {
        return Err(bad());
    }
    Ok(h * 60 + m)
}

pub fn format_time(minutes: u16) -> String {
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct RawTimeSlot {
    day: String,
    start: String,
    end: String,
}

/// One weekly meeting window. Minutes are since midnight; slots never span
/// midnight and always have positive duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawTimeSlot", into = "RawTimeSlot")]
pub struct TimeSlot {
    pub day: Day,
    pub start_min: u16,
    pub end_min: u16,
}

impl TimeSlot {
    pub fn new(day: Day, start_min: u16, end_min: u16) -> Result<TimeSlot, ScheduleError> {
        if start_min >= end_min || end_min > 24 * 60 {
            return Err(ScheduleError::new(
                "malformed_slot",
                format!(
                    "slot must have a positive same-day duration ({} .. {})",
                    format_time(start_min),
                    format_time(end_min.min(24 * 60))
                ),
            ));
        }
        Ok(TimeSlot {
            day,
            start_min,
            end_min,
        })
    }

    pub fn duration_min(&self) -> u16 {
        self.end_min - self.start_min
    }

    /// Half-open interval overlap on the same day. Touching endpoints
    /// (one ends exactly when the other starts) do not overlap.
    pub fn overlaps(&self, other: &TimeSlot) -> bool {
        self.day == other.day && self.start_min < other.end_min && other.start_min < self.end_min
    }
}

impl TryFrom<RawTimeSlot> for TimeSlot {
    type Error = ScheduleError;

    fn try_from(raw: RawTimeSlot) -> Result<TimeSlot, ScheduleError> {
        let day = Day::parse(&raw.day)?;
        let start = parse_time(&raw.start)?;
        let end = parse_time(&raw.end)?;
        TimeSlot::new(day, start, end)
    }
}

impl From<TimeSlot> for RawTimeSlot {
    fn from(slot: TimeSlot) -> RawTimeSlot {
        RawTimeSlot {
            day: slot.day.as_str().to_string(),
            start: format_time(slot.start_min),
            end: format_time(slot.end_min),
        }
    }
}

/// One schedulable course offering: a catalog course code plus a concrete
/// section ("class" on the wire), with its weekly slots.
///
/// Identity for dedup purposes is `(code, section)`, never `id`, because the
/// same offering carries different ids across import sources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offering {
    pub id: String,
    pub code: String,
    pub name: String,
    pub sks: u32,
    #[serde(rename = "class")]
    pub section: String,
    #[serde(default)]
    pub lecturer: String,
    #[serde(default)]
    pub room: String,
    pub schedule: Vec<TimeSlot>,
}

impl Offering {
    pub fn dedup_key(&self) -> (String, String) {
        (self.code.clone(), self.section.clone())
    }

    /// Construction-time shape checks shared by plan decoding and catalog
    /// import. Slot validity is already guaranteed by `TimeSlot` decoding.
    pub fn validate(&self) -> Result<(), ScheduleError> {
        if self.id.trim().is_empty() {
            return Err(ScheduleError::new("corrupt_plan_data", "offering id is empty"));
        }
        if self.code.trim().is_empty() {
            return Err(ScheduleError::new(
                "corrupt_plan_data",
                format!("offering {} has an empty code", self.id),
            ));
        }
        if self.name.trim().is_empty() {
            return Err(ScheduleError::new(
                "corrupt_plan_data",
                format!("offering {} has an empty name", self.code),
            ));
        }
        if self.sks == 0 {
            return Err(ScheduleError::new(
                "corrupt_plan_data",
                format!("offering {} has non-positive sks", self.code),
            ));
        }
        if self.schedule.is_empty() {
            return Err(ScheduleError::new(
                "corrupt_plan_data",
                format!("offering {} has an empty schedule", self.code),
            ));
        }
        Ok(())
    }
}

/// One pairwise time overlap between two distinct offerings. Derived on
/// demand, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Conflict {
    pub a_code: String,
    pub a_section: String,
    pub b_code: String,
    pub b_section: String,
    pub day: Day,
    pub start: String,
    pub end: String,
}

/// Pairwise scan over offerings and their slot lists. Selections are small
/// (well under ~20 offerings), so the quadratic scan is the whole algorithm.
/// Conflicts come out in selection order with the earlier offering first;
/// self-overlaps within one offering's own slots are skipped.
pub fn detect_conflicts(selection: &[Offering]) -> Vec<Conflict> {
    let mut report = Vec::new();
    for (i, a) in selection.iter().enumerate() {
        for b in selection.iter().skip(i + 1) {
            for sa in &a.schedule {
                for sb in &b.schedule {
                    if sa.overlaps(sb) {
                        report.push(Conflict {
                            a_code: a.code.clone(),
                            a_section: a.section.clone(),
                            b_code: b.code.clone(),
                            b_section: b.section.clone(),
                            day: sa.day,
                            start: format_time(sa.start_min.max(sb.start_min)),
                            end: format_time(sa.end_min.min(sb.end_min)),
                        });
                    }
                }
            }
        }
    }
    report
}

/// Display window for the weekly grid. Tunable per caller; the defaults match
/// the planner UI (07:00-18:00 in 30-minute rows, 22 rows).
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridConfig {
    #[serde(default = "default_start_hour")]
    pub start_hour: u16,
    #[serde(default = "default_end_hour")]
    pub end_hour: u16,
    #[serde(default = "default_granularity")]
    pub granularity_min: u16,
}

fn default_start_hour() -> u16 {
    7
}
fn default_end_hour() -> u16 {
    18
}
fn default_granularity() -> u16 {
    30
}

impl Default for GridConfig {
    fn default() -> Self {
        GridConfig {
            start_hour: default_start_hour(),
            end_hour: default_end_hour(),
            granularity_min: default_granularity(),
        }
    }
}

impl GridConfig {
    pub fn validate(&self) -> Result<(), ScheduleError> {
        if self.start_hour >= self.end_hour || self.end_hour > 24 || self.granularity_min == 0 {
            return Err(ScheduleError::new(
                "bad_params",
                "grid window must satisfy startHour < endHour <= 24 with a positive granularity",
            ));
        }
        Ok(())
    }

    pub fn row_count(&self) -> u16 {
        (self.end_hour - self.start_hour) * 60 / self.granularity_min
    }
}

/// Map a slot into the grid's discrete row space. Slots entirely outside the
/// display window are `out_of_grid_range`: skipped from rendering only, still
/// counted by the conflict detector.
pub fn grid_offset(slot: &TimeSlot, cfg: &GridConfig) -> Result<(i32, i32), ScheduleError> {
    let window_start = i32::from(cfg.start_hour) * 60;
    let window_end = i32::from(cfg.end_hour) * 60;
    let start = i32::from(slot.start_min);
    let end = i32::from(slot.end_min);
    if end <= window_start || start >= window_end {
        return Err(ScheduleError::new(
            "out_of_grid_range",
            format!(
                "slot {} {}-{} falls outside the {:02}:00-{:02}:00 window",
                slot.day.as_str(),
                format_time(slot.start_min),
                format_time(slot.end_min),
                cfg.start_hour,
                cfg.end_hour
            ),
        ));
    }
    let gran = i32::from(cfg.granularity_min);
    let row_start = (start - window_start).div_euclid(gran);
    let row_span = (i32::from(slot.duration_min()) + gran - 1) / gran;
    Ok((row_start, row_span.max(1)))
}

/// Rendering descriptor for one (offering, slot) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Placement {
    pub offering_id: String,
    pub code: String,
    pub section: String,
    pub slot_index: usize,
    pub day: Day,
    pub row_start: i32,
    pub row_span: i32,
    pub lane: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutModel {
    pub row_count: u16,
    pub placements: Vec<Placement>,
    /// Soft out-of-window skips, one message per dropped slot.
    pub out_of_range: Vec<String>,
}

/// Place every slot of the selection onto the weekly grid and resolve visual
/// stacking. Lane assignment is a greedy left-edge coloring per day column:
/// slots are taken in row-start order and get the lowest lane whose previous
/// occupant has already ended, so row-overlapping slots never share a lane.
pub fn layout(selection: &[Offering], cfg: &GridConfig) -> Result<LayoutModel, ScheduleError> {
    cfg.validate()?;

    let mut placements: Vec<Placement> = Vec::new();
    let mut out_of_range: Vec<String> = Vec::new();

    for offering in selection {
        for (slot_index, slot) in offering.schedule.iter().enumerate() {
            match grid_offset(slot, cfg) {
                Ok((row_start, row_span)) => placements.push(Placement {
                    offering_id: offering.id.clone(),
                    code: offering.code.clone(),
                    section: offering.section.clone(),
                    slot_index,
                    day: slot.day,
                    row_start,
                    row_span,
                    lane: 0,
                }),
                Err(e) if e.code == "out_of_grid_range" => out_of_range.push(e.message),
                Err(e) => return Err(e),
            }
        }
    }

    // Stable sort keeps selection order as the tiebreak for equal starts.
    placements.sort_by_key(|p| (p.day, p.row_start));

    let mut current_day: Option<Day> = None;
    let mut lane_ends: Vec<i32> = Vec::new();
    for p in placements.iter_mut() {
        if current_day != Some(p.day) {
            current_day = Some(p.day);
            lane_ends.clear();
        }
        let row_end = p.row_start + p.row_span;
        match lane_ends.iter().position(|&end| end <= p.row_start) {
            Some(lane) => {
                lane_ends[lane] = row_end;
                p.lane = lane as u32;
            }
            None => {
                p.lane = lane_ends.len() as u32;
                lane_ends.push(row_end);
            }
        }
    }

    Ok(LayoutModel {
        row_count: cfg.row_count(),
        placements,
        out_of_range,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(day: Day, start: &str, end: &str) -> TimeSlot {
        TimeSlot::new(day, parse_time(start).unwrap(), parse_time(end).unwrap()).unwrap()
    }

    fn offering(code: &str, section: &str, slots: Vec<TimeSlot>) -> Offering {
        Offering {
            id: format!("{}-{}", code, section),
            code: code.to_string(),
            name: format!("{} name", code),
            sks: 3,
            section: section.to_string(),
            lecturer: String::new(),
            room: String::new(),
            schedule: slots,
        }
    }

    #[test]
    fn day_parse_accepts_long_short_and_lowercase_labels() {
        assert_eq!(Day::parse("Monday").unwrap(), Day::Mon);
        assert_eq!(Day::parse("mon").unwrap(), Day::Mon);
        assert_eq!(Day::parse("THURSDAY").unwrap(), Day::Thu);
        assert_eq!(Day::parse("  sat ").unwrap(), Day::Sat);
        assert_eq!(Day::parse("Mondayish").unwrap(), Day::Mon);
    }

    #[test]
    fn day_parse_rejects_unknown_labels() {
        assert_eq!(Day::parse("Mo").unwrap_err().code, "unrecognized_day");
        assert_eq!(Day::parse("Funday").unwrap_err().code, "unrecognized_day");
        assert_eq!(Day::parse("").unwrap_err().code, "unrecognized_day");
    }

    #[test]
    fn slot_construction_rejects_bad_ranges() {
        assert_eq!(
            TimeSlot::new(Day::Mon, 540, 540).unwrap_err().code,
            "malformed_slot"
        );
        assert_eq!(
            TimeSlot::new(Day::Mon, 600, 540).unwrap_err().code,
            "malformed_slot"
        );
        assert_eq!(parse_time("25:00").unwrap_err().code, "malformed_slot");
        assert_eq!(parse_time("0900").unwrap_err().code, "malformed_slot");
    }

    #[test]
    fn overlap_is_symmetric_and_half_open() {
        let a = slot(Day::Mon, "07:00", "09:00");
        let b = slot(Day::Mon, "08:00", "10:00");
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));

        // Adjacent slots never overlap.
        let c = slot(Day::Mon, "09:00", "10:00");
        assert!(!a.overlaps(&c));
        assert!(!c.overlaps(&a));

        // Same window on a different day never overlaps.
        let d = slot(Day::Tue, "07:00", "09:00");
        assert!(!a.overlaps(&d));
    }

    #[test]
    fn detector_reports_overlap_window_in_selection_order() {
        let selection = vec![
            offering("CS101", "A", vec![slot(Day::Mon, "07:00", "09:00")]),
            offering("MA201", "B", vec![slot(Day::Mon, "08:00", "10:00")]),
        ];
        let report = detect_conflicts(&selection);
        assert_eq!(report.len(), 1);
        let c = &report[0];
        assert_eq!((c.a_code.as_str(), c.a_section.as_str()), ("CS101", "A"));
        assert_eq!((c.b_code.as_str(), c.b_section.as_str()), ("MA201", "B"));
        assert_eq!(c.day, Day::Mon);
        assert_eq!(c.start, "08:00");
        assert_eq!(c.end, "09:00");
    }

    #[test]
    fn detector_skips_self_overlaps_and_disjoint_pairs() {
        // A lecture plus recitation inside one offering is not a conflict,
        // even when the slots themselves collide.
        let selection = vec![
            offering(
                "CS101",
                "A",
                vec![
                    slot(Day::Mon, "07:00", "09:00"),
                    slot(Day::Mon, "08:00", "10:00"),
                ],
            ),
            offering("MA201", "B", vec![slot(Day::Tue, "07:00", "09:00")]),
        ];
        assert!(detect_conflicts(&selection).is_empty());
    }

    #[test]
    fn grid_offset_matches_default_window() {
        let cfg = GridConfig::default();
        assert_eq!(cfg.row_count(), 22);
        let (row_start, row_span) = grid_offset(&slot(Day::Mon, "07:00", "09:00"), &cfg).unwrap();
        assert_eq!(row_start, 0);
        assert_eq!(row_span, 4);

        let (row_start, row_span) = grid_offset(&slot(Day::Fri, "09:30", "10:15"), &cfg).unwrap();
        assert_eq!(row_start, 5);
        assert_eq!(row_span, 2);
    }

    #[test]
    fn grid_offset_flags_slots_outside_the_window() {
        let cfg = GridConfig::default();
        let early = slot(Day::Mon, "05:00", "06:30");
        assert_eq!(grid_offset(&early, &cfg).unwrap_err().code, "out_of_grid_range");
        let late = slot(Day::Mon, "19:00", "21:00");
        assert_eq!(grid_offset(&late, &cfg).unwrap_err().code, "out_of_grid_range");
        // Touching the window start is still outside (half-open window).
        let edge = slot(Day::Mon, "06:00", "07:00");
        assert_eq!(grid_offset(&edge, &cfg).unwrap_err().code, "out_of_grid_range");
    }

    #[test]
    fn layout_assigns_distinct_lanes_to_overlapping_slots() {
        let cfg = GridConfig::default();
        let selection = vec![
            offering("CS101", "A", vec![slot(Day::Mon, "07:00", "08:00")]),
            offering("MA201", "B", vec![slot(Day::Mon, "07:00", "08:00")]),
        ];
        let model = layout(&selection, &cfg).unwrap();
        assert_eq!(model.placements.len(), 2);
        assert_eq!(model.placements[0].lane, 0);
        assert_eq!(model.placements[1].lane, 1);
        assert!(model.out_of_range.is_empty());
    }

    #[test]
    fn layout_reuses_lanes_once_previous_occupant_ends() {
        let cfg = GridConfig::default();
        let selection = vec![
            offering("CS101", "A", vec![slot(Day::Mon, "07:00", "09:00")]),
            offering("MA201", "B", vec![slot(Day::Mon, "08:00", "10:00")]),
            offering("PH301", "C", vec![slot(Day::Mon, "09:00", "11:00")]),
        ];
        let model = layout(&selection, &cfg).unwrap();
        let lanes: Vec<(String, u32)> = model
            .placements
            .iter()
            .map(|p| (p.code.clone(), p.lane))
            .collect();
        // PH301 starts exactly when CS101 ends, so lane 0 is free again.
        assert_eq!(
            lanes,
            vec![
                ("CS101".to_string(), 0),
                ("MA201".to_string(), 1),
                ("PH301".to_string(), 0),
            ]
        );

        // No two placements sharing a row range on one day share a lane.
        for (i, a) in model.placements.iter().enumerate() {
            for b in model.placements.iter().skip(i + 1) {
                if a.day == b.day
                    && a.row_start < b.row_start + b.row_span
                    && b.row_start < a.row_start + a.row_span
                {
                    assert_ne!(a.lane, b.lane);
                }
            }
        }
    }

    #[test]
    fn layout_skips_out_of_window_slots_without_failing() {
        let cfg = GridConfig::default();
        let selection = vec![offering(
            "EV900",
            "A",
            vec![
                slot(Day::Mon, "19:00", "21:00"),
                slot(Day::Wed, "08:00", "09:00"),
            ],
        )];
        let model = layout(&selection, &cfg).unwrap();
        assert_eq!(model.placements.len(), 1);
        assert_eq!(model.placements[0].day, Day::Wed);
        assert_eq!(model.out_of_range.len(), 1);

        // The dropped slot still counts for conflict detection.
        let other = offering("EV901", "B", vec![slot(Day::Mon, "19:30", "20:30")]);
        let mut both = selection.clone();
        both.push(other);
        assert_eq!(detect_conflicts(&both).len(), 1);
    }
}
