use crate::error::SnapshotError;
use crate::models::{RecordFamily, Slot};
use chrono::{DateTime, Datelike, Days, Duration, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;

/// When a slot is eligible, relative to a game's kickoff
#[derive(Debug, Clone, PartialEq)]
pub enum SlotWindow {
    /// From the week's Tuesday boundary until the start of the game's local day
    Opening,
    /// `[kickoff - opens_before, kickoff - closes_before)`
    BeforeKickoff {
        opens_before: Duration,
        closes_before: Duration,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SlotDef {
    pub name: String,
    pub window: SlotWindow,
    pub lines: bool,
    pub props: bool,
}

impl SlotDef {
    pub fn applies_to(&self, family: RecordFamily) -> bool {
        match family {
            RecordFamily::GameLines => self.lines,
            RecordFamily::Props => self.props,
        }
    }
}

/// Ordered sequence of snapshot slots and their eligibility windows
#[derive(Debug, Clone)]
pub struct Schedule {
    slots: Vec<SlotDef>,
    tz: Tz,
    opening_hour: u32,
}

impl Default for Schedule {
    fn default() -> Self {
        Self {
            slots: Self::two_slot(Duration::minutes(150)),
            tz: chrono_tz::America::New_York,
            opening_hour: 10,
        }
    }
}

impl Schedule {
    pub fn new(slots: Vec<SlotDef>, tz: Tz, opening_hour: u32) -> Result<Self, SnapshotError> {
        if slots.is_empty() {
            return Err(SnapshotError::InvalidSchedule(
                "at least one slot is required".to_string(),
            ));
        }
        if slots.len() > u8::MAX as usize {
            return Err(SnapshotError::InvalidSchedule(format!(
                "too many slots: {}",
                slots.len()
            )));
        }
        if opening_hour > 23 {
            return Err(SnapshotError::InvalidSchedule(format!(
                "opening hour out of range: {}",
                opening_hour
            )));
        }
        for (i, def) in slots.iter().enumerate() {
            if slots[..i].iter().any(|other| other.name == def.name) {
                return Err(SnapshotError::InvalidSchedule(format!(
                    "duplicate slot name: {}",
                    def.name
                )));
            }
            if let SlotWindow::BeforeKickoff {
                opens_before,
                closes_before,
            } = &def.window
            {
                if *closes_before < Duration::zero() || opens_before <= closes_before {
                    return Err(SnapshotError::InvalidSchedule(format!(
                        "slot {} has an empty window",
                        def.name
                    )));
                }
            }
        }
        Ok(Self {
            slots,
            tz,
            opening_hour,
        })
    }

    /// Opening lines for game lines, plus a final pre-kickoff slot shared with props
    pub fn with_final_lead(tz: Tz, opening_hour: u32, lead: Duration) -> Result<Self, SnapshotError> {
        Self::new(Self::two_slot(lead), tz, opening_hour)
    }

    fn two_slot(lead: Duration) -> Vec<SlotDef> {
        vec![
            SlotDef {
                name: "opening".to_string(),
                window: SlotWindow::Opening,
                lines: true,
                props: false,
            },
            SlotDef {
                name: "final".to_string(),
                window: SlotWindow::BeforeKickoff {
                    opens_before: lead,
                    closes_before: Duration::zero(),
                },
                lines: true,
                props: true,
            },
        ]
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slot(&self, slot: Slot) -> Option<&SlotDef> {
        (slot.index() as usize)
            .checked_sub(1)
            .and_then(|i| self.slots.get(i))
    }

    pub fn name(&self, slot: Slot) -> &str {
        self.slot(slot).map(|def| def.name.as_str()).unwrap_or("unknown")
    }

    /// Slots in sequence order
    pub fn slots(&self) -> impl DoubleEndedIterator<Item = (Slot, &SlotDef)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .map(|(i, def)| (Slot(i as u8 + 1), def))
    }

    /// Slots a record family can ever be filled at
    pub fn slots_for(&self, family: RecordFamily) -> Vec<Slot> {
        self.slots()
            .filter(|(_, def)| def.applies_to(family))
            .map(|(slot, _)| slot)
            .collect()
    }

    /// Which slot is due for a game right now, if any.
    ///
    /// When windows overlap the later slot wins. After a window closes the
    /// slot is never resolved again.
    pub fn resolve(
        &self,
        family: RecordFamily,
        kickoff: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Option<Slot> {
        self.slots()
            .rev()
            .filter(|(_, def)| def.applies_to(family))
            .find(|(_, def)| {
                self.window(def, kickoff)
                    .is_some_and(|(start, end)| start <= now && now < end)
            })
            .map(|(slot, _)| slot)
    }

    /// The earliest window for this family that opens after `now`
    pub fn next_window(
        &self,
        family: RecordFamily,
        kickoff: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Option<(Slot, DateTime<Utc>)> {
        self.slots()
            .filter(|(_, def)| def.applies_to(family))
            .filter_map(|(slot, def)| {
                let (start, _) = self.window(def, kickoff)?;
                (start > now).then_some((slot, start))
            })
            .min_by_key(|(_, start)| *start)
    }

    /// `[start, end)` of a slot's window for a given kickoff. `None` when the window is empty.
    pub fn window(&self, def: &SlotDef, kickoff: DateTime<Utc>) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let (start, end) = match &def.window {
            SlotWindow::Opening => {
                let game_day = self.local_date(kickoff);
                let back = (game_day.weekday().num_days_from_monday() + 6) % 7;
                let tuesday = game_day.checked_sub_days(Days::new(back as u64))?;
                let start = self.local_instant(tuesday, self.opening_hour)?;
                let end = self.local_instant(game_day, 0)?;
                (start, end)
            }
            SlotWindow::BeforeKickoff {
                opens_before,
                closes_before,
            } => (kickoff - *opens_before, kickoff - *closes_before),
        };
        (start < end).then_some((start, end))
    }

    pub fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.tz).date_naive()
    }

    /// Whether the game kicks off on `now`'s local calendar day
    pub fn is_game_day(&self, kickoff: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        self.local_date(kickoff) == self.local_date(now)
    }

    fn local_instant(&self, date: NaiveDate, hour: u32) -> Option<DateTime<Utc>> {
        let naive = date.and_hms_opt(hour, 0, 0)?;
        self.tz
            .from_local_datetime(&naive)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

/// Maps instants to NFL week numbers. Weeks run Tuesday to Tuesday, local time.
#[derive(Debug, Clone)]
pub struct WeekCalendar {
    season_start: NaiveDate,
    tz: Tz,
}

pub const MAX_WEEK: u32 = 22;

impl WeekCalendar {
    pub fn new(season_start: NaiveDate, tz: Tz) -> Self {
        Self { season_start, tz }
    }

    pub fn week_of(&self, now: DateTime<Utc>) -> u32 {
        let today = now.with_timezone(&self.tz).date_naive();
        let days = (today - self.season_start).num_days();
        (days.div_euclid(7) + 1).clamp(1, MAX_WEEK as i64) as u32
    }

    /// `[start, end)` of a week, from local midnight Tuesday to local midnight the next Tuesday
    pub fn week_window(&self, week: u32) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let offset = 7 * u64::from(week.checked_sub(1)?);
        let first = self.season_start.checked_add_days(Days::new(offset))?;
        let next = first.checked_add_days(Days::new(7))?;
        let start = self.tz.from_local_datetime(&first.and_hms_opt(0, 0, 0)?).earliest()?;
        let end = self.tz.from_local_datetime(&next.and_hms_opt(0, 0, 0)?).earliest()?;
        Some((start.with_timezone(&Utc), end.with_timezone(&Utc)))
    }
}
