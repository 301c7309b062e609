//! Owns the board state. Applies events from the fetcher and the buttons and draws the result.

use std::time::Duration;

use itertools::Itertools;
use tokio::sync::{mpsc::Receiver, watch};
use tracing::{debug, info};

use crate::{
    display::CharacterDisplay,
    model::departure::{Departure, DepartureInfos},
    utils::replace_umlaute,
};

/// The second line is cut here, the rest can be reached by scrolling
const MAX_COUNTDOWN_CHARS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdateSpeed {
    #[default]
    Slow,
    Fast,
}

impl UpdateSpeed {
    pub fn next(self) -> Self {
        match self {
            UpdateSpeed::Slow => UpdateSpeed::Fast,
            UpdateSpeed::Fast => UpdateSpeed::Slow,
        }
    }

    pub fn period(self, periods: RefreshPeriods) -> Duration {
        match self {
            UpdateSpeed::Slow => periods.slow,
            UpdateSpeed::Fast => periods.fast,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshPeriods {
    pub slow: Duration,
    pub fast: Duration,
}

impl Default for RefreshPeriods {
    fn default() -> Self {
        Self {
            slow: Duration::from_secs(30),
            fast: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    /// Previous station
    Up,
    /// Next station
    Down,
    Left,
    Right,
    /// Toggles the update speed
    Select,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BoardEvent {
    Departures(DepartureInfos),
    Button(Button),
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoardState {
    /// Sorted by line name
    pub stations: Vec<(String, Vec<Departure>)>,
    /// Wraps around in both directions
    pub current_station: i64,
    pub speed: UpdateSpeed,
    /// Display columns per row
    pub columns: usize,
    /// Horizontal scroll relative to the last redraw. Positive scrolls the text to the left.
    pub scroll: i64,
    /// The message changed since it was last drawn
    pub redraw: bool,
}

impl BoardState {
    pub fn new(columns: usize) -> Self {
        Self {
            stations: vec![],
            current_station: 0,
            speed: UpdateSpeed::default(),
            columns,
            scroll: 0,
            redraw: false,
        }
    }

    /// The two lines for the selected station: its name and the right aligned countdowns
    pub fn station_string(&self) -> String {
        if self.stations.is_empty() {
            return String::new();
        }

        let index = self.current_station.rem_euclid(self.stations.len() as i64) as usize;
        let (name, departures) = &self.stations[index];

        let countdowns: String = departures
            .iter()
            .join(" ")
            .chars()
            .take(MAX_COUNTDOWN_CHARS)
            .collect();
        let fast_mode = match self.speed {
            UpdateSpeed::Fast => "*** ",
            UpdateSpeed::Slow => "",
        };

        fast_mode.to_string()
            + &replace_umlaute(&format!(
                "{name}\n{countdowns:>columns$}",
                columns = self.columns
            ))
    }

    /// Marks the current message as drawn. A redraw also resets the scroll.
    pub fn drawn(self) -> Self {
        Self {
            redraw: false,
            scroll: 0,
            ..self
        }
    }
}

/// Computes the state after `event`. Never touches the display.
pub fn apply(state: BoardState, event: BoardEvent) -> BoardState {
    match event {
        BoardEvent::Departures(departures) => {
            let message_before = state.station_string();
            let next = BoardState {
                stations: departures.into_iter().collect(),
                ..state
            };
            let redraw = next.redraw || next.station_string() != message_before;

            BoardState { redraw, ..next }
        }
        BoardEvent::Button(Button::Up) => BoardState {
            current_station: state.current_station - 1,
            redraw: true,
            ..state
        },
        BoardEvent::Button(Button::Down) => BoardState {
            current_station: state.current_station + 1,
            redraw: true,
            ..state
        },
        BoardEvent::Button(Button::Left) => BoardState {
            scroll: state.scroll + 1,
            ..state
        },
        BoardEvent::Button(Button::Right) => BoardState {
            scroll: state.scroll - 1,
            ..state
        },
        BoardEvent::Button(Button::Select) => BoardState {
            speed: state.speed.next(),
            redraw: true,
            ..state
        },
    }
}

/// Applies incoming events to the board state and draws it until every sender is gone.
///
/// This task is the only owner of the state, so a draw never sees half an update.
/// Speed changes are published on `speed_sender` for the fetcher.
pub async fn run_board<D: CharacterDisplay>(
    mut display: D,
    board_receiver: &mut Receiver<BoardEvent>,
    speed_sender: watch::Sender<UpdateSpeed>,
    columns: usize,
) -> Result<(), anyhow::Error> {
    let mut state = BoardState::new(columns);
    let mut shown_scroll = 0;

    display.clear()?;

    while let Some(event) = board_receiver.recv().await {
        debug!("{event:?}");

        let speed_before = state.speed;
        state = apply(state, event);

        if state.speed != speed_before {
            info!("Speed = {:?}", state.speed);
            speed_sender.send(state.speed)?;
        }

        if state.redraw {
            display.clear()?;
            display.set_message(&state.station_string())?;
            state = state.drawn();
            shown_scroll = 0;
        }

        while shown_scroll < state.scroll {
            display.scroll_left()?;
            shown_scroll += 1;
        }
        while shown_scroll > state.scroll {
            display.scroll_right()?;
            shown_scroll -= 1;
        }
    }

    info!("Channel closed");

    Ok(())
}
