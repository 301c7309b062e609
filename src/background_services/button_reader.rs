//! Responsible for turning button presses into board events.
//!
//! Without the LCD's keypad the buttons are typed into the terminal, one per line.
//! Reading blocks, so this runs on its own thread instead of the runtime.
use std::io::BufRead;
use std::str::FromStr;

use tokio::sync::mpsc::Sender;
use tracing::{info, warn};

use crate::background_services::display_controller::{BoardEvent, Button};

impl FromStr for Button {
    type Err = UnknownButton;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "u" | "up" => Ok(Button::Up),
            "d" | "down" => Ok(Button::Down),
            "l" | "left" => Ok(Button::Left),
            "r" | "right" => Ok(Button::Right),
            "s" | "select" => Ok(Button::Select),
            _ => Err(UnknownButton(s.to_string())),
        }
    }
}

#[derive(thiserror::Error, Debug, PartialEq)]
#[error("unknown button {0:?}, expected one of u, d, l, r, s")]
pub struct UnknownButton(String);

/// Sends a [`BoardEvent::Button`] for every recognised line of `input` until it ends
pub fn read_buttons<R: BufRead>(
    input: R,
    board_sender: Sender<BoardEvent>,
) -> Result<(), anyhow::Error> {
    for line in input.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        match line.parse::<Button>() {
            Ok(button) => {
                info!("{button:?}");
                board_sender.blocking_send(BoardEvent::Button(button))?;
            }
            Err(e) => warn!("{e}"),
        }
    }

    info!("Button input closed");

    Ok(())
}
