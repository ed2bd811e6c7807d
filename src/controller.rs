use std::time::Duration;
use tracing::trace;

use crate::domain::{DbvConfig, DbvError, Message};
use crate::model::Model;
use ratatui::crossterm::event::{self, Event, KeyCode, KeyModifiers};

pub struct Controller {
    event_poll_time: u64,
}

impl Controller {
    pub fn new(cfg: &DbvConfig) -> Self {
        Self {
            event_poll_time: cfg.event_poll_time,
        }
    }

    pub fn handle_event(&self, model: &Model) -> Result<Option<Message>, DbvError> {
        if event::poll(Duration::from_millis(self.event_poll_time))? {
            match event::read()? {
                Event::Key(key) if key.kind == event::KeyEventKind::Press => {
                    // While the cmdline captures input, keys go through raw
                    if model.raw_keyevents() {
                        return Ok(Some(Message::RawKey(key)));
                    }
                    return Ok(self.handle_key(key));
                }
                Event::Resize(width, height) => {
                    return Ok(Some(Message::Resize(width as usize, height as usize)));
                }
                _ => {}
            }
        }
        Ok(None)
    }

    fn handle_key(&self, key: event::KeyEvent) -> Option<Message> {
        let message = match (key.code, key.modifiers) {
            (KeyCode::Char('q'), KeyModifiers::NONE) => Some(Message::Quit),
            (KeyCode::Char('?'), _) => Some(Message::Help),
            (KeyCode::Esc, KeyModifiers::NONE) => Some(Message::Exit),
            (KeyCode::Tab, KeyModifiers::NONE) => Some(Message::NextTab),
            (KeyCode::BackTab, _) => Some(Message::PreviousTab),
            (KeyCode::Char('x'), KeyModifiers::NONE) => Some(Message::CloseTab),
            (KeyCode::Char('e'), KeyModifiers::NONE) => Some(Message::OpenExplorer),
            (KeyCode::Char('n'), KeyModifiers::NONE) => Some(Message::OpenConsole),
            (KeyCode::Char('r'), KeyModifiers::NONE) => Some(Message::RenameTab),
            (KeyCode::Up, KeyModifiers::NONE) => Some(Message::MoveUp),
            (KeyCode::Down, KeyModifiers::NONE) => Some(Message::MoveDown),
            (KeyCode::Left, KeyModifiers::NONE) => Some(Message::MoveLeft),
            (KeyCode::Right, KeyModifiers::NONE) => Some(Message::MoveRight),
            (KeyCode::PageDown, KeyModifiers::NONE) => Some(Message::NextPage),
            (KeyCode::PageUp, KeyModifiers::NONE) => Some(Message::PreviousPage),
            (KeyCode::Char('z'), KeyModifiers::NONE) => Some(Message::CyclePageSize),
            (KeyCode::Char('s'), KeyModifiers::NONE) => Some(Message::SortColumn),
            (KeyCode::Char('/'), KeyModifiers::NONE) => Some(Message::Search),
            (KeyCode::Char(' '), KeyModifiers::NONE) => Some(Message::ToggleSelect),
            (KeyCode::Char('a'), KeyModifiers::NONE) => Some(Message::ToggleSelectAll),
            (KeyCode::Char('y'), KeyModifiers::NONE) => Some(Message::CopyCell),
            (KeyCode::Char('Y'), _) => Some(Message::CopyRow),
            _ => None,
        };
        trace!("Mapped: {key:?} => {message:?}");
        message
    }
}
