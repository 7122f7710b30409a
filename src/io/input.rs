//! Per-round input samples and the sources that produce them.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::flock::Bounds;
use crate::vector::Vec2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Key {
    Quit,
    CycleFamily,
    Other(char),
}

impl Key {
    pub fn from_char(c: char) -> Self {
        match c {
            'q' | 'Q' | '\u{1b}' => Key::Quit,
            'f' | 'F' => Key::CycleFamily,
            other => Key::Other(other),
        }
    }
}

/// What the user did since the previous sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct InputSample {
    #[serde(default)]
    pub click: Option<Vec2>,
    #[serde(default)]
    pub cursor: Option<Vec2>,
    #[serde(default)]
    pub key: Option<Key>,
}

impl InputSample {
    pub fn is_empty(&self) -> bool {
        self.click.is_none() && self.cursor.is_none() && self.key.is_none()
    }

    /// Combine with a later sample; later values win field by field, except
    /// that a quit is never overwritten by another key.
    pub fn merge(self, later: InputSample) -> InputSample {
        let key = match self.key {
            Some(Key::Quit) => self.key,
            _ => later.key.or(self.key),
        };
        InputSample {
            click: later.click.or(self.click),
            cursor: later.cursor.or(self.cursor),
            key,
        }
    }

    /// Drop clicks outside `bounds` and clamp the cursor into them.
    pub fn bounded(self, bounds: &Bounds) -> InputSample {
        let click = self.click.filter(|click| {
            let inside = click.is_finite() && bounds.contains(*click);
            if !inside {
                warn!(x = click.x, y = click.y, "dropping out-of-bounds click");
            }
            inside
        });
        let cursor = self
            .cursor
            .filter(|cursor| cursor.is_finite())
            .map(|cursor| bounds.clamp(cursor));
        InputSample {
            click,
            cursor,
            key: self.key,
        }
    }
}

/// Producer of input, polled at most once per round.
pub trait InputSource {
    fn sample(&mut self, round: u64) -> InputSample;
}

#[derive(Debug, Default)]
pub struct NoInput;

impl InputSource for NoInput {
    fn sample(&mut self, _round: u64) -> InputSample {
        InputSample::default()
    }
}

/// One scripted input, delivered when `round` is sampled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptedEvent {
    pub round: u64,
    #[serde(default)]
    pub click: Option<Vec2>,
    #[serde(default)]
    pub cursor: Option<Vec2>,
    #[serde(default)]
    pub key: Option<Key>,
}

impl ScriptedEvent {
    pub fn input(&self) -> InputSample {
        InputSample {
            click: self.click,
            cursor: self.cursor,
            key: self.key,
        }
    }
}

/// Plays back round-keyed events. Events sharing a round merge in file order.
#[derive(Debug, Default)]
pub struct ScriptedInput {
    events: VecDeque<ScriptedEvent>,
}

impl ScriptedInput {
    pub fn new(mut events: Vec<ScriptedEvent>) -> Self {
        events.sort_by_key(|event| event.round);
        Self {
            events: events.into(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.events.len()
    }
}

impl InputSource for ScriptedInput {
    fn sample(&mut self, round: u64) -> InputSample {
        let mut sample = InputSample::default();
        while let Some(event) = self.events.front() {
            if event.round > round {
                break;
            }
            if event.round == round {
                sample = sample.merge(event.input());
            }
            self.events.pop_front();
        }
        sample
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_mapping() {
        assert_eq!(Key::from_char('q'), Key::Quit);
        assert_eq!(Key::from_char('\u{1b}'), Key::Quit);
        assert_eq!(Key::from_char('f'), Key::CycleFamily);
        assert_eq!(Key::from_char('x'), Key::Other('x'));
    }

    #[test]
    fn test_merge_keeps_quit() {
        let quit = InputSample {
            key: Some(Key::Quit),
            ..InputSample::default()
        };
        let other = InputSample {
            cursor: Some(Vec2::new(1.0, 2.0)),
            key: Some(Key::CycleFamily),
            ..InputSample::default()
        };

        let merged = quit.merge(other);
        assert_eq!(merged.key, Some(Key::Quit));
        assert_eq!(merged.cursor, Some(Vec2::new(1.0, 2.0)));
        assert_eq!(other.merge(quit).key, Some(Key::Quit));
        assert_eq!(InputSample::default().merge(other).key, Some(Key::CycleFamily));
    }

    #[test]
    fn test_bounded_drops_clicks_and_clamps_cursor() {
        let bounds = Bounds::new(0.0, 10.0, 0.0, 10.0);
        let sample = InputSample {
            click: Some(Vec2::new(11.0, 5.0)),
            cursor: Some(Vec2::new(-3.0, 20.0)),
            key: None,
        }
        .bounded(&bounds);
        assert_eq!(sample.click, None);
        assert_eq!(sample.cursor, Some(Vec2::new(0.0, 10.0)));
    }

    #[test]
    fn test_scripted_input_plays_by_round() {
        let mut input = ScriptedInput::new(vec![
            ScriptedEvent {
                round: 3,
                click: None,
                cursor: None,
                key: Some(Key::Quit),
            },
            ScriptedEvent {
                round: 1,
                click: Some(Vec2::new(1.0, 1.0)),
                cursor: None,
                key: None,
            },
            ScriptedEvent {
                round: 1,
                click: Some(Vec2::new(2.0, 2.0)),
                cursor: Some(Vec2::ZERO),
                key: None,
            },
        ]);

        let first = input.sample(1);
        assert_eq!(first.click, Some(Vec2::new(2.0, 2.0)));
        assert_eq!(first.cursor, Some(Vec2::ZERO));
        assert!(input.sample(2).is_empty());
        assert_eq!(input.sample(3).key, Some(Key::Quit));
        assert_eq!(input.remaining(), 0);
    }

    #[test]
    fn test_skipped_rounds_are_discarded() {
        let mut input = ScriptedInput::new(vec![ScriptedEvent {
            round: 2,
            click: Some(Vec2::ZERO),
            cursor: None,
            key: None,
        }]);
        assert!(input.sample(5).is_empty());
        assert_eq!(input.remaining(), 0);
    }
}
