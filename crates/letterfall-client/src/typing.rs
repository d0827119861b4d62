//! Minimal typing session: the word being typed, what has been typed of it,
//! and the words already completed.

use std::time::Duration;

use letterfall_core::config::ImpulseConfig;
use letterfall_core::impulse::ImpulseKind;

/// How long a fully correct word stays on screen before it completes.
pub const COMPLETION_DELAY: Duration = Duration::from_millis(400);

pub const WORDS: &[&str] = &[
    "GRAVITY", "FALL", "LETTER", "BOUNCE", "TYPE", "WORD", "RUST", "GLYPH", "SPIN", "DROP",
    "FLOOR", "IMPULSE", "ORBIT", "CAMERA", "SCATTER", "TUMBLE", "SHADOW", "LIGHT", "MESH",
    "SOLID", "QUICK", "BROWN", "FOX", "JUMPS", "OVER", "LAZY", "DOG",
];

/// What a completed word produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub word: String,
    pub impulse: ImpulseKind,
}

#[derive(Debug, Clone)]
pub struct TypingSession {
    words: Vec<String>,
    next_word: usize,
    current: String,
    input: String,
    history: Vec<String>,
    correct_since: Option<Duration>,
    strengths: ImpulseConfig,
}

impl TypingSession {
    /// Words are used in order and cycle. Empty lists fall back to [`WORDS`].
    pub fn new(words: Vec<String>, strengths: ImpulseConfig) -> Self {
        let words = if words.is_empty() {
            WORDS.iter().map(ToString::to_string).collect()
        } else {
            words
        };
        let mut session = Self {
            words,
            next_word: 0,
            current: String::new(),
            input: String::new(),
            history: Vec::new(),
            correct_since: None,
            strengths,
        };
        session.advance_word();
        session
    }

    pub fn current(&self) -> &str {
        &self.current
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn history(&self) -> &[String] {
        &self.history
    }

    /// Adds a keystroke. Returns the letter impulse it triggers, or `None` once
    /// the word is full or for control characters.
    pub fn type_char(&mut self, c: char) -> Option<ImpulseKind> {
        if c.is_control() || c.is_whitespace() {
            return None;
        }
        let char_index = self.input.chars().count();
        if char_index >= self.current.chars().count() {
            return None;
        }
        let typed = c.to_uppercase().next().unwrap_or(c);
        self.input.push(typed);

        let correct = self.current.chars().nth(char_index) == Some(typed);
        let strength = if correct {
            self.strengths.letter_correct
        } else {
            self.strengths.letter_incorrect
        };
        Some(ImpulseKind::Letter {
            char_index,
            strength,
        })
    }

    pub fn backspace(&mut self) -> bool {
        self.input.pop().is_some()
    }

    /// Completes the word once it has been fully correct for
    /// [`COMPLETION_DELAY`]. `now` is any monotonic clock.
    pub fn tick(&mut self, now: Duration) -> Option<Completion> {
        if self.input != self.current {
            self.correct_since = None;
            return None;
        }
        let since = *self.correct_since.get_or_insert(now);
        if now.saturating_sub(since) < COMPLETION_DELAY {
            return None;
        }

        let word = std::mem::take(&mut self.current);
        self.history.push(word.clone());
        self.input.clear();
        self.correct_since = None;
        self.advance_word();
        Some(Completion {
            word,
            impulse: ImpulseKind::Word {
                strength: self.strengths.word_strength,
            },
        })
    }

    fn advance_word(&mut self) {
        self.current = self.words[self.next_word % self.words.len()].clone();
        self.next_word += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(words: &[&str]) -> TypingSession {
        TypingSession::new(
            words.iter().map(ToString::to_string).collect(),
            ImpulseConfig::default(),
        )
    }

    #[test]
    fn test_keystroke_strength_depends_on_correctness() {
        let mut s = session(&["CAT"]);
        assert_eq!(
            s.type_char('c'),
            Some(ImpulseKind::Letter {
                char_index: 0,
                strength: 12.0
            })
        );
        assert_eq!(
            s.type_char('x'),
            Some(ImpulseKind::Letter {
                char_index: 1,
                strength: 4.0
            })
        );
        assert_eq!(s.input(), "CX");
    }

    #[test]
    fn test_input_is_capped_to_word_length() {
        let mut s = session(&["AB"]);
        s.type_char('a');
        s.type_char('b');
        assert_eq!(s.type_char('c'), None);
        assert_eq!(s.input(), "AB");
        assert_eq!(s.type_char(' '), None);
    }

    #[test]
    fn test_word_completes_after_delay() {
        let mut s = session(&["HI", "YO"]);
        s.type_char('h');
        s.type_char('i');

        assert!(s.tick(Duration::from_millis(1_000)).is_none());
        assert!(s.tick(Duration::from_millis(1_399)).is_none());
        let done = s.tick(Duration::from_millis(1_400)).unwrap();

        assert_eq!(done.word, "HI");
        assert_eq!(done.impulse, ImpulseKind::Word { strength: 80.0 });
        assert_eq!(s.history(), ["HI".to_string()]);
        assert_eq!(s.current(), "YO");
        assert_eq!(s.input(), "");
    }

    #[test]
    fn test_correction_restarts_completion_timer() {
        let mut s = session(&["OK"]);
        s.type_char('o');
        s.type_char('k');
        s.tick(Duration::from_millis(0));
        s.backspace();
        s.tick(Duration::from_millis(100));
        s.type_char('k');

        assert!(s.tick(Duration::from_millis(450)).is_none());
        assert!(s.tick(Duration::from_millis(850)).is_some());
    }

    #[test]
    fn test_words_cycle() {
        let mut s = session(&["A"]);
        s.type_char('a');
        s.tick(Duration::ZERO);
        s.tick(COMPLETION_DELAY).unwrap();
        assert_eq!(s.current(), "A");
        assert_eq!(s.history().len(), 1);
    }

    #[test]
    fn test_empty_word_list_uses_builtin_words() {
        let s = TypingSession::new(Vec::new(), ImpulseConfig::default());
        assert_eq!(s.current(), WORDS[0]);
    }
}
