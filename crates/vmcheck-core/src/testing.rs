//! Scripted [`Machine`] for tests that do not boot a VM.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::error::{HarnessError, Result};
use crate::machine::{ExecOutput, Machine};

/// Something the harness asked the machine to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Execute(String),
    Chars(String),
    Key(String),
    Screenshot(String),
    Copy(String),
}

type Responder = Box<dyn FnMut(&str) -> ExecOutput>;

enum Response {
    /// Plays outputs in order and repeats the last one.
    Sequence(VecDeque<ExecOutput>),
    Dynamic(Responder),
}

struct Rule {
    pattern: String,
    response: Response,
}

#[derive(Default)]
struct State {
    rules: Vec<Rule>,
    events: Vec<Event>,
}

/// Machine answering commands from substring rules.
///
/// The most recently registered rule whose pattern occurs in a command
/// answers it. Commands no rule matches are a transport error, so a test never
/// passes on a command it did not anticipate. Clones share state.
#[derive(Clone, Default)]
pub struct ScriptedMachine {
    state: Rc<RefCell<State>>,
}

impl ScriptedMachine {
    /// Creates a machine with no rules.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers every command containing `pattern` with `output`.
    pub fn on(&self, pattern: &str, output: ExecOutput) -> &Self {
        self.on_sequence(pattern, [output])
    }

    /// Answers commands containing `pattern` with `outputs` in order, repeating the last.
    pub fn on_sequence(
        &self,
        pattern: &str,
        outputs: impl IntoIterator<Item = ExecOutput>,
    ) -> &Self {
        self.state.borrow_mut().rules.push(Rule {
            pattern: pattern.to_string(),
            response: Response::Sequence(outputs.into_iter().collect()),
        });
        self
    }

    /// Answers commands containing `pattern` by calling `f` with the full command.
    pub fn on_fn(&self, pattern: &str, f: impl FnMut(&str) -> ExecOutput + 'static) -> &Self {
        self.state.borrow_mut().rules.push(Rule {
            pattern: pattern.to_string(),
            response: Response::Dynamic(Box::new(f)),
        });
        self
    }

    /// Returns everything the harness did, in order.
    #[must_use]
    pub fn events(&self) -> Vec<Event> {
        self.state.borrow().events.clone()
    }

    /// Returns every executed command, in order.
    #[must_use]
    pub fn commands(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Execute(cmd) => Some(cmd),
                _ => None,
            })
            .collect()
    }

    /// Counts executed commands containing `pattern`.
    #[must_use]
    pub fn count(&self, pattern: &str) -> usize {
        self.commands()
            .iter()
            .filter(|cmd| cmd.contains(pattern))
            .count()
    }

    fn record(&self, event: Event) {
        self.state.borrow_mut().events.push(event);
    }
}

impl Machine for ScriptedMachine {
    fn execute(&self, command: &str) -> Result<ExecOutput> {
        self.record(Event::Execute(command.to_string()));

        let mut state = self.state.borrow_mut();
        let rule = state
            .rules
            .iter_mut()
            .rev()
            .find(|rule| command.contains(&rule.pattern))
            .ok_or_else(|| HarnessError::transport(format!("unscripted command: {command}")))?;

        Ok(match &mut rule.response {
            Response::Sequence(outputs) => {
                if outputs.len() > 1 {
                    outputs.pop_front().unwrap_or_default()
                } else {
                    outputs.front().cloned().unwrap_or_default()
                }
            }
            Response::Dynamic(f) => f(command),
        })
    }

    fn send_chars(&self, chars: &str) -> Result<()> {
        self.record(Event::Chars(chars.to_string()));
        Ok(())
    }

    fn send_key(&self, key: &str) -> Result<()> {
        self.record(Event::Key(key.to_string()));
        Ok(())
    }

    fn screenshot(&self, name: &str) -> Result<()> {
        self.record(Event::Screenshot(name.to_string()));
        Ok(())
    }

    fn copy_from_vm(&self, path: &str, _target_dir: &str) -> Result<()> {
        self.record(Event::Copy(path.to_string()));
        Ok(())
    }
}
