/// Keys the practice view reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Left,
    Right,
    Up,
    Down,
    Char(char),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPress {
    pub key: Key,
    pub ctrl: bool,
    pub meta: bool,
    pub shift: bool,
}

impl KeyPress {
    pub fn plain(key: Key) -> Self {
        Self {
            key,
            ctrl: false,
            meta: false,
            shift: false,
        }
    }

    /// `key` with the platform command modifier held (`Ctrl`, or `Cmd` on macOS).
    pub fn command(key: Key) -> Self {
        Self {
            ctrl: !cfg!(target_os = "macos"),
            meta: cfg!(target_os = "macos"),
            ..Self::plain(key)
        }
    }

    fn is_undo(&self) -> bool {
        (self.ctrl || self.meta) && !self.shift && matches!(self.key, Key::Char('z' | 'Z'))
    }
}

/// Which element has keyboard focus.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    #[default]
    Nothing,
    ScriptEditor,
    SlideList,
    /// any other text input
    OtherEditable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modal {
    GoalTime,
    ScriptEditor,
    ExitConfirm,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ViewState {
    pub focus: Focus,
    pub modal: Option<Modal>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    NextSlide,
    PreviousSlide,
    Undo,
}

/// Maps a key press to a command, or `None` when the press belongs to someone else.
pub fn resolve(press: KeyPress, view: ViewState) -> Option<Command> {
    if view.modal.is_some() {
        return None;
    }

    if press.is_undo() {
        return (view.focus == Focus::ScriptEditor).then_some(Command::Undo);
    }

    if press.ctrl || press.meta {
        return None;
    }

    match (press.key, view.focus) {
        (_, Focus::ScriptEditor | Focus::OtherEditable) => None,
        (Key::Left, _) => Some(Command::PreviousSlide),
        (Key::Right, _) => Some(Command::NextSlide),
        (Key::Up, Focus::SlideList) => Some(Command::PreviousSlide),
        (Key::Down, Focus::SlideList) => Some(Command::NextSlide),
        _ => None,
    }
}
