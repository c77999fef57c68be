use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

#[derive(Debug, Clone)]
pub enum AppAction {
    Quit,
    NextTab,
    MoveUp,
    MoveDown,
    Confirm,
    AdjustUp,
    AdjustDown,
    CycleReadingMode,
    CycleEngine,
    ToggleBookmark,
    DeleteBookmark,
    RefreshFeed,
    TogglePlayback,
    ShowHelp,
    HideHelp,
}

pub fn handle_key_event(key: KeyEvent, show_help: bool) -> Option<AppAction> {
    // If help is showing, any key closes it
    if show_help {
        return Some(AppAction::HideHelp);
    }

    match (key.code, key.modifiers) {
        (KeyCode::Char('q'), _) => Some(AppAction::Quit),
        (KeyCode::Char('c'), KeyModifiers::CONTROL) => Some(AppAction::Quit),

        (KeyCode::Tab, _) => Some(AppAction::NextTab),

        (KeyCode::Char('j'), _) | (KeyCode::Down, _) => Some(AppAction::MoveDown),
        (KeyCode::Char('k'), _) | (KeyCode::Up, _) => Some(AppAction::MoveUp),

        (KeyCode::Enter, _) => Some(AppAction::Confirm),

        (KeyCode::Char('l'), _) | (KeyCode::Right, _) => Some(AppAction::AdjustUp),
        (KeyCode::Char('h'), _) | (KeyCode::Left, _) => Some(AppAction::AdjustDown),

        (KeyCode::Char('r'), _) => Some(AppAction::RefreshFeed),
        (KeyCode::Char('m'), _) => Some(AppAction::CycleReadingMode),
        (KeyCode::Char('e'), _) => Some(AppAction::CycleEngine),
        (KeyCode::Char('b'), _) => Some(AppAction::ToggleBookmark),
        (KeyCode::Char('d'), _) => Some(AppAction::DeleteBookmark),
        (KeyCode::Char('p'), _) | (KeyCode::Char(' '), _) => Some(AppAction::TogglePlayback),

        (KeyCode::Char('?'), _) => Some(AppAction::ShowHelp),

        _ => None,
    }
}
