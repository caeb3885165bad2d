use crate::shared::Screen;

// state local to tui, synced from DisplayState every frame so keys resolve
// against the screen that is actually showing
#[derive(Clone, Debug)]
pub struct TuiState {
    pub screen: Screen,
}

impl Default for TuiState {
    fn default() -> Self {
        Self {
            screen: Screen::Perform,
        }
    }
}
