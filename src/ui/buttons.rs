use serenity::{
    all::ButtonStyle,
    builder::{CreateActionRow, CreateButton},
};

use crate::audio::{
    repeat::RepeatMode,
    session::{PlaybackStatus, SessionSnapshot},
};

/// IDs personalizados para los botones del panel.
///
/// Son fijos para que los botones sigan funcionando después de reiniciar el bot.
pub mod button_ids {
    pub const PAUSE: &str = "panel_pause";
    pub const RESUME: &str = "panel_resume";
    pub const SKIP: &str = "panel_skip";
    pub const SHUFFLE: &str = "panel_shuffle";
    pub const REPEAT: &str = "panel_repeat";
    pub const LIST: &str = "panel_list";
    pub const LEAVE: &str = "panel_leave";
}

/// Acción asociada a un botón del panel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelAction {
    Pause,
    Resume,
    Skip,
    Shuffle,
    Repeat,
    List,
    Leave,
}

impl PanelAction {
    pub fn from_custom_id(custom_id: &str) -> Option<Self> {
        let action = match custom_id {
            button_ids::PAUSE => PanelAction::Pause,
            button_ids::RESUME => PanelAction::Resume,
            button_ids::SKIP => PanelAction::Skip,
            button_ids::SHUFFLE => PanelAction::Shuffle,
            button_ids::REPEAT => PanelAction::Repeat,
            button_ids::LIST => PanelAction::List,
            button_ids::LEAVE => PanelAction::Leave,
            _ => return None,
        };
        Some(action)
    }
}

/// El color del botón de repetición refleja el modo actual
pub fn repeat_style(mode: RepeatMode) -> ButtonStyle {
    match mode {
        RepeatMode::Off => ButtonStyle::Secondary,
        RepeatMode::All => ButtonStyle::Success,
        RepeatMode::One => ButtonStyle::Primary,
    }
}

/// Crea los controles del panel según el estado de la sesión
pub fn create_panel_buttons(snapshot: &SessionSnapshot) -> Vec<CreateActionRow> {
    let paused = snapshot.status == PlaybackStatus::Paused;
    let playing = snapshot.status == PlaybackStatus::Playing;

    let pause_btn = CreateButton::new(button_ids::PAUSE)
        .emoji('⏸')
        .style(ButtonStyle::Secondary)
        .disabled(!playing);

    let resume_btn = CreateButton::new(button_ids::RESUME)
        .emoji('▶')
        .style(ButtonStyle::Primary)
        .disabled(!paused);

    let skip_btn = CreateButton::new(button_ids::SKIP)
        .emoji('⏭')
        .style(ButtonStyle::Secondary)
        .disabled(!(playing || paused));

    let shuffle_btn = CreateButton::new(button_ids::SHUFFLE)
        .emoji('🔀')
        .style(ButtonStyle::Secondary)
        .disabled(snapshot.queue_len < 2);

    let repeat_btn = CreateButton::new(button_ids::REPEAT)
        .emoji(if snapshot.repeat_mode == RepeatMode::One { '🔂' } else { '🔁' })
        .style(repeat_style(snapshot.repeat_mode));

    let row1 = CreateActionRow::Buttons(vec![pause_btn, resume_btn, skip_btn, shuffle_btn, repeat_btn]);

    let list_btn = CreateButton::new(button_ids::LIST)
        .label("Cola")
        .emoji('📋')
        .style(ButtonStyle::Secondary);

    let leave_btn = CreateButton::new(button_ids::LEAVE)
        .label("Salir")
        .emoji('👋')
        .style(ButtonStyle::Danger);

    let row2 = CreateActionRow::Buttons(vec![list_btn, leave_btn]);

    vec![row1, row2]
}
