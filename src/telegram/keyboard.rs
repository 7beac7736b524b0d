//! Inline keyboards.

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use crate::core::config::selection::BUTTONS_PER_ROW;
use crate::download::tokens::callback_data;

/// One button per `(label, token)`, two per row with any remainder on its own row.
pub fn selection_keyboard(options: &[(String, String)]) -> InlineKeyboardMarkup {
    let rows: Vec<Vec<InlineKeyboardButton>> = options
        .chunks(BUTTONS_PER_ROW)
        .map(|row| {
            row.iter()
                .map(|(label, token)| InlineKeyboardButton::callback(label.clone(), callback_data(token)))
                .collect()
        })
        .collect();
    InlineKeyboardMarkup::new(rows)
}
