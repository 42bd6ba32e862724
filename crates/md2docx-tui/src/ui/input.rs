//! Keyboard input handling for the TUI.
//!
//! Translates key and paste events into application state changes for
//! whichever route is on screen.

use crossterm::event::{KeyCode, KeyEvent};

use md2docx_core::auth::{CallbackState, HOME_ROUTE};

use crate::app::{App, AppState, Screen};

/// Handle keyboard input. Returns true if the app should quit.
pub fn handle_input(app: &mut App, key: KeyEvent) -> bool {
    // Handle help overlay
    if matches!(app.state, AppState::ShowingHelp) {
        if matches!(key.code, KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('q')) {
            app.state = AppState::Normal;
        }
        return false;
    }

    // Handle quit confirmation
    if matches!(app.state, AppState::ConfirmingQuit) {
        match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                app.state = AppState::Quitting;
                return true;
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                app.state = AppState::Normal;
            }
            _ => {}
        }
        return false;
    }

    match app.screen {
        Screen::RedirectPrompt => handle_redirect_input(app, key),
        Screen::Callback => handle_callback_input(app, key),
        Screen::Home => handle_home_input(app, key),
    }
    false
}

/// Pasted text only matters while the redirect prompt is open
pub fn handle_paste(app: &mut App, text: &str) {
    if app.screen == Screen::RedirectPrompt && matches!(app.state, AppState::Normal) {
        app.push_redirect_text(text);
    }
}

fn handle_redirect_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.redirect_input.clear();
            app.navigate(HOME_ROUTE);
        }
        KeyCode::Enter => {
            if !app.redirect_input.trim().is_empty() {
                app.submit_redirect();
            }
        }
        KeyCode::Backspace => {
            app.redirect_input.pop();
        }
        KeyCode::Char(c) => {
            app.push_redirect_text(&c.to_string());
        }
        _ => {}
    }
}

fn handle_callback_input(app: &mut App, key: KeyEvent) {
    match app.callback_state() {
        CallbackState::Failed(_) => {
            if matches!(key.code, KeyCode::Enter | KeyCode::Esc) {
                app.navigate(HOME_ROUTE);
            }
        }
        // Leaving mid-flight unmounts the controller
        _ => {
            if key.code == KeyCode::Esc {
                app.navigate(HOME_ROUTE);
            }
        }
    }
}

fn handle_home_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('?') => app.state = AppState::ShowingHelp,
        KeyCode::Char('q') | KeyCode::Esc => app.state = AppState::ConfirmingQuit,
        _ if app.is_authenticated() => handle_signed_in_input(app, key),
        KeyCode::Char('l') | KeyCode::Enter => app.start_login(),
        KeyCode::Char('p') => app.show_redirect_prompt(),
        _ => {}
    }
}

fn handle_signed_in_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('f') => app.fetch_documents(),
        KeyCode::Char('c') => app.convert_documents(),
        KeyCode::Char('d') => app.download_archive(),
        KeyCode::Char('o') => app.logout(),
        KeyCode::Up | KeyCode::Char('k') => app.select_prev_doc(),
        KeyCode::Down | KeyCode::Char('j') => app.select_next_doc(),
        _ => {}
    }
}
