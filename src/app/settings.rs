use gtk4::prelude::*;
use gtk4::{Align, Box as GtkBox, Button, Grid, Label, Orientation, Window};

use crate::config::{config_file_path, load_app_config, AppConfig, CaptureMode, StatusSurfaceKind};
use crate::generation::GenerationSettings;

/// Read-only summary of the effective configuration.
pub(super) fn present_settings(parent: Option<&Window>) {
    let config = load_app_config();
    let settings = GenerationSettings::resolve(&config);
    let config_path = match config_file_path() {
        Ok(path) => path.display().to_string(),
        Err(err) => err.to_string(),
    };

    let grid = Grid::new();
    grid.set_row_spacing(6);
    grid.set_column_spacing(16);
    for (row, (key, value)) in (0..).zip(settings_rows(&config, &settings, &config_path)) {
        let key_label = Label::new(Some(key));
        key_label.set_halign(Align::Start);
        key_label.add_css_class("sniptex-settings-key");
        let value_label = Label::new(Some(&value));
        value_label.set_halign(Align::Start);
        value_label.set_selectable(true);
        grid.attach(&key_label, 0, row, 1, 1);
        grid.attach(&value_label, 1, row, 1, 1);
    }

    let hint = Label::new(Some("Edit the configuration file to change these values."));
    hint.set_halign(Align::Start);
    hint.add_css_class("dim-label");

    let close_button = Button::with_label("Close");
    close_button.set_halign(Align::End);

    let content = GtkBox::new(Orientation::Vertical, 12);
    content.set_margin_top(16);
    content.set_margin_bottom(16);
    content.set_margin_start(16);
    content.set_margin_end(16);
    content.append(&grid);
    content.append(&hint);
    content.append(&close_button);

    let window = Window::builder()
        .title("SnipTex Settings")
        .modal(true)
        .resizable(false)
        .child(&content)
        .build();
    window.set_transient_for(parent);

    {
        let window = window.clone();
        close_button.connect_clicked(move |_| window.close());
    }
    window.present();
}

fn settings_rows(
    config: &AppConfig,
    settings: &GenerationSettings,
    config_path: &str,
) -> Vec<(&'static str, String)> {
    let capture_mode = match config.capture_mode {
        CaptureMode::Text => "text (model transcription)",
        CaptureMode::Image => "image (copy screenshot)",
    };
    let status_surface = match config.status_surface {
        StatusSurfaceKind::Toast => "toast",
        StatusSurfaceKind::Notification => "desktop notification",
    };
    let prompt = config
        .prompt_file
        .as_ref()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "built-in".to_string());
    let api_key = if settings.api_key.is_some() {
        "configured"
    } else {
        "not set"
    };

    vec![
        ("Configuration file", config_path.to_string()),
        ("Backend", config.backend_name().to_string()),
        ("Model", settings.model.clone()),
        ("API key", api_key.to_string()),
        ("Prompt", prompt),
        ("Capture mode", capture_mode.to_string()),
        ("Status", status_surface.to_string()),
    ]
}
