use gtk4::CssProvider;

const RUNTIME_CSS: &str = "
window.sniptex-overlay,
window.sniptex-overlay > drawingarea {
    background: transparent;
}

window.sniptex-toast {
    background: transparent;
}

.sniptex-toast-card {
    background-color: rgba(24, 24, 27, 0.9);
    border: 1px solid rgba(255, 255, 255, 0.11);
    border-radius: 12px;
    padding: 12px 14px;
}

.sniptex-toast-card label {
    color: #ffffff;
    font-size: 14px;
    font-weight: 500;
}

.sniptex-settings-key {
    font-weight: 600;
}
";

pub(super) fn install_runtime_css() {
    let provider = CssProvider::new();
    provider.load_from_data(RUNTIME_CSS);
    if let Some(display) = gtk4::gdk::Display::default() {
        gtk4::style_context_add_provider_for_display(
            &display,
            &provider,
            gtk4::STYLE_PROVIDER_PRIORITY_APPLICATION,
        );
    }
}
