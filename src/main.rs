mod app;
mod messages;
mod notepad_core;
mod settings;

use app::App;

fn main() {
    console_error_panic_hook::set_once();
    leptos::mount::mount_to_body(App);
}
