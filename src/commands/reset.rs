use crate::ui;

/// User reset is a backend-side operation that is not exposed yet; keep the
/// command surface and say so.
pub fn run() {
    ui::section_header("Resetting User....");
    println!("User reset is disabled in this version.");
}
