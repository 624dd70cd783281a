use forge_core::targets::registered_kinds;

/// Print every target kind that can appear in `[[targets]]`.
pub fn targets() {
    for kind in registered_kinds() {
        println!("{kind}");
    }
}
