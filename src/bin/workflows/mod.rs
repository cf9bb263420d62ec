mod menu;
mod phases;

pub(crate) use menu::print_menu_tables;
pub(crate) use phases::{run_phase, Phase};
